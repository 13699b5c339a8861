//! Database configuration
//!
//! ```yaml
//! max_rule_iterations: 32
//! index_orders: [spo, pos, osp]
//! default_prefixes: true
//! result_format: json
//! prefixes:
//!   ex: http://example.org/
//! ```

use crate::index::IndexOrder;
use crate::rules::DEFAULT_MAX_ITERATIONS;
use crate::sparql::ResultFormat;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML error
    #[error("Invalid configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Settings applied when a database is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Cap on rule-engine passes per inference run
    pub max_rule_iterations: usize,
    /// Index permutations to maintain; SPO and POS are always added
    pub index_orders: Vec<IndexOrder>,
    /// Preload rdf, rdfs, xsd, owl, foaf, dc and dcterms
    pub default_prefixes: bool,
    /// Encoding used by textual query output
    pub result_format: ResultFormat,
    /// Extra prefixes registered at construction
    pub prefixes: IndexMap<String, String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            max_rule_iterations: DEFAULT_MAX_ITERATIONS,
            index_orders: IndexOrder::ALL.to_vec(),
            default_prefixes: true,
            result_format: ResultFormat::Text,
            prefixes: IndexMap::new(),
        }
    }
}

impl DatabaseConfig {
    /// Parse a YAML document; missing keys take their defaults
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Load a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DatabaseConfig::default();
        assert_eq!(config.max_rule_iterations, 64);
        assert_eq!(config.index_orders.len(), 6);
        assert!(config.default_prefixes);
        assert_eq!(config.result_format, ResultFormat::Text);
    }

    #[test]
    fn test_partial_yaml() {
        let config = DatabaseConfig::from_yaml_str(
            "max_rule_iterations: 5\nresult_format: csv\nprefixes:\n  ex: http://example.org/\n",
        )
        .unwrap();
        assert_eq!(config.max_rule_iterations, 5);
        assert_eq!(config.result_format, ResultFormat::Csv);
        assert_eq!(config.prefixes["ex"], "http://example.org/");
        assert_eq!(config.index_orders.len(), 6);
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(matches!(
            DatabaseConfig::from_yaml_str("index_orders: [xyz]"),
            Err(ConfigError::Yaml(_))
        ));
    }

    #[test]
    fn test_file_round_trip() {
        let config = DatabaseConfig {
            index_orders: vec![IndexOrder::Osp],
            ..DatabaseConfig::default()
        };
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_yaml().unwrap().as_bytes()).unwrap();
        assert_eq!(DatabaseConfig::from_file(file.path()).unwrap(), config);
    }
}
