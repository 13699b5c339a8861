//! samyama-rdf: command-line front end for the embedded RDF database
//!
//! Loads data files into a fresh in-memory database, then runs a query, an
//! update, a rule program or an export against it.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use samyama_rdf::rdf::RdfFormat;
use samyama_rdf::sparql::ResultFormat;
use samyama_rdf::{DatabaseConfig, SparqlDatabase};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "samyama-rdf", version, about = "In-memory RDF store with SPARQL and rules")]
struct Cli {
    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data files to load (.ttl, .n3, .rdf, .xml)
    #[arg(long = "data", short = 'd', global = true)]
    data: Vec<PathBuf>,

    /// Result format override (text, json, xml, csv, tsv)
    #[arg(long, global = true)]
    format: Option<ResultFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ExportFormat {
    Turtle,
    Rdfxml,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a SPARQL query
    Query {
        /// Query text, or @file to read it from a file
        query: String,
    },
    /// Apply a SPARQL update and print the resulting data as Turtle
    Update {
        /// Update text, or @file
        update: String,
    },
    /// Run a rule program (rules plus optional trailing query)
    Rules {
        /// Rule text, or @file
        rules: String,

        /// Add the RDFS entailment rules first
        #[arg(long)]
        rdfs: bool,
    },
    /// Serialize the loaded data
    Export {
        #[arg(long, value_enum, default_value = "turtle")]
        to: ExportFormat,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(Cli::parse()) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => DatabaseConfig::from_file(path)
            .with_context(|| format!("reading config {}", path.display()))?,
        None => DatabaseConfig::default(),
    };
    if let Some(format) = cli.format {
        config.result_format = format;
    }

    let mut db = SparqlDatabase::with_config(config);
    for path in &cli.data {
        load(&mut db, path)?;
    }

    match cli.command {
        Commands::Query { query } => {
            let query = read_arg(&query)?;
            println!("{}", db.execute_sparql_query(&query)?);
        }
        Commands::Update { update } => {
            let update = read_arg(&update)?;
            let summary = db.execute_update(&update)?;
            eprintln!("{}", summary);
            println!("{}", db.generate_turtle()?);
        }
        Commands::Rules { rules, rdfs } => {
            let rules = read_arg(&rules)?;
            if rdfs {
                db.install_rdfs_rules()?;
            }
            let outcome = db.process_rule_definition(&rules)?;
            eprintln!(
                "{} rules added, {} triples derived in {} passes{}",
                outcome.rules_added,
                outcome.report.derived,
                outcome.report.passes,
                if outcome.report.fixpoint_reached {
                    ""
                } else {
                    " (iteration cap reached)"
                }
            );
            if let Some(results) = outcome.results {
                println!(
                    "{}",
                    results.serialize(db.config().result_format, db.store().prefixes())?
                );
            }
        }
        Commands::Export { to } => {
            let text = match to {
                ExportFormat::Turtle => db.generate_turtle()?,
                ExportFormat::Rdfxml => db.generate_rdf_xml()?,
            };
            println!("{}", text);
        }
    }
    Ok(())
}

fn load(db: &mut SparqlDatabase, path: &Path) -> Result<()> {
    let Some(format) = RdfFormat::from_path(path) else {
        bail!("cannot tell the format of {} from its extension", path.display());
    };
    let document = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let added = db
        .load_document(&document, format)
        .with_context(|| format!("loading {}", path.display()))?;
    info!("Loaded {} triples from {}", added, path.display());
    Ok(())
}

/// `@path` reads the argument from a file
fn read_arg(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path).with_context(|| format!("reading {}", path)),
        None => Ok(arg.to_string()),
    }
}
