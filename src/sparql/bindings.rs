//! Variables and binding frames
//!
//! Variables are interned per compiled query, update operation or rule into
//! dense [`VarId`]s. A [`Bindings`] frame is a fixed-width slot array indexed
//! by `VarId`, so extending or copying a partial solution never hashes names.

use crate::rdf::{RdfTerm, TermId, TripleStore};
use std::fmt;

/// Dense variable identifier, scoped to one [`VariableTable`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub(crate) usize);

impl VarId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
struct VariableInfo {
    name: String,
    hidden: bool,
}

/// Name ↔ id table for one evaluation scope
#[derive(Debug, Clone, Default)]
pub struct VariableTable {
    variables: Vec<VariableInfo>,
    anonymous: usize,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn intern_with(&mut self, name: &str, hidden: bool) -> VarId {
        if let Some(id) = self.get(name) {
            return id;
        }
        self.variables.push(VariableInfo {
            name: name.to_string(),
            hidden,
        });
        VarId(self.variables.len() - 1)
    }

    /// Intern a named variable (without the `?`)
    pub fn intern(&mut self, name: &str) -> VarId {
        self.intern_with(name, false)
    }

    /// Intern a variable that never appears in `SELECT *` (blank nodes in
    /// patterns, aggregate slots)
    pub fn intern_hidden(&mut self, name: &str) -> VarId {
        self.intern_with(name, true)
    }

    /// A new hidden variable with a unique name
    pub fn fresh_hidden(&mut self, kind: &str) -> VarId {
        self.anonymous += 1;
        let name = format!(".{}{}", kind, self.anonymous);
        self.intern_hidden(&name)
    }

    pub fn get(&self, name: &str) -> Option<VarId> {
        self.variables
            .iter()
            .position(|v| v.name == name)
            .map(VarId)
    }

    pub fn name(&self, id: VarId) -> &str {
        self.variables
            .get(id.0)
            .map_or("", |v| v.name.as_str())
    }

    pub fn is_hidden(&self, id: VarId) -> bool {
        self.variables.get(id.0).map_or(true, |v| v.hidden)
    }

    /// Visible variables in order of first appearance
    pub fn visible(&self) -> impl Iterator<Item = VarId> + '_ {
        self.variables
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.hidden)
            .map(|(i, _)| VarId(i))
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// A partial solution: one optional term id per variable
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Bindings {
    values: Vec<Option<TermId>>,
}

impl Bindings {
    /// An empty frame wide enough for `width` variables
    pub fn new(width: usize) -> Self {
        Self {
            values: vec![None; width],
        }
    }

    pub fn get(&self, var: VarId) -> Option<TermId> {
        self.values.get(var.0).copied().flatten()
    }

    pub fn set(&mut self, var: VarId, value: TermId) {
        if let Some(slot) = self.values.get_mut(var.0) {
            *slot = Some(value);
        }
    }

    pub fn is_bound(&self, var: VarId) -> bool {
        self.get(var).is_some()
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }
}

impl fmt::Display for Bindings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound: Vec<String> = self
            .values
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|id| format!("{}={}", i, id)))
            .collect();
        write!(f, "{{{}}}", bound.join(", "))
    }
}

/// Anything that can provide the current term of a variable
pub trait TermSource {
    fn term(&self, var: VarId) -> Option<RdfTerm>;
}

/// A binding frame read through the store's dictionary
pub struct FrameView<'a> {
    pub frame: &'a Bindings,
    pub store: &'a TripleStore,
}

impl TermSource for FrameView<'_> {
    fn term(&self, var: VarId) -> Option<RdfTerm> {
        self.frame
            .get(var)
            .and_then(|id| self.store.term(id))
            .cloned()
    }
}

/// A decoded solution row indexed by `VarId`
impl TermSource for [Option<RdfTerm>] {
    fn term(&self, var: VarId) -> Option<RdfTerm> {
        self.get(var.0).cloned().flatten()
    }
}
