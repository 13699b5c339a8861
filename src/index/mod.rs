//! Triple indexing module
//!
//! Provides B-Tree permutation indices over interned triples and the
//! strategies used to pick one per lookup.

pub mod manager;
pub mod permutation;
pub mod selector;

pub use manager::{IndexManager, ESTIMATE_CAP};
pub use permutation::{EncodedPattern, IndexOrder, PermutationIndex};
pub use selector::{FixedOrder, IndexSelector, MostSelectiveFirst};
