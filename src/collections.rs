use std::hash::BuildHasherDefault;
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxHasher;


/// Use indexmap for fast lookups and rustc_hash for fast hashing
/// Iteration follows insertion order, which the frontier relies on for tie-breaks
pub(crate) type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;

pub(crate) type FxIndexSet<K> = IndexSet<K, BuildHasherDefault<FxHasher>>;
