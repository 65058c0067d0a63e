//! Per-application route trie (spec component A): static segments, named
//! parameters (`:name`), and catch-all suffixes (`*name`), with conflict
//! detection at insert time and longest-prefix matching at lookup.

mod trie;

pub use trie::{Matched, RouteError, RouteTrie};
