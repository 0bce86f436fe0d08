//! Persistent nearest-neighbour index mapping article embeddings to
//! cluster ids.
//!
//! A usearch HNSW index holds the vectors; a sidecar `Vec` maps each vector
//! ordinal (the usearch key) to its article and cluster. Both are written
//! to disk atomically and restored together; any mismatch is reported as
//! corruption so the caller can rebuild from the article store.

mod index;
mod shared;

pub use index::{ClusterIndex, IndexEntry, IndexError, Result};
pub use shared::SharedIndex;
