use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;
use usearch::{Index, IndexOptions, MetricKind, ScalarKind};
use uuid::Uuid;

const VECTORS_FILE: &str = "vectors.usearch";
const SIDECAR_FILE: &str = "clusters.json";

pub type Result<T> = std::result::Result<T, IndexError>;

#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("Index creation failed: {0}")]
    Creation(String),

    #[error("Failed to add vector: {0}")]
    Add(String),

    #[error("Search failed: {0}")]
    Search(String),

    #[error("Invalid dimensions: expected {expected}, got {got}")]
    InvalidDimensions { expected: usize, got: usize },

    #[error("Snapshot I/O failed: {0}")]
    Persistence(String),

    /// Snapshot files are missing, unreadable, or disagree with each other.
    /// The caller rebuilds from the article store.
    #[error("Snapshot corrupt: {0}")]
    Corrupt(String),
}

/// One sidecar entry per vector; the entry's position is the vector's
/// usearch key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IndexEntry {
    pub article_id: Uuid,
    pub cluster_id: Uuid,
}

pub struct ClusterIndex {
    index: Index,
    entries: Vec<IndexEntry>,
    dimensions: usize,
}

impl std::fmt::Debug for ClusterIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClusterIndex")
            .field("entries", &self.entries)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

fn index_options(dimensions: usize) -> IndexOptions {
    IndexOptions {
        dimensions,
        metric: MetricKind::Cos,
        // f32 keeps similarities exact enough for threshold comparisons;
        // quantisation would distort scores near the cut-off.
        quantization: ScalarKind::F32,
        connectivity: 16,
        expansion_add: 128,
        expansion_search: 64,
        multi: false,
    }
}

impl ClusterIndex {
    pub fn new(dimensions: usize) -> Result<Self> {
        let index = Index::new(&index_options(dimensions))
            .map_err(|e| IndexError::Creation(e.to_string()))?;
        Ok(Self {
            index,
            entries: Vec::new(),
            dimensions,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Article ids currently represented in the index. Reconciliation
    /// compares this against the store.
    pub fn article_ids(&self) -> HashSet<Uuid> {
        self.entries.iter().map(|e| e.article_id).collect()
    }

    fn check_dimensions(&self, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimensions {
            return Err(IndexError::InvalidDimensions {
                expected: self.dimensions,
                got: vector.len(),
            });
        }
        Ok(())
    }

    /// Top-1 nearest neighbour. Returns cosine similarity and the
    /// neighbour's cluster id, or None on an empty index.
    pub fn query(&self, vector: &[f32]) -> Result<Option<(f32, Uuid)>> {
        self.check_dimensions(vector)?;

        if self.entries.is_empty() {
            return Ok(None);
        }

        let matches = self
            .index
            .search(vector, 1)
            .map_err(|e| IndexError::Search(e.to_string()))?;

        let (key, distance) = match (matches.keys.first(), matches.distances.first()) {
            (Some(k), Some(d)) => (*k, *d),
            _ => return Ok(None),
        };

        let entry = self
            .entries
            .get(key as usize)
            .ok_or_else(|| IndexError::Search(format!("key {key} has no sidecar entry")))?;

        // usearch reports cosine distance; similarity = 1 - distance.
        Ok(Some((1.0 - distance, entry.cluster_id)))
    }

    /// Append a vector. No update, no delete: clusters only grow.
    pub fn add(&mut self, article_id: Uuid, cluster_id: Uuid, vector: &[f32]) -> Result<()> {
        self.check_dimensions(vector)?;

        // usearch requires reserved capacity before every add.
        let size = self.index.size();
        if size >= self.index.capacity() {
            let new_capacity = (self.index.capacity() * 2).max(64);
            self.index
                .reserve(new_capacity)
                .map_err(|e| IndexError::Creation(e.to_string()))?;
        }

        let key = self.entries.len() as u64;
        self.index
            .add(key, vector)
            .map_err(|e| IndexError::Add(e.to_string()))?;
        self.entries.push(IndexEntry {
            article_id,
            cluster_id,
        });

        Ok(())
    }

    /// Durable snapshot: vectors file plus sidecar, each written to a temp
    /// file and renamed into place.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)
            .map_err(|e| IndexError::Persistence(format!("create {}: {e}", dir.display())))?;

        let vectors_path = dir.join(VECTORS_FILE);
        let vectors_tmp = dir.join(format!("{VECTORS_FILE}.tmp"));
        let tmp_str = vectors_tmp
            .to_str()
            .ok_or_else(|| IndexError::Persistence("non-utf8 index path".to_string()))?;
        self.index
            .save(tmp_str)
            .map_err(|e| IndexError::Persistence(e.to_string()))?;
        std::fs::rename(&vectors_tmp, &vectors_path)
            .map_err(|e| IndexError::Persistence(e.to_string()))?;

        let sidecar_path = dir.join(SIDECAR_FILE);
        let sidecar_tmp = dir.join(format!("{SIDECAR_FILE}.tmp"));
        let json = serde_json::to_string(&self.entries)
            .map_err(|e| IndexError::Persistence(e.to_string()))?;
        std::fs::write(&sidecar_tmp, json).map_err(|e| IndexError::Persistence(e.to_string()))?;
        std::fs::rename(&sidecar_tmp, &sidecar_path)
            .map_err(|e| IndexError::Persistence(e.to_string()))?;

        info!(vectors = self.entries.len(), dir = %dir.display(), "Index snapshot written");
        Ok(())
    }

    /// Restore a snapshot. `Corrupt` covers every inconsistency: missing
    /// files, unparsable sidecar, or a vector count that disagrees with the
    /// sidecar length.
    pub fn load(dir: &Path, dimensions: usize) -> Result<Self> {
        let vectors_path = dir.join(VECTORS_FILE);
        let sidecar_path = dir.join(SIDECAR_FILE);

        if !vectors_path.exists() || !sidecar_path.exists() {
            return Err(IndexError::Corrupt("snapshot files missing".to_string()));
        }

        let index = Index::new(&index_options(dimensions))
            .map_err(|e| IndexError::Creation(e.to_string()))?;
        let path_str = vectors_path
            .to_str()
            .ok_or_else(|| IndexError::Persistence("non-utf8 index path".to_string()))?;
        index
            .load(path_str)
            .map_err(|e| IndexError::Corrupt(format!("vectors file unreadable: {e}")))?;

        let json = std::fs::read_to_string(&sidecar_path)
            .map_err(|e| IndexError::Corrupt(format!("sidecar unreadable: {e}")))?;
        let entries: Vec<IndexEntry> = serde_json::from_str(&json)
            .map_err(|e| IndexError::Corrupt(format!("sidecar unparsable: {e}")))?;

        if index.size() != entries.len() {
            return Err(IndexError::Corrupt(format!(
                "vector count {} does not match sidecar length {}",
                index.size(),
                entries.len()
            )));
        }

        info!(vectors = entries.len(), dir = %dir.display(), "Index snapshot restored");
        Ok(Self {
            index,
            entries,
            dimensions,
        })
    }

    /// Load a snapshot if a healthy one exists, otherwise start empty.
    /// Returns the index and whether a snapshot was restored.
    pub fn load_or_new(dir: &Path, dimensions: usize) -> Result<(Self, bool)> {
        match Self::load(dir, dimensions) {
            Ok(index) => Ok((index, true)),
            Err(IndexError::Corrupt(reason)) => {
                info!(reason, "No usable index snapshot; starting empty");
                Ok((Self::new(dimensions)?, false))
            }
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(mut v: Vec<f32>) -> Vec<f32> {
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for x in &mut v {
            *x /= norm;
        }
        v
    }

    fn vec_a() -> Vec<f32> {
        unit(vec![1.0, 0.0, 0.0, 0.0])
    }

    // cos(vec_a, vec_close) ≈ 0.9
    fn vec_close() -> Vec<f32> {
        unit(vec![0.9, (1.0f32 - 0.81).sqrt(), 0.0, 0.0])
    }

    // cos(vec_a, vec_far) ≈ 0.5
    fn vec_far() -> Vec<f32> {
        unit(vec![0.5, (1.0f32 - 0.25).sqrt(), 0.0, 0.0])
    }

    #[test]
    fn empty_index_has_no_neighbour() {
        let index = ClusterIndex::new(4).unwrap();
        assert!(index.query(&vec_a()).unwrap().is_none());
    }

    #[test]
    fn near_duplicate_found_above_threshold() {
        let mut index = ClusterIndex::new(4).unwrap();
        let cluster = Uuid::new_v4();
        index.add(Uuid::new_v4(), cluster, &vec_a()).unwrap();

        let (similarity, found) = index.query(&vec_close()).unwrap().unwrap();
        assert_eq!(found, cluster);
        assert!((similarity - 0.9).abs() < 0.01, "similarity {similarity}");

        let (similarity, _) = index.query(&vec_far()).unwrap().unwrap();
        assert!((similarity - 0.5).abs() < 0.01, "similarity {similarity}");
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        let mut index = ClusterIndex::new(4).unwrap();
        let err = index.add(Uuid::new_v4(), Uuid::new_v4(), &[1.0, 0.0]).unwrap_err();
        assert!(matches!(err, IndexError::InvalidDimensions { .. }));
    }

    #[test]
    fn snapshot_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let article = Uuid::new_v4();
        let cluster = Uuid::new_v4();

        let mut index = ClusterIndex::new(4).unwrap();
        index.add(article, cluster, &vec_a()).unwrap();
        index.add(Uuid::new_v4(), Uuid::new_v4(), &vec_far()).unwrap();
        index.save(dir.path()).unwrap();

        let restored = ClusterIndex::load(dir.path(), 4).unwrap();
        assert_eq!(restored.len(), 2);
        assert!(restored.article_ids().contains(&article));

        let (similarity, found) = restored.query(&vec_a()).unwrap().unwrap();
        assert_eq!(found, cluster);
        assert!(similarity > 0.99);
    }

    #[test]
    fn missing_snapshot_reports_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClusterIndex::load(dir.path(), 4).unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)));

        let (index, restored) = ClusterIndex::load_or_new(dir.path(), 4).unwrap();
        assert!(!restored);
        assert!(index.is_empty());
    }

    #[test]
    fn mangled_sidecar_reports_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = ClusterIndex::new(4).unwrap();
        index.add(Uuid::new_v4(), Uuid::new_v4(), &vec_a()).unwrap();
        index.save(dir.path()).unwrap();

        std::fs::write(dir.path().join("clusters.json"), "not json").unwrap();
        let err = ClusterIndex::load(dir.path(), 4).unwrap_err();
        assert!(matches!(err, IndexError::Corrupt(_)));
    }
}
