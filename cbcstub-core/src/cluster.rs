//! Strip clusters and the per-event cluster map.

use crate::channel::DetectorKey;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A run of contiguous fired strips.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Cluster {
    /// Centroid in column-local channel units (mean of the merged channels).
    pub position: f64,
    /// Number of contiguous channels merged into the cluster (always >= 1).
    pub width: u32,
}

impl Cluster {
    /// Creates a new cluster.
    #[inline]
    #[must_use]
    pub fn new(position: f64, width: u32) -> Self {
        Self { position, width }
    }

    /// Single-strip cluster at `channel`.
    #[inline]
    #[must_use]
    pub fn single(channel: u16) -> Self {
        Self {
            position: f64::from(channel),
            width: 1,
        }
    }
}

/// Clusters of one event, bucketed by layer and column.
///
/// All four [`DetectorKey`] entries always exist; within an entry clusters
/// keep insertion (scan) order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ClusterMap {
    entries: BTreeMap<DetectorKey, Vec<Cluster>>,
}

impl Default for ClusterMap {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterMap {
    /// Creates a map with empty entries for every key.
    #[must_use]
    pub fn new() -> Self {
        let entries = DetectorKey::ALL
            .iter()
            .map(|&key| (key, Vec::new()))
            .collect();
        Self { entries }
    }

    /// Appends a cluster under `key`.
    pub fn push(&mut self, key: DetectorKey, cluster: Cluster) {
        self.entries.entry(key).or_default().push(cluster);
    }

    /// Clusters stored under `key`, in scan order.
    #[must_use]
    pub fn get(&self, key: DetectorKey) -> &[Cluster] {
        self.entries.get(&key).map_or(&[], Vec::as_slice)
    }

    /// Empties every entry while keeping allocated capacity.
    pub fn clear(&mut self) {
        for clusters in self.entries.values_mut() {
            clusters.clear();
        }
    }

    /// Total number of clusters across all entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    /// Returns true if no entry holds a cluster.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    /// Iterates over `(key, clusters)` in key order.
    pub fn iter(&self) -> impl Iterator<Item = (DetectorKey, &[Cluster])> {
        self.entries.iter().map(|(&key, v)| (key, v.as_slice()))
    }
}
