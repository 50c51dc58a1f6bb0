//! Strip clustering.
//!
//! Key characteristics:
//! - Single left-to-right pass, O(n) per column
//! - Channels merge only when strictly consecutive (`last + 1`)
//! - Cluster position is the unweighted mean of the merged channels
//!
//! The input is clustered in delivery order; readout delivers ascending
//! channels, and an out-of-order channel simply starts a new cluster.

use cbcstub_core::channel::DetectorKey;
use cbcstub_core::cluster::{Cluster, ClusterMap};

/// Running state of the cluster being built.
#[derive(Debug, Clone, Copy)]
struct Accumulator {
    last: u16,
    width: u32,
    position_sum: f64,
}

impl Accumulator {
    fn start(channel: u16) -> Self {
        Self {
            last: channel,
            width: 1,
            position_sum: f64::from(channel),
        }
    }

    #[inline]
    fn extends(&self, channel: u16) -> bool {
        self.last.checked_add(1) == Some(channel)
    }

    fn add(&mut self, channel: u16) {
        self.last = channel;
        self.width += 1;
        self.position_sum += f64::from(channel);
    }

    fn finish(self) -> Cluster {
        Cluster::new(self.position_sum / f64::from(self.width), self.width)
    }
}

/// Groups column-local channel lists into contiguous-run clusters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterFinder;

impl ClusterFinder {
    /// Creates a cluster finder.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Calls `emit` for every cluster of `channels`, in scan order.
    pub fn scan(&self, channels: &[u16], mut emit: impl FnMut(Cluster)) {
        let Some((&first, rest)) = channels.split_first() else {
            return;
        };
        if rest.is_empty() {
            emit(Cluster::single(first));
            return;
        }

        let mut current = Accumulator::start(first);
        for &channel in rest {
            if current.extends(channel) {
                current.add(channel);
            } else {
                emit(current.finish());
                current = Accumulator::start(channel);
            }
        }
        emit(current.finish());
    }

    /// Clusters of `channels`, in scan order.
    #[must_use]
    pub fn find(&self, channels: &[u16]) -> Vec<Cluster> {
        let mut clusters = Vec::new();
        self.scan(channels, |cluster| clusters.push(cluster));
        clusters
    }

    /// Appends the clusters of `channels` to `map` under `key`.
    ///
    /// Returns the number of clusters added.
    pub fn find_into(&self, key: DetectorKey, channels: &[u16], map: &mut ClusterMap) -> usize {
        let mut added = 0;
        self.scan(channels, |cluster| {
            map.push(key, cluster);
            added += 1;
        });
        added
    }
}
