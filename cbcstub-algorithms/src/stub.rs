//! Offline stub finding from layer clusters.

use crate::record::record;
use cbcstub_core::channel::{Column, DetectorKey, Layer};
use cbcstub_core::cluster::{Cluster, ClusterMap};
use cbcstub_core::metrics::{stub_metric, MetricsSink};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-event stub finding outcome for one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum StubEfficiency {
    /// At least one layer has no cluster; the event does not count.
    #[default]
    NoData,
    /// Both layers have clusters but none are in coincidence.
    NoStub,
    /// At least one coincidence was found.
    StubFound,
}

impl StubEfficiency {
    /// Value filled into the efficiency histogram, if the event counts.
    #[must_use]
    pub fn indicator(self) -> Option<f64> {
        match self {
            StubEfficiency::NoData => None,
            StubEfficiency::NoStub => Some(0.0),
            StubEfficiency::StubFound => Some(1.0),
        }
    }
}

/// Result of [`StubFinder::find`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StubResult {
    /// Number of `(det0, det1)` cluster pairs within the window.
    pub n_stubs: u32,
    /// Absolute difference of the per-layer cluster counts.
    pub cluster_diff: usize,
    /// Efficiency classification of the event.
    pub efficiency: StubEfficiency,
}

/// Counts `det0`/`det1` cluster coincidences within a window.
///
/// Every qualifying pair counts, so one cluster may take part in several
/// stubs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StubFinder {
    window: u32,
}

impl StubFinder {
    /// Creates a finder accepting `|x0 - x1| <= window`.
    #[must_use]
    pub fn new(window: u32) -> Self {
        Self { window }
    }

    /// Configured window in strips.
    #[must_use]
    pub fn window(&self) -> u32 {
        self.window
    }

    /// Number of cluster pairs within the window.
    #[must_use]
    pub fn count(&self, det0: &[Cluster], det1: &[Cluster]) -> u32 {
        let window = f64::from(self.window);
        let mut n_stubs = 0;
        for seed in det0 {
            n_stubs += det1
                .iter()
                .filter(|partner| (seed.position - partner.position).abs() <= window)
                .count();
        }
        u32::try_from(n_stubs).unwrap_or(u32::MAX)
    }

    /// Stub finding for `column` of `clusters`.
    #[must_use]
    pub fn find(&self, clusters: &ClusterMap, column: Column) -> StubResult {
        let det0 = clusters.get(DetectorKey::new(Layer::Det0, column));
        let det1 = clusters.get(DetectorKey::new(Layer::Det1, column));
        let n_stubs = self.count(det0, det1);

        let efficiency = if det0.is_empty() || det1.is_empty() {
            StubEfficiency::NoData
        } else if n_stubs > 0 {
            StubEfficiency::StubFound
        } else {
            StubEfficiency::NoStub
        };

        StubResult {
            n_stubs,
            cluster_diff: det0.len().abs_diff(det1.len()),
            efficiency,
        }
    }

    /// Like [`StubFinder::find`], also filling `nclusterdiff`, `nstub` and
    /// `stubEff` for the column.
    pub fn find_and_record<S: MetricsSink + ?Sized>(
        &self,
        clusters: &ClusterMap,
        column: Column,
        sink: &mut S,
    ) -> StubResult {
        let result = self.find(clusters, column);
        let col = Some(column);

        #[allow(clippy::cast_precision_loss)]
        let cluster_diff = result.cluster_diff as f64;
        record(sink, &stub_metric("nclusterdiff", col), cluster_diff);
        record(sink, &stub_metric("nstub", col), f64::from(result.n_stubs));
        if let Some(indicator) = result.efficiency.indicator() {
            record(sink, &stub_metric("stubEff", col), indicator);
        }
        result
    }
}
