//! cbcstub-core: Core types for CBC strip-module beam test analysis.
//!
//! This crate provides the module geometry, cluster containers, channel
//! masks, the per-event detector record and the metrics sink abstraction
//! shared by the analysis crates.
//!

pub mod channel;
pub mod cluster;
pub mod condition;
pub mod config;
pub mod error;
pub mod event;
pub mod mask;
pub mod metrics;

pub use channel::{Column, DetectorKey, Layer, COLUMN_BOUNDARY, MAX_CHANNEL};
pub use cluster::{Cluster, ClusterMap};
pub use condition::CbcConfig;
pub use config::{AnalysisConfig, TelescopeGeometry, DEFAULT_STUB_WINDOW};
pub use error::{Error, Result};
pub use event::{
    ConditionWords, DetectorEvent, EventSource, LayerReadout, MemoryEventSource, RecoCluster,
    RecoStub, TelescopeTracks,
};
pub use mask::MaskMap;
pub use metrics::{Histogram1D, Histogram2D, HistogramSink, MetricsSink};
