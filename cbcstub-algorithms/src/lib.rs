//! cbcstub-algorithms: Per-event analysis of CBC strip modules.
//!
//! This crate provides the analysis stages:
//! - **Remapping** - channel masking and the column split
//! - **Clustering** - contiguous-strip clusters per layer and column
//! - **Stub finding** - `det0`/`det1` cluster coincidences within a window
//! - **Stub words** - per-chip decoding of the CBC stub summary words
//! - **Tracks** - telescope track extrapolation onto both layers
//!
//! [`EventProcessor`] drives the stages for each event.
//!
#![warn(missing_docs)]

pub mod clustering;
pub mod processing;
mod record;
pub mod remap;
pub mod stub;
pub mod stub_word;
pub mod track;

pub use clustering::ClusterFinder;
pub use processing::{EfficiencyCount, EventProcessor, EventState, EventSummary, RunSummary};
pub use remap::{ChannelRemapper, PerColumn};
pub use stub::{StubEfficiency, StubFinder, StubResult};
pub use stub_word::{StubWordDecoder, CHIPS_PER_MODULE};
pub use track::{ExtrapolatedTracks, TrackExtrapolator};
