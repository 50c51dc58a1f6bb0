//! Per-event detector record and the event source abstraction.

use crate::channel::{Layer, MAX_CHANNEL};
use crate::condition::CbcConfig;
use crate::error::{Error, Result};
use std::collections::VecDeque;
use std::convert::Infallible;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Cluster reconstructed upstream of the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecoCluster {
    /// Cluster position in raw layer channels.
    pub x: u16,
    /// Number of strips.
    pub width: u16,
}

/// Stub reconstructed upstream of the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RecoStub {
    /// Seed position in raw `det1` channels.
    pub x: u16,
    /// Bend between seed and correlation layer, in strips.
    #[cfg_attr(feature = "serde", serde(default))]
    pub bend: i16,
}

/// Readout of one layer in one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LayerReadout {
    /// Fired raw channels, in readout order.
    pub channels: Vec<u16>,
    /// Upstream clusters.
    pub clusters: Vec<RecoCluster>,
}

/// Telescope track parameters at the reference plane.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TelescopeTracks {
    /// Track slopes `dx/dz`.
    pub dxdz: Vec<f64>,
    /// Track x positions at the reference plane.
    pub x_pos: Vec<f64>,
}

impl TelescopeTracks {
    /// Number of complete tracks (both parameters present).
    #[must_use]
    pub fn len(&self) -> usize {
        self.dxdz.len().min(self.x_pos.len())
    }

    /// Returns true if no complete track is present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Raw CBC configuration words recorded with the run condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ConditionWords {
    /// Offset and cluster-width-discrimination register.
    pub cwd_word: u32,
    /// Stub window register.
    pub window_word: u32,
}

impl ConditionWords {
    /// Decodes the words into a [`CbcConfig`].
    #[must_use]
    pub fn decode(self) -> CbcConfig {
        CbcConfig::from_words(self.cwd_word, self.window_word)
    }
}

/// One triggered event as delivered by the event source.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectorEvent {
    /// Event number.
    pub event: u64,
    /// Readout of layer `det0`.
    pub det0: LayerReadout,
    /// Readout of layer `det1`.
    pub det1: LayerReadout,
    /// Upstream stubs.
    pub stubs: Vec<RecoStub>,
    /// Stub summary word rebuilt from reconstructed stubs.
    pub stub_word_reco: u32,
    /// Stub summary word as sent by the CBC chips.
    pub stub_word: u32,
    /// Telescope tracks.
    pub tracks: TelescopeTracks,
    /// CBC configuration registers, if recorded.
    pub condition: Option<ConditionWords>,
    /// Periodicity flag of the data acquisition.
    pub periodicity: bool,
    /// Good-event flag of the data acquisition.
    pub good: bool,
}

impl DetectorEvent {
    /// Readout of `layer`.
    #[must_use]
    pub fn layer(&self, layer: Layer) -> &LayerReadout {
        match layer {
            Layer::Det0 => &self.det0,
            Layer::Det1 => &self.det1,
        }
    }

    /// Mutable readout of `layer`.
    pub fn layer_mut(&mut self, layer: Layer) -> &mut LayerReadout {
        match layer {
            Layer::Det0 => &mut self.det0,
            Layer::Det1 => &mut self.det1,
        }
    }

    /// Checks every raw channel is inside the layer readout range.
    ///
    /// # Errors
    /// Returns [`Error::InvalidChannel`] with the first offending channel.
    pub fn validate(&self) -> Result<()> {
        for layer in Layer::ALL {
            let readout = self.layer(layer);
            let mut raw = readout
                .channels
                .iter()
                .copied()
                .chain(readout.clusters.iter().map(|c| c.x));
            if let Some(bad) = raw.find(|&ch| ch > MAX_CHANNEL) {
                return Err(Error::InvalidChannel(bad));
            }
        }
        if let Some(bad) = self.stubs.iter().map(|s| s.x).find(|&x| x > MAX_CHANNEL) {
            return Err(Error::InvalidChannel(bad));
        }
        Ok(())
    }
}

/// Source of detector events, consumed one event at a time.
pub trait EventSource {
    /// Error raised when the source cannot deliver the next event.
    type Error: std::error::Error;

    /// Returns the next event, or `None` once the source is exhausted.
    fn next_event(&mut self) -> Option<std::result::Result<DetectorEvent, Self::Error>>;
}

/// In-memory event source.
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSource {
    events: VecDeque<DetectorEvent>,
}

impl MemoryEventSource {
    /// Creates a source that yields `events` in order.
    #[must_use]
    pub fn new(events: Vec<DetectorEvent>) -> Self {
        Self {
            events: events.into(),
        }
    }

    /// Number of events not yet delivered.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl EventSource for MemoryEventSource {
    type Error = Infallible;

    fn next_event(&mut self) -> Option<std::result::Result<DetectorEvent, Infallible>> {
        self.events.pop_front().map(Ok)
    }
}

impl FromIterator<DetectorEvent> for MemoryEventSource {
    fn from_iter<I: IntoIterator<Item = DetectorEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_out_of_range_channel() {
        let mut event = DetectorEvent::default();
        event.det1.channels = vec![3, 2032];
        assert!(matches!(event.validate(), Err(Error::InvalidChannel(2032))));

        event.det1.channels = vec![3, 2031];
        assert!(event.validate().is_ok());
    }

    #[test]
    fn test_telescope_track_count() {
        let tracks = TelescopeTracks {
            dxdz: vec![0.1, 0.2, 0.3],
            x_pos: vec![1.0, 2.0],
        };
        assert_eq!(tracks.len(), 2);
        assert!(TelescopeTracks::default().is_empty());
    }

    #[test]
    fn test_memory_source_order() {
        let mut source: MemoryEventSource = (1..=3)
            .map(|event| DetectorEvent {
                event,
                ..DetectorEvent::default()
            })
            .collect();
        assert_eq!(source.remaining(), 3);
        let first = source.next_event().unwrap().unwrap();
        assert_eq!(first.event, 1);
        assert_eq!(source.remaining(), 2);
    }
}
