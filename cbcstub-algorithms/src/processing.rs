//! Per-event analysis driver.
//!
//! Every event goes through the same cycle:
//! 1. [`EventProcessor::clear_event`] resets all per-event state
//! 2. [`EventProcessor::populate`] remaps the event (masking, column split),
//!    decodes the stub words and extrapolates telescope tracks
//! 3. [`EventProcessor::analyse`] clusters, finds stubs and fills metrics

use crate::clustering::ClusterFinder;
use crate::record::{record, record_2d};
use crate::remap::{ChannelRemapper, PerColumn};
use crate::stub::{StubEfficiency, StubFinder, StubResult};
use crate::stub_word::StubWordDecoder;
use crate::track::{ExtrapolatedTracks, TrackExtrapolator};
use cbcstub_core::channel::{Column, DetectorKey, Layer};
use cbcstub_core::cluster::ClusterMap;
use cbcstub_core::config::{AnalysisConfig, DEFAULT_STUB_WINDOW};
use cbcstub_core::error::Result;
use cbcstub_core::event::{DetectorEvent, EventSource, RecoCluster, RecoStub};
use cbcstub_core::mask::MaskMap;
use cbcstub_core::metrics::{layer_metric, stub_metric, telescope_metric, MetricsSink};
use log::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Per-event working state.
#[derive(Debug, Clone, Default)]
pub struct EventState {
    channels: [PerColumn<Vec<u16>>; 2],
    clusters: ClusterMap,
    reco_clusters: [PerColumn<Vec<RecoCluster>>; 2],
    reco_stubs: PerColumn<Vec<RecoStub>>,
    reco_word: StubWordDecoder,
    cbc_word: StubWordDecoder,
    tracks: ExtrapolatedTracks,
    stub_window: u32,
}

impl EventState {
    /// Resets every per-event container.
    pub fn clear(&mut self) {
        for layer in &mut self.channels {
            layer.clear();
        }
        self.clusters.clear();
        for layer in &mut self.reco_clusters {
            layer.clear();
        }
        self.reco_stubs.clear();
        self.reco_word.clear();
        self.cbc_word.clear();
        self.tracks.clear();
        self.stub_window = 0;
    }

    /// Returns true if no per-event container holds data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.iter().all(|c| c.total_len() == 0)
            && self.clusters.is_empty()
            && self.reco_clusters.iter().all(|c| c.total_len() == 0)
            && self.reco_stubs.total_len() == 0
            && self.reco_word.total() == 0
            && self.cbc_word.total() == 0
            && self.tracks.is_empty()
    }

    /// Column-local unmasked channels.
    #[must_use]
    pub fn channels(&self, key: DetectorKey) -> &[u16] {
        &self.channels[key.layer.index()][key.column]
    }

    /// Offline clusters of the event.
    #[must_use]
    pub fn clusters(&self) -> &ClusterMap {
        &self.clusters
    }

    /// Column-local unmasked upstream clusters.
    #[must_use]
    pub fn reco_clusters(&self, key: DetectorKey) -> &[RecoCluster] {
        &self.reco_clusters[key.layer.index()][key.column]
    }

    /// Unmasked upstream stubs of `column`.
    #[must_use]
    pub fn reco_stubs(&self, column: Column) -> &[RecoStub] {
        &self.reco_stubs[column]
    }

    /// Decoder of the stub word rebuilt from reconstructed stubs.
    #[must_use]
    pub fn reco_word(&self) -> &StubWordDecoder {
        &self.reco_word
    }

    /// Decoder of the stub word sent by the chips.
    #[must_use]
    pub fn cbc_word(&self) -> &StubWordDecoder {
        &self.cbc_word
    }

    /// De-duplicated telescope tracks at the module layers.
    #[must_use]
    pub fn tracks(&self) -> &ExtrapolatedTracks {
        &self.tracks
    }

    /// Stub window resolved for the event.
    #[must_use]
    pub fn stub_window(&self) -> u32 {
        self.stub_window
    }
}

/// Outcome of one analysed event.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventSummary {
    /// Event number.
    pub event: u64,
    /// Stub window used.
    pub stub_window: u32,
    /// Offline stub finding per column.
    pub stubs: PerColumn<StubResult>,
    /// Stubs decoded from the reconstructed stub word.
    pub n_stubs_reco_word: u32,
    /// Stubs decoded from the chip stub word.
    pub n_stubs_cbc_word: u32,
    /// Accepted telescope tracks.
    pub n_tracks: usize,
}

/// Efficiency numerator and denominator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EfficiencyCount {
    /// Events with a stub.
    pub found: u64,
    /// Events with clusters in both layers.
    pub total: u64,
}

impl EfficiencyCount {
    /// `found / total`, or `None` without qualifying events.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ratio(&self) -> Option<f64> {
        (self.total > 0).then(|| self.found as f64 / self.total as f64)
    }

    fn add(&mut self, efficiency: StubEfficiency) {
        match efficiency {
            StubEfficiency::NoData => {}
            StubEfficiency::NoStub => self.total += 1,
            StubEfficiency::StubFound => {
                self.found += 1;
                self.total += 1;
            }
        }
    }
}

/// Totals over a processing run.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RunSummary {
    /// Events delivered by the source.
    pub events_read: u64,
    /// Events analysed.
    pub events_processed: u64,
    /// Events skipped (bad flag or invalid content).
    pub events_skipped: u64,
    /// Offline stubs per column.
    pub stubs: PerColumn<u64>,
    /// Stub-finding efficiency per column.
    pub efficiency: PerColumn<EfficiencyCount>,
}

impl RunSummary {
    /// Adds the totals of `other`, e.g. from a further input file.
    pub fn merge(&mut self, other: &RunSummary) {
        self.events_read += other.events_read;
        self.events_processed += other.events_processed;
        self.events_skipped += other.events_skipped;
        for column in Column::ALL {
            self.stubs[column] += other.stubs[column];
            self.efficiency[column].found += other.efficiency[column].found;
            self.efficiency[column].total += other.efficiency[column].total;
        }
    }

    fn add(&mut self, summary: &EventSummary) {
        self.events_processed += 1;
        for column in Column::ALL {
            let result = summary.stubs[column];
            self.stubs[column] += u64::from(result.n_stubs);
            self.efficiency[column].add(result.efficiency);
        }
    }
}

/// Runs the per-event analysis.
#[derive(Debug, Clone)]
pub struct EventProcessor<'m> {
    config: AnalysisConfig,
    remapper: ChannelRemapper<'m>,
    finder: ClusterFinder,
    extrapolator: TrackExtrapolator,
    state: EventState,
}

impl<'m> EventProcessor<'m> {
    /// Creates a processor. `mask` is applied only if the configuration
    /// enables channel masking.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn new(config: AnalysisConfig, mask: &'m MaskMap) -> Result<Self> {
        config.validate()?;
        let remapper = if config.channel_masking {
            if mask.is_empty() {
                warn!("channel masking enabled with an empty mask");
            }
            ChannelRemapper::masked(mask)
        } else {
            ChannelRemapper::unmasked()
        };
        Ok(Self {
            extrapolator: TrackExtrapolator::new(config.telescope),
            config,
            remapper,
            finder: ClusterFinder::new(),
            state: EventState::default(),
        })
    }

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Current per-event state.
    #[must_use]
    pub fn state(&self) -> &EventState {
        &self.state
    }

    /// Resets all per-event state.
    pub fn clear_event(&mut self) {
        self.state.clear();
    }

    /// Stub window for `event`: the configured one, else the CBC register
    /// value, else [`DEFAULT_STUB_WINDOW`].
    #[must_use]
    pub fn stub_window_for(&self, event: &DetectorEvent) -> u32 {
        self.config
            .stub_window
            .or_else(|| event.condition.map(|words| words.decode().stub_window))
            .unwrap_or(DEFAULT_STUB_WINDOW)
    }

    /// Fills the per-event state from `event`.
    ///
    /// Call [`EventProcessor::clear_event`] first; populating twice without
    /// clearing accumulates both events.
    ///
    /// # Errors
    /// Returns an error if the event holds out-of-range channels; the state
    /// is left untouched in that case.
    pub fn populate(&mut self, event: &DetectorEvent) -> Result<()> {
        event.validate()?;

        let stub_window = self.stub_window_for(event);
        let state = &mut self.state;
        for layer in Layer::ALL {
            let readout = event.layer(layer);
            self.remapper.split_channels_into(
                layer,
                &readout.channels,
                &mut state.channels[layer.index()],
            );
            self.remapper.split_clusters_into(
                layer,
                &readout.clusters,
                &mut state.reco_clusters[layer.index()],
            );
        }
        self.remapper
            .split_stubs_into(&event.stubs, &mut state.reco_stubs);

        state.reco_word.decode(event.stub_word_reco);
        state.cbc_word.decode(event.stub_word);
        self.extrapolator
            .extrapolate_into(&event.tracks, &mut state.tracks);
        state.stub_window = stub_window;
        Ok(())
    }

    /// Clusters the populated channels, finds stubs and fills `sink`.
    ///
    /// Offline clusters are rebuilt on every call.
    pub fn analyse<S: MetricsSink + ?Sized>(&mut self, event: u64, sink: &mut S) -> EventSummary {
        let state = &mut self.state;

        state.clusters.clear();
        for key in DetectorKey::ALL {
            let channels = &state.channels[key.layer.index()][key.column];
            self.finder.find_into(key, channels, &mut state.clusters);
        }

        fill_layer_histograms(state, sink);

        let finder = StubFinder::new(state.stub_window);
        let mut stubs = PerColumn::<StubResult>::default();
        for column in Column::ALL {
            stubs[column] = finder.find_and_record(&state.clusters, column, sink);
            #[allow(clippy::cast_precision_loss)]
            let n_reco = state.reco_stubs[column].len() as f64;
            record(sink, &stub_metric("nrecoStub", Some(column)), n_reco);
        }

        let n_stubs_reco_word = state.reco_word.total();
        let n_stubs_cbc_word = state.cbc_word.total();
        record(sink, &stub_metric("nstubRecoWord", None), f64::from(n_stubs_reco_word));
        record(sink, &stub_metric("nstubCbcWord", None), f64::from(n_stubs_cbc_word));
        let mismatch = if n_stubs_reco_word == n_stubs_cbc_word {
            0.0
        } else {
            1.0
        };
        record(sink, &stub_metric("stubWordMismatch", None), mismatch);

        let n_tracks = state.tracks.len();
        #[allow(clippy::cast_precision_loss)]
        let n_tracks_value = n_tracks as f64;
        record(sink, &telescope_metric("ntracks"), n_tracks_value);

        debug!(
            "event {event}: stubs C0={} C1={} (window {}), word stubs reco={} cbc={}",
            stubs.c0.n_stubs, stubs.c1.n_stubs, state.stub_window, n_stubs_reco_word, n_stubs_cbc_word
        );

        EventSummary {
            event,
            stub_window: state.stub_window,
            stubs,
            n_stubs_reco_word,
            n_stubs_cbc_word,
            n_tracks,
        }
    }

    /// Clears, populates and analyses one event.
    ///
    /// # Errors
    /// Returns an error if the event content is invalid.
    pub fn process_event<S: MetricsSink + ?Sized>(
        &mut self,
        event: &DetectorEvent,
        sink: &mut S,
    ) -> Result<EventSummary> {
        self.clear_event();
        self.populate(event)?;
        Ok(self.analyse(event.event, sink))
    }

    /// Processes every event of `source`.
    ///
    /// Invalid events and, if configured, bad events are skipped and
    /// counted; the run stops at the first source error.
    ///
    /// # Errors
    /// Returns the source error that ended the run.
    pub fn run<E: EventSource, S: MetricsSink + ?Sized>(
        &mut self,
        source: &mut E,
        sink: &mut S,
    ) -> std::result::Result<RunSummary, E::Error> {
        let mut summary = RunSummary::default();

        while let Some(event) = source.next_event() {
            let event = event?;
            summary.events_read += 1;

            if self.config.skip_bad_events && !event.good {
                debug!("event {}: good-event flag not set, skipped", event.event);
                summary.events_skipped += 1;
                continue;
            }

            match self.process_event(&event, sink) {
                Ok(event_summary) => summary.add(&event_summary),
                Err(err) => {
                    warn!("event {}: {err}, skipped", event.event);
                    summary.events_skipped += 1;
                }
            }
        }
        self.clear_event();

        Ok(summary)
    }
}

/// Hit map and cluster histograms for both layers.
fn fill_layer_histograms<S: MetricsSink + ?Sized>(state: &EventState, sink: &mut S) {
    for layer in Layer::ALL {
        let hitmap = layer_metric(layer, "hitmap", None);
        for column in Column::ALL {
            let key = DetectorKey::new(layer, column);
            #[allow(clippy::cast_precision_loss)]
            let column_index = column.index() as f64;
            for &channel in state.channels(key) {
                record_2d(sink, &hitmap, f64::from(channel), column_index);
            }

            let clusters = state.clusters.get(key);
            let col = Some(column);
            #[allow(clippy::cast_precision_loss)]
            let n_clusters = clusters.len() as f64;
            record(sink, &layer_metric(layer, "ncluster", col), n_clusters);
            let width_name = layer_metric(layer, "clusterWidth", col);
            let position_name = layer_metric(layer, "clusterPos", col);
            for cluster in clusters {
                record(sink, &width_name, f64::from(cluster.width));
                record(sink, &position_name, cluster.position);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cbcstub_core::event::{ConditionWords, TelescopeTracks};
    use cbcstub_core::metrics::{book_default_histograms, HistogramSink};
    use cbcstub_core::MemoryEventSource;

    fn sample_event() -> DetectorEvent {
        let mut event = DetectorEvent {
            event: 7,
            good: true,
            stub_word_reco: 0b11,
            stub_word: 0b01,
            tracks: TelescopeTracks {
                dxdz: vec![0.0, 0.0],
                x_pos: vec![1.0, 1.0],
            },
            ..DetectorEvent::default()
        };
        event.det0.channels = vec![5, 6, 7, 10, 11, 1020];
        event.det1.channels = vec![6, 1021, 1022];
        event.stubs = vec![RecoStub { x: 6, bend: 0 }];
        event
    }

    fn processor(mask: &MaskMap) -> EventProcessor<'_> {
        EventProcessor::new(AnalysisConfig::new().with_stub_window(1), mask).unwrap()
    }

    #[test]
    fn test_process_event() {
        let mask = MaskMap::empty();
        let mut processor = processor(&mask);
        let mut sink = HistogramSink::new();
        book_default_histograms(&mut sink);

        let summary = processor.process_event(&sample_event(), &mut sink).unwrap();

        // det0 C0 clusters at 6 and 10.5, det1 C0 at 6
        assert_eq!(summary.stubs.c0.n_stubs, 1);
        assert_eq!(summary.stubs.c0.efficiency, StubEfficiency::StubFound);
        // det0 C1 cluster at 4, det1 C1 at 5.5
        assert_eq!(summary.stubs.c1.n_stubs, 0);
        assert_eq!(summary.stubs.c1.efficiency, StubEfficiency::NoStub);
        assert_eq!(summary.n_stubs_reco_word, 2);
        assert_eq!(summary.n_stubs_cbc_word, 1);
        assert_eq!(summary.n_tracks, 1);

        let key = DetectorKey::new(Layer::Det0, Column::C1);
        assert_eq!(processor.state().channels(key), &[4]);
        assert_eq!(sink.get_1d("StubInfo/stubWordMismatch").unwrap().contents(), &[0, 1]);
        assert_eq!(sink.get_2d("det0/hitmap").unwrap().entries(), 6);
    }

    #[test]
    fn test_clear_then_populate_is_deterministic() {
        let mask = MaskMap::empty();
        let mut processor = processor(&mask);
        let mut sink = HistogramSink::new();

        processor.process_event(&sample_event(), &mut sink).unwrap();
        let first_clusters = processor.state().clusters().clone();

        processor.clear_event();
        assert!(processor.state().is_empty());

        processor.process_event(&sample_event(), &mut sink).unwrap();
        assert_eq!(processor.state().clusters(), &first_clusters);
        assert_eq!(processor.state().reco_word().total(), 2);
    }

    #[test]
    fn test_repeated_analyse_rebuilds_clusters() {
        let mask = MaskMap::empty();
        let mut processor = processor(&mask);
        let mut sink = HistogramSink::new();

        processor.clear_event();
        processor.populate(&sample_event()).unwrap();
        let first = processor.analyse(7, &mut sink);
        let n_clusters = processor.state().clusters().len();
        let second = processor.analyse(7, &mut sink);

        assert_eq!(first.stubs.c0.n_stubs, 1);
        assert_eq!(second, first);
        assert_eq!(processor.state().clusters().len(), n_clusters);
    }

    #[test]
    fn test_masking_applied_before_clustering() {
        // chip 0 channel 12 masks det1 strips 4..=8
        let mask = MaskMap::parse("0:12");
        let config = AnalysisConfig::new()
            .with_stub_window(1)
            .with_channel_masking(true);
        let mut processor = EventProcessor::new(config, &mask).unwrap();
        let mut sink = HistogramSink::new();

        let summary = processor.process_event(&sample_event(), &mut sink).unwrap();
        let det1_c0 = DetectorKey::new(Layer::Det1, Column::C0);
        assert!(processor.state().channels(det1_c0).is_empty());
        assert!(processor.state().reco_stubs(Column::C0).is_empty());
        assert_eq!(summary.stubs.c0.efficiency, StubEfficiency::NoData);
    }

    #[test]
    fn test_mask_ignored_when_disabled() {
        let mask = MaskMap::parse("0:12");
        let mut processor = processor(&mask);
        let mut sink = HistogramSink::new();
        processor.process_event(&sample_event(), &mut sink).unwrap();
        let det1_c0 = DetectorKey::new(Layer::Det1, Column::C0);
        assert_eq!(processor.state().channels(det1_c0), &[6]);
    }

    #[test]
    fn test_stub_window_resolution() {
        let mask = MaskMap::empty();
        let mut event = DetectorEvent::default();
        let auto = EventProcessor::new(AnalysisConfig::new(), &mask).unwrap();
        assert_eq!(auto.stub_window_for(&event), DEFAULT_STUB_WINDOW);

        event.condition = Some(ConditionWords {
            cwd_word: 0,
            window_word: 7 << 4,
        });
        assert_eq!(auto.stub_window_for(&event), 7);

        let fixed = processor(&mask);
        assert_eq!(fixed.stub_window_for(&event), 1);
    }

    #[test]
    fn test_invalid_event_leaves_state_clear() {
        let mask = MaskMap::empty();
        let mut processor = processor(&mask);
        let mut sink = HistogramSink::new();
        let mut event = sample_event();
        event.det1.channels.push(4000);

        assert!(processor.process_event(&event, &mut sink).is_err());
        assert!(processor.state().is_empty());
    }

    #[test]
    fn test_run_summary() {
        let mask = MaskMap::empty();
        let config = AnalysisConfig::new()
            .with_stub_window(1)
            .with_skip_bad_events(true);
        let mut processor = EventProcessor::new(config, &mask).unwrap();
        let mut sink = HistogramSink::new();
        book_default_histograms(&mut sink);

        let mut bad = sample_event();
        bad.good = false;
        let mut invalid = sample_event();
        invalid.det0.channels = vec![2032];
        let mut source =
            MemoryEventSource::new(vec![sample_event(), bad, invalid, sample_event()]);

        let summary = processor.run(&mut source, &mut sink).unwrap();
        assert_eq!(summary.events_read, 4);
        assert_eq!(summary.events_processed, 2);
        assert_eq!(summary.events_skipped, 2);
        assert_eq!(summary.stubs.c0, 2);
        assert_eq!(summary.efficiency.c0, EfficiencyCount { found: 2, total: 2 });
        assert_eq!(summary.efficiency.c1.ratio(), Some(0.0));
        assert!(processor.state().is_empty());
        assert_eq!(sink.get_1d("StubInfo/nstubC0").unwrap().entries(), 2);

        let mut merged = summary.clone();
        merged.merge(&summary);
        assert_eq!(merged.events_read, 8);
        assert_eq!(merged.efficiency.c0, EfficiencyCount { found: 4, total: 4 });
    }
}
