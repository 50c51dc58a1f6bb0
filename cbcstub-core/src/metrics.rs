//! Metrics sink and in-memory fixed-bin histograms.
//!
//! The analysis fills histograms by name only. Histograms must be booked
//! before they are filled; filling an unknown name is reported as
//! [`Error::MissingNamedMetric`] and leaves the sink untouched.

use crate::channel::{Column, Layer};
use crate::error::{Error, Result};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Directory holding the stub histograms.
pub const STUB_DIR: &str = "StubInfo";

/// Directory holding the telescope histograms.
pub const TELESCOPE_DIR: &str = "Telescope";

/// Capability to record values into named metrics.
pub trait MetricsSink {
    /// Records `value` into the 1-D metric `name`.
    ///
    /// # Errors
    /// Returns [`Error::MissingNamedMetric`] if `name` is not booked.
    fn record(&mut self, name: &str, value: f64) -> Result<()>;

    /// Records the pair `(x, y)` into the 2-D metric `name`.
    ///
    /// # Errors
    /// Returns [`Error::MissingNamedMetric`] if `name` is not booked.
    fn record_2d(&mut self, name: &str, x: f64, y: f64) -> Result<()>;
}

/// Name of a per-layer histogram, e.g. `det0/nclusterC1`.
#[must_use]
pub fn layer_metric(layer: Layer, base: &str, column: Option<Column>) -> String {
    match column {
        Some(column) => format!("{layer}/{base}{column}"),
        None => format!("{layer}/{base}"),
    }
}

/// Name of a stub histogram, e.g. `StubInfo/nstubC0`.
#[must_use]
pub fn stub_metric(base: &str, column: Option<Column>) -> String {
    match column {
        Some(column) => format!("{STUB_DIR}/{base}{column}"),
        None => format!("{STUB_DIR}/{base}"),
    }
}

/// Name of a telescope histogram.
#[must_use]
pub fn telescope_metric(base: &str) -> String {
    format!("{TELESCOPE_DIR}/{base}")
}

/// Uniform binning over `[low, high)`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Axis {
    /// Number of bins.
    pub bins: usize,
    /// Lower edge of the first bin.
    pub low: f64,
    /// Upper edge of the last bin.
    pub high: f64,
}

impl Axis {
    /// Creates an axis.
    #[must_use]
    pub fn new(bins: usize, low: f64, high: f64) -> Self {
        Self { bins, low, high }
    }

    /// Width of one bin.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_width(&self) -> f64 {
        if self.bins == 0 {
            0.0
        } else {
            (self.high - self.low) / self.bins as f64
        }
    }

    /// Lower edge of bin `index`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn bin_low(&self, index: usize) -> f64 {
        self.low + self.bin_width() * index as f64
    }

    /// Bin containing `value`: `Ok(index)`, or `Err(false)` for underflow
    /// and `Err(true)` for overflow.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn locate(&self, value: f64) -> std::result::Result<usize, bool> {
        if value.is_nan() || value < self.low {
            return Err(false);
        }
        if value >= self.high || self.bins == 0 {
            return Err(true);
        }
        let bin = ((value - self.low) / self.bin_width()) as usize;
        Ok(bin.min(self.bins - 1))
    }
}

/// Fixed-bin 1-D histogram with under/overflow.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Histogram1D {
    axis: Axis,
    contents: Vec<u64>,
    underflow: u64,
    overflow: u64,
    entries: u64,
    sum: f64,
}

impl Histogram1D {
    /// Creates an empty histogram.
    #[must_use]
    pub fn new(axis: Axis) -> Self {
        Self {
            axis,
            contents: vec![0; axis.bins],
            underflow: 0,
            overflow: 0,
            entries: 0,
            sum: 0.0,
        }
    }

    /// Adds one entry.
    pub fn fill(&mut self, value: f64) {
        match self.axis.locate(value) {
            Ok(bin) => self.contents[bin] += 1,
            Err(false) => self.underflow += 1,
            Err(true) => self.overflow += 1,
        }
        self.entries += 1;
        if value.is_finite() {
            self.sum += value;
        }
    }

    /// Binning of the histogram.
    #[must_use]
    pub fn axis(&self) -> Axis {
        self.axis
    }

    /// In-range bin contents.
    #[must_use]
    pub fn contents(&self) -> &[u64] {
        &self.contents
    }

    /// Entries below the axis.
    #[must_use]
    pub fn underflow(&self) -> u64 {
        self.underflow
    }

    /// Entries at or above the upper edge.
    #[must_use]
    pub fn overflow(&self) -> u64 {
        self.overflow
    }

    /// Total number of fills, including under/overflow.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }

    /// Mean of all filled values, or `None` if empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(&self) -> Option<f64> {
        (self.entries > 0).then(|| self.sum / self.entries as f64)
    }
}

/// Fixed-bin 2-D histogram. Out-of-range pairs are counted but not binned.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Histogram2D {
    x_axis: Axis,
    y_axis: Axis,
    /// Row-major: `contents[y * x_bins + x]`.
    contents: Vec<u64>,
    out_of_range: u64,
    entries: u64,
}

impl Histogram2D {
    /// Creates an empty histogram.
    #[must_use]
    pub fn new(x_axis: Axis, y_axis: Axis) -> Self {
        Self {
            x_axis,
            y_axis,
            contents: vec![0; x_axis.bins * y_axis.bins],
            out_of_range: 0,
            entries: 0,
        }
    }

    /// Adds one entry.
    pub fn fill(&mut self, x: f64, y: f64) {
        match (self.x_axis.locate(x), self.y_axis.locate(y)) {
            (Ok(ix), Ok(iy)) => self.contents[iy * self.x_axis.bins + ix] += 1,
            _ => self.out_of_range += 1,
        }
        self.entries += 1;
    }

    /// Content of bin `(ix, iy)`.
    #[must_use]
    pub fn bin(&self, ix: usize, iy: usize) -> u64 {
        if ix >= self.x_axis.bins || iy >= self.y_axis.bins {
            return 0;
        }
        self.contents[iy * self.x_axis.bins + ix]
    }

    /// X binning.
    #[must_use]
    pub fn x_axis(&self) -> Axis {
        self.x_axis
    }

    /// Y binning.
    #[must_use]
    pub fn y_axis(&self) -> Axis {
        self.y_axis
    }

    /// Entries outside either axis.
    #[must_use]
    pub fn out_of_range(&self) -> u64 {
        self.out_of_range
    }

    /// Total number of fills.
    #[must_use]
    pub fn entries(&self) -> u64 {
        self.entries
    }
}

/// In-memory store of booked histograms.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramSink {
    hist1d: BTreeMap<String, Histogram1D>,
    hist2d: BTreeMap<String, Histogram2D>,
}

impl HistogramSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Books a 1-D histogram, replacing any previous one of that name.
    pub fn book_1d(&mut self, name: impl Into<String>, axis: Axis) {
        self.hist1d.insert(name.into(), Histogram1D::new(axis));
    }

    /// Books a 2-D histogram, replacing any previous one of that name.
    pub fn book_2d(&mut self, name: impl Into<String>, x_axis: Axis, y_axis: Axis) {
        self.hist2d
            .insert(name.into(), Histogram2D::new(x_axis, y_axis));
    }

    /// Looks up a 1-D histogram.
    #[must_use]
    pub fn get_1d(&self, name: &str) -> Option<&Histogram1D> {
        self.hist1d.get(name)
    }

    /// Looks up a 2-D histogram.
    #[must_use]
    pub fn get_2d(&self, name: &str) -> Option<&Histogram2D> {
        self.hist2d.get(name)
    }

    /// Iterates 1-D histograms by name.
    pub fn iter_1d(&self) -> impl Iterator<Item = (&str, &Histogram1D)> {
        self.hist1d.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterates 2-D histograms by name.
    pub fn iter_2d(&self) -> impl Iterator<Item = (&str, &Histogram2D)> {
        self.hist2d.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of booked histograms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hist1d.len() + self.hist2d.len()
    }

    /// Returns true if nothing is booked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hist1d.is_empty() && self.hist2d.is_empty()
    }
}

impl MetricsSink for HistogramSink {
    fn record(&mut self, name: &str, value: f64) -> Result<()> {
        let hist = self
            .hist1d
            .get_mut(name)
            .ok_or_else(|| Error::MissingNamedMetric(name.to_string()))?;
        hist.fill(value);
        Ok(())
    }

    fn record_2d(&mut self, name: &str, x: f64, y: f64) -> Result<()> {
        let hist = self
            .hist2d
            .get_mut(name)
            .ok_or_else(|| Error::MissingNamedMetric(name.to_string()))?;
        hist.fill(x, y);
        Ok(())
    }
}

/// Books every histogram filled by the event analysis.
pub fn book_default_histograms(sink: &mut HistogramSink) {
    let column_span = f64::from(crate::channel::COLUMN_BOUNDARY);
    let column_bins = usize::from(crate::channel::COLUMN_BOUNDARY);

    for layer in Layer::ALL {
        sink.book_2d(
            layer_metric(layer, "hitmap", None),
            Axis::new(column_bins, 0.0, column_span),
            Axis::new(2, 0.0, 2.0),
        );
        for column in Column::ALL {
            let col = Some(column);
            sink.book_1d(layer_metric(layer, "ncluster", col), Axis::new(50, 0.0, 50.0));
            sink.book_1d(layer_metric(layer, "clusterWidth", col), Axis::new(20, 0.0, 20.0));
            sink.book_1d(
                layer_metric(layer, "clusterPos", col),
                Axis::new(column_bins, 0.0, column_span),
            );
        }
    }

    for column in Column::ALL {
        let col = Some(column);
        sink.book_1d(stub_metric("nclusterdiff", col), Axis::new(20, 0.0, 20.0));
        sink.book_1d(stub_metric("nstub", col), Axis::new(50, 0.0, 50.0));
        sink.book_1d(stub_metric("stubEff", col), Axis::new(2, 0.0, 2.0));
        sink.book_1d(stub_metric("nrecoStub", col), Axis::new(50, 0.0, 50.0));
    }
    sink.book_1d(stub_metric("nstubRecoWord", None), Axis::new(17, 0.0, 17.0));
    sink.book_1d(stub_metric("nstubCbcWord", None), Axis::new(17, 0.0, 17.0));
    sink.book_1d(stub_metric("stubWordMismatch", None), Axis::new(2, 0.0, 2.0));
    sink.book_1d(telescope_metric("ntracks"), Axis::new(20, 0.0, 20.0));
}
