//! Histogram file writers.

use crate::{Error, Result};
use cbcstub_core::metrics::HistogramSink;
use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Histogram output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON of the whole sink.
    Json,
    /// Flat `name,bin_low,bin_high,content` rows.
    Csv,
}

impl OutputFormat {
    /// Format implied by the extension of `path`.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedFormat`] for anything but `.json`/`.csv`.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            Some(ext) if ext.eq_ignore_ascii_case("csv") => Ok(Self::Csv),
            _ => Err(Error::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Writer for filled histograms.
///
/// In CSV, 2-D histograms are written one row per x bin and y bin, named
/// `{name}[{iy}]` with the x bin edges.
pub struct HistogramWriter {
    writer: BufWriter<File>,
}

impl HistogramWriter {
    /// Creates a new file writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self { writer })
    }

    /// Writes `sink` in `format`.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write(&mut self, sink: &HistogramSink, format: OutputFormat) -> Result<()> {
        match format {
            OutputFormat::Json => self.write_json(sink),
            OutputFormat::Csv => self.write_csv(sink),
        }
    }

    /// Writes the sink as pretty JSON.
    ///
    /// # Errors
    /// Returns an error if serialization or writing fails.
    pub fn write_json(&mut self, sink: &HistogramSink) -> Result<()> {
        serde_json::to_writer_pretty(&mut self.writer, sink)?;
        writeln!(self.writer)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Writes every in-range bin as CSV.
    ///
    /// # Errors
    /// Returns an error if writing fails.
    pub fn write_csv(&mut self, sink: &HistogramSink) -> Result<()> {
        writeln!(self.writer, "name,bin_low,bin_high,content")?;

        for (name, hist) in sink.iter_1d() {
            let axis = hist.axis();
            for (index, content) in hist.contents().iter().enumerate() {
                writeln!(
                    self.writer,
                    "{},{},{},{}",
                    name,
                    axis.bin_low(index),
                    axis.bin_low(index + 1),
                    content
                )?;
            }
        }

        for (name, hist) in sink.iter_2d() {
            let x_axis = hist.x_axis();
            for iy in 0..hist.y_axis().bins {
                for ix in 0..x_axis.bins {
                    writeln!(
                        self.writer,
                        "{}[{}],{},{},{}",
                        name,
                        iy,
                        x_axis.bin_low(ix),
                        x_axis.bin_low(ix + 1),
                        hist.bin(ix, iy)
                    )?;
                }
            }
        }

        self.writer.flush()?;
        info!("wrote {} histograms as CSV", sink.len());
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if flushing fails.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
