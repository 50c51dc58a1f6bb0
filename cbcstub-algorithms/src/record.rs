//! Fill helpers that log and swallow metric lookup misses.

use cbcstub_core::metrics::MetricsSink;
use log::warn;

pub(crate) fn record<S: MetricsSink + ?Sized>(sink: &mut S, name: &str, value: f64) {
    if let Err(err) = sink.record(name, value) {
        warn!("fill skipped: {err}");
    }
}

pub(crate) fn record_2d<S: MetricsSink + ?Sized>(sink: &mut S, name: &str, x: f64, y: f64) {
    if let Err(err) = sink.record_2d(name, x, y) {
        warn!("fill skipped: {err}");
    }
}
