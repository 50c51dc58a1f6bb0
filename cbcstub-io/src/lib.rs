//! cbcstub-io: Event file input and histogram output for cbcstub.
//!
//! Event files are JSON lines, read through memory-mapped files via
//! memmap2. Filled histograms are written as JSON or CSV.
//!

mod error;
mod reader;
mod writer;

pub use error::{Error, Result};
pub use reader::{JsonEventSource, MappedFileReader};
pub use writer::{HistogramWriter, OutputFormat};
