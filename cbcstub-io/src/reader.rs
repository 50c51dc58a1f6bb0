//! Memory-mapped event file readers.
//!

use crate::{Error, Result};
use cbcstub_core::event::{DetectorEvent, EventSource};
use log::debug;
use memmap2::Mmap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without loading the entire file
/// into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        // This is the standard safety contract for memory mapping.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file) }
            .map_err(|err| Error::MmapError(format!("{}: {err}", path.display())))?;
        Ok(Self {
            mmap,
            path: path.to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path of the mapped file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Event source reading one JSON object per line.
///
/// Blank lines are skipped. A malformed line yields
/// [`Error::InvalidFormat`] carrying its 1-based line number; the source is
/// exhausted afterwards.
pub struct JsonEventSource {
    reader: MappedFileReader,
    offset: usize,
    line: usize,
    failed: bool,
}

impl JsonEventSource {
    /// Opens a JSON-lines event file.
    ///
    /// # Errors
    /// Returns [`cbcstub_core::Error::SourceUnavailable`] if the file cannot
    /// be opened, or an error if it cannot be memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = MappedFileReader::open(path).map_err(|err| match err {
            Error::Io(source) => Error::CoreError(cbcstub_core::Error::SourceUnavailable(
                format!("{}: {source}", path.display()),
            )),
            other => other,
        })?;
        Ok(Self::from_reader(reader))
    }

    /// Reads events from an already mapped file.
    #[must_use]
    pub fn from_reader(reader: MappedFileReader) -> Self {
        debug!(
            "reading events from {} ({} bytes)",
            reader.path().display(),
            reader.len()
        );
        Self {
            reader,
            offset: 0,
            line: 0,
            failed: false,
        }
    }

    /// Number of lines consumed so far.
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Next non-blank line, advancing the cursor.
    fn next_line(&mut self) -> Option<&[u8]> {
        let bytes = self.reader.as_bytes();
        while self.offset < bytes.len() {
            let rest = &bytes[self.offset..];
            let end = rest.iter().position(|&b| b == b'\n').unwrap_or(rest.len());
            self.offset += (end + 1).min(rest.len());
            self.line += 1;

            let text = rest[..end].trim_ascii();
            if !text.is_empty() {
                return Some(text);
            }
        }
        None
    }
}

impl EventSource for JsonEventSource {
    type Error = Error;

    fn next_event(&mut self) -> Option<Result<DetectorEvent>> {
        if self.failed {
            return None;
        }
        let text = self.next_line()?;
        let parsed = serde_json::from_slice::<DetectorEvent>(text);
        Some(parsed.map_err(|err| {
            self.failed = true;
            Error::InvalidFormat {
                line: self.line,
                message: err.to_string(),
            }
        }))
    }
}

impl Iterator for JsonEventSource {
    type Item = Result<DetectorEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn event_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_mapped_reader() {
        let file = event_file("abc\n");
        let reader = MappedFileReader::open(file.path()).unwrap();
        assert_eq!(reader.as_bytes(), b"abc\n");
        assert_eq!(reader.len(), 4);
        assert_eq!(reader.path(), file.path());
    }

    #[test]
    fn test_missing_file() {
        let result = MappedFileReader::open("/nonexistent/events.jsonl");
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_missing_event_file_is_unavailable_source() {
        let result = JsonEventSource::open("/nonexistent/events.jsonl");
        assert!(matches!(
            result,
            Err(Error::CoreError(cbcstub_core::Error::SourceUnavailable(_)))
        ));
    }

    #[test]
    fn test_reads_events_and_skips_blank_lines() {
        let file = event_file(
            "{\"event\": 1, \"det0\": {\"channels\": [3, 4]}}\n\
             \n   \n\
             {\"event\": 2, \"good\": true, \"stub_word\": 5}\r\n\
             {\"event\": 3}",
        );
        let events: Vec<DetectorEvent> = JsonEventSource::open(file.path())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].det0.channels, vec![3, 4]);
        assert!(events[0].det1.channels.is_empty());
        assert!(events[1].good);
        assert_eq!(events[1].stub_word, 5);
        assert_eq!(events[2].event, 3);
    }

    #[test]
    fn test_malformed_line_reports_line_number() {
        let file = event_file("{\"event\": 1}\n\n{\"event\": }\n{\"event\": 4}\n");
        let mut source = JsonEventSource::open(file.path()).unwrap();

        assert!(source.next_event().unwrap().is_ok());
        match source.next_event() {
            Some(Err(Error::InvalidFormat { line, .. })) => assert_eq!(line, 3),
            other => panic!("expected InvalidFormat, got {other:?}"),
        }
        assert!(source.next_event().is_none());
    }

    #[test]
    fn test_empty_file() {
        let file = event_file("");
        let mut source = JsonEventSource::open(file.path()).unwrap();
        assert!(source.next_event().is_none());
        assert_eq!(source.line(), 0);
    }
}
