//! Noisy-channel masks.
//!
//! The mask file lists, per CBC chip, the raw chip channels to exclude:
//!
//! ```text
//! # chipId:ch1,ch2,...
//! 3:10,11
//! 12:200
//! ```
//!
//! Each chip channel folds onto a strip position of one layer (even chip
//! channels read layer `det1`, odd ones `det0`). The strip and its two
//! neighbours on either side are masked.

use crate::channel::Layer;
use crate::error::{Error, Result};
use log::{info, warn};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Strips per CBC chip, as folded onto a layer.
pub const STRIPS_PER_CHIP: i32 = 127;

/// Masked strips on each side of a masked position.
pub const MASK_HALF_WIDTH: i32 = 2;

/// Immutable per-layer sets of masked strip positions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaskMap {
    chip_channels: BTreeMap<i32, Vec<i32>>,
    det0: BTreeSet<i32>,
    det1: BTreeSet<i32>,
}

impl MaskMap {
    /// A map that masks nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loads and unfolds a mask file.
    ///
    /// # Errors
    /// Returns [`Error::ConfigUnavailable`] if the file cannot be read.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| Error::ConfigUnavailable {
            path: path.to_path_buf(),
            source,
        })?;
        let map = Self::parse(&text);
        info!(
            "loaded channel masks from {}: {} chips, det0={} det1={} strips",
            path.display(),
            map.chip_channels.len(),
            map.det0.len(),
            map.det1.len()
        );
        Ok(map)
    }

    /// Loads a mask file, degrading to an empty mask if it is unavailable.
    #[must_use]
    pub fn load_or_empty<P: AsRef<Path>>(path: P) -> Self {
        match Self::load(path) {
            Ok(map) => map,
            Err(err) => {
                warn!("{err}; channel masking disabled");
                Self::empty()
            }
        }
    }

    /// Parses mask file text.
    ///
    /// Numeric fields are read leniently: leading digits are used and a
    /// field without any yields 0. Such fields are reported with `warn!`.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut chip_channels: BTreeMap<i32, Vec<i32>> = BTreeMap::new();

        for (lineno, line) in text.lines().enumerate() {
            let lineno = lineno + 1;
            if line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            if line.trim().is_empty() {
                continue;
            }
            let Some((chip_field, channel_list)) = line.split_once(':') else {
                warn!("mask line {lineno}: missing ':' separator, skipped");
                continue;
            };
            let chip_id = checked_int(chip_field, lineno);
            let channels = chip_channels.entry(chip_id).or_default();
            channels.extend(
                channel_list
                    .split(',')
                    .filter(|field| !field.is_empty())
                    .map(|field| checked_int(field, lineno)),
            );
        }

        Self::from_chip_channels(chip_channels)
    }

    /// Unfolds a chip-id to raw-channel table into per-layer mask sets.
    #[must_use]
    pub fn from_chip_channels(chip_channels: BTreeMap<i32, Vec<i32>>) -> Self {
        let mut det0 = BTreeSet::new();
        let mut det1 = BTreeSet::new();

        for (&chip_id, channels) in &chip_channels {
            for &channel in channels {
                let (layer, hit_pos) = fold_chip_channel(chip_id, channel);
                let target = match layer {
                    Layer::Det0 => &mut det0,
                    Layer::Det1 => &mut det1,
                };
                target.extend(hit_pos - MASK_HALF_WIDTH..=hit_pos + MASK_HALF_WIDTH);
            }
        }

        Self {
            chip_channels,
            det0,
            det1,
        }
    }

    /// Masked strip positions of `layer`.
    #[must_use]
    pub fn layer(&self, layer: Layer) -> &BTreeSet<i32> {
        match layer {
            Layer::Det0 => &self.det0,
            Layer::Det1 => &self.det1,
        }
    }

    /// Returns true if `position` is masked on `layer`.
    #[inline]
    #[must_use]
    pub fn is_masked(&self, layer: Layer, position: i32) -> bool {
        self.layer(layer).contains(&position)
    }

    /// Raw masked channels per chip, as listed in the file.
    #[must_use]
    pub fn chip_channels(&self) -> &BTreeMap<i32, Vec<i32>> {
        &self.chip_channels
    }

    /// Returns true if neither layer has masked strips.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.det0.is_empty() && self.det1.is_empty()
    }
}

/// Maps a raw CBC channel onto `(layer, strip position)`.
///
/// Chips 0-7 count strips upwards from 0; chips 8-15 are mounted rotated
/// and count downwards from [`crate::channel::CHANNELS_PER_LAYER`].
#[must_use]
pub fn fold_chip_channel(chip_id: i32, channel: i32) -> (Layer, i32) {
    let local = channel / 2;
    let hit_pos = if chip_id <= 7 {
        STRIPS_PER_CHIP * chip_id + local
    } else {
        i32::from(crate::channel::CHANNELS_PER_LAYER) - (STRIPS_PER_CHIP * chip_id + local)
    };
    let layer = if channel % 2 == 0 {
        Layer::Det1
    } else {
        Layer::Det0
    };
    (layer, hit_pos)
}

/// Integer parse with C `atoi` leniency: optional sign, leading digits,
/// anything else stops the scan.
/// Lenient integer read of a mask field, warning when it is not a clean
/// number.
fn checked_int(field: &str, lineno: usize) -> i32 {
    let (value, clean) = lenient_int(field);
    if !clean {
        warn!("mask line {lineno}: non-numeric field {field:?}, read as {value}");
    }
    value
}

/// Leading-digit integer parse; the flag is false unless the whole field
/// is a number.
fn lenient_int(field: &str) -> (i32, bool) {
    let trimmed = field.trim_start();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };
    let numeric: String = digits.chars().take_while(char::is_ascii_digit).collect();
    let clean = !numeric.is_empty() && numeric.len() == digits.trim_end().len();
    let value = numeric.parse::<i32>().unwrap_or(0);
    (if negative { -value } else { value }, clean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_even_channel_masks_det1() {
        let map = MaskMap::parse("3:10\n");
        let expected: BTreeSet<i32> = (384..=388).collect();
        assert_eq!(map.layer(Layer::Det1), &expected);
        assert!(map.layer(Layer::Det0).is_empty());
    }

    #[test]
    fn test_odd_channel_masks_det0() {
        let map = MaskMap::parse("0:3");
        // local index 1 -> hit position 1
        let expected: BTreeSet<i32> = (-1..=3).collect();
        assert_eq!(map.layer(Layer::Det0), &expected);
    }

    #[test]
    fn test_rotated_chip_folding() {
        // 2032 - (127 * 8 + 2) = 1014
        assert_eq!(fold_chip_channel(8, 4), (Layer::Det1, 1014));
        assert_eq!(fold_chip_channel(15, 1), (Layer::Det0, 127));
    }

    #[test]
    fn test_comments_and_blank_lines() {
        let text = "# header\n// note\n\n1:0,1\n";
        let map = MaskMap::parse(text);
        assert_eq!(map.chip_channels().len(), 1);
        assert_eq!(map.chip_channels()[&1], vec![0, 1]);
        assert!(map.is_masked(Layer::Det1, 127));
        assert!(map.is_masked(Layer::Det0, 127));
    }

    #[test]
    fn test_malformed_field_reads_as_zero() {
        let map = MaskMap::parse("2:abc,7x");
        assert_eq!(map.chip_channels()[&2], vec![0, 7]);
    }

    #[test]
    fn test_empty_field_is_malformed() {
        assert_eq!(lenient_int(""), (0, false));
        assert_eq!(lenient_int("  "), (0, false));
        assert_eq!(lenient_int("-"), (0, false));
        assert_eq!(lenient_int("12x"), (12, false));
        assert_eq!(lenient_int(" -7 "), (-7, true));

        let map = MaskMap::parse(":5");
        assert_eq!(map.chip_channels()[&0], vec![5]);
    }

    #[test]
    fn test_line_without_separator_skipped() {
        let map = MaskMap::parse("garbage\n4:6");
        assert_eq!(map.chip_channels().len(), 1);
        assert!(map.is_masked(Layer::Det1, 127 * 4 + 3));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "# masked").unwrap();
        writeln!(file, "3:10").unwrap();
        file.flush().unwrap();

        let map = MaskMap::load(file.path()).unwrap();
        assert!(map.is_masked(Layer::Det1, 386));
    }

    #[test]
    fn test_missing_file_degrades_to_empty() {
        let result = MaskMap::load("/nonexistent/masks.txt");
        assert!(matches!(result, Err(Error::ConfigUnavailable { .. })));

        let map = MaskMap::load_or_empty("/nonexistent/masks.txt");
        assert!(map.is_empty());
    }
}
