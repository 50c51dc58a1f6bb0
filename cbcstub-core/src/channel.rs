//! Module geometry: layers, readout columns and strip channel numbering.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Number of strip channels read out per layer (both columns).
pub const CHANNELS_PER_LAYER: u16 = 2032;

/// First raw channel belonging to column 1.
pub const COLUMN_BOUNDARY: u16 = 1016;

/// Largest valid raw channel index.
pub const MAX_CHANNEL: u16 = CHANNELS_PER_LAYER - 1;

/// One of the two sensor planes of the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Layer {
    /// Bottom sensor.
    #[cfg_attr(feature = "serde", serde(rename = "det0"))]
    Det0,
    /// Top sensor (stub seeding layer).
    #[cfg_attr(feature = "serde", serde(rename = "det1"))]
    Det1,
}

impl Layer {
    /// Both layers in readout order.
    pub const ALL: [Layer; 2] = [Layer::Det0, Layer::Det1];

    /// Layer name as used in histogram directories.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Layer::Det0 => "det0",
            Layer::Det1 => "det1",
        }
    }

    /// Zero-based layer index.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Layer::Det0 => 0,
            Layer::Det1 => 1,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One of the two readout halves of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Column {
    /// Raw channels `0..1016`.
    C0,
    /// Raw channels `1016..2032`.
    C1,
}

impl Column {
    /// Both columns in readout order.
    pub const ALL: [Column; 2] = [Column::C0, Column::C1];

    /// Column suffix as used in histogram names.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Column::C0 => "C0",
            Column::C1 => "C1",
        }
    }

    /// Zero-based column index.
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Column::C0 => 0,
            Column::C1 => 1,
        }
    }

    /// Column a raw channel belongs to.
    #[inline]
    #[must_use]
    pub fn of_channel(channel: u16) -> Self {
        if channel < COLUMN_BOUNDARY {
            Column::C0
        } else {
            Column::C1
        }
    }

    /// Column a CBC chip belongs to. Chips 0-7 read out column 0.
    #[inline]
    #[must_use]
    pub fn of_chip(chip_id: u8) -> Self {
        if chip_id <= 7 {
            Column::C0
        } else {
            Column::C1
        }
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Composite key selecting one column of one layer.
///
/// Displays as `det0C0`, `det1C1`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DetectorKey {
    pub layer: Layer,
    pub column: Column,
}

impl DetectorKey {
    /// All four keys, ordered layer-major.
    pub const ALL: [DetectorKey; 4] = [
        DetectorKey::new(Layer::Det0, Column::C0),
        DetectorKey::new(Layer::Det0, Column::C1),
        DetectorKey::new(Layer::Det1, Column::C0),
        DetectorKey::new(Layer::Det1, Column::C1),
    ];

    /// Creates a new key.
    #[must_use]
    pub const fn new(layer: Layer, column: Column) -> Self {
        Self { layer, column }
    }
}

impl fmt::Display for DetectorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.layer, self.column)
    }
}

/// Splits a raw channel into its column and column-local index.
///
/// Column-1 channels are re-based by [`COLUMN_BOUNDARY`].
#[inline]
#[must_use]
pub fn to_column_local(channel: u16) -> (Column, u16) {
    match Column::of_channel(channel) {
        Column::C0 => (Column::C0, channel),
        Column::C1 => (Column::C1, channel - COLUMN_BOUNDARY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_boundary() {
        assert_eq!(Column::of_channel(0), Column::C0);
        assert_eq!(Column::of_channel(1015), Column::C0);
        assert_eq!(Column::of_channel(1016), Column::C1);
        assert_eq!(Column::of_channel(MAX_CHANNEL), Column::C1);
    }

    #[test]
    fn test_column_local_rebase() {
        assert_eq!(to_column_local(12), (Column::C0, 12));
        assert_eq!(to_column_local(1016), (Column::C1, 0));
        assert_eq!(to_column_local(2031), (Column::C1, 1015));
    }

    #[test]
    fn test_chip_columns() {
        assert_eq!(Column::of_chip(0), Column::C0);
        assert_eq!(Column::of_chip(7), Column::C0);
        assert_eq!(Column::of_chip(8), Column::C1);
        assert_eq!(Column::of_chip(15), Column::C1);
    }

    #[test]
    fn test_key_display() {
        assert_eq!(DetectorKey::new(Layer::Det0, Column::C0).to_string(), "det0C0");
        assert_eq!(DetectorKey::new(Layer::Det1, Column::C1).to_string(), "det1C1");
        assert_eq!(DetectorKey::ALL.len(), 4);
    }
}
