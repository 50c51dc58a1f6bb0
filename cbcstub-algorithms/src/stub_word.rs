//! CBC stub summary word decoding.
//!
//! Bit `i` of the summary word is set when chip `i` reported at least one
//! stub. Chips 0-7 read out column 0, chips 8-15 column 1. Bits above the
//! chip count are ignored.

use crate::remap::PerColumn;
use cbcstub_core::channel::Column;
use log::debug;
use std::collections::BTreeMap;

/// Number of CBC chips on a module.
pub const CHIPS_PER_MODULE: u8 = 16;

const CHIP_MASK: u32 = (1 << CHIPS_PER_MODULE) - 1;

/// Accumulates per-chip stub counts from summary words over one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StubWordDecoder {
    chips: PerColumn<BTreeMap<u8, u32>>,
    total: u32,
}

impl StubWordDecoder {
    /// Creates an empty decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `word`, adding one count per signalled chip.
    ///
    /// Returns the number of stubs signalled by `word` in both columns.
    pub fn decode(&mut self, word: u32) -> u32 {
        if word & !CHIP_MASK != 0 {
            debug!("stub word {word:#010x}: bits above chip {CHIPS_PER_MODULE} ignored");
        }

        let mut decoded = 0;
        for chip_id in 0..CHIPS_PER_MODULE {
            if (word >> chip_id) & 1 == 1 {
                *self.chips[Column::of_chip(chip_id)]
                    .entry(chip_id)
                    .or_insert(0) += 1;
                decoded += 1;
            }
        }
        self.total += decoded;
        decoded
    }

    /// Stubs decoded since the last [`StubWordDecoder::clear`].
    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    /// Per-chip counts for `column`.
    #[must_use]
    pub fn chip_counts(&self, column: Column) -> &BTreeMap<u8, u32> {
        &self.chips[column]
    }

    /// Count accumulated for `chip_id`.
    #[must_use]
    pub fn count_for(&self, chip_id: u8) -> u32 {
        self.chips[Column::of_chip(chip_id)]
            .get(&chip_id)
            .copied()
            .unwrap_or(0)
    }

    /// Total count accumulated in `column`.
    #[must_use]
    pub fn column_total(&self, column: Column) -> u32 {
        self.chips[column].values().sum()
    }

    /// Forgets all accumulated counts.
    pub fn clear(&mut self) {
        self.chips.c0.clear();
        self.chips.c1.clear();
        self.total = 0;
    }
}
