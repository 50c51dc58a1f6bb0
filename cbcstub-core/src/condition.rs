//! CBC configuration register decoding.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stub-logic settings of the CBC chips for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CbcConfig {
    /// Stub correlation window (half-strips).
    pub stub_window: u32,
    /// Window offset for the first half of the chip.
    pub offset1: i32,
    /// Window offset for the second half of the chip.
    pub offset2: i32,
    /// Cluster width discrimination setting.
    pub cluster_width_discrimination: u32,
}

impl CbcConfig {
    /// Decodes the offset/CWD register and the window register.
    ///
    /// Register layout of `cwd_word`:
    /// - bits 0-1: offset 1 magnitude, bit 2: offset 1 sign
    /// - bits 3-4: offset 2 magnitude, bit 5: offset 2 sign
    /// - bits 6-7: cluster width discrimination
    ///
    /// The stub window is stored above the low nibble of `window_word`.
    #[must_use]
    pub fn from_words(cwd_word: u32, window_word: u32) -> Self {
        let signed = |magnitude: u32, sign_bit: u32| {
            #[allow(clippy::cast_possible_wrap)]
            let value = (magnitude & 0x3) as i32;
            if (cwd_word >> sign_bit) & 1 == 1 {
                -value
            } else {
                value
            }
        };

        Self {
            stub_window: window_word >> 4,
            offset1: signed(cwd_word, 2),
            offset2: signed(cwd_word >> 3, 5),
            cluster_width_discrimination: (cwd_word >> 6) & 0x3,
        }
    }
}
