//! Analysis configuration.

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Stub window used when neither the configuration nor the event provides one.
pub const DEFAULT_STUB_WINDOW: u32 = 5;

/// Longitudinal positions (mm) of the module layers and the telescope
/// reference plane.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TelescopeGeometry {
    /// z of layer `det0`.
    pub z_dut0: f64,
    /// z of layer `det1`.
    pub z_dut1: f64,
    /// z of the plane the track parameters are quoted at.
    pub z_ref: f64,
}

impl Default for TelescopeGeometry {
    fn default() -> Self {
        Self {
            z_dut0: 435.0,
            z_dut1: 438.0,
            z_ref: 724.0,
        }
    }
}

/// Configuration of the per-event analysis.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AnalysisConfig {
    /// Fixed stub window in strips. `None` takes the window from the
    /// event's CBC registers.
    pub stub_window: Option<u32>,
    /// Drop masked channels, clusters and stubs before analysis.
    pub channel_masking: bool,
    /// Skip events whose good-event flag is not set.
    pub skip_bad_events: bool,
    /// Telescope and module positions.
    pub telescope: TelescopeGeometry,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            stub_window: None,
            channel_masking: false,
            skip_bad_events: false,
            telescope: TelescopeGeometry::default(),
        }
    }
}

impl AnalysisConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a fixed stub window.
    #[must_use]
    pub fn with_stub_window(mut self, window: u32) -> Self {
        self.stub_window = Some(window);
        self
    }

    /// Enables or disables channel masking.
    #[must_use]
    pub fn with_channel_masking(mut self, enabled: bool) -> Self {
        self.channel_masking = enabled;
        self
    }

    /// Enables or disables skipping of bad events.
    #[must_use]
    pub fn with_skip_bad_events(mut self, enabled: bool) -> Self {
        self.skip_bad_events = enabled;
        self
    }

    /// Sets the telescope geometry.
    #[must_use]
    pub fn with_telescope(mut self, telescope: TelescopeGeometry) -> Self {
        self.telescope = telescope;
        self
    }

    /// Checks the geometry is usable.
    ///
    /// # Errors
    /// Returns [`Error::InvalidConfig`] for non-finite plane positions or
    /// coincident module layers.
    pub fn validate(&self) -> Result<()> {
        let t = &self.telescope;
        if ![t.z_dut0, t.z_dut1, t.z_ref].iter().all(|z| z.is_finite()) {
            return Err(Error::InvalidConfig(
                "telescope plane positions must be finite".to_string(),
            ));
        }
        if (t.z_dut0 - t.z_dut1).abs() < f64::EPSILON {
            return Err(Error::InvalidConfig(format!(
                "module layers coincide at z={}",
                t.z_dut0
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = AnalysisConfig::new()
            .with_stub_window(3)
            .with_channel_masking(true)
            .with_skip_bad_events(true);

        assert_eq!(config.stub_window, Some(3));
        assert!(config.channel_masking);
        assert!(config.skip_bad_events);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_coincident_layers() {
        let config = AnalysisConfig::new().with_telescope(TelescopeGeometry {
            z_dut0: 10.0,
            z_dut1: 10.0,
            z_ref: 0.0,
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_non_finite() {
        let config = AnalysisConfig::new().with_telescope(TelescopeGeometry {
            z_ref: f64::NAN,
            ..TelescopeGeometry::default()
        });
        assert!(config.validate().is_err());
    }
}
