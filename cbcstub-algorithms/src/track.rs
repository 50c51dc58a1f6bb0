//! Telescope track extrapolation onto the module layers.

use cbcstub_core::config::TelescopeGeometry;
use cbcstub_core::event::TelescopeTracks;

/// Track positions at both module layers, index-aligned per track.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtrapolatedTracks {
    /// x at layer `det0`.
    pub x_dut0: Vec<f64>,
    /// x at layer `det1`.
    pub x_dut1: Vec<f64>,
}

impl ExtrapolatedTracks {
    /// Number of accepted tracks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.x_dut0.len()
    }

    /// Returns true if no track was accepted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x_dut0.is_empty()
    }

    /// Forgets all tracks, keeping capacity.
    pub fn clear(&mut self) {
        self.x_dut0.clear();
        self.x_dut1.clear();
    }

    /// Iterates `(x_dut0, x_dut1)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.x_dut0.iter().copied().zip(self.x_dut1.iter().copied())
    }

    /// Appends a track unless either position is already present.
    ///
    /// Returns true if the track was accepted.
    #[allow(clippy::float_cmp)]
    fn push_unique(&mut self, x0: f64, x1: f64) -> bool {
        // exact duplicates only
        if self.x_dut0.contains(&x0) || self.x_dut1.contains(&x1) {
            return false;
        }
        self.x_dut0.push(x0);
        self.x_dut1.push(x1);
        true
    }
}

/// Straight-line extrapolation from the telescope reference plane.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackExtrapolator {
    geometry: TelescopeGeometry,
}

impl TrackExtrapolator {
    /// Creates an extrapolator for `geometry`.
    #[must_use]
    pub fn new(geometry: TelescopeGeometry) -> Self {
        Self { geometry }
    }

    /// Plane positions in use.
    #[must_use]
    pub fn geometry(&self) -> &TelescopeGeometry {
        &self.geometry
    }

    /// Projects one track onto both layers.
    #[inline]
    #[must_use]
    pub fn project(&self, dxdz: f64, x_pos: f64) -> (f64, f64) {
        let g = &self.geometry;
        (
            (g.z_dut0 - g.z_ref) * dxdz + x_pos,
            (g.z_dut1 - g.z_ref) * dxdz + x_pos,
        )
    }

    /// Appends the projections of `tracks` to `out`, dropping tracks whose
    /// position on either layer is already present.
    ///
    /// Returns the number of tracks accepted.
    pub fn extrapolate_into(&self, tracks: &TelescopeTracks, out: &mut ExtrapolatedTracks) -> usize {
        tracks
            .dxdz
            .iter()
            .zip(&tracks.x_pos)
            .filter(|&(&dxdz, &x_pos)| {
                let (x0, x1) = self.project(dxdz, x_pos);
                out.push_unique(x0, x1)
            })
            .count()
    }

    /// Projections of `tracks`, de-duplicated.
    #[must_use]
    pub fn extrapolate(&self, tracks: &TelescopeTracks) -> ExtrapolatedTracks {
        let mut out = ExtrapolatedTracks::default();
        self.extrapolate_into(tracks, &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn geometry() -> TelescopeGeometry {
        TelescopeGeometry {
            z_dut0: 10.0,
            z_dut1: 20.0,
            z_ref: 0.0,
        }
    }

    #[test]
    fn test_projection() {
        let extrapolator = TrackExtrapolator::new(geometry());
        let (x0, x1) = extrapolator.project(0.5, 1.0);
        assert_relative_eq!(x0, 6.0);
        assert_relative_eq!(x1, 11.0);
    }

    #[test]
    fn test_duplicate_tracks_removed() {
        let tracks = TelescopeTracks {
            dxdz: vec![0.5, 0.5, 0.1],
            x_pos: vec![1.0, 1.0, 2.0],
        };
        let out = TrackExtrapolator::new(geometry()).extrapolate(&tracks);
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out.x_dut0[1], 3.0);
        assert_relative_eq!(out.x_dut1[1], 4.0);
    }

    #[test]
    fn test_shared_position_on_one_layer_rejected() {
        // Both tracks cross det0 at x=6 but differ at det1.
        let tracks = TelescopeTracks {
            dxdz: vec![0.5, 0.0],
            x_pos: vec![1.0, 6.0],
        };
        let out = TrackExtrapolator::new(geometry()).extrapolate(&tracks);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_distinct_tracks_index_aligned() {
        let tracks = TelescopeTracks {
            dxdz: vec![0.0, 0.1],
            x_pos: vec![5.0, -2.0],
        };
        let out = TrackExtrapolator::new(geometry()).extrapolate(&tracks);
        let pairs: Vec<(f64, f64)> = out.iter().collect();
        assert_eq!(pairs.len(), 2);
        assert_relative_eq!(pairs[0].0, 5.0);
        assert_relative_eq!(pairs[0].1, 5.0);
        assert_relative_eq!(pairs[1].0, -1.0);
        assert_relative_eq!(pairs[1].1, 0.0);
    }

    #[test]
    fn test_incomplete_track_ignored() {
        let tracks = TelescopeTracks {
            dxdz: vec![0.0, 0.2],
            x_pos: vec![1.0],
        };
        let mut out = ExtrapolatedTracks::default();
        let accepted = TrackExtrapolator::new(geometry()).extrapolate_into(&tracks, &mut out);
        assert_eq!(accepted, 1);
        out.clear();
        assert!(out.is_empty());
    }
}
