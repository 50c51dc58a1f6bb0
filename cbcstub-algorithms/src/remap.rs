//! Channel remapping: raw layer channels to column-local lists.
//!
//! Masking is applied on raw layer positions, before the column split.

use cbcstub_core::channel::{to_column_local, Column, Layer, COLUMN_BOUNDARY};
use cbcstub_core::event::{RecoCluster, RecoStub};
use cbcstub_core::mask::MaskMap;
use std::ops::{Index, IndexMut};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A value per readout column.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PerColumn<T> {
    /// Column 0 value.
    pub c0: T,
    /// Column 1 value.
    pub c1: T,
}

impl<T> PerColumn<T> {
    /// Creates a pair from both column values.
    pub fn new(c0: T, c1: T) -> Self {
        Self { c0, c1 }
    }

    /// Iterates `(column, value)` in column order.
    pub fn iter(&self) -> impl Iterator<Item = (Column, &T)> {
        [(Column::C0, &self.c0), (Column::C1, &self.c1)].into_iter()
    }
}

impl<U> PerColumn<Vec<U>> {
    /// Empties both lists, keeping capacity.
    pub fn clear(&mut self) {
        self.c0.clear();
        self.c1.clear();
    }

    /// Combined length of both lists.
    pub fn total_len(&self) -> usize {
        self.c0.len() + self.c1.len()
    }
}

impl<T> Index<Column> for PerColumn<T> {
    type Output = T;

    fn index(&self, column: Column) -> &T {
        match column {
            Column::C0 => &self.c0,
            Column::C1 => &self.c1,
        }
    }
}

impl<T> IndexMut<Column> for PerColumn<T> {
    fn index_mut(&mut self, column: Column) -> &mut T {
        match column {
            Column::C0 => &mut self.c0,
            Column::C1 => &mut self.c1,
        }
    }
}

/// Splits layer readouts into column-local lists, dropping masked entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelRemapper<'m> {
    mask: Option<&'m MaskMap>,
}

impl<'m> ChannelRemapper<'m> {
    /// Remapper that keeps every channel.
    #[must_use]
    pub fn unmasked() -> Self {
        Self { mask: None }
    }

    /// Remapper that drops channels found in `mask`.
    #[must_use]
    pub fn masked(mask: &'m MaskMap) -> Self {
        Self { mask: Some(mask) }
    }

    /// Returns true if a mask is applied.
    #[must_use]
    pub fn is_masking(&self) -> bool {
        self.mask.is_some()
    }

    #[inline]
    fn is_masked(&self, layer: Layer, position: u16) -> bool {
        self.mask
            .is_some_and(|mask| mask.is_masked(layer, i32::from(position)))
    }

    /// Appends the unmasked channels of `layer` to `out`, column-local and
    /// in scan order.
    pub fn split_channels_into(&self, layer: Layer, channels: &[u16], out: &mut PerColumn<Vec<u16>>) {
        for &channel in channels {
            if self.is_masked(layer, channel) {
                continue;
            }
            let (column, local) = to_column_local(channel);
            out[column].push(local);
        }
    }

    /// Column-local unmasked channels of `layer`.
    #[must_use]
    pub fn split_channels(&self, layer: Layer, channels: &[u16]) -> PerColumn<Vec<u16>> {
        let mut out = PerColumn::default();
        self.split_channels_into(layer, channels, &mut out);
        out
    }

    /// Appends the unmasked upstream clusters of `layer` to `out`.
    ///
    /// A cluster is masked when its position is masked; column-1 clusters
    /// are re-based like channels.
    pub fn split_clusters_into(
        &self,
        layer: Layer,
        clusters: &[RecoCluster],
        out: &mut PerColumn<Vec<RecoCluster>>,
    ) {
        for cluster in clusters {
            if self.is_masked(layer, cluster.x) {
                continue;
            }
            let (column, local) = to_column_local(cluster.x);
            out[column].push(RecoCluster { x: local, ..*cluster });
        }
    }

    /// Appends the unmasked upstream stubs to `out`.
    ///
    /// Stubs are seeded in `det1`, so only that layer's mask applies.
    /// Positions stay in raw layer channels.
    pub fn split_stubs_into(&self, stubs: &[RecoStub], out: &mut PerColumn<Vec<RecoStub>>) {
        for stub in stubs {
            if self.is_masked(Layer::Det1, stub.x) {
                continue;
            }
            let column = if stub.x < COLUMN_BOUNDARY {
                Column::C0
            } else {
                Column::C1
            };
            out[column].push(*stub);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_without_mask() {
        let remapper = ChannelRemapper::unmasked();
        let split = remapper.split_channels(Layer::Det0, &[5, 1017, 3, 1016, 2031]);
        assert_eq!(split.c0, vec![5, 3]);
        assert_eq!(split.c1, vec![1, 0, 1015]);
        assert_eq!(split.total_len(), 5);
    }

    #[test]
    fn test_mask_applies_per_layer() {
        let mask = MaskMap::parse("3:10");
        let remapper = ChannelRemapper::masked(&mask);

        let det1 = remapper.split_channels(Layer::Det1, &[383, 384, 386, 388, 389]);
        assert_eq!(det1.c0, vec![383, 389]);

        let det0 = remapper.split_channels(Layer::Det0, &[384, 386]);
        assert_eq!(det0.c0, vec![384, 386]);
    }

    #[test]
    fn test_split_clusters_rebases_column_1() {
        let mask = MaskMap::parse("3:11");
        let remapper = ChannelRemapper::masked(&mask);
        let clusters = [
            RecoCluster { x: 386, width: 2 },
            RecoCluster { x: 390, width: 1 },
            RecoCluster { x: 1500, width: 3 },
        ];

        let mut out = PerColumn::default();
        remapper.split_clusters_into(Layer::Det0, &clusters, &mut out);
        assert_eq!(out.c0, vec![RecoCluster { x: 390, width: 1 }]);
        assert_eq!(out.c1, vec![RecoCluster { x: 484, width: 3 }]);
    }

    #[test]
    fn test_split_stubs_uses_seed_layer_mask() {
        // chip 3 channel 10 masks det1 384..=388, channel 11 masks det0
        let mask = MaskMap::parse("3:10,11");
        let remapper = ChannelRemapper::masked(&mask);
        let stubs = [
            RecoStub { x: 385, bend: 0 },
            RecoStub { x: 400, bend: 1 },
            RecoStub { x: 1100, bend: -1 },
        ];

        let mut out = PerColumn::default();
        remapper.split_stubs_into(&stubs, &mut out);
        assert_eq!(out.c0, vec![RecoStub { x: 400, bend: 1 }]);
        assert_eq!(out.c1, vec![RecoStub { x: 1100, bend: -1 }]);
    }

    #[test]
    fn test_into_appends_and_clear_resets() {
        let remapper = ChannelRemapper::unmasked();
        let mut out = PerColumn::default();
        remapper.split_channels_into(Layer::Det0, &[1, 2], &mut out);
        remapper.split_channels_into(Layer::Det0, &[3], &mut out);
        assert_eq!(out[Column::C0], vec![1, 2, 3]);

        out.clear();
        assert_eq!(out.total_len(), 0);
    }
}
