//! Scene buffer layout
//!
//! The whole scene lives in one device buffer. [`SceneLayout::compute`] is
//! the only place region offsets come from; shaders derive the same offsets
//! from the counts in the push constants.
//!
//! Regions are packed back to back in this order:
//!
//! | region             | size                                  |
//! |--------------------|---------------------------------------|
//! | `draw_count`       | 4                                     |
//! | `indirect_draws`   | objects × 20                          |
//! | `objects`          | objects × 48                          |
//! | `visible_meshlets` | 4 + meshlets × 20                     |
//! | `lights`           | light capacity × 32                   |
//! | `geometry`         | geometry bytes (multiple of 4)        |
//!
//! Every record size is a multiple of four, so every offset is 4-byte
//! aligned, which is all indirect commands and index binding require. No
//! padding is ever inserted; the buffer size is the sum of the region sizes.

use super::records::{DrawIndexedIndirect, LightRecord, ObjectRecord};

/// Size of the draw-count word
pub const DRAW_COUNT_SIZE: u64 = 4;

/// Size of the counter at the start of the visible-meshlet region
pub const VISIBLE_COUNTER_SIZE: u64 = 4;

const DRAW_STRIDE: u64 = std::mem::size_of::<DrawIndexedIndirect>() as u64;
const OBJECT_STRIDE: u64 = std::mem::size_of::<ObjectRecord>() as u64;
const LIGHT_STRIDE: u64 = std::mem::size_of::<LightRecord>() as u64;

/// Named sub-region of the scene buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionKind {
    /// Number of indirect draws emitted by culling
    DrawCount,
    /// Per-object indexed-indirect draws written by culling
    IndirectDraws,
    /// Object records
    Objects,
    /// Visible-meshlet counter followed by per-meshlet draws
    VisibleMeshlets,
    /// Light records, sized by capacity
    Lights,
    /// Vertex bytes followed by `u32` indices
    Geometry,
}

impl RegionKind {
    /// Every region, in buffer order
    pub const ALL: [Self; 6] = [
        Self::DrawCount,
        Self::IndirectDraws,
        Self::Objects,
        Self::VisibleMeshlets,
        Self::Lights,
        Self::Geometry,
    ];

    const fn index(self) -> usize {
        self as usize
    }

    /// Name used in logs
    pub const fn name(self) -> &'static str {
        match self {
            Self::DrawCount => "draw_count",
            Self::IndirectDraws => "indirect_draws",
            Self::Objects => "objects",
            Self::VisibleMeshlets => "visible_meshlets",
            Self::Lights => "lights",
            Self::Geometry => "geometry",
        }
    }
}

/// Byte range inside the scene buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Region {
    /// Offset from the start of the buffer
    pub offset: u64,
    /// Length in bytes
    pub size: u64,
}

impl Region {
    /// Create a region
    pub const fn new(offset: u64, size: u64) -> Self {
        Self { offset, size }
    }

    /// One past the last byte
    pub const fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// True for zero-length regions
    pub const fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// True if both regions share at least one byte
    pub const fn overlaps(&self, other: &Self) -> bool {
        !self.is_empty() && !other.is_empty() && self.offset < other.end() && other.offset < self.end()
    }

    /// Sub-range relative to this region, clamped to its end
    pub fn slice(&self, offset: u64, size: u64) -> Self {
        let start = self.offset + offset.min(self.size);
        let end = (start + size).min(self.end());
        Self::new(start, end - start)
    }
}

/// Counts the layout is computed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SceneCounts {
    /// Number of object records
    pub objects: u32,
    /// Total meshlets across all objects
    pub meshlets: u32,
    /// Light slots reserved
    pub light_capacity: u32,
    /// Size of the geometry blob in bytes
    pub geometry_bytes: u64,
}

/// Offsets and sizes of every scene buffer region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneLayout {
    counts: SceneCounts,
    regions: [Region; 6],
    total_size: u64,
}

impl SceneLayout {
    /// Compute the layout for the given counts
    pub fn compute(counts: SceneCounts) -> Self {
        let sizes = [
            DRAW_COUNT_SIZE,
            u64::from(counts.objects) * DRAW_STRIDE,
            u64::from(counts.objects) * OBJECT_STRIDE,
            VISIBLE_COUNTER_SIZE + u64::from(counts.meshlets) * DRAW_STRIDE,
            u64::from(counts.light_capacity) * LIGHT_STRIDE,
            counts.geometry_bytes,
        ];

        let mut regions = [Region::default(); 6];
        let mut offset = 0;
        for (region, size) in regions.iter_mut().zip(sizes) {
            *region = Region::new(offset, size);
            offset += size;
        }

        Self { counts, regions, total_size: offset }
    }

    /// Region for `kind`
    pub const fn region(&self, kind: RegionKind) -> Region {
        self.regions[kind.index()]
    }

    /// Every region in buffer order
    pub fn regions(&self) -> impl Iterator<Item = (RegionKind, Region)> + '_ {
        RegionKind::ALL.into_iter().zip(self.regions)
    }

    /// Bytes the scene buffer must hold
    pub const fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Counts this layout was computed from
    pub const fn counts(&self) -> SceneCounts {
        self.counts
    }

    /// The visible-meshlet counter word
    pub fn visible_meshlet_counter(&self) -> Region {
        self.region(RegionKind::VisibleMeshlets).slice(0, VISIBLE_COUNTER_SIZE)
    }

    /// The visible-meshlet draw records after the counter
    pub fn visible_meshlet_draws(&self) -> Region {
        let region = self.region(RegionKind::VisibleMeshlets);
        region.slice(VISIBLE_COUNTER_SIZE, region.size)
    }

    /// Byte range of light slot `index`
    pub fn light_slot(&self, index: u32) -> Region {
        self.region(RegionKind::Lights).slice(u64::from(index) * LIGHT_STRIDE, LIGHT_STRIDE)
    }

    /// Same counts with a different light capacity
    pub fn with_light_capacity(&self, light_capacity: u32) -> Self {
        Self::compute(SceneCounts { light_capacity, ..self.counts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout(objects: u32, meshlets: u32, lights: u32, geometry: u64) -> SceneLayout {
        SceneLayout::compute(SceneCounts {
            objects,
            meshlets,
            light_capacity: lights,
            geometry_bytes: geometry,
        })
    }

    #[test]
    fn test_regions_never_overlap_and_sum_to_total() {
        for objects in [0, 1, 7, 300] {
            for meshlets in [0, 1, 64, 4096] {
                let layout = layout(objects, meshlets, 8, 1024);
                let regions: Vec<_> = layout.regions().map(|(_, r)| r).collect();

                for (i, a) in regions.iter().enumerate() {
                    for b in &regions[i + 1..] {
                        assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
                    }
                }

                let sum: u64 = regions.iter().map(|r| r.size).sum();
                assert_eq!(sum, layout.total_size());
            }
        }
    }

    #[test]
    fn test_region_sizes_follow_counts() {
        let layout = layout(3, 5, 4, 96);
        assert_eq!(layout.region(RegionKind::DrawCount), Region::new(0, 4));
        assert_eq!(layout.region(RegionKind::IndirectDraws).size, 3 * 20);
        assert_eq!(layout.region(RegionKind::Objects).size, 3 * 48);
        assert_eq!(layout.region(RegionKind::VisibleMeshlets).size, 4 + 5 * 20);
        assert_eq!(layout.region(RegionKind::Lights).size, 4 * 32);
        assert_eq!(layout.region(RegionKind::Geometry).size, 96);
    }

    #[test]
    fn test_empty_scene_keeps_counters() {
        let layout = layout(0, 0, 0, 0);
        assert_eq!(layout.total_size(), DRAW_COUNT_SIZE + VISIBLE_COUNTER_SIZE);
        assert_eq!(layout.visible_meshlet_counter(), Region::new(4, 4));
        assert!(layout.visible_meshlet_draws().is_empty());
        assert!(layout.region(RegionKind::IndirectDraws).is_empty());
    }

    #[test]
    fn test_offsets_are_four_byte_aligned() {
        let layout = layout(13, 29, 3, 4 * 77);
        for (kind, region) in layout.regions() {
            assert_eq!(region.offset % 4, 0, "{} misaligned", kind.name());
        }
    }

    #[test]
    fn test_compute_is_idempotent() {
        let counts = SceneCounts { objects: 11, meshlets: 40, light_capacity: 16, geometry_bytes: 512 };
        assert_eq!(SceneLayout::compute(counts), SceneLayout::compute(counts));
        assert_eq!(SceneLayout::compute(counts).counts(), counts);
    }

    #[test]
    fn test_light_growth_only_moves_geometry() {
        let small = layout(2, 2, 4, 64);
        let grown = small.with_light_capacity(8);
        for kind in [RegionKind::DrawCount, RegionKind::IndirectDraws, RegionKind::Objects, RegionKind::VisibleMeshlets] {
            assert_eq!(small.region(kind), grown.region(kind));
        }
        assert_eq!(grown.region(RegionKind::Lights).size, 8 * 32);
        assert_eq!(grown.total_size() - small.total_size(), 4 * 32);
        assert_eq!(grown.light_slot(5).offset, grown.region(RegionKind::Lights).offset + 5 * 32);
    }

    #[test]
    fn test_region_slice_clamps() {
        let region = Region::new(100, 10);
        assert_eq!(region.slice(4, 100), Region::new(104, 6));
        assert_eq!(region.slice(50, 4), Region::new(110, 0));
        assert!(Region::new(0, 4).overlaps(&Region::new(3, 1)));
        assert!(!Region::new(0, 4).overlaps(&Region::new(4, 4)));
        assert!(!Region::new(0, 0).overlaps(&Region::new(0, 4)));
    }
}
