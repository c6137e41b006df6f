//! Axis-aligned integer regions and their decomposition into chunk tiles

use glam::{IVec3, UVec3};
use serde::{Deserialize, Serialize};

use super::coord::ChunkCoord;
use super::layout::ChunkLayout;

/// Half-open integer box `[min, max)`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub min: IVec3,
    pub max: IVec3,
}

impl Region {
    pub fn new(min: IVec3, max: IVec3) -> Self {
        Self { min, max }
    }

    /// Region spanning whole chunks `[first, last]` (inclusive)
    pub fn from_chunks(layout: &ChunkLayout, first: ChunkCoord, last: ChunkCoord) -> Self {
        Self {
            min: layout.chunk_origin(first),
            max: layout.chunk_origin(last) + layout.size().as_ivec3(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.cmpge(self.max).any()
    }

    /// Number of integer coordinates inside the region
    pub fn volume(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let extent = (self.max - self.min).as_i64vec3();
        (extent.x * extent.y * extent.z) as u64
    }

    pub fn contains(&self, p: IVec3) -> bool {
        p.cmpge(self.min).all() && p.cmplt(self.max).all()
    }

    /// Split the region into one tile per intersected chunk
    ///
    /// Each tile carries the chunk-local range clipped to the region, so the
    /// tiles partition the region exactly. Chunks are visited Y-major, then Z,
    /// then X.
    pub fn tiles(self, layout: ChunkLayout) -> impl Iterator<Item = Tile> {
        let (first, last) = if self.is_empty() {
            (IVec3::ONE, IVec3::ZERO)
        } else {
            (
                layout.chunk_coord(self.min).as_ivec3(),
                layout.chunk_coord(self.max - IVec3::ONE).as_ivec3(),
            )
        };
        let size = layout.size().as_ivec3();

        (first.y..=last.y).flat_map(move |cy| {
            (first.z..=last.z).flat_map(move |cz| {
                (first.x..=last.x).map(move |cx| {
                    let coord = ChunkCoord::new(cx, cy, cz);
                    let origin = layout.chunk_origin(coord);
                    let lo = (self.min - origin).max(IVec3::ZERO);
                    let hi = (self.max - origin).min(size);
                    Tile {
                        coord,
                        origin,
                        lo: lo.as_uvec3(),
                        hi: hi.as_uvec3(),
                    }
                })
            })
        })
    }
}

/// The part of a region that falls inside one chunk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Tile {
    pub coord: ChunkCoord,
    /// Global coordinate of the chunk's minimum corner
    pub origin: IVec3,
    /// Inclusive lower local bound
    pub lo: UVec3,
    /// Exclusive upper local bound
    pub hi: UVec3,
}

impl Tile {
    pub fn volume(&self) -> u64 {
        let extent = (self.hi - self.lo).as_u64vec3();
        extent.x * extent.y * extent.z
    }
}
