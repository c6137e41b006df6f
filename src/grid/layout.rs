//! Chunk layout and addressing
//!
//! Chunks have power-of-two extents `2^bits` per axis. Global integer
//! coordinates split into a chunk coordinate (arithmetic shift, which floors
//! toward negative infinity) and a local coordinate (low bits). Local
//! coordinates flatten to an index with X varying fastest, then Z, then Y:
//!
//! ```text
//! index = x | (z | y << bits_z) << bits_x
//! ```
//!
//! Every storage backend addresses its payload through this one function.

use glam::{DVec3, IVec3, UVec3};

use super::coord::ChunkCoord;
use crate::core::{Error, Result};

/// Maximum combined bits, keeps `total_size` within `i32`/`u32` range
pub const MAX_TOTAL_BITS: u32 = 30;

/// Immutable chunk dimensions and the addressing functions derived from them
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ChunkLayout {
    bits_x: u32,
    bits_y: u32,
    bits_z: u32,
}

impl ChunkLayout {
    /// Create a layout with `2^bits_x * 2^bits_y * 2^bits_z` elements per chunk
    pub fn new(bits_x: u32, bits_y: u32, bits_z: u32) -> Result<Self> {
        let total = bits_x + bits_y + bits_z;
        if total > MAX_TOTAL_BITS {
            return Err(Error::InvalidLayout(format!(
                "{bits_x}+{bits_y}+{bits_z} bits exceeds the maximum of {MAX_TOTAL_BITS}"
            )));
        }
        Ok(Self { bits_x, bits_y, bits_z })
    }

    /// Cubic layout with the same bits on every axis
    pub fn cubic(bits: u32) -> Result<Self> {
        Self::new(bits, bits, bits)
    }

    /// Degenerate layout where each chunk holds exactly one element
    pub const fn single() -> Self {
        Self { bits_x: 0, bits_y: 0, bits_z: 0 }
    }

    pub fn bits(&self) -> UVec3 {
        UVec3::new(self.bits_x, self.bits_y, self.bits_z)
    }

    pub fn size(&self) -> UVec3 {
        UVec3::new(1 << self.bits_x, 1 << self.bits_y, 1 << self.bits_z)
    }

    pub fn size_x(&self) -> u32 {
        1 << self.bits_x
    }

    pub fn size_y(&self) -> u32 {
        1 << self.bits_y
    }

    pub fn size_z(&self) -> u32 {
        1 << self.bits_z
    }

    /// Number of elements in one chunk
    pub fn total_size(&self) -> usize {
        1usize << (self.bits_x + self.bits_y + self.bits_z)
    }

    /// Chunk containing a global coordinate
    pub fn chunk_coord(&self, global: IVec3) -> ChunkCoord {
        ChunkCoord::new(
            global.x >> self.bits_x,
            global.y >> self.bits_y,
            global.z >> self.bits_z,
        )
    }

    /// Chunk containing a floating-point position
    pub fn chunk_coord_f64(&self, position: DVec3) -> ChunkCoord {
        self.chunk_coord(position.floor().as_ivec3())
    }

    /// Position of a global coordinate inside its chunk
    pub fn local(&self, global: IVec3) -> UVec3 {
        let mask = self.size().as_ivec3() - IVec3::ONE;
        (global & mask).as_uvec3()
    }

    /// Flatten a local coordinate
    #[inline]
    pub fn encode(&self, x: u32, y: u32, z: u32) -> usize {
        (x | (z | y << self.bits_z) << self.bits_x) as usize
    }

    /// Recover the local coordinate from a flat index
    #[inline]
    pub fn decode(&self, index: usize) -> UVec3 {
        let index = index as u32;
        let x = index & (self.size_x() - 1);
        let rest = index >> self.bits_x;
        let z = rest & (self.size_z() - 1);
        let y = rest >> self.bits_z;
        UVec3::new(x, y, z)
    }

    /// Flat index of a global coordinate inside its chunk
    #[inline]
    pub fn local_index(&self, global: IVec3) -> usize {
        let local = self.local(global);
        self.encode(local.x, local.y, local.z)
    }

    /// Global coordinate of the chunk's minimum corner
    pub fn chunk_origin(&self, coord: ChunkCoord) -> IVec3 {
        IVec3::new(
            coord.x << self.bits_x,
            coord.y << self.bits_y,
            coord.z << self.bits_z,
        )
    }

    /// Geometric center of a chunk in global space
    pub fn chunk_center(&self, coord: ChunkCoord) -> DVec3 {
        self.chunk_origin(coord).as_dvec3() + self.size().as_dvec3() * 0.5
    }

    /// Global coordinate of a local position inside a chunk
    pub fn to_global(&self, coord: ChunkCoord, local: UVec3) -> IVec3 {
        self.chunk_origin(coord) + local.as_ivec3()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_all_layouts() {
        for bx in 0..=5 {
            for by in 0..=5 {
                for bz in 0..=5 {
                    let layout = ChunkLayout::new(bx, by, bz).unwrap();
                    let size = layout.size();
                    for y in 0..size.y {
                        for z in 0..size.z {
                            for x in 0..size.x {
                                let index = layout.encode(x, y, z);
                                assert!(index < layout.total_size());
                                assert_eq!(
                                    layout.decode(index),
                                    UVec3::new(x, y, z),
                                    "Failed for bits ({bx}, {by}, {bz}) at ({x}, {y}, {z})"
                                );
                            }
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_decode_then_encode_covers_every_index() {
        let layout = ChunkLayout::new(3, 1, 2).unwrap();
        for index in 0..layout.total_size() {
            let local = layout.decode(index);
            assert_eq!(layout.encode(local.x, local.y, local.z), index);
        }
    }

    #[test]
    fn test_index_ordering_x_then_z_then_y() {
        let layout = ChunkLayout::new(2, 3, 4).unwrap();
        assert_eq!(layout.encode(0, 0, 0), 0);
        assert_eq!(layout.encode(1, 0, 0), 1);
        assert_eq!(layout.encode(0, 0, 1), 4);
        assert_eq!(layout.encode(0, 1, 0), 4 * 16);
        assert_eq!(layout.encode(3, 7, 15), layout.total_size() - 1);
    }

    #[test]
    fn test_negative_coordinates_floor() {
        let layout = ChunkLayout::cubic(4).unwrap();
        assert_eq!(layout.chunk_coord(IVec3::new(-1, -1, -1)), ChunkCoord::new(-1, -1, -1));
        assert_eq!(layout.chunk_coord(IVec3::new(-16, -17, 15)), ChunkCoord::new(-1, -2, 0));
        assert_eq!(layout.local(IVec3::new(-1, -16, -17)), UVec3::new(15, 0, 15));
    }

    #[test]
    fn test_float_coordinates_floor() {
        let layout = ChunkLayout::cubic(4).unwrap();
        assert_eq!(layout.chunk_coord_f64(DVec3::new(-0.5, 15.9, 16.0)), ChunkCoord::new(-1, 0, 1));
    }

    #[test]
    fn test_origin_center_and_global() {
        let layout = ChunkLayout::new(4, 2, 3).unwrap();
        let coord = ChunkCoord::new(-1, 2, 3);
        assert_eq!(layout.chunk_origin(coord), IVec3::new(-16, 8, 24));
        assert_eq!(layout.chunk_center(coord), DVec3::new(-8.0, 10.0, 28.0));

        let global = IVec3::new(-3, 9, 30);
        let back = layout.to_global(layout.chunk_coord(global), layout.local(global));
        assert_eq!(back, global);
    }

    #[test]
    fn test_rejects_oversized_layout() {
        assert!(matches!(ChunkLayout::new(11, 10, 10), Err(Error::InvalidLayout(_))));
        assert!(ChunkLayout::new(10, 10, 10).is_ok());
        assert_eq!(ChunkLayout::single().total_size(), 1);
    }
}
