//! Chunk grid coordinates

use glam::IVec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer coordinate identifying a chunk in the infinite grid
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// The face-adjacent neighbors (-x, +x, -y, +y, -z, +z)
    ///
    /// Neighbors that would fall outside the `i32` range are skipped, so a
    /// chunk on the edge of the grid has fewer than 6.
    pub fn neighbors(&self) -> impl Iterator<Item = ChunkCoord> {
        let Self { x, y, z } = *self;
        [
            x.checked_sub(1).map(|x| Self::new(x, y, z)),
            x.checked_add(1).map(|x| Self::new(x, y, z)),
            y.checked_sub(1).map(|y| Self::new(x, y, z)),
            y.checked_add(1).map(|y| Self::new(x, y, z)),
            z.checked_sub(1).map(|z| Self::new(x, y, z)),
            z.checked_add(1).map(|z| Self::new(x, y, z)),
        ]
        .into_iter()
        .flatten()
    }

    pub fn as_ivec3(&self) -> IVec3 {
        IVec3::new(self.x, self.y, self.z)
    }
}

impl From<IVec3> for ChunkCoord {
    fn from(v: IVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }
}

impl From<ChunkCoord> for IVec3 {
    fn from(c: ChunkCoord) -> Self {
        c.as_ivec3()
    }
}

impl fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.x, self.y, self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_chunk_coord_new() {
        let coord = ChunkCoord::new(1, 2, 3);
        assert_eq!(coord.x, 1);
        assert_eq!(coord.y, 2);
        assert_eq!(coord.z, 3);
    }

    #[test]
    fn test_neighbors_are_distinct_faces() {
        let coord = ChunkCoord::new(0, -1, 5);
        let neighbors: HashSet<_> = coord.neighbors().collect();
        assert_eq!(neighbors.len(), 6);
        assert!(!neighbors.contains(&coord));
        for n in &neighbors {
            let d = n.as_ivec3() - coord.as_ivec3();
            assert_eq!(d.abs().element_sum(), 1);
        }
    }

    #[test]
    fn test_neighbors_at_grid_edge() {
        let corner = ChunkCoord::new(i32::MAX, i32::MIN, 0);
        let neighbors: Vec<_> = corner.neighbors().collect();
        assert_eq!(
            neighbors,
            vec![
                ChunkCoord::new(i32::MAX - 1, i32::MIN, 0),
                ChunkCoord::new(i32::MAX, i32::MIN + 1, 0),
                ChunkCoord::new(i32::MAX, i32::MIN, -1),
                ChunkCoord::new(i32::MAX, i32::MIN, 1),
            ]
        );
    }

    #[test]
    fn test_ivec3_conversion() {
        let coord = ChunkCoord::from(IVec3::new(-4, 7, 0));
        assert_eq!(coord, ChunkCoord::new(-4, 7, 0));
        assert_eq!(IVec3::from(coord), IVec3::new(-4, 7, 0));
    }

    #[test]
    fn test_serde_round_trip() {
        let coord = ChunkCoord::new(-3, 0, 12);
        let json = serde_json::to_string(&coord).unwrap();
        assert_eq!(json, r#"{"x":-3,"y":0,"z":12}"#);
        assert_eq!(serde_json::from_str::<ChunkCoord>(&json).unwrap(), coord);
    }
}
