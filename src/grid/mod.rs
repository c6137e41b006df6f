//! Grid addressing: chunk coordinates, in-chunk indices and regions

pub mod coord;
pub mod layout;
pub mod region;

pub use coord::ChunkCoord;
pub use layout::{ChunkLayout, MAX_TOTAL_BITS};
pub use region::{Region, Tile};
