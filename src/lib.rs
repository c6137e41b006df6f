//! Gridcache - a chunked 3D grid cache
//!
//! Space is split into power-of-two chunks that are generated lazily through a
//! pluggable storage backend, cached with idle-timeout expiry, and streamed in
//! and out around a set of observers.

pub mod core;
pub mod promise;
pub mod grid;
pub mod storage;
pub mod streaming;

pub use crate::core::{Error, Result};
pub use grid::{ChunkCoord, ChunkLayout, Region};
pub use promise::AsyncResult;
pub use storage::ChunkBackend;
pub use streaming::{ChunkEngine, EngineConfig, GenerationMode, Observer};
