//! Chunk handle shared between the cache and its consumers
//!
//! Provides thread-safe access to one chunk's payload.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::grid::ChunkCoord;
use crate::promise::Dispose;

/// A generated chunk: its coordinate plus the backend payload
pub struct Chunk<P> {
    coord: ChunkCoord,
    payload: RwLock<P>,
}

/// Shared handle to a generated chunk
pub type ChunkRef<P> = Arc<Chunk<P>>;

impl<P> Chunk<P> {
    pub fn new(coord: ChunkCoord, payload: P) -> Self {
        Self {
            coord,
            payload: RwLock::new(payload),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Get read access to the payload
    pub fn read(&self) -> RwLockReadGuard<'_, P> {
        self.payload.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get write access to the payload
    pub fn write(&self) -> RwLockWriteGuard<'_, P> {
        self.payload.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the payload out of a chunk nobody else references
    pub fn into_payload(self) -> P {
        self.payload.into_inner().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<P> Dispose for ChunkRef<P> {}

impl<P> std::fmt::Debug for Chunk<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk").field("coord", &self.coord).finish_non_exhaustive()
    }
}
