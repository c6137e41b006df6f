//! Chunk storage backends
//!
//! A backend decides how one chunk's elements are represented and how the
//! user-supplied generator fills a fresh chunk. All backends address elements
//! by the flat index from [`ChunkLayout::encode`](crate::grid::ChunkLayout::encode).
//!
//! - [`DenseBackend`]: `Vec<E>` pre-filled with a default (plus the
//!   [`ByteBackend`] / [`IntBackend`] primitive aliases)
//! - [`SparseBackend`]: index map, unmapped indices read as the default
//! - [`SingleValueBackend`]: the whole chunk is one element

pub mod dense;
pub mod sparse;
pub mod single;
pub mod pool;

pub use dense::{ByteBackend, DenseBackend, IntBackend};
pub use sparse::{SparseBackend, SparseChunk};
pub use single::SingleValueBackend;
pub use pool::BufferPool;

use crate::core::Result;
use crate::grid::{ChunkCoord, ChunkLayout};

/// Storage strategy for one chunk's payload
pub trait ChunkBackend: Send + Sync + 'static {
    /// Element type seen by callers
    type Element: Clone + Send + Sync + 'static;
    /// Backend-specific representation of a whole chunk
    type Payload: Send + Sync + 'static;

    /// Reject layouts the backend cannot represent
    fn validate_layout(&self, _layout: &ChunkLayout) -> Result<()> {
        Ok(())
    }

    /// Allocate a payload for `coord` and run the generator on it
    fn create_chunk(&self, coord: ChunkCoord, layout: &ChunkLayout) -> Result<Self::Payload>;

    fn get_element(&self, payload: &Self::Payload, index: usize) -> Self::Element;

    /// Write one element
    ///
    /// `Ok(false)` is a normal rejected write; backends without addressable
    /// sub-structure return [`Error::Unsupported`](crate::core::Error::Unsupported).
    fn set_element(
        &self,
        payload: &mut Self::Payload,
        index: usize,
        value: Self::Element,
    ) -> Result<bool>;

    /// Take back a payload of an evicted chunk
    fn recycle(&self, _payload: Self::Payload) {}
}
