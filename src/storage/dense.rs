//! Dense array backend

use std::sync::Arc;

use super::pool::BufferPool;
use super::ChunkBackend;
use crate::core::Result;
use crate::grid::{ChunkCoord, ChunkLayout};

/// Dense backend over bytes (block ids and similar)
pub type ByteBackend<G> = DenseBackend<u8, G>;

/// Dense backend over 32-bit integers
pub type IntBackend<G> = DenseBackend<i32, G>;

/// Payload is a `Vec<E>` of `total_size` elements, pre-filled with `default`
///
/// The generator receives the chunk coordinate, the layout, and the buffer to
/// fill; index it with [`ChunkLayout::encode`].
pub struct DenseBackend<E, G> {
    default: E,
    generator: G,
    pool: Option<Arc<BufferPool<E>>>,
}

impl<E, G> DenseBackend<E, G>
where
    E: Clone + Send + Sync + 'static,
    G: Fn(ChunkCoord, &ChunkLayout, &mut [E]) -> Result<()> + Send + Sync + 'static,
{
    pub fn new(default: E, generator: G) -> Self {
        Self {
            default,
            generator,
            pool: None,
        }
    }

    /// Allocate chunk buffers from `pool` and return evicted ones to it
    pub fn with_pool(mut self, pool: Arc<BufferPool<E>>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn default_element(&self) -> &E {
        &self.default
    }

    fn allocate(&self, len: usize) -> Vec<E> {
        match &self.pool {
            Some(pool) => pool.take(len, &self.default),
            None => vec![self.default.clone(); len],
        }
    }
}

impl<E, G> ChunkBackend for DenseBackend<E, G>
where
    E: Clone + Send + Sync + 'static,
    G: Fn(ChunkCoord, &ChunkLayout, &mut [E]) -> Result<()> + Send + Sync + 'static,
{
    type Element = E;
    type Payload = Vec<E>;

    fn create_chunk(&self, coord: ChunkCoord, layout: &ChunkLayout) -> Result<Vec<E>> {
        let mut buffer = self.allocate(layout.total_size());
        match (self.generator)(coord, layout, &mut buffer) {
            Ok(()) => Ok(buffer),
            Err(e) => {
                self.recycle(buffer);
                Err(e)
            }
        }
    }

    fn get_element(&self, payload: &Vec<E>, index: usize) -> E {
        payload
            .get(index)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    fn set_element(&self, payload: &mut Vec<E>, index: usize, value: E) -> Result<bool> {
        match payload.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn recycle(&self, payload: Vec<E>) {
        if let Some(pool) = &self.pool {
            pool.give(payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;

    fn layered(coord: ChunkCoord, layout: &ChunkLayout, chunk: &mut [u8]) -> Result<()> {
        // Solid below y = 0
        if coord.y < 0 {
            chunk.fill(1);
            return Ok(());
        }
        for x in 0..layout.size_x() {
            for z in 0..layout.size_z() {
                chunk[layout.encode(x, 0, z)] = 2;
            }
        }
        Ok(())
    }

    #[test]
    fn test_create_fills_default_then_generates() {
        let backend = ByteBackend::new(0, layered);
        let layout = ChunkLayout::cubic(2).unwrap();

        let above = backend.create_chunk(ChunkCoord::new(0, 0, 0), &layout).unwrap();
        assert_eq!(above.len(), layout.total_size());
        assert_eq!(backend.get_element(&above, layout.encode(1, 0, 3)), 2);
        assert_eq!(backend.get_element(&above, layout.encode(1, 1, 3)), 0);

        let below = backend.create_chunk(ChunkCoord::new(0, -1, 0), &layout).unwrap();
        assert!(below.iter().all(|&b| b == 1));
    }

    #[test]
    fn test_set_then_get() {
        let backend = IntBackend::new(-1, |_, _, _: &mut [i32]| Ok(()));
        let layout = ChunkLayout::new(1, 2, 3).unwrap();
        let mut chunk = backend.create_chunk(ChunkCoord::default(), &layout).unwrap();

        for index in 0..layout.total_size() {
            assert_eq!(backend.get_element(&chunk, index), -1);
            assert!(backend.set_element(&mut chunk, index, index as i32 * 3).unwrap());
            assert_eq!(backend.get_element(&chunk, index), index as i32 * 3);
        }
        assert!(!backend.set_element(&mut chunk, layout.total_size(), 5).unwrap());
    }

    #[test]
    fn test_generic_elements() {
        let backend = DenseBackend::new(String::from("air"), |coord, _, chunk: &mut [String]| {
            chunk[0] = format!("origin of {coord}");
            Ok(())
        });
        let layout = ChunkLayout::cubic(1).unwrap();
        let chunk = backend.create_chunk(ChunkCoord::new(1, 2, 3), &layout).unwrap();
        assert_eq!(backend.get_element(&chunk, 0), "origin of [1, 2, 3]");
        assert_eq!(backend.get_element(&chunk, 7), "air");
    }

    #[test]
    fn test_pool_reuse_and_failed_generation() {
        let pool = Arc::new(BufferPool::new(4));
        let backend = ByteBackend::new(0, |coord, _, _: &mut [u8]| {
            if coord.x < 0 {
                Err(Error::Generation(format!("no terrain at {coord}")))
            } else {
                Ok(())
            }
        })
        .with_pool(Arc::clone(&pool));
        let layout = ChunkLayout::cubic(2).unwrap();

        assert!(backend.create_chunk(ChunkCoord::new(-1, 0, 0), &layout).is_err());
        assert_eq!(pool.len(), 1, "failed buffer goes back to the pool");

        let chunk = backend.create_chunk(ChunkCoord::new(0, 0, 0), &layout).unwrap();
        assert_eq!(pool.reuse_count(), 1);
        backend.recycle(chunk);
        assert_eq!(pool.len(), 1);
    }
}
