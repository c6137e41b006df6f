//! Sparse map backend

use std::collections::HashMap;

use super::ChunkBackend;
use crate::core::Result;
use crate::grid::{ChunkCoord, ChunkLayout};

/// Index-to-element map; unmapped indices read as the backend default
#[derive(Clone, Debug, Default)]
pub struct SparseChunk<E> {
    entries: HashMap<u32, E>,
}

impl<E> SparseChunk<E> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn get(&self, index: usize) -> Option<&E> {
        self.entries.get(&(index as u32))
    }

    pub fn insert(&mut self, index: usize, value: E) -> Option<E> {
        self.entries.insert(index as u32, value)
    }

    pub fn remove(&mut self, index: usize) -> Option<E> {
        self.entries.remove(&(index as u32))
    }

    /// Number of explicitly stored entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &E)> {
        self.entries.iter().map(|(&i, e)| (i as usize, e))
    }
}

/// Backend storing only written elements
pub struct SparseBackend<E, G> {
    default: E,
    generator: G,
}

impl<E, G> SparseBackend<E, G>
where
    E: Clone + Send + Sync + 'static,
    G: Fn(ChunkCoord, &ChunkLayout, &mut SparseChunk<E>) -> Result<()> + Send + Sync + 'static,
{
    pub fn new(default: E, generator: G) -> Self {
        Self { default, generator }
    }

    pub fn default_element(&self) -> &E {
        &self.default
    }
}

impl<E, G> ChunkBackend for SparseBackend<E, G>
where
    E: Clone + Send + Sync + 'static,
    G: Fn(ChunkCoord, &ChunkLayout, &mut SparseChunk<E>) -> Result<()> + Send + Sync + 'static,
{
    type Element = E;
    type Payload = SparseChunk<E>;

    fn create_chunk(&self, coord: ChunkCoord, layout: &ChunkLayout) -> Result<SparseChunk<E>> {
        let mut chunk = SparseChunk::new();
        (self.generator)(coord, layout, &mut chunk)?;
        Ok(chunk)
    }

    fn get_element(&self, payload: &SparseChunk<E>, index: usize) -> E {
        payload
            .get(index)
            .cloned()
            .unwrap_or_else(|| self.default.clone())
    }

    fn set_element(&self, payload: &mut SparseChunk<E>, index: usize, value: E) -> Result<bool> {
        payload.insert(index, value);
        Ok(true)
    }
}
