//! Single-value backend: each chunk is exactly one element

use super::ChunkBackend;
use crate::core::{Error, Result};
use crate::grid::{ChunkCoord, ChunkLayout};

/// Backend for layouts with zero bits on every axis
///
/// There is no sub-structure to mutate, so writes are unsupported; replace
/// the chunk instead.
pub struct SingleValueBackend<E, G> {
    generator: G,
    _element: std::marker::PhantomData<fn() -> E>,
}

impl<E, G> SingleValueBackend<E, G>
where
    E: Clone + Send + Sync + 'static,
    G: Fn(ChunkCoord) -> Result<E> + Send + Sync + 'static,
{
    pub fn new(generator: G) -> Self {
        Self {
            generator,
            _element: std::marker::PhantomData,
        }
    }
}

impl<E, G> ChunkBackend for SingleValueBackend<E, G>
where
    E: Clone + Send + Sync + 'static,
    G: Fn(ChunkCoord) -> Result<E> + Send + Sync + 'static,
{
    type Element = E;
    type Payload = E;

    fn validate_layout(&self, layout: &ChunkLayout) -> Result<()> {
        if layout.total_size() != 1 {
            return Err(Error::InvalidLayout(format!(
                "single-value chunks need 0 bits per axis, got {}",
                layout.bits()
            )));
        }
        Ok(())
    }

    fn create_chunk(&self, coord: ChunkCoord, _layout: &ChunkLayout) -> Result<E> {
        (self.generator)(coord)
    }

    fn get_element(&self, payload: &E, _index: usize) -> E {
        payload.clone()
    }

    fn set_element(&self, _payload: &mut E, _index: usize, _value: E) -> Result<bool> {
        Err(Error::Unsupported("single-value chunks cannot be mutated in place"))
    }
}
