//! Chunk engine: lazy chunk generation, element access, and streaming
//!
//! The engine owns a [`ChunkLayout`], a [`ChunkBackend`] and a
//! [`KeyedAsyncCache`] of chunk results. Chunks are generated on first use
//! (when the caller asks for it) and evicted by streaming passes, idle sweeps,
//! explicit removal, or teardown.
//!
//! Membership of the chunk set is guarded by a `RwLock<()>`: point and region
//! access hold the shared side while registering or looking up a chunk;
//! streaming passes, sweeps, removal and teardown hold the exclusive side for
//! their whole snapshot-decide-apply sequence. Blocking waits on chunk results
//! always happen after the guard is released.
//!
//! With [`GenerationMode::Inline`](super::GenerationMode::Inline) the generator
//! runs while the guard is held, and so do the continuations it settles:
//! callbacks registered on a pending chunk result (`on_settled`, `then`, the
//! `*_async` accessors, `chunks_async`) fire on the generating thread before
//! the guard is released. Neither generators nor such continuations may call
//! back into the engine; a continuation calling [`ChunkEngine::remove_chunk`],
//! [`ChunkEngine::stream`] or [`ChunkEngine::destroy`] deadlocks. With
//! `ThreadPool` generation they run on a rayon worker that holds no guard.
//! Visitors passed to [`ChunkEngine::process`] run under the chunk's read lock
//! and must not write to that chunk.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;

use glam::{DVec3, IVec3};

use super::cache::{Generator, KeyedAsyncCache, TimedCache};
use super::chunk::{Chunk, ChunkRef};
use super::config::EngineConfig;
use super::visibility::{plan_pass, Observer, VisibilityReport};
use crate::core::Result;
use crate::grid::{ChunkCoord, ChunkLayout, Region, Tile};
use crate::promise::{map_list, AsyncResult};
use crate::storage::ChunkBackend;

/// Shared chunk handle for a backend's payload type
pub type BackendChunk<B> = ChunkRef<<B as ChunkBackend>::Payload>;

/// Chunked grid with lazy generation and observer-driven streaming
///
/// Generic over the storage backend `B` and the chunk cache `C`. The engine
/// is `Send + Sync` and is meant to be shared behind an `Arc`.
pub struct ChunkEngine<B: ChunkBackend, C = TimedCache<ChunkCoord, BackendChunk<B>>> {
    /// Chunk dimensions, fixed for the engine's lifetime
    layout: ChunkLayout,
    /// Shared with generation jobs and async continuations
    backend: Arc<B>,
    /// Chunk results by coordinate
    cache: C,
    config: EngineConfig,
    /// Guards chunk-set membership, not chunk contents
    membership: RwLock<()>,
}

impl<B: ChunkBackend> ChunkEngine<B> {
    /// Create an engine backed by a [`TimedCache`] in the configured mode
    ///
    /// # Arguments
    /// * `backend` - Storage strategy and chunk generator
    /// * `config` - Layout, idle timeout, generation mode and default distances
    ///
    /// # Returns
    /// The engine, or an error if the config is invalid or the backend
    /// rejects the layout
    pub fn new(backend: B, config: EngineConfig) -> Result<Self> {
        let cache = TimedCache::new(config.generation);
        Self::with_cache(backend, config, cache)
    }
}

impl<B, C> ChunkEngine<B, C>
where
    B: ChunkBackend,
    C: KeyedAsyncCache<ChunkCoord, BackendChunk<B>>,
{
    /// Create an engine with a caller-supplied cache
    ///
    /// Fails if the config is invalid or the backend rejects its layout.
    pub fn with_cache(backend: B, config: EngineConfig, cache: C) -> Result<Self> {
        config.validate()?;
        let layout = config.layout()?;
        backend.validate_layout(&layout)?;

        let size = layout.size();
        log::info!(
            "Chunk engine ready: {}x{}x{} elements per chunk, idle timeout {:?}",
            size.x,
            size.y,
            size.z,
            config.idle_timeout()
        );

        Ok(Self {
            layout,
            backend: Arc::new(backend),
            cache,
            config,
            membership: RwLock::new(()),
        })
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn shared(&self) -> RwLockReadGuard<'_, ()> {
        self.membership.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, ()> {
        self.membership.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn generator(&self) -> Generator<ChunkCoord, BackendChunk<B>> {
        let backend = Arc::clone(&self.backend);
        let layout = self.layout;
        Box::new(move |coord| {
            let payload = backend.create_chunk(coord, &layout)?;
            Ok(Arc::new(Chunk::new(coord, payload)))
        })
    }

    /// Register (or find) a chunk; caller holds a membership guard
    fn request(&self, coord: ChunkCoord) -> AsyncResult<BackendChunk<B>> {
        self.cache
            .get_or_create(coord, self.config.idle_timeout(), self.generator())
    }

    /// Hand an evicted chunk's payload back to the backend
    ///
    /// Only possible when nobody else holds the chunk or its result.
    fn release(&self, result: AsyncResult<BackendChunk<B>>) {
        let Some(Ok(chunk)) = result.try_get() else {
            return;
        };
        drop(result);
        if let Ok(chunk) = Arc::try_unwrap(chunk) {
            self.backend.recycle(chunk.into_payload());
        }
    }

    /// Result for the chunk at `coord`
    ///
    /// Returns `None` without touching the chunk set when the chunk is absent
    /// and `generate` is false.
    pub fn get_chunk(
        &self,
        coord: ChunkCoord,
        generate: bool,
    ) -> Option<AsyncResult<BackendChunk<B>>> {
        let _guard = self.shared();
        if generate {
            Some(self.request(coord))
        } else {
            self.cache.get_if_present(&coord)
        }
    }

    /// Result for the chunk containing a global coordinate
    pub fn get_chunk_at(
        &self,
        global: IVec3,
        generate: bool,
    ) -> Option<AsyncResult<BackendChunk<B>>> {
        self.get_chunk(self.layout.chunk_coord(global), generate)
    }

    /// Result for the chunk containing a floating-point position
    pub fn get_chunk_at_f64(
        &self,
        position: DVec3,
        generate: bool,
    ) -> Option<AsyncResult<BackendChunk<B>>> {
        self.get_chunk(self.layout.chunk_coord_f64(position), generate)
    }

    /// Read one element, blocking until its chunk is generated
    ///
    /// # Arguments
    /// * `global` - Global element coordinate
    /// * `generate` - Generate the chunk if it is absent
    ///
    /// # Returns
    /// `Ok(None)` when the chunk is absent and `generate` is false, the
    /// generation error if the chunk failed to generate, else the element
    pub fn get_element_at(&self, global: IVec3, generate: bool) -> Result<Option<B::Element>> {
        let Some(result) = self.get_chunk_at(global, generate) else {
            return Ok(None);
        };
        let chunk = result.wait()?;
        let index = self.layout.local_index(global);
        let value = self.backend.get_element(&chunk.read(), index);
        Ok(Some(value))
    }

    /// Read one element once its chunk is available, without blocking
    pub fn get_element_at_async(
        &self,
        global: IVec3,
        generate: bool,
    ) -> Option<AsyncResult<B::Element>> {
        let result = self.get_chunk_at(global, generate)?;
        let backend = Arc::clone(&self.backend);
        let index = self.layout.local_index(global);
        Some(result.then(move |chunk| {
            let value = backend.get_element(&chunk.read(), index);
            Ok(value)
        }))
    }

    /// Write one element, blocking until its chunk is generated
    ///
    /// `Ok(false)` when the chunk is absent and `generate` is false, or when
    /// the backend rejects the write.
    pub fn set_element_at(&self, global: IVec3, generate: bool, value: B::Element) -> Result<bool> {
        let Some(result) = self.get_chunk_at(global, generate) else {
            return Ok(false);
        };
        let chunk = result.wait()?;
        let index = self.layout.local_index(global);
        let written = self.backend.set_element(&mut *chunk.write(), index, value)?;
        Ok(written)
    }

    /// Write one element once its chunk is available, without blocking
    pub fn set_element_at_async(
        &self,
        global: IVec3,
        generate: bool,
        value: B::Element,
    ) -> Option<AsyncResult<bool>> {
        let result = self.get_chunk_at(global, generate)?;
        let backend = Arc::clone(&self.backend);
        let index = self.layout.local_index(global);
        Some(result.then(move |chunk| {
            let mut payload = chunk.write();
            backend.set_element(&mut payload, index, value)
        }))
    }

    /// Request every chunk a region touches before visiting any of them
    fn region_chunks(
        &self,
        region: Region,
        generate: bool,
    ) -> Vec<(Tile, AsyncResult<BackendChunk<B>>)> {
        let _guard = self.shared();
        region
            .tiles(self.layout)
            .filter_map(|tile| {
                let result = if generate {
                    Some(self.request(tile.coord))
                } else {
                    self.cache.get_if_present(&tile.coord)
                };
                result.map(|result| (tile, result))
            })
            .collect()
    }

    /// Visit every element of a region exactly once
    ///
    /// Every touched chunk is requested up front, so pooled generation runs in
    /// parallel. Chunks are then walked one at a time under a single read lock
    /// each.
    ///
    /// # Arguments
    /// * `region` - Half-open box of global coordinates
    /// * `generate` - Generate absent chunks; otherwise they are skipped
    /// * `visitor` - Called with each global coordinate and its element
    ///
    /// # Returns
    /// The first chunk generation error, if any; elements visited before it
    /// stay visited
    pub fn process<F>(&self, region: Region, generate: bool, mut visitor: F) -> Result<()>
    where
        F: FnMut(IVec3, &B::Element),
    {
        for (tile, result) in self.region_chunks(region, generate) {
            let chunk = result.wait()?;
            let payload = chunk.read();
            for y in tile.lo.y..tile.hi.y {
                for z in tile.lo.z..tile.hi.z {
                    for x in tile.lo.x..tile.hi.x {
                        let value = self.backend.get_element(&payload, self.layout.encode(x, y, z));
                        let global = tile.origin + IVec3::new(x as i32, y as i32, z as i32);
                        visitor(global, &value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Overwrite every element of a region with `fill(global)`
    ///
    /// # Arguments
    /// * `region` - Half-open box of global coordinates
    /// * `generate` - Generate absent chunks; otherwise they are skipped
    /// * `fill` - Produces the new element for a global coordinate
    ///
    /// # Returns
    /// Number of writes the backend accepted, or the first generation or
    /// backend error
    pub fn fill_region<F>(&self, region: Region, generate: bool, mut fill: F) -> Result<usize>
    where
        F: FnMut(IVec3) -> B::Element,
    {
        let mut written = 0;
        for (tile, result) in self.region_chunks(region, generate) {
            let chunk = result.wait()?;
            let mut payload = chunk.write();
            for y in tile.lo.y..tile.hi.y {
                for z in tile.lo.z..tile.hi.z {
                    for x in tile.lo.x..tile.hi.x {
                        let global = tile.origin + IVec3::new(x as i32, y as i32, z as i32);
                        let index = self.layout.encode(x, y, z);
                        if self.backend.set_element(&mut payload, index, fill(global))? {
                            written += 1;
                        }
                    }
                }
            }
        }
        Ok(written)
    }

    /// Generate (or find) several chunks and join them in input order
    pub fn chunks_async(&self, coords: &[ChunkCoord]) -> AsyncResult<Vec<BackendChunk<B>>> {
        let _guard = self.shared();
        map_list(coords.to_vec(), |_, coord| self.request(coord))
    }

    /// Run one streaming pass
    ///
    /// Unloads chunks every observer has left behind and requests generation
    /// of frontier chunks any observer is close to. See [`plan_pass`] for the
    /// exact rules. Generation is only requested; with pooled generation the
    /// loaded chunks may still be pending when this returns.
    ///
    /// # Arguments
    /// * `loading_distance` - Base load radius, scaled per observer
    /// * `unloading_distance` - Base unload radius, scaled per observer
    /// * `observers` - Everything that keeps chunks loaded
    ///
    /// # Returns
    /// The chunks requested and evicted by this pass
    pub fn update_visibility(
        &self,
        loading_distance: f64,
        unloading_distance: f64,
        observers: &[Observer],
    ) -> VisibilityReport {
        let started = Instant::now();
        let _guard = self.exclusive();

        let loaded = self.cache.keys();
        let plan = plan_pass(
            &self.layout,
            &loaded,
            loading_distance,
            unloading_distance,
            observers,
        );

        for coord in &plan.unload {
            if let Some(result) = self.cache.remove(coord) {
                self.release(result);
            }
        }
        for &coord in &plan.load {
            self.request(coord);
        }

        log::debug!(
            "Streaming pass: {} loaded, {} unloaded, {} resident ({} observers, {:?})",
            plan.load.len(),
            plan.unload.len(),
            self.cache.len(),
            observers.len(),
            started.elapsed()
        );

        VisibilityReport {
            loaded: plan.load,
            unloaded: plan.unload,
        }
    }

    /// Streaming pass with the configured distances
    pub fn stream(&self, observers: &[Observer]) -> VisibilityReport {
        self.update_visibility(
            self.config.loading_distance,
            self.config.unloading_distance,
            observers,
        )
    }

    /// Put a ready-made chunk into the set, replacing whatever was there
    ///
    /// This is the only way to change a chunk whose backend rejects element
    /// writes (single-value chunks). The replaced chunk is released like an
    /// evicted one; a generation still in flight for it settles its own waiters
    /// but no longer affects the set.
    ///
    /// # Arguments
    /// * `coord` - Chunk to replace
    /// * `payload` - Complete payload for the new chunk
    ///
    /// # Returns
    /// `true` if a chunk was replaced, `false` if the coordinate was empty
    pub fn replace_chunk(&self, coord: ChunkCoord, payload: B::Payload) -> bool {
        let chunk = Arc::new(Chunk::new(coord, payload));
        let _guard = self.exclusive();
        match self.cache.insert(coord, chunk, self.config.idle_timeout()) {
            Some(old) => {
                self.release(old);
                log::trace!("Replaced chunk {}", coord);
                true
            }
            None => false,
        }
    }

    /// Drop a chunk from the set; a later access regenerates it
    pub fn remove_chunk(&self, coord: ChunkCoord) -> Option<AsyncResult<BackendChunk<B>>> {
        let _guard = self.exclusive();
        let removed = self.cache.remove(&coord);
        if removed.is_some() {
            log::trace!("Removed chunk {}", coord);
        }
        removed
    }

    /// Evict settled chunks that have been idle past their timeout
    pub fn evict_idle(&self) -> usize {
        let _guard = self.exclusive();
        let expired = self.cache.evict_expired(Instant::now());
        let count = expired.len();
        for (_, result) in expired {
            self.release(result);
        }
        if count > 0 {
            log::debug!("Evicted {} idle chunks", count);
        }
        count
    }

    /// Evict every chunk
    pub fn destroy(&self) -> usize {
        let _guard = self.exclusive();
        let all = self.cache.clear();
        let count = all.len();
        for (_, result) in all {
            self.release(result);
        }
        log::info!("Chunk engine destroyed, {} chunks released", count);
        count
    }

    /// Coordinates of every chunk in the set, generated or in flight
    pub fn loaded_chunks(&self) -> Vec<ChunkCoord> {
        self.cache.keys()
    }

    pub fn chunk_count(&self) -> usize {
        self.cache.len()
    }
}
