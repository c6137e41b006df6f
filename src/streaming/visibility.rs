//! Observer-driven load/unload decisions
//!
//! A streaming pass looks at the currently loaded chunks and the observers:
//!
//! - a loaded chunk is unloaded only if *every* observer is farther from its
//!   center than that observer's scaled unloading distance
//! - candidates for loading are the 6 face neighbors of every chunk that was
//!   loaded when the pass started, plus the chunk each observer stands in; a
//!   candidate that is not loaded (or was unloaded by this same pass) is
//!   loaded if *any* observer is within its scaled loading distance
//!
//! The load frontier therefore grows by at most one chunk per pass. All
//! comparisons use squared distances.

use std::collections::HashSet;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::grid::{ChunkCoord, ChunkLayout};

/// Something whose position keeps chunks loaded
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observer {
    pub position: DVec3,
    /// Scales the loading distance for this observer
    pub load_multiplier: f64,
    /// Scales the unloading distance for this observer
    pub unload_multiplier: f64,
}

impl Observer {
    pub fn new(position: DVec3) -> Self {
        Self::with_multipliers(position, 1.0, 1.0)
    }

    pub fn with_multipliers(position: DVec3, load_multiplier: f64, unload_multiplier: f64) -> Self {
        Self {
            position,
            load_multiplier,
            unload_multiplier,
        }
    }

    fn wants_loaded(&self, center: DVec3, loading_distance: f64) -> bool {
        let radius = loading_distance * self.load_multiplier;
        self.position.distance_squared(center) <= radius * radius
    }

    fn lets_unload(&self, center: DVec3, unloading_distance: f64) -> bool {
        let radius = unloading_distance * self.unload_multiplier;
        self.position.distance_squared(center) > radius * radius
    }
}

/// Decisions of one streaming pass
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StreamingPlan {
    pub unload: Vec<ChunkCoord>,
    pub load: Vec<ChunkCoord>,
}

/// Outcome of [`ChunkEngine::update_visibility`](super::ChunkEngine::update_visibility)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VisibilityReport {
    /// Chunks whose generation was requested this pass
    pub loaded: Vec<ChunkCoord>,
    /// Chunks evicted this pass
    pub unloaded: Vec<ChunkCoord>,
}

/// Decide which chunks to unload and load
pub fn plan_pass(
    layout: &ChunkLayout,
    loaded: &[ChunkCoord],
    loading_distance: f64,
    unloading_distance: f64,
    observers: &[Observer],
) -> StreamingPlan {
    let present: HashSet<ChunkCoord> = loaded.iter().copied().collect();

    let unload: Vec<ChunkCoord> = loaded
        .iter()
        .copied()
        .filter(|&coord| {
            let center = layout.chunk_center(coord);
            observers
                .iter()
                .all(|observer| observer.lets_unload(center, unloading_distance))
        })
        .collect();

    let seeds = observers
        .iter()
        .map(|observer| layout.chunk_coord_f64(observer.position));
    let frontier = loaded.iter().flat_map(|coord| coord.neighbors());

    let mut considered = HashSet::new();
    let mut load = Vec::new();
    for candidate in seeds.chain(frontier) {
        // Chunks unloaded this pass are still in `present`, so they are not reloaded
        if present.contains(&candidate) || !considered.insert(candidate) {
            continue;
        }
        let center = layout.chunk_center(candidate);
        if observers
            .iter()
            .any(|observer| observer.wants_loaded(center, loading_distance))
        {
            load.push(candidate);
        }
    }

    StreamingPlan { unload, load }
}
