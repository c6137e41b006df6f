//! Chunk caching, generation and observer-driven streaming

pub mod cache;
pub mod chunk;
pub mod config;
pub mod engine;
pub mod visibility;

pub use cache::{GenerationMode, Generator, KeyedAsyncCache, TimedCache};
pub use chunk::{Chunk, ChunkRef};
pub use config::EngineConfig;
pub use engine::{BackendChunk, ChunkEngine};
pub use visibility::{plan_pass, Observer, StreamingPlan, VisibilityReport};
