//! Streaming demo: noise terrain around a few moving observers.
//!
//! Usage: cargo run --release --bin stream_demo -- [OPTIONS]
//!
//! Options:
//!   --config <PATH>   EngineConfig JSON (default: built-in defaults, thread pool generation)
//!   --steps <N>       Streaming passes to run (default: 40)
//!   --seed <SEED>     Terrain noise seed (default: 12345)
//!   --speed <M>       Distance each observer moves per pass (default: 12.0)
//!
//! Set RUST_LOG=gridcache=debug to see every streaming pass.

use std::sync::Arc;
use std::time::Instant;

use glam::{DVec3, IVec3};
use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use gridcache::core::logging;
use gridcache::grid::{ChunkCoord, ChunkLayout, Region};
use gridcache::storage::{BufferPool, ByteBackend};
use gridcache::streaming::{ChunkEngine, EngineConfig, GenerationMode, Observer};
use gridcache::Result;

const AIR: u8 = 0;
const STONE: u8 = 1;
const DIRT: u8 = 2;
const GRASS: u8 = 3;

/// Heightmap terrain: stone, a few layers of dirt, one layer of grass
fn terrain(seed: u32) -> impl Fn(ChunkCoord, &ChunkLayout, &mut [u8]) -> Result<()> + Send + Sync + 'static {
    let height = Fbm::<Perlin>::new(seed)
        .set_octaves(4)
        .set_frequency(0.01)
        .set_persistence(0.5);

    move |coord: ChunkCoord, layout: &ChunkLayout, chunk: &mut [u8]| {
        let origin = layout.chunk_origin(coord);
        for z in 0..layout.size_z() {
            for x in 0..layout.size_x() {
                let wx = (origin.x + x as i32) as f64;
                let wz = (origin.z + z as i32) as f64;
                let surface = (height.get([wx, wz]) * 24.0) as i32;

                for y in 0..layout.size_y() {
                    let wy = origin.y + y as i32;
                    chunk[layout.encode(x, y, z)] = match surface - wy {
                        depth if depth > 3 => STONE,
                        depth if depth > 0 => DIRT,
                        0 => GRASS,
                        _ => AIR,
                    };
                }
            }
        }
        Ok(())
    }
}

fn main() {
    logging::init();

    if let Err(e) = run() {
        log::error!("stream_demo failed: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let steps = parse_usize_arg(&args, "--steps").unwrap_or(40);
    let seed = parse_u32_arg(&args, "--seed").unwrap_or(12345);
    let speed = parse_f64_arg(&args, "--speed").unwrap_or(12.0);

    let config = match parse_str_arg(&args, "--config") {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig {
            bits: [4, 4, 4],
            generation: GenerationMode::ThreadPool,
            ..EngineConfig::default()
        },
    };

    let pool = Arc::new(BufferPool::new(256));
    let backend = ByteBackend::new(AIR, terrain(seed)).with_pool(Arc::clone(&pool));
    let engine = ChunkEngine::new(backend, config)?;

    // Prewarm the spawn area through the async interface
    let spawn: Vec<ChunkCoord> = (-1..=1)
        .flat_map(|x| (-1..=1).map(move |z| ChunkCoord::new(x, 0, z)))
        .collect();
    let runtime = tokio::runtime::Runtime::new()?;
    let warmed = runtime.block_on(engine.chunks_async(&spawn).into_future())?;
    log::info!("Prewarmed {} spawn chunks", warmed.len());

    let mut observers = vec![
        Observer::new(DVec3::new(0.0, 8.0, 0.0)),
        Observer::with_multipliers(DVec3::new(40.0, 8.0, -40.0), 0.5, 0.75),
    ];
    let headings = [DVec3::new(1.0, 0.0, 0.25), DVec3::new(-0.5, 0.0, 1.0)];

    let started = Instant::now();
    let mut total_loaded = 0;
    let mut total_unloaded = 0;
    for step in 0..steps {
        for (observer, heading) in observers.iter_mut().zip(headings) {
            observer.position += heading.normalize() * speed;
        }

        let report = engine.stream(&observers);
        total_loaded += report.loaded.len();
        total_unloaded += report.unloaded.len();

        if step % 10 == 0 {
            log::info!(
                "Pass {}: {} resident, +{} -{}",
                step,
                engine.chunk_count(),
                report.loaded.len(),
                report.unloaded.len()
            );
        }
    }
    log::info!(
        "{} passes in {:?}: {} chunks loaded, {} unloaded, {} buffers reused",
        steps,
        started.elapsed(),
        total_loaded,
        total_unloaded,
        pool.reuse_count()
    );

    // Count surface blocks and dig a pit around the first observer
    let center = observers[0].position.floor().as_ivec3();
    let area = Region::new(center - IVec3::new(16, 32, 16), center + IVec3::new(16, 32, 16));
    let mut grass = 0usize;
    engine.process(area, true, |_, block| {
        if *block == GRASS {
            grass += 1;
        }
    })?;
    let pit = Region::new(center - IVec3::new(4, 8, 4), center + IVec3::new(4, 1, 4));
    let dug = engine.fill_region(pit, true, |_| AIR)?;
    log::info!("{} grass blocks around {}, dug out {} blocks", grass, center, dug);

    if let Some(block) = engine.get_element_at(center, false)? {
        log::info!("Block under observer after digging: {}", block);
    }

    let released = engine.destroy();
    log::info!("Released {} chunks, pool holds {} buffers", released, pool.len());
    Ok(())
}

fn parse_f64_arg(args: &[String], flag: &str) -> Option<f64> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_usize_arg(args: &[String], flag: &str) -> Option<usize> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
