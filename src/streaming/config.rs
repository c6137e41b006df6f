//! Engine configuration

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::cache::GenerationMode;
use crate::core::{Error, Result};
use crate::grid::ChunkLayout;

/// Configuration for a [`ChunkEngine`](super::ChunkEngine)
///
/// Every field has a default, so a JSON file only needs the fields it changes:
///
/// ```json
/// { "bits": [4, 4, 4], "generation": "thread_pool" }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Chunk extent as powers of two per axis (x, y, z)
    pub bits: [u32; 3],
    /// Idle time after which an untouched chunk may be swept
    pub idle_timeout_ms: u64,
    /// Where the bundled cache runs chunk generators
    pub generation: GenerationMode,
    /// Default load radius for streaming passes
    pub loading_distance: f64,
    /// Default unload radius for streaming passes
    pub unloading_distance: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bits: [5, 5, 5],          // 32^3 elements per chunk
            idle_timeout_ms: 10_000,
            generation: GenerationMode::Inline,
            loading_distance: 64.0,
            unloading_distance: 96.0, // Hysteresis gap keeps edge chunks from thrashing
        }
    }
}

impl EngineConfig {
    pub fn layout(&self) -> Result<ChunkLayout> {
        let [x, y, z] = self.bits;
        ChunkLayout::new(x, y, z)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        self.layout()?;
        for (name, value) in [
            ("loading_distance", self.loading_distance),
            ("unloading_distance", self.unloading_distance),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::Config(format!("{name} must be finite and >= 0, got {value}")));
            }
        }
        if self.unloading_distance < self.loading_distance {
            log::warn!(
                "unloading_distance {} is below loading_distance {}; edge chunks will reload every pass",
                self.unloading_distance,
                self.loading_distance
            );
        }
        Ok(())
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&text)?;
        log::info!("Loaded engine config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.layout().unwrap().total_size(), 32 * 32 * 32);
        assert_eq!(config.idle_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{ "bits": [4, 3, 2], "generation": "thread_pool" }"#).unwrap();
        assert_eq!(config.bits, [4, 3, 2]);
        assert_eq!(config.generation, GenerationMode::ThreadPool);
        assert_eq!(config.idle_timeout_ms, EngineConfig::default().idle_timeout_ms);
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "bits": [12, 12, 12] }"#),
            Err(Error::InvalidLayout(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{ "loading_distance": -1.0 }"#),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            EngineConfig::from_json_str("{ not json"),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "idle_timeout_ms": 250, "unloading_distance": 200.0 }}"#).unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.idle_timeout(), Duration::from_millis(250));
        assert_eq!(config.unloading_distance, 200.0);

        let missing = EngineConfig::load(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
