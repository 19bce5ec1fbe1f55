//! # Pipeline Configuration
//!
//! Settings that shape how render lists are built and how the transform cache
//! derives its matrices. Everything here is serializable so a viewer can keep
//! it next to its scene files in TOML or RON.
//!
//! ## Configuration Categories
//!
//! - **Logging**: default log filter
//! - **Traversal**: node path depth limit, bounding-box culling
//! - **Cache**: near-plane clamping, fallback viewport

use serde::{Serialize, Deserialize};

use crate::config::{Config, ConfigError};

/// # Logging Configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default log filter (`error`, `warn`, `info`, `debug`, `trace`, or an
    /// `env_logger` directive string)
    pub level: String,
}

impl LoggingConfig {
    /// Set log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// # Transform Cache Configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Smallest allowed near plane as a fraction of the scene radius when
    /// clip planes are fitted to the scene bounds
    pub near_plane_epsilon: f32,
    /// Viewport used for projection until the first `update` supplies one
    pub default_viewport: (u32, u32),
}

impl CacheConfig {
    /// Set the near-plane clamp factor
    pub fn with_near_plane_epsilon(mut self, epsilon: f32) -> Self {
        self.near_plane_epsilon = epsilon;
        self
    }

    /// Set the fallback viewport
    pub fn with_default_viewport(mut self, width: u32, height: u32) -> Self {
        self.default_viewport = (width, height);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.near_plane_epsilon > 0.0 && self.near_plane_epsilon < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "near_plane_epsilon must be in (0, 1), got {}",
                self.near_plane_epsilon
            )));
        }
        if self.default_viewport.0 == 0 || self.default_viewport.1 == 0 {
            return Err(ConfigError::Invalid("default_viewport must be non-empty".to_string()));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            near_plane_epsilon: 1e-3,
            default_viewport: (640, 480),
        }
    }
}

/// # Complete Pipeline Configuration
///
/// Top-level configuration for render-list construction and the transform
/// cache. This is the structure applications load from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Longest node path the resolver will follow
    pub max_node_path_depth: usize,
    /// Attach a bounding-box visibility value to every draw
    pub enable_bounding_box_culling: bool,
    /// Texture units available to one pass
    pub max_texture_units: u32,
    /// Transform cache configuration
    pub cache: CacheConfig,
}

impl PipelineConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            logging: LoggingConfig::default(),
            max_node_path_depth: 32,
            enable_bounding_box_culling: true,
            max_texture_units: 16,
            cache: CacheConfig::default(),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.logging = self.logging.with_level(level);
        self
    }

    /// Set the node path depth limit
    pub fn with_max_node_path_depth(mut self, depth: usize) -> Self {
        self.max_node_path_depth = depth;
        self
    }

    /// Enable or disable bounding-box culling values on draws
    pub fn with_culling(mut self, enabled: bool) -> Self {
        self.enable_bounding_box_culling = enabled;
        self
    }

    /// Set the number of texture units a pass may bind
    pub fn with_max_texture_units(mut self, units: u32) -> Self {
        self.max_texture_units = units;
        self
    }

    /// Set the cache configuration
    pub fn with_cache(mut self, cache: CacheConfig) -> Self {
        self.cache = cache;
        self
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_node_path_depth == 0 {
            return Err(ConfigError::Invalid("max_node_path_depth must be at least 1".to_string()));
        }
        if self.max_node_path_depth > 1024 {
            return Err(ConfigError::Invalid(format!(
                "max_node_path_depth of {} is unreasonably deep",
                self.max_node_path_depth
            )));
        }
        if self.max_texture_units == 0 {
            return Err(ConfigError::Invalid("max_texture_units must be at least 1".to_string()));
        }
        self.cache.validate()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl Config for PipelineConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_depth_rejected() {
        let config = PipelineConfig::new().with_max_node_path_depth(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_zero_texture_units_rejected() {
        let config = PipelineConfig::new().with_max_texture_units(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_near_plane_epsilon_range() {
        let cache = CacheConfig::default().with_near_plane_epsilon(0.0);
        assert!(cache.validate().is_err());
        let cache = CacheConfig::default().with_near_plane_epsilon(1.5);
        assert!(cache.validate().is_err());
    }

    #[test]
    fn test_toml_partial_config_uses_defaults() {
        let text = "max_node_path_depth = 8\n[logging]\nlevel = \"debug\"\n";
        let config = PipelineConfig::from_str_with_format(text, "pipeline.toml").unwrap();

        assert_eq!(config.max_node_path_depth, 8);
        assert_eq!(config.logging.level, "debug");
        assert!(config.enable_bounding_box_culling);
        assert_eq!(config.cache, CacheConfig::default());
    }

    #[test]
    fn test_ron_config() {
        let text = "(enable_bounding_box_culling: false, cache: (near_plane_epsilon: 0.01))";
        let config = PipelineConfig::from_str_with_format(text, "pipeline.ron").unwrap();

        assert!(!config.enable_bounding_box_culling);
        assert!((config.cache.near_plane_epsilon - 0.01).abs() < f32::EPSILON);
        assert_eq!(config.cache.default_viewport, (640, 480));
    }

    #[test]
    fn test_unsupported_extension() {
        let result = PipelineConfig::from_str_with_format("", "pipeline.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let path = std::env::temp_dir().join(format!("scene_engine_config_{}.toml", std::process::id()));
        let path = path.to_string_lossy().to_string();

        let config = PipelineConfig::new().with_log_level("warn").with_max_node_path_depth(12);
        config.save_to_file(&path).unwrap();
        let loaded = PipelineConfig::load_from_file(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded, config);
    }
}
