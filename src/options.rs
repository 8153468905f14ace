//! Engine configuration with TOML preset support.
//!
//! All tweakable knobs (capacity, cluster resolution, LOD bias, tile span,
//! sorting behavior) are consolidated here. Options serialize to/from TOML
//! so hosts can ship quality presets.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CandelaError;

/// Default light capacity.
pub const DEFAULT_MAX_LIGHTS: u32 = 32_800;

/// Default LOD distance bias (1.0 = stock thresholds, >1.0 = higher
/// quality at distance).
pub const DEFAULT_LOD_BIAS: f32 = 1.0;

/// Default maximum tile span for the light proxy rasterization.
pub const DEFAULT_MAX_TILE_SPAN: f32 = 12.0;

/// Engine options. All fields use `#[serde(default)]` so partial TOML files
/// (e.g. only overriding `max_lights`) work correctly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineOptions {
    /// Hard cap on the total light count across all kinds.
    pub max_lights: u32,
    /// Multiplier on light radius during LOD classification. Values above
    /// 1.0 keep lights at higher quality tiers further away.
    pub lod_bias: f32,
    /// Maximum number of screen tiles a single light proxy may span.
    /// Clamped to [8, 32] when read.
    pub max_tile_span: f32,
    /// Explicit cluster grid resolution `[x, y, z]`. `None` selects a
    /// resolution from the live light count.
    pub cluster_resolution: Option<[u32; 3]>,
    /// Build the 8x8 super-tile reduction and emit the matching traversal
    /// code. Rarely a win at high light counts.
    pub enable_super_master: bool,
    /// Defer Morton re-sorting until the next `update()` instead of sorting
    /// eagerly after each add or base-position change.
    pub defer_sorting: bool,
    /// Budget for the fixed CPU-side allocations (light arrays, sort
    /// scratch, packed texture staging).
    pub memory_budget_bytes: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            max_lights: DEFAULT_MAX_LIGHTS,
            lod_bias: DEFAULT_LOD_BIAS,
            max_tile_span: DEFAULT_MAX_TILE_SPAN,
            cluster_resolution: None,
            enable_super_master: false,
            defer_sorting: false,
            memory_budget_bytes: 256 * 1024 * 1024,
        }
    }
}

impl EngineOptions {
    /// The tile span with the engine's [8, 32] clamp applied.
    #[must_use]
    pub fn tile_span(&self) -> f32 {
        self.max_tile_span.clamp(8.0, 32.0)
    }

    /// Load options from a TOML file. Missing fields use defaults.
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError`] on I/O or parse failure.
    pub fn load(path: &Path) -> Result<Self, CandelaError> {
        let content = std::fs::read_to_string(path).map_err(CandelaError::Io)?;
        toml::from_str(&content)
            .map_err(|e| CandelaError::OptionsParse(e.to_string()))
    }

    /// Save options to a TOML file (pretty-printed).
    ///
    /// # Errors
    ///
    /// Returns [`CandelaError`] on I/O or serialization failure.
    pub fn save(&self, path: &Path) -> Result<(), CandelaError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| CandelaError::OptionsParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(CandelaError::Io)?;
        }
        std::fs::write(path, content).map_err(CandelaError::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_round_trips_through_toml() {
        let opts = EngineOptions::default();
        let toml_str = toml::to_string_pretty(&opts).unwrap();
        let parsed: EngineOptions = toml::from_str(&toml_str).unwrap();
        assert_eq!(opts, parsed);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let toml_str = r"
max_lights = 1024
enable_super_master = true
";
        let opts: EngineOptions = toml::from_str(toml_str).unwrap();
        assert_eq!(opts.max_lights, 1024);
        assert!(opts.enable_super_master);
        // Everything else should be default
        assert_eq!(opts.lod_bias, DEFAULT_LOD_BIAS);
        assert_eq!(opts.max_tile_span, DEFAULT_MAX_TILE_SPAN);
        assert_eq!(opts.cluster_resolution, None);
    }

    #[test]
    fn tile_span_is_clamped() {
        let mut opts = EngineOptions::default();
        assert_eq!(opts.tile_span(), 12.0);
        opts.max_tile_span = 2.0;
        assert_eq!(opts.tile_span(), 8.0);
        opts.max_tile_span = 100.0;
        assert_eq!(opts.tile_span(), 32.0);
    }
}
