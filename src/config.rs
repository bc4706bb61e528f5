// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! Render configuration
//!
//! Read from `frepkit.toml` when present, then overridden by `FREP_*`
//! environment variables.

use crate::geometry::Region;
use crate::render::{RenderSettings, SurfaceNets};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Default config file name, looked up in the working directory
pub const CONFIG_FILE: &str = "frepkit.toml";

/// Renderer and export configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrepConfig {
    /// Samples per unit length
    pub resolution: f32,
    /// Crease angle in degrees for normal splitting
    pub splitting_angle: f32,
    /// Lattice cap for the built-in polygonizer
    pub max_cells_per_axis: u32,
    /// Half edge of the cubic render region centred on the origin
    pub region_half_extent: f32,
    /// Where exported meshes go
    pub output_dir: PathBuf,
}

impl Default for FrepConfig {
    fn default() -> Self {
        let settings = RenderSettings::default();
        Self {
            resolution: settings.resolution,
            splitting_angle: settings.splitting_angle,
            max_cells_per_axis: SurfaceNets::DEFAULT_MAX_CELLS,
            region_half_extent: 1.55,
            output_dir: PathBuf::from("out"),
        }
    }
}

impl FrepConfig {
    /// Load configuration from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: FrepConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Load `frepkit.toml` (or defaults) with environment variable overrides
    pub fn load() -> Result<Self> {
        let mut config = if Path::new(CONFIG_FILE).exists() {
            Self::from_file(CONFIG_FILE)?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Apply `FREP_*` overrides from `lookup`. Unparseable values are
    /// logged and skipped.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        override_with(&lookup, "FREP_RESOLUTION", &mut self.resolution);
        override_with(&lookup, "FREP_SPLITTING_ANGLE", &mut self.splitting_angle);
        override_with(&lookup, "FREP_MAX_CELLS", &mut self.max_cells_per_axis);

        if let Some(output_dir) = lookup("FREP_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(output_dir);
        }
    }

    /// Save configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path.as_ref(), content)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;
        Ok(())
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            resolution: self.resolution,
            splitting_angle: self.splitting_angle,
        }
    }

    pub fn polygonizer(&self) -> SurfaceNets {
        SurfaceNets::new(self.max_cells_per_axis)
    }

    pub fn region(&self) -> Region {
        Region::cube(self.region_half_extent)
    }
}

fn override_with<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, target: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *target = value,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = FrepConfig::default();
        assert_eq!(config.resolution, 12.0);
        assert_eq!(config.splitting_angle, 180.0);
        assert_eq!(config.max_cells_per_axis, 256);
        assert!(config.region().approx_eq(&Region::cube(1.55), 1e-6));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("FREP_RESOLUTION", "15"),
            ("FREP_SPLITTING_ANGLE", "not-a-number"),
            ("FREP_OUTPUT_DIR", "/tmp/meshes"),
            ("FREP_MAX_CELLS", "5000"),
        ]
        .into_iter()
        .collect();

        let mut config = FrepConfig::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.resolution, 15.0);
        assert_eq!(config.splitting_angle, 180.0);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/meshes"));
        assert_eq!(config.render_settings().resolution, 15.0);

        // Oversized grids are capped before any lattice is built
        assert_eq!(config.max_cells_per_axis, 5000);
        assert_eq!(config.polygonizer().max_cells_per_axis, SurfaceNets::CELL_LIMIT);
    }

    #[test]
    fn test_save_and_reload() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join(CONFIG_FILE);

        let config = FrepConfig {
            splitting_angle: 40.0,
            ..FrepConfig::default()
        };
        config.save(&path)?;
        assert_eq!(FrepConfig::from_file(&path)?, config);
        Ok(())
    }

    #[test]
    fn test_partial_file_uses_defaults() -> Result<()> {
        let config: FrepConfig = toml::from_str("resolution = 20.0")?;
        assert_eq!(config.resolution, 20.0);
        assert_eq!(config.max_cells_per_axis, 256);
        Ok(())
    }
}
