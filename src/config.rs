// SPDX-License-Identifier: GPL-3.0-only

//! Filter configuration
//!
//! [`FilterConfig`] is the configuration surface of a single filter
//! (pixel ratio, viewport, sampling). [`Config`] is the on-disk file used by
//! the command line tool, which adds the effect selection.

use crate::effects::EffectSettings;
use crate::errors::{FilterError, FilterResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// File name of the configuration file inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Viewport size in logical units.
///
/// Multiplied by the device pixel ratio to get the physical pixel extent of
/// the temp texture and the quad geometry.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True when either dimension is zero
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Physical pixel extent for the given device pixel ratio
    pub fn physical(&self, device_pixel_ratio: f32) -> (u32, u32) {
        physical_extent(self.width as f32, self.height as f32, device_pixel_ratio)
    }
}

/// Texture sampling used when the source texture is read by a pass
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum SamplerMode {
    /// Bilinear filtering (smooth when the temp texture is scaled)
    #[default]
    Linear,
    /// Nearest texel (exact copies, pixel-art)
    Nearest,
}

impl SamplerMode {
    pub(crate) fn filter_mode(self) -> wgpu::FilterMode {
        match self {
            SamplerMode::Linear => wgpu::FilterMode::Linear,
            SamplerMode::Nearest => wgpu::FilterMode::Nearest,
        }
    }
}

/// Per-filter configuration
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Logical-to-physical pixel ratio (> 0)
    pub device_pixel_ratio: f32,
    /// Logical viewport; zero means "use the texture's own size"
    pub viewport_size: ViewportSize,
    /// Sampling of the source texture
    pub sampler: SamplerMode,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            viewport_size: ViewportSize::default(),
            sampler: SamplerMode::default(),
        }
    }
}

impl FilterConfig {
    /// Validate the configuration.
    ///
    /// Called once on the `DeviceBound -> Ready` transition.
    pub fn validate(&self) -> FilterResult<()> {
        validate_device_pixel_ratio(self.device_pixel_ratio)
    }
}

/// Reject non-finite or non-positive pixel ratios
pub fn validate_device_pixel_ratio(ratio: f32) -> FilterResult<()> {
    if ratio.is_finite() && ratio > 0.0 {
        Ok(())
    } else {
        Err(FilterError::InvalidConfig(format!(
            "device pixel ratio must be a positive finite number, got {}",
            ratio
        )))
    }
}

/// Physical pixel extent of a logical size, never smaller than 1×1.
pub fn physical_extent(width: f32, height: f32, device_pixel_ratio: f32) -> (u32, u32) {
    let scale = |v: f32| ((v * device_pixel_ratio).round() as u32).max(1);
    (scale(width), scale(height))
}

/// On-disk configuration for the command line tool
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct Config {
    pub filter: FilterConfig,
    pub effect: EffectSettings,
}

impl Config {
    /// Default config location (`$XDG_CONFIG_HOME/gpu-filter/config.json`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gpu-filter").join(CONFIG_FILE_NAME))
    }

    /// Load and validate a config file
    pub fn load(path: &Path) -> FilterResult<Self> {
        debug!(path = %path.display(), "Loading filter config");
        let text = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.filter.validate()?;
        Ok(config)
    }

    /// Load from `path`, or from the default location, falling back to defaults
    /// when no file exists.
    pub fn load_or_default(path: Option<&Path>) -> FilterResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Some(path) if path.exists() => path,
                _ => return Ok(Self::default()),
            },
        };
        Self::load(&path)
    }

    pub fn save(&self, path: &Path) -> FilterResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        info!(path = %path.display(), "Saved filter config");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_extent() {
        assert_eq!(physical_extent(800.0, 600.0, 2.0), (1600, 1200));
        assert_eq!(physical_extent(333.0, 10.0, 1.5), (500, 15));
        // Never collapses to zero
        assert_eq!(physical_extent(0.0, 0.2, 1.0), (1, 1));
    }

    #[test]
    fn test_validate_ratio() {
        assert!(validate_device_pixel_ratio(1.0).is_ok());
        assert!(validate_device_pixel_ratio(0.0).is_err());
        assert!(validate_device_pixel_ratio(-2.0).is_err());
        assert!(validate_device_pixel_ratio(f32::NAN).is_err());
        assert!(validate_device_pixel_ratio(f32::INFINITY).is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: FilterConfig = serde_json::from_str(r#"{"device_pixel_ratio": 2.0}"#)
            .expect("valid json");
        assert_eq!(config.device_pixel_ratio, 2.0);
        assert_eq!(config.sampler, SamplerMode::Linear);
        assert!(config.viewport_size.is_empty());
    }

    #[test]
    fn test_viewport_physical() {
        let viewport = ViewportSize::new(800, 600);
        assert_eq!(viewport.physical(2.0), (1600, 1200));
        assert!(!viewport.is_empty());
    }
}
