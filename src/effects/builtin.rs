// SPDX-License-Identifier: GPL-3.0-only

//! Built-in effects

use super::{EffectStages, FilterEffect, ShaderSource};
use crate::shaders::effects as wgsl;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const FRAGMENT_MAIN: &str = "fragment_main";

/// Upper bound matching `MAX_RADIUS` in box_blur.wgsl
pub const MAX_BLUR_RADIUS: u32 = 64;

macro_rules! simple_effect {
    ($(#[$meta:meta])* $name:ident, $label:literal, $source:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, Default)]
        pub struct $name;

        impl FilterEffect for $name {
            fn name(&self) -> &str {
                $label
            }

            fn shader(&self) -> ShaderSource {
                ShaderSource::Embedded($source)
            }

            fn stages(&self) -> EffectStages {
                EffectStages::single(FRAGMENT_MAIN)
            }
        }
    };
}

simple_effect!(
    /// Copies the source unchanged
    Passthrough,
    "passthrough",
    wgsl::PASSTHROUGH
);
simple_effect!(
    /// Black & white
    Mono,
    "mono",
    wgsl::MONO
);
simple_effect!(
    /// Warm brownish tint
    Sepia,
    "sepia",
    wgsl::SEPIA
);
simple_effect!(
    /// Inverted colors, alpha kept
    Negative,
    "negative",
    wgsl::NEGATIVE
);

/// Uniform block for posterize.wgsl
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct PosterizeParams {
    levels: f32,
    _padding: [f32; 3],
}

/// Reduced color levels
#[derive(Clone, Copy, Debug)]
pub struct Posterize {
    pub levels: u32,
}

impl FilterEffect for Posterize {
    fn name(&self) -> &str {
        "posterize"
    }

    fn shader(&self) -> ShaderSource {
        ShaderSource::Embedded(wgsl::POSTERIZE)
    }

    fn stages(&self) -> EffectStages {
        EffectStages::single(FRAGMENT_MAIN)
    }

    fn uniforms(&self) -> Option<Vec<u8>> {
        let params = PosterizeParams {
            levels: self.levels.max(2) as f32,
            _padding: [0.0; 3],
        };
        Some(bytemuck::bytes_of(&params).to_vec())
    }
}

/// Uniform block for vignette.wgsl
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct VignetteParams {
    strength: f32,
    radius: f32,
    _padding: [f32; 2],
}

/// Darkened edges
#[derive(Clone, Copy, Debug)]
pub struct Vignette {
    /// 0 = no darkening, 1 = black corners
    pub strength: f32,
    /// Distance from the centre where darkening starts
    pub radius: f32,
}

impl FilterEffect for Vignette {
    fn name(&self) -> &str {
        "vignette"
    }

    fn shader(&self) -> ShaderSource {
        ShaderSource::Embedded(wgsl::VIGNETTE)
    }

    fn stages(&self) -> EffectStages {
        EffectStages::single(FRAGMENT_MAIN)
    }

    fn uniforms(&self) -> Option<Vec<u8>> {
        let params = VignetteParams {
            strength: self.strength.clamp(0.0, 1.0),
            radius: self.radius.max(0.0),
            _padding: [0.0; 2],
        };
        Some(bytemuck::bytes_of(&params).to_vec())
    }
}

/// Uniform block for box_blur.wgsl
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct BlurParams {
    radius: u32,
    _padding: [u32; 3],
}

/// Separable box blur: horizontal into temp, vertical back into the texture
#[derive(Clone, Copy, Debug)]
pub struct BoxBlur {
    pub radius: u32,
}

impl FilterEffect for BoxBlur {
    fn name(&self) -> &str {
        "box_blur"
    }

    fn shader(&self) -> ShaderSource {
        ShaderSource::Embedded(wgsl::BOX_BLUR)
    }

    fn stages(&self) -> EffectStages {
        EffectStages::two_stage("fragment_horizontal", "fragment_vertical")
    }

    fn uniforms(&self) -> Option<Vec<u8>> {
        let params = BlurParams {
            radius: self.radius.min(MAX_BLUR_RADIUS),
            _padding: [0; 3],
        };
        Some(bytemuck::bytes_of(&params).to_vec())
    }
}

/// Built-in effect selector
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectKind {
    #[default]
    Passthrough,
    Mono,
    Sepia,
    Negative,
    Posterize,
    Vignette,
    BoxBlur,
}

impl EffectKind {
    pub const ALL: [EffectKind; 7] = [
        EffectKind::Passthrough,
        EffectKind::Mono,
        EffectKind::Sepia,
        EffectKind::Negative,
        EffectKind::Posterize,
        EffectKind::Vignette,
        EffectKind::BoxBlur,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectKind::Passthrough => "passthrough",
            EffectKind::Mono => "mono",
            EffectKind::Sepia => "sepia",
            EffectKind::Negative => "negative",
            EffectKind::Posterize => "posterize",
            EffectKind::Vignette => "vignette",
            EffectKind::BoxBlur => "box_blur",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            EffectKind::Passthrough => "Copy the image unchanged",
            EffectKind::Mono => "Black & white",
            EffectKind::Sepia => "Warm brownish tint",
            EffectKind::Negative => "Inverted colors",
            EffectKind::Posterize => "Reduced color levels",
            EffectKind::Vignette => "Darkened edges",
            EffectKind::BoxBlur => "Two-stage separable blur",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EffectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        EffectKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("unknown effect '{}'", s))
    }
}

/// Effect selection plus the parameters of the parameterised effects
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(default)]
pub struct EffectSettings {
    pub kind: EffectKind,
    pub posterize_levels: u32,
    pub vignette_strength: f32,
    pub vignette_radius: f32,
    pub blur_radius: u32,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            kind: EffectKind::default(),
            posterize_levels: 4,
            vignette_strength: 0.6,
            vignette_radius: 0.35,
            blur_radius: 4,
        }
    }
}

impl EffectSettings {
    pub fn with_kind(kind: EffectKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn build(&self) -> Box<dyn FilterEffect> {
        match self.kind {
            EffectKind::Passthrough => Box::new(Passthrough),
            EffectKind::Mono => Box::new(Mono),
            EffectKind::Sepia => Box::new(Sepia),
            EffectKind::Negative => Box::new(Negative),
            EffectKind::Posterize => Box::new(Posterize {
                levels: self.posterize_levels,
            }),
            EffectKind::Vignette => Box::new(Vignette {
                strength: self.vignette_strength,
                radius: self.vignette_radius,
            }),
            EffectKind::BoxBlur => Box::new(BoxBlur {
                radius: self.blur_radius,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders::{self, ShaderLibrary, ShaderStage};

    #[test]
    fn test_builtin_shaders_validate() {
        for kind in EffectKind::ALL {
            let effect = EffectSettings::with_kind(kind).build();
            let source = effect.shader();
            let body = source.resolve().expect("embedded source");
            let entry_points = ShaderLibrary::validate(&shaders::with_prelude(&body))
                .unwrap_or_else(|e| panic!("{} failed to validate: {}", kind, e));

            for fragment in effect.stages().fragments() {
                assert!(
                    entry_points
                        .iter()
                        .any(|ep| ep.name == fragment && ep.stage == ShaderStage::Fragment),
                    "{} is missing fragment {}",
                    kind,
                    fragment
                );
            }
        }
    }

    #[test]
    fn test_effect_kind_parse() {
        assert_eq!("mono".parse::<EffectKind>(), Ok(EffectKind::Mono));
        assert_eq!("Box-Blur".parse::<EffectKind>(), Ok(EffectKind::BoxBlur));
        assert!("glow".parse::<EffectKind>().is_err());
        for kind in EffectKind::ALL {
            assert_eq!(kind.to_string().parse::<EffectKind>(), Ok(kind));
        }
    }

    #[test]
    fn test_uniform_sizes_are_16_byte_aligned() {
        let effects: [Box<dyn FilterEffect>; 3] = [
            Box::new(Posterize { levels: 4 }),
            Box::new(Vignette {
                strength: 0.5,
                radius: 0.3,
            }),
            Box::new(BoxBlur { radius: 3 }),
        ];
        for effect in effects {
            let bytes = effect.uniforms().expect("parameterised effect");
            assert_eq!(bytes.len() % 16, 0, "{}", effect.name());
        }
    }

    #[test]
    fn test_blur_radius_clamped() {
        let bytes = BoxBlur { radius: 1000 }.uniforms().expect("blur params");
        let radius = u32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        assert_eq!(radius, MAX_BLUR_RADIUS);
    }

    #[test]
    fn test_only_blur_is_multi_stage() {
        for kind in EffectKind::ALL {
            let effect = EffectSettings::with_kind(kind).build();
            assert_eq!(
                effect.stages().is_multi_stage(),
                kind == EffectKind::BoxBlur
            );
        }
    }
}
