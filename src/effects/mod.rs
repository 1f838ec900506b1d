// SPDX-License-Identifier: GPL-3.0-only

//! Filter effects
//!
//! An effect supplies the shader body and names the fragment functions the
//! filter runs. Everything else (textures, pipelines, submission) belongs to
//! [`crate::filter::Filter`].

mod builtin;

pub use builtin::{
    BoxBlur, EffectKind, EffectSettings, Mono, Negative, Passthrough, Posterize, Sepia, Vignette,
};

use crate::errors::FilterResult;
use crate::shaders::DEFAULT_VERTEX_FUNCTION;
use std::borrow::Cow;
use std::path::PathBuf;

/// Where an effect's shader text comes from
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ShaderSource {
    /// Compiled into the binary
    Embedded(&'static str),
    /// Built at runtime
    Owned(String),
    /// Read from disk every time shaders are compiled
    Path(PathBuf),
}

impl ShaderSource {
    /// Resolve the handle to shader text
    pub fn resolve(&self) -> FilterResult<Cow<'_, str>> {
        match self {
            ShaderSource::Embedded(source) => Ok(Cow::Borrowed(source)),
            ShaderSource::Owned(source) => Ok(Cow::Borrowed(source.as_str())),
            ShaderSource::Path(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| {
                    crate::errors::FilterError::Io(format!("{}: {}", path.display(), e))
                })?;
                Ok(Cow::Owned(text))
            }
        }
    }
}

/// Fragment functions run by the orchestrator
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EffectStages {
    /// `texture -> temp` with `fragment`, then a plain copy back
    Single { fragment: String },
    /// `texture -> temp` with `first`, then `temp -> texture` with `second`
    TwoStage { first: String, second: String },
}

impl EffectStages {
    pub fn single(fragment: impl Into<String>) -> Self {
        EffectStages::Single {
            fragment: fragment.into(),
        }
    }

    pub fn two_stage(first: impl Into<String>, second: impl Into<String>) -> Self {
        EffectStages::TwoStage {
            first: first.into(),
            second: second.into(),
        }
    }

    /// Fragment for the `texture -> temp` pass
    pub fn first(&self) -> &str {
        match self {
            EffectStages::Single { fragment } => fragment,
            EffectStages::TwoStage { first, .. } => first,
        }
    }

    /// Fragment for the `temp -> texture` pass, if the effect has one
    pub fn second(&self) -> Option<&str> {
        match self {
            EffectStages::Single { .. } => None,
            EffectStages::TwoStage { second, .. } => Some(second),
        }
    }

    pub fn is_multi_stage(&self) -> bool {
        matches!(self, EffectStages::TwoStage { .. })
    }

    pub(crate) fn fragments(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.first()).chain(self.second())
    }
}

/// A shader-defined image transform
///
/// The shader body is appended to [`crate::shaders::PRELUDE`], so it can use
/// `VertexOutput`, `sample_source()`, `luminance()`, `texel_size()` and the
/// `viewport` uniform. Effect parameters go in a uniform struct declared at
/// `@group(0) @binding(3)`.
pub trait FilterEffect: Send + Sync {
    /// Short name used for labels and logging
    fn name(&self) -> &str;

    /// Shader body consumed verbatim by the compiler
    fn shader(&self) -> ShaderSource;

    fn stages(&self) -> EffectStages;

    fn vertex_function(&self) -> &str {
        DEFAULT_VERTEX_FUNCTION
    }

    /// Bytes for the binding 3 uniform block, if the effect has parameters
    fn uniforms(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Effect assembled at runtime, e.g. from a shader file
#[derive(Clone, Debug)]
pub struct CustomEffect {
    name: String,
    source: ShaderSource,
    stages: EffectStages,
    vertex_function: String,
    uniforms: Option<Vec<u8>>,
}

impl CustomEffect {
    pub fn new(name: impl Into<String>, source: ShaderSource, stages: EffectStages) -> Self {
        Self {
            name: name.into(),
            source,
            stages,
            vertex_function: DEFAULT_VERTEX_FUNCTION.to_string(),
            uniforms: None,
        }
    }

    pub fn with_vertex_function(mut self, name: impl Into<String>) -> Self {
        self.vertex_function = name.into();
        self
    }

    pub fn with_uniforms(mut self, bytes: Vec<u8>) -> Self {
        self.uniforms = Some(bytes);
        self
    }
}

impl FilterEffect for CustomEffect {
    fn name(&self) -> &str {
        &self.name
    }

    fn shader(&self) -> ShaderSource {
        self.source.clone()
    }

    fn stages(&self) -> EffectStages {
        self.stages.clone()
    }

    fn vertex_function(&self) -> &str {
        &self.vertex_function
    }

    fn uniforms(&self) -> Option<Vec<u8>> {
        self.uniforms.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_accessors() {
        let single = EffectStages::single("fragment_main");
        assert_eq!(single.first(), "fragment_main");
        assert_eq!(single.second(), None);
        assert!(!single.is_multi_stage());

        let two = EffectStages::two_stage("fragment_horizontal", "fragment_vertical");
        assert_eq!(
            two.fragments().collect::<Vec<_>>(),
            vec!["fragment_horizontal", "fragment_vertical"]
        );
        assert!(two.is_multi_stage());
    }

    #[test]
    fn test_resolve_missing_path() {
        let source = ShaderSource::Path(PathBuf::from("/nonexistent/effect.wgsl"));
        assert!(matches!(
            source.resolve(),
            Err(crate::errors::FilterError::Io(msg)) if msg.contains("effect.wgsl")
        ));
    }

    #[test]
    fn test_custom_effect_defaults() {
        let effect = CustomEffect::new(
            "custom",
            ShaderSource::Owned(String::new()),
            EffectStages::single("fragment_main"),
        );
        assert_eq!(effect.vertex_function(), DEFAULT_VERTEX_FUNCTION);
        assert!(effect.uniforms().is_none());
    }
}
