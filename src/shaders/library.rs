// SPDX-License-Identifier: GPL-3.0-only

//! Compiled shader library
//!
//! WGSL is parsed and validated with naga before it reaches the device. That
//! gives readable diagnostics and the entry-point table used for function
//! lookup, without needing a GPU.

use crate::errors::{FilterError, FilterResult};
use crate::gpu::with_error_scopes;
use std::borrow::Cow;
use std::fmt;
use tracing::{debug, warn};

/// Pipeline stage of an entry point
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Compute,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
            ShaderStage::Compute => write!(f, "compute"),
        }
    }
}

impl ShaderStage {
    fn from_naga(stage: naga::ShaderStage) -> Option<Self> {
        match stage {
            naga::ShaderStage::Vertex => Some(ShaderStage::Vertex),
            naga::ShaderStage::Fragment => Some(ShaderStage::Fragment),
            naga::ShaderStage::Compute => Some(ShaderStage::Compute),
            _ => None,
        }
    }
}

/// Named entry point of a compiled library
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EntryPoint {
    pub name: String,
    pub stage: ShaderStage,
}

/// Compiled collection of vertex/fragment entry points.
///
/// Immutable once built; recompiling produces a new library.
#[derive(Debug)]
pub struct ShaderLibrary {
    label: String,
    module: wgpu::ShaderModule,
    entry_points: Vec<EntryPoint>,
}

impl ShaderLibrary {
    /// Parse and validate WGSL source, returning its entry points.
    ///
    /// Does not touch the GPU.
    pub fn validate(source: &str) -> FilterResult<Vec<EntryPoint>> {
        let module = naga::front::wgsl::parse_str(source)
            .map_err(|e| FilterError::ShaderCompilation(e.emit_to_string(source)))?;

        let mut validator = naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        );
        validator
            .validate(&module)
            .map_err(|e| FilterError::ShaderCompilation(e.emit_to_string(source)))?;

        Ok(module
            .entry_points
            .iter()
            .filter_map(|ep| {
                ShaderStage::from_naga(ep.stage).map(|stage| EntryPoint {
                    name: ep.name.clone(),
                    stage,
                })
            })
            .collect())
    }

    /// Compile WGSL source into a library on `device`.
    pub fn compile(device: &wgpu::Device, label: &str, source: &str) -> FilterResult<Self> {
        let entry_points = match Self::validate(source) {
            Ok(entry_points) => entry_points,
            Err(e) => {
                warn!(label, error = %e, "Shader source rejected by validator");
                return Err(e);
            }
        };

        let (module, error) = with_error_scopes(device, || {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label),
                source: wgpu::ShaderSource::Wgsl(Cow::Owned(source.to_string())),
            })
        });
        if let Some(error) = error {
            warn!(label, error = %error, "Device rejected shader module");
            return Err(FilterError::ShaderCompilation(error.to_string()));
        }

        debug!(
            label,
            entry_points = entry_points.len(),
            "Shader library compiled"
        );

        Ok(Self {
            label: label.to_string(),
            module,
            entry_points,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn module(&self) -> &wgpu::ShaderModule {
        &self.module
    }

    pub fn entry_points(&self) -> &[EntryPoint] {
        &self.entry_points
    }

    /// Check that `name` is an entry point of the given stage
    pub fn function(&self, name: &str, stage: ShaderStage) -> FilterResult<&EntryPoint> {
        find_entry_point(&self.entry_points, name, stage)
    }
}

pub(crate) fn find_entry_point<'a>(
    entry_points: &'a [EntryPoint],
    name: &str,
    stage: ShaderStage,
) -> FilterResult<&'a EntryPoint> {
    entry_points
        .iter()
        .find(|ep| ep.name == name && ep.stage == stage)
        .ok_or_else(|| FilterError::FunctionLookup {
            name: name.to_string(),
            stage,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shaders::{self, COPY_FRAGMENT_FUNCTION, DEFAULT_VERTEX_FUNCTION, PRELUDE};

    #[test]
    fn test_prelude_entry_points() {
        let entry_points = ShaderLibrary::validate(PRELUDE).expect("prelude validates");
        assert!(find_entry_point(&entry_points, DEFAULT_VERTEX_FUNCTION, ShaderStage::Vertex).is_ok());
        assert!(
            find_entry_point(&entry_points, COPY_FRAGMENT_FUNCTION, ShaderStage::Fragment).is_ok()
        );
    }

    #[test]
    fn test_stage_mismatch_is_lookup_error() {
        let entry_points = ShaderLibrary::validate(PRELUDE).expect("prelude validates");
        let err = find_entry_point(&entry_points, DEFAULT_VERTEX_FUNCTION, ShaderStage::Fragment)
            .unwrap_err();
        assert_eq!(
            err,
            FilterError::FunctionLookup {
                name: DEFAULT_VERTEX_FUNCTION.to_string(),
                stage: ShaderStage::Fragment,
            }
        );
    }

    #[test]
    fn test_syntax_error_reported() {
        let source = shaders::with_prelude("@fragment fn broken( -> {");
        match ShaderLibrary::validate(&source) {
            Err(FilterError::ShaderCompilation(msg)) => assert!(!msg.is_empty()),
            other => panic!("expected compilation error, got {:?}", other),
        }
    }

    #[test]
    fn test_type_error_reported() {
        // Parses, but returns the wrong type
        let source = shaders::with_prelude(
            "@fragment fn fragment_bad(in: VertexOutput) -> @location(0) vec4<f32> { return 1.0; }",
        );
        assert!(matches!(
            ShaderLibrary::validate(&source),
            Err(FilterError::ShaderCompilation(_))
        ));
    }
}
