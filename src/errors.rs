// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the filter pipeline

use crate::filter::FilterState;
use crate::shaders::ShaderStage;
use std::fmt;

/// Result type alias using FilterError
pub type FilterResult<T> = Result<T, FilterError>;

/// Errors surfaced by the filter pipeline
///
/// None of these cross the device boundary as panics: wgpu validation and
/// out-of-memory errors are captured with error scopes and mapped here.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Shader source failed to parse or validate. Prior compiled state is kept.
    ShaderCompilation(String),
    /// A requested entry point is missing from the compiled library
    FunctionLookup { name: String, stage: ShaderStage },
    /// Texture, buffer or pipeline allocation failed
    ResourceAllocation(String),
    /// Encode attempted before shaders were compiled
    PipelineNotReady(FilterState),
    /// Invalid configuration or call arguments
    InvalidConfig(String),
    /// Adapter/device acquisition or device-level failure
    Device(String),
    /// Filesystem errors (shader files, config files)
    Io(String),
}

impl FilterError {
    /// Whether the caller can reasonably retry or skip the pass.
    ///
    /// `PipelineNotReady` is a programming error and is not recoverable.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, FilterError::PipelineNotReady(_))
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::ShaderCompilation(msg) => write!(f, "Shader compilation failed: {}", msg),
            FilterError::FunctionLookup { name, stage } => {
                write!(f, "No {} function named '{}' in shader library", stage, name)
            }
            FilterError::ResourceAllocation(msg) => write!(f, "Resource allocation failed: {}", msg),
            FilterError::PipelineNotReady(state) => {
                write!(f, "Filter pipeline is not ready (state: {})", state)
            }
            FilterError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            FilterError::Device(msg) => write!(f, "GPU device error: {}", msg),
            FilterError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for FilterError {}

impl From<std::io::Error> for FilterError {
    fn from(err: std::io::Error) -> Self {
        FilterError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for FilterError {
    fn from(err: serde_json::Error) -> Self {
        FilterError::InvalidConfig(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        let err = FilterError::FunctionLookup {
            name: "fragment_glow".to_string(),
            stage: ShaderStage::Fragment,
        };
        assert_eq!(
            err.to_string(),
            "No fragment function named 'fragment_glow' in shader library"
        );

        let err = FilterError::PipelineNotReady(FilterState::DeviceBound);
        assert!(err.to_string().contains("device bound"));
    }

    #[test]
    fn test_recoverable() {
        assert!(FilterError::ShaderCompilation("x".into()).is_recoverable());
        assert!(FilterError::ResourceAllocation("oom".into()).is_recoverable());
        assert!(!FilterError::PipelineNotReady(FilterState::Uninitialized).is_recoverable());
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.wgsl");
        let err: FilterError = io.into();
        assert!(matches!(err, FilterError::Io(msg) if msg.contains("missing.wgsl")));
    }
}
