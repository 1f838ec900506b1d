// SPDX-License-Identifier: GPL-3.0-only

//! GPU Filter - single-pass image filters on wgpu render pipelines
//!
//! A [`Filter`] takes a source texture, runs a shader-defined transform as a
//! fullscreen draw, and writes the result into a target texture. In-place
//! filtering goes through an exclusively owned temp texture so the caller's
//! texture is only written by the final pass.
//!
//! # Architecture
//!
//! - [`gpu`]: Device and queue acquisition
//! - [`shaders`]: Shared WGSL prelude, shader library compilation, readback
//! - [`effects`]: The [`FilterEffect`] trait and built-in effects
//! - [`filter`]: The filter pipeline (compile, render, encode, apply)
//! - [`config`]: Filter and tool configuration
//! - [`errors`]: Error types
//!
//! # Example
//!
//! ```ignore
//! let context = gpu_filter::gpu::create_device_blocking("filter")?;
//! let mut filter = Filter::with_device(context.clone(), gpu_filter::effects::Mono);
//! filter.compile_shaders()?;
//! filter.encode_to_command_queue(&context.queue, &texture, 800.0, 600.0, 2.0)?;
//! ```

pub mod config;
pub mod effects;
pub mod errors;
pub mod filter;
pub mod gpu;
pub mod shaders;

// Re-export commonly used types
pub use config::{Config, FilterConfig, SamplerMode, ViewportSize};
pub use effects::{EffectKind, EffectSettings, FilterEffect};
pub use errors::{FilterError, FilterResult};
pub use filter::{BlendFactor, Filter, FilterState, PassDescriptor};
pub use gpu::GpuContext;
