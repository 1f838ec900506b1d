// SPDX-License-Identifier: GPL-3.0-only

//! Shader sources, compilation and GPU readback helpers
//!
//! Every filter shader is the shared [`PRELUDE`] followed by the effect's own
//! fragment functions. The prelude owns the bind group declarations and the
//! fullscreen vertex stage, so effects only write fragment code.

mod gpu_processor;
mod library;

pub use gpu_processor::{
    packed_len, padded_bytes_per_row, read_buffer_async, read_texture_async,
};
pub use library::{EntryPoint, ShaderLibrary, ShaderStage};

/// Shared declarations (WGSL)
/// Contains: bindings, `vertex_main`, `fragment_copy`, `luminance()`,
/// `texel_size()`, `sample_source()`
pub const PRELUDE: &str = include_str!("prelude.wgsl");

/// Vertex entry point of the prelude, used when an effect names none
pub const DEFAULT_VERTEX_FUNCTION: &str = "vertex_main";

/// Fragment entry point that copies the source unchanged
pub const COPY_FRAGMENT_FUNCTION: &str = "fragment_copy";

/// Built-in effect shader bodies
pub mod effects {
    pub const PASSTHROUGH: &str = include_str!("effects/passthrough.wgsl");
    pub const MONO: &str = include_str!("effects/mono.wgsl");
    pub const SEPIA: &str = include_str!("effects/sepia.wgsl");
    pub const NEGATIVE: &str = include_str!("effects/negative.wgsl");
    pub const POSTERIZE: &str = include_str!("effects/posterize.wgsl");
    pub const VIGNETTE: &str = include_str!("effects/vignette.wgsl");
    pub const BOX_BLUR: &str = include_str!("effects/box_blur.wgsl");
}

/// Prefix an effect body with the shared prelude
pub fn with_prelude(effect_source: &str) -> String {
    format!("{}\n{}", PRELUDE, effect_source)
}
