// SPDX-License-Identifier: GPL-3.0-only
//! Filter pipeline
//!
//! [`Filter`] compiles an effect's shaders, caches render pipelines and runs
//! the effect in place on a caller-owned texture:
//!
//! ```text
//! texture --(effect, first fragment)--> temp --(second fragment or copy)--> texture
//! ```
//!
//! Only the final pass writes the caller's texture, so a failure in any
//! earlier step leaves it untouched.

mod render;
mod texture;

pub use render::{BlendFactor, PassDescriptor, PipelineKey, blend_reference, blend_state};
pub use texture::{FILTER_TEXTURE_USAGES, create_filter_texture, upload_texture};

use crate::config::{
    FilterConfig, ViewportSize, physical_extent, validate_device_pixel_ratio,
};
use crate::effects::FilterEffect;
use crate::errors::{FilterError, FilterResult};
use crate::gpu::{GpuContext, with_error_scopes};
use crate::shaders::{
    self, COPY_FRAGMENT_FUNCTION, ShaderLibrary, ShaderStage,
};
use render::{PipelineResources, ViewportUniforms};
use std::collections::HashMap;
use std::fmt;
use texture::check_usage;
use tracing::{debug, error, info, warn};
use wgpu::util::DeviceExt;

/// Lifecycle of a filter instance
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterState {
    /// No device bound
    Uninitialized,
    /// Device bound, shaders not compiled
    DeviceBound,
    /// Shaders compiled; encode and apply are allowed
    Ready,
}

impl fmt::Display for FilterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterState::Uninitialized => write!(f, "uninitialized"),
            FilterState::DeviceBound => write!(f, "device bound"),
            FilterState::Ready => write!(f, "ready"),
        }
    }
}

/// Everything produced by a successful `compile_shaders`
struct CompiledShaders {
    library: ShaderLibrary,
    default_vertex_function: String,
    resources: PipelineResources,
    effect_uniforms: Option<wgpu::Buffer>,
}

/// Single-pass GPU image filter
///
/// Calls that mutate the filter take `&mut self`; one instance handles one
/// encode at a time. Device and queue may be shared with other filters, the
/// shader library, pipeline cache and temp texture belong to this instance.
pub struct Filter {
    context: Option<GpuContext>,
    effect: Box<dyn FilterEffect>,
    config: FilterConfig,
    compiled: Option<CompiledShaders>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    // Caller-owned texture filtered by `apply_filter`
    texture: Option<wgpu::Texture>,
    temp_texture: Option<wgpu::Texture>,
    submissions: u64,
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("effect", &self.effect.name())
            .field("state", &self.state())
            .field("config", &self.config)
            .field("pipelines", &self.pipelines.len())
            .field(
                "temp_texture",
                &self.temp_texture.as_ref().map(|t| (t.width(), t.height())),
            )
            .finish()
    }
}

impl Filter {
    /// Create an unbound filter (`Uninitialized`)
    pub fn new(effect: impl FilterEffect + 'static) -> Self {
        Self::from_boxed(Box::new(effect))
    }

    pub fn from_boxed(effect: Box<dyn FilterEffect>) -> Self {
        Self {
            context: None,
            effect,
            config: FilterConfig::default(),
            compiled: None,
            pipelines: HashMap::new(),
            texture: None,
            temp_texture: None,
            submissions: 0,
        }
    }

    /// Create a filter bound to `context` (`DeviceBound`)
    pub fn with_device(context: GpuContext, effect: impl FilterEffect + 'static) -> Self {
        let mut filter = Self::new(effect);
        filter.set_device(context);
        filter
    }

    pub fn state(&self) -> FilterState {
        match (&self.context, &self.compiled) {
            (None, _) => FilterState::Uninitialized,
            (Some(_), None) => FilterState::DeviceBound,
            (Some(_), Some(_)) => FilterState::Ready,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == FilterState::Ready
    }

    /// Bind a device. Drops everything created on a previously bound device,
    /// so the filter returns to `DeviceBound`.
    pub fn set_device(&mut self, context: GpuContext) {
        info!(
            effect = self.effect.name(),
            adapter = %context.info.adapter_name,
            "Binding filter to device"
        );
        self.context = Some(context);
        self.compiled = None;
        self.pipelines.clear();
        self.temp_texture = None;
    }

    pub fn device(&self) -> Option<&GpuContext> {
        self.context.as_ref()
    }

    pub fn effect(&self) -> &dyn FilterEffect {
        self.effect.as_ref()
    }

    /// Swap the effect. Shaders must be compiled again.
    pub fn set_effect(&mut self, effect: Box<dyn FilterEffect>) {
        self.effect = effect;
        self.compiled = None;
        self.pipelines.clear();
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Replace the configuration. Validated by the next `compile_shaders`;
    /// a sampler change applies immediately to a compiled filter.
    pub fn set_config(&mut self, config: FilterConfig) {
        if config.sampler != self.config.sampler {
            if let (Some(context), Some(compiled)) = (&self.context, &mut self.compiled) {
                compiled
                    .resources
                    .set_sampler_mode(&context.device, config.sampler);
            }
        }
        self.config = config;
    }

    pub fn device_pixel_ratio(&self) -> f32 {
        self.config.device_pixel_ratio
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) -> FilterResult<()> {
        validate_device_pixel_ratio(ratio)?;
        self.config.device_pixel_ratio = ratio;
        Ok(())
    }

    pub fn viewport_size(&self) -> ViewportSize {
        self.config.viewport_size
    }

    pub fn set_viewport_size(&mut self, size: ViewportSize) {
        self.config.viewport_size = size;
    }

    pub fn texture(&self) -> Option<&wgpu::Texture> {
        self.texture.as_ref()
    }

    /// Texture filtered in place by [`Filter::apply_filter`]
    pub fn set_texture(&mut self, texture: Option<wgpu::Texture>) {
        self.texture = texture;
    }

    pub fn temp_texture(&self) -> Option<&wgpu::Texture> {
        self.temp_texture.as_ref()
    }

    /// Supply a temp texture. It is replaced if it does not match the size
    /// or format of the next encode.
    pub fn set_temp_texture(&mut self, texture: Option<wgpu::Texture>) {
        self.temp_texture = texture;
    }

    /// Library of the last successful compile
    pub fn library(&self) -> Option<&ShaderLibrary> {
        self.compiled.as_ref().map(|c| &c.library)
    }

    pub fn default_vertex_function(&self) -> Option<&str> {
        self.compiled
            .as_ref()
            .map(|c| c.default_vertex_function.as_str())
    }

    /// Number of cached render pipelines
    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    /// Number of command buffers this filter has submitted
    pub fn submission_count(&self) -> u64 {
        self.submissions
    }

    /// Compile the effect's shaders into a fresh library.
    ///
    /// On success the library, default vertex function and resources are
    /// replaced and the pipeline cache is cleared. On failure nothing changes,
    /// including a previously compiled library.
    pub fn compile_shaders(&mut self) -> FilterResult<()> {
        let Some(context) = self.context.as_ref() else {
            error!(
                effect = self.effect.name(),
                "compile_shaders called before a device was bound"
            );
            return Err(FilterError::PipelineNotReady(FilterState::Uninitialized));
        };
        self.config.validate()?;

        let shader = self.effect.shader();
        let body = shader.resolve()?;
        let source = shaders::with_prelude(&body);

        let library = ShaderLibrary::compile(&context.device, self.effect.name(), &source)?;

        let vertex = self.effect.vertex_function().to_string();
        library.function(&vertex, ShaderStage::Vertex)?;
        library.function(COPY_FRAGMENT_FUNCTION, ShaderStage::Fragment)?;
        for fragment in self.effect.stages().fragments() {
            library.function(fragment, ShaderStage::Fragment)?;
        }

        let resources = PipelineResources::new(&context.device, self.config.sampler);
        let effect_uniforms = self
            .effect
            .uniforms()
            .filter(|bytes| !bytes.is_empty())
            .map(|bytes| {
                context
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("filter_effect_uniforms"),
                        contents: &bytes,
                        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    })
            });

        let replaced = self.compiled.is_some();
        self.pipelines.clear();
        self.compiled = Some(CompiledShaders {
            library,
            default_vertex_function: vertex,
            resources,
            effect_uniforms,
        });

        info!(
            effect = self.effect.name(),
            recompiled = replaced,
            "Filter shaders compiled"
        );
        Ok(())
    }

    /// Render `pass.source` into `pass.target` and submit it on the filter's
    /// own queue.
    ///
    /// Unknown function names fail with `FunctionLookup` before anything is
    /// encoded, leaving the target untouched.
    pub fn render_to_texture(
        &mut self,
        pass: &PassDescriptor<'_>,
    ) -> FilterResult<wgpu::SubmissionIndex> {
        self.ensure_ready()?;
        let context = self.ready_context()?.clone();
        let device = &context.device;

        let (result, scope_error) = with_error_scopes(device, || -> FilterResult<_> {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("filter_render_encoder"),
            });
            self.encode_render_to_texture(&mut encoder, pass)?;
            Ok(context.queue.submit(std::iter::once(encoder.finish())))
        });
        let index = result?;
        if let Some(error) = scope_error {
            warn!(error = %error, "Render pass rejected by device");
            return Err(scope_error_to_filter_error(error));
        }

        self.submissions += 1;
        Ok(index)
    }

    /// Record a render pass into a caller-owned encoder.
    ///
    /// Pipeline creation errors are reported here; errors in the recorded
    /// commands surface when the caller finishes and submits the encoder.
    pub fn encode_render_to_texture(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        pass: &PassDescriptor<'_>,
    ) -> FilterResult<()> {
        self.ensure_ready()?;
        check_usage(pass.source, wgpu::TextureUsages::TEXTURE_BINDING, "source")?;
        check_usage(pass.target, wgpu::TextureUsages::RENDER_ATTACHMENT, "target")?;

        let pipeline = self.pipeline(&PipelineKey::for_pass(pass))?;
        let (context, compiled) = self.ready_parts()?;
        let viewport = ViewportUniforms::new(
            pass.source.width(),
            pass.source.height(),
            self.config.device_pixel_ratio,
        );

        compiled.resources.encode_pass(
            &context.device,
            encoder,
            &pipeline,
            pass.target,
            pass.source,
            pass.uniform_buffer.or(compiled.effect_uniforms.as_ref()),
            viewport,
            "filter_render_pass",
        );
        Ok(())
    }

    /// Filter `texture` in place and submit the work to `queue`.
    ///
    /// `width`/`height` are logical; the temp texture is sized
    /// `width * device_pixel_ratio` × `height * device_pixel_ratio`. Returns
    /// once the command buffer is submitted, not when the GPU finishes.
    pub fn encode_to_command_queue(
        &mut self,
        queue: &wgpu::Queue,
        texture: &wgpu::Texture,
        width: f32,
        height: f32,
        device_pixel_ratio: f32,
    ) -> FilterResult<wgpu::SubmissionIndex> {
        self.ensure_ready()?;
        validate_device_pixel_ratio(device_pixel_ratio)?;
        if !(width.is_finite() && height.is_finite() && width >= 0.0 && height >= 0.0) {
            return Err(FilterError::InvalidConfig(format!(
                "viewport must be non-negative, got {}x{}",
                width, height
            )));
        }
        check_usage(
            texture,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
            "filtered",
        )?;

        let (physical_width, physical_height) = physical_extent(width, height, device_pixel_ratio);
        let format = texture.format();
        self.ensure_temp_texture(physical_width, physical_height, format)?;
        let temp = self.temp_texture.clone().ok_or_else(|| {
            FilterError::ResourceAllocation("temp texture was not allocated".to_string())
        })?;

        // Resolve every pipeline before anything is encoded
        let stages = self.effect.stages();
        let vertex = self
            .default_vertex_function()
            .map(str::to_string)
            .ok_or(FilterError::PipelineNotReady(self.state()))?;
        let first_pipeline = self.pipeline(&PipelineKey::new(
            &vertex,
            stages.first(),
            BlendFactor::One,
            BlendFactor::Zero,
            format,
        ))?;
        let final_pipeline = self.pipeline(&PipelineKey::new(
            &vertex,
            stages.second().unwrap_or(COPY_FRAGMENT_FUNCTION),
            BlendFactor::One,
            BlendFactor::Zero,
            format,
        ))?;

        // Each pass describes the texture it samples
        let first_viewport =
            ViewportUniforms::new(texture.width(), texture.height(), device_pixel_ratio);
        let final_viewport =
            ViewportUniforms::new(physical_width, physical_height, device_pixel_ratio);
        let (context, compiled) = self.ready_parts()?;
        let device = &context.device;
        let uniforms = compiled.effect_uniforms.as_ref();

        let (index, scope_error) = with_error_scopes(device, || {
            let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("filter_encoder"),
            });
            compiled.resources.encode_pass(
                device,
                &mut encoder,
                &first_pipeline,
                &temp,
                texture,
                uniforms,
                first_viewport,
                "filter_pass_to_temp",
            );
            compiled.resources.encode_pass(
                device,
                &mut encoder,
                &final_pipeline,
                texture,
                &temp,
                uniforms,
                final_viewport,
                "filter_pass_to_texture",
            );
            queue.submit(std::iter::once(encoder.finish()))
        });
        if let Some(error) = scope_error {
            warn!(error = %error, "Filter passes rejected by device");
            return Err(scope_error_to_filter_error(error));
        }

        debug!(
            effect = self.effect.name(),
            width = physical_width,
            height = physical_height,
            multi_stage = stages.is_multi_stage(),
            "Filter submitted"
        );

        self.submissions += 1;
        self.texture = Some(texture.clone());
        self.config.viewport_size = ViewportSize::new(width.round() as u32, height.round() as u32);
        self.config.device_pixel_ratio = device_pixel_ratio;
        Ok(index)
    }

    /// Filter the configured texture using the stored viewport and pixel
    /// ratio. An empty viewport means the texture's own size.
    pub fn apply_filter(&mut self) -> FilterResult<wgpu::SubmissionIndex> {
        self.ensure_ready()?;
        let texture = self.texture.clone().ok_or_else(|| {
            FilterError::InvalidConfig("apply_filter needs a texture".to_string())
        })?;
        let queue = self.ready_context()?.queue.clone();

        let ratio = self.config.device_pixel_ratio;
        let viewport = self.config.viewport_size;
        let (width, height) = if viewport.is_empty() {
            (
                texture.width() as f32 / ratio,
                texture.height() as f32 / ratio,
            )
        } else {
            (viewport.width as f32, viewport.height as f32)
        };

        self.encode_to_command_queue(&queue, &texture, width, height, ratio)
    }

    fn ensure_ready(&self) -> FilterResult<()> {
        let state = self.state();
        if state == FilterState::Ready {
            return Ok(());
        }
        error!(
            effect = self.effect.name(),
            state = %state,
            "Filter used before its shaders were compiled"
        );
        Err(FilterError::PipelineNotReady(state))
    }

    fn ready_context(&self) -> FilterResult<&GpuContext> {
        self.context
            .as_ref()
            .ok_or(FilterError::PipelineNotReady(self.state()))
    }

    fn ready_parts(&self) -> FilterResult<(&GpuContext, &CompiledShaders)> {
        match (&self.context, &self.compiled) {
            (Some(context), Some(compiled)) => Ok((context, compiled)),
            _ => Err(FilterError::PipelineNotReady(self.state())),
        }
    }

    /// Cached pipeline for `key`, built on first use
    fn pipeline(&mut self, key: &PipelineKey) -> FilterResult<wgpu::RenderPipeline> {
        if let Some(pipeline) = self.pipelines.get(key) {
            return Ok(pipeline.clone());
        }

        let (context, compiled) = self.ready_parts()?;
        compiled.library.function(&key.vertex, ShaderStage::Vertex)?;
        compiled.library.function(&key.fragment, ShaderStage::Fragment)?;
        let pipeline =
            compiled
                .resources
                .create_pipeline(&context.device, compiled.library.module(), key)?;

        self.pipelines.insert(key.clone(), pipeline.clone());
        Ok(pipeline)
    }

    /// Make sure the temp texture is `width`×`height` in `format`.
    ///
    /// On failure the previous temp texture is kept.
    fn ensure_temp_texture(
        &mut self,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> FilterResult<()> {
        let reusable = self.temp_texture.as_ref().is_some_and(|temp| {
            temp.width() == width
                && temp.height() == height
                && temp.format() == format
                && temp.usage().contains(
                    wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::RENDER_ATTACHMENT,
                )
        });
        if reusable {
            return Ok(());
        }

        let context = self.ready_context()?;
        let max = context.device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(FilterError::ResourceAllocation(format!(
                "temp texture {}x{} exceeds the device limit of {}",
                width, height, max
            )));
        }

        debug!(width, height, format = ?format, "Allocating temp texture");

        let (temp, scope_error) = with_error_scopes(&context.device, || {
            create_filter_texture(&context.device, "filter_temp_texture", width, height, format)
        });
        if let Some(error) = scope_error {
            warn!(width, height, error = %error, "Temp texture allocation failed");
            return Err(FilterError::ResourceAllocation(format!(
                "temp texture {}x{}: {}",
                width, height, error
            )));
        }

        self.temp_texture = Some(temp);
        Ok(())
    }
}

fn scope_error_to_filter_error(error: wgpu::Error) -> FilterError {
    match error {
        wgpu::Error::OutOfMemory { .. } => FilterError::ResourceAllocation(error.to_string()),
        other => FilterError::Device(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{Negative, Passthrough};

    #[test]
    fn test_new_filter_is_uninitialized() {
        let filter = Filter::new(Passthrough);
        assert_eq!(filter.state(), FilterState::Uninitialized);
        assert!(filter.library().is_none());
        assert!(filter.texture().is_none());
        assert!(filter.temp_texture().is_none());
        assert_eq!(filter.device_pixel_ratio(), 1.0);
    }

    #[test]
    fn test_apply_before_compile_is_not_ready() {
        let mut filter = Filter::new(Negative);
        assert!(matches!(
            filter.apply_filter(),
            Err(FilterError::PipelineNotReady(FilterState::Uninitialized))
        ));
        assert_eq!(filter.submission_count(), 0);
    }

    #[test]
    fn test_compile_without_device() {
        let mut filter = Filter::new(Passthrough);
        assert_eq!(
            filter.compile_shaders(),
            Err(FilterError::PipelineNotReady(FilterState::Uninitialized))
        );
    }

    #[test]
    fn test_device_pixel_ratio_setter_validates() {
        let mut filter = Filter::new(Passthrough);
        assert!(filter.set_device_pixel_ratio(2.0).is_ok());
        assert_eq!(filter.device_pixel_ratio(), 2.0);
        assert!(filter.set_device_pixel_ratio(0.0).is_err());
        assert_eq!(filter.device_pixel_ratio(), 2.0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(FilterState::DeviceBound.to_string(), "device bound");
        assert_eq!(FilterState::Ready.to_string(), "ready");
    }
}
