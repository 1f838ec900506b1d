// SPDX-License-Identifier: GPL-3.0-only

//! Render pass encoding
//!
//! One pass = one fullscreen quad drawn into a target texture with the source
//! texture bound, blended over the target's existing contents.

use crate::config::SamplerMode;
use crate::errors::{FilterError, FilterResult};
use crate::gpu::with_error_scopes;
use crate::shaders::DEFAULT_VERTEX_FUNCTION;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use wgpu::util::DeviceExt;

/// Size of the zeroed uniform block bound when a pass has no parameters
const PLACEHOLDER_UNIFORM_SIZE: u64 = 256;

/// Blend factor applied to the fragment output (source) or the target's
/// existing contents (destination).
///
/// `result = src * source_factor + dst * destination_factor`
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum BlendFactor {
    Zero,
    One,
    SourceColor,
    OneMinusSourceColor,
    SourceAlpha,
    OneMinusSourceAlpha,
    DestinationColor,
    OneMinusDestinationColor,
    DestinationAlpha,
    OneMinusDestinationAlpha,
    SourceAlphaSaturated,
}

impl BlendFactor {
    pub fn to_wgpu(self) -> wgpu::BlendFactor {
        match self {
            BlendFactor::Zero => wgpu::BlendFactor::Zero,
            BlendFactor::One => wgpu::BlendFactor::One,
            BlendFactor::SourceColor => wgpu::BlendFactor::Src,
            BlendFactor::OneMinusSourceColor => wgpu::BlendFactor::OneMinusSrc,
            BlendFactor::SourceAlpha => wgpu::BlendFactor::SrcAlpha,
            BlendFactor::OneMinusSourceAlpha => wgpu::BlendFactor::OneMinusSrcAlpha,
            BlendFactor::DestinationColor => wgpu::BlendFactor::Dst,
            BlendFactor::OneMinusDestinationColor => wgpu::BlendFactor::OneMinusDst,
            BlendFactor::DestinationAlpha => wgpu::BlendFactor::DstAlpha,
            BlendFactor::OneMinusDestinationAlpha => wgpu::BlendFactor::OneMinusDstAlpha,
            BlendFactor::SourceAlphaSaturated => wgpu::BlendFactor::SrcAlphaSaturated,
        }
    }

    /// Per-channel weights this factor resolves to for the given colors.
    ///
    /// CPU reference of the fixed-function blend unit.
    pub fn weights(self, src: [f32; 4], dst: [f32; 4]) -> [f32; 4] {
        match self {
            BlendFactor::Zero => [0.0; 4],
            BlendFactor::One => [1.0; 4],
            BlendFactor::SourceColor => src,
            BlendFactor::OneMinusSourceColor => src.map(|c| 1.0 - c),
            BlendFactor::SourceAlpha => [src[3]; 4],
            BlendFactor::OneMinusSourceAlpha => [1.0 - src[3]; 4],
            BlendFactor::DestinationColor => dst,
            BlendFactor::OneMinusDestinationColor => dst.map(|c| 1.0 - c),
            BlendFactor::DestinationAlpha => [dst[3]; 4],
            BlendFactor::OneMinusDestinationAlpha => [1.0 - dst[3]; 4],
            BlendFactor::SourceAlphaSaturated => {
                let f = src[3].min(1.0 - dst[3]);
                [f, f, f, 1.0]
            }
        }
    }
}

impl From<BlendFactor> for wgpu::BlendFactor {
    fn from(factor: BlendFactor) -> Self {
        factor.to_wgpu()
    }
}

/// Additive blend state applied identically to color and alpha
pub fn blend_state(source: BlendFactor, destination: BlendFactor) -> wgpu::BlendState {
    let component = wgpu::BlendComponent {
        src_factor: source.to_wgpu(),
        dst_factor: destination.to_wgpu(),
        operation: wgpu::BlendOperation::Add,
    };
    wgpu::BlendState {
        color: component,
        alpha: component,
    }
}

/// Expected output of one blended draw into a unorm target
pub fn blend_reference(
    src: [f32; 4],
    dst: [f32; 4],
    source: BlendFactor,
    destination: BlendFactor,
) -> [f32; 4] {
    let s = source.weights(src, dst);
    let d = destination.weights(src, dst);
    std::array::from_fn(|i| (src[i] * s[i] + dst[i] * d[i]).clamp(0.0, 1.0))
}

/// Cache key of a render pipeline.
///
/// The target format is part of the key because wgpu pipelines are built
/// for one color format.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PipelineKey {
    pub vertex: String,
    pub fragment: String,
    pub source_blend: BlendFactor,
    pub destination_blend: BlendFactor,
    pub format: wgpu::TextureFormat,
}

impl PipelineKey {
    pub fn new(
        vertex: &str,
        fragment: &str,
        source_blend: BlendFactor,
        destination_blend: BlendFactor,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            vertex: vertex.to_string(),
            fragment: fragment.to_string(),
            source_blend,
            destination_blend,
            format,
        }
    }

    pub fn for_pass(pass: &PassDescriptor<'_>) -> Self {
        Self::new(
            pass.vertex_function,
            pass.fragment_function,
            pass.source_blend,
            pass.destination_blend,
            pass.target.format(),
        )
    }
}

/// Arguments of a single render pass
#[derive(Clone, Copy, Debug)]
pub struct PassDescriptor<'a> {
    pub target: &'a wgpu::Texture,
    pub source: &'a wgpu::Texture,
    pub vertex_function: &'a str,
    pub fragment_function: &'a str,
    pub source_blend: BlendFactor,
    pub destination_blend: BlendFactor,
    /// Fragment parameter block bound at binding 3 (read-only). Falls back
    /// to the effect's own uniforms.
    pub uniform_buffer: Option<&'a wgpu::Buffer>,
}

impl<'a> PassDescriptor<'a> {
    /// Replace-blend pass with the default vertex function
    pub fn new(
        target: &'a wgpu::Texture,
        source: &'a wgpu::Texture,
        fragment_function: &'a str,
    ) -> Self {
        Self {
            target,
            source,
            vertex_function: DEFAULT_VERTEX_FUNCTION,
            fragment_function,
            source_blend: BlendFactor::One,
            destination_blend: BlendFactor::Zero,
            uniform_buffer: None,
        }
    }

    pub fn with_vertex_function(mut self, name: &'a str) -> Self {
        self.vertex_function = name;
        self
    }

    pub fn with_blend(mut self, source: BlendFactor, destination: BlendFactor) -> Self {
        self.source_blend = source;
        self.destination_blend = destination;
        self
    }

    pub fn with_uniform_buffer(mut self, buffer: &'a wgpu::Buffer) -> Self {
        self.uniform_buffer = Some(buffer);
        self
    }
}

/// Viewport uniforms (binding 2), mirrors `ViewportUniforms` in prelude.wgsl
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub(crate) struct ViewportUniforms {
    size: [f32; 2],
    device_pixel_ratio: f32,
    _padding: f32,
}

impl ViewportUniforms {
    pub(crate) fn new(width: u32, height: u32, device_pixel_ratio: f32) -> Self {
        Self {
            size: [width as f32, height as f32],
            device_pixel_ratio,
            _padding: 0.0,
        }
    }
}

/// Device objects shared by every pipeline of one compiled filter
pub(crate) struct PipelineResources {
    bind_group_layout: wgpu::BindGroupLayout,
    pipeline_layout: wgpu::PipelineLayout,
    sampler: wgpu::Sampler,
    placeholder_uniforms: wgpu::Buffer,
}

impl PipelineResources {
    pub(crate) fn new(device: &wgpu::Device, sampler_mode: SamplerMode) -> Self {
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("filter_bind_group_layout"),
            entries: &[
                // Source texture
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                // Viewport uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Effect parameters
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("filter_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let placeholder_uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("filter_placeholder_uniforms"),
            size: PLACEHOLDER_UNIFORM_SIZE,
            usage: wgpu::BufferUsages::UNIFORM,
            mapped_at_creation: false,
        });

        Self {
            bind_group_layout,
            pipeline_layout,
            sampler: create_sampler(device, sampler_mode),
            placeholder_uniforms,
        }
    }

    pub(crate) fn set_sampler_mode(&mut self, device: &wgpu::Device, sampler_mode: SamplerMode) {
        self.sampler = create_sampler(device, sampler_mode);
    }

    /// Build the render pipeline for `key` from `module`
    pub(crate) fn create_pipeline(
        &self,
        device: &wgpu::Device,
        module: &wgpu::ShaderModule,
        key: &PipelineKey,
    ) -> FilterResult<wgpu::RenderPipeline> {
        let label = format!("filter_pipeline_{}_{}", key.vertex, key.fragment);

        let (pipeline, error) = with_error_scopes(device, || {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&label),
                layout: Some(&self.pipeline_layout),
                vertex: wgpu::VertexState {
                    module,
                    entry_point: Some(&key.vertex),
                    buffers: &[],
                    compilation_options: Default::default(),
                },
                primitive: wgpu::PrimitiveState::default(),
                depth_stencil: None,
                multisample: wgpu::MultisampleState {
                    count: 1,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                fragment: Some(wgpu::FragmentState {
                    module,
                    entry_point: Some(&key.fragment),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: key.format,
                        blend: Some(blend_state(key.source_blend, key.destination_blend)),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: Default::default(),
                }),
                multiview: None,
                cache: None,
            })
        });

        if let Some(error) = error {
            warn!(pipeline = %label, error = %error, "Render pipeline creation failed");
            return Err(FilterError::ResourceAllocation(format!(
                "render pipeline {}: {}",
                label, error
            )));
        }

        debug!(
            vertex = %key.vertex,
            fragment = %key.fragment,
            format = ?key.format,
            "Render pipeline created"
        );
        Ok(pipeline)
    }

    /// Record one fullscreen draw of `source` into `target`.
    ///
    /// The target is loaded, not cleared, so blending sees its prior contents.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn encode_pass(
        &self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        pipeline: &wgpu::RenderPipeline,
        target: &wgpu::Texture,
        source: &wgpu::Texture,
        uniform_buffer: Option<&wgpu::Buffer>,
        viewport: ViewportUniforms,
        label: &str,
    ) {
        let source_view = source.create_view(&wgpu::TextureViewDescriptor::default());
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        let viewport_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("filter_viewport_buffer"),
            contents: bytemuck::bytes_of(&viewport),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let uniforms = uniform_buffer.unwrap_or(&self.placeholder_uniforms);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("filter_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&source_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: viewport_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: uniforms.as_entire_binding(),
                },
            ],
        });

        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &target_view,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        render_pass.set_viewport(
            0.0,
            0.0,
            target.width() as f32,
            target.height() as f32,
            0.0,
            1.0,
        );
        render_pass.set_pipeline(pipeline);
        render_pass.set_bind_group(0, &bind_group, &[]);
        render_pass.draw(0..6, 0..1);
    }
}

fn create_sampler(device: &wgpu::Device, sampler_mode: SamplerMode) -> wgpu::Sampler {
    let filter = sampler_mode.filter_mode();
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("filter_sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: filter,
        min_filter: filter,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}
