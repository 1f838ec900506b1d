// SPDX-License-Identifier: GPL-3.0-only

//! Shared helpers for GPU integration tests
//!
//! GPU tests call [`gpu_context`] first and return early when it yields
//! `None`, so they pass on machines without an adapter.

#![allow(dead_code)]

use gpu_filter::GpuContext;
use gpu_filter::filter::{create_filter_texture, upload_texture};
use gpu_filter::gpu::create_device;
use gpu_filter::shaders::read_texture_async;

pub const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// Create a device, or print a skip notice and return `None`
pub async fn gpu_context(label: &str) -> Option<GpuContext> {
    match create_device(label).await {
        Ok(context) => Some(context),
        Err(e) => {
            println!("Skipping test (no GPU): {}", e);
            None
        }
    }
}

/// RGBA8 texture filled with `pixels`
pub fn texture_from_pixels(
    context: &GpuContext,
    width: u32,
    height: u32,
    pixels: &[u8],
) -> wgpu::Texture {
    let texture = create_filter_texture(&context.device, "test_texture", width, height, FORMAT);
    upload_texture(&context.queue, &texture, pixels).expect("upload test pixels");
    texture
}

/// RGBA8 texture where every pixel is `color`
pub fn solid_texture(context: &GpuContext, width: u32, height: u32, color: [u8; 4]) -> wgpu::Texture {
    let pixels = color.repeat((width * height) as usize);
    texture_from_pixels(context, width, height, &pixels)
}

/// 8×8-cell black/white checkerboard with a colour ramp in the white cells
pub fn checkerboard(width: u32, height: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            if ((x / 8) + (y / 8)) % 2 == 0 {
                pixels.extend_from_slice(&[(x % 256) as u8, (y % 256) as u8, 200, 255]);
            } else {
                pixels.extend_from_slice(&[0, 0, 0, 255]);
            }
        }
    }
    pixels
}

/// Read a texture back, waiting for submitted work
pub async fn read_pixels(context: &GpuContext, texture: &wgpu::Texture) -> Vec<u8> {
    read_texture_async(&context.device, &context.queue, texture)
        .await
        .expect("read back texture")
}

pub fn to_unit(color: [u8; 4]) -> [f32; 4] {
    color.map(|c| c as f32 / 255.0)
}
