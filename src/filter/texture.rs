// SPDX-License-Identifier: GPL-3.0-only

//! Texture helpers for filter inputs and outputs

use crate::errors::{FilterError, FilterResult};
use crate::shaders::packed_len;

/// Usages a texture needs to be filtered in place and read back
pub const FILTER_TEXTURE_USAGES: wgpu::TextureUsages = wgpu::TextureUsages::TEXTURE_BINDING
    .union(wgpu::TextureUsages::RENDER_ATTACHMENT)
    .union(wgpu::TextureUsages::COPY_SRC)
    .union(wgpu::TextureUsages::COPY_DST);

/// Create a 2-D texture usable as filter source, target and temp texture
pub fn create_filter_texture(
    device: &wgpu::Device,
    label: &str,
    width: u32,
    height: u32,
    format: wgpu::TextureFormat,
) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: FILTER_TEXTURE_USAGES,
        view_formats: &[],
    })
}

/// Upload tightly packed pixel rows into the whole texture
pub fn upload_texture(queue: &wgpu::Queue, texture: &wgpu::Texture, data: &[u8]) -> FilterResult<()> {
    let bytes_per_pixel = texture.format().block_copy_size(None).ok_or_else(|| {
        FilterError::InvalidConfig(format!("cannot upload to format {:?}", texture.format()))
    })?;
    let width = texture.width();
    let height = texture.height();
    let expected = packed_len(width * bytes_per_pixel, height);
    if data.len() != expected {
        return Err(FilterError::InvalidConfig(format!(
            "pixel data is {} bytes, a {}x{} {:?} texture needs {}",
            data.len(),
            width,
            height,
            texture.format(),
            expected
        )));
    }
    check_usage(texture, wgpu::TextureUsages::COPY_DST, "upload target")?;

    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * bytes_per_pixel),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    Ok(())
}

pub(crate) fn check_usage(
    texture: &wgpu::Texture,
    required: wgpu::TextureUsages,
    what: &str,
) -> FilterResult<()> {
    if texture.usage().contains(required) {
        Ok(())
    } else {
        Err(FilterError::InvalidConfig(format!(
            "{} texture is missing usage {:?} (has {:?})",
            what,
            required.difference(texture.usage()),
            texture.usage()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_usages() {
        assert!(FILTER_TEXTURE_USAGES.contains(wgpu::TextureUsages::RENDER_ATTACHMENT));
        assert!(FILTER_TEXTURE_USAGES.contains(wgpu::TextureUsages::TEXTURE_BINDING));
        assert!(!FILTER_TEXTURE_USAGES.contains(wgpu::TextureUsages::STORAGE_BINDING));
    }
}
