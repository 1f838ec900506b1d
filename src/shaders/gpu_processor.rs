// SPDX-License-Identifier: GPL-3.0-only

//! Shared GPU resource helpers
//!
//! - Async buffer and texture readback

use crate::errors::{FilterError, FilterResult};

/// Byte length of `height` tightly packed rows of `row_bytes` each
#[inline]
pub fn packed_len(row_bytes: u32, height: u32) -> usize {
    row_bytes as usize * height as usize
}

/// Row pitch for texture-to-buffer copies, rounded up to
/// `COPY_BYTES_PER_ROW_ALIGNMENT`.
#[inline]
pub fn padded_bytes_per_row(unpadded: u32) -> u32 {
    unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT) * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT
}

/// Helper for async buffer readback (map, poll, read, unmap)
///
/// The buffer must have `MAP_READ` usage.
pub async fn read_buffer_async(
    device: &wgpu::Device,
    buffer: &wgpu::Buffer,
) -> FilterResult<Vec<u8>> {
    let slice = buffer.slice(..);
    let (sender, receiver) = futures::channel::oneshot::channel();

    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    device
        .poll(wgpu::PollType::wait_indefinitely())
        .map_err(|e| FilterError::Device(format!("Failed to poll device: {}", e)))?;

    receiver
        .await
        .map_err(|_| FilterError::Device("Failed to receive buffer mapping".to_string()))?
        .map_err(|e| FilterError::Device(format!("Failed to map buffer: {:?}", e)))?;

    let data = slice.get_mapped_range().to_vec();
    buffer.unmap();

    Ok(data)
}

/// Read a whole texture back to CPU memory with tightly packed rows.
///
/// Waits for all previously submitted work, so it doubles as a way to force
/// GPU completion. The texture needs `COPY_SRC` usage.
pub async fn read_texture_async(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
) -> FilterResult<Vec<u8>> {
    if !texture.usage().contains(wgpu::TextureUsages::COPY_SRC) {
        return Err(FilterError::InvalidConfig(
            "texture readback requires COPY_SRC usage".to_string(),
        ));
    }
    let bytes_per_pixel = texture.format().block_copy_size(None).ok_or_else(|| {
        FilterError::InvalidConfig(format!(
            "cannot read back texture format {:?}",
            texture.format()
        ))
    })?;

    let width = texture.width();
    let height = texture.height();
    let unpadded = width * bytes_per_pixel;
    let padded = padded_bytes_per_row(unpadded);

    let staging_buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("filter_readback_buffer"),
        size: padded as u64 * height as u64,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("filter_readback_encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging_buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let data = read_buffer_async(device, &staging_buffer).await?;
    if padded == unpadded {
        return Ok(data);
    }

    // Strip row padding
    let mut packed = Vec::with_capacity(packed_len(unpadded, height));
    for row in data.chunks_exact(padded as usize) {
        packed.extend_from_slice(&row[..unpadded as usize]);
    }
    Ok(packed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn test_packed_len_past_u32() {
        // 16384x16384 Rgba32Float is exactly 4 GiB
        let row_bytes = 16384 * 16;
        assert_eq!(packed_len(row_bytes, 16384), 4 * 1024 * 1024 * 1024);
        assert_eq!(packed_len(u32::MAX, 2), u32::MAX as usize * 2);
    }

    #[test]
    fn test_padded_bytes_per_row() {
        assert_eq!(padded_bytes_per_row(6400), 6400);
        assert_eq!(padded_bytes_per_row(4), 256);
        assert_eq!(padded_bytes_per_row(257), 512);
    }
}
