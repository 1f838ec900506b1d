// SPDX-License-Identifier: GPL-3.0-only

//! GPU device acquisition.
//!
//! A [`GpuContext`] is the device handle the filter binds to. Device and queue
//! are shared (`Arc`) so several filters can use one context; the caller keeps
//! ownership of the context itself.

use crate::errors::{FilterError, FilterResult};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Information about the created GPU device
#[derive(Debug, Clone)]
pub struct GpuDeviceInfo {
    /// Name of the GPU adapter
    pub adapter_name: String,
    /// Backend being used (Vulkan, Metal, DX12, etc.)
    pub backend: wgpu::Backend,
    /// Integrated, discrete, software...
    pub device_type: wgpu::DeviceType,
    /// Whether the software fallback adapter had to be used
    pub fallback: bool,
}

/// Shared device + queue handle
#[derive(Clone)]
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub info: GpuDeviceInfo,
}

impl std::fmt::Debug for GpuContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuContext").field("info", &self.info).finish()
    }
}

impl GpuContext {
    /// Wrap a device and queue created elsewhere (e.g. by a windowing layer)
    pub fn from_parts(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        info: GpuDeviceInfo,
    ) -> Self {
        Self {
            device,
            queue,
            info,
        }
    }

    /// Block until all submitted work on this device has finished
    pub fn wait_idle(&self) -> FilterResult<()> {
        self.device
            .poll(wgpu::PollType::wait_indefinitely())
            .map(|_| ())
            .map_err(|e| FilterError::Device(format!("Failed to wait for GPU: {}", e)))
    }
}

/// Create a wgpu device and queue for filter rendering.
///
/// Prefers a hardware adapter and falls back to the software adapter when
/// none is available. Backends can be restricted with `WGPU_BACKEND`.
pub async fn create_device(label: &str) -> FilterResult<GpuContext> {
    info!(label = label, "Creating GPU device for filter rendering");

    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::from_env().unwrap_or(wgpu::Backends::PRIMARY),
        ..Default::default()
    });

    let (adapter, fallback) = match request_adapter(&instance, false).await {
        Ok(adapter) => (adapter, false),
        Err(e) => {
            warn!(error = %e, "No hardware adapter, trying software fallback");
            let adapter = request_adapter(&instance, true).await.map_err(|e| {
                FilterError::Device(format!("Failed to find suitable GPU adapter: {}", e))
            })?;
            (adapter, true)
        }
    };

    let adapter_info = adapter.get_info();

    info!(
        adapter = %adapter_info.name,
        backend = ?adapter_info.backend,
        device_type = ?adapter_info.device_type,
        fallback,
        "GPU adapter selected for filtering"
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: Some(label),
            required_features: wgpu::Features::empty(),
            required_limits: adapter.limits(),
            memory_hints: wgpu::MemoryHints::Performance,
            ..Default::default()
        })
        .await
        .map_err(|e| FilterError::Device(format!("Failed to create GPU device: {}", e)))?;

    debug!(
        max_texture_dimension = device.limits().max_texture_dimension_2d,
        "GPU device created"
    );

    let info = GpuDeviceInfo {
        adapter_name: adapter_info.name.clone(),
        backend: adapter_info.backend,
        device_type: adapter_info.device_type,
        fallback,
    };

    Ok(GpuContext {
        device: Arc::new(device),
        queue: Arc::new(queue),
        info,
    })
}

/// Blocking form of [`create_device`]
pub fn create_device_blocking(label: &str) -> FilterResult<GpuContext> {
    pollster::block_on(create_device(label))
}

async fn request_adapter(
    instance: &wgpu::Instance,
    force_fallback_adapter: bool,
) -> Result<wgpu::Adapter, wgpu::RequestAdapterError> {
    instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter,
        })
        .await
}

/// Run `f` inside validation and out-of-memory error scopes and return the
/// first captured error, if any.
pub(crate) fn with_error_scopes<T>(
    device: &wgpu::Device,
    f: impl FnOnce() -> T,
) -> (T, Option<wgpu::Error>) {
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let value = f();
    let validation = pollster::block_on(device.pop_error_scope());
    let out_of_memory = pollster::block_on(device.pop_error_scope());
    (value, out_of_memory.or(validation))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_device() {
        // This test requires a GPU, so it may be skipped in CI
        match create_device("test_device").await {
            Ok(context) => {
                println!("Created device: {:?}", context.info);
                assert!(!context.info.adapter_name.is_empty() || context.info.fallback);
                context.wait_idle().expect("idle device");
            }
            Err(e) => {
                // Skip if no GPU available
                println!("Skipping test (no GPU): {}", e);
            }
        }
    }
}
