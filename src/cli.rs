// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for filtering images
//!
//! This module provides command-line functionality for:
//! - Applying a built-in or custom effect to an image file
//! - Listing built-in effects
//! - Showing the GPU adapter and the effective configuration

use gpu_filter::config::{Config, validate_device_pixel_ratio};
use gpu_filter::effects::{CustomEffect, EffectKind, EffectStages, FilterEffect, ShaderSource};
use gpu_filter::filter::{Filter, create_filter_texture, upload_texture};
use gpu_filter::gpu::create_device_blocking;
use gpu_filter::shaders::read_texture_async;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// Arguments of the `apply` command
pub struct ApplyArgs {
    pub config: Option<PathBuf>,
    pub input: PathBuf,
    pub output: PathBuf,
    pub effect: Option<EffectKind>,
    pub shader: Option<PathBuf>,
    pub fragment: String,
    pub scale: Option<f32>,
}

/// Filter one image file and write the result
pub fn apply(args: ApplyArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load_or_default(args.config.as_deref())?;

    let effect: Box<dyn FilterEffect> = match &args.shader {
        Some(path) => Box::new(CustomEffect::new(
            path.file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_else(|| "custom".to_string()),
            ShaderSource::Path(path.clone()),
            EffectStages::single(args.fragment.as_str()),
        )),
        None => {
            let mut settings = config.effect.clone();
            if let Some(kind) = args.effect {
                settings.kind = kind;
            }
            settings.build()
        }
    };

    let device_pixel_ratio = args.scale.unwrap_or(config.filter.device_pixel_ratio);
    validate_device_pixel_ratio(device_pixel_ratio)?;

    let image = image::open(&args.input)?.to_rgba8();
    let (width, height) = image.dimensions();
    println!("Input: {} ({}x{})", args.input.display(), width, height);
    println!("Effect: {}", effect.name());

    let context = create_device_blocking("gpu-filter")?;
    println!(
        "GPU: {} ({:?})",
        context.info.adapter_name, context.info.backend
    );

    let texture = create_filter_texture(
        &context.device,
        "input_image",
        width,
        height,
        wgpu::TextureFormat::Rgba8Unorm,
    );
    upload_texture(&context.queue, &texture, image.as_raw())?;

    let start = Instant::now();
    let mut filter = Filter::from_boxed(effect);
    filter.set_config(config.filter);
    filter.set_device(context.clone());
    filter.compile_shaders()?;
    filter.encode_to_command_queue(
        &context.queue,
        &texture,
        width as f32 / device_pixel_ratio,
        height as f32 / device_pixel_ratio,
        device_pixel_ratio,
    )?;

    let pixels = pollster::block_on(read_texture_async(
        &context.device,
        &context.queue,
        &texture,
    ))?;
    info!(elapsed_ms = start.elapsed().as_millis() as u64, "Filter finished");

    let output = image::RgbaImage::from_raw(width, height, pixels)
        .ok_or("GPU readback returned the wrong number of bytes")?;
    output.save(&args.output)?;

    println!("Output saved: {}", args.output.display());
    Ok(())
}

/// List built-in effects
pub fn list_effects() -> Result<(), Box<dyn std::error::Error>> {
    println!("Built-in effects:");
    println!();
    for kind in EffectKind::ALL {
        let effect = gpu_filter::EffectSettings::with_kind(kind).build();
        let passes = if effect.stages().is_multi_stage() {
            " (two-stage)"
        } else {
            ""
        };
        println!("  {:<12} {}{}", kind.as_str(), kind.description(), passes);
    }
    Ok(())
}

/// Show the GPU adapter the filter would run on
pub fn show_info() -> Result<(), Box<dyn std::error::Error>> {
    let context = create_device_blocking("gpu-filter-info")?;
    let info = &context.info;
    let limits = context.device.limits();

    println!("Adapter: {}", info.adapter_name);
    println!("Backend: {:?}", info.backend);
    println!("Device type: {:?}", info.device_type);
    if info.fallback {
        println!("Software fallback: yes");
    }
    println!(
        "Max texture dimension: {}",
        limits.max_texture_dimension_2d
    );
    Ok(())
}

/// Print the effective configuration or write it to the config path
pub fn show_config(path: Option<PathBuf>, write: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &path {
        Some(explicit) if write && !explicit.exists() => Config::default(),
        _ => Config::load_or_default(path.as_deref())?,
    };

    if write {
        let target = path
            .or_else(Config::default_path)
            .ok_or("no config directory available, pass --config")?;
        config.save(&target)?;
        println!("Config written: {}", target.display());
    } else {
        println!("{}", serde_json::to_string_pretty(&config)?);
    }
    Ok(())
}
