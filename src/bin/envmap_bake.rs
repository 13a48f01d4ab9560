use anyhow::{anyhow, Context, Result};
use image::{Rgb, RgbImage};
use kestrel_envmap::cli::BakeArgs;
use kestrel_envmap::config::PipelineConfig;
use kestrel_envmap::diagnostics::PipelineEvent;
use kestrel_envmap::environment::{prepare_path, PreparedEnvironment};
use std::fs;
use std::path::Path;

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let args = BakeArgs::parse_from_env()?;
    let input = args.input.clone().ok_or_else(|| anyhow!("No input file given. Usage: envmap_bake <file.hdr>"))?;

    let mut config = match args.config.as_deref() {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    let overrides = args.overrides();
    if !overrides.is_empty() {
        tracing::info!("CLI overrides applied: {}", overrides.applied_fields().join(", "));
    }
    config.apply_overrides(&overrides);

    let mut sink = |event: &PipelineEvent| match event {
        PipelineEvent::FallbackUsed { reason } => tracing::warn!("using LDR fallback: {reason}"),
        PipelineEvent::SourceDecoded { width, height, stats } => tracing::info!(
            "source {width}x{height}, luminance {:.4}..{:.4}",
            stats.min_luminance,
            stats.max_luminance
        ),
        other => tracing::debug!(?other, "pipeline event"),
    };
    let env = prepare_path(&input, &config, &mut sink)?;

    let summary = env.summary();
    let json = serde_json::to_string_pretty(&summary).context("serializing environment summary")?;
    match args.report.as_deref() {
        Some(path) => {
            create_parent_dir(path)?;
            fs::write(path, json).with_context(|| format!("writing report {}", path.display()))?;
        }
        None => println!("{json}"),
    }

    if let Some(dir) = args.preview_dir.as_deref() {
        write_previews(&env, dir)?;
    }
    Ok(())
}

fn create_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    Ok(())
}

/// Writes one gamma-corrected PNG per face and level. Values above 1.0 clip.
fn write_previews(env: &PreparedEnvironment, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for image in env.upload_images() {
        let size = image.size;
        let preview = RgbImage::from_fn(size, size, |x, y| {
            let texel = image.texel(x, y);
            Rgb([to_display(texel.x), to_display(texel.y), to_display(texel.z)])
        });
        let path = dir.join(format!("{}_mip{}.png", image.face.slug(), image.level));
        preview.save(&path).with_context(|| format!("writing preview {}", path.display()))?;
    }
    tracing::info!("wrote {} previews to {}", env.chains().len() * env.mip_count() as usize, dir.display());
    Ok(())
}

fn to_display(linear: f32) -> u8 {
    (linear.clamp(0.0, 1.0).powf(1.0 / 2.2) * 255.0 + 0.5) as u8
}
