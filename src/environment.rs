use crate::config::PipelineConfig;
use crate::cubemap;
use crate::diagnostics::{DiagnosticsSink, PipelineEvent, RasterStats};
use crate::hdr;
use crate::ldr;
use crate::mip::build_chain;
use crate::raster::{CubeFace, LinearRaster, MipChain};
use crate::upload::{upload_order, FaceLevelImage};
use anyhow::{Context, Result};
use glam::{Vec2, Vec3};
use serde::Serialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Rgbe,
    LdrFallback,
    Generated,
}

/// Six mip chains in `CubeFace::ALL` order, ready for upload.
#[derive(Debug, Clone)]
pub struct PreparedEnvironment {
    source: SourceKind,
    source_width: u32,
    source_height: u32,
    chains: Vec<MipChain>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FaceSummary {
    pub face: CubeFace,
    pub base_stats: RasterStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentSummary {
    pub source: SourceKind,
    pub source_width: u32,
    pub source_height: u32,
    pub face_size: u32,
    pub mip_sizes: Vec<u32>,
    pub faces: Vec<FaceSummary>,
}

impl PreparedEnvironment {
    pub fn source(&self) -> SourceKind {
        self.source
    }

    pub fn source_dimensions(&self) -> (u32, u32) {
        (self.source_width, self.source_height)
    }

    pub fn face_size(&self) -> u32 {
        self.chains[0].base().size()
    }

    pub fn mip_count(&self) -> u32 {
        self.chains[0].len() as u32
    }

    pub fn chains(&self) -> &[MipChain] {
        &self.chains
    }

    pub fn chain(&self, face: CubeFace) -> &MipChain {
        &self.chains[face.index()]
    }

    pub fn into_chains(self) -> Vec<MipChain> {
        self.chains
    }

    pub fn upload_images(&self) -> Vec<FaceLevelImage<'_>> {
        upload_order(&self.chains)
    }

    pub fn summary(&self) -> EnvironmentSummary {
        EnvironmentSummary {
            source: self.source,
            source_width: self.source_width,
            source_height: self.source_height,
            face_size: self.face_size(),
            mip_sizes: self.chains[0].sizes(),
            faces: self
                .chains
                .iter()
                .map(|chain| FaceSummary {
                    face: chain.face(),
                    base_stats: RasterStats::measure(chain.base().raster()),
                })
                .collect(),
        }
    }
}

/// Decodes `bytes` and builds the cubemap mip chains.
///
/// RGBE decoding is tried first. Bytes that are not RGBE at all are retried
/// as a PNG/JPEG when the config allows it. A corrupt RGBE file always
/// returns its `DecodeError`.
pub fn prepare(
    bytes: &[u8],
    config: &PipelineConfig,
    sink: &mut dyn DiagnosticsSink,
) -> Result<PreparedEnvironment> {
    let (raster, source) = match hdr::decode_image(bytes) {
        Ok(image) => {
            sink.record(&PipelineEvent::HeaderParsed {
                width: image.header.width,
                height: image.header.height,
                format: image.header.format.clone(),
                run_length_rows: image.run_length_rows,
            });
            (image.raster, SourceKind::Rgbe)
        }
        Err(err) if config.allow_ldr_fallback && !looks_like_rgbe(bytes, &err) => {
            tracing::warn!("RGBE decode failed ({err}); trying LDR fallback");
            let raster = ldr::decode_ldr(bytes)
                .with_context(|| format!("environment is neither RGBE ({err}) nor a supported LDR image"))?;
            sink.record(&PipelineEvent::FallbackUsed { reason: err.to_string() });
            (raster, SourceKind::LdrFallback)
        }
        Err(err) => return Err(err).context("decoding RGBE environment"),
    };
    Ok(prepare_raster(raster, source, config, sink))
}

/// True when the failure came from inside an RGBE file rather than from
/// bytes that never had an RGBE header.
fn looks_like_rgbe(bytes: &[u8], err: &hdr::DecodeError) -> bool {
    let header_failure = matches!(err, hdr::DecodeError::InvalidHeader | hdr::DecodeError::HeaderTooLong);
    !header_failure || bytes.starts_with(b"#?")
}

pub fn prepare_path(
    path: impl AsRef<Path>,
    config: &PipelineConfig,
    sink: &mut dyn DiagnosticsSink,
) -> Result<PreparedEnvironment> {
    let path = path.as_ref();
    if !is_supported_environment_file(path) {
        tracing::warn!("'{}' does not have a known environment extension", path.display());
    }
    let bytes = fs::read(path).with_context(|| format!("reading environment '{}'", path.display()))?;
    prepare(&bytes, config, sink).with_context(|| format!("processing environment '{}'", path.display()))
}

/// Projects an already decoded equirectangular raster and builds every face's chain.
pub fn prepare_raster(
    raster: LinearRaster,
    source: SourceKind,
    config: &PipelineConfig,
    sink: &mut dyn DiagnosticsSink,
) -> PreparedEnvironment {
    let (source_width, source_height) = (raster.width(), raster.height());
    sink.record(&PipelineEvent::SourceDecoded {
        width: source_width,
        height: source_height,
        stats: RasterStats::measure(&raster),
    });

    let level = cubemap::project(&raster, config.face_size);
    for face in level.faces() {
        sink.record(&PipelineEvent::FaceProjected {
            face: face.face(),
            size: face.size(),
            stats: RasterStats::measure(face.raster()),
        });
    }
    drop(raster);

    let mip_levels = config.mip_levels;
    #[cfg(feature = "parallel")]
    let chains: Vec<MipChain> = {
        use rayon::prelude::*;
        level.into_faces().into_par_iter().map(|face| build_chain(face, mip_levels)).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let chains: Vec<MipChain> = level.into_faces().into_iter().map(|face| build_chain(face, mip_levels)).collect();

    for chain in &chains {
        for (index, face) in chain.levels().iter().enumerate().skip(1) {
            sink.record(&PipelineEvent::MipLevelBuilt { face: chain.face(), level: index as u32, size: face.size() });
        }
    }
    tracing::debug!(
        source_width,
        source_height,
        face_size = chains[0].base().size(),
        mip_levels = chains[0].len(),
        "prepared environment cubemap"
    );

    PreparedEnvironment { source, source_width, source_height, chains }
}

/// Built-in environment for callers that need something when loading fails.
pub fn prepare_default(config: &PipelineConfig, sink: &mut dyn DiagnosticsSink) -> PreparedEnvironment {
    prepare_raster(neutral_gradient(), SourceKind::Generated, config, sink)
}

pub fn is_supported_environment_file(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()).map(|s| s.to_ascii_lowercase()) {
        Some(ext) => matches!(ext.as_str(), "hdr" | "pic" | "png" | "jpg" | "jpeg"),
        None => false,
    }
}

/// A 256×128 sky-over-ground gradient with a warm sun spot, in linear HDR.
pub fn neutral_gradient() -> LinearRaster {
    let width = 256u32;
    let height = 128u32;
    let mut pixels = Vec::with_capacity((width * height * 3) as usize);
    for y in 0..height {
        let v = y as f32 / (height - 1) as f32;
        for x in 0..width {
            let u = x as f32 / (width - 1) as f32;
            let horizon = (1.0 - (2.0 * (v - 0.5)).abs()).clamp(0.0, 1.0);
            let sky = Vec3::new(0.25, 0.35, 0.6) * (1.0 - v) + Vec3::new(0.65, 0.7, 0.9) * v;
            let sun_dir = Vec2::new(u - 0.2, v - 0.35);
            let sun = (1.0 - sun_dir.length() * 6.0).max(0.0).powf(12.0);
            let ground = Vec3::new(0.08, 0.07, 0.05) * (1.0 - horizon) + Vec3::new(0.2, 0.18, 0.16) * horizon;
            let mut color = sky * (0.6 + 0.4 * horizon) + ground * (1.0 - horizon);
            color += Vec3::new(1.0, 0.9, 0.75) * sun * 8.0;
            pixels.extend_from_slice(&[color.x, color.y, color.z]);
        }
    }
    LinearRaster::from_parts(width, height, pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{EventLog, NullSink};
    use image::{Rgb, RgbImage};
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn flat_hdr(width: u32, height: u32, quad: [u8; 4]) -> Vec<u8> {
        let mut bytes = format!("#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n-Y {height} +X {width}\n").into_bytes();
        for _ in 0..width * height {
            bytes.extend_from_slice(&quad);
        }
        bytes
    }

    #[test]
    fn supported_extensions() {
        assert!(is_supported_environment_file(&PathBuf::from("Bright Sky 01.HDR")));
        assert!(is_supported_environment_file(&PathBuf::from("studio.png")));
        assert!(!is_supported_environment_file(&PathBuf::from("notes.txt")));
        assert!(!is_supported_environment_file(&PathBuf::from("no_extension")));
    }

    #[test]
    fn prepare_reports_events_in_order() {
        let config = PipelineConfig { face_size: 4, mip_levels: 3, allow_ldr_fallback: false };
        let mut log = EventLog::default();
        let env = prepare(&flat_hdr(8, 4, [255, 255, 255, 128]), &config, &mut log).expect("prepare");
        assert_eq!(env.source(), SourceKind::Rgbe);
        assert_eq!(env.mip_count(), 3);

        let events = log.into_events();
        assert_eq!(events.len(), 1 + 1 + 6 + 6 * 2);
        assert!(matches!(events[0], PipelineEvent::HeaderParsed { width: 8, height: 4, run_length_rows: 0, .. }));
        assert!(matches!(events[1], PipelineEvent::SourceDecoded { width: 8, height: 4, .. }));
        assert!(matches!(events[2], PipelineEvent::FaceProjected { face: CubeFace::PosX, size: 4, .. }));
        assert!(matches!(events[8], PipelineEvent::MipLevelBuilt { face: CubeFace::PosX, level: 1, size: 2 }));
        assert!(matches!(events[19], PipelineEvent::MipLevelBuilt { face: CubeFace::NegZ, level: 2, size: 1 }));
    }

    #[test]
    fn decode_errors_propagate_without_fallback() {
        let config = PipelineConfig { allow_ldr_fallback: false, ..PipelineConfig::default() };
        let err = prepare(b"#?RADIANCE\n\n", &config, &mut NullSink).unwrap_err();
        let decode = err.downcast_ref::<hdr::DecodeError>().expect("decode error kept as source");
        assert_eq!(decode, &hdr::DecodeError::InvalidHeader);
    }

    #[test]
    fn corrupt_rgbe_keeps_decode_error_with_default_config() {
        let mut bytes = b"#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n-Y 1 +X 4\n".to_vec();
        bytes.extend_from_slice(&[2, 2, 0, 5, 132, 1, 132, 1, 132, 1, 132, 1]);
        let mut log = EventLog::default();
        let err = prepare(&bytes, &PipelineConfig::default(), &mut log).unwrap_err();
        let decode = err.downcast_ref::<hdr::DecodeError>().expect("decode error kept as source");
        assert_eq!(decode, &hdr::DecodeError::ScanlineWidthMismatch { row: 0, expected: 4, found: 5 });
        assert!(log.events().is_empty());

        let err = prepare(b"#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n", &PipelineConfig::default(), &mut NullSink)
            .unwrap_err();
        assert_eq!(err.downcast_ref::<hdr::DecodeError>(), Some(&hdr::DecodeError::InvalidHeader));
    }

    #[test]
    fn png_bytes_use_fallback_when_allowed() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("studio.png");
        let mut img = RgbImage::new(8, 4);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x as u8).saturating_mul(30), (y as u8).saturating_mul(60), 200]);
        }
        img.save(&path).expect("save png");

        let config = PipelineConfig { face_size: 8, mip_levels: 2, allow_ldr_fallback: true };
        let mut fallbacks = 0;
        let mut sink = |event: &PipelineEvent| {
            if matches!(event, PipelineEvent::FallbackUsed { .. }) {
                fallbacks += 1;
            }
        };
        let env = prepare_path(&path, &config, &mut sink).expect("prepare png");
        assert_eq!(fallbacks, 1);
        assert_eq!(env.source(), SourceKind::LdrFallback);
        assert_eq!(env.source_dimensions(), (8, 4));
        for chain in env.chains() {
            assert_eq!(chain.sizes(), vec![8, 4]);
            assert!(chain.base().pixels().iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("absent.hdr");
        let err = prepare_path(&path, &PipelineConfig::default(), &mut NullSink).unwrap_err();
        assert!(err.to_string().contains("absent.hdr"), "{err}");
    }

    #[test]
    fn default_environment_is_finite_and_positive() {
        let config = PipelineConfig { face_size: 16, mip_levels: 5, allow_ldr_fallback: false };
        let env = prepare_default(&config, &mut NullSink);
        assert_eq!(env.source(), SourceKind::Generated);
        assert_eq!(env.source_dimensions(), (256, 128));
        assert_eq!(env.chain(CubeFace::NegY).sizes(), vec![16, 8, 4, 2, 1]);
        for image in env.upload_images() {
            assert!(image.pixels.iter().all(|v| v.is_finite() && *v >= 0.0));
        }
        let summary = env.summary();
        assert_eq!(summary.faces.len(), 6);
        assert!(summary.faces.iter().all(|f| f.base_stats.max_luminance > 0.0));
    }
}
