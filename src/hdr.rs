//! Radiance RGBE (`.hdr`) decoding.
//!
//! The header is scanned as text until the `-Y <height> +X <width>` resolution
//! line, then `height` scanlines follow. A scanline starting with the bytes
//! `2, 2` is run-length encoded per channel; anything else is read as flat
//! `R, G, B, E` quadruples.
//!
//! The pre-1991 "old RLE" scheme (a `1, 1, 1, count` pixel repeating the
//! previous pixel) is not recognised. Files using it decode through the flat
//! path and come out wrong rather than failing.

use crate::raster::LinearRaster;
use glam::Vec3;
use thiserror::Error;

/// Upper bound on the number of header bytes scanned for the resolution line.
pub const MAX_HEADER_LEN: usize = 1024;

const RLE_MARKER: [u8; 2] = [2, 2];

const MAX_RUN: usize = 127;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("missing or malformed resolution line in HDR header")]
    InvalidHeader,
    #[error("HDR header exceeds {} bytes without a resolution line", MAX_HEADER_LEN)]
    HeaderTooLong,
    #[error("unsupported scanline orientation '{0}'")]
    UnsupportedOrientation(String),
    #[error("scanline {row} declares width {found}, header width is {expected}")]
    ScanlineWidthMismatch { row: u32, expected: u32, found: u32 },
    #[error("scanline {row} contains an invalid run")]
    InvalidRun { row: u32 },
    #[error("data ends inside scanline {row}")]
    Truncated { row: u32 },
    #[error("image {width}x{height} does not fit in memory on this platform")]
    DimensionsTooLarge { width: u32, height: u32 },
}

/// Informational header fields. None of them change decoded values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HdrHeader {
    pub width: u32,
    pub height: u32,
    pub format: Option<String>,
    pub exposure: Option<f32>,
    pub has_signature: bool,
}

#[derive(Debug, Clone)]
pub struct HdrImage {
    pub header: HdrHeader,
    pub raster: LinearRaster,
    pub run_length_rows: u32,
}

pub fn decode(bytes: &[u8]) -> Result<LinearRaster, DecodeError> {
    decode_image(bytes).map(|image| image.raster)
}

pub fn decode_image(bytes: &[u8]) -> Result<HdrImage, DecodeError> {
    let (header, data_start) = parse_header(bytes)?;
    tracing::debug!(
        width = header.width,
        height = header.height,
        format = header.format.as_deref().unwrap_or("unspecified"),
        "parsed HDR header"
    );
    if let Some(format) = header.format.as_deref() {
        if format != "32-bit_rle_rgbe" {
            tracing::warn!(format, "HDR format is not RGBE; values are decoded without conversion");
        }
    }

    let width = header.width as usize;
    let data = &bytes[data_start..];
    // Every scanline costs at least `min_scanline_len` bytes, so the data
    // length bounds how many rows are worth reserving for.
    let min_row = min_scanline_len(width);
    if data.len() < min_row {
        return Err(DecodeError::Truncated { row: 0 });
    }
    let row_floats = width
        .checked_mul(3)
        .filter(|floats| floats.checked_mul(header.height as usize).is_some())
        .ok_or(DecodeError::DimensionsTooLarge { width: header.width, height: header.height })?;
    let reserve_rows = (header.height as usize).min(data.len() / min_row);
    let mut reader = ScanlineReader::new(data, width);
    let mut pixels = Vec::with_capacity(reserve_rows * row_floats);
    let mut run_length_rows = 0;
    for row in 0..header.height {
        if reader.read_scanline(row, header.width)? {
            run_length_rows += 1;
        }
        for quad in reader.scanline().chunks_exact(4) {
            let rgb = rgbe_to_rgb([quad[0], quad[1], quad[2], quad[3]]);
            pixels.extend_from_slice(&[rgb.x, rgb.y, rgb.z]);
        }
    }
    if reader.remaining() > 0 {
        tracing::debug!(trailing = reader.remaining(), "ignoring bytes after last scanline");
    }

    let raster = LinearRaster::from_parts(header.width, header.height, pixels);
    Ok(HdrImage { header, raster, run_length_rows })
}

/// Parses the text header and returns it with the offset of the first scanline byte.
pub fn parse_header(bytes: &[u8]) -> Result<(HdrHeader, usize), DecodeError> {
    let limit = bytes.len().min(MAX_HEADER_LEN);
    let mut header = HdrHeader::default();
    let mut pos = 0;
    loop {
        let Some(offset) = bytes[pos..limit].iter().position(|&b| b == b'\n') else {
            return Err(if bytes.len() > MAX_HEADER_LEN {
                DecodeError::HeaderTooLong
            } else {
                DecodeError::InvalidHeader
            });
        };
        let raw = String::from_utf8_lossy(&bytes[pos..pos + offset]);
        let line = raw.trim_end_matches('\r');
        let first_line = pos == 0;
        pos += offset + 1;

        if let Some((height, width)) = parse_resolution(line)? {
            header.width = width;
            header.height = height;
            return Ok((header, pos));
        }
        if first_line && line.starts_with("#?") {
            header.has_signature = true;
        } else if let Some(format) = line.strip_prefix("FORMAT=") {
            header.format = Some(format.trim().to_string());
        } else if let Some(value) = line.strip_prefix("EXPOSURE=") {
            // Successive EXPOSURE lines are cumulative.
            if let Ok(exposure) = value.trim().parse::<f32>() {
                header.exposure = Some(header.exposure.unwrap_or(1.0) * exposure);
            }
        }
    }
}

fn is_axis_token(token: &str) -> bool {
    matches!(token, "-Y" | "+Y" | "-X" | "+X")
}

fn parse_resolution(line: &str) -> Result<Option<(u32, u32)>, DecodeError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let [major, major_len, minor, minor_len] = tokens.as_slice() else {
        return Ok(None);
    };
    if !is_axis_token(major) || !is_axis_token(minor) {
        return Ok(None);
    }
    if *major != "-Y" || *minor != "+X" {
        return Err(DecodeError::UnsupportedOrientation(line.trim().to_string()));
    }
    let height = major_len.parse::<u32>().map_err(|_| DecodeError::InvalidHeader)?;
    let width = minor_len.parse::<u32>().map_err(|_| DecodeError::InvalidHeader)?;
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidHeader);
    }
    Ok(Some((height, width)))
}

/// Smallest possible encoding of one scanline of `width` pixels.
fn min_scanline_len(width: usize) -> usize {
    let flat = width.saturating_mul(4);
    if width > usize::from(u16::MAX) {
        return flat;
    }
    // Marker plus one two-byte run per 127 pixels in each of four channels.
    let run_length = 4 + 4 * 2 * width.div_ceil(MAX_RUN);
    flat.min(run_length)
}

/// Converts one RGBE quadruple to linear RGB.
#[inline]
pub fn rgbe_to_rgb([r, g, b, e]: [u8; 4]) -> Vec3 {
    if e == 0 {
        return Vec3::ZERO;
    }
    let scale = 2f32.powi(i32::from(e) - 128) / 255.0;
    Vec3::new(f32::from(r) * scale, f32::from(g) * scale, f32::from(b) * scale)
}

struct ScanlineReader<'a> {
    data: &'a [u8],
    pos: usize,
    width: usize,
    rgbe: Vec<u8>,
}

impl<'a> ScanlineReader<'a> {
    fn new(data: &'a [u8], width: usize) -> Self {
        Self { data, pos: 0, width, rgbe: vec![0; width * 4] }
    }

    fn scanline(&self) -> &[u8] {
        &self.rgbe
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn byte(&mut self, row: u32) -> Result<u8, DecodeError> {
        let value = *self.data.get(self.pos).ok_or(DecodeError::Truncated { row })?;
        self.pos += 1;
        Ok(value)
    }

    fn take(&mut self, len: usize, row: u32) -> Result<&'a [u8], DecodeError> {
        let data: &'a [u8] = self.data;
        let slice = data.get(self.pos..self.pos + len).ok_or(DecodeError::Truncated { row })?;
        self.pos += len;
        Ok(slice)
    }

    /// Decodes the next scanline into the interleaved RGBE buffer.
    /// Returns whether it was run-length encoded.
    fn read_scanline(&mut self, row: u32, expected_width: u32) -> Result<bool, DecodeError> {
        if self.data.get(self.pos..self.pos + 2) != Some(&RLE_MARKER[..]) {
            let flat = self.take(self.width * 4, row)?;
            self.rgbe.copy_from_slice(flat);
            return Ok(false);
        }
        self.pos += 2;
        let declared = u32::from(u16::from_be_bytes([self.byte(row)?, self.byte(row)?]));
        if declared != expected_width {
            return Err(DecodeError::ScanlineWidthMismatch { row, expected: expected_width, found: declared });
        }
        for channel in 0..4 {
            self.read_channel(channel, row)?;
        }
        Ok(true)
    }

    fn read_channel(&mut self, channel: usize, row: u32) -> Result<(), DecodeError> {
        let width = self.width;
        let mut x = 0;
        while x < width {
            let count = usize::from(self.byte(row)?);
            if count > 128 {
                let run = count - 128;
                if x + run > width {
                    return Err(DecodeError::InvalidRun { row });
                }
                let value = self.byte(row)?;
                for px in x..x + run {
                    self.rgbe[px * 4 + channel] = value;
                }
                x += run;
            } else {
                if count == 0 || x + count > width {
                    return Err(DecodeError::InvalidRun { row });
                }
                let literal = self.take(count, row)?;
                for (offset, &value) in literal.iter().enumerate() {
                    self.rgbe[(x + offset) * 4 + channel] = value;
                }
                x += count;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(width: u32, height: u32) -> Vec<u8> {
        format!("#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n-Y {height} +X {width}\n").into_bytes()
    }

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).abs().max_element() <= 1e-6 * b.abs().max_element().max(1.0)
    }

    #[test]
    fn rgbe_formula_matches_reference() {
        let rgb = rgbe_to_rgb([128, 64, 32, 136]);
        let scale = 2f32.powi(136 - 128) / 255.0;
        let expected = Vec3::new(128.0, 64.0, 32.0) * scale;
        assert!(approx(rgb, expected), "{rgb:?} vs {expected:?}");
    }

    #[test]
    fn zero_exponent_is_black() {
        assert_eq!(rgbe_to_rgb([255, 255, 255, 0]), Vec3::ZERO);
    }

    #[test]
    fn decodes_flat_scanlines() {
        let mut bytes = header(2, 2);
        for _ in 0..4 {
            bytes.extend_from_slice(&[255, 255, 255, 128]);
        }
        let raster = decode(&bytes).expect("decode");
        assert_eq!((raster.width(), raster.height()), (2, 2));
        assert!(raster.pixels().iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn decodes_run_length_scanline() {
        let mut bytes = header(4, 1);
        bytes.extend_from_slice(&[2, 2, 0, 4]);
        // R: run of four 10s
        bytes.extend_from_slice(&[132, 10]);
        // G: four literals
        bytes.extend_from_slice(&[4, 1, 2, 3, 4]);
        // B: literal pair then run of two
        bytes.extend_from_slice(&[2, 7, 8, 130, 9]);
        // E: run of four 129s
        bytes.extend_from_slice(&[132, 129]);
        let image = decode_image(&bytes).expect("decode");
        assert_eq!(image.run_length_rows, 1);
        let scale = 2.0 / 255.0;
        let expected = [[10.0, 1.0, 7.0], [10.0, 2.0, 8.0], [10.0, 3.0, 9.0], [10.0, 4.0, 9.0]];
        for (x, rgb) in expected.iter().enumerate() {
            let px = image.raster.pixel(x as u32, 0);
            assert!(approx(px, Vec3::from_array(*rgb) * scale), "pixel {x}: {px:?}");
        }
    }

    #[test]
    fn run_length_and_flat_agree() {
        let quads: [[u8; 4]; 3] = [[200, 100, 50, 130], [200, 100, 50, 130], [3, 0, 255, 120]];
        let mut flat = header(3, 1);
        for quad in quads {
            flat.extend_from_slice(&quad);
        }
        let mut rle = header(3, 1);
        rle.extend_from_slice(&[2, 2, 0, 3]);
        rle.extend_from_slice(&[130, 200, 1, 3]);
        rle.extend_from_slice(&[130, 100, 1, 0]);
        rle.extend_from_slice(&[2, 50, 50, 1, 255]);
        rle.extend_from_slice(&[3, 130, 130, 120]);
        assert_eq!(decode(&flat).expect("flat"), decode(&rle).expect("rle"));
    }

    #[test]
    fn declared_width_mismatch_fails() {
        let mut bytes = header(4, 1);
        bytes.extend_from_slice(&[2, 2, 0, 5, 132, 1, 132, 1, 132, 1, 132, 1]);
        assert_eq!(
            decode(&bytes).unwrap_err(),
            DecodeError::ScanlineWidthMismatch { row: 0, expected: 4, found: 5 }
        );
    }

    #[test]
    fn zero_count_and_overflowing_runs_fail() {
        let mut zero = header(2, 1);
        zero.extend_from_slice(&[2, 2, 0, 2, 0, 0, 0, 0]);
        assert_eq!(decode(&zero).unwrap_err(), DecodeError::InvalidRun { row: 0 });

        let mut overflow = header(2, 1);
        overflow.extend_from_slice(&[2, 2, 0, 2, 131, 5, 0, 0]);
        assert_eq!(decode(&overflow).unwrap_err(), DecodeError::InvalidRun { row: 0 });
    }

    #[test]
    fn truncated_data_reports_row() {
        let mut bytes = header(2, 2);
        bytes.extend_from_slice(&[1, 1, 1, 128, 1, 1, 1, 128, 1, 1]);
        assert_eq!(decode(&bytes).unwrap_err(), DecodeError::Truncated { row: 1 });
    }

    #[test]
    fn header_without_resolution_within_bound_is_rejected() {
        let mut bytes = b"#?RADIANCE\n".to_vec();
        while bytes.len() <= MAX_HEADER_LEN + 16 {
            bytes.extend_from_slice(b"# padding comment line\n");
        }
        bytes.extend_from_slice(b"-Y 1 +X 1\n\x01\x01\x01\x80");
        assert_eq!(decode(&bytes).unwrap_err(), DecodeError::HeaderTooLong);
    }

    #[test]
    fn short_header_without_resolution_is_invalid() {
        assert_eq!(decode(b"#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n").unwrap_err(), DecodeError::InvalidHeader);
        assert_eq!(decode(b"").unwrap_err(), DecodeError::InvalidHeader);
    }

    #[test]
    fn huge_dimensions_with_little_data_fail_before_allocating() {
        let bytes = b"#?RADIANCE\n\n-Y 50000 +X 50000\n\x01\x01\x01\x80";
        assert_eq!(decode(bytes).unwrap_err(), DecodeError::Truncated { row: 0 });

        let bytes = b"#?RADIANCE\n\n-Y 4294967295 +X 4294967295\n\x02\x02\xff\xff";
        assert_eq!(decode(bytes).unwrap_err(), DecodeError::Truncated { row: 0 });
    }

    #[test]
    fn tall_image_with_few_rows_reports_first_missing_row() {
        let mut bytes = header(1, 1_000_000);
        bytes.extend_from_slice(&[10, 20, 30, 128, 10, 20, 30, 128]);
        assert_eq!(decode(&bytes).unwrap_err(), DecodeError::Truncated { row: 2 });
    }

    #[test]
    fn minimum_scanline_length_picks_cheapest_encoding() {
        assert_eq!(min_scanline_len(1), 4);
        assert_eq!(min_scanline_len(127), 12);
        assert_eq!(min_scanline_len(128), 20);
        assert_eq!(min_scanline_len(70_000), 280_000);
    }

    #[test]
    fn other_orientations_are_reported() {
        let bytes = b"#?RADIANCE\n\n+Y 2 +X 2\n";
        assert!(matches!(decode(bytes).unwrap_err(), DecodeError::UnsupportedOrientation(line) if line == "+Y 2 +X 2"));
    }

    #[test]
    fn zero_dimensions_are_invalid() {
        assert_eq!(decode(b"#?RADIANCE\n\n-Y 0 +X 4\n").unwrap_err(), DecodeError::InvalidHeader);
    }

    #[test]
    fn header_metadata_is_collected() {
        let bytes = b"#?RADIANCE\r\nFORMAT=32-bit_rle_rgbe\r\nEXPOSURE=2.0\nEXPOSURE=0.5\n\n-Y 1 +X 1\r\n\x80\x80\x80\x80";
        let image = decode_image(bytes).expect("decode");
        assert!(image.header.has_signature);
        assert_eq!(image.header.format.as_deref(), Some("32-bit_rle_rgbe"));
        assert_eq!(image.header.exposure, Some(1.0));
        assert_eq!(image.raster.pixel(0, 0), rgbe_to_rgb([128, 128, 128, 128]));
    }
}
