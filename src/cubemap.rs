use crate::raster::{CubeFace, CubemapLevel, FaceRaster, LinearRaster};
use glam::{Vec2, Vec3};
use std::f32::consts::PI;

/// Reprojects an equirectangular raster onto six `face_size`² faces.
///
/// A `face_size` of zero produces 1×1 faces.
pub fn project(src: &LinearRaster, face_size: u32) -> CubemapLevel {
    let size = face_size.max(1);

    #[cfg(feature = "parallel")]
    let faces: Vec<FaceRaster> = {
        use rayon::prelude::*;
        CubeFace::ALL.par_iter().map(|&face| project_face(src, face, size)).collect()
    };
    #[cfg(not(feature = "parallel"))]
    let faces: Vec<FaceRaster> = CubeFace::ALL.iter().map(|&face| project_face(src, face, size)).collect();

    CubemapLevel::from_faces(size, faces)
}

pub fn project_face(src: &LinearRaster, face: CubeFace, size: u32) -> FaceRaster {
    let size = size.max(1);
    let stride = size as usize * 3;
    let mut data = vec![0.0f32; stride * size as usize];

    let fill_row = |(y, row): (usize, &mut [f32])| {
        for x in 0..size {
            let dir = face_direction(face, x, y as u32, size);
            let color = sample_bilinear(src, direction_to_equirect(dir));
            let idx = x as usize * 3;
            row[idx] = color.x;
            row[idx + 1] = color.y;
            row[idx + 2] = color.z;
        }
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        data.par_chunks_mut(stride).enumerate().for_each(fill_row);
    }
    #[cfg(not(feature = "parallel"))]
    data.chunks_mut(stride).enumerate().for_each(fill_row);

    FaceRaster::from_parts(face, LinearRaster::from_parts(size, size, data))
}

/// Normalized view direction through texel `(x, y)` of a face.
pub fn face_direction(face: CubeFace, x: u32, y: u32, size: u32) -> Vec3 {
    let size = size.max(1) as f32;
    let u = 2.0 * x as f32 / size - 1.0;
    let v = 2.0 * y as f32 / size - 1.0;
    face.direction(u, v).normalize()
}

/// Maps a unit direction to equirectangular UV; `v == 1` is the +Y pole.
pub fn direction_to_equirect(dir: Vec3) -> Vec2 {
    let theta = dir.z.atan2(dir.x);
    let phi = dir.y.clamp(-1.0, 1.0).asin();
    Vec2::new((theta / PI + 1.0) * 0.5, phi / PI + 0.5)
}

/// Bilinear lookup at equirectangular UV. Row 0 of `src` sits at `v == 1`.
/// Texel coordinates are clamped to the raster, never wrapped.
pub fn sample_bilinear(src: &LinearRaster, uv: Vec2) -> Vec3 {
    let max_x = src.width() - 1;
    let max_y = src.height() - 1;
    let x = uv.x * max_x as f32;
    let y = (1.0 - uv.y) * max_y as f32;
    let x0 = x.floor();
    let y0 = y.floor();
    let tx = x - x0;
    let ty = y - y0;

    let clamp = |value: f32, max: u32| -> u32 {
        if value.is_nan() {
            return 0;
        }
        value.clamp(0.0, max as f32) as u32
    };
    let ix0 = clamp(x0, max_x);
    let ix1 = clamp(x0 + 1.0, max_x);
    let iy0 = clamp(y0, max_y);
    let iy1 = clamp(y0 + 1.0, max_y);

    let c00 = src.pixel(ix0, iy0);
    let c10 = src.pixel(ix1, iy0);
    let c01 = src.pixel(ix0, iy1);
    let c11 = src.pixel(ix1, iy1);

    let c0 = c00 * (1.0 - tx) + c10 * tx;
    let c1 = c01 * (1.0 - tx) + c11 * tx;
    c0 * (1.0 - ty) + c1 * ty
}
