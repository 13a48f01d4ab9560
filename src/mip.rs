use crate::raster::{FaceRaster, LinearRaster, MipChain};

/// Longest chain any `u32` face size needs to reach 1×1.
pub const MAX_MIP_LEVELS: u32 = u32::BITS;

/// Number of levels needed to reach 1×1 from `size`.
pub fn full_mip_count(size: u32) -> u32 {
    u32::BITS - size.max(1).leading_zeros()
}

/// Edge lengths of a chain of `levels` levels starting at `base`, clamped to
/// `1..=MAX_MIP_LEVELS` levels.
pub fn mip_sizes(base: u32, levels: u32) -> Vec<u32> {
    (0..levels.clamp(1, MAX_MIP_LEVELS)).map(|level| base.checked_shr(level).unwrap_or(0).max(1)).collect()
}

/// Builds `mip_levels` levels from `base`, each one box-filtered from the previous level.
///
/// `mip_levels == 0` still yields the base level alone; counts above
/// [`MAX_MIP_LEVELS`] are capped there.
pub fn build_chain(base: FaceRaster, mip_levels: u32) -> MipChain {
    let face = base.face();
    if mip_levels > MAX_MIP_LEVELS {
        tracing::warn!(mip_levels, "mip level count capped at {MAX_MIP_LEVELS}");
    }
    let sizes = mip_sizes(base.size(), mip_levels);
    let mut levels = Vec::with_capacity(sizes.len());
    levels.push(base);
    for &size in &sizes[1..] {
        let next = downsample(&levels[levels.len() - 1], size);
        levels.push(next);
    }
    MipChain::from_levels(face, levels)
}

/// Box-filters `src` down to `dst_size`², averaging the in-range texels of each 2×2 block.
pub fn downsample(src: &FaceRaster, dst_size: u32) -> FaceRaster {
    let src_size = src.size();
    let dst_size = dst_size.max(1);
    let scale = src_size as f32 / dst_size as f32;
    let stride = dst_size as usize * 3;
    let mut data = vec![0.0f32; stride * dst_size as usize];

    let fill_row = |(y, row): (usize, &mut [f32])| {
        let src_y = (y as f32 * scale).floor() as u32;
        for x in 0..dst_size {
            let src_x = (x as f32 * scale).floor() as u32;
            let mut sum = [0.0f32; 3];
            let mut count = 0u32;
            for sy in src_y..(src_y + 2).min(src_size) {
                for sx in src_x..(src_x + 2).min(src_size) {
                    let texel = src.pixel(sx, sy);
                    sum[0] += texel.x;
                    sum[1] += texel.y;
                    sum[2] += texel.z;
                    count += 1;
                }
            }
            let idx = x as usize * 3;
            if count > 0 {
                let inv = 1.0 / count as f32;
                row[idx] = sum[0] * inv;
                row[idx + 1] = sum[1] * inv;
                row[idx + 2] = sum[2] * inv;
            }
        }
    };

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        data.par_chunks_mut(stride).enumerate().for_each(fill_row);
    }
    #[cfg(not(feature = "parallel"))]
    data.chunks_mut(stride).enumerate().for_each(fill_row);

    FaceRaster::from_parts(src.face(), LinearRaster::from_parts(dst_size, dst_size, data))
}
