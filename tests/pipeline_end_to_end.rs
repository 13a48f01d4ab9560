use glam::Vec3;
use kestrel_envmap::cubemap::project;
use kestrel_envmap::diagnostics::NullSink;
use kestrel_envmap::environment::{prepare, SourceKind};
use kestrel_envmap::hdr::decode;
use kestrel_envmap::mip::build_chain;
use kestrel_envmap::raster::{CubeFace, LinearRaster};
use kestrel_envmap::PipelineConfig;

fn white_hdr_2x2() -> Vec<u8> {
    let mut bytes = b"#?RADIANCE\nFORMAT=32-bit_rle_rgbe\n\n-Y 2 +X 2\n".to_vec();
    for _ in 0..4 {
        bytes.extend_from_slice(&[255, 255, 255, 128]);
    }
    bytes
}

fn assert_uniform(pixels: &[f32], expected: Vec3) {
    for texel in pixels.chunks_exact(3) {
        let diff = (Vec3::from_slice(texel) - expected).abs().max_element();
        assert!(diff <= 1e-5 * expected.max_element().max(1.0), "texel {texel:?} != {expected:?}");
    }
}

#[test]
fn white_flat_hdr_flows_through_every_stage() {
    let raster = decode(&white_hdr_2x2()).expect("decode white hdr");
    assert_eq!((raster.width(), raster.height()), (2, 2));
    assert_eq!(raster.pixels().len(), 12);
    assert_uniform(raster.pixels(), Vec3::ONE);

    let cube = project(&raster, 4);
    assert_eq!(cube.size(), 4);
    for face in CubeFace::ALL {
        let face_raster = cube.face(face);
        assert_eq!(face_raster.face(), face);
        assert_eq!((face_raster.raster().width(), face_raster.raster().height()), (4, 4));
        assert_uniform(face_raster.pixels(), Vec3::ONE);
    }

    for face in cube.into_faces() {
        let chain = build_chain(face, 2);
        assert_eq!(chain.sizes(), vec![4, 2]);
        let level = chain.level(1).expect("level 1");
        assert_eq!(level.size(), 2);
        assert_uniform(level.pixels(), Vec3::ONE);
    }
}

#[test]
fn driver_matches_manual_composition() {
    let config = PipelineConfig { face_size: 4, mip_levels: 2, allow_ldr_fallback: false };
    let env = prepare(&white_hdr_2x2(), &config, &mut NullSink).expect("prepare");
    assert_eq!(env.source(), SourceKind::Rgbe);
    assert_eq!(env.upload_images().len(), 12);

    let manual = project(&decode(&white_hdr_2x2()).expect("decode"), 4);
    for (chain, face) in env.chains().iter().zip(manual.faces()) {
        assert_eq!(chain.base(), face);
    }
}

#[test]
fn constant_color_survives_projection_and_every_mip_level() {
    let color = Vec3::new(0.02, 1.75, 64.0);
    let src = LinearRaster::filled(64, 32, color);
    let config = PipelineConfig { face_size: 32, mip_levels: 6, allow_ldr_fallback: false };
    let env = kestrel_envmap::environment::prepare_raster(src, SourceKind::Generated, &config, &mut NullSink);
    assert_eq!(env.chain(CubeFace::PosZ).sizes(), vec![32, 16, 8, 4, 2, 1]);
    for image in env.upload_images() {
        assert_uniform(image.pixels, color);
    }
}

#[test]
fn odd_face_sizes_clamp_mips_at_one() {
    let src = LinearRaster::filled(8, 4, Vec3::splat(3.0));
    let cube = project(&src, 3);
    let chain = build_chain(cube.face(CubeFace::NegX).clone(), 3);
    assert_eq!(chain.sizes(), vec![3, 1, 1]);
    assert_uniform(chain.level(2).expect("level 2").pixels(), Vec3::splat(3.0));
}
