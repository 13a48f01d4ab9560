pub mod cli;
pub mod config;
pub mod cubemap;
pub mod diagnostics;
pub mod environment;
pub mod hdr;
pub mod ldr;
pub mod mip;
pub mod raster;
pub mod upload;

pub use config::PipelineConfig;
pub use cubemap::project;
pub use environment::{prepare, prepare_path, PreparedEnvironment};
pub use hdr::{decode, DecodeError};
pub use mip::build_chain;
pub use raster::{CubeFace, CubemapLevel, FaceRaster, LinearRaster, MipChain};
