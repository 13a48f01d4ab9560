use glam::Vec3;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RasterError {
    #[error("raster dimensions must be non-zero (got {width}x{height})")]
    EmptyDimensions { width: u32, height: u32 },
    #[error("raster {width}x{height} expects {expected} floats, got {found}")]
    LengthMismatch { width: u32, height: u32, expected: usize, found: usize },
}

/// Row-major linear RGB image, top row first, three floats per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearRaster {
    width: u32,
    height: u32,
    pixels: Vec<f32>,
}

impl LinearRaster {
    pub fn new(width: u32, height: u32, pixels: Vec<f32>) -> Result<Self, RasterError> {
        if width == 0 || height == 0 {
            return Err(RasterError::EmptyDimensions { width, height });
        }
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(RasterError::LengthMismatch { width, height, expected, found: pixels.len() });
        }
        Ok(Self { width, height, pixels })
    }

    /// Builds a uniform raster. Zero dimensions are raised to 1.
    pub fn filled(width: u32, height: u32, color: Vec3) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 3);
        for _ in 0..count {
            pixels.extend_from_slice(&[color.x, color.y, color.z]);
        }
        Self { width, height, pixels }
    }

    // Callers inside the crate guarantee the length invariant.
    pub(crate) fn from_parts(width: u32, height: u32, pixels: Vec<f32>) -> Self {
        debug_assert_eq!(pixels.len(), width as usize * height as usize * 3);
        Self { width, height, pixels }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[f32] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<f32> {
        self.pixels
    }

    /// Panics if `(x, y)` lies outside the raster.
    pub fn pixel(&self, x: u32, y: u32) -> Vec3 {
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Vec3::new(self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2])
    }
}

/// Cube face tags. The ordinal matches the conventional GPU layer order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CubeFace {
    PosX,
    NegX,
    PosY,
    NegY,
    PosZ,
    NegZ,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] =
        [CubeFace::PosX, CubeFace::NegX, CubeFace::PosY, CubeFace::NegY, CubeFace::PosZ, CubeFace::NegZ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn label(self) -> &'static str {
        match self {
            CubeFace::PosX => "+X",
            CubeFace::NegX => "-X",
            CubeFace::PosY => "+Y",
            CubeFace::NegY => "-Y",
            CubeFace::PosZ => "+Z",
            CubeFace::NegZ => "-Z",
        }
    }

    pub fn slug(self) -> &'static str {
        match self {
            CubeFace::PosX => "pos_x",
            CubeFace::NegX => "neg_x",
            CubeFace::PosY => "pos_y",
            CubeFace::NegY => "neg_y",
            CubeFace::PosZ => "pos_z",
            CubeFace::NegZ => "neg_z",
        }
    }

    /// Unnormalized view direction for face coordinates `u, v` in `[-1, 1]`.
    pub fn direction(self, u: f32, v: f32) -> Vec3 {
        match self {
            CubeFace::PosX => Vec3::new(1.0, -v, -u),
            CubeFace::NegX => Vec3::new(-1.0, -v, u),
            CubeFace::PosY => Vec3::new(u, 1.0, v),
            CubeFace::NegY => Vec3::new(u, -1.0, -v),
            CubeFace::PosZ => Vec3::new(u, -v, 1.0),
            CubeFace::NegZ => Vec3::new(-u, -v, -1.0),
        }
    }
}

/// A square raster belonging to one cube face.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceRaster {
    face: CubeFace,
    raster: LinearRaster,
}

impl FaceRaster {
    /// Returns `None` when the raster is not square.
    pub fn new(face: CubeFace, raster: LinearRaster) -> Option<Self> {
        (raster.width() == raster.height()).then_some(Self { face, raster })
    }

    pub(crate) fn from_parts(face: CubeFace, raster: LinearRaster) -> Self {
        debug_assert_eq!(raster.width(), raster.height());
        Self { face, raster }
    }

    pub fn face(&self) -> CubeFace {
        self.face
    }

    pub fn size(&self) -> u32 {
        self.raster.width()
    }

    pub fn raster(&self) -> &LinearRaster {
        &self.raster
    }

    pub fn pixels(&self) -> &[f32] {
        self.raster.pixels()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Vec3 {
        self.raster.pixel(x, y)
    }

    pub fn into_raster(self) -> LinearRaster {
        self.raster
    }
}

/// Six faces sharing one edge length.
#[derive(Debug, Clone, PartialEq)]
pub struct CubemapLevel {
    size: u32,
    faces: Vec<FaceRaster>,
}

impl CubemapLevel {
    pub(crate) fn from_faces(size: u32, faces: Vec<FaceRaster>) -> Self {
        debug_assert_eq!(faces.len(), 6);
        debug_assert!(faces.iter().enumerate().all(|(i, f)| f.face().index() == i && f.size() == size));
        Self { size, faces }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn face(&self, face: CubeFace) -> &FaceRaster {
        &self.faces[face.index()]
    }

    /// Faces in `CubeFace::ALL` order.
    pub fn faces(&self) -> &[FaceRaster] {
        &self.faces
    }

    pub fn into_faces(self) -> Vec<FaceRaster> {
        self.faces
    }
}

/// Progressively halved copies of one face; index 0 is the base level.
#[derive(Debug, Clone, PartialEq)]
pub struct MipChain {
    face: CubeFace,
    levels: Vec<FaceRaster>,
}

impl MipChain {
    pub(crate) fn from_levels(face: CubeFace, levels: Vec<FaceRaster>) -> Self {
        debug_assert!(!levels.is_empty());
        Self { face, levels }
    }

    pub fn face(&self) -> CubeFace {
        self.face
    }

    pub fn levels(&self) -> &[FaceRaster] {
        &self.levels
    }

    pub fn level(&self, index: usize) -> Option<&FaceRaster> {
        self.levels.get(index)
    }

    pub fn base(&self) -> &FaceRaster {
        &self.levels[0]
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn sizes(&self) -> Vec<u32> {
        self.levels.iter().map(FaceRaster::size).collect()
    }
}
