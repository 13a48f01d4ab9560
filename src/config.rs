use crate::mip::MAX_MIP_LEVELS;
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "PipelineConfig::default_face_size")]
    pub face_size: u32,
    #[serde(default = "PipelineConfig::default_mip_levels")]
    pub mip_levels: u32,
    #[serde(default = "PipelineConfig::default_allow_ldr_fallback")]
    pub allow_ldr_fallback: bool,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOverrides {
    pub face_size: Option<u32>,
    pub mip_levels: Option<u32>,
    pub allow_ldr_fallback: Option<bool>,
}

impl PipelineConfig {
    const fn default_face_size() -> u32 {
        128
    }

    const fn default_mip_levels() -> u32 {
        6
    }

    const fn default_allow_ldr_fallback() -> bool {
        true
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        cfg.validate().with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if self.mip_levels > MAX_MIP_LEVELS {
            bail!("mip_levels {} exceeds the maximum of {MAX_MIP_LEVELS}", self.mip_levels);
        }
        Ok(())
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &PipelineOverrides) {
        if let Some(face_size) = overrides.face_size {
            self.face_size = face_size;
        }
        if let Some(mip_levels) = overrides.mip_levels {
            self.mip_levels = mip_levels;
        }
        if let Some(allow) = overrides.allow_ldr_fallback {
            self.allow_ldr_fallback = allow;
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            face_size: Self::default_face_size(),
            mip_levels: Self::default_mip_levels(),
            allow_ldr_fallback: Self::default_allow_ldr_fallback(),
        }
    }
}

impl PipelineOverrides {
    pub fn is_empty(&self) -> bool {
        self.face_size.is_none() && self.mip_levels.is_none() && self.allow_ldr_fallback.is_none()
    }

    pub fn applied_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.face_size.is_some() {
            fields.push("face_size");
        }
        if self.mip_levels.is_some() {
            fields.push("mip_levels");
        }
        if self.allow_ldr_fallback.is_some() {
            fields.push("allow_ldr_fallback");
        }
        fields
    }
}
