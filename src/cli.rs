use crate::config::PipelineOverrides;
use crate::mip::MAX_MIP_LEVELS;
use anyhow::{anyhow, bail, Context, Result};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Default)]
pub struct BakeArgs {
    pub input: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub report: Option<PathBuf>,
    pub preview_dir: Option<PathBuf>,
    pub face_size: Option<u32>,
    pub mip_levels: Option<u32>,
    pub no_fallback: bool,
}

impl BakeArgs {
    pub fn parse_from_env() -> Result<Self> {
        Self::parse(env::args())
    }

    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = BakeArgs::default();
        let mut iter = args.into_iter();
        let _ = iter.next(); // skip program name if present
        while let Some(raw_flag) = iter.next() {
            let flag = raw_flag.as_ref();
            if !flag.starts_with("--") {
                if parsed.input.is_some() {
                    bail!("Unexpected argument '{flag}'. Only one input file is accepted.");
                }
                parsed.input = Some(PathBuf::from(flag));
                continue;
            }
            let key = &flag[2..];
            if key == "no-fallback" {
                parsed.no_fallback = true;
                continue;
            }
            let value =
                iter.next().ok_or_else(|| anyhow!("Expected a value after '{flag}'"))?.as_ref().to_string();
            match key {
                "input" => parsed.input = Some(PathBuf::from(value)),
                "config" => parsed.config = Some(PathBuf::from(value)),
                "report" => parsed.report = Some(PathBuf::from(value)),
                "preview-dir" => parsed.preview_dir = Some(PathBuf::from(value)),
                "face-size" => {
                    let size = value.parse::<u32>().with_context(|| format!("Invalid face size '{value}'"))?;
                    if size == 0 {
                        bail!("Face size must be at least 1.");
                    }
                    parsed.face_size = Some(size);
                }
                "mip-levels" => {
                    let levels =
                        value.parse::<u32>().with_context(|| format!("Invalid mip level count '{value}'"))?;
                    if levels > MAX_MIP_LEVELS {
                        bail!("Mip level count must be at most {MAX_MIP_LEVELS}.");
                    }
                    parsed.mip_levels = Some(levels);
                }
                _ => bail!(
                    "Unknown flag '{flag}'. Supported flags: --input, --config, --report, --preview-dir, \
                     --face-size, --mip-levels, --no-fallback."
                ),
            }
        }
        Ok(parsed)
    }

    pub fn overrides(&self) -> PipelineOverrides {
        PipelineOverrides {
            face_size: self.face_size,
            mip_levels: self.mip_levels,
            allow_ldr_fallback: self.no_fallback.then_some(false),
        }
    }
}
