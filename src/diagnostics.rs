use crate::raster::{CubeFace, LinearRaster};
use serde::Serialize;

/// Luminance summary of a raster, using Rec. 709 weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RasterStats {
    pub min_luminance: f32,
    pub max_luminance: f32,
    pub mean_luminance: f32,
}

impl RasterStats {
    pub fn measure(raster: &LinearRaster) -> Self {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0f64;
        let mut count = 0usize;
        for texel in raster.pixels().chunks_exact(3) {
            let lum = luminance(texel[0], texel[1], texel[2]);
            min = min.min(lum);
            max = max.max(lum);
            sum += f64::from(lum);
            count += 1;
        }
        if count == 0 {
            return Self { min_luminance: 0.0, max_luminance: 0.0, mean_luminance: 0.0 };
        }
        Self { min_luminance: min, max_luminance: max, mean_luminance: (sum / count as f64) as f32 }
    }
}

pub fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    HeaderParsed { width: u32, height: u32, format: Option<String>, run_length_rows: u32 },
    FallbackUsed { reason: String },
    SourceDecoded { width: u32, height: u32, stats: RasterStats },
    FaceProjected { face: CubeFace, size: u32, stats: RasterStats },
    MipLevelBuilt { face: CubeFace, level: u32, size: u32 },
}

/// Receives pipeline events. Sinks observe only; they cannot change results.
pub trait DiagnosticsSink {
    fn record(&mut self, event: &PipelineEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticsSink for NullSink {
    fn record(&mut self, _event: &PipelineEvent) {}
}

impl<F> DiagnosticsSink for F
where
    F: FnMut(&PipelineEvent),
{
    fn record(&mut self, event: &PipelineEvent) {
        self(event)
    }
}

/// Keeps every event in arrival order.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<PipelineEvent>,
}

impl EventLog {
    pub fn events(&self) -> &[PipelineEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<PipelineEvent> {
        self.events
    }
}

impl DiagnosticsSink for EventLog {
    fn record(&mut self, event: &PipelineEvent) {
        self.events.push(event.clone());
    }
}
