// Throughput summary across the parallel streams of one run

use serde::Serialize;

/// Frame-rate summary over the streams that reported a rate. All-zero when
/// nothing reported.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ThroughputStats {
    pub min_fps: f32,
    pub max_fps: f32,
    pub avg_fps: f32,
}

impl ThroughputStats {
    /// Summarize per-stream frame rates. Negative values mark streams that
    /// never reported and are excluded.
    pub fn from_samples(samples: &[f32]) -> Self {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut sum = 0.0;
        let mut n = 0u32;
        for &fps in samples {
            if fps < 0.0 {
                continue;
            }
            min = min.min(fps);
            max = max.max(fps);
            sum += fps;
            n += 1;
        }
        if n == 0 {
            return Self::default();
        }
        Self {
            min_fps: min,
            max_fps: max,
            avg_fps: sum / n as f32,
        }
    }
}
