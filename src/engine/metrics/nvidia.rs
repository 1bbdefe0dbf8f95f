// GPU engine sampling via one-shot nvidia-smi queries

use std::process::Command;
use std::time::Duration;

use tracing::warn;

use super::{CpuSampler, GpuReading, MetricSource, SENTINEL, UtilizationSnapshot, sample_concurrently};

const QUERY: &str = "--query-gpu=utilization.gpu,utilization.decoder,utilization.encoder";

pub struct NvidiaSmiSource {
    cpu: CpuSampler,
}

impl NvidiaSmiSource {
    pub fn new(settle: Duration) -> Self {
        Self {
            cpu: CpuSampler::new(settle),
        }
    }
}

impl MetricSource for NvidiaSmiSource {
    fn sample(&mut self) -> UtilizationSnapshot {
        sample_concurrently(&mut self.cpu, query_nvidia_smi)
    }
}

fn query_nvidia_smi() -> GpuReading {
    let output = Command::new("nvidia-smi")
        .args([QUERY, "--format=csv,noheader,nounits"])
        .output();

    match output {
        Ok(out) if out.status.success() => {
            let stdout = String::from_utf8_lossy(&out.stdout);
            match stdout.lines().next().map(parse_query_line) {
                Some(reading) => reading,
                None => {
                    warn!("nvidia-smi produced no output, GPU engines unmeasured");
                    GpuReading::sentinel()
                }
            }
        }
        Ok(out) => {
            warn!(code = ?out.status.code(), "nvidia-smi failed, GPU engines unmeasured");
            GpuReading::sentinel()
        }
        Err(e) => {
            warn!(error = %e, "could not run nvidia-smi, GPU engines unmeasured");
            GpuReading::sentinel()
        }
    }
}

/// Parse one `utilization.gpu, utilization.decoder, utilization.encoder` CSV
/// line. A missing or unparsable column degrades that engine alone.
///
/// nvidia-smi's `utilization.gpu` covers the graphics/SM engine; the copy
/// engine is not separately reported, so it stays sentinel.
fn parse_query_line(line: &str) -> GpuReading {
    let mut fields = line.split(',').map(|f| f.trim().parse::<f32>().ok());
    let gpu = fields.next().flatten();
    let decoder = fields.next().flatten();
    let encoder = fields.next().flatten();

    // nvidia-smi reports one aggregate decoder figure; the remaining decode
    // slots are not measurable through this query and stay sentinel.
    let mut reading = GpuReading::sentinel();
    reading.gpu_3d = gpu.unwrap_or(SENTINEL);
    reading.decode[0] = decoder.unwrap_or(SENTINEL);
    reading.encode = encoder.unwrap_or(SENTINEL);
    reading
}
