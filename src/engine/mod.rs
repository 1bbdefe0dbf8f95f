// Benchmark engine - independent of the CLI surface

pub mod accel;
pub mod aggregate;
pub mod command;
pub mod fps;
pub mod metrics;
pub mod orchestrator;
pub mod video;

use std::time::Duration;

pub use accel::{AccelMode, GpuVendor, Os, UnknownVendor};
pub use aggregate::{GpuRankPolicy, PeakMetricsRecord};
pub use metrics::{MetricSource, SENTINEL, UtilizationSnapshot, select_source};
pub use orchestrator::{BenchRecord, RunOutcome, run_matrix, run_matrix_with_modes, run_one};
pub use video::VideoDescriptor;

/// Whether the probes exercise the decode or the encode path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    Decode,
    Encode,
}

/// Everything a matrix run needs beyond the source list.
#[derive(Debug, Clone)]
pub struct BenchConfig {
    pub vendor: GpuVendor,
    pub os: Os,
    pub probe: ProbeKind,
    pub parallel_streams: usize,
    pub device_index: u32,
    pub raw_source: bool,
    pub speedhq: bool,
    pub software_only: bool,
    pub ffmpeg_path: String,
    /// Hard cap per cell; streams still running at the deadline are killed.
    pub timeout: Duration,
    /// CPU counter settle time, also the floor of the sampling cadence.
    pub settle: Duration,
    /// Idle wait between samples on top of the settle time.
    pub poll_interval: Duration,
    pub rank_policy: GpuRankPolicy,
}

impl BenchConfig {
    pub fn new(vendor: GpuVendor, probe: ProbeKind) -> Self {
        Self {
            vendor,
            os: Os::current(),
            probe,
            parallel_streams: 1,
            device_index: 0,
            raw_source: false,
            speedhq: false,
            software_only: false,
            ffmpeg_path: "ffmpeg".into(),
            timeout: Duration::from_secs(300),
            settle: Duration::from_millis(200),
            poll_interval: Duration::from_millis(250),
            rank_policy: GpuRankPolicy::default(),
        }
    }
}
