// Platform performance-counter sampling
//
// One `MetricSource` implementation is selected at startup and reused for the
// whole benchmark; components below the orchestrator never branch on platform.

pub mod intel;
pub mod nvidia;

use std::thread;
use std::time::Duration;

use serde::Serialize;
use sysinfo::System;
use tracing::debug;

use super::accel::{GpuVendor, Os};

/// Marker for "not measurable on this platform/vendor". Distinct from a
/// legitimate 0% reading.
pub const SENTINEL: f32 = -1.0;

/// Number of logical video-decode engine slots tracked per snapshot.
pub const DECODE_ENGINES: usize = 3;

/// One point-in-time utilization vector. Transient: snapshots are reduced,
/// never persisted individually.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct UtilizationSnapshot {
    pub gpu_3d: f32,
    pub gpu_copy: f32,
    pub decode: [f32; DECODE_ENGINES],
    pub encode: f32,
    pub cpu: f32,
}

impl UtilizationSnapshot {
    /// All GPU engines unmeasurable; CPU still carries a reading.
    pub fn gpu_sentinel(cpu: f32) -> Self {
        Self {
            cpu,
            ..Self::all_sentinel()
        }
    }

    pub fn all_sentinel() -> Self {
        Self {
            gpu_3d: SENTINEL,
            gpu_copy: SENTINEL,
            decode: [SENTINEL; DECODE_ENGINES],
            encode: SENTINEL,
            cpu: SENTINEL,
        }
    }

    /// Sum of all GPU engine utilizations with sentinels counted as zero.
    /// This is the ranking key for hardware-accelerated runs.
    pub fn gpu_sum(&self) -> f32 {
        let mut total = measured_or_zero(self.gpu_3d) + measured_or_zero(self.gpu_copy);
        for d in self.decode {
            total += measured_or_zero(d);
        }
        total + measured_or_zero(self.encode)
    }
}

pub(crate) fn measured_or_zero(value: f32) -> f32 {
    if value < 0.0 { 0.0 } else { value }
}

/// GPU-side engine readings produced by one source query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpuReading {
    pub gpu_3d: f32,
    pub copy: f32,
    pub decode: [f32; DECODE_ENGINES],
    pub encode: f32,
}

impl GpuReading {
    pub fn sentinel() -> Self {
        Self {
            gpu_3d: SENTINEL,
            copy: SENTINEL,
            decode: [SENTINEL; DECODE_ENGINES],
            encode: SENTINEL,
        }
    }
}

/// A platform counter backend. Individual read failures degrade to
/// [`SENTINEL`] fields; `sample` itself never fails.
pub trait MetricSource: Send {
    fn sample(&mut self) -> UtilizationSnapshot;
}

/// CPU utilization via sysinfo's two-read discipline: a discard refresh, the
/// settle wait, then the authoritative refresh.
pub struct CpuSampler {
    system: System,
    settle: Duration,
}

impl CpuSampler {
    pub fn new(settle: Duration) -> Self {
        Self {
            system: System::new(),
            settle: settle.max(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL),
        }
    }

    pub fn read(&mut self) -> f32 {
        self.system.refresh_cpu();
        thread::sleep(self.settle);
        self.system.refresh_cpu();
        self.system.global_cpu_info().cpu_usage()
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }
}

/// Source for runs with no GPU counter tooling: CPU only, GPU sentinels.
pub struct NullGpuSource {
    cpu: CpuSampler,
}

impl NullGpuSource {
    pub fn new(settle: Duration) -> Self {
        Self {
            cpu: CpuSampler::new(settle),
        }
    }
}

impl MetricSource for NullGpuSource {
    fn sample(&mut self) -> UtilizationSnapshot {
        UtilizationSnapshot::gpu_sentinel(self.cpu.read())
    }
}

fn snapshot_from(gpu: GpuReading, cpu: f32) -> UtilizationSnapshot {
    UtilizationSnapshot {
        gpu_3d: gpu.gpu_3d,
        gpu_copy: gpu.copy,
        decode: gpu.decode,
        encode: gpu.encode,
        cpu,
    }
}

/// Run the GPU query concurrently with the CPU settle-and-read; the two are
/// independent and the GPU side is a one-shot subprocess.
pub(crate) fn sample_concurrently<F>(cpu: &mut CpuSampler, query_gpu: F) -> UtilizationSnapshot
where
    F: FnOnce() -> GpuReading + Send,
{
    let (gpu, cpu_usage) = thread::scope(|scope| {
        let handle = scope.spawn(query_gpu);
        let cpu_usage = cpu.read();
        (handle.join().unwrap_or_else(|_| GpuReading::sentinel()), cpu_usage)
    });
    snapshot_from(gpu, cpu_usage)
}

/// Pick the counter backend once at startup.
///
/// Linux reads vendor tools (`nvidia-smi`, `intel_gpu_top`); everywhere else,
/// and for unknown tooling, GPU engines degrade to sentinels while CPU stays
/// measured.
pub fn select_source(
    vendor: GpuVendor,
    os: Os,
    decode_only: bool,
    settle: Duration,
) -> Box<dyn MetricSource> {
    match (os, vendor) {
        (Os::Linux, GpuVendor::Nvidia) => {
            debug!("sampling GPU engines via nvidia-smi");
            Box::new(nvidia::NvidiaSmiSource::new(settle))
        }
        (Os::Linux, GpuVendor::Intel) => {
            debug!("sampling GPU engines via intel_gpu_top");
            Box::new(intel::IntelGpuTopSource::new(settle, decode_only))
        }
        _ => {
            debug!(?os, ?vendor, "no GPU counter backend, CPU only");
            Box::new(NullGpuSource::new(settle))
        }
    }
}
