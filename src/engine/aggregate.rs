// Reduction of a snapshot time series into one peak record

use serde::Serialize;

use super::metrics::{DECODE_ENGINES, UtilizationSnapshot, measured_or_zero};

/// Which utilization axis ranks snapshots for peak selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankKind {
    /// Software-only runs: the CPU is the loaded resource.
    Cpu,
    /// Hardware runs: sum of all GPU engine utilizations.
    GpuSum,
}

/// Policy for the derived `gpu_overall` figure. Tool revisions disagree on
/// whether the copy engine joins the max; the default leaves it out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpuRankPolicy {
    pub include_copy_in_overall: bool,
}

impl Default for GpuRankPolicy {
    fn default() -> Self {
        Self {
            include_copy_in_overall: false,
        }
    }
}

/// The single snapshot selected as representative of one run, extended with
/// the derived overall figure and a wall-clock timestamp.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeakMetricsRecord {
    pub gpu_overall: f32,
    pub gpu_3d: f32,
    pub gpu_copy: f32,
    pub decode: [f32; DECODE_ENGINES],
    pub encode: f32,
    pub cpu: f32,
    /// How many snapshots fed the reduction. Zero marks the degenerate
    /// too-fast-to-measure case.
    pub samples_seen: usize,
    pub timestamp: String,
}

impl PeakMetricsRecord {
    /// Zero-valued record for runs that produced no snapshot or were skipped.
    pub fn zeroed() -> Self {
        Self {
            gpu_overall: 0.0,
            gpu_3d: 0.0,
            gpu_copy: 0.0,
            decode: [0.0; DECODE_ENGINES],
            encode: 0.0,
            cpu: 0.0,
            samples_seen: 0,
            timestamp: now_timestamp(),
        }
    }
}

fn now_timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

/// Running peak reduction. Holds at most one snapshot at a time; ties keep
/// the first-seen snapshot so selection is deterministic for a given order.
#[derive(Debug)]
pub struct SampleAggregator {
    rank: RankKind,
    policy: GpuRankPolicy,
    best: Option<(f32, UtilizationSnapshot)>,
    count: usize,
}

impl SampleAggregator {
    pub fn new(rank: RankKind, policy: GpuRankPolicy) -> Self {
        Self {
            rank,
            policy,
            best: None,
            count: 0,
        }
    }

    pub fn push(&mut self, snapshot: UtilizationSnapshot) {
        self.count += 1;
        let rank = match self.rank {
            RankKind::Cpu => measured_or_zero(snapshot.cpu),
            RankKind::GpuSum => snapshot.gpu_sum(),
        };
        // Strictly greater: an equal rank never displaces the earlier sample.
        match &self.best {
            Some((best_rank, _)) if rank <= *best_rank => {}
            _ => self.best = Some((rank, snapshot)),
        }
    }

    pub fn samples_seen(&self) -> usize {
        self.count
    }

    pub fn finish(self) -> PeakMetricsRecord {
        let Some((_, snap)) = self.best else {
            return PeakMetricsRecord::zeroed();
        };

        let mut engines = vec![snap.gpu_3d, snap.encode];
        engines.extend_from_slice(&snap.decode);
        if self.policy.include_copy_in_overall {
            engines.push(snap.gpu_copy);
        }
        let gpu_overall = engines
            .into_iter()
            .filter(|v| *v >= 0.0)
            .fold(f32::NEG_INFINITY, f32::max);
        let gpu_overall = if gpu_overall.is_finite() {
            gpu_overall
        } else {
            super::metrics::SENTINEL
        };

        PeakMetricsRecord {
            gpu_overall,
            gpu_3d: snap.gpu_3d,
            gpu_copy: snap.gpu_copy,
            decode: snap.decode,
            encode: snap.encode,
            cpu: snap.cpu,
            samples_seen: self.count,
            timestamp: now_timestamp(),
        }
    }
}
