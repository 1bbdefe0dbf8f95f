// Run lifecycle: spawn parallel probe streams, sample counters while they
// live, then reduce to one record per (video, mode) cell.
//
// Children are spawned synchronously so spawn failures are known before the
// sampling loop starts; only stderr draining happens on helper threads. The
// process handles stay in a shared registry so the deadline path can kill
// from the main thread.

use std::io::{BufRead, BufReader};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::stats::ThroughputStats;

use super::accel::{self, AccelMode, UnknownVendor};
use super::aggregate::{PeakMetricsRecord, RankKind, SampleAggregator};
use super::command::{self, CommandContext};
use super::fps::FpsScanner;
use super::metrics::MetricSource;
use super::video::VideoDescriptor;
use super::{BenchConfig, ProbeKind};

/// Phases of one run. Transitions only move forward; `Skipped` and
/// `Completed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Pending,
    CompatibilityChecked,
    Skipped,
    CommandBuilt,
    Running,
    Sampling,
    Completed,
}

fn advance(state: &mut RunState, next: RunState, source: &str) {
    debug!(source, "run state {:?} -> {:?}", *state, next);
    *state = next;
}

/// Message from a stream's stderr drain thread back to the run loop.
enum StreamMessage {
    Finished { stream: usize, fps: Option<f32> },
}

/// How a matrix cell ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed,
    Skipped { reason: String },
}

/// One output record per (video, mode) cell, emitted in matrix order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BenchRecord {
    pub source: String,
    pub video: VideoDescriptor,
    pub mode: AccelMode,
    pub outcome: RunOutcome,
    pub peak: PeakMetricsRecord,
    pub throughput: ThroughputStats,
}

impl BenchRecord {
    fn skipped(source: &str, video: VideoDescriptor, mode: AccelMode, reason: String) -> Self {
        Self {
            source: source.to_string(),
            video,
            mode,
            outcome: RunOutcome::Skipped { reason },
            peak: PeakMetricsRecord::zeroed(),
            throughput: ThroughputStats::default(),
        }
    }
}

/// How long the post-kill drain waits for straggler threads before giving up
/// on their fps reports.
const DRAIN_PATIENCE: Duration = Duration::from_secs(5);

/// Execute one cell: resolve compatibility, spawn the streams, sample until
/// they exit or the deadline fires.
///
/// Everything that can go wrong inside the cell degrades to a record; the
/// only error is an unclassifiable vendor.
pub fn run_one(
    cfg: &BenchConfig,
    source: &str,
    mode: AccelMode,
    sampler: &mut dyn MetricSource,
) -> Result<BenchRecord, UnknownVendor> {
    let mut state = RunState::Pending;
    let video = VideoDescriptor::from_filename(source);

    let compat = accel::resolve(cfg.vendor, mode, &video)?;
    advance(&mut state, RunState::CompatibilityChecked, source);
    if compat.skip {
        advance(&mut state, RunState::Skipped, source);
        info!(source, %mode, "incompatible cell, emitting skip record");
        return Ok(BenchRecord::skipped(
            source,
            video,
            mode,
            "incompatible vendor/mode/codec combination".into(),
        ));
    }
    let mode = compat.effective_mode;

    let ctx = CommandContext {
        os: cfg.os,
        device_index: cfg.device_index,
        raw_source: cfg.raw_source,
        speedhq: cfg.speedhq,
    };

    // All commands are derived before the first spawn so a non-buildable
    // cell is skipped without leaving partial streams behind.
    let mut commands = Vec::with_capacity(cfg.parallel_streams);
    for stream in 0..cfg.parallel_streams {
        let args = match cfg.probe {
            ProbeKind::Decode => command::build_decode_args(mode, &video, source, &ctx),
            ProbeKind::Encode => {
                match command::build_encode_args(mode, &video, source, stream, &ctx) {
                    Ok(args) => args,
                    Err(e) => {
                        advance(&mut state, RunState::Skipped, source);
                        warn!(source, %mode, error = %e, "cannot build encode command, skipping cell");
                        return Ok(BenchRecord::skipped(source, video, mode, e.to_string()));
                    }
                }
            }
        };
        commands.push(args);
    }
    advance(&mut state, RunState::CommandBuilt, source);

    advance(&mut state, RunState::Running, source);
    let mut children: Vec<Arc<Mutex<Child>>> = Vec::new();
    let (tx, rx) = mpsc::channel::<StreamMessage>();

    for (stream, args) in commands.into_iter().enumerate() {
        debug!(source, %mode, stream, args = ?args, "spawning probe");

        let spawned = Command::new(&cfg.ffmpeg_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!(source, %mode, stream, error = %e, "probe spawn failed");
                continue;
            }
        };

        let stderr = child.stderr.take();
        children.push(Arc::new(Mutex::new(child)));
        let tx = tx.clone();
        // Detached on purpose: a drain thread can stay blocked on the pipe
        // when a killed probe leaves grandchildren holding the write end.
        thread::spawn(move || {
            let mut scanner = FpsScanner::new();
            if let Some(stderr) = stderr {
                for line in BufReader::new(stderr).lines() {
                    let Ok(line) = line else { break };
                    scanner.feed(&line);
                }
            }
            let _ = tx.send(StreamMessage::Finished {
                stream,
                fps: scanner.finish(),
            });
        });
    }
    drop(tx);

    let mut live = children.len();
    let rank = if mode.is_hardware() {
        RankKind::GpuSum
    } else {
        RankKind::Cpu
    };
    let mut aggregator = SampleAggregator::new(rank, cfg.rank_policy);
    let mut fps_reports = vec![-1.0f32; cfg.parallel_streams];
    let deadline = Instant::now() + cfg.timeout;

    advance(&mut state, RunState::Sampling, source);
    while live > 0 {
        if Instant::now() >= deadline {
            warn!(source, %mode, "run deadline exceeded, killing streams");
            kill_all(&children);
            break;
        }

        aggregator.push(sampler.sample());

        // Collect exits that arrived during the sample, then idle briefly.
        loop {
            match rx.recv_timeout(cfg.poll_interval) {
                Ok(StreamMessage::Finished { stream, fps }) => {
                    debug!(source, stream, ?fps, "stream finished");
                    if let Some(f) = fps {
                        fps_reports[stream] = f;
                    }
                    live -= 1;
                    if live == 0 {
                        break;
                    }
                }
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => {
                    live = 0;
                    break;
                }
            }
        }
    }

    // Drain stragglers after a kill before declaring the run complete.
    while live > 0 {
        match rx.recv_timeout(DRAIN_PATIENCE) {
            Ok(StreamMessage::Finished { stream, fps }) => {
                if let Some(f) = fps {
                    fps_reports[stream] = f;
                }
                live -= 1;
            }
            Err(_) => {
                warn!(source, live, "gave up waiting for killed streams");
                break;
            }
        }
    }
    reap_all(source, &children);

    advance(&mut state, RunState::Completed, source);
    let peak = aggregator.finish();
    if peak.samples_seen == 0 {
        debug!(source, %mode, "run finished before the first sample");
    }
    // Killed streams keep whatever rate they reported before the kill;
    // only streams with no parsable token stay sentinel.
    let throughput = ThroughputStats::from_samples(&fps_reports);

    Ok(BenchRecord {
        source: source.to_string(),
        video,
        mode,
        outcome: RunOutcome::Completed,
        peak,
        throughput,
    })
}

fn kill_all(children: &[Arc<Mutex<Child>>]) {
    for slot in children {
        if let Ok(mut child) = slot.lock() {
            let _ = child.kill();
        }
    }
}

fn reap_all(source: &str, children: &[Arc<Mutex<Child>>]) {
    for slot in children {
        if let Ok(mut child) = slot.lock() {
            match child.wait() {
                Ok(status) if !status.success() => {
                    debug!(source, code = ?status.code(), "probe exited non-zero");
                }
                Ok(_) => {}
                Err(e) => warn!(source, error = %e, "could not reap probe"),
            }
        }
    }
}

/// Run the full matrix: every candidate mode of the configured vendor/OS,
/// each over every source, records emitted in that order.
pub fn run_matrix(
    cfg: &BenchConfig,
    sources: &[String],
    sampler: &mut dyn MetricSource,
) -> Result<Vec<BenchRecord>, UnknownVendor> {
    let modes = accel::candidate_modes(cfg.vendor, cfg.os, cfg.software_only)?;
    run_matrix_with_modes(cfg, sources, &modes, sampler)
}

/// Matrix execution over an explicit mode axis.
pub fn run_matrix_with_modes(
    cfg: &BenchConfig,
    sources: &[String],
    modes: &[AccelMode],
    sampler: &mut dyn MetricSource,
) -> Result<Vec<BenchRecord>, UnknownVendor> {
    // Mode-major order: consumers align rows against per-mode result blocks.
    let mut records = Vec::with_capacity(sources.len() * modes.len());
    for &mode in modes {
        for source in sources {
            info!(source, %mode, "running matrix cell");
            records.push(run_one(cfg, source, mode, sampler)?);
        }
    }
    Ok(records)
}
