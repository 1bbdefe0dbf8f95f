use crate::cli::{Cli, Commands};
use ffbench::engine::{self, AccelMode, BenchConfig, GpuVendor, Os, ProbeKind};
use ffbench::sink::{JsonlSink, RecordSink};
use ffbench::{config, engine::RunOutcome};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::process::{self, Command};
use std::time::Duration;

pub fn run(cli: Cli) {
    if let Some(command) = &cli.command {
        match command {
            Commands::CheckFfmpeg => handle_check_ffmpeg(),
            Commands::ListModes => handle_list_modes(cli.gpu.clone(), cli.software_only),
            Commands::DryRun { directory } => handle_dry_run(directory.clone(), &cli),
        }
        return;
    }

    if let Err(e) = run_benchmark(&cli) {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn load_config() -> config::Config {
    config::Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {:#}; using built-in defaults", e);
        config::Config::default()
    })
}

/// CLI flags win over the config file; the config file wins over defaults.
fn bench_config(cli: &Cli, cfg: &config::Config) -> anyhow::Result<BenchConfig> {
    let vendor: GpuVendor = cli
        .gpu
        .as_deref()
        .or(cfg.run.gpu.as_deref())
        .unwrap_or("")
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let probe = if cli.encode {
        ProbeKind::Encode
    } else {
        ProbeKind::Decode
    };
    let mut bench = BenchConfig::new(vendor, probe);
    bench.parallel_streams = cli.streams.unwrap_or(cfg.run.streams).max(1);
    bench.device_index = cli.device.unwrap_or(cfg.run.device);
    bench.raw_source = cli.raw;
    bench.speedhq = cli.speedhq;
    bench.software_only = cli.software_only || cfg.run.software_only;
    bench.ffmpeg_path = cfg.paths.ffmpeg.clone();
    bench.timeout = Duration::from_secs(cfg.run.timeout_secs);
    bench.settle = Duration::from_millis(cfg.metrics.settle_ms);
    bench.poll_interval = Duration::from_millis(cfg.metrics.poll_interval_ms);
    bench.rank_policy = engine::GpuRankPolicy {
        include_copy_in_overall: cfg.metrics.include_copy_in_overall,
    };
    Ok(bench)
}

fn run_benchmark(cli: &Cli) -> anyhow::Result<()> {
    let cfg = load_config();
    let bench = bench_config(cli, &cfg)?;

    let dir = source_dir(cli.directory.clone());
    let sources = scan_sources(&dir)?;
    if sources.is_empty() {
        anyhow::bail!("no test sources found in {}", dir.display());
    }
    println!(
        "Benchmarking {} source(s) from {} ({} stream(s) per run)",
        sources.len(),
        dir.display(),
        bench.parallel_streams
    );

    let output = cli.output.clone().unwrap_or_else(|| cfg.paths.output.clone());
    let file = File::create(&output)
        .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", output.display()))?;
    let mut sink = JsonlSink::new(BufWriter::new(file));

    let decode_only = bench.probe == ProbeKind::Decode;
    let mut sampler = engine::select_source(bench.vendor, bench.os, decode_only, bench.settle);
    let records = engine::run_matrix(&bench, &sources, sampler.as_mut())?;

    for record in &records {
        match &record.outcome {
            RunOutcome::Completed => println!(
                "{} [{}]: avg {:.1} fps, peak gpu {:.1}%, peak cpu {:.1}%",
                record.source,
                record.mode,
                record.throughput.avg_fps,
                record.peak.gpu_overall,
                record.peak.cpu
            ),
            RunOutcome::Skipped { reason } => {
                println!("{} [{}]: skipped ({reason})", record.source, record.mode)
            }
        }
        sink.accept(record)?;
    }
    println!("Wrote {} record(s) to {}", records.len(), output.display());
    Ok(())
}

fn handle_check_ffmpeg() {
    let cfg = load_config();
    match ffmpeg_version(&cfg.paths.ffmpeg) {
        Ok(version) => {
            println!("ffmpeg found: {}", version);
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn ffmpeg_version(ffmpeg: &str) -> anyhow::Result<String> {
    let out = Command::new(ffmpeg)
        .arg("-version")
        .output()
        .map_err(|e| anyhow::anyhow!("could not run {ffmpeg}: {e}"))?;
    if !out.status.success() {
        anyhow::bail!("{ffmpeg} -version exited with {}", out.status);
    }
    let stdout = String::from_utf8_lossy(&out.stdout);
    Ok(stdout.lines().next().unwrap_or("unknown").to_string())
}

fn handle_list_modes(gpu: Option<String>, software_only: bool) {
    let cfg = load_config();
    let vendor: Result<GpuVendor, _> = gpu
        .as_deref()
        .or(cfg.run.gpu.as_deref())
        .unwrap_or("")
        .parse();
    let vendor = match vendor {
        Ok(v) => v,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    match engine::accel::candidate_modes(vendor, Os::current(), software_only) {
        Ok(modes) => {
            for mode in modes {
                println!("{}", mode);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}

fn handle_dry_run(directory: Option<PathBuf>, cli: &Cli) {
    let cfg = load_config();
    let bench = match bench_config(cli, &cfg) {
        Ok(b) => b,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    let dir = source_dir(directory.or_else(|| cli.directory.clone()));
    println!("Dry run: building probe commands for {}", dir.display());
    let sources = match scan_sources(&dir) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error scanning directory: {:#}", e);
            process::exit(1);
        }
    };
    let modes = match engine::accel::candidate_modes(bench.vendor, bench.os, bench.software_only) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    for source in &sources {
        let video = engine::VideoDescriptor::from_filename(source);
        for &mode in &modes {
            match preview_command(&bench, mode, &video, source) {
                Some(args) => {
                    let mut full = vec![bench.ffmpeg_path.clone()];
                    full.extend(args);
                    match shlex::try_join(full.iter().map(String::as_str)) {
                        Ok(line) => println!("{}", line),
                        Err(e) => eprintln!("# {source} [{mode}]: unquotable command: {e}"),
                    }
                }
                None => println!("# {source} [{mode}]: skipped"),
            }
        }
    }
}

fn preview_command(
    bench: &BenchConfig,
    mode: AccelMode,
    video: &engine::VideoDescriptor,
    source: &str,
) -> Option<Vec<String>> {
    let compat = engine::accel::resolve(bench.vendor, mode, video).ok()?;
    if compat.skip {
        return None;
    }
    let ctx = engine::command::CommandContext {
        os: bench.os,
        device_index: bench.device_index,
        raw_source: bench.raw_source,
        speedhq: bench.speedhq,
    };
    match bench.probe {
        ProbeKind::Decode => Some(engine::command::build_decode_args(
            compat.effective_mode,
            video,
            source,
            &ctx,
        )),
        ProbeKind::Encode => {
            engine::command::build_encode_args(compat.effective_mode, video, source, 0, &ctx).ok()
        }
    }
}

fn source_dir(directory: Option<PathBuf>) -> PathBuf {
    directory.unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
}

/// Collect test sources, skipping notes and the probes' own outputs.
fn scan_sources(dir: &Path) -> anyhow::Result<Vec<String>> {
    let mut sources = Vec::new();
    for entry in walkdir::WalkDir::new(dir).max_depth(1) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        let lower = name.to_ascii_lowercase();
        if lower.starts_with('.')
            || lower.starts_with("readme")
            || lower.starts_with("out")
            || lower.ends_with(".md")
            || lower.ends_with(".txt")
            || lower.ends_with(".json")
            || lower.ends_with(".jsonl")
        {
            continue;
        }
        sources.push(entry.path().to_string_lossy().to_string());
    }
    sources.sort();
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_subcommand_inspection_leaves_cli_usable() {
        let cli = Cli::try_parse_from(["ffbench", "--gpu", "nvidia", "dry-run", "/tmp"]).unwrap();
        let directory = match &cli.command {
            Some(Commands::DryRun { directory }) => directory.clone(),
            _ => panic!("expected dry-run subcommand"),
        };
        assert_eq!(directory.as_deref(), Some(Path::new("/tmp")));
        // The flags still have to be readable after the subcommand match,
        // exactly as the dispatch in run() needs them.
        assert_eq!(cli.gpu.as_deref(), Some("nvidia"));
        assert!(!cli.software_only);
    }

    #[test]
    fn test_scan_skips_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "clip_h264_420_8bit_hd.mp4",
            "out0.mp4",
            "README.md",
            "results.jsonl",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        let sources = scan_sources(dir.path()).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources[0].ends_with("clip_h264_420_8bit_hd.mp4"));
    }
}
