// GPU engine sampling via intel_gpu_top text output
//
// `intel_gpu_top -o -` prints a two-line header followed by one data row per
// sample period. Which data column carries the busy-% for each engine varies
// by tool build, so the layout is discovered from the header pair the first
// time output is seen and cached for the process lifetime.
//
// Example layout (columns shift between builds):
//
//  Freq MHz      IRQ RC6     Power W             RCS/0           BCS/0           VCS/0           VCS/1
//  req  act       /s   %   gpu   pkg       %  se  wa       %  se  wa       %  se  wa       %  se  wa

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::sync::OnceLock;
use std::time::Duration;

use tracing::warn;

use super::{
    CpuSampler, DECODE_ENGINES, GpuReading, MetricSource, SENTINEL, UtilizationSnapshot,
    sample_concurrently,
};

/// Data-column indices (whitespace-token positions) of each engine's busy-%.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnLayout {
    pub render: Option<usize>,
    pub copy: Option<usize>,
    pub video: Vec<usize>,
    pub enhance: Option<usize>,
}

impl ColumnLayout {
    /// Discover the layout from the two header lines.
    ///
    /// Every `%` token in the sub-column header belongs to the engine-group
    /// name printed nearest above it; the `%` under RC6 maps to a non-engine
    /// token and is dropped.
    pub fn discover(groups_line: &str, columns_line: &str) -> Option<Self> {
        let groups = token_spans(groups_line);
        let columns = token_spans(columns_line);
        if groups.is_empty() || columns.is_empty() {
            return None;
        }

        let mut layout = Self {
            render: None,
            copy: None,
            video: Vec::new(),
            enhance: None,
        };

        for (index, &(start, end, token)) in columns.iter().enumerate() {
            if token != "%" {
                continue;
            }
            let center = (start + end) / 2;
            let owner = groups
                .iter()
                .min_by_key(|&&(gs, ge, _)| center.abs_diff((gs + ge) / 2))
                .map(|&(_, _, name)| name)?;

            // VECS (video enhance) must not be mistaken for VCS.
            if owner.starts_with("VECS") || owner.starts_with("VideoEnhance") {
                layout.enhance = Some(index);
            } else if owner.starts_with("RCS") || owner.starts_with("Render") {
                layout.render = Some(index);
            } else if owner.starts_with("BCS") || owner.starts_with("Blitter") {
                layout.copy = Some(index);
            } else if owner.starts_with("VCS") || owner.starts_with("Video") {
                layout.video.push(index);
            }
        }

        if layout.video.is_empty() && layout.render.is_none() {
            return None;
        }
        Some(layout)
    }
}

fn token_spans(line: &str) -> Vec<(usize, usize, &str)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in line.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i, &line[s..i]));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, line.len(), &line[s..]));
    }
    spans
}

/// Read the engine values out of one data row using a discovered layout.
/// An absent or unparsable column degrades that engine to the sentinel.
pub fn parse_data_line(layout: &ColumnLayout, line: &str, decode_only: bool) -> GpuReading {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let field = |index: Option<usize>| -> f32 {
        index
            .and_then(|i| tokens.get(i))
            .and_then(|t| t.parse::<f32>().ok())
            .unwrap_or(SENTINEL)
    };

    let mut reading = GpuReading::sentinel();
    reading.gpu_3d = field(layout.render);
    reading.copy = field(layout.copy);
    for (slot, &column) in layout.video.iter().take(DECODE_ENGINES).enumerate() {
        reading.decode[slot] = field(Some(column));
    }

    // The VCS engines handle both directions; there is no dedicated encode
    // counter, so the busiest decode engine stands in unless the run is
    // decode-only.
    reading.encode = if decode_only {
        SENTINEL
    } else {
        reading
            .decode
            .iter()
            .copied()
            .filter(|v| *v >= 0.0)
            .fold(SENTINEL, f32::max)
    };
    reading
}

pub struct IntelGpuTopSource {
    cpu: CpuSampler,
    decode_only: bool,
    sample_ms: u64,
    layout: OnceLock<ColumnLayout>,
}

impl IntelGpuTopSource {
    pub fn new(settle: Duration, decode_only: bool) -> Self {
        Self {
            cpu: CpuSampler::new(settle),
            decode_only,
            sample_ms: 500,
            layout: OnceLock::new(),
        }
    }
}

impl MetricSource for IntelGpuTopSource {
    fn sample(&mut self) -> UtilizationSnapshot {
        let layout = &self.layout;
        let decode_only = self.decode_only;
        let sample_ms = self.sample_ms;
        sample_concurrently(&mut self.cpu, move || {
            query_intel_gpu_top(layout, decode_only, sample_ms)
        })
    }
}

fn query_intel_gpu_top(
    layout: &OnceLock<ColumnLayout>,
    decode_only: bool,
    sample_ms: u64,
) -> GpuReading {
    let lines = match capture_lines(sample_ms) {
        Ok(lines) => lines,
        Err(e) => {
            warn!(error = %e, "could not run intel_gpu_top, GPU engines unmeasured");
            return GpuReading::sentinel();
        }
    };
    if lines.len() < 3 {
        warn!(lines = lines.len(), "short intel_gpu_top output, GPU engines unmeasured");
        return GpuReading::sentinel();
    }

    let layout = match layout.get() {
        Some(known) => known,
        None => match ColumnLayout::discover(&lines[0], &lines[1]) {
            Some(found) => layout.get_or_init(|| found),
            None => {
                warn!("unrecognized intel_gpu_top header layout, GPU engines unmeasured");
                return GpuReading::sentinel();
            }
        },
    };

    // The last captured row is the most settled sample.
    match lines.last() {
        Some(data) => parse_data_line(layout, data, decode_only),
        None => GpuReading::sentinel(),
    }
}

/// One-shot capture: headers plus up to two data rows, then kill the tool.
fn capture_lines(sample_ms: u64) -> std::io::Result<Vec<String>> {
    let mut child = Command::new("intel_gpu_top")
        .args(["-o", "-", "-s", &sample_ms.to_string()])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    let mut lines = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            let Ok(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }
            lines.push(line);
            if lines.len() >= 4 {
                break;
            }
        }
    }
    let _ = child.kill();
    let _ = child.wait();
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    const GROUPS: &str = "Freq  MHz       IRQ RC6  Power   W     RCS/0           BCS/0           VCS/0           VCS/1";
    const COLUMNS: &str = " req  act       /s   %   gpu   pkg       %  se  wa       %  se  wa       %  se  wa       %  se  wa";
    const DATA: &str = " 350  350      123   2  4.21  9.80   55.00   0   0    3.50   0   0   81.25   0   0   12.00   0   0";

    #[test]
    fn test_discover_classic_layout() {
        let layout = ColumnLayout::discover(GROUPS, COLUMNS).unwrap();
        assert_eq!(layout.render, Some(6));
        assert_eq!(layout.copy, Some(9));
        assert_eq!(layout.video, vec![12, 15]);
        assert_eq!(layout.enhance, None);
    }

    #[test]
    fn test_discover_named_engine_layout() {
        // Builds that spell the engine class out and report video enhance.
        let groups =
            "Freq  MHz       IRQ RC6  Power   W   Render/3D        Blitter          Video       VideoEnhance";
        let columns = COLUMNS;
        let layout = ColumnLayout::discover(groups, columns).unwrap();
        assert_eq!(layout.render, Some(6));
        assert_eq!(layout.copy, Some(9));
        assert_eq!(layout.video, vec![12]);
        assert_eq!(layout.enhance, Some(15));
    }

    #[test]
    fn test_discover_rejects_garbage() {
        assert_eq!(ColumnLayout::discover("", ""), None);
        assert_eq!(ColumnLayout::discover("no engines here", "a b c"), None);
    }

    #[test]
    fn test_parse_data_line() {
        let layout = ColumnLayout::discover(GROUPS, COLUMNS).unwrap();
        let r = parse_data_line(&layout, DATA, false);
        assert_eq!(r.gpu_3d, 55.0);
        assert_eq!(r.copy, 3.5);
        assert_eq!(r.decode[0], 81.25);
        assert_eq!(r.decode[1], 12.0);
        assert_eq!(r.decode[2], SENTINEL);
        // No native encode counter: busiest video engine stands in.
        assert_eq!(r.encode, 81.25);
    }

    #[test]
    fn test_parse_data_line_decode_only() {
        let layout = ColumnLayout::discover(GROUPS, COLUMNS).unwrap();
        let r = parse_data_line(&layout, DATA, true);
        assert_eq!(r.encode, SENTINEL);
    }

    #[test]
    fn test_parse_short_row_degrades_per_engine() {
        let layout = ColumnLayout::discover(GROUPS, COLUMNS).unwrap();
        let r = parse_data_line(&layout, " 350  350      123   2  4.21  9.80   55.00   0   0", false);
        assert_eq!(r.gpu_3d, 55.0);
        assert_eq!(r.copy, SENTINEL);
        assert_eq!(r.decode[0], SENTINEL);
    }
}
