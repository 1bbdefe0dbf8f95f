// Result record persistence

use std::io::Write;

use anyhow::{Context, Result};

use crate::engine::BenchRecord;

/// Destination for benchmark records. Records arrive in matrix order and
/// must be persisted in arrival order.
pub trait RecordSink {
    fn accept(&mut self, record: &BenchRecord) -> Result<()>;
}

/// One JSON object per line, flushed per record so a crashed run keeps
/// everything emitted so far.
pub struct JsonlSink<W: Write> {
    writer: W,
}

impl<W: Write> JsonlSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> RecordSink for JsonlSink<W> {
    fn accept(&mut self, record: &BenchRecord) -> Result<()> {
        serde_json::to_writer(&mut self.writer, record).context("Failed to serialize record")?;
        self.writer.write_all(b"\n").context("Failed to write record")?;
        self.writer.flush().context("Failed to flush record")?;
        Ok(())
    }
}

/// In-memory sink for tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<BenchRecord>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RecordSink for MemorySink {
    fn accept(&mut self, record: &BenchRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::orchestrator::RunOutcome;
    use crate::engine::{AccelMode, PeakMetricsRecord, VideoDescriptor};
    use crate::stats::ThroughputStats;

    fn record() -> BenchRecord {
        BenchRecord {
            source: "clip_h264_420_8bit_hd.mp4".into(),
            video: VideoDescriptor::from_filename("clip_h264_420_8bit_hd.mp4"),
            mode: AccelMode::Cuda,
            outcome: RunOutcome::Completed,
            peak: PeakMetricsRecord::zeroed(),
            throughput: ThroughputStats::default(),
        }
    }

    #[test]
    fn test_jsonl_one_object_per_line() {
        let mut sink = JsonlSink::new(Vec::new());
        sink.accept(&record()).unwrap();
        sink.accept(&record()).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let v: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(v["mode"], "Cuda");
            assert_eq!(v["outcome"]["kind"], "completed");
        }
    }

    #[test]
    fn test_memory_sink_preserves_order() {
        let mut sink = MemorySink::new();
        let mut second = record();
        second.source = "other.mp4".into();
        sink.accept(&record()).unwrap();
        sink.accept(&second).unwrap();
        assert_eq!(sink.records[0].source, "clip_h264_420_8bit_hd.mp4");
        assert_eq!(sink.records[1].source, "other.mp4");
    }
}
