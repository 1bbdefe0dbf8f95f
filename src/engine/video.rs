// Video descriptor classification from test-source filenames

use serde::{Deserialize, Serialize};

/// Codec of a test source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Codec {
    #[default]
    Unknown,
    H264,
    H265,
}

/// Chroma subsampling of a test source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Chroma {
    #[default]
    Unknown,
    Yuv420,
    Yuv422,
    Yuv444,
}

/// Bit depth of a test source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BitDepth {
    #[default]
    Unknown,
    Bit8,
    Bit10,
}

/// Resolution class of a test source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
    #[default]
    Unknown,
    Hd,
    Uhd,
}

/// Properties of one test source, derived once from its filename.
///
/// Classification is best-effort: every field falls back to `Unknown` when no
/// naming token matches, it never fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VideoDescriptor {
    pub codec: Codec,
    pub chroma: Chroma,
    pub bit_depth: BitDepth,
    pub resolution: Resolution,
}

impl VideoDescriptor {
    /// Classify a filename using independent substring matchers.
    pub fn from_filename(filename: &str) -> Self {
        let lower = filename.to_ascii_lowercase();
        Self {
            codec: classify_codec(&lower),
            chroma: classify_chroma(&lower),
            bit_depth: classify_bit_depth(&lower),
            resolution: classify_resolution(&lower),
        }
    }

    /// FFmpeg pixel format string for raw (uncontained) sources.
    pub fn pixel_format(&self) -> String {
        let mut fmt = match self.chroma {
            Chroma::Yuv422 => "yuv422p",
            Chroma::Yuv444 => "yuv444p",
            _ => "yuv420p",
        }
        .to_string();
        if self.bit_depth == BitDepth::Bit10 {
            fmt.push_str("10le");
        }
        fmt
    }

    /// Frame dimensions for raw sources. HD unless the name says UHD.
    pub fn frame_size(&self) -> &'static str {
        match self.resolution {
            Resolution::Uhd => "3840x2160",
            _ => "1920x1080",
        }
    }
}

fn contains_any(filename: &str, tokens: &[&str]) -> bool {
    tokens.iter().any(|t| filename.contains(t))
}

fn classify_codec(filename: &str) -> Codec {
    if contains_any(filename, &["h264", "libx264", "x264"]) {
        Codec::H264
    } else if contains_any(filename, &["h265", "hevc", "x265"]) {
        Codec::H265
    } else {
        Codec::Unknown
    }
}

fn classify_chroma(filename: &str) -> Chroma {
    if filename.contains("420") {
        Chroma::Yuv420
    } else if filename.contains("422") {
        Chroma::Yuv422
    } else if filename.contains("444") {
        Chroma::Yuv444
    } else {
        Chroma::Unknown
    }
}

fn classify_bit_depth(filename: &str) -> BitDepth {
    if contains_any(filename, &["8bit", "b08"]) {
        BitDepth::Bit8
    } else if contains_any(filename, &["10bit", "b10"]) {
        BitDepth::Bit10
    } else {
        BitDepth::Unknown
    }
}

fn classify_resolution(filename: &str) -> Resolution {
    // "uhd" contains "hd", so the UHD tokens must win first.
    if contains_any(filename, &["uhd", "4k"]) {
        Resolution::Uhd
    } else if filename.contains("hd") {
        Resolution::Hd
    } else {
        Resolution::Unknown
    }
}
