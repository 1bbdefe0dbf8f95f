// Acceleration modes, GPU vendors, and static compatibility resolution

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::video::{Chroma, Codec, VideoDescriptor};

/// Hardware acceleration backends understood by the transcoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccelMode {
    None,
    Cuda,
    Qsv,
    Vaapi,
    Vdpau,
    Vulkan,
    D3d11va,
    D3d12va,
}

impl AccelMode {
    /// Name passed to `-hwaccel`.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Cuda => "cuda",
            Self::Qsv => "qsv",
            Self::Vaapi => "vaapi",
            Self::Vdpau => "vdpau",
            Self::Vulkan => "vulkan",
            Self::D3d11va => "d3d11va",
            Self::D3d12va => "d3d12va",
        }
    }

    pub fn is_hardware(&self) -> bool {
        !matches!(self, Self::None)
    }
}

impl fmt::Display for AccelMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.ffmpeg_name())
    }
}

/// GPU vendor the benchmark targets. Supplied by the caller, not probed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GpuVendor {
    #[default]
    Unknown,
    Nvidia,
    Intel,
}

impl FromStr for GpuVendor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nvidia" => Ok(Self::Nvidia),
            "intel" => Ok(Self::Intel),
            other => Err(format!("unknown GPU vendor '{other}' (expected nvidia or intel)")),
        }
    }
}

/// Host platform, which changes device addressing in transcoder arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Os {
    Linux,
    Windows,
}

impl Os {
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Self::Windows
        } else {
            Self::Linux
        }
    }
}

/// The benchmark cannot classify the target GPU at all. This is the one fatal
/// condition: the affected run request must be aborted, not skipped.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("GPU vendor could not be classified; aborting run request")]
pub struct UnknownVendor;

/// Outcome of compatibility resolution for one (vendor, mode, video) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compatibility {
    pub effective_mode: AccelMode,
    pub skip: bool,
}

const NVIDIA_MODES: &[AccelMode] = &[
    AccelMode::None,
    AccelMode::Cuda,
    AccelMode::Vdpau,
    AccelMode::Vulkan,
    AccelMode::D3d11va,
    AccelMode::D3d12va,
];

const INTEL_MODES: &[AccelMode] = &[
    AccelMode::None,
    AccelMode::Qsv,
    AccelMode::Vaapi,
    AccelMode::Vulkan,
    AccelMode::D3d11va,
    AccelMode::D3d12va,
];

/// Resolve a requested mode against the vendor allow-list and the global
/// codec/chroma blocklist.
///
/// Deterministic and side-effect-free apart from logging: an unsupported mode
/// degrades to `(None, skip)`, never an error. Only an unclassifiable vendor
/// is fatal.
pub fn resolve(
    vendor: GpuVendor,
    mode: AccelMode,
    video: &VideoDescriptor,
) -> Result<Compatibility, UnknownVendor> {
    let allowed = match vendor {
        GpuVendor::Nvidia => NVIDIA_MODES,
        GpuVendor::Intel => INTEL_MODES,
        GpuVendor::Unknown => return Err(UnknownVendor),
    };

    let mut out = if allowed.contains(&mode) {
        Compatibility {
            effective_mode: mode,
            skip: false,
        }
    } else {
        warn!(%mode, ?vendor, "acceleration mode incompatible with GPU vendor, skipping");
        Compatibility {
            effective_mode: AccelMode::None,
            skip: true,
        }
    };

    // H.264 with 4:4:4 chroma is unsupported on every backend.
    if video.codec == Codec::H264 && video.chroma == Chroma::Yuv444 {
        warn!("h264 + yuv444 source is globally unsupported, skipping");
        out.skip = true;
    }

    Ok(out)
}

/// The acceleration-mode axis of the benchmark matrix for one vendor/OS.
pub fn candidate_modes(
    vendor: GpuVendor,
    os: Os,
    software_only: bool,
) -> Result<Vec<AccelMode>, UnknownVendor> {
    if software_only {
        return match vendor {
            GpuVendor::Unknown => Err(UnknownVendor),
            _ => Ok(vec![AccelMode::None]),
        };
    }

    let modes = match (vendor, os) {
        (GpuVendor::Nvidia, Os::Windows) => vec![
            AccelMode::Cuda,
            AccelMode::D3d11va,
            AccelMode::Vulkan,
            AccelMode::None,
        ],
        (GpuVendor::Nvidia, Os::Linux) => vec![
            AccelMode::Cuda,
            AccelMode::Vdpau,
            AccelMode::Vulkan,
            AccelMode::None,
        ],
        (GpuVendor::Intel, Os::Windows) => vec![
            AccelMode::Qsv,
            AccelMode::D3d11va,
            AccelMode::Vulkan,
            AccelMode::Vaapi,
            AccelMode::None,
        ],
        (GpuVendor::Intel, Os::Linux) => vec![
            AccelMode::Qsv,
            AccelMode::Vaapi,
            AccelMode::Vulkan,
            AccelMode::None,
        ],
        (GpuVendor::Unknown, _) => return Err(UnknownVendor),
    };
    Ok(modes)
}
