// FFmpeg argument synthesis for decode and encode probes
//
// Construction is pure: identical inputs always yield identical argument
// vectors, so every template is covered by direct string assertions.

use std::fmt;

use super::accel::{AccelMode, Os};
use super::video::VideoDescriptor;

/// Duration cap for encode probes, seconds.
const ENCODE_PROBE_SECS: &str = "20";

/// Loop counts that stretch short raw sources into a measurable run.
const RAW_LOOPS_DECODE: &str = "990";
const RAW_LOOPS_ENCODE: &str = "99";

/// Known bitrate tokens embedded in source filenames, mapped to Mbps.
const BITRATE_TOKENS: &[(&str, u32)] = &[
    ("10mbps", 10),
    ("15mbps", 15),
    ("20mbps", 20),
    ("30mbps", 30),
];

/// Inputs shared by every command template.
#[derive(Debug, Clone, Copy)]
pub struct CommandContext {
    pub os: Os,
    pub device_index: u32,
    /// Source is raw (uncontained) and needs explicit pixel format and size.
    pub raw_source: bool,
    /// Software-only codec override for the `None` decode path.
    pub speedhq: bool,
}

/// A command could not be derived from the inputs. Non-fatal: the caller
/// records the run as skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CannotBuild {
    /// Encode probes fail closed when the filename carries no bitrate token.
    NoBitrateToken,
}

impl fmt::Display for CannotBuild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoBitrateToken => f.write_str("no bitrate token found in filename"),
        }
    }
}

fn push_raw_source_args(args: &mut Vec<String>, video: &VideoDescriptor, loops: &str) {
    args.push("-stream_loop".into());
    args.push(loops.into());
    args.push("-pix_fmt".into());
    args.push(video.pixel_format());
    args.push("-s".into());
    args.push(video.frame_size().into());
}

/// Arguments for a decode-only probe (`-f null -` sink).
pub fn build_decode_args(
    mode: AccelMode,
    video: &VideoDescriptor,
    source: &str,
    ctx: &CommandContext,
) -> Vec<String> {
    let mut args: Vec<String> = vec!["-hide_banner".into()];

    match mode {
        AccelMode::Cuda | AccelMode::Vdpau => {
            args.push("-hwaccel".into());
            args.push(mode.ffmpeg_name().into());
            args.push("-hwaccel_device".into());
            args.push(ctx.device_index.to_string());
            args.push("-hwaccel_output_format".into());
            args.push(mode.ffmpeg_name().into());
        }
        AccelMode::Qsv => {
            args.push("-hwaccel".into());
            args.push("qsv".into());
            args.push("-qsv_device".into());
            args.push(qsv_device(ctx));
            args.push("-hwaccel_output_format".into());
            args.push("qsv".into());
        }
        AccelMode::Vaapi => {
            args.push("-hwaccel".into());
            args.push("vaapi".into());
            args.push("-hwaccel_device".into());
            args.push(format!("/dev/dri/card{}", ctx.device_index));
            args.push("-hwaccel_output_format".into());
            args.push("vaapi".into());
        }
        AccelMode::D3d11va | AccelMode::D3d12va => {
            args.push("-hwaccel".into());
            args.push(mode.ffmpeg_name().into());
            args.push("-hwaccel_device".into());
            args.push(ctx.device_index.to_string());
            args.push("-hwaccel_output_format".into());
            args.push(if mode == AccelMode::D3d11va { "d3d11" } else { "d3d12" }.into());
        }
        AccelMode::Vulkan => {
            args.push("-init_hw_device".into());
            args.push(format!("vulkan=vk:{}", ctx.device_index));
            args.push("-hwaccel".into());
            args.push("vulkan".into());
            args.push("-hwaccel_output_format".into());
            args.push("vulkan".into());
        }
        AccelMode::None => {
            if ctx.raw_source {
                push_raw_source_args(&mut args, video, RAW_LOOPS_DECODE);
            }
        }
    }

    args.push("-i".into());
    args.push(source.into());

    if mode == AccelMode::None && ctx.speedhq {
        args.push("-vcodec".into());
        args.push("speedhq".into());
        args.push("-y".into());
        args.push("-an".into());
    }

    args.push("-f".into());
    args.push("null".into());
    args.push("-".into());
    args
}

/// Arguments for an encode probe writing `out<N>.mp4`.
///
/// Target codec comes from filename tokens (default h264), target bitrate
/// from the fixed token table; a filename without a bitrate token fails
/// closed rather than guessing a baseline.
pub fn build_encode_args(
    mode: AccelMode,
    video: &VideoDescriptor,
    source: &str,
    output_index: usize,
    ctx: &CommandContext,
) -> Result<Vec<String>, CannotBuild> {
    let codec = encode_codec(source);
    let bitrate = extract_bitrate(source).ok_or(CannotBuild::NoBitrateToken)?;
    let bitrate = format!("{bitrate}M");
    let output = format!("out{output_index}.mp4");

    let mut args: Vec<String> = vec!["-y".into(), "-hide_banner".into()];

    match mode {
        AccelMode::Cuda | AccelMode::Vdpau => {
            args.push("-hwaccel_device".into());
            args.push(ctx.device_index.to_string());
            args.push("-i".into());
            args.push(source.into());
            args.push("-c:v".into());
            args.push(format!("{codec}_nvenc"));
        }
        AccelMode::Qsv => {
            args.push("-qsv_device".into());
            args.push(qsv_device(ctx));
            args.push("-i".into());
            args.push(source.into());
            args.push("-c:v".into());
            args.push(format!("{codec}_qsv"));
        }
        AccelMode::Vaapi => {
            args.push("-vaapi_device".into());
            args.push(format!("/dev/dri/renderD{}", 128 + ctx.device_index));
            args.push("-i".into());
            args.push(source.into());
            args.push("-c:v".into());
            args.push(format!("{codec}_vaapi"));
            args.push("-vf".into());
            args.push("format=nv12,hwupload".into());
        }
        // Remaining backends have no encoder entry point; probe in software.
        AccelMode::None | AccelMode::Vulkan | AccelMode::D3d11va | AccelMode::D3d12va => {
            if ctx.raw_source {
                push_raw_source_args(&mut args, video, RAW_LOOPS_ENCODE);
            }
            args.push("-i".into());
            args.push(source.into());
            args.push("-c:v".into());
            args.push(codec.into());
        }
    }

    args.push("-b:v".into());
    args.push(bitrate);
    args.push("-t".into());
    args.push(ENCODE_PROBE_SECS.into());
    args.push(output);
    Ok(args)
}

/// QSV addresses the device as an ordinal on Windows and a DRI node on Linux.
fn qsv_device(ctx: &CommandContext) -> String {
    match ctx.os {
        Os::Linux => format!("/dev/dri/card{}", ctx.device_index),
        Os::Windows => ctx.device_index.to_string(),
    }
}

fn encode_codec(source: &str) -> &'static str {
    let lower = source.to_ascii_lowercase();
    if lower.contains("h265") || lower.contains("hevc") || lower.contains("x265") {
        "hevc"
    } else {
        "h264"
    }
}

fn extract_bitrate(source: &str) -> Option<u32> {
    let lower = source.to_ascii_lowercase();
    BITRATE_TOKENS
        .iter()
        .find(|(token, _)| lower.contains(token))
        .map(|&(_, mbps)| mbps)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(os: Os) -> CommandContext {
        CommandContext {
            os,
            device_index: 0,
            raw_source: false,
            speedhq: false,
        }
    }

    fn video(name: &str) -> VideoDescriptor {
        VideoDescriptor::from_filename(name)
    }

    #[test]
    fn test_decode_cuda_template() {
        let name = "clip_h264_420_8bit_hd.mp4";
        let args = build_decode_args(AccelMode::Cuda, &video(name), name, &ctx(Os::Linux));
        assert_eq!(
            args,
            [
                "-hide_banner",
                "-hwaccel",
                "cuda",
                "-hwaccel_device",
                "0",
                "-hwaccel_output_format",
                "cuda",
                "-i",
                name,
                "-f",
                "null",
                "-"
            ]
        );
    }

    #[test]
    fn test_decode_qsv_device_differs_by_os() {
        let name = "clip_h265_420_10bit_uhd.mp4";
        let linux = build_decode_args(AccelMode::Qsv, &video(name), name, &ctx(Os::Linux));
        assert!(linux.contains(&"/dev/dri/card0".to_string()));
        let windows = build_decode_args(AccelMode::Qsv, &video(name), name, &ctx(Os::Windows));
        assert!(windows.contains(&"0".to_string()));
        assert!(!windows.iter().any(|a| a.starts_with("/dev/dri")));
    }

    #[test]
    fn test_decode_vulkan_init_string() {
        let name = "clip_h264_420_8bit_hd.mp4";
        let mut c = ctx(Os::Linux);
        c.device_index = 1;
        let args = build_decode_args(AccelMode::Vulkan, &video(name), name, &c);
        assert_eq!(args[1], "-init_hw_device");
        assert_eq!(args[2], "vulkan=vk:1");
    }

    #[test]
    fn test_decode_d3d_output_formats() {
        let name = "clip_h264_420_8bit_hd.mp4";
        let args = build_decode_args(AccelMode::D3d11va, &video(name), name, &ctx(Os::Windows));
        assert!(args.contains(&"d3d11".to_string()));
        let args = build_decode_args(AccelMode::D3d12va, &video(name), name, &ctx(Os::Windows));
        assert!(args.contains(&"d3d12".to_string()));
    }

    #[test]
    fn test_decode_raw_source_only_applies_to_software_path() {
        let name = "raw_h264_422_10bit_uhd_20mbps.yuv";
        let mut c = ctx(Os::Linux);
        c.raw_source = true;
        let args = build_decode_args(AccelMode::None, &video(name), name, &c);
        let joined = args.join(" ");
        assert!(joined.contains("-stream_loop 990"));
        assert!(joined.contains("-pix_fmt yuv422p10le"));
        assert!(joined.contains("-s 3840x2160"));

        let args = build_decode_args(AccelMode::Cuda, &video(name), name, &c);
        assert!(!args.join(" ").contains("-stream_loop"));
    }

    #[test]
    fn test_decode_speedhq_override() {
        let name = "clip_hd.mp4";
        let mut c = ctx(Os::Linux);
        c.speedhq = true;
        let args = build_decode_args(AccelMode::None, &video(name), name, &c);
        let joined = args.join(" ");
        assert!(joined.contains("-vcodec speedhq -y -an"));
        assert!(joined.ends_with("-f null -"));
    }

    #[test]
    fn test_encode_requires_bitrate_token() {
        let name = "clip_h264_420_8bit_hd.mp4";
        let err = build_encode_args(AccelMode::None, &video(name), name, 0, &ctx(Os::Linux));
        assert_eq!(err, Err(CannotBuild::NoBitrateToken));
    }

    #[test]
    fn test_encode_software_template() {
        let name = "clip_h264_420_8bit_hd_15mbps.mp4";
        let args =
            build_encode_args(AccelMode::None, &video(name), name, 2, &ctx(Os::Linux)).unwrap();
        assert_eq!(
            args,
            [
                "-y",
                "-hide_banner",
                "-i",
                name,
                "-c:v",
                "h264",
                "-b:v",
                "15M",
                "-t",
                "20",
                "out2.mp4"
            ]
        );
    }

    #[test]
    fn test_encode_codec_from_filename() {
        let name = "clip_h265_420_10bit_uhd_30mbps.mp4";
        let args =
            build_encode_args(AccelMode::Cuda, &video(name), name, 0, &ctx(Os::Linux)).unwrap();
        assert!(args.contains(&"hevc_nvenc".to_string()));
        assert!(args.contains(&"30M".to_string()));
    }

    #[test]
    fn test_encode_vaapi_render_node() {
        let name = "clip_h264_420_8bit_hd_10mbps.mp4";
        let mut c = ctx(Os::Linux);
        c.device_index = 1;
        let args = build_encode_args(AccelMode::Vaapi, &video(name), name, 0, &c).unwrap();
        assert!(args.contains(&"/dev/dri/renderD129".to_string()));
        assert!(args.contains(&"format=nv12,hwupload".to_string()));
        assert!(args.contains(&"h264_vaapi".to_string()));
    }

    #[test]
    fn test_command_construction_is_pure() {
        let name = "clip_h265_420_10bit_uhd_20mbps.mp4";
        let v = video(name);
        let c = ctx(Os::Linux);
        let a = build_decode_args(AccelMode::Qsv, &v, name, &c);
        let b = build_decode_args(AccelMode::Qsv, &v, name, &c);
        assert_eq!(a, b);
        let a = build_encode_args(AccelMode::Qsv, &v, name, 1, &c).unwrap();
        let b = build_encode_args(AccelMode::Qsv, &v, name, 1, &c).unwrap();
        assert_eq!(a, b);
    }
}
