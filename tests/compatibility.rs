// Resolver properties across the whole vendor/mode/source matrix.

use ffbench::engine::{AccelMode, GpuVendor, Os, VideoDescriptor, accel};

const ALL_MODES: &[AccelMode] = &[
    AccelMode::None,
    AccelMode::Cuda,
    AccelMode::Qsv,
    AccelMode::Vaapi,
    AccelMode::Vdpau,
    AccelMode::Vulkan,
    AccelMode::D3d11va,
    AccelMode::D3d12va,
];

const SOURCE_NAMES: &[&str] = &[
    "clip_h264_420_8bit_hd.mp4",
    "clip_h264_422_10bit_uhd.mp4",
    "clip_h264_444_8bit_hd.mp4",
    "clip_h265_420_10bit_uhd.mp4",
    "clip_h265_444_10bit_hd.mp4",
    "raw_unclassified.bin",
];

#[test]
fn test_known_vendors_never_error() {
    for vendor in [GpuVendor::Nvidia, GpuVendor::Intel] {
        for &mode in ALL_MODES {
            for name in SOURCE_NAMES {
                let video = VideoDescriptor::from_filename(name);
                accel::resolve(vendor, mode, &video)
                    .unwrap_or_else(|e| panic!("{vendor:?}/{mode:?}/{name}: {e}"));
            }
        }
    }
}

#[test]
fn test_disallowed_modes_degrade_not_error() {
    let video = VideoDescriptor::from_filename("clip_h265_420_10bit_uhd.mp4");
    // CUDA/VDPAU are NVIDIA-only; QSV/VAAPI are Intel-only.
    for (vendor, mode) in [
        (GpuVendor::Intel, AccelMode::Cuda),
        (GpuVendor::Intel, AccelMode::Vdpau),
        (GpuVendor::Nvidia, AccelMode::Qsv),
        (GpuVendor::Nvidia, AccelMode::Vaapi),
    ] {
        let c = accel::resolve(vendor, mode, &video).unwrap();
        assert!(c.skip, "{vendor:?}/{mode:?}");
        assert_eq!(c.effective_mode, AccelMode::None);
    }
}

#[test]
fn test_h264_yuv444_blocked_everywhere() {
    let video = VideoDescriptor::from_filename("clip_h264_444_8bit_hd.mp4");
    for vendor in [GpuVendor::Nvidia, GpuVendor::Intel] {
        for &mode in ALL_MODES {
            let c = accel::resolve(vendor, mode, &video).unwrap();
            assert!(c.skip, "{vendor:?}/{mode:?}");
        }
    }
}

#[test]
fn test_software_mode_accepted_for_any_classifiable_source() {
    for vendor in [GpuVendor::Nvidia, GpuVendor::Intel] {
        for name in ["clip_h265_444_10bit_hd.mp4", "raw_unclassified.bin"] {
            let video = VideoDescriptor::from_filename(name);
            let c = accel::resolve(vendor, AccelMode::None, &video).unwrap();
            assert!(!c.skip, "{vendor:?}/{name}");
        }
    }
}

#[test]
fn test_unknown_vendor_is_the_only_fatal_input() {
    let video = VideoDescriptor::from_filename("clip_h264_420_8bit_hd.mp4");
    for &mode in ALL_MODES {
        assert!(accel::resolve(GpuVendor::Unknown, mode, &video).is_err());
    }
    for os in [Os::Linux, Os::Windows] {
        assert!(accel::candidate_modes(GpuVendor::Unknown, os, false).is_err());
        assert!(accel::candidate_modes(GpuVendor::Unknown, os, true).is_err());
    }
}

#[test]
fn test_mode_axis_is_deterministic() {
    for vendor in [GpuVendor::Nvidia, GpuVendor::Intel] {
        for os in [Os::Linux, Os::Windows] {
            let a = accel::candidate_modes(vendor, os, false).unwrap();
            let b = accel::candidate_modes(vendor, os, false).unwrap();
            assert_eq!(a, b);
        }
    }
}
