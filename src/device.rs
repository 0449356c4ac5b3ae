//! Capture devices
//!
//! Platform-default capture demuxers, device URL composition, and source
//! enumeration (through the shim). Opening a device returns the ordinary
//! [`Decoder`], so all frame reading works the same as for files.

use std::ffi::CString;

use crate::decoder::Decoder;
use crate::error::{Error, Result};
use crate::ffi::shim;
use crate::init::Ffmpeg;
use crate::options::DecoderOptions;

/// What kind of capture source to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureKind {
    Camera,
    Microphone,
    Screen,
}

/// The platform's default demuxer short name for a capture kind.
pub fn default_demuxer(kind: CaptureKind) -> &'static str {
    #[cfg(target_os = "linux")]
    {
        match kind {
            CaptureKind::Camera => "v4l2",
            CaptureKind::Microphone => "alsa",
            CaptureKind::Screen => "x11grab",
        }
    }
    #[cfg(target_os = "macos")]
    {
        match kind {
            CaptureKind::Camera | CaptureKind::Microphone | CaptureKind::Screen => "avfoundation",
        }
    }
    #[cfg(target_os = "windows")]
    {
        match kind {
            CaptureKind::Camera | CaptureKind::Microphone => "dshow",
            CaptureKind::Screen => "gdigrab",
        }
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = kind;
        "lavfi"
    }
}

/// Compose the device URL the platform demuxer expects.
pub fn device_url(kind: CaptureKind, device: &str) -> String {
    #[cfg(target_os = "linux")]
    {
        let _ = kind;
        // V4L2/ALSA take the device node or name directly.
        device.to_string()
    }
    #[cfg(target_os = "macos")]
    {
        // AVFoundation addresses devices as "video-index:audio-index".
        match kind {
            CaptureKind::Camera | CaptureKind::Screen => format!("{device}:none"),
            CaptureKind::Microphone => format!("none:{device}"),
        }
    }
    #[cfg(target_os = "windows")]
    {
        match kind {
            CaptureKind::Camera | CaptureKind::Screen => format!("video={device}"),
            CaptureKind::Microphone => format!("audio={device}"),
        }
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = kind;
        device.to_string()
    }
}

/// `(name, description)` pairs for the sources a capture demuxer can open.
/// Requires the native shim.
pub fn list_devices(kind: CaptureKind) -> Result<Vec<(String, String)>> {
    let av = Ffmpeg::get()?;
    av.register_devices();

    let list_addr = av
        .avdevice
        .avdevice_list_input_sources_addr
        .ok_or(Error::SymbolNotFound {
            library: "avdevice",
            symbol: "avdevice_list_input_sources",
        })?;
    let free_addr = av
        .avdevice
        .avdevice_free_list_devices_addr
        .ok_or(Error::SymbolNotFound {
            library: "avdevice",
            symbol: "avdevice_free_list_devices",
        })?;

    let demuxer_name = default_demuxer(kind);
    let c_name = CString::new(demuxer_name).map_err(|_| Error::InvalidArgument("NUL in name"))?;
    let demuxer = unsafe { (av.avformat.av_find_input_format)(c_name.as_ptr()) };
    if demuxer.is_null() {
        return Err(Error::Ffmpeg {
            op: "av_find_input_format",
            code: crate::ffi::error::AVERROR_DEMUXER_NOT_FOUND,
            message: format!("capture demuxer '{demuxer_name}' unavailable"),
        });
    }

    shim::list_sources(list_addr, free_addr, demuxer.cast_mut().cast(), None)
}

/// Open a capture device as a [`Decoder`].
pub fn open_capture(
    kind: CaptureKind,
    device: &str,
    mut options: DecoderOptions,
) -> Result<Decoder> {
    let av = Ffmpeg::get()?;
    av.register_devices();
    if options.format.is_none() {
        options.format = Some(default_demuxer(kind).to_string());
    }
    let url = device_url(kind, device);
    Decoder::open(&url, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_defaults() {
        #[cfg(target_os = "linux")]
        {
            assert_eq!(default_demuxer(CaptureKind::Camera), "v4l2");
            assert_eq!(default_demuxer(CaptureKind::Microphone), "alsa");
            assert_eq!(default_demuxer(CaptureKind::Screen), "x11grab");
            assert_eq!(device_url(CaptureKind::Camera, "/dev/video0"), "/dev/video0");
        }
        #[cfg(target_os = "macos")]
        {
            assert_eq!(default_demuxer(CaptureKind::Camera), "avfoundation");
            assert_eq!(device_url(CaptureKind::Camera, "0"), "0:none");
            assert_eq!(device_url(CaptureKind::Microphone, "0"), "none:0");
        }
        #[cfg(target_os = "windows")]
        {
            assert_eq!(default_demuxer(CaptureKind::Camera), "dshow");
            assert_eq!(
                device_url(CaptureKind::Camera, "Integrated Camera"),
                "video=Integrated Camera"
            );
        }
    }

    #[test]
    fn test_list_devices_requires_shim() {
        if Ffmpeg::get().is_err() {
            return;
        }
        match list_devices(CaptureKind::Camera) {
            Ok(_) => assert!(shim::available()),
            Err(Error::ShimUnavailable(_)) => assert!(!shim::available()),
            // Capture demuxer may simply be missing from this build.
            Err(_) => {}
        }
    }
}
