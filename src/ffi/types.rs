//! Core FFmpeg type definitions
//!
//! All FFmpeg structs are opaque (zero-sized) to avoid version-specific
//! layout dependencies. Field access goes through the stable-prefix mirrors
//! and the versioned offset tables in [`super::offsets`].

use std::marker::PhantomData;
use std::os::raw::c_int;

use crate::rational::Rational;

// ============================================================================
// Opaque FFmpeg Types
// ============================================================================

macro_rules! opaque {
    ($(#[$doc:meta] $name:ident),+ $(,)?) => {
        $(
            #[$doc]
            #[repr(C)]
            pub struct $name {
                _opaque: [u8; 0],
                _marker: PhantomData<(*mut u8, std::marker::PhantomPinned)>,
            }
        )+
    };
}

opaque! {
    /// Codec implementation descriptor
    AVCodec,
    /// Encoder/decoder instance
    AVCodecContext,
    /// Stream codec parameters
    AVCodecParameters,
    /// Uncompressed video/audio data
    AVFrame,
    /// Compressed data
    AVPacket,
    /// Reference-counted buffer
    AVBufferRef,
    /// Key-value options
    AVDictionary,
    /// Container context (demuxing or muxing)
    AVFormatContext,
    /// Stream inside a container
    AVStream,
    /// Program (MPEG-TS and similar)
    AVProgram,
    /// Demuxer descriptor
    AVInputFormat,
    /// Muxer descriptor
    AVOutputFormat,
    /// Byte I/O context
    AVIOContext,
    /// Software scaler context
    SwsContext,
    /// Software resampler context
    SwrContext,
    /// Filter descriptor
    AVFilter,
    /// Filter graph
    AVFilterGraph,
    /// Filter instance inside a graph
    AVFilterContext,
    /// Bitstream filter instance
    AVBSFContext,
    /// Bitstream filter descriptor
    AVBitStreamFilter,
}

/// Mirror of `AVFilterInOut`, the open-chain descriptor returned by the graph
/// parser. Its layout has been stable across the supported window.
#[repr(C)]
pub struct AVFilterInOut {
    pub name: *mut std::os::raw::c_char,
    pub filter_ctx: *mut AVFilterContext,
    pub pad_idx: c_int,
    pub next: *mut AVFilterInOut,
}

/// Mirror of `AVDictionaryEntry`.
#[repr(C)]
pub struct AVDictionaryEntry {
    pub key: *mut std::os::raw::c_char,
    pub value: *mut std::os::raw::c_char,
}

// ============================================================================
// Media Types
// ============================================================================

/// Kind of media carried by a stream or frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    Other(i32),
}

impl MediaKind {
    pub fn from_raw(value: c_int) -> Self {
        match value {
            0 => Self::Video,
            1 => Self::Audio,
            2 => Self::Data,
            3 => Self::Subtitle,
            4 => Self::Attachment,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> c_int {
        match self {
            Self::Video => 0,
            Self::Audio => 1,
            Self::Data => 2,
            Self::Subtitle => 3,
            Self::Attachment => 4,
            Self::Other(v) => v,
        }
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
            Self::Data => write!(f, "data"),
            Self::Attachment => write!(f, "attachment"),
            Self::Other(v) => write!(f, "media({v})"),
        }
    }
}

// ============================================================================
// Pixel Formats
// ============================================================================

/// Video pixel formats. Unknown numeric values round-trip via `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    None,
    Yuv420p,
    Yuyv422,
    Rgb24,
    Bgr24,
    Yuv422p,
    Yuv444p,
    Gray8,
    Nv12,
    Nv21,
    Argb,
    Rgba,
    Abgr,
    Bgra,
    Yuva420p,
    Vaapi,
    Yuv420p10le,
    Cuda,
    Videotoolbox,
    Other(i32),
}

impl PixelFormat {
    pub fn from_raw(value: c_int) -> Self {
        match value {
            -1 => Self::None,
            0 => Self::Yuv420p,
            1 => Self::Yuyv422,
            2 => Self::Rgb24,
            3 => Self::Bgr24,
            4 => Self::Yuv422p,
            5 => Self::Yuv444p,
            8 => Self::Gray8,
            23 => Self::Nv12,
            24 => Self::Nv21,
            25 => Self::Argb,
            26 => Self::Rgba,
            27 => Self::Abgr,
            28 => Self::Bgra,
            33 => Self::Yuva420p,
            53 => Self::Vaapi,
            64 => Self::Yuv420p10le,
            119 => Self::Cuda,
            162 => Self::Videotoolbox,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> c_int {
        match self {
            Self::None => -1,
            Self::Yuv420p => 0,
            Self::Yuyv422 => 1,
            Self::Rgb24 => 2,
            Self::Bgr24 => 3,
            Self::Yuv422p => 4,
            Self::Yuv444p => 5,
            Self::Gray8 => 8,
            Self::Nv12 => 23,
            Self::Nv21 => 24,
            Self::Argb => 25,
            Self::Rgba => 26,
            Self::Abgr => 27,
            Self::Bgra => 28,
            Self::Yuva420p => 33,
            Self::Vaapi => 53,
            Self::Yuv420p10le => 64,
            Self::Cuda => 119,
            Self::Videotoolbox => 162,
            Self::Other(v) => v,
        }
    }

    /// Whether this is a GPU-resident format.
    pub fn is_hardware(self) -> bool {
        matches!(self, Self::Vaapi | Self::Cuda | Self::Videotoolbox)
    }
}

// ============================================================================
// Sample Formats
// ============================================================================

/// Audio sample formats. The `P` suffix marks planar layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    None,
    U8,
    S16,
    S32,
    Flt,
    Dbl,
    U8p,
    S16p,
    S32p,
    Fltp,
    Dblp,
    S64,
    S64p,
    Other(i32),
}

impl SampleFormat {
    pub fn from_raw(value: c_int) -> Self {
        match value {
            -1 => Self::None,
            0 => Self::U8,
            1 => Self::S16,
            2 => Self::S32,
            3 => Self::Flt,
            4 => Self::Dbl,
            5 => Self::U8p,
            6 => Self::S16p,
            7 => Self::S32p,
            8 => Self::Fltp,
            9 => Self::Dblp,
            10 => Self::S64,
            11 => Self::S64p,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> c_int {
        match self {
            Self::None => -1,
            Self::U8 => 0,
            Self::S16 => 1,
            Self::S32 => 2,
            Self::Flt => 3,
            Self::Dbl => 4,
            Self::U8p => 5,
            Self::S16p => 6,
            Self::S32p => 7,
            Self::Fltp => 8,
            Self::Dblp => 9,
            Self::S64 => 10,
            Self::S64p => 11,
            Self::Other(v) => v,
        }
    }

    pub fn is_planar(self) -> bool {
        matches!(
            self,
            Self::U8p | Self::S16p | Self::S32p | Self::Fltp | Self::Dblp | Self::S64p
        )
    }
}

// ============================================================================
// Codec IDs
// ============================================================================

/// Codec identifiers this crate names explicitly; everything else round-trips
/// through `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecId {
    None,
    Mpeg4,
    Mjpeg,
    H264,
    Png,
    Vp8,
    Vp9,
    Hevc,
    Av1,
    PcmS16le,
    Mp3,
    Aac,
    Ac3,
    Vorbis,
    Flac,
    Opus,
    Other(i32),
}

impl CodecId {
    pub fn from_raw(value: c_int) -> Self {
        match value {
            0 => Self::None,
            7 => Self::Mjpeg,
            12 => Self::Mpeg4,
            27 => Self::H264,
            61 => Self::Png,
            139 => Self::Vp8,
            167 => Self::Vp9,
            173 => Self::Hevc,
            226 => Self::Av1,
            65536 => Self::PcmS16le,
            86017 => Self::Mp3,
            86018 => Self::Aac,
            86019 => Self::Ac3,
            86021 => Self::Vorbis,
            86028 => Self::Flac,
            86076 => Self::Opus,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> c_int {
        match self {
            Self::None => 0,
            Self::Mjpeg => 7,
            Self::Mpeg4 => 12,
            Self::H264 => 27,
            Self::Png => 61,
            Self::Vp8 => 139,
            Self::Vp9 => 167,
            Self::Hevc => 173,
            Self::Av1 => 226,
            Self::PcmS16le => 65536,
            Self::Mp3 => 86017,
            Self::Aac => 86018,
            Self::Ac3 => 86019,
            Self::Vorbis => 86021,
            Self::Flac => 86028,
            Self::Opus => 86076,
            Self::Other(v) => v,
        }
    }
}

// ============================================================================
// Hardware Device Types
// ============================================================================

/// Hardware acceleration device types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HwDeviceType {
    None,
    Vdpau,
    Cuda,
    Vaapi,
    Dxva2,
    Qsv,
    Videotoolbox,
    D3d11va,
    Drm,
    Opencl,
    Mediacodec,
    Vulkan,
    Other(i32),
}

impl HwDeviceType {
    pub fn from_raw(value: c_int) -> Self {
        match value {
            0 => Self::None,
            1 => Self::Vdpau,
            2 => Self::Cuda,
            3 => Self::Vaapi,
            4 => Self::Dxva2,
            5 => Self::Qsv,
            6 => Self::Videotoolbox,
            7 => Self::D3d11va,
            8 => Self::Drm,
            9 => Self::Opencl,
            10 => Self::Mediacodec,
            11 => Self::Vulkan,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> c_int {
        match self {
            Self::None => 0,
            Self::Vdpau => 1,
            Self::Cuda => 2,
            Self::Vaapi => 3,
            Self::Dxva2 => 4,
            Self::Qsv => 5,
            Self::Videotoolbox => 6,
            Self::D3d11va => 7,
            Self::Drm => 8,
            Self::Opencl => 9,
            Self::Mediacodec => 10,
            Self::Vulkan => 11,
            Self::Other(v) => v,
        }
    }

    /// The GPU pixel format frames decoded on this device carry.
    pub fn pixel_format(self) -> PixelFormat {
        match self {
            Self::Videotoolbox => PixelFormat::Videotoolbox,
            Self::Cuda => PixelFormat::Cuda,
            Self::Vaapi => PixelFormat::Vaapi,
            _ => PixelFormat::None,
        }
    }
}

// ============================================================================
// Color Metadata
// ============================================================================

/// Color range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorRange {
    Unspecified,
    /// Limited range (16-235 for Y, 16-240 for UV)
    Mpeg,
    /// Full range (0-255)
    Jpeg,
    Other(i32),
}

impl ColorRange {
    pub fn from_raw(value: c_int) -> Self {
        match value {
            0 => Self::Unspecified,
            1 => Self::Mpeg,
            2 => Self::Jpeg,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> c_int {
        match self {
            Self::Unspecified => 0,
            Self::Mpeg => 1,
            Self::Jpeg => 2,
            Self::Other(v) => v,
        }
    }
}

/// Color space (matrix coefficients)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSpace {
    Rgb,
    Bt709,
    Unspecified,
    Fcc,
    Bt470bg,
    Smpte170m,
    Smpte240m,
    Ycgco,
    Bt2020Ncl,
    Bt2020Cl,
    Other(i32),
}

impl ColorSpace {
    pub fn from_raw(value: c_int) -> Self {
        match value {
            0 => Self::Rgb,
            1 => Self::Bt709,
            2 => Self::Unspecified,
            4 => Self::Fcc,
            5 => Self::Bt470bg,
            6 => Self::Smpte170m,
            7 => Self::Smpte240m,
            8 => Self::Ycgco,
            9 => Self::Bt2020Ncl,
            10 => Self::Bt2020Cl,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> c_int {
        match self {
            Self::Rgb => 0,
            Self::Bt709 => 1,
            Self::Unspecified => 2,
            Self::Fcc => 4,
            Self::Bt470bg => 5,
            Self::Smpte170m => 6,
            Self::Smpte240m => 7,
            Self::Ycgco => 8,
            Self::Bt2020Ncl => 9,
            Self::Bt2020Cl => 10,
            Self::Other(v) => v,
        }
    }
}

/// Color primaries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorPrimaries {
    Bt709,
    Unspecified,
    Bt470m,
    Bt470bg,
    Smpte170m,
    Smpte240m,
    Film,
    Bt2020,
    Other(i32),
}

impl ColorPrimaries {
    pub fn from_raw(value: c_int) -> Self {
        match value {
            1 => Self::Bt709,
            2 => Self::Unspecified,
            4 => Self::Bt470m,
            5 => Self::Bt470bg,
            6 => Self::Smpte170m,
            7 => Self::Smpte240m,
            8 => Self::Film,
            9 => Self::Bt2020,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> c_int {
        match self {
            Self::Bt709 => 1,
            Self::Unspecified => 2,
            Self::Bt470m => 4,
            Self::Bt470bg => 5,
            Self::Smpte170m => 6,
            Self::Smpte240m => 7,
            Self::Film => 8,
            Self::Bt2020 => 9,
            Self::Other(v) => v,
        }
    }
}

/// Color transfer characteristics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorTransfer {
    Bt709,
    Unspecified,
    Gamma22,
    Gamma28,
    Smpte170m,
    Smpte240m,
    Linear,
    /// sRGB (IEC 61966-2-1)
    Srgb,
    Bt2020Bit10,
    Bt2020Bit12,
    /// PQ / HDR10
    Smpte2084,
    /// HLG
    AribStdB67,
    Other(i32),
}

impl ColorTransfer {
    pub fn from_raw(value: c_int) -> Self {
        match value {
            1 => Self::Bt709,
            2 => Self::Unspecified,
            4 => Self::Gamma22,
            5 => Self::Gamma28,
            6 => Self::Smpte170m,
            7 => Self::Smpte240m,
            8 => Self::Linear,
            13 => Self::Srgb,
            14 => Self::Bt2020Bit10,
            15 => Self::Bt2020Bit12,
            16 => Self::Smpte2084,
            18 => Self::AribStdB67,
            other => Self::Other(other),
        }
    }

    pub fn as_raw(self) -> c_int {
        match self {
            Self::Bt709 => 1,
            Self::Unspecified => 2,
            Self::Gamma22 => 4,
            Self::Gamma28 => 5,
            Self::Smpte170m => 6,
            Self::Smpte240m => 7,
            Self::Linear => 8,
            Self::Srgb => 13,
            Self::Bt2020Bit10 => 14,
            Self::Bt2020Bit12 => 15,
            Self::Smpte2084 => 16,
            Self::AribStdB67 => 18,
            Self::Other(v) => v,
        }
    }
}

// ============================================================================
// Channel Layout (FFmpeg 5.1+ shape)
// ============================================================================

/// Mirror of `AVChannelLayout` (stable since its introduction in avutil 57).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct AVChannelLayout {
    pub order: c_int,
    pub nb_channels: c_int,
    /// Union of the mask and a pointer-sized custom map; the mask arm.
    pub mask: u64,
    pub opaque: *mut std::ffi::c_void,
}

/// Native channel ordering (mask is meaningful).
pub const AV_CHANNEL_ORDER_NATIVE: c_int = 1;

impl AVChannelLayout {
    pub fn native(nb_channels: c_int, mask: u64) -> Self {
        Self {
            order: AV_CHANNEL_ORDER_NATIVE,
            nb_channels,
            mask,
            opaque: std::ptr::null_mut(),
        }
    }
}

/// Default native mask for a channel count (mono, stereo and the common
/// surround sets).
pub fn default_channel_mask(channels: u32) -> u64 {
    match channels {
        1 => 0x4,   // FC
        2 => 0x3,   // FL|FR
        3 => 0x7,   // FL|FR|FC
        4 => 0x33,  // FL|FR|BL|BR
        5 => 0x37,  // FL|FR|FC|BL|BR
        6 => 0x3F,  // 5.1
        8 => 0x63F, // 7.1
        n => (1u64 << n) - 1,
    }
}

// ============================================================================
// Constants
// ============================================================================

/// No timestamp value
pub const AV_NOPTS_VALUE: i64 = 0x8000000000000000u64 as i64;

/// Global time base (microseconds per unit)
pub const AV_TIME_BASE: i64 = 1_000_000;

/// Global time base as a rational
pub const AV_TIME_BASE_Q: Rational = Rational::new(1, 1_000_000);

/// Packet flags
pub mod pkt_flag {
    use std::os::raw::c_int;

    pub const KEY: c_int = 0x0001;
    pub const CORRUPT: c_int = 0x0002;
    pub const DISCARD: c_int = 0x0004;
}

/// Codec context flags
pub mod codec_flag {
    use std::os::raw::c_int;

    /// Use internal 2-pass rate control in first pass mode
    pub const PASS1: c_int = 1 << 9;

    /// Use internal 2-pass rate control in second pass mode
    pub const PASS2: c_int = 1 << 10;

    /// Place global headers in extradata instead of every keyframe
    pub const GLOBAL_HEADER: c_int = 1 << 22;
}

/// Frame flags (FFmpeg 6+ keyframe signaling)
pub mod frame_flag {
    use std::os::raw::c_int;

    pub const CORRUPT: c_int = 1 << 0;
    pub const KEY: c_int = 1 << 1;
    pub const DISCARD: c_int = 1 << 2;
}

/// Seek flags
pub mod seek_flag {
    use std::os::raw::c_int;

    pub const BACKWARD: c_int = 1;
    pub const BYTE: c_int = 2;
    pub const ANY: c_int = 4;
    pub const FRAME: c_int = 8;
}

/// Muxer/demuxer descriptor flags
pub mod fmt_flag {
    use std::os::raw::c_int;

    /// The muxer opens no file by itself
    pub const NOFILE: c_int = 0x0001;
    /// The container requires out-of-band codec parameters
    pub const GLOBAL_HEADER: c_int = 0x0040;
}

/// `avio_open2` flags
pub mod avio_flag {
    use std::os::raw::c_int;

    pub const READ: c_int = 1;
    pub const WRITE: c_int = 2;
}

/// Custom I/O seek protocol
pub mod seek_whence {
    use std::os::raw::c_int;

    pub const SET: c_int = 0;
    pub const CUR: c_int = 1;
    pub const END: c_int = 2;
    /// Pseudo-whence: report total stream size
    pub const AVSEEK_SIZE: c_int = 0x10000;
}

/// Dictionary flags
pub mod dict_flag {
    use std::os::raw::c_int;

    pub const MATCH_CASE: c_int = 1;
    pub const IGNORE_SUFFIX: c_int = 2;
    pub const DONT_OVERWRITE: c_int = 16;
    pub const APPEND: c_int = 32;
    pub const MULTIKEY: c_int = 64;
}

/// Buffer source flags
pub mod buffersrc_flag {
    use std::os::raw::c_int;

    /// Keep a reference to the pushed frame
    pub const KEEP_REF: c_int = 8;
}

/// FFmpeg log levels
pub mod log_level {
    use std::os::raw::c_int;

    pub const PANIC: c_int = 0;
    pub const FATAL: c_int = 8;
    pub const ERROR: c_int = 16;
    pub const WARNING: c_int = 24;
    pub const INFO: c_int = 32;
    pub const VERBOSE: c_int = 40;
    pub const DEBUG: c_int = 48;
    pub const TRACE: c_int = 56;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_round_trip() {
        for raw in [-1, 0, 2, 23, 26, 28, 999] {
            assert_eq!(PixelFormat::from_raw(raw).as_raw(), raw);
        }
        for raw in [-1, 0, 1, 8, 11, 77] {
            assert_eq!(SampleFormat::from_raw(raw).as_raw(), raw);
        }
        for raw in [0, 27, 86018, 123456] {
            assert_eq!(CodecId::from_raw(raw).as_raw(), raw);
        }
    }

    #[test]
    fn test_unknown_values_are_opaque_not_errors() {
        assert_eq!(PixelFormat::from_raw(5000), PixelFormat::Other(5000));
        assert_eq!(MediaKind::from_raw(77), MediaKind::Other(77));
    }

    #[test]
    fn test_default_channel_masks() {
        assert_eq!(default_channel_mask(1), 0x4);
        assert_eq!(default_channel_mask(2), 0x3);
        assert_eq!(default_channel_mask(6), 0x3F);
    }

    #[test]
    fn test_planar_detection() {
        assert!(SampleFormat::Fltp.is_planar());
        assert!(!SampleFormat::S16.is_planar());
    }
}
