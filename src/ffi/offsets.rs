//! Struct-field access across FFmpeg major versions
//!
//! FFmpeg only guarantees a stable prefix for some of its public structs;
//! everything past that prefix moves between major versions. This module
//! keeps one `#[repr(C)]` layout mirror per supported major and derives
//! byte-offset tables from them with `offset_of!`, so padding and alignment
//! are computed by the compiler rather than written by hand.
//!
//! When the native shim is present its `offsetof`-derived values (taken from
//! the locally installed headers) replace these tables wholesale; the
//! fallback tables target the final minor release of each major.

use std::ffi::c_void;
use std::mem::offset_of;
use std::os::raw::{c_char, c_int, c_uint};

use crate::rational::Rational;

use super::types::{AVBufferRef, AVChannelLayout, AVCodecParameters, AVDictionary};

// ============================================================================
// Stable prefixes
//
// These fields have kept their offsets across the whole FFmpeg 4..=7 window
// and are read directly through the mirrors below.
// ============================================================================

/// Leading fields of `AVFrame`.
#[repr(C)]
pub struct FramePrefix {
    pub data: [*mut u8; 8],
    pub linesize: [c_int; 8],
    pub extended_data: *mut *mut u8,
    pub width: c_int,
    pub height: c_int,
    pub nb_samples: c_int,
    pub format: c_int,
}

/// Leading fields of `AVPacket`.
#[repr(C)]
pub struct PacketPrefix {
    pub buf: *mut AVBufferRef,
    pub pts: i64,
    pub dts: i64,
    pub data: *mut u8,
    pub size: c_int,
    pub stream_index: c_int,
    pub flags: c_int,
    pub side_data: *mut c_void,
    pub side_data_elems: c_int,
    pub duration: i64,
    pub pos: i64,
}

/// Leading fields of `AVFormatContext`.
#[repr(C)]
pub struct FormatCtxPrefix {
    pub av_class: *const c_void,
    pub iformat: *const c_void,
    pub oformat: *const c_void,
    pub priv_data: *mut c_void,
    pub pb: *mut c_void,
    pub ctx_flags: c_int,
    pub nb_streams: c_uint,
    pub streams: *mut *mut c_void,
}

/// Leading fields of `AVOutputFormat`.
#[repr(C)]
pub struct OutputFormatPrefix {
    pub name: *const c_char,
    pub long_name: *const c_char,
    pub mime_type: *const c_char,
    pub extensions: *const c_char,
    pub audio_codec: c_int,
    pub video_codec: c_int,
    pub subtitle_codec: c_int,
    pub flags: c_int,
}

/// Leading fields of `AVInputFormat`.
#[repr(C)]
pub struct InputFormatPrefix {
    pub name: *const c_char,
    pub long_name: *const c_char,
}

/// Leading fields of `AVIOContext`.
#[repr(C)]
pub struct IoContextPrefix {
    pub av_class: *const c_void,
    pub buffer: *mut u8,
    pub buffer_size: c_int,
}

/// Leading fields of `AVProgram`.
#[repr(C)]
pub struct ProgramPrefix {
    pub id: c_int,
    pub flags: c_int,
    pub discard: c_int,
    pub stream_index: *mut c_uint,
    pub nb_stream_indexes: c_uint,
    pub metadata: *mut AVDictionary,
    pub program_num: c_int,
}

// ============================================================================
// Raw field access helpers
// ============================================================================

/// Read a field at a byte offset.
///
/// # Safety
/// `base` must point at the struct the offset was derived for.
#[inline]
pub unsafe fn read<T: Copy>(base: *const c_void, offset: usize) -> T {
    unsafe { (base as *const u8).add(offset).cast::<T>().read_unaligned() }
}

/// Write a field at a byte offset.
///
/// # Safety
/// `base` must point at the struct the offset was derived for.
#[inline]
pub unsafe fn write<T>(base: *mut c_void, offset: usize, value: T) {
    unsafe {
        (base as *mut u8)
            .add(offset)
            .cast::<T>()
            .write_unaligned(value)
    }
}

// ============================================================================
// Offset tables
// ============================================================================

/// Versioned `AVFrame` field offsets. `None` marks a field absent in the
/// running build.
#[derive(Debug, Clone, Copy)]
pub struct FrameOffsets {
    pub pts: usize,
    pub pkt_dts: usize,
    pub time_base: Option<usize>,
    pub pict_type: usize,
    pub sample_aspect_ratio: usize,
    pub sample_rate: usize,
    /// `ch_layout.order` on 5.1+; absent on legacy builds.
    pub ch_order: Option<usize>,
    /// `ch_layout.nb_channels` on 5.1+, legacy `channels` before.
    pub ch_nb: usize,
    /// `ch_layout.u.mask` on 5.1+, legacy `channel_layout` before.
    pub ch_mask: usize,
    pub buf0: usize,
    pub flags: usize,
    pub color_range: usize,
    pub color_primaries: usize,
    pub color_trc: usize,
    pub colorspace: usize,
    pub best_effort_timestamp: usize,
    pub duration: Option<usize>,
    pub key_frame: Option<usize>,
    pub hw_frames_ctx: usize,
}

/// Versioned `AVCodecParameters` field offsets.
#[derive(Debug, Clone, Copy)]
pub struct CodecParOffsets {
    pub codec_type: usize,
    pub codec_id: usize,
    pub codec_tag: usize,
    pub extradata: usize,
    pub extradata_size: usize,
    pub format: usize,
    pub bit_rate: usize,
    pub profile: usize,
    pub level: usize,
    pub width: usize,
    pub height: usize,
    pub sample_aspect_ratio: usize,
    pub color_range: usize,
    pub color_primaries: usize,
    pub color_trc: usize,
    pub color_space: usize,
    pub ch_order: Option<usize>,
    pub ch_nb: usize,
    pub ch_mask: usize,
    pub sample_rate: usize,
    pub block_align: usize,
    pub frame_size: usize,
}

/// Versioned `AVStream` field offsets.
#[derive(Debug, Clone, Copy)]
pub struct StreamOffsets {
    pub index: usize,
    pub id: usize,
    pub codecpar: usize,
    pub time_base: usize,
    pub start_time: usize,
    pub duration: usize,
    pub nb_frames: usize,
    pub disposition: usize,
    pub metadata: usize,
    pub avg_frame_rate: usize,
    pub r_frame_rate: usize,
}

/// Versioned `AVFormatContext` field offsets (past the stable prefix).
#[derive(Debug, Clone, Copy)]
pub struct FormatCtxOffsets {
    pub url: usize,
    pub start_time: usize,
    pub duration: usize,
    pub bit_rate: usize,
    pub flags: usize,
    pub nb_programs: usize,
    pub programs: usize,
    pub metadata: usize,
}

/// Versioned `AVBSFContext` field offsets.
#[derive(Debug, Clone, Copy)]
pub struct BsfOffsets {
    pub par_in: usize,
    pub par_out: usize,
    pub time_base_in: usize,
    pub time_base_out: usize,
}

/// Versioned `AVCodecContext` field offsets. Only the fields that have no
/// AVOption and no `AVCodecParameters` mirror; everything else is configured
/// through those safer channels.
#[derive(Debug, Clone, Copy)]
pub struct CodecCtxOffsets {
    pub time_base: usize,
    pub width: usize,
    pub height: usize,
    pub pix_fmt: usize,
}

/// The resolved tables for the running library set.
#[derive(Debug, Clone, Copy)]
pub struct Offsets {
    pub frame: FrameOffsets,
    pub par: CodecParOffsets,
    pub stream: StreamOffsets,
    pub fmt: FormatCtxOffsets,
    pub bsf: BsfOffsets,
    pub ctx: CodecCtxOffsets,
}

impl Offsets {
    /// Fallback tables for the loaded majors, used when the shim is absent.
    pub fn resolve(avutil_major: i32, avcodec_major: i32, avformat_major: i32) -> Self {
        Self {
            frame: FrameOffsets::for_major(avutil_major),
            par: CodecParOffsets::for_major(avcodec_major),
            stream: StreamOffsets::for_major(avformat_major),
            fmt: FormatCtxOffsets::for_major(avformat_major),
            bsf: BsfOffsets::for_major(avcodec_major),
            ctx: CodecCtxOffsets::for_major(avcodec_major),
        }
    }
}

// ============================================================================
// AVFrame mirrors
// ============================================================================

/// FFmpeg 4.x (avutil 56)
#[repr(C)]
#[allow(dead_code)]
struct Frame56 {
    data: [*mut u8; 8],
    linesize: [c_int; 8],
    extended_data: *mut *mut u8,
    width: c_int,
    height: c_int,
    nb_samples: c_int,
    format: c_int,
    key_frame: c_int,
    pict_type: c_int,
    sample_aspect_ratio: Rational,
    pts: i64,
    pkt_pts: i64,
    pkt_dts: i64,
    coded_picture_number: c_int,
    display_picture_number: c_int,
    quality: c_int,
    opaque: *mut c_void,
    error: [u64; 8],
    repeat_pict: c_int,
    interlaced_frame: c_int,
    top_field_first: c_int,
    palette_has_changed: c_int,
    reordered_opaque: i64,
    sample_rate: c_int,
    channel_layout: u64,
    buf: [*mut AVBufferRef; 8],
    extended_buf: *mut *mut AVBufferRef,
    nb_extended_buf: c_int,
    side_data: *mut c_void,
    nb_side_data: c_int,
    flags: c_int,
    color_range: c_int,
    color_primaries: c_int,
    color_trc: c_int,
    colorspace: c_int,
    chroma_location: c_int,
    best_effort_timestamp: i64,
    pkt_pos: i64,
    pkt_duration: i64,
    metadata: *mut AVDictionary,
    decode_error_flags: c_int,
    channels: c_int,
    pkt_size: c_int,
    hw_frames_ctx: *mut AVBufferRef,
}

/// FFmpeg 5.1 (avutil 57, final shape with `time_base` and `ch_layout`)
#[repr(C)]
#[allow(dead_code)]
struct Frame57 {
    data: [*mut u8; 8],
    linesize: [c_int; 8],
    extended_data: *mut *mut u8,
    width: c_int,
    height: c_int,
    nb_samples: c_int,
    format: c_int,
    key_frame: c_int,
    pict_type: c_int,
    sample_aspect_ratio: Rational,
    pts: i64,
    pkt_dts: i64,
    time_base: Rational,
    coded_picture_number: c_int,
    display_picture_number: c_int,
    quality: c_int,
    opaque: *mut c_void,
    repeat_pict: c_int,
    interlaced_frame: c_int,
    top_field_first: c_int,
    palette_has_changed: c_int,
    reordered_opaque: i64,
    sample_rate: c_int,
    channel_layout: u64,
    buf: [*mut AVBufferRef; 8],
    extended_buf: *mut *mut AVBufferRef,
    nb_extended_buf: c_int,
    side_data: *mut c_void,
    nb_side_data: c_int,
    flags: c_int,
    color_range: c_int,
    color_primaries: c_int,
    color_trc: c_int,
    colorspace: c_int,
    chroma_location: c_int,
    best_effort_timestamp: i64,
    pkt_pos: i64,
    pkt_duration: i64,
    metadata: *mut AVDictionary,
    decode_error_flags: c_int,
    channels: c_int,
    pkt_size: c_int,
    hw_frames_ctx: *mut AVBufferRef,
    opaque_ref: *mut AVBufferRef,
    crop_top: usize,
    crop_bottom: usize,
    crop_left: usize,
    crop_right: usize,
    private_ref: *mut AVBufferRef,
    ch_layout: AVChannelLayout,
    duration: i64,
}

/// FFmpeg 6.x (avutil 58; legacy channel fields and pkt_duration removed)
#[repr(C)]
#[allow(dead_code)]
struct Frame58 {
    data: [*mut u8; 8],
    linesize: [c_int; 8],
    extended_data: *mut *mut u8,
    width: c_int,
    height: c_int,
    nb_samples: c_int,
    format: c_int,
    key_frame: c_int,
    pict_type: c_int,
    sample_aspect_ratio: Rational,
    pts: i64,
    pkt_dts: i64,
    time_base: Rational,
    coded_picture_number: c_int,
    display_picture_number: c_int,
    quality: c_int,
    opaque: *mut c_void,
    repeat_pict: c_int,
    interlaced_frame: c_int,
    top_field_first: c_int,
    palette_has_changed: c_int,
    reordered_opaque: i64,
    sample_rate: c_int,
    buf: [*mut AVBufferRef; 8],
    extended_buf: *mut *mut AVBufferRef,
    nb_extended_buf: c_int,
    side_data: *mut c_void,
    nb_side_data: c_int,
    flags: c_int,
    color_range: c_int,
    color_primaries: c_int,
    color_trc: c_int,
    colorspace: c_int,
    chroma_location: c_int,
    best_effort_timestamp: i64,
    pkt_pos: i64,
    metadata: *mut AVDictionary,
    decode_error_flags: c_int,
    pkt_size: c_int,
    hw_frames_ctx: *mut AVBufferRef,
    opaque_ref: *mut AVBufferRef,
    crop_top: usize,
    crop_bottom: usize,
    crop_left: usize,
    crop_right: usize,
    private_ref: *mut AVBufferRef,
    ch_layout: AVChannelLayout,
    duration: i64,
}

/// FFmpeg 7.x (avutil 59; deprecated picture bookkeeping removed)
#[repr(C)]
#[allow(dead_code)]
struct Frame59 {
    data: [*mut u8; 8],
    linesize: [c_int; 8],
    extended_data: *mut *mut u8,
    width: c_int,
    height: c_int,
    nb_samples: c_int,
    format: c_int,
    pict_type: c_int,
    sample_aspect_ratio: Rational,
    pts: i64,
    pkt_dts: i64,
    time_base: Rational,
    quality: c_int,
    opaque: *mut c_void,
    repeat_pict: c_int,
    sample_rate: c_int,
    buf: [*mut AVBufferRef; 8],
    extended_buf: *mut *mut AVBufferRef,
    nb_extended_buf: c_int,
    side_data: *mut c_void,
    nb_side_data: c_int,
    flags: c_int,
    color_range: c_int,
    color_primaries: c_int,
    color_trc: c_int,
    colorspace: c_int,
    chroma_location: c_int,
    best_effort_timestamp: i64,
    metadata: *mut AVDictionary,
    decode_error_flags: c_int,
    hw_frames_ctx: *mut AVBufferRef,
    opaque_ref: *mut AVBufferRef,
    crop_top: usize,
    crop_bottom: usize,
    crop_left: usize,
    crop_right: usize,
    private_ref: *mut AVBufferRef,
    ch_layout: AVChannelLayout,
    duration: i64,
}

macro_rules! frame_offsets {
    ($mirror:ty {
        time_base: $tb:expr,
        duration: $dur:expr,
        key_frame: $kf:expr,
        ch_order: $order:expr,
        ch_nb: $nb:expr,
        ch_mask: $mask:expr $(,)?
    }) => {{
        FrameOffsets {
            pts: offset_of!($mirror, pts),
            pkt_dts: offset_of!($mirror, pkt_dts),
            time_base: $tb,
            pict_type: offset_of!($mirror, pict_type),
            sample_aspect_ratio: offset_of!($mirror, sample_aspect_ratio),
            sample_rate: offset_of!($mirror, sample_rate),
            ch_order: $order,
            ch_nb: $nb,
            ch_mask: $mask,
            buf0: offset_of!($mirror, buf),
            flags: offset_of!($mirror, flags),
            color_range: offset_of!($mirror, color_range),
            color_primaries: offset_of!($mirror, color_primaries),
            color_trc: offset_of!($mirror, color_trc),
            colorspace: offset_of!($mirror, colorspace),
            best_effort_timestamp: offset_of!($mirror, best_effort_timestamp),
            duration: $dur,
            key_frame: $kf,
            hw_frames_ctx: offset_of!($mirror, hw_frames_ctx),
        }
    }};
}

impl FrameOffsets {
    fn for_major(avutil_major: i32) -> Self {
        match avutil_major {
            56 => frame_offsets!(Frame56 {
                time_base: None,
                duration: None,
                key_frame: Some(offset_of!(Frame56, key_frame)),
                ch_order: None,
                ch_nb: offset_of!(Frame56, channels),
                ch_mask: offset_of!(Frame56, channel_layout),
            }),
            57 => frame_offsets!(Frame57 {
                time_base: Some(offset_of!(Frame57, time_base)),
                duration: Some(offset_of!(Frame57, duration)),
                key_frame: Some(offset_of!(Frame57, key_frame)),
                ch_order: Some(
                    offset_of!(Frame57, ch_layout) + offset_of!(AVChannelLayout, order)
                ),
                ch_nb: offset_of!(Frame57, ch_layout)
                    + offset_of!(AVChannelLayout, nb_channels),
                ch_mask: offset_of!(Frame57, ch_layout) + offset_of!(AVChannelLayout, mask),
            }),
            58 => frame_offsets!(Frame58 {
                time_base: Some(offset_of!(Frame58, time_base)),
                duration: Some(offset_of!(Frame58, duration)),
                key_frame: Some(offset_of!(Frame58, key_frame)),
                ch_order: Some(
                    offset_of!(Frame58, ch_layout) + offset_of!(AVChannelLayout, order)
                ),
                ch_nb: offset_of!(Frame58, ch_layout)
                    + offset_of!(AVChannelLayout, nb_channels),
                ch_mask: offset_of!(Frame58, ch_layout) + offset_of!(AVChannelLayout, mask),
            }),
            // 59 and anything newer the version gate let through
            _ => frame_offsets!(Frame59 {
                time_base: Some(offset_of!(Frame59, time_base)),
                duration: Some(offset_of!(Frame59, duration)),
                key_frame: None,
                ch_order: Some(
                    offset_of!(Frame59, ch_layout) + offset_of!(AVChannelLayout, order)
                ),
                ch_nb: offset_of!(Frame59, ch_layout)
                    + offset_of!(AVChannelLayout, nb_channels),
                ch_mask: offset_of!(Frame59, ch_layout) + offset_of!(AVChannelLayout, mask),
            }),
        }
    }
}

// ============================================================================
// AVCodecParameters mirrors
// ============================================================================

/// FFmpeg 4.x/5.x (avcodec 58/59); 59 appends `ch_layout` past the fields
/// mirrored here, which does not disturb these offsets.
#[repr(C)]
#[allow(dead_code)]
struct CodecPar58 {
    codec_type: c_int,
    codec_id: c_int,
    codec_tag: u32,
    extradata: *mut u8,
    extradata_size: c_int,
    format: c_int,
    bit_rate: i64,
    bits_per_coded_sample: c_int,
    bits_per_raw_sample: c_int,
    profile: c_int,
    level: c_int,
    width: c_int,
    height: c_int,
    sample_aspect_ratio: Rational,
    field_order: c_int,
    color_range: c_int,
    color_primaries: c_int,
    color_trc: c_int,
    color_space: c_int,
    chroma_location: c_int,
    video_delay: c_int,
    channel_layout: u64,
    channels: c_int,
    sample_rate: c_int,
    block_align: c_int,
    frame_size: c_int,
    initial_padding: c_int,
    trailing_padding: c_int,
    seek_preroll: c_int,
    ch_layout: AVChannelLayout,
}

/// FFmpeg 6.x (avcodec 60; legacy channel fields removed, `ch_layout` takes
/// their slot)
#[repr(C)]
#[allow(dead_code)]
struct CodecPar60 {
    codec_type: c_int,
    codec_id: c_int,
    codec_tag: u32,
    extradata: *mut u8,
    extradata_size: c_int,
    format: c_int,
    bit_rate: i64,
    bits_per_coded_sample: c_int,
    bits_per_raw_sample: c_int,
    profile: c_int,
    level: c_int,
    width: c_int,
    height: c_int,
    sample_aspect_ratio: Rational,
    field_order: c_int,
    color_range: c_int,
    color_primaries: c_int,
    color_trc: c_int,
    color_space: c_int,
    chroma_location: c_int,
    video_delay: c_int,
    ch_layout: AVChannelLayout,
    sample_rate: c_int,
    block_align: c_int,
    frame_size: c_int,
    initial_padding: c_int,
    trailing_padding: c_int,
    seek_preroll: c_int,
}

/// FFmpeg 7.x (avcodec 61; coded side data moved up, framerate added)
#[repr(C)]
#[allow(dead_code)]
struct CodecPar61 {
    codec_type: c_int,
    codec_id: c_int,
    codec_tag: u32,
    extradata: *mut u8,
    extradata_size: c_int,
    coded_side_data: *mut c_void,
    nb_coded_side_data: c_int,
    format: c_int,
    bit_rate: i64,
    bits_per_coded_sample: c_int,
    bits_per_raw_sample: c_int,
    profile: c_int,
    level: c_int,
    width: c_int,
    height: c_int,
    sample_aspect_ratio: Rational,
    framerate: Rational,
    field_order: c_int,
    color_range: c_int,
    color_primaries: c_int,
    color_trc: c_int,
    color_space: c_int,
    chroma_location: c_int,
    video_delay: c_int,
    ch_layout: AVChannelLayout,
    sample_rate: c_int,
    block_align: c_int,
    frame_size: c_int,
    initial_padding: c_int,
    trailing_padding: c_int,
    seek_preroll: c_int,
}

macro_rules! par_offsets {
    ($mirror:ty {
        ch_order: $order:expr,
        ch_nb: $nb:expr,
        ch_mask: $mask:expr $(,)?
    }) => {{
        CodecParOffsets {
            codec_type: offset_of!($mirror, codec_type),
            codec_id: offset_of!($mirror, codec_id),
            codec_tag: offset_of!($mirror, codec_tag),
            extradata: offset_of!($mirror, extradata),
            extradata_size: offset_of!($mirror, extradata_size),
            format: offset_of!($mirror, format),
            bit_rate: offset_of!($mirror, bit_rate),
            profile: offset_of!($mirror, profile),
            level: offset_of!($mirror, level),
            width: offset_of!($mirror, width),
            height: offset_of!($mirror, height),
            sample_aspect_ratio: offset_of!($mirror, sample_aspect_ratio),
            color_range: offset_of!($mirror, color_range),
            color_primaries: offset_of!($mirror, color_primaries),
            color_trc: offset_of!($mirror, color_trc),
            color_space: offset_of!($mirror, color_space),
            ch_order: $order,
            ch_nb: $nb,
            ch_mask: $mask,
            sample_rate: offset_of!($mirror, sample_rate),
            block_align: offset_of!($mirror, block_align),
            frame_size: offset_of!($mirror, frame_size),
        }
    }};
}

impl CodecParOffsets {
    fn for_major(avcodec_major: i32) -> Self {
        match avcodec_major {
            58 | 59 => par_offsets!(CodecPar58 {
                ch_order: None,
                ch_nb: offset_of!(CodecPar58, channels),
                ch_mask: offset_of!(CodecPar58, channel_layout),
            }),
            60 => par_offsets!(CodecPar60 {
                ch_order: Some(
                    offset_of!(CodecPar60, ch_layout) + offset_of!(AVChannelLayout, order)
                ),
                ch_nb: offset_of!(CodecPar60, ch_layout)
                    + offset_of!(AVChannelLayout, nb_channels),
                ch_mask: offset_of!(CodecPar60, ch_layout) + offset_of!(AVChannelLayout, mask),
            }),
            _ => par_offsets!(CodecPar61 {
                ch_order: Some(
                    offset_of!(CodecPar61, ch_layout) + offset_of!(AVChannelLayout, order)
                ),
                ch_nb: offset_of!(CodecPar61, ch_layout)
                    + offset_of!(AVChannelLayout, nb_channels),
                ch_mask: offset_of!(CodecPar61, ch_layout) + offset_of!(AVChannelLayout, mask),
            }),
        }
    }
}

// ============================================================================
// AVPacket mirrors (full structs, needed to size embedded packets)
// ============================================================================

/// FFmpeg 4.x (avformat/avcodec 58)
#[repr(C)]
#[allow(dead_code)]
struct Packet58 {
    buf: *mut AVBufferRef,
    pts: i64,
    dts: i64,
    data: *mut u8,
    size: c_int,
    stream_index: c_int,
    flags: c_int,
    side_data: *mut c_void,
    side_data_elems: c_int,
    duration: i64,
    pos: i64,
    convergence_duration: i64,
}

/// FFmpeg 5.x+ (avcodec 59 and later)
#[repr(C)]
#[allow(dead_code)]
struct Packet59 {
    buf: *mut AVBufferRef,
    pts: i64,
    dts: i64,
    data: *mut u8,
    size: c_int,
    stream_index: c_int,
    flags: c_int,
    side_data: *mut c_void,
    side_data_elems: c_int,
    duration: i64,
    pos: i64,
    opaque: *mut c_void,
    opaque_ref: *mut AVBufferRef,
    time_base: Rational,
}

// ============================================================================
// AVStream mirrors
// ============================================================================

/// FFmpeg 4.x (avformat 58)
#[repr(C)]
#[allow(dead_code)]
struct Stream58 {
    index: c_int,
    id: c_int,
    codec: *mut c_void,
    priv_data: *mut c_void,
    time_base: Rational,
    start_time: i64,
    duration: i64,
    nb_frames: i64,
    disposition: c_int,
    discard: c_int,
    sample_aspect_ratio: Rational,
    metadata: *mut AVDictionary,
    avg_frame_rate: Rational,
    attached_pic: Packet58,
    side_data: *mut c_void,
    nb_side_data: c_int,
    event_flags: c_int,
    r_frame_rate: Rational,
    recommended_encoder_configuration: *mut c_char,
    codecpar: *mut AVCodecParameters,
}

/// FFmpeg 5.x/6.x (avformat 59/60)
#[repr(C)]
#[allow(dead_code)]
struct Stream59 {
    av_class: *const c_void,
    index: c_int,
    id: c_int,
    priv_data: *mut c_void,
    time_base: Rational,
    start_time: i64,
    duration: i64,
    nb_frames: i64,
    disposition: c_int,
    discard: c_int,
    sample_aspect_ratio: Rational,
    metadata: *mut AVDictionary,
    avg_frame_rate: Rational,
    attached_pic: Packet59,
    side_data: *mut c_void,
    nb_side_data: c_int,
    event_flags: c_int,
    r_frame_rate: Rational,
    codecpar: *mut AVCodecParameters,
    pts_wrap_bits: c_int,
}

/// FFmpeg 7.x (avformat 61; codecpar moved next to id, stream side data
/// removed)
#[repr(C)]
#[allow(dead_code)]
struct Stream61 {
    av_class: *const c_void,
    index: c_int,
    id: c_int,
    codecpar: *mut AVCodecParameters,
    priv_data: *mut c_void,
    time_base: Rational,
    start_time: i64,
    duration: i64,
    nb_frames: i64,
    disposition: c_int,
    discard: c_int,
    sample_aspect_ratio: Rational,
    metadata: *mut AVDictionary,
    avg_frame_rate: Rational,
    attached_pic: Packet59,
    event_flags: c_int,
    r_frame_rate: Rational,
    pts_wrap_bits: c_int,
}

macro_rules! stream_offsets {
    ($mirror:ty) => {{
        StreamOffsets {
            index: offset_of!($mirror, index),
            id: offset_of!($mirror, id),
            codecpar: offset_of!($mirror, codecpar),
            time_base: offset_of!($mirror, time_base),
            start_time: offset_of!($mirror, start_time),
            duration: offset_of!($mirror, duration),
            nb_frames: offset_of!($mirror, nb_frames),
            disposition: offset_of!($mirror, disposition),
            metadata: offset_of!($mirror, metadata),
            avg_frame_rate: offset_of!($mirror, avg_frame_rate),
            r_frame_rate: offset_of!($mirror, r_frame_rate),
        }
    }};
}

impl StreamOffsets {
    fn for_major(avformat_major: i32) -> Self {
        match avformat_major {
            58 => stream_offsets!(Stream58),
            59 | 60 => stream_offsets!(Stream59),
            _ => stream_offsets!(Stream61),
        }
    }
}

// ============================================================================
// AVFormatContext mirrors (through `metadata`)
// ============================================================================

/// FFmpeg 4.x (avformat 58, still carrying the fixed `filename` array)
#[repr(C)]
#[allow(dead_code)]
struct FormatCtx58 {
    av_class: *const c_void,
    iformat: *const c_void,
    oformat: *const c_void,
    priv_data: *mut c_void,
    pb: *mut c_void,
    ctx_flags: c_int,
    nb_streams: c_uint,
    streams: *mut *mut c_void,
    filename: [c_char; 1024],
    url: *mut c_char,
    start_time: i64,
    duration: i64,
    bit_rate: i64,
    packet_size: c_uint,
    max_delay: c_int,
    flags: c_int,
    probesize: i64,
    max_analyze_duration: i64,
    key: *const u8,
    keylen: c_int,
    nb_programs: c_uint,
    programs: *mut *mut c_void,
    video_codec_id: c_int,
    audio_codec_id: c_int,
    subtitle_codec_id: c_int,
    max_index_size: c_uint,
    max_picture_buffer: c_uint,
    nb_chapters: c_uint,
    chapters: *mut c_void,
    metadata: *mut AVDictionary,
}

/// FFmpeg 5.x/6.x (avformat 59/60)
#[repr(C)]
#[allow(dead_code)]
struct FormatCtx59 {
    av_class: *const c_void,
    iformat: *const c_void,
    oformat: *const c_void,
    priv_data: *mut c_void,
    pb: *mut c_void,
    ctx_flags: c_int,
    nb_streams: c_uint,
    streams: *mut *mut c_void,
    url: *mut c_char,
    start_time: i64,
    duration: i64,
    bit_rate: i64,
    packet_size: c_uint,
    max_delay: c_int,
    flags: c_int,
    probesize: i64,
    max_analyze_duration: i64,
    key: *const u8,
    keylen: c_int,
    nb_programs: c_uint,
    programs: *mut *mut c_void,
    video_codec_id: c_int,
    audio_codec_id: c_int,
    subtitle_codec_id: c_int,
    max_index_size: c_uint,
    max_picture_buffer: c_uint,
    nb_chapters: c_uint,
    chapters: *mut c_void,
    metadata: *mut AVDictionary,
}

/// FFmpeg 7.x (avformat 61; stream groups inserted, chapters moved up)
#[repr(C)]
#[allow(dead_code)]
struct FormatCtx61 {
    av_class: *const c_void,
    iformat: *const c_void,
    oformat: *const c_void,
    priv_data: *mut c_void,
    pb: *mut c_void,
    ctx_flags: c_int,
    nb_streams: c_uint,
    streams: *mut *mut c_void,
    nb_stream_groups: c_uint,
    stream_groups: *mut *mut c_void,
    nb_chapters: c_uint,
    chapters: *mut c_void,
    url: *mut c_char,
    start_time: i64,
    duration: i64,
    bit_rate: i64,
    packet_size: c_uint,
    max_delay: c_int,
    flags: c_int,
    probesize: i64,
    max_analyze_duration: i64,
    key: *const u8,
    keylen: c_int,
    nb_programs: c_uint,
    programs: *mut *mut c_void,
    video_codec_id: c_int,
    audio_codec_id: c_int,
    subtitle_codec_id: c_int,
    data_codec_id: c_int,
    max_index_size: c_uint,
    max_picture_buffer: c_uint,
    metadata: *mut AVDictionary,
}

macro_rules! fmt_offsets {
    ($mirror:ty) => {{
        FormatCtxOffsets {
            url: offset_of!($mirror, url),
            start_time: offset_of!($mirror, start_time),
            duration: offset_of!($mirror, duration),
            bit_rate: offset_of!($mirror, bit_rate),
            flags: offset_of!($mirror, flags),
            nb_programs: offset_of!($mirror, nb_programs),
            programs: offset_of!($mirror, programs),
            metadata: offset_of!($mirror, metadata),
        }
    }};
}

impl FormatCtxOffsets {
    fn for_major(avformat_major: i32) -> Self {
        match avformat_major {
            58 => fmt_offsets!(FormatCtx58),
            59 | 60 => fmt_offsets!(FormatCtx59),
            _ => fmt_offsets!(FormatCtx61),
        }
    }
}

// ============================================================================
// AVBSFContext mirrors
// ============================================================================

/// FFmpeg 4.x (avcodec 58, with the internal pointer)
#[repr(C)]
#[allow(dead_code)]
struct Bsf58 {
    av_class: *const c_void,
    filter: *const c_void,
    internal: *mut c_void,
    priv_data: *mut c_void,
    par_in: *mut AVCodecParameters,
    par_out: *mut AVCodecParameters,
    time_base_in: Rational,
    time_base_out: Rational,
}

/// FFmpeg 5.x+ (avcodec 59 and later)
#[repr(C)]
#[allow(dead_code)]
struct Bsf59 {
    av_class: *const c_void,
    filter: *const c_void,
    priv_data: *mut c_void,
    par_in: *mut AVCodecParameters,
    par_out: *mut AVCodecParameters,
    time_base_in: Rational,
    time_base_out: Rational,
}

macro_rules! bsf_offsets {
    ($mirror:ty) => {{
        BsfOffsets {
            par_in: offset_of!($mirror, par_in),
            par_out: offset_of!($mirror, par_out),
            time_base_in: offset_of!($mirror, time_base_in),
            time_base_out: offset_of!($mirror, time_base_out),
        }
    }};
}

impl BsfOffsets {
    fn for_major(avcodec_major: i32) -> Self {
        match avcodec_major {
            58 => bsf_offsets!(Bsf58),
            _ => bsf_offsets!(Bsf59),
        }
    }
}

// ============================================================================
// AVCodecContext mirrors (leading fields only)
// ============================================================================

/// FFmpeg 4.x..6.x (avcodec 58/59/60)
#[repr(C)]
#[allow(dead_code)]
struct CodecCtx58 {
    av_class: *const c_void,
    log_level_offset: c_int,
    codec_type: c_int,
    codec: *const c_void,
    codec_id: c_int,
    codec_tag: c_uint,
    priv_data: *mut c_void,
    internal: *mut c_void,
    opaque: *mut c_void,
    bit_rate: i64,
    bit_rate_tolerance: c_int,
    global_quality: c_int,
    compression_level: c_int,
    flags: c_int,
    flags2: c_int,
    extradata: *mut u8,
    extradata_size: c_int,
    time_base: Rational,
    ticks_per_frame: c_int,
    delay: c_int,
    width: c_int,
    height: c_int,
    coded_width: c_int,
    coded_height: c_int,
    gop_size: c_int,
    pix_fmt: c_int,
}

/// FFmpeg 7.x (avcodec 61; rate-control bookkeeping moved out of the leading
/// block, timestamps grouped together)
#[repr(C)]
#[allow(dead_code)]
struct CodecCtx61 {
    av_class: *const c_void,
    log_level_offset: c_int,
    codec_type: c_int,
    codec: *const c_void,
    codec_id: c_int,
    codec_tag: c_uint,
    priv_data: *mut c_void,
    internal: *mut c_void,
    opaque: *mut c_void,
    bit_rate: i64,
    flags: c_int,
    flags2: c_int,
    extradata: *mut u8,
    extradata_size: c_int,
    time_base: Rational,
    pkt_timebase: Rational,
    framerate: Rational,
    delay: c_int,
    width: c_int,
    height: c_int,
    coded_width: c_int,
    coded_height: c_int,
    sample_aspect_ratio: Rational,
    pix_fmt: c_int,
}

macro_rules! ctx_offsets {
    ($mirror:ty) => {{
        CodecCtxOffsets {
            time_base: offset_of!($mirror, time_base),
            width: offset_of!($mirror, width),
            height: offset_of!($mirror, height),
            pix_fmt: offset_of!($mirror, pix_fmt),
        }
    }};
}

impl CodecCtxOffsets {
    fn for_major(avcodec_major: i32) -> Self {
        match avcodec_major {
            58 | 59 | 60 => ctx_offsets!(CodecCtx58),
            _ => ctx_offsets!(CodecCtx61),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_prefix_layout() {
        // 8 data pointers, 8 linesizes, extended_data, then the int block.
        assert_eq!(offset_of!(FramePrefix, linesize), 8 * size_of::<*mut u8>());
        assert_eq!(
            offset_of!(FramePrefix, width),
            offset_of!(FramePrefix, extended_data) + size_of::<*mut *mut u8>()
        );
    }

    #[test]
    fn test_packet_prefix_layout() {
        assert_eq!(offset_of!(PacketPrefix, pts), size_of::<*mut AVBufferRef>());
        assert_eq!(
            offset_of!(PacketPrefix, stream_index),
            offset_of!(PacketPrefix, size) + 4
        );
    }

    #[test]
    fn test_pts_offset_consistent_across_recent_majors() {
        // Removing 4-byte key_frame in avutil 59 is absorbed by the i64
        // alignment padding before pts, so the two should agree.
        let v58 = FrameOffsets::for_major(58);
        let v59 = FrameOffsets::for_major(59);
        assert_eq!(v58.pts, v59.pts);
        assert_eq!(v58.pkt_dts, v59.pkt_dts);
    }

    #[test]
    fn test_key_frame_presence() {
        assert!(FrameOffsets::for_major(58).key_frame.is_some());
        assert!(FrameOffsets::for_major(59).key_frame.is_none());
        assert!(FrameOffsets::for_major(56).time_base.is_none());
    }

    #[test]
    fn test_codecpar_ch_fields() {
        let old = CodecParOffsets::for_major(58);
        let new = CodecParOffsets::for_major(60);
        assert!(old.ch_order.is_none());
        assert!(new.ch_order.is_some());
        // The fields before the channel block agree between 4.x and 6.x.
        assert_eq!(old.width, new.width);
        assert_eq!(old.bit_rate, new.bit_rate);
    }

    #[test]
    fn test_resolve_smoke() {
        let o = Offsets::resolve(58, 60, 60);
        assert!(o.frame.pts > 0);
        assert!(o.stream.codecpar > 0);
        assert!(o.fmt.duration > o.fmt.url);
    }

    use std::mem::size_of;
}
