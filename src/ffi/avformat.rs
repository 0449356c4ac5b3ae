//! libavformat entry points
//!
//! Demuxing, muxing, byte I/O and format guessing.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_uint};

use super::loader::SharedLibrary;
use super::types::{
    AVCodec, AVDictionary, AVFormatContext, AVIOContext, AVInputFormat, AVOutputFormat, AVPacket,
    AVStream,
};
use crate::error::Result;

/// Custom I/O read callback: fill `buf`, return bytes produced, the EOF
/// sentinel, or a negative error.
pub type IoReadFn =
    unsafe extern "C" fn(opaque: *mut c_void, buf: *mut u8, buf_size: c_int) -> c_int;

/// Custom I/O write callback: consume `buf`, return bytes written or a
/// negative error.
pub type IoWriteFn =
    unsafe extern "C" fn(opaque: *mut c_void, buf: *const u8, buf_size: c_int) -> c_int;

/// Custom I/O seek callback. `whence` follows the standard codes plus the
/// size pseudo-whence.
pub type IoSeekFn = unsafe extern "C" fn(opaque: *mut c_void, offset: i64, whence: c_int) -> i64;

/// Typed bindings into libavformat.
pub struct AvFormat {
    pub avformat_version: unsafe extern "C" fn() -> c_uint,

    // ------------------------------------------------------------------
    // Input
    // ------------------------------------------------------------------
    pub avformat_alloc_context: unsafe extern "C" fn() -> *mut AVFormatContext,
    pub avformat_free_context: unsafe extern "C" fn(s: *mut AVFormatContext),
    pub avformat_open_input: unsafe extern "C" fn(
        ps: *mut *mut AVFormatContext,
        url: *const c_char,
        fmt: *const AVInputFormat,
        options: *mut *mut AVDictionary,
    ) -> c_int,
    pub avformat_close_input: unsafe extern "C" fn(s: *mut *mut AVFormatContext),
    pub avformat_find_stream_info: unsafe extern "C" fn(
        ic: *mut AVFormatContext,
        options: *mut *mut AVDictionary,
    ) -> c_int,
    pub av_read_frame: unsafe extern "C" fn(s: *mut AVFormatContext, pkt: *mut AVPacket) -> c_int,
    pub av_seek_frame: unsafe extern "C" fn(
        s: *mut AVFormatContext,
        stream_index: c_int,
        timestamp: i64,
        flags: c_int,
    ) -> c_int,
    pub av_find_best_stream: unsafe extern "C" fn(
        ic: *mut AVFormatContext,
        media_type: c_int,
        wanted_stream_nb: c_int,
        related_stream: c_int,
        decoder_ret: *mut *const AVCodec,
        flags: c_int,
    ) -> c_int,
    pub av_find_input_format: unsafe extern "C" fn(short_name: *const c_char) -> *const AVInputFormat,

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------
    pub avformat_alloc_output_context2: unsafe extern "C" fn(
        ctx: *mut *mut AVFormatContext,
        oformat: *const AVOutputFormat,
        format_name: *const c_char,
        filename: *const c_char,
    ) -> c_int,
    pub avformat_new_stream:
        unsafe extern "C" fn(s: *mut AVFormatContext, c: *const AVCodec) -> *mut AVStream,
    pub avformat_write_header: unsafe extern "C" fn(
        s: *mut AVFormatContext,
        options: *mut *mut AVDictionary,
    ) -> c_int,
    pub av_interleaved_write_frame:
        unsafe extern "C" fn(s: *mut AVFormatContext, pkt: *mut AVPacket) -> c_int,
    pub av_write_trailer: unsafe extern "C" fn(s: *mut AVFormatContext) -> c_int,
    pub av_guess_format: unsafe extern "C" fn(
        short_name: *const c_char,
        filename: *const c_char,
        mime_type: *const c_char,
    ) -> *const AVOutputFormat,

    // ------------------------------------------------------------------
    // Byte I/O
    // ------------------------------------------------------------------
    pub avio_open2: unsafe extern "C" fn(
        s: *mut *mut AVIOContext,
        url: *const c_char,
        flags: c_int,
        int_cb: *const c_void,
        options: *mut *mut AVDictionary,
    ) -> c_int,
    pub avio_closep: unsafe extern "C" fn(s: *mut *mut AVIOContext) -> c_int,
    pub avio_alloc_context: unsafe extern "C" fn(
        buffer: *mut u8,
        buffer_size: c_int,
        write_flag: c_int,
        opaque: *mut c_void,
        read_packet: Option<IoReadFn>,
        write_packet: Option<IoWriteFn>,
        seek: Option<IoSeekFn>,
    ) -> *mut AVIOContext,
    pub avio_context_free: unsafe extern "C" fn(s: *mut *mut AVIOContext),
    pub avio_flush: unsafe extern "C" fn(s: *mut AVIOContext),

    // ------------------------------------------------------------------
    // Process-wide setup
    // ------------------------------------------------------------------
    pub avformat_network_init: unsafe extern "C" fn() -> c_int,
    pub avformat_network_deinit: unsafe extern "C" fn() -> c_int,
    /// Present through FFmpeg 4 only; a no-op after.
    pub av_register_all: Option<unsafe extern "C" fn()>,
}

impl AvFormat {
    pub(crate) fn bind(lib: &SharedLibrary) -> Result<Self> {
        Ok(Self {
            avformat_version: lib.sym("avformat_version")?,
            avformat_alloc_context: lib.sym("avformat_alloc_context")?,
            avformat_free_context: lib.sym("avformat_free_context")?,
            avformat_open_input: lib.sym("avformat_open_input")?,
            avformat_close_input: lib.sym("avformat_close_input")?,
            avformat_find_stream_info: lib.sym("avformat_find_stream_info")?,
            av_read_frame: lib.sym("av_read_frame")?,
            av_seek_frame: lib.sym("av_seek_frame")?,
            av_find_best_stream: lib.sym("av_find_best_stream")?,
            av_find_input_format: lib.sym("av_find_input_format")?,
            avformat_alloc_output_context2: lib.sym("avformat_alloc_output_context2")?,
            avformat_new_stream: lib.sym("avformat_new_stream")?,
            avformat_write_header: lib.sym("avformat_write_header")?,
            av_interleaved_write_frame: lib.sym("av_interleaved_write_frame")?,
            av_write_trailer: lib.sym("av_write_trailer")?,
            av_guess_format: lib.sym("av_guess_format")?,
            avio_open2: lib.sym("avio_open2")?,
            avio_closep: lib.sym("avio_closep")?,
            avio_alloc_context: lib.sym("avio_alloc_context")?,
            avio_context_free: lib.sym("avio_context_free")?,
            avio_flush: lib.sym("avio_flush")?,
            avformat_network_init: lib.sym("avformat_network_init")?,
            avformat_network_deinit: lib.sym("avformat_network_deinit")?,
            av_register_all: lib.opt_sym("av_register_all"),
        })
    }
}
