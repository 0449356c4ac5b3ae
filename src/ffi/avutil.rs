//! libavutil entry points
//!
//! Frames, refcounted buffers, dictionaries, memory, options, channel
//! layouts and hardware device contexts. Bound by name at load time; see
//! [`super::loader`]. Struct-by-value entry points (`av_mul_q` and friends)
//! are deliberately absent here: only their raw addresses are captured, for
//! the shim to call.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_uint};

use super::loader::SharedLibrary;
use super::types::{AVBufferRef, AVChannelLayout, AVDictionary, AVDictionaryEntry, AVFrame};
use crate::error::Result;

/// Free callback invoked when the last reference to an
/// `av_buffer_create`-wrapped arena is dropped.
pub type BufferFreeFn = unsafe extern "C" fn(opaque: *mut c_void, data: *mut u8);

/// Typed bindings into libavutil.
pub struct AvUtil {
    // ------------------------------------------------------------------
    // Versions
    // ------------------------------------------------------------------
    pub avutil_version: unsafe extern "C" fn() -> c_uint,

    // ------------------------------------------------------------------
    // Memory
    // ------------------------------------------------------------------
    pub av_malloc: unsafe extern "C" fn(size: usize) -> *mut c_void,
    pub av_free: unsafe extern "C" fn(ptr: *mut c_void),

    // ------------------------------------------------------------------
    // Errors and logging
    // ------------------------------------------------------------------
    pub av_strerror: unsafe extern "C" fn(errnum: c_int, buf: *mut c_char, size: usize) -> c_int,
    pub av_log_set_level: unsafe extern "C" fn(level: c_int),

    /// Raw addresses of the variadic logging entry points, for the shim.
    pub av_log_set_callback_addr: *mut c_void,
    pub av_log_format_line_addr: *mut c_void,
    pub av_log_default_callback_addr: *mut c_void,

    /// Raw addresses of the struct-by-value rational arithmetic, for the shim.
    pub av_mul_q_addr: *mut c_void,
    pub av_add_q_addr: *mut c_void,
    pub av_sub_q_addr: *mut c_void,
    pub av_div_q_addr: *mut c_void,
    pub av_d2q_addr: *mut c_void,
    /// `av_cmp_q` is a header inline on every supported build; the shim
    /// carries its own copy and only prefers this address when present.
    pub av_cmp_q_addr: Option<*mut c_void>,

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------
    pub av_frame_alloc: unsafe extern "C" fn() -> *mut AVFrame,
    pub av_frame_free: unsafe extern "C" fn(frame: *mut *mut AVFrame),
    pub av_frame_unref: unsafe extern "C" fn(frame: *mut AVFrame),
    pub av_frame_ref: unsafe extern "C" fn(dst: *mut AVFrame, src: *const AVFrame) -> c_int,
    pub av_frame_clone: unsafe extern "C" fn(src: *const AVFrame) -> *mut AVFrame,
    pub av_frame_get_buffer: unsafe extern "C" fn(frame: *mut AVFrame, align: c_int) -> c_int,
    pub av_frame_make_writable: unsafe extern "C" fn(frame: *mut AVFrame) -> c_int,

    // ------------------------------------------------------------------
    // Refcounted buffers
    // ------------------------------------------------------------------
    pub av_buffer_create: unsafe extern "C" fn(
        data: *mut u8,
        size: usize,
        free: Option<BufferFreeFn>,
        opaque: *mut c_void,
        flags: c_int,
    ) -> *mut AVBufferRef,
    pub av_buffer_ref: unsafe extern "C" fn(buf: *const AVBufferRef) -> *mut AVBufferRef,
    pub av_buffer_unref: unsafe extern "C" fn(buf: *mut *mut AVBufferRef),
    pub av_buffer_get_ref_count: unsafe extern "C" fn(buf: *const AVBufferRef) -> c_int,

    // ------------------------------------------------------------------
    // Dictionaries
    // ------------------------------------------------------------------
    pub av_dict_set: unsafe extern "C" fn(
        pm: *mut *mut AVDictionary,
        key: *const c_char,
        value: *const c_char,
        flags: c_int,
    ) -> c_int,
    pub av_dict_get: unsafe extern "C" fn(
        m: *const AVDictionary,
        key: *const c_char,
        prev: *const AVDictionaryEntry,
        flags: c_int,
    ) -> *mut AVDictionaryEntry,
    pub av_dict_count: unsafe extern "C" fn(m: *const AVDictionary) -> c_int,
    pub av_dict_copy: unsafe extern "C" fn(
        dst: *mut *mut AVDictionary,
        src: *const AVDictionary,
        flags: c_int,
    ) -> c_int,
    pub av_dict_free: unsafe extern "C" fn(m: *mut *mut AVDictionary),

    // ------------------------------------------------------------------
    // Image and sample helpers
    // ------------------------------------------------------------------
    pub av_image_get_buffer_size: unsafe extern "C" fn(
        pix_fmt: c_int,
        width: c_int,
        height: c_int,
        align: c_int,
    ) -> c_int,
    pub av_image_fill_arrays: unsafe extern "C" fn(
        dst_data: *mut *mut u8,
        dst_linesize: *mut c_int,
        src: *const u8,
        pix_fmt: c_int,
        width: c_int,
        height: c_int,
        align: c_int,
    ) -> c_int,
    pub av_get_bytes_per_sample: unsafe extern "C" fn(sample_fmt: c_int) -> c_int,
    pub av_sample_fmt_is_planar: unsafe extern "C" fn(sample_fmt: c_int) -> c_int,
    pub av_samples_get_buffer_size: unsafe extern "C" fn(
        linesize: *mut c_int,
        nb_channels: c_int,
        nb_samples: c_int,
        sample_fmt: c_int,
        align: c_int,
    ) -> c_int,
    pub av_get_pix_fmt: unsafe extern "C" fn(name: *const c_char) -> c_int,
    pub av_get_pix_fmt_name: unsafe extern "C" fn(pix_fmt: c_int) -> *const c_char,
    pub av_get_sample_fmt: unsafe extern "C" fn(name: *const c_char) -> c_int,
    pub av_get_sample_fmt_name: unsafe extern "C" fn(sample_fmt: c_int) -> *const c_char,

    // ------------------------------------------------------------------
    // Options
    // ------------------------------------------------------------------
    pub av_opt_set: unsafe extern "C" fn(
        obj: *mut c_void,
        name: *const c_char,
        val: *const c_char,
        search_flags: c_int,
    ) -> c_int,
    pub av_opt_set_int: unsafe extern "C" fn(
        obj: *mut c_void,
        name: *const c_char,
        val: i64,
        search_flags: c_int,
    ) -> c_int,
    pub av_opt_get: unsafe extern "C" fn(
        obj: *mut c_void,
        name: *const c_char,
        search_flags: c_int,
        out_val: *mut *mut u8,
    ) -> c_int,

    // ------------------------------------------------------------------
    // Channel layouts (new API on 5.1+, legacy bitmask before)
    // ------------------------------------------------------------------
    pub av_channel_layout_default:
        Option<unsafe extern "C" fn(ch_layout: *mut AVChannelLayout, nb_channels: c_int)>,
    pub av_channel_layout_uninit: Option<unsafe extern "C" fn(ch_layout: *mut AVChannelLayout)>,
    pub av_channel_layout_copy: Option<
        unsafe extern "C" fn(dst: *mut AVChannelLayout, src: *const AVChannelLayout) -> c_int,
    >,
    pub av_channel_layout_from_mask:
        Option<unsafe extern "C" fn(ch_layout: *mut AVChannelLayout, mask: u64) -> c_int>,
    pub av_get_default_channel_layout: Option<unsafe extern "C" fn(nb_channels: c_int) -> i64>,
    pub av_get_channel_layout_nb_channels:
        Option<unsafe extern "C" fn(channel_layout: u64) -> c_int>,

    // ------------------------------------------------------------------
    // Hardware device contexts
    // ------------------------------------------------------------------
    pub av_hwdevice_ctx_create: unsafe extern "C" fn(
        device_ctx: *mut *mut AVBufferRef,
        device_type: c_int,
        device: *const c_char,
        opts: *mut AVDictionary,
        flags: c_int,
    ) -> c_int,
    pub av_hwdevice_find_type_by_name: unsafe extern "C" fn(name: *const c_char) -> c_int,
    pub av_hwdevice_get_type_name: unsafe extern "C" fn(device_type: c_int) -> *const c_char,
    pub av_hwdevice_iterate_types: unsafe extern "C" fn(prev: c_int) -> c_int,
    pub av_hwframe_transfer_data:
        unsafe extern "C" fn(dst: *mut AVFrame, src: *const AVFrame, flags: c_int) -> c_int,
}

impl AvUtil {
    pub(crate) fn bind(lib: &SharedLibrary) -> Result<Self> {
        Ok(Self {
            avutil_version: lib.sym("avutil_version")?,
            av_malloc: lib.sym("av_malloc")?,
            av_free: lib.sym("av_free")?,
            av_strerror: lib.sym("av_strerror")?,
            av_log_set_level: lib.sym("av_log_set_level")?,
            av_log_set_callback_addr: lib.sym("av_log_set_callback")?,
            av_log_format_line_addr: lib.sym("av_log_format_line")?,
            av_log_default_callback_addr: lib.sym("av_log_default_callback")?,
            av_mul_q_addr: lib.sym("av_mul_q")?,
            av_add_q_addr: lib.sym("av_add_q")?,
            av_sub_q_addr: lib.sym("av_sub_q")?,
            av_div_q_addr: lib.sym("av_div_q")?,
            av_d2q_addr: lib.sym("av_d2q")?,
            av_cmp_q_addr: lib.opt_sym("av_cmp_q"),
            av_frame_alloc: lib.sym("av_frame_alloc")?,
            av_frame_free: lib.sym("av_frame_free")?,
            av_frame_unref: lib.sym("av_frame_unref")?,
            av_frame_ref: lib.sym("av_frame_ref")?,
            av_frame_clone: lib.sym("av_frame_clone")?,
            av_frame_get_buffer: lib.sym("av_frame_get_buffer")?,
            av_frame_make_writable: lib.sym("av_frame_make_writable")?,
            av_buffer_create: lib.sym("av_buffer_create")?,
            av_buffer_ref: lib.sym("av_buffer_ref")?,
            av_buffer_unref: lib.sym("av_buffer_unref")?,
            av_buffer_get_ref_count: lib.sym("av_buffer_get_ref_count")?,
            av_dict_set: lib.sym("av_dict_set")?,
            av_dict_get: lib.sym("av_dict_get")?,
            av_dict_count: lib.sym("av_dict_count")?,
            av_dict_copy: lib.sym("av_dict_copy")?,
            av_dict_free: lib.sym("av_dict_free")?,
            av_image_get_buffer_size: lib.sym("av_image_get_buffer_size")?,
            av_image_fill_arrays: lib.sym("av_image_fill_arrays")?,
            av_get_bytes_per_sample: lib.sym("av_get_bytes_per_sample")?,
            av_sample_fmt_is_planar: lib.sym("av_sample_fmt_is_planar")?,
            av_samples_get_buffer_size: lib.sym("av_samples_get_buffer_size")?,
            av_get_pix_fmt: lib.sym("av_get_pix_fmt")?,
            av_get_pix_fmt_name: lib.sym("av_get_pix_fmt_name")?,
            av_get_sample_fmt: lib.sym("av_get_sample_fmt")?,
            av_get_sample_fmt_name: lib.sym("av_get_sample_fmt_name")?,
            av_opt_set: lib.sym("av_opt_set")?,
            av_opt_set_int: lib.sym("av_opt_set_int")?,
            av_opt_get: lib.sym("av_opt_get")?,
            av_channel_layout_default: lib.opt_sym("av_channel_layout_default"),
            av_channel_layout_uninit: lib.opt_sym("av_channel_layout_uninit"),
            av_channel_layout_copy: lib.opt_sym("av_channel_layout_copy"),
            av_channel_layout_from_mask: lib.opt_sym("av_channel_layout_from_mask"),
            av_get_default_channel_layout: lib.opt_sym("av_get_default_channel_layout"),
            av_get_channel_layout_nb_channels: lib.opt_sym("av_get_channel_layout_nb_channels"),
            av_hwdevice_ctx_create: lib.sym("av_hwdevice_ctx_create")?,
            av_hwdevice_find_type_by_name: lib.sym("av_hwdevice_find_type_by_name")?,
            av_hwdevice_get_type_name: lib.sym("av_hwdevice_get_type_name")?,
            av_hwdevice_iterate_types: lib.sym("av_hwdevice_iterate_types")?,
            av_hwframe_transfer_data: lib.sym("av_hwframe_transfer_data")?,
        })
    }
}
