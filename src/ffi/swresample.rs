//! libswresample entry points
//!
//! Audio resampling and sample format conversion. Construction prefers the
//! FFmpeg 5.1+ channel-layout API and falls back to the legacy bitmask one.

use std::ffi::c_void;
use std::os::raw::{c_int, c_uint};

use super::loader::SharedLibrary;
use super::types::{AVChannelLayout, AVFrame, SwrContext};
use crate::error::Result;

/// Typed bindings into libswresample.
pub struct SwResample {
    pub swresample_version: unsafe extern "C" fn() -> c_uint,
    pub swr_alloc: unsafe extern "C" fn() -> *mut SwrContext,
    pub swr_init: unsafe extern "C" fn(s: *mut SwrContext) -> c_int,
    pub swr_free: unsafe extern "C" fn(s: *mut *mut SwrContext),
    pub swr_convert_frame: unsafe extern "C" fn(
        s: *mut SwrContext,
        output: *mut AVFrame,
        input: *const AVFrame,
    ) -> c_int,
    pub swr_get_delay: unsafe extern "C" fn(s: *mut SwrContext, base: i64) -> i64,
    pub swr_get_out_samples: unsafe extern "C" fn(s: *mut SwrContext, in_samples: c_int) -> c_int,

    /// FFmpeg 5.1+ struct-shaped channel layouts.
    pub swr_alloc_set_opts2: Option<
        unsafe extern "C" fn(
            s: *mut *mut SwrContext,
            out_ch_layout: *const AVChannelLayout,
            out_sample_fmt: c_int,
            out_sample_rate: c_int,
            in_ch_layout: *const AVChannelLayout,
            in_sample_fmt: c_int,
            in_sample_rate: c_int,
            log_offset: c_int,
            log_ctx: *mut c_void,
        ) -> c_int,
    >,

    /// Legacy 64-bit mask layouts (removed in swresample 5).
    pub swr_alloc_set_opts: Option<
        unsafe extern "C" fn(
            s: *mut SwrContext,
            out_ch_layout: i64,
            out_sample_fmt: c_int,
            out_sample_rate: c_int,
            in_ch_layout: i64,
            in_sample_fmt: c_int,
            in_sample_rate: c_int,
            log_offset: c_int,
            log_ctx: *mut c_void,
        ) -> *mut SwrContext,
    >,
}

impl SwResample {
    pub(crate) fn bind(lib: &SharedLibrary) -> Result<Self> {
        Ok(Self {
            swresample_version: lib.sym("swresample_version")?,
            swr_alloc: lib.sym("swr_alloc")?,
            swr_init: lib.sym("swr_init")?,
            swr_free: lib.sym("swr_free")?,
            swr_convert_frame: lib.sym("swr_convert_frame")?,
            swr_get_delay: lib.sym("swr_get_delay")?,
            swr_get_out_samples: lib.sym("swr_get_out_samples")?,
            swr_alloc_set_opts2: lib.opt_sym("swr_alloc_set_opts2"),
            swr_alloc_set_opts: lib.opt_sym("swr_alloc_set_opts"),
        })
    }
}
