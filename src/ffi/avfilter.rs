//! libavfilter entry points
//!
//! Graph construction, the non-pointer-returning parse variant, linking and
//! the buffer source/sink endpoints.

use std::ffi::c_void;
use std::os::raw::{c_char, c_int, c_uint};

use super::loader::SharedLibrary;
use super::types::{AVFilter, AVFilterContext, AVFilterGraph, AVFilterInOut, AVFrame};
use crate::error::Result;

/// Typed bindings into libavfilter.
pub struct AvFilter {
    pub avfilter_version: unsafe extern "C" fn() -> c_uint,
    pub avfilter_get_by_name: unsafe extern "C" fn(name: *const c_char) -> *const AVFilter,
    pub avfilter_graph_alloc: unsafe extern "C" fn() -> *mut AVFilterGraph,
    pub avfilter_graph_free: unsafe extern "C" fn(graph: *mut *mut AVFilterGraph),
    pub avfilter_graph_create_filter: unsafe extern "C" fn(
        filt_ctx: *mut *mut AVFilterContext,
        filt: *const AVFilter,
        name: *const c_char,
        args: *const c_char,
        opaque: *mut c_void,
        graph_ctx: *mut AVFilterGraph,
    ) -> c_int,
    pub avfilter_graph_parse2: unsafe extern "C" fn(
        graph: *mut AVFilterGraph,
        filters: *const c_char,
        inputs: *mut *mut AVFilterInOut,
        outputs: *mut *mut AVFilterInOut,
    ) -> c_int,
    pub avfilter_graph_config:
        unsafe extern "C" fn(graphctx: *mut AVFilterGraph, log_ctx: *mut c_void) -> c_int,
    pub avfilter_link: unsafe extern "C" fn(
        src: *mut AVFilterContext,
        srcpad: c_uint,
        dst: *mut AVFilterContext,
        dstpad: c_uint,
    ) -> c_int,
    pub avfilter_inout_free: unsafe extern "C" fn(inout: *mut *mut AVFilterInOut),
    pub av_buffersrc_add_frame_flags: unsafe extern "C" fn(
        buffer_src: *mut AVFilterContext,
        frame: *mut AVFrame,
        flags: c_int,
    ) -> c_int,
    pub av_buffersink_get_frame:
        unsafe extern "C" fn(ctx: *mut AVFilterContext, frame: *mut AVFrame) -> c_int,
}

impl AvFilter {
    pub(crate) fn bind(lib: &SharedLibrary) -> Result<Self> {
        Ok(Self {
            avfilter_version: lib.sym("avfilter_version")?,
            avfilter_get_by_name: lib.sym("avfilter_get_by_name")?,
            avfilter_graph_alloc: lib.sym("avfilter_graph_alloc")?,
            avfilter_graph_free: lib.sym("avfilter_graph_free")?,
            avfilter_graph_create_filter: lib.sym("avfilter_graph_create_filter")?,
            avfilter_graph_parse2: lib.sym("avfilter_graph_parse2")?,
            avfilter_graph_config: lib.sym("avfilter_graph_config")?,
            avfilter_link: lib.sym("avfilter_link")?,
            avfilter_inout_free: lib.sym("avfilter_inout_free")?,
            av_buffersrc_add_frame_flags: lib.sym("av_buffersrc_add_frame_flags")?,
            av_buffersink_get_frame: lib.sym("av_buffersink_get_frame")?,
        })
    }
}
