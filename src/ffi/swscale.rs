//! libswscale entry points
//!
//! Pixel format conversion and scaling, plus the colorspace coefficient
//! tables used by `Scaler::set_colorspace`.

use std::ffi::c_void;
use std::os::raw::{c_int, c_uint};

use super::loader::SharedLibrary;
use super::types::SwsContext;
use crate::error::Result;

// Scaling algorithm flags
pub const SWS_FAST_BILINEAR: c_int = 1;
pub const SWS_BILINEAR: c_int = 2;
pub const SWS_BICUBIC: c_int = 4;
pub const SWS_POINT: c_int = 0x10;
pub const SWS_LANCZOS: c_int = 0x200;

// Coefficient table selectors for `sws_getCoefficients`. BT.601 uses a
// distinct numeric code here than in frame colorspace metadata.
pub const SWS_CS_ITU709: c_int = 1;
pub const SWS_CS_ITU601: c_int = 5;
pub const SWS_CS_BT2020: c_int = 9;
pub const SWS_CS_DEFAULT: c_int = 5;

/// Typed bindings into libswscale.
pub struct SwScale {
    pub swscale_version: unsafe extern "C" fn() -> c_uint,
    pub sws_getContext: unsafe extern "C" fn(
        src_w: c_int,
        src_h: c_int,
        src_format: c_int,
        dst_w: c_int,
        dst_h: c_int,
        dst_format: c_int,
        flags: c_int,
        src_filter: *mut c_void,
        dst_filter: *mut c_void,
        param: *const f64,
    ) -> *mut SwsContext,
    pub sws_freeContext: unsafe extern "C" fn(ctx: *mut SwsContext),
    pub sws_scale: unsafe extern "C" fn(
        ctx: *mut SwsContext,
        src_slice: *const *const u8,
        src_stride: *const c_int,
        src_slice_y: c_int,
        src_slice_h: c_int,
        dst: *const *mut u8,
        dst_stride: *const c_int,
    ) -> c_int,
    pub sws_getCoefficients: unsafe extern "C" fn(colorspace: c_int) -> *const c_int,
    pub sws_getColorspaceDetails: unsafe extern "C" fn(
        ctx: *mut SwsContext,
        inv_table: *mut *mut c_int,
        src_range: *mut c_int,
        table: *mut *mut c_int,
        dst_range: *mut c_int,
        brightness: *mut c_int,
        contrast: *mut c_int,
        saturation: *mut c_int,
    ) -> c_int,
    pub sws_setColorspaceDetails: unsafe extern "C" fn(
        ctx: *mut SwsContext,
        inv_table: *const c_int,
        src_range: c_int,
        table: *const c_int,
        dst_range: c_int,
        brightness: c_int,
        contrast: c_int,
        saturation: c_int,
    ) -> c_int,
}

impl SwScale {
    pub(crate) fn bind(lib: &SharedLibrary) -> Result<Self> {
        Ok(Self {
            swscale_version: lib.sym("swscale_version")?,
            sws_getContext: lib.sym("sws_getContext")?,
            sws_freeContext: lib.sym("sws_freeContext")?,
            sws_scale: lib.sym("sws_scale")?,
            sws_getCoefficients: lib.sym("sws_getCoefficients")?,
            sws_getColorspaceDetails: lib.sym("sws_getColorspaceDetails")?,
            sws_setColorspaceDetails: lib.sym("sws_setColorspaceDetails")?,
        })
    }
}
