//! Pixel format conversion and scaling
//!
//! Wraps `SwsContext`. The scaler owns and reuses its destination frame;
//! [`Scaler::scale`] returns a **borrowed** frame valid until the next call.

use parking_lot::Mutex;

use crate::codec::frame::Frame;
use crate::error::{check, Error, Result};
use crate::ffi::swscale::{
    SWS_BICUBIC, SWS_BILINEAR, SWS_CS_BT2020, SWS_CS_DEFAULT, SWS_CS_ITU601, SWS_CS_ITU709,
    SWS_FAST_BILINEAR, SWS_LANCZOS, SWS_POINT,
};
use crate::ffi::types::{ColorSpace, PixelFormat, SwsContext};
use crate::init::Ffmpeg;

/// Scaling algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleAlgorithm {
    /// Fast bilinear (fastest, lower quality)
    FastBilinear,
    /// Bilinear (good balance)
    #[default]
    Bilinear,
    /// Bicubic (higher quality, slower)
    Bicubic,
    /// Lanczos (highest quality, slowest)
    Lanczos,
    /// Nearest neighbor (fastest, blocky)
    Point,
}

impl ScaleAlgorithm {
    fn to_sws_flags(self) -> i32 {
        match self {
            ScaleAlgorithm::FastBilinear => SWS_FAST_BILINEAR,
            ScaleAlgorithm::Bilinear => SWS_BILINEAR,
            ScaleAlgorithm::Bicubic => SWS_BICUBIC,
            ScaleAlgorithm::Lanczos => SWS_LANCZOS,
            ScaleAlgorithm::Point => SWS_POINT,
        }
    }
}

/// Map frame colorspace metadata onto the swscale coefficient table codes
/// (BT.601 has a different numeric code here than in frame metadata).
fn sws_colorspace_code(space: ColorSpace) -> i32 {
    match space {
        ColorSpace::Bt709 => SWS_CS_ITU709,
        ColorSpace::Smpte170m | ColorSpace::Bt470bg => SWS_CS_ITU601,
        ColorSpace::Bt2020Ncl | ColorSpace::Bt2020Cl => SWS_CS_BT2020,
        _ => SWS_CS_DEFAULT,
    }
}

struct ScalerInner {
    ptr: *mut SwsContext,
    dst: Frame,
    src_width: u32,
    src_height: u32,
    src_format: PixelFormat,
    dst_height: u32,
    av: &'static Ffmpeg,
}

unsafe impl Send for ScalerInner {}

/// Stateless transform from one raster geometry to another.
pub struct Scaler {
    inner: Mutex<ScalerInner>,
}

impl Scaler {
    pub fn new(
        src_width: u32,
        src_height: u32,
        src_format: PixelFormat,
        dst_width: u32,
        dst_height: u32,
        dst_format: PixelFormat,
        algorithm: ScaleAlgorithm,
    ) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let ptr = unsafe {
            (av.swscale.sws_getContext)(
                src_width as i32,
                src_height as i32,
                src_format.as_raw(),
                dst_width as i32,
                dst_height as i32,
                dst_format.as_raw(),
                algorithm.to_sws_flags(),
                std::ptr::null_mut(),
                std::ptr::null_mut(),
                std::ptr::null(),
            )
        };
        if ptr.is_null() {
            return Err(Error::InvalidArgument(
                "unsupported scaler conversion",
            ));
        }
        let dst = Frame::alloc_video(dst_width, dst_height, dst_format)?;
        Ok(Self {
            inner: Mutex::new(ScalerInner {
                ptr,
                dst,
                src_width,
                src_height,
                src_format,
                dst_height,
                av,
            }),
        })
    }

    /// Format conversion only, no resize.
    pub fn converter(
        width: u32,
        height: u32,
        src_format: PixelFormat,
        dst_format: PixelFormat,
    ) -> Result<Self> {
        Self::new(
            width,
            height,
            src_format,
            width,
            height,
            dst_format,
            ScaleAlgorithm::Bilinear,
        )
    }

    /// Convert one frame. Returns a **borrowed** frame the scaler reuses on
    /// the next call; the source PTS is carried over.
    pub fn scale(&self, src: &Frame) -> Result<Frame> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if src.width() != inner.src_width
            || src.height() != inner.src_height
            || src.pixel_format() != inner.src_format
        {
            return Err(Error::InvalidArgument(
                "frame does not match scaler configuration",
            ));
        }

        // A caller may have cloned the previous output; never scribble over
        // shared buffers.
        let ret = unsafe { (inner.av.avutil.av_frame_make_writable)(inner.dst.as_mut_ptr()) };
        check("av_frame_make_writable", ret)?;

        let src_data: [*const u8; 4] = [src.data(0), src.data(1), src.data(2), src.data(3)];
        let src_stride: [i32; 4] = [
            src.linesize(0),
            src.linesize(1),
            src.linesize(2),
            src.linesize(3),
        ];
        let dst_data: [*mut u8; 4] = [
            inner.dst.data_mut(0),
            inner.dst.data_mut(1),
            inner.dst.data_mut(2),
            inner.dst.data_mut(3),
        ];
        let dst_stride: [i32; 4] = [
            inner.dst.linesize(0),
            inner.dst.linesize(1),
            inner.dst.linesize(2),
            inner.dst.linesize(3),
        ];

        let ret = unsafe {
            (inner.av.swscale.sws_scale)(
                inner.ptr,
                src_data.as_ptr(),
                src_stride.as_ptr(),
                0,
                inner.src_height as i32,
                dst_data.as_ptr(),
                dst_stride.as_ptr(),
            )
        };
        check("sws_scale", ret)?;
        if ret != inner.dst_height as i32 {
            tracing::debug!(expected = inner.dst_height, produced = ret, "short scale");
        }

        inner.dst.set_pts(src.pts());
        if let Some(tb) = src.time_base() {
            inner.dst.set_time_base(tb);
        }
        Ok(inner.dst.borrowed_view())
    }

    /// Substitute the conversion coefficient tables for explicit source and
    /// destination color spaces. Range handling is intentionally untouched.
    pub fn set_colorspace(&self, src: ColorSpace, dst: ColorSpace) -> Result<()> {
        let guard = self.inner.lock();
        let av = guard.av;
        let mut inv_table: *mut i32 = std::ptr::null_mut();
        let mut table: *mut i32 = std::ptr::null_mut();
        let (mut src_range, mut dst_range) = (0i32, 0i32);
        let (mut brightness, mut contrast, mut saturation) = (0i32, 0i32, 0i32);

        let ret = unsafe {
            (av.swscale.sws_getColorspaceDetails)(
                guard.ptr,
                &mut inv_table,
                &mut src_range,
                &mut table,
                &mut dst_range,
                &mut brightness,
                &mut contrast,
                &mut saturation,
            )
        };
        if ret < 0 {
            return Err(Error::InvalidArgument(
                "scaler does not support colorspace details",
            ));
        }

        let src_coeffs =
            unsafe { (av.swscale.sws_getCoefficients)(sws_colorspace_code(src)) };
        let dst_coeffs =
            unsafe { (av.swscale.sws_getCoefficients)(sws_colorspace_code(dst)) };
        let ret = unsafe {
            (av.swscale.sws_setColorspaceDetails)(
                guard.ptr,
                src_coeffs,
                src_range,
                dst_coeffs,
                dst_range,
                brightness,
                contrast,
                saturation,
            )
        };
        check("sws_setColorspaceDetails", ret)?;
        Ok(())
    }
}

impl Drop for ScalerInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { (self.av.swscale.sws_freeContext)(self.ptr) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colorspace_code_mapping() {
        assert_eq!(sws_colorspace_code(ColorSpace::Bt709), SWS_CS_ITU709);
        assert_eq!(sws_colorspace_code(ColorSpace::Smpte170m), SWS_CS_ITU601);
        assert_eq!(sws_colorspace_code(ColorSpace::Bt470bg), SWS_CS_ITU601);
        assert_eq!(sws_colorspace_code(ColorSpace::Bt2020Ncl), SWS_CS_BT2020);
    }

    #[test]
    fn test_scale_checks_geometry() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let Ok(scaler) = Scaler::converter(64, 64, PixelFormat::Yuv420p, PixelFormat::Rgb24)
        else {
            return;
        };
        let other = Frame::alloc_video(32, 32, PixelFormat::Yuv420p).unwrap();
        assert!(matches!(
            scaler.scale(&other),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_convert_yuv_to_rgb() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let Ok(scaler) = Scaler::converter(64, 64, PixelFormat::Yuv420p, PixelFormat::Rgb24)
        else {
            return;
        };
        let mut src = Frame::alloc_video(64, 64, PixelFormat::Yuv420p).unwrap();
        src.set_pts(99);
        let out = scaler.scale(&src).unwrap();
        assert_eq!(out.width(), 64);
        assert_eq!(out.pixel_format(), PixelFormat::Rgb24);
        assert_eq!(out.pts(), 99);
        assert!(!out.is_owned());
    }
}
