//! Safe wrapper around FFmpeg AVFrame
//!
//! A `Frame` is either **owned** (released by its destructor) or **borrowed**
//! (another component owns the underlying handle and will reuse it). A
//! borrowed frame is valid only until the producing component's next
//! operation; clone it to keep it longer. Releasing a borrowed frame returns
//! `InvalidArgument` and never frees.

use std::os::raw::c_int;

use crate::callback;
use crate::error::{check, Error, Result};
use crate::ffi::offsets::{self, FramePrefix};
use crate::ffi::types::{
    frame_flag, AVFrame, ColorPrimaries, ColorRange, ColorSpace, ColorTransfer, MediaKind,
    PixelFormat, SampleFormat, AV_CHANNEL_ORDER_NATIVE, AV_NOPTS_VALUE,
};
use crate::init::Ffmpeg;
use crate::rational::Rational;

use super::buffer;

#[cfg(test)]
use std::sync::atomic::{AtomicI64, Ordering};

/// Allocation/release pairing observed by tests.
#[cfg(test)]
pub(crate) static LIVE_FRAMES: AtomicI64 = AtomicI64::new(0);

/// Number of planes wrap-supported formats use, with their byte layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PlaneLayout {
    pub planes: usize,
    pub linesize: [usize; 3],
    pub offset: [usize; 3],
    pub total: usize,
}

/// Byte layout for wrapping a contiguous host buffer as a frame.
pub(crate) fn plane_layout(format: PixelFormat, width: u32, height: u32) -> Result<PlaneLayout> {
    let (w, h) = (width as usize, height as usize);
    match format {
        PixelFormat::Rgb24 => Ok(PlaneLayout {
            planes: 1,
            linesize: [w * 3, 0, 0],
            offset: [0, 0, 0],
            total: w * 3 * h,
        }),
        PixelFormat::Rgba | PixelFormat::Bgra => Ok(PlaneLayout {
            planes: 1,
            linesize: [w * 4, 0, 0],
            offset: [0, 0, 0],
            total: w * 4 * h,
        }),
        PixelFormat::Yuv420p => {
            let chroma = (w / 2) * (h / 2);
            Ok(PlaneLayout {
                planes: 3,
                linesize: [w, w / 2, w / 2],
                offset: [0, w * h, w * h + chroma],
                total: w * h + 2 * chroma,
            })
        }
        PixelFormat::Nv12 => Ok(PlaneLayout {
            planes: 2,
            linesize: [w, w, 0],
            offset: [0, w * h, 0],
            total: w * h + w * (h / 2),
        }),
        _ => Err(Error::InvalidArgument(
            "unsupported pixel format for buffer wrapping",
        )),
    }
}

/// Safe wrapper around AVFrame.
pub struct Frame {
    ptr: *mut AVFrame,
    owned: bool,
    av: &'static Ffmpeg,
}

// SAFETY: the wrapped handle is only touched through &mut self or the
// documented borrow contract.
unsafe impl Send for Frame {}

impl Frame {
    /// Allocate a new owned, empty frame shell.
    pub fn alloc() -> Result<Self> {
        let av = Ffmpeg::get()?;
        let ptr = unsafe { (av.avutil.av_frame_alloc)() };
        if ptr.is_null() {
            return Err(Error::OutOfMemory("AVFrame"));
        }
        #[cfg(test)]
        LIVE_FRAMES.fetch_add(1, Ordering::SeqCst);
        Ok(Self {
            ptr,
            owned: true,
            av,
        })
    }

    /// Allocate an owned video frame with data buffers (32-byte aligned).
    pub fn alloc_video(width: u32, height: u32, format: PixelFormat) -> Result<Self> {
        let mut frame = Self::alloc()?;
        frame.set_width(width);
        frame.set_height(height);
        frame.set_format(format.as_raw());
        let ret = unsafe { (frame.av.avutil.av_frame_get_buffer)(frame.ptr, 32) };
        check("av_frame_get_buffer", ret)?;
        Ok(frame)
    }

    /// Allocate an owned audio frame with data buffers.
    pub fn alloc_audio(
        sample_rate: u32,
        channels: u32,
        format: SampleFormat,
        nb_samples: u32,
    ) -> Result<Self> {
        let mut frame = Self::alloc()?;
        frame.set_format(format.as_raw());
        frame.set_nb_samples(nb_samples as c_int);
        frame.set_sample_rate(sample_rate as c_int);
        frame.set_channel_layout(
            channels,
            crate::ffi::types::default_channel_mask(channels),
        );
        let ret = unsafe { (frame.av.avutil.av_frame_get_buffer)(frame.ptr, 0) };
        check("av_frame_get_buffer", ret)?;
        Ok(frame)
    }

    /// Wrap a host-owned contiguous buffer as a video frame without copying.
    ///
    /// The buffer is pinned (counted against the process pinned-bytes
    /// accounting and the optional limit) until the last reference to the
    /// frame's data drops, at which point it is returned to the allocator on
    /// whichever thread dropped it.
    pub fn wrap_buffer(
        buffer: Vec<u8>,
        width: u32,
        height: u32,
        format: PixelFormat,
    ) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let layout = plane_layout(format, width, height)?;
        if buffer.len() < layout.total {
            return Err(Error::InvalidArgument("buffer smaller than plane layout"));
        }

        let len = buffer.len();
        buffer::pin(av, len)?;

        let mut buffer = buffer;
        let data_ptr = buffer.as_mut_ptr();
        let handle = callback::register(callback::Callback::BufferFree(Box::new(move || {
            buffer::unpin(len);
            drop(buffer);
        })));

        let buf_ref = unsafe {
            (av.avutil.av_buffer_create)(
                data_ptr,
                len,
                Some(callback::buffer_free_trampoline),
                callback::id_to_opaque(handle),
                0,
            )
        };
        if buf_ref.is_null() {
            // The registered entry still owns the Vec; run it to unwind.
            unsafe {
                callback::buffer_free_trampoline(callback::id_to_opaque(handle), data_ptr);
            }
            return Err(Error::OutOfMemory("AVBufferRef"));
        }

        let mut frame = match Self::alloc() {
            Ok(frame) => frame,
            Err(e) => {
                let mut r = buf_ref;
                unsafe { (av.avutil.av_buffer_unref)(&mut r) };
                return Err(e);
            }
        };
        frame.set_width(width);
        frame.set_height(height);
        frame.set_format(format.as_raw());
        unsafe {
            offsets::write(frame.ptr.cast(), av.offsets.frame.buf0, buf_ref);
            let prefix = &mut *frame.ptr.cast::<FramePrefix>();
            for plane in 0..layout.planes {
                prefix.data[plane] = data_ptr.add(layout.offset[plane]);
                prefix.linesize[plane] = layout.linesize[plane] as c_int;
            }
        }
        Ok(frame)
    }

    /// A borrowed view of this frame's handle, for returning to callers that
    /// must not retain it past the next operation.
    pub(crate) fn borrowed_view(&self) -> Frame {
        Frame {
            ptr: self.ptr,
            owned: false,
            av: self.av,
        }
    }

    /// Whether the destructor will release this frame.
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    #[inline]
    pub fn as_ptr(&self) -> *const AVFrame {
        self.ptr
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut AVFrame {
        self.ptr
    }

    /// Release data buffers but keep the shell for reuse.
    pub fn unref(&mut self) {
        if !self.ptr.is_null() {
            unsafe { (self.av.avutil.av_frame_unref)(self.ptr) };
        }
    }

    /// Owned, data-sharing copy: bumps the underlying buffer refcounts, no
    /// byte copy.
    pub fn try_clone(&self) -> Result<Frame> {
        if self.ptr.is_null() {
            return Err(Error::InvalidArgument("frame already released"));
        }
        let ptr = unsafe { (self.av.avutil.av_frame_clone)(self.ptr) };
        if ptr.is_null() {
            return Err(Error::OutOfMemory("AVFrame clone"));
        }
        #[cfg(test)]
        LIVE_FRAMES.fetch_add(1, Ordering::SeqCst);
        Ok(Frame {
            ptr,
            owned: true,
            av: self.av,
        })
    }

    /// Release an owned frame now. Releasing a borrowed frame returns
    /// `InvalidArgument` and leaves the wrapper untouched; releasing twice is
    /// a no-op.
    pub fn free(&mut self) -> Result<()> {
        if !self.owned {
            return Err(Error::InvalidArgument("cannot free a borrowed frame"));
        }
        if !self.ptr.is_null() {
            unsafe { (self.av.avutil.av_frame_free)(&mut self.ptr) };
            self.ptr = std::ptr::null_mut();
            #[cfg(test)]
            LIVE_FRAMES.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }

    // ========================================================================
    // Stable-prefix fields
    // ========================================================================

    fn prefix(&self) -> &FramePrefix {
        unsafe { &*self.ptr.cast::<FramePrefix>() }
    }

    fn prefix_mut(&mut self) -> &mut FramePrefix {
        unsafe { &mut *self.ptr.cast::<FramePrefix>() }
    }

    pub fn width(&self) -> u32 {
        self.prefix().width as u32
    }

    pub fn height(&self) -> u32 {
        self.prefix().height as u32
    }

    pub fn set_width(&mut self, width: u32) {
        self.prefix_mut().width = width as c_int;
    }

    pub fn set_height(&mut self, height: u32) {
        self.prefix_mut().height = height as c_int;
    }

    pub fn format_raw(&self) -> c_int {
        self.prefix().format
    }

    pub fn set_format(&mut self, format: c_int) {
        self.prefix_mut().format = format;
    }

    pub fn pixel_format(&self) -> PixelFormat {
        PixelFormat::from_raw(self.format_raw())
    }

    pub fn sample_format(&self) -> SampleFormat {
        SampleFormat::from_raw(self.format_raw())
    }

    pub fn nb_samples(&self) -> c_int {
        self.prefix().nb_samples
    }

    pub fn set_nb_samples(&mut self, nb_samples: c_int) {
        self.prefix_mut().nb_samples = nb_samples;
    }

    /// Whether this frame currently carries video-shaped data.
    pub fn media_kind(&self) -> MediaKind {
        if self.prefix().width > 0 {
            MediaKind::Video
        } else {
            MediaKind::Audio
        }
    }

    pub fn data(&self, plane: usize) -> *const u8 {
        self.prefix().data[plane]
    }

    pub fn data_mut(&mut self, plane: usize) -> *mut u8 {
        self.prefix_mut().data[plane]
    }

    pub fn linesize(&self, plane: usize) -> c_int {
        self.prefix().linesize[plane]
    }

    /// One row-major plane as a byte slice. Returns `None` when the plane is
    /// unset.
    pub fn plane(&self, plane: usize, plane_height: usize) -> Option<&[u8]> {
        let ptr = self.prefix().data[plane];
        if ptr.is_null() {
            return None;
        }
        let len = self.prefix().linesize[plane] as usize * plane_height;
        Some(unsafe { std::slice::from_raw_parts(ptr, len) })
    }

    // ========================================================================
    // Versioned fields (through the offset tables)
    // ========================================================================

    pub fn pts(&self) -> i64 {
        unsafe { offsets::read(self.ptr.cast(), self.av.offsets.frame.pts) }
    }

    pub fn set_pts(&mut self, pts: i64) {
        unsafe { offsets::write(self.ptr.cast(), self.av.offsets.frame.pts, pts) }
    }

    /// Whether the presentation timestamp is present (not the no-PTS
    /// sentinel).
    pub fn has_pts(&self) -> bool {
        self.pts() != AV_NOPTS_VALUE
    }

    pub fn pkt_dts(&self) -> i64 {
        unsafe { offsets::read(self.ptr.cast(), self.av.offsets.frame.pkt_dts) }
    }

    pub fn best_effort_timestamp(&self) -> i64 {
        unsafe {
            offsets::read(
                self.ptr.cast(),
                self.av.offsets.frame.best_effort_timestamp,
            )
        }
    }

    pub fn time_base(&self) -> Option<Rational> {
        let off = self.av.offsets.frame.time_base?;
        Some(unsafe { offsets::read(self.ptr.cast(), off) })
    }

    pub fn set_time_base(&mut self, tb: Rational) {
        if let Some(off) = self.av.offsets.frame.time_base {
            unsafe { offsets::write(self.ptr.cast(), off, tb) }
        }
    }

    pub fn duration(&self) -> Option<i64> {
        let off = self.av.offsets.frame.duration?;
        Some(unsafe { offsets::read(self.ptr.cast(), off) })
    }

    pub fn sample_rate(&self) -> c_int {
        unsafe { offsets::read(self.ptr.cast(), self.av.offsets.frame.sample_rate) }
    }

    pub fn set_sample_rate(&mut self, rate: c_int) {
        unsafe { offsets::write(self.ptr.cast(), self.av.offsets.frame.sample_rate, rate) }
    }

    /// Channel count, preferring the explicit field over mask popcount for
    /// non-native orderings.
    pub fn channels(&self) -> u32 {
        let o = &self.av.offsets.frame;
        let nb: c_int = unsafe { offsets::read(self.ptr.cast(), o.ch_nb) };
        if nb > 0 {
            return nb as u32;
        }
        let mask: u64 = unsafe { offsets::read(self.ptr.cast(), o.ch_mask) };
        mask.count_ones()
    }

    pub fn channel_mask(&self) -> u64 {
        unsafe { offsets::read(self.ptr.cast(), self.av.offsets.frame.ch_mask) }
    }

    pub fn set_channel_layout(&mut self, channels: u32, mask: u64) {
        let o = &self.av.offsets.frame;
        unsafe {
            if let Some(order) = o.ch_order {
                offsets::write(self.ptr.cast(), order, AV_CHANNEL_ORDER_NATIVE);
                offsets::write(self.ptr.cast(), o.ch_nb, channels as c_int);
                offsets::write(self.ptr.cast(), o.ch_mask, mask);
            } else {
                offsets::write(self.ptr.cast(), o.ch_mask, mask);
                offsets::write(self.ptr.cast(), o.ch_nb, channels as c_int);
            }
        }
    }

    pub fn pict_type(&self) -> c_int {
        unsafe { offsets::read(self.ptr.cast(), self.av.offsets.frame.pict_type) }
    }

    pub fn is_key_frame(&self) -> bool {
        let o = &self.av.offsets.frame;
        if let Some(off) = o.key_frame {
            let key: c_int = unsafe { offsets::read(self.ptr.cast(), off) };
            key != 0
        } else {
            let flags: c_int = unsafe { offsets::read(self.ptr.cast(), o.flags) };
            flags & frame_flag::KEY != 0
        }
    }

    // ------------------------------------------------------------------
    // Colorimetry
    // ------------------------------------------------------------------

    pub fn color_range(&self) -> ColorRange {
        ColorRange::from_raw(unsafe {
            offsets::read(self.ptr.cast(), self.av.offsets.frame.color_range)
        })
    }

    pub fn color_space(&self) -> ColorSpace {
        ColorSpace::from_raw(unsafe {
            offsets::read(self.ptr.cast(), self.av.offsets.frame.colorspace)
        })
    }

    pub fn color_primaries(&self) -> ColorPrimaries {
        ColorPrimaries::from_raw(unsafe {
            offsets::read(self.ptr.cast(), self.av.offsets.frame.color_primaries)
        })
    }

    pub fn color_transfer(&self) -> ColorTransfer {
        ColorTransfer::from_raw(unsafe {
            offsets::read(self.ptr.cast(), self.av.offsets.frame.color_trc)
        })
    }

    pub fn set_color_range(&mut self, range: ColorRange) {
        unsafe {
            offsets::write(
                self.ptr.cast(),
                self.av.offsets.frame.color_range,
                range.as_raw(),
            )
        }
    }

    pub fn set_color_space(&mut self, space: ColorSpace) {
        unsafe {
            offsets::write(
                self.ptr.cast(),
                self.av.offsets.frame.colorspace,
                space.as_raw(),
            )
        }
    }

    /// Whether the pixel data lives on a GPU and must be transferred before
    /// CPU access.
    pub fn is_hardware(&self) -> bool {
        self.pixel_format().is_hardware()
    }

    /// Download a GPU frame into a new software frame.
    pub fn transfer_to_software(&self) -> Result<Frame> {
        let dst = Frame::alloc()?;
        let ret =
            unsafe { (self.av.avutil.av_hwframe_transfer_data)(dst.ptr, self.ptr, 0) };
        check("av_hwframe_transfer_data", ret)?;
        let mut dst = dst;
        dst.set_pts(self.pts());
        Ok(dst)
    }
}

impl Drop for Frame {
    fn drop(&mut self) {
        if self.owned && !self.ptr.is_null() {
            unsafe { (self.av.avutil.av_frame_free)(&mut self.ptr) };
            #[cfg(test)]
            LIVE_FRAMES.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("owned", &self.owned)
            .field("null", &self.ptr.is_null())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plane_layouts_match_contract() {
        let rgb = plane_layout(PixelFormat::Rgb24, 320, 240).unwrap();
        assert_eq!(rgb.planes, 1);
        assert_eq!(rgb.linesize[0], 960);
        assert_eq!(rgb.total, 320 * 240 * 3);

        let rgba = plane_layout(PixelFormat::Rgba, 320, 240).unwrap();
        assert_eq!(rgba.linesize[0], 1280);
        assert_eq!(rgba.total, 320 * 240 * 4);

        let yuv = plane_layout(PixelFormat::Yuv420p, 320, 240).unwrap();
        assert_eq!(yuv.planes, 3);
        assert_eq!(yuv.linesize, [320, 160, 160]);
        assert_eq!(yuv.offset, [0, 320 * 240, 320 * 240 + 160 * 120]);
        assert_eq!(yuv.total, 320 * 240 + 2 * 160 * 120);

        let nv12 = plane_layout(PixelFormat::Nv12, 320, 240).unwrap();
        assert_eq!(nv12.planes, 2);
        assert_eq!(nv12.offset[1], 320 * 240);
        assert_eq!(nv12.total, 320 * 240 + 320 * 120);
    }

    #[test]
    fn test_unsupported_wrap_format() {
        assert!(matches!(
            plane_layout(PixelFormat::Yuv444p, 64, 64),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_alloc_and_fields() {
        let Ok(mut frame) = Frame::alloc() else {
            return; // FFmpeg not installed
        };
        assert!(frame.is_owned());
        frame.set_width(640);
        frame.set_height(480);
        frame.set_format(PixelFormat::Yuv420p.as_raw());
        assert_eq!(frame.width(), 640);
        assert_eq!(frame.height(), 480);
        assert_eq!(frame.pixel_format(), PixelFormat::Yuv420p);

        frame.set_pts(12345);
        assert_eq!(frame.pts(), 12345);
        assert!(frame.has_pts());
    }

    #[test]
    fn test_borrowed_frame_refuses_free() {
        let Ok(owner) = Frame::alloc() else {
            return;
        };
        let mut borrowed = owner.borrowed_view();
        assert!(!borrowed.is_owned());
        assert!(matches!(
            borrowed.free(),
            Err(Error::InvalidArgument(_))
        ));
        // The inner pointer is untouched.
        assert!(!borrowed.as_ptr().is_null());
    }

    #[test]
    fn test_free_is_idempotent() {
        let Ok(mut frame) = Frame::alloc() else {
            return;
        };
        frame.free().unwrap();
        frame.free().unwrap();
        assert!(frame.as_ptr().is_null());
    }

    #[test]
    fn test_alloc_release_pairing() {
        let Ok(frame) = Frame::alloc() else {
            return;
        };
        let before = LIVE_FRAMES.load(Ordering::SeqCst);
        {
            let _clone = frame.try_clone().unwrap();
            assert_eq!(LIVE_FRAMES.load(Ordering::SeqCst), before + 1);
        }
        assert_eq!(LIVE_FRAMES.load(Ordering::SeqCst), before);
    }

    #[test]
    fn test_wrap_buffer_populates_planes() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let (w, h) = (320u32, 240u32);
        let buffer = vec![7u8; (w * h * 3) as usize];
        let pinned_before = buffer::pinned_bytes();
        {
            let frame = Frame::wrap_buffer(buffer, w, h, PixelFormat::Rgb24).unwrap();
            assert_eq!(frame.width(), w);
            assert_eq!(frame.linesize(0), (w * 3) as c_int);
            assert!(!frame.data(0).is_null());
            assert_eq!(unsafe { *frame.data(0) }, 7);
            assert_eq!(buffer::pinned_bytes(), pinned_before + (w * h * 3) as usize);
        }
        // Dropping the frame releases the last reference and unpins.
        assert_eq!(buffer::pinned_bytes(), pinned_before);
    }

    #[test]
    fn test_wrap_buffer_too_small() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let buffer = vec![0u8; 16];
        assert!(matches!(
            Frame::wrap_buffer(buffer, 320, 240, PixelFormat::Rgb24),
            Err(Error::InvalidArgument(_))
        ));
    }
}
