//! Safe wrapper around FFmpeg AVPacket
//!
//! Same borrow/own split as [`super::frame::Frame`]: owned packets release in
//! their destructor, borrowed packets never release. `try_clone` copies the
//! refcount, not the data.

use std::os::raw::c_int;

use crate::error::{check, Error, Result};
use crate::ffi::offsets::PacketPrefix;
use crate::ffi::types::{pkt_flag, AVPacket, AV_NOPTS_VALUE};
use crate::init::Ffmpeg;
use crate::rational::{rescale_q, Rational};

/// Safe wrapper around AVPacket.
pub struct Packet {
    ptr: *mut AVPacket,
    owned: bool,
    av: &'static Ffmpeg,
}

unsafe impl Send for Packet {}

impl Packet {
    /// Allocate a new owned, empty packet shell.
    pub fn alloc() -> Result<Self> {
        let av = Ffmpeg::get()?;
        let ptr = unsafe { (av.avcodec.av_packet_alloc)() };
        if ptr.is_null() {
            return Err(Error::OutOfMemory("AVPacket"));
        }
        Ok(Self {
            ptr,
            owned: true,
            av,
        })
    }

    pub(crate) fn borrowed_view(&self) -> Packet {
        Packet {
            ptr: self.ptr,
            owned: false,
            av: self.av,
        }
    }

    pub fn is_owned(&self) -> bool {
        self.owned
    }

    #[inline]
    pub fn as_ptr(&self) -> *const AVPacket {
        self.ptr
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut AVPacket {
        self.ptr
    }

    /// Wipe the payload, keeping the shell for the next read.
    pub fn unref(&mut self) {
        if !self.ptr.is_null() {
            unsafe { (self.av.avcodec.av_packet_unref)(self.ptr) };
        }
    }

    /// New owned packet referencing the same data (refcount copy, no byte
    /// copy).
    pub fn try_clone(&self) -> Result<Packet> {
        if self.ptr.is_null() {
            return Err(Error::InvalidArgument("packet already released"));
        }
        let ptr = unsafe { (self.av.avcodec.av_packet_clone)(self.ptr) };
        if ptr.is_null() {
            return Err(Error::OutOfMemory("AVPacket clone"));
        }
        Ok(Packet {
            ptr,
            owned: true,
            av: self.av,
        })
    }

    /// Make this shell reference `src`'s data.
    pub fn ref_from(&mut self, src: &Packet) -> Result<()> {
        let ret = unsafe { (self.av.avcodec.av_packet_ref)(self.ptr, src.ptr) };
        check("av_packet_ref", ret)?;
        Ok(())
    }

    /// Release an owned packet now; borrowed packets return
    /// `InvalidArgument` untouched. Idempotent.
    pub fn free(&mut self) -> Result<()> {
        if !self.owned {
            return Err(Error::InvalidArgument("cannot free a borrowed packet"));
        }
        if !self.ptr.is_null() {
            unsafe { (self.av.avcodec.av_packet_free)(&mut self.ptr) };
            self.ptr = std::ptr::null_mut();
        }
        Ok(())
    }

    // ========================================================================
    // Fields (all within the stable prefix)
    // ========================================================================

    fn prefix(&self) -> &PacketPrefix {
        unsafe { &*self.ptr.cast::<PacketPrefix>() }
    }

    fn prefix_mut(&mut self) -> &mut PacketPrefix {
        unsafe { &mut *self.ptr.cast::<PacketPrefix>() }
    }

    pub fn pts(&self) -> i64 {
        self.prefix().pts
    }

    pub fn dts(&self) -> i64 {
        self.prefix().dts
    }

    pub fn set_pts(&mut self, pts: i64) {
        self.prefix_mut().pts = pts;
    }

    pub fn set_dts(&mut self, dts: i64) {
        self.prefix_mut().dts = dts;
    }

    pub fn duration_value(&self) -> i64 {
        self.prefix().duration
    }

    pub fn set_duration(&mut self, duration: i64) {
        self.prefix_mut().duration = duration;
    }

    pub fn stream_index(&self) -> i32 {
        self.prefix().stream_index
    }

    pub fn set_stream_index(&mut self, index: i32) {
        self.prefix_mut().stream_index = index;
    }

    pub fn flags(&self) -> c_int {
        self.prefix().flags
    }

    pub fn is_key(&self) -> bool {
        self.flags() & pkt_flag::KEY != 0
    }

    pub fn size(&self) -> usize {
        self.prefix().size.max(0) as usize
    }

    /// The compressed payload.
    pub fn payload(&self) -> Option<&[u8]> {
        let p = self.prefix();
        if p.data.is_null() || p.size <= 0 {
            return None;
        }
        Some(unsafe { std::slice::from_raw_parts(p.data, p.size as usize) })
    }

    /// Rescale pts/dts/duration from one time base to another.
    pub fn rescale_ts(&mut self, from: Rational, to: Rational) {
        let p = self.prefix_mut();
        if p.pts != AV_NOPTS_VALUE {
            p.pts = rescale_q(p.pts, from, to);
        }
        if p.dts != AV_NOPTS_VALUE {
            p.dts = rescale_q(p.dts, from, to);
        }
        if p.duration > 0 {
            p.duration = rescale_q(p.duration, from, to);
        }
    }
}

impl Drop for Packet {
    fn drop(&mut self) {
        if self.owned && !self.ptr.is_null() {
            unsafe { (self.av.avcodec.av_packet_free)(&mut self.ptr) };
        }
    }
}

impl std::fmt::Debug for Packet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Packet")
            .field("owned", &self.owned)
            .field("null", &self.ptr.is_null())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alloc_fields_round_trip() {
        let Ok(mut pkt) = Packet::alloc() else {
            return;
        };
        pkt.set_pts(100);
        pkt.set_dts(90);
        pkt.set_duration(10);
        pkt.set_stream_index(2);
        assert_eq!(pkt.pts(), 100);
        assert_eq!(pkt.dts(), 90);
        assert_eq!(pkt.duration_value(), 10);
        assert_eq!(pkt.stream_index(), 2);
        assert!(pkt.payload().is_none());
    }

    #[test]
    fn test_rescale_ts() {
        let Ok(mut pkt) = Packet::alloc() else {
            return;
        };
        pkt.set_pts(100);
        pkt.set_dts(98);
        pkt.set_duration(2);
        // 1/100 -> 1/90000: multiply by 900
        pkt.rescale_ts(Rational::new(1, 100), Rational::new(1, 90000));
        assert_eq!(pkt.pts(), 90_000);
        assert_eq!(pkt.dts(), 88_200);
        assert_eq!(pkt.duration_value(), 1800);
    }

    #[test]
    fn test_rescale_keeps_nopts() {
        let Ok(mut pkt) = Packet::alloc() else {
            return;
        };
        // Freshly allocated packets carry the no-PTS sentinel.
        pkt.rescale_ts(Rational::new(1, 100), Rational::new(1, 1000));
        assert_eq!(pkt.pts(), AV_NOPTS_VALUE);
    }

    #[test]
    fn test_borrowed_packet_refuses_free() {
        let Ok(owner) = Packet::alloc() else {
            return;
        };
        let mut borrowed = owner.borrowed_view();
        assert!(matches!(
            borrowed.free(),
            Err(Error::InvalidArgument(_))
        ));
        assert!(!borrowed.as_ptr().is_null());
    }
}
