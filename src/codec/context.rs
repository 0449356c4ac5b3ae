//! Codec context and codec parameters wrappers
//!
//! Configuration deliberately avoids raw struct pokes wherever FFmpeg offers
//! a safer channel: most fields go through `AVCodecParameters` +
//! `avcodec_parameters_to_context` or the AVOptions setter API, leaving only
//! the handful with neither (time base, dimensions read-back) on the
//! versioned offset tables.

use std::ffi::CString;
use std::os::raw::c_int;

use crate::error::{check, Error, Result};
use crate::ffi::error::AVERROR_OPTION_NOT_FOUND;
use crate::ffi::offsets;
use crate::ffi::shim;
use crate::ffi::types::{
    AVCodec, AVCodecContext, AVCodecParameters, CodecId, MediaKind, AV_CHANNEL_ORDER_NATIVE,
};
use crate::init::Ffmpeg;
use crate::rational::Rational;

use super::dict::Dictionary;
use super::frame::Frame;
use super::packet::Packet;

/// Search codec private options too (`AV_OPT_SEARCH_CHILDREN`).
const OPT_SEARCH_CHILDREN: c_int = 1;

// ============================================================================
// Codec Parameters
// ============================================================================

/// Wrapper around `AVCodecParameters`, owned or borrowed from a stream.
pub struct Parameters {
    ptr: *mut AVCodecParameters,
    owned: bool,
    av: &'static Ffmpeg,
}

unsafe impl Send for Parameters {}

impl Parameters {
    pub fn alloc() -> Result<Self> {
        let av = Ffmpeg::get()?;
        let ptr = unsafe { (av.avcodec.avcodec_parameters_alloc)() };
        if ptr.is_null() {
            return Err(Error::OutOfMemory("AVCodecParameters"));
        }
        Ok(Self {
            ptr,
            owned: true,
            av,
        })
    }

    /// Borrow parameters owned by a stream or filter.
    pub(crate) unsafe fn borrowed(ptr: *mut AVCodecParameters, av: &'static Ffmpeg) -> Self {
        Self {
            ptr,
            owned: false,
            av,
        }
    }

    /// Owned deep copy.
    pub fn try_clone(&self) -> Result<Parameters> {
        let copy = Parameters::alloc()?;
        let ret = unsafe { (self.av.avcodec.avcodec_parameters_copy)(copy.ptr, self.ptr) };
        check("avcodec_parameters_copy", ret)?;
        Ok(copy)
    }

    /// Copy into another parameters struct.
    pub fn copy_into(&self, dst: &mut Parameters) -> Result<()> {
        let ret = unsafe { (self.av.avcodec.avcodec_parameters_copy)(dst.ptr, self.ptr) };
        check("avcodec_parameters_copy", ret)?;
        Ok(())
    }

    pub(crate) fn as_ptr(&self) -> *const AVCodecParameters {
        self.ptr
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut AVCodecParameters {
        self.ptr
    }

    fn o(&self) -> &offsets::CodecParOffsets {
        &self.av.offsets.par
    }

    pub fn media_kind(&self) -> MediaKind {
        MediaKind::from_raw(unsafe { offsets::read(self.ptr.cast(), self.o().codec_type) })
    }

    pub fn codec_id(&self) -> CodecId {
        CodecId::from_raw(unsafe { offsets::read(self.ptr.cast(), self.o().codec_id) })
    }

    pub fn width(&self) -> u32 {
        let w: c_int = unsafe { offsets::read(self.ptr.cast(), self.o().width) };
        w.max(0) as u32
    }

    pub fn height(&self) -> u32 {
        let h: c_int = unsafe { offsets::read(self.ptr.cast(), self.o().height) };
        h.max(0) as u32
    }

    pub fn format_raw(&self) -> c_int {
        unsafe { offsets::read(self.ptr.cast(), self.o().format) }
    }

    pub fn bit_rate(&self) -> i64 {
        unsafe { offsets::read(self.ptr.cast(), self.o().bit_rate) }
    }

    pub fn sample_rate(&self) -> u32 {
        let r: c_int = unsafe { offsets::read(self.ptr.cast(), self.o().sample_rate) };
        r.max(0) as u32
    }

    pub fn frame_size(&self) -> c_int {
        unsafe { offsets::read(self.ptr.cast(), self.o().frame_size) }
    }

    pub fn sample_aspect_ratio(&self) -> Rational {
        unsafe { offsets::read(self.ptr.cast(), self.o().sample_aspect_ratio) }
    }

    /// Channel count; mask popcount only trusted for native-order layouts.
    pub fn channels(&self) -> u32 {
        let o = self.o();
        let nb: c_int = unsafe { offsets::read(self.ptr.cast(), o.ch_nb) };
        if nb > 0 {
            return nb as u32;
        }
        let mask: u64 = unsafe { offsets::read(self.ptr.cast(), o.ch_mask) };
        match o.ch_order {
            Some(order_off) => {
                let order: c_int = unsafe { offsets::read(self.ptr.cast(), order_off) };
                if order == AV_CHANNEL_ORDER_NATIVE {
                    mask.count_ones()
                } else {
                    0
                }
            }
            None => mask.count_ones(),
        }
    }

    pub fn channel_mask(&self) -> u64 {
        unsafe { offsets::read(self.ptr.cast(), self.o().ch_mask) }
    }

    /// Codec extradata (avcC, hvcC, …) copied into host storage.
    pub fn extradata(&self) -> Option<Vec<u8>> {
        let data: *const u8 = unsafe { offsets::read(self.ptr.cast(), self.o().extradata) };
        let size: c_int = unsafe { offsets::read(self.ptr.cast(), self.o().extradata_size) };
        if data.is_null() || size <= 0 {
            return None;
        }
        Some(unsafe { std::slice::from_raw_parts(data, size as usize) }.to_vec())
    }

    // ------------------------------------------------------------------
    // Writers (encoder/stream-copy configuration)
    // ------------------------------------------------------------------

    pub fn set_media_kind(&mut self, kind: MediaKind) {
        unsafe { offsets::write(self.ptr.cast(), self.o().codec_type, kind.as_raw()) }
    }

    pub fn set_codec_id(&mut self, id: CodecId) {
        unsafe { offsets::write(self.ptr.cast(), self.o().codec_id, id.as_raw()) }
    }

    /// Clear the container-specific codec tag (needed for cross-container
    /// stream copy).
    pub fn clear_codec_tag(&mut self) {
        unsafe { offsets::write(self.ptr.cast(), self.o().codec_tag, 0u32) }
    }

    pub fn set_dimensions(&mut self, width: u32, height: u32) {
        unsafe {
            offsets::write(self.ptr.cast(), self.o().width, width as c_int);
            offsets::write(self.ptr.cast(), self.o().height, height as c_int);
        }
    }

    pub fn set_format_raw(&mut self, format: c_int) {
        unsafe { offsets::write(self.ptr.cast(), self.o().format, format) }
    }

    pub fn set_bit_rate(&mut self, bit_rate: i64) {
        unsafe { offsets::write(self.ptr.cast(), self.o().bit_rate, bit_rate) }
    }

    pub fn set_sample_rate(&mut self, rate: u32) {
        unsafe { offsets::write(self.ptr.cast(), self.o().sample_rate, rate as c_int) }
    }

    pub fn set_channel_layout(&mut self, channels: u32, mask: u64) {
        let o = self.o();
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
}

impl Drop for Parameters {
    fn drop(&mut self) {
        if self.owned && !self.ptr.is_null() {
            unsafe { (self.av.avcodec.avcodec_parameters_free)(&mut self.ptr) };
        }
    }
}

// ============================================================================
// Codec Context
// ============================================================================

/// A decoder or encoder instance. The send/receive protocol is symmetric;
/// one context is strictly one or the other.
pub struct CodecContext {
    ptr: *mut AVCodecContext,
    codec: *const AVCodec,
    opened: bool,
    av: &'static Ffmpeg,
}

unsafe impl Send for CodecContext {}

impl CodecContext {
    fn alloc(codec: *const AVCodec, missing: Error) -> Result<Self> {
        if codec.is_null() {
            return Err(missing);
        }
        let av = Ffmpeg::get()?;
        let ptr = unsafe { (av.avcodec.avcodec_alloc_context3)(codec) };
        if ptr.is_null() {
            return Err(Error::OutOfMemory("AVCodecContext"));
        }
        Ok(Self {
            ptr,
            codec,
            opened: false,
            av,
        })
    }

    pub fn decoder_for(id: CodecId) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let codec = unsafe { (av.avcodec.avcodec_find_decoder)(id.as_raw()) };
        Self::alloc(codec, Error::DecoderNotFound(id))
    }

    pub fn decoder_by_name(name: &str) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let c_name = CString::new(name).map_err(|_| Error::InvalidArgument("NUL in name"))?;
        let codec = unsafe { (av.avcodec.avcodec_find_decoder_by_name)(c_name.as_ptr()) };
        Self::alloc(codec, Error::DecoderNotFound(CodecId::None))
    }

    pub fn encoder_for(id: CodecId) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let codec = unsafe { (av.avcodec.avcodec_find_encoder)(id.as_raw()) };
        Self::alloc(codec, Error::EncoderNotFound(format!("{id:?}")))
    }

    pub fn encoder_by_name(name: &str) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let c_name = CString::new(name).map_err(|_| Error::InvalidArgument("NUL in name"))?;
        let codec = unsafe { (av.avcodec.avcodec_find_encoder_by_name)(c_name.as_ptr()) };
        Self::alloc(codec, Error::EncoderNotFound(name.to_string()))
    }

    pub(crate) fn as_mut_ptr(&mut self) -> *mut AVCodecContext {
        self.ptr
    }

    pub fn is_open(&self) -> bool {
        self.opened
    }

    /// Apply stream parameters (decoder setup, or encoder seeding).
    pub fn apply_parameters(&mut self, par: &Parameters) -> Result<()> {
        let ret =
            unsafe { (self.av.avcodec.avcodec_parameters_to_context)(self.ptr, par.as_ptr()) };
        check("avcodec_parameters_to_context", ret)?;
        Ok(())
    }

    /// Export the context's current parameters.
    pub fn parameters(&self) -> Result<Parameters> {
        let mut par = Parameters::alloc()?;
        let ret = unsafe {
            (self.av.avcodec.avcodec_parameters_from_context)(par.as_mut_ptr(), self.ptr)
        };
        check("avcodec_parameters_from_context", ret)?;
        Ok(par)
    }

    /// Set a generic or codec-private option; unknown keys are an error.
    pub fn set_opt(&mut self, name: &str, value: &str) -> Result<()> {
        let name = CString::new(name).map_err(|_| Error::InvalidArgument("NUL in option"))?;
        let value = CString::new(value).map_err(|_| Error::InvalidArgument("NUL in option"))?;
        let ret = unsafe {
            (self.av.avutil.av_opt_set)(
                self.ptr.cast(),
                name.as_ptr(),
                value.as_ptr(),
                OPT_SEARCH_CHILDREN,
            )
        };
        check("av_opt_set", ret)?;
        Ok(())
    }

    /// Best-effort option: a key this codec does not recognize is logged and
    /// ignored.
    pub fn set_opt_best_effort(&mut self, name: &str, value: &str) -> Result<()> {
        match self.set_opt(name, value) {
            Err(Error::Ffmpeg { code, .. }) if code == AVERROR_OPTION_NOT_FOUND => {
                tracing::debug!(option = name, "codec does not recognize option; skipped");
                Ok(())
            }
            other => other,
        }
    }

    pub fn set_opt_int(&mut self, name: &str, value: i64) -> Result<()> {
        let name = CString::new(name).map_err(|_| Error::InvalidArgument("NUL in option"))?;
        let ret = unsafe {
            (self.av.avutil.av_opt_set_int)(self.ptr.cast(), name.as_ptr(), value, OPT_SEARCH_CHILDREN)
        };
        check("av_opt_set_int", ret)?;
        Ok(())
    }

    /// Turn on codec flags by AVOptions name (e.g. `+global_header`).
    pub fn enable_flags(&mut self, flags: &str) -> Result<()> {
        self.set_opt("flags", &format!("+{flags}"))
    }

    pub fn set_time_base(&mut self, tb: Rational) {
        unsafe { offsets::write(self.ptr.cast(), self.av.offsets.ctx.time_base, tb) }
    }

    pub fn time_base(&self) -> Rational {
        unsafe { offsets::read(self.ptr.cast(), self.av.offsets.ctx.time_base) }
    }

    pub fn width(&self) -> u32 {
        let w: c_int = unsafe { offsets::read(self.ptr.cast(), self.av.offsets.ctx.width) };
        w.max(0) as u32
    }

    pub fn height(&self) -> u32 {
        let h: c_int = unsafe { offsets::read(self.ptr.cast(), self.av.offsets.ctx.height) };
        h.max(0) as u32
    }

    pub fn pix_fmt_raw(&self) -> c_int {
        unsafe { offsets::read(self.ptr.cast(), self.av.offsets.ctx.pix_fmt) }
    }

    /// Encoder frame rate; falls back to the AVOptions path when the shim is
    /// absent and the codec exposes the option.
    pub fn set_framerate(&mut self, rate: Rational) -> Result<()> {
        match shim::ctx_set_framerate(self.ptr, rate) {
            Ok(()) => Ok(()),
            Err(Error::ShimUnavailable(_)) => {
                self.set_opt_best_effort("framerate", &format!("{}/{}", rate.num, rate.den))
            }
            Err(e) => Err(e),
        }
    }

    /// Time base of incoming packets (decoder timestamp bookkeeping).
    pub fn set_pkt_timebase(&mut self, tb: Rational) {
        if shim::ctx_set_pkt_timebase(self.ptr, tb).is_err() {
            // Decoders work without it; timestamps then pass through as-is.
            tracing::trace!("pkt_timebase not set (shim unavailable)");
        }
    }

    /// Audio frame size required by the opened encoder (0 = unrestricted).
    pub fn frame_size(&self) -> Result<c_int> {
        Ok(self.parameters()?.frame_size())
    }

    /// Open the context. The options dictionary is consumed by FFmpeg; any
    /// unrecognized entries left behind are logged.
    pub fn open(&mut self, mut options: Option<&mut Dictionary>) -> Result<()> {
        let opts_ptr = options
            .as_deref_mut()
            .map_or(std::ptr::null_mut(), |d| d.as_inout());
        let ret = unsafe { (self.av.avcodec.avcodec_open2)(self.ptr, self.codec, opts_ptr) };
        check("avcodec_open2", ret)?;
        self.opened = true;
        if let Some(dict) = options {
            for (key, value) in dict.entries() {
                tracing::debug!(key, value, "codec ignored option");
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Send/receive
    // ------------------------------------------------------------------

    /// Feed a packet to a decoder; `None` starts the drain.
    pub fn send_packet(&mut self, packet: Option<&Packet>) -> Result<()> {
        let ptr = packet.map_or(std::ptr::null(), |p| p.as_ptr());
        let ret = unsafe { (self.av.avcodec.avcodec_send_packet)(self.ptr, ptr) };
        check("avcodec_send_packet", ret)?;
        Ok(())
    }

    /// Pull a decoded frame; `Again`/`Eof` are protocol signals.
    pub fn receive_frame(&mut self, frame: &mut Frame) -> Result<()> {
        let ret = unsafe { (self.av.avcodec.avcodec_receive_frame)(self.ptr, frame.as_mut_ptr()) };
        check("avcodec_receive_frame", ret)?;
        Ok(())
    }

    /// Feed a frame to an encoder; `None` starts the drain.
    pub fn send_frame(&mut self, frame: Option<&Frame>) -> Result<()> {
        let ptr = frame.map_or(std::ptr::null(), |f| f.as_ptr());
        let ret = unsafe { (self.av.avcodec.avcodec_send_frame)(self.ptr, ptr) };
        check("avcodec_send_frame", ret)?;
        Ok(())
    }

    /// Pull an encoded packet; `Again`/`Eof` are protocol signals.
    pub fn receive_packet(&mut self, packet: &mut Packet) -> Result<()> {
        let ret =
            unsafe { (self.av.avcodec.avcodec_receive_packet)(self.ptr, packet.as_mut_ptr()) };
        check("avcodec_receive_packet", ret)?;
        Ok(())
    }

    /// Reset internal state after a seek.
    pub fn flush(&mut self) {
        if self.opened {
            unsafe { (self.av.avcodec.avcodec_flush_buffers)(self.ptr) };
        }
    }
}

impl Drop for CodecContext {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { (self.av.avcodec.avcodec_free_context)(&mut self.ptr) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_decoder_is_typed_error() {
        if Ffmpeg::get().is_err() {
            return;
        }
        assert!(matches!(
            CodecContext::decoder_by_name("definitely-not-a-codec"),
            Err(Error::DecoderNotFound(_))
        ));
        assert!(matches!(
            CodecContext::encoder_by_name("definitely-not-a-codec"),
            Err(Error::EncoderNotFound(_))
        ));
    }

    #[test]
    fn test_time_base_round_trip() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let Ok(mut ctx) = CodecContext::decoder_for(CodecId::H264) else {
            return; // build without H.264
        };
        ctx.set_time_base(Rational::new(1, 30));
        assert_eq!(ctx.time_base(), Rational::new(1, 30));
    }

    #[test]
    fn test_parameters_round_trip() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let Ok(mut par) = Parameters::alloc() else {
            return;
        };
        par.set_media_kind(MediaKind::Video);
        par.set_codec_id(CodecId::H264);
        par.set_dimensions(1280, 720);
        par.set_bit_rate(2_000_000);
        assert_eq!(par.media_kind(), MediaKind::Video);
        assert_eq!(par.codec_id(), CodecId::H264);
        assert_eq!(par.width(), 1280);
        assert_eq!(par.height(), 720);
        assert_eq!(par.bit_rate(), 2_000_000);

        let copy = par.try_clone().unwrap();
        assert_eq!(copy.width(), 1280);
    }

    #[test]
    fn test_channel_layout_popcount_gating() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let Ok(mut par) = Parameters::alloc() else {
            return;
        };
        par.set_media_kind(MediaKind::Audio);
        par.set_channel_layout(2, 0x3);
        assert_eq!(par.channels(), 2);
        assert_eq!(par.channel_mask(), 0x3);
    }
}
