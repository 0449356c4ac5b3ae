//! Bitstream filters
//!
//! Packet-to-packet transforms such as `h264_mp4toannexb`, `aac_adtstoasc`
//! or `extract_extradata`, driven by the same send/receive drain protocol as
//! the codecs.

use std::ffi::CString;

use parking_lot::Mutex;

use crate::codec::context::Parameters;
use crate::codec::packet::Packet;
use crate::error::{check, Error, Result};
use crate::ffi::error::AVERROR_BSF_NOT_FOUND;
use crate::ffi::offsets;
use crate::ffi::types::{AVBSFContext, AVCodecParameters};
use crate::init::Ffmpeg;
use crate::rational::Rational;

struct BsfInner {
    ptr: *mut AVBSFContext,
    av: &'static Ffmpeg,
}

unsafe impl Send for BsfInner {}

/// A bitstream filter instance.
pub struct BitstreamFilter {
    inner: Mutex<BsfInner>,
}

impl BitstreamFilter {
    /// Create a filter by name, seed it with the input stream's codec
    /// parameters and time base, and initialize it.
    pub fn new(name: &str, input: &Parameters, time_base: Rational) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let c_name = CString::new(name).map_err(|_| Error::InvalidArgument("NUL in name"))?;
        let filter = unsafe { (av.avcodec.av_bsf_get_by_name)(c_name.as_ptr()) };
        if filter.is_null() {
            return Err(Error::Ffmpeg {
                op: "av_bsf_get_by_name",
                code: AVERROR_BSF_NOT_FOUND,
                message: format!("bitstream filter '{name}' not found"),
            });
        }

        let mut ptr: *mut AVBSFContext = std::ptr::null_mut();
        let ret = unsafe { (av.avcodec.av_bsf_alloc)(filter, &mut ptr) };
        check("av_bsf_alloc", ret)?;

        let result = (|| -> Result<()> {
            // par_in is allocated by av_bsf_alloc; fill it from the input.
            let par_in: *mut AVCodecParameters =
                unsafe { offsets::read(ptr.cast(), av.offsets.bsf.par_in) };
            let ret =
                unsafe { (av.avcodec.avcodec_parameters_copy)(par_in, input.as_ptr()) };
            check("avcodec_parameters_copy", ret)?;
            unsafe { offsets::write(ptr.cast(), av.offsets.bsf.time_base_in, time_base) };
            let ret = unsafe { (av.avcodec.av_bsf_init)(ptr) };
            check("av_bsf_init", ret)?;
            Ok(())
        })();
        if let Err(e) = result {
            let mut ptr = ptr;
            unsafe { (av.avcodec.av_bsf_free)(&mut ptr) };
            return Err(e);
        }

        Ok(Self {
            inner: Mutex::new(BsfInner { ptr, av }),
        })
    }

    /// Post-init output codec parameters (reflecting the filter's changes).
    pub fn output_parameters(&self) -> Result<Parameters> {
        let inner = self.inner.lock();
        let par_out: *mut AVCodecParameters =
            unsafe { offsets::read(inner.ptr.cast(), inner.av.offsets.bsf.par_out) };
        unsafe { Parameters::borrowed(par_out, inner.av) }.try_clone()
    }

    /// Post-init output time base.
    pub fn output_time_base(&self) -> Rational {
        let inner = self.inner.lock();
        unsafe { offsets::read(inner.ptr.cast(), inner.av.offsets.bsf.time_base_out) }
    }

    /// Feed a packet (the filter takes its reference); `None` starts the
    /// drain.
    pub fn send(&self, packet: Option<&mut Packet>) -> Result<()> {
        let inner = self.inner.lock();
        let ptr = packet.map_or(std::ptr::null_mut(), |p| p.as_mut_ptr());
        let ret = unsafe { (inner.av.avcodec.av_bsf_send_packet)(inner.ptr, ptr) };
        check("av_bsf_send_packet", ret)?;
        Ok(())
    }

    /// Pull the next filtered packet; `Again`/`Eof` are protocol signals.
    pub fn receive(&self, packet: &mut Packet) -> Result<()> {
        let inner = self.inner.lock();
        packet.unref();
        let ret = unsafe { (inner.av.avcodec.av_bsf_receive_packet)(inner.ptr, packet.as_mut_ptr()) };
        check("av_bsf_receive_packet", ret)?;
        Ok(())
    }

    /// Convenience: send one packet and collect all output packets it
    /// yields.
    pub fn filter(&self, packet: &mut Packet) -> Result<Vec<Packet>> {
        self.send(Some(packet))?;
        let mut out = Vec::new();
        loop {
            let mut filtered = Packet::alloc()?;
            match self.receive(&mut filtered) {
                Ok(()) => out.push(filtered),
                Err(e) if e.is_again() || e.is_eof() => return Ok(out),
                Err(e) => return Err(e),
            }
        }
    }

    /// Reset internal state (after a seek).
    pub fn flush(&self) {
        let inner = self.inner.lock();
        unsafe { (inner.av.avcodec.av_bsf_flush)(inner.ptr) };
    }
}

impl Drop for BsfInner {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { (self.av.avcodec.av_bsf_free)(&mut self.ptr) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::types::{CodecId, MediaKind};

    #[test]
    fn test_unknown_filter_name() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let Ok(par) = Parameters::alloc() else {
            return;
        };
        assert!(BitstreamFilter::new("not-a-bsf", &par, Rational::new(1, 90000)).is_err());
    }

    #[test]
    fn test_null_bsf_round_trip() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let Ok(mut par) = Parameters::alloc() else {
            return;
        };
        par.set_media_kind(MediaKind::Video);
        par.set_codec_id(CodecId::H264);
        let Ok(bsf) = BitstreamFilter::new("null", &par, Rational::new(1, 90000)) else {
            return;
        };
        assert_eq!(bsf.output_time_base(), Rational::new(1, 90000));
        assert_eq!(bsf.output_parameters().unwrap().codec_id(), CodecId::H264);
    }
}
