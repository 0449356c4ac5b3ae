//! Decoding pipeline
//!
//! Turns a URL, capture device or custom I/O source into a lazy sequence of
//! decoded frames. Frames returned by `decode_video`, `decode_audio` and
//! `read_frame` are **borrowed**: the decoder owns and reuses them on the
//! next call. Use the `*_copy` variants (or `Frame::try_clone`) to keep one.

use std::ffi::c_void;

use parking_lot::Mutex;

use crate::codec::context::CodecContext;
use crate::codec::demuxer::Demuxer;
use crate::codec::frame::Frame;
use crate::codec::io::IoContext;
use crate::codec::packet::Packet;
use crate::error::{Error, Result};
use crate::ffi::error::AVERROR_EINVAL;
use crate::ffi::shim;
use crate::ffi::types::{HwDeviceType, MediaKind, AV_TIME_BASE_Q};
use crate::hwaccel::HwDevice;
use crate::init::Ffmpeg;
use crate::options::DecoderOptions;
use crate::rational::rescale_q;
use crate::stream::StreamInfo;

/// One opened stream decoder.
struct StreamDecoder {
    ctx: CodecContext,
    stream_index: u32,
    /// Keeps the hardware device alive while the codec uses it.
    _hw: Option<HwDevice>,
    hw_format: Option<i32>,
    /// Destination for GPU→CPU transfers, reused per call.
    sw_frame: Option<Frame>,
    drained: bool,
}

struct DecoderInner {
    demuxer: Option<Demuxer>,
    video: Option<StreamDecoder>,
    audio: Option<StreamDecoder>,
    /// Reusable shells for the read/decode loops.
    packet: Packet,
    frame: Frame,
    /// A packet the codec refused with Again; resent before new input.
    packet_pending: bool,
    flush_sent: bool,
    video_stream: Option<StreamInfo>,
    audio_stream: Option<StreamInfo>,
    hw_device_type: Option<HwDeviceType>,
}

/// Decode video files, streams and devices.
pub struct Decoder {
    inner: Mutex<DecoderInner>,
}

/// A decoded frame tagged with its media kind, as produced by
/// [`Decoder::read_frame`]. The frame is borrowed.
pub struct DecodedFrame {
    pub kind: MediaKind,
    pub frame: Frame,
}

impl Decoder {
    /// Open a URL (file path or protocol URL).
    pub fn open(url: &str, mut options: DecoderOptions) -> Result<Self> {
        Ffmpeg::get()?;
        let mut dict = options.open_dictionary()?;
        let demuxer = Demuxer::open(
            url,
            options.format.as_deref(),
            Some(&mut dict),
            options.interrupt.take(),
        )?;
        Self::from_demuxer(demuxer, options)
    }

    /// Open over custom I/O callbacks.
    pub fn open_from_io(io: IoContext, options: DecoderOptions) -> Result<Self> {
        Ffmpeg::get()?;
        let mut dict = options.open_dictionary()?;
        let demuxer = Demuxer::open_io(io, options.format.as_deref(), Some(&mut dict))?;
        Self::from_demuxer(demuxer, options)
    }

    /// Open an in-memory byte vector.
    pub fn open_bytes(bytes: Vec<u8>, options: DecoderOptions) -> Result<Self> {
        Self::open_from_io(IoContext::from_bytes(bytes)?, options)
    }

    fn from_demuxer(mut demuxer: Demuxer, options: DecoderOptions) -> Result<Self> {
        let (video_idx, audio_idx) = Self::select_streams(&mut demuxer, options.program_id)?;

        let video_stream = video_idx
            .and_then(|i| demuxer.stream(i))
            .map(|s| StreamInfo::from_stream(&s));
        let audio_stream = audio_idx
            .and_then(|i| demuxer.stream(i))
            .map(|s| StreamInfo::from_stream(&s));

        Ok(Self {
            inner: Mutex::new(DecoderInner {
                demuxer: Some(demuxer),
                video: None,
                audio: None,
                packet: Packet::alloc()?,
                frame: Frame::alloc()?,
                packet_pending: false,
                flush_sent: false,
                video_stream,
                audio_stream,
                hw_device_type: options.hw_device,
            }),
        })
    }

    /// Pick the video/audio streams, honoring a program restriction.
    fn select_streams(
        demuxer: &mut Demuxer,
        program_id: Option<i32>,
    ) -> Result<(Option<u32>, Option<u32>)> {
        let Some(wanted) = program_id else {
            return Ok((
                demuxer.find_best_stream(MediaKind::Video.as_raw()),
                demuxer.find_best_stream(MediaKind::Audio.as_raw()),
            ));
        };

        let program = demuxer
            .programs()
            .into_iter()
            .find(|p| p.id == wanted || p.program_num == wanted)
            .ok_or(Error::Ffmpeg {
                op: "program selection",
                code: AVERROR_EINVAL,
                message: format!("no program with id {wanted}"),
            })?;

        let mut video = None;
        let mut audio = None;
        for index in program.stream_indexes {
            let Some(stream) = demuxer.stream(index) else {
                continue;
            };
            match stream.codecpar().media_kind() {
                MediaKind::Video if video.is_none() => video = Some(index),
                MediaKind::Audio if audio.is_none() => audio = Some(index),
                _ => {}
            }
        }
        Ok((video, audio))
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// The selected video stream, if any.
    pub fn video_stream(&self) -> Option<StreamInfo> {
        self.inner.lock().video_stream.clone()
    }

    /// The selected audio stream, if any.
    pub fn audio_stream(&self) -> Option<StreamInfo> {
        self.inner.lock().audio_stream.clone()
    }

    /// All streams in the container.
    pub fn streams(&self) -> Result<Vec<StreamInfo>> {
        let inner = self.inner.lock();
        let demuxer = inner.demuxer.as_ref().ok_or(Error::Closed)?;
        Ok((0..demuxer.nb_streams())
            .filter_map(|i| demuxer.stream(i))
            .map(|s| StreamInfo::from_stream(&s))
            .collect())
    }

    /// Container duration in microseconds.
    pub fn duration(&self) -> Option<i64> {
        self.inner.lock().demuxer.as_ref()?.duration_us()
    }

    /// Container bit rate.
    pub fn bitrate(&self) -> Option<i64> {
        self.inner.lock().demuxer.as_ref()?.bit_rate()
    }

    /// Container-level metadata.
    pub fn metadata(&self) -> Result<Vec<(String, String)>> {
        let inner = self.inner.lock();
        Ok(inner.demuxer.as_ref().ok_or(Error::Closed)?.metadata())
    }

    /// Owned copy of a stream's codec parameters, for stream copy and
    /// remuxing.
    pub fn stream_parameters(&self, index: i32) -> Result<crate::codec::context::Parameters> {
        let inner = self.inner.lock();
        let demuxer = inner.demuxer.as_ref().ok_or(Error::Closed)?;
        let stream = demuxer
            .stream(index as u32)
            .ok_or(Error::InvalidStream(index))?;
        stream.codecpar().try_clone()
    }

    // ========================================================================
    // Packet reading
    // ========================================================================

    /// Read the next compressed packet. Returns the stream index and a
    /// **borrowed** packet reused on the next call; `None` at end of input.
    pub fn read_packet(&self) -> Result<Option<(i32, Packet)>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let demuxer = inner.demuxer.as_mut().ok_or(Error::Closed)?;
        inner.packet.unref();
        match demuxer.read_packet(&mut inner.packet) {
            Ok(()) => {
                let index = inner.packet.stream_index();
                Ok(Some((index, inner.packet.borrowed_view())))
            }
            Err(e) if e.is_eof() => Ok(None),
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Stream decoders
    // ========================================================================

    /// Open the decoder for the selected video stream.
    pub fn open_video_decoder(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.video.is_some() {
            return Ok(());
        }
        let info = inner
            .video_stream
            .clone()
            .ok_or(Error::NoStream(MediaKind::Video))?;
        let hw = inner.hw_device_type;
        inner.video = Some(open_stream_decoder(
            inner.demuxer.as_mut().ok_or(Error::Closed)?,
            &info,
            hw,
        )?);
        Ok(())
    }

    /// Open the decoder for the selected audio stream.
    pub fn open_audio_decoder(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if inner.audio.is_some() {
            return Ok(());
        }
        let info = inner
            .audio_stream
            .clone()
            .ok_or(Error::NoStream(MediaKind::Audio))?;
        inner.audio = Some(open_stream_decoder(
            inner.demuxer.as_mut().ok_or(Error::Closed)?,
            &info,
            None,
        )?);
        Ok(())
    }

    // ========================================================================
    // Decoding
    // ========================================================================

    /// Decode the next video frame. Returns a **borrowed** frame, or `None`
    /// once the stream is drained (terminal and idempotent).
    pub fn decode_video(&self) -> Result<Option<Frame>> {
        self.decode_one(MediaKind::Video)
    }

    /// Decode the next audio frame (borrowed; `None` when drained).
    pub fn decode_audio(&self) -> Result<Option<Frame>> {
        self.decode_one(MediaKind::Audio)
    }

    /// Decode the next video frame as an **owned** clone.
    pub fn decode_video_copy(&self) -> Result<Option<Frame>> {
        match self.decode_video()? {
            Some(frame) => Ok(Some(frame.try_clone()?)),
            None => Ok(None),
        }
    }

    /// Decode the next audio frame as an **owned** clone.
    pub fn decode_audio_copy(&self) -> Result<Option<Frame>> {
        match self.decode_audio()? {
            Some(frame) => Ok(Some(frame.try_clone()?)),
            None => Ok(None),
        }
    }

    /// The send/receive drain loop over one stream's codec.
    fn decode_one(&self, kind: MediaKind) -> Result<Option<Frame>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let DecoderInner {
            demuxer,
            video,
            audio,
            packet,
            frame,
            packet_pending,
            ..
        } = inner;
        let demuxer = demuxer.as_mut().ok_or(Error::Closed)?;
        let dec = match kind {
            MediaKind::Video => video.as_mut(),
            MediaKind::Audio => audio.as_mut(),
            _ => None,
        }
        .ok_or(Error::NoStream(kind))?;

        loop {
            // 1. Try to pull a frame out of the codec.
            if dec.drained {
                return Ok(None);
            }
            frame.unref();
            match dec.ctx.receive_frame(frame) {
                Ok(()) => return Ok(Some(finish_frame(dec, frame)?)),
                Err(e) if e.is_eof() => {
                    dec.drained = true;
                    return Ok(None);
                }
                Err(e) if e.is_again() => {}
                Err(e) => return Err(e),
            }

            // 2. A packet held back by a short send goes first. One the
            //    other stream owns is skipped here, matching the per-stream
            //    read discipline below.
            if *packet_pending {
                if packet.stream_index() as u32 == dec.stream_index {
                    match dec.ctx.send_packet(Some(packet)) {
                        Ok(()) => {
                            packet.unref();
                            *packet_pending = false;
                        }
                        Err(e) if e.is_again() => continue,
                        Err(e) => return Err(e),
                    }
                    continue;
                }
                packet.unref();
                *packet_pending = false;
            }

            // 3. Fetch the next packet for this stream, dropping others.
            packet.unref();
            match demuxer.read_packet(packet) {
                Ok(()) => {
                    if packet.stream_index() as u32 != dec.stream_index {
                        packet.unref();
                        continue;
                    }
                }
                Err(e) if e.is_eof() => {
                    // End of input: a null packet starts the drain.
                    match dec.ctx.send_packet(None) {
                        Ok(()) | Err(Error::Eof) => {}
                        Err(e) if e.is_again() => {}
                        Err(e) => return Err(e),
                    }
                    continue;
                }
                Err(e) => return Err(e),
            }

            // 4. Send; on Again keep the packet and retry receive first.
            match dec.ctx.send_packet(Some(packet)) {
                Ok(()) => packet.unref(),
                Err(e) if e.is_again() => *packet_pending = true,
                Err(e) => return Err(e),
            }
        }
    }

    /// Read the next decoded frame of either kind, in demuxing order.
    /// Returns `None` after both open decoders are drained.
    pub fn read_frame(&self) -> Result<Option<DecodedFrame>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let DecoderInner {
            demuxer,
            video,
            audio,
            packet,
            frame,
            packet_pending,
            flush_sent,
            ..
        } = inner;
        let demuxer = demuxer.as_mut().ok_or(Error::Closed)?;
        if video.is_none() && audio.is_none() {
            return Err(Error::InvalidArgument("no decoder opened"));
        }

        loop {
            // Drain whatever is ready before feeding more input.
            for kind in [MediaKind::Video, MediaKind::Audio] {
                let dec = match kind {
                    MediaKind::Video => video.as_mut(),
                    _ => audio.as_mut(),
                };
                let Some(dec) = dec else { continue };
                if dec.drained {
                    continue;
                }
                frame.unref();
                match dec.ctx.receive_frame(frame) {
                    Ok(()) => {
                        let out = finish_frame(dec, frame)?;
                        return Ok(Some(DecodedFrame { kind, frame: out }));
                    }
                    Err(e) if e.is_eof() => {
                        dec.drained = true;
                    }
                    Err(e) if e.is_again() => {}
                    Err(e) => return Err(e),
                }
            }

            let drained = |d: &Option<StreamDecoder>| d.as_ref().map_or(true, |d| d.drained);
            if drained(video) && drained(audio) {
                return Ok(None);
            }
            if *flush_sent {
                // Flushed and nothing came back: the codecs are done.
                for dec in [video.as_mut(), audio.as_mut()].into_iter().flatten() {
                    dec.drained = true;
                }
                return Ok(None);
            }

            // Resend a held-back packet before new input.
            if *packet_pending {
                let index = packet.stream_index() as u32;
                let target = [video.as_mut(), audio.as_mut()]
                    .into_iter()
                    .flatten()
                    .find(|d| d.stream_index == index);
                match target {
                    Some(dec) => match dec.ctx.send_packet(Some(packet)) {
                        Ok(()) => {
                            packet.unref();
                            *packet_pending = false;
                        }
                        Err(e) if e.is_again() => continue,
                        Err(e) => return Err(e),
                    },
                    None => {
                        packet.unref();
                        *packet_pending = false;
                    }
                }
                continue;
            }

            // Feed the next packet to whichever decoder it belongs to.
            packet.unref();
            match demuxer.read_packet(packet) {
                Ok(()) => {
                    let index = packet.stream_index() as u32;
                    let target = [video.as_mut(), audio.as_mut()]
                        .into_iter()
                        .flatten()
                        .find(|d| d.stream_index == index);
                    if let Some(dec) = target {
                        match dec.ctx.send_packet(Some(packet)) {
                            Ok(()) => packet.unref(),
                            Err(e) if e.is_again() => *packet_pending = true,
                            Err(e) => return Err(e),
                        }
                    } else {
                        packet.unref();
                    }
                }
                Err(e) if e.is_eof() => {
                    for dec in [video.as_mut(), audio.as_mut()].into_iter().flatten() {
                        match dec.ctx.send_packet(None) {
                            Ok(()) | Err(Error::Eof) => {}
                            Err(e) if e.is_again() => {}
                            Err(e) => return Err(e),
                        }
                    }
                    *flush_sent = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    // ========================================================================
    // Seeking and teardown
    // ========================================================================

    /// Seek to the key frame at or before `timestamp_us` (microseconds),
    /// then flush the open decoders. Decode forward from here to reach an
    /// exact target.
    pub fn seek(&self, timestamp_us: i64) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let demuxer = inner.demuxer.as_mut().ok_or(Error::Closed)?;
        demuxer.seek_backward(-1, timestamp_us)?;
        inner.packet.unref();
        inner.packet_pending = false;
        inner.flush_sent = false;
        for dec in [inner.video.as_mut(), inner.audio.as_mut()]
            .into_iter()
            .flatten()
        {
            dec.ctx.flush();
            dec.drained = false;
        }
        Ok(())
    }

    /// Seek expressed in seconds.
    pub fn seek_seconds(&self, seconds: f64) -> Result<()> {
        self.seek((seconds * 1_000_000.0) as i64)
    }

    /// Reset decoder state without moving the read position.
    pub fn flush_decoder(&self) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        for dec in [inner.video.as_mut(), inner.audio.as_mut()]
            .into_iter()
            .flatten()
        {
            dec.ctx.flush();
            dec.drained = false;
        }
    }

    /// Release all native resources. Idempotent; later operations on this
    /// decoder return [`Error::Closed`].
    pub fn close(&self) {
        let mut guard = self.inner.lock();
        guard.video = None;
        guard.audio = None;
        guard.demuxer = None;
    }

    /// Rescale a µs position into a stream's time base.
    pub fn timestamp_for(&self, timestamp_us: i64, stream: &StreamInfo) -> i64 {
        rescale_q(timestamp_us, AV_TIME_BASE_Q, stream.time_base)
    }
}

fn open_stream_decoder(
    demuxer: &mut Demuxer,
    info: &StreamInfo,
    hw_device_type: Option<HwDeviceType>,
) -> Result<StreamDecoder> {
    let stream = demuxer
        .stream(info.index as u32)
        .ok_or(Error::InvalidStream(info.index))?;

    let mut ctx = CodecContext::decoder_for(info.codec_id)?;
    ctx.apply_parameters(&stream.codecpar())?;
    ctx.set_pkt_timebase(stream.time_base());

    let mut hw = None;
    let mut hw_format = None;
    if let Some(kind) = hw_device_type {
        let device = HwDevice::create(kind)?;
        let av = Ffmpeg::get()?;
        shim::ctx_install_hw(
            ctx.as_mut_ptr(),
            device.as_ptr(),
            kind.pixel_format().as_raw(),
            av.avutil.av_buffer_ref as *mut c_void,
        )?;
        hw_format = Some(kind.pixel_format().as_raw());
        hw = Some(device);
    }

    ctx.open(None)?;
    Ok(StreamDecoder {
        ctx,
        stream_index: info.index as u32,
        _hw: hw,
        hw_format,
        sw_frame: None,
        drained: false,
    })
}

/// Post-process a received frame: download GPU frames, return a borrowed
/// view.
fn finish_frame(dec: &mut StreamDecoder, frame: &mut Frame) -> Result<Frame> {
    if let Some(hw_format) = dec.hw_format {
        if frame.format_raw() == hw_format {
            let sw = frame.transfer_to_software()?;
            let slot = dec.sw_frame.insert(sw);
            return Ok(slot.borrowed_view());
        }
    }
    Ok(frame.borrowed_view())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_is_typed() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let result = Decoder::open("/no/such/input.mp4", DecoderOptions::default());
        assert!(matches!(
            result,
            Err(Error::Io { .. }) | Err(Error::Ffmpeg { .. })
        ));
    }

    #[test]
    fn test_closed_decoder_is_terminal() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let Ok(decoder) = Decoder::open_bytes(vec![0u8; 64], DecoderOptions::default()) else {
            return; // probing rejected the garbage bytes, which is fine
        };
        decoder.close();
        assert!(matches!(decoder.read_packet(), Err(Error::Closed)));
        assert!(matches!(decoder.decode_video(), Err(Error::Closed)));
        assert!(matches!(decoder.seek(0), Err(Error::Closed)));
        // close twice is a no-op
        decoder.close();
    }

    #[test]
    fn test_decode_without_stream() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let Ok(decoder) = Decoder::open_bytes(vec![0u8; 64], DecoderOptions::default()) else {
            return;
        };
        // No decoder opened: decode_video reports the missing stream/decoder
        // rather than panicking.
        assert!(decoder.decode_video().is_err());
    }
}
