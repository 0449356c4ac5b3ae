//! Encoding and muxing pipeline
//!
//! Accepts decoded frames and encodes them through configured codec
//! contexts, or copies pre-encoded packets through unchanged (stream copy).
//! The header write is lazy and idempotent; for network targets and custom
//! I/O options the byte stream is not opened until then.

use parking_lot::Mutex;

use crate::codec::context::{CodecContext, Parameters};
use crate::codec::dict::Dictionary;
use crate::codec::frame::Frame;
use crate::codec::muxer::Muxer;
use crate::codec::packet::Packet;
use crate::error::{Error, Result};
use crate::ffi::types::MediaKind;
use crate::init::Ffmpeg;
use crate::options::{
    guess_format_from_path, guess_format_from_scheme, is_network_target, AudioSettings,
    EncoderOptions, Pass, RateControl, VideoSettings,
};
use crate::rational::Rational;

struct EncodeStream {
    ctx: CodecContext,
    stream_index: u32,
    /// Monotonic frame counter for video; decoded-sample accumulator for
    /// audio.
    next_pts: i64,
    /// Audio only: frames the opened codec wants per packet (0 = any).
    frame_size: i32,
    drained: bool,
}

struct CopyStream {
    stream_index: u32,
    source_time_base: Rational,
}

struct EncoderInner {
    muxer: Option<Muxer>,
    video: Option<EncodeStream>,
    audio: Option<EncodeStream>,
    copy_video: Option<CopyStream>,
    copy_audio: Option<CopyStream>,
    packet: Packet,
    io_options: crate::options::Options,
    muxer_options: crate::options::Options,
}

/// Encode frames and/or copy packets into a muxed output.
pub struct Encoder {
    inner: Mutex<EncoderInner>,
}

impl Encoder {
    /// Create an encoder writing to `url`. The muxer is taken from
    /// `options.format`, the URL scheme, or the file extension, in that
    /// order.
    pub fn new(url: &str, options: EncoderOptions) -> Result<Self> {
        Ffmpeg::get()?;
        if !options.has_any_output() {
            return Err(Error::InvalidArgument(
                "encoder needs at least one of: encode video, encode audio, copy video, copy audio",
            ));
        }

        let format = match &options.format {
            Some(name) => Some(name.as_str()),
            None => guess_format_from_scheme(url).or_else(|| guess_format_from_path(url)),
        };
        if format.is_none() {
            return Err(Error::InvalidArgument(
                "output format not recognized; set an explicit format",
            ));
        }
        let mut muxer = Muxer::create(Some(url), format)?;
        let needs_global_header = muxer.needs_global_header();

        let mut inner = EncoderInner {
            video: None,
            audio: None,
            copy_video: None,
            copy_audio: None,
            packet: Packet::alloc()?,
            io_options: options.io_options.clone(),
            muxer_options: options.muxer_options.clone(),
            muxer: None,
        };

        if let Some(settings) = &options.video {
            inner.video = Some(open_video_encoder(
                &mut muxer,
                settings,
                options.pass,
                options.pass_log_file.as_deref(),
                needs_global_header,
            )?);
        }
        if let Some(settings) = &options.audio {
            inner.audio = Some(open_audio_encoder(&mut muxer, settings, needs_global_header)?);
        }
        if let Some(copy) = &options.copy_video {
            inner.copy_video = Some(open_copy_stream(&mut muxer, copy)?);
        }
        if let Some(copy) = &options.copy_audio {
            inner.copy_audio = Some(open_copy_stream(&mut muxer, copy)?);
        }

        // Network targets and custom protocol options connect lazily at
        // write_header; plain files open now so constructor errors surface
        // early.
        if !is_network_target(url) && options.io_options.is_empty() {
            let mut io_dict = options.io_options.to_dictionary()?;
            muxer.open_io(Some(&mut io_dict))?;
        }

        inner.muxer = Some(muxer);
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    /// Write the container header. Idempotent; invoked automatically by the
    /// first frame or packet write.
    pub fn write_header(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        write_header_locked(&mut guard)
    }

    /// Encode and mux one video frame. The frame's PTS is assigned from a
    /// monotonic counter in the encoder time base.
    pub fn write_video_frame(&self, frame: &mut Frame) -> Result<()> {
        let mut guard = self.inner.lock();
        write_header_locked(&mut guard)?;
        let inner = &mut *guard;
        let EncoderInner {
            muxer,
            video,
            packet,
            ..
        } = inner;
        let muxer = muxer.as_mut().ok_or(Error::Closed)?;
        let enc = video
            .as_mut()
            .ok_or(Error::NoStream(MediaKind::Video))?;
        frame.set_pts(enc.next_pts);
        enc.next_pts += 1;
        enc.ctx.send_frame(Some(frame))?;
        drain_packets(muxer, enc, packet)
    }

    /// Encode and mux one audio frame. The frame's PTS accumulates sample
    /// counts so gaps in wall time do not desynchronize the stream.
    pub fn write_audio_frame(&self, frame: &mut Frame) -> Result<()> {
        let mut guard = self.inner.lock();
        write_header_locked(&mut guard)?;
        let inner = &mut *guard;
        let EncoderInner {
            muxer,
            audio,
            packet,
            ..
        } = inner;
        let muxer = muxer.as_mut().ok_or(Error::Closed)?;
        let enc = audio
            .as_mut()
            .ok_or(Error::NoStream(MediaKind::Audio))?;
        frame.set_pts(enc.next_pts);
        enc.next_pts += frame.nb_samples() as i64;
        enc.ctx.send_frame(Some(frame))?;
        drain_packets(muxer, enc, packet)
    }

    /// Stream-copy one pre-encoded packet of the given kind. Timestamps are
    /// rescaled from the source time base declared at construction.
    pub fn write_packet(&self, source: &Packet, kind: MediaKind) -> Result<()> {
        let mut guard = self.inner.lock();
        write_header_locked(&mut guard)?;
        let inner = &mut *guard;
        let EncoderInner {
            muxer,
            copy_video,
            copy_audio,
            packet,
            ..
        } = inner;
        let muxer = muxer.as_mut().ok_or(Error::Closed)?;
        let copy = match kind {
            MediaKind::Video => copy_video.as_ref(),
            MediaKind::Audio => copy_audio.as_ref(),
            _ => None,
        }
        .ok_or(Error::NoStream(kind))?;

        packet.unref();
        packet.ref_from(source)?;
        packet.set_stream_index(copy.stream_index as i32);
        let out_tb = muxer
            .stream(copy.stream_index)
            .map(|s| s.time_base())
            .ok_or(Error::InvalidStream(copy.stream_index as i32))?;
        packet.rescale_ts(copy.source_time_base, out_tb);
        let result = muxer.interleaved_write(packet);
        packet.unref();
        result
    }

    /// The sample count per audio frame the opened encoder expects
    /// (0 = unrestricted).
    pub fn audio_frame_size(&self) -> Option<i32> {
        self.inner.lock().audio.as_ref().map(|a| a.frame_size)
    }

    /// Drain both encoders without closing the output.
    pub fn flush(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        write_header_locked(&mut guard)?;
        let inner = &mut *guard;
        let EncoderInner {
            muxer,
            video,
            audio,
            packet,
            ..
        } = inner;
        let muxer = muxer.as_mut().ok_or(Error::Closed)?;
        for enc in [video.as_mut(), audio.as_mut()].into_iter().flatten() {
            flush_encoder(muxer, enc, packet)?;
        }
        Ok(())
    }

    /// Flush the encoders, write the trailer (only if the header went out),
    /// close I/O and free all contexts. Idempotent.
    pub fn close(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(muxer) = inner.muxer.as_mut() else {
            return Ok(());
        };
        if muxer.header_written() {
            let EncoderInner {
                muxer,
                video,
                audio,
                packet,
                ..
            } = inner;
            let muxer = muxer.as_mut().unwrap();
            for enc in [video.as_mut(), audio.as_mut()].into_iter().flatten() {
                flush_encoder(muxer, enc, packet)?;
            }
            muxer.write_trailer()?;
        }
        if let Some(mut muxer) = inner.muxer.take() {
            muxer.close_io();
        }
        inner.video = None;
        inner.audio = None;
        inner.copy_video = None;
        inner.copy_audio = None;
        Ok(())
    }
}

impl Drop for Encoder {
    fn drop(&mut self) {
        let open = self.inner.lock().muxer.is_some();
        if open {
            tracing::warn!("encoder dropped without close; finalizing as a last resort");
            let _ = self.close();
        }
    }
}

fn write_header_locked(inner: &mut EncoderInner) -> Result<()> {
    let Some(muxer) = inner.muxer.as_mut() else {
        return Err(Error::Closed);
    };
    if muxer.header_written() {
        return Ok(());
    }
    let mut io_dict = inner.io_options.to_dictionary()?;
    muxer.open_io(Some(&mut io_dict))?;
    let mut muxer_dict = inner.muxer_options.to_dictionary()?;
    muxer.write_header(Some(&mut muxer_dict))?;
    Ok(())
}

/// Drain ready packets from an encoder into the muxer, rescaling timestamps
/// to the output stream's time base.
fn drain_packets(muxer: &mut Muxer, enc: &mut EncodeStream, packet: &mut Packet) -> Result<()> {
    loop {
        packet.unref();
        match enc.ctx.receive_packet(packet) {
            Ok(()) => {
                packet.set_stream_index(enc.stream_index as i32);
                let out_tb = muxer
                    .stream(enc.stream_index)
                    .map(|s| s.time_base())
                    .ok_or(Error::InvalidStream(enc.stream_index as i32))?;
                packet.rescale_ts(enc.ctx.time_base(), out_tb);
                muxer.interleaved_write(packet)?;
            }
            Err(e) if e.is_again() => return Ok(()),
            Err(e) if e.is_eof() => {
                enc.drained = true;
                return Ok(());
            }
            Err(e) => return Err(e),
        }
    }
}

fn flush_encoder(muxer: &mut Muxer, enc: &mut EncodeStream, packet: &mut Packet) -> Result<()> {
    if enc.drained {
        return Ok(());
    }
    match enc.ctx.send_frame(None) {
        Ok(()) | Err(Error::Eof) => {}
        Err(e) => return Err(e),
    }
    drain_packets(muxer, enc, packet)
}

// ============================================================================
// Construction helpers
// ============================================================================

fn open_video_encoder(
    muxer: &mut Muxer,
    settings: &VideoSettings,
    pass: Option<Pass>,
    pass_log_file: Option<&std::path::Path>,
    needs_global_header: bool,
) -> Result<EncodeStream> {
    let mut ctx = CodecContext::encoder_by_name(&settings.codec)?;

    // Core fields travel through codec parameters; knobs with AVOptions
    // names go through the options surface.
    let mut par = Parameters::alloc()?;
    par.set_media_kind(MediaKind::Video);
    par.set_dimensions(settings.width, settings.height);
    par.set_format_raw(settings.pixel_format.as_raw());
    ctx.apply_parameters(&par)?;

    let time_base = settings.frame_rate.invert();
    ctx.set_time_base(time_base);
    ctx.set_framerate(settings.frame_rate)?;

    match settings.rate_control {
        Some(RateControl::Abr(bit_rate)) => ctx.set_opt_int("b", bit_rate)?,
        Some(RateControl::Cbr(bit_rate)) => {
            ctx.set_opt_int("b", bit_rate)?;
            ctx.set_opt_int("minrate", bit_rate)?;
            ctx.set_opt_int("maxrate", bit_rate)?;
            ctx.set_opt_int("bufsize", settings.buffer_size.unwrap_or(bit_rate))?;
        }
        Some(RateControl::Crf(crf)) => {
            ctx.set_opt_best_effort("crf", &crf.to_string())?;
        }
        Some(RateControl::Cqp(qp)) => {
            ctx.set_opt_best_effort("qp", &qp.to_string())?;
        }
        None => {}
    }
    if let Some(min) = settings.min_bit_rate {
        ctx.set_opt_int("minrate", min)?;
    }
    if let Some(max) = settings.max_bit_rate {
        ctx.set_opt_int("maxrate", max)?;
    }
    if let Some(bufsize) = settings.buffer_size {
        ctx.set_opt_int("bufsize", bufsize)?;
    }
    if let Some(gop) = settings.gop_size {
        ctx.set_opt_int("g", gop as i64)?;
    }
    if let Some(bf) = settings.max_b_frames {
        ctx.set_opt_int("bf", bf as i64)?;
    }
    if let Some(refs) = settings.ref_frames {
        ctx.set_opt_int("refs", refs as i64)?;
    }
    if let Some(strategy) = settings.b_frame_strategy {
        ctx.set_opt_best_effort("b_strategy", &strategy.to_string())?;
    }
    if let Some(threads) = settings.thread_count {
        ctx.set_opt_int("threads", threads as i64)?;
    }
    if let Some(preset) = &settings.preset {
        ctx.set_opt_best_effort("preset", preset)?;
    }
    if let Some(tune) = &settings.tune {
        ctx.set_opt_best_effort("tune", tune)?;
    }
    if let Some(profile) = &settings.profile {
        ctx.set_opt_best_effort("profile", profile)?;
    }
    if let Some(level) = &settings.level {
        ctx.set_opt_best_effort("level", level)?;
    }
    for (key, value) in settings.codec_options.iter() {
        ctx.set_opt_best_effort(key, value)?;
    }

    if needs_global_header {
        ctx.enable_flags("global_header")?;
    }

    // Two-pass rate control: the flag on the context, the log file through
    // the open2 dictionary so private options exist before priv-data is
    // allocated. libx265 takes both through its parameter string instead.
    let mut open_options = Dictionary::new()?;
    if let Some(pass) = pass {
        let pass_number = match pass {
            Pass::First => 1,
            Pass::Second => 2,
        };
        ctx.enable_flags(if pass_number == 1 { "pass1" } else { "pass2" })?;
        let log_base = pass_log_file
            .and_then(|p| p.to_str())
            .unwrap_or("ffmpeg2pass");
        if settings.codec == "libx265" {
            ctx.set_opt_best_effort(
                "x265-params",
                &format!("pass={pass_number}:stats={log_base}.log"),
            )?;
        } else {
            // Both spellings: `passlogfile` for consumers of the generic
            // name, `stats` for encoders (libx264) that expose the file as a
            // private option. Whichever the codec does not know is logged
            // and dropped after open.
            open_options.set("passlogfile", log_base)?;
            open_options.set("stats", &format!("{log_base}.log"))?;
        }
    }

    ctx.open(Some(&mut open_options))?;

    let stream = muxer.new_stream()?;
    let opened = ctx.parameters()?;
    let mut stream_par = stream.codecpar();
    opened.copy_into(&mut stream_par)?;
    stream.set_time_base(time_base);

    Ok(EncodeStream {
        ctx,
        stream_index: stream.index() as u32,
        next_pts: 0,
        frame_size: 0,
        drained: false,
    })
}

fn open_audio_encoder(
    muxer: &mut Muxer,
    settings: &AudioSettings,
    needs_global_header: bool,
) -> Result<EncodeStream> {
    let mut ctx = CodecContext::encoder_by_name(&settings.codec)?;

    let mut par = Parameters::alloc()?;
    par.set_media_kind(MediaKind::Audio);
    par.set_format_raw(settings.sample_format.as_raw());
    par.set_sample_rate(settings.sample_rate);
    par.set_channel_layout(
        settings.channels,
        crate::ffi::types::default_channel_mask(settings.channels),
    );
    if let Some(bit_rate) = settings.bit_rate {
        par.set_bit_rate(bit_rate);
    }
    ctx.apply_parameters(&par)?;
    ctx.set_time_base(Rational::new(1, settings.sample_rate as i32));

    for (key, value) in settings.codec_options.iter() {
        ctx.set_opt_best_effort(key, value)?;
    }
    if needs_global_header {
        ctx.enable_flags("global_header")?;
    }

    ctx.open(None)?;
    let frame_size = ctx.frame_size()?;

    let stream = muxer.new_stream()?;
    let opened = ctx.parameters()?;
    let mut stream_par = stream.codecpar();
    opened.copy_into(&mut stream_par)?;
    stream.set_time_base(Rational::new(1, settings.sample_rate as i32));

    Ok(EncodeStream {
        ctx,
        stream_index: stream.index() as u32,
        next_pts: 0,
        frame_size,
        drained: false,
    })
}

fn open_copy_stream(muxer: &mut Muxer, copy: &crate::options::CopySource) -> Result<CopyStream> {
    let stream = muxer.new_stream()?;
    let mut stream_par = stream.codecpar();
    copy.parameters.copy_into(&mut stream_par)?;
    // Container-specific tags rarely survive a container switch.
    stream_par.clear_codec_tag();
    stream.set_time_base(copy.time_base);
    Ok(CopyStream {
        stream_index: stream.index() as u32,
        source_time_base: copy.time_base,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::Decoder;
    use crate::ffi::types::PixelFormat;
    use crate::options::{DecoderOptions, VideoSettings};

    /// Gray frame with a per-index luma so content varies between frames.
    fn test_frame(width: u32, height: u32, index: u8) -> Frame {
        let mut frame = Frame::alloc_video(width, height, PixelFormat::Yuv420p).unwrap();
        unsafe {
            let y_len = frame.linesize(0) as usize * height as usize;
            std::ptr::write_bytes(frame.data_mut(0), 40 + index, y_len);
            let c_len = frame.linesize(1) as usize * (height as usize / 2);
            std::ptr::write_bytes(frame.data_mut(1), 128, c_len);
            std::ptr::write_bytes(frame.data_mut(2), 128, c_len);
        }
        frame
    }

    fn encode_sample(path: &std::path::Path, frames: u8) -> bool {
        let mut settings = VideoSettings::new("mpeg4", 320, 240, Rational::new(25, 1));
        settings.rate_control = Some(RateControl::Abr(400_000));
        let Ok(encoder) = Encoder::new(path.to_str().unwrap(), EncoderOptions::video(settings))
        else {
            return false; // encoder not in this build
        };
        for i in 0..frames {
            let mut frame = test_frame(320, 240, i);
            encoder.write_video_frame(&mut frame).unwrap();
        }
        encoder.close().unwrap();
        true
    }

    #[test]
    fn test_encode_decode_round_trip() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.avi");
        if !encode_sample(&path, 25) {
            return;
        }

        let decoder = Decoder::open(path.to_str().unwrap(), DecoderOptions::default()).unwrap();
        let info = decoder.video_stream().unwrap();
        assert_eq!(info.width, Some(320));
        assert_eq!(info.height, Some(240));
        decoder.open_video_decoder().unwrap();

        let mut count = 0;
        let mut last_pts = i64::MIN;
        while let Some(frame) = decoder.decode_video().unwrap() {
            assert_eq!(frame.width(), 320);
            assert_eq!(frame.height(), 240);
            if frame.has_pts() {
                assert!(frame.pts() >= last_pts);
                last_pts = frame.pts();
            }
            count += 1;
        }
        assert_eq!(count, 25);
        // The drained state is terminal and idempotent.
        assert!(decoder.decode_video().unwrap().is_none());
        decoder.close();
    }

    #[test]
    fn test_decode_through_custom_io_matches_file() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memio.avi");
        if !encode_sample(&path, 10) {
            return;
        }
        let bytes = std::fs::read(&path).unwrap();
        let decoder = Decoder::open_bytes(
            bytes,
            DecoderOptions {
                format: Some("avi".into()),
                ..Default::default()
            },
        )
        .unwrap();
        decoder.open_video_decoder().unwrap();
        let mut count = 0;
        while decoder.decode_video().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 10);
        decoder.close();
    }

    #[test]
    fn test_write_before_header_writes_header_once() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("implicit.avi");
        let mut settings = VideoSettings::new("mpeg4", 320, 240, Rational::new(25, 1));
        settings.rate_control = Some(RateControl::Abr(400_000));
        let Ok(encoder) = Encoder::new(path.to_str().unwrap(), EncoderOptions::video(settings))
        else {
            return;
        };
        // No explicit write_header: the first frame write triggers it.
        let mut frame = test_frame(320, 240, 0);
        encoder.write_video_frame(&mut frame).unwrap();
        // A second explicit call is a no-op rather than a double header.
        encoder.write_header().unwrap();
        encoder.close().unwrap();
        // close twice is a no-op
        encoder.close().unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_requires_some_output() {
        if Ffmpeg::get().is_err() {
            return;
        }
        assert!(matches!(
            Encoder::new("/tmp/out.mp4", EncoderOptions::default()),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_unknown_extension_needs_explicit_format() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let options = EncoderOptions::video(VideoSettings::new(
            "libx264",
            640,
            480,
            Rational::new(30, 1),
        ));
        assert!(matches!(
            Encoder::new("/tmp/out.unknownext", options),
            Err(Error::InvalidArgument(_))
        ));
    }
}
