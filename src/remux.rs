//! Stream-copy remuxing
//!
//! Copies already-encoded packets from one container to another without
//! touching the bytestream: per-stream index mapping, codec-tag clearing for
//! cross-container portability, and timestamp rescaling into whatever time
//! base the output muxer settled on at header time.

use std::collections::HashMap;

use parking_lot::Mutex;

use crate::codec::context::Parameters;
use crate::codec::muxer::Muxer;
use crate::codec::packet::Packet;
use crate::error::{Error, Result};
use crate::init::Ffmpeg;
use crate::options::Options;
use crate::rational::Rational;

struct MappedStream {
    out_index: u32,
    in_time_base: Rational,
}

struct RemuxerInner {
    muxer: Option<Muxer>,
    map: HashMap<i32, MappedStream>,
    packet: Packet,
    io_options: Options,
    muxer_options: Options,
    packets_written: u64,
}

/// Packet-copy remuxer.
pub struct Remuxer {
    inner: Mutex<RemuxerInner>,
}

impl Remuxer {
    /// Create a remuxer writing to `url` (muxer guessed from the path unless
    /// `format` names one).
    pub fn new(url: &str, format: Option<&str>) -> Result<Self> {
        Self::with_options(url, format, Options::new(), Options::new())
    }

    pub fn with_options(
        url: &str,
        format: Option<&str>,
        io_options: Options,
        muxer_options: Options,
    ) -> Result<Self> {
        Ffmpeg::get()?;
        let format = format.or_else(|| crate::options::guess_format_from_path(url));
        let muxer = Muxer::create(Some(url), format)?;
        Ok(Self {
            inner: Mutex::new(RemuxerInner {
                muxer: Some(muxer),
                map: HashMap::new(),
                packet: Packet::alloc()?,
                io_options,
                muxer_options,
                packets_written: 0,
            }),
        })
    }

    /// Map an input stream into the output: creates a codec-less output
    /// stream, copies the codec parameters, clears the codec tag. Must be
    /// called before the first packet write.
    pub fn add_stream(
        &self,
        in_index: i32,
        parameters: &Parameters,
        in_time_base: Rational,
    ) -> Result<u32> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let muxer = inner.muxer.as_mut().ok_or(Error::Closed)?;
        if muxer.header_written() {
            return Err(Error::HeaderAlreadyWritten);
        }
        let stream = muxer.new_stream()?;
        let mut stream_par = stream.codecpar();
        parameters.copy_into(&mut stream_par)?;
        stream_par.clear_codec_tag();
        stream.set_time_base(in_time_base);
        let out_index = stream.index() as u32;
        inner.map.insert(
            in_index,
            MappedStream {
                out_index,
                in_time_base,
            },
        );
        Ok(out_index)
    }

    /// Copy one packet through. Packets from unmapped streams are silently
    /// skipped. The header is written lazily on the first mapped packet;
    /// output time bases are re-read afterwards since some muxers adjust
    /// them during the header write.
    pub fn write_packet(&self, source: &Packet, in_index: i32) -> Result<()> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let muxer = inner.muxer.as_mut().ok_or(Error::Closed)?;
        let Some(mapped) = inner.map.get(&in_index) else {
            return Ok(());
        };

        if !muxer.header_written() {
            let mut io_dict = inner.io_options.to_dictionary()?;
            muxer.open_io(Some(&mut io_dict))?;
            let mut muxer_dict = inner.muxer_options.to_dictionary()?;
            muxer.write_header(Some(&mut muxer_dict))?;
        }

        // Reference, do not copy, the caller's packet.
        inner.packet.unref();
        inner.packet.ref_from(source)?;
        inner.packet.set_stream_index(mapped.out_index as i32);
        let out_tb = muxer
            .stream(mapped.out_index)
            .map(|s| s.time_base())
            .ok_or(Error::InvalidStream(mapped.out_index as i32))?;
        inner.packet.rescale_ts(mapped.in_time_base, out_tb);
        let result = muxer.interleaved_write(&mut inner.packet);
        inner.packet.unref();
        result?;
        inner.packets_written += 1;
        Ok(())
    }

    /// Packets successfully handed to the muxer.
    pub fn packets_written(&self) -> u64 {
        self.inner.lock().packets_written
    }

    /// Write the trailer and close the output. Idempotent.
    pub fn finalize(&self) -> Result<()> {
        let mut guard = self.inner.lock();
        let Some(mut muxer) = guard.muxer.take() else {
            return Ok(());
        };
        if muxer.header_written() {
            muxer.write_trailer()?;
        }
        muxer.close_io();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Produce a small single-stream sample input, or report that this build
    /// has no usable encoder.
    fn write_sample_input(path: &std::path::Path) -> bool {
        use crate::codec::frame::Frame;
        use crate::encoder::Encoder;
        use crate::ffi::types::PixelFormat;
        use crate::options::{EncoderOptions, RateControl, VideoSettings};

        let mut settings = VideoSettings::new("mpeg4", 160, 120, Rational::new(25, 1));
        settings.rate_control = Some(RateControl::Abr(200_000));
        let Ok(encoder) = Encoder::new(path.to_str().unwrap(), EncoderOptions::video(settings))
        else {
            return false;
        };
        for _ in 0..12 {
            let mut frame = Frame::alloc_video(160, 120, PixelFormat::Yuv420p).unwrap();
            unsafe {
                let y = frame.linesize(0) as usize * 120;
                std::ptr::write_bytes(frame.data_mut(0), 90, y);
                let c = frame.linesize(1) as usize * 60;
                std::ptr::write_bytes(frame.data_mut(1), 128, c);
                std::ptr::write_bytes(frame.data_mut(2), 128, c);
            }
            encoder.write_video_frame(&mut frame).unwrap();
        }
        encoder.close().unwrap();
        true
    }

    #[test]
    fn test_unmapped_packets_skipped_silently() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        let remuxer = Remuxer::new(out.to_str().unwrap(), None).unwrap();
        let packet = Packet::alloc().unwrap();
        // Stream 7 was never mapped: no error, nothing written.
        remuxer.write_packet(&packet, 7).unwrap();
        assert_eq!(remuxer.packets_written(), 0);
        remuxer.finalize().unwrap();
        remuxer.finalize().unwrap();
    }

    #[test]
    fn test_remux_preserves_packet_count() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.avi");
        if !write_sample_input(&input) {
            return;
        }

        let decoder =
            crate::decoder::Decoder::open(input.to_str().unwrap(), Default::default()).unwrap();
        let info = decoder.video_stream().unwrap();

        let output = dir.path().join("output.mkv");
        let remuxer = Remuxer::new(output.to_str().unwrap(), None).unwrap();
        let par = decoder.stream_parameters(info.index).unwrap();
        remuxer
            .add_stream(info.index, &par, info.time_base)
            .unwrap();

        let mut read = 0u64;
        while let Some((index, packet)) = decoder.read_packet().unwrap() {
            remuxer.write_packet(&packet, index).unwrap();
            if index == info.index {
                read += 1;
            }
        }
        remuxer.finalize().unwrap();
        decoder.close();

        assert_eq!(remuxer.packets_written(), read);
        assert!(output.exists());
    }

    #[test]
    fn test_add_stream_after_header_rejected() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.avi");
        if !write_sample_input(&input) {
            return;
        }

        let decoder =
            crate::decoder::Decoder::open(input.to_str().unwrap(), Default::default()).unwrap();
        let info = decoder.video_stream().unwrap();
        let par = decoder.stream_parameters(info.index).unwrap();

        let out = dir.path().join("out.mkv");
        let remuxer = Remuxer::new(out.to_str().unwrap(), None).unwrap();
        let out_idx = remuxer
            .add_stream(info.index, &par, info.time_base)
            .unwrap();
        assert_eq!(out_idx, 0);

        // The first mapped packet writes the header lazily; the mapping is
        // frozen from then on.
        let (index, packet) = decoder.read_packet().unwrap().unwrap();
        remuxer.write_packet(&packet, index).unwrap();
        assert!(matches!(
            remuxer.add_stream(99, &par, info.time_base),
            Err(Error::HeaderAlreadyWritten)
        ));

        remuxer.finalize().unwrap();
        decoder.close();
    }
}
