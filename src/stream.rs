//! Stream information snapshots
//!
//! Everything a caller usually wants to know about a stream, copied into
//! host storage at open time so no native pointers leak out.

use crate::codec::stream::StreamRef;
use crate::ffi::types::{CodecId, MediaKind, PixelFormat, SampleFormat};
use crate::rational::Rational;

/// Information about one stream in a container.
#[derive(Debug, Clone)]
pub struct StreamInfo {
    /// Stream index inside the container
    pub index: i32,
    /// Container-level stream id (e.g. the MPEG-TS PID)
    pub id: i32,
    pub media_kind: MediaKind,
    pub codec_id: CodecId,
    /// Video width (if video)
    pub width: Option<u32>,
    /// Video height (if video)
    pub height: Option<u32>,
    /// Video pixel format (if video and known)
    pub pixel_format: Option<PixelFormat>,
    /// Audio sample rate (if audio)
    pub sample_rate: Option<u32>,
    /// Audio channel count (if audio)
    pub channels: Option<u32>,
    /// Audio sample format (if audio and known)
    pub sample_format: Option<SampleFormat>,
    /// Unit of this stream's timestamps
    pub time_base: Rational,
    /// Average frame rate as reported by the demuxer
    pub avg_frame_rate: Rational,
    /// Real base frame rate (lowest rate at which all timestamps are
    /// representable)
    pub r_frame_rate: Rational,
    /// First timestamp, in `time_base` units
    pub start_time: Option<i64>,
    /// Duration in `time_base` units
    pub duration: Option<i64>,
    /// Frame count when the container declares one
    pub nb_frames: Option<i64>,
    /// Declared bit rate
    pub bit_rate: Option<i64>,
    /// Codec extradata (avcC, hvcC, …)
    pub extradata: Option<Vec<u8>>,
    /// Stream metadata (language, title, …)
    pub metadata: Vec<(String, String)>,
}

impl StreamInfo {
    pub(crate) fn from_stream(stream: &StreamRef) -> Self {
        let par = stream.codecpar();
        let media_kind = par.media_kind();
        let start_time = stream.start_time();
        let duration = stream.duration();
        let nb_frames = stream.nb_frames();
        let bit_rate = par.bit_rate();

        let (width, height, pixel_format) = if media_kind == MediaKind::Video {
            let fmt = par.format_raw();
            (
                Some(par.width()),
                Some(par.height()),
                (fmt >= 0).then(|| PixelFormat::from_raw(fmt)),
            )
        } else {
            (None, None, None)
        };

        let (sample_rate, channels, sample_format) = if media_kind == MediaKind::Audio {
            let fmt = par.format_raw();
            (
                Some(par.sample_rate()),
                Some(par.channels()),
                (fmt >= 0).then(|| SampleFormat::from_raw(fmt)),
            )
        } else {
            (None, None, None)
        };

        Self {
            index: stream.index(),
            id: stream.id(),
            media_kind,
            codec_id: par.codec_id(),
            width,
            height,
            pixel_format,
            sample_rate,
            channels,
            sample_format,
            time_base: stream.time_base(),
            avg_frame_rate: stream.avg_frame_rate(),
            r_frame_rate: stream.r_frame_rate(),
            start_time: (start_time != crate::ffi::types::AV_NOPTS_VALUE)
                .then_some(start_time),
            duration: (duration > 0).then_some(duration),
            nb_frames: (nb_frames > 0).then_some(nb_frames),
            bit_rate: (bit_rate > 0).then_some(bit_rate),
            extradata: par.extradata(),
            metadata: stream.metadata(),
        }
    }

    /// Frames per second as a float, when known.
    pub fn fps(&self) -> f64 {
        self.avg_frame_rate.as_f64()
    }

    /// Duration in seconds, when known.
    pub fn duration_seconds(&self) -> Option<f64> {
        self.duration
            .map(|d| d as f64 * self.time_base.as_f64())
    }
}
