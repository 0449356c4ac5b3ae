//! Option spaces for decoding, encoding and streaming
//!
//! All option maps are string→string with decimal-formatted numbers, matching
//! FFmpeg's AVOptions surface. Scheme- and extension-based muxer guessing
//! lives here too.

use std::path::{Path, PathBuf};

use crate::codec::context::Parameters;
use crate::codec::dict::Dictionary;
use crate::error::Result;
use crate::ffi::types::{HwDeviceType, PixelFormat, SampleFormat};
use crate::rational::Rational;

// ============================================================================
// Generic string map
// ============================================================================

/// Ordered string→string option map.
#[derive(Debug, Clone, Default)]
pub struct Options {
    entries: Vec<(String, String)>,
}

impl Options {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Materialize as a native dictionary (consumed by FFmpeg calls).
    pub fn to_dictionary(&self) -> Result<Dictionary> {
        let mut dict = Dictionary::new()?;
        for (key, value) in self.iter() {
            dict.set(key, value)?;
        }
        Ok(dict)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Options {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

// ============================================================================
// Decoder options
// ============================================================================

/// Options for [`crate::decoder::Decoder::open`].
#[derive(Default)]
pub struct DecoderOptions {
    /// Demuxer short name hint (skips probing)
    pub format: Option<String>,
    /// Raw AVOptions passed to open
    pub av_options: Options,
    /// Decode on this hardware device
    pub hw_device: Option<HwDeviceType>,
    /// Restrict stream selection to this program (MPEG-TS and similar)
    pub program_id: Option<i32>,
    /// Demuxer whitelist (typed; wins over the raw map)
    pub format_whitelist: Option<String>,
    /// Decoder whitelist (typed; wins over the raw map)
    pub codec_whitelist: Option<String>,
    /// Demuxer blacklist (typed; wins over the raw map)
    pub format_blacklist: Option<String>,
    /// Bytes to probe for format detection
    pub probe_size: Option<i64>,
    /// Microseconds of input to analyze for stream info
    pub analyze_duration: Option<i64>,
    /// Polled during blocking I/O; return true to abort
    pub interrupt: Option<Box<dyn FnMut() -> bool + Send>>,
}

impl DecoderOptions {
    /// Flatten into the dictionary handed to `avformat_open_input`. Typed
    /// fields are applied after the raw map, so they win on conflict.
    pub(crate) fn open_dictionary(&self) -> Result<Dictionary> {
        let mut dict = self.av_options.to_dictionary()?;
        if let Some(probe_size) = self.probe_size {
            dict.set("probesize", &probe_size.to_string())?;
        }
        if let Some(analyze) = self.analyze_duration {
            dict.set("analyzeduration", &analyze.to_string())?;
        }
        if let Some(list) = &self.format_whitelist {
            dict.set("format_whitelist", list)?;
        }
        if let Some(list) = &self.codec_whitelist {
            dict.set("codec_whitelist", list)?;
        }
        if let Some(list) = &self.format_blacklist {
            dict.set("format_blacklist", list)?;
        }
        Ok(dict)
    }
}

// ============================================================================
// Encoder options
// ============================================================================

/// Rate-control modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControl {
    /// Average bitrate (bits/s)
    Abr(i64),
    /// Constant bitrate (bits/s); also pins min/max to the target
    Cbr(i64),
    /// Constant rate factor (codec-specific quality scale)
    Crf(u32),
    /// Constant quantizer
    Cqp(u32),
}

/// Which pass of a two-pass encode this encoder runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    First,
    Second,
}

/// Video encoding settings.
#[derive(Debug, Clone)]
pub struct VideoSettings {
    /// Encoder name (`libx264`, `h264_videotoolbox`, …)
    pub codec: String,
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub frame_rate: Rational,
    pub rate_control: Option<RateControl>,
    pub min_bit_rate: Option<i64>,
    pub max_bit_rate: Option<i64>,
    pub buffer_size: Option<i64>,
    pub gop_size: Option<i32>,
    pub max_b_frames: Option<i32>,
    pub ref_frames: Option<i32>,
    pub b_frame_strategy: Option<i32>,
    pub thread_count: Option<i32>,
    pub preset: Option<String>,
    pub tune: Option<String>,
    pub profile: Option<String>,
    pub level: Option<String>,
    /// Codec-private key/value options applied before open
    pub codec_options: Options,
}

impl VideoSettings {
    pub fn new(codec: &str, width: u32, height: u32, frame_rate: Rational) -> Self {
        Self {
            codec: codec.to_string(),
            width,
            height,
            pixel_format: PixelFormat::Yuv420p,
            frame_rate,
            rate_control: None,
            min_bit_rate: None,
            max_bit_rate: None,
            buffer_size: None,
            gop_size: None,
            max_b_frames: None,
            ref_frames: None,
            b_frame_strategy: None,
            thread_count: None,
            preset: None,
            tune: None,
            profile: None,
            level: None,
            codec_options: Options::new(),
        }
    }
}

/// Audio encoding settings. The encoder frame size is derived from the
/// opened codec, not configured here.
#[derive(Debug, Clone)]
pub struct AudioSettings {
    /// Encoder name (`aac`, `libopus`, …)
    pub codec: String,
    pub sample_rate: u32,
    pub channels: u32,
    pub sample_format: SampleFormat,
    pub bit_rate: Option<i64>,
    pub codec_options: Options,
}

impl AudioSettings {
    pub fn new(codec: &str, sample_rate: u32, channels: u32) -> Self {
        Self {
            codec: codec.to_string(),
            sample_rate,
            channels,
            sample_format: SampleFormat::Fltp,
            bit_rate: None,
            codec_options: Options::new(),
        }
    }
}

/// Source description for a stream-copy output stream.
pub struct CopySource {
    /// Codec parameters of the source stream
    pub parameters: Parameters,
    /// Time base packets from that stream carry
    pub time_base: Rational,
}

/// Options for [`crate::encoder::Encoder`]. At least one of `video`, `audio`,
/// `copy_video`, `copy_audio` must be set.
#[derive(Default)]
pub struct EncoderOptions {
    pub video: Option<VideoSettings>,
    pub audio: Option<AudioSettings>,
    pub copy_video: Option<CopySource>,
    pub copy_audio: Option<CopySource>,
    /// Two-pass state; `pass_log_file` names the stats base path
    pub pass: Option<Pass>,
    pub pass_log_file: Option<PathBuf>,
    /// Muxer short-name override (otherwise guessed from the URL)
    pub format: Option<String>,
    /// Protocol options for the byte stream (forces deferred open)
    pub io_options: Options,
    /// Options for the muxer's `write_header`
    pub muxer_options: Options,
}

impl EncoderOptions {
    pub fn video(settings: VideoSettings) -> Self {
        Self {
            video: Some(settings),
            ..Self::default()
        }
    }

    pub(crate) fn has_any_output(&self) -> bool {
        self.video.is_some()
            || self.audio.is_some()
            || self.copy_video.is_some()
            || self.copy_audio.is_some()
    }
}

// ============================================================================
// Streaming options
// ============================================================================

/// Network streaming knobs, translated to FFmpeg protocol options.
#[derive(Debug, Clone, Copy, Default)]
pub struct StreamingOptions {
    pub timeout_us: Option<i64>,
    pub rw_timeout_us: Option<i64>,
    pub buffer_size: Option<i64>,
    pub max_delay_us: Option<i64>,
    pub reconnect: bool,
    pub reconnect_streamed: bool,
    pub reconnect_delay_max: Option<i64>,
}

impl StreamingOptions {
    /// Translate to the protocol option names FFmpeg's implementations
    /// honor.
    pub fn to_io_options(&self) -> Options {
        let mut options = Options::new();
        if let Some(timeout) = self.timeout_us {
            options.set("timeout", timeout.to_string());
        }
        if let Some(rw_timeout) = self.rw_timeout_us {
            options.set("rw_timeout", rw_timeout.to_string());
        }
        if let Some(size) = self.buffer_size {
            options.set("buffer_size", size.to_string());
        }
        if let Some(delay) = self.max_delay_us {
            options.set("max_delay", delay.to_string());
        }
        if self.reconnect {
            options.set("reconnect", "1");
        }
        if self.reconnect_streamed {
            options.set("reconnect_streamed", "1");
        }
        if let Some(max) = self.reconnect_delay_max {
            options.set("reconnect_delay_max", max.to_string());
        }
        options
    }
}

// ============================================================================
// Muxer guessing
// ============================================================================

/// Whether a URL names a network target (deferred I/O open applies).
pub fn is_network_target(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => parsed.scheme() != "file" && url.contains("://"),
        Err(_) => false,
    }
}

/// Default muxer for a streaming URL scheme.
pub fn guess_format_from_scheme(url: &str) -> Option<&'static str> {
    let scheme = url::Url::parse(url).ok()?.scheme().to_ascii_lowercase();
    match scheme.as_str() {
        "rtmp" | "rtmps" => Some("flv"),
        "udp" | "srt" => Some("mpegts"),
        "rtp" => Some("rtp"),
        "rtsp" => Some("rtsp"),
        _ => None,
    }
}

/// Guess a muxer short name from a file extension. Printf-style frame
/// patterns and image extensions map to the image sequence muxer. Unknown
/// extensions return `None` and need an explicit format option.
pub fn guess_format_from_path(path: &str) -> Option<&'static str> {
    let file_name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path);
    if is_sequence_pattern(file_name) {
        return Some("image2");
    }
    let extension = Path::new(path).extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "mp4" | "m4v" => Some("mp4"),
        "mkv" => Some("matroska"),
        "webm" => Some("webm"),
        "avi" => Some("avi"),
        "mov" => Some("mov"),
        "flv" => Some("flv"),
        "ts" | "m2ts" => Some("mpegts"),
        "mpg" | "mpeg" => Some("mpeg"),
        "ogg" | "ogv" => Some("ogg"),
        "gif" => Some("gif"),
        "png" | "jpg" | "jpeg" | "bmp" | "tiff" | "webp" => Some("image2"),
        _ => None,
    }
}

/// `frame_%04d.png`-style printf patterns.
fn is_sequence_pattern(file_name: &str) -> bool {
    let bytes = file_name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_digit() {
                j += 1;
            }
            if j < bytes.len() && bytes[j] == b'd' {
                return true;
            }
        }
        i += 1;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_defaults() {
        assert_eq!(guess_format_from_scheme("rtmp://host/app"), Some("flv"));
        assert_eq!(guess_format_from_scheme("rtmps://host/app"), Some("flv"));
        assert_eq!(guess_format_from_scheme("udp://1.2.3.4:5000"), Some("mpegts"));
        assert_eq!(guess_format_from_scheme("srt://host:9000"), Some("mpegts"));
        assert_eq!(guess_format_from_scheme("rtp://host:5004"), Some("rtp"));
        assert_eq!(guess_format_from_scheme("rtsp://host/stream"), Some("rtsp"));
        assert_eq!(guess_format_from_scheme("/plain/file.mp4"), None);
    }

    #[test]
    fn test_extension_guessing() {
        assert_eq!(guess_format_from_path("out.mp4"), Some("mp4"));
        assert_eq!(guess_format_from_path("out.m4v"), Some("mp4"));
        assert_eq!(guess_format_from_path("out.mkv"), Some("matroska"));
        assert_eq!(guess_format_from_path("out.webm"), Some("webm"));
        assert_eq!(guess_format_from_path("out.m2ts"), Some("mpegts"));
        assert_eq!(guess_format_from_path("out.OGV"), Some("ogg"));
        assert_eq!(guess_format_from_path("frame_%04d.png"), Some("image2"));
        assert_eq!(guess_format_from_path("shot.png"), Some("image2"));
        assert_eq!(guess_format_from_path("mystery.xyz"), None);
        assert_eq!(guess_format_from_path("noextension"), None);
    }

    #[test]
    fn test_network_detection() {
        assert!(is_network_target("rtmp://host/live"));
        assert!(is_network_target("http://host/file.mp4"));
        assert!(!is_network_target("/tmp/file.mp4"));
        assert!(!is_network_target("relative/path.mp4"));
    }

    #[test]
    fn test_streaming_translation() {
        let streaming = StreamingOptions {
            timeout_us: Some(5_000_000),
            reconnect: true,
            reconnect_delay_max: Some(10),
            ..Default::default()
        };
        let io = streaming.to_io_options();
        let pairs: Vec<_> = io.iter().collect();
        assert!(pairs.contains(&("timeout", "5000000")));
        assert!(pairs.contains(&("reconnect", "1")));
        assert!(pairs.contains(&("reconnect_delay_max", "10")));
        assert_eq!(pairs.len(), 3);
    }

    #[test]
    fn test_typed_fields_win_over_raw_map() {
        let decoder_options = DecoderOptions {
            av_options: Options::new()
                .with("format_whitelist", "raw-value")
                .with("probesize", "1"),
            format_whitelist: Some("typed-value".into()),
            probe_size: Some(4096),
            ..Default::default()
        };
        if crate::init::Ffmpeg::get().is_err() {
            return;
        }
        let dict = decoder_options.open_dictionary().unwrap();
        assert_eq!(dict.get("format_whitelist").as_deref(), Some("typed-value"));
        assert_eq!(dict.get("probesize").as_deref(), Some("4096"));
    }

    #[test]
    fn test_encoder_options_require_output() {
        let empty = EncoderOptions::default();
        assert!(!empty.has_any_output());
        let video = EncoderOptions::video(VideoSettings::new(
            "libx264",
            1280,
            720,
            Rational::new(30, 1),
        ));
        assert!(video.has_any_output());
    }
}
