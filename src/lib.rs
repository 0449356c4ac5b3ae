#![deny(clippy::all)]

//! # lavkit
//!
//! A safe, high-level media toolkit over dynamically loaded FFmpeg shared
//! libraries (libavutil, libswresample, libavcodec, libavformat, libswscale,
//! libavfilter, libavdevice).
//!
//! Nothing here links against FFmpeg at build time: the libraries are
//! located and opened at runtime and every entry point is bound by symbol
//! lookup. A small companion C shim (compiled only when FFmpeg headers are
//! present, and itself free of FFmpeg link references) covers the few
//! operations symbol binding cannot express: variadic log formatting,
//! struct-by-value arithmetic, version-drifting struct fields.
//!
//! ## Quick start
//!
//! ```no_run
//! use lavkit::decoder::Decoder;
//! use lavkit::options::DecoderOptions;
//!
//! # fn main() -> Result<(), lavkit::Error> {
//! let decoder = Decoder::open("input.mp4", DecoderOptions::default())?;
//! decoder.open_video_decoder()?;
//! while let Some(frame) = decoder.decode_video()? {
//!     println!("frame {}x{} pts={}", frame.width(), frame.height(), frame.pts());
//! }
//! decoder.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Ownership contract
//!
//! `decode_*`, `read_frame` and `Scaler::scale` return **borrowed** frames
//! the producing component reuses on its next call; clone them (refcount
//! bump, no byte copy) to keep them. Releasing a borrowed wrapper is a typed
//! error, never a free.

// Runtime symbol binding and the native shim
pub mod ffi;

// Safe RAII wrappers (frames, packets, dictionaries, contexts, custom I/O)
pub mod codec;

// Library state and one-shot initialization
pub mod init;

// Process-wide callback registry and fixed trampolines
pub(crate) mod callback;

pub mod bsf;
pub mod decoder;
pub mod device;
pub mod encoder;
pub mod error;
pub mod filter;
pub mod hwaccel;
pub mod options;
pub mod pool;
pub mod rational;
pub mod remux;
pub mod resampler;
pub mod scaler;
pub mod stream;
pub mod twopass;

pub use bsf::BitstreamFilter;
pub use codec::{pinned_bytes, Dictionary, Frame, Packet, Parameters};
pub use decoder::{DecodedFrame, Decoder};
pub use encoder::Encoder;
pub use error::{Error, Result};
pub use filter::{FilterGraph, FilterInput};
pub use hwaccel::HwDevice;
pub use ffi::types::{
    CodecId, ColorPrimaries, ColorRange, ColorSpace, ColorTransfer, HwDeviceType, MediaKind,
    PixelFormat, SampleFormat,
};
pub use init::{Ffmpeg, FfmpegBuilder};
pub use options::{
    AudioSettings, CopySource, DecoderOptions, EncoderOptions, Options, Pass, RateControl,
    StreamingOptions, VideoSettings,
};
pub use pool::FramePool;
pub use rational::{rescale_q, Rational};
pub use remux::Remuxer;
pub use resampler::{AudioFormat, Resampler};
pub use scaler::{ScaleAlgorithm, Scaler};
pub use stream::StreamInfo;
pub use twopass::{transcode_two_pass, TwoPassOptions};
