//! Hand-written FFmpeg bindings, bound at runtime (no bindgen, no link-time
//! FFmpeg dependency)
//!
//! All FFmpeg structs are opaque; field access goes through stable-prefix
//! mirrors, versioned offset tables, or the companion native shim.

pub mod avcodec;
pub mod avdevice;
pub mod avfilter;
pub mod avformat;
pub mod avutil;
pub mod error;
pub mod loader;
pub mod offsets;
pub mod shim;
pub mod swresample;
pub mod swscale;
pub mod types;

pub use types::*;
