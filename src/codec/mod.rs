//! Safe RAII wrappers over the bound FFmpeg objects
//!
//! Everything here expresses the borrow/own contracts of the refcounted
//! FFmpeg objects in the type system: owned wrappers release exactly once in
//! their destructor, borrowed wrappers never release, and releasing a
//! borrowed wrapper is a typed error rather than a free.

pub mod buffer;
pub mod context;
pub mod demuxer;
pub mod dict;
pub mod frame;
pub mod io;
pub mod muxer;
pub mod packet;
pub(crate) mod stream;

pub use buffer::pinned_bytes;
pub use context::{CodecContext, Parameters};
pub use dict::Dictionary;
pub use frame::Frame;
pub use packet::Packet;
