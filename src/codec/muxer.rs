//! Output format context wrapper
//!
//! RAII over `AVFormatContext` for muxing: stream creation, lazy byte-I/O
//! open, header/trailer bookkeeping and interleaved packet writes.

use std::ffi::CString;
use std::os::raw::c_int;

use crate::error::{check, Error, Result};
use crate::ffi::offsets::{FormatCtxPrefix, OutputFormatPrefix};
use crate::ffi::types::{avio_flag, fmt_flag, AVFormatContext, AVIOContext, AVStream};
use crate::init::Ffmpeg;

use super::dict::Dictionary;
use super::io::IoContext;
use super::packet::Packet;
use super::stream::StreamRef;

/// Muxing context.
pub struct Muxer {
    ptr: *mut AVFormatContext,
    url: Option<CString>,
    custom_io: Option<IoContext>,
    opened_io: bool,
    header_written: bool,
    trailer_written: bool,
    av: &'static Ffmpeg,
}

unsafe impl Send for Muxer {}

impl Muxer {
    /// Allocate an output context for a URL and/or an explicit muxer short
    /// name.
    pub fn create(url: Option<&str>, format_name: Option<&str>) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let c_url = url
            .map(CString::new)
            .transpose()
            .map_err(|_| Error::InvalidArgument("NUL in URL"))?;
        let c_format = format_name
            .map(CString::new)
            .transpose()
            .map_err(|_| Error::InvalidArgument("NUL in format name"))?;

        let mut ptr = std::ptr::null_mut();
        let ret = unsafe {
            (av.avformat.avformat_alloc_output_context2)(
                &mut ptr,
                std::ptr::null(),
                c_format.as_ref().map_or(std::ptr::null(), |f| f.as_ptr()),
                c_url.as_ref().map_or(std::ptr::null(), |u| u.as_ptr()),
            )
        };
        check("avformat_alloc_output_context2", ret)?;
        if ptr.is_null() {
            return Err(Error::OutOfMemory("AVFormatContext"));
        }
        Ok(Self {
            ptr,
            url: c_url,
            custom_io: None,
            opened_io: false,
            header_written: false,
            trailer_written: false,
            av,
        })
    }

    fn prefix(&self) -> &FormatCtxPrefix {
        unsafe { &*self.ptr.cast::<FormatCtxPrefix>() }
    }

    fn oformat_flags(&self) -> c_int {
        let oformat = self.prefix().oformat;
        if oformat.is_null() {
            return 0;
        }
        unsafe { (*oformat.cast::<OutputFormatPrefix>()).flags }
    }

    /// Whether this container wants out-of-band codec parameters.
    pub fn needs_global_header(&self) -> bool {
        self.oformat_flags() & fmt_flag::GLOBAL_HEADER != 0
    }

    /// Whether the muxer expects the caller to open the byte stream.
    fn needs_file(&self) -> bool {
        self.oformat_flags() & fmt_flag::NOFILE == 0
    }

    pub fn nb_streams(&self) -> u32 {
        self.prefix().nb_streams
    }

    pub(crate) fn stream(&self, index: u32) -> Option<StreamRef> {
        if index >= self.nb_streams() {
            return None;
        }
        let ptr = unsafe { *self.prefix().streams.add(index as usize) } as *mut AVStream;
        if ptr.is_null() {
            return None;
        }
        Some(unsafe { StreamRef::new(ptr, self.av) })
    }

    /// Append a stream without a codec; the caller fills its parameters.
    pub(crate) fn new_stream(&mut self) -> Result<StreamRef> {
        let ptr = unsafe { (self.av.avformat.avformat_new_stream)(self.ptr, std::ptr::null()) };
        if ptr.is_null() {
            return Err(Error::OutOfMemory("AVStream"));
        }
        Ok(unsafe { StreamRef::new(ptr, self.av) })
    }

    /// Route output through caller-supplied I/O instead of a file.
    pub fn set_custom_io(&mut self, io: IoContext) {
        unsafe { (*self.ptr.cast::<FormatCtxPrefix>()).pb = io.as_ptr().cast() };
        self.custom_io = Some(io);
    }

    /// Open the byte stream for the stored URL, if the muxer needs one and
    /// none is attached yet. The options dictionary is consumed.
    pub fn open_io(&mut self, mut io_options: Option<&mut Dictionary>) -> Result<()> {
        if self.opened_io || self.custom_io.is_some() || !self.needs_file() {
            return Ok(());
        }
        let url = self
            .url
            .as_ref()
            .ok_or(Error::InvalidArgument("output URL required"))?;
        let mut pb: *mut AVIOContext = std::ptr::null_mut();
        let opts_ptr = io_options
            .as_deref_mut()
            .map_or(std::ptr::null_mut(), |d| d.as_inout());
        let ret = unsafe {
            (self.av.avformat.avio_open2)(
                &mut pb,
                url.as_ptr(),
                avio_flag::WRITE,
                std::ptr::null(),
                opts_ptr,
            )
        };
        check("avio_open2", ret)?;
        unsafe { (*self.ptr.cast::<FormatCtxPrefix>()).pb = pb.cast() };
        self.opened_io = true;
        Ok(())
    }

    pub fn header_written(&self) -> bool {
        self.header_written
    }

    /// Write the container header. The muxer options dictionary is consumed;
    /// leftovers the muxer did not recognize are logged.
    pub fn write_header(&mut self, mut options: Option<&mut Dictionary>) -> Result<()> {
        if self.header_written {
            return Err(Error::HeaderAlreadyWritten);
        }
        let opts_ptr = options
            .as_deref_mut()
            .map_or(std::ptr::null_mut(), |d| d.as_inout());
        let ret = unsafe { (self.av.avformat.avformat_write_header)(self.ptr, opts_ptr) };
        check("avformat_write_header", ret)?;
        self.header_written = true;
        if let Some(dict) = options {
            for (key, value) in dict.entries() {
                tracing::debug!(key, value, "muxer ignored option");
            }
        }
        Ok(())
    }

    /// Hand a packet to the interleaving writer. The packet is left blank
    /// afterwards (the muxer takes the reference).
    pub fn interleaved_write(&mut self, packet: &mut Packet) -> Result<()> {
        let ret =
            unsafe { (self.av.avformat.av_interleaved_write_frame)(self.ptr, packet.as_mut_ptr()) };
        check("av_interleaved_write_frame", ret)?;
        Ok(())
    }

    /// Finalize the container. Only valid after the header was written.
    pub fn write_trailer(&mut self) -> Result<()> {
        if !self.header_written || self.trailer_written {
            return Ok(());
        }
        let ret = unsafe { (self.av.avformat.av_write_trailer)(self.ptr) };
        check("av_write_trailer", ret)?;
        self.trailer_written = true;
        Ok(())
    }

    /// Close the byte stream opened by [`Muxer::open_io`].
    pub fn close_io(&mut self) {
        if self.opened_io {
            unsafe {
                let mut pb = (*self.ptr.cast::<FormatCtxPrefix>()).pb as *mut AVIOContext;
                (self.av.avformat.avio_closep)(&mut pb);
                (*self.ptr.cast::<FormatCtxPrefix>()).pb = std::ptr::null_mut();
            }
            self.opened_io = false;
        }
        if let Some(io) = self.custom_io.take() {
            unsafe { (*self.ptr.cast::<FormatCtxPrefix>()).pb = std::ptr::null_mut() };
            drop(io);
        }
    }
}

impl Drop for Muxer {
    fn drop(&mut self) {
        if self.header_written && !self.trailer_written {
            tracing::warn!("muxer dropped without close; writing trailer as a last resort");
            let _ = self.write_trailer();
        }
        self.close_io();
        unsafe { (self.av.avformat.avformat_free_context)(self.ptr) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_by_format_name() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let muxer = Muxer::create(None, Some("mp4")).unwrap();
        // MP4 requires out-of-band parameter sets.
        assert!(muxer.needs_global_header());
        assert_eq!(muxer.nb_streams(), 0);
    }

    #[test]
    fn test_trailer_before_header_is_noop() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let mut muxer = Muxer::create(None, Some("mp4")).unwrap();
        muxer.write_trailer().unwrap();
        assert!(!muxer.header_written());
    }

    #[test]
    fn test_unknown_muxer() {
        if Ffmpeg::get().is_err() {
            return;
        }
        assert!(Muxer::create(None, Some("not-a-muxer")).is_err());
    }
}
