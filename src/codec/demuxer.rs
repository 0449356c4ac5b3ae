//! Input format context wrapper
//!
//! RAII over `AVFormatContext` for demuxing: open from URL or custom I/O,
//! stream discovery, packet reading, seeking, program enumeration.

use std::ffi::{CStr, CString};
use std::os::raw::{c_int, c_uint};

use crate::callback::{self, Callback};
use crate::error::{check, Error, Result};
use crate::ffi::offsets::{self, FormatCtxPrefix, ProgramPrefix};
use crate::ffi::shim;
use crate::ffi::types::{seek_flag, AVFormatContext, AVInputFormat, AVProgram, AVStream};
use crate::init::Ffmpeg;

use super::dict::Dictionary;
use super::io::IoContext;
use super::packet::Packet;
use super::stream::{read_dictionary, StreamRef};

/// A program inside a multi-program container (MPEG-TS and similar).
#[derive(Debug, Clone)]
pub struct ProgramInfo {
    pub id: i32,
    pub program_num: i32,
    pub stream_indexes: Vec<u32>,
}

/// Demuxing context.
pub struct Demuxer {
    ptr: *mut AVFormatContext,
    custom_io: Option<IoContext>,
    interrupt_handle: Option<u64>,
    av: &'static Ffmpeg,
}

unsafe impl Send for Demuxer {}

impl Demuxer {
    /// Open a URL (file path or protocol URL). The options dictionary is
    /// consumed.
    pub fn open(
        url: &str,
        format_hint: Option<&str>,
        mut options: Option<&mut Dictionary>,
        interrupt: Option<Box<dyn FnMut() -> bool + Send>>,
    ) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let c_url = CString::new(url).map_err(|_| Error::InvalidArgument("NUL in URL"))?;
        let input_format = Self::resolve_hint(av, format_hint)?;

        // The interrupt callback must be installed before open, which means
        // allocating the context ourselves.
        let mut ctx_ptr = std::ptr::null_mut();
        let mut interrupt_handle = None;
        if let Some(probe) = interrupt {
            ctx_ptr = unsafe { (av.avformat.avformat_alloc_context)() };
            if ctx_ptr.is_null() {
                return Err(Error::OutOfMemory("AVFormatContext"));
            }
            let handle = callback::register(Callback::Interrupt(probe));
            let trampoline: unsafe extern "C" fn(*mut std::ffi::c_void) -> c_int =
                callback::interrupt_trampoline;
            if let Err(e) = shim::fmt_set_interrupt(
                ctx_ptr,
                trampoline as *mut std::ffi::c_void,
                callback::id_to_opaque(handle),
            ) {
                callback::unregister(handle);
                unsafe { (av.avformat.avformat_free_context)(ctx_ptr) };
                return Err(e);
            }
            interrupt_handle = Some(handle);
        }

        let opts_ptr = options
            .as_deref_mut()
            .map_or(std::ptr::null_mut(), |d| d.as_inout());
        let ret = unsafe {
            (av.avformat.avformat_open_input)(&mut ctx_ptr, c_url.as_ptr(), input_format, opts_ptr)
        };
        if ret < 0 {
            // On failure avformat_open_input frees the context.
            if let Some(handle) = interrupt_handle {
                callback::unregister(handle);
            }
            return Err(Error::from_av("avformat_open_input", ret));
        }

        let mut demuxer = Self {
            ptr: ctx_ptr,
            custom_io: None,
            interrupt_handle,
            av,
        };
        demuxer.find_stream_info()?;
        Ok(demuxer)
    }

    /// Open over custom I/O callbacks.
    pub fn open_io(
        io: IoContext,
        format_hint: Option<&str>,
        mut options: Option<&mut Dictionary>,
    ) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let input_format = Self::resolve_hint(av, format_hint)?;

        let ctx_ptr = unsafe { (av.avformat.avformat_alloc_context)() };
        if ctx_ptr.is_null() {
            return Err(Error::OutOfMemory("AVFormatContext"));
        }
        unsafe { (*ctx_ptr.cast::<FormatCtxPrefix>()).pb = io.as_ptr().cast() };

        let opts_ptr = options
            .as_deref_mut()
            .map_or(std::ptr::null_mut(), |d| d.as_inout());
        let mut ctx_ptr_mut = ctx_ptr;
        let ret = unsafe {
            (av.avformat.avformat_open_input)(
                &mut ctx_ptr_mut,
                std::ptr::null(),
                input_format,
                opts_ptr,
            )
        };
        check("avformat_open_input", ret)?;

        let mut demuxer = Self {
            ptr: ctx_ptr_mut,
            custom_io: Some(io),
            interrupt_handle: None,
            av,
        };
        demuxer.find_stream_info()?;
        Ok(demuxer)
    }

    fn resolve_hint(
        av: &'static Ffmpeg,
        format_hint: Option<&str>,
    ) -> Result<*const AVInputFormat> {
        let Some(name) = format_hint else {
            return Ok(std::ptr::null());
        };
        let c_name = CString::new(name).map_err(|_| Error::InvalidArgument("NUL in format"))?;
        let fmt = unsafe { (av.avformat.av_find_input_format)(c_name.as_ptr()) };
        if fmt.is_null() {
            return Err(Error::Ffmpeg {
                op: "av_find_input_format",
                code: crate::ffi::error::AVERROR_DEMUXER_NOT_FOUND,
                message: format!("demuxer '{name}' not found"),
            });
        }
        Ok(fmt)
    }

    fn find_stream_info(&mut self) -> Result<()> {
        let ret =
            unsafe { (self.av.avformat.avformat_find_stream_info)(self.ptr, std::ptr::null_mut()) };
        check("avformat_find_stream_info", ret)?;
        Ok(())
    }

    fn prefix(&self) -> &FormatCtxPrefix {
        unsafe { &*self.ptr.cast::<FormatCtxPrefix>() }
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

    /// Container duration in `AV_TIME_BASE` units (microseconds).
    pub fn duration_us(&self) -> Option<i64> {
        let d: i64 = unsafe { offsets::read(self.ptr.cast(), self.av.offsets.fmt.duration) };
        (d > 0).then_some(d)
    }

    /// Total bit rate when the demuxer reports one.
    pub fn bit_rate(&self) -> Option<i64> {
        let b: i64 = unsafe { offsets::read(self.ptr.cast(), self.av.offsets.fmt.bit_rate) };
        (b > 0).then_some(b)
    }

    /// The demuxer short name.
    pub fn format_name(&self) -> Option<String> {
        let iformat = self.prefix().iformat;
        if iformat.is_null() {
            return None;
        }
        let name = unsafe { (*iformat.cast::<offsets::InputFormatPrefix>()).name };
        if name.is_null() {
            return None;
        }
        Some(unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned())
    }

    /// Container-level metadata copied into host storage.
    pub fn metadata(&self) -> Vec<(String, String)> {
        let dict = unsafe { offsets::read(self.ptr.cast(), self.av.offsets.fmt.metadata) };
        read_dictionary(self.av, dict)
    }

    /// Programs declared by the container.
    pub fn programs(&self) -> Vec<ProgramInfo> {
        let nb: c_uint = unsafe { offsets::read(self.ptr.cast(), self.av.offsets.fmt.nb_programs) };
        let programs: *mut *mut AVProgram =
            unsafe { offsets::read(self.ptr.cast(), self.av.offsets.fmt.programs) };
        let mut out = Vec::new();
        if programs.is_null() {
            return out;
        }
        for i in 0..nb as usize {
            let program = unsafe { *programs.add(i) };
            if program.is_null() {
                continue;
            }
            let p = unsafe { &*program.cast::<ProgramPrefix>() };
            let stream_indexes = if p.stream_index.is_null() {
                Vec::new()
            } else {
                unsafe {
                    std::slice::from_raw_parts(p.stream_index, p.nb_stream_indexes as usize)
                        .to_vec()
                }
            };
            out.push(ProgramInfo {
                id: p.id,
                program_num: p.program_num,
                stream_indexes,
            });
        }
        out
    }

    /// Read the next packet into `packet`. `Eof` at end of container.
    pub fn read_packet(&mut self, packet: &mut Packet) -> Result<()> {
        let ret = unsafe { (self.av.avformat.av_read_frame)(self.ptr, packet.as_mut_ptr()) };
        check("av_read_frame", ret)?;
        Ok(())
    }

    /// Seek to the nearest preceding key frame of `timestamp` (stream -1 =
    /// `AV_TIME_BASE` units).
    pub fn seek_backward(&mut self, stream_index: i32, timestamp: i64) -> Result<()> {
        let ret = unsafe {
            (self.av.avformat.av_seek_frame)(self.ptr, stream_index, timestamp, seek_flag::BACKWARD)
        };
        check("av_seek_frame", ret)?;
        Ok(())
    }

    /// Best stream of a media type as chosen by FFmpeg.
    pub fn find_best_stream(&mut self, media_type: c_int) -> Option<u32> {
        let ret = unsafe {
            (self.av.avformat.av_find_best_stream)(
                self.ptr,
                media_type,
                -1,
                -1,
                std::ptr::null_mut(),
                0,
            )
        };
        (ret >= 0).then_some(ret as u32)
    }
}

impl Drop for Demuxer {
    fn drop(&mut self) {
        unsafe {
            if self.custom_io.is_some() {
                // Detach our AVIO context so FFmpeg does not try to close it;
                // the IoContext drops it properly afterwards.
                (*self.ptr.cast::<FormatCtxPrefix>()).pb = std::ptr::null_mut();
                (self.av.avformat.avformat_free_context)(self.ptr);
            } else {
                (self.av.avformat.avformat_close_input)(&mut self.ptr);
            }
        }
        // Native code can no longer poll the interrupt.
        if let Some(handle) = self.interrupt_handle.take() {
            callback::unregister(handle);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_nonexistent_is_io_error() {
        if Ffmpeg::get().is_err() {
            return;
        }
        match Demuxer::open("/definitely/not/a/file.mp4", None, None, None) {
            Err(Error::Io { op, .. }) => assert_eq!(op, "avformat_open_input"),
            Err(Error::Ffmpeg { .. }) => {} // some builds report a protocol error
            Err(other) => panic!("expected an error, got {other:?}"),
            Ok(_) => panic!("expected an error, got Ok"),
        }
    }

    #[test]
    fn test_unknown_format_hint() {
        if Ffmpeg::get().is_err() {
            return;
        }
        assert!(Demuxer::open("x.bin", Some("not-a-demuxer"), None, None).is_err());
    }
}
