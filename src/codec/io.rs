//! Custom byte I/O contexts
//!
//! Wraps `avio_alloc_context` around the fixed trampolines in
//! [`crate::callback`]: the AVIO opaque slot carries only a registry handle,
//! never a host pointer. The `IoContext` owns the registration and removes
//! it after the native context is gone, so an in-flight native call can
//! never observe a missing entry.

use std::io::{Read, Seek, SeekFrom, Write};
use std::os::raw::c_int;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::callback::{self, Callback, IoCallbacks};
use crate::error::{Error, Result};
use crate::ffi::offsets::IoContextPrefix;
use crate::ffi::types::AVIOContext;
use crate::init::Ffmpeg;

/// Transfer buffer handed to FFmpeg (it may grow or replace it).
const IO_BUFFER_SIZE: usize = 32 * 1024;

/// A custom I/O context backed by host callbacks.
pub struct IoContext {
    ptr: *mut AVIOContext,
    handle: u64,
    av: &'static Ffmpeg,
}

unsafe impl Send for IoContext {}

impl IoContext {
    /// Reading context over any seekable byte source.
    pub fn reader<R>(source: R) -> Result<Self>
    where
        R: Read + Seek + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(source));
        let read = {
            let shared = Arc::clone(&shared);
            Box::new(move |buf: &mut [u8]| shared.lock().read(buf))
                as Box<dyn FnMut(&mut [u8]) -> std::io::Result<usize> + Send>
        };
        let seek = {
            let shared = Arc::clone(&shared);
            Box::new(move |pos: SeekFrom| shared.lock().seek(pos))
                as Box<dyn FnMut(SeekFrom) -> std::io::Result<u64> + Send>
        };
        let size = {
            let shared = Arc::clone(&shared);
            Box::new(move || {
                let mut src = shared.lock();
                let here = src.stream_position().ok()?;
                let end = src.seek(SeekFrom::End(0)).ok()?;
                src.seek(SeekFrom::Start(here)).ok()?;
                Some(end)
            }) as Box<dyn FnMut() -> Option<u64> + Send>
        };
        Self::alloc(
            0,
            IoCallbacks {
                read: Some(read),
                write: None,
                seek: Some(seek),
                size: Some(size),
            },
        )
    }

    /// Reading context over an in-memory byte vector.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        Self::reader(std::io::Cursor::new(bytes))
    }

    /// Writing context over any seekable byte sink.
    pub fn writer<W>(sink: W) -> Result<Self>
    where
        W: Write + Seek + Send + 'static,
    {
        let shared = Arc::new(Mutex::new(sink));
        let write = {
            let shared = Arc::clone(&shared);
            Box::new(move |buf: &[u8]| shared.lock().write(buf))
                as Box<dyn FnMut(&[u8]) -> std::io::Result<usize> + Send>
        };
        let seek = {
            let shared = Arc::clone(&shared);
            Box::new(move |pos: SeekFrom| shared.lock().seek(pos))
                as Box<dyn FnMut(SeekFrom) -> std::io::Result<u64> + Send>
        };
        Self::alloc(
            1,
            IoCallbacks {
                read: None,
                write: Some(write),
                seek: Some(seek),
                size: None,
            },
        )
    }

    fn alloc(write_flag: c_int, callbacks: IoCallbacks) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let has_read = callbacks.read.is_some();
        let has_write = callbacks.write.is_some();
        let has_seek = callbacks.seek.is_some();
        let handle = callback::register(Callback::Io(callbacks));

        let buffer = unsafe { (av.avutil.av_malloc)(IO_BUFFER_SIZE) } as *mut u8;
        if buffer.is_null() {
            callback::unregister(handle);
            return Err(Error::OutOfMemory("AVIO buffer"));
        }

        let ptr = unsafe {
            (av.avformat.avio_alloc_context)(
                buffer,
                IO_BUFFER_SIZE as c_int,
                write_flag,
                callback::id_to_opaque(handle),
                has_read.then_some(callback::read_trampoline),
                has_write.then_some(callback::write_trampoline),
                has_seek.then_some(callback::seek_trampoline),
            )
        };
        if ptr.is_null() {
            unsafe { (av.avutil.av_free)(buffer.cast()) };
            callback::unregister(handle);
            return Err(Error::OutOfMemory("AVIOContext"));
        }

        Ok(Self { ptr, handle, av })
    }

    pub(crate) fn as_ptr(&self) -> *mut AVIOContext {
        self.ptr
    }

    pub fn flush(&mut self) {
        unsafe { (self.av.avformat.avio_flush)(self.ptr) };
    }
}

impl Drop for IoContext {
    fn drop(&mut self) {
        unsafe {
            // FFmpeg may have replaced the transfer buffer; free whatever is
            // current, then the context itself.
            let buffer = (*self.ptr.cast::<IoContextPrefix>()).buffer;
            if !buffer.is_null() {
                (self.av.avutil.av_free)(buffer.cast());
            }
            (self.av.avformat.avio_context_free)(&mut self.ptr);
        }
        // Only now can no native call reach the handle.
        callback::unregister(self.handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_lifecycle_unregisters() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let handle;
        {
            let ctx = IoContext::from_bytes(vec![1, 2, 3, 4]).unwrap();
            handle = ctx.handle;
            assert!(callback::lookup(handle));
            assert!(!ctx.ptr.is_null());
        }
        assert!(!callback::lookup(handle));
    }

    #[test]
    fn test_writer_lifecycle() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let ctx = IoContext::writer(std::io::Cursor::new(Vec::new())).unwrap();
        assert!(callback::lookup(ctx.handle));
    }
}
