//! Reference-counted buffer arenas and pinned-memory accounting
//!
//! `BufferRef` wraps a host-owned byte arena in FFmpeg's atomic refcount.
//! The free callback crosses the boundary as an integer registry handle and
//! fires exactly once, on whichever thread drops the last reference. Bytes
//! wrapped this way are "pinned": counted process-wide and checked against
//! the optional limit configured at init.

use std::sync::atomic::{AtomicUsize, Ordering};

use crate::callback;
use crate::error::{Error, Result};
use crate::ffi::types::AVBufferRef;
use crate::init::Ffmpeg;

static PINNED_BYTES: AtomicUsize = AtomicUsize::new(0);

/// Bytes of host memory currently pinned by wrapped buffers.
pub fn pinned_bytes() -> usize {
    PINNED_BYTES.load(Ordering::SeqCst)
}

/// Account for `len` newly pinned bytes, enforcing the configured limit.
pub(crate) fn pin(av: &Ffmpeg, len: usize) -> Result<()> {
    let previous = PINNED_BYTES.fetch_add(len, Ordering::SeqCst);
    if let Some(limit) = av.pinned_limit() {
        if previous + len > limit {
            PINNED_BYTES.fetch_sub(len, Ordering::SeqCst);
            return Err(Error::InvalidArgument("pinned memory limit exceeded"));
        }
    }
    Ok(())
}

pub(crate) fn unpin(len: usize) {
    PINNED_BYTES.fetch_sub(len, Ordering::SeqCst);
}

/// A shared, refcounted byte arena; lifetime is that of the longest holder.
pub struct BufferRef {
    ptr: *mut AVBufferRef,
    av: &'static Ffmpeg,
}

unsafe impl Send for BufferRef {}

impl BufferRef {
    /// Wrap a host buffer without copying. The buffer is pinned until the
    /// last reference drops.
    pub fn create(buffer: Vec<u8>) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let len = buffer.len();
        pin(av, len)?;

        let mut buffer = buffer;
        let data_ptr = buffer.as_mut_ptr();
        let handle = callback::register(callback::Callback::BufferFree(Box::new(move || {
            unpin(len);
            drop(buffer);
        })));

        let ptr = unsafe {
            (av.avutil.av_buffer_create)(
                data_ptr,
                len,
                Some(callback::buffer_free_trampoline),
                callback::id_to_opaque(handle),
                0,
            )
        };
        if ptr.is_null() {
            unsafe {
                callback::buffer_free_trampoline(callback::id_to_opaque(handle), data_ptr);
            }
            return Err(Error::OutOfMemory("AVBufferRef"));
        }
        Ok(Self { ptr, av })
    }

    pub fn as_ptr(&self) -> *mut AVBufferRef {
        self.ptr
    }

    /// Current reference count.
    pub fn ref_count(&self) -> i32 {
        unsafe { (self.av.avutil.av_buffer_get_ref_count)(self.ptr) }
    }

    /// Bump the refcount and return another handle to the same arena.
    pub fn try_clone(&self) -> Result<Self> {
        let ptr = unsafe { (self.av.avutil.av_buffer_ref)(self.ptr) };
        if ptr.is_null() {
            return Err(Error::OutOfMemory("AVBufferRef"));
        }
        Ok(Self { ptr, av: self.av })
    }

    /// Hand the reference to a consumer; the caller no longer releases it.
    pub(crate) fn into_raw(self) -> *mut AVBufferRef {
        let ptr = self.ptr;
        std::mem::forget(self);
        ptr
    }
}

impl Drop for BufferRef {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { (self.av.avutil.av_buffer_unref)(&mut self.ptr) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pinned_counter_returns_to_baseline() {
        let Ok(_) = Ffmpeg::get() else {
            return;
        };
        let before = pinned_bytes();
        {
            let buf = BufferRef::create(vec![0u8; 4096]).unwrap();
            assert_eq!(pinned_bytes(), before + 4096);
            assert_eq!(buf.ref_count(), 1);
            let second = buf.try_clone().unwrap();
            assert_eq!(second.ref_count(), 2);
            assert_eq!(pinned_bytes(), before + 4096);
        }
        assert_eq!(pinned_bytes(), before);
    }
}
