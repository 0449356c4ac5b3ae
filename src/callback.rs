//! Process-wide callback registry
//!
//! Native code never holds a host pointer: every callback FFmpeg can invoke
//! is registered here under a monotonically increasing integer handle, and a
//! single fixed trampoline per callback family multiplexes all instances by
//! looking the handle up again on entry. Dynamic-loader runtimes cap the
//! number of native-callable trampolines, so creating ten thousand decoders
//! must not create ten thousand trampolines.
//!
//! A missing handle makes the trampoline return the protocol abort value
//! (`-1` for I/O, `1` for interrupt) instead of touching freed state.

use std::collections::HashMap;
use std::ffi::c_void;
use std::io::SeekFrom;
use std::os::raw::c_int;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use crate::ffi::error::AVERROR_EOF;
use crate::ffi::types::seek_whence;

/// Host-side closures for one custom I/O source or sink.
#[derive(Default)]
pub(crate) struct IoCallbacks {
    pub read: Option<Box<dyn FnMut(&mut [u8]) -> std::io::Result<usize> + Send>>,
    pub write: Option<Box<dyn FnMut(&[u8]) -> std::io::Result<usize> + Send>>,
    pub seek: Option<Box<dyn FnMut(SeekFrom) -> std::io::Result<u64> + Send>>,
    /// Total stream length for the size pseudo-whence, when known.
    pub size: Option<Box<dyn FnMut() -> Option<u64> + Send>>,
}

/// One registered callback.
pub(crate) enum Callback {
    Io(IoCallbacks),
    /// Returns true to abort the blocking native operation.
    Interrupt(Box<dyn FnMut() -> bool + Send>),
    /// Runs when the last reference to a wrapped buffer drops.
    BufferFree(Box<dyn FnOnce() + Send>),
}

struct Registry {
    next_id: u64,
    table: HashMap<u64, Arc<Mutex<Callback>>>,
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| {
    Mutex::new(Registry {
        next_id: 1,
        table: HashMap::new(),
    })
});

/// Register a callback, returning its handle.
pub(crate) fn register(callback: Callback) -> u64 {
    let mut reg = REGISTRY.lock();
    let id = reg.next_id;
    reg.next_id += 1;
    reg.table.insert(id, Arc::new(Mutex::new(callback)));
    id
}

/// Remove a callback. An in-flight trampoline call keeps its own reference,
/// so the closure is not torn down mid-invocation.
pub(crate) fn unregister(id: u64) -> bool {
    REGISTRY.lock().table.remove(&id).is_some()
}

/// Whether a handle is still registered (observed by tests).
#[cfg(test)]
pub(crate) fn lookup(id: u64) -> bool {
    REGISTRY.lock().table.contains_key(&id)
}

fn entry(id: u64) -> Option<Arc<Mutex<Callback>>> {
    REGISTRY.lock().table.get(&id).cloned()
}

/// Handle id → the opaque pointer handed to native code.
pub(crate) fn id_to_opaque(id: u64) -> *mut c_void {
    id as usize as *mut c_void
}

fn opaque_to_id(opaque: *mut c_void) -> u64 {
    opaque as usize as u64
}

// ============================================================================
// Fixed trampolines (one per family for the whole process)
// ============================================================================

/// Custom I/O read: bytes produced, the native EOF sentinel, or -1.
pub(crate) unsafe extern "C" fn read_trampoline(
    opaque: *mut c_void,
    buf: *mut u8,
    buf_size: c_int,
) -> c_int {
    if buf.is_null() || buf_size <= 0 {
        return -1;
    }
    let Some(entry) = entry(opaque_to_id(opaque)) else {
        return -1;
    };
    let mut guard = entry.lock();
    let Callback::Io(io) = &mut *guard else {
        return -1;
    };
    let Some(read) = io.read.as_mut() else {
        return -1;
    };
    let data = unsafe { std::slice::from_raw_parts_mut(buf, buf_size as usize) };
    match read(data) {
        Ok(0) => AVERROR_EOF,
        Ok(n) => n as c_int,
        Err(_) => -1,
    }
}

/// Custom I/O write: bytes consumed or -1.
pub(crate) unsafe extern "C" fn write_trampoline(
    opaque: *mut c_void,
    buf: *const u8,
    buf_size: c_int,
) -> c_int {
    if buf.is_null() || buf_size <= 0 {
        return -1;
    }
    let Some(entry) = entry(opaque_to_id(opaque)) else {
        return -1;
    };
    let mut guard = entry.lock();
    let Callback::Io(io) = &mut *guard else {
        return -1;
    };
    let Some(write) = io.write.as_mut() else {
        return -1;
    };
    let data = unsafe { std::slice::from_raw_parts(buf, buf_size as usize) };
    match write(data) {
        Ok(n) => n as c_int,
        Err(_) => -1,
    }
}

/// Custom I/O seek: new absolute position, stream size for the size
/// pseudo-whence, or a negative value.
pub(crate) unsafe extern "C" fn seek_trampoline(
    opaque: *mut c_void,
    offset: i64,
    whence: c_int,
) -> i64 {
    let Some(entry) = entry(opaque_to_id(opaque)) else {
        return -1;
    };
    let mut guard = entry.lock();
    let Callback::Io(io) = &mut *guard else {
        return -1;
    };

    if whence == seek_whence::AVSEEK_SIZE {
        return match io.size.as_mut().and_then(|size| size()) {
            Some(len) => len as i64,
            None => -1,
        };
    }

    let Some(seek) = io.seek.as_mut() else {
        return -1;
    };
    let pos = match whence {
        seek_whence::SET => SeekFrom::Start(offset as u64),
        seek_whence::CUR => SeekFrom::Current(offset),
        seek_whence::END => SeekFrom::End(offset),
        _ => return -1,
    };
    match seek(pos) {
        Ok(new_pos) => new_pos as i64,
        Err(_) => -1,
    }
}

/// Interrupt probe: 1 aborts the blocking operation, 0 continues. A missing
/// handle aborts.
pub(crate) unsafe extern "C" fn interrupt_trampoline(opaque: *mut c_void) -> c_int {
    let Some(entry) = entry(opaque_to_id(opaque)) else {
        return 1;
    };
    let mut guard = entry.lock();
    let Callback::Interrupt(probe) = &mut *guard else {
        return 1;
    };
    if probe() {
        1
    } else {
        0
    }
}

/// Buffer-free notification from `av_buffer_unref` dropping the last
/// reference. Fires exactly once; the entry removes itself here because no
/// component outlives the buffer to do it.
pub(crate) unsafe extern "C" fn buffer_free_trampoline(opaque: *mut c_void, _data: *mut u8) {
    let id = opaque_to_id(opaque);
    let Some(entry) = REGISTRY.lock().table.remove(&id) else {
        return;
    };
    let callback = Arc::try_unwrap(entry);
    match callback {
        Ok(mutex) => {
            if let Callback::BufferFree(free) = mutex.into_inner() {
                free();
            }
        }
        // A concurrent lookup still holds the entry; nothing else can invoke
        // a buffer-free handle twice, so dropping here is safe.
        Err(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[test]
    fn test_register_unregister() {
        let id = register(Callback::Interrupt(Box::new(|| false)));
        assert!(lookup(id));
        assert!(unregister(id));
        assert!(!lookup(id));
        assert!(!unregister(id));
    }

    #[test]
    fn test_ids_are_monotonic() {
        let a = register(Callback::Interrupt(Box::new(|| false)));
        let b = register(Callback::Interrupt(Box::new(|| false)));
        assert!(b > a);
        unregister(a);
        unregister(b);
    }

    #[test]
    fn test_read_trampoline_roundtrip() {
        let id = register(Callback::Io(IoCallbacks {
            read: Some(Box::new(|buf| {
                buf[..3].copy_from_slice(b"abc");
                Ok(3)
            })),
            ..Default::default()
        }));
        let mut buf = [0u8; 8];
        let n = unsafe { read_trampoline(id_to_opaque(id), buf.as_mut_ptr(), buf.len() as c_int) };
        assert_eq!(n, 3);
        assert_eq!(&buf[..3], b"abc");
        unregister(id);
    }

    #[test]
    fn test_read_eof_maps_to_sentinel() {
        let id = register(Callback::Io(IoCallbacks {
            read: Some(Box::new(|_| Ok(0))),
            ..Default::default()
        }));
        let mut buf = [0u8; 8];
        let n = unsafe { read_trampoline(id_to_opaque(id), buf.as_mut_ptr(), buf.len() as c_int) };
        assert_eq!(n, AVERROR_EOF);
        unregister(id);
    }

    #[test]
    fn test_missing_handle_aborts() {
        let mut buf = [0u8; 4];
        let n = unsafe {
            read_trampoline(id_to_opaque(u64::MAX), buf.as_mut_ptr(), buf.len() as c_int)
        };
        assert_eq!(n, -1);
        let abort = unsafe { interrupt_trampoline(id_to_opaque(u64::MAX)) };
        assert_eq!(abort, 1);
    }

    #[test]
    fn test_seek_size_pseudo_whence() {
        let id = register(Callback::Io(IoCallbacks {
            seek: Some(Box::new(|_| Ok(42))),
            size: Some(Box::new(|| Some(1000))),
            ..Default::default()
        }));
        let size = unsafe { seek_trampoline(id_to_opaque(id), 0, seek_whence::AVSEEK_SIZE) };
        assert_eq!(size, 1000);
        let pos = unsafe { seek_trampoline(id_to_opaque(id), 42, seek_whence::SET) };
        assert_eq!(pos, 42);
        unregister(id);
    }

    #[test]
    fn test_interrupt_polls_closure() {
        let flag = std::sync::Arc::new(AtomicBool::new(false));
        let probe_flag = flag.clone();
        let id = register(Callback::Interrupt(Box::new(move || {
            probe_flag.load(Ordering::SeqCst)
        })));
        assert_eq!(unsafe { interrupt_trampoline(id_to_opaque(id)) }, 0);
        flag.store(true, Ordering::SeqCst);
        assert_eq!(unsafe { interrupt_trampoline(id_to_opaque(id)) }, 1);
        unregister(id);
    }

    #[test]
    fn test_buffer_free_fires_once_and_unregisters() {
        let count = std::sync::Arc::new(AtomicUsize::new(0));
        let freed = count.clone();
        let id = register(Callback::BufferFree(Box::new(move || {
            freed.fetch_add(1, Ordering::SeqCst);
        })));
        unsafe {
            buffer_free_trampoline(id_to_opaque(id), std::ptr::null_mut());
            buffer_free_trampoline(id_to_opaque(id), std::ptr::null_mut());
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!lookup(id));
    }
}
