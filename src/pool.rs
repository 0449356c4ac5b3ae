//! Frame pool
//!
//! A LIFO stack of idle owned frames so hot decode/scale loops can reuse
//! shells instead of churning the allocator. `get` pops or allocates, `put`
//! unrefs and pushes back. Frames still out when the pool closes are simply
//! released by their current owners.

use parking_lot::Mutex;

use crate::codec::frame::Frame;
use crate::error::{Error, Result};

struct PoolState {
    idle: Vec<Frame>,
    in_use: usize,
    closed: bool,
}

/// Bounded or unbounded pool of reusable frames.
pub struct FramePool {
    state: Mutex<PoolState>,
    max_in_use: Option<usize>,
}

impl FramePool {
    /// Unbounded pool.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                in_use: 0,
                closed: false,
            }),
            max_in_use: None,
        }
    }

    /// Pool refusing to hand out more than `max_in_use` frames at a time.
    pub fn bounded(max_in_use: usize) -> Self {
        Self {
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                in_use: 0,
                closed: false,
            }),
            max_in_use: Some(max_in_use),
        }
    }

    /// Pop an idle frame or allocate a fresh one.
    pub fn get(&self) -> Result<Frame> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(Error::Closed);
        }
        if let Some(limit) = self.max_in_use {
            if state.in_use >= limit {
                return Err(Error::Again);
            }
        }
        let frame = match state.idle.pop() {
            Some(frame) => frame,
            None => Frame::alloc()?,
        };
        state.in_use += 1;
        Ok(frame)
    }

    /// Return a frame: its data is unreferenced and the shell goes back on
    /// the stack (or is freed if the pool has closed). Borrowed frames are
    /// rejected.
    pub fn put(&self, mut frame: Frame) -> Result<()> {
        if !frame.is_owned() {
            return Err(Error::InvalidArgument("pool cannot take a borrowed frame"));
        }
        frame.unref();
        let mut state = self.state.lock();
        state.in_use = state.in_use.saturating_sub(1);
        if state.closed {
            drop(state);
            frame.free()?;
            return Ok(());
        }
        state.idle.push(frame);
        Ok(())
    }

    /// Frames currently handed out.
    pub fn in_use(&self) -> usize {
        self.state.lock().in_use
    }

    /// Frames waiting on the stack.
    pub fn idle(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Free all idle frames and refuse further `get`s. Frames still out are
    /// released by their owners as usual.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        for mut frame in state.idle.drain(..) {
            let _ = frame.free();
        }
    }
}

impl Default for FramePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::init::Ffmpeg;

    #[test]
    fn test_get_put_counters() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let pool = FramePool::new();
        let before = pool.in_use();
        let frame = pool.get().unwrap();
        assert_eq!(pool.in_use(), before + 1);
        pool.put(frame).unwrap();
        assert_eq!(pool.in_use(), before);
        assert_eq!(pool.idle(), 1);
    }

    #[test]
    fn test_reuse_is_lifo() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let pool = FramePool::new();
        let a = pool.get().unwrap();
        let a_ptr = a.as_ptr();
        pool.put(a).unwrap();
        let b = pool.get().unwrap();
        assert_eq!(b.as_ptr(), a_ptr);
        pool.put(b).unwrap();
    }

    #[test]
    fn test_bounded_pool_backpressure() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let pool = FramePool::bounded(1);
        let first = pool.get().unwrap();
        assert!(pool.get().unwrap_err().is_again());
        pool.put(first).unwrap();
        assert!(pool.get().is_ok());
    }

    #[test]
    fn test_put_rejects_borrowed() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let pool = FramePool::new();
        let owner = Frame::alloc().unwrap();
        let borrowed = owner.borrowed_view();
        assert!(matches!(
            pool.put(borrowed),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_close_frees_idle_and_rejects_get() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let pool = FramePool::new();
        let frame = pool.get().unwrap();
        pool.put(frame).unwrap();
        assert_eq!(pool.idle(), 1);
        pool.close();
        assert_eq!(pool.idle(), 0);
        assert!(matches!(pool.get(), Err(Error::Closed)));
        // A frame returned after close is freed, not pooled.
        let late = Frame::alloc().unwrap();
        pool.put(late).unwrap();
        assert_eq!(pool.idle(), 0);
    }
}
