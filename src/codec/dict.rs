//! Safe wrapper around FFmpeg AVDictionary
//!
//! An ordered multimap of strings with case-insensitive lookup by default.
//! FFmpeg entry points that take `AVDictionary **` may consume the map and
//! nil the pointer; [`Dictionary::as_inout`] hands over the pointer under
//! that contract and the wrapper treats whatever remains (options the callee
//! did not recognize) as its new contents.

use std::ffi::{CStr, CString};
use std::os::raw::c_int;

use crate::error::{check, Error, Result};
use crate::ffi::types::{dict_flag, AVDictionary, AVDictionaryEntry};
use crate::init::Ffmpeg;

/// Owned AVDictionary.
pub struct Dictionary {
    ptr: *mut AVDictionary,
    av: &'static Ffmpeg,
}

unsafe impl Send for Dictionary {}

impl Dictionary {
    /// An empty dictionary (allocates lazily on first set, as FFmpeg does).
    pub fn new() -> Result<Self> {
        Ok(Self {
            ptr: std::ptr::null_mut(),
            av: Ffmpeg::get()?,
        })
    }

    /// Build from string pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Result<Self> {
        let mut dict = Self::new()?;
        for (key, value) in pairs {
            dict.set(key, value)?;
        }
        Ok(dict)
    }

    /// Set or replace an entry. Keys and values must not contain NULs.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_with_flags(key, value, 0)
    }

    pub fn set_with_flags(&mut self, key: &str, value: &str, flags: c_int) -> Result<()> {
        let key = CString::new(key).map_err(|_| Error::InvalidArgument("NUL in key"))?;
        let value = CString::new(value).map_err(|_| Error::InvalidArgument("NUL in value"))?;
        let ret = unsafe {
            (self.av.avutil.av_dict_set)(&mut self.ptr, key.as_ptr(), value.as_ptr(), flags)
        };
        check("av_dict_set", ret)?;
        Ok(())
    }

    /// Case-insensitive lookup, copied into host storage.
    pub fn get(&self, key: &str) -> Option<String> {
        let key = CString::new(key).ok()?;
        let entry = unsafe {
            (self.av.avutil.av_dict_get)(self.ptr, key.as_ptr(), std::ptr::null(), 0)
        };
        if entry.is_null() {
            return None;
        }
        Some(unsafe { CStr::from_ptr((*entry).value) }.to_string_lossy().into_owned())
    }

    pub fn len(&self) -> usize {
        if self.ptr.is_null() {
            return 0;
        }
        unsafe { (self.av.avutil.av_dict_count)(self.ptr) as usize }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries, in insertion order.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        let empty = CString::new("").unwrap();
        let mut prev: *const AVDictionaryEntry = std::ptr::null();
        loop {
            let entry = unsafe {
                (self.av.avutil.av_dict_get)(
                    self.ptr,
                    empty.as_ptr(),
                    prev,
                    dict_flag::IGNORE_SUFFIX,
                )
            };
            if entry.is_null() {
                break;
            }
            unsafe {
                out.push((
                    CStr::from_ptr((*entry).key).to_string_lossy().into_owned(),
                    CStr::from_ptr((*entry).value).to_string_lossy().into_owned(),
                ));
            }
            prev = entry;
        }
        out
    }

    /// Copy into a new dictionary.
    pub fn try_clone(&self) -> Result<Dictionary> {
        let mut dst = Dictionary::new()?;
        let ret = unsafe { (self.av.avutil.av_dict_copy)(&mut dst.ptr, self.ptr, 0) };
        check("av_dict_copy", ret)?;
        Ok(dst)
    }

    /// Hand the pointer to an FFmpeg entry point that consumes dictionaries.
    /// After the call the wrapper owns only what the callee left behind.
    pub(crate) fn as_inout(&mut self) -> *mut *mut AVDictionary {
        &mut self.ptr
    }
}

impl Drop for Dictionary {
    fn drop(&mut self) {
        if !self.ptr.is_null() {
            unsafe { (self.av.avutil.av_dict_free)(&mut self.ptr) };
        }
    }
}

impl std::fmt::Debug for Dictionary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_case_insensitive() {
        let Ok(mut dict) = Dictionary::new() else {
            return;
        };
        dict.set("Preset", "fast").unwrap();
        assert_eq!(dict.get("preset").as_deref(), Some("fast"));
        assert_eq!(dict.get("PRESET").as_deref(), Some("fast"));
        assert_eq!(dict.len(), 1);
    }

    #[test]
    fn test_iteration_order() {
        let Ok(dict) = Dictionary::from_pairs([("a", "1"), ("b", "2"), ("c", "3")]) else {
            return;
        };
        let entries = dict.entries();
        assert_eq!(
            entries,
            vec![
                ("a".into(), "1".into()),
                ("b".into(), "2".into()),
                ("c".into(), "3".into())
            ]
        );
    }

    #[test]
    fn test_embedded_nul_rejected() {
        let Ok(mut dict) = Dictionary::new() else {
            return;
        };
        assert!(matches!(
            dict.set("bad\0key", "v"),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_clone_is_independent() {
        let Ok(mut dict) = Dictionary::from_pairs([("k", "v")]) else {
            return;
        };
        let copy = dict.try_clone().unwrap();
        dict.set("k", "other").unwrap();
        assert_eq!(copy.get("k").as_deref(), Some("v"));
    }
}
