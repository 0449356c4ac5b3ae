//! Raw accessor over `AVStream`
//!
//! Streams are owned by their format context; this is a borrowed view using
//! the versioned offset tables.

use std::ffi::CStr;

use crate::ffi::offsets;
use crate::ffi::types::{AVCodecParameters, AVDictionary, AVDictionaryEntry, AVStream};
use crate::init::Ffmpeg;
use crate::rational::Rational;

use super::context::Parameters;

/// Borrowed view of a stream inside an open format context. Valid only while
/// the owning context is.
#[derive(Clone, Copy)]
pub(crate) struct StreamRef {
    ptr: *mut AVStream,
    av: &'static Ffmpeg,
}

impl StreamRef {
    pub(crate) unsafe fn new(ptr: *mut AVStream, av: &'static Ffmpeg) -> Self {
        Self { ptr, av }
    }

    fn o(&self) -> &offsets::StreamOffsets {
        &self.av.offsets.stream
    }

    pub fn index(&self) -> i32 {
        unsafe { offsets::read(self.ptr.cast(), self.o().index) }
    }

    pub fn id(&self) -> i32 {
        unsafe { offsets::read(self.ptr.cast(), self.o().id) }
    }

    pub fn time_base(&self) -> Rational {
        unsafe { offsets::read(self.ptr.cast(), self.o().time_base) }
    }

    pub fn set_time_base(&self, tb: Rational) {
        unsafe { offsets::write(self.ptr.cast(), self.o().time_base, tb) }
    }

    pub fn start_time(&self) -> i64 {
        unsafe { offsets::read(self.ptr.cast(), self.o().start_time) }
    }

    pub fn duration(&self) -> i64 {
        unsafe { offsets::read(self.ptr.cast(), self.o().duration) }
    }

    pub fn nb_frames(&self) -> i64 {
        unsafe { offsets::read(self.ptr.cast(), self.o().nb_frames) }
    }

    pub fn avg_frame_rate(&self) -> Rational {
        unsafe { offsets::read(self.ptr.cast(), self.o().avg_frame_rate) }
    }

    pub fn r_frame_rate(&self) -> Rational {
        unsafe { offsets::read(self.ptr.cast(), self.o().r_frame_rate) }
    }

    /// The stream's codec parameters, borrowed.
    pub fn codecpar(&self) -> Parameters {
        let par: *mut AVCodecParameters =
            unsafe { offsets::read(self.ptr.cast(), self.o().codecpar) };
        unsafe { Parameters::borrowed(par, self.av) }
    }

    /// Stream metadata copied into host storage.
    pub fn metadata(&self) -> Vec<(String, String)> {
        let dict: *mut AVDictionary = unsafe { offsets::read(self.ptr.cast(), self.o().metadata) };
        read_dictionary(self.av, dict)
    }
}

/// Copy a native dictionary's entries without taking ownership.
pub(crate) fn read_dictionary(av: &'static Ffmpeg, dict: *mut AVDictionary) -> Vec<(String, String)> {
    let mut out = Vec::new();
    if dict.is_null() {
        return out;
    }
    let empty = std::ffi::CString::new("").unwrap();
    let mut prev: *const AVDictionaryEntry = std::ptr::null();
    loop {
        let entry = unsafe {
            (av.avutil.av_dict_get)(
                dict,
                empty.as_ptr(),
                prev,
                crate::ffi::types::dict_flag::IGNORE_SUFFIX,
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
