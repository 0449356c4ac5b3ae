//! Hardware acceleration device contexts
//!
//! A device context is a refcounted buffer handle; installing it on a codec
//! context (through the shim) makes the decoder produce GPU-resident frames,
//! which must be transferred to software frames before CPU access.

use std::ffi::CString;

use crate::error::{check, Error, Result};
use crate::ffi::types::{AVBufferRef, HwDeviceType};
use crate::init::Ffmpeg;

/// An opened hardware acceleration device.
pub struct HwDevice {
    device_ref: *mut AVBufferRef,
    kind: HwDeviceType,
    av: &'static Ffmpeg,
}

unsafe impl Send for HwDevice {}

impl HwDevice {
    /// Open the default device of a type.
    pub fn create(kind: HwDeviceType) -> Result<Self> {
        Self::create_with_device(kind, None)
    }

    /// Open a specific device node (e.g. `/dev/dri/renderD128`).
    pub fn create_with_device(kind: HwDeviceType, device: Option<&str>) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let c_device = device
            .map(CString::new)
            .transpose()
            .map_err(|_| Error::InvalidArgument("NUL in device name"))?;
        let mut device_ref = std::ptr::null_mut();
        let ret = unsafe {
            (av.avutil.av_hwdevice_ctx_create)(
                &mut device_ref,
                kind.as_raw(),
                c_device.as_ref().map_or(std::ptr::null(), |d| d.as_ptr()),
                std::ptr::null_mut(),
                0,
            )
        };
        check("av_hwdevice_ctx_create", ret)?;
        Ok(Self {
            device_ref,
            kind,
            av,
        })
    }

    /// Device types usable in this build, by probing FFmpeg's iterator.
    pub fn available_types() -> Result<Vec<HwDeviceType>> {
        let av = Ffmpeg::get()?;
        let mut types = Vec::new();
        let mut prev = HwDeviceType::None.as_raw();
        loop {
            let next = unsafe { (av.avutil.av_hwdevice_iterate_types)(prev) };
            if next == HwDeviceType::None.as_raw() {
                break;
            }
            types.push(HwDeviceType::from_raw(next));
            prev = next;
        }
        Ok(types)
    }

    pub fn kind(&self) -> HwDeviceType {
        self.kind
    }

    pub(crate) fn as_ptr(&self) -> *mut AVBufferRef {
        self.device_ref
    }
}

impl Drop for HwDevice {
    fn drop(&mut self) {
        if !self.device_ref.is_null() {
            unsafe { (self.av.avutil.av_buffer_unref)(&mut self.device_ref) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_probe() {
        if Ffmpeg::get().is_err() {
            return;
        }
        // The list may be empty; it must simply not error.
        let types = HwDevice::available_types().unwrap();
        for t in types {
            assert_ne!(t, HwDeviceType::None);
        }
    }
}
