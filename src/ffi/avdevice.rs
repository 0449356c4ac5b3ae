//! libavdevice entry points
//!
//! Capture device registration. Source enumeration goes through the shim,
//! which receives the raw addresses captured here.

use std::ffi::c_void;
use std::os::raw::c_uint;

use super::loader::SharedLibrary;
use crate::error::Result;

/// Typed bindings into libavdevice.
pub struct AvDevice {
    pub avdevice_version: unsafe extern "C" fn() -> c_uint,
    pub avdevice_register_all: unsafe extern "C" fn(),

    /// Raw addresses of the device-list API, for the shim.
    pub avdevice_list_input_sources_addr: Option<*mut c_void>,
    pub avdevice_free_list_devices_addr: Option<*mut c_void>,
}

impl AvDevice {
    pub(crate) fn bind(lib: &SharedLibrary) -> Result<Self> {
        Ok(Self {
            avdevice_version: lib.sym("avdevice_version")?,
            avdevice_register_all: lib.sym("avdevice_register_all")?,
            avdevice_list_input_sources_addr: lib.opt_sym("avdevice_list_input_sources"),
            avdevice_free_list_devices_addr: lib.opt_sym("avdevice_free_list_devices"),
        })
    }
}
