//! One-shot library initialization
//!
//! [`Ffmpeg`] bundles the seven bound symbol tables, the resolved offset
//! tables, and the loaded version report. It is created once behind a
//! process-wide cell; every component holds the same `&'static` handle, and
//! after initialization everything in it is read-only.

use std::path::PathBuf;

use once_cell::sync::OnceCell;

use crate::error::{Error, Result};
use crate::ffi::avcodec::AvCodec;
use crate::ffi::avdevice::AvDevice;
use crate::ffi::avfilter::AvFilter;
use crate::ffi::avformat::AvFormat;
use crate::ffi::avutil::AvUtil;
use crate::ffi::loader::{check_version, LibraryName, Loader, SharedLibrary, Version};
use crate::ffi::offsets::Offsets;
use crate::ffi::shim;
use crate::ffi::swresample::SwResample;
use crate::ffi::swscale::SwScale;

static STATE: OnceCell<Ffmpeg> = OnceCell::new();

/// Versions of the loaded libraries.
#[derive(Clone, Copy, Debug)]
pub struct LoadedVersions {
    pub avutil: Version,
    pub avcodec: Version,
    pub avformat: Version,
    pub swscale: Version,
    pub swresample: Version,
    pub avfilter: Version,
    pub avdevice: Version,
}

impl std::fmt::Display for LoadedVersions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "avutil={} avcodec={} avformat={} swscale={} swresample={} avfilter={} avdevice={}",
            self.avutil,
            self.avcodec,
            self.avformat,
            self.swscale,
            self.swresample,
            self.avfilter,
            self.avdevice
        )
    }
}

/// Configuration for the one-shot initializer.
#[derive(Default)]
pub struct FfmpegBuilder {
    library_dir: Option<PathBuf>,
    log_level: Option<i32>,
    pinned_limit: Option<usize>,
    forward_logs: bool,
}

impl FfmpegBuilder {
    pub fn new() -> Self {
        Self {
            forward_logs: true,
            ..Self::default()
        }
    }

    /// Directory searched before the platform path variable and the system
    /// locations.
    pub fn library_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.library_dir = Some(dir.into());
        self
    }

    /// Native log threshold (`ffi::types::log_level`).
    pub fn log_level(mut self, level: i32) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Upper bound on bytes pinned by `Frame::wrap_buffer`.
    pub fn pinned_memory_limit(mut self, bytes: usize) -> Self {
        self.pinned_limit = Some(bytes);
        self
    }

    /// Whether FFmpeg's own log lines are routed into `tracing` (requires the
    /// shim; silently kept on stderr without it).
    pub fn forward_logs(mut self, forward: bool) -> Self {
        self.forward_logs = forward;
        self
    }

    /// Load, bind and configure. Returns the existing state if another
    /// thread got there first.
    pub fn init(self) -> Result<&'static Ffmpeg> {
        STATE.get_or_try_init(|| Ffmpeg::load(self))
    }
}

/// The loaded FFmpeg library set.
pub struct Ffmpeg {
    pub avutil: AvUtil,
    pub avcodec: AvCodec,
    pub avformat: AvFormat,
    pub swscale: SwScale,
    pub swresample: SwResample,
    pub avfilter: AvFilter,
    pub avdevice: AvDevice,
    /// Field offsets resolved for the running versions.
    pub offsets: Offsets,
    pub versions: LoadedVersions,
    pinned_limit: Option<usize>,
    devices_registered: parking_lot::Once,
    // Keeps the dlopen handles alive for the life of the process.
    _libraries: Vec<SharedLibrary>,
}

// SAFETY: every field is immutable after construction; the raw addresses in
// the tables are code pointers into libraries that are never unloaded.
unsafe impl Send for Ffmpeg {}
unsafe impl Sync for Ffmpeg {}

impl Ffmpeg {
    /// The shared handle, loading with default settings on first use.
    pub fn get() -> Result<&'static Ffmpeg> {
        STATE.get_or_try_init(|| Ffmpeg::load(FfmpegBuilder::new()))
    }

    /// The shared handle if initialization already happened.
    pub fn try_get() -> Option<&'static Ffmpeg> {
        STATE.get()
    }

    /// Configure and initialize explicitly.
    pub fn builder() -> FfmpegBuilder {
        FfmpegBuilder::new()
    }

    fn load(builder: FfmpegBuilder) -> Result<Self> {
        let mut loader = Loader::new(builder.library_dir.as_deref());

        // A missing library means the whole bundle refuses to initialize.
        let mut open = |name| {
            loader.open(name).map_err(|e| match e {
                Error::LibraryNotFound(lib) => Error::NotLoaded(lib),
                other => other,
            })
        };
        let libutil = open(LibraryName::AvUtil)?;
        let libswr = open(LibraryName::SwResample)?;
        let libcodec = open(LibraryName::AvCodec)?;
        let libformat = open(LibraryName::AvFormat)?;
        let libsws = open(LibraryName::SwScale)?;
        let libfilter = open(LibraryName::AvFilter)?;
        let libdevice = open(LibraryName::AvDevice)?;

        let avutil = AvUtil::bind(&libutil)?;
        let swresample = SwResample::bind(&libswr)?;
        let avcodec = AvCodec::bind(&libcodec)?;
        let avformat = AvFormat::bind(&libformat)?;
        let swscale = SwScale::bind(&libsws)?;
        let avfilter = AvFilter::bind(&libfilter)?;
        let avdevice = AvDevice::bind(&libdevice)?;

        let versions = LoadedVersions {
            avutil: Version(unsafe { (avutil.avutil_version)() }),
            avcodec: Version(unsafe { (avcodec.avcodec_version)() }),
            avformat: Version(unsafe { (avformat.avformat_version)() }),
            swscale: Version(unsafe { (swscale.swscale_version)() }),
            swresample: Version(unsafe { (swresample.swresample_version)() }),
            avfilter: Version(unsafe { (avfilter.avfilter_version)() }),
            avdevice: Version(unsafe { (avdevice.avdevice_version)() }),
        };
        check_version(LibraryName::AvUtil, versions.avutil)?;
        check_version(LibraryName::AvCodec, versions.avcodec)?;
        check_version(LibraryName::AvFormat, versions.avformat)?;
        check_version(LibraryName::SwScale, versions.swscale)?;
        check_version(LibraryName::SwResample, versions.swresample)?;
        check_version(LibraryName::AvFilter, versions.avfilter)?;
        check_version(LibraryName::AvDevice, versions.avdevice)?;

        let offsets = Self::resolve_offsets(&versions);

        shim::install_rational(&avutil);
        if builder.forward_logs {
            shim::install_log(&avutil);
        }
        if let Some(level) = builder.log_level {
            unsafe { (avutil.av_log_set_level)(level) };
        }

        // Present through FFmpeg 4 only; later majors register implicitly.
        if let Some(register_all) = avformat.av_register_all {
            unsafe { register_all() };
        }
        let ret = unsafe { (avformat.avformat_network_init)() };
        if ret < 0 {
            return Err(Error::from_av("avformat_network_init", ret));
        }

        tracing::info!(%versions, shim = shim::available(), "ffmpeg loaded");

        Ok(Self {
            avutil,
            avcodec,
            avformat,
            swscale,
            swresample,
            avfilter,
            avdevice,
            offsets,
            versions,
            pinned_limit: builder.pinned_limit,
            devices_registered: parking_lot::Once::new(),
            _libraries: vec![
                libutil, libswr, libcodec, libformat, libsws, libfilter, libdevice,
            ],
        })
    }

    /// Shim offsets are authoritative when the shim was compiled against the
    /// majors actually running; otherwise fall back to the built-in tables.
    fn resolve_offsets(versions: &LoadedVersions) -> Offsets {
        if let Some((u, c, f)) = shim::compiled_majors() {
            if u == versions.avutil.major()
                && c == versions.avcodec.major()
                && f == versions.avformat.major()
            {
                if let Some(offsets) = shim::discover_offsets() {
                    return offsets;
                }
            } else {
                tracing::warn!(
                    shim_avutil = u,
                    running_avutil = versions.avutil.major(),
                    "shim compiled against different ffmpeg majors; using built-in offsets"
                );
            }
        }
        Offsets::resolve(
            versions.avutil.major(),
            versions.avcodec.major(),
            versions.avformat.major(),
        )
    }

    /// Register libavdevice's capture demuxers, once per process.
    pub fn register_devices(&self) {
        self.devices_registered
            .call_once(|| unsafe { (self.avdevice.avdevice_register_all)() });
    }

    /// Optional cap for `Frame::wrap_buffer` pinned bytes.
    pub fn pinned_limit(&self) -> Option<usize> {
        self.pinned_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Loads when the libraries are installed; must fail with a typed error,
    /// never panic, when they are not.
    #[test]
    fn test_get_is_typed() {
        match Ffmpeg::get() {
            Ok(av) => {
                assert!(av.versions.avutil.major() >= 56);
                // Second call returns the same instance.
                let again = Ffmpeg::get().unwrap();
                assert!(std::ptr::eq(av, again));
            }
            Err(e) => {
                assert!(matches!(
                    e,
                    Error::NotLoaded(_)
                        | Error::SymbolNotFound { .. }
                        | Error::IncompatibleVersion { .. }
                ));
            }
        }
    }
}
