//! Shared-library discovery and symbol binding
//!
//! Locates the FFmpeg libraries at runtime, opens them leaves-first with
//! resolve-now and global symbol visibility, and hands out typed function
//! pointers by name. Nothing in this crate links against FFmpeg; this module
//! is the only way native entry points come into existence.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// The seven FFmpeg libraries, in mandatory load order (leaves first so each
/// library can resolve references into the ones before it).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryName {
    AvUtil,
    SwResample,
    AvCodec,
    AvFormat,
    SwScale,
    AvFilter,
    AvDevice,
}

pub const LOAD_ORDER: [LibraryName; 7] = [
    LibraryName::AvUtil,
    LibraryName::SwResample,
    LibraryName::AvCodec,
    LibraryName::AvFormat,
    LibraryName::SwScale,
    LibraryName::AvFilter,
    LibraryName::AvDevice,
];

impl LibraryName {
    pub fn base_name(self) -> &'static str {
        match self {
            Self::AvUtil => "avutil",
            Self::SwResample => "swresample",
            Self::AvCodec => "avcodec",
            Self::AvFormat => "avformat",
            Self::SwScale => "swscale",
            Self::AvFilter => "avfilter",
            Self::AvDevice => "avdevice",
        }
    }

    /// Supported major versions, newest first (the FFmpeg 4..=7 window).
    pub fn majors(self) -> &'static [u32] {
        match self {
            Self::AvUtil => &[59, 58, 57, 56],
            Self::SwResample => &[5, 4, 3],
            Self::AvCodec => &[61, 60, 59, 58],
            Self::AvFormat => &[61, 60, 59, 58],
            Self::SwScale => &[8, 7, 6, 5],
            Self::AvFilter => &[10, 9, 8, 7],
            Self::AvDevice => &[61, 60, 59, 58],
        }
    }

    fn position(self) -> usize {
        LOAD_ORDER.iter().position(|l| *l == self).unwrap()
    }

    /// Platform file names to try, in decreasing major-version order, ending
    /// with the unversioned name.
    pub fn candidate_file_names(self) -> Vec<String> {
        let base = self.base_name();
        let mut names = Vec::new();
        for major in self.majors() {
            names.push(platform_file_name(base, Some(*major)));
        }
        names.push(platform_file_name(base, None));
        names
    }
}

fn platform_file_name(base: &str, major: Option<u32>) -> String {
    #[cfg(target_os = "windows")]
    {
        match major {
            Some(m) => format!("{base}-{m}.dll"),
            None => format!("{base}.dll"),
        }
    }
    #[cfg(target_os = "macos")]
    {
        match major {
            Some(m) => format!("lib{base}.{m}.dylib"),
            None => format!("lib{base}.dylib"),
        }
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        match major {
            Some(m) => format!("lib{base}.so.{m}"),
            None => format!("lib{base}.so"),
        }
    }
}

/// An opened shared library plus typed symbol lookup.
pub struct SharedLibrary {
    name: &'static str,
    path: PathBuf,
    lib: libloading::Library,
}

impl SharedLibrary {
    /// Open with resolve-all-now and global visibility.
    fn open(name: &'static str, path: &Path) -> Result<Self> {
        #[cfg(unix)]
        let lib = {
            use libloading::os::unix::{Library, RTLD_GLOBAL, RTLD_NOW};
            unsafe { Library::open(Some(path), RTLD_NOW | RTLD_GLOBAL) }
                .map(libloading::Library::from)
        };
        #[cfg(not(unix))]
        let lib = unsafe { libloading::Library::new(path) };

        let lib = lib.map_err(|e| {
            tracing::debug!(library = name, path = %path.display(), error = %e, "open failed");
            Error::LibraryNotFound(format!("{name} ({})", path.display()))
        })?;
        Ok(Self {
            name,
            path: path.to_path_buf(),
            lib,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a mandatory symbol as a typed value. The fn-pointer copy stays
    /// valid for as long as the library object lives, which for this crate is
    /// the whole process.
    pub fn sym<T: Copy>(&self, symbol: &'static str) -> Result<T> {
        self.opt_sym(symbol).ok_or(Error::SymbolNotFound {
            library: self.name,
            symbol,
        })
    }

    /// Look up a symbol that only exists in part of the supported version
    /// window.
    pub fn opt_sym<T: Copy>(&self, symbol: &'static str) -> Option<T> {
        let mut bytes = Vec::with_capacity(symbol.len() + 1);
        bytes.extend_from_slice(symbol.as_bytes());
        bytes.push(0);
        unsafe {
            self.lib
                .get::<T>(&bytes)
                .ok()
                .map(|s| *s)
        }
    }
}

/// Ordered opener over a fixed search path.
pub struct Loader {
    search_dirs: Vec<PathBuf>,
    next: usize,
}

impl Loader {
    /// Build the search path: caller override first, then the platform path
    /// variable, then the documented system locations.
    pub fn new(override_dir: Option<&Path>) -> Self {
        let mut search_dirs = Vec::new();
        if let Some(dir) = override_dir {
            search_dirs.push(dir.to_path_buf());
        }
        if let Some(paths) = std::env::var_os(path_env_var()) {
            search_dirs.extend(std::env::split_paths(&paths).filter(|p| !p.as_os_str().is_empty()));
        }
        search_dirs.extend(system_dirs());
        Self {
            search_dirs,
            next: 0,
        }
    }

    /// Open the next library in the leaves-first order. Requesting any other
    /// library is a programmer error.
    pub fn open(&mut self, name: LibraryName) -> Result<SharedLibrary> {
        if name.position() != self.next {
            return Err(Error::LoadOrderViolation);
        }

        let candidates = name.candidate_file_names();
        for dir in &self.search_dirs {
            for file in &candidates {
                let path = dir.join(file);
                if !path.exists() {
                    continue;
                }
                if let Ok(lib) = SharedLibrary::open(name.base_name(), &path) {
                    tracing::debug!(library = name.base_name(), path = %path.display(), "loaded");
                    self.next += 1;
                    return Ok(lib);
                }
            }
        }

        // Fall back to the system loader's own search (bare file name).
        for file in &candidates {
            if let Ok(lib) = SharedLibrary::open(name.base_name(), Path::new(file)) {
                tracing::debug!(library = name.base_name(), file, "loaded from default path");
                self.next += 1;
                return Ok(lib);
            }
        }

        Err(Error::LibraryNotFound(name.base_name().to_string()))
    }
}

fn path_env_var() -> &'static str {
    #[cfg(target_os = "windows")]
    {
        "PATH"
    }
    #[cfg(target_os = "macos")]
    {
        "DYLD_LIBRARY_PATH"
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        "LD_LIBRARY_PATH"
    }
}

fn system_dirs() -> Vec<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        vec![]
    }
    #[cfg(target_os = "macos")]
    {
        ["/opt/homebrew/lib", "/usr/local/lib", "/opt/local/lib"]
            .iter()
            .map(PathBuf::from)
            .collect()
    }
    #[cfg(not(any(target_os = "windows", target_os = "macos")))]
    {
        let mut dirs = Vec::new();
        #[cfg(target_arch = "x86_64")]
        dirs.push(PathBuf::from("/usr/lib/x86_64-linux-gnu"));
        #[cfg(target_arch = "aarch64")]
        dirs.push(PathBuf::from("/usr/lib/aarch64-linux-gnu"));
        dirs.push(PathBuf::from("/usr/lib64"));
        dirs.push(PathBuf::from("/usr/lib"));
        dirs.push(PathBuf::from("/usr/local/lib"));
        dirs
    }
}

/// Decode an FFmpeg packed version int (`major << 16 | minor << 8 | micro`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Version(pub u32);

impl Version {
    pub fn major(self) -> i32 {
        ((self.0 >> 16) & 0xFF) as i32
    }

    pub fn minor(self) -> i32 {
        ((self.0 >> 8) & 0xFF) as i32
    }

    pub fn micro(self) -> i32 {
        (self.0 & 0xFF) as i32
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.micro())
    }
}

/// Verify a loaded library's runtime major against the supported window.
pub fn check_version(name: LibraryName, version: Version) -> Result<()> {
    let majors = name.majors();
    let max = *majors.first().unwrap() as i32;
    let min = *majors.last().unwrap() as i32;
    let found = version.major();
    if found < min || found > max {
        return Err(Error::IncompatibleVersion {
            library: name.base_name(),
            found,
            min,
            max,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidate_order_newest_first() {
        let names = LibraryName::AvCodec.candidate_file_names();
        assert!(names[0].contains("61"));
        assert!(names[1].contains("60"));
        // Unversioned fallback last
        assert!(!names.last().unwrap().chars().any(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_load_order_enforced() {
        let mut loader = Loader::new(None);
        assert!(matches!(
            loader.open(LibraryName::AvFormat),
            Err(Error::LoadOrderViolation)
        ));
    }

    #[test]
    fn test_version_decode() {
        let v = Version((58 << 16) | (29 << 8) | 100);
        assert_eq!(v.major(), 58);
        assert_eq!(v.minor(), 29);
        assert_eq!(v.micro(), 100);
        assert_eq!(v.to_string(), "58.29.100");
    }

    #[test]
    fn test_version_window() {
        assert!(check_version(LibraryName::AvUtil, Version(58 << 16)).is_ok());
        assert!(matches!(
            check_version(LibraryName::AvUtil, Version(55 << 16)),
            Err(Error::IncompatibleVersion { found: 55, .. })
        ));
        assert!(check_version(LibraryName::AvUtil, Version(60 << 16)).is_err());
    }
}
