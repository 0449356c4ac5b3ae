//! Build script for lavkit
//!
//! The FFmpeg libraries themselves are loaded at runtime; nothing here links
//! against them. The only build-time product is the companion shim
//! (`shim/lavshim.c`), compiled via `cc` when FFmpeg headers can be found.
//! The shim contains no FFmpeg link references (it receives the function
//! pointers it needs from the host at install time), so header availability
//! is the only requirement. When headers are missing the shim is skipped and
//! the crate compiles without it; shim-dependent operations then report
//! themselves unavailable at runtime.

use std::env;
use std::path::PathBuf;

fn main() {
    println!("cargo:rustc-check-cfg=cfg(lavshim)");
    println!("cargo:rerun-if-changed=shim/lavshim.c");
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=FFMPEG_DIR");
    println!("cargo:rerun-if-env-changed=LAVKIT_NO_SHIM");

    if env::var_os("LAVKIT_NO_SHIM").is_some() {
        println!("cargo:warning=LAVKIT_NO_SHIM set; building without the native shim");
        return;
    }

    let Some(include_dir) = find_ffmpeg_headers() else {
        println!(
            "cargo:warning=FFmpeg headers not found; building without the native shim \
             (set FFMPEG_DIR to enable it)"
        );
        return;
    };

    let mut build = cc::Build::new();
    build
        .file("shim/lavshim.c")
        .include(&include_dir)
        .warnings(true);

    #[cfg(target_os = "macos")]
    {
        build.flag("-Wno-deprecated-declarations");
    }

    build.compile("lavshim");
    println!("cargo:rustc-cfg=lavshim");
}

/// Locate the FFmpeg include directory: FFMPEG_DIR override, then pkg-config,
/// then documented system prefixes.
fn find_ffmpeg_headers() -> Option<PathBuf> {
    if let Ok(dir) = env::var("FFMPEG_DIR") {
        let include = PathBuf::from(dir).join("include");
        if include.join("libavutil/avutil.h").exists() {
            return Some(include);
        }
    }

    if let Ok(lib) = pkg_config::Config::new()
        .cargo_metadata(false)
        .atleast_version("56.0")
        .probe("libavutil")
    {
        for p in &lib.include_paths {
            if p.join("libavutil/avutil.h").exists() {
                return Some(p.clone());
            }
        }
    }

    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    let prefixes: &[&str] = match target_os.as_str() {
        "macos" => &["/opt/homebrew", "/usr/local", "/opt/local"],
        "linux" => &["/usr", "/usr/local", "/opt/ffmpeg"],
        "windows" => &["C:\\ffmpeg", "C:\\Program Files\\ffmpeg"],
        _ => &[],
    };

    for prefix in prefixes {
        let include = PathBuf::from(prefix).join("include");
        if include.join("libavutil/avutil.h").exists() {
            return Some(include);
        }
    }

    None
}
