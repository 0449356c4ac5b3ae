//! Bindings to the companion native shim
//!
//! The shim (`shim/lavshim.c`) is compiled into the crate by `build.rs` when
//! FFmpeg headers are available; `cfg(lavshim)` gates everything here. It
//! carries no FFmpeg link references of its own: at install time the host
//! hands it the raw addresses of the entry points it needs, all captured by
//! the symbol binder.
//!
//! Every public function degrades gracefully when the shim was not built:
//! probes return `false`/`None` and operations surface
//! [`Error::ShimUnavailable`].

#![allow(unused_variables)]

use std::ffi::c_void;
use std::os::raw::{c_char, c_int};

use crate::error::{Error, Result};
use crate::rational::Rational;

use super::avutil::AvUtil;
use super::types::{AVBufferRef, AVCodecContext, AVFormatContext};

#[cfg(lavshim)]
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(lavshim)]
static RATIONAL_INSTALLED: AtomicBool = AtomicBool::new(false);

// ============================================================================
// Native declarations
// ============================================================================

#[cfg(lavshim)]
mod native {
    use std::ffi::c_void;
    use std::os::raw::{c_char, c_int};

    /// Log line sink invoked by the shim with a pre-formatted,
    /// newline-stripped message.
    pub type LogSinkFn = unsafe extern "C" fn(avcl: *mut c_void, level: c_int, line: *const c_char);

    #[repr(C)]
    pub struct RawFrameOffsets {
        pub pts: i32,
        pub pkt_dts: i32,
        pub time_base: i32,
        pub pict_type: i32,
        pub sample_aspect_ratio: i32,
        pub sample_rate: i32,
        pub ch_order: i32,
        pub ch_nb: i32,
        pub ch_mask: i32,
        pub buf0: i32,
        pub flags: i32,
        pub color_range: i32,
        pub color_primaries: i32,
        pub color_trc: i32,
        pub colorspace: i32,
        pub best_effort_timestamp: i32,
        pub duration: i32,
        pub key_frame: i32,
        pub hw_frames_ctx: i32,
    }

    #[repr(C)]
    pub struct RawCodecParOffsets {
        pub codec_type: i32,
        pub codec_id: i32,
        pub codec_tag: i32,
        pub extradata: i32,
        pub extradata_size: i32,
        pub format: i32,
        pub bit_rate: i32,
        pub profile: i32,
        pub level: i32,
        pub width: i32,
        pub height: i32,
        pub sample_aspect_ratio: i32,
        pub color_range: i32,
        pub color_primaries: i32,
        pub color_trc: i32,
        pub color_space: i32,
        pub ch_order: i32,
        pub ch_nb: i32,
        pub ch_mask: i32,
        pub sample_rate: i32,
        pub block_align: i32,
        pub frame_size: i32,
    }

    #[repr(C)]
    pub struct RawStreamOffsets {
        pub index: i32,
        pub id: i32,
        pub codecpar: i32,
        pub time_base: i32,
        pub start_time: i32,
        pub duration: i32,
        pub nb_frames: i32,
        pub disposition: i32,
        pub metadata: i32,
        pub avg_frame_rate: i32,
        pub r_frame_rate: i32,
    }

    #[repr(C)]
    pub struct RawFormatCtxOffsets {
        pub iformat: i32,
        pub oformat: i32,
        pub pb: i32,
        pub nb_streams: i32,
        pub streams: i32,
        pub url: i32,
        pub start_time: i32,
        pub duration: i32,
        pub bit_rate: i32,
        pub flags: i32,
        pub nb_programs: i32,
        pub programs: i32,
        pub metadata: i32,
    }

    #[repr(C)]
    pub struct RawBsfOffsets {
        pub par_in: i32,
        pub par_out: i32,
        pub time_base_in: i32,
        pub time_base_out: i32,
    }

    extern "C" {
        pub fn lavshim_version() -> c_int;
        pub fn lavshim_compiled_avutil_major() -> c_int;
        pub fn lavshim_compiled_avcodec_major() -> c_int;
        pub fn lavshim_compiled_avformat_major() -> c_int;

        pub fn lavshim_log_install(
            set_cb: *mut c_void,
            format_line: *mut c_void,
            sink: LogSinkFn,
        );
        pub fn lavshim_log_uninstall(set_cb: *mut c_void, default_cb: *mut c_void);

        pub fn lavshim_q_install(
            mul: *mut c_void,
            add: *mut c_void,
            sub: *mut c_void,
            div: *mut c_void,
            d2q: *mut c_void,
            cmp: *mut c_void,
        );
        pub fn lavshim_q_mul(
            an: i32,
            ad: i32,
            bn: i32,
            bd: i32,
            on: *mut i32,
            od: *mut i32,
        ) -> c_int;
        pub fn lavshim_q_add(
            an: i32,
            ad: i32,
            bn: i32,
            bd: i32,
            on: *mut i32,
            od: *mut i32,
        ) -> c_int;
        pub fn lavshim_q_sub(
            an: i32,
            ad: i32,
            bn: i32,
            bd: i32,
            on: *mut i32,
            od: *mut i32,
        ) -> c_int;
        pub fn lavshim_q_div(
            an: i32,
            ad: i32,
            bn: i32,
            bd: i32,
            on: *mut i32,
            od: *mut i32,
        ) -> c_int;
        pub fn lavshim_q_d2q(d: f64, max: i32, on: *mut i32, od: *mut i32) -> c_int;
        pub fn lavshim_q_q2d(num: i32, den: i32) -> f64;
        pub fn lavshim_q_cmp(an: i32, ad: i32, bn: i32, bd: i32) -> c_int;

        pub fn lavshim_frame_offsets(o: *mut RawFrameOffsets);
        pub fn lavshim_codecpar_offsets(o: *mut RawCodecParOffsets);
        pub fn lavshim_stream_offsets(o: *mut RawStreamOffsets);
        pub fn lavshim_format_ctx_offsets(o: *mut RawFormatCtxOffsets);
        pub fn lavshim_bsf_offsets(o: *mut RawBsfOffsets);

        pub fn lavshim_ctx_set_framerate(ctx: *mut super::AVCodecContext, num: i32, den: i32);
        pub fn lavshim_ctx_set_pkt_timebase(ctx: *mut super::AVCodecContext, num: i32, den: i32);
        pub fn lavshim_ctx_set_colorimetry(
            ctx: *mut super::AVCodecContext,
            range: i32,
            primaries: i32,
            trc: i32,
            space: i32,
        );
        pub fn lavshim_ctx_install_hw(
            ctx: *mut super::AVCodecContext,
            device_ref: *mut super::AVBufferRef,
            hw_pix_fmt: i32,
            buffer_ref: *mut c_void,
        ) -> c_int;

        pub fn lavshim_fmt_set_interrupt(
            ctx: *mut super::AVFormatContext,
            cb: *mut c_void,
            opaque: *mut c_void,
        );

        pub fn lavshim_list_sources(
            list: *mut c_void,
            free_list: *mut c_void,
            demuxer: *mut c_void,
            device_name: *const c_char,
            count: *mut i32,
            names: *mut *mut *mut c_char,
            descs: *mut *mut *mut c_char,
        ) -> c_int;
        pub fn lavshim_free_sources(count: i32, names: *mut *mut c_char, descs: *mut *mut c_char);
    }
}

// ============================================================================
// Probes
// ============================================================================

/// Whether the companion shim was compiled into this build.
pub fn available() -> bool {
    cfg!(lavshim)
}

/// The FFmpeg majors the shim was compiled against, for the init-time
/// compatibility report.
pub fn compiled_majors() -> Option<(i32, i32, i32)> {
    #[cfg(lavshim)]
    unsafe {
        Some((
            native::lavshim_compiled_avutil_major(),
            native::lavshim_compiled_avcodec_major(),
            native::lavshim_compiled_avformat_major(),
        ))
    }
    #[cfg(not(lavshim))]
    None
}

// ============================================================================
// Logging bridge
// ============================================================================

#[cfg(lavshim)]
unsafe extern "C" fn log_sink(_avcl: *mut c_void, level: c_int, line: *const c_char) {
    use super::types::log_level;

    if line.is_null() {
        return;
    }
    // Copy into host storage before this callback returns.
    let message = unsafe { std::ffi::CStr::from_ptr(line) }
        .to_string_lossy()
        .into_owned();
    if level <= log_level::ERROR {
        tracing::error!(target: "ffmpeg", "{message}");
    } else if level <= log_level::WARNING {
        tracing::warn!(target: "ffmpeg", "{message}");
    } else if level <= log_level::INFO {
        tracing::info!(target: "ffmpeg", "{message}");
    } else if level <= log_level::VERBOSE {
        tracing::debug!(target: "ffmpeg", "{message}");
    } else {
        tracing::trace!(target: "ffmpeg", "{message}");
    }
}

/// Route FFmpeg's variadic logging into `tracing`. A no-op without the shim;
/// FFmpeg keeps its stderr default in that case.
pub fn install_log(avutil: &AvUtil) {
    #[cfg(lavshim)]
    unsafe {
        native::lavshim_log_install(
            avutil.av_log_set_callback_addr,
            avutil.av_log_format_line_addr,
            log_sink,
        );
    }
}

/// Restore FFmpeg's default log callback.
pub fn uninstall_log(avutil: &AvUtil) {
    #[cfg(lavshim)]
    unsafe {
        native::lavshim_log_uninstall(
            avutil.av_log_set_callback_addr,
            avutil.av_log_default_callback_addr,
        );
    }
}

// ============================================================================
// Rational arithmetic
// ============================================================================

/// Hand the shim the struct-by-value arithmetic entry points.
pub fn install_rational(avutil: &AvUtil) {
    #[cfg(lavshim)]
    unsafe {
        native::lavshim_q_install(
            avutil.av_mul_q_addr,
            avutil.av_add_q_addr,
            avutil.av_sub_q_addr,
            avutil.av_div_q_addr,
            avutil.av_d2q_addr,
            avutil.av_cmp_q_addr.unwrap_or(std::ptr::null_mut()),
        );
        RATIONAL_INSTALLED.store(true, Ordering::Release);
    }
}

macro_rules! q_binop {
    ($name:ident, $native:ident) => {
        pub(crate) fn $name(a: Rational, b: Rational) -> Option<Rational> {
            #[cfg(lavshim)]
            {
                if RATIONAL_INSTALLED.load(Ordering::Acquire) {
                    let (mut n, mut d) = (0i32, 0i32);
                    let ret = unsafe {
                        native::$native(a.num, a.den, b.num, b.den, &mut n, &mut d)
                    };
                    if ret == 0 {
                        return Some(Rational::new(n, d));
                    }
                }
            }
            None
        }
    };
}

q_binop!(rational_mul, lavshim_q_mul);
q_binop!(rational_add, lavshim_q_add);
q_binop!(rational_sub, lavshim_q_sub);
q_binop!(rational_div, lavshim_q_div);

pub(crate) fn rational_d2q(value: f64, max: c_int) -> Option<Rational> {
    #[cfg(lavshim)]
    {
        if RATIONAL_INSTALLED.load(Ordering::Acquire) {
            let (mut n, mut d) = (0i32, 0i32);
            let ret = unsafe { native::lavshim_q_d2q(value, max, &mut n, &mut d) };
            if ret == 0 {
                return Some(Rational::new(n, d));
            }
        }
    }
    None
}

/// FFmpeg's `av_q2d`. Works without install (the shim carries the header
/// inline).
pub(crate) fn rational_q2d(a: Rational) -> Option<f64> {
    #[cfg(lavshim)]
    {
        Some(unsafe { native::lavshim_q_q2d(a.num, a.den) })
    }
    #[cfg(not(lavshim))]
    {
        None
    }
}

/// FFmpeg's `av_cmp_q`: -1/0/1, or `i32::MIN` when a side is 0/0.
pub(crate) fn rational_cmp(a: Rational, b: Rational) -> Option<c_int> {
    #[cfg(lavshim)]
    {
        Some(unsafe { native::lavshim_q_cmp(a.num, a.den, b.num, b.den) })
    }
    #[cfg(not(lavshim))]
    {
        None
    }
}

// ============================================================================
// Offset discovery
// ============================================================================

#[cfg(lavshim)]
fn opt(off: i32) -> Option<usize> {
    (off >= 0).then_some(off as usize)
}

/// Shim-discovered offset tables, overriding the per-major fallbacks.
pub fn discover_offsets() -> Option<super::offsets::Offsets> {
    #[cfg(lavshim)]
    unsafe {
        let mut f = std::mem::zeroed::<native::RawFrameOffsets>();
        native::lavshim_frame_offsets(&mut f);
        let mut p = std::mem::zeroed::<native::RawCodecParOffsets>();
        native::lavshim_codecpar_offsets(&mut p);
        let mut s = std::mem::zeroed::<native::RawStreamOffsets>();
        native::lavshim_stream_offsets(&mut s);
        let mut m = std::mem::zeroed::<native::RawFormatCtxOffsets>();
        native::lavshim_format_ctx_offsets(&mut m);
        let mut b = std::mem::zeroed::<native::RawBsfOffsets>();
        native::lavshim_bsf_offsets(&mut b);

        // The shim has no view of AVCodecContext internals beyond what its
        // headers say; the leading block has not drifted within a major, so
        // the per-major table remains correct here.
        let ctx =
            super::offsets::Offsets::resolve(
                native::lavshim_compiled_avutil_major(),
                native::lavshim_compiled_avcodec_major(),
                native::lavshim_compiled_avformat_major(),
            )
            .ctx;

        Some(super::offsets::Offsets {
            frame: super::offsets::FrameOffsets {
                pts: f.pts as usize,
                pkt_dts: f.pkt_dts as usize,
                time_base: opt(f.time_base),
                pict_type: f.pict_type as usize,
                sample_aspect_ratio: f.sample_aspect_ratio as usize,
                sample_rate: f.sample_rate as usize,
                ch_order: opt(f.ch_order),
                ch_nb: f.ch_nb as usize,
                ch_mask: f.ch_mask as usize,
                buf0: f.buf0 as usize,
                flags: f.flags as usize,
                color_range: f.color_range as usize,
                color_primaries: f.color_primaries as usize,
                color_trc: f.color_trc as usize,
                colorspace: f.colorspace as usize,
                best_effort_timestamp: f.best_effort_timestamp as usize,
                duration: opt(f.duration),
                key_frame: opt(f.key_frame),
                hw_frames_ctx: f.hw_frames_ctx as usize,
            },
            par: super::offsets::CodecParOffsets {
                codec_type: p.codec_type as usize,
                codec_id: p.codec_id as usize,
                codec_tag: p.codec_tag as usize,
                extradata: p.extradata as usize,
                extradata_size: p.extradata_size as usize,
                format: p.format as usize,
                bit_rate: p.bit_rate as usize,
                profile: p.profile as usize,
                level: p.level as usize,
                width: p.width as usize,
                height: p.height as usize,
                sample_aspect_ratio: p.sample_aspect_ratio as usize,
                color_range: p.color_range as usize,
                color_primaries: p.color_primaries as usize,
                color_trc: p.color_trc as usize,
                color_space: p.color_space as usize,
                ch_order: opt(p.ch_order),
                ch_nb: p.ch_nb as usize,
                ch_mask: p.ch_mask as usize,
                sample_rate: p.sample_rate as usize,
                block_align: p.block_align as usize,
                frame_size: p.frame_size as usize,
            },
            stream: super::offsets::StreamOffsets {
                index: s.index as usize,
                id: s.id as usize,
                codecpar: s.codecpar as usize,
                time_base: s.time_base as usize,
                start_time: s.start_time as usize,
                duration: s.duration as usize,
                nb_frames: s.nb_frames as usize,
                disposition: s.disposition as usize,
                metadata: s.metadata as usize,
                avg_frame_rate: s.avg_frame_rate as usize,
                r_frame_rate: s.r_frame_rate as usize,
            },
            fmt: super::offsets::FormatCtxOffsets {
                url: m.url as usize,
                start_time: m.start_time as usize,
                duration: m.duration as usize,
                bit_rate: m.bit_rate as usize,
                flags: m.flags as usize,
                nb_programs: m.nb_programs as usize,
                programs: m.programs as usize,
                metadata: m.metadata as usize,
            },
            bsf: super::offsets::BsfOffsets {
                par_in: b.par_in as usize,
                par_out: b.par_out as usize,
                time_base_in: b.time_base_in as usize,
                time_base_out: b.time_base_out as usize,
            },
            ctx,
        })
    }
    #[cfg(not(lavshim))]
    None
}

// ============================================================================
// Codec context accessors
// ============================================================================

/// Set `AVCodecContext.framerate`.
pub fn ctx_set_framerate(ctx: *mut AVCodecContext, rate: Rational) -> Result<()> {
    #[cfg(lavshim)]
    {
        unsafe { native::lavshim_ctx_set_framerate(ctx, rate.num, rate.den) };
        Ok(())
    }
    #[cfg(not(lavshim))]
    {
        Err(Error::ShimUnavailable("codec context framerate"))
    }
}

/// Set `AVCodecContext.pkt_timebase`.
pub fn ctx_set_pkt_timebase(ctx: *mut AVCodecContext, tb: Rational) -> Result<()> {
    #[cfg(lavshim)]
    {
        unsafe { native::lavshim_ctx_set_pkt_timebase(ctx, tb.num, tb.den) };
        Ok(())
    }
    #[cfg(not(lavshim))]
    {
        Err(Error::ShimUnavailable("codec context packet time base"))
    }
}

/// Set colorimetry metadata on a codec context. Any argument below zero is
/// left untouched.
pub fn ctx_set_colorimetry(
    ctx: *mut AVCodecContext,
    range: c_int,
    primaries: c_int,
    trc: c_int,
    space: c_int,
) -> Result<()> {
    #[cfg(lavshim)]
    {
        unsafe { native::lavshim_ctx_set_colorimetry(ctx, range, primaries, trc, space) };
        Ok(())
    }
    #[cfg(not(lavshim))]
    {
        Err(Error::ShimUnavailable("codec context colorimetry"))
    }
}

/// Attach a hardware device context and install the format-selection hook.
/// `buffer_ref` is the bound `av_buffer_ref` entry point.
pub fn ctx_install_hw(
    ctx: *mut AVCodecContext,
    device_ref: *mut AVBufferRef,
    hw_pix_fmt: c_int,
    buffer_ref: *mut c_void,
) -> Result<()> {
    #[cfg(lavshim)]
    {
        let ret =
            unsafe { native::lavshim_ctx_install_hw(ctx, device_ref, hw_pix_fmt, buffer_ref) };
        if ret < 0 {
            return Err(Error::OutOfMemory("hardware device reference"));
        }
        Ok(())
    }
    #[cfg(not(lavshim))]
    {
        Err(Error::ShimUnavailable("hardware device installation"))
    }
}

/// Install an interrupt callback on a format context. `cb` is the fixed
/// interrupt trampoline; `opaque` is the registry handle.
pub fn fmt_set_interrupt(
    ctx: *mut AVFormatContext,
    cb: *mut c_void,
    opaque: *mut c_void,
) -> Result<()> {
    #[cfg(lavshim)]
    {
        unsafe { native::lavshim_fmt_set_interrupt(ctx, cb, opaque) };
        Ok(())
    }
    #[cfg(not(lavshim))]
    {
        Err(Error::ShimUnavailable("interrupt callback installation"))
    }
}

// ============================================================================
// Device enumeration
// ============================================================================

/// Enumerate input sources for a device demuxer into host strings.
pub fn list_sources(
    list_addr: *mut c_void,
    free_addr: *mut c_void,
    demuxer: *mut c_void,
    device_name: Option<&std::ffi::CStr>,
) -> Result<Vec<(String, String)>> {
    #[cfg(lavshim)]
    {
        let mut count: i32 = 0;
        let mut names: *mut *mut c_char = std::ptr::null_mut();
        let mut descs: *mut *mut c_char = std::ptr::null_mut();
        let ret = unsafe {
            native::lavshim_list_sources(
                list_addr,
                free_addr,
                demuxer,
                device_name.map_or(std::ptr::null(), |n| n.as_ptr()),
                &mut count,
                &mut names,
                &mut descs,
            )
        };
        crate::error::check("avdevice_list_input_sources", ret)?;

        let mut out = Vec::with_capacity(count as usize);
        for i in 0..count as usize {
            unsafe {
                let name = std::ffi::CStr::from_ptr(*names.add(i))
                    .to_string_lossy()
                    .into_owned();
                let desc = std::ffi::CStr::from_ptr(*descs.add(i))
                    .to_string_lossy()
                    .into_owned();
                out.push((name, desc));
            }
        }
        unsafe { native::lavshim_free_sources(count, names, descs) };
        Ok(out)
    }
    #[cfg(not(lavshim))]
    {
        Err(Error::ShimUnavailable("device enumeration"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_matches_cfg() {
        assert_eq!(available(), cfg!(lavshim));
    }

    #[test]
    fn test_unavailable_paths_error_cleanly() {
        if available() {
            return;
        }
        assert!(matches!(
            ctx_set_framerate(std::ptr::null_mut(), Rational::new(30, 1)),
            Err(Error::ShimUnavailable(_))
        ));
        assert!(rational_mul(Rational::new(1, 2), Rational::new(1, 2)).is_none());
        assert!(rational_q2d(Rational::new(1, 2)).is_none());
        assert!(rational_cmp(Rational::new(1, 2), Rational::new(1, 3)).is_none());
        assert!(discover_offsets().is_none());
    }
}
