//! Two-pass transcoding driver
//!
//! Runs the same decode→scale→encode pipeline twice: pass 1 writes rate
//! statistics next to a throwaway output, pass 2 consumes them into the real
//! one. Pass-log cleanup sweeps every file whose name begins with the chosen
//! base, tolerating the encoder-specific suffixes (`.log`, `.log.mbtree`,
//! `.temp`, …).

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::decoder::Decoder;
use crate::encoder::Encoder;
use crate::error::{Error, Result};
use crate::ffi::types::PixelFormat;
use crate::init::Ffmpeg;
use crate::options::{DecoderOptions, EncoderOptions, Pass, VideoSettings};
use crate::scaler::{ScaleAlgorithm, Scaler};

static RUN_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Options for [`transcode_two_pass`].
pub struct TwoPassOptions {
    /// Target video settings (both passes share them; only the pass flags
    /// differ)
    pub video: VideoSettings,
    /// Base path for the rate-statistics files; a unique temporary base is
    /// chosen when absent
    pub pass_log_base: Option<PathBuf>,
    /// Where pass 1 writes its discarded output; a temporary file with the
    /// final output's extension when absent
    pub first_pass_output: Option<PathBuf>,
    /// Muxer override for the final output
    pub format: Option<String>,
}

impl TwoPassOptions {
    pub fn new(video: VideoSettings) -> Self {
        Self {
            video,
            pass_log_base: None,
            first_pass_output: None,
            format: None,
        }
    }
}

/// Decode `input_url`'s video stream and encode it twice into `output_url`.
pub fn transcode_two_pass(
    input_url: &str,
    output_url: &str,
    options: TwoPassOptions,
) -> Result<()> {
    Ffmpeg::get()?;

    let run = RUN_COUNTER.fetch_add(1, Ordering::SeqCst);
    let unique = format!("lavkit2pass-{}-{run}", std::process::id());
    let log_base = options
        .pass_log_base
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join(&unique));

    let pass1_output = options.first_pass_output.clone().unwrap_or_else(|| {
        let extension = Path::new(output_url)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("mp4");
        std::env::temp_dir().join(format!("{unique}-pass1.{extension}"))
    });

    let decoder = Decoder::open(input_url, DecoderOptions::default())?;
    decoder.open_video_decoder()?;

    // Pass 1: statistics only; the container output is thrown away.
    let result = run_pass(
        &decoder,
        pass1_output.to_str().ok_or(Error::InvalidArgument(
            "pass-1 output path is not valid UTF-8",
        ))?,
        &options,
        Pass::First,
        &log_base,
    );
    let _ = std::fs::remove_file(&pass1_output);
    result?;

    // Pass 2 consumes the statistics into the real output.
    decoder.seek(0)?;
    let result = run_pass(&decoder, output_url, &options, Pass::Second, &log_base);
    decoder.close();
    sweep_pass_logs(&log_base);
    result
}

fn run_pass(
    decoder: &Decoder,
    output_url: &str,
    options: &TwoPassOptions,
    pass: Pass,
    log_base: &Path,
) -> Result<()> {
    let encoder_options = EncoderOptions {
        video: Some(options.video.clone()),
        pass: Some(pass),
        pass_log_file: Some(log_base.to_path_buf()),
        format: options.format.clone(),
        ..EncoderOptions::default()
    };
    let encoder = Encoder::new(output_url, encoder_options)?;

    let mut scaler: Option<Scaler> = None;
    while let Some(frame) = decoder.decode_video()? {
        let needs_convert = frame.width() != options.video.width
            || frame.height() != options.video.height
            || frame.pixel_format() != options.video.pixel_format;
        if needs_convert {
            if scaler.is_none() {
                let src_format = match frame.pixel_format() {
                    PixelFormat::None => {
                        return Err(Error::InvalidArgument("frame has no pixel format"))
                    }
                    format => format,
                };
                scaler = Some(Scaler::new(
                    frame.width(),
                    frame.height(),
                    src_format,
                    options.video.width,
                    options.video.height,
                    options.video.pixel_format,
                    ScaleAlgorithm::Bilinear,
                )?);
            }
            let mut scaled = scaler.as_ref().unwrap().scale(&frame)?;
            encoder.write_video_frame(&mut scaled)?;
        } else {
            let mut frame = frame;
            encoder.write_video_frame(&mut frame)?;
        }
    }
    encoder.close()
}

/// Delete every rate-statistics file the encoder left behind for this base.
fn sweep_pass_logs(log_base: &Path) {
    let Some(dir) = log_base.parent() else {
        return;
    };
    let Some(base_name) = log_base.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with(base_name) {
            let _ = std::fs::remove_file(entry.path());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::codec::frame::Frame;
    use crate::options::RateControl;

    /// Produce a small sample input, or report that this build has no usable
    /// encoder.
    fn write_sample_input(path: &Path) -> bool {
        let mut settings =
            VideoSettings::new("mpeg4", 320, 240, crate::rational::Rational::new(25, 1));
        settings.rate_control = Some(RateControl::Abr(400_000));
        let Ok(encoder) = Encoder::new(path.to_str().unwrap(), EncoderOptions::video(settings))
        else {
            return false;
        };
        for _ in 0..10 {
            let mut frame = Frame::alloc_video(320, 240, PixelFormat::Yuv420p).unwrap();
            unsafe {
                let y = frame.linesize(0) as usize * 240;
                std::ptr::write_bytes(frame.data_mut(0), 60, y);
                let c = frame.linesize(1) as usize * 120;
                std::ptr::write_bytes(frame.data_mut(1), 128, c);
                std::ptr::write_bytes(frame.data_mut(2), 128, c);
            }
            encoder.write_video_frame(&mut frame).unwrap();
        }
        encoder.close().unwrap();
        true
    }

    #[test]
    fn test_sweep_tolerates_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("stats");
        for suffix in ["-0.log", "-0.log.mbtree", ".log", ".temp"] {
            std::fs::write(dir.path().join(format!("stats{suffix}")), b"x").unwrap();
        }
        std::fs::write(dir.path().join("unrelated.log"), b"x").unwrap();

        sweep_pass_logs(&base);

        let remaining: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(remaining, vec!["unrelated.log".to_string()]);
    }

    #[test]
    fn test_missing_log_dir_fails_at_pass_one() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.avi");
        if !write_sample_input(&input) {
            return;
        }
        let output = dir.path().join("out.mp4");

        let mut settings =
            VideoSettings::new("libx264", 320, 240, crate::rational::Rational::new(25, 1));
        settings.rate_control = Some(RateControl::Abr(500_000));
        let mut options = TwoPassOptions::new(settings);
        // Only the stats path is invalid; the input is real.
        options.pass_log_base = Some(PathBuf::from("/nonexistent-dir/stats"));

        match transcode_two_pass(input.to_str().unwrap(), output.to_str().unwrap(), options) {
            // Build without libx264: nothing to exercise.
            Err(Error::EncoderNotFound(_)) => {}
            Err(e) => {
                // Pass 1 failed opening the stats file, not the input.
                assert!(!matches!(
                    e,
                    Error::Io {
                        op: "avformat_open_input",
                        ..
                    }
                ));
                assert!(!output.exists());
            }
            Ok(()) => panic!("expected pass 1 to fail on the stats path"),
        }
    }
}
