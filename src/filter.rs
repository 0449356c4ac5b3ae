//! Filter graphs
//!
//! Builds an FFmpeg filter graph from a user description string between a
//! buffer source and a buffer sink, then pumps frames through it with the
//! keep-reference push and an Again-terminated drain.

use std::ffi::{CStr, CString};

use parking_lot::Mutex;

use crate::codec::frame::Frame;
use crate::error::{check, Error, Result};
use crate::ffi::types::{
    buffersrc_flag, default_channel_mask, AVFilterContext, AVFilterGraph, AVFilterInOut,
    PixelFormat, SampleFormat,
};
use crate::init::Ffmpeg;
use crate::rational::Rational;

/// Input pad description for a filter graph.
#[derive(Debug, Clone, Copy)]
pub enum FilterInput {
    Video {
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        time_base: Rational,
    },
    Audio {
        sample_rate: u32,
        channels: u32,
        sample_format: SampleFormat,
        time_base: Rational,
    },
}

struct FilterGraphInner {
    graph: *mut AVFilterGraph,
    source: *mut AVFilterContext,
    sink: *mut AVFilterContext,
    av: &'static Ffmpeg,
}

unsafe impl Send for FilterGraphInner {}

/// A configured filter graph with one input and one output.
pub struct FilterGraph {
    inner: Mutex<FilterGraphInner>,
}

impl FilterGraph {
    /// Build and configure a graph from a filter description such as
    /// `scale=640:480,hflip` or `atempo=1.5`.
    pub fn new(description: &str, input: FilterInput) -> Result<Self> {
        let av = Ffmpeg::get()?;
        let graph = unsafe { (av.avfilter.avfilter_graph_alloc)() };
        if graph.is_null() {
            return Err(Error::OutOfMemory("AVFilterGraph"));
        }

        // Build eagerly; tear the graph down on any error below.
        let result = Self::build(av, graph, description, input);
        match result {
            Ok((source, sink)) => Ok(Self {
                inner: Mutex::new(FilterGraphInner {
                    graph,
                    source,
                    sink,
                    av,
                }),
            }),
            Err(e) => {
                let mut graph = graph;
                unsafe { (av.avfilter.avfilter_graph_free)(&mut graph) };
                Err(e)
            }
        }
    }

    fn build(
        av: &'static Ffmpeg,
        graph: *mut AVFilterGraph,
        description: &str,
        input: FilterInput,
    ) -> Result<(*mut AVFilterContext, *mut AVFilterContext)> {
        let (source_name, sink_name, args) = match input {
            FilterInput::Video {
                width,
                height,
                pixel_format,
                time_base,
            } => (
                "buffer",
                "buffersink",
                format!(
                    "video_size={width}x{height}:pix_fmt={}:time_base={}/{}:pixel_aspect=1/1",
                    pixel_format.as_raw(),
                    time_base.num,
                    time_base.den
                ),
            ),
            FilterInput::Audio {
                sample_rate,
                channels,
                sample_format,
                time_base,
            } => {
                let fmt_name = unsafe {
                    let name = (av.avutil.av_get_sample_fmt_name)(sample_format.as_raw());
                    if name.is_null() {
                        return Err(Error::InvalidArgument("unknown sample format"));
                    }
                    CStr::from_ptr(name).to_string_lossy().into_owned()
                };
                (
                    "abuffer",
                    "abuffersink",
                    format!(
                        "sample_rate={sample_rate}:sample_fmt={fmt_name}:channel_layout={:#x}:time_base={}/{}",
                        default_channel_mask(channels),
                        time_base.num,
                        time_base.den
                    ),
                )
            }
        };

        let source = create_filter(av, graph, source_name, "in", Some(&args))?;
        let sink = create_filter(av, graph, sink_name, "out", None)?;

        // Parse with the variant that reports open pads through out-params;
        // the pointer-returning parser is not callable through the binder.
        let c_desc =
            CString::new(description).map_err(|_| Error::InvalidArgument("NUL in filter"))?;
        let mut inputs: *mut AVFilterInOut = std::ptr::null_mut();
        let mut outputs: *mut AVFilterInOut = std::ptr::null_mut();
        let ret = unsafe {
            (av.avfilter.avfilter_graph_parse2)(graph, c_desc.as_ptr(), &mut inputs, &mut outputs)
        };
        check("avfilter_graph_parse2", ret)?;

        // Link our endpoints onto the chain's open pads.
        let link_result = (|| -> Result<()> {
            unsafe {
                let mut cursor = inputs;
                while !cursor.is_null() {
                    let pad = &*cursor;
                    check(
                        "avfilter_link",
                        (av.avfilter.avfilter_link)(
                            source,
                            0,
                            pad.filter_ctx,
                            pad.pad_idx as u32,
                        ),
                    )?;
                    cursor = pad.next;
                }
                let mut cursor = outputs;
                while !cursor.is_null() {
                    let pad = &*cursor;
                    check(
                        "avfilter_link",
                        (av.avfilter.avfilter_link)(pad.filter_ctx, pad.pad_idx as u32, sink, 0),
                    )?;
                    cursor = pad.next;
                }
            }
            Ok(())
        })();
        unsafe {
            (av.avfilter.avfilter_inout_free)(&mut inputs);
            (av.avfilter.avfilter_inout_free)(&mut outputs);
        }
        link_result?;

        let ret = unsafe { (av.avfilter.avfilter_graph_config)(graph, std::ptr::null_mut()) };
        check("avfilter_graph_config", ret)?;
        Ok((source, sink))
    }

    /// Push one frame and collect everything the graph produces for it
    /// (owned frames).
    pub fn process(&self, frame: &mut Frame) -> Result<Vec<Frame>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let ret = unsafe {
            (inner.av.avfilter.av_buffersrc_add_frame_flags)(
                inner.source,
                frame.as_mut_ptr(),
                buffersrc_flag::KEEP_REF,
            )
        };
        check("av_buffersrc_add_frame_flags", ret)?;
        drain_sink(inner)
    }

    /// Signal end of stream and collect the remaining frames.
    pub fn flush(&self) -> Result<Vec<Frame>> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let ret = unsafe {
            (inner.av.avfilter.av_buffersrc_add_frame_flags)(
                inner.source,
                std::ptr::null_mut(),
                0,
            )
        };
        check("av_buffersrc_add_frame_flags", ret)?;
        drain_sink(inner)
    }
}

fn drain_sink(inner: &mut FilterGraphInner) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    loop {
        let mut out = Frame::alloc()?;
        let ret =
            unsafe { (inner.av.avfilter.av_buffersink_get_frame)(inner.sink, out.as_mut_ptr()) };
        match crate::error::check("av_buffersink_get_frame", ret) {
            Ok(_) => frames.push(out),
            Err(e) if e.is_again() || e.is_eof() => return Ok(frames),
            Err(e) => return Err(e),
        }
    }
}

fn create_filter(
    av: &'static Ffmpeg,
    graph: *mut AVFilterGraph,
    filter_name: &str,
    instance_name: &str,
    args: Option<&str>,
) -> Result<*mut AVFilterContext> {
    let c_filter =
        CString::new(filter_name).map_err(|_| Error::InvalidArgument("NUL in filter name"))?;
    let filter = unsafe { (av.avfilter.avfilter_get_by_name)(c_filter.as_ptr()) };
    if filter.is_null() {
        return Err(Error::Ffmpeg {
            op: "avfilter_get_by_name",
            code: crate::ffi::error::AVERROR_FILTER_NOT_FOUND,
            message: format!("filter '{filter_name}' not found"),
        });
    }
    let c_instance =
        CString::new(instance_name).map_err(|_| Error::InvalidArgument("NUL in name"))?;
    let c_args = args
        .map(CString::new)
        .transpose()
        .map_err(|_| Error::InvalidArgument("NUL in filter args"))?;

    let mut ctx: *mut AVFilterContext = std::ptr::null_mut();
    let ret = unsafe {
        (av.avfilter.avfilter_graph_create_filter)(
            &mut ctx,
            filter,
            c_instance.as_ptr(),
            c_args.as_ref().map_or(std::ptr::null(), |a| a.as_ptr()),
            std::ptr::null_mut(),
            graph,
        )
    };
    check("avfilter_graph_create_filter", ret)?;
    Ok(ctx)
}

impl Drop for FilterGraphInner {
    fn drop(&mut self) {
        if !self.graph.is_null() {
            // Frees every filter context in the graph too.
            unsafe { (self.av.avfilter.avfilter_graph_free)(&mut self.graph) };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video_input() -> FilterInput {
        FilterInput::Video {
            width: 64,
            height: 64,
            pixel_format: PixelFormat::Yuv420p,
            time_base: Rational::new(1, 30),
        }
    }

    #[test]
    fn test_bad_filter_description() {
        if Ffmpeg::get().is_err() {
            return;
        }
        assert!(FilterGraph::new("definitely-not-a-filter=1", video_input()).is_err());
    }

    #[test]
    fn test_null_filter_passthrough() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let Ok(graph) = FilterGraph::new("null", video_input()) else {
            return;
        };
        let mut frame = Frame::alloc_video(64, 64, PixelFormat::Yuv420p).unwrap();
        frame.set_pts(5);
        let out = graph.process(&mut frame).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].width(), 64);
        assert!(out[0].is_owned());
        let tail = graph.flush().unwrap();
        assert!(tail.is_empty());
    }

    #[test]
    fn test_scale_filter_changes_geometry() {
        if Ffmpeg::get().is_err() {
            return;
        }
        let Ok(graph) = FilterGraph::new("scale=32:32", video_input()) else {
            return;
        };
        let mut frame = Frame::alloc_video(64, 64, PixelFormat::Yuv420p).unwrap();
        let out = graph.process(&mut frame).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].width(), 32);
        assert_eq!(out[0].height(), 32);
    }
}
