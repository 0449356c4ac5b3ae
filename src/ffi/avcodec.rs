//! libavcodec entry points
//!
//! Codec discovery, codec context lifecycle, the symmetric send/receive
//! protocol, packet management and bitstream filters.

use std::os::raw::{c_char, c_int, c_uint};

use super::loader::SharedLibrary;
use super::types::{
    AVBSFContext, AVBitStreamFilter, AVCodec, AVCodecContext, AVCodecParameters, AVDictionary,
    AVFrame, AVPacket,
};
use crate::error::Result;

/// Typed bindings into libavcodec.
pub struct AvCodec {
    pub avcodec_version: unsafe extern "C" fn() -> c_uint,

    // ------------------------------------------------------------------
    // Codec discovery
    // ------------------------------------------------------------------
    pub avcodec_find_decoder: unsafe extern "C" fn(id: c_int) -> *const AVCodec,
    pub avcodec_find_decoder_by_name: unsafe extern "C" fn(name: *const c_char) -> *const AVCodec,
    pub avcodec_find_encoder: unsafe extern "C" fn(id: c_int) -> *const AVCodec,
    pub avcodec_find_encoder_by_name: unsafe extern "C" fn(name: *const c_char) -> *const AVCodec,
    pub avcodec_get_name: unsafe extern "C" fn(id: c_int) -> *const c_char,

    // ------------------------------------------------------------------
    // Codec context lifecycle
    // ------------------------------------------------------------------
    pub avcodec_alloc_context3: unsafe extern "C" fn(codec: *const AVCodec) -> *mut AVCodecContext,
    pub avcodec_free_context: unsafe extern "C" fn(avctx: *mut *mut AVCodecContext),
    pub avcodec_open2: unsafe extern "C" fn(
        avctx: *mut AVCodecContext,
        codec: *const AVCodec,
        options: *mut *mut AVDictionary,
    ) -> c_int,
    pub avcodec_flush_buffers: unsafe extern "C" fn(avctx: *mut AVCodecContext),

    // ------------------------------------------------------------------
    // Codec parameters
    // ------------------------------------------------------------------
    pub avcodec_parameters_alloc: unsafe extern "C" fn() -> *mut AVCodecParameters,
    pub avcodec_parameters_free: unsafe extern "C" fn(par: *mut *mut AVCodecParameters),
    pub avcodec_parameters_copy:
        unsafe extern "C" fn(dst: *mut AVCodecParameters, src: *const AVCodecParameters) -> c_int,
    pub avcodec_parameters_from_context:
        unsafe extern "C" fn(par: *mut AVCodecParameters, codec: *const AVCodecContext) -> c_int,
    pub avcodec_parameters_to_context:
        unsafe extern "C" fn(codec: *mut AVCodecContext, par: *const AVCodecParameters) -> c_int,

    // ------------------------------------------------------------------
    // Send/receive (decode: packet in, frame out; encode: frame in,
    // packet out; a null input starts the drain)
    // ------------------------------------------------------------------
    pub avcodec_send_packet:
        unsafe extern "C" fn(avctx: *mut AVCodecContext, avpkt: *const AVPacket) -> c_int,
    pub avcodec_receive_frame:
        unsafe extern "C" fn(avctx: *mut AVCodecContext, frame: *mut AVFrame) -> c_int,
    pub avcodec_send_frame:
        unsafe extern "C" fn(avctx: *mut AVCodecContext, frame: *const AVFrame) -> c_int,
    pub avcodec_receive_packet:
        unsafe extern "C" fn(avctx: *mut AVCodecContext, avpkt: *mut AVPacket) -> c_int,

    // ------------------------------------------------------------------
    // Packets
    // ------------------------------------------------------------------
    pub av_packet_alloc: unsafe extern "C" fn() -> *mut AVPacket,
    pub av_packet_free: unsafe extern "C" fn(pkt: *mut *mut AVPacket),
    pub av_packet_unref: unsafe extern "C" fn(pkt: *mut AVPacket),
    pub av_packet_ref: unsafe extern "C" fn(dst: *mut AVPacket, src: *const AVPacket) -> c_int,
    pub av_packet_clone: unsafe extern "C" fn(src: *const AVPacket) -> *mut AVPacket,
    pub av_new_packet: unsafe extern "C" fn(pkt: *mut AVPacket, size: c_int) -> c_int,

    // ------------------------------------------------------------------
    // Bitstream filters
    // ------------------------------------------------------------------
    pub av_bsf_get_by_name: unsafe extern "C" fn(name: *const c_char) -> *const AVBitStreamFilter,
    pub av_bsf_alloc: unsafe extern "C" fn(
        filter: *const AVBitStreamFilter,
        ctx: *mut *mut AVBSFContext,
    ) -> c_int,
    pub av_bsf_init: unsafe extern "C" fn(ctx: *mut AVBSFContext) -> c_int,
    pub av_bsf_send_packet:
        unsafe extern "C" fn(ctx: *mut AVBSFContext, pkt: *mut AVPacket) -> c_int,
    pub av_bsf_receive_packet:
        unsafe extern "C" fn(ctx: *mut AVBSFContext, pkt: *mut AVPacket) -> c_int,
    pub av_bsf_flush: unsafe extern "C" fn(ctx: *mut AVBSFContext),
    pub av_bsf_free: unsafe extern "C" fn(ctx: *mut *mut AVBSFContext),
}

impl AvCodec {
    pub(crate) fn bind(lib: &SharedLibrary) -> Result<Self> {
        Ok(Self {
            avcodec_version: lib.sym("avcodec_version")?,
            avcodec_find_decoder: lib.sym("avcodec_find_decoder")?,
            avcodec_find_decoder_by_name: lib.sym("avcodec_find_decoder_by_name")?,
            avcodec_find_encoder: lib.sym("avcodec_find_encoder")?,
            avcodec_find_encoder_by_name: lib.sym("avcodec_find_encoder_by_name")?,
            avcodec_get_name: lib.sym("avcodec_get_name")?,
            avcodec_alloc_context3: lib.sym("avcodec_alloc_context3")?,
            avcodec_free_context: lib.sym("avcodec_free_context")?,
            avcodec_open2: lib.sym("avcodec_open2")?,
            avcodec_flush_buffers: lib.sym("avcodec_flush_buffers")?,
            avcodec_parameters_alloc: lib.sym("avcodec_parameters_alloc")?,
            avcodec_parameters_free: lib.sym("avcodec_parameters_free")?,
            avcodec_parameters_copy: lib.sym("avcodec_parameters_copy")?,
            avcodec_parameters_from_context: lib.sym("avcodec_parameters_from_context")?,
            avcodec_parameters_to_context: lib.sym("avcodec_parameters_to_context")?,
            avcodec_send_packet: lib.sym("avcodec_send_packet")?,
            avcodec_receive_frame: lib.sym("avcodec_receive_frame")?,
            avcodec_send_frame: lib.sym("avcodec_send_frame")?,
            avcodec_receive_packet: lib.sym("avcodec_receive_packet")?,
            av_packet_alloc: lib.sym("av_packet_alloc")?,
            av_packet_free: lib.sym("av_packet_free")?,
            av_packet_unref: lib.sym("av_packet_unref")?,
            av_packet_ref: lib.sym("av_packet_ref")?,
            av_packet_clone: lib.sym("av_packet_clone")?,
            av_new_packet: lib.sym("av_new_packet")?,
            av_bsf_get_by_name: lib.sym("av_bsf_get_by_name")?,
            av_bsf_alloc: lib.sym("av_bsf_alloc")?,
            av_bsf_init: lib.sym("av_bsf_init")?,
            av_bsf_send_packet: lib.sym("av_bsf_send_packet")?,
            av_bsf_receive_packet: lib.sym("av_bsf_receive_packet")?,
            av_bsf_flush: lib.sym("av_bsf_flush")?,
            av_bsf_free: lib.sym("av_bsf_free")?,
        })
    }
}
