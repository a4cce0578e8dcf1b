//! Thermal sensor raster decoding.
//!
//! The accessory streams big-endian 16-bit words, one line at a time:
//! - a line header of two words: line id (low 12 bits) and an unverified checksum
//! - [`WIDTH`] sample words (low 14 bits significant)
//!
//! [`HEIGHT`] consecutive lines with ids `0..HEIGHT` form one frame. The
//! decoder resynchronizes on its own after corrupted or out-of-order input and
//! never hands out a partially filled frame.

pub mod decoder;
pub mod error;
pub mod frame;
pub mod reader;
pub mod render;
pub mod wire;

pub use decoder::{Decoded, DecoderState, DecoderStats, Desync, FrameDecoder};
pub use error::{Result, ThermalError};
pub use frame::ThermalFrame;
pub use reader::{CaptureReader, DEFAULT_CHUNK_SIZE};
pub use render::{level, render, Bitmap, MID_LEVEL};
pub use wire::{
    encode_frame, encode_line, FRAME_SAMPLES, FRAME_SIZE, HEIGHT, LINE_HEADER_SIZE, LINE_ID_MASK,
    LINE_SIZE, SAMPLE_MASK, WIDTH,
};
