//! Slow-scan television (SSTV) encoding and decoding.
//!
//! The encoder turns a raster image into a sequence of audio tones (VIS
//! header, then per-line pixel tones between 1500 and 2300 Hz, separated by
//! 1200 Hz sync pulses). The decoder runs the other way: it locates the VIS
//! header in a sample buffer, acquires line sync, demodulates every scan
//! line with short-window Goertzel estimators and rebuilds an RGBA image.
//!
//! # References
//!
//! - <http://lionel.cordesses.free.fr/gpages/sstv.html>
//! - <http://www.barberdsp.com/downloads/Dayton%20Paper.pdf>
//! - <https://web.archive.org/web/20120313215600/http://lionel.cordesses.free.fr/gpages/Cordesses.pdf>

pub mod color;
pub mod decoder;
pub mod encoder;
pub mod goertzel;
pub mod image;
pub mod modes;
pub mod quality;
pub mod synth;
pub mod util;
pub mod wave;

#[cfg(test)]
mod tests;

pub use decoder::{
    DecodeError,
    DecodeResult,
    Diagnostics,
    SstvDecoder,
};
pub use encoder::{
    EncodeError,
    SstvEncoder,
};

pub const LEADER_TONE: f32 = 1900.0;
pub const LEADER_TIME: f32 = 0.300;

pub const LEADER_BREAK_TIME: f32 = 0.010;

pub const VIS_BIT_TIME: f32 = 0.030;
pub const VIS_LOW_TONE: f32 = 1300.0;
pub const VIS_HIGH_TONE: f32 = 1100.0;

// line sync, leader break, vis stop
pub const SYNC_TONE: f32 = 1200.0;

pub const PORCH_TONE: f32 = 1500.0;

pub const CHANNEL_LOW_TONE: f32 = 1500.0;
pub const CHANNEL_HIGH_TONE: f32 = 2300.0;

/// Sample rate the toolchain is normally run at. Other rates work; every
/// timing constant is specified in seconds.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;
