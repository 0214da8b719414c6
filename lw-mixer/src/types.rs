//! Stream format and state types

use std::fmt;

/// Output sample rate of the shared physical stream (Hz)
pub const OUTPUT_RATE: u32 = 44100;

/// Output channel count of the shared physical stream
pub const OUTPUT_CHANNELS: u32 = 2;

/// Latency hint used when opening the physical stream (ms)
pub const OUTPUT_LATENCY_MS: u32 = 100;

/// Number of lightweight streams that can exist at once
pub const MAX_STREAMS: usize = 16;

/// Accepted latency hint range for lightweight streams (ms)
pub const MIN_LATENCY_MS: u32 = 1;
pub const MAX_LATENCY_MS: u32 = 2000;

/// Sample encoding
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    S16LE = 0,
    S16BE = 1,
    Float32LE = 2,
    Float32BE = 3,
}

impl SampleFormat {
    #[cfg(target_endian = "little")]
    pub const S16NE: Self = SampleFormat::S16LE;
    #[cfg(target_endian = "big")]
    pub const S16NE: Self = SampleFormat::S16BE;

    #[cfg(target_endian = "little")]
    pub const FLOAT32NE: Self = SampleFormat::Float32LE;
    #[cfg(target_endian = "big")]
    pub const FLOAT32NE: Self = SampleFormat::Float32BE;

    pub fn bytes_per_sample(self) -> usize {
        match self {
            SampleFormat::S16LE | SampleFormat::S16BE => 2,
            SampleFormat::Float32LE | SampleFormat::Float32BE => 4,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, SampleFormat::Float32LE | SampleFormat::Float32BE)
    }

    /// Map a raw C discriminant back to a format
    pub fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(SampleFormat::S16LE),
            1 => Some(SampleFormat::S16BE),
            2 => Some(SampleFormat::Float32LE),
            3 => Some(SampleFormat::Float32BE),
            _ => None,
        }
    }
}

/// Format descriptor of a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamParams {
    pub format: SampleFormat,
    pub rate: u32,
    pub channels: u32,
}

impl StreamParams {
    pub fn new(format: SampleFormat, rate: u32, channels: u32) -> Self {
        Self {
            format,
            rate,
            channels,
        }
    }

    /// The fixed format of the shared output stream.
    ///
    /// Not queried from hardware; every lightweight stream must match it.
    pub fn output() -> Self {
        Self::new(SampleFormat::FLOAT32NE, OUTPUT_RATE, OUTPUT_CHANNELS)
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.format.bytes_per_sample() * self.channels as usize
    }

    /// Frames covering `latency_ms` at this rate, never less than one
    pub fn frames_for_latency(&self, latency_ms: u32) -> usize {
        ((self.rate as u64 * latency_ms as u64) / 1000).max(1) as usize
    }
}

impl fmt::Display for StreamParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}Hz {}ch", self.format, self.rate, self.channels)
    }
}

/// Stream state notifications
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Started = 0,
    Stopped = 1,
    Drained = 2,
    Error = 3,
}

/// Context configuration
#[derive(Debug, Clone, Copy)]
pub struct MixerConfig {
    pub params: StreamParams,
    pub latency_ms: u32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            params: StreamParams::output(),
            latency_ms: OUTPUT_LATENCY_MS,
        }
    }
}
