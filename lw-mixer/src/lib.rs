//! Lightweight stream mixer
//!
//! Virtualizes one physical output stream into a fixed pool of logical
//! ("lightweight") streams whose samples are summed into the device buffer
//! on every backend callback.
//!
//! Key pieces:
//! - Fixed 16-slot pool with per-slot atomic lifecycle; the audio thread never blocks
//! - Saturating mix kernel with AVX SIMD
//! - Pluggable output backend (clocked thread, or caller-driven)
//!
//! ```no_run
//! use lw_mixer::{ClockBackend, Context, StreamParams};
//!
//! let context = Context::init("example", Box::new(ClockBackend::new()))?;
//! let mut phase = 0.0f32;
//! let stream = context.stream_init(
//!     "tone",
//!     StreamParams::output(),
//!     100,
//!     move |buffer: &mut [f32]| {
//!         for frame in buffer.chunks_mut(2) {
//!             let sample = (phase * std::f32::consts::TAU).sin() * 0.5;
//!             frame[0] = sample;
//!             frame[1] = sample;
//!             phase = (phase + 440.0 / 44100.0).fract();
//!         }
//!         buffer.len() / 2
//!     },
//!     |state| println!("tone: {:?}", state),
//! )?;
//! stream.start();
//! # Ok::<(), lw_mixer::LwError>(())
//! ```

pub mod backend;
pub mod clamping;
pub mod context;
pub mod error;
pub mod mixer;
pub mod pool;
pub mod stream;
pub mod types;

pub use backend::*;
pub use clamping::*;
pub use context::*;
pub use error::*;
pub use mixer::*;
pub use pool::*;
pub use stream::*;
pub use types::*;
