//! Output backend abstraction
//!
//! The mixer needs exactly one physical output stream from a backend:
//! open it at a fixed format, start/stop it, and close it. The backend
//! drives the stream by calling [`OutputCallback::fill`] from its audio
//! thread with an interleaved buffer that must be filled before returning.
//!
//! ```text
//! ┌──────────────┐   fill(&mut [f32])   ┌───────────────┐
//! │   Backend    │ ───────────────────▶ │ MixingEngine  │
//! │ audio thread │ ◀─────────────────── │ (slot pool)   │
//! └──────────────┘      frames          └───────────────┘
//! ```

use crate::error::BackendError;
use crate::types::{StreamParams, StreamState};

pub mod clock;
pub mod manual;

pub use clock::ClockBackend;
pub use manual::{ManualBackend, ManualDriver};

/// Receiver of backend pull requests, implemented by the mixing engine
pub trait OutputCallback: Send {
    /// Fill `output` (interleaved, `frames * channels` samples).
    ///
    /// Returns the number of frames produced. A value below the requested
    /// count signals end of stream.
    fn fill(&mut self, output: &mut [f32]) -> usize;

    /// Backend stream state change notification
    fn state_changed(&mut self, state: StreamState);
}

/// A physical output stream. Dropping it closes the stream.
pub trait BackendStream: Send {
    fn start(&mut self) -> Result<(), BackendError>;
    fn stop(&mut self) -> Result<(), BackendError>;
}

/// An audio backend able to open one output stream
pub trait Backend: Send {
    /// Backend name (e.g. "clock", "manual")
    fn name(&self) -> &'static str;

    /// Library/application scoped initialization
    fn open(&mut self, context_name: &str) -> Result<(), BackendError>;

    /// Open an output stream that pulls from `callback`
    fn stream_init(
        &mut self,
        stream_name: &str,
        params: StreamParams,
        latency_ms: u32,
        callback: Box<dyn OutputCallback>,
    ) -> Result<Box<dyn BackendStream>, BackendError>;

    /// Release backend resources. Streams are already closed.
    fn close(&mut self);
}
