//! Caller-driven backend
//!
//! Nothing runs on its own: every pull happens when the paired
//! [`ManualDriver`] asks for frames. Used for deterministic tests and
//! offline rendering.

use super::{Backend, BackendStream, OutputCallback};
use crate::error::BackendError;
use crate::types::{StreamParams, StreamState};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Shared {
    callback: Mutex<Option<Box<dyn OutputCallback>>>,
    params: Mutex<Option<StreamParams>>,
    opened: AtomicBool,
    started: AtomicBool,
    closed: AtomicBool,
}

/// Backend half, handed to the context
pub struct ManualBackend {
    shared: Arc<Shared>,
}

/// Driver half, kept by the caller to render frames
#[derive(Clone)]
pub struct ManualDriver {
    shared: Arc<Shared>,
}

impl ManualBackend {
    pub fn new() -> (Self, ManualDriver) {
        let shared = Arc::new(Shared::default());
        (
            ManualBackend {
                shared: shared.clone(),
            },
            ManualDriver { shared },
        )
    }
}

impl Backend for ManualBackend {
    fn name(&self) -> &'static str {
        "manual"
    }

    fn open(&mut self, _context_name: &str) -> Result<(), BackendError> {
        self.shared.opened.store(true, Ordering::Release);
        Ok(())
    }

    fn stream_init(
        &mut self,
        _stream_name: &str,
        params: StreamParams,
        _latency_ms: u32,
        callback: Box<dyn OutputCallback>,
    ) -> Result<Box<dyn BackendStream>, BackendError> {
        let mut slot = self.shared.callback.lock();
        if slot.is_some() {
            return Err(BackendError::StreamOpen(
                "manual backend supports one stream".to_string(),
            ));
        }
        *slot = Some(callback);
        *self.shared.params.lock() = Some(params);

        Ok(Box::new(ManualStream {
            shared: self.shared.clone(),
        }))
    }

    fn close(&mut self) {
        self.shared.closed.store(true, Ordering::Release);
    }
}

struct ManualStream {
    shared: Arc<Shared>,
}

impl ManualStream {
    fn notify(&self, state: StreamState) {
        if let Some(callback) = self.shared.callback.lock().as_mut() {
            callback.state_changed(state);
        }
    }
}

impl BackendStream for ManualStream {
    fn start(&mut self) -> Result<(), BackendError> {
        if !self.shared.started.swap(true, Ordering::AcqRel) {
            self.notify(StreamState::Started);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        if self.shared.started.swap(false, Ordering::AcqRel) {
            self.notify(StreamState::Stopped);
        }
        Ok(())
    }
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        self.shared.started.store(false, Ordering::Release);
        self.shared.callback.lock().take();
        self.shared.params.lock().take();
    }
}

impl ManualDriver {
    /// Render `frames` frames. `None` unless a stream is open and started.
    pub fn render(&self, frames: usize) -> Option<Vec<f32>> {
        let params = self.params()?;
        let mut buffer = vec![0.0f32; frames * params.channels as usize];
        self.render_into(&mut buffer)?;
        Some(buffer)
    }

    /// Render into a caller buffer, returning the frames produced
    pub fn render_into(&self, output: &mut [f32]) -> Option<usize> {
        if !self.shared.started.load(Ordering::Acquire) {
            return None;
        }
        let mut callback = self.shared.callback.lock();
        callback.as_mut().map(|cb| cb.fill(output))
    }

    /// Report a device failure to the open stream, as a sound card would
    ///
    /// The stream stays open; later `render` calls still pull.
    pub fn fail(&self) {
        if let Some(callback) = self.shared.callback.lock().as_mut() {
            callback.state_changed(StreamState::Error);
        }
    }

    pub fn params(&self) -> Option<StreamParams> {
        *self.shared.params.lock()
    }

    pub fn is_open(&self) -> bool {
        self.shared.opened.load(Ordering::Acquire)
    }

    pub fn is_started(&self) -> bool {
        self.shared.started.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    pub fn has_stream(&self) -> bool {
        self.shared.callback.lock().is_some()
    }
}
