//! Software-clocked output backend
//!
//! Stands in for a sound card: a dedicated thread requests one period of
//! frames every `period / rate` seconds and hands the rendered buffer to any
//! connected taps. Without taps the audio is discarded.

use super::{Backend, BackendStream, OutputCallback};
use crate::error::BackendError;
use crate::types::{StreamParams, StreamState};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const TAP_DEPTH: usize = 4;

type Taps = Arc<Mutex<Vec<Sender<Vec<f32>>>>>;

/// Backend whose output stream is paced by the system clock
pub struct ClockBackend {
    period_frames: Option<usize>,
    taps: Taps,
    periods: Arc<AtomicU64>,
}

impl ClockBackend {
    pub fn new() -> Self {
        Self {
            period_frames: None,
            taps: Arc::new(Mutex::new(Vec::new())),
            periods: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Use a fixed callback size instead of half the latency hint
    pub fn with_period(mut self, frames: usize) -> Self {
        self.period_frames = Some(frames.max(1));
        self
    }

    /// Connect a tap receiving every rendered period
    ///
    /// A slow tap misses periods; a dropped receiver is disconnected.
    pub fn connect_tap(&self) -> Receiver<Vec<f32>> {
        let (tx, rx) = channel::bounded(TAP_DEPTH);
        self.taps.lock().push(tx);
        rx
    }

    /// Number of periods rendered so far
    pub fn periods(&self) -> u64 {
        self.periods.load(Ordering::Relaxed)
    }

    /// Shared period counter, readable after the backend moves into a context
    pub fn period_counter(&self) -> Arc<AtomicU64> {
        self.periods.clone()
    }
}

impl Default for ClockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for ClockBackend {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn open(&mut self, context_name: &str) -> Result<(), BackendError> {
        log::debug!("Clock backend opened for {}", context_name);
        Ok(())
    }

    fn stream_init(
        &mut self,
        stream_name: &str,
        params: StreamParams,
        latency_ms: u32,
        callback: Box<dyn OutputCallback>,
    ) -> Result<Box<dyn BackendStream>, BackendError> {
        if params.rate == 0 || params.channels == 0 {
            return Err(BackendError::StreamOpen(format!(
                "unusable stream format {}",
                params
            )));
        }

        let period = self
            .period_frames
            .unwrap_or_else(|| params.frames_for_latency(latency_ms / 2));

        Ok(Box::new(ClockStream {
            name: stream_name.to_string(),
            params,
            period,
            callback: Arc::new(Mutex::new(callback)),
            taps: self.taps.clone(),
            periods: self.periods.clone(),
            running: Arc::new(AtomicBool::new(false)),
            thread_handle: None,
        }))
    }

    fn close(&mut self) {
        self.taps.lock().clear();
    }
}

struct ClockStream {
    name: String,
    params: StreamParams,
    period: usize,
    callback: Arc<Mutex<Box<dyn OutputCallback>>>,
    taps: Taps,
    periods: Arc<AtomicU64>,
    running: Arc<AtomicBool>,
    thread_handle: Option<JoinHandle<()>>,
}

impl ClockStream {
    fn spawn_output_thread(&self) -> std::io::Result<JoinHandle<()>> {
        let callback = self.callback.clone();
        let taps = self.taps.clone();
        let periods = self.periods.clone();
        let running = self.running.clone();
        let channels = self.params.channels as usize;
        let period = self.period;
        let interval = Duration::from_secs_f64(period as f64 / self.params.rate as f64);

        thread::Builder::new()
            .name(format!("lw-clock-{}", self.name))
            .spawn(move || {
                let mut buffer = vec![0.0f32; period * channels];
                let mut deadline = Instant::now();

                callback.lock().state_changed(StreamState::Started);

                while running.load(Ordering::Acquire) {
                    buffer.fill(0.0);
                    let frames = callback.lock().fill(&mut buffer).min(period);
                    periods.fetch_add(1, Ordering::Relaxed);

                    let mut taps = taps.lock();
                    if !taps.is_empty() {
                        let rendered = &buffer[..frames * channels];
                        taps.retain(|tap| {
                            !matches!(
                                tap.try_send(rendered.to_vec()),
                                Err(TrySendError::Disconnected(_))
                            )
                        });
                    }
                    drop(taps);

                    deadline += interval;
                    let now = Instant::now();
                    if deadline > now {
                        thread::sleep(deadline - now);
                    } else {
                        // Fell behind; resync instead of bursting
                        deadline = now;
                    }
                }

                callback.lock().state_changed(StreamState::Stopped);
                log::info!("Clock output thread exiting");
            })
    }
}

impl BackendStream for ClockStream {
    fn start(&mut self) -> Result<(), BackendError> {
        if self.thread_handle.is_some() {
            return Ok(());
        }

        self.running.store(true, Ordering::Release);
        match self.spawn_output_thread() {
            Ok(handle) => {
                self.thread_handle = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.running.store(false, Ordering::Release);
                Err(BackendError::Start(err.to_string()))
            }
        }
    }

    fn stop(&mut self) -> Result<(), BackendError> {
        self.running.store(false, Ordering::Release);

        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("Clock output thread for '{}' panicked", self.name);
                self.callback.lock().state_changed(StreamState::Error);
                return Err(BackendError::Stop("output thread panicked".to_string()));
            }
        }
        Ok(())
    }
}

impl Drop for ClockStream {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Constant(f32);

    impl OutputCallback for Constant {
        fn fill(&mut self, output: &mut [f32]) -> usize {
            output.fill(self.0);
            output.len() / 2
        }

        fn state_changed(&mut self, _state: StreamState) {}
    }

    #[test]
    fn test_clock_stream_delivers_periods() {
        let mut backend = ClockBackend::new().with_period(64);
        let rx = backend.connect_tap();

        let mut stream = backend
            .stream_init("test", StreamParams::output(), 100, Box::new(Constant(0.25)))
            .unwrap();
        stream.start().unwrap();

        let buffer = rx
            .recv_timeout(Duration::from_secs(2))
            .expect("clock thread should render a period");
        assert_eq!(buffer.len(), 128);
        assert!(buffer.iter().all(|&s| s == 0.25));

        stream.stop().unwrap();
        assert!(backend.periods() >= 1);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let mut backend = ClockBackend::new().with_period(32);
        let mut stream = backend
            .stream_init("test", StreamParams::output(), 100, Box::new(Constant(0.0)))
            .unwrap();

        stream.stop().unwrap();
        stream.start().unwrap();
        stream.start().unwrap();
        stream.stop().unwrap();
        stream.stop().unwrap();
    }

    #[test]
    fn test_rejects_empty_format() {
        let mut backend = ClockBackend::new();
        let params = StreamParams::new(crate::types::SampleFormat::FLOAT32NE, 0, 2);
        let result = backend.stream_init("test", params, 100, Box::new(Constant(0.0)));
        assert!(result.is_err());
    }
}
