//! Mixing engine: the physical stream's pull callback
//!
//! One pass per backend request: silence the output, pull every running
//! slot in pool order into a scratch buffer, fold each into the output with
//! saturation, report the full frame count back to the backend.

use crate::backend::OutputCallback;
use crate::clamping::mix_into;
use crate::pool::{Pull, SlotPool};
use crate::types::{StreamParams, StreamState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters updated by the audio thread, read from anywhere
#[derive(Debug, Default)]
pub(crate) struct MixerCounters {
    passes: AtomicU64,
    frames_mixed: AtomicU64,
    short_reads: AtomicU64,
    contended: AtomicU64,
}

impl MixerCounters {
    pub(crate) fn snapshot(&self) -> MixerStats {
        MixerStats {
            passes: self.passes.load(Ordering::Relaxed),
            frames_mixed: self.frames_mixed.load(Ordering::Relaxed),
            short_reads: self.short_reads.load(Ordering::Relaxed),
            contended: self.contended.load(Ordering::Relaxed),
        }
    }
}

/// Pull callback implementation for the shared output stream
pub struct MixingEngine {
    pool: Arc<SlotPool>,
    counters: Arc<MixerCounters>,
    channels: usize,
    scratch: Vec<f32>,
}

impl MixingEngine {
    /// Create an engine for `params`, with scratch space for `latency_ms`
    pub(crate) fn new(
        pool: Arc<SlotPool>,
        counters: Arc<MixerCounters>,
        params: StreamParams,
        latency_ms: u32,
    ) -> Self {
        let channels = params.channels.max(1) as usize;
        let scratch = vec![0.0f32; params.frames_for_latency(latency_ms) * channels];

        Self {
            pool,
            counters,
            channels,
            scratch,
        }
    }

    /// Run one mixing pass over `output`, returning the frames produced
    pub fn mix(&mut self, output: &mut [f32]) -> usize {
        let channels = self.channels;
        let frames = output.len() / channels;
        let samples = frames * channels;
        let output = &mut output[..samples];

        output.fill(0.0);

        // Only grows when the backend asks for more than the latency hint
        if self.scratch.len() < samples {
            self.scratch.resize(samples, 0.0);
        }
        let scratch = &mut self.scratch[..samples];

        for index in 0..self.pool.capacity() {
            match self.pool.pull(index, scratch, channels) {
                Pull::Skipped => {}
                Pull::Contended => {
                    self.counters.contended.fetch_add(1, Ordering::Relaxed);
                }
                Pull::Full(_) => mix_into(output, scratch),
                Pull::Short(_) => {
                    self.counters.short_reads.fetch_add(1, Ordering::Relaxed);
                    mix_into(output, scratch);
                }
            }
        }

        self.counters.passes.fetch_add(1, Ordering::Relaxed);
        self.counters
            .frames_mixed
            .fetch_add(frames as u64, Ordering::Relaxed);

        frames
    }
}

impl OutputCallback for MixingEngine {
    fn fill(&mut self, output: &mut [f32]) -> usize {
        self.mix(output)
    }

    fn state_changed(&mut self, state: StreamState) {
        log::debug!("Output stream state: {:?}", state);

        // Start/stop of the shared output is not a per-stream event
        if state == StreamState::Error {
            log::error!("Output stream failed; notifying lightweight streams");
            self.pool.broadcast(StreamState::Error);
        }
    }
}

/// Mixer statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MixerStats {
    pub passes: u64,
    pub frames_mixed: u64,
    pub short_reads: u64,
    pub contended: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{DataCallback, StateCallback};

    fn engine(pool: &Arc<SlotPool>) -> (MixingEngine, Arc<MixerCounters>) {
        let counters = Arc::new(MixerCounters::default());
        let engine = MixingEngine::new(pool.clone(), counters.clone(), StreamParams::output(), 10);
        (engine, counters)
    }

    fn stereo(left: f32, right: f32) -> DataCallback {
        Box::new(move |buffer: &mut [f32]| {
            for frame in buffer.chunks_mut(2) {
                frame[0] = left;
                frame[1] = right;
            }
            buffer.len() / 2
        })
    }

    #[test]
    fn test_idle_pass_is_silent() {
        let pool = Arc::new(SlotPool::new());
        let (mut engine, counters) = engine(&pool);

        let mut output = vec![0.7f32; 512];
        assert_eq!(engine.mix(&mut output), 256);
        assert!(output.iter().all(|&s| s == 0.0));

        let stats = counters.snapshot();
        assert_eq!(stats.passes, 1);
        assert_eq!(stats.frames_mixed, 256);
    }

    #[test]
    fn test_two_sources_sum() {
        let pool = Arc::new(SlotPool::new());
        let a = pool.claim(stereo(0.25, -0.5), None).unwrap();
        let b = pool.claim(stereo(0.5, 0.125), None).unwrap();
        pool.start(a);
        pool.start(b);

        let (mut engine, _) = engine(&pool);
        let mut output = vec![0.0f32; 64];
        engine.mix(&mut output);

        for frame in output.chunks(2) {
            assert_eq!(frame[0], 0.75);
            assert_eq!(frame[1], -0.375);
        }
    }

    #[test]
    fn test_stopped_source_not_pulled() {
        let pool = Arc::new(SlotPool::new());
        let playing = pool.claim(stereo(0.3, 0.6), None).unwrap();
        let calls = Arc::new(AtomicU64::new(0));
        let counted = calls.clone();
        let _stopped = pool
            .claim(
                Box::new(move |buffer: &mut [f32]| {
                    counted.fetch_add(1, Ordering::Relaxed);
                    buffer.fill(0.5);
                    buffer.len() / 2
                }),
                None,
            )
            .unwrap();
        pool.start(playing);

        let (mut engine, _) = engine(&pool);
        let mut output = vec![0.0f32; 32];
        engine.mix(&mut output);

        assert_eq!(calls.load(Ordering::Relaxed), 0);
        for frame in output.chunks(2) {
            assert_eq!(frame[0], 0.3);
            assert_eq!(frame[1], 0.6);
        }
    }

    #[test]
    fn test_saturation() {
        let pool = Arc::new(SlotPool::new());
        for _ in 0..2 {
            let index = pool.claim(stereo(0.9, -0.9), None).unwrap();
            pool.start(index);
        }

        let (mut engine, _) = engine(&pool);
        let mut output = vec![0.0f32; 32];
        engine.mix(&mut output);

        for frame in output.chunks(2) {
            assert_eq!(frame[0], 1.0);
            assert_eq!(frame[1], -1.0);
        }
    }

    #[test]
    fn test_short_read_zero_pads_and_drains() {
        let pool = Arc::new(SlotPool::new());
        let index = pool
            .claim(
                Box::new(|buffer: &mut [f32]| {
                    buffer[..4].fill(0.5);
                    2
                }),
                None,
            )
            .unwrap();
        pool.start(index);

        let (mut engine, counters) = engine(&pool);
        let mut output = vec![0.0f32; 16];
        assert_eq!(engine.mix(&mut output), 8);

        assert_eq!(&output[..4], &[0.5, 0.5, 0.5, 0.5]);
        assert!(output[4..].iter().all(|&s| s == 0.0));
        assert!(!pool.is_running(index));
        assert_eq!(counters.snapshot().short_reads, 1);

        // Drained slot is no longer pulled
        engine.mix(&mut output);
        assert!(output.iter().all(|&s| s == 0.0));
        assert_eq!(counters.snapshot().short_reads, 1);
    }

    #[test]
    fn test_scratch_grows_for_large_requests() {
        let pool = Arc::new(SlotPool::new());
        let index = pool.claim(stereo(0.1, 0.2), None).unwrap();
        pool.start(index);

        let (mut engine, _) = engine(&pool);
        let frames = StreamParams::output().frames_for_latency(10) * 3;
        let mut output = vec![0.0f32; frames * 2];

        assert_eq!(engine.mix(&mut output), frames);
        assert!(output.chunks(2).all(|f| f[0] == 0.1 && f[1] == 0.2));
        assert_eq!(pool.position(index), frames as u64);
    }

    #[test]
    fn test_output_error_reaches_streams() {
        let pool = Arc::new(SlotPool::new());
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = seen.clone();
        let events: StateCallback = Box::new(move |state: StreamState| sink.lock().push(state));
        let index = pool.claim(stereo(0.1, 0.1), Some(events)).unwrap();
        pool.start(index);

        let (mut engine, _) = engine(&pool);
        engine.state_changed(StreamState::Started);
        engine.state_changed(StreamState::Error);

        assert_eq!(*seen.lock(), vec![StreamState::Started, StreamState::Error]);
    }

    #[test]
    fn test_trailing_partial_frame_ignored() {
        let pool = Arc::new(SlotPool::new());
        let (mut engine, _) = engine(&pool);

        let mut output = vec![0.4f32; 9];
        assert_eq!(engine.mix(&mut output), 4);
        assert!(output[..8].iter().all(|&s| s == 0.0));
    }
}
