//! Mixer context: owns the physical output stream and the slot pool

use crate::backend::{Backend, BackendStream};
use crate::error::{BackendError, LwError, Result};
use crate::mixer::{MixerCounters, MixerStats, MixingEngine};
use crate::pool::{DataCallback, PoolStats, SlotPool, StateCallback};
use crate::stream::LwStream;
use crate::types::{MixerConfig, StreamParams, StreamState, MAX_LATENCY_MS, MIN_LATENCY_MS};
use std::sync::Arc;

/// Entry point of the mixer
///
/// Opens one physical output stream at a fixed format and keeps it running
/// for the lifetime of the context. Lightweight streams created through
/// [`Context::stream_init`] are mixed into it.
pub struct Context {
    name: String,
    config: MixerConfig,
    pool: Arc<SlotPool>,
    counters: Arc<MixerCounters>,
    backend: Option<Box<dyn Backend>>,
    backend_name: &'static str,
    stream: Option<Box<dyn BackendStream>>,
}

impl Context {
    /// Open the output at the default fixed format
    pub fn init(name: &str, backend: Box<dyn Backend>) -> Result<Self> {
        Self::init_with_config(name, backend, MixerConfig::default())
    }

    /// Open the output with an explicit configuration
    ///
    /// Anything built before a failure is torn down before returning.
    pub fn init_with_config(
        name: &str,
        mut backend: Box<dyn Backend>,
        config: MixerConfig,
    ) -> Result<Self> {
        if !config.params.format.is_float() || config.params.channels == 0 {
            return Err(LwError::Error(format!(
                "cannot mix into output format {}",
                config.params
            )));
        }

        let backend_name = backend.name();
        if let Err(err) = backend.open(name) {
            log::warn!("Backend '{}' failed to open: {}", backend_name, err);
            return Err(err.into());
        }

        let mut context = Context {
            name: name.to_string(),
            config,
            pool: Arc::new(SlotPool::new()),
            counters: Arc::new(MixerCounters::default()),
            backend: Some(backend),
            backend_name,
            stream: None,
        };

        // Early returns from here on drop `context`, which closes what exists
        let engine = MixingEngine::new(
            context.pool.clone(),
            context.counters.clone(),
            config.params,
            config.latency_ms,
        );
        let stream_name = format!("{} - output", name);
        let stream = context
            .backend
            .as_mut()
            .ok_or_else(|| LwError::Error("backend missing".to_string()))?
            .stream_init(&stream_name, config.params, config.latency_ms, Box::new(engine))
            .map_err(|err| context_failure(name, err))?;
        let stream = context.stream.insert(stream);

        stream.start().map_err(|err| context_failure(name, err))?;

        log::info!(
            "Mixer context '{}' opened on '{}' backend: {}, {} ms",
            name,
            backend_name,
            config.params,
            config.latency_ms
        );
        Ok(context)
    }

    /// Create a lightweight stream
    ///
    /// `params` must equal the output format; no conversion is done.
    pub fn stream_init<D, S>(
        &self,
        name: &str,
        params: StreamParams,
        latency_ms: u32,
        data_callback: D,
        state_callback: S,
    ) -> Result<LwStream>
    where
        D: FnMut(&mut [f32]) -> usize + Send + 'static,
        S: FnMut(StreamState) + Send + 'static,
    {
        self.stream_init_boxed(
            name,
            params,
            latency_ms,
            Box::new(data_callback),
            Some(Box::new(state_callback)),
        )
    }

    /// [`Context::stream_init`] with pre-boxed callbacks
    pub fn stream_init_boxed(
        &self,
        name: &str,
        params: StreamParams,
        latency_ms: u32,
        data_callback: DataCallback,
        state_callback: Option<StateCallback>,
    ) -> Result<LwStream> {
        if params != self.config.params {
            log::warn!(
                "Stream '{}' rejected: format {} does not match output {}",
                name,
                params,
                self.config.params
            );
            return Err(LwError::InvalidFormat {
                expected: self.config.params,
                got: params,
            });
        }

        if !(MIN_LATENCY_MS..=MAX_LATENCY_MS).contains(&latency_ms) {
            log::warn!("Stream '{}' rejected: latency {} ms", name, latency_ms);
            return Err(LwError::InvalidLatency(latency_ms));
        }

        let Some(index) = self.pool.claim(data_callback, state_callback) else {
            log::warn!("Stream '{}' rejected: no free slot", name);
            return Err(LwError::PoolExhausted {
                capacity: self.pool.capacity(),
            });
        };

        log::debug!("Stream '{}' created in slot {}", name, index);
        Ok(LwStream::new(self.pool.clone(), index, name, latency_ms))
    }

    /// Stop and close the output stream, then release the backend
    pub fn destroy(self) {}

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    pub fn params(&self) -> StreamParams {
        self.config.params
    }

    pub fn bytes_per_frame(&self) -> usize {
        self.config.params.bytes_per_frame()
    }

    pub fn latency_ms(&self) -> u32 {
        self.config.latency_ms
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    pub fn mixer_stats(&self) -> MixerStats {
        self.counters.snapshot()
    }
}

fn context_failure(name: &str, err: BackendError) -> LwError {
    log::warn!("Mixer context '{}' failed to open output: {}", name, err);
    err.into()
}

impl Drop for Context {
    fn drop(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(err) = stream.stop() {
                log::warn!("Mixer context '{}': {}", self.name, err);
            }
            drop(stream);
        }

        if let Some(mut backend) = self.backend.take() {
            backend.close();
            log::info!("Mixer context '{}' closed", self.name);
        }
    }
}
