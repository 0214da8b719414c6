//! LW Mixer FFI - C Foreign Function Interface
//!
//! C API for the lightweight stream mixer: opaque context/stream handles,
//! integer result codes, and C data/state callbacks carrying a user pointer.

use libc::{c_char, c_int, c_long, c_uint, c_void};
use std::ffi::CStr;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Arc;

use lw_mixer::{
    ClockBackend, Context, DataCallback, LwStream, SampleFormat, StateCallback, StreamParams,
    StreamState,
};

pub const LW_OK: c_int = lw_mixer::OK;
pub const LW_ERROR: c_int = lw_mixer::ERROR;
pub const LW_ERROR_INVALID_FORMAT: c_int = lw_mixer::ERROR_INVALID_FORMAT;

pub const LW_SAMPLE_S16LE: c_uint = SampleFormat::S16LE as c_uint;
pub const LW_SAMPLE_S16BE: c_uint = SampleFormat::S16BE as c_uint;
pub const LW_SAMPLE_FLOAT32LE: c_uint = SampleFormat::Float32LE as c_uint;
pub const LW_SAMPLE_FLOAT32BE: c_uint = SampleFormat::Float32BE as c_uint;

pub const LW_STATE_STARTED: c_int = StreamState::Started as c_int;
pub const LW_STATE_STOPPED: c_int = StreamState::Stopped as c_int;
pub const LW_STATE_DRAINED: c_int = StreamState::Drained as c_int;
pub const LW_STATE_ERROR: c_int = StreamState::Error as c_int;

/// Opaque handle to a mixer Context (C-compatible)
pub struct LwMixer {
    _private: [u8; 0],
}

/// Opaque handle to a lightweight stream (C-compatible)
pub struct LwMixerStream {
    _private: [u8; 0],
}

/// C-compatible stream format
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct LwStreamParams {
    pub format: c_uint,
    pub rate: c_uint,
    pub channels: c_uint,
}

/// Fill `buffer` with `nframes` interleaved frames; return frames written
pub type LwDataCallback = Option<
    unsafe extern "C" fn(
        stream: *mut LwMixerStream,
        user_ptr: *mut c_void,
        buffer: *mut c_void,
        nframes: c_long,
    ) -> c_long,
>;

/// Receive one of the `LW_STATE_*` values
pub type LwStateCallback =
    Option<unsafe extern "C" fn(stream: *mut LwMixerStream, user_ptr: *mut c_void, state: c_int)>;

/// C user pointer carried into the audio thread
#[derive(Clone, Copy)]
struct UserPtr(*mut c_void);

// The C caller owns the pointee and its thread-safety contract
unsafe impl Send for UserPtr {}

impl UserPtr {
    fn get(self) -> *mut c_void {
        self.0
    }
}

/// Hand a Rust-built context to C callers
pub fn lw_context_into_raw(context: Context) -> *mut LwMixer {
    Box::into_raw(Box::new(context)) as *mut LwMixer
}

unsafe fn name_from(raw: *const c_char) -> String {
    if raw.is_null() {
        String::new()
    } else {
        CStr::from_ptr(raw).to_string_lossy().into_owned()
    }
}

// ============================================================================
// CONTEXT API
// ============================================================================

/// Create a context on the software-clocked output backend
///
/// # Safety
/// `context` must be a valid pointer to write the handle to. `context_name`
/// must be null or a NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn lw_init(context: *mut *mut LwMixer, context_name: *const c_char) -> c_int {
    if context.is_null() {
        return LW_ERROR;
    }

    let name = name_from(context_name);
    match Context::init(&name, Box::new(ClockBackend::new())) {
        Ok(ctx) => {
            *context = lw_context_into_raw(ctx);
            LW_OK
        }
        Err(err) => {
            log::error!("lw_init '{}' failed: {}", name, err);
            *context = ptr::null_mut();
            err.code()
        }
    }
}

/// Destroy a context, stopping the output stream
///
/// # Safety
/// `context` must come from `lw_init` and not be destroyed already.
#[no_mangle]
pub unsafe extern "C" fn lw_destroy(context: *mut LwMixer) {
    if !context.is_null() {
        let _ = Box::from_raw(context as *mut Context);
    }
}

// ============================================================================
// STREAM API
// ============================================================================

/// Create a lightweight stream
///
/// # Safety
/// `context` must be a live context, `stream` a valid pointer to write the
/// handle to, and `stream_name` null or NUL-terminated. The callbacks are
/// invoked from the audio thread with `user_ptr`.
#[no_mangle]
pub unsafe extern "C" fn lw_stream_init(
    context: *mut LwMixer,
    stream: *mut *mut LwMixerStream,
    stream_name: *const c_char,
    stream_params: LwStreamParams,
    latency: c_uint,
    data_callback: LwDataCallback,
    state_callback: LwStateCallback,
    user_ptr: *mut c_void,
) -> c_int {
    if context.is_null() || stream.is_null() {
        return LW_ERROR;
    }
    let Some(data_fn) = data_callback else {
        return LW_ERROR;
    };
    let Some(format) = SampleFormat::from_raw(stream_params.format) else {
        return LW_ERROR_INVALID_FORMAT;
    };

    let ctx = &*(context as *const Context);
    let name = name_from(stream_name);
    let params = StreamParams::new(format, stream_params.rate, stream_params.channels);
    let channels = (stream_params.channels as usize).max(1);
    let user = UserPtr(user_ptr);

    // Filled in once the handle exists; no callback runs before `start`
    let handle = Arc::new(AtomicPtr::<LwMixerStream>::new(ptr::null_mut()));

    let data_handle = handle.clone();
    let data: DataCallback = Box::new(move |buffer: &mut [f32]| {
        let frames = buffer.len() / channels;
        let got = unsafe {
            data_fn(
                data_handle.load(Ordering::Acquire),
                user.get(),
                buffer.as_mut_ptr() as *mut c_void,
                frames as c_long,
            )
        };
        // Negative results are errors; treat as end of stream
        got.max(0) as usize
    });

    let state = state_callback.map(|state_fn| {
        let state_handle = handle.clone();
        Box::new(move |state: StreamState| unsafe {
            state_fn(
                state_handle.load(Ordering::Acquire),
                user.get(),
                state as c_int,
            )
        }) as StateCallback
    });

    match ctx.stream_init_boxed(&name, params, latency, data, state) {
        Ok(lw) => {
            let raw = Box::into_raw(Box::new(lw)) as *mut LwMixerStream;
            handle.store(raw, Ordering::Release);
            *stream = raw;
            LW_OK
        }
        Err(err) => {
            *stream = ptr::null_mut();
            err.code()
        }
    }
}

/// Destroy a stream, waiting for an in-flight pull of it to finish
///
/// # Safety
/// `stream` must come from `lw_stream_init` and not be destroyed already.
#[no_mangle]
pub unsafe extern "C" fn lw_stream_destroy(stream: *mut LwMixerStream) {
    if !stream.is_null() {
        let _ = Box::from_raw(stream as *mut LwStream);
    }
}

/// Start playback
///
/// # Safety
/// `stream` must be a live stream handle.
#[no_mangle]
pub unsafe extern "C" fn lw_stream_start(stream: *mut LwMixerStream) -> c_int {
    if stream.is_null() {
        return LW_ERROR;
    }

    let lw = &*(stream as *const LwStream);
    lw.start();
    LW_OK
}

/// Stop playback
///
/// # Safety
/// `stream` must be a live stream handle.
#[no_mangle]
pub unsafe extern "C" fn lw_stream_stop(stream: *mut LwMixerStream) -> c_int {
    if stream.is_null() {
        return LW_ERROR;
    }

    let lw = &*(stream as *const LwStream);
    lw.stop();
    LW_OK
}

/// Get the stream playback position in frames
///
/// # Safety
/// `stream` must be a live stream handle; `position` a valid pointer.
#[no_mangle]
pub unsafe extern "C" fn lw_stream_get_position(
    stream: *mut LwMixerStream,
    position: *mut u64,
) -> c_int {
    if stream.is_null() || position.is_null() {
        return LW_ERROR;
    }

    let lw = &*(stream as *const LwStream);
    *position = lw.position();
    LW_OK
}

// ============================================================================
// UTILITY FUNCTIONS
// ============================================================================

/// Get library version string
#[no_mangle]
pub extern "C" fn lw_version() -> *const c_char {
    "0.1.0\0".as_ptr() as *const c_char
}

/// Number of stream slots per context
#[no_mangle]
pub extern "C" fn lw_max_streams() -> c_uint {
    lw_mixer::MAX_STREAMS as c_uint
}
