//! Fixed-capacity pool of lightweight stream slots
//!
//! Each slot carries an atomic lifecycle word that both the client thread
//! and the audio thread read without locking. Callbacks sit behind per-slot
//! mutexes: the audio thread only ever `try_lock`s them, while `release`
//! takes both locks to wait out a pull or notification that is still running.
//!
//! A state callback may call back into the pool for its own slot (stop on
//! `Drained`, destroy on `Stopped`). Notifications raised from inside a state
//! callback are dropped rather than delivered re-entrantly.
//!
//! ```text
//! Free -> Claimed -> Idle <-> Running -> Drained
//!                      \________|__________|-----> Closing -> Free
//! ```

use crate::types::{StreamState, MAX_STREAMS};
use crossbeam::utils::CachePadded;
use parking_lot::{Mutex, ReentrantMutex};
use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

/// Pull callback: fill the interleaved slice, return the frames written
pub type DataCallback = Box<dyn FnMut(&mut [f32]) -> usize + Send>;

/// State callback: receives lifecycle notifications for one stream
pub type StateCallback = Box<dyn FnMut(StreamState) + Send>;

const FREE: u8 = 0;
const CLAIMED: u8 = 1;
const IDLE: u8 = 2;
const RUNNING: u8 = 3;
const DRAINED: u8 = 4;
const CLOSING: u8 = 5;

/// Lifecycle state of one slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Free,
    Claimed,
    Idle,
    Running,
    Drained,
    Closing,
}

impl SlotState {
    fn from_raw(raw: u8) -> Self {
        match raw {
            FREE => SlotState::Free,
            CLAIMED => SlotState::Claimed,
            IDLE => SlotState::Idle,
            RUNNING => SlotState::Running,
            DRAINED => SlotState::Drained,
            _ => SlotState::Closing,
        }
    }

}

/// Outcome of pulling one slot during a mixing pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pull {
    /// Slot is not running
    Skipped,
    /// Callback lock was held by another thread
    Contended,
    /// Callback produced a full buffer
    Full(usize),
    /// Callback came up short; tail zeroed and slot drained
    Short(usize),
}

/// State callback of one slot, plus a counter bumped on every release
#[derive(Default)]
struct Events {
    callback: Option<StateCallback>,
    generation: u64,
}

impl Events {
    fn install(events: &RefCell<Events>, callback: Option<StateCallback>) {
        events.borrow_mut().callback = callback;
    }

    fn retire(events: &RefCell<Events>) -> Option<StateCallback> {
        let mut events = events.borrow_mut();
        events.generation = events.generation.wrapping_add(1);
        events.callback.take()
    }

    /// Run the callback with no `RefCell` borrow held across it
    ///
    /// The callback is out of the cell while it runs, so a nested
    /// notification finds nothing to call. It goes back only if the slot
    /// was not released in the meantime.
    fn dispatch(events: &RefCell<Events>, state: StreamState) {
        let (callback, generation) = {
            let mut events = events.borrow_mut();
            (events.callback.take(), events.generation)
        };
        let Some(mut callback) = callback else {
            return;
        };

        callback(state);

        let mut events = events.borrow_mut();
        if events.generation == generation && events.callback.is_none() {
            events.callback = Some(callback);
        }
    }
}

struct Slot {
    state: AtomicU8,
    position: AtomicU64,
    data: Mutex<Option<DataCallback>>,
    events: ReentrantMutex<RefCell<Events>>,
}

impl Slot {
    fn new() -> Self {
        Self {
            state: AtomicU8::new(FREE),
            position: AtomicU64::new(0),
            data: Mutex::new(None),
            events: ReentrantMutex::new(RefCell::new(Events::default())),
        }
    }

    fn notify(&self, state: StreamState) {
        let guard = self.events.lock();
        Events::dispatch(&guard, state);
    }

    /// Audio-thread variant of `notify`; drops the event rather than block
    fn try_notify(&self, state: StreamState) {
        if let Some(guard) = self.events.try_lock() {
            Events::dispatch(&guard, state);
        }
    }
}

/// Pool of stream slots shared by the client API and the mixing engine
pub struct SlotPool {
    slots: [CachePadded<Slot>; MAX_STREAMS],
}

impl SlotPool {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| CachePadded::new(Slot::new())),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Claim the first free slot in index order
    ///
    /// Returns `None` when every slot is in use.
    pub fn claim(&self, data: DataCallback, events: Option<StateCallback>) -> Option<usize> {
        for (index, slot) in self.slots.iter().enumerate() {
            if slot
                .state
                .compare_exchange(FREE, CLAIMED, Ordering::AcqRel, Ordering::Relaxed)
                .is_ok()
            {
                *slot.data.lock() = Some(data);
                Events::install(&slot.events.lock(), events);
                slot.position.store(0, Ordering::Relaxed);
                slot.state.store(IDLE, Ordering::Release);
                return Some(index);
            }
        }

        None // Pool exhausted
    }

    /// Return a slot to the pool
    ///
    /// Blocks until a pull or notification of this slot that is already
    /// running on another thread has returned. Once this returns the old
    /// callbacks are gone and the slot can be claimed again. May be called
    /// from the slot's own state callback.
    pub fn release(&self, index: usize) {
        let slot = &self.slots[index];
        let prev = slot.state.swap(CLOSING, Ordering::AcqRel);
        debug_assert!(prev != FREE, "slot {} released twice", index);

        let data = slot.data.lock().take();
        let events = Events::retire(&slot.events.lock());
        slot.position.store(0, Ordering::Relaxed);
        slot.state.store(FREE, Ordering::Release);

        // User closures are dropped after the slot is reusable
        drop(data);
        drop(events);
    }

    /// Mark a slot running. Returns true if it was not running before.
    pub fn start(&self, index: usize) -> bool {
        let slot = &self.slots[index];
        let started = slot
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| match state {
                IDLE | DRAINED => Some(RUNNING),
                _ => None,
            })
            .is_ok();

        if started {
            slot.notify(StreamState::Started);
        }
        started
    }

    /// Mark a slot stopped. Returns true if it was running or drained.
    pub fn stop(&self, index: usize) -> bool {
        let slot = &self.slots[index];
        let stopped = slot
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| match state {
                RUNNING | DRAINED => Some(IDLE),
                _ => None,
            })
            .is_ok();

        if stopped {
            slot.notify(StreamState::Stopped);
        }
        stopped
    }

    /// Deliver `state` to every claimed slot, e.g. when the output device fails
    pub fn broadcast(&self, state: StreamState) {
        for slot in &self.slots {
            if matches!(slot.state.load(Ordering::Acquire), FREE | CLAIMED | CLOSING) {
                continue;
            }
            slot.notify(state);
        }
    }

    pub fn state(&self, index: usize) -> SlotState {
        SlotState::from_raw(self.slots[index].state.load(Ordering::Acquire))
    }

    pub fn is_running(&self, index: usize) -> bool {
        self.slots[index].state.load(Ordering::Acquire) == RUNNING
    }

    /// Frames of this slot consumed by the mixer since it was claimed
    pub fn position(&self, index: usize) -> u64 {
        self.slots[index].position.load(Ordering::Relaxed)
    }

    /// Pull one buffer from a running slot into `scratch`
    ///
    /// Called from the audio thread only. Never blocks.
    pub(crate) fn pull(&self, index: usize, scratch: &mut [f32], channels: usize) -> Pull {
        let slot = &self.slots[index];
        if slot.state.load(Ordering::Acquire) != RUNNING {
            return Pull::Skipped;
        }

        let Some(mut guard) = slot.data.try_lock() else {
            return Pull::Contended;
        };

        // The slot may have been stopped or recycled before the lock was taken
        if slot.state.load(Ordering::Acquire) != RUNNING {
            return Pull::Skipped;
        }
        let Some(callback) = guard.as_mut() else {
            return Pull::Skipped;
        };

        let requested = scratch.len() / channels;
        let got = callback(scratch).min(requested);
        slot.position.fetch_add(got as u64, Ordering::Relaxed);
        drop(guard);

        if got == requested {
            return Pull::Full(got);
        }

        scratch[got * channels..].fill(0.0);
        if slot
            .state
            .compare_exchange(RUNNING, DRAINED, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            slot.try_notify(StreamState::Drained);
        }
        Pull::Short(got)
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let mut in_use = 0;
        let mut running = 0;

        for slot in &self.slots {
            match slot.state.load(Ordering::Acquire) {
                FREE => {}
                RUNNING => {
                    in_use += 1;
                    running += 1;
                }
                _ => in_use += 1,
            }
        }

        PoolStats {
            capacity: self.capacity(),
            in_use,
            running,
            available: self.capacity() - in_use,
        }
    }
}

impl Default for SlotPool {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub capacity: usize,
    pub in_use: usize,
    pub running: usize,
    pub available: usize,
}
