//! Cooperative animation-frame scheduling.
//!
//! The host event loop owns the real frame clock and calls [`SchedulerHandle::run_frame`]
//! once per animation frame. Everything else only ever asks for work to be done "on the next
//! frame" through [`FrameScheduler::schedule_once`], keyed so that a second request of the
//! same kind replaces the first one instead of running twice.

use indexmap::IndexMap;
use log::debug;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

pub type FrameCallback = Box<dyn FnOnce()>;

#[derive(Default)]
pub struct FrameScheduler {
    /// Pending callbacks in the order their keys were first scheduled
    pending: IndexMap<String, FrameCallback>,
    /// Number of frames that have been run so far
    frames: u64,
}

impl FrameScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules the callback for the next frame. A pending callback with the same key is
    /// cancelled and dropped without being called, and the new one takes its place in line.
    pub fn schedule_once(&mut self, key: &str, callback: FrameCallback) {
        if self.pending.insert(key.to_string(), callback).is_some() {
            debug!("scheduler: replacing pending frame callback {key}");
        }
    }

    /// Cancels a pending callback. Returns true when something was cancelled.
    pub fn cancel(&mut self, key: &str) -> bool {
        self.pending.shift_remove(key).is_some()
    }

    /// Cancels all pending callbacks
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn is_scheduled(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn take_pending(&mut self) -> IndexMap<String, FrameCallback> {
        self.frames += 1;
        std::mem::take(&mut self.pending)
    }
}

impl Debug for FrameScheduler {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .field("frames", &self.frames)
            .finish()
    }
}

/// Shared handle to a frame scheduler. All clones point to the same scheduler.
#[derive(Clone, Default, Debug)]
pub struct SchedulerHandle(Rc<RefCell<FrameScheduler>>);

impl SchedulerHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Ref<'_, FrameScheduler> {
        self.0.borrow()
    }

    pub fn get_mut(&self) -> RefMut<'_, FrameScheduler> {
        self.0.borrow_mut()
    }

    pub fn schedule_once(&self, key: &str, callback: impl FnOnce() + 'static) {
        self.0.borrow_mut().schedule_once(key, Box::new(callback));
    }

    pub fn cancel(&self, key: &str) -> bool {
        self.0.borrow_mut().cancel(key)
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    /// Runs every callback that was pending when the frame started. Callbacks scheduled while
    /// the frame runs are kept for the next frame. Returns the number of callbacks that ran.
    pub fn run_frame(&self) -> usize {
        let pending = self.0.borrow_mut().take_pending();
        let count = pending.len();
        for (key, callback) in pending {
            debug!("scheduler: running frame callback {key}");
            callback();
        }
        count
    }
}
