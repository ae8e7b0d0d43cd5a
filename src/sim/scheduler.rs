//! Frame scheduling.
//!
//! The race loop never calls a display-refresh API directly. It asks a
//! [`FrameScheduler`] for the next frame and is handed back a [`FrameId`];
//! the host later delivers that id to the game controller. A frame loop
//! only accepts the id it is waiting for, so a callback that races a
//! `stop()` can never tick a race that has already ended.

use std::collections::VecDeque;

/// Identifies one requested frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameId(pub u64);

/// Host-side source of display-refresh callbacks.
pub trait FrameScheduler {
    /// Ask for one callback on the next frame.
    fn request_frame(&mut self) -> FrameId;
    /// Withdraw a request made with [`request_frame`](Self::request_frame).
    fn cancel_frame(&mut self, id: FrameId);
}

/// A scheduler with no real clock: requests queue up until the host (a
/// test, an offline renderer, or a JS `requestAnimationFrame` shim)
/// drains them.
#[derive(Debug, Default)]
pub struct VirtualScheduler {
    next_id: u64,
    queued: VecDeque<FrameId>,
    requested: u64,
    cancelled: u64,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take every frame that is currently due.
    pub fn take_due(&mut self) -> Vec<FrameId> {
        self.queued.drain(..).collect()
    }

    pub fn pending(&self) -> usize {
        self.queued.len()
    }

    pub fn requested(&self) -> u64 {
        self.requested
    }

    pub fn cancelled(&self) -> u64 {
        self.cancelled
    }
}

impl FrameScheduler for VirtualScheduler {
    fn request_frame(&mut self) -> FrameId {
        self.next_id += 1;
        self.requested += 1;
        let id = FrameId(self.next_id);
        self.queued.push_back(id);
        id
    }

    fn cancel_frame(&mut self, id: FrameId) {
        let before = self.queued.len();
        self.queued.retain(|&queued| queued != id);
        if self.queued.len() != before {
            self.cancelled += 1;
        }
    }
}

/// Keeps at most one frame request outstanding on behalf of the race loop.
#[derive(Debug)]
pub struct FrameLoop<S: FrameScheduler> {
    scheduler: S,
    pending: Option<FrameId>,
}

impl<S: FrameScheduler> FrameLoop<S> {
    pub fn new(scheduler: S) -> Self {
        FrameLoop {
            scheduler,
            pending: None,
        }
    }

    /// Begin ticking. Does nothing if a frame is already requested.
    pub fn start(&mut self) {
        if self.pending.is_none() {
            self.pending = Some(self.scheduler.request_frame());
        }
    }

    /// Cancel the outstanding request, if any.
    pub fn stop(&mut self) {
        if let Some(id) = self.pending.take() {
            self.scheduler.cancel_frame(id);
        }
    }

    pub fn is_running(&self) -> bool {
        self.pending.is_some()
    }

    /// Consume a delivered frame. Returns false for stale or unknown ids.
    pub(crate) fn accept(&mut self, id: FrameId) -> bool {
        if self.pending == Some(id) {
            self.pending = None;
            true
        } else {
            false
        }
    }

    /// Request the frame after the one just accepted.
    pub(crate) fn request_next(&mut self) {
        self.pending = Some(self.scheduler.request_frame());
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }
}
