//! Frame Scheduler
//!
//! Work triggered by a notification runs on one of two lanes:
//!
//! - `Lane::Immediate` runs inside the notification, before `set` returns.
//! - `Lane::NextFrame` is queued and runs on the next [`FrameQueue::flush`],
//!   which stands in for the browser's paint-frame callback.
//!
//! There is no ordering guarantee between the lanes. An immediate task
//! subscribed after a deferred one still runs first, and a deferred task
//! sees every immediate mutation from the same turn.
//!
//! # Algorithm
//!
//! `flush` swaps the queue out before running it. Tasks enqueued while a
//! frame is running land in the fresh queue and wait for the following
//! frame, so a task that re-schedules itself cannot spin forever within one
//! flush.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::reactive::guard;

/// Where a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Immediate,
    NextFrame,
}

impl Lane {
    pub fn deferred(defer: bool) -> Self {
        if defer {
            Lane::NextFrame
        } else {
            Lane::Immediate
        }
    }
}

type Task = Box<dyn FnOnce() + Send>;

/// Queue of work waiting for the next frame.
#[derive(Clone, Default)]
pub struct FrameQueue {
    pending: Arc<Mutex<VecDeque<Task>>>,
    frames: Arc<AtomicU64>,
}

impl FrameQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `task` for the next frame.
    pub fn request_frame<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.pending.lock().push_back(Box::new(task));
    }

    /// Run `task` on the given lane.
    pub fn dispatch<F>(&self, lane: Lane, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        match lane {
            Lane::Immediate => {
                guard("immediate task", task);
            }
            Lane::NextFrame => self.request_frame(task),
        }
    }

    /// Run every task queued before this call. Returns how many ran.
    pub fn flush(&self) -> usize {
        let tasks = std::mem::take(&mut *self.pending.lock());
        let frame = self.frames.fetch_add(1, Ordering::SeqCst) + 1;
        trace!(frame, tasks = tasks.len(), "flushing frame");

        let count = tasks.len();
        for task in tasks {
            guard("frame task", task);
        }
        count
    }

    /// Number of tasks waiting.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Number of frames flushed so far.
    pub fn frame_count(&self) -> u64 {
        self.frames.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for FrameQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameQueue")
            .field("pending", &self.pending())
            .field("frames", &self.frame_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI32;

    #[test]
    fn immediate_runs_now() {
        let queue = FrameQueue::new();
        let ran = Arc::new(AtomicI32::new(0));
        let r = ran.clone();

        queue.dispatch(Lane::Immediate, move || {
            r.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(queue.pending(), 0);
    }

    #[test]
    fn next_frame_waits_for_flush() {
        let queue = FrameQueue::new();
        let ran = Arc::new(AtomicI32::new(0));
        let r = ran.clone();

        queue.dispatch(Lane::NextFrame, move || {
            r.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 0);

        assert_eq!(queue.flush(), 1);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(queue.frame_count(), 1);
    }

    #[test]
    fn tasks_queued_during_flush_wait_a_frame() {
        let queue = FrameQueue::new();
        let ran = Arc::new(AtomicI32::new(0));

        let inner_queue = queue.clone();
        let r = ran.clone();
        queue.request_frame(move || {
            inner_queue.request_frame(move || {
                r.fetch_add(1, Ordering::SeqCst);
            });
        });

        queue.flush();
        assert_eq!(ran.load(Ordering::SeqCst), 0);
        assert_eq!(queue.pending(), 1);

        queue.flush();
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failing_task_does_not_stop_frame() {
        let queue = FrameQueue::new();
        let ran = Arc::new(AtomicI32::new(0));
        let r = ran.clone();

        queue.request_frame(|| panic!("frame task failure"));
        queue.request_frame(move || {
            r.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(queue.flush(), 2);
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }
}
