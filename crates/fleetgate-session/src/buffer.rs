//! Per-session event queue with long-poll retrieval.
//!
//! The broadcaster calls [`EventBuffer::deliver`] for every engine event
//! while it holds the registry lock; a client's `pollEvents` call calls
//! [`EventBuffer::retrieve`] after it has let go of that lock. The two meet
//! here, so the buffer has its own small synchronization:
//!
//! - a `std::sync::Mutex` around the queue and filter, held only for a push
//!   or a drain and never across an `.await`
//! - a `tokio::sync::Notify` that wakes a blocked retriever
//! - a counter of blocked retrievers, read by the reaper
//!
//! # Lost wakeups
//!
//! `retrieve` registers interest in the notification *before* it looks at
//! the queue. An event delivered between the look and the wait still wakes
//! it.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use fleetgate_protocol::{Event, EventFilter};
use tokio::sync::Notify;
use tokio::time::{self, Instant};

#[derive(Debug, Default)]
struct BufferState {
    queue: VecDeque<Event>,
    filter: EventFilter,
}

/// Ordered event queue plus the acceptance filter that guards it.
///
/// A new buffer refuses every event until a filter is set.
#[derive(Debug, Default)]
pub struct EventBuffer {
    state: Mutex<BufferState>,
    notify: Notify,
    waiting: AtomicUsize,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `event` if the current filter accepts it and wakes any
    /// blocked retriever. Returns whether the event was queued.
    pub fn deliver(&self, event: &Event) -> bool {
        {
            let mut state = self.lock();
            if !state.filter.accepts(event) {
                return false;
            }
            state.queue.push_back(event.clone());
        }
        self.notify.notify_waiters();
        true
    }

    /// Replaces the acceptance filter. Events already queued stay queued.
    pub fn set_filter(&self, filter: EventFilter) {
        self.lock().filter = filter;
    }

    pub fn filter(&self) -> EventFilter {
        self.lock().filter.clone()
    }

    /// Drains the queue, waiting up to `timeout` for the first event.
    ///
    /// Returns immediately if events are already queued. Otherwise returns
    /// as soon as one arrives, or with an empty list once `timeout` passes.
    /// While this future is pending the buffer reports a waiting consumer;
    /// dropping the future (client went away) clears that.
    pub async fn retrieve(&self, timeout: Duration) -> Vec<Event> {
        let deadline = Instant::now() + timeout;
        let _waiting = WaitingGuard::enter(&self.waiting);

        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let events = self.drain();
            if !events.is_empty() {
                return events;
            }
            if time::timeout_at(deadline, notified).await.is_err() {
                return self.drain();
            }
        }
    }

    /// `true` while at least one [`retrieve`](Self::retrieve) is blocked.
    pub fn has_waiting_consumer(&self) -> bool {
        self.waiting.load(Ordering::Acquire) > 0
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn drain(&self) -> Vec<Event> {
        self.lock().queue.drain(..).collect()
    }

    // A panic while holding this lock cannot leave the queue half-updated,
    // so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Counts one blocked retriever for as long as it lives.
struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}
