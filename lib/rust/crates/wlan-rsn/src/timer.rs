// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::collections::HashMap;
use std::time::Duration;

#[cfg(test)]
pub use test_utils::*;

#[derive(PartialEq, Eq, Hash, Debug, Copy, Clone)]
pub struct EventId(pub u64);

/// A scheduler to schedule and cancel timeouts.
/// The host calls back into the owner of the `Timer` with the returned `EventId` once the
/// timeout expired.
pub trait Scheduler: Send {
    /// Requests to schedule an event. Returns a unique ID used to cancel the scheduled event.
    fn schedule(&mut self, timeout: Duration) -> EventId;
    /// Cancels a previously scheduled event.
    fn cancel(&mut self, id: EventId);
}

/// A timer to schedule and cancel timeouts and retrieve triggered events.
pub struct Timer<E> {
    events: HashMap<EventId, E>,
    scheduler: Box<dyn Scheduler>,
}

impl<E> std::fmt::Debug for Timer<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timer").field("pending", &self.events.len()).finish()
    }
}

impl<E> Timer<E> {
    pub fn new(scheduler: Box<dyn Scheduler>) -> Self {
        Self { events: HashMap::default(), scheduler }
    }

    pub fn triggered(&mut self, event_id: &EventId) -> Option<E> {
        self.events.remove(event_id)
    }

    pub fn schedule_event(&mut self, timeout: Duration, event: E) -> EventId {
        let event_id = self.scheduler.schedule(timeout);
        self.events.insert(event_id, event);
        event_id
    }

    pub fn cancel_event(&mut self, event_id: EventId) {
        if self.events.remove(&event_id).is_some() {
            self.scheduler.cancel(event_id);
        }
    }

    /// Cancels every pending event for which `pred` returns true.
    pub fn cancel_matching<F: Fn(&E) -> bool>(&mut self, pred: F) {
        let ids: Vec<EventId> =
            self.events.iter().filter(|(_, e)| pred(e)).map(|(id, _)| *id).collect();
        for id in ids {
            self.cancel_event(id);
        }
    }

    pub fn cancel_all(&mut self) {
        for event_id in self.events.keys() {
            self.scheduler.cancel(*event_id);
        }
        self.events.clear();
    }

    pub fn pending(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod test_utils {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Default)]
    struct FakeSchedulerState {
        next_id: u64,
        scheduled: Vec<(EventId, Duration)>,
        canceled: Vec<EventId>,
    }

    /// Records scheduled and canceled events. Clones share their state so a test can keep a
    /// handle after moving the scheduler into a `Timer`.
    #[derive(Debug, Default, Clone)]
    pub struct FakeScheduler {
        state: Arc<Mutex<FakeSchedulerState>>,
    }

    impl FakeScheduler {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn as_scheduler(&self) -> Box<dyn Scheduler> {
            Box::new(self.clone())
        }

        /// Events which were scheduled and not canceled, oldest first.
        pub fn pending(&self) -> Vec<(EventId, Duration)> {
            let state = self.state.lock();
            state.scheduled.iter().filter(|(id, _)| !state.canceled.contains(id)).cloned().collect()
        }

        pub fn last_scheduled(&self) -> Option<EventId> {
            self.state.lock().scheduled.last().map(|(id, _)| *id)
        }

        pub fn canceled(&self) -> Vec<EventId> {
            self.state.lock().canceled.clone()
        }
    }

    impl Scheduler for FakeScheduler {
        fn schedule(&mut self, timeout: Duration) -> EventId {
            let mut state = self.state.lock();
            state.next_id += 1;
            let id = EventId(state.next_id);
            state.scheduled.push((id, timeout));
            id
        }

        fn cancel(&mut self, id: EventId) {
            self.state.lock().canceled.push(id);
        }
    }
}
