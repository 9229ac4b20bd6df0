// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::Error;

/// Replay counter of frames received by a Supplicant.
/// A counter is only accepted once the frame carrying it was authenticated.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ReplayCounter {
    last: Option<u64>,
}

impl ReplayCounter {
    pub fn check(&self, counter: u64) -> Result<(), Error> {
        match self.last {
            Some(last) if counter <= last => Err(Error::InvalidKeyReplayCounter(counter, last)),
            _ => Ok(()),
        }
    }

    pub fn accept(&mut self, counter: u64) {
        self.last = Some(counter);
    }

    pub fn last(&self) -> Option<u64> {
        self.last
    }
}

/// Number of transmitted EAPOL-Key frames whose replay counters remain valid for a response.
pub const RING_LEN: usize = 4;

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Entry {
    counter: u64,
    valid: bool,
}

/// Replay counters of EAPOL-Key frames sent by the Authenticator, newest first.
/// A response may carry the counter of any of the last `RING_LEN` retransmissions.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct KeyReplayRing {
    entries: [Entry; RING_LEN],
    // Snapshot taken when message 2 was accepted. Lets a message 2 answering an older
    // message 1 with an updated SNonce be processed while message 3 is outstanding.
    prev: [Entry; RING_LEN],
}

impl KeyReplayRing {
    /// Reserves the counter for the next transmitted frame.
    pub fn next(&mut self) -> u64 {
        let next = self.entries[0].counter.wrapping_add(1);
        self.entries.rotate_right(1);
        self.entries[0] = Entry { counter: next, valid: true };
        next
    }

    pub fn current(&self) -> u64 {
        self.entries[0].counter
    }

    pub fn is_valid(&self, counter: u64) -> bool {
        is_valid(&self.entries, counter)
    }

    pub fn is_valid_prev(&self, counter: u64) -> bool {
        is_valid(&self.prev, counter)
    }

    /// Invalidates `counter` and every older counter.
    pub fn mark_invalid(&mut self, counter: u64) {
        mark_invalid(&mut self.entries, Some(counter));
    }

    pub fn mark_prev_invalid(&mut self, counter: u64) {
        mark_invalid(&mut self.prev, Some(counter));
    }

    /// Remembers the current counters for SNonce updates and invalidates all of them.
    pub fn snapshot_prev(&mut self) {
        self.prev = self.entries;
        mark_invalid(&mut self.entries, None);
    }

    pub fn invalidate_all(&mut self) {
        mark_invalid(&mut self.entries, None);
        mark_invalid(&mut self.prev, None);
    }
}

fn is_valid(entries: &[Entry; RING_LEN], counter: u64) -> bool {
    entries.iter().any(|e| e.valid && e.counter == counter)
}

fn mark_invalid(entries: &mut [Entry; RING_LEN], counter: Option<u64>) {
    if let Some(start) =
        entries.iter().position(|e| e.valid && counter.map_or(true, |c| e.counter == c))
    {
        entries[start..].iter_mut().for_each(|e| e.valid = false);
    }
}
