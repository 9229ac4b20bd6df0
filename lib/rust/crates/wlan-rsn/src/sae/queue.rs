// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::frame::AuthFrame;
use crate::Error;
use log::{debug, warn};
use std::collections::{HashSet, VecDeque};
use wlan_common::mac::{MacAddr, MacFmt};

/// SAE frame waiting for the worker.
#[derive(Debug, Clone, PartialEq)]
pub struct SaeWorkItem {
    pub peer: MacAddr,
    pub frame: AuthFrame,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// A commit of the same peer is already queued or being processed.
    Ignored,
}

#[derive(Debug, PartialEq)]
pub enum RemoveOutcome {
    /// The peer's queued items, removed from the queue.
    Removed(Vec<SaeWorkItem>),
    /// The peer's work is in flight. It is reported by `complete` once done.
    Deferred(Vec<SaeWorkItem>),
}

/// Bounded FIFO of SAE work. Items are handed out one at a time; the next item is only
/// available once the previous one was completed.
#[derive(Debug)]
pub struct CommitQueue {
    items: VecDeque<SaeWorkItem>,
    capacity: usize,
    in_flight: Option<MacAddr>,
    pending_removal: HashSet<MacAddr>,
}

impl CommitQueue {
    pub fn new(capacity: usize) -> Self {
        CommitQueue {
            items: VecDeque::new(),
            capacity,
            in_flight: None,
            pending_removal: HashSet::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn queued_commits(&self) -> usize {
        self.items.iter().filter(|item| item.frame.is_commit()).count()
    }

    pub fn in_flight(&self) -> Option<MacAddr> {
        self.in_flight
    }

    fn has_commit_of(&self, peer: &MacAddr) -> bool {
        self.in_flight.as_ref() == Some(peer)
            || self.items.iter().any(|item| item.peer == *peer && item.frame.is_commit())
    }

    pub fn push(&mut self, item: SaeWorkItem) -> Result<PushOutcome, Error> {
        if item.frame.is_commit() && self.has_commit_of(&item.peer) {
            debug!("commit of {} already pending; ignoring", item.peer.to_mac_str());
            return Ok(PushOutcome::Ignored);
        }
        if self.items.len() >= self.capacity {
            warn!("SAE queue full; dropping frame of {}", item.peer.to_mac_str());
            return Err(Error::SaeQueueFull);
        }
        self.items.push_back(item);
        Ok(PushOutcome::Queued)
    }

    /// Takes the next item unless one is still in flight.
    pub fn pop(&mut self) -> Option<SaeWorkItem> {
        if self.in_flight.is_some() {
            return None;
        }
        let item = self.items.pop_front()?;
        self.in_flight = Some(item.peer);
        Some(item)
    }

    /// Marks the in-flight work of `peer` as done. Returns true if the peer was removed while
    /// its work was in flight and must be deleted now.
    pub fn complete(&mut self, peer: &MacAddr) -> bool {
        if self.in_flight.as_ref() == Some(peer) {
            self.in_flight = None;
        }
        self.pending_removal.remove(peer)
    }

    pub fn remove_peer(&mut self, peer: &MacAddr) -> RemoveOutcome {
        let (drained, kept): (Vec<_>, Vec<_>) =
            self.items.drain(..).partition(|item| item.peer == *peer);
        self.items = kept.into();
        if self.in_flight.as_ref() == Some(peer) {
            self.pending_removal.insert(*peer);
            RemoveOutcome::Deferred(drained)
        } else {
            RemoveOutcome::Removed(drained)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wlan_common::assert_variant;
    use wlan_common::mac::mgmt::StatusCode;

    const PEER_1: MacAddr = [1; 6];
    const PEER_2: MacAddr = [2; 6];

    fn commit(peer: MacAddr) -> SaeWorkItem {
        SaeWorkItem { peer, frame: AuthFrame::commit(StatusCode::SUCCESS, vec![19, 0]) }
    }

    fn confirm(peer: MacAddr) -> SaeWorkItem {
        SaeWorkItem { peer, frame: AuthFrame::confirm(StatusCode::SUCCESS, vec![0, 0]) }
    }

    #[test]
    fn test_fifo_one_at_a_time() {
        let mut queue = CommitQueue::new(4);
        assert_eq!(queue.push(commit(PEER_1)), Ok(PushOutcome::Queued));
        assert_eq!(queue.push(commit(PEER_2)), Ok(PushOutcome::Queued));
        assert_eq!(queue.pop(), Some(commit(PEER_1)));
        assert_eq!(queue.pop(), None);
        assert!(!queue.complete(&PEER_1));
        assert_eq!(queue.pop(), Some(commit(PEER_2)));
    }

    #[test]
    fn test_duplicate_commit_ignored() {
        let mut queue = CommitQueue::new(4);
        assert_eq!(queue.push(commit(PEER_1)), Ok(PushOutcome::Queued));
        assert_eq!(queue.push(commit(PEER_1)), Ok(PushOutcome::Ignored));
        assert_eq!(queue.push(confirm(PEER_1)), Ok(PushOutcome::Queued));
        queue.pop();
        // In flight counts as pending.
        assert_eq!(queue.push(commit(PEER_1)), Ok(PushOutcome::Ignored));
        assert_eq!(queue.queued_commits(), 0);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_queue_full() {
        let mut queue = CommitQueue::new(1);
        assert_eq!(queue.push(commit(PEER_1)), Ok(PushOutcome::Queued));
        assert_eq!(queue.push(commit(PEER_2)), Err(Error::SaeQueueFull));
    }

    #[test]
    fn test_remove_drains_queued_items() {
        let mut queue = CommitQueue::new(4);
        queue.push(commit(PEER_1)).expect("push");
        queue.push(commit(PEER_2)).expect("push");
        queue.push(confirm(PEER_1)).expect("push");
        assert_eq!(
            queue.remove_peer(&PEER_1),
            RemoveOutcome::Removed(vec![commit(PEER_1), confirm(PEER_1)])
        );
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.pop(), Some(commit(PEER_2)));
    }

    #[test]
    fn test_remove_in_flight_is_deferred() {
        let mut queue = CommitQueue::new(4);
        queue.push(commit(PEER_1)).expect("push");
        queue.push(confirm(PEER_1)).expect("push");
        queue.pop();
        assert_variant!(queue.remove_peer(&PEER_1), RemoveOutcome::Deferred(drained) => {
            assert_eq!(drained, vec![confirm(PEER_1)]);
        });
        assert!(queue.complete(&PEER_1));
        assert!(!queue.complete(&PEER_1));
        assert_eq!(queue.in_flight(), None);
        assert!(queue.is_empty());
    }
}
