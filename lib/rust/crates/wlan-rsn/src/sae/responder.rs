// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Access point side of SAE. Commits are queued and processed one at a time by the host's
//! worker; confirms are processed as they arrive. Once the number of open exchanges reaches the
//! configured threshold, commits are only queued if they carry a valid anti-clogging token.

use super::comeback::SharedComebackTokens;
use super::ecc::{Curve, GROUP_ID};
use super::frame::{self, AuthFrame, Commit};
use super::pwe::PtCache;
use super::queue::{CommitQueue, RemoveOutcome, SaeWorkItem};
use super::session::{SaeCredentials, SaeSession, SaeState};
use crate::config::SaeConfig;
use crate::pmksa::{NewPmksa, SharedPmksaCache};
use crate::rsna::{SecAssocStatus, SecAssocUpdate, UpdateSink};
use crate::timer::{EventId, Scheduler, Timer};
use crate::Error;
use bytes::Bytes;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::time::Instant;
use wlan_common::ie::rsn::akm::{self, Akm};
use wlan_common::mac::mgmt::StatusCode;
use wlan_common::mac::{MacAddr, MacFmt};
use zeroize::Zeroize;

/// The password protected network served by the responder.
#[derive(Clone)]
pub struct SaeNetwork {
    pub ssid: Vec<u8>,
    pub password: Vec<u8>,
    pub password_id: Option<Vec<u8>>,
    /// Derive the PWE with hash-to-element instead of hunting and pecking.
    pub h2e: bool,
}

impl Drop for SaeNetwork {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaeTimeout {
    Retransmit(MacAddr),
}

struct Peer {
    session: SaeSession,
    retransmit: Option<EventId>,
}

pub struct SaeResponder {
    cfg: SaeConfig,
    own_addr: MacAddr,
    network: SaeNetwork,
    curve: Curve,
    pt_cache: PtCache,
    peers: HashMap<MacAddr, Peer>,
    queue: CommitQueue,
    comeback: SharedComebackTokens,
    pmksa: SharedPmksaCache,
    timer: Timer<SaeTimeout>,
}

impl std::fmt::Debug for SaeResponder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaeResponder")
            .field("own_addr", &self.own_addr.to_mac_str())
            .field("peers", &self.peers.len())
            .field("queue", &self.queue)
            .finish()
    }
}

impl SaeResponder {
    pub fn new(
        cfg: SaeConfig,
        own_addr: MacAddr,
        network: SaeNetwork,
        comeback: SharedComebackTokens,
        pmksa: SharedPmksaCache,
        scheduler: Box<dyn Scheduler>,
    ) -> Result<Self, Error> {
        cfg.validate()?;
        if network.password.is_empty() {
            return Err(Error::InvalidConfig("SAE password must not be empty".to_string()));
        }
        Ok(SaeResponder {
            queue: CommitQueue::new(cfg.commit_queue_capacity),
            cfg,
            own_addr,
            network,
            curve: Curve::p256(),
            pt_cache: PtCache::new(),
            peers: HashMap::new(),
            comeback,
            pmksa,
            timer: Timer::new(scheduler),
        })
    }

    pub fn session_state(&self, peer: &MacAddr) -> Option<SaeState> {
        self.peers.get(peer).map(|p| p.session.state())
    }

    /// Exchanges waiting for the peer.
    pub fn open_sessions(&self) -> usize {
        self.peers.values().filter(|p| p.session.is_pending()).count()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn anti_clogging_active(&self) -> bool {
        self.open_sessions() + self.queue.queued_commits() >= self.cfg.anti_clogging_threshold
    }

    pub fn on_frame(
        &mut self,
        sink: &mut UpdateSink,
        peer: MacAddr,
        frame: AuthFrame,
        now: Instant,
    ) -> Result<(), Error> {
        if frame.is_confirm() {
            return self.run_session(sink, &peer, now, |session, sink| {
                session.on_frame(sink, &frame)
            });
        }
        if !frame.is_commit() {
            warn!("dropping SAE frame with transaction sequence {}", frame.transaction_seq);
            return Ok(());
        }
        match frame.status {
            StatusCode::SUCCESS | StatusCode::SAE_HASH_TO_ELEMENT => (),
            _ => {
                // Rejections only matter to an exchange in progress.
                return self.run_session(sink, &peer, now, |session, sink| {
                    session.on_frame(sink, &frame)
                });
            }
        }

        let known = match self.peers.get(&peer) {
            Some(p) => p.session.state() != SaeState::Nothing,
            None => false,
        };
        if !known && !self.admit_commit(sink, &peer, &frame, now)? {
            return Ok(());
        }
        // A full queue drops the commit. The peer retransmits it.
        if let Err(e) = self.queue.push(SaeWorkItem { peer, frame }) {
            debug!("commit of {} not queued: {}", peer.to_mac_str(), e);
        }
        Ok(())
    }

    /// Returns true if the commit may be queued. Answers with a token request if anti-clogging
    /// is active and the commit carries no valid token.
    fn admit_commit(
        &mut self,
        sink: &mut UpdateSink,
        peer: &MacAddr,
        frame: &AuthFrame,
        now: Instant,
    ) -> Result<bool, Error> {
        if !self.anti_clogging_active() {
            return Ok(true);
        }
        let h2e = frame.status == StatusCode::SAE_HASH_TO_ELEMENT;
        // Under load a commit that does not parse is not worth a session.
        let token = match Commit::parse(&frame.body[..], h2e) {
            Ok(commit) => commit.token,
            Err(status) => {
                debug!("dropping malformed commit from {} ({:?})", peer.to_mac_str(), status);
                return Ok(false);
            }
        };
        if let Some(token) = token {
            if self.comeback.lock().check_token(peer, &token[..]) {
                debug!("valid anti-clogging token from {}", peer.to_mac_str());
                return Ok(true);
            }
            warn!("dropping commit with invalid anti-clogging token from {}", peer.to_mac_str());
            return Ok(false);
        }

        info!("requesting anti-clogging token from {}", peer.to_mac_str());
        let token = self.comeback.lock().build_token_req(peer, now)?;
        let body = frame::write_token_request(GROUP_ID, &token[..], h2e)?;
        sink.push(SecAssocUpdate::TxSaeFrame {
            dst: *peer,
            frame: AuthFrame::commit(StatusCode::ANTI_CLOGGING_TOKEN_REQUIRED, body),
        });
        sink.push(SecAssocUpdate::Status {
            addr: *peer,
            status: SecAssocStatus::SaeAntiCloggingTriggered,
        });
        Ok(false)
    }

    /// Processes queued commits until the queue is empty. Returns the number of processed items.
    pub fn process_queued(&mut self, sink: &mut UpdateSink, now: Instant) -> usize {
        let mut processed = 0;
        while let Some(SaeWorkItem { peer, frame }) = self.queue.pop() {
            processed += 1;
            if let Err(e) = self.process_commit(sink, peer, &frame, now) {
                error!("error processing SAE commit of {}: {}", peer.to_mac_str(), e);
            }
            if self.queue.complete(&peer) {
                debug!("deleting SAE peer {} removed during processing", peer.to_mac_str());
                self.drop_peer(&peer);
            }
        }
        processed
    }

    fn process_commit(
        &mut self,
        sink: &mut UpdateSink,
        peer: MacAddr,
        frame: &AuthFrame,
        now: Instant,
    ) -> Result<(), Error> {
        if !self.peers.contains_key(&peer) {
            let credentials = self.credentials()?;
            let session = SaeSession::new(self.own_addr, peer, credentials, &self.cfg);
            self.peers.insert(peer, Peer { session, retransmit: None });
        }
        self.run_session(sink, &peer, now, |session, sink| session.on_frame(sink, frame))
    }

    fn credentials(&mut self) -> Result<SaeCredentials, Error> {
        let pt = if self.network.h2e {
            Some(self.pt_cache.get_or_derive(
                &self.curve,
                &self.network.ssid[..],
                &self.network.password[..],
                self.network.password_id.as_ref().map(|id| &id[..]),
            )?)
        } else {
            None
        };
        Ok(SaeCredentials {
            password: self.network.password.clone(),
            password_id: self.network.password_id.clone(),
            pt,
        })
    }

    /// Runs one step of the peer's session and keeps its retransmission timer in sync.
    fn run_session<F>(
        &mut self,
        sink: &mut UpdateSink,
        peer: &MacAddr,
        now: Instant,
        step: F,
    ) -> Result<(), Error>
    where
        F: FnOnce(&mut SaeSession, &mut UpdateSink) -> Result<(), Error>,
    {
        let retransmit_timeout = self.cfg.retransmit_timeout();
        let mut updates = vec![];
        let result = match self.peers.get_mut(peer) {
            None => {
                debug!("dropping SAE frame of unknown peer {}", peer.to_mac_str());
                return Ok(());
            }
            Some(p) => {
                let result = step(&mut p.session, &mut updates);
                if let Some(id) = p.retransmit.take() {
                    self.timer.cancel_event(id);
                }
                if p.session.is_pending() {
                    let event = SaeTimeout::Retransmit(*peer);
                    p.retransmit = Some(self.timer.schedule_event(retransmit_timeout, event));
                }
                result
            }
        };

        for update in &updates {
            match update {
                SecAssocUpdate::Status { status: SecAssocStatus::SaeAccepted, .. } => {
                    self.cache_pmksa(peer, now)
                }
                SecAssocUpdate::Status { status: SecAssocStatus::SaeRejected(_), .. } => {
                    for item in self.remove_peer(peer) {
                        debug!("discarding queued SAE frame of {}", item.peer.to_mac_str());
                    }
                }
                _ => (),
            }
        }
        sink.append(&mut updates);
        result
    }

    /// Caches the PMKSA of a peer whose exchange was accepted.
    fn cache_pmksa(&self, peer: &MacAddr, now: Instant) {
        let keys = match self.peers.get(peer).and_then(|p| p.session.keys()) {
            Some(keys) => keys,
            None => return,
        };
        let result = self.pmksa.lock().add(
            NewPmksa {
                pmk: keys.pmk(),
                pmkid: Some(Bytes::from(keys.pmkid.to_vec())),
                kck: None,
                peer: *peer,
                aa: self.own_addr,
                spa: *peer,
                akm: Akm::new_dot11(akm::SAE),
                lifetime: None,
                session_timeout: None,
            },
            now,
        )
        .map(|_| ());
        match result {
            Ok(()) => info!("cached SAE PMKSA of {}", peer.to_mac_str()),
            Err(e) => error!("error caching SAE PMKSA of {}: {}", peer.to_mac_str(), e),
        }
    }

    pub fn on_timeout(
        &mut self,
        sink: &mut UpdateSink,
        event_id: EventId,
        now: Instant,
    ) -> Result<(), Error> {
        match self.timer.triggered(&event_id) {
            Some(SaeTimeout::Retransmit(peer)) => {
                if let Some(p) = self.peers.get_mut(&peer) {
                    if p.retransmit == Some(event_id) {
                        p.retransmit = None;
                    }
                }
                self.run_session(sink, &peer, now, |session, sink| {
                    session.on_retransmit_timeout(sink)
                })
            }
            None => Ok(()),
        }
    }

    /// Forgets a peer, e.g. on deauthentication. Returns the peer's queued work, which was not
    /// processed. If the peer's commit is in flight, its session is deleted once processing
    /// completes.
    pub fn remove_peer(&mut self, peer: &MacAddr) -> Vec<SaeWorkItem> {
        match self.queue.remove_peer(peer) {
            RemoveOutcome::Removed(drained) => {
                self.drop_peer(peer);
                drained
            }
            RemoveOutcome::Deferred(drained) => {
                self.cancel_timer(peer);
                drained
            }
        }
    }

    fn cancel_timer(&mut self, peer: &MacAddr) {
        let peer = *peer;
        self.timer.cancel_matching(|SaeTimeout::Retransmit(addr)| *addr == peer);
        if let Some(p) = self.peers.get_mut(&peer) {
            p.retransmit = None;
        }
    }

    fn drop_peer(&mut self, peer: &MacAddr) {
        self.cancel_timer(peer);
        if self.peers.remove(peer).is_some() {
            debug!("removed SAE session of {}", peer.to_mac_str());
        }
    }

    /// Applies a changed password or SSID to all exchanges started from now on.
    pub fn set_network(&mut self, network: SaeNetwork) {
        self.pt_cache.clear();
        self.network = network;
    }
}
