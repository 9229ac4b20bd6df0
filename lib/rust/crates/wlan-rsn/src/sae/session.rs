// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::ecc::{to_fixed_bytes, Curve, Point, GROUP_ID, PRIME_LEN};
use super::frame::{self, AuthFrame, Commit, Confirm, COMMIT_SEQ, CONFIRM_SEQ};
use super::pwe;
use crate::config::SaeConfig;
use crate::crypto_utils::{ct_eq, hmac, kdf_sha256, HashAlgorithm};
use crate::rsna::{SecAssocStatus, SecAssocUpdate, UpdateSink};
use crate::Error;
use log::{debug, info, warn};
use num::bigint::BigUint;
use num::One;
use std::fmt;
use wlan_common::mac::mgmt::StatusCode;
use wlan_common::mac::{MacAddr, MacFmt};
use zeroize::Zeroize;

const KCK_PMK_LABEL: &str = "SAE KCK and PMK";
const KCK_LEN: usize = 32;
pub const PMK_LEN: usize = 32;
pub const PMKID_LEN: usize = 16;
const SEND_CONFIRM_MAX: u16 = 0xffff;

// IEEE Std 802.11-2016, 12.4.8.6
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaeState {
    Nothing,
    Committed,
    Confirmed,
    Accepted,
}

/// Result of validating a peer's commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Accepted,
    /// The peer echoed our own scalar and element. Dropped without an answer.
    Reflection,
    /// Scalar of an already accepted exchange. Dropped without an answer.
    Replayed,
    Rejected(StatusCode),
}

pub struct SaeKeys {
    kck: Vec<u8>,
    pmk: Vec<u8>,
    pub pmkid: [u8; PMKID_LEN],
}

impl SaeKeys {
    pub fn kck(&self) -> &[u8] {
        &self.kck[..]
    }

    pub fn pmk(&self) -> &[u8] {
        &self.pmk[..]
    }
}

impl fmt::Debug for SaeKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaeKeys").field("pmkid", &hex::encode(&self.pmkid[..])).finish()
    }
}

impl Drop for SaeKeys {
    fn drop(&mut self) {
        self.kck.zeroize();
        self.pmk.zeroize();
    }
}

#[derive(Clone)]
pub struct SaeCredentials {
    pub password: Vec<u8>,
    pub password_id: Option<Vec<u8>>,
    /// Password token. Its presence selects hash-to-element.
    pub pt: Option<Point>,
}

impl Drop for SaeCredentials {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// One SAE protocol instance between this device and a peer. Initiator and responder run the
/// same machine; the initiator enters it with `initiate`, the responder with a peer's commit.
pub struct SaeSession {
    curve: Curve,
    own_addr: MacAddr,
    peer_addr: MacAddr,
    credentials: SaeCredentials,
    sync_limit: u32,
    confirm_immediate: bool,

    state: SaeState,
    pwe: Option<Point>,
    rand: Option<BigUint>,
    own_scalar: Option<BigUint>,
    own_element: Option<Point>,
    peer_scalar: Option<BigUint>,
    peer_element: Option<Point>,
    accepted_peer_scalar: Option<BigUint>,
    keys: Option<SaeKeys>,
    send_confirm: u16,
    rc: u16,
    sync: u32,
    token: Option<Vec<u8>>,
    rejected_groups: Vec<u16>,
    peer_rejected_groups: Vec<u16>,
}

impl fmt::Debug for SaeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SaeSession")
            .field("peer", &self.peer_addr.to_mac_str())
            .field("state", &self.state)
            .field("sync", &self.sync)
            .field("send_confirm", &self.send_confirm)
            .field("rc", &self.rc)
            .finish()
    }
}

impl SaeSession {
    pub fn new(
        own_addr: MacAddr,
        peer_addr: MacAddr,
        credentials: SaeCredentials,
        cfg: &SaeConfig,
    ) -> Self {
        SaeSession {
            curve: Curve::p256(),
            own_addr,
            peer_addr,
            credentials,
            sync_limit: cfg.sync_limit,
            confirm_immediate: cfg.confirm_immediate,
            state: SaeState::Nothing,
            pwe: None,
            rand: None,
            own_scalar: None,
            own_element: None,
            peer_scalar: None,
            peer_element: None,
            accepted_peer_scalar: None,
            keys: None,
            send_confirm: 0,
            rc: 0,
            sync: 0,
            token: None,
            rejected_groups: vec![],
            peer_rejected_groups: vec![],
        }
    }

    pub fn state(&self) -> SaeState {
        self.state
    }

    pub fn peer_addr(&self) -> MacAddr {
        self.peer_addr
    }

    pub fn h2e(&self) -> bool {
        self.credentials.pt.is_some()
    }

    /// Keys of the exchange. Present once a peer commit was processed; only trustworthy in
    /// `Accepted`.
    pub fn keys(&self) -> Option<&SaeKeys> {
        self.keys.as_ref()
    }

    pub fn sync(&self) -> u32 {
        self.sync
    }

    pub fn set_token(&mut self, token: Vec<u8>) {
        self.token = Some(token);
    }

    /// Whether the session waits for the peer and retransmits on timeout.
    pub fn is_pending(&self) -> bool {
        self.state == SaeState::Committed || self.state == SaeState::Confirmed
    }

    fn set_state(&mut self, state: SaeState) {
        if self.state != state {
            info!("SAE {}: {:?} -> {:?}", self.peer_addr.to_mac_str(), self.state, state);
            self.state = state;
        }
    }

    /// Back to `Nothing`, dropping all material derived in this attempt.
    pub fn reset(&mut self) {
        self.set_state(SaeState::Nothing);
        self.rand = None;
        self.own_scalar = None;
        self.own_element = None;
        self.peer_scalar = None;
        self.peer_element = None;
        self.accepted_peer_scalar = None;
        self.keys = None;
        self.send_confirm = 0;
        self.rc = 0;
        self.sync = 0;
        self.token = None;
        self.peer_rejected_groups.clear();
    }

    /// Derives the PWE if needed and picks a fresh commit scalar and element.
    pub fn prepare_commit(&mut self) -> Result<(), Error> {
        let pwe = match self.pwe.as_ref() {
            Some(pwe) => pwe.clone(),
            None => {
                let pwe = match self.credentials.pt.as_ref() {
                    Some(pt) => {
                        pwe::pwe_from_pt(&self.curve, pt, &self.own_addr, &self.peer_addr)?
                    }
                    None => pwe::hunting_and_pecking(
                        &self.curve,
                        &self.credentials.password[..],
                        self.credentials.password_id.as_ref().map(|id| &id[..]),
                        &self.own_addr,
                        &self.peer_addr,
                    )?,
                };
                self.pwe = Some(pwe.clone());
                pwe
            }
        };

        let (rand, scalar, mask) = loop {
            let rand = self.curve.random_scalar();
            let mask = self.curve.random_scalar();
            let scalar = (&rand + &mask) % &self.curve.n;
            if scalar > BigUint::one() {
                break (rand, scalar, mask);
            }
        };
        let element = self.curve.negate(&self.curve.mul(&pwe, &mask));
        if element.is_infinity() {
            return Err(Error::SaeInvalidElement);
        }
        self.rand = Some(rand);
        self.own_scalar = Some(scalar);
        self.own_element = Some(element);
        self.keys = None;
        Ok(())
    }

    pub fn commit_frame(&self) -> Result<AuthFrame, Error> {
        let scalar = self.own_scalar.as_ref().ok_or(Error::SaeUnexpectedState)?;
        let element = self.own_element.as_ref().ok_or(Error::SaeUnexpectedState)?;
        let commit = Commit {
            group_id: GROUP_ID,
            token: self.token.clone(),
            scalar: to_fixed_bytes(scalar, PRIME_LEN),
            element: self.curve.point_to_bytes(element).ok_or(Error::SaeInvalidElement)?,
            password_id: self.credentials.password_id.clone(),
            rejected_groups: if self.rejected_groups.is_empty() {
                None
            } else {
                Some(self.rejected_groups.clone())
            },
        };
        let status =
            if self.h2e() { StatusCode::SAE_HASH_TO_ELEMENT } else { StatusCode::SUCCESS };
        Ok(AuthFrame::commit(status, commit.to_bytes(self.h2e())?))
    }

    /// Validates the peer's commit and derives the keys of the exchange from it.
    pub fn process_commit(&mut self, commit: &Commit) -> Result<CommitOutcome, Error> {
        if commit.password_id != self.credentials.password_id {
            return Ok(CommitOutcome::Rejected(StatusCode::UNKNOWN_PASSWORD_IDENTIFIER));
        }
        if self.h2e() && commit.rejected_groups.as_ref().map_or(false, |g| g.contains(&GROUP_ID))
        {
            warn!("peer claims our group was rejected; possible downgrade");
            return Ok(CommitOutcome::Rejected(StatusCode::REFUSED_REASON_UNSPECIFIED));
        }
        let scalar = BigUint::from_bytes_be(&commit.scalar[..]);
        if scalar <= BigUint::one() || scalar >= self.curve.n {
            return Ok(CommitOutcome::Rejected(StatusCode::REFUSED_REASON_UNSPECIFIED));
        }
        let element = match self.curve.point_from_bytes(&commit.element[..]) {
            Some(element) => element,
            None => return Ok(CommitOutcome::Rejected(StatusCode::REFUSED_REASON_UNSPECIFIED)),
        };
        if self.accepted_peer_scalar.as_ref() == Some(&scalar) {
            return Ok(CommitOutcome::Replayed);
        }
        if self.own_scalar.as_ref() == Some(&scalar) && self.own_element.as_ref() == Some(&element)
        {
            return Ok(CommitOutcome::Reflection);
        }

        self.peer_rejected_groups = commit.rejected_groups.clone().unwrap_or_default();
        self.peer_scalar = Some(scalar);
        self.peer_element = Some(element);
        match self.derive_keys() {
            Ok(()) => Ok(CommitOutcome::Accepted),
            Err(e) => {
                warn!("error deriving SAE keys: {}", e);
                Ok(CommitOutcome::Rejected(StatusCode::REFUSED_REASON_UNSPECIFIED))
            }
        }
    }

    fn derive_keys(&mut self) -> Result<(), Error> {
        let rand = self.rand.as_ref().ok_or(Error::SaeUnexpectedState)?;
        let pwe = self.pwe.as_ref().ok_or(Error::SaeUnexpectedState)?;
        let own_scalar = self.own_scalar.as_ref().ok_or(Error::SaeUnexpectedState)?;
        let peer_scalar = self.peer_scalar.as_ref().ok_or(Error::SaeUnexpectedState)?;
        let peer_element = self.peer_element.as_ref().ok_or(Error::SaeUnexpectedState)?;

        // K = rand * (peer-scalar * PWE + peer-element)
        let k = self.curve.mul(
            &self.curve.add(&self.curve.mul(pwe, peer_scalar), peer_element),
            rand,
        );
        let mut k = to_fixed_bytes(k.x().ok_or(Error::SaeInvalidElement)?, PRIME_LEN);
        let mut keyseed = hmac(HashAlgorithm::Sha256, &self.keyseed_salt()[..], &[&k[..]])?;
        k.zeroize();

        let context = to_fixed_bytes(&((own_scalar + peer_scalar) % &self.curve.n), PRIME_LEN);
        let bits = (KCK_LEN + PMK_LEN) * 8;
        let mut okm = kdf_sha256(&keyseed[..], KCK_PMK_LABEL, &context[..], bits)?;
        keyseed.zeroize();
        let mut pmkid = [0u8; PMKID_LEN];
        pmkid.copy_from_slice(&context[..PMKID_LEN]);
        self.keys = Some(SaeKeys {
            kck: okm[..KCK_LEN].to_vec(),
            pmk: okm[KCK_LEN..KCK_LEN + PMK_LEN].to_vec(),
            pmkid,
        });
        okm.zeroize();
        Ok(())
    }

    fn keyseed_salt(&self) -> Vec<u8> {
        let groups = if self.rejected_groups.is_empty() {
            &self.peer_rejected_groups
        } else {
            &self.rejected_groups
        };
        if self.h2e() && !groups.is_empty() {
            groups.iter().flat_map(|g| g.to_le_bytes().to_vec()).collect()
        } else {
            vec![0u8; PRIME_LEN]
        }
    }

    fn compute_confirm(
        &self,
        send_confirm: u16,
        first: (&BigUint, &Point),
        second: (&BigUint, &Point),
    ) -> Result<Vec<u8>, Error> {
        let kck = self.keys.as_ref().ok_or(Error::SaeUnexpectedState)?.kck();
        let first_element = self.curve.point_to_bytes(first.1).ok_or(Error::SaeInvalidElement)?;
        let second_element =
            self.curve.point_to_bytes(second.1).ok_or(Error::SaeInvalidElement)?;
        hmac(
            HashAlgorithm::Sha256,
            kck,
            &[
                &send_confirm.to_le_bytes()[..],
                &to_fixed_bytes(first.0, PRIME_LEN)[..],
                &first_element[..],
                &to_fixed_bytes(second.0, PRIME_LEN)[..],
                &second_element[..],
            ],
        )
    }

    fn own_and_peer(&self) -> Result<((&BigUint, &Point), (&BigUint, &Point)), Error> {
        let own = (
            self.own_scalar.as_ref().ok_or(Error::SaeUnexpectedState)?,
            self.own_element.as_ref().ok_or(Error::SaeUnexpectedState)?,
        );
        let peer = (
            self.peer_scalar.as_ref().ok_or(Error::SaeUnexpectedState)?,
            self.peer_element.as_ref().ok_or(Error::SaeUnexpectedState)?,
        );
        Ok((own, peer))
    }

    /// Builds the next Confirm. The counter is advanced first, so the first Confirm carries 1.
    /// It saturates at 0xffff, which is also the value used for every Confirm sent in
    /// `Accepted`.
    pub fn confirm_frame(&mut self) -> Result<AuthFrame, Error> {
        if self.send_confirm < SEND_CONFIRM_MAX {
            self.send_confirm += 1;
        }
        let send_confirm = self.send_confirm;
        let confirm = {
            let (own, peer) = self.own_and_peer()?;
            self.compute_confirm(send_confirm, own, peer)?
        };
        let body = Confirm { send_confirm, confirm }.to_bytes();
        Ok(AuthFrame::confirm(StatusCode::SUCCESS, body))
    }

    pub fn check_confirm(&self, confirm: &Confirm) -> Result<bool, Error> {
        let (own, peer) = self.own_and_peer()?;
        let expected = self.compute_confirm(confirm.send_confirm, peer, own)?;
        Ok(ct_eq(&expected[..], &confirm.confirm[..]))
    }

    /// Starts an exchange as initiator.
    pub fn initiate(&mut self, sink: &mut UpdateSink) -> Result<(), Error> {
        self.reset();
        self.prepare_commit()?;
        self.send_commit(sink)?;
        self.set_state(SaeState::Committed);
        Ok(())
    }

    pub fn on_frame(&mut self, sink: &mut UpdateSink, frame: &AuthFrame) -> Result<(), Error> {
        match frame.transaction_seq {
            COMMIT_SEQ => self.on_commit(sink, frame),
            CONFIRM_SEQ => self.on_confirm(sink, frame),
            seq => {
                warn!("dropping SAE frame with transaction sequence {}", seq);
                Ok(())
            }
        }
    }

    /// Retransmits the last message, or gives up once `sync` reached its limit.
    pub fn on_retransmit_timeout(&mut self, sink: &mut UpdateSink) -> Result<(), Error> {
        if !self.is_pending() {
            return Ok(());
        }
        if self.sync_limit_reached(sink) {
            return Ok(());
        }
        self.sync += 1;
        self.send_commit(sink)?;
        if self.state == SaeState::Confirmed {
            self.send_confirm(sink)?;
        }
        Ok(())
    }

    fn sync_limit_reached(&mut self, sink: &mut UpdateSink) -> bool {
        if self.sync < self.sync_limit {
            return false;
        }
        warn!("SAE {}: sync limit reached", self.peer_addr.to_mac_str());
        self.reset();
        self.push_status(sink, SecAssocStatus::SaeRejected(StatusCode::REJECTED_SEQUENCE_TIMEOUT));
        true
    }

    fn on_commit(&mut self, sink: &mut UpdateSink, frame: &AuthFrame) -> Result<(), Error> {
        match frame.status {
            StatusCode::SUCCESS | StatusCode::SAE_HASH_TO_ELEMENT => (),
            StatusCode::ANTI_CLOGGING_TOKEN_REQUIRED => {
                return self.on_token_request(sink, &frame.body[..])
            }
            status => {
                self.on_peer_rejection(sink, status, &frame.body[..]);
                return Ok(());
            }
        }

        let h2e = frame.status == StatusCode::SAE_HASH_TO_ELEMENT;
        if h2e != self.h2e() {
            warn!("SAE {}: password element method mismatch", self.peer_addr.to_mac_str());
            return self.reject(sink, COMMIT_SEQ, StatusCode::REFUSED_REASON_UNSPECIFIED, vec![]);
        }
        let commit = match Commit::parse(&frame.body[..], h2e) {
            Ok(commit) => commit,
            Err(status) if self.state == SaeState::Accepted => {
                debug!("dropping malformed commit in Accepted: {:?}", status);
                return Ok(());
            }
            Err(status) => {
                let body = if status == StatusCode::UNSUPPORTED_FINITE_CYCLIC_GROUP {
                    frame.body[..2].to_vec()
                } else {
                    vec![]
                };
                return self.reject(sink, COMMIT_SEQ, status, body);
            }
        };

        match self.state {
            SaeState::Nothing => {
                self.prepare_commit()?;
                if !self.handle_commit_outcome(sink, &commit)? {
                    return Ok(());
                }
                self.send_commit(sink)?;
                if self.confirm_immediate {
                    self.send_confirm(sink)?;
                    self.set_state(SaeState::Confirmed);
                } else {
                    self.set_state(SaeState::Committed);
                }
            }
            SaeState::Committed => {
                if self.keys.is_some() && self.is_current_peer_commit(&commit) {
                    // The peer did not receive our commit yet.
                    if !self.sync_limit_reached(sink) {
                        self.sync += 1;
                        self.send_commit(sink)?;
                    }
                    return Ok(());
                }
                if self.handle_commit_outcome(sink, &commit)? {
                    self.send_confirm(sink)?;
                    self.set_state(SaeState::Confirmed);
                }
            }
            SaeState::Confirmed => {
                if self.sync_limit_reached(sink) {
                    return Ok(());
                }
                if !self.is_current_peer_commit(&commit)
                    && !self.handle_commit_outcome(sink, &commit)?
                {
                    return Ok(());
                }
                self.sync += 1;
                self.send_commit(sink)?;
                self.send_confirm(sink)?;
            }
            SaeState::Accepted => {
                let scalar = BigUint::from_bytes_be(&commit.scalar[..]);
                if self.accepted_peer_scalar.as_ref() == Some(&scalar) {
                    debug!("dropping replayed commit of {}", self.peer_addr.to_mac_str());
                    return Ok(());
                }
                info!("SAE {}: new commit in Accepted, restarting", self.peer_addr.to_mac_str());
                self.reset();
                return self.on_commit(sink, frame);
            }
        }
        Ok(())
    }

    fn is_current_peer_commit(&self, commit: &Commit) -> bool {
        let scalar = self.peer_scalar.as_ref().map(|s| to_fixed_bytes(s, PRIME_LEN));
        let element = self.peer_element.as_ref().and_then(|e| self.curve.point_to_bytes(e));
        scalar.as_ref() == Some(&commit.scalar) && element.as_ref() == Some(&commit.element)
    }

    /// Returns true if the commit was accepted and the exchange continues.
    fn handle_commit_outcome(
        &mut self,
        sink: &mut UpdateSink,
        commit: &Commit,
    ) -> Result<bool, Error> {
        match self.process_commit(commit)? {
            CommitOutcome::Accepted => Ok(true),
            CommitOutcome::Reflection => {
                warn!("SAE {}: reflected commit; dropping", self.peer_addr.to_mac_str());
                Ok(false)
            }
            CommitOutcome::Replayed => {
                debug!("dropping replayed commit of {}", self.peer_addr.to_mac_str());
                Ok(false)
            }
            CommitOutcome::Rejected(status) => {
                let body = if status == StatusCode::UNSUPPORTED_FINITE_CYCLIC_GROUP {
                    frame::write_group_rejection(commit.group_id)
                } else {
                    vec![]
                };
                self.reject(sink, COMMIT_SEQ, status, body)?;
                Ok(false)
            }
        }
    }

    fn on_confirm(&mut self, sink: &mut UpdateSink, frame: &AuthFrame) -> Result<(), Error> {
        if frame.status != StatusCode::SUCCESS {
            if self.is_pending() {
                self.on_peer_rejection(sink, frame.status, &[]);
            }
            return Ok(());
        }
        let confirm = match Confirm::parse(&frame.body[..]) {
            Ok(confirm) => confirm,
            Err(e) => {
                warn!("dropping malformed confirm: {}", e);
                return Ok(());
            }
        };

        match self.state {
            SaeState::Nothing => {
                debug!("dropping confirm in Nothing");
            }
            SaeState::Committed if self.keys.is_none() => {
                debug!("dropping confirm before the peer's commit");
            }
            SaeState::Committed | SaeState::Confirmed => {
                if !self.check_confirm(&confirm)? {
                    warn!("SAE {}: confirm mismatch", self.peer_addr.to_mac_str());
                    return self.reject(sink, CONFIRM_SEQ, StatusCode::CHALLENGE_FAILURE, vec![]);
                }
                self.rc = confirm.send_confirm;
                if self.state == SaeState::Committed {
                    self.send_confirm(sink)?;
                }
                self.accepted_peer_scalar = self.peer_scalar.clone();
                self.send_confirm = SEND_CONFIRM_MAX;
                self.sync = 0;
                self.set_state(SaeState::Accepted);
                self.push_status(sink, SecAssocStatus::SaeAccepted);
            }
            SaeState::Accepted => {
                if confirm.send_confirm <= self.rc || confirm.send_confirm == SEND_CONFIRM_MAX {
                    debug!("dropping confirm with stale send-confirm {}", confirm.send_confirm);
                    return Ok(());
                }
                if !self.check_confirm(&confirm)? {
                    debug!("dropping unverifiable confirm in Accepted");
                    return Ok(());
                }
                self.rc = confirm.send_confirm;
                self.send_confirm = SEND_CONFIRM_MAX;
                self.send_confirm(sink)?;
            }
        }
        Ok(())
    }

    fn on_token_request(&mut self, sink: &mut UpdateSink, body: &[u8]) -> Result<(), Error> {
        if self.state != SaeState::Committed {
            debug!("dropping unexpected anti-clogging token request");
            return Ok(());
        }
        match frame::parse_token_request(body, self.h2e()) {
            Ok((GROUP_ID, token)) => {
                info!("SAE {}: anti-clogging token requested", self.peer_addr.to_mac_str());
                self.token = Some(token);
                self.push_status(sink, SecAssocStatus::SaeAntiCloggingTriggered);
                self.send_commit(sink)
            }
            Ok((group, _)) => {
                warn!("token request for unexpected group {}", group);
                self.on_peer_rejection(sink, StatusCode::REFUSED_REASON_UNSPECIFIED, &[]);
                Ok(())
            }
            Err(status) => {
                warn!("malformed anti-clogging token request");
                self.on_peer_rejection(sink, status, &[]);
                Ok(())
            }
        }
    }

    fn on_peer_rejection(&mut self, sink: &mut UpdateSink, status: StatusCode, body: &[u8]) {
        if !self.is_pending() {
            debug!("dropping rejection {:?} in {:?}", status, self.state);
            return;
        }
        if status == StatusCode::UNSUPPORTED_FINITE_CYCLIC_GROUP && body.len() >= 2 {
            let group = u16::from_le_bytes([body[0], body[1]]);
            if !self.rejected_groups.contains(&group) {
                self.rejected_groups.push(group);
            }
        }
        warn!("SAE {}: rejected by peer: {:?}", self.peer_addr.to_mac_str(), status);
        self.reset();
        self.push_status(sink, SecAssocStatus::SaeRejected(status));
    }

    fn reject(
        &mut self,
        sink: &mut UpdateSink,
        transaction_seq: u16,
        status: StatusCode,
        body: Vec<u8>,
    ) -> Result<(), Error> {
        warn!("SAE {}: rejecting with {:?}", self.peer_addr.to_mac_str(), status);
        let frame = AuthFrame { transaction_seq, status, body };
        sink.push(SecAssocUpdate::TxSaeFrame { dst: self.peer_addr, frame });
        self.reset();
        self.push_status(sink, SecAssocStatus::SaeRejected(status));
        Ok(())
    }

    fn send_commit(&mut self, sink: &mut UpdateSink) -> Result<(), Error> {
        let frame = self.commit_frame()?;
        sink.push(SecAssocUpdate::TxSaeFrame { dst: self.peer_addr, frame });
        Ok(())
    }

    fn send_confirm(&mut self, sink: &mut UpdateSink) -> Result<(), Error> {
        let frame = self.confirm_frame()?;
        sink.push(SecAssocUpdate::TxSaeFrame { dst: self.peer_addr, frame });
        Ok(())
    }

    fn push_status(&self, sink: &mut UpdateSink, status: SecAssocStatus) {
        sink.push(SecAssocUpdate::Status { addr: self.peer_addr, status });
    }
}
