// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::group::Group;
use super::AuthenticatorTimeout;
use crate::config::AuthenticatorConfig;
use crate::crypto_utils::nonce::{Nonce, NonceReader};
use crate::key::exchange::handshake::fourway::authenticator::{
    check_message_2_elements, create_message_1, create_message_3, verify_message_2,
    verify_message_4, GroupKeys,
};
use crate::key::exchange::handshake::fourway::{classify_supplicant_message, SupplicantMessage};
use crate::key::exchange::handshake::group_key;
use crate::key::exchange::handshake::InstalledKeys;
use crate::key::exchange::{verify_mic, Key};
use crate::key::ptk::Ptk;
use crate::rsna::replay::KeyReplayRing;
use crate::rsna::{
    NegotiatedProtection, ProtectionType, SecAssocStatus, SecAssocUpdate, UpdateSink,
};
use crate::timer::{EventId, Timer};
use crate::Error;
use eapol::{KeyFrame, KeyType};
use log::{error, info, warn};
use wlan_common::ie::rsn::pmkid::Pmkid;
use wlan_common::mac::mgmt::ReasonCode;
use wlan_common::mac::{MacAddr, MacFmt};
use zeroize::Zeroize;

// IEEE Std 802.11-2016, C.3 (PTK state machine)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PtkState {
    /// Waiting for a PMK, for example from an 802.1X exchange.
    InitPmk,
    /// Message 1 was sent.
    PtkStart,
    /// Message 3 was sent.
    PtkInitNegotiating,
    PtkInitDone,
    Disconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKeyState {
    Idle,
    /// Group message 1 was sent.
    RekeyNegotiating,
}

/// What the Authenticator has to do after a station processed an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StationOutcome {
    None,
    /// The station acknowledged the current GTK.
    GroupKeyDone,
    /// The station asked for a new GTK.
    GroupRekeyRequested,
    /// The station was deauthenticated and must be forgotten.
    Disconnected,
}

/// State of the BSS every station shares.
pub struct Context<'a> {
    pub cfg: &'a AuthenticatorConfig,
    pub aa: MacAddr,
    pub a_protection_ie: &'a [u8],
    pub a_rsnxe: Option<&'a [u8]>,
    pub nonce_rdr: &'a NonceReader,
    pub group: &'a Group,
    pub timer: &'a mut Timer<AuthenticatorTimeout>,
}

/// Key exchange state of one associated station.
pub struct Station {
    addr: MacAddr,
    protection: NegotiatedProtection,
    s_protection_ie: Vec<u8>,
    s_rsnxe: Option<Vec<u8>>,
    pmk: Option<Vec<u8>>,
    pmkid: Option<Pmkid>,
    anonce: Nonce,
    tptk: Option<Ptk>,
    ptk: Option<Ptk>,
    ptk_state: PtkState,
    group_state: GroupKeyState,
    ring: KeyReplayRing,
    pairwise_attempts: u32,
    group_attempts: u32,
    retransmit: Option<EventId>,
    // Highest replay counter of an accepted EAPOL-Key request.
    request_counter: Option<u64>,
    installed: InstalledKeys,
    // A new GTK was derived while message 3 carrying the old one was outstanding.
    needs_group_update: bool,
    established_reported: bool,
}

impl std::fmt::Debug for Station {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Station")
            .field("addr", &self.addr.to_mac_str())
            .field("ptk_state", &self.ptk_state)
            .field("group_state", &self.group_state)
            .field("ring", &self.ring)
            .finish()
    }
}

impl Drop for Station {
    fn drop(&mut self) {
        self.pmk.zeroize();
    }
}

impl Station {
    pub fn new(
        addr: MacAddr,
        protection: NegotiatedProtection,
        s_protection_ie: Vec<u8>,
        s_rsnxe: Option<Vec<u8>>,
    ) -> Self {
        Station {
            addr,
            protection,
            s_protection_ie,
            s_rsnxe,
            pmk: None,
            pmkid: None,
            anonce: [0u8; 32],
            tptk: None,
            ptk: None,
            ptk_state: PtkState::InitPmk,
            group_state: GroupKeyState::Idle,
            ring: KeyReplayRing::default(),
            pairwise_attempts: 0,
            group_attempts: 0,
            retransmit: None,
            request_counter: None,
            installed: InstalledKeys::default(),
            needs_group_update: false,
            established_reported: false,
        }
    }

    pub fn addr(&self) -> &MacAddr {
        &self.addr
    }

    pub fn protection(&self) -> &NegotiatedProtection {
        &self.protection
    }

    pub fn ptk_state(&self) -> PtkState {
        self.ptk_state
    }

    pub fn group_state(&self) -> GroupKeyState {
        self.group_state
    }

    pub fn ptk(&self) -> Option<&Ptk> {
        self.ptk.as_ref()
    }

    pub fn set_pmk(&mut self, pmk: Vec<u8>, pmkid: Option<Pmkid>) {
        self.pmk.zeroize();
        self.pmk = Some(pmk);
        self.pmkid = pmkid;
    }

    pub fn pmkid(&self) -> Option<&Pmkid> {
        self.pmkid.as_ref()
    }

    /// Stops naming a PMKSA which left the cache. The PMK itself stays in use.
    pub fn forget_pmkid(&mut self, pmkid: &Pmkid) -> bool {
        if self.pmkid.as_ref() == Some(pmkid) {
            self.pmkid = None;
            true
        } else {
            false
        }
    }

    /// Starts a new 4-Way Handshake. The current PTK stays in use until its successor is
    /// installed.
    pub fn start_fourway(
        &mut self,
        update_sink: &mut UpdateSink,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        if self.pmk.is_none() {
            return Err(Error::PmksaNotEstablished);
        }
        if self.group_state == GroupKeyState::RekeyNegotiating {
            self.group_state = GroupKeyState::Idle;
            self.needs_group_update = true;
        }
        self.ptk_state = PtkState::PtkStart;
        self.anonce = ctx.nonce_rdr.next();
        self.tptk = None;
        self.pairwise_attempts = 0;
        info!("starting 4-Way Handshake with {}", self.addr.to_mac_str());
        self.send_message_1(update_sink, ctx)
    }

    fn schedule_retransmit(&mut self, ctx: &mut Context<'_>) {
        self.cancel_retransmit(ctx.timer);
        let event = AuthenticatorTimeout::Eapol(self.addr);
        let id = ctx.timer.schedule_event(ctx.cfg.eapol_timeout(), event);
        self.retransmit = Some(id);
    }

    pub fn cancel_retransmit(&mut self, timer: &mut Timer<AuthenticatorTimeout>) {
        if let Some(id) = self.retransmit.take() {
            timer.cancel_event(id);
        }
    }

    fn send(&mut self, update_sink: &mut UpdateSink, ctx: &mut Context<'_>, frame: KeyFrame) {
        update_sink.push(SecAssocUpdate::TxEapolKeyFrame { dst: self.addr, frame, tag: None });
        self.schedule_retransmit(ctx);
    }

    fn send_message_1(
        &mut self,
        update_sink: &mut UpdateSink,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        let counter = self.ring.next();
        let pmkid = self.pmkid.as_ref().map(|pmkid| &pmkid[..]);
        let msg1 = create_message_1(&self.protection, &self.anonce, counter, pmkid)?;
        self.pairwise_attempts += 1;
        self.send(update_sink, ctx, msg1);
        Ok(())
    }

    fn send_message_3(
        &mut self,
        update_sink: &mut UpdateSink,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        let tptk = self.tptk.as_ref().ok_or(Error::PtksaNotEstablished)?;
        let igtk = self.protection.group_mgmt.and_then(|_| ctx.group.igtk());
        let counter = self.ring.next();
        let msg3 = create_message_3(
            &self.protection,
            tptk,
            &self.anonce,
            counter,
            ctx.a_protection_ie,
            ctx.a_rsnxe,
            GroupKeys { gtk: Some(ctx.group.gtk()), igtk },
        )?;
        self.pairwise_attempts += 1;
        self.send(update_sink, ctx, msg3);
        Ok(())
    }

    fn send_group_message_1(
        &mut self,
        update_sink: &mut UpdateSink,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        let ptk = self.ptk.as_ref().ok_or(Error::PtksaNotEstablished)?;
        let igtk = self.protection.group_mgmt.and_then(|_| ctx.group.igtk());
        let counter = self.ring.next();
        let msg1 = group_key::authenticator::create_message_1(
            &self.protection,
            ptk,
            ctx.group.gnonce(),
            counter,
            ctx.group.gtk(),
            igtk,
        )?;
        self.group_attempts += 1;
        self.send(update_sink, ctx, msg1);
        Ok(())
    }

    fn start_group_handshake(
        &mut self,
        update_sink: &mut UpdateSink,
        ctx: &mut Context<'_>,
    ) -> Result<(), Error> {
        self.group_state = GroupKeyState::RekeyNegotiating;
        self.group_attempts = 0;
        self.needs_group_update = false;
        self.send_group_message_1(update_sink, ctx)
    }

    /// Delivers the current GTK. Returns true if the rekey has to wait for this station.
    pub fn start_group_rekey(
        &mut self,
        update_sink: &mut UpdateSink,
        ctx: &mut Context<'_>,
    ) -> Result<bool, Error> {
        match self.ptk_state {
            PtkState::PtkInitDone => {
                self.start_group_handshake(update_sink, ctx)?;
                Ok(true)
            }
            // Message 3 carried the previous GTK.
            PtkState::PtkInitNegotiating => {
                self.needs_group_update = true;
                Ok(true)
            }
            // Message 3 will carry the new GTK.
            PtkState::PtkStart | PtkState::InitPmk | PtkState::Disconnected => Ok(false),
        }
    }

    pub fn disconnect(
        &mut self,
        update_sink: &mut UpdateSink,
        timer: &mut Timer<AuthenticatorTimeout>,
        reason: ReasonCode,
    ) {
        info!("disconnecting {}: reason {}", self.addr.to_mac_str(), reason.0);
        self.cancel_retransmit(timer);
        self.ptk_state = PtkState::Disconnected;
        self.group_state = GroupKeyState::Idle;
        self.tptk = None;
        self.ptk = None;
        self.installed.clear();
        update_sink.push(SecAssocUpdate::Deauthenticate { addr: self.addr, reason });
    }

    pub fn on_eapol_key_frame(
        &mut self,
        update_sink: &mut UpdateSink,
        ctx: &mut Context<'_>,
        frame: &KeyFrame,
    ) -> Result<StationOutcome, Error> {
        self.protection.check_key_frame(frame, &ctx.cfg.compat)?;
        match classify_supplicant_message(frame) {
            SupplicantMessage::Pairwise2 => self.on_message_2(update_sink, ctx, frame),
            SupplicantMessage::Pairwise4 => self.on_message_4(update_sink, ctx, frame),
            SupplicantMessage::Group2 => self.on_group_message_2(update_sink, ctx, frame),
            SupplicantMessage::Request => self.on_request(update_sink, ctx, frame),
        }
    }

    // IEEE Std 802.11-2016, 12.7.6.3
    fn on_message_2(
        &mut self,
        update_sink: &mut UpdateSink,
        ctx: &mut Context<'_>,
        frame: &KeyFrame,
    ) -> Result<StationOutcome, Error> {
        let counter = frame.key_replay_counter;
        // While message 3 is outstanding, message 2 may still answer an earlier message 1
        // with an updated SNonce.
        let snonce_update = match self.ptk_state {
            PtkState::PtkStart if self.ring.is_valid(counter) => false,
            PtkState::PtkInitNegotiating if self.ring.is_valid_prev(counter) => true,
            PtkState::PtkStart | PtkState::PtkInitNegotiating => {
                return Err(Error::InvalidKeyReplayCounter(counter, self.ring.current()));
            }
            _ => return Err(Error::UnexpectedHandshakeMessage("message 2 without message 1")),
        };

        let pmk = self.pmk.as_ref().ok_or(Error::PmksaNotEstablished)?;
        let ptk = verify_message_2(
            &self.protection,
            &pmk[..],
            &ctx.aa,
            &self.addr,
            &self.anonce,
            &frame.key_nonce,
            frame,
        )
        .map_err(|e| {
            warn!("cannot verify message 2 of {}: {}", self.addr.to_mac_str(), e);
            e
        })?;

        let s_rsnxe = self.s_rsnxe.as_ref().map(|ie| &ie[..]);
        if check_message_2_elements(&self.protection, &self.s_protection_ie[..], s_rsnxe, frame)
            .is_err()
        {
            error!(
                "protection element in message 2 differs from the association request of {}",
                self.addr.to_mac_str()
            );
            self.disconnect(update_sink, ctx.timer, ReasonCode::HANDSHAKE_ELEMENT_MISMATCH);
            update_sink.push(SecAssocUpdate::Status {
                addr: self.addr,
                status: SecAssocStatus::ProtectionIeMismatch,
            });
            return Ok(StationOutcome::Disconnected);
        }

        if snonce_update {
            info!("{} updated its SNonce", self.addr.to_mac_str());
            self.ring.mark_prev_invalid(counter);
        } else {
            self.ring.snapshot_prev();
        }
        self.tptk = Some(ptk);
        self.ptk_state = PtkState::PtkInitNegotiating;
        self.pairwise_attempts = 0;
        self.send_message_3(update_sink, ctx)?;
        Ok(StationOutcome::None)
    }

    // IEEE Std 802.11-2016, 12.7.6.5
    fn on_message_4(
        &mut self,
        update_sink: &mut UpdateSink,
        ctx: &mut Context<'_>,
        frame: &KeyFrame,
    ) -> Result<StationOutcome, Error> {
        let counter = frame.key_replay_counter;
        if self.ptk_state != PtkState::PtkInitNegotiating {
            return Err(Error::UnexpectedHandshakeMessage("message 4 without message 3"));
        }
        if !self.ring.is_valid(counter) {
            return Err(Error::InvalidKeyReplayCounter(counter, self.ring.current()));
        }
        let tptk = self.tptk.as_ref().ok_or(Error::PtksaNotEstablished)?;
        verify_message_4(&self.protection, tptk, frame)?;

        self.ring.invalidate_all();
        self.cancel_retransmit(ctx.timer);
        let ptk = match self.tptk.take() {
            Some(ptk) => ptk,
            None => return Err(Error::PtksaNotEstablished),
        };
        self.installed.install(update_sink, self.addr, Key::Ptk(ptk.clone()));
        self.ptk = Some(ptk);
        self.ptk_state = PtkState::PtkInitDone;
        self.pairwise_attempts = 0;
        self.request_counter = None;
        info!("4-Way Handshake with {} completed", self.addr.to_mac_str());

        match self.protection.protection_type {
            ProtectionType::Rsne => {
                self.established_reported = true;
                update_sink.push(SecAssocUpdate::Status {
                    addr: self.addr,
                    status: SecAssocStatus::EssSaEstablished,
                });
                if self.needs_group_update {
                    self.start_group_handshake(update_sink, ctx)?;
                }
            }
            // WPA1 delivers the GTK in a Group Key Handshake right away.
            ProtectionType::LegacyWpa1 => self.start_group_handshake(update_sink, ctx)?,
        }
        Ok(StationOutcome::None)
    }

    // IEEE Std 802.11-2016, 12.7.7.3
    fn on_group_message_2(
        &mut self,
        update_sink: &mut UpdateSink,
        ctx: &mut Context<'_>,
        frame: &KeyFrame,
    ) -> Result<StationOutcome, Error> {
        let counter = frame.key_replay_counter;
        if self.group_state != GroupKeyState::RekeyNegotiating {
            return Err(Error::UnexpectedHandshakeMessage("group message 2 without message 1"));
        }
        if !self.ring.is_valid(counter) {
            return Err(Error::InvalidKeyReplayCounter(counter, self.ring.current()));
        }
        let ptk = self.ptk.as_ref().ok_or(Error::PtksaNotEstablished)?;
        group_key::authenticator::verify_message_2(&self.protection, ptk, frame)?;

        self.ring.invalidate_all();
        self.cancel_retransmit(ctx.timer);
        self.group_state = GroupKeyState::Idle;
        self.group_attempts = 0;
        if !self.established_reported {
            self.established_reported = true;
            update_sink.push(SecAssocUpdate::Status {
                addr: self.addr,
                status: SecAssocStatus::EssSaEstablished,
            });
        }
        Ok(StationOutcome::GroupKeyDone)
    }

    // IEEE Std 802.11-2016, 12.7.7.4 and 12.7.8
    fn on_request(
        &mut self,
        update_sink: &mut UpdateSink,
        ctx: &mut Context<'_>,
        frame: &KeyFrame,
    ) -> Result<StationOutcome, Error> {
        let ptk = self.ptk.as_ref().ok_or(Error::PtksaNotEstablished)?;
        verify_mic(ptk.kck(), &self.protection, frame)?;
        let counter = frame.key_replay_counter;
        if let Some(last) = self.request_counter {
            if counter <= last {
                return Err(Error::InvalidKeyReplayCounter(counter, last));
            }
        }
        self.request_counter = Some(counter);

        let pairwise = frame.key_info.key_type() == KeyType::Pairwise;
        if frame.key_info.error() {
            warn!("{} reported a MIC failure", self.addr.to_mac_str());
            update_sink.push(SecAssocUpdate::Status {
                addr: self.addr,
                status: SecAssocStatus::MicFailureReported { pairwise },
            });
            Ok(StationOutcome::None)
        } else if pairwise {
            self.start_fourway(update_sink, ctx)?;
            Ok(StationOutcome::None)
        } else {
            Ok(StationOutcome::GroupRekeyRequested)
        }
    }

    /// The retransmission timer of the outstanding EAPOL-Key frame expired.
    pub fn on_timeout(
        &mut self,
        update_sink: &mut UpdateSink,
        ctx: &mut Context<'_>,
    ) -> Result<StationOutcome, Error> {
        self.retransmit = None;
        match self.ptk_state {
            PtkState::PtkStart | PtkState::PtkInitNegotiating => {
                if self.pairwise_attempts >= ctx.cfg.pairwise_update_count {
                    error!("4-Way Handshake with {} timed out", self.addr.to_mac_str());
                    self.disconnect(
                        update_sink,
                        ctx.timer,
                        ReasonCode::FOURWAY_HANDSHAKE_TIMEOUT,
                    );
                    update_sink.push(SecAssocUpdate::Status {
                        addr: self.addr,
                        status: SecAssocStatus::HandshakeTimeout,
                    });
                    return Ok(StationOutcome::Disconnected);
                }
                if self.ptk_state == PtkState::PtkStart {
                    self.send_message_1(update_sink, ctx)?;
                } else {
                    self.send_message_3(update_sink, ctx)?;
                }
            }
            PtkState::PtkInitDone if self.group_state == GroupKeyState::RekeyNegotiating => {
                if self.group_attempts >= ctx.cfg.group_update_count {
                    error!("Group Key Handshake with {} timed out", self.addr.to_mac_str());
                    self.disconnect(update_sink, ctx.timer, ReasonCode::GK_HANDSHAKE_TIMEOUT);
                    update_sink.push(SecAssocUpdate::Status {
                        addr: self.addr,
                        status: SecAssocStatus::GroupKeyHandshakeTimeout,
                    });
                    return Ok(StationOutcome::Disconnected);
                }
                self.send_group_message_1(update_sink, ctx)?;
            }
            _ => (),
        }
        Ok(StationOutcome::None)
    }
}
