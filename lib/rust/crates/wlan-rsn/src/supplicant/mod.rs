// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::config::SupplicantConfig;
use crate::crypto_utils::nonce::NonceReader;
use crate::key::exchange::handshake::fourway::supplicant::{Config as FourwayConfig, Fourway};
use crate::key::exchange::handshake::group_key::{self, supplicant::handle_message_1};
use crate::key::exchange::handshake::{key_info, new_key_frame, InstalledKeys};
use crate::key::exchange::{update_mic, Key};
use crate::key::ptk::Ptk;
use crate::pmksa::SharedPmksaCache;
use crate::psk;
use crate::rsna::replay::ReplayCounter;
use crate::rsna::{SecAssocStatus, SecAssocUpdate, TxTag, UpdateSink};
use crate::Error;
use eapol::{KeyFrame, KeyType};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Instant;
use wlan_common::mac::mgmt::ReasonCode;
use wlan_common::mac::{MacAddr, MacFmt};

/// The station side of an ESS security association. Drives the 4-Way and Group Key
/// Handshakes with a single Authenticator and reports keys and status changes through an
/// `UpdateSink`.
pub struct Supplicant {
    cfg: SupplicantConfig,
    fourway: Fourway,
    replay_counter: ReplayCounter,
    installed: InstalledKeys,
    next_tag: u64,
    // Replay counter of EAPOL-Key requests. Strictly increasing for the lifetime of the PTK.
    request_counter: u64,
    last_mic_failure: Option<Instant>,
}

impl std::fmt::Debug for Supplicant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supplicant")
            .field("a_addr", &self.fourway.config().a_addr.to_mac_str())
            .field("established", &self.is_established())
            .field("replay_counter", &self.replay_counter)
            .finish()
    }
}

impl Supplicant {
    pub fn new(
        cfg: SupplicantConfig,
        mut fourway_cfg: FourwayConfig,
        pmk: Vec<u8>,
        nonce_rdr: Arc<NonceReader>,
    ) -> Result<Supplicant, Error> {
        cfg.validate()?;
        if pmk.len() != 32 && pmk.len() != 48 {
            return Err(Error::InvalidPmkLength(pmk.len()));
        }
        fourway_cfg.compat = cfg.compat;
        fourway_cfg.max_msg1_retries = cfg.max_msg1_retries;
        info!("spawned supplicant for {}", fourway_cfg.a_addr.to_mac_str());
        Ok(Supplicant {
            cfg,
            fourway: Fourway::new(fourway_cfg, pmk, nonce_rdr),
            replay_counter: ReplayCounter::default(),
            installed: InstalledKeys::default(),
            next_tag: 0,
            request_counter: 0,
            last_mic_failure: None,
        })
    }

    /// Derives the PMK from a WPA passphrase or a hex encoded PSK.
    pub fn new_wpa_personal(
        cfg: SupplicantConfig,
        fourway_cfg: FourwayConfig,
        passphrase: &[u8],
        ssid: &[u8],
        nonce_rdr: Arc<NonceReader>,
    ) -> Result<Supplicant, Error> {
        let psk = psk::compute(passphrase, ssid)?;
        Self::new(cfg, fourway_cfg, psk.to_vec(), nonce_rdr)
    }

    /// Resumes a PMKSA cached for the Authenticator, e.g. from an earlier SAE exchange. The
    /// PMKSA becomes the current one of the Authenticator. The caller names its PMKID in the
    /// RSNE of the association request.
    pub fn from_pmksa(
        cfg: SupplicantConfig,
        fourway_cfg: FourwayConfig,
        pmksa: &SharedPmksaCache,
        now: Instant,
        nonce_rdr: Arc<NonceReader>,
    ) -> Result<Supplicant, Error> {
        let a_addr = fourway_cfg.a_addr;
        let pmk = {
            let mut pmksa = pmksa.lock();
            let (pmk, pmkid) = match pmksa.get(&a_addr, None, now) {
                Some(entry) => (entry.pmk().to_vec(), entry.pmkid.clone()),
                None => {
                    warn!("no cached PMKSA for {}", a_addr.to_mac_str());
                    return Err(Error::PmksaNotEstablished);
                }
            };
            pmksa.set_current(&a_addr, Some(&pmkid[..]), now)?;
            pmk
        };
        info!("resuming cached PMKSA with {}", a_addr.to_mac_str());
        Self::new(cfg, fourway_cfg, pmk, nonce_rdr)
    }

    fn a_addr(&self) -> MacAddr {
        self.fourway.config().a_addr
    }

    /// Resets all state and waits for message 1 of the Authenticator.
    pub fn start(&mut self) {
        self.reset();
        info!("establishing ESSSA with {}", self.a_addr().to_mac_str());
    }

    pub fn reset(&mut self) {
        self.fourway.reset();
        self.replay_counter = ReplayCounter::default();
        self.installed.clear();
        self.request_counter = 0;
    }

    pub fn is_established(&self) -> bool {
        self.fourway.ptk().is_some()
    }

    pub fn ptk(&self) -> Option<&Ptk> {
        self.fourway.ptk()
    }

    fn next_tag(&mut self) -> TxTag {
        self.next_tag += 1;
        TxTag(self.next_tag)
    }

    /// Parses and processes a complete EAPOL frame received from the Authenticator.
    pub fn on_eapol_frame(
        &mut self,
        update_sink: &mut UpdateSink,
        bytes: &[u8],
    ) -> Result<(), Error> {
        let mic_size = self.fourway.config().protection.mic_size as usize;
        let frame = eapol::parse_key_frame(bytes, mic_size)?;
        self.on_eapol_key_frame(update_sink, &frame)
    }

    pub fn on_eapol_key_frame(
        &mut self,
        update_sink: &mut UpdateSink,
        frame: &KeyFrame,
    ) -> Result<(), Error> {
        // IEEE Std 802.11-2016, 12.7.2 b.2)
        self.replay_counter.check(frame.key_replay_counter)?;

        match frame.key_info.key_type() {
            KeyType::Pairwise => {
                let tag = self.next_tag();
                let result = self.fourway.on_eapol_key_frame(
                    update_sink,
                    &mut self.replay_counter,
                    &mut self.installed,
                    frame,
                    tag,
                );
                match result {
                    Err(Error::WrongAesKeywrapKey) | Err(Error::InvalidMic)
                        if !self.is_established() =>
                    {
                        warn!("cannot verify message 3; the password is likely wrong");
                        update_sink.push(SecAssocUpdate::Status {
                            addr: self.a_addr(),
                            status: SecAssocStatus::WrongPassword,
                        });
                        Ok(())
                    }
                    other => other,
                }
            }
            KeyType::Group => self.on_group_key_frame(update_sink, frame),
        }
    }

    fn on_group_key_frame(
        &mut self,
        update_sink: &mut UpdateSink,
        frame: &KeyFrame,
    ) -> Result<(), Error> {
        if !group_key::is_message_1(frame) {
            return Err(Error::UnexpectedHandshakeMessage("not a Group Key Handshake message"));
        }
        let a_addr = self.a_addr();
        let fourway_cfg = self.fourway.config();
        let ptk = self.fourway.ptk().ok_or(Error::PtksaNotEstablished)?;
        let update = handle_message_1(
            &fourway_cfg.protection,
            &fourway_cfg.compat,
            ptk,
            &mut self.replay_counter,
            frame,
        )?;

        self.installed.install(update_sink, a_addr, Key::Gtk(update.gtk));
        if let Some(igtk) = update.igtk {
            self.installed.install(update_sink, a_addr, Key::Igtk(igtk));
        }
        update_sink.push(SecAssocUpdate::TxEapolKeyFrame {
            dst: a_addr,
            frame: update.msg2,
            tag: None,
        });
        info!("group key updated by {}", a_addr.to_mac_str());
        Ok(())
    }

    /// Reports the delivery of a frame handed to the device earlier.
    pub fn on_eapol_conf(&mut self, update_sink: &mut UpdateSink, tag: TxTag, acked: bool) {
        if self.fourway.on_eapol_conf(update_sink, &mut self.installed, tag, acked) {
            info!("established ESSSA with {}", self.a_addr().to_mac_str());
        }
    }

    // IEEE Std 802.11-2016, 12.7.7.4 and 12.7.8
    fn send_request(
        &mut self,
        update_sink: &mut UpdateSink,
        key_type: KeyType,
        error: bool,
    ) -> Result<(), Error> {
        let a_addr = self.a_addr();
        let protection = &self.fourway.config().protection;
        let ptk = self.fourway.ptk().ok_or(Error::PtksaNotEstablished)?;

        let mut info = key_info(protection.key_descriptor_version(), key_type);
        info.set_key_mic(true);
        info.set_secure(true);
        info.set_request(true);
        info.set_error(error);
        self.request_counter += 1;
        let mut frame = new_key_frame(
            protection.descriptor_type(),
            info,
            0,
            self.request_counter,
            [0u8; 32],
            protection.mic_size as usize,
            vec![],
        );
        update_mic(ptk.kck(), protection, &mut frame)?;
        update_sink.push(SecAssocUpdate::TxEapolKeyFrame { dst: a_addr, frame, tag: None });
        Ok(())
    }

    /// Asks the Authenticator to start a new 4-Way Handshake.
    pub fn request_ptk_rekey(&mut self, update_sink: &mut UpdateSink) -> Result<(), Error> {
        self.send_request(update_sink, KeyType::Pairwise, false)
    }

    /// Reports a Michael MIC failure detected by the device. A second failure within the
    /// configured window starts countermeasures: the association is torn down.
    pub fn report_mic_failure(
        &mut self,
        update_sink: &mut UpdateSink,
        pairwise: bool,
        now: Instant,
    ) -> Result<(), Error> {
        let key_type = if pairwise { KeyType::Pairwise } else { KeyType::Group };
        self.send_request(update_sink, key_type, true)?;
        let a_addr = self.a_addr();
        update_sink.push(SecAssocUpdate::Status {
            addr: a_addr,
            status: SecAssocStatus::MicFailureReported { pairwise },
        });

        let within_window = self.last_mic_failure.map_or(false, |last| {
            now.saturating_duration_since(last) < self.cfg.mic_failure_window()
        });
        if !within_window {
            self.last_mic_failure = Some(now);
            return Ok(());
        }

        error!("second MIC failure within window; starting countermeasures");
        self.last_mic_failure = None;
        self.reset();
        update_sink.push(SecAssocUpdate::Status {
            addr: a_addr,
            status: SecAssocStatus::CountermeasuresStarted,
        });
        update_sink.push(SecAssocUpdate::Deauthenticate {
            addr: a_addr,
            reason: ReasonCode::MIC_FAILURE,
        });
        Ok(())
    }
}
