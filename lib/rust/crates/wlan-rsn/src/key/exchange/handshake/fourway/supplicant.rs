// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils::ct_eq;
use crate::crypto_utils::nonce::{Nonce, NonceReader};
use crate::key::exchange::handshake::fourway::{self, MessageNumber};
use crate::key::exchange::handshake::{key_info, new_key_frame, InstalledKeys};
use crate::key::exchange::{decrypt_key_data, update_mic, verify_mic, Key};
use crate::key::gtk::Gtk;
use crate::key::igtk::Igtk;
use crate::key::ptk::Ptk;
use crate::key_data::{self, kde, Element};
use crate::rsna::replay::ReplayCounter;
use crate::rsna::{
    Compat, NegotiatedProtection, ProtectionType, SecAssocStatus, SecAssocUpdate, TxTag,
    UpdateSink,
};
use crate::Error;
use eapol::{KeyFrame, KeyType};
use log::{debug, error, info, warn};
use std::sync::Arc;
use wlan_common::ie::rsn::rsne;
use wlan_common::mac::mgmt::ReasonCode;
use wlan_common::mac::{MacAddr, MacFmt};

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub s_addr: MacAddr,
    pub a_addr: MacAddr,
    /// Protection element sent in the association request, encoded.
    pub s_protection_ie: Vec<u8>,
    /// Protection element the Authenticator advertised in its Beacon or Probe Response.
    pub a_protection_ie: Vec<u8>,
    pub s_rsnxe: Option<Vec<u8>>,
    pub a_rsnxe: Option<Vec<u8>>,
    pub protection: NegotiatedProtection,
    pub compat: Compat,
    /// Number of message 1 retransmissions tolerated while waiting for message 3.
    pub max_msg1_retries: u32,
}

// IEEE Std 802.11-2016, 12.7.6.2
fn handle_message_1(
    cfg: &Config,
    pmk: &[u8],
    snonce: &Nonce,
    msg1: &KeyFrame,
) -> Result<(KeyFrame, Ptk, Nonce), Error> {
    cfg.protection.check_key_frame(msg1, &cfg.compat)?;
    if cfg.protection.protection_type == ProtectionType::Rsne && !msg1.key_data.is_empty() {
        match key_data::extract_elements(&msg1.key_data[..]) {
            Ok(elements) => {
                if let Some(pmkid) = kde::pmkid_of(&elements[..]) {
                    debug!("message 1 carries PMKID {}", hex::encode(&pmkid[..]));
                }
            }
            Err(e) => debug!("ignoring malformed key data in message 1: {}", e),
        }
    }

    let anonce = msg1.key_nonce;
    let ptk = Ptk::new(
        pmk,
        &cfg.a_addr,
        &cfg.s_addr,
        &anonce[..],
        &snonce[..],
        &cfg.protection.akm,
        cfg.protection.pairwise,
    )?;
    let msg2 = create_message_2(cfg, ptk.kck(), msg1, snonce)?;
    Ok((msg2, ptk, anonce))
}

// IEEE Std 802.11-2016, 12.7.6.3
fn create_message_2(
    cfg: &Config,
    kck: &[u8],
    msg1: &KeyFrame,
    snonce: &Nonce,
) -> Result<KeyFrame, Error> {
    let protection = &cfg.protection;
    let mut info = key_info(protection.key_descriptor_version(), KeyType::Pairwise);
    info.set_key_mic(true);

    let mut key_data = cfg.s_protection_ie.clone();
    let key_len = match protection.protection_type {
        ProtectionType::Rsne => {
            if let Some(rsnxe) = cfg.s_rsnxe.as_ref() {
                key_data.extend_from_slice(&rsnxe[..]);
            }
            0
        }
        ProtectionType::LegacyWpa1 => msg1.key_len,
    };

    let mut msg2 = new_key_frame(
        protection.descriptor_type(),
        info,
        key_len,
        msg1.key_replay_counter,
        *snonce,
        protection.mic_size as usize,
        key_data,
    );
    update_mic(kck, protection, &mut msg2)?;
    Ok(msg2)
}

/// Group keys found in message 3.
#[derive(Debug, Default)]
struct Msg3Keys {
    gtk: Option<Gtk>,
    igtk: Option<Igtk>,
}

// IEEE Std 802.11-2016, 12.7.6.4
fn handle_message_3(
    cfg: &Config,
    ptk: &Ptk,
    anonce: &Nonce,
    replay_counter: &mut ReplayCounter,
    msg3: &KeyFrame,
) -> Result<(KeyFrame, Msg3Keys), Error> {
    let protection = &cfg.protection;
    protection.check_key_frame(msg3, &cfg.compat)?;
    verify_mic(ptk.kck(), protection, msg3)?;
    replay_counter.accept(msg3.key_replay_counter);

    if !ct_eq(&msg3.key_nonce[..], &anonce[..]) {
        return Err(Error::AnonceMismatch);
    }
    let tk_len = protection.pairwise.tk_bytes().ok_or(Error::UnsupportedCipherSuite)?;
    if msg3.key_len != tk_len {
        return Err(Error::InvalidKeyLen(tk_len, msg3.key_len));
    }

    let encrypted = msg3.key_info.encrypted_key_data();
    let key_data = if encrypted {
        decrypt_key_data(ptk.kek(), protection, &msg3.key_data[..])?
    } else {
        msg3.key_data.to_vec()
    };
    check_protection_elements(cfg, &key_data[..])?;

    let mut keys = Msg3Keys::default();
    for element in key_data::extract_elements(&key_data[..])? {
        match element {
            Element::Gtk(_, gtk) => {
                if !encrypted {
                    return Err(Error::UnencryptedKeyData);
                }
                if gtk.info.tx() != 0 && !cfg.compat.ignore_gtk_tx_bit {
                    warn!("GTK KDE requests Tx usage although a pairwise key is in use");
                    return Err(Error::InvalidKeyDataContent);
                }
                let key_id = gtk.info.key_id() as u8;
                let cipher = protection.group_data;
                keys.gtk = Some(Gtk::from_bytes(&gtk.gtk[..], key_id, cipher, msg3.key_rsc)?);
            }
            Element::Igtk(_, igtk) => {
                if !encrypted {
                    return Err(Error::UnencryptedKeyData);
                }
                match protection.group_mgmt {
                    Some(cipher) => {
                        keys.igtk =
                            Some(Igtk::from_bytes(&igtk.igtk[..], igtk.id, igtk.ipn, cipher)?);
                    }
                    None => debug!("ignoring IGTK KDE without management frame protection"),
                }
            }
            _ => (),
        }
    }

    let msg4 = create_message_4(cfg, ptk.kck(), msg3)?;
    Ok((msg4, keys))
}

/// The protection element in message 3 must be the one the Authenticator advertised.
/// A second RSNE may only announce the pairwise cipher which was negotiated.
fn check_protection_elements(cfg: &Config, key_data: &[u8]) -> Result<(), Error> {
    let ie = key_data::find_protection_ie(key_data).ok_or(Error::ProtectionIeMismatch)?;
    if ie != &cfg.a_protection_ie[..] {
        return Err(Error::ProtectionIeMismatch);
    }
    if cfg.protection.protection_type == ProtectionType::LegacyWpa1 {
        return Ok(());
    }

    if let Some(second) = key_data::find_second_rsne(key_data) {
        let second = rsne::parse(second).map_err(|_| Error::ProtectionIeMismatch)?;
        if second.pairwise_cipher_suites.first() != Some(&cfg.protection.pairwise) {
            return Err(Error::ProtectionIeMismatch);
        }
    }
    if key_data::find_rsnxe(key_data) != cfg.a_rsnxe.as_ref().map(|ie| &ie[..]) {
        return Err(Error::ProtectionIeMismatch);
    }
    Ok(())
}

// IEEE Std 802.11-2016, 12.7.6.5
fn create_message_4(cfg: &Config, kck: &[u8], msg3: &KeyFrame) -> Result<KeyFrame, Error> {
    let protection = &cfg.protection;
    let mut info = key_info(protection.key_descriptor_version(), KeyType::Pairwise);
    info.set_key_mic(true);
    let key_len = match protection.protection_type {
        ProtectionType::Rsne => {
            info.set_secure(true);
            0
        }
        ProtectionType::LegacyWpa1 => msg3.key_len,
    };

    let mut msg4 = new_key_frame(
        protection.descriptor_type(),
        info,
        key_len,
        msg3.key_replay_counter,
        [0u8; 32],
        protection.mic_size as usize,
        vec![],
    );
    update_mic(kck, protection, &mut msg4)?;
    Ok(msg4)
}

#[derive(Debug, PartialEq)]
pub enum State {
    AwaitingMsg1,
    AwaitingMsg3 { tptk: Ptk, anonce: Nonce, msg1_count: u32 },
    /// Message 4 was handed to the device. The PTK is installed once its delivery is confirmed.
    AwaitingMsg4Conf { ptk: Ptk, anonce: Nonce, tag: TxTag },
    Completed { ptk: Ptk, anonce: Nonce },
}

/// The Supplicant's side of the 4-Way Handshake. A new handshake starts whenever message 1
/// arrives, which also covers PTK rekeying. The PTK in use stays installed while a rekey is
/// negotiated and is only replaced once the new one is confirmed.
pub struct Fourway {
    cfg: Config,
    pmk: Vec<u8>,
    ptk: Option<Ptk>,
    nonce_rdr: Arc<NonceReader>,
    snonce: Nonce,
    renew_snonce: bool,
    state: State,
}

impl Fourway {
    pub fn new(cfg: Config, pmk: Vec<u8>, nonce_rdr: Arc<NonceReader>) -> Self {
        Fourway {
            cfg,
            pmk,
            ptk: None,
            nonce_rdr,
            snonce: [0u8; 32],
            renew_snonce: true,
            state: State::AwaitingMsg1,
        }
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// The PTK established by the last completed handshake. Remains available during a rekey.
    pub fn ptk(&self) -> Option<&Ptk> {
        self.ptk.as_ref()
    }

    pub fn is_completed(&self) -> bool {
        match self.state {
            State::Completed { .. } => true,
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.renew_snonce = true;
        self.ptk = None;
        self.state = State::AwaitingMsg1;
    }

    /// Processes message 1 or 3. The replay counter must have been checked by the caller;
    /// it is advanced here once a MIC was verified.
    pub fn on_eapol_key_frame(
        &mut self,
        update_sink: &mut UpdateSink,
        replay_counter: &mut ReplayCounter,
        installed: &mut InstalledKeys,
        frame: &KeyFrame,
        tag: TxTag,
    ) -> Result<(), Error> {
        match fourway::message_number(frame) {
            Some(MessageNumber::Message1) => self.on_message_1(update_sink, frame),
            Some(MessageNumber::Message3) => {
                self.on_message_3(update_sink, replay_counter, installed, frame, tag)
            }
            None => Err(Error::UnexpectedHandshakeMessage("not a 4-Way Handshake message")),
        }
    }

    fn on_message_1(
        &mut self,
        update_sink: &mut UpdateSink,
        frame: &KeyFrame,
    ) -> Result<(), Error> {
        let msg1_count = match &self.state {
            State::AwaitingMsg3 { msg1_count, .. } => msg1_count + 1,
            _ => 1,
        };
        if msg1_count > self.cfg.max_msg1_retries + 1 {
            error!(
                "message 3 of 4-Way Handshake not received after {} attempts from {}",
                msg1_count - 1,
                self.cfg.a_addr.to_mac_str()
            );
            self.reset();
            update_sink.push(SecAssocUpdate::Status {
                addr: self.cfg.a_addr,
                status: SecAssocStatus::HandshakeTimeout,
            });
            update_sink.push(SecAssocUpdate::Deauthenticate {
                addr: self.cfg.a_addr,
                reason: ReasonCode::FOURWAY_HANDSHAKE_TIMEOUT,
            });
            return Ok(());
        }

        // A retransmitted message 1 is answered with the same SNonce.
        if self.renew_snonce {
            self.snonce = self.nonce_rdr.next();
            self.renew_snonce = false;
        }
        let (msg2, tptk, anonce) = handle_message_1(&self.cfg, &self.pmk[..], &self.snonce, frame)?;
        update_sink.push(SecAssocUpdate::TxEapolKeyFrame {
            dst: self.cfg.a_addr,
            frame: msg2,
            tag: None,
        });
        self.state = State::AwaitingMsg3 { tptk, anonce, msg1_count };
        Ok(())
    }

    fn on_message_3(
        &mut self,
        update_sink: &mut UpdateSink,
        replay_counter: &mut ReplayCounter,
        installed: &mut InstalledKeys,
        frame: &KeyFrame,
        tag: TxTag,
    ) -> Result<(), Error> {
        let (ptk, anonce) = match &self.state {
            State::AwaitingMsg1 => {
                return Err(Error::UnexpectedHandshakeMessage("message 3 before message 1"))
            }
            State::AwaitingMsg3 { tptk, anonce, .. } => (tptk, anonce),
            State::AwaitingMsg4Conf { ptk, anonce, .. } => (ptk, anonce),
            State::Completed { ptk, anonce } => (ptk, anonce),
        };

        let (msg4, keys) = match handle_message_3(&self.cfg, ptk, anonce, replay_counter, frame) {
            Ok(result) => result,
            Err(Error::ProtectionIeMismatch) => {
                error!(
                    "protection element in message 3 differs from the one advertised by {}",
                    self.cfg.a_addr.to_mac_str()
                );
                self.reset();
                update_sink.push(SecAssocUpdate::Status {
                    addr: self.cfg.a_addr,
                    status: SecAssocStatus::ProtectionIeMismatch,
                });
                update_sink.push(SecAssocUpdate::Deauthenticate {
                    addr: self.cfg.a_addr,
                    reason: ReasonCode::HANDSHAKE_ELEMENT_MISMATCH,
                });
                return Err(Error::ProtectionIeMismatch);
            }
            Err(e) => return Err(e),
        };

        // Group keys are installed before acknowledging message 3.
        if let Some(gtk) = keys.gtk {
            installed.install(update_sink, self.cfg.a_addr, Key::Gtk(gtk));
        }
        if let Some(igtk) = keys.igtk {
            installed.install(update_sink, self.cfg.a_addr, Key::Igtk(igtk));
        }
        update_sink.push(SecAssocUpdate::TxEapolKeyFrame {
            dst: self.cfg.a_addr,
            frame: msg4,
            tag: Some(tag),
        });

        let state = std::mem::replace(&mut self.state, State::AwaitingMsg1);
        self.state = match state {
            State::AwaitingMsg3 { tptk, anonce, .. } => {
                State::AwaitingMsg4Conf { ptk: tptk, anonce, tag }
            }
            State::AwaitingMsg4Conf { ptk, anonce, .. } => {
                State::AwaitingMsg4Conf { ptk, anonce, tag }
            }
            State::Completed { ptk, anonce } => {
                // The Authenticator did not see message 4. Answer again but keep the PTK in use.
                installed.install(update_sink, self.cfg.a_addr, Key::Ptk(ptk.clone()));
                State::Completed { ptk, anonce }
            }
            State::AwaitingMsg1 => State::AwaitingMsg1,
        };
        Ok(())
    }

    /// Reports the delivery of a transmitted frame. Returns true if the handshake completed.
    pub fn on_eapol_conf(
        &mut self,
        update_sink: &mut UpdateSink,
        installed: &mut InstalledKeys,
        tag: TxTag,
        acked: bool,
    ) -> bool {
        match &self.state {
            State::AwaitingMsg4Conf { tag: pending, .. } if *pending == tag => (),
            _ => return false,
        }
        if !acked {
            info!("message 4 was not acknowledged; awaiting retransmission of message 3");
            return false;
        }

        let state = std::mem::replace(&mut self.state, State::AwaitingMsg1);
        if let State::AwaitingMsg4Conf { ptk, anonce, .. } = state {
            installed.install(update_sink, self.cfg.a_addr, Key::Ptk(ptk.clone()));
            update_sink.push(SecAssocUpdate::Status {
                addr: self.cfg.a_addr,
                status: SecAssocStatus::EssSaEstablished,
            });
            self.renew_snonce = true;
            self.ptk = Some(ptk.clone());
            self.state = State::Completed { ptk, anonce };
            return true;
        }
        false
    }
}
