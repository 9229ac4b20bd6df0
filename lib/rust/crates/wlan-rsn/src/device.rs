// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Capabilities the key exchange engine requires from the host: frame transmission, key
//! installation and a few queries about the local interface.

use crate::key::exchange::Key;
use crate::key::Tk;
use crate::rsna::{SecAssocStatus, SecAssocUpdate, TxTag, UpdateSink};
use anyhow::Error;
use log::{debug, error, info};
use std::collections::HashMap;
use wlan_common::ie::rsn::cipher::Cipher;
use wlan_common::mac::mgmt::MgmtSubtype;
use wlan_common::mac::{MacAddr, MacFmt, BCAST_ADDR};
use zeroize::Zeroize;

#[cfg(test)]
pub use test_utils::*;

pub trait EapolTransmitter {
    /// Sends a complete EAPOL frame to `dst`. Delivery is reported back with `tag`.
    fn send_eapol(&mut self, dst: &MacAddr, frame: &[u8], tag: Option<TxTag>)
        -> Result<(), Error>;
}

pub trait MgmtTransmitter {
    /// Sends the body of a management frame of the given subtype to `dst`.
    fn send_mgmt(&mut self, dst: &MacAddr, subtype: MgmtSubtype, body: &[u8])
        -> Result<(), Error>;
}

pub trait KeyInstaller {
    fn install_key(&mut self, key: &KeyConfig) -> Result<(), Error>;
}

pub trait DeviceQuery {
    fn own_addr(&self) -> MacAddr;
    fn ssid(&self) -> Vec<u8>;
    /// Protection element the peer sent in its (Re)Association Request.
    fn assoc_protection_ie(&self, peer: &MacAddr) -> Option<Vec<u8>>;
    fn assoc_rsnxe(&self, peer: &MacAddr) -> Option<Vec<u8>>;
}

/// Everything a host needs to drive the engine.
pub trait Device: EapolTransmitter + MgmtTransmitter + KeyInstaller + DeviceQuery {}

impl<T> Device for T where T: EapolTransmitter + MgmtTransmitter + KeyInstaller + DeviceQuery {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Pairwise,
    Group,
    Igtk,
}

#[derive(Clone, PartialEq)]
pub struct KeyConfig {
    pub key_type: KeyType,
    /// Peer address for pairwise keys, broadcast address otherwise.
    pub peer_addr: MacAddr,
    pub key_idx: u16,
    pub cipher: Cipher,
    /// Receive sequence counter, or the IPN of an IGTK.
    pub rsc: u64,
    pub key: Vec<u8>,
}

impl std::fmt::Debug for KeyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyConfig")
            .field("key_type", &self.key_type)
            .field("peer_addr", &self.peer_addr.to_mac_str())
            .field("key_idx", &self.key_idx)
            .field("cipher", &self.cipher)
            .field("rsc", &self.rsc)
            .finish()
    }
}

impl Drop for KeyConfig {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

fn ipn_to_u64(ipn: &[u8]) -> u64 {
    ipn.iter().rev().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
}

impl KeyConfig {
    /// Builds the device configuration of a transient key. The PMK never leaves the engine.
    pub fn from_key(addr: &MacAddr, key: &Key) -> Option<Self> {
        match key {
            Key::Pmk(_) => None,
            Key::Ptk(ptk) => Some(KeyConfig {
                key_type: KeyType::Pairwise,
                peer_addr: *addr,
                key_idx: 0,
                cipher: ptk.cipher,
                rsc: 0,
                key: ptk.tk().to_vec(),
            }),
            Key::Gtk(gtk) => Some(KeyConfig {
                key_type: KeyType::Group,
                peer_addr: BCAST_ADDR,
                key_idx: u16::from(gtk.key_id()),
                cipher: gtk.cipher,
                rsc: gtk.rsc,
                key: gtk.tk().to_vec(),
            }),
            Key::Igtk(igtk) => Some(KeyConfig {
                key_type: KeyType::Igtk,
                peer_addr: BCAST_ADDR,
                key_idx: igtk.key_id(),
                cipher: igtk.cipher,
                rsc: ipn_to_u64(&igtk.ipn[..]),
                key: igtk.tk().to_vec(),
            }),
        }
    }
}

/// Something the host must act on which the dispatcher cannot handle by itself.
#[derive(Debug, PartialEq)]
pub enum DispatchEvent {
    Status { addr: MacAddr, status: SecAssocStatus },
    /// The PMK of an association became available, e.g. for PMKSA caching by the host.
    PmkAvailable { addr: MacAddr },
    Deauthenticated { addr: MacAddr },
}

/// Applies the updates produced by the engine to a device.
pub struct Dispatcher<D> {
    device: D,
    installed: HashMap<(MacAddr, KeyType, u16), Vec<u8>>,
}

impl<D> std::fmt::Debug for Dispatcher<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher").field("installed", &self.installed.len()).finish()
    }
}

impl<D> Drop for Dispatcher<D> {
    fn drop(&mut self) {
        self.installed.values_mut().for_each(|key| key.zeroize());
    }
}

impl<D: Device> Dispatcher<D> {
    pub fn new(device: D) -> Self {
        Dispatcher { device, installed: HashMap::new() }
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    /// Applies all updates in order. Transmission and installation failures are logged;
    /// the engine's retransmission timers take care of lost frames.
    pub fn dispatch(&mut self, updates: UpdateSink) -> Vec<DispatchEvent> {
        let mut events = vec![];
        for update in updates {
            match update {
                SecAssocUpdate::TxEapolKeyFrame { dst, frame, tag } => {
                    let bytes = frame.to_bytes(false);
                    if let Err(e) = self.device.send_eapol(&dst, &bytes[..], tag) {
                        error!("error sending EAPOL-Key frame to {}: {}", dst.to_mac_str(), e);
                    }
                }
                SecAssocUpdate::TxSaeFrame { dst, frame } => {
                    let body = frame.to_bytes();
                    let result = self.device.send_mgmt(&dst, MgmtSubtype::Authentication, &body);
                    if let Err(e) = result {
                        error!("error sending SAE frame to {}: {}", dst.to_mac_str(), e);
                    }
                }
                SecAssocUpdate::Key { addr, key } => {
                    if let Key::Pmk(_) = key {
                        events.push(DispatchEvent::PmkAvailable { addr });
                    } else if let Some(config) = KeyConfig::from_key(&addr, &key) {
                        self.install(config);
                    }
                }
                SecAssocUpdate::Status { addr, status } => {
                    events.push(DispatchEvent::Status { addr, status });
                }
                SecAssocUpdate::Deauthenticate { addr, reason } => {
                    info!("deauthenticating {} (reason {})", addr.to_mac_str(), reason.0);
                    self.forget_keys(&addr);
                    let body = reason.0.to_le_bytes();
                    let result =
                        self.device.send_mgmt(&addr, MgmtSubtype::Deauthentication, &body[..]);
                    if let Err(e) = result {
                        error!("error sending deauthentication to {}: {}", addr.to_mac_str(), e);
                    }
                    events.push(DispatchEvent::Deauthenticated { addr });
                }
            }
        }
        events
    }

    fn install(&mut self, config: KeyConfig) {
        let slot = (config.peer_addr, config.key_type, config.key_idx);
        if self.installed.get(&slot).map_or(false, |key| key[..] == config.key[..]) {
            debug!("{:?} already installed; skipping", config);
            return;
        }
        match self.device.install_key(&config) {
            Ok(()) => {
                if let Some(mut old) = self.installed.insert(slot, config.key.clone()) {
                    old.zeroize();
                }
            }
            Err(e) => error!("error installing {:?}: {}", config, e),
        }
    }

    /// Forgets the pairwise keys of `addr` so a new association installs them again.
    pub fn forget_keys(&mut self, addr: &MacAddr) {
        self.installed.retain(|(peer, key_type, _), key| {
            let keep = !(peer == addr && *key_type == KeyType::Pairwise);
            if !keep {
                key.zeroize();
            }
            keep
        });
    }
}
