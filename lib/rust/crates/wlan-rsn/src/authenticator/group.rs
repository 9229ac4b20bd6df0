// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils::nonce::{Nonce, NonceReader};
use crate::key::exchange::Key;
use crate::key::gtk::Gtk;
use crate::key::igtk::Igtk;
use crate::rsna::{SecAssocStatus, SecAssocUpdate, UpdateSink};
use crate::Error;
use log::info;
use rand::RngCore;
use std::collections::HashSet;
use std::sync::Arc;
use wlan_common::ie::rsn::cipher::Cipher;
use wlan_common::mac::{MacAddr, MacFmt};
use zeroize::Zeroize;

/// GTK key ids alternate between these two slots on every rekey.
pub const GTK_KEY_IDS: [u8; 2] = [1, 2];
pub const IGTK_KEY_IDS: [u16; 2] = [4, 5];

const GMK_LEN: usize = 32;

// IEEE Std 802.11-2016, 12.7.1.4 and C.3 (Group state machine)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupState {
    GtkInit,
    /// A new GTK is being delivered to the stations.
    SetKeys,
    SetKeysDone,
}

/// Group keys of a BSS. The key in use (GN) and the previous one (GM) occupy the two key id
/// slots so stations can still receive with the old key while the new one is rolled out.
pub struct Group {
    aa: MacAddr,
    state: GroupState,
    gn: usize,
    gmk: Vec<u8>,
    nonce_rdr: Arc<NonceReader>,
    gnonce: Nonce,
    group_cipher: Cipher,
    group_mgmt_cipher: Option<Cipher>,
    gtk: Gtk,
    igtk: Option<Igtk>,
    pending: HashSet<MacAddr>,
}

impl std::fmt::Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("state", &self.state)
            .field("gtk_key_id", &self.gtk.key_id())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl Drop for Group {
    fn drop(&mut self) {
        self.gmk.zeroize();
    }
}

fn new_gmk() -> Vec<u8> {
    let mut gmk = vec![0u8; GMK_LEN];
    rand::thread_rng().fill_bytes(&mut gmk[..]);
    gmk
}

impl Group {
    /// Runs GTK_INIT: picks a GMK and derives the first GTK and IGTK.
    pub fn new(
        aa: MacAddr,
        group_cipher: Cipher,
        group_mgmt_cipher: Option<Cipher>,
        nonce_rdr: Arc<NonceReader>,
    ) -> Result<Group, Error> {
        let gmk = new_gmk();
        let gnonce = nonce_rdr.next();
        let gtk = Gtk::derive(&gmk[..], &aa, &gnonce[..], GTK_KEY_IDS[0], group_cipher)?;
        let igtk = match group_mgmt_cipher {
            Some(cipher) => {
                Some(Igtk::derive(&gmk[..], &aa, &gnonce[..], IGTK_KEY_IDS[0], cipher)?)
            }
            None => None,
        };
        Ok(Group {
            aa,
            state: GroupState::GtkInit,
            gn: 0,
            gmk,
            nonce_rdr,
            gnonce,
            group_cipher,
            group_mgmt_cipher,
            gtk,
            igtk,
            pending: HashSet::new(),
        })
    }

    pub fn state(&self) -> GroupState {
        self.state
    }

    pub fn gtk(&self) -> &Gtk {
        &self.gtk
    }

    pub fn igtk(&self) -> Option<&Igtk> {
        self.igtk.as_ref()
    }

    pub fn gnonce(&self) -> &Nonce {
        &self.gnonce
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    fn install_keys(&self, update_sink: &mut UpdateSink) {
        update_sink.push(SecAssocUpdate::Key { addr: self.aa, key: Key::Gtk(self.gtk.clone()) });
        if let Some(igtk) = self.igtk.as_ref() {
            update_sink.push(SecAssocUpdate::Key { addr: self.aa, key: Key::Igtk(igtk.clone()) });
        }
    }

    /// Installs the initial group keys, completing GTK_INIT.
    pub fn init_done(&mut self, update_sink: &mut UpdateSink) {
        if self.state == GroupState::GtkInit {
            self.install_keys(update_sink);
            self.state = GroupState::SetKeysDone;
        }
    }

    /// Swaps the GN and GM slots and derives a new GTK (and IGTK) into GN. Returns false if a
    /// rekey is already in progress.
    pub fn rekey(&mut self) -> Result<bool, Error> {
        if self.state == GroupState::SetKeys {
            info!("GTK rekey already in progress");
            return Ok(false);
        }
        let gn = 1 - self.gn;
        let gnonce = self.nonce_rdr.next();
        let gtk =
            Gtk::derive(&self.gmk[..], &self.aa, &gnonce[..], GTK_KEY_IDS[gn], self.group_cipher)?;
        let igtk = match self.group_mgmt_cipher {
            Some(cipher) => {
                Some(Igtk::derive(&self.gmk[..], &self.aa, &gnonce[..], IGTK_KEY_IDS[gn], cipher)?)
            }
            None => None,
        };
        info!("rekeying GTK; new key id {}", GTK_KEY_IDS[gn]);
        self.gn = gn;
        self.gnonce = gnonce;
        self.gtk = gtk;
        self.igtk = igtk;
        self.state = GroupState::SetKeys;
        Ok(true)
    }

    /// Starts waiting for the stations which must acknowledge the new GTK. Completes the
    /// rekey immediately if there are none.
    pub fn await_stations(&mut self, update_sink: &mut UpdateSink, stations: HashSet<MacAddr>) {
        self.pending = stations;
        self.maybe_complete(update_sink);
    }

    /// A station acknowledged the GTK with message 2 of the Group Key Handshake.
    pub fn station_done(&mut self, update_sink: &mut UpdateSink, addr: &MacAddr) {
        if self.pending.remove(addr) {
            info!("{} acknowledged GTK; {} pending", addr.to_mac_str(), self.pending.len());
            self.maybe_complete(update_sink);
        }
    }

    /// A station left the BSS. It no longer holds back the rekey.
    pub fn station_removed(&mut self, update_sink: &mut UpdateSink, addr: &MacAddr) {
        if self.pending.remove(addr) {
            self.maybe_complete(update_sink);
        }
    }

    fn maybe_complete(&mut self, update_sink: &mut UpdateSink) {
        if self.state != GroupState::SetKeys || !self.pending.is_empty() {
            return;
        }
        info!("all stations received the new GTK");
        self.install_keys(update_sink);
        self.state = GroupState::SetKeysDone;
        update_sink.push(SecAssocUpdate::Status {
            addr: self.aa,
            status: SecAssocStatus::GroupRekeyCompleted,
        });
    }
}
