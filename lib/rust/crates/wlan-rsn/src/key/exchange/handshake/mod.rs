// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod fourway;
pub mod group_key;

use crate::key::exchange::Key;
use crate::key::Tk;
use crate::rsna::{SecAssocStatus, SecAssocUpdate, UpdateSink};
use eapol::{KeyFrame, KeyInformation, KeyType};
use log::info;
use wlan_common::mac::MacAddr;
use zeroize::Zeroize;

/// Creates an EAPOL-Key frame with zeroed MIC of `mic_len` octets and updated length fields.
pub fn new_key_frame(
    descriptor_type: u8,
    key_info: KeyInformation,
    key_len: u16,
    key_replay_counter: u64,
    key_nonce: [u8; 32],
    mic_len: usize,
    key_data: Vec<u8>,
) -> KeyFrame {
    let mut frame = KeyFrame {
        descriptor_type,
        key_info,
        key_len,
        key_replay_counter,
        key_nonce,
        key_mic: bytes::Bytes::from(vec![0u8; mic_len]),
        key_data: bytes::Bytes::from(key_data),
        ..Default::default()
    };
    frame.update_packet_body_len();
    frame
}

pub fn key_info(version: u16, key_type: KeyType) -> KeyInformation {
    let mut key_info = KeyInformation(0);
    key_info.set_key_descriptor_version(version);
    key_info.set_key_type(key_type);
    key_info
}

/// Keys a station has handed to the device, so a retransmitted message never installs the same
/// key a second time.
#[derive(Debug, Default)]
pub struct InstalledKeys {
    ptk: Option<Vec<u8>>,
    gtk: Option<(u8, Vec<u8>)>,
    igtk: Option<(u16, Vec<u8>)>,
}

impl InstalledKeys {
    /// Pushes an install update unless the very same key is already installed.
    /// Returns whether the key was installed.
    pub fn install(&mut self, update_sink: &mut UpdateSink, addr: MacAddr, key: Key) -> bool {
        let fresh = match &key {
            Key::Ptk(ptk) => replace_if_new(&mut self.ptk, ptk.tk()),
            Key::Gtk(gtk) => replace_keyed_if_new(&mut self.gtk, gtk.key_id(), gtk.tk()),
            Key::Igtk(igtk) => replace_keyed_if_new(&mut self.igtk, igtk.key_id(), igtk.tk()),
            Key::Pmk(_) => true,
        };
        if fresh {
            update_sink.push(SecAssocUpdate::Key { addr, key });
        } else {
            info!("{} already installed; ignoring reinstallation", key.name());
            update_sink.push(SecAssocUpdate::Status {
                addr,
                status: SecAssocStatus::KeyReinstallIgnored,
            });
        }
        fresh
    }

    pub fn is_ptk_installed(&self) -> bool {
        self.ptk.is_some()
    }

    pub fn is_gtk_installed(&self, key_id: u8, gtk: &[u8]) -> bool {
        match &self.gtk {
            Some((id, bytes)) => *id == key_id && &bytes[..] == gtk,
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.ptk.zeroize();
        self.ptk = None;
        if let Some((_, gtk)) = self.gtk.as_mut() {
            gtk.zeroize();
        }
        self.gtk = None;
        if let Some((_, igtk)) = self.igtk.as_mut() {
            igtk.zeroize();
        }
        self.igtk = None;
    }
}

impl Drop for InstalledKeys {
    fn drop(&mut self) {
        self.clear();
    }
}

fn replace_if_new(slot: &mut Option<Vec<u8>>, tk: &[u8]) -> bool {
    if slot.as_ref().map_or(false, |installed| &installed[..] == tk) {
        return false;
    }
    if let Some(old) = slot.as_mut() {
        old.zeroize();
    }
    *slot = Some(tk.to_vec());
    true
}

fn replace_keyed_if_new<T: PartialEq + Copy>(
    slot: &mut Option<(T, Vec<u8>)>,
    key_id: T,
    tk: &[u8],
) -> bool {
    if slot.as_ref().map_or(false, |(id, installed)| *id == key_id && &installed[..] == tk) {
        return false;
    }
    if let Some((_, old)) = slot.as_mut() {
        old.zeroize();
    }
    *slot = Some((key_id, tk.to_vec()));
    true
}
