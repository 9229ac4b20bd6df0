// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Messages of the 4-Way Handshake as built and checked by an Authenticator. The per-station
//! state machine driving them lives in `crate::authenticator`.

use crate::crypto_utils::nonce::Nonce;
use crate::key::exchange::handshake::{key_info, new_key_frame};
use crate::key::exchange::{encrypt_key_data, update_mic, verify_mic};
use crate::key::gtk::Gtk;
use crate::key::igtk::Igtk;
use crate::key::ptk::Ptk;
use crate::key_data::{self, kde};
use crate::rsna::{NegotiatedProtection, ProtectionType};
use crate::Error;
use eapol::{KeyFrame, KeyType};
use wlan_common::mac::MacAddr;

/// Group keys delivered in message 3.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupKeys<'a> {
    pub gtk: Option<&'a Gtk>,
    pub igtk: Option<&'a Igtk>,
}

fn pairwise_key_len(protection: &NegotiatedProtection) -> Result<u16, Error> {
    protection.pairwise.tk_bytes().ok_or(Error::UnsupportedCipherSuite)
}

// IEEE Std 802.11-2016, 12.7.6.2
pub fn create_message_1(
    protection: &NegotiatedProtection,
    anonce: &Nonce,
    replay_counter: u64,
    pmkid: Option<&[u8]>,
) -> Result<KeyFrame, Error> {
    let mut info = key_info(protection.key_descriptor_version(), KeyType::Pairwise);
    info.set_key_ack(true);

    let key_data = match (protection.protection_type, pmkid) {
        (ProtectionType::Rsne, Some(pmkid)) => {
            let mut w = kde::Writer::new(vec![]);
            w.write_pmkid(pmkid)?;
            w.finalize_for_plaintext()?
        }
        _ => vec![],
    };
    Ok(new_key_frame(
        protection.descriptor_type(),
        info,
        pairwise_key_len(protection)?,
        replay_counter,
        *anonce,
        protection.mic_size as usize,
        key_data,
    ))
}

/// Derives the PTK from message 2's SNonce and verifies the message's MIC with it.
// IEEE Std 802.11-2016, 12.7.6.3
pub fn verify_message_2(
    protection: &NegotiatedProtection,
    pmk: &[u8],
    aa: &MacAddr,
    spa: &MacAddr,
    anonce: &Nonce,
    snonce: &Nonce,
    msg2: &KeyFrame,
) -> Result<Ptk, Error> {
    let ptk =
        Ptk::new(pmk, aa, spa, &anonce[..], &snonce[..], &protection.akm, protection.pairwise)?;
    verify_mic(ptk.kck(), protection, msg2)?;
    Ok(ptk)
}

/// Message 2 must carry the protection element of the association request, octet by octet.
pub fn check_message_2_elements(
    protection: &NegotiatedProtection,
    s_protection_ie: &[u8],
    s_rsnxe: Option<&[u8]>,
    msg2: &KeyFrame,
) -> Result<(), Error> {
    let key_data = &msg2.key_data[..];
    match key_data::find_protection_ie(key_data) {
        Some(ie) if ie == s_protection_ie => (),
        _ => return Err(Error::ProtectionIeMismatch),
    }
    if protection.protection_type == ProtectionType::Rsne {
        if let Some(rsnxe) = s_rsnxe {
            if key_data::find_rsnxe(key_data) != Some(rsnxe) {
                return Err(Error::ProtectionIeMismatch);
            }
        }
    }
    Ok(())
}

// IEEE Std 802.11-2016, 12.7.6.4
pub fn create_message_3(
    protection: &NegotiatedProtection,
    ptk: &Ptk,
    anonce: &Nonce,
    replay_counter: u64,
    a_protection_ie: &[u8],
    a_rsnxe: Option<&[u8]>,
    group_keys: GroupKeys<'_>,
) -> Result<KeyFrame, Error> {
    let mut info = key_info(protection.key_descriptor_version(), KeyType::Pairwise);
    info.set_key_ack(true);
    info.set_key_mic(true);
    info.set_install(true);

    let mut key_rsc = 0;
    let key_data = match protection.protection_type {
        ProtectionType::Rsne => {
            info.set_secure(true);
            info.set_encrypted_key_data(true);

            let mut w = kde::Writer::new(vec![]);
            w.write_raw_ie(a_protection_ie)?;
            if let Some(rsnxe) = a_rsnxe {
                w.write_raw_ie(rsnxe)?;
            }
            if let Some(gtk) = group_keys.gtk {
                key_rsc = gtk.rsc;
                w.write_gtk(&kde::Gtk::new(gtk.key_id(), kde::GtkInfoTx::OnlyRx, gtk.gtk()))?;
            }
            if let Some(igtk) = group_keys.igtk {
                w.write_igtk(&kde::Igtk::new(igtk.key_id(), &igtk.ipn[..], igtk.igtk()))?;
            }
            let plaintext = w.finalize_for_encryption()?;
            encrypt_key_data(ptk.kek(), protection, &plaintext[..])?
        }
        // WPA1 delivers the GTK in a separate Group Key Handshake.
        ProtectionType::LegacyWpa1 => a_protection_ie.to_vec(),
    };

    let mut msg3 = new_key_frame(
        protection.descriptor_type(),
        info,
        pairwise_key_len(protection)?,
        replay_counter,
        *anonce,
        protection.mic_size as usize,
        key_data,
    );
    msg3.key_rsc = key_rsc;
    update_mic(ptk.kck(), protection, &mut msg3)?;
    Ok(msg3)
}

// IEEE Std 802.11-2016, 12.7.6.5
pub fn verify_message_4(
    protection: &NegotiatedProtection,
    ptk: &Ptk,
    msg4: &KeyFrame,
) -> Result<(), Error> {
    verify_mic(ptk.kck(), protection, msg4)
}
