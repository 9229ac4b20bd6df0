// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils::nonce::Nonce;
use crate::key::exchange::handshake::{key_info, new_key_frame};
use crate::key::exchange::{encrypt_key_data, update_mic, verify_mic};
use crate::key::gtk::Gtk;
use crate::key::igtk::Igtk;
use crate::key::ptk::Ptk;
use crate::key_data::kde;
use crate::rsna::{NegotiatedProtection, ProtectionType};
use crate::Error;
use eapol::{KeyFrame, KeyType};

// AES Key Wrap operates on at least two 64-bit blocks.
fn pad_for_keywrap(mut key_data: Vec<u8>) -> Vec<u8> {
    let padded_len = std::cmp::max(16, (key_data.len() + 7) / 8 * 8);
    if padded_len > key_data.len() {
        key_data.push(kde::TYPE);
        key_data.resize(padded_len, 0);
    }
    key_data
}

// IEEE Std 802.11-2016, 12.7.7.2
pub fn create_message_1(
    protection: &NegotiatedProtection,
    ptk: &Ptk,
    gnonce: &Nonce,
    replay_counter: u64,
    gtk: &Gtk,
    igtk: Option<&Igtk>,
) -> Result<KeyFrame, Error> {
    let mut info = key_info(protection.key_descriptor_version(), KeyType::Group);
    info.set_key_ack(true);
    info.set_key_mic(true);
    info.set_secure(true);

    let (key_len, plaintext) = match protection.protection_type {
        ProtectionType::Rsne => {
            info.set_encrypted_key_data(true);
            let mut w = kde::Writer::new(vec![]);
            w.write_gtk(&kde::Gtk::new(gtk.key_id(), kde::GtkInfoTx::OnlyRx, gtk.gtk()))?;
            if let Some(igtk) = igtk {
                w.write_igtk(&kde::Igtk::new(igtk.key_id(), &igtk.ipn[..], igtk.igtk()))?;
            }
            (0, w.finalize_for_encryption()?)
        }
        ProtectionType::LegacyWpa1 => {
            // WPA1 carries the bare GTK and announces its index in the Key Information field.
            info.set_legacy_key_id(gtk.key_id() as u16);
            (gtk.gtk().len() as u16, pad_for_keywrap(gtk.gtk().to_vec()))
        }
    };
    let key_data = encrypt_key_data(ptk.kek(), protection, &plaintext[..])?;

    let mut msg1 = new_key_frame(
        protection.descriptor_type(),
        info,
        key_len,
        replay_counter,
        *gnonce,
        protection.mic_size as usize,
        key_data,
    );
    msg1.key_rsc = gtk.rsc;
    update_mic(ptk.kck(), protection, &mut msg1)?;
    Ok(msg1)
}

// IEEE Std 802.11-2016, 12.7.7.3
pub fn verify_message_2(
    protection: &NegotiatedProtection,
    ptk: &Ptk,
    msg2: &KeyFrame,
) -> Result<(), Error> {
    if msg2.key_info.key_type() != KeyType::Group {
        return Err(Error::InvalidKeyInfo);
    }
    verify_mic(ptk.kck(), protection, msg2)
}
