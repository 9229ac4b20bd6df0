// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::key::exchange::handshake::{key_info, new_key_frame};
use crate::key::exchange::{decrypt_key_data, update_mic, verify_mic};
use crate::key::gtk::Gtk;
use crate::key::igtk::Igtk;
use crate::key::ptk::Ptk;
use crate::key_data::{self, Element};
use crate::rsna::replay::ReplayCounter;
use crate::rsna::{Compat, NegotiatedProtection, ProtectionType};
use crate::Error;
use eapol::{KeyFrame, KeyType};
use log::debug;

/// Result of a valid message 1 of the Group Key Handshake.
#[derive(Debug)]
pub struct GroupKeyUpdate {
    pub msg2: KeyFrame,
    pub gtk: Gtk,
    pub igtk: Option<Igtk>,
}

// IEEE Std 802.11-2016, 12.7.7.2
pub fn handle_message_1(
    protection: &NegotiatedProtection,
    compat: &Compat,
    ptk: &Ptk,
    replay_counter: &mut ReplayCounter,
    msg1: &KeyFrame,
) -> Result<GroupKeyUpdate, Error> {
    protection.check_key_frame(msg1, compat)?;
    verify_mic(ptk.kck(), protection, msg1)?;
    replay_counter.accept(msg1.key_replay_counter);

    let (gtk, igtk) = match protection.protection_type {
        ProtectionType::Rsne => {
            if !msg1.key_info.encrypted_key_data() {
                return Err(Error::UnencryptedKeyData);
            }
            let key_data = decrypt_key_data(ptk.kek(), protection, &msg1.key_data[..])?;
            let mut gtk = None;
            let mut igtk = None;
            for element in key_data::extract_elements(&key_data[..])? {
                match element {
                    Element::Gtk(_, kde) => {
                        let key_id = kde.info.key_id() as u8;
                        gtk = Some(Gtk::from_bytes(
                            &kde.gtk[..],
                            key_id,
                            protection.group_data,
                            msg1.key_rsc,
                        )?);
                    }
                    Element::Igtk(_, kde) => match protection.group_mgmt {
                        Some(cipher) => {
                            igtk = Some(Igtk::from_bytes(&kde.igtk[..], kde.id, kde.ipn, cipher)?)
                        }
                        None => debug!("ignoring IGTK KDE without management frame protection"),
                    },
                    _ => (),
                }
            }
            (gtk.ok_or(Error::InvalidKeyDataContent)?, igtk)
        }
        ProtectionType::LegacyWpa1 => {
            let key_data = decrypt_key_data(ptk.kek(), protection, &msg1.key_data[..])?;
            let key_len = msg1.key_len as usize;
            if key_len > key_data.len() {
                return Err(Error::InvalidKeyDataLength(key_data.len()));
            }
            let key_id = msg1.key_info.legacy_key_id() as u8;
            let gtk =
                Gtk::from_bytes(&key_data[..key_len], key_id, protection.group_data, msg1.key_rsc)?;
            (gtk, None)
        }
    };

    let msg2 = create_message_2(protection, ptk.kck(), msg1)?;
    Ok(GroupKeyUpdate { msg2, gtk, igtk })
}

// IEEE Std 802.11-2016, 12.7.7.3
fn create_message_2(
    protection: &NegotiatedProtection,
    kck: &[u8],
    msg1: &KeyFrame,
) -> Result<KeyFrame, Error> {
    let mut info = key_info(protection.key_descriptor_version(), KeyType::Group);
    info.set_key_mic(true);
    info.set_secure(true);
    let key_len = match protection.protection_type {
        ProtectionType::Rsne => 0,
        ProtectionType::LegacyWpa1 => {
            info.set_legacy_key_id(msg1.key_info.legacy_key_id());
            msg1.key_len
        }
    };

    let mut msg2 = new_key_frame(
        protection.descriptor_type(),
        info,
        key_len,
        msg1.key_replay_counter,
        [0u8; 32],
        protection.mic_size as usize,
        vec![],
    );
    update_mic(kck, protection, &mut msg2)?;
    Ok(msg2)
}
