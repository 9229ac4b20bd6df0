// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils::nonce::NonceReader;
use crate::key::exchange::handshake::fourway::supplicant::{Config, Fourway};
use crate::key::exchange::{encrypt_key_data, update_mic};
use crate::key::ptk::Ptk;
use crate::key_data::kde;
use crate::rsna::{Compat, NegotiatedProtection};
use crate::ProtectionInfo;
use bytes::Bytes;
use eapol::KeyFrame;
use hex::FromHex;
use wlan_common::ie::rsn::{
    akm::{self, Akm},
    cipher::{self, Cipher},
    rsne::{RsnCapabilities, Rsne},
};
use wlan_common::ie::wpa::WpaIe;

pub const S_ADDR: [u8; 6] = [0x81, 0x76, 0x61, 0x14, 0xDF, 0xC9];
pub const A_ADDR: [u8; 6] = [0x1D, 0xE3, 0xFD, 0xDF, 0xCB, 0xD3];
pub const GTK: &[u8] = &[0x0F; 16];
pub const GTK_KEY_ID: u8 = 2;

pub fn get_a_rsne() -> Rsne {
    let mut rsne = Rsne::new();
    rsne.group_data_cipher_suite = Some(Cipher::new_dot11(cipher::CCMP_128));
    rsne.pairwise_cipher_suites.push(Cipher::new_dot11(cipher::CCMP_128));
    rsne.pairwise_cipher_suites.push(Cipher::new_dot11(cipher::TKIP));
    rsne.akm_suites.push(Akm::new_dot11(akm::PSK));
    rsne
}

pub fn get_s_rsne() -> Rsne {
    let mut rsne = Rsne::new();
    rsne.group_data_cipher_suite = Some(Cipher::new_dot11(cipher::CCMP_128));
    rsne.pairwise_cipher_suites.push(Cipher::new_dot11(cipher::CCMP_128));
    rsne.akm_suites.push(Akm::new_dot11(akm::PSK));
    rsne
}

pub fn get_s_rsne_bytes() -> Vec<u8> {
    get_s_rsne().to_bytes()
}

pub fn get_a_rsne_bytes() -> Vec<u8> {
    get_a_rsne().to_bytes()
}

pub fn get_mfp_rsne() -> Rsne {
    let mut rsne = get_s_rsne();
    let mut caps = RsnCapabilities(0);
    caps.set_mgmt_frame_protection_cap(true);
    rsne.rsn_capabilities = Some(caps);
    rsne
}

pub fn get_wpa_ie() -> WpaIe {
    WpaIe {
        multicast_cipher: Cipher::new_msft(cipher::TKIP),
        unicast_cipher_list: vec![Cipher::new_msft(cipher::CCMP_128)],
        akm_list: vec![Akm::new_msft(akm::PSK)],
    }
}

pub fn get_protection() -> NegotiatedProtection {
    NegotiatedProtection::from_protection(&ProtectionInfo::Rsne(get_s_rsne()))
        .expect("error negotiating protection")
}

pub fn get_pmk() -> Vec<u8> {
    Vec::from_hex("0dc0d6eb90555ed6419756b9a15ec3e3209b63df707dd508d14581f8982721af")
        .expect("error reading PMK from hex")
}

pub fn get_ptk(anonce: &[u8], snonce: &[u8]) -> Ptk {
    let protection = get_protection();
    let pmk = get_pmk();
    Ptk::new(&pmk[..], &A_ADDR, &S_ADDR, anonce, snonce, &protection.akm, protection.pairwise)
        .expect("error deriving PTK")
}

pub fn get_supplicant_config() -> Config {
    Config {
        s_addr: S_ADDR,
        a_addr: A_ADDR,
        s_protection_ie: get_s_rsne_bytes(),
        a_protection_ie: get_a_rsne_bytes(),
        s_rsnxe: None,
        a_rsnxe: None,
        protection: get_protection(),
        compat: Compat::default(),
        max_msg1_retries: 3,
    }
}

pub fn get_supplicant_fourway() -> Fourway {
    let nonce_rdr = NonceReader::new(&S_ADDR).expect("error creating NonceReader");
    Fourway::new(get_supplicant_config(), get_pmk(), nonce_rdr)
}

pub fn get_4whs_msg1(anonce: &[u8], key_replay_counter: u64) -> KeyFrame {
    let mut msg = KeyFrame {
        descriptor_type: 2,
        key_info: eapol::KeyInformation(0x008a),
        key_len: 16,
        key_replay_counter,
        key_mic: Bytes::from(vec![0u8; 16]),
        key_nonce: eapol::to_array(anonce),
        ..Default::default()
    };
    msg.update_packet_body_len();
    msg
}

fn msg3_frame(
    ptk: &Ptk,
    anonce: &[u8],
    key_replay_counter: u64,
    key_data: Vec<u8>,
    encrypted: bool,
) -> KeyFrame {
    let key_data = if encrypted {
        encrypt_key_data(ptk.kek(), &get_protection(), &key_data[..])
            .expect("error encrypting key data")
    } else {
        key_data
    };
    // Version 2, pairwise, install, ack, MIC, secure.
    let mut key_info = eapol::KeyInformation(0x03ca);
    key_info.set_encrypted_key_data(encrypted);
    let mut msg = KeyFrame {
        descriptor_type: 2,
        key_info,
        key_len: 16,
        key_replay_counter,
        key_mic: Bytes::from(vec![0u8; 16]),
        key_nonce: eapol::to_array(anonce),
        key_data: Bytes::from(key_data),
        ..Default::default()
    };
    msg.update_packet_body_len();
    msg
}

fn msg3_key_data(ie: &[u8]) -> Vec<u8> {
    let mut w = kde::Writer::new(vec![]);
    w.write_raw_ie(ie).expect("error writing RSNE");
    w.write_gtk(&kde::Gtk::new(GTK_KEY_ID, kde::GtkInfoTx::BothRxTx, GTK))
        .expect("error writing GTK KDE");
    w.finalize_for_encryption().expect("error finalizing key data")
}

fn sign(ptk: &Ptk, mut msg: KeyFrame) -> KeyFrame {
    update_mic(ptk.kck(), &get_protection(), &mut msg).expect("error computing MIC");
    msg
}

/// Message 3 carrying the Authenticator's RSNE and a GTK KDE. `msg_modifier` is applied
/// before the MIC is computed.
pub fn get_4whs_msg3<F>(
    ptk: &Ptk,
    anonce: &[u8],
    key_replay_counter: u64,
    msg_modifier: F,
) -> KeyFrame
where
    F: Fn(&mut KeyFrame),
{
    let key_data = msg3_key_data(&get_a_rsne_bytes()[..]);
    let mut msg = msg3_frame(ptk, anonce, key_replay_counter, key_data, true);
    msg_modifier(&mut msg);
    msg.update_packet_body_len();
    sign(ptk, msg)
}

pub fn get_4whs_msg3_with_ie(
    ptk: &Ptk,
    anonce: &[u8],
    key_replay_counter: u64,
    ie: &[u8],
) -> KeyFrame {
    let key_data = msg3_key_data(ie);
    sign(ptk, msg3_frame(ptk, anonce, key_replay_counter, key_data, true))
}

/// Message 3 with a GTK KDE in plaintext key data.
pub fn get_4whs_msg3_plaintext(ptk: &Ptk, anonce: &[u8], key_replay_counter: u64) -> KeyFrame {
    let key_data = msg3_key_data(&get_a_rsne_bytes()[..]);
    sign(ptk, msg3_frame(ptk, anonce, key_replay_counter, key_data, false))
}
