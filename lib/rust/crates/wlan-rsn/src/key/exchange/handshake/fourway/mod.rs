// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod authenticator;
pub mod supplicant;

use eapol::{KeyFrame, KeyType};

/// Messages of the 4-Way Handshake as seen by the Supplicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageNumber {
    Message1,
    Message3,
}

/// Classifies a pairwise frame sent by an Authenticator.
/// Returns None for frames which are not part of a 4-Way Handshake.
pub fn message_number(frame: &KeyFrame) -> Option<MessageNumber> {
    let key_info = frame.key_info;
    if key_info.key_type() != KeyType::Pairwise || !key_info.key_ack() || key_info.request() {
        return None;
    }
    if key_info.key_mic() {
        Some(MessageNumber::Message3)
    } else {
        Some(MessageNumber::Message1)
    }
}

/// EAPOL-Key frames an Authenticator expects from a station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupplicantMessage {
    Request,
    Group2,
    Pairwise2,
    Pairwise4,
}

/// Classifies a frame sent by a Supplicant. WPA1 carries no key data in message 4, and RSN
/// stations may only omit it in message 4, so the key data length tells messages 2 and 4 apart.
pub fn classify_supplicant_message(frame: &KeyFrame) -> SupplicantMessage {
    let key_info = frame.key_info;
    if key_info.request() {
        SupplicantMessage::Request
    } else if key_info.key_type() == KeyType::Group {
        SupplicantMessage::Group2
    } else if frame.key_data_len == 0 {
        SupplicantMessage::Pairwise4
    } else {
        SupplicantMessage::Pairwise2
    }
}
