// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::suite_selector;
use crate::organization::Oui;
use std::fmt;

// IEEE Std 802.11-2016, 9.4.2.25.3, Table 9-133
pub const EAP: u8 = 1;
pub const PSK: u8 = 2;
pub const FT_EAP: u8 = 3;
pub const FT_PSK: u8 = 4;
pub const EAP_SHA256: u8 = 5;
pub const PSK_SHA256: u8 = 6;
pub const TDLS: u8 = 7;
pub const SAE: u8 = 8;
pub const FT_SAE: u8 = 9;
pub const AP_PEERKEY: u8 = 10;
pub const EAP_SUITEB: u8 = 11;
pub const EAP_SUITEB_SHA384: u8 = 12;
pub const FT_EAP_SHA384: u8 = 13;
// 14-255 Reserved.

/// Key derivation function used to derive the PTK for an AKM.
/// IEEE Std 802.11-2016, 12.7.1.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kdf {
    PrfSha1,
    KdfSha256,
    KdfSha384,
}

#[derive(PartialOrd, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Akm {
    pub oui: Oui,
    pub suite_type: u8,
}

impl Akm {
    pub const fn new_dot11(suite_type: u8) -> Self {
        Akm { oui: Oui::DOT11, suite_type }
    }

    /// AKM suites advertised in a legacy WPA1 vendor IE.
    pub const fn new_msft(suite_type: u8) -> Self {
        Akm { oui: Oui::MSFT, suite_type }
    }

    pub fn is_vendor_specific(&self) -> bool {
        !self.oui.eq(&Oui::DOT11)
    }

    pub fn is_reserved(&self) -> bool {
        self.oui == Oui::DOT11 && (self.suite_type == 0 || self.suite_type >= 14)
    }

    /// Whether the key exchange engine can negotiate this AKM.
    pub fn has_known_algorithm(&self) -> bool {
        self.kdf().is_some() && self.mic_bytes().is_some()
    }

    pub fn is_psk(&self) -> bool {
        match (self.oui, self.suite_type) {
            (Oui::DOT11, PSK) | (Oui::DOT11, PSK_SHA256) | (Oui::MSFT, PSK) => true,
            _ => false,
        }
    }

    pub fn is_sae(&self) -> bool {
        self.oui == Oui::DOT11 && self.suite_type == SAE
    }

    pub fn is_suite_b(&self) -> bool {
        self.oui == Oui::DOT11
            && (self.suite_type == EAP_SUITEB || self.suite_type == EAP_SUITEB_SHA384)
    }

    /// AKMs whose PMK is established by 802.1X authentication.
    pub fn is_8021x(&self) -> bool {
        match (self.oui, self.suite_type) {
            (Oui::DOT11, EAP)
            | (Oui::DOT11, EAP_SHA256)
            | (Oui::DOT11, EAP_SUITEB)
            | (Oui::DOT11, EAP_SUITEB_SHA384)
            | (Oui::MSFT, EAP) => true,
            _ => false,
        }
    }

    /// Fast BSS transition AKMs. Recognized but never negotiated.
    pub fn is_ft(&self) -> bool {
        self.oui == Oui::DOT11
            && [FT_EAP, FT_PSK, FT_SAE, FT_EAP_SHA384].contains(&self.suite_type)
    }

    /// IEEE Std 802.11-2016, 12.7.1.2
    pub fn kdf(&self) -> Option<Kdf> {
        match (self.oui, self.suite_type) {
            (Oui::DOT11, EAP) | (Oui::DOT11, PSK) | (Oui::MSFT, EAP) | (Oui::MSFT, PSK) => {
                Some(Kdf::PrfSha1)
            }
            (Oui::DOT11, EAP_SHA256)
            | (Oui::DOT11, PSK_SHA256)
            | (Oui::DOT11, SAE)
            | (Oui::DOT11, EAP_SUITEB) => Some(Kdf::KdfSha256),
            (Oui::DOT11, EAP_SUITEB_SHA384) => Some(Kdf::KdfSha384),
            _ => None,
        }
    }

    /// IEEE Std 802.11-2016, 12.7.3, Table 12-8
    pub fn mic_bytes(&self) -> Option<u16> {
        match self.kdf()? {
            Kdf::PrfSha1 | Kdf::KdfSha256 => Some(16),
            Kdf::KdfSha384 => Some(24),
        }
    }

    pub fn kck_bytes(&self) -> Option<u16> {
        match self.kdf()? {
            Kdf::PrfSha1 | Kdf::KdfSha256 => Some(16),
            Kdf::KdfSha384 => Some(24),
        }
    }

    pub fn kek_bytes(&self) -> Option<u16> {
        match self.kdf()? {
            Kdf::PrfSha1 | Kdf::KdfSha256 => Some(16),
            Kdf::KdfSha384 => Some(32),
        }
    }

    pub fn pmk_bytes(&self) -> Option<u16> {
        match self.kdf()? {
            Kdf::PrfSha1 | Kdf::KdfSha256 => Some(32),
            Kdf::KdfSha384 => Some(48),
        }
    }
}

impl suite_selector::Factory for Akm {
    type Suite = Akm;

    fn new(oui: Oui, suite_type: u8) -> Self::Suite {
        Akm { oui, suite_type }
    }
}

impl fmt::Debug for Akm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.oui, self.suite_type)
    }
}
