// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::suite_selector;
use crate::organization::Oui;
use std::fmt;

// IEEE Std 802.11-2016, 9.4.2.25.2, Table 9-131
pub const GROUP_CIPHER_SUITE: u8 = 0;
pub const WEP_40: u8 = 1;
pub const TKIP: u8 = 2;
// 3 - Reserved.
pub const CCMP_128: u8 = 4;
pub const WEP_104: u8 = 5;
pub const BIP_CMAC_128: u8 = 6;
pub const GROUP_ADDRESSED_TRAFFIC_NOT_ALLOWED: u8 = 7;
pub const GCMP_128: u8 = 8;
pub const GCMP_256: u8 = 9;
pub const CCMP_256: u8 = 10;
pub const BIP_GMAC_128: u8 = 11;
pub const BIP_GMAC_256: u8 = 12;
pub const BIP_CMAC_256: u8 = 13;
// 14-255 - Reserved.

#[derive(PartialOrd, PartialEq, Eq, Clone, Copy, Hash)]
pub struct Cipher {
    pub oui: Oui,
    pub suite_type: u8,
}

impl Cipher {
    pub const fn new_dot11(suite_type: u8) -> Self {
        Cipher { oui: Oui::DOT11, suite_type }
    }

    pub const fn new_msft(suite_type: u8) -> Self {
        Cipher { oui: Oui::MSFT, suite_type }
    }

    pub fn is_vendor_specific(&self) -> bool {
        !self.oui.eq(&Oui::DOT11) && !self.oui.eq(&Oui::MSFT)
    }

    pub fn is_tkip(&self) -> bool {
        self.suite_type == TKIP && !self.is_vendor_specific()
    }

    /// IEEE Std 802.11-2016, 12.7.2, Table 12-4
    pub fn tk_bytes(&self) -> Option<u16> {
        if self.is_vendor_specific() {
            return None;
        }
        match self.suite_type {
            WEP_40 => Some(5),
            WEP_104 => Some(13),
            TKIP | GCMP_256 | CCMP_256 | BIP_GMAC_256 | BIP_CMAC_256 => Some(32),
            CCMP_128 | GCMP_128 | BIP_CMAC_128 | BIP_GMAC_128 => Some(16),
            _ => None,
        }
    }

    pub fn supports_pairwise(&self) -> bool {
        match (self.oui, self.suite_type) {
            (Oui::DOT11, TKIP)
            | (Oui::DOT11, CCMP_128)
            | (Oui::DOT11, GCMP_128)
            | (Oui::DOT11, GCMP_256)
            | (Oui::DOT11, CCMP_256)
            | (Oui::MSFT, TKIP)
            | (Oui::MSFT, CCMP_128) => true,
            _ => false,
        }
    }

    pub fn supports_group_mgmt(&self) -> bool {
        self.oui == Oui::DOT11
            && [BIP_CMAC_128, BIP_GMAC_128, BIP_GMAC_256, BIP_CMAC_256].contains(&self.suite_type)
    }
}

impl suite_selector::Factory for Cipher {
    type Suite = Cipher;

    fn new(oui: Oui, suite_type: u8) -> Self::Suite {
        Cipher { oui, suite_type }
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{}", self.oui, self.suite_type)
    }
}
