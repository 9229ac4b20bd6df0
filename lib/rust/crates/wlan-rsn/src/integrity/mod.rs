// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod cmac_aes128;
pub mod hmac_sha1;
pub mod hmac_sha2;

use crate::Error;
use cmac_aes128::CmacAes128;
use hmac_sha1::HmacSha1;
use hmac_sha2::{HmacSha256, HmacSha384};
use wlan_common::ie::rsn::akm::Akm;

pub trait Algorithm {
    fn verify(&self, key: &[u8], data: &[u8], expected: &[u8]) -> bool;
    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error>;
}

// IEEE Std 802.11-2016, 12.7.3, Table 12-8
pub fn integrity_algorithm(akm: &Akm) -> Option<Box<dyn Algorithm>> {
    use wlan_common::ie::rsn::akm::*;
    use wlan_common::organization::Oui;

    match (akm.oui, akm.suite_type) {
        (Oui::DOT11, EAP) | (Oui::DOT11, PSK) | (Oui::MSFT, EAP) | (Oui::MSFT, PSK) => {
            Some(Box::new(HmacSha1::new()))
        }
        (Oui::DOT11, EAP_SHA256) | (Oui::DOT11, PSK_SHA256) | (Oui::DOT11, SAE) => {
            Some(Box::new(CmacAes128::new()))
        }
        (Oui::DOT11, EAP_SUITEB) => Some(Box::new(HmacSha256::new())),
        (Oui::DOT11, EAP_SUITEB_SHA384) => Some(Box::new(HmacSha384::new())),
        _ => None,
    }
}
