// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod aes;

use crate::Error;
use wlan_common::ie::rsn::akm::Akm;

/// An algorithm used to protect the Key Data field of EAPOL-Key frames.
pub trait Algorithm {
    fn wrap(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error>;
    fn unwrap(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error>;
}

// IEEE Std 802.11-2016, 12.7.3, Table 12-8
// Every AKM this engine negotiates uses NIST AES Key Wrap. HMAC-MD5/RC4 of Key Descriptor
// Version 1 is refused when the handshake's protection is negotiated.
pub fn keywrap_algorithm(akm: &Akm) -> Option<Box<dyn Algorithm>> {
    if akm.has_known_algorithm() && !akm.is_ft() {
        Some(Box::new(aes::NistAes))
    } else {
        None
    }
}
