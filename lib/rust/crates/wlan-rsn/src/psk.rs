// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::Error;
use hmac::Hmac;
use pbkdf2::pbkdf2;
use sha1::Sha1;

const PSK_LEN: usize = 32;
const PBKDF2_ITERATIONS: u32 = 4096;
const MAX_SSID_LEN: usize = 32;

/// Keys derived from a passphrase provide comparably low levels of security.
/// Passphrases should have a minimum length of 20 characters since shorter passphrases
/// are unlikely to prevent attacks.
pub type Psk = Box<[u8]>;

// IEEE Std 802.11-2016, J.4.1
pub fn compute(passphrase: &[u8], ssid: &[u8]) -> Result<Psk, Error> {
    if ssid.len() > MAX_SSID_LEN {
        return Err(Error::InvalidSsidLen(ssid.len()));
    }

    // A 64 digit passphrase is the hex encoded PSK itself.
    if passphrase.len() == 2 * PSK_LEN {
        return from_hex(passphrase);
    }

    // IEEE Std 802.11-2016, J.4.1 requires the passphrase to be 8 to 63 printable ASCII
    // characters.
    if passphrase.len() < 8 || passphrase.len() > 63 {
        return Err(Error::InvalidPassphraseLen(passphrase.len()));
    }
    if !passphrase.iter().all(|c| *c >= 32 && *c <= 126) {
        return Err(Error::InvalidPassphraseEncoding);
    }

    let mut psk = vec![0u8; PSK_LEN];
    pbkdf2::<Hmac<Sha1>>(passphrase, ssid, PBKDF2_ITERATIONS, &mut psk[..]);
    Ok(psk.into_boxed_slice())
}

fn from_hex(passphrase: &[u8]) -> Result<Psk, Error> {
    let psk = hex::decode(passphrase).map_err(|_| Error::InvalidPskHex)?;
    Ok(psk.into_boxed_slice())
}
