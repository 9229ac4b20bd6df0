// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils::kdf_sha256;
use crate::key::Tk;
use crate::Error;
use std::fmt;
use wlan_common::ie::rsn::cipher::Cipher;
use wlan_common::mac::MacAddr;
use zeroize::Zeroize;

const LABEL: &str = "IGTK key expansion";
pub const IPN_LEN: usize = 6;

/// Integrity group key protecting group addressed robust management frames.
#[derive(Clone, PartialEq)]
pub struct Igtk {
    igtk: Vec<u8>,
    key_id: u16,
    pub ipn: [u8; IPN_LEN],
    pub cipher: Cipher,
}

impl fmt::Debug for Igtk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Igtk")
            .field("key_id", &self.key_id)
            .field("len", &self.igtk.len())
            .field("cipher", &self.cipher)
            .finish()
    }
}

impl Drop for Igtk {
    fn drop(&mut self) {
        self.igtk.zeroize();
    }
}

impl Tk for Igtk {
    fn tk(&self) -> &[u8] {
        &self.igtk[..]
    }
}

impl Igtk {
    pub fn from_bytes(
        igtk: &[u8],
        key_id: u16,
        ipn: [u8; IPN_LEN],
        cipher: Cipher,
    ) -> Result<Igtk, Error> {
        let len = cipher.tk_bytes().ok_or(Error::UnsupportedCipherSuite)?;
        if igtk.len() != len as usize {
            return Err(Error::InvalidKeyLen(len, igtk.len() as u16));
        }
        Ok(Igtk { igtk: igtk.to_vec(), key_id, ipn, cipher })
    }

    // IEEE Std 802.11-2016, 12.7.1.5 leaves the derivation to the Authenticator. The GTK
    // derivation with its own label is used so both keys come from the same GMK.
    pub fn derive(
        gmk: &[u8],
        aa: &MacAddr,
        gnonce: &[u8],
        key_id: u16,
        cipher: Cipher,
    ) -> Result<Igtk, Error> {
        if !cipher.supports_group_mgmt() {
            return Err(Error::UnsupportedCipherSuite);
        }
        let len = cipher.tk_bytes().ok_or(Error::UnsupportedCipherSuite)? as usize;
        let mut context = Vec::with_capacity(aa.len() + gnonce.len());
        context.extend_from_slice(&aa[..]);
        context.extend_from_slice(gnonce);
        let igtk = kdf_sha256(gmk, LABEL, &context[..], 8 * len)?;
        Ok(Igtk { igtk, key_id, ipn: [0u8; IPN_LEN], cipher })
    }

    pub fn igtk(&self) -> &[u8] {
        &self.igtk[..]
    }

    pub fn key_id(&self) -> u16 {
        self.key_id
    }
}
