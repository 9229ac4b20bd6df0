// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils::kdf_sha256;
use crate::key::Tk;
use crate::Error;
use std::fmt;
use wlan_common::ie::rsn::cipher::Cipher;
use wlan_common::mac::MacAddr;
use zeroize::Zeroize;

const LABEL: &str = "Group key expansion";

/// A GTK is shared by all stations of a BSS and protects group addressed frames.
#[derive(Clone, PartialEq)]
pub struct Gtk {
    gtk: Vec<u8>,
    key_id: u8,
    pub cipher: Cipher,
    /// Receive sequence counter the key is installed with.
    pub rsc: u64,
}

impl fmt::Debug for Gtk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gtk")
            .field("key_id", &self.key_id)
            .field("len", &self.gtk.len())
            .field("cipher", &self.cipher)
            .field("rsc", &self.rsc)
            .finish()
    }
}

impl Drop for Gtk {
    fn drop(&mut self) {
        self.gtk.zeroize();
    }
}

impl Tk for Gtk {
    fn tk(&self) -> &[u8] {
        &self.gtk[..]
    }
}

impl Gtk {
    /// Wraps a GTK received in a GTK KDE.
    pub fn from_bytes(gtk: &[u8], key_id: u8, cipher: Cipher, rsc: u64) -> Result<Gtk, Error> {
        let tk_len = cipher.tk_bytes().ok_or(Error::UnsupportedCipherSuite)?;
        if gtk.len() != tk_len as usize {
            return Err(Error::InvalidKeyLen(tk_len, gtk.len() as u16));
        }
        Ok(Gtk { gtk: gtk.to_vec(), key_id, cipher, rsc })
    }

    // IEEE Std 802.11-2016, 12.7.1.4
    pub fn derive(
        gmk: &[u8],
        aa: &MacAddr,
        gnonce: &[u8],
        key_id: u8,
        cipher: Cipher,
    ) -> Result<Gtk, Error> {
        let tk_len = cipher.tk_bytes().ok_or(Error::UnsupportedCipherSuite)? as usize;
        let mut context = Vec::with_capacity(aa.len() + gnonce.len());
        context.extend_from_slice(&aa[..]);
        context.extend_from_slice(gnonce);
        let gtk = kdf_sha256(gmk, LABEL, &context[..], 8 * tk_len)?;
        Ok(Gtk { gtk, key_id, cipher, rsc: 0 })
    }

    pub fn gtk(&self) -> &[u8] {
        &self.gtk[..]
    }

    pub fn key_id(&self) -> u8 {
        self.key_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wlan_common::ie::rsn::cipher;

    const AA: MacAddr = [0x1D, 0xE3, 0xFD, 0xDF, 0xCB, 0xD3];

    #[test]
    fn test_derive_gtk_lengths() {
        let gtk = Gtk::derive(&[1u8; 32], &AA, &[2u8; 32], 1, Cipher::new_dot11(cipher::CCMP_128))
            .expect("error deriving GTK");
        assert_eq!(gtk.gtk().len(), 16);
        assert_eq!(gtk.key_id(), 1);

        let gtk = Gtk::derive(&[1u8; 32], &AA, &[2u8; 32], 2, Cipher::new_dot11(cipher::GCMP_256))
            .expect("error deriving GTK");
        assert_eq!(gtk.gtk().len(), 32);
    }

    #[test]
    fn test_derive_gtk_depends_on_gnonce() {
        let ccmp = Cipher::new_dot11(cipher::CCMP_128);
        let a = Gtk::derive(&[1u8; 32], &AA, &[2u8; 32], 1, ccmp).expect("error deriving GTK");
        let b = Gtk::derive(&[1u8; 32], &AA, &[3u8; 32], 1, ccmp).expect("error deriving GTK");
        let c = Gtk::derive(&[1u8; 32], &AA, &[2u8; 32], 1, ccmp).expect("error deriving GTK");
        assert_ne!(a.gtk(), b.gtk());
        assert_eq!(a.gtk(), c.gtk());
    }

    #[test]
    fn test_from_bytes_validates_length() {
        let ccmp = Cipher::new_dot11(cipher::CCMP_128);
        assert!(Gtk::from_bytes(&[1u8; 16], 2, ccmp, 0).is_ok());
        assert_eq!(Gtk::from_bytes(&[1u8; 15], 2, ccmp, 0), Err(Error::InvalidKeyLen(16, 15)));
    }
}
