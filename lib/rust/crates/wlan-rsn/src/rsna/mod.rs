// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod replay;
#[cfg(test)]
pub mod test_util;

use crate::integrity::{self, integrity_algorithm};
use crate::key::exchange::Key;
use crate::keywrap::{self, keywrap_algorithm};
use crate::sae::frame::AuthFrame;
use crate::{Error, ProtectionInfo};
use eapol::KeyFrame;
use serde::Deserialize;
use wlan_common::ie::rsn::akm::{self, Akm};
use wlan_common::ie::rsn::cipher::{self, Cipher};
use wlan_common::mac::mgmt::{ReasonCode, StatusCode};
use wlan_common::mac::MacAddr;
use wlan_common::organization::Oui;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Authenticator,
    Supplicant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtectionType {
    Rsne,
    LegacyWpa1,
}

/// The protection both peers agreed on, resolved from the element sent by the station at
/// association time.
#[derive(Debug, Clone, PartialEq)]
pub struct NegotiatedProtection {
    pub group_data: Cipher,
    pub pairwise: Cipher,
    pub group_mgmt: Option<Cipher>,
    pub akm: Akm,
    pub mic_size: u16,
    pub protection_type: ProtectionType,
    pub mfp: bool,
}

// WPA1 uses the same cipher suite types under the Microsoft OUI.
fn normalize_cipher(cipher: &Cipher) -> Cipher {
    if cipher.oui == Oui::MSFT {
        Cipher::new_dot11(cipher.suite_type)
    } else {
        *cipher
    }
}

impl NegotiatedProtection {
    pub fn from_protection(protection: &ProtectionInfo) -> Result<Self, Error> {
        let (akm, pairwise, group_data, group_mgmt, mfp, protection_type) = match protection {
            ProtectionInfo::Rsne(rsne) => {
                let akm = *rsne.akm_suites.first().ok_or(Error::UnsupportedAkmSuite)?;
                let pairwise =
                    *rsne.pairwise_cipher_suites.first().ok_or(Error::UnsupportedCipherSuite)?;
                let group_data = rsne
                    .group_data_cipher_suite
                    .unwrap_or(Cipher::new_dot11(cipher::CCMP_128));
                let mfp = rsne.mfp_capable();
                let group_mgmt = if mfp {
                    Some(
                        rsne.group_mgmt_cipher_suite
                            .unwrap_or(Cipher::new_dot11(cipher::BIP_CMAC_128)),
                    )
                } else {
                    None
                };
                (akm, pairwise, group_data, group_mgmt, mfp, ProtectionType::Rsne)
            }
            ProtectionInfo::LegacyWpa(wpa) => {
                let akm = *wpa.akm_list.first().ok_or(Error::UnsupportedAkmSuite)?;
                let pairwise = normalize_cipher(
                    wpa.unicast_cipher_list.first().ok_or(Error::UnsupportedCipherSuite)?,
                );
                let group_data = normalize_cipher(&wpa.multicast_cipher);
                (akm, pairwise, group_data, None, false, ProtectionType::LegacyWpa1)
            }
        };

        if akm.is_ft() || !akm.has_known_algorithm() {
            return Err(Error::UnsupportedAkmSuite);
        }
        if pairwise.is_tkip() {
            // TKIP requires HMAC-MD5 MICs and RC4 key data encryption.
            return Err(Error::UnsupportedKeyDescriptorVersion(eapol::DESC_VER_HMAC_MD5_RC4));
        }
        if !pairwise.supports_pairwise() {
            return Err(Error::UnsupportedCipherSuite);
        }
        if group_data.tk_bytes().is_none() {
            return Err(Error::UnsupportedCipherSuite);
        }
        let mic_size = akm.mic_bytes().ok_or(Error::UnsupportedAkmSuite)?;
        Ok(NegotiatedProtection {
            group_data,
            pairwise,
            group_mgmt,
            akm,
            mic_size,
            protection_type,
            mfp,
        })
    }

    // IEEE Std 802.11-2016, 12.7.2 b.1)
    pub fn key_descriptor_version(&self) -> u16 {
        if self.akm.is_sae() || self.akm.is_suite_b() {
            eapol::DESC_VER_AKM_DEFINED
        } else if self.akm == Akm::new_dot11(akm::EAP_SHA256)
            || self.akm == Akm::new_dot11(akm::PSK_SHA256)
        {
            eapol::DESC_VER_AES_128_CMAC
        } else {
            eapol::DESC_VER_HMAC_SHA1_AES
        }
    }

    pub fn descriptor_type(&self) -> u8 {
        match self.protection_type {
            ProtectionType::Rsne => eapol::KeyDescriptor::Ieee802dot11 as u8,
            ProtectionType::LegacyWpa1 => eapol::KeyDescriptor::LegacyWpa1 as u8,
        }
    }

    pub fn integrity_algorithm(&self) -> Result<Box<dyn integrity::Algorithm>, Error> {
        integrity_algorithm(&self.akm).ok_or(Error::UnsupportedAkmSuite)
    }

    pub fn keywrap_algorithm(&self) -> Result<Box<dyn keywrap::Algorithm>, Error> {
        keywrap_algorithm(&self.akm).ok_or(Error::UnsupportedAkmSuite)
    }

    /// Checks the fields every EAPOL-Key frame of this association must agree on.
    pub fn check_key_frame(&self, frame: &KeyFrame, compat: &Compat) -> Result<(), Error> {
        if frame.descriptor_type != self.descriptor_type() {
            let accepted = compat.accept_wpa_descriptor_in_rsn
                && self.protection_type == ProtectionType::Rsne
                && frame.descriptor_type == eapol::KeyDescriptor::LegacyWpa1 as u8;
            if !accepted {
                return Err(Error::UnexpectedKeyDescriptorType(frame.descriptor_type));
            }
        }
        let version = frame.key_info.key_descriptor_version();
        if version != self.key_descriptor_version() {
            return Err(Error::UnsupportedKeyDescriptorVersion(version));
        }
        if frame.key_mic.len() != self.mic_size as usize {
            return Err(Error::InvalidMicLength(self.mic_size as usize, frame.key_mic.len()));
        }
        Ok(())
    }
}

/// Workarounds for interoperability with peers deviating from IEEE Std 802.11.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Compat {
    /// Some stations answer message 3 of an RSN handshake with a WPA descriptor type.
    pub accept_wpa_descriptor_in_rsn: bool,
    /// Ignore the Tx bit of a GTK KDE when a pairwise cipher is in use.
    pub ignore_gtk_tx_bit: bool,
}

impl Default for Compat {
    fn default() -> Self {
        Compat { accept_wpa_descriptor_in_rsn: true, ignore_gtk_tx_bit: true }
    }
}

/// Identifies a transmitted frame so its delivery can be reported back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxTag(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum SecAssocStatus {
    /// The 4-Way Handshake completed and all keys were installed.
    EssSaEstablished,
    /// The peer's MIC could not be verified with the configured credentials.
    WrongPassword,
    HandshakeTimeout,
    GroupKeyHandshakeTimeout,
    ProtectionIeMismatch,
    GroupRekeyCompleted,
    SaeAccepted,
    SaeRejected(StatusCode),
    SaeAntiCloggingTriggered,
    MicFailureReported { pairwise: bool },
    CountermeasuresStarted,
    /// A retransmitted message would have reinstalled a key which is already in use.
    KeyReinstallIgnored,
}

#[derive(Debug, PartialEq)]
pub enum SecAssocUpdate {
    TxEapolKeyFrame { dst: MacAddr, frame: KeyFrame, tag: Option<TxTag> },
    TxSaeFrame { dst: MacAddr, frame: AuthFrame },
    Key { addr: MacAddr, key: Key },
    Status { addr: MacAddr, status: SecAssocStatus },
    Deauthenticate { addr: MacAddr, reason: ReasonCode },
}

pub type UpdateSink = Vec<SecAssocUpdate>;
