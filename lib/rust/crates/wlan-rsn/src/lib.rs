// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! WPA/RSN key exchange engine: 4-Way and Group Key Handshakes for supplicant and authenticator,
//! WPA3 SAE with anti-clogging tokens, and the PMKSA cache feeding both.

pub mod authenticator;
pub mod config;
pub mod crypto_utils;
pub mod device;
pub mod integrity;
pub mod key;
pub mod key_data;
pub mod keywrap;
pub mod pmksa;
pub mod psk;
pub mod rsna;
pub mod sae;
pub mod supplicant;
pub mod timer;

pub use crate::authenticator::Authenticator;
pub use crate::supplicant::Supplicant;

use thiserror::Error;
use wlan_common::appendable::BufferTooSmall;
use wlan_common::ie::rsn::rsne::{self, Rsne};
use wlan_common::ie::{self, wpa::WpaIe};
use wlan_common::mac::MacAddr;

/// The protection element a station advertised at association time.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtectionInfo {
    Rsne(Rsne),
    /// Legacy WPA1 vendor IE. Kept as a compatibility mode for old access points and stations.
    LegacyWpa(WpaIe),
}

impl ProtectionInfo {
    /// Parses a complete RSNE or WPA1 vendor IE, including its element header.
    pub fn from_ie(ie: &[u8]) -> Result<Self, Error> {
        match ie.first() {
            Some(&rsne::ID) => Ok(ProtectionInfo::Rsne(rsne::parse(ie)?)),
            Some(_) => Ok(ProtectionInfo::LegacyWpa(ie::wpa::parse(ie)?)),
            None => Err(Error::InvalidProtectionIe),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![];
        // Writing into a Vec never runs out of space.
        let _ = match self {
            ProtectionInfo::Rsne(rsne) => rsne.write_into(&mut buf),
            ProtectionInfo::LegacyWpa(wpa) => ie::write_wpa1_ie(&mut buf, wpa),
        };
        buf
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum Error {
    #[error("invalid key length")]
    InvalidKeyLength,
    #[error("invalid bit size for key derivation: {}", _0)]
    InvalidBitSize(usize),
    #[error("error creating nonce")]
    NonceError,
    #[error("invalid passphrase length: {}", _0)]
    InvalidPassphraseLen(usize),
    #[error("passphrase is not ASCII encoded")]
    InvalidPassphraseEncoding,
    #[error("invalid SSID length: {}", _0)]
    InvalidSsidLen(usize),
    #[error("invalid hex encoded PSK")]
    InvalidPskHex,
    #[error("unsupported AKM suite")]
    UnsupportedAkmSuite,
    #[error("unsupported cipher suite")]
    UnsupportedCipherSuite,
    #[error("unsupported key descriptor version: {}", _0)]
    UnsupportedKeyDescriptorVersion(u16),
    #[error("unexpected key descriptor type: {}", _0)]
    UnexpectedKeyDescriptorType(u8),
    #[error("invalid PMK length: {}", _0)]
    InvalidPmkLength(usize),
    #[error("AKM requires a KCK to derive the PMKID")]
    PmksaMissingKck,
    #[error("no PMK available")]
    PmksaNotEstablished,
    #[error("no PTK established")]
    PtksaNotEstablished,
    #[error("invalid length of key data: {}", _0)]
    InvalidKeyDataLength(usize),
    #[error("AES keywrap integrity check failed")]
    WrongAesKeywrapKey,
    #[error("invalid MIC")]
    InvalidMic,
    #[error("invalid MIC length: expected {}, got {}", _0, _1)]
    InvalidMicLength(usize, usize),
    #[error("invalid key replay counter: {} is not greater than {}", _0, _1)]
    InvalidKeyReplayCounter(u64, u64),
    #[error("ANonce does not match the one received in message 1")]
    AnonceMismatch,
    #[error("invalid key length: expected {}, got {}", _0, _1)]
    InvalidKeyLen(u16, u16),
    #[error("key data must be encrypted")]
    UnencryptedKeyData,
    #[error("key data carries unexpected content")]
    InvalidKeyDataContent,
    #[error("protection element does not match the one advertised at association")]
    ProtectionIeMismatch,
    #[error("message is not expected in state {}", _0)]
    UnexpectedHandshakeMessage(&'static str),
    #[error("frame has neither the MIC bit nor the ACK bit set as expected")]
    InvalidKeyInfo,
    #[error("invalid protection element")]
    InvalidProtectionIe,
    #[error("unknown station: {:?}", _0)]
    UnknownStation(MacAddr),
    #[error("invalid configuration: {}", _0)]
    InvalidConfig(String),
    #[error("unsupported SAE group: {}", _0)]
    SaeUnsupportedGroup(u16),
    #[error("invalid SAE commit scalar")]
    SaeInvalidScalar,
    #[error("invalid SAE commit element")]
    SaeInvalidElement,
    #[error("malformed SAE frame")]
    SaeMalformedFrame,
    #[error("failed to derive the SAE password element")]
    SaePweDerivation,
    #[error("SAE exchange is not in a state to process this message")]
    SaeUnexpectedState,
    #[error("SAE commit queue is full")]
    SaeQueueFull,
    #[error("error parsing EAPOL frame: {}", _0)]
    Eapol(#[from] eapol::Error),
    #[error("error parsing element: {}", _0)]
    Element(#[from] wlan_common::ie::rsn::Error),
    #[error("buffer too small")]
    BufferTooSmall(#[from] BufferTooSmall),
}
