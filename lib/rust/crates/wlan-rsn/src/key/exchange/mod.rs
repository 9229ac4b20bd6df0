// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod handshake;

use crate::key::{gtk::Gtk, igtk::Igtk, ptk::Ptk};
use crate::rsna::NegotiatedProtection;
use crate::Error;
use bytes::Bytes;
use eapol::KeyFrame;
use std::fmt;

#[derive(Clone, PartialEq)]
pub enum Key {
    Pmk(Vec<u8>),
    Ptk(Ptk),
    Gtk(Gtk),
    Igtk(Igtk),
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Never print key material.
            Key::Pmk(pmk) => write!(f, "Pmk({} bytes)", pmk.len()),
            Key::Ptk(ptk) => write!(f, "{:?}", ptk),
            Key::Gtk(gtk) => write!(f, "{:?}", gtk),
            Key::Igtk(igtk) => write!(f, "{:?}", igtk),
        }
    }
}

impl Key {
    pub fn name(&self) -> &'static str {
        match self {
            Key::Pmk(_) => "PMK",
            Key::Ptk(_) => "PTK",
            Key::Gtk(_) => "GTK",
            Key::Igtk(_) => "IGTK",
        }
    }
}

/// Computes the MIC of `frame` with its MIC field zeroed.
pub fn compute_mic(
    kck: &[u8],
    protection: &NegotiatedProtection,
    frame: &KeyFrame,
) -> Result<Vec<u8>, Error> {
    let alg = protection.integrity_algorithm()?;
    let mut mic = alg.compute(kck, &frame.to_bytes(true)[..])?;
    mic.truncate(protection.mic_size as usize);
    Ok(mic)
}

pub fn update_mic(
    kck: &[u8],
    protection: &NegotiatedProtection,
    frame: &mut KeyFrame,
) -> Result<(), Error> {
    let mic = compute_mic(kck, protection, frame)?;
    frame.key_mic = Bytes::from(mic);
    Ok(())
}

pub fn verify_mic(
    kck: &[u8],
    protection: &NegotiatedProtection,
    frame: &KeyFrame,
) -> Result<(), Error> {
    if frame.key_mic.len() != protection.mic_size as usize {
        return Err(Error::InvalidMicLength(protection.mic_size as usize, frame.key_mic.len()));
    }
    let alg = protection.integrity_algorithm()?;
    if alg.verify(kck, &frame.to_bytes(true)[..], &frame.key_mic[..]) {
        Ok(())
    } else {
        Err(Error::InvalidMic)
    }
}

pub fn encrypt_key_data(
    kek: &[u8],
    protection: &NegotiatedProtection,
    key_data: &[u8],
) -> Result<Vec<u8>, Error> {
    protection.keywrap_algorithm()?.wrap(kek, key_data)
}

pub fn decrypt_key_data(
    kek: &[u8],
    protection: &NegotiatedProtection,
    key_data: &[u8],
) -> Result<Vec<u8>, Error> {
    protection.keywrap_algorithm()?.unwrap(kek, key_data)
}
