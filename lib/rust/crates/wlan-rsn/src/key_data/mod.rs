// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod kde;

use crate::Error;
use log::warn;
use wlan_common::ie::rsn::pmkid::Pmkid;
use wlan_common::ie::rsn::rsne::{self, Rsne};
use wlan_common::ie::{self, wpa::WpaIe, Id, IE_HDR_LEN};
use wlan_common::mac::MacAddr;

#[derive(Debug, PartialEq)]
pub enum Element {
    Gtk(kde::Header, kde::Gtk),
    Igtk(kde::Header, kde::Igtk),
    MacAddr(kde::Header, MacAddr),
    Pmkid(kde::Header, Pmkid),
    Rsne(Rsne),
    LegacyWpa1(WpaIe),
    /// RSN Extension element, kept in its encoded form.
    Rsnxe(Vec<u8>),
    Padding,
    UnsupportedKde(kde::Header),
    UnsupportedIe(u8, u8),
}

/// Splits the Key Data field of an EAPOL-Key frame into its KDEs and elements.
pub fn extract_elements(key_data: &[u8]) -> Result<Vec<Element>, Error> {
    let mut elements = vec![];
    let mut remaining = key_data;
    while !remaining.is_empty() {
        if remaining[0] == kde::TYPE {
            let (rest, element) = kde::parse(remaining).map_err(|e| {
                warn!("error parsing KDE: {:?}", e);
                Error::InvalidKeyDataContent
            })?;
            let is_padding = element == Element::Padding;
            elements.push(element);
            if is_padding {
                break;
            }
            remaining = rest;
            continue;
        }

        let ie = next_raw_ie(remaining).ok_or(Error::InvalidKeyDataLength(key_data.len()))?;
        match Id(ie[0]) {
            Id::RSNE => elements.push(Element::Rsne(rsne::parse(ie)?)),
            Id::RSNXE => elements.push(Element::Rsnxe(ie.to_vec())),
            id => elements.push(Element::UnsupportedIe(id.0, ie[1])),
        }
        remaining = &remaining[ie.len()..];
    }
    Ok(elements)
}

fn next_raw_ie(bytes: &[u8]) -> Option<&[u8]> {
    if bytes.len() < IE_HDR_LEN {
        return None;
    }
    let len = IE_HDR_LEN + bytes[1] as usize;
    if len > bytes.len() {
        return None;
    }
    Some(&bytes[..len])
}

/// Iterates the encoded elements of a Key Data field, including their headers. Iteration stops
/// at padding or at the first truncated element.
pub fn raw_elements(key_data: &[u8]) -> impl Iterator<Item = &[u8]> {
    let mut remaining = key_data;
    std::iter::from_fn(move || {
        if remaining.len() >= IE_HDR_LEN && remaining[0] == kde::TYPE && remaining[1] == 0 {
            return None;
        }
        let ie = next_raw_ie(remaining)?;
        remaining = &remaining[ie.len()..];
        Some(ie)
    })
}

/// Returns the first RSNE or WPA1 vendor IE in its encoded form.
/// Protection elements are compared octet by octet with the ones exchanged at association,
/// hence the encoded form.
pub fn find_protection_ie(key_data: &[u8]) -> Option<&[u8]> {
    raw_elements(key_data).find(|ie| {
        ie[0] == Id::RSNE.0
            || (ie[0] == Id::VENDOR_SPECIFIC.0 && ie::wpa1_body(&ie[IE_HDR_LEN..]).is_some())
    })
}

/// Returns the second RSNE, if any. Its presence in message 3 is allowed to announce an
/// additional pairwise cipher and must not be confused with the first one.
pub fn find_second_rsne(key_data: &[u8]) -> Option<&[u8]> {
    raw_elements(key_data).filter(|ie| ie[0] == Id::RSNE.0).nth(1)
}

pub fn find_rsnxe(key_data: &[u8]) -> Option<&[u8]> {
    raw_elements(key_data).find(|ie| ie[0] == Id::RSNXE.0)
}
