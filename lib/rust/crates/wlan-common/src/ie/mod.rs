// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod reader;
pub mod rsn;
pub mod wpa;

pub use reader::Reader;

use crate::appendable::{Appendable, BufferTooSmall};
use crate::organization::Oui;

/// Element IDs.
/// IEEE Std 802.11-2016, 9.4.2.1, Table 9-77
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Id(pub u8);

impl Id {
    pub const SSID: Self = Self(0);
    pub const SUPPORTED_RATES: Self = Self(1);
    pub const RSNE: Self = Self(48);
    pub const RSNXE: Self = Self(244);
    pub const VENDOR_SPECIFIC: Self = Self(221);
    pub const EXTENSION: Self = Self(255);
}

/// Element ID extensions used by SAE.
/// IEEE Std 802.11-2020, 9.4.2.1, Table 9-92
pub mod ext_id {
    pub const PASSWORD_IDENTIFIER: u8 = 33;
    pub const REJECTED_GROUPS: u8 = 92;
    pub const ANTI_CLOGGING_TOKEN_CONTAINER: u8 = 93;
}

pub const IE_HDR_LEN: usize = 2;
pub const IE_MAX_BODY_LEN: usize = 255;

/// Writes a WPA1 vendor IE, including its element header.
pub fn write_wpa1_ie<A: Appendable>(
    buf: &mut A,
    wpa_ie: &wpa::WpaIe,
) -> Result<(), BufferTooSmall> {
    let body_len = wpa::VENDOR_HDR_LEN + wpa_ie.len();
    if !buf.can_append(IE_HDR_LEN + body_len) || body_len > IE_MAX_BODY_LEN {
        return Err(BufferTooSmall);
    }
    buf.append_byte(Id::VENDOR_SPECIFIC.0)?;
    buf.append_byte(body_len as u8)?;
    buf.append_bytes(&Oui::MSFT[..])?;
    buf.append_byte(wpa::VENDOR_SPECIFIC_TYPE)?;
    wpa_ie.write_into(buf)
}

/// Writes an element extension with the given body.
pub fn write_ext_ie<A: Appendable>(
    buf: &mut A,
    ext_id: u8,
    body: &[u8],
) -> Result<(), BufferTooSmall> {
    if body.len() + 1 > IE_MAX_BODY_LEN || !buf.can_append(IE_HDR_LEN + 1 + body.len()) {
        return Err(BufferTooSmall);
    }
    buf.append_byte(Id::EXTENSION.0)?;
    buf.append_byte((body.len() + 1) as u8)?;
    buf.append_byte(ext_id)?;
    buf.append_bytes(body)
}

/// Returns the body of a WPA1 vendor IE without the OUI and OUI type, if `body` is one.
pub fn wpa1_body(body: &[u8]) -> Option<&[u8]> {
    if body.len() >= wpa::VENDOR_HDR_LEN
        && body[..3] == Oui::MSFT[..]
        && body[3] == wpa::VENDOR_SPECIFIC_TYPE
    {
        Some(&body[wpa::VENDOR_HDR_LEN..])
    } else {
        None
    }
}
