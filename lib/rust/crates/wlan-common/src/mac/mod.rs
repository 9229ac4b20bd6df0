// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod mgmt;

pub type MacAddr = [u8; 6];

pub const BCAST_ADDR: MacAddr = [0xFF; 6];

pub trait MacFmt {
    fn to_mac_str(&self) -> String;
}

impl MacFmt for MacAddr {
    fn to_mac_str(&self) -> String {
        format!(
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            self[0], self[1], self[2], self[3], self[4], self[5]
        )
    }
}

/// Orders two addresses the way key derivation functions expect: `(min, max)`.
pub fn min_max_addr<'a>(a: &'a MacAddr, b: &'a MacAddr) -> (&'a MacAddr, &'a MacAddr) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}
