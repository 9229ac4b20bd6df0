// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

mod reason;
mod status;

pub use {reason::*, status::*};

/// Management frame subtypes the key exchange engine transmits.
/// IEEE Std 802.11-2016, 9.2.4.1.3, Table 9-1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MgmtSubtype {
    Authentication,
    Deauthentication,
    Disassociation,
}

/// Authentication algorithm numbers.
/// IEEE Std 802.11-2016, 9.4.1.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthAlgorithmNumber(pub u16);

impl AuthAlgorithmNumber {
    pub const OPEN: Self = Self(0);
    pub const SHARED_KEY: Self = Self(1);
    pub const FAST_BSS_TRANSITION: Self = Self(2);
    pub const SAE: Self = Self(3);
}
