// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::fmt;
use std::ops::Deref;

/// Organizationally Unique Identifier.
#[derive(Eq, PartialEq, Hash, Clone, Copy, Default, PartialOrd, Ord)]
pub struct Oui([u8; 3]);

impl Oui {
    pub const DOT11: Self = Self([0x00, 0x0F, 0xAC]);
    pub const MSFT: Self = Self([0x00, 0x50, 0xF2]);

    pub const fn new(oui: [u8; 3]) -> Self {
        Self(oui)
    }
}

impl Deref for Oui {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl fmt::Debug for Oui {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X}-{:02X}-{:02X}", self.0[0], self.0[1], self.0[2])
    }
}
