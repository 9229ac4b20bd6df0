// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

#[derive(PartialEq, Eq, Clone, Copy, Debug, Default, Hash)]
pub struct StatusCode(pub u16);

/// IEEE Std 802.11-2016, 9.4.1.9, Table 9-46
impl StatusCode {
    pub const SUCCESS: Self = Self(0);
    pub const REFUSED_REASON_UNSPECIFIED: Self = Self(1);
    pub const UNSUPPORTED_AUTH_ALGORITHM: Self = Self(13);
    pub const TRANSACTION_SEQUENCE_ERROR: Self = Self(14);
    pub const CHALLENGE_FAILURE: Self = Self(15);
    pub const REJECTED_SEQUENCE_TIMEOUT: Self = Self(16);
    pub const DENIED_NO_MORE_STAS: Self = Self(17);
    pub const INVALID_ELEMENT: Self = Self(40);
    pub const INVALID_GROUP_CIPHER: Self = Self(41);
    pub const INVALID_PAIRWISE_CIPHER: Self = Self(42);
    pub const INVALID_AKMP: Self = Self(43);
    pub const INVALID_PMKID: Self = Self(53);
    pub const ANTI_CLOGGING_TOKEN_REQUIRED: Self = Self(76);
    pub const UNSUPPORTED_FINITE_CYCLIC_GROUP: Self = Self(77);
    pub const UNKNOWN_PASSWORD_IDENTIFIER: Self = Self(123);
    pub const SAE_HASH_TO_ELEMENT: Self = Self(126);
    pub const SAE_PK: Self = Self(127);
}
