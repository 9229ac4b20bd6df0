// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub struct ReasonCode(pub u16);

/// IEEE Std 802.11-2016, 9.4.1.7
impl ReasonCode {
    // 0 Reserved
    pub const UNSPECIFIED_REASON: Self = Self(1);
    pub const INVALID_AUTHENTICATION: Self = Self(2);
    pub const LEAVING_NETWORK_DEAUTH: Self = Self(3);
    pub const REASON_INACTIVITY: Self = Self(4);
    pub const NOT_AUTHENTICATED: Self = Self(9);
    pub const REASON_INVALID_ELEMENT: Self = Self(13);
    pub const MIC_FAILURE: Self = Self(14);
    pub const FOURWAY_HANDSHAKE_TIMEOUT: Self = Self(15);
    pub const GK_HANDSHAKE_TIMEOUT: Self = Self(16);
    pub const HANDSHAKE_ELEMENT_MISMATCH: Self = Self(17);
    pub const REASON_INVALID_GROUP_CIPHER: Self = Self(18);
    pub const REASON_INVALID_PAIRWISE_CIPHER: Self = Self(19);
    pub const REASON_INVALID_AKMP: Self = Self(20);
    pub const UNSUPPORTED_RSNE_VERSION: Self = Self(21);
    pub const INVALID_RSNE_CAPABILITIES: Self = Self(22);
    pub const IEEE802_1_X_AUTH_FAILED: Self = Self(23);
    pub const REASON_CIPHER_OUT_OF_POLICY: Self = Self(24);
    pub const BAD_CIPHER_OR_AKM: Self = Self(29);
    pub const STA_LEAVING: Self = Self(36);
    pub const TIMEOUT: Self = Self(39);
    pub const REASON_INVALID_PMKID: Self = Self(49);
    // 67-65535 Reserved
}
