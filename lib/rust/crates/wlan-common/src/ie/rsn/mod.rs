// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod akm;
pub mod cipher;
pub mod pmkid;
pub mod rsne;
pub mod suite_selector;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("invalid PMKID length: {}", _0)]
    InvalidPmkidLength(usize),
    #[error("unexpected element id: {}", _0)]
    UnexpectedElementId(u8),
    #[error("element length {} does not match available bytes {}", _0, _1)]
    InvalidElementLength(usize, usize),
    #[error("malformed RSNE")]
    MalformedRsne,
    #[error("malformed WPA IE")]
    MalformedWpaIe,
}
