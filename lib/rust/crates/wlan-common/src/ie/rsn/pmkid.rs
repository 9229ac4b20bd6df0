// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::Error;
use anyhow::ensure;
use bytes::Bytes;

pub const LEN: usize = 16;

pub type Pmkid = Bytes;

pub fn new(pmkid: Bytes) -> Result<Pmkid, anyhow::Error> {
    ensure!(pmkid.len() == LEN, Error::InvalidPmkidLength(pmkid.len()));
    Ok(pmkid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pmkid_length() {
        assert!(new(Bytes::from(vec![0u8; 16])).is_ok());
        assert!(new(Bytes::from(vec![0u8; 15])).is_err());
        assert!(new(Bytes::from(vec![0u8; 17])).is_err());
    }
}
