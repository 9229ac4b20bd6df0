// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::Algorithm;
use crate::crypto_utils::ct_eq;
use crate::Error;
use aes::Aes128;
use cmac::{Cmac, Mac, NewMac};

/// AES-128-CMAC as used by Key Descriptor Version 3 and SAE.
pub struct CmacAes128;

impl CmacAes128 {
    pub fn new() -> Self {
        CmacAes128
    }
}

impl Algorithm for CmacAes128 {
    fn verify(&self, key: &[u8], data: &[u8], expected: &[u8]) -> bool {
        match self.compute(key, data) {
            Ok(mic) => ct_eq(&mic[..], expected),
            Err(_) => false,
        }
    }

    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        let mut mac = Cmac::<Aes128>::new_from_slice(key).map_err(|_| Error::InvalidKeyLength)?;
        mac.update(data);
        Ok(mac.finalize().into_bytes().to_vec())
    }
}
