// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::Algorithm;
use crate::crypto_utils::{ct_eq, hmac, HashAlgorithm};
use crate::Error;

/// HMAC-SHA1-128 as used by Key Descriptor Version 2.
pub struct HmacSha1;

impl HmacSha1 {
    pub fn new() -> Self {
        HmacSha1
    }
}

impl Algorithm for HmacSha1 {
    fn verify(&self, key: &[u8], data: &[u8], expected: &[u8]) -> bool {
        match self.compute(key, data) {
            // The MIC field carries the first 128 bits of the HMAC.
            Ok(mic) => expected.len() <= mic.len() && ct_eq(&mic[..expected.len()], expected),
            Err(_) => false,
        }
    }

    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        hmac(HashAlgorithm::Sha1, key, &[data])
    }
}
