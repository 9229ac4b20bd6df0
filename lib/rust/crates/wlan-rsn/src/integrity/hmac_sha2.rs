// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::Algorithm;
use crate::crypto_utils::{ct_eq, hmac, HashAlgorithm};
use crate::Error;

/// HMAC-SHA256-128 used by the Suite B AKM.
pub struct HmacSha256;

impl HmacSha256 {
    pub fn new() -> Self {
        HmacSha256
    }
}

impl Algorithm for HmacSha256 {
    fn verify(&self, key: &[u8], data: &[u8], expected: &[u8]) -> bool {
        verify_truncated(self.compute(key, data), expected)
    }

    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        hmac(HashAlgorithm::Sha256, key, &[data])
    }
}

/// HMAC-SHA384-192 used by the Suite B 192-bit AKM.
pub struct HmacSha384;

impl HmacSha384 {
    pub fn new() -> Self {
        HmacSha384
    }
}

impl Algorithm for HmacSha384 {
    fn verify(&self, key: &[u8], data: &[u8], expected: &[u8]) -> bool {
        verify_truncated(self.compute(key, data), expected)
    }

    fn compute(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>, Error> {
        hmac(HashAlgorithm::Sha384, key, &[data])
    }
}

fn verify_truncated(computed: Result<Vec<u8>, Error>, expected: &[u8]) -> bool {
    match computed {
        Ok(mic) => expected.len() <= mic.len() && ct_eq(&mic[..expected.len()], expected),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex::FromHex;

    // RFC 4231, test case 2
    #[test]
    fn test_hmac_sha256() {
        let expected = Vec::from_hex(
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843",
        )
        .expect("invalid hex");
        let alg = HmacSha256::new();
        let mic = alg.compute(b"Jefe", b"what do ya want for nothing?").expect("HMAC failed");
        assert_eq!(mic, expected);
        assert!(alg.verify(b"Jefe", b"what do ya want for nothing?", &expected[..16]));
        assert!(!alg.verify(b"Jefe", b"what do ya want for something?", &expected[..16]));
    }

    #[test]
    fn test_hmac_sha384_truncation() {
        let alg = HmacSha384::new();
        let mic = alg.compute(&[3u8; 24], b"frame").expect("HMAC failed");
        assert_eq!(mic.len(), 48);
        assert!(alg.verify(&[3u8; 24], b"frame", &mic[..24]));
    }
}
