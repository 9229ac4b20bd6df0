// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod nonce;

use crate::Error;
use hmac::{Hmac, Mac, NewMac};
use sha1::Sha1;
use sha2::{Sha256, Sha384};

/// Hash functions backing the HMAC based PRF and KDF variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
}

impl HashAlgorithm {
    pub fn output_bytes(&self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
        }
    }
}

/// HMAC over the concatenation of `parts`.
pub fn hmac(alg: HashAlgorithm, key: &[u8], parts: &[&[u8]]) -> Result<Vec<u8>, Error> {
    macro_rules! compute {
        ($digest:ty) => {{
            let mut mac =
                Hmac::<$digest>::new_from_slice(key).map_err(|_| Error::InvalidKeyLength)?;
            for part in parts {
                mac.update(part);
            }
            Ok(mac.finalize().into_bytes().to_vec())
        }};
    }
    match alg {
        HashAlgorithm::Sha1 => compute!(Sha1),
        HashAlgorithm::Sha256 => compute!(Sha256),
        HashAlgorithm::Sha384 => compute!(Sha384),
    }
}

// IEEE Std 802.11-2016, 12.7.1.2
pub fn prf(k: &[u8], a: &str, b: &[u8], bits: usize) -> Result<Vec<u8>, Error> {
    if bits % 8 != 0 || bits == 0 {
        return Err(Error::InvalidBitSize(bits));
    }
    let bytes = bits / 8;
    let iterations = (bits + 159) / 160;
    let mut result = Vec::with_capacity(iterations * 20);
    for i in 0..iterations {
        let block = hmac(HashAlgorithm::Sha1, k, &[a.as_bytes(), &[0u8], b, &[i as u8]])?;
        result.extend_from_slice(&block[..]);
    }
    result.truncate(bytes);
    Ok(result)
}

// IEEE Std 802.11-2016, 12.7.1.7.2
pub fn kdf(
    alg: HashAlgorithm,
    k: &[u8],
    label: &str,
    context: &[u8],
    bits: usize,
) -> Result<Vec<u8>, Error> {
    if bits == 0 || bits > u16::max_value() as usize {
        return Err(Error::InvalidBitSize(bits));
    }
    let bytes = (bits + 7) / 8;
    let hash_len = alg.output_bytes();
    let iterations = (bytes + hash_len - 1) / hash_len;
    let length = (bits as u16).to_le_bytes();
    let mut result = Vec::with_capacity(iterations * hash_len);
    for i in 1..=iterations {
        let counter = (i as u16).to_le_bytes();
        let block = hmac(alg, k, &[&counter[..], label.as_bytes(), context, &length[..]])?;
        result.extend_from_slice(&block[..]);
    }
    result.truncate(bytes);
    // Clear unused trailing bits if the requested length is not a multiple of eight.
    if bits % 8 != 0 {
        if let Some(last) = result.last_mut() {
            *last &= 0xffu8 << (8 - bits % 8);
        }
    }
    Ok(result)
}

pub fn kdf_sha256(k: &[u8], label: &str, context: &[u8], bits: usize) -> Result<Vec<u8>, Error> {
    kdf(HashAlgorithm::Sha256, k, label, context, bits)
}

/// Constant time comparison of two byte strings.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
