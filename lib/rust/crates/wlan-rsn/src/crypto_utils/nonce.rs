// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils::prf;
use crate::Error;
use num::bigint::{BigUint, RandBigInt};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use wlan_common::mac::MacAddr;

pub const NONCE_LEN: usize = 32;

pub type Nonce = [u8; NONCE_LEN];

/// Thread-safe nonce generator.
/// According to IEEE Std 802.11-2016, 12.7.5 each STA should be configured with an initial,
/// cryptographic-quality random counter at system boot up time.
#[derive(Debug)]
pub struct NonceReader {
    key_counter: Mutex<BigUint>,
}

impl NonceReader {
    pub fn new(sta_addr: &MacAddr) -> Result<Arc<NonceReader>, Error> {
        // Write time and STA's address to buffer for PRF-256.
        // IEEE Std 802.11-2016, 12.7.5 recommends using a time in NTP format.
        // Fuchsia has no support for NTP yet; instead use a regular timestamp.
        let time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| Error::NonceError)?
            .as_nanos() as u64;
        let mut buf = Vec::with_capacity(sta_addr.len() + 8);
        buf.extend_from_slice(&sta_addr[..]);
        buf.extend_from_slice(&time.to_le_bytes()[..]);
        let k = rand::thread_rng().gen_biguint(256).to_bytes_be();
        let init = prf(&k[..], "Init Counter", &buf[..], 8 * NONCE_LEN)?;
        Ok(Arc::new(NonceReader { key_counter: Mutex::new(BigUint::from_bytes_be(&init[..])) }))
    }

    pub fn next(&self) -> Nonce {
        let mut counter = self.key_counter.lock();
        *counter += 1u8;

        // Expand nonce if it's less than 32 bytes; wrap around if it exceeds 32 bytes.
        let bytes = counter.to_bytes_be();
        let mut nonce = [0u8; NONCE_LEN];
        if bytes.len() > NONCE_LEN {
            nonce.copy_from_slice(&bytes[bytes.len() - NONCE_LEN..]);
        } else {
            nonce[NONCE_LEN - bytes.len()..].copy_from_slice(&bytes[..]);
        }
        nonce
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_nonce() {
        let addr: MacAddr = [1, 2, 3, 4, 5, 6];
        let rdr = NonceReader::new(&addr).expect("error creating NonceReader");
        let mut previous = BigUint::from_bytes_be(&rdr.next()[..]);
        for _ in 0..100 {
            let nonce = rdr.next();
            let current = BigUint::from_bytes_be(&nonce[..]);
            // Counter wraps around after 2^256 nonces which is unlikely to happen here.
            assert_eq!(current, previous + 1u8);
            previous = current;
        }
    }

    #[test]
    fn test_readers_are_independent() {
        let addr: MacAddr = [1, 2, 3, 4, 5, 6];
        let a = NonceReader::new(&addr).expect("error creating NonceReader");
        let b = NonceReader::new(&addr).expect("error creating NonceReader");
        assert_ne!(a.next(), b.next());
    }
}
