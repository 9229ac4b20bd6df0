// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::Algorithm;
use crate::crypto_utils::ct_eq;
use crate::Error;
use aes::cipher::generic_array::GenericArray;
use aes::cipher::{BlockDecrypt, BlockEncrypt, NewBlockCipher};
use aes::{Aes128, Aes256};

// RFC 3394, 2.2.3.1 Default Initial Value
const DEFAULT_IV: [u8; 8] = [0xA6; 8];
const BLOCK_LEN: usize = 8;

enum Kek {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl Kek {
    fn new(key: &[u8]) -> Result<Self, Error> {
        match key.len() {
            16 => Ok(Kek::Aes128(Aes128::new(GenericArray::from_slice(key)))),
            32 => Ok(Kek::Aes256(Aes256::new(GenericArray::from_slice(key)))),
            _ => Err(Error::InvalidKeyLength),
        }
    }

    fn encrypt(&self, block: &mut [u8; 16]) {
        let block = GenericArray::from_mut_slice(&mut block[..]);
        match self {
            Kek::Aes128(cipher) => cipher.encrypt_block(block),
            Kek::Aes256(cipher) => cipher.encrypt_block(block),
        }
    }

    fn decrypt(&self, block: &mut [u8; 16]) {
        let block = GenericArray::from_mut_slice(&mut block[..]);
        match self {
            Kek::Aes128(cipher) => cipher.decrypt_block(block),
            Kek::Aes256(cipher) => cipher.decrypt_block(block),
        }
    }
}

/// RFC 3394 AES Key Wrap with 128 and 256 bit KEKs.
pub struct NistAes;

impl Algorithm for NistAes {
    // RFC 3394, 2.2.1 - Uses index based wrapping
    fn wrap(&self, key: &[u8], p: &[u8]) -> Result<Vec<u8>, Error> {
        if p.len() % BLOCK_LEN != 0 || p.len() < 2 * BLOCK_LEN {
            return Err(Error::InvalidKeyDataLength(p.len()));
        }
        let kek = Kek::new(key)?;
        let n = p.len() / BLOCK_LEN;

        // 1) Initialize variables.
        let mut a = DEFAULT_IV;
        let mut r = p.to_vec();
        let mut b = [0u8; 16];

        // 2) Calculate intermediate values.
        for j in 0..6 {
            for i in 1..=n {
                let r_i = &mut r[(i - 1) * BLOCK_LEN..i * BLOCK_LEN];
                b[..8].copy_from_slice(&a[..]);
                b[8..].copy_from_slice(r_i);
                kek.encrypt(&mut b);

                let t = ((n * j) + i) as u64;
                a.copy_from_slice(&b[..8]);
                for (a_k, t_k) in a.iter_mut().zip(t.to_be_bytes().iter()) {
                    *a_k ^= t_k;
                }
                r_i.copy_from_slice(&b[8..]);
            }
        }

        // 3) Output the results.
        let mut c = Vec::with_capacity(p.len() + BLOCK_LEN);
        c.extend_from_slice(&a[..]);
        c.extend_from_slice(&r[..]);
        Ok(c)
    }

    // RFC 3394, 2.2.2 - uses index based unwrapping
    fn unwrap(&self, key: &[u8], c: &[u8]) -> Result<Vec<u8>, Error> {
        if c.len() % BLOCK_LEN != 0 || c.len() < 3 * BLOCK_LEN {
            return Err(Error::InvalidKeyDataLength(c.len()));
        }
        let kek = Kek::new(key)?;
        let n = c.len() / BLOCK_LEN - 1;

        // 1) Initialize variables.
        let mut a = [0u8; 8];
        a.copy_from_slice(&c[..BLOCK_LEN]);
        let mut r = c[BLOCK_LEN..].to_vec();
        let mut b = [0u8; 16];

        // 2) Calculate intermediate values.
        for j in (0..6).rev() {
            for i in (1..=n).rev() {
                let t = ((n * j) + i) as u64;
                for (a_k, t_k) in a.iter_mut().zip(t.to_be_bytes().iter()) {
                    *a_k ^= t_k;
                }
                let r_i = &mut r[(i - 1) * BLOCK_LEN..i * BLOCK_LEN];
                b[..8].copy_from_slice(&a[..]);
                b[8..].copy_from_slice(r_i);
                kek.decrypt(&mut b);

                a.copy_from_slice(&b[..8]);
                r_i.copy_from_slice(&b[8..]);
            }
        }

        // 3) Output results.
        if ct_eq(&a[..], &DEFAULT_IV[..]) {
            Ok(r)
        } else {
            Err(Error::WrongAesKeywrapKey)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex::FromHex;

    fn test_wrap_unwrap<T: AsRef<[u8]>>(kek_hex: T, data_hex: T, expected_hex: T) {
        let kek = Vec::from_hex(kek_hex).expect("invalid hex KEK");
        let data = Vec::from_hex(data_hex).expect("invalid hex data");
        let expected = Vec::from_hex(expected_hex).expect("invalid hex result");
        let keywrap = NistAes;
        let result = keywrap.wrap(&kek[..], &data[..]).expect("error wrapping data");
        assert_eq!(result, expected);
        let plain = keywrap.unwrap(&kek[..], &result[..]).expect("error unwrapping data");
        assert_eq!(plain, data);
    }

    // RFC 3394, 4.1 Wrap 128 bits of Key Data with a 128-bit KEK
    #[test]
    fn test_128_data_128_kek() {
        test_wrap_unwrap(
            "000102030405060708090A0B0C0D0E0F",
            "00112233445566778899AABBCCDDEEFF",
            "1FA68B0A8112B447AEF34BD8FB5A7B829D3E862371D2CFE5",
        );
    }

    // RFC 3394, 4.3 Wrap 128 bits of Key Data with a 256-bit KEK
    #[test]
    fn test_128_data_256_kek() {
        test_wrap_unwrap(
            "000102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F",
            "00112233445566778899AABBCCDDEEFF",
            "64E8C3F9CE0F5BA263E9777905818A2A93C8191E7D6E8AE7",
        );
    }

    // RFC 3394, 4.6 Wrap 256 bits of Key Data with a 256-bit KEK
    #[test]
    fn test_256_data_256_kek() {
        test_wrap_unwrap(
            "000102030405060708090A0B0C0D0E0F101112131415161718191A1B1C1D1E1F",
            "00112233445566778899AABBCCDDEEFF000102030405060708090A0B0C0D0E0F",
            "28C9F404C4B810F4CBCCB35CFB87F8263F5786E2D80ED326CBC7F0E71A99F43BFB988B9B7A02DD21",
        );
    }

    #[test]
    fn test_unwrap_wrong_key() {
        let kek = Vec::from_hex("000102030405060708090A0B0C0D0E0F").expect("invalid hex");
        let mut wrong = kek.clone();
        wrong[0] ^= 1;
        let data = vec![7u8; 24];
        let wrapped = NistAes.wrap(&kek[..], &data[..]).expect("error wrapping data");
        assert_eq!(NistAes.unwrap(&wrong[..], &wrapped[..]), Err(Error::WrongAesKeywrapKey));
    }

    #[test]
    fn test_invalid_lengths() {
        let kek = [0u8; 16];
        assert_eq!(NistAes.wrap(&kek[..], &[0u8; 12]), Err(Error::InvalidKeyDataLength(12)));
        assert_eq!(NistAes.wrap(&kek[..], &[0u8; 8]), Err(Error::InvalidKeyDataLength(8)));
        assert_eq!(NistAes.unwrap(&kek[..], &[0u8; 16]), Err(Error::InvalidKeyDataLength(16)));
        assert_eq!(NistAes.wrap(&[0u8; 24], &[0u8; 16]), Err(Error::InvalidKeyLength));
    }
}
