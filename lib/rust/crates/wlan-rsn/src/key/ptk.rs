// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::crypto_utils::{kdf, prf, HashAlgorithm};
use crate::key::Tk;
use crate::Error;
use std::cmp::{max, min};
use std::fmt;
use wlan_common::ie::rsn::akm::{Akm, Kdf};
use wlan_common::ie::rsn::cipher::Cipher;
use wlan_common::mac::MacAddr;
use zeroize::Zeroize;

const LABEL: &str = "Pairwise key expansion";

/// A PTK is derived from a PMK and provides access to the PTK's key-hierarchy which yields a KEK,
/// KCK, and TK, used for EAPOL frame protection, integrity check and unicast frame protection
/// respectively.
#[derive(Clone, PartialEq)]
pub struct Ptk {
    ptk: Vec<u8>,
    kck_len: usize,
    kek_len: usize,
    tk_len: usize,
    pub cipher: Cipher,
}

impl Tk for Ptk {
    fn tk(&self) -> &[u8] {
        &self.ptk[self.kck_len + self.kek_len..]
    }
}

impl fmt::Debug for Ptk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ptk")
            .field("kck_len", &self.kck_len)
            .field("kek_len", &self.kek_len)
            .field("tk_len", &self.tk_len)
            .field("cipher", &self.cipher)
            .finish()
    }
}

impl Drop for Ptk {
    fn drop(&mut self) {
        self.ptk.zeroize();
    }
}

impl Ptk {
    // IEEE 802.11-2016, 12.7.1.3
    pub fn new(
        pmk: &[u8],
        aa: &MacAddr,
        spa: &MacAddr,
        anonce: &[u8],
        snonce: &[u8],
        akm: &Akm,
        cipher: Cipher,
    ) -> Result<Ptk, Error> {
        if anonce.len() != 32 || snonce.len() != 32 {
            return Err(Error::InvalidKeyLength);
        }
        let pmk_len = akm.pmk_bytes().ok_or(Error::UnsupportedAkmSuite)? as usize;
        if pmk.len() != pmk_len {
            return Err(Error::InvalidPmkLength(pmk.len()));
        }
        let kck_len = akm.kck_bytes().ok_or(Error::UnsupportedAkmSuite)? as usize;
        let kek_len = akm.kek_bytes().ok_or(Error::UnsupportedAkmSuite)? as usize;
        let tk_len = cipher.tk_bytes().ok_or(Error::UnsupportedCipherSuite)? as usize;
        let ptk_bits = 8 * (kck_len + kek_len + tk_len);

        let mut data: Vec<u8> = Vec::with_capacity(6 + 6 + 32 + 32);
        data.extend_from_slice(&min(aa, spa)[..]);
        data.extend_from_slice(&max(aa, spa)[..]);
        data.extend_from_slice(min(anonce, snonce));
        data.extend_from_slice(max(anonce, snonce));

        let ptk = match akm.kdf().ok_or(Error::UnsupportedAkmSuite)? {
            Kdf::PrfSha1 => prf(pmk, LABEL, &data[..], ptk_bits)?,
            Kdf::KdfSha256 => kdf(HashAlgorithm::Sha256, pmk, LABEL, &data[..], ptk_bits)?,
            Kdf::KdfSha384 => kdf(HashAlgorithm::Sha384, pmk, LABEL, &data[..], ptk_bits)?,
        };
        data.zeroize();
        Ok(Ptk { ptk, kck_len, kek_len, tk_len, cipher })
    }

    pub fn kck(&self) -> &[u8] {
        &self.ptk[0..self.kck_len]
    }

    pub fn kek(&self) -> &[u8] {
        let start = self.kck_len;
        &self.ptk[start..start + self.kek_len]
    }

    pub fn ptk(&self) -> &[u8] {
        &self.ptk[..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex::FromHex;
    use wlan_common::ie::rsn::{akm, cipher};

    struct TestData {
        pmk: Vec<u8>,
        aa: MacAddr,
        spa: MacAddr,
        anonce: Vec<u8>,
        snonce: Vec<u8>,
    }

    fn test_data() -> TestData {
        let pmk = Vec::from_hex("0dc0d6eb90555ed6419756b9a15ec3e3209b63df707dd508d14581f8982721af")
            .expect("invalid hex");
        let anonce =
            Vec::from_hex("e0e1e2e3e4e5e6e7e8e9f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff000102030405")
                .expect("invalid hex");
        let snonce =
            Vec::from_hex("c0c1c2c3c4c5c6c7c8c9d0d1d2d3d4d5d6d7d8d9dadbdcdddedfe0e1e2e3e4e5")
                .expect("invalid hex");
        TestData {
            pmk,
            aa: [0xa0, 0xa1, 0xa2, 0xa3, 0xa4, 0xa5],
            spa: [0xb0, 0xb1, 0xb2, 0xb3, 0xb4, 0xb5],
            anonce,
            snonce,
        }
    }

    fn new_ptk(data: &TestData, akm: Akm, cipher: Cipher) -> Result<Ptk, Error> {
        let (anonce, snonce) = (&data.anonce[..], &data.snonce[..]);
        Ptk::new(&data.pmk[..], &data.aa, &data.spa, anonce, snonce, &akm, cipher)
    }

    // PRF-384 over the inputs above, split into KCK, KEK and TK.
    #[test]
    fn test_pairwise_key_hierarchy_ccmp() {
        let data = test_data();
        let ptk = new_ptk(&data, Akm::new_dot11(akm::PSK), Cipher::new_dot11(cipher::CCMP_128))
            .expect("error deriving PTK");
        let expected_kck = Vec::from_hex("31f2297df94c1fd9ed0f301ae8abcc3e").expect("invalid hex");
        let expected_kek = Vec::from_hex("7fabee531cabf1be79b6ac3294836c16").expect("invalid hex");
        let expected_tk = Vec::from_hex("8ada8d311e33a4d1f7c8153ebd7cbfb5").expect("invalid hex");
        assert_eq!(ptk.kck(), &expected_kck[..]);
        assert_eq!(ptk.kek(), &expected_kek[..]);
        assert_eq!(ptk.tk(), &expected_tk[..]);
    }

    #[test]
    fn test_derivation_is_symmetric_in_roles() {
        let data = test_data();
        let akm = Akm::new_dot11(akm::SAE);
        let cipher = Cipher::new_dot11(cipher::CCMP_128);
        let a = Ptk::new(&data.pmk[..], &data.aa, &data.spa, &data.anonce[..], &data.snonce[..],
            &akm, cipher).expect("error deriving PTK");
        let b = Ptk::new(&data.pmk[..], &data.spa, &data.aa, &data.snonce[..], &data.anonce[..],
            &akm, cipher).expect("error deriving PTK");
        assert_eq!(a.ptk(), b.ptk());
    }

    #[test]
    fn test_key_lengths_by_akm() {
        let data = test_data();
        let gcmp = Cipher::new_dot11(cipher::GCMP_256);
        let ptk = new_ptk(&data, Akm::new_dot11(akm::PSK_SHA256), gcmp)
            .expect("error deriving PTK");
        assert_eq!((ptk.kck().len(), ptk.kek().len(), ptk.tk().len()), (16, 16, 32));

        let mut data = test_data();
        data.pmk = vec![3u8; 48];
        let ptk = new_ptk(&data, Akm::new_dot11(akm::EAP_SUITEB_SHA384),
            Cipher::new_dot11(cipher::GCMP_256)).expect("error deriving PTK");
        assert_eq!((ptk.kck().len(), ptk.kek().len(), ptk.tk().len()), (24, 32, 32));
    }

    #[test]
    fn test_invalid_inputs() {
        let mut data = test_data();
        let ccmp = Cipher::new_dot11(cipher::CCMP_128);
        let result = new_ptk(&data, Akm::new_dot11(akm::FT_PSK), ccmp);
        assert_eq!(result, Err(Error::UnsupportedAkmSuite));
        assert_eq!(
            new_ptk(
                &data,
                Akm::new_dot11(akm::PSK),
                Cipher::new_dot11(cipher::GROUP_ADDRESSED_TRAFFIC_NOT_ALLOWED)
            ),
            Err(Error::UnsupportedCipherSuite)
        );
        data.anonce.truncate(31);
        assert_eq!(new_ptk(&data, Akm::new_dot11(akm::PSK), ccmp), Err(Error::InvalidKeyLength));
        let mut data = test_data();
        data.pmk.push(0);
        let result = new_ptk(&data, Akm::new_dot11(akm::PSK), ccmp);
        assert_eq!(result, Err(Error::InvalidPmkLength(33)));
    }
}
