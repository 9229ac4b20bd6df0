// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Derivation of the SAE password element (PWE).

use super::ecc::{to_fixed_bytes, Curve, Point, PRIME_LEN};
use crate::crypto_utils::{hmac, kdf_sha256, HashAlgorithm};
use crate::Error;
use hkdf::Hkdf;
use log::debug;
use num::bigint::BigUint;
use num::{One, Zero};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use wlan_common::mac::{min_max_addr, MacAddr};

/// Minimum number of hunting and pecking iterations, independent of when a valid x is found.
const HNP_MIN_ITERATIONS: u8 = 40;
const HNP_MAX_ITERATIONS: u8 = 200;
const HNP_LABEL: &str = "SAE Hunting and Pecking";

const H2E_U1_LABEL: &[u8] = b"SAE Hash to Element u1 P1";
const H2E_U2_LABEL: &[u8] = b"SAE Hash to Element u2 P2";
// Prime length plus half the security strength.
const H2E_HASH_LEN: usize = PRIME_LEN + PRIME_LEN / 2;

fn addr_key(a: &MacAddr, b: &MacAddr) -> Vec<u8> {
    let (min, max) = min_max_addr(a, b);
    let mut key = max.to_vec();
    key.extend_from_slice(&min[..]);
    key
}

/// Looping derivation of the PWE from the password and both addresses.
// IEEE Std 802.11-2016, 12.4.4.2.2
pub fn hunting_and_pecking(
    curve: &Curve,
    password: &[u8],
    identifier: Option<&[u8]>,
    addr1: &MacAddr,
    addr2: &MacAddr,
) -> Result<Point, Error> {
    let key = addr_key(addr1, addr2);
    let prime = to_fixed_bytes(&curve.p, PRIME_LEN);
    let identifier = identifier.unwrap_or(&[]);

    let mut found: Option<(BigUint, bool)> = None;
    for counter in 1..=HNP_MAX_ITERATIONS {
        if counter > HNP_MIN_ITERATIONS && found.is_some() {
            break;
        }
        let counter = [counter];
        let pwd_seed =
            hmac(HashAlgorithm::Sha256, &key[..], &[password, identifier, &counter[..]])?;
        let pwd_value = kdf_sha256(&pwd_seed[..], HNP_LABEL, &prime[..], PRIME_LEN * 8)?;
        let x = BigUint::from_bytes_be(&pwd_value[..]);
        if x >= curve.p {
            continue;
        }
        let y_squared = curve.y_squared(&x);
        if found.is_none() && curve.is_quadratic_residue(&y_squared) {
            let seed_odd = pwd_seed[pwd_seed.len() - 1] & 1 == 1;
            found = Some((x, seed_odd));
        }
    }

    let (x, seed_odd) = found.ok_or(Error::SaePweDerivation)?;
    let y = curve.sqrt(&curve.y_squared(&x)).ok_or(Error::SaePweDerivation)?;
    let y = if y.bit(0) == seed_odd { y } else { curve.sub_mod(&BigUint::zero(), &y) };
    Ok(Point::Affine { x, y })
}

/// Simplified Shallue-van de Woestijne-Ulas map of a field element onto the curve.
// RFC 9380, 6.6.2
fn sswu(curve: &Curve, u: &BigUint) -> Result<Point, Error> {
    let z = &curve.p - 10u8;
    let u2 = curve.mul_mod(u, u);
    let zu2 = curve.mul_mod(&z, &u2);
    let m = curve.add_mod(&zu2, &curve.mul_mod(&zu2, &zu2));
    let t = curve.inv_mod(&m);

    let x1 = if m.is_zero() {
        curve.mul_mod(&curve.b, &curve.inv_mod(&curve.mul_mod(&z, &curve.a)))
    } else {
        let minus_b = curve.sub_mod(&BigUint::zero(), &curve.b);
        let minus_b_over_a = curve.mul_mod(&minus_b, &curve.inv_mod(&curve.a));
        curve.mul_mod(&minus_b_over_a, &curve.add_mod(&BigUint::one(), &t))
    };
    let gx1 = curve.y_squared(&x1);
    let x2 = curve.mul_mod(&zu2, &x1);
    let gx2 = curve.y_squared(&x2);

    let (x, v) = if curve.is_quadratic_residue(&gx1) { (x1, gx1) } else { (x2, gx2) };
    let y = curve.sqrt(&v).ok_or(Error::SaePweDerivation)?;
    let y = if y.bit(0) == u.bit(0) { y } else { curve.sub_mod(&BigUint::zero(), &y) };
    Ok(Point::Affine { x, y })
}

/// Derives the password token PT used by hash-to-element.
// IEEE Std 802.11-2020, 12.4.4.2.3
pub fn derive_pt(
    curve: &Curve,
    ssid: &[u8],
    password: &[u8],
    identifier: Option<&[u8]>,
) -> Result<Point, Error> {
    let mut ikm = password.to_vec();
    if let Some(identifier) = identifier {
        ikm.extend_from_slice(identifier);
    }
    let (_, hk) = Hkdf::<Sha256>::extract(Some(ssid), &ikm[..]);

    let mut pt = Point::Infinity;
    for label in &[H2E_U1_LABEL, H2E_U2_LABEL] {
        let mut okm = [0u8; H2E_HASH_LEN];
        hk.expand(label, &mut okm[..]).map_err(|_| Error::SaePweDerivation)?;
        let u = BigUint::from_bytes_be(&okm[..]) % &curve.p;
        pt = curve.add(&pt, &sswu(curve, &u)?);
    }
    if pt.is_infinity() {
        return Err(Error::SaePweDerivation);
    }
    Ok(pt)
}

/// Derives the PWE of one peer pair from a precomputed PT.
// IEEE Std 802.11-2020, 12.4.4.2.3
pub fn pwe_from_pt(
    curve: &Curve,
    pt: &Point,
    addr1: &MacAddr,
    addr2: &MacAddr,
) -> Result<Point, Error> {
    let (prk, _) = Hkdf::<Sha256>::extract(Some(&[0u8; 32][..]), &addr_key(addr1, addr2)[..]);
    let val = BigUint::from_bytes_be(&prk[..]) % (&curve.n - 1u8) + 1u8;
    let pwe = curve.mul(pt, &val);
    if pwe.is_infinity() {
        return Err(Error::SaePweDerivation);
    }
    Ok(pwe)
}

struct CachedPt {
    ssid: Vec<u8>,
    password_digest: Vec<u8>,
    pt: Point,
}

/// Keeps the PT of each password identifier so hash-to-element does not redo the mapping for
/// every peer. An entry is recomputed when the SSID or password changes.
#[derive(Default)]
pub struct PtCache {
    entries: HashMap<Option<Vec<u8>>, CachedPt>,
}

impl PtCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_or_derive(
        &mut self,
        curve: &Curve,
        ssid: &[u8],
        password: &[u8],
        identifier: Option<&[u8]>,
    ) -> Result<Point, Error> {
        let password_digest = Sha256::digest(password).to_vec();
        let key = identifier.map(|id| id.to_vec());
        if let Some(cached) = self.entries.get(&key) {
            if cached.ssid == ssid && cached.password_digest == password_digest {
                return Ok(cached.pt.clone());
            }
        }
        debug!("computing SAE PT");
        let pt = derive_pt(curve, ssid, password, identifier)?;
        self.entries
            .insert(key, CachedPt { ssid: ssid.to_vec(), password_digest, pt: pt.clone() });
        Ok(pt)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
