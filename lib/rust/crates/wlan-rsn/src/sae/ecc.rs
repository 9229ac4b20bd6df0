// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Arithmetic on the NIST P-256 curve, SAE group 19.
//! Scalar multiplication runs in Jacobian coordinates and converts back to affine coordinates
//! once at the end.

use num::bigint::{BigUint, RandBigInt};
use num::{One, Zero};

pub const GROUP_ID: u16 = 19;
/// Octets of a field element and of a scalar.
pub const PRIME_LEN: usize = 32;

const P: [u8; PRIME_LEN] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
];
const B: [u8; PRIME_LEN] = [
    0x5a, 0xc6, 0x35, 0xd8, 0xaa, 0x3a, 0x93, 0xe7, 0xb3, 0xeb, 0xbd, 0x55, 0x76, 0x98, 0x86, 0xbc,
    0x65, 0x1d, 0x06, 0xb0, 0xcc, 0x53, 0xb0, 0xf6, 0x3b, 0xce, 0x3c, 0x3e, 0x27, 0xd2, 0x60, 0x4b,
];
const N: [u8; PRIME_LEN] = [
    0xff, 0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff,
    0xbc, 0xe6, 0xfa, 0xad, 0xa7, 0x17, 0x9e, 0x84, 0xf3, 0xb9, 0xca, 0xc2, 0xfc, 0x63, 0x25, 0x51,
];

#[derive(Clone, PartialEq, Eq)]
pub enum Point {
    Infinity,
    Affine { x: BigUint, y: BigUint },
}

impl std::fmt::Debug for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Point::Infinity => write!(f, "Infinity"),
            Point::Affine { x, .. } => write!(f, "Point(x={:x})", x),
        }
    }
}

impl Point {
    pub fn is_infinity(&self) -> bool {
        *self == Point::Infinity
    }

    pub fn x(&self) -> Option<&BigUint> {
        match self {
            Point::Infinity => None,
            Point::Affine { x, .. } => Some(x),
        }
    }
}

#[derive(Clone)]
struct Jacobian {
    x: BigUint,
    y: BigUint,
    z: BigUint,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Curve {
    pub p: BigUint,
    pub a: BigUint,
    pub b: BigUint,
    /// Order of the group.
    pub n: BigUint,
}

impl Curve {
    pub fn p256() -> Self {
        let p = BigUint::from_bytes_be(&P[..]);
        let a = &p - 3u8;
        Curve { a, b: BigUint::from_bytes_be(&B[..]), n: BigUint::from_bytes_be(&N[..]), p }
    }

    pub fn add_mod(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a + b) % &self.p
    }

    pub fn sub_mod(&self, a: &BigUint, b: &BigUint) -> BigUint {
        ((a % &self.p) + &self.p - (b % &self.p)) % &self.p
    }

    pub fn mul_mod(&self, a: &BigUint, b: &BigUint) -> BigUint {
        (a * b) % &self.p
    }

    /// Multiplicative inverse by Fermat's little theorem. Returns zero for zero.
    pub fn inv_mod(&self, a: &BigUint) -> BigUint {
        a.modpow(&(&self.p - 2u8), &self.p)
    }

    /// x^3 + ax + b
    pub fn y_squared(&self, x: &BigUint) -> BigUint {
        let x3 = x.modpow(&BigUint::from(3u8), &self.p);
        let ax = self.mul_mod(&self.a, x);
        self.add_mod(&self.add_mod(&x3, &ax), &self.b)
    }

    /// Whether `v` is a quadratic residue modulo p. Zero counts as a residue.
    pub fn is_quadratic_residue(&self, v: &BigUint) -> bool {
        let exp = (&self.p - 1u8) >> 1;
        let legendre = v.modpow(&exp, &self.p);
        legendre.is_zero() || legendre.is_one()
    }

    /// Square root modulo p. P-256's prime is congruent to 3 modulo 4.
    pub fn sqrt(&self, v: &BigUint) -> Option<BigUint> {
        let exp = (&self.p + 1u8) >> 2;
        let root = v.modpow(&exp, &self.p);
        if self.mul_mod(&root, &root) == v % &self.p {
            Some(root)
        } else {
            None
        }
    }

    pub fn is_on_curve(&self, point: &Point) -> bool {
        match point {
            Point::Infinity => false,
            Point::Affine { x, y } => {
                x < &self.p && y < &self.p && self.mul_mod(y, y) == self.y_squared(x)
            }
        }
    }

    pub fn negate(&self, point: &Point) -> Point {
        match point {
            Point::Infinity => Point::Infinity,
            Point::Affine { x, y } => {
                Point::Affine { x: x.clone(), y: self.sub_mod(&BigUint::zero(), y) }
            }
        }
    }

    pub fn add(&self, a: &Point, b: &Point) -> Point {
        match (self.to_jacobian(a), self.to_jacobian(b)) {
            (None, _) => b.clone(),
            (_, None) => a.clone(),
            (Some(a), Some(b)) => self.to_affine(self.jacobian_add(&a, &b)),
        }
    }

    pub fn mul(&self, point: &Point, scalar: &BigUint) -> Point {
        let base = match self.to_jacobian(point) {
            None => return Point::Infinity,
            Some(base) => base,
        };
        let mut acc: Option<Jacobian> = None;
        for i in (0..scalar.bits()).rev() {
            acc = acc.and_then(|acc| self.jacobian_double(&acc));
            if scalar.bit(i) {
                acc = match acc {
                    None => Some(base.clone()),
                    Some(acc) => self.jacobian_add(&acc, &base),
                };
            }
        }
        self.to_affine(acc)
    }

    fn to_jacobian(&self, point: &Point) -> Option<Jacobian> {
        match point {
            Point::Infinity => None,
            Point::Affine { x, y } => {
                Some(Jacobian { x: x.clone(), y: y.clone(), z: BigUint::one() })
            }
        }
    }

    fn to_affine(&self, point: Option<Jacobian>) -> Point {
        match point {
            None => Point::Infinity,
            Some(Jacobian { x, y, z }) => {
                let z_inv = self.inv_mod(&z);
                let z_inv2 = self.mul_mod(&z_inv, &z_inv);
                let z_inv3 = self.mul_mod(&z_inv2, &z_inv);
                Point::Affine { x: self.mul_mod(&x, &z_inv2), y: self.mul_mod(&y, &z_inv3) }
            }
        }
    }

    fn jacobian_double(&self, pt: &Jacobian) -> Option<Jacobian> {
        if pt.y.is_zero() {
            return None;
        }
        let xx = self.mul_mod(&pt.x, &pt.x);
        let yy = self.mul_mod(&pt.y, &pt.y);
        let yyyy = self.mul_mod(&yy, &yy);
        let zz = self.mul_mod(&pt.z, &pt.z);
        let s = self.mul_mod(&BigUint::from(4u8), &self.mul_mod(&pt.x, &yy));
        let m = self.add_mod(
            &self.mul_mod(&BigUint::from(3u8), &xx),
            &self.mul_mod(&self.a, &self.mul_mod(&zz, &zz)),
        );
        let x3 = self.sub_mod(&self.mul_mod(&m, &m), &self.add_mod(&s, &s));
        let y3 = self.sub_mod(
            &self.mul_mod(&m, &self.sub_mod(&s, &x3)),
            &self.mul_mod(&BigUint::from(8u8), &yyyy),
        );
        let z3 = self.mul_mod(&BigUint::from(2u8), &self.mul_mod(&pt.y, &pt.z));
        Some(Jacobian { x: x3, y: y3, z: z3 })
    }

    fn jacobian_add(&self, a: &Jacobian, b: &Jacobian) -> Option<Jacobian> {
        let z1z1 = self.mul_mod(&a.z, &a.z);
        let z2z2 = self.mul_mod(&b.z, &b.z);
        let u1 = self.mul_mod(&a.x, &z2z2);
        let u2 = self.mul_mod(&b.x, &z1z1);
        let s1 = self.mul_mod(&a.y, &self.mul_mod(&b.z, &z2z2));
        let s2 = self.mul_mod(&b.y, &self.mul_mod(&a.z, &z1z1));
        if u1 == u2 {
            return if s1 == s2 { self.jacobian_double(a) } else { None };
        }
        let h = self.sub_mod(&u2, &u1);
        let r = self.sub_mod(&s2, &s1);
        let hh = self.mul_mod(&h, &h);
        let hhh = self.mul_mod(&h, &hh);
        let v = self.mul_mod(&u1, &hh);
        let x3 = self.sub_mod(&self.sub_mod(&self.mul_mod(&r, &r), &hhh), &self.add_mod(&v, &v));
        let y3 = self.sub_mod(&self.mul_mod(&r, &self.sub_mod(&v, &x3)), &self.mul_mod(&s1, &hhh));
        let z3 = self.mul_mod(&self.mul_mod(&a.z, &b.z), &h);
        Some(Jacobian { x: x3, y: y3, z: z3 })
    }

    /// Random value in [2, n).
    pub fn random_scalar(&self) -> BigUint {
        rand::thread_rng().gen_biguint_range(&BigUint::from(2u8), &self.n)
    }

    /// Uncompressed point encoding without the format octet: x || y.
    pub fn point_to_bytes(&self, point: &Point) -> Option<Vec<u8>> {
        match point {
            Point::Infinity => None,
            Point::Affine { x, y } => {
                let mut buf = to_fixed_bytes(x, PRIME_LEN);
                buf.extend_from_slice(&to_fixed_bytes(y, PRIME_LEN)[..]);
                Some(buf)
            }
        }
    }

    /// Decodes x || y. The point must be on the curve.
    pub fn point_from_bytes(&self, bytes: &[u8]) -> Option<Point> {
        if bytes.len() != 2 * PRIME_LEN {
            return None;
        }
        let point = Point::Affine {
            x: BigUint::from_bytes_be(&bytes[..PRIME_LEN]),
            y: BigUint::from_bytes_be(&bytes[PRIME_LEN..]),
        };
        if self.is_on_curve(&point) {
            Some(point)
        } else {
            None
        }
    }
}

/// Big-endian encoding left padded with zeros to `len` octets.
pub fn to_fixed_bytes(value: &BigUint, len: usize) -> Vec<u8> {
    let bytes = value.to_bytes_be();
    if bytes.len() >= len {
        return bytes[bytes.len() - len..].to_vec();
    }
    let mut buf = vec![0u8; len - bytes.len()];
    buf.extend_from_slice(&bytes[..]);
    buf
}
