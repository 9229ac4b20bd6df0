// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Anti-clogging tokens: stateless cookies handed to peers whose commit is not processed yet.
//! A token embeds an index tied to the peer's slot in a small pending table, followed by an
//! HMAC over the peer address and that index.

use super::frame::TOKEN_LEN;
use crate::crypto_utils::{ct_eq, hmac, HashAlgorithm};
use crate::Error;
use log::{debug, info};
use parking_lot::Mutex;
use rand::RngCore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wlan_common::mac::{MacAddr, MacFmt};
use zeroize::Zeroize;

const KEY_LEN: usize = 8;
const INDEX_LEN: usize = 2;
const SLOTS: usize = 256;

pub type SharedComebackTokens = Arc<Mutex<ComebackTokens>>;

pub struct ComebackTokens {
    key: [u8; KEY_LEN],
    key_created: Option<Instant>,
    rotation_interval: Duration,
    // Upper byte of the next index handed out. Zero marks an exhausted index space.
    next_counter: u8,
    pending: [u16; SLOTS],
}

impl std::fmt::Debug for ComebackTokens {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComebackTokens")
            .field("key_created", &self.key_created)
            .field("next_counter", &self.next_counter)
            .finish()
    }
}

impl Drop for ComebackTokens {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

fn slot(addr: &MacAddr) -> u8 {
    addr.iter().fold(0u8, |acc, b| acc.rotate_left(3) ^ b)
}

impl ComebackTokens {
    pub fn new(rotation_interval: Duration) -> Self {
        ComebackTokens {
            key: [0u8; KEY_LEN],
            key_created: None,
            rotation_interval,
            next_counter: 0,
            pending: [0u16; SLOTS],
        }
    }

    pub fn new_shared(rotation_interval: Duration) -> SharedComebackTokens {
        Arc::new(Mutex::new(Self::new(rotation_interval)))
    }

    /// Picks a new key. Every outstanding token becomes invalid.
    pub fn rotate(&mut self, now: Instant) {
        info!("rotating anti-clogging token key");
        rand::thread_rng().fill_bytes(&mut self.key[..]);
        self.key_created = Some(now);
        self.next_counter = 1;
        self.pending = [0u16; SLOTS];
    }

    fn needs_rotation(&self, now: Instant) -> bool {
        match self.key_created {
            None => true,
            Some(created) => {
                self.next_counter == 0 || now.duration_since(created) >= self.rotation_interval
            }
        }
    }

    fn mac(&self, addr: &MacAddr, index: u16) -> Result<Vec<u8>, Error> {
        let index = index.to_be_bytes();
        let mut mac = hmac(HashAlgorithm::Sha256, &self.key[..], &[&addr[..], &index[..]])?;
        mac.truncate(TOKEN_LEN - INDEX_LEN);
        Ok(mac)
    }

    /// Creates a token for `addr`. A previous token of a peer sharing the same slot is no
    /// longer accepted afterwards.
    pub fn build_token_req(&mut self, addr: &MacAddr, now: Instant) -> Result<Vec<u8>, Error> {
        if self.needs_rotation(now) {
            self.rotate(now);
        }
        let slot = slot(addr);
        let index = u16::from_be_bytes([self.next_counter, slot]);
        self.next_counter = self.next_counter.wrapping_add(1);
        self.pending[slot as usize] = index;

        let mut token = index.to_be_bytes().to_vec();
        token.extend_from_slice(&self.mac(addr, index)?[..]);
        debug!("issued anti-clogging token to {}", addr.to_mac_str());
        Ok(token)
    }

    /// Verifies a token handed out to `addr`. A token is accepted at most once.
    pub fn check_token(&mut self, addr: &MacAddr, token: &[u8]) -> bool {
        if token.len() != TOKEN_LEN {
            return false;
        }
        let index = u16::from_be_bytes([token[0], token[1]]);
        let slot = slot(addr);
        if index == 0 || index & 0xff != u16::from(slot) || self.pending[slot as usize] != index {
            return false;
        }
        let expected = match self.mac(addr, index) {
            Ok(mac) => mac,
            Err(_) => return false,
        };
        if !ct_eq(&expected[..], &token[INDEX_LEN..]) {
            return false;
        }
        self.pending[slot as usize] = 0;
        true
    }
}
