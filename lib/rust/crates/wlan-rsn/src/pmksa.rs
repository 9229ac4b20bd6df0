// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Cache of PMK Security Associations, shared by all peers of one interface.

use crate::config::PmksaConfig;
use crate::crypto_utils::{hmac, HashAlgorithm};
use crate::Error;
use bytes::Bytes;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use wlan_common::ie::rsn::akm::{self, Akm};
use wlan_common::ie::rsn::pmkid::{self, Pmkid};
use wlan_common::ie::rsn::Error as RsnError;
use wlan_common::mac::{MacAddr, MacFmt};
use zeroize::Zeroize;

pub const MAX_PMK_LEN: usize = 64;
const PMK_NAME: &[u8] = b"PMK Name";

pub type SharedPmksaCache = Arc<Mutex<PmksaCache>>;

/// Computes the PMKID identifying `pmk` between `aa` and `spa`.
/// Suite B AKMs name the PMKSA with the KCK instead of the PMK.
// IEEE Std 802.11-2016, 12.7.1.3
pub fn compute_pmkid(
    pmk: &[u8],
    kck: Option<&[u8]>,
    aa: &MacAddr,
    spa: &MacAddr,
    akm: &Akm,
) -> Result<Pmkid, Error> {
    let parts: [&[u8]; 3] = [PMK_NAME, &aa[..], &spa[..]];
    let mut mac = match akm.suite_type {
        akm::EAP_SUITEB => {
            hmac(HashAlgorithm::Sha256, kck.ok_or(Error::PmksaMissingKck)?, &parts)?
        }
        akm::EAP_SUITEB_SHA384 => {
            hmac(HashAlgorithm::Sha384, kck.ok_or(Error::PmksaMissingKck)?, &parts)?
        }
        akm::EAP_SHA256 | akm::PSK_SHA256 | akm::SAE => {
            hmac(HashAlgorithm::Sha256, pmk, &parts)?
        }
        _ => hmac(HashAlgorithm::Sha1, pmk, &parts)?,
    };
    mac.truncate(pmkid::LEN);
    Ok(Bytes::from(mac))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreeReason {
    /// A new PMKSA for the same peer took its place.
    Replaced,
    /// The cache was full.
    Evicted,
    Expired,
    Flushed,
}

#[derive(Clone, PartialEq)]
pub struct PmksaEntry {
    pmk: Vec<u8>,
    kck: Option<Vec<u8>>,
    pub pmkid: Pmkid,
    /// Address of the peer the PMKSA was established with.
    pub peer: MacAddr,
    pub aa: MacAddr,
    pub akm: Akm,
    pub expiration: Instant,
    /// Point after which the PMKSA should be refreshed by a full authentication.
    pub reauth_time: Instant,
    /// Session-Timeout handed out by an AAA server, kept opaque.
    pub session_timeout: Option<u32>,
}

impl PmksaEntry {
    pub fn pmk(&self) -> &[u8] {
        &self.pmk[..]
    }

    pub fn kck(&self) -> Option<&[u8]> {
        self.kck.as_ref().map(|kck| &kck[..])
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expiration
    }
}

impl fmt::Debug for PmksaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PmksaEntry")
            .field("pmkid", &hex::encode(&self.pmkid[..]))
            .field("peer", &self.peer.to_mac_str())
            .field("aa", &self.aa.to_mac_str())
            .field("akm", &self.akm)
            .field("pmk_len", &self.pmk.len())
            .field("expiration", &self.expiration)
            .finish()
    }
}

impl Drop for PmksaEntry {
    fn drop(&mut self) {
        self.pmk.zeroize();
        if let Some(kck) = self.kck.as_mut() {
            kck.zeroize();
        }
    }
}

/// An entry which left the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct FreedPmksa {
    pub peer: MacAddr,
    pub pmkid: Pmkid,
    pub reason: FreeReason,
}

/// Parameters of a new PMKSA.
pub struct NewPmksa<'a> {
    pub pmk: &'a [u8],
    /// Computed from the PMK when absent.
    pub pmkid: Option<Pmkid>,
    pub kck: Option<&'a [u8]>,
    pub peer: MacAddr,
    pub aa: MacAddr,
    pub spa: MacAddr,
    pub akm: Akm,
    /// Lifetime of the entry; the configured lifetime is used when absent.
    pub lifetime: Option<Duration>,
    pub session_timeout: Option<u32>,
}

pub struct PmksaCache {
    // Ordered by expiration, soonest first.
    entries: VecDeque<PmksaEntry>,
    // PMKID of the PMKSA each peer's association uses.
    current: HashMap<MacAddr, Pmkid>,
    // Holds at most `max_entries` records; older ones are dropped first.
    freed: VecDeque<FreedPmksa>,
    cfg: PmksaConfig,
}

impl PmksaCache {
    pub fn new(cfg: PmksaConfig) -> Self {
        PmksaCache {
            entries: VecDeque::new(),
            current: HashMap::new(),
            freed: VecDeque::new(),
            cfg,
        }
    }

    pub fn new_shared(cfg: PmksaConfig) -> SharedPmksaCache {
        Arc::new(Mutex::new(Self::new(cfg)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Adds a PMKSA. An existing PMKSA for the same peer is replaced, and the entry expiring
    /// soonest is evicted if the cache is full.
    pub fn add(&mut self, new: NewPmksa<'_>, now: Instant) -> Result<&PmksaEntry, Error> {
        if new.pmk.is_empty() || new.pmk.len() > MAX_PMK_LEN {
            return Err(Error::InvalidPmkLength(new.pmk.len()));
        }
        if new.akm.is_suite_b() && new.kck.is_none() {
            return Err(Error::PmksaMissingKck);
        }
        let pmkid = match new.pmkid {
            Some(pmkid) if pmkid.len() == pmkid::LEN => pmkid,
            Some(pmkid) => return Err(RsnError::InvalidPmkidLength(pmkid.len()).into()),
            None => compute_pmkid(new.pmk, new.kck, &new.aa, &new.spa, &new.akm)?,
        };

        let lifetime = new.lifetime.unwrap_or_else(|| self.cfg.lifetime());
        let reauth_after = lifetime * self.cfg.reauth_threshold_percent / 100;
        let entry = PmksaEntry {
            pmk: new.pmk.to_vec(),
            kck: new.kck.map(|kck| kck.to_vec()),
            pmkid,
            peer: new.peer,
            aa: new.aa,
            akm: new.akm,
            expiration: now + lifetime,
            reauth_time: now + reauth_after,
            session_timeout: new.session_timeout,
        };

        let peer = entry.peer;
        self.remove_where(|e| e.peer == peer, FreeReason::Replaced);
        while self.entries.len() >= self.cfg.max_entries {
            match self.entries.pop_front() {
                Some(oldest) => {
                    info!("PMKSA cache full; evicting entry of {}", oldest.peer.to_mac_str());
                    self.on_freed(oldest, FreeReason::Evicted);
                }
                None => break,
            }
        }

        let idx = self.entries.iter().position(|e| e.expiration > entry.expiration);
        let idx = idx.unwrap_or(self.entries.len());
        debug!("added PMKSA {:?}", entry);
        self.entries.insert(idx, entry);
        Ok(&self.entries[idx])
    }

    /// Looks up an unexpired PMKSA of `peer`, optionally with a specific PMKID.
    pub fn get(
        &self,
        peer: &MacAddr,
        pmkid: Option<&[u8]>,
        now: Instant,
    ) -> Option<&PmksaEntry> {
        self.entries.iter().find(|e| {
            e.peer == *peer
                && pmkid.map_or(true, |pmkid| &e.pmkid[..] == pmkid)
                && !e.is_expired(now)
        })
    }

    /// Selects the PMKSA used by the ongoing association with `peer`.
    pub fn set_current(
        &mut self,
        peer: &MacAddr,
        pmkid: Option<&[u8]>,
        now: Instant,
    ) -> Result<(), Error> {
        let pmkid = self.get(peer, pmkid, now).ok_or(Error::PmksaNotEstablished)?.pmkid.clone();
        self.current.insert(*peer, pmkid);
        Ok(())
    }

    pub fn current(&self, peer: &MacAddr) -> Option<&PmksaEntry> {
        let pmkid = self.current.get(peer)?;
        self.entries.iter().find(|e| e.peer == *peer && e.pmkid == *pmkid)
    }

    pub fn clear_current(&mut self, peer: &MacAddr) {
        self.current.remove(peer);
    }

    /// Removes the PMKSAs of `peer`, or all of them.
    pub fn flush(&mut self, peer: Option<&MacAddr>) {
        match peer {
            Some(peer) => self.remove_where(|e| e.peer == *peer, FreeReason::Flushed),
            None => self.remove_where(|_| true, FreeReason::Flushed),
        }
    }

    /// Removes expired entries and returns when the next entry expires.
    pub fn on_expire(&mut self, now: Instant) -> Option<Instant> {
        while self.entries.front().map_or(false, |e| e.is_expired(now)) {
            if let Some(entry) = self.entries.pop_front() {
                info!("PMKSA of {} expired", entry.peer.to_mac_str());
                self.on_freed(entry, FreeReason::Expired);
            }
        }
        self.entries.front().map(|e| e.expiration)
    }

    /// Entries freed since the last call, in the order they left the cache.
    pub fn drain_freed(&mut self) -> Vec<FreedPmksa> {
        self.freed.drain(..).collect()
    }

    fn remove_where<F: Fn(&PmksaEntry) -> bool>(&mut self, pred: F, reason: FreeReason) {
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for entry in self.entries.drain(..).collect::<Vec<_>>() {
            if pred(&entry) {
                self.on_freed(entry, reason);
            } else {
                kept.push_back(entry);
            }
        }
        self.entries = kept;
    }

    fn on_freed(&mut self, entry: PmksaEntry, reason: FreeReason) {
        if self.current.get(&entry.peer) == Some(&entry.pmkid) {
            self.current.remove(&entry.peer);
        }
        if self.freed.len() >= self.cfg.max_entries.max(1) {
            if let Some(dropped) = self.freed.pop_front() {
                debug!("dropping unclaimed record of freed PMKSA of {}", dropped.peer.to_mac_str());
            }
        }
        self.freed.push_back(FreedPmksa { peer: entry.peer, pmkid: entry.pmkid.clone(), reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rsna::test_util;
    use hex::FromHex;

    const PEER_A: MacAddr = [1, 1, 1, 1, 1, 1];
    const PEER_B: MacAddr = [2, 2, 2, 2, 2, 2];
    const PEER_C: MacAddr = [3, 3, 3, 3, 3, 3];

    fn new_pmksa(peer: MacAddr, pmk: &[u8]) -> NewPmksa<'_> {
        NewPmksa {
            pmk,
            pmkid: None,
            kck: None,
            peer,
            aa: test_util::A_ADDR,
            spa: peer,
            akm: Akm::new_dot11(akm::PSK),
            lifetime: None,
            session_timeout: None,
        }
    }

    fn cache(max_entries: usize) -> PmksaCache {
        PmksaCache::new(PmksaConfig { max_entries, ..Default::default() })
    }

    #[test]
    fn test_compute_pmkid() {
        let pmk = Vec::<u8>::from_hex(
            "0dc0d6eb90555ed6419756b9a15ec3e3209b63df707dd508d14581f8982721af",
        )
        .unwrap();
        let akm = Akm::new_dot11(akm::PSK);
        let pmkid = compute_pmkid(&pmk[..], None, &test_util::A_ADDR, &test_util::S_ADDR, &akm)
            .expect("error computing PMKID");
        assert_eq!(pmkid.len(), 16);

        let expected = hmac(
            HashAlgorithm::Sha1,
            &pmk[..],
            &[&b"PMK Name"[..], &test_util::A_ADDR[..], &test_util::S_ADDR[..]],
        )
        .unwrap();
        assert_eq!(&pmkid[..], &expected[..16]);

        let sha256 = compute_pmkid(
            &pmk[..],
            None,
            &test_util::A_ADDR,
            &test_util::S_ADDR,
            &Akm::new_dot11(akm::PSK_SHA256),
        )
        .unwrap();
        assert_ne!(pmkid, sha256);
    }

    #[test]
    fn test_add_replaces_entry_of_same_peer() {
        let now = Instant::now();
        let mut cache = cache(8);
        cache.add(new_pmksa(PEER_A, &[1u8; 32]), now).expect("error adding PMKSA");
        cache.set_current(&PEER_A, None, now).expect("error selecting PMKSA");
        cache.add(new_pmksa(PEER_A, &[2u8; 32]), now).expect("error adding PMKSA");

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&PEER_A, None, now).map(|e| e.pmk().to_vec()), Some(vec![2u8; 32]));
        assert!(cache.current(&PEER_A).is_none());
        let freed = cache.drain_freed();
        assert_eq!(freed.len(), 1);
        assert_eq!(freed[0].reason, FreeReason::Replaced);
        assert!(cache.drain_freed().is_empty());
    }

    #[test]
    fn test_add_evicts_oldest() {
        let now = Instant::now();
        let mut cache = cache(2);
        cache.add(new_pmksa(PEER_A, &[1u8; 32]), now).unwrap();
        cache.add(new_pmksa(PEER_B, &[2u8; 32]), now + Duration::from_secs(1)).unwrap();
        cache.add(new_pmksa(PEER_C, &[3u8; 32]), now + Duration::from_secs(2)).unwrap();

        assert_eq!(cache.len(), 2);
        let later = now + Duration::from_secs(3);
        assert!(cache.get(&PEER_A, None, later).is_none());
        assert!(cache.get(&PEER_B, None, later).is_some());
        assert!(cache.get(&PEER_C, None, later).is_some());
        assert_eq!(cache.drain_freed()[0].reason, FreeReason::Evicted);
    }

    #[test]
    fn test_add_rejects_invalid_pmk() {
        let now = Instant::now();
        let mut cache = cache(8);
        assert_eq!(
            cache.add(new_pmksa(PEER_A, &[1u8; 65]), now).map(|_| ()),
            Err(Error::InvalidPmkLength(65))
        );
        let mut suite_b = new_pmksa(PEER_A, &[1u8; 48]);
        suite_b.akm = Akm::new_dot11(akm::EAP_SUITEB_SHA384);
        assert_eq!(cache.add(suite_b, now).map(|_| ()), Err(Error::PmksaMissingKck));
        assert!(cache.is_empty());

        let mut suite_b = new_pmksa(PEER_A, &[1u8; 48]);
        suite_b.akm = Akm::new_dot11(akm::EAP_SUITEB_SHA384);
        suite_b.kck = Some(&[7u8; 24][..]);
        assert!(cache.add(suite_b, now).is_ok());
    }

    #[test]
    fn test_lookup_by_pmkid() {
        let now = Instant::now();
        let mut cache = cache(8);
        let pmkid = cache.add(new_pmksa(PEER_A, &[1u8; 32]), now).unwrap().pmkid.clone();
        assert!(cache.get(&PEER_A, Some(&pmkid[..]), now).is_some());
        assert!(cache.get(&PEER_A, Some(&[0u8; 16][..]), now).is_none());
        assert!(cache.get(&PEER_B, Some(&pmkid[..]), now).is_none());
        assert_eq!(
            cache.set_current(&PEER_A, Some(&[0u8; 16][..]), now),
            Err(Error::PmksaNotEstablished)
        );
    }

    #[test]
    fn test_expiration_clears_current() {
        let now = Instant::now();
        let mut cache = cache(8);
        let mut short = new_pmksa(PEER_A, &[1u8; 32]);
        short.lifetime = Some(Duration::from_secs(10));
        cache.add(short, now).unwrap();
        let mut long = new_pmksa(PEER_B, &[2u8; 32]);
        long.lifetime = Some(Duration::from_secs(100));
        cache.add(long, now).unwrap();
        cache.set_current(&PEER_A, None, now).unwrap();

        assert_eq!(cache.on_expire(now), Some(now + Duration::from_secs(10)));
        assert!(cache.current(&PEER_A).is_some());

        let next = cache.on_expire(now + Duration::from_secs(10));
        assert_eq!(next, Some(now + Duration::from_secs(100)));
        assert!(cache.current(&PEER_A).is_none());
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.drain_freed()[0].reason, FreeReason::Expired);
    }

    #[test]
    fn test_current_is_kept_per_peer() {
        let now = Instant::now();
        let mut cache = cache(8);
        cache.add(new_pmksa(PEER_A, &[1u8; 32]), now).unwrap();
        cache.add(new_pmksa(PEER_B, &[2u8; 32]), now).unwrap();
        cache.set_current(&PEER_A, None, now).unwrap();
        cache.set_current(&PEER_B, None, now).unwrap();
        assert_eq!(cache.current(&PEER_A).map(|e| e.peer), Some(PEER_A));
        assert_eq!(cache.current(&PEER_B).map(|e| e.peer), Some(PEER_B));
        assert!(cache.current(&PEER_C).is_none());

        cache.flush(Some(&PEER_A));
        assert!(cache.current(&PEER_A).is_none());
        assert_eq!(cache.current(&PEER_B).map(|e| e.peer), Some(PEER_B));
        cache.clear_current(&PEER_B);
        assert!(cache.current(&PEER_B).is_none());
        assert!(cache.get(&PEER_B, None, now).is_some());

        cache.set_current(&PEER_B, None, now).unwrap();
        cache.flush(None);
        assert!(cache.current(&PEER_B).is_none());
        assert!(cache.is_empty());
        assert!(cache.drain_freed().iter().all(|f| f.reason == FreeReason::Flushed));
    }

    #[test]
    fn test_freed_records_are_bounded() {
        let now = Instant::now();
        let mut cache = cache(4);
        for i in 0..10_000u32 {
            let pmk = [(i % 251) as u8 + 1; 32];
            cache.add(new_pmksa(PEER_A, &pmk[..]), now).unwrap();
        }
        assert_eq!(cache.len(), 1);
        let freed = cache.drain_freed();
        assert_eq!(freed.len(), 4);
        assert!(freed.iter().all(|f| f.peer == PEER_A && f.reason == FreeReason::Replaced));
        assert!(cache.drain_freed().is_empty());
    }
}
