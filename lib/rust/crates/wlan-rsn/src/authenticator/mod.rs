// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The access point side of RSN key management: one 4-Way Handshake state machine per
//! associated station and a shared Group state machine distributing the GTK.

pub mod group;
pub mod station;

use self::group::Group;
use self::station::{Context, Station, StationOutcome};
use crate::config::AuthenticatorConfig;
use crate::crypto_utils::nonce::NonceReader;
use crate::device::DeviceQuery;
use crate::pmksa::{NewPmksa, SharedPmksaCache};
use crate::psk::{self, Psk};
use crate::rsna::{NegotiatedProtection, SecAssocStatus, SecAssocUpdate, UpdateSink};
use crate::timer::{EventId, Scheduler, Timer};
use crate::{Error, ProtectionInfo};
use eapol::KeyFrame;
use log::{error, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use wlan_common::ie::rsn::cipher::{self, Cipher};
use wlan_common::ie::rsn::pmkid::Pmkid;
use wlan_common::mac::mgmt::ReasonCode;
use wlan_common::mac::{MacAddr, MacFmt};
use zeroize::Zeroize;

/// How the PMK of a station is obtained.
pub enum Credentials {
    /// WPA passphrase, or a hex encoded PSK, hashed with the SSID of the device.
    Passphrase(Vec<u8>),
    Psk(Psk),
    /// The PMK comes from SAE or an 802.1X exchange run outside of this crate.
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthenticatorTimeout {
    /// Retransmission timer of the station's outstanding EAPOL-Key frame.
    Eapol(MacAddr),
    GtkRekey,
    /// The PMKSA expiring soonest reached its lifetime.
    PmksaExpiry,
}

pub struct Authenticator {
    cfg: AuthenticatorConfig,
    aa: MacAddr,
    a_protection_ie: Vec<u8>,
    a_protection: ProtectionInfo,
    a_negotiated: NegotiatedProtection,
    a_rsnxe: Option<Vec<u8>>,
    psk: Option<Vec<u8>>,
    pmksa: SharedPmksaCache,
    nonce_rdr: Arc<NonceReader>,
    group: Group,
    stations: HashMap<MacAddr, Station>,
    timer: Timer<AuthenticatorTimeout>,
    rekey_timer: Option<EventId>,
    pmksa_timer: Option<(EventId, Instant)>,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("aa", &self.aa.to_mac_str())
            .field("group", &self.group)
            .field("stations", &self.stations.len())
            .field("timer", &self.timer)
            .finish()
    }
}

impl Drop for Authenticator {
    fn drop(&mut self) {
        self.psk.zeroize();
    }
}

impl Authenticator {
    /// `a_protection_ie` is the RSNE or WPA IE the BSS advertises in its Beacons.
    pub fn new(
        cfg: AuthenticatorConfig,
        device: &dyn DeviceQuery,
        a_protection_ie: Vec<u8>,
        a_rsnxe: Option<Vec<u8>>,
        credentials: Credentials,
        pmksa: SharedPmksaCache,
        scheduler: Box<dyn Scheduler>,
    ) -> Result<Authenticator, Error> {
        cfg.validate()?;
        let aa = device.own_addr();
        let a_protection = ProtectionInfo::from_ie(&a_protection_ie[..])?;
        let protection = NegotiatedProtection::from_protection(&a_protection)?;
        let psk = match credentials {
            Credentials::Passphrase(passphrase) => {
                Some(psk::compute(&passphrase[..], &device.ssid()[..])?.to_vec())
            }
            Credentials::Psk(psk) => Some(psk.to_vec()),
            Credentials::External => None,
        };
        let nonce_rdr = NonceReader::new(&aa)?;
        let group =
            Group::new(aa, protection.group_data, protection.group_mgmt, nonce_rdr.clone())?;
        Ok(Authenticator {
            cfg,
            aa,
            a_protection_ie,
            a_protection,
            a_negotiated: protection,
            a_rsnxe,
            psk,
            pmksa,
            nonce_rdr,
            group,
            stations: HashMap::new(),
            timer: Timer::new(scheduler),
            rekey_timer: None,
            pmksa_timer: None,
        })
    }

    pub fn group(&self) -> &Group {
        &self.group
    }

    pub fn station(&self, addr: &MacAddr) -> Option<&Station> {
        self.stations.get(addr)
    }

    /// Installs the initial group keys and arms the GTK rekey timer.
    pub fn start(&mut self, update_sink: &mut UpdateSink) {
        info!("starting authenticator {}", self.aa.to_mac_str());
        self.group.init_done(update_sink);
        self.schedule_gtk_rekey();
    }

    fn schedule_gtk_rekey(&mut self) {
        if let Some(id) = self.rekey_timer.take() {
            self.timer.cancel_event(id);
        }
        if let Some(interval) = self.cfg.gtk_rekey_interval() {
            self.rekey_timer =
                Some(self.timer.schedule_event(interval, AuthenticatorTimeout::GtkRekey));
        }
    }

    /// A station associated. Its protection elements are read from the device.
    pub fn on_associated(
        &mut self,
        update_sink: &mut UpdateSink,
        device: &dyn DeviceQuery,
        peer: MacAddr,
        now: Instant,
    ) -> Result<(), Error> {
        let s_protection_ie =
            device.assoc_protection_ie(&peer).ok_or(Error::InvalidProtectionIe)?;
        let s_rsnxe = device.assoc_rsnxe(&peer);
        self.add_station(update_sink, peer, s_protection_ie, s_rsnxe, now)
    }

    /// Tracks a newly associated station and starts the 4-Way Handshake once a PMK is known.
    /// A PMKSA named in the station's RSNE takes precedence over the PSK.
    /// A station asking for protection the BSS does not advertise is deauthenticated.
    pub fn add_station(
        &mut self,
        update_sink: &mut UpdateSink,
        peer: MacAddr,
        s_protection_ie: Vec<u8>,
        s_rsnxe: Option<Vec<u8>>,
        now: Instant,
    ) -> Result<(), Error> {
        if self.stations.contains_key(&peer) {
            info!("{} reassociated", peer.to_mac_str());
            self.remove_station(update_sink, &peer);
        }
        let s_protection = ProtectionInfo::from_ie(&s_protection_ie[..])?;
        if let Err(reason) = check_station_protection(&self.a_protection, &s_protection) {
            warn!("{} requested unsupported protection ({:?})", peer.to_mac_str(), reason);
            update_sink.push(SecAssocUpdate::Deauthenticate { addr: peer, reason });
            update_sink.push(SecAssocUpdate::Status {
                addr: peer,
                status: SecAssocStatus::ProtectionIeMismatch,
            });
            return Err(Error::ProtectionIeMismatch);
        }
        let mut protection = NegotiatedProtection::from_protection(&s_protection)?;
        protection.group_data = self.a_negotiated.group_data;
        protection.mfp = protection.mfp && self.a_negotiated.mfp;
        protection.group_mgmt = if protection.mfp { self.a_negotiated.group_mgmt } else { None };
        let akm = protection.akm;

        let cached = {
            let pmksa = self.pmksa.lock();
            let pmkids = match &s_protection {
                ProtectionInfo::Rsne(rsne) => rsne.pmkids.clone(),
                ProtectionInfo::LegacyWpa(_) => vec![],
            };
            let named = pmkids.iter().find_map(|pmkid| pmksa.get(&peer, Some(&pmkid[..]), now));
            let entry = if named.is_some() || !akm.is_sae() {
                named
            } else {
                pmksa.get(&peer, None, now)
            };
            entry.map(|entry| (entry.pmk().to_vec(), Some(entry.pmkid.clone())))
        };
        let pmk: Option<(Vec<u8>, Option<Pmkid>)> = match cached {
            Some((pmk, pmkid)) => {
                info!("using cached PMKSA of {}", peer.to_mac_str());
                let mut pmksa = self.pmksa.lock();
                if let Some(pmkid) = pmkid.as_ref() {
                    pmksa.set_current(&peer, Some(&pmkid[..]), now)?;
                }
                Some((pmk, pmkid))
            }
            None if akm.is_sae() => {
                warn!("no PMKSA from SAE for {}", peer.to_mac_str());
                return Err(Error::PmksaNotEstablished);
            }
            None if akm.is_psk() => match self.psk.as_ref() {
                Some(psk) => Some((psk.clone(), None)),
                None => return Err(Error::PmksaNotEstablished),
            },
            None => None,
        };

        let mut station = Station::new(peer, protection, s_protection_ie, s_rsnxe);
        let pmk_ready = pmk.is_some();
        if let Some((pmk, pmkid)) = pmk {
            station.set_pmk(pmk, pmkid);
        }
        self.stations.insert(peer, station);
        self.expire_pmksas(now);
        if pmk_ready {
            self.with_station(&peer, |station, ctx| station.start_fourway(update_sink, ctx))?;
        } else {
            info!("awaiting PMK of {}", peer.to_mac_str());
        }
        Ok(())
    }

    /// Hands over the PMK of an external exchange, such as 802.1X. The PMKSA is cached and
    /// the 4-Way Handshake starts.
    pub fn on_pmk_available(
        &mut self,
        update_sink: &mut UpdateSink,
        peer: &MacAddr,
        pmk: &[u8],
        now: Instant,
    ) -> Result<(), Error> {
        let akm = self.stations.get(peer).ok_or(Error::UnknownStation(*peer))?.protection().akm;
        let new = NewPmksa {
            pmk,
            pmkid: None,
            kck: None,
            peer: *peer,
            aa: self.aa,
            spa: *peer,
            akm,
            lifetime: None,
            session_timeout: None,
        };
        let pmkid = {
            let mut pmksa = self.pmksa.lock();
            match pmksa.add(new, now) {
                Ok(entry) => {
                    let pmkid = entry.pmkid.clone();
                    pmksa.set_current(peer, Some(&pmkid[..]), now)?;
                    Some(pmkid)
                }
                Err(e) => {
                    warn!("cannot cache PMKSA of {}: {}", peer.to_mac_str(), e);
                    None
                }
            }
        };
        self.expire_pmksas(now);
        let pmk = pmk.to_vec();
        self.with_station(peer, |station, ctx| {
            station.set_pmk(pmk, pmkid);
            station.start_fourway(update_sink, ctx)
        })
    }

    /// Parses and processes a complete EAPOL frame received from `peer`.
    pub fn on_eapol_frame(
        &mut self,
        update_sink: &mut UpdateSink,
        peer: &MacAddr,
        bytes: &[u8],
    ) -> Result<(), Error> {
        let station = self.stations.get(peer).ok_or(Error::UnknownStation(*peer))?;
        let frame = eapol::parse_key_frame(bytes, station.protection().mic_size as usize)?;
        self.on_eapol_key_frame(update_sink, peer, &frame)
    }

    pub fn on_eapol_key_frame(
        &mut self,
        update_sink: &mut UpdateSink,
        peer: &MacAddr,
        frame: &KeyFrame,
    ) -> Result<(), Error> {
        let outcome = self.with_station(peer, |station, ctx| {
            station.on_eapol_key_frame(update_sink, ctx, frame)
        })?;
        self.on_outcome(update_sink, peer, outcome)
    }

    /// Processes a timeout scheduled earlier. Canceled and unknown events are ignored.
    pub fn on_timeout(
        &mut self,
        update_sink: &mut UpdateSink,
        event_id: EventId,
    ) -> Result<(), Error> {
        match self.timer.triggered(&event_id) {
            Some(AuthenticatorTimeout::Eapol(peer)) => {
                let outcome =
                    self.with_station(&peer, |station, ctx| station.on_timeout(update_sink, ctx))?;
                self.on_outcome(update_sink, &peer, outcome)
            }
            Some(AuthenticatorTimeout::GtkRekey) => {
                self.rekey_timer = None;
                let result = self.rekey_gtk(update_sink);
                self.schedule_gtk_rekey();
                result
            }
            Some(AuthenticatorTimeout::PmksaExpiry) => {
                self.pmksa_timer = None;
                self.expire_pmksas(Instant::now());
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn on_outcome(
        &mut self,
        update_sink: &mut UpdateSink,
        peer: &MacAddr,
        outcome: StationOutcome,
    ) -> Result<(), Error> {
        match outcome {
            StationOutcome::None => Ok(()),
            StationOutcome::GroupKeyDone => {
                self.group.station_done(update_sink, peer);
                Ok(())
            }
            StationOutcome::GroupRekeyRequested => {
                info!("{} requested a new GTK", peer.to_mac_str());
                self.rekey_gtk(update_sink)
            }
            StationOutcome::Disconnected => {
                self.remove_station(update_sink, peer);
                Ok(())
            }
        }
    }

    /// Derives a new GTK and distributes it to every station. The new key is installed once
    /// all stations acknowledged it or left.
    pub fn rekey_gtk(&mut self, update_sink: &mut UpdateSink) -> Result<(), Error> {
        if !self.group.rekey()? {
            return Ok(());
        }
        let mut ctx = Context {
            cfg: &self.cfg,
            aa: self.aa,
            a_protection_ie: &self.a_protection_ie[..],
            a_rsnxe: self.a_rsnxe.as_ref().map(|ie| &ie[..]),
            nonce_rdr: &self.nonce_rdr,
            group: &self.group,
            timer: &mut self.timer,
        };
        let mut pending = HashSet::new();
        for (addr, station) in self.stations.iter_mut() {
            match station.start_group_rekey(update_sink, &mut ctx) {
                Ok(true) => {
                    pending.insert(*addr);
                }
                Ok(false) => (),
                Err(e) => error!("cannot send GTK to {}: {}", addr.to_mac_str(), e),
            }
        }
        self.group.await_stations(update_sink, pending);
        Ok(())
    }

    /// Starts a new 4-Way Handshake with an established station.
    pub fn request_ptk_rekey(
        &mut self,
        update_sink: &mut UpdateSink,
        peer: &MacAddr,
    ) -> Result<(), Error> {
        self.with_station(peer, |station, ctx| station.start_fourway(update_sink, ctx))
    }

    /// Forgets a station which disassociated or was deauthenticated.
    pub fn remove_station(&mut self, update_sink: &mut UpdateSink, peer: &MacAddr) {
        if let Some(mut station) = self.stations.remove(peer) {
            info!("removing station {}", peer.to_mac_str());
            station.cancel_retransmit(&mut self.timer);
            self.pmksa.lock().clear_current(peer);
        }
        self.group.station_removed(update_sink, peer);
    }

    /// Removes expired PMKSAs, releases stations from PMKSAs which left the cache and arms
    /// the timer for the next expiration.
    pub fn expire_pmksas(&mut self, now: Instant) {
        let (next, freed) = {
            let mut pmksa = self.pmksa.lock();
            let next = pmksa.on_expire(now);
            (next, pmksa.drain_freed())
        };
        for freed in freed {
            if let Some(station) = self.stations.get_mut(&freed.peer) {
                if station.forget_pmkid(&freed.pmkid) {
                    let addr = freed.peer.to_mac_str();
                    info!("PMKSA of {} left the cache ({:?})", addr, freed.reason);
                }
            }
        }

        if self.pmksa_timer.map(|(_, deadline)| deadline) == next && next.is_some() {
            return;
        }
        if let Some((id, _)) = self.pmksa_timer.take() {
            self.timer.cancel_event(id);
        }
        if let Some(deadline) = next {
            let id = self.timer.schedule_event(
                deadline.saturating_duration_since(now),
                AuthenticatorTimeout::PmksaExpiry,
            );
            self.pmksa_timer = Some((id, deadline));
        }
    }

    fn with_station<T, F>(&mut self, peer: &MacAddr, f: F) -> Result<T, Error>
    where
        F: FnOnce(&mut Station, &mut Context<'_>) -> Result<T, Error>,
    {
        let station = self.stations.get_mut(peer).ok_or(Error::UnknownStation(*peer))?;
        let mut ctx = Context {
            cfg: &self.cfg,
            aa: self.aa,
            a_protection_ie: &self.a_protection_ie[..],
            a_rsnxe: self.a_rsnxe.as_ref().map(|ie| &ie[..]),
            nonce_rdr: &self.nonce_rdr,
            group: &self.group,
            timer: &mut self.timer,
        };
        f(station, &mut ctx)
    }
}

/// Checks the protection a station associated with against what the BSS advertises. The
/// station may only select suites offered by the BSS and must agree on the group cipher.
fn check_station_protection(a: &ProtectionInfo, s: &ProtectionInfo) -> Result<(), ReasonCode> {
    fn subset<T: PartialEq>(selected: &[T], offered: &[T]) -> bool {
        !selected.is_empty() && selected.iter().all(|suite| offered.contains(suite))
    }

    match (a, s) {
        (ProtectionInfo::Rsne(a), ProtectionInfo::Rsne(s)) => {
            let default_group = Cipher::new_dot11(cipher::CCMP_128);
            if a.group_data_cipher_suite.unwrap_or(default_group)
                != s.group_data_cipher_suite.unwrap_or(default_group)
            {
                return Err(ReasonCode::REASON_INVALID_GROUP_CIPHER);
            }
            if !subset(&s.pairwise_cipher_suites[..], &a.pairwise_cipher_suites[..]) {
                return Err(ReasonCode::REASON_INVALID_PAIRWISE_CIPHER);
            }
            if !subset(&s.akm_suites[..], &a.akm_suites[..]) {
                return Err(ReasonCode::REASON_INVALID_AKMP);
            }
            if (a.mfp_required() && !s.mfp_capable()) || (s.mfp_required() && !a.mfp_capable()) {
                return Err(ReasonCode::INVALID_RSNE_CAPABILITIES);
            }
            if a.mfp_capable() && s.mfp_capable() {
                let default_mgmt = Cipher::new_dot11(cipher::BIP_CMAC_128);
                let a_mgmt = a.group_mgmt_cipher_suite.unwrap_or(default_mgmt);
                if s.group_mgmt_cipher_suite.map_or(false, |s_mgmt| s_mgmt != a_mgmt) {
                    return Err(ReasonCode::REASON_CIPHER_OUT_OF_POLICY);
                }
            }
            Ok(())
        }
        (ProtectionInfo::LegacyWpa(a), ProtectionInfo::LegacyWpa(s)) => {
            if a.multicast_cipher != s.multicast_cipher {
                return Err(ReasonCode::REASON_INVALID_GROUP_CIPHER);
            }
            if !subset(&s.unicast_cipher_list[..], &a.unicast_cipher_list[..]) {
                return Err(ReasonCode::REASON_INVALID_PAIRWISE_CIPHER);
            }
            if !subset(&s.akm_list[..], &a.akm_list[..]) {
                return Err(ReasonCode::REASON_INVALID_AKMP);
            }
            Ok(())
        }
        _ => Err(ReasonCode::REASON_INVALID_ELEMENT),
    }
}

#[cfg(test)]
mod tests {
    use super::group::GroupState;
    use super::station::{GroupKeyState, PtkState};
    use super::*;
    use crate::config::{PmksaConfig, SupplicantConfig};
    use crate::device::{self, Dispatcher, FakeDevice};
    use crate::key::exchange::Key;
    use crate::key::Tk;
    use crate::key_data::{self, kde};
    use crate::pmksa::{compute_pmkid, PmksaCache};
    use crate::rsna::test_util;
    use crate::rsna::{SecAssocStatus, SecAssocUpdate, TxTag};
    use crate::timer::FakeScheduler;
    use crate::Supplicant;
    use std::time::Duration;
    use wlan_common::assert_variant;
    use wlan_common::ie::rsn::akm::{self, Akm};
    use wlan_common::ie::rsn::rsne::{RsnCapabilities, Rsne};
    use wlan_common::mac::mgmt::ReasonCode;

    fn authenticator_with(
        scheduler: &FakeScheduler,
        cfg: AuthenticatorConfig,
        a_protection_ie: Vec<u8>,
        credentials: Credentials,
        pmksa: SharedPmksaCache,
    ) -> Authenticator {
        let device = FakeDevice::new(test_util::A_ADDR);
        let mut authenticator = Authenticator::new(
            cfg,
            &device,
            a_protection_ie,
            None,
            credentials,
            pmksa,
            scheduler.as_scheduler(),
        )
        .expect("error creating authenticator");
        authenticator.start(&mut vec![]);
        authenticator
    }

    fn psk_authenticator(scheduler: &FakeScheduler) -> Authenticator {
        authenticator_with(
            scheduler,
            AuthenticatorConfig::default(),
            test_util::get_a_rsne_bytes(),
            Credentials::Psk(test_util::get_pmk().into_boxed_slice()),
            PmksaCache::new_shared(PmksaConfig::default()),
        )
    }

    fn supplicant(addr: MacAddr) -> Supplicant {
        let mut fourway_cfg = test_util::get_supplicant_config();
        fourway_cfg.s_addr = addr;
        let nonce_rdr = NonceReader::new(&addr).expect("error creating NonceReader");
        Supplicant::new(SupplicantConfig::default(), fourway_cfg, test_util::get_pmk(), nonce_rdr)
            .expect("error creating supplicant")
    }

    fn rsne_with_akm(akm: u8) -> Rsne {
        let mut rsne = test_util::get_s_rsne();
        rsne.akm_suites = vec![Akm::new_dot11(akm)];
        rsne
    }

    fn eapol_frames(sink: &UpdateSink) -> Vec<(MacAddr, KeyFrame, Option<TxTag>)> {
        sink.iter()
            .filter_map(|update| match update {
                SecAssocUpdate::TxEapolKeyFrame { dst, frame, tag } => {
                    Some((*dst, frame.clone(), *tag))
                }
                _ => None,
            })
            .collect()
    }

    fn sole_frame(sink: &UpdateSink) -> KeyFrame {
        let mut frames = eapol_frames(sink);
        assert_eq!(frames.len(), 1, "expected exactly one EAPOL frame: {:?}", sink);
        frames.remove(0).1
    }

    fn frame_to(sink: &UpdateSink, addr: &MacAddr) -> KeyFrame {
        let frame = eapol_frames(sink).into_iter().find(|(dst, _, _)| dst == addr);
        frame.expect("no frame sent to station").1
    }

    fn has_status(sink: &UpdateSink, expected: SecAssocStatus) -> bool {
        sink.iter().any(|update| match update {
            SecAssocUpdate::Status { status, .. } => *status == expected,
            _ => false,
        })
    }

    /// Runs message 1 to 4 through the wire format. Returns the updates of the Authenticator
    /// and the Supplicant after message 4.
    fn handshake(
        authenticator: &mut Authenticator,
        supplicant: &mut Supplicant,
        addr: MacAddr,
        msg1: KeyFrame,
    ) -> (UpdateSink, UpdateSink) {
        let mut s_sink = vec![];
        supplicant
            .on_eapol_frame(&mut s_sink, &msg1.to_bytes(false)[..])
            .expect("error processing message 1");
        let msg2 = sole_frame(&s_sink);

        let mut a_sink = vec![];
        authenticator
            .on_eapol_frame(&mut a_sink, &addr, &msg2.to_bytes(false)[..])
            .expect("error processing message 2");
        let msg3 = sole_frame(&a_sink);

        let mut s_sink = vec![];
        supplicant
            .on_eapol_frame(&mut s_sink, &msg3.to_bytes(false)[..])
            .expect("error processing message 3");
        let (_, msg4, tag) = eapol_frames(&s_sink).remove(0);
        supplicant.on_eapol_conf(&mut s_sink, tag.expect("message 4 without tag"), true);

        let mut a_sink = vec![];
        authenticator
            .on_eapol_frame(&mut a_sink, &addr, &msg4.to_bytes(false)[..])
            .expect("error processing message 4");
        (a_sink, s_sink)
    }

    fn establish(
        authenticator: &mut Authenticator,
        supplicant: &mut Supplicant,
        addr: MacAddr,
    ) -> (UpdateSink, UpdateSink) {
        let mut a_sink = vec![];
        authenticator
            .add_station(&mut a_sink, addr, test_util::get_s_rsne_bytes(), None, Instant::now())
            .expect("error adding station");
        let msg1 = sole_frame(&a_sink);
        handshake(authenticator, supplicant, addr, msg1)
    }

    #[test]
    fn test_wpa2_personal_handshake() {
        let scheduler = FakeScheduler::new();
        let mut authenticator = psk_authenticator(&scheduler);
        let mut supplicant = supplicant(test_util::S_ADDR);

        let (a_sink, s_sink) = establish(&mut authenticator, &mut supplicant, test_util::S_ADDR);
        assert!(supplicant.is_established());
        assert!(has_status(&s_sink, SecAssocStatus::EssSaEstablished));
        assert!(has_status(&a_sink, SecAssocStatus::EssSaEstablished));

        let station = authenticator.station(&test_util::S_ADDR).expect("station is missing");
        assert_eq!(station.ptk_state(), PtkState::PtkInitDone);
        let ptk = station.ptk().expect("no PTK established");
        assert_eq!(ptk.tk(), supplicant.ptk().expect("supplicant has no PTK").tk());
        assert_variant!(&a_sink[..], [
            SecAssocUpdate::Key { addr, key: Key::Ptk(installed) },
            SecAssocUpdate::Status { .. },
        ] => {
            assert_eq!(addr, &test_util::S_ADDR);
            assert_eq!(installed.tk(), ptk.tk());
        });

        // The GTK delivered in message 3 is the one of the BSS.
        let gtk = s_sink.iter().find_map(|update| match update {
            SecAssocUpdate::Key { key: Key::Gtk(gtk), .. } => Some(gtk.clone()),
            _ => None,
        });
        let gtk = gtk.expect("supplicant did not install a GTK");
        assert_eq!(gtk.gtk(), authenticator.group().gtk().gtk());
        assert_eq!(gtk.key_id(), authenticator.group().gtk().key_id());

        // No retransmission is pending once the handshake completed.
        assert!(scheduler.pending().is_empty());

        let mut dispatcher = Dispatcher::new(FakeDevice::new(test_util::A_ADDR));
        dispatcher.dispatch(a_sink);
        let keys = &dispatcher.device().keys;
        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].key_type, device::KeyType::Pairwise);
        assert_eq!(keys[0].peer_addr, test_util::S_ADDR);
    }

    #[test]
    fn test_station_from_device_association() {
        let scheduler = FakeScheduler::new();
        let mut authenticator = psk_authenticator(&scheduler);
        let mut device = FakeDevice::new(test_util::A_ADDR);

        let mut sink = vec![];
        let result =
            authenticator.on_associated(&mut sink, &device, test_util::S_ADDR, Instant::now());
        assert_eq!(result, Err(Error::InvalidProtectionIe));

        device.assoc_ies.insert(test_util::S_ADDR, (test_util::get_s_rsne_bytes(), None));
        authenticator
            .on_associated(&mut sink, &device, test_util::S_ADDR, Instant::now())
            .expect("error processing association");
        let msg1 = sole_frame(&sink);
        assert_eq!(msg1.key_replay_counter, 1);
        assert!(msg1.key_info.key_ack());
        assert_eq!(scheduler.pending().len(), 1);
    }

    #[test]
    fn test_passphrase_credentials() {
        let scheduler = FakeScheduler::new();
        let device = FakeDevice::new(test_util::A_ADDR);
        let result = Authenticator::new(
            AuthenticatorConfig::default(),
            &device,
            test_util::get_a_rsne_bytes(),
            None,
            Credentials::Passphrase(b"short".to_vec()),
            PmksaCache::new_shared(PmksaConfig::default()),
            scheduler.as_scheduler(),
        );
        assert_variant!(result, Err(Error::InvalidPassphraseLen(5)));

        let result = Authenticator::new(
            AuthenticatorConfig::default(),
            &device,
            test_util::get_a_rsne_bytes(),
            None,
            Credentials::Passphrase(b"ThisIsAPassword".to_vec()),
            PmksaCache::new_shared(PmksaConfig::default()),
            scheduler.as_scheduler(),
        );
        assert_variant!(result, Ok(_));
    }

    #[test]
    fn test_unknown_station() {
        let scheduler = FakeScheduler::new();
        let mut authenticator = psk_authenticator(&scheduler);
        let msg = test_util::get_4whs_msg1(&[1u8; 32], 1);
        let result = authenticator.on_eapol_key_frame(&mut vec![], &test_util::S_ADDR, &msg);
        assert_eq!(result, Err(Error::UnknownStation(test_util::S_ADDR)));
    }

    fn assert_protection_rejected(s_protection_ie: Vec<u8>, expected: ReasonCode) {
        let scheduler = FakeScheduler::new();
        let mut authenticator = psk_authenticator(&scheduler);
        let mut sink = vec![];
        let result = authenticator.add_station(
            &mut sink,
            test_util::S_ADDR,
            s_protection_ie,
            None,
            Instant::now(),
        );
        assert_eq!(result, Err(Error::ProtectionIeMismatch));
        assert!(eapol_frames(&sink).is_empty());
        assert_variant!(&sink[..], [
            SecAssocUpdate::Deauthenticate { addr, reason },
            SecAssocUpdate::Status { status: SecAssocStatus::ProtectionIeMismatch, .. },
        ] => {
            assert_eq!(addr, &test_util::S_ADDR);
            assert_eq!(*reason, expected);
        });
        assert!(authenticator.station(&test_util::S_ADDR).is_none());
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn test_wpa1_station_rejected_by_rsn_ap() {
        let wpa = ProtectionInfo::LegacyWpa(test_util::get_wpa_ie()).to_bytes();
        assert_protection_rejected(wpa, ReasonCode::REASON_INVALID_ELEMENT);
    }

    #[test]
    fn test_unadvertised_akm_rejected() {
        let s_rsne = rsne_with_akm(akm::SAE).to_bytes();
        assert_protection_rejected(s_rsne, ReasonCode::REASON_INVALID_AKMP);
    }

    #[test]
    fn test_unadvertised_pairwise_cipher_rejected() {
        let mut s_rsne = test_util::get_s_rsne();
        s_rsne.pairwise_cipher_suites = vec![Cipher::new_dot11(cipher::GCMP_256)];
        assert_protection_rejected(s_rsne.to_bytes(), ReasonCode::REASON_INVALID_PAIRWISE_CIPHER);
    }

    #[test]
    fn test_group_cipher_mismatch_rejected() {
        let mut s_rsne = test_util::get_s_rsne();
        s_rsne.group_data_cipher_suite = Some(Cipher::new_dot11(cipher::TKIP));
        assert_protection_rejected(s_rsne.to_bytes(), ReasonCode::REASON_INVALID_GROUP_CIPHER);
    }

    #[test]
    fn test_mfp_required_station_rejected_by_non_mfp_ap() {
        let mut s_rsne = test_util::get_s_rsne();
        let mut caps = RsnCapabilities(0);
        caps.set_mgmt_frame_protection_cap(true);
        caps.set_mgmt_frame_protection_req(true);
        s_rsne.rsn_capabilities = Some(caps);
        assert_protection_rejected(s_rsne.to_bytes(), ReasonCode::INVALID_RSNE_CAPABILITIES);
    }

    #[test]
    fn test_mfp_capable_station_on_non_mfp_ap() {
        let scheduler = FakeScheduler::new();
        let mut authenticator = psk_authenticator(&scheduler);
        let mut sink = vec![];
        authenticator
            .add_station(
                &mut sink,
                test_util::S_ADDR,
                test_util::get_mfp_rsne().to_bytes(),
                None,
                Instant::now(),
            )
            .expect("error adding station");
        assert_eq!(eapol_frames(&sink).len(), 1);
        let station = authenticator.station(&test_util::S_ADDR).expect("station is missing");
        assert!(!station.protection().mfp);
        assert_eq!(station.protection().group_mgmt, None);
    }

    #[test]
    fn test_rsne_mismatch_in_message_2() {
        let scheduler = FakeScheduler::new();
        let mut authenticator = psk_authenticator(&scheduler);
        // The station claims different capabilities in message 2 than it associated with.
        let mut fourway_cfg = test_util::get_supplicant_config();
        fourway_cfg.s_protection_ie = test_util::get_mfp_rsne().to_bytes();
        let nonce_rdr = NonceReader::new(&test_util::S_ADDR).expect("error creating NonceReader");
        let pmk = test_util::get_pmk();
        let mut supplicant =
            Supplicant::new(SupplicantConfig::default(), fourway_cfg, pmk, nonce_rdr)
                .expect("error creating supplicant");

        let mut a_sink = vec![];
        authenticator
            .add_station(
                &mut a_sink,
                test_util::S_ADDR,
                test_util::get_s_rsne_bytes(),
                None,
                Instant::now(),
            )
            .expect("error adding station");
        let mut s_sink = vec![];
        supplicant
            .on_eapol_key_frame(&mut s_sink, &sole_frame(&a_sink))
            .expect("error processing message 1");

        let mut a_sink = vec![];
        authenticator
            .on_eapol_key_frame(&mut a_sink, &test_util::S_ADDR, &sole_frame(&s_sink))
            .expect("error processing message 2");
        assert_variant!(&a_sink[..], [
            SecAssocUpdate::Deauthenticate { addr, reason },
            SecAssocUpdate::Status { status: SecAssocStatus::ProtectionIeMismatch, .. },
        ] => {
            assert_eq!(addr, &test_util::S_ADDR);
            assert_eq!(*reason, ReasonCode::HANDSHAKE_ELEMENT_MISMATCH);
        });
        assert!(authenticator.station(&test_util::S_ADDR).is_none());
        assert!(scheduler.pending().is_empty());
    }

    #[test]
    fn test_wrong_psk_message_2_is_dropped() {
        let scheduler = FakeScheduler::new();
        let mut authenticator = authenticator_with(
            &scheduler,
            AuthenticatorConfig::default(),
            test_util::get_a_rsne_bytes(),
            Credentials::Psk(vec![0x42u8; 32].into_boxed_slice()),
            PmksaCache::new_shared(PmksaConfig::default()),
        );
        let mut supplicant = supplicant(test_util::S_ADDR);

        let mut a_sink = vec![];
        authenticator
            .add_station(
                &mut a_sink,
                test_util::S_ADDR,
                test_util::get_s_rsne_bytes(),
                None,
                Instant::now(),
            )
            .expect("error adding station");
        let mut s_sink = vec![];
        supplicant
            .on_eapol_key_frame(&mut s_sink, &sole_frame(&a_sink))
            .expect("error processing message 1");

        let mut a_sink = vec![];
        let result =
            authenticator.on_eapol_key_frame(&mut a_sink, &test_util::S_ADDR, &sole_frame(&s_sink));
        assert_eq!(result, Err(Error::InvalidMic));
        assert!(a_sink.is_empty());
        let station = authenticator.station(&test_util::S_ADDR).expect("station is missing");
        assert_eq!(station.ptk_state(), PtkState::PtkStart);
    }

    #[test]
    fn test_msg2_with_updated_snonce() {
        let scheduler = FakeScheduler::new();
        let mut authenticator = psk_authenticator(&scheduler);

        let mut a_sink = vec![];
        authenticator
            .add_station(
                &mut a_sink,
                test_util::S_ADDR,
                test_util::get_s_rsne_bytes(),
                None,
                Instant::now(),
            )
            .expect("error adding station");
        let msg1 = sole_frame(&a_sink);
        let mut a_sink = vec![];
        let id = scheduler.last_scheduled().expect("no retransmission scheduled");
        authenticator.on_timeout(&mut a_sink, id).expect("error retransmitting message 1");
        let msg1_retransmitted = sole_frame(&a_sink);
        assert_eq!(msg1_retransmitted.key_replay_counter, 2);

        // A first instance answers the original message 1.
        let mut first = supplicant(test_util::S_ADDR);
        let mut s_sink = vec![];
        first.on_eapol_key_frame(&mut s_sink, &msg1).expect("error processing message 1");
        let mut a_sink = vec![];
        authenticator
            .on_eapol_key_frame(&mut a_sink, &test_util::S_ADDR, &sole_frame(&s_sink))
            .expect("error processing message 2");
        assert_eq!(sole_frame(&a_sink).key_replay_counter, 3);

        // Another SNonce answers the retransmission while message 3 is outstanding.
        let mut second = supplicant(test_util::S_ADDR);
        let (a_sink, _) =
            handshake(&mut authenticator, &mut second, test_util::S_ADDR, msg1_retransmitted);
        assert!(has_status(&a_sink, SecAssocStatus::EssSaEstablished));
        let station = authenticator.station(&test_util::S_ADDR).expect("station is missing");
        let ptk = station.ptk().expect("no PTK established");
        assert_eq!(ptk.tk(), second.ptk().expect("supplicant has no PTK").tk());
    }

    #[test]
    fn test_msg1_retransmission_limit() {
        let scheduler = FakeScheduler::new();
        let mut authenticator = psk_authenticator(&scheduler);

        let mut sink = vec![];
        authenticator
            .add_station(
                &mut sink,
                test_util::S_ADDR,
                test_util::get_s_rsne_bytes(),
                None,
                Instant::now(),
            )
            .expect("error adding station");
        let msg1 = sole_frame(&sink);

        for counter in 2..=4 {
            let mut sink = vec![];
            let id = scheduler.last_scheduled().expect("no retransmission scheduled");
            authenticator.on_timeout(&mut sink, id).expect("error retransmitting message 1");
            let retransmitted = sole_frame(&sink);
            assert_eq!(retransmitted.key_replay_counter, counter);
            assert_eq!(retransmitted.key_nonce, msg1.key_nonce);
        }

        let mut sink = vec![];
        let id = scheduler.last_scheduled().expect("no retransmission scheduled");
        authenticator.on_timeout(&mut sink, id).expect("error processing timeout");
        assert_variant!(&sink[..], [
            SecAssocUpdate::Deauthenticate { reason, .. },
            SecAssocUpdate::Status { status: SecAssocStatus::HandshakeTimeout, .. },
        ] => {
            assert_eq!(*reason, ReasonCode::FOURWAY_HANDSHAKE_TIMEOUT);
        });
        assert!(authenticator.station(&test_util::S_ADDR).is_none());

        // The same event does not fire twice.
        let mut sink = vec![];
        authenticator.on_timeout(&mut sink, id).expect("error processing stale timeout");
        assert!(sink.is_empty());
    }

    #[test]
    fn test_gtk_rekey_waits_for_all_stations() {
        let scheduler = FakeScheduler::new();
        let mut authenticator = psk_authenticator(&scheduler);
        let addrs: [MacAddr; 3] = [[0x10; 6], [0x20; 6], [0x30; 6]];
        let mut supplicants: Vec<Supplicant> = addrs.iter().map(|addr| supplicant(*addr)).collect();
        for (addr, supplicant) in addrs.iter().zip(supplicants.iter_mut()) {
            establish(&mut authenticator, supplicant, *addr);
        }
        let old_key_id = authenticator.group().gtk().key_id();

        let mut a_sink = vec![];
        authenticator.rekey_gtk(&mut a_sink).expect("error rekeying GTK");
        assert_eq!(eapol_frames(&a_sink).len(), 3);
        assert_eq!(authenticator.group().state(), GroupState::SetKeys);
        assert_eq!(authenticator.group().pending(), 3);
        let new_key_id = authenticator.group().gtk().key_id();
        assert_ne!(new_key_id, old_key_id);

        let mut completed = vec![];
        for (addr, supplicant) in addrs.iter().zip(supplicants.iter_mut()).take(2) {
            let mut s_sink = vec![];
            supplicant
                .on_eapol_key_frame(&mut s_sink, &frame_to(&a_sink, addr))
                .expect("error processing group message 1");
            assert_variant!(s_sink.first(), Some(SecAssocUpdate::Key {
                key: Key::Gtk(gtk),
                ..
            }) => assert_eq!(gtk.key_id(), new_key_id));
            let msg2 = sole_frame(&s_sink);
            authenticator
                .on_eapol_key_frame(&mut completed, addr, &msg2)
                .expect("error processing group message 2");
            let station = authenticator.station(addr).expect("station is missing");
            assert_eq!(station.group_state(), GroupKeyState::Idle);
        }
        assert!(!has_status(&completed, SecAssocStatus::GroupRekeyCompleted));
        assert_eq!(authenticator.group().pending(), 1);

        authenticator.remove_station(&mut completed, &addrs[2]);
        assert!(has_status(&completed, SecAssocStatus::GroupRekeyCompleted));
        assert_eq!(authenticator.group().state(), GroupState::SetKeysDone);
        assert_variant!(&completed[..], [
            SecAssocUpdate::Key { key: Key::Gtk(gtk), .. },
            SecAssocUpdate::Status { .. },
        ] => {
            assert_eq!(gtk.key_id(), new_key_id);
        });
    }

    #[test]
    fn test_group_key_handshake_timeout() {
        let scheduler = FakeScheduler::new();
        let mut authenticator = psk_authenticator(&scheduler);
        let mut supplicant = supplicant(test_util::S_ADDR);
        establish(&mut authenticator, &mut supplicant, test_util::S_ADDR);

        let mut sink = vec![];
        authenticator.rekey_gtk(&mut sink).expect("error rekeying GTK");
        assert_eq!(sole_frame(&sink).key_replay_counter, 3);
        for counter in 4..=6 {
            let mut sink = vec![];
            let id = scheduler.last_scheduled().expect("no retransmission scheduled");
            authenticator.on_timeout(&mut sink, id).expect("error retransmitting group message 1");
            assert_eq!(sole_frame(&sink).key_replay_counter, counter);
        }

        let mut sink = vec![];
        let id = scheduler.last_scheduled().expect("no retransmission scheduled");
        authenticator.on_timeout(&mut sink, id).expect("error processing timeout");
        assert_variant!(sink.first(), Some(SecAssocUpdate::Deauthenticate { reason, .. }) => {
            assert_eq!(*reason, ReasonCode::GK_HANDSHAKE_TIMEOUT);
        });
        assert!(has_status(&sink, SecAssocStatus::GroupKeyHandshakeTimeout));
        // The station left, so the rekey completes without it.
        assert!(has_status(&sink, SecAssocStatus::GroupRekeyCompleted));
        assert!(authenticator.station(&test_util::S_ADDR).is_none());
    }

    #[test]
    fn test_periodic_gtk_rekey() {
        let scheduler = FakeScheduler::new();
        let cfg =
            AuthenticatorConfig { gtk_rekey_interval_secs: Some(3600), ..Default::default() };
        let mut authenticator = authenticator_with(
            &scheduler,
            cfg,
            test_util::get_a_rsne_bytes(),
            Credentials::Psk(test_util::get_pmk().into_boxed_slice()),
            PmksaCache::new_shared(PmksaConfig::default()),
        );
        let (id, timeout) = scheduler.pending()[0];
        assert_eq!(timeout.as_secs(), 3600);

        // Without stations the new GTK is installed right away.
        let mut sink = vec![];
        authenticator.on_timeout(&mut sink, id).expect("error rekeying GTK");
        assert!(has_status(&sink, SecAssocStatus::GroupRekeyCompleted));
        assert_eq!(authenticator.group().gtk().key_id(), 2);
        assert_eq!(authenticator.timer.pending(), 1);
        assert_ne!(scheduler.last_scheduled(), Some(id));
    }

    #[test]
    fn test_8021x_awaits_pmk() {
        let scheduler = FakeScheduler::new();
        let pmksa = PmksaCache::new_shared(PmksaConfig::default());
        let mut authenticator = authenticator_with(
            &scheduler,
            AuthenticatorConfig::default(),
            rsne_with_akm(akm::EAP).to_bytes(),
            Credentials::External,
            pmksa.clone(),
        );

        let mut sink = vec![];
        let now = Instant::now();
        let s_rsne = rsne_with_akm(akm::EAP).to_bytes();
        authenticator
            .add_station(&mut sink, test_util::S_ADDR, s_rsne, None, now)
            .expect("error adding station");
        assert!(sink.is_empty());
        let station = authenticator.station(&test_util::S_ADDR).expect("station is missing");
        assert_eq!(station.ptk_state(), PtkState::InitPmk);

        let pmk = test_util::get_pmk();
        authenticator
            .on_pmk_available(&mut sink, &test_util::S_ADDR, &pmk[..], now)
            .expect("error processing PMK");
        let expected = compute_pmkid(
            &pmk[..],
            None,
            &test_util::A_ADDR,
            &test_util::S_ADDR,
            &Akm::new_dot11(akm::EAP),
        )
        .expect("error computing PMKID");
        let msg1 = sole_frame(&sink);
        let elements = key_data::extract_elements(&msg1.key_data[..]).expect("invalid key data");
        assert_eq!(kde::pmkid_of(&elements[..]), Some(&expected));
        assert!(pmksa.lock().get(&test_util::S_ADDR, Some(&expected[..]), now).is_some());
    }

    #[test]
    fn test_sae_pmkid_in_message_1() {
        let scheduler = FakeScheduler::new();
        let pmksa = PmksaCache::new_shared(PmksaConfig::default());
        let mut authenticator = authenticator_with(
            &scheduler,
            AuthenticatorConfig::default(),
            rsne_with_akm(akm::SAE).to_bytes(),
            Credentials::External,
            pmksa.clone(),
        );
        let now = Instant::now();

        let mut sink = vec![];
        let result = authenticator.add_station(
            &mut sink,
            test_util::S_ADDR,
            rsne_with_akm(akm::SAE).to_bytes(),
            None,
            now,
        );
        assert_eq!(result, Err(Error::PmksaNotEstablished));

        let pmk = vec![0x5Au8; 32];
        let pmkid = pmksa
            .lock()
            .add(
                NewPmksa {
                    pmk: &pmk[..],
                    pmkid: None,
                    kck: None,
                    peer: test_util::S_ADDR,
                    aa: test_util::A_ADDR,
                    spa: test_util::S_ADDR,
                    akm: Akm::new_dot11(akm::SAE),
                    lifetime: None,
                    session_timeout: None,
                },
                now,
            )
            .expect("error caching PMKSA")
            .pmkid
            .clone();
        let s_rsne = rsne_with_akm(akm::SAE).to_bytes();
        authenticator
            .add_station(&mut sink, test_util::S_ADDR, s_rsne, None, now)
            .expect("error adding station");
        let msg1 = sole_frame(&sink);
        let elements = key_data::extract_elements(&msg1.key_data[..]).expect("invalid key data");
        assert_eq!(kde::pmkid_of(&elements[..]), Some(&pmkid));
    }

    #[test]
    fn test_pmksa_caching_takes_precedence() {
        let scheduler = FakeScheduler::new();
        let pmksa = PmksaCache::new_shared(PmksaConfig::default());
        let mut authenticator = authenticator_with(
            &scheduler,
            AuthenticatorConfig::default(),
            test_util::get_a_rsne_bytes(),
            Credentials::Psk(vec![0x42u8; 32].into_boxed_slice()),
            pmksa.clone(),
        );
        let now = Instant::now();
        let pmk = test_util::get_pmk();
        let pmkid = pmksa
            .lock()
            .add(
                NewPmksa {
                    pmk: &pmk[..],
                    pmkid: None,
                    kck: None,
                    peer: test_util::S_ADDR,
                    aa: test_util::A_ADDR,
                    spa: test_util::S_ADDR,
                    akm: Akm::new_dot11(akm::PSK),
                    lifetime: None,
                    session_timeout: None,
                },
                now,
            )
            .expect("error caching PMKSA")
            .pmkid
            .clone();

        let mut s_rsne = test_util::get_s_rsne();
        s_rsne.pmkids.push(pmkid.clone());
        let mut fourway_cfg = test_util::get_supplicant_config();
        fourway_cfg.s_protection_ie = s_rsne.to_bytes();
        let nonce_rdr = NonceReader::new(&test_util::S_ADDR).expect("error creating NonceReader");
        let mut supplicant =
            Supplicant::new(SupplicantConfig::default(), fourway_cfg, pmk.clone(), nonce_rdr)
                .expect("error creating supplicant");

        let mut a_sink = vec![];
        authenticator
            .add_station(&mut a_sink, test_util::S_ADDR, s_rsne.to_bytes(), None, now)
            .expect("error adding station");
        let msg1 = sole_frame(&a_sink);
        let elements = key_data::extract_elements(&msg1.key_data[..]).expect("invalid key data");
        assert_eq!(kde::pmkid_of(&elements[..]), Some(&pmkid));

        // The cached PMK matches the supplicant's although the configured PSK does not.
        let (a_sink, _) = handshake(&mut authenticator, &mut supplicant, test_util::S_ADDR, msg1);
        assert!(has_status(&a_sink, SecAssocStatus::EssSaEstablished));
    }

    #[test]
    fn test_expired_pmksa_releases_station() {
        let scheduler = FakeScheduler::new();
        let pmksa = PmksaCache::new_shared(PmksaConfig::default());
        let mut authenticator = authenticator_with(
            &scheduler,
            AuthenticatorConfig::default(),
            test_util::get_a_rsne_bytes(),
            Credentials::Psk(vec![0x42u8; 32].into_boxed_slice()),
            pmksa.clone(),
        );
        let now = Instant::now();
        let pmk = test_util::get_pmk();
        let pmkid = pmksa
            .lock()
            .add(
                NewPmksa {
                    pmk: &pmk[..],
                    pmkid: None,
                    kck: None,
                    peer: test_util::S_ADDR,
                    aa: test_util::A_ADDR,
                    spa: test_util::S_ADDR,
                    akm: Akm::new_dot11(akm::PSK),
                    lifetime: Some(Duration::from_secs(10)),
                    session_timeout: None,
                },
                now,
            )
            .expect("error caching PMKSA")
            .pmkid
            .clone();

        let mut s_rsne = test_util::get_s_rsne();
        s_rsne.pmkids.push(pmkid.clone());
        authenticator
            .add_station(&mut vec![], test_util::S_ADDR, s_rsne.to_bytes(), None, now)
            .expect("error adding station");
        let station = authenticator.station(&test_util::S_ADDR).expect("station is missing");
        assert_eq!(station.pmkid(), Some(&pmkid));
        assert_eq!(pmksa.lock().current(&test_util::S_ADDR).map(|e| e.pmkid.clone()), Some(pmkid));
        assert!(scheduler.pending().iter().any(|(_, timeout)| *timeout == Duration::from_secs(10)));

        authenticator.expire_pmksas(now + Duration::from_secs(10));
        assert!(pmksa.lock().is_empty());
        assert!(pmksa.lock().current(&test_util::S_ADDR).is_none());
        assert!(pmksa.lock().drain_freed().is_empty());
        let station = authenticator.station(&test_util::S_ADDR).expect("station is missing");
        assert_eq!(station.pmkid(), None);
        assert!(authenticator.pmksa_timer.is_none());
    }

    #[test]
    fn test_remove_station_clears_current_pmksa() {
        let scheduler = FakeScheduler::new();
        let pmksa = PmksaCache::new_shared(PmksaConfig::default());
        let mut authenticator = authenticator_with(
            &scheduler,
            AuthenticatorConfig::default(),
            rsne_with_akm(akm::EAP).to_bytes(),
            Credentials::External,
            pmksa.clone(),
        );
        let now = Instant::now();
        let mut sink = vec![];
        let s_rsne = rsne_with_akm(akm::EAP).to_bytes();
        authenticator
            .add_station(&mut sink, test_util::S_ADDR, s_rsne, None, now)
            .expect("error adding station");
        authenticator
            .on_pmk_available(&mut sink, &test_util::S_ADDR, &test_util::get_pmk()[..], now)
            .expect("error processing PMK");
        assert!(pmksa.lock().current(&test_util::S_ADDR).is_some());
        assert!(authenticator.pmksa_timer.is_some());

        authenticator.remove_station(&mut sink, &test_util::S_ADDR);
        assert!(pmksa.lock().current(&test_util::S_ADDR).is_none());
        assert!(pmksa.lock().get(&test_util::S_ADDR, None, now).is_some());
    }

    #[test]
    fn test_eapol_key_requests() {
        let scheduler = FakeScheduler::new();
        let mut authenticator = psk_authenticator(&scheduler);
        let mut supplicant = supplicant(test_util::S_ADDR);
        establish(&mut authenticator, &mut supplicant, test_util::S_ADDR);

        let mut s_sink = vec![];
        supplicant
            .report_mic_failure(&mut s_sink, true, Instant::now())
            .expect("error reporting MIC failure");
        let mic_failure = sole_frame(&s_sink);
        let mut a_sink = vec![];
        authenticator
            .on_eapol_key_frame(&mut a_sink, &test_util::S_ADDR, &mic_failure)
            .expect("error processing MIC failure report");
        assert_variant!(&a_sink[..], [SecAssocUpdate::Status {
            status: SecAssocStatus::MicFailureReported { pairwise: true },
            ..
        }]);

        let mut s_sink = vec![];
        supplicant.request_ptk_rekey(&mut s_sink).expect("error requesting PTK rekey");
        let mut a_sink = vec![];
        authenticator
            .on_eapol_key_frame(&mut a_sink, &test_util::S_ADDR, &sole_frame(&s_sink))
            .expect("error processing PTK rekey request");
        let msg1 = sole_frame(&a_sink);
        assert!(!msg1.key_info.key_mic());
        assert_eq!(msg1.key_replay_counter, 3);
        let station = authenticator.station(&test_util::S_ADDR).expect("station is missing");
        assert_eq!(station.ptk_state(), PtkState::PtkStart);
        assert!(station.ptk().is_some());

        let result =
            authenticator.on_eapol_key_frame(&mut vec![], &test_util::S_ADDR, &mic_failure);
        assert_eq!(result, Err(Error::InvalidKeyReplayCounter(1, 2)));
    }
}
