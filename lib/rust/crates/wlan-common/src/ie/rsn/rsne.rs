// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::{
    akm, cipher,
    pmkid::{self, Pmkid},
    suite_selector::{read_suite_selector, write_suite_selector},
    Error,
};
use crate::appendable::{Appendable, BufferTooSmall};
use crate::ie::{IE_HDR_LEN, IE_MAX_BODY_LEN};
use bitfield::bitfield;
use bytes::Bytes;
use nom::number::streaming::{le_u16, le_u8};
use nom::{call, complete, count, do_parse, eof, map, map_res, named, named_attr, opt, IResult};

pub const ID: u8 = 48;
pub const VERSION: u16 = 1;

// IEEE Std 802.11-2016, 9.4.2.25.4, Figure 9-257
bitfield! {
    #[derive(PartialEq, Eq, Clone, Copy)]
    pub struct RsnCapabilities(u16);
    impl Debug;
    pub preauth, set_preauth: 0;
    pub no_pairwise, set_no_pairwise: 1;
    pub ptksa_replay_counter, set_ptksa_replay_counter: 3, 2;
    pub gtksa_replay_counter, set_gtksa_replay_counter: 5, 4;
    pub mgmt_frame_protection_req, set_mgmt_frame_protection_req: 6;
    pub mgmt_frame_protection_cap, set_mgmt_frame_protection_cap: 7;
    pub joint_multiband, set_joint_multiband: 8;
    pub peerkey_enabled, set_peerkey_enabled: 9;
    pub ssp_amsdu_cap, set_ssp_amsdu_cap: 10;
    pub ssp_amsdu_req, set_ssp_amsdu_req: 11;
    pub pbac, set_pbac: 12;
    pub extended_key_id, set_extended_key_id: 13;
    // Bit 14-15 reserved.
    pub value, _: 15, 0;
}

// IEEE Std 802.11-2016, 9.4.2.25.1, Figure 9-255
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Rsne {
    pub version: u16,
    pub group_data_cipher_suite: Option<cipher::Cipher>,
    pub pairwise_cipher_suites: Vec<cipher::Cipher>,
    pub akm_suites: Vec<akm::Akm>,
    pub rsn_capabilities: Option<RsnCapabilities>,
    pub pmkids: Vec<Pmkid>,
    pub group_mgmt_cipher_suite: Option<cipher::Cipher>,
}

impl Default for Rsne {
    fn default() -> Self {
        Rsne {
            version: VERSION,
            group_data_cipher_suite: None,
            pairwise_cipher_suites: vec![],
            akm_suites: vec![],
            rsn_capabilities: None,
            pmkids: vec![],
            group_mgmt_cipher_suite: None,
        }
    }
}

impl Rsne {
    pub fn new() -> Self {
        Self::default()
    }

    /// Length of the RSNE including its element header.
    pub fn len(&self) -> usize {
        let mut length: usize = IE_HDR_LEN + 2;
        match self.group_data_cipher_suite.as_ref() {
            None => return length,
            Some(_) => length += 4,
        };

        if !self.should_write_pairwise() {
            return length;
        }
        length += 2 + 4 * self.pairwise_cipher_suites.len();

        if !self.should_write_akm() {
            return length;
        }
        length += 2 + 4 * self.akm_suites.len();

        if !self.should_write_caps() {
            return length;
        }
        length += 2;

        if !self.should_write_pmkids() {
            return length;
        }
        length += 2 + pmkid::LEN * self.pmkids.len();

        if self.group_mgmt_cipher_suite.is_some() {
            length += 4;
        }
        length
    }

    fn should_write_pairwise(&self) -> bool {
        !self.pairwise_cipher_suites.is_empty() || self.should_write_akm()
    }

    fn should_write_akm(&self) -> bool {
        !self.akm_suites.is_empty() || self.should_write_caps()
    }

    fn should_write_caps(&self) -> bool {
        self.rsn_capabilities.is_some() || self.should_write_pmkids()
    }

    fn should_write_pmkids(&self) -> bool {
        !self.pmkids.is_empty() || self.group_mgmt_cipher_suite.is_some()
    }

    pub fn write_into<A: Appendable>(&self, buf: &mut A) -> Result<(), BufferTooSmall> {
        let len = self.len();
        if len - IE_HDR_LEN > IE_MAX_BODY_LEN || !buf.can_append(len) {
            return Err(BufferTooSmall);
        }
        buf.append_byte(ID)?;
        buf.append_byte((len - IE_HDR_LEN) as u8)?;
        buf.append_u16_le(self.version)?;

        match self.group_data_cipher_suite.as_ref() {
            None => return Ok(()),
            Some(cipher) => write_suite_selector(buf, &cipher.oui, cipher.suite_type)?,
        };

        if !self.should_write_pairwise() {
            return Ok(());
        }
        buf.append_u16_le(self.pairwise_cipher_suites.len() as u16)?;
        for cipher in &self.pairwise_cipher_suites {
            write_suite_selector(buf, &cipher.oui, cipher.suite_type)?;
        }

        if !self.should_write_akm() {
            return Ok(());
        }
        buf.append_u16_le(self.akm_suites.len() as u16)?;
        for akm in &self.akm_suites {
            write_suite_selector(buf, &akm.oui, akm.suite_type)?;
        }

        if !self.should_write_caps() {
            return Ok(());
        }
        let caps = self.rsn_capabilities.as_ref().map(|c| c.value()).unwrap_or(0);
        buf.append_u16_le(caps)?;

        if !self.should_write_pmkids() {
            return Ok(());
        }
        buf.append_u16_le(self.pmkids.len() as u16)?;
        for pmkid in &self.pmkids {
            buf.append_bytes(&pmkid[..])?;
        }

        if let Some(cipher) = self.group_mgmt_cipher_suite.as_ref() {
            write_suite_selector(buf, &cipher.oui, cipher.suite_type)?;
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.len());
        // Writing into a Vec only fails if the element exceeds its maximum length.
        if self.write_into(&mut buf).is_err() {
            buf.clear();
        }
        buf
    }

    pub fn mfp_capable(&self) -> bool {
        self.rsn_capabilities.map(|c| c.mgmt_frame_protection_cap()).unwrap_or(false)
    }

    pub fn mfp_required(&self) -> bool {
        self.rsn_capabilities.map(|c| c.mgmt_frame_protection_req()).unwrap_or(false)
    }
}

fn read_pmkid(input: &[u8]) -> IResult<&[u8], Pmkid> {
    let f = |bytes: &[u8]| pmkid::new(Bytes::copy_from_slice(bytes));
    map_res!(input, nom::bytes::streaming::take(pmkid::LEN), f)
}

named!(akm<&[u8], akm::Akm>, call!(read_suite_selector::<akm::Akm>));
named!(cipher<&[u8], cipher::Cipher>, call!(read_suite_selector::<cipher::Cipher>));

named_attr!(
    /// Convert bytes of an RSNE information element into an RSNE representation. This method
    /// does not depend on the information element length field (second byte) and thus does not
    /// validate that it's correct. Use `parse` for a length validated conversion.
    , // comma ends the attribute list to named_attr
    pub from_bytes<&[u8], Rsne>,
       do_parse!(
           _element_id: le_u8 >>
           _length: le_u8 >>
           version: le_u16 >>
           group_cipher: opt!(complete!(cipher)) >>
           pairwise_count: opt!(complete!(le_u16)) >>
           pairwise_list: count!(cipher, pairwise_count.unwrap_or(0) as usize)  >>
           akm_count: opt!(complete!(le_u16)) >>
           akm_list: count!(akm, akm_count.unwrap_or(0) as usize)  >>
           rsn_capabilities: opt!(complete!(map!(le_u16, RsnCapabilities))) >>
           pmkid_count: opt!(complete!(le_u16)) >>
           pmkid_list: count!(read_pmkid, pmkid_count.unwrap_or(0) as usize)  >>
           group_mgmt_cipher_suite: opt!(complete!(cipher)) >>
           eof!() >>
           (Rsne{
                version: version,
                group_data_cipher_suite: group_cipher,
                pairwise_cipher_suites: pairwise_list,
                akm_suites: akm_list,
                rsn_capabilities: rsn_capabilities,
                pmkids: pmkid_list,
                group_mgmt_cipher_suite: group_mgmt_cipher_suite
           })
    )
);

/// Parses a complete RSNE, including its element header, and validates the element's length.
pub fn parse(ie: &[u8]) -> Result<Rsne, Error> {
    if ie.len() < IE_HDR_LEN + 2 {
        return Err(Error::InvalidElementLength(ie.len(), ie.len()));
    }
    if ie[0] != ID {
        return Err(Error::UnexpectedElementId(ie[0]));
    }
    if ie[1] as usize != ie.len() - IE_HDR_LEN {
        return Err(Error::InvalidElementLength(ie[1] as usize, ie.len() - IE_HDR_LEN));
    }
    match from_bytes(ie) {
        Ok((_, rsne)) => Ok(rsne),
        Err(_) => Err(Error::MalformedRsne),
    }
}
