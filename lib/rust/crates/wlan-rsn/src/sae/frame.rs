// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Authentication frame bodies exchanged by SAE.
//! IEEE Std 802.11-2020, 9.3.3.12, Table 9-41

use super::ecc::{GROUP_ID, PRIME_LEN};
use crate::Error;
use wlan_common::ie::{self, ext_id, Id};
use wlan_common::mac::mgmt::{AuthAlgorithmNumber, StatusCode};

pub const COMMIT_SEQ: u16 = 1;
pub const CONFIRM_SEQ: u16 = 2;
/// Length of the comeback tokens this implementation hands out.
pub const TOKEN_LEN: usize = 32;
pub const CONFIRM_LEN: usize = 32;
pub const SCALAR_LEN: usize = PRIME_LEN;
pub const ELEMENT_LEN: usize = 2 * PRIME_LEN;
const AUTH_HDR_LEN: usize = 6;

/// Fixed part of an Authentication frame body followed by its SAE specific fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFrame {
    pub transaction_seq: u16,
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl AuthFrame {
    pub fn commit(status: StatusCode, body: Vec<u8>) -> Self {
        AuthFrame { transaction_seq: COMMIT_SEQ, status, body }
    }

    pub fn confirm(status: StatusCode, body: Vec<u8>) -> Self {
        AuthFrame { transaction_seq: CONFIRM_SEQ, status, body }
    }

    pub fn is_commit(&self) -> bool {
        self.transaction_seq == COMMIT_SEQ
    }

    pub fn is_confirm(&self) -> bool {
        self.transaction_seq == CONFIRM_SEQ
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(AUTH_HDR_LEN + self.body.len());
        buf.extend_from_slice(&AuthAlgorithmNumber::SAE.0.to_le_bytes()[..]);
        buf.extend_from_slice(&self.transaction_seq.to_le_bytes()[..]);
        buf.extend_from_slice(&self.status.0.to_le_bytes()[..]);
        buf.extend_from_slice(&self.body[..]);
        buf
    }

    pub fn parse(bytes: &[u8]) -> Result<Self, Error> {
        if bytes.len() < AUTH_HDR_LEN {
            return Err(Error::SaeMalformedFrame);
        }
        if le16(&bytes[0..2]) != AuthAlgorithmNumber::SAE.0 {
            return Err(Error::SaeMalformedFrame);
        }
        let transaction_seq = le16(&bytes[2..4]);
        if transaction_seq != COMMIT_SEQ && transaction_seq != CONFIRM_SEQ {
            return Err(Error::SaeMalformedFrame);
        }
        Ok(AuthFrame {
            transaction_seq,
            status: StatusCode(le16(&bytes[4..6])),
            body: bytes[AUTH_HDR_LEN..].to_vec(),
        })
    }
}

fn le16(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Commit {
    pub group_id: u16,
    pub token: Option<Vec<u8>>,
    pub scalar: Vec<u8>,
    /// Uncompressed element, x || y.
    pub element: Vec<u8>,
    pub password_id: Option<Vec<u8>>,
    /// Groups the sender saw rejected. Only sent with hash-to-element.
    pub rejected_groups: Option<Vec<u16>>,
}

impl Commit {
    /// Without hash-to-element a token precedes the scalar, with hash-to-element it is carried
    /// in a container element at the end.
    pub fn to_bytes(&self, h2e: bool) -> Result<Vec<u8>, Error> {
        let mut buf = self.group_id.to_le_bytes().to_vec();
        if !h2e {
            if let Some(token) = self.token.as_ref() {
                buf.extend_from_slice(&token[..]);
            }
        }
        buf.extend_from_slice(&self.scalar[..]);
        buf.extend_from_slice(&self.element[..]);
        if let Some(password_id) = self.password_id.as_ref() {
            ie::write_ext_ie(&mut buf, ext_id::PASSWORD_IDENTIFIER, &password_id[..])?;
        }
        if h2e {
            if let Some(groups) = self.rejected_groups.as_ref().filter(|g| !g.is_empty()) {
                let body: Vec<u8> = groups.iter().flat_map(|g| g.to_le_bytes().to_vec()).collect();
                ie::write_ext_ie(&mut buf, ext_id::REJECTED_GROUPS, &body[..])?;
            }
            if let Some(token) = self.token.as_ref() {
                ie::write_ext_ie(&mut buf, ext_id::ANTI_CLOGGING_TOKEN_CONTAINER, &token[..])?;
            }
        }
        Ok(buf)
    }

    /// Returns the status code to reject the frame with on failure.
    pub fn parse(body: &[u8], h2e: bool) -> Result<Self, StatusCode> {
        if body.len() < 2 {
            return Err(StatusCode::REFUSED_REASON_UNSPECIFIED);
        }
        let group_id = le16(&body[0..2]);
        if group_id != GROUP_ID {
            return Err(StatusCode::UNSUPPORTED_FINITE_CYCLIC_GROUP);
        }
        let mut rest = &body[2..];
        if rest.len() < SCALAR_LEN + ELEMENT_LEN {
            return Err(StatusCode::REFUSED_REASON_UNSPECIFIED);
        }

        let mut commit = Commit { group_id, ..Default::default() };
        // Tokens have no length field. Anything between the group and the scalar which is not
        // followed by a well formed element chain is taken to be a token.
        if !h2e
            && rest.len() >= TOKEN_LEN + SCALAR_LEN + ELEMENT_LEN
            && !is_ext_element_chain(&rest[SCALAR_LEN + ELEMENT_LEN..])
        {
            commit.token = Some(rest[..TOKEN_LEN].to_vec());
            rest = &rest[TOKEN_LEN..];
        }
        commit.scalar = rest[..SCALAR_LEN].to_vec();
        commit.element = rest[SCALAR_LEN..SCALAR_LEN + ELEMENT_LEN].to_vec();
        rest = &rest[SCALAR_LEN + ELEMENT_LEN..];

        let mut reader = ie::Reader::new(rest);
        for (id, ie_body) in &mut reader {
            let (ext, ext_body) = match (id, ie_body.split_first()) {
                (Id::EXTENSION, Some((ext, ext_body))) => (*ext, ext_body),
                _ => return Err(StatusCode::REFUSED_REASON_UNSPECIFIED),
            };
            match ext {
                ext_id::PASSWORD_IDENTIFIER => commit.password_id = Some(ext_body.to_vec()),
                ext_id::REJECTED_GROUPS if h2e => {
                    if ext_body.is_empty() || ext_body.len() % 2 != 0 {
                        return Err(StatusCode::REFUSED_REASON_UNSPECIFIED);
                    }
                    commit.rejected_groups = Some(ext_body.chunks(2).map(le16).collect());
                }
                ext_id::ANTI_CLOGGING_TOKEN_CONTAINER if h2e => {
                    if ext_body.is_empty() {
                        return Err(StatusCode::REFUSED_REASON_UNSPECIFIED);
                    }
                    commit.token = Some(ext_body.to_vec());
                }
                _ => return Err(StatusCode::REFUSED_REASON_UNSPECIFIED),
            }
        }
        if !reader.remaining().is_empty() {
            return Err(StatusCode::REFUSED_REASON_UNSPECIFIED);
        }
        Ok(commit)
    }
}

fn is_ext_element_chain(bytes: &[u8]) -> bool {
    let mut reader = ie::Reader::new(bytes);
    let all_ext = (&mut reader).all(|(id, body)| id == Id::EXTENSION && !body.is_empty());
    all_ext && reader.remaining().is_empty()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirm {
    pub send_confirm: u16,
    pub confirm: Vec<u8>,
}

impl Confirm {
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = self.send_confirm.to_le_bytes().to_vec();
        buf.extend_from_slice(&self.confirm[..]);
        buf
    }

    pub fn parse(body: &[u8]) -> Result<Self, Error> {
        if body.len() != 2 + CONFIRM_LEN {
            return Err(Error::SaeMalformedFrame);
        }
        Ok(Confirm { send_confirm: le16(&body[0..2]), confirm: body[2..].to_vec() })
    }
}

/// Body of a commit answered with ANTI_CLOGGING_TOKEN_REQUIRED.
pub fn write_token_request(group_id: u16, token: &[u8], h2e: bool) -> Result<Vec<u8>, Error> {
    let mut buf = group_id.to_le_bytes().to_vec();
    if h2e {
        ie::write_ext_ie(&mut buf, ext_id::ANTI_CLOGGING_TOKEN_CONTAINER, token)?;
    } else {
        buf.extend_from_slice(token);
    }
    Ok(buf)
}

/// Returns the group and the token to echo in the next commit.
pub fn parse_token_request(body: &[u8], h2e: bool) -> Result<(u16, Vec<u8>), StatusCode> {
    if body.len() < 2 {
        return Err(StatusCode::REFUSED_REASON_UNSPECIFIED);
    }
    let group_id = le16(&body[0..2]);
    let rest = &body[2..];
    let token = if h2e {
        let mut reader = ie::Reader::new(rest);
        let token = match reader.next() {
            Some((Id::EXTENSION, ie_body))
                if ie_body.len() > 1 && ie_body[0] == ext_id::ANTI_CLOGGING_TOKEN_CONTAINER =>
            {
                ie_body[1..].to_vec()
            }
            _ => return Err(StatusCode::REFUSED_REASON_UNSPECIFIED),
        };
        if !reader.remaining().is_empty() {
            return Err(StatusCode::REFUSED_REASON_UNSPECIFIED);
        }
        token
    } else {
        rest.to_vec()
    };
    if token.is_empty() {
        return Err(StatusCode::REFUSED_REASON_UNSPECIFIED);
    }
    Ok((group_id, token))
}

/// Body of a commit rejected for its group: the rejected group.
pub fn write_group_rejection(group_id: u16) -> Vec<u8> {
    group_id.to_le_bytes().to_vec()
}
