// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! EAPOL and EAPOL-Key frame codec.
//! IEEE Std 802.1X-2010, 11.3 and IEEE Std 802.11-2016, 12.7.2

use bitfield::bitfield;
use bytes::Bytes;
use nom::number::streaming::{be_u16, be_u64, be_u8};
use nom::{do_parse, map, named_args, take};
use thiserror::Error;

/// Octets preceding the packet body: version, packet type and packet body length.
pub const HDR_LEN: usize = 4;
/// Octets of an EAPOL-Key frame's body preceding the Key MIC field.
pub const KEY_FRAME_FIXED_LEN: usize = 77;
pub const KEY_NONCE_LEN: usize = 32;
pub const KEY_IV_LEN: usize = 16;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("frame is truncated")]
    FrameTruncated,
    #[error("unsupported EAPOL packet type: {}", _0)]
    UnsupportedPacketType(u8),
    #[error("packet body length {} exceeds available bytes {}", _0, _1)]
    PacketBodyLengthOverflow(usize, usize),
    #[error("key data length {} exceeds packet body", _0)]
    KeyDataLengthOverflow(usize),
    #[error("unsupported MIC length: {}", _0)]
    UnsupportedMicLength(usize),
}

// IEEE Std 802.1X-2010, 11.3.1
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolVersion {
    Ieee802dot1x2001 = 1,
    Ieee802dot1x2004 = 2,
    Ieee802dot1x2010 = 3,
}

// IEEE Std 802.1X-2010, 11.3.2
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Eap = 0,
    Start = 1,
    Logoff = 2,
    Key = 3,
    AsfAlert = 4,
}

// IEEE Std 802.1X-2010, 11.9
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDescriptor {
    Rc4 = 1,
    Ieee802dot11 = 2,
    // Used by WPA1 as well as by some RSN stations for compatibility.
    LegacyWpa1 = 254,
}

// IEEE Std 802.11-2016, 12.7.2 b.1)
pub const DESC_VER_AKM_DEFINED: u16 = 0;
pub const DESC_VER_HMAC_MD5_RC4: u16 = 1;
pub const DESC_VER_HMAC_SHA1_AES: u16 = 2;
pub const DESC_VER_AES_128_CMAC: u16 = 3;

// IEEE Std 802.11-2016, 12.7.2 b.2)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Group = 0,
    Pairwise = 1,
}

// IEEE Std 802.11-2016, 12.7.2, Figure 12-33
bitfield! {
    #[derive(PartialEq, Eq, Clone, Copy, Default)]
    pub struct KeyInformation(u16);
    impl Debug;
    pub key_descriptor_version, set_key_descriptor_version: 2, 0;
    pub key_type_bit, set_key_type_bit: 3;
    // Bit 4-5 reserved in RSN; WPA1 carries the group key index here.
    pub legacy_key_id, set_legacy_key_id: 5, 4;
    pub install, set_install: 6;
    pub key_ack, set_key_ack: 7;
    pub key_mic, set_key_mic: 8;
    pub secure, set_secure: 9;
    pub error, set_error: 10;
    pub request, set_request: 11;
    pub encrypted_key_data, set_encrypted_key_data: 12;
    pub smk_message, set_smk_message: 13;
    pub value, _: 15, 0;
}

impl KeyInformation {
    pub fn key_type(&self) -> KeyType {
        if self.key_type_bit() {
            KeyType::Pairwise
        } else {
            KeyType::Group
        }
    }

    pub fn set_key_type(&mut self, key_type: KeyType) {
        self.set_key_type_bit(key_type == KeyType::Pairwise)
    }
}

// IEEE Std 802.11-2016, 12.7.2, Figure 12-32
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyFrame {
    pub version: u8,
    pub packet_type: u8,
    pub packet_body_len: u16,

    pub descriptor_type: u8,
    pub key_info: KeyInformation,
    pub key_len: u16,
    pub key_replay_counter: u64,
    pub key_nonce: [u8; KEY_NONCE_LEN],
    pub key_iv: [u8; KEY_IV_LEN],
    pub key_rsc: u64,
    // Reserved in RSN.
    pub key_id: u64,
    pub key_mic: Bytes,
    pub key_data_len: u16,
    pub key_data: Bytes,
}

impl Default for KeyFrame {
    fn default() -> Self {
        KeyFrame {
            version: ProtocolVersion::Ieee802dot1x2004 as u8,
            packet_type: PacketType::Key as u8,
            packet_body_len: 0,
            descriptor_type: KeyDescriptor::Ieee802dot11 as u8,
            key_info: KeyInformation(0),
            key_len: 0,
            key_replay_counter: 0,
            key_nonce: [0u8; KEY_NONCE_LEN],
            key_iv: [0u8; KEY_IV_LEN],
            key_rsc: 0,
            key_id: 0,
            key_mic: Bytes::new(),
            key_data_len: 0,
            key_data: Bytes::new(),
        }
    }
}

impl KeyFrame {
    /// Length of the entire frame including the EAPOL header.
    pub fn len(&self) -> usize {
        HDR_LEN + KEY_FRAME_FIXED_LEN + self.key_mic.len() + 2 + self.key_data.len()
    }

    pub fn update_packet_body_len(&mut self) {
        self.key_data_len = self.key_data.len() as u16;
        self.packet_body_len = (self.len() - HDR_LEN) as u16;
    }

    /// Serializes the frame. If `clear_mic` is set, the MIC field is written as zeroes which is
    /// the input expected when computing or verifying the frame's MIC.
    pub fn as_bytes(&self, clear_mic: bool, buf: &mut Vec<u8>) {
        buf.reserve(self.len());
        buf.push(self.version);
        buf.push(self.packet_type);
        buf.extend_from_slice(&self.packet_body_len.to_be_bytes()[..]);
        buf.push(self.descriptor_type);
        buf.extend_from_slice(&self.key_info.value().to_be_bytes()[..]);
        buf.extend_from_slice(&self.key_len.to_be_bytes()[..]);
        buf.extend_from_slice(&self.key_replay_counter.to_be_bytes()[..]);
        buf.extend_from_slice(&self.key_nonce[..]);
        buf.extend_from_slice(&self.key_iv[..]);
        buf.extend_from_slice(&self.key_rsc.to_be_bytes()[..]);
        buf.extend_from_slice(&self.key_id.to_be_bytes()[..]);
        if clear_mic {
            buf.resize(buf.len() + self.key_mic.len(), 0);
        } else {
            buf.extend_from_slice(&self.key_mic[..]);
        }
        buf.extend_from_slice(&self.key_data_len.to_be_bytes()[..]);
        buf.extend_from_slice(&self.key_data[..]);
    }

    pub fn to_bytes(&self, clear_mic: bool) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.len());
        self.as_bytes(clear_mic, &mut buf);
        buf
    }

    pub fn is_pairwise(&self) -> bool {
        self.key_info.key_type() == KeyType::Pairwise
    }
}

named_args!(key_frame_from_bytes(mic_len: usize) <KeyFrame>,
    do_parse!(
        version: be_u8 >>
        packet_type: be_u8 >>
        packet_body_len: be_u16 >>
        descriptor_type: be_u8 >>
        key_info: map!(be_u16, KeyInformation) >>
        key_len: be_u16 >>
        key_replay_counter: be_u64 >>
        key_nonce: take!(KEY_NONCE_LEN) >>
        key_iv: take!(KEY_IV_LEN) >>
        key_rsc: be_u64 >>
        key_id: be_u64 >>
        key_mic: take!(mic_len) >>
        key_data_len: be_u16 >>
        key_data: take!(key_data_len) >>
        (KeyFrame{
            version,
            packet_type,
            packet_body_len,
            descriptor_type,
            key_info,
            key_len,
            key_replay_counter,
            key_nonce: to_array(key_nonce),
            key_iv: to_array(key_iv),
            key_rsc,
            key_id,
            key_mic: Bytes::copy_from_slice(key_mic),
            key_data_len,
            key_data: Bytes::copy_from_slice(key_data),
        })
    )
);

/// Parses an EAPOL-Key frame carrying a MIC of `mic_len` octets.
/// Octets trailing the packet body are ignored. Key data which would extend beyond the packet
/// body is rejected.
pub fn parse_key_frame(bytes: &[u8], mic_len: usize) -> Result<KeyFrame, Error> {
    if mic_len != 16 && mic_len != 24 {
        return Err(Error::UnsupportedMicLength(mic_len));
    }
    if bytes.len() < HDR_LEN {
        return Err(Error::FrameTruncated);
    }
    if bytes[1] != PacketType::Key as u8 {
        return Err(Error::UnsupportedPacketType(bytes[1]));
    }
    let body_len = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
    if HDR_LEN + body_len > bytes.len() {
        return Err(Error::PacketBodyLengthOverflow(body_len, bytes.len() - HDR_LEN));
    }
    let packet = &bytes[..HDR_LEN + body_len];
    let fixed_len = HDR_LEN + KEY_FRAME_FIXED_LEN + mic_len + 2;
    if packet.len() < fixed_len {
        return Err(Error::FrameTruncated);
    }
    let key_data_len =
        u16::from_be_bytes([packet[fixed_len - 2], packet[fixed_len - 1]]) as usize;
    if fixed_len + key_data_len > packet.len() {
        return Err(Error::KeyDataLengthOverflow(key_data_len));
    }
    match key_frame_from_bytes(packet, mic_len) {
        Ok((_, frame)) => Ok(frame),
        Err(_) => Err(Error::FrameTruncated),
    }
}

/// Copies a slice into a fixed size array. The slice must not be longer than the array.
pub fn to_array<A>(slice: &[u8]) -> A
where
    A: Sized + Default + AsMut<[u8]>,
{
    let mut array = Default::default();
    <A as AsMut<[u8]>>::as_mut(&mut array)[..slice.len()].copy_from_slice(slice);
    array
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex::FromHex;

    fn msg1_bytes() -> Vec<u8> {
        #[rustfmt::skip]
        let mut frame = vec![
            0x02, 0x03, 0x00, 0x5f, // EAPOL header
            0x02, // Descriptor type
            0x00, 0x8a, // Key info
            0x00, 0x10, // Key length
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, // Replay counter
        ];
        frame.extend(
            Vec::<u8>::from_hex("3e8e967dacd960324cac5b6aa721235bf57b949771c867989f49d04ed47c6933")
                .expect("invalid nonce"),
        );
        frame.extend_from_slice(&[0u8; 16]); // IV
        frame.extend_from_slice(&[0u8; 8]); // RSC
        frame.extend_from_slice(&[0u8; 8]); // ID
        frame.extend_from_slice(&[0u8; 16]); // MIC
        frame.extend_from_slice(&[0x00, 0x00]); // Key data length
        frame
    }

    #[test]
    fn parse_msg1() {
        let bytes = msg1_bytes();
        let frame = parse_key_frame(&bytes[..], 16).expect("failed parsing key frame");
        assert_eq!(frame.version, 2);
        assert_eq!(frame.packet_type, PacketType::Key as u8);
        assert_eq!(frame.packet_body_len, 95);
        assert_eq!(frame.key_info.key_descriptor_version(), DESC_VER_HMAC_SHA1_AES);
        assert_eq!(frame.key_info.key_type(), KeyType::Pairwise);
        assert!(frame.key_info.key_ack());
        assert!(!frame.key_info.key_mic());
        assert_eq!(frame.key_len, 16);
        assert_eq!(frame.key_replay_counter, 1);
        assert_eq!(frame.key_nonce[0], 0x3e);
        assert_eq!(frame.key_data.len(), 0);
        assert_eq!(frame.len(), bytes.len());
        assert_eq!(frame.to_bytes(false), bytes);
    }

    #[test]
    fn parse_ignores_trailing_padding() {
        let mut bytes = msg1_bytes();
        bytes.extend_from_slice(&[0u8; 4]);
        let frame = parse_key_frame(&bytes[..], 16).expect("failed parsing key frame");
        assert_eq!(frame.len(), bytes.len() - 4);
    }

    #[test]
    fn key_data_length_overflow() {
        let mut bytes = msg1_bytes();
        let len = bytes.len();
        bytes[len - 1] = 8;
        assert_eq!(parse_key_frame(&bytes[..], 16), Err(Error::KeyDataLengthOverflow(8)));
    }

    #[test]
    fn packet_body_length_overflow() {
        let mut bytes = msg1_bytes();
        bytes[3] = 0x60;
        assert_eq!(parse_key_frame(&bytes[..], 16), Err(Error::PacketBodyLengthOverflow(96, 95)));
    }

    #[test]
    fn truncated_frame() {
        let bytes = msg1_bytes();
        assert_eq!(parse_key_frame(&bytes[..3], 16), Err(Error::FrameTruncated));
        let mut short = bytes[..50].to_vec();
        short[3] = 46;
        assert_eq!(parse_key_frame(&short[..], 16), Err(Error::FrameTruncated));
    }

    #[test]
    fn not_a_key_frame() {
        let mut bytes = msg1_bytes();
        bytes[1] = PacketType::Start as u8;
        assert_eq!(
            parse_key_frame(&bytes[..], 16),
            Err(Error::UnsupportedPacketType(PacketType::Start as u8))
        );
    }

    #[test]
    fn write_with_long_mic_and_key_data() {
        let mut frame = KeyFrame {
            key_mic: Bytes::from(vec![7u8; 24]),
            key_data: Bytes::from(vec![1, 2, 3, 4]),
            ..Default::default()
        };
        frame.key_info.set_key_mic(true);
        frame.update_packet_body_len();
        assert_eq!(frame.key_data_len, 4);
        assert_eq!(frame.packet_body_len as usize, KEY_FRAME_FIXED_LEN + 24 + 2 + 4);

        let bytes = frame.to_bytes(false);
        let parsed = parse_key_frame(&bytes[..], 24).expect("failed parsing key frame");
        assert_eq!(parsed, frame);

        let cleared = frame.to_bytes(true);
        assert_eq!(&cleared[HDR_LEN + KEY_FRAME_FIXED_LEN..][..24], &[0u8; 24][..]);
    }

    #[test]
    fn key_information_bits() {
        let mut key_info = KeyInformation(0);
        key_info.set_key_descriptor_version(DESC_VER_AES_128_CMAC);
        key_info.set_key_type(KeyType::Pairwise);
        key_info.set_install(true);
        key_info.set_key_ack(true);
        key_info.set_key_mic(true);
        key_info.set_secure(true);
        key_info.set_encrypted_key_data(true);
        assert_eq!(key_info.value(), 0x13cb);
    }
}
