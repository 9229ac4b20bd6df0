// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("buffer is too small")]
pub struct BufferTooSmall;

/// A byte sink which can only be written to at its end.
pub trait Appendable {
    fn append_bytes(&mut self, bytes: &[u8]) -> Result<(), BufferTooSmall>;

    fn append_bytes_zeroed(&mut self, len: usize) -> Result<&mut [u8], BufferTooSmall>;

    fn bytes_written(&self) -> usize;

    fn can_append(&self, bytes: usize) -> bool;

    fn append_byte(&mut self, byte: u8) -> Result<(), BufferTooSmall> {
        self.append_bytes(&[byte])
    }

    fn append_u16_le(&mut self, value: u16) -> Result<(), BufferTooSmall> {
        self.append_bytes(&value.to_le_bytes()[..])
    }

    fn append_u16_be(&mut self, value: u16) -> Result<(), BufferTooSmall> {
        self.append_bytes(&value.to_be_bytes()[..])
    }
}

impl Appendable for Vec<u8> {
    fn append_bytes(&mut self, bytes: &[u8]) -> Result<(), BufferTooSmall> {
        self.extend_from_slice(bytes);
        Ok(())
    }

    fn append_bytes_zeroed(&mut self, len: usize) -> Result<&mut [u8], BufferTooSmall> {
        let old_len = self.len();
        self.resize(old_len + len, 0);
        Ok(&mut self[old_len..])
    }

    fn bytes_written(&self) -> usize {
        self.len()
    }

    fn can_append(&self, _bytes: usize) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FixedSizedTestBuffer;

    #[test]
    fn append_to_vec() {
        let mut buf = vec![];
        buf.append_bytes(&[1, 2, 3]).expect("failed writing bytes");
        buf.append_u16_le(0x0504).expect("failed writing u16");
        buf.append_u16_be(0x0607).expect("failed writing u16");
        buf.append_bytes_zeroed(2).expect("failed writing zeroes");
        assert_eq!(&buf[..], &[1, 2, 3, 4, 5, 6, 7, 0, 0][..]);
        assert_eq!(buf.bytes_written(), 9);
    }

    #[test]
    fn fixed_buffer_refuses_overflow() {
        let mut buf = FixedSizedTestBuffer::new(3);
        buf.append_bytes(&[1, 2]).expect("failed writing bytes");
        assert!(!buf.can_append(2));
        assert_eq!(buf.append_u16_le(7), Err(BufferTooSmall));
        buf.append_byte(3).expect("failed writing byte");
        assert_eq!(buf.bytes_written(), 3);
    }
}
