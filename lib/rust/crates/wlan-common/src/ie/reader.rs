// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use super::{Id, IE_HDR_LEN};

/// Iterates over a chain of information elements and yields each element's ID and body.
/// Iteration stops at the first truncated element.
pub struct Reader<'a> {
    remaining: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Reader { remaining: bytes }
    }

    /// Bytes not yet consumed by the iterator.
    pub fn remaining(&self) -> &'a [u8] {
        self.remaining
    }
}

impl<'a> Iterator for Reader<'a> {
    type Item = (Id, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining.len() < IE_HDR_LEN {
            return None;
        }
        let id = Id(self.remaining[0]);
        let body_len = self.remaining[1] as usize;
        if self.remaining.len() < IE_HDR_LEN + body_len {
            return None;
        }
        let body = &self.remaining[IE_HDR_LEN..IE_HDR_LEN + body_len];
        self.remaining = &self.remaining[IE_HDR_LEN + body_len..];
        Some((id, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn empty() {
        assert_eq!(None, Reader::new(&[][..]).next());
    }

    #[test]
    pub fn less_than_header() {
        assert_eq!(None, Reader::new(&[0][..]).next());
    }

    #[test]
    pub fn body_too_short() {
        assert_eq!(None, Reader::new(&[0, 2, 10][..]).next());
    }

    #[test]
    pub fn empty_body() {
        let elems: Vec<_> = Reader::new(&[0, 0][..]).collect();
        assert_eq!(&[(Id::SSID, &[][..])], &elems[..]);
    }

    #[test]
    pub fn two_elements() {
        let bytes = vec![0, 2, 10, 20, 1, 3, 11, 22, 33];
        let elems: Vec<_> = Reader::new(&bytes[..]).collect();
        assert_eq!(
            &[(Id::SSID, &[10, 20][..]), (Id::SUPPORTED_RATES, &[11, 22, 33][..])],
            &elems[..]
        );
    }

    #[test]
    pub fn truncated_trailer_is_left_unconsumed() {
        let bytes = vec![255, 2, 5, 1, 2, 2, 1];
        let mut reader = Reader::new(&bytes[..]);
        assert_eq!(reader.next(), Some((Id::EXTENSION, &[5, 1][..])));
        assert_eq!(reader.next(), None);
        assert_eq!(reader.remaining(), &[2, 2, 1][..]);
    }
}
