// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use crate::appendable::{Appendable, BufferTooSmall};
use crate::organization::Oui;
use nom::{take, try_parse, IResult};

pub const OUI: Oui = Oui::DOT11;
pub const LEN: usize = 4;

pub trait Factory {
    type Suite;

    fn new(oui: Oui, suite_type: u8) -> Self::Suite;
}

/// Reads a 4 octet suite selector: OUI followed by the suite type.
pub fn read_suite_selector<T>(input: &[u8]) -> IResult<&[u8], T>
where
    T: Factory<Suite = T>,
{
    let (i1, bytes) = try_parse!(input, take!(LEN));
    let oui = Oui::new([bytes[0], bytes[1], bytes[2]]);
    Ok((i1, T::new(oui, bytes[3])))
}

pub fn write_suite_selector<A: Appendable>(
    buf: &mut A,
    oui: &Oui,
    suite_type: u8,
) -> Result<(), BufferTooSmall> {
    buf.append_bytes(&oui[..])?;
    buf.append_byte(suite_type)
}
