// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod exchange;
pub mod gtk;
pub mod igtk;
pub mod ptk;

/// Transient keys which get installed into the device.
pub trait Tk {
    fn tk(&self) -> &[u8];

    /// Two keys are considered equal if they carry the same key material and key id.
    fn eq_tk(&self, other: &impl Tk) -> bool {
        self.tk() == other.tk()
    }
}
