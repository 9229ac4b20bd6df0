// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Crate wlan-common hosts common libraries
//! to be used for WLAN SME, MLME, and binaries written in Rust.

pub mod appendable;
pub mod ie;
pub mod mac;
pub mod organization;
pub mod test_utils;

/// Asserts that `$e` matches one of the given patterns and optionally evaluates an expression
/// with the bindings of the matched pattern.
#[macro_export]
macro_rules! assert_variant {
    // Use custom formatting when panicking.
    ($test:expr, $variant:pat $( | $others:pat)* => $e:expr, $fmt:expr $(, $args:tt)* $(,)?) => {
        match $test {
            $variant $(| $others)* => $e,
            _ => panic!($fmt, $($args,)*),
        }
    };
    // Use default message when panicking.
    ($test:expr, $variant:pat $( | $others:pat)* => $e:expr $(,)?) => {
        match $test {
            $variant $(| $others)* => $e,
            other => panic!("unexpected variant: {:?}", other),
        }
    };
    // Custom error message.
    ($test:expr, $variant:pat $( | $others:pat)* , $fmt:expr $(, $args:tt)* $(,)?) => {
        $crate::assert_variant!($test, $variant $( | $others)* => {}, $fmt $(, $args)*)
    };
    // Default error message.
    ($test:expr, $variant:pat $( | $others:pat)* $(,)?) => {
        $crate::assert_variant!($test, $variant $( | $others)* => {})
    };
}
