// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Simultaneous Authentication of Equals over NIST P-256 (group 19).
// IEEE Std 802.11-2016, 12.4

pub mod comeback;
pub mod ecc;
pub mod frame;
pub mod pwe;
pub mod queue;
pub mod responder;
pub mod session;

pub use self::comeback::{ComebackTokens, SharedComebackTokens};
pub use self::frame::AuthFrame;
pub use self::responder::{SaeNetwork, SaeResponder, SaeTimeout};
pub use self::session::{SaeCredentials, SaeKeys, SaeSession, SaeState};
