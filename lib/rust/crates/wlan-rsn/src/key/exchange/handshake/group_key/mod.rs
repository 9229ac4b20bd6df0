// Copyright 2018 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

pub mod authenticator;
pub mod supplicant;

use eapol::{KeyFrame, KeyType};

/// Whether a frame sent by an Authenticator is message 1 of a Group Key Handshake.
pub fn is_message_1(frame: &KeyFrame) -> bool {
    let key_info = frame.key_info;
    key_info.key_type() == KeyType::Group
        && key_info.key_ack()
        && key_info.key_mic()
        && !key_info.request()
}
