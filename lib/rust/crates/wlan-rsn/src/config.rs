// Copyright 2019 The Fuchsia Authors. All rights reserved.
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Protocol constants of the key exchange engine. Every field has a default, so a host only
//! needs to provide the values it wants to change.

use crate::rsna::Compat;
use crate::Error;
use serde::Deserialize;
use std::io;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SupplicantConfig {
    /// Message 1 retransmissions tolerated before giving up on the handshake.
    pub max_msg1_retries: u32,
    /// Two MIC failures within this window start countermeasures.
    pub mic_failure_window_secs: u64,
    pub compat: Compat,
}

impl Default for SupplicantConfig {
    fn default() -> Self {
        SupplicantConfig {
            max_msg1_retries: 3,
            mic_failure_window_secs: 60,
            compat: Compat::default(),
        }
    }
}

impl SupplicantConfig {
    pub fn mic_failure_window(&self) -> Duration {
        Duration::from_secs(self.mic_failure_window_secs)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.mic_failure_window_secs == 0 {
            return Err(Error::InvalidConfig("mic_failure_window_secs must not be 0".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AuthenticatorConfig {
    /// Retransmission timeout of EAPOL-Key frames.
    pub eapol_timeout_ms: u64,
    /// Transmissions of message 1 and message 3 before the station is disconnected.
    pub pairwise_update_count: u32,
    /// Transmissions of group message 1 before the station is disconnected.
    pub group_update_count: u32,
    /// Periodic GTK rekeying, disabled when absent.
    pub gtk_rekey_interval_secs: Option<u64>,
    pub compat: Compat,
}

impl Default for AuthenticatorConfig {
    fn default() -> Self {
        AuthenticatorConfig {
            eapol_timeout_ms: 1000,
            pairwise_update_count: 4,
            group_update_count: 4,
            gtk_rekey_interval_secs: None,
            compat: Compat::default(),
        }
    }
}

impl AuthenticatorConfig {
    pub fn eapol_timeout(&self) -> Duration {
        Duration::from_millis(self.eapol_timeout_ms)
    }

    pub fn gtk_rekey_interval(&self) -> Option<Duration> {
        self.gtk_rekey_interval_secs.map(Duration::from_secs)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.eapol_timeout_ms == 0 {
            return Err(Error::InvalidConfig("eapol_timeout_ms must not be 0".to_string()));
        }
        if self.pairwise_update_count == 0 || self.group_update_count == 0 {
            return Err(Error::InvalidConfig("update counts must not be 0".to_string()));
        }
        if self.gtk_rekey_interval_secs == Some(0) {
            return Err(Error::InvalidConfig("gtk_rekey_interval_secs must not be 0".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SaeConfig {
    /// Commit retransmissions tolerated in Confirmed and Accepted.
    pub sync_limit: u32,
    /// Open sessions plus queued commits at which anti-clogging tokens are required.
    pub anti_clogging_threshold: usize,
    pub commit_queue_capacity: usize,
    pub comeback_key_rotation_secs: u64,
    pub retransmit_timeout_ms: u64,
    /// Send Confirm together with Commit instead of waiting for the peer's Confirm.
    pub confirm_immediate: bool,
}

impl Default for SaeConfig {
    fn default() -> Self {
        SaeConfig {
            sync_limit: 5,
            anti_clogging_threshold: 5,
            commit_queue_capacity: 32,
            comeback_key_rotation_secs: 60,
            retransmit_timeout_ms: 1000,
            confirm_immediate: false,
        }
    }
}

impl SaeConfig {
    pub fn comeback_key_rotation(&self) -> Duration {
        Duration::from_secs(self.comeback_key_rotation_secs)
    }

    pub fn retransmit_timeout(&self) -> Duration {
        Duration::from_millis(self.retransmit_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.sync_limit == 0 {
            return Err(Error::InvalidConfig("sync_limit must not be 0".to_string()));
        }
        if self.commit_queue_capacity == 0 {
            return Err(Error::InvalidConfig("commit_queue_capacity must not be 0".to_string()));
        }
        if self.retransmit_timeout_ms == 0 {
            return Err(Error::InvalidConfig("retransmit_timeout_ms must not be 0".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PmksaConfig {
    pub max_entries: usize,
    pub lifetime_secs: u64,
    /// Share of the lifetime after which a PMKSA should be refreshed.
    pub reauth_threshold_percent: u32,
}

impl Default for PmksaConfig {
    fn default() -> Self {
        PmksaConfig { max_entries: 32, lifetime_secs: 43200, reauth_threshold_percent: 70 }
    }
}

impl PmksaConfig {
    pub fn lifetime(&self) -> Duration {
        Duration::from_secs(self.lifetime_secs)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.max_entries == 0 {
            return Err(Error::InvalidConfig("max_entries must not be 0".to_string()));
        }
        if self.lifetime_secs == 0 {
            return Err(Error::InvalidConfig("lifetime_secs must not be 0".to_string()));
        }
        if self.reauth_threshold_percent == 0 || self.reauth_threshold_percent > 100 {
            return Err(Error::InvalidConfig(format!(
                "reauth_threshold_percent out of range: {}",
                self.reauth_threshold_percent
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub supplicant: SupplicantConfig,
    pub authenticator: AuthenticatorConfig,
    pub sae: SaeConfig,
    pub pmksa: PmksaConfig,
}

impl Config {
    /// Reads a JSON configuration and validates it.
    pub fn load<R: io::Read>(reader: R) -> Result<Self, Error> {
        let config: Config = serde_json::from_reader(reader)
            .map_err(|e| Error::InvalidConfig(format!("could not deserialize config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.supplicant.validate()?;
        self.authenticator.validate()?;
        self.sae.validate()?;
        self.pmksa.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(Config::default().validate(), Ok(()));
        let cfg = AuthenticatorConfig::default();
        assert_eq!(cfg.eapol_timeout(), Duration::from_millis(1000));
        assert_eq!(cfg.pairwise_update_count, 4);
        assert_eq!(SaeConfig::default().sync_limit, 5);
    }

    #[test]
    fn test_load_partial_json() {
        let json = r#"{
            "authenticator": { "eapol_timeout_ms": 500, "gtk_rekey_interval_secs": 3600 },
            "sae": { "anti_clogging_threshold": 2, "confirm_immediate": true },
            "pmksa": { "max_entries": 4 }
        }"#;
        let cfg = Config::load(json.as_bytes()).expect("error loading config");
        assert_eq!(cfg.authenticator.eapol_timeout_ms, 500);
        assert_eq!(cfg.authenticator.pairwise_update_count, 4);
        assert_eq!(cfg.authenticator.gtk_rekey_interval(), Some(Duration::from_secs(3600)));
        assert_eq!(cfg.sae.anti_clogging_threshold, 2);
        assert!(cfg.sae.confirm_immediate);
        assert_eq!(cfg.sae.sync_limit, 5);
        assert_eq!(cfg.pmksa.max_entries, 4);
        assert_eq!(cfg.supplicant, SupplicantConfig::default());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let json = r#"{ "pmksa": { "reauth_threshold_percent": 150 } }"#;
        assert!(Config::load(json.as_bytes()).is_err());
        let json = r#"{ "authenticator": { "pairwise_update_count": 0 } }"#;
        assert!(Config::load(json.as_bytes()).is_err());
        assert!(Config::load("not json".as_bytes()).is_err());
    }
}
