//! Runtime configuration for the core.
//!
//! Wire-level constants (protocol version, nonce and signature lengths)
//! are not configurable; they live next to the code that enforces them.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::KdfParams;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The input is not valid configuration JSON
    #[error("invalid configuration JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A value is out of range
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// What is wrong
        reason: String,
    },
}

/// Tunables for key storage and session lifetime.
///
/// Missing keys fall back to [`Default`], so `{}` is a valid config.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Argon2id cost parameters used when sealing key pairs
    pub kdf: KdfParams,

    /// Seconds a session may stay idle before the owner should drop it
    pub session_max_idle_secs: u64,

    /// Seconds an answered challenge may wait for its success message
    pub handshake_timeout_secs: u64,

    /// Most handshakes the answering side keeps in flight at once
    pub max_pending_handshakes: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            kdf: KdfParams::default(),
            session_max_idle_secs: 15 * 60,
            handshake_timeout_secs: 30,
            max_pending_handshakes: 1024,
        }
    }
}

impl CoreConfig {
    /// Parse and validate a JSON document
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: CoreConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize as pretty JSON
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Idle limit as a [`Duration`], see
    /// [`Session::is_expired`](crate::session::Session::is_expired)
    pub fn session_max_idle(&self) -> Duration {
        Duration::from_secs(self.session_max_idle_secs)
    }

    /// Handshake timeout as a [`Duration`]
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_secs(self.handshake_timeout_secs)
    }

    /// Reject values no deployment can use
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: &str| {
            Err(ConfigError::Invalid {
                reason: reason.into(),
            })
        };

        if self.kdf.t_cost == 0 {
            return invalid("kdf.t_cost must be greater than 0");
        }
        if self.kdf.p_cost == 0 {
            return invalid("kdf.p_cost must be greater than 0");
        }
        if self.kdf.m_cost < self.kdf.p_cost.saturating_mul(8) {
            return invalid("kdf.m_cost must be at least 8 * kdf.p_cost");
        }
        if self.session_max_idle_secs == 0 {
            return invalid("session_max_idle_secs must be greater than 0");
        }
        if self.handshake_timeout_secs == 0 {
            return invalid("handshake_timeout_secs must be greater than 0");
        }
        if self.max_pending_handshakes == 0 {
            return invalid("max_pending_handshakes must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = CoreConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.session_max_idle(), Duration::from_secs(900));
        assert_eq!(config.handshake_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn empty_json_is_default() {
        assert_eq!(CoreConfig::from_json("{}").unwrap(), CoreConfig::default());
    }

    #[test]
    fn partial_json_overrides() {
        let config =
            CoreConfig::from_json(r#"{"session_max_idle_secs": 30, "kdf": {"t_cost": 1}}"#)
                .unwrap();
        assert_eq!(config.session_max_idle_secs, 30);
        assert_eq!(config.kdf.t_cost, 1);
        assert_eq!(config.kdf.m_cost, KdfParams::default().m_cost);
    }

    #[test]
    fn json_round_trip() {
        let config = CoreConfig {
            session_max_idle_secs: 42,
            ..CoreConfig::default()
        };
        assert_eq!(CoreConfig::from_json(&config.to_json().unwrap()).unwrap(), config);
    }

    #[test]
    fn rejects_zero_values() {
        for json in [
            r#"{"session_max_idle_secs": 0}"#,
            r#"{"handshake_timeout_secs": 0}"#,
            r#"{"max_pending_handshakes": 0}"#,
            r#"{"kdf": {"t_cost": 0}}"#,
            r#"{"kdf": {"p_cost": 0}}"#,
            r#"{"kdf": {"m_cost": 4, "p_cost": 1}}"#,
        ] {
            assert!(
                matches!(CoreConfig::from_json(json), Err(ConfigError::Invalid { .. })),
                "{json}"
            );
        }
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            CoreConfig::from_json("not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
