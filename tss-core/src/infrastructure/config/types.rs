use crate::domain::Operation;
use crate::foundation::constants::*;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TssConfig {
    #[serde(default)]
    pub party: PartyConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Join-party tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartyConfig {
    pub join_party_timeout_secs: u64,
    pub join_party_retry_interval_ms: u64,
    /// Mixed into the leader score so deployments can rotate leaders.
    pub leader_salt: String,
}

impl Default for PartyConfig {
    fn default() -> Self {
        Self {
            join_party_timeout_secs: JOIN_PARTY_TIMEOUT_SECS,
            join_party_retry_interval_ms: JOIN_PARTY_RETRY_INTERVAL_MS,
            leader_salt: String::new(),
        }
    }
}

impl PartyConfig {
    pub fn join_party_timeout(&self) -> Duration {
        Duration::from_secs(self.join_party_timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.join_party_retry_interval_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub keygen_timeout_secs: u64,
    pub keysign_timeout_secs: u64,
    pub regroup_timeout_secs: u64,
    /// Budget handed to engines that generate pre-parameters before round one.
    pub pre_param_timeout_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            keygen_timeout_secs: KEYGEN_TIMEOUT_SECS,
            keysign_timeout_secs: KEYSIGN_TIMEOUT_SECS,
            regroup_timeout_secs: REGROUP_TIMEOUT_SECS,
            pre_param_timeout_secs: PRE_PARAM_TIMEOUT_SECS,
        }
    }
}

impl SessionConfig {
    pub fn timeout_for(&self, operation: Operation) -> Duration {
        Duration::from_secs(match operation {
            Operation::Keygen => self.keygen_timeout_secs,
            Operation::Keysign => self.keysign_timeout_secs,
            Operation::Regroup => self.regroup_timeout_secs,
        })
    }

    pub fn pre_param_timeout(&self) -> Duration {
        Duration::from_secs(self.pre_param_timeout_secs)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub message_timeout_secs: u64,
    pub max_payload_bytes: usize,
    pub publish_retries: u32,
    pub publish_retry_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            message_timeout_secs: MESSAGE_TIMEOUT_SECS,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
            publish_retries: PUBLISH_RETRIES,
            publish_retry_delay_ms: PUBLISH_RETRY_DELAY_MS,
        }
    }
}

impl TransportConfig {
    pub fn message_timeout(&self) -> Duration {
        Duration::from_secs(self.message_timeout_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.publish_retry_delay_ms)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub base_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { base_dir: ".tss".to_string() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub filters: String,
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filters: "info".to_string(), log_dir: None }
    }
}
