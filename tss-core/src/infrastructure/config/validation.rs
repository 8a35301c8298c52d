use crate::infrastructure::config::types::TssConfig;

const MAX_SESSION_TIMEOUT_SECS: u64 = 3_600;

impl TssConfig {
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.party.join_party_timeout_secs == 0 {
            errors.push("party.join_party_timeout_secs must be > 0".to_string());
        }
        if self.party.join_party_retry_interval_ms == 0 {
            errors.push("party.join_party_retry_interval_ms must be > 0".to_string());
        }
        if self.party.join_party_retry_interval_ms >= self.party.join_party_timeout_secs.saturating_mul(1_000) {
            errors.push("party.join_party_retry_interval_ms must be shorter than the join party timeout".to_string());
        }

        for (name, value) in [
            ("session.keygen_timeout_secs", self.session.keygen_timeout_secs),
            ("session.keysign_timeout_secs", self.session.keysign_timeout_secs),
            ("session.regroup_timeout_secs", self.session.regroup_timeout_secs),
        ] {
            if value == 0 {
                errors.push(format!("{name} must be > 0"));
            }
            if value > MAX_SESSION_TIMEOUT_SECS {
                errors.push(format!("{name} should not exceed {MAX_SESSION_TIMEOUT_SECS}"));
            }
        }

        if self.transport.message_timeout_secs == 0 {
            errors.push("transport.message_timeout_secs must be > 0".to_string());
        }
        if self.transport.max_payload_bytes == 0 {
            errors.push("transport.max_payload_bytes must be > 0".to_string());
        }
        if self.transport.publish_retries == 0 {
            errors.push("transport.publish_retries must be > 0".to_string());
        }
        if self.storage.base_dir.trim().is_empty() {
            errors.push("storage.base_dir must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
