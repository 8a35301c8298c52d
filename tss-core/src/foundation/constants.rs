/// Maximum encoded frame body accepted from the wire (80 KiB).
pub const MAX_PAYLOAD_BYTES: usize = 81_920;

/// Size of the little-endian length header that prefixes every frame.
pub const LENGTH_HEADER_BYTES: usize = 4;

/// Per-message read/write deadline.
pub const MESSAGE_TIMEOUT_SECS: u64 = 10;

/// Publish attempts before a broadcast is reported as failed.
pub const PUBLISH_RETRIES: u32 = 3;
pub const PUBLISH_RETRY_DELAY_MS: u64 = 200;

/// Join-party defaults.
pub const JOIN_PARTY_TIMEOUT_SECS: u64 = 30;
pub const JOIN_PARTY_RETRY_INTERVAL_MS: u64 = 500;

/// Overall session deadlines.
pub const KEYGEN_TIMEOUT_SECS: u64 = 120;
pub const KEYSIGN_TIMEOUT_SECS: u64 = 60;
pub const REGROUP_TIMEOUT_SECS: u64 = 120;
pub const PRE_PARAM_TIMEOUT_SECS: u64 = 300;

/// Capacity of a session mailbox; deliveries beyond it are dropped and logged.
pub const MAILBOX_CAPACITY: usize = 1024;

/// Domain separators for blake3 derivations.
pub const LEADER_SCORE_DOMAIN: &[u8] = b"tss/leader/v1";
pub const PEER_ID_DOMAIN: &[u8] = b"tss/peer-id/v1";
pub const SESSION_ID_DOMAIN: &[u8] = b"tss/session/v1";
