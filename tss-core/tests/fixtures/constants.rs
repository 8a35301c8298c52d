#![allow(dead_code)]

pub const TEST_BLOCK_HEIGHT: i64 = 1_024;
pub const TEST_VERSION: &str = "0.14.0";
pub const TEST_POOL_PUB_KEY: &str = "pool0000000000000000000000000000000000000000000000000000000000aa";
pub const TEST_MESSAGE_A: &[u8] = b"transfer 10 to alice";
pub const TEST_MESSAGE_B: &[u8] = b"transfer 20 to bob";

pub const FAST_JOIN_PARTY_TIMEOUT_SECS: u64 = 3;
pub const FAST_RETRY_INTERVAL_MS: u64 = 50;
pub const FAST_SESSION_TIMEOUT_SECS: u64 = 4;
