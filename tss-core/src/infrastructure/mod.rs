//! Infrastructure layer: configuration, logging, transport and key-share storage.

pub mod config;
pub mod logging;
pub mod storage;
pub mod transport;
