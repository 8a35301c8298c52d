pub mod encoding;
pub mod signal;
