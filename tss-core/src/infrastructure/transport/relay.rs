use super::messages::WrappedMessage;
use super::traits::Communication;
use crate::foundation::{PeerId, Result, TssError};
use crate::infrastructure::config::TransportConfig;
use log::warn;

/// Broadcasts with bounded retries; each attempt is capped by the per-message deadline.
pub async fn broadcast_with_retry(
    communication: &dyn Communication,
    peers: &[PeerId],
    message: WrappedMessage,
    config: &TransportConfig,
) -> Result<()> {
    if peers.is_empty() {
        return Ok(());
    }
    let attempts = config.publish_retries.max(1);
    let mut last_err = None;
    for attempt in 1..=attempts {
        let outcome = tokio::time::timeout(config.message_timeout(), communication.broadcast(peers, message.clone())).await;
        let err = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(err)) => err,
            Err(_) => TssError::transport("broadcast", format!("timed out after {}s", config.message_timeout_secs)),
        };
        warn!(
            "broadcast attempt failed attempt={} max_attempts={} message_type={} peers={} error={}",
            attempt,
            attempts,
            message.message_type,
            peers.len(),
            err
        );
        last_err = Some(err);
        if attempt < attempts {
            tokio::time::sleep(config.retry_delay()).await;
        }
    }
    Err(last_err.unwrap_or_else(|| TssError::transport("broadcast", "no attempt made")))
}
