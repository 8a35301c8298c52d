use crate::domain::request::Signature;
use crate::domain::round::Algorithm;
use crate::foundation::util::encoding::encode_base64;
use crate::foundation::{Result, TssError};

/// Checks that the signatures an engine hands back cover exactly the requested messages.
#[derive(Clone, Debug)]
pub struct SignatureNotifier {
    message_id: String,
    messages: Vec<Vec<u8>>,
    pool_pub_key: String,
    algo: Algorithm,
}

impl SignatureNotifier {
    pub fn new(
        message_id: impl Into<String>,
        messages: Vec<Vec<u8>>,
        pool_pub_key: impl Into<String>,
        algo: Algorithm,
    ) -> Result<Self> {
        let message_id = message_id.into();
        let pool_pub_key = pool_pub_key.into();
        if message_id.is_empty() {
            return Err(TssError::InvalidRequest("message id is empty".to_string()));
        }
        if messages.is_empty() {
            return Err(TssError::InvalidRequest("messages is empty".to_string()));
        }
        if pool_pub_key.is_empty() {
            return Err(TssError::InvalidRequest("pool pubkey is empty".to_string()));
        }
        Ok(Self { message_id, messages, pool_pub_key, algo })
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn algo(&self) -> Algorithm {
        self.algo
    }

    pub fn pool_pub_key(&self) -> &str {
        &self.pool_pub_key
    }

    /// Returns `Ok(true)` when every message has exactly one non-empty signature.
    pub fn process_signatures(&self, signatures: &[Signature]) -> Result<bool> {
        if signatures.len() != self.messages.len() {
            return Err(TssError::InvalidRequest(format!(
                "signature count mismatch: got {} expected {}",
                signatures.len(),
                self.messages.len()
            )));
        }
        for (message, signature) in self.messages.iter().zip(signatures) {
            if signature.msg != encode_base64(message) {
                return Err(TssError::InvalidRequest(format!("signature for unexpected message {}", signature.msg)));
            }
            if signature.signature.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }
}
