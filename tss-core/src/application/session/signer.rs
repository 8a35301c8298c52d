use crate::domain::party::verifying_key_from_hex;
use crate::domain::WireMessage;
use crate::foundation::{Result, SessionId, TssError};
use ed25519_dalek::{Signature as Ed25519Signature, Signer, SigningKey, Verifier};

/// Signs outbound wire messages with the node key and checks inbound ones against the sender's key.
#[derive(Clone)]
pub struct MessageSigner {
    key: SigningKey,
}

impl MessageSigner {
    pub fn new(key: SigningKey) -> Self {
        Self { key }
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.key.verifying_key().as_bytes())
    }

    pub fn sign(&self, message: &mut WireMessage, session_id: &SessionId) {
        let digest = message.signing_digest(session_id);
        message.signature = self.key.sign(&digest).to_bytes().to_vec();
    }

    pub fn verify(message: &WireMessage, session_id: &SessionId, sender_pubkey: &str) -> Result<()> {
        let failed = || TssError::SignatureVerificationFailed { party: message.routing.from.to_string() };
        let key = verifying_key_from_hex(sender_pubkey)?;
        let signature = Ed25519Signature::from_slice(&message.signature).map_err(|_| failed())?;
        key.verify(&message.signing_digest(session_id), &signature).map_err(|_| failed())
    }
}

impl std::fmt::Debug for MessageSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSigner").field("public_key", &self.public_key_hex()).finish()
    }
}
