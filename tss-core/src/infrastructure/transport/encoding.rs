use super::messages::WrappedMessage;
use crate::foundation::{Result, TssError, LENGTH_HEADER_BYTES};
use bincode::Options;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const WIRE_PROTOCOL_VERSION_V1: u16 = 1;

pub fn encode_wrapped(message: &WrappedMessage) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    out.extend_from_slice(&WIRE_PROTOCOL_VERSION_V1.to_le_bytes());
    let bytes =
        bincode::DefaultOptions::new().with_fixint_encoding().serialize(message).map_err(|err| crate::serde_err!("bincode", err))?;
    out.extend_from_slice(&bytes);
    Ok(out)
}

pub fn decode_wrapped(bytes: &[u8]) -> Result<WrappedMessage> {
    if bytes.len() < 2 {
        return Err(TssError::transport("decode", "message too short"));
    }
    let version = u16::from_le_bytes([bytes[0], bytes[1]]);
    if version != WIRE_PROTOCOL_VERSION_V1 {
        return Err(TssError::transport(
            "decode",
            format!("wire protocol version mismatch: expected {WIRE_PROTOCOL_VERSION_V1}, got {version}"),
        ));
    }
    bincode::DefaultOptions::new().with_fixint_encoding().deserialize(&bytes[2..]).map_err(|err| crate::serde_err!("bincode", err))
}

/// Writes a little-endian length header followed by the body.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, body: &[u8], max_payload: usize) -> Result<()> {
    if body.len() > max_payload {
        return Err(TssError::MessageTooLarge { size: body.len(), max: max_payload });
    }
    let length = u32::try_from(body.len()).map_err(|_| TssError::MessageTooLarge { size: body.len(), max: max_payload })?;
    writer.write_all(&length.to_le_bytes()).await.map_err(|err| TssError::transport("write_length", err.to_string()))?;
    writer.write_all(body).await.map_err(|err| TssError::transport("write_payload", err.to_string()))?;
    writer.flush().await.map_err(|err| TssError::transport("flush", err.to_string()))
}

/// Reads one frame, refusing bodies above `max_payload` before allocating them.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R, max_payload: usize) -> Result<Vec<u8>> {
    let mut header = [0u8; LENGTH_HEADER_BYTES];
    reader.read_exact(&mut header).await.map_err(|err| TssError::transport("read_length", err.to_string()))?;
    let length = u32::from_le_bytes(header) as usize;
    if length > max_payload {
        return Err(TssError::MessageTooLarge { size: length, max: max_payload });
    }
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).await.map_err(|err| TssError::transport("read_payload", err.to_string()))?;
    Ok(body)
}
