//! JSON and CBOR encodings for protocol messages.
//!
//! JSON uses the camelCase field names of the wire shapes. CBOR carries the
//! same serde structure. Binary frames prefix the CBOR body with the
//! protocol version and the message type code:
//!
//! ```text
//! | version (u8) | type (u8) | CBOR body |
//! ```

use crate::error::{ProtocolError, ProtocolResult};
use crate::messages::{ProcessSyncChunkResult, RequestSyncChunkArgs, SyncChunk, SyncMessage};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Protocol version written into binary frames.
pub const PROTOCOL_VERSION: u8 = 1;

/// Encodings shared by every protocol message.
pub trait WireFormat: Serialize + DeserializeOwned {
    /// Encodes to JSON.
    fn to_json(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes from JSON.
    fn from_json(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Encodes to CBOR.
    fn to_cbor(&self) -> ProtocolResult<Vec<u8>> {
        let mut out = Vec::new();
        ciborium::into_writer(self, &mut out)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(out)
    }

    /// Decodes from CBOR.
    fn from_cbor(bytes: &[u8]) -> ProtocolResult<Self> {
        ciborium::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
    }
}

impl WireFormat for RequestSyncChunkArgs {}
impl WireFormat for SyncChunk {}
impl WireFormat for ProcessSyncChunkResult {}
impl WireFormat for SyncMessage {}

impl SyncMessage {
    /// Encodes a binary frame.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        let body = self.to_cbor()?;
        let mut frame = Vec::with_capacity(body.len() + 2);
        frame.push(PROTOCOL_VERSION);
        frame.push(self.type_code());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Decodes a binary frame.
    pub fn decode(frame: &[u8]) -> ProtocolResult<Self> {
        let [version, code, body @ ..] = frame else {
            return Err(ProtocolError::Truncated);
        };
        if *version != PROTOCOL_VERSION {
            return Err(ProtocolError::VersionMismatch {
                expected: PROTOCOL_VERSION,
                actual: *version,
            });
        }
        if !(1..=4).contains(code) {
            return Err(ProtocolError::UnknownMessageType(*code));
        }
        let message = Self::from_cbor(body)?;
        if message.type_code() != *code {
            return Err(ProtocolError::UnknownMessageType(*code));
        }
        Ok(message)
    }
}
