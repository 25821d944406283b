//! Framing codecs for the two protocol phases.
//!
//! [`StartupCodec`] decodes the untagged startup-phase frames by structural
//! matching; [`PostgresCodec`] dispatches query-phase frames through the
//! header-byte registry. Both encode [`BackendMessage`]s through their
//! descriptors.
//!
//! `PostgresCodec` yields one `Vec<FrontendMessage>` per decode: every
//! complete frame already buffered is drained into a single batch, so the
//! session can honor per-batch semantics (exactly one `ReadyForQuery` at
//! the end of each batch).

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::protocol::ProtocolError;
use crate::protocol::backend::BackendMessage;
use crate::protocol::frontend::{self, FrontendMessage, InitialMessage};
use crate::protocol::wire::DEFAULT_MAX_MESSAGE_SIZE;

/// Startup-phase frames are small; anything larger is malformed.
const MAX_STARTUP_MESSAGE_SIZE: i32 = 10000;

fn encode_backend(msg: BackendMessage, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    let bytes = msg.to_format()?.encode()?;
    dst.extend_from_slice(&bytes);
    Ok(())
}

/// Codec for the startup phase of the PostgreSQL protocol.
///
/// Startup frames carry no header byte: `[Int32 length][payload]`. The
/// payload is matched structurally against the candidate set
/// {StartupMessage, SSLRequest, GSSENCRequest}.
pub struct StartupCodec;

impl StartupCodec {
    pub fn new() -> Self {
        StartupCodec
    }

    /// Transitions to the query-phase codec after successful startup.
    pub fn ready(self) -> PostgresCodec {
        PostgresCodec::new()
    }
}

impl Default for StartupCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for StartupCodec {
    type Item = InitialMessage;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<InitialMessage>, ProtocolError> {
        if src.len() < 4 {
            return Ok(None);
        }
        let length = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        if !(8..=MAX_STARTUP_MESSAGE_SIZE).contains(&length) {
            return Err(ProtocolError::InvalidMessage);
        }
        let total = length as usize;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        src.advance(4);
        let payload = src.split_to(total - 4);
        Ok(Some(InitialMessage::decode(&payload)?))
    }
}

impl Encoder<BackendMessage> for StartupCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: BackendMessage, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        encode_backend(msg, dst)
    }
}

/// Codec for the query phase of the PostgreSQL protocol.
pub struct PostgresCodec {
    max_message_size: usize,
}

impl PostgresCodec {
    pub fn new() -> Self {
        PostgresCodec {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

impl Default for PostgresCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for PostgresCodec {
    type Item = Vec<FrontendMessage>;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Vec<FrontendMessage>>, ProtocolError> {
        let mut batch = Vec::new();
        loop {
            if src.len() < 5 {
                break;
            }
            let header = src[0];
            let length = i32::from_be_bytes([src[1], src[2], src[3], src[4]]);
            if length < 4 {
                return Err(ProtocolError::InvalidMessage);
            }
            let total = 1 + length as usize;
            if total > self.max_message_size {
                return Err(ProtocolError::MessageTooLarge(total));
            }
            if src.len() < total {
                src.reserve(total - src.len());
                break;
            }

            let Some(entry) = frontend::registered(header) else {
                return Err(ProtocolError::UnknownMessageType(header));
            };
            src.advance(5);
            let mut payload = src.split_to(length as usize - 4);
            let format = entry.format.decode_body(&mut payload)?;
            batch.push((entry.decode)(&format)?);
        }

        if batch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(batch))
        }
    }
}

impl Encoder<BackendMessage> for PostgresCodec {
    type Error = ProtocolError;

    fn encode(&mut self, msg: BackendMessage, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        encode_backend(msg, dst)
    }
}
