//! Binary frame codec for the gateway protocol.
//!
//! Outbound push frames and inbound error frames use fixed big-endian
//! layouts. Encoding doubles as pre-send validation: the token and
//! payload checks here are exactly what the dispatcher runs before it
//! touches the transport, so serialization failures stay terminal while
//! transport failures stay retryable.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use crate::errors::{ApnsError, Result};
use crate::notification::Notification;
use crate::{
    DEVICE_TOKEN_LEN, EXPIRATION_TTL_SECS, GATEWAY_ERROR_COMMAND, GATEWAY_RESPONSE_LEN,
    MAX_PAYLOAD_SIZE, PUSH_COMMAND,
};

/// Decode a 64-character hex device token to its 32 raw bytes
///
/// # Errors
/// `BadDeviceToken` if the string is not valid hex or does not decode to
/// exactly [`DEVICE_TOKEN_LEN`] bytes.
pub fn decode_device_token(token: &str) -> Result<Vec<u8>> {
    let raw = hex::decode(token).map_err(|_| ApnsError::BadDeviceToken)?;
    if raw.len() != DEVICE_TOKEN_LEN {
        return Err(ApnsError::BadDeviceToken);
    }
    Ok(raw)
}

/// Serialize a payload structure to its compact JSON wire form
///
/// # Errors
/// `PayloadEncoding` if serialization fails, `PayloadTooLarge` if the
/// encoded form exceeds [`MAX_PAYLOAD_SIZE`] bytes.
pub fn serialize_payload(payload: &Value) -> Result<Vec<u8>> {
    let encoded = serde_json::to_vec(payload)?;
    if encoded.len() > MAX_PAYLOAD_SIZE {
        return Err(ApnsError::PayloadTooLarge { size: encoded.len() });
    }
    Ok(encoded)
}

/// Encode a notification into a single push frame
///
/// Layout: command (1B) | identifier (4B BE) | expiration (4B BE, unix
/// seconds, now + TTL) | token length (2B BE) | raw token | payload
/// length (2B BE) | JSON payload.
pub fn encode_push(notification: &Notification) -> Result<Vec<u8>> {
    let token = decode_device_token(&notification.device_token)?;
    let payload = serialize_payload(&notification.payload)?;
    let expiration = unix_now().saturating_add(EXPIRATION_TTL_SECS);

    let mut frame = Vec::with_capacity(1 + 4 + 4 + 2 + token.len() + 2 + payload.len());
    frame.push(PUSH_COMMAND);
    frame.extend_from_slice(&notification.identifier().to_be_bytes());
    frame.extend_from_slice(&expiration.to_be_bytes());
    frame.extend_from_slice(&(token.len() as u16).to_be_bytes());
    frame.extend_from_slice(&token);
    frame.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decode a gateway error frame into its status byte and identifier
///
/// The protocol may grow new frame kinds, so an unexpected command byte
/// is logged and tolerated rather than treated as a failure.
pub fn decode_gateway_response(frame: &[u8; GATEWAY_RESPONSE_LEN]) -> (u8, u32) {
    let command = frame[0];
    let status = frame[1];
    let identifier = u32::from_be_bytes([frame[2], frame[3], frame[4], frame[5]]);

    if command != GATEWAY_ERROR_COMMAND {
        log::warn!(
            "unexpected gateway response command {} (status {}, identifier {})",
            command,
            status,
            identifier
        );
    }

    (status, identifier)
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as u32
}
