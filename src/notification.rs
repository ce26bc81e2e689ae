//! Notification data model.
//!
//! A `Notification` is created by the caller with a device token and a
//! JSON payload, then mutated exclusively by the dispatch pipeline:
//! identifier assignment and attempt counting by the dispatcher, outcome
//! and error by the connection and feedback paths. Once a terminal
//! outcome is set the notification is never re-dispatched.

use serde_json::Value;

use crate::codec;
use crate::errors::{ApnsError, Result};

/// Delivery outcome of a notification
///
/// `Sent`, `Invalid` and `Failed` are terminal: a notification in one of
/// these states is never retried or re-dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Submitted but not yet through the write path
    Pending,
    /// Written to the gateway; may still fail asynchronously
    Sent,
    /// Rejected by local pre-send validation
    Invalid,
    /// Transport retries exhausted, or an error was reported back by the
    /// gateway
    Failed,
}

/// A request to deliver a payload to a device
///
/// The payload is an arbitrarily nested key-value structure; it must
/// serialize to at most [`crate::MAX_PAYLOAD_SIZE`] bytes of JSON. The
/// device token is the 64-character hex form handed out by the device.
#[derive(Debug, Clone)]
pub struct Notification {
    /// 64 hex characters, decoding to 32 raw bytes on the wire
    pub device_token: String,

    /// Nested key-value payload, serialized to compact JSON for transport
    pub payload: Value,

    identifier: u32,
    attempts: u32,
    outcome: Outcome,
    error: Option<ApnsError>,
}

impl Notification {
    /// Create a notification for the given device token and payload
    pub fn new(device_token: impl Into<String>, payload: Value) -> Self {
        Self {
            device_token: device_token.into(),
            payload,
            identifier: 0,
            attempts: 0,
            outcome: Outcome::Pending,
            error: None,
        }
    }

    /// Identifier assigned by the dispatcher; 0 until dispatched
    pub fn identifier(&self) -> u32 {
        self.identifier
    }

    /// Number of transport attempts beyond the first
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Current delivery outcome
    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// The terminal error, if one has been attached
    pub fn error(&self) -> Option<&ApnsError> {
        self.error.as_ref()
    }

    /// Whether a terminal outcome has been reached
    pub fn is_terminal(&self) -> bool {
        self.outcome != Outcome::Pending
    }

    /// Run the codec's pre-send checks without touching the transport
    ///
    /// These are the same checks the encoder performs; running them up
    /// front lets the dispatcher distinguish terminal validation failures
    /// from retryable transport failures.
    pub fn validate(&self) -> Result<()> {
        codec::decode_device_token(&self.device_token)?;
        codec::serialize_payload(&self.payload)?;
        Ok(())
    }

    pub(crate) fn assign_identifier(&mut self, identifier: u32) {
        self.identifier = identifier;
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempts += 1;
    }

    /// True while the retry budget is not exhausted and no terminal
    /// outcome has been set
    pub(crate) fn should_retry(&self, limit: u32) -> bool {
        self.attempts < limit && !self.is_terminal()
    }

    pub(crate) fn mark_sent(&mut self) {
        self.outcome = Outcome::Sent;
    }

    pub(crate) fn mark_invalid(&mut self, error: ApnsError) {
        self.outcome = Outcome::Invalid;
        self.error = Some(error);
    }

    pub(crate) fn mark_failed(&mut self, error: ApnsError) {
        self.outcome = Outcome::Failed;
        self.error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TEST_TOKEN: &str = "bedb115e0f9afef1bbc49eb03cd789365956aa4bef1f6229f504541f8e2dfdca";

    fn test_payload() -> Value {
        json!({
            "aps": {
                "alert": "You've got emails.",
                "badge": 9,
                "sound": "bingbong.aiff",
            },
            "foo": "bar",
            "answer": 42,
        })
    }

    #[test]
    fn test_valid_notification_passes_validation() {
        let notification = Notification::new(TEST_TOKEN, test_payload());
        assert!(notification.validate().is_ok());
        assert_eq!(notification.outcome(), Outcome::Pending);
        assert_eq!(notification.identifier(), 0);
    }

    #[test]
    fn test_short_token_fails_validation() {
        let notification = Notification::new("bedb115e", test_payload());
        assert_eq!(notification.validate(), Err(ApnsError::BadDeviceToken));
    }

    #[test]
    fn test_non_hex_token_fails_validation() {
        let token = "z".repeat(64);
        let notification = Notification::new(token, test_payload());
        assert_eq!(notification.validate(), Err(ApnsError::BadDeviceToken));
    }

    #[test]
    fn test_oversize_payload_fails_validation() {
        let notification = Notification::new(TEST_TOKEN, json!({ "pad": "x".repeat(300) }));
        match notification.validate() {
            Err(ApnsError::PayloadTooLarge { size }) => assert!(size > crate::MAX_PAYLOAD_SIZE),
            other => panic!("expected PayloadTooLarge, got {:?}", other),
        }
    }

    #[test]
    fn test_retry_budget() {
        let mut notification = Notification::new(TEST_TOKEN, test_payload());
        assert!(notification.should_retry(crate::MAX_RETRY_ATTEMPTS));

        notification.record_attempt();
        notification.record_attempt();
        assert_eq!(notification.attempts(), 2);
        assert!(!notification.should_retry(crate::MAX_RETRY_ATTEMPTS));
    }

    #[test]
    fn test_terminal_outcome_blocks_retry() {
        let mut notification = Notification::new(TEST_TOKEN, test_payload());
        notification.mark_invalid(ApnsError::BadDeviceToken);
        assert!(notification.is_terminal());
        assert!(!notification.should_retry(crate::MAX_RETRY_ATTEMPTS));
        assert_eq!(notification.error(), Some(&ApnsError::BadDeviceToken));
    }
}
