//! Error types for gateway client operations.
//!
//! The taxonomy mirrors the protocol's failure model: local validation
//! errors are terminal before any transport attempt, transport errors are
//! retryable up to a fixed budget, and remote-reported errors arrive
//! asynchronously on the feedback path.

use std::fmt;
use std::io;

/// Result type alias for gateway client operations
pub type Result<T> = std::result::Result<T, ApnsError>;

/// Gateway client error enumeration
///
/// Covers all failure modes in the dispatch pipeline:
/// - Pre-send validation failures (terminal, never retried)
/// - Transport failures (retryable until the attempt budget is spent)
/// - Errors reported asynchronously by the gateway
/// - Client construction and shutdown conditions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApnsError {
    /// Device token is not 64 hex characters decoding to 32 bytes
    BadDeviceToken,

    /// Payload could not be serialized to JSON
    PayloadEncoding(String),

    /// Serialized payload exceeds the 255-byte gateway limit
    PayloadTooLarge { size: usize },

    /// A non-test environment was selected without credential material
    MissingCredentials,

    /// Credential material was rejected while building the TLS client
    InvalidCredentials(String),

    /// Connect, handshake or write failure; retryable
    Transport(String),

    /// Retry budget exhausted. The gateway tears the connection down when
    /// it rejects a notification, so on this path a remote rejection is
    /// indistinguishable from a plain network failure.
    RefusedByGateway,

    /// Error reported asynchronously by the gateway for a tracked
    /// notification
    Remote(RemoteStatus),

    /// The queue has shut down and no longer accepts submissions
    QueueClosed,
}

impl ApnsError {
    /// Whether the dispatcher may retry the send that produced this error
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl fmt::Display for ApnsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadDeviceToken => {
                write!(f, "device token is not a valid 64-character hex token")
            }
            Self::PayloadEncoding(msg) => write!(f, "payload cannot be encoded: {}", msg),
            Self::PayloadTooLarge { size } => {
                write!(
                    f,
                    "payload size {} exceeds limit ({} bytes)",
                    size,
                    crate::MAX_PAYLOAD_SIZE
                )
            }
            Self::MissingCredentials => {
                write!(f, "certificate and key are required outside the test environment")
            }
            Self::InvalidCredentials(msg) => write!(f, "invalid credentials: {}", msg),
            Self::Transport(msg) => write!(f, "transport error: {}", msg),
            Self::RefusedByGateway => {
                write!(
                    f,
                    "notification could not be delivered after retries (may be a connection error)"
                )
            }
            Self::Remote(status) => {
                write!(f, "push service error: {} ({})", status, status.code())
            }
            Self::QueueClosed => write!(f, "queue is closed"),
        }
    }
}

impl std::error::Error for ApnsError {}

impl From<io::Error> for ApnsError {
    fn from(err: io::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ApnsError {
    fn from(err: serde_json::Error) -> Self {
        Self::PayloadEncoding(err.to_string())
    }
}

/// Status codes carried by the gateway's asynchronous error frames
///
/// A status byte of zero means "no error" and never constructs a
/// `RemoteStatus`; any code outside the documented 1-8 range (255
/// included) maps to `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteStatus {
    Processing,
    MissingDeviceToken,
    MissingTopic,
    MissingPayload,
    InvalidTokenSize,
    InvalidTopicSize,
    InvalidPayloadSize,
    InvalidToken,
    Unknown(u8),
}

impl RemoteStatus {
    /// Map a raw status byte to a status, or `None` for the zero
    /// "no error" code
    pub fn from_status(code: u8) -> Option<Self> {
        match code {
            0 => None,
            1 => Some(Self::Processing),
            2 => Some(Self::MissingDeviceToken),
            3 => Some(Self::MissingTopic),
            4 => Some(Self::MissingPayload),
            5 => Some(Self::InvalidTokenSize),
            6 => Some(Self::InvalidTopicSize),
            7 => Some(Self::InvalidPayloadSize),
            8 => Some(Self::InvalidToken),
            other => Some(Self::Unknown(other)),
        }
    }

    /// The raw wire code for this status
    pub fn code(&self) -> u8 {
        match self {
            Self::Processing => 1,
            Self::MissingDeviceToken => 2,
            Self::MissingTopic => 3,
            Self::MissingPayload => 4,
            Self::InvalidTokenSize => 5,
            Self::InvalidTopicSize => 6,
            Self::InvalidPayloadSize => 7,
            Self::InvalidToken => 8,
            Self::Unknown(code) => *code,
        }
    }
}

impl fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::Processing => "Processing error",
            Self::MissingDeviceToken => "Missing device token",
            Self::MissingTopic => "Missing topic",
            Self::MissingPayload => "Missing payload",
            Self::InvalidTokenSize => "Invalid token size",
            Self::InvalidTopicSize => "Invalid topic size",
            Self::InvalidPayloadSize => "Invalid payload size",
            Self::InvalidToken => "Invalid token",
            Self::Unknown(_) => "None (unknown)",
        };
        f.write_str(msg)
    }
}
