//! apns_core - Asynchronous client core for the Apple push notification
//! binary gateway protocol.
//!
//! This library implements the dispatch-and-reconciliation engine for
//! fire-and-forget push delivery: a bounded submission queue feeding a
//! single persistent TLS connection, a binary frame codec, an identifier
//! correlation table, and a feedback listener that reconciles the
//! gateway's asynchronous error frames back to the originating
//! notification.
//!
//! # Design principles
//! - One connection, one writer: all sends are serialized by a single
//!   dispatcher task
//! - Best-effort delivery: the gateway is silent on success and only
//!   reports errors, so absence of a failure report is the success signal
//! - Bounded queues everywhere: a slow transport throttles the caller
//!   instead of growing memory without limit

pub mod codec;
pub mod connection;
pub mod errors;
pub mod notification;
pub mod queue;
pub mod tracking;

pub use connection::{Environment, Identity};
pub use errors::{ApnsError, RemoteStatus, Result};
pub use notification::{Notification, Outcome};
pub use queue::{PushQueue, QueueConfig};

/// Command byte for an outbound push frame
pub const PUSH_COMMAND: u8 = 1;

/// Command byte the gateway uses for asynchronous error frames
pub const GATEWAY_ERROR_COMMAND: u8 = 8;

/// Size of a gateway error frame: command + status + identifier
pub const GATEWAY_RESPONSE_LEN: usize = 6;

/// Device token length in raw bytes (64 hex characters as submitted)
pub const DEVICE_TOKEN_LEN: usize = 32;

/// Maximum serialized payload size (in bytes) accepted by the gateway
pub const MAX_PAYLOAD_SIZE: usize = 255;

/// Seconds the gateway may hold a notification before discarding it
pub const EXPIRATION_TTL_SECS: u32 = 3600;

/// Extra delivery attempts after the first transport failure
pub const MAX_RETRY_ATTEMPTS: u32 = 2;

/// Default delay between retry attempts in milliseconds
pub const RETRY_DELAY_MS: u64 = 2000;

/// Default capacity of the submission queue
pub const SUBMIT_QUEUE_CAPACITY: usize = 1000;

/// Default capacity of the failure output queue
pub const FAILURE_QUEUE_CAPACITY: usize = 10;

/// Low bound of the identifier range (0 is reserved so an empty
/// correlation slot is distinguishable from an in-flight notification)
pub const IDENTIFIER_MIN: u32 = 1;

/// High bound of the identifier range; the generator wraps back to
/// `IDENTIFIER_MIN` past this value
pub const IDENTIFIER_MAX: u32 = 999;
