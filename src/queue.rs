//! Dispatch queue and feedback reconciliation.
//!
//! `PushQueue` is the public client surface. Internally it runs two
//! long-lived tasks: a dispatcher that serializes every send over the
//! shared connection, and a feedback listener that drains the gateway's
//! asynchronous error frames and attributes them back to tracked
//! notifications. Retries are ephemeral timer tasks that re-enter the
//! dispatcher through a dedicated lane, so the connection never has more
//! than one writer.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncReadExt;
use tokio::sync::mpsc;

use crate::codec;
use crate::connection::{ConnectionManager, Environment, FeedbackReader, Identity};
use crate::errors::{ApnsError, RemoteStatus, Result};
use crate::notification::Notification;
use crate::tracking::{CorrelationTable, IdentifierGenerator};
use crate::{
    FAILURE_QUEUE_CAPACITY, GATEWAY_RESPONSE_LEN, MAX_RETRY_ATTEMPTS, RETRY_DELAY_MS,
    SUBMIT_QUEUE_CAPACITY,
};

/// Tunable queue parameters
///
/// The defaults match the protocol contract; tests and unusual
/// deployments override individual knobs through the `with_*` methods.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    retry_limit: u32,
    retry_delay: Duration,
    submit_capacity: usize,
    failure_capacity: usize,
    gateway_addr: Option<String>,
}

impl QueueConfig {
    pub fn new() -> Self {
        Self {
            retry_limit: MAX_RETRY_ATTEMPTS,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            submit_capacity: SUBMIT_QUEUE_CAPACITY,
            failure_capacity: FAILURE_QUEUE_CAPACITY,
            gateway_addr: None,
        }
    }

    /// Extra delivery attempts after the first transport failure
    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Delay before a failed send re-enters the write path
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Capacity of the bounded submission queue
    pub fn with_submit_capacity(mut self, capacity: usize) -> Self {
        self.submit_capacity = capacity;
        self
    }

    /// Capacity of the bounded failure output queue
    pub fn with_failure_capacity(mut self, capacity: usize) -> Self {
        self.failure_capacity = capacity;
        self
    }

    /// Override the environment's well-known gateway address
    pub fn with_gateway_addr(mut self, addr: impl Into<String>) -> Self {
        self.gateway_addr = Some(addr.into());
        self
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// A push dispatch queue bound to one environment and one gateway
/// connection
///
/// Submissions flow through a bounded channel into the dispatcher task;
/// every terminal failure (local validation, exhausted retries, or a
/// gateway-reported error) comes back on the bounded failure queue with
/// the error attached. The gateway is silent on success, so absence of a
/// failure report is the only success signal.
///
/// Must be created inside a Tokio runtime; the internal tasks are spawned
/// on it.
pub struct PushQueue {
    env: Environment,
    submit_tx: mpsc::Sender<Notification>,
    failure_rx: Option<mpsc::Receiver<Notification>>,
    table: Arc<CorrelationTable>,
}

impl PushQueue {
    /// Create a queue with default configuration
    ///
    /// `identity` may be `None` only in the test environment.
    pub fn new(env: Environment, identity: Option<Identity>) -> Result<Self> {
        Self::with_config(env, identity, QueueConfig::default())
    }

    /// Create a queue with explicit configuration
    pub fn with_config(
        env: Environment,
        identity: Option<Identity>,
        config: QueueConfig,
    ) -> Result<Self> {
        let (submit_tx, submit_rx) = mpsc::channel(config.submit_capacity);
        let (failure_tx, failure_rx) = mpsc::channel(config.failure_capacity);
        let (retry_tx, retry_rx) = mpsc::unbounded_channel();
        let (reader_tx, reader_rx) = mpsc::unbounded_channel();

        let connection = ConnectionManager::new(env, identity, config.gateway_addr, reader_tx)?;
        let table = Arc::new(CorrelationTable::new());

        let dispatcher = Dispatcher {
            submit_rx,
            retry_rx,
            retry_tx,
            failure_tx: failure_tx.clone(),
            connection,
            identifiers: IdentifierGenerator::new(),
            table: Arc::clone(&table),
            retry_limit: config.retry_limit,
            retry_delay: config.retry_delay,
            pending_retries: 0,
        };
        tokio::spawn(dispatcher.run());

        let listener = FeedbackListener {
            reader_rx,
            failure_tx,
            table: Arc::clone(&table),
        };
        tokio::spawn(listener.run());

        Ok(Self {
            env,
            submit_tx,
            failure_rx: Some(failure_rx),
            table,
        })
    }

    /// The environment this queue dispatches into
    pub fn env(&self) -> Environment {
        self.env
    }

    /// Clone of the bounded submission sender
    ///
    /// Sending blocks when the queue is at capacity; a slow transport
    /// throttles the caller by design.
    pub fn sender(&self) -> mpsc::Sender<Notification> {
        self.submit_tx.clone()
    }

    /// Submit a notification for dispatch
    pub async fn submit(&self, notification: Notification) -> Result<()> {
        self.submit_tx
            .send(notification)
            .await
            .map_err(|_| ApnsError::QueueClosed)
    }

    /// Take the failure output queue; yields `Some` exactly once
    ///
    /// The channel is small and blocks the publisher when full, so the
    /// receiver must be drained promptly.
    pub fn take_failures(&mut self) -> Option<mpsc::Receiver<Notification>> {
        self.failure_rx.take()
    }

    /// Snapshot the tracked notification for an identifier, if any
    pub fn tracked(&self, identifier: u32) -> Option<Notification> {
        self.table.get(identifier)
    }
}

/// The single serialization point for all sends
///
/// Identifier assignment, validation and transport writes all happen on
/// this one task, so submissions hit the wire in strict order. Retries
/// re-enter through their own lane, consumed with priority before fresh
/// submissions.
struct Dispatcher {
    submit_rx: mpsc::Receiver<Notification>,
    retry_rx: mpsc::UnboundedReceiver<Notification>,
    retry_tx: mpsc::UnboundedSender<Notification>,
    failure_tx: mpsc::Sender<Notification>,
    connection: ConnectionManager,
    identifiers: IdentifierGenerator,
    table: Arc<CorrelationTable>,
    retry_limit: u32,
    retry_delay: Duration,
    pending_retries: usize,
}

impl Dispatcher {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                retry = self.retry_rx.recv() => {
                    if let Some(notification) = retry {
                        self.pending_retries -= 1;
                        self.dispatch(notification, true).await;
                    }
                }
                submitted = self.submit_rx.recv() => {
                    match submitted {
                        Some(notification) => self.dispatch(notification, false).await,
                        None => break,
                    }
                }
            }
        }

        // Submission side is gone; serve the retries still in flight
        // before exiting.
        while self.pending_retries > 0 {
            match self.retry_rx.recv().await {
                Some(notification) => {
                    self.pending_retries -= 1;
                    self.dispatch(notification, true).await;
                }
                None => break,
            }
        }
        log::debug!("dispatcher shut down");
    }

    async fn dispatch(&mut self, mut notification: Notification, is_retry: bool) {
        if !is_retry {
            notification.assign_identifier(self.identifiers.next());

            // Terminal before any transport attempt.
            if let Err(error) = notification.validate() {
                notification.mark_invalid(error);
                self.publish_failure(notification).await;
                return;
            }
        }

        let frame = match codec::encode_push(&notification) {
            Ok(frame) => frame,
            Err(error) => {
                notification.mark_invalid(error);
                self.publish_failure(notification).await;
                return;
            }
        };

        match self.connection.write_frame(&frame).await {
            Ok(()) => {
                notification.mark_sent();
                self.table.insert(notification);
            }
            Err(error) => {
                self.connection.close();
                if notification.should_retry(self.retry_limit) {
                    log::debug!(
                        "send failed for identifier {} ({}); retrying in {:?}",
                        notification.identifier(),
                        error,
                        self.retry_delay
                    );
                    notification.record_attempt();
                    self.schedule_retry(notification);
                } else {
                    log::warn!(
                        "send failed for identifier {} after {} retries: {}",
                        notification.identifier(),
                        notification.attempts(),
                        error
                    );
                    notification.mark_failed(ApnsError::RefusedByGateway);
                    self.publish_failure(notification).await;
                }
            }
        }
    }

    fn schedule_retry(&mut self, notification: Notification) {
        self.pending_retries += 1;
        let retry_tx = self.retry_tx.clone();
        let delay = self.retry_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Dispatcher outlives every retry timer it spawned.
            let _ = retry_tx.send(notification);
        });
    }

    async fn publish_failure(&self, notification: Notification) {
        if self.failure_tx.send(notification).await.is_err() {
            log::warn!("failure queue receiver dropped; discarding failed notification");
        }
    }
}

/// Drains gateway error frames and attributes them to tracked
/// notifications
///
/// Blocks on the inbound half of whatever connection is current; a read
/// failure just means the connection went away, so the listener drops the
/// reader and waits for the next one. A redial can happen while the old
/// read half is still open (teardown only drops the write half), so a
/// newly arriving reader preempts the current one. The test environment
/// never produces a reader, making this a silent no-op there.
struct FeedbackListener {
    reader_rx: mpsc::UnboundedReceiver<FeedbackReader>,
    failure_tx: mpsc::Sender<Notification>,
    table: Arc<CorrelationTable>,
}

impl FeedbackListener {
    async fn run(mut self) {
        let mut current: Option<FeedbackReader> = None;
        loop {
            let Some(mut reader) = current.take() else {
                match self.reader_rx.recv().await {
                    Some(reader) => current = Some(reader),
                    None => break,
                }
                continue;
            };

            let mut frame = [0u8; GATEWAY_RESPONSE_LEN];
            tokio::select! {
                replacement = self.reader_rx.recv() => match replacement {
                    // The connection was redialed; the half-open reader
                    // still in hand is stale.
                    Some(next) => current = Some(next),
                    None => break,
                },
                read = reader.read_exact(&mut frame) => match read {
                    Ok(_) => {
                        self.handle_frame(&frame).await;
                        current = Some(reader);
                    }
                    Err(e) => log::debug!("gateway feedback stream ended: {}", e),
                },
            }
        }
        log::debug!("feedback listener shut down");
    }

    async fn handle_frame(&self, frame: &[u8; GATEWAY_RESPONSE_LEN]) {
        let (status, identifier) = codec::decode_gateway_response(frame);

        // Zero is "no error"; nothing to attribute.
        let Some(status) = RemoteStatus::from_status(status) else {
            return;
        };

        let Some(mut notification) = self.table.take(identifier) else {
            log::debug!(
                "gateway reported status {} for untracked identifier {}; dropping",
                status.code(),
                identifier
            );
            return;
        };

        notification.mark_failed(ApnsError::Remote(status));
        if self.failure_tx.send(notification).await.is_err() {
            log::warn!("failure queue receiver dropped; discarding gateway report");
        }
    }
}
