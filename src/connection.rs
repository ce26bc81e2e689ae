//! Environment selection, TLS identity and the persistent gateway
//! connection.
//!
//! The connection is exclusively owned by the `ConnectionManager`: it is
//! established lazily on first use, torn down on any transport error and
//! re-dialed on demand. The inbound half of each freshly established
//! stream is handed off to the feedback listener, which is the only
//! reader.

use std::sync::Arc;

use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio::io::{self, AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::TlsConnector;

use crate::errors::{ApnsError, Result};

/// Named deployment target selecting the gateway host and offline
/// behavior
///
/// `Test` short-circuits all network activity so the dispatch pipeline
/// can be exercised deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Test,
    Sandbox,
    Production,
}

impl Environment {
    /// Well-known gateway `host:port` for this environment, if any
    pub fn gateway_host(&self) -> Option<&'static str> {
        match self {
            Self::Test => None,
            Self::Sandbox => Some("gateway.sandbox.push.apple.com:2195"),
            Self::Production => Some("gateway.push.apple.com:2195"),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Test => "test",
            Self::Sandbox => "sandbox",
            Self::Production => "production",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, String> {
        match s {
            "test" => Ok(Self::Test),
            "sandbox" => Ok(Self::Sandbox),
            "production" => Ok(Self::Production),
            other => Err(format!("unknown environment: {}", other)),
        }
    }
}

/// Client TLS identity: the certificate chain and private key presented
/// to the gateway during the handshake
///
/// Loading PEM files and other credential handling is the caller's
/// concern; this type consumes opaque DER material.
#[derive(Clone)]
pub struct Identity {
    config: Arc<rustls::ClientConfig>,
}

impl Identity {
    /// Build an identity from a DER certificate chain and a DER private
    /// key (PKCS#8, PKCS#1 or SEC1)
    ///
    /// # Errors
    /// `InvalidCredentials` if the key cannot be parsed or the chain is
    /// rejected by the TLS stack.
    pub fn from_der(cert_chain: Vec<Vec<u8>>, key: Vec<u8>) -> Result<Self> {
        let certs: Vec<CertificateDer<'static>> =
            cert_chain.into_iter().map(CertificateDer::from).collect();
        let key = PrivateKeyDer::try_from(key)
            .map_err(|e| ApnsError::InvalidCredentials(e.to_string()))?;

        let mut roots = rustls::RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)
            .map_err(|e| ApnsError::InvalidCredentials(e.to_string()))?;

        Ok(Self {
            config: Arc::new(config),
        })
    }

    fn client_config(&self) -> Arc<rustls::ClientConfig> {
        Arc::clone(&self.config)
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity").finish_non_exhaustive()
    }
}

/// Inbound half of the gateway connection, consumed by the feedback
/// listener
pub(crate) type FeedbackReader = Box<dyn AsyncRead + Send + Unpin>;

/// Owns the single persistent TLS connection to the gateway
pub struct ConnectionManager {
    env: Environment,
    gateway_addr: Option<String>,
    identity: Option<Identity>,
    writer: Option<Box<dyn AsyncWrite + Send + Sync + Unpin>>,
    connected: bool,
    reader_tx: mpsc::UnboundedSender<FeedbackReader>,
}

impl ConnectionManager {
    /// Create a manager for the given environment
    ///
    /// `gateway_addr` overrides the environment's well-known host, which
    /// is how mock gateways are pointed at in tests. Non-test
    /// environments require an identity up front.
    pub(crate) fn new(
        env: Environment,
        identity: Option<Identity>,
        gateway_addr: Option<String>,
        reader_tx: mpsc::UnboundedSender<FeedbackReader>,
    ) -> Result<Self> {
        if env != Environment::Test && identity.is_none() {
            return Err(ApnsError::MissingCredentials);
        }
        let gateway_addr = gateway_addr.or_else(|| env.gateway_host().map(str::to_owned));
        Ok(Self {
            env,
            gateway_addr,
            identity,
            writer: None,
            connected: false,
            reader_tx,
        })
    }

    pub(crate) fn is_connected(&self) -> bool {
        self.connected
    }

    /// Establish the connection if it is not already up
    ///
    /// In the test environment this marks the manager connected and wires
    /// the writer to an in-memory sink without any network activity.
    pub(crate) async fn ensure_connected(&mut self) -> Result<()> {
        if self.connected {
            return Ok(());
        }
        self.dial().await
    }

    async fn dial(&mut self) -> Result<()> {
        self.close();

        if self.env == Environment::Test {
            self.writer = Some(Box::new(io::sink()));
            self.connected = true;
            return Ok(());
        }

        let addr = self
            .gateway_addr
            .clone()
            .ok_or_else(|| ApnsError::Transport("no gateway host configured".to_string()))?;
        let identity = self
            .identity
            .as_ref()
            .ok_or(ApnsError::MissingCredentials)?;

        log::debug!("dialing gateway {}", addr);
        let stream = TcpStream::connect(&addr)
            .await
            .map_err(|e| ApnsError::Transport(format!("connect {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;

        let host = addr.split(':').next().unwrap_or(&addr).to_owned();
        let server_name = ServerName::try_from(host)
            .map_err(|e| ApnsError::Transport(format!("invalid gateway host: {}", e)))?;

        let connector = TlsConnector::from(identity.client_config());
        let tls_stream = match connector.connect(server_name, stream).await {
            Ok(tls_stream) => tls_stream,
            Err(e) => {
                // Not left half-open: the TCP stream is dropped here.
                log::warn!("gateway handshake failed: {}", e);
                return Err(ApnsError::Transport(format!("handshake: {}", e)));
            }
        };

        let (read_half, write_half) = tokio::io::split(tls_stream);
        // The feedback listener may already be gone during shutdown.
        let _ = self.reader_tx.send(Box::new(read_half));
        self.writer = Some(Box::new(write_half));
        self.connected = true;
        log::debug!("gateway connection established ({})", self.env);
        Ok(())
    }

    /// Write a full frame, dialing first if needed
    ///
    /// Any write failure invalidates the connection so the next call
    /// redials, and is surfaced as a retryable transport error.
    pub(crate) async fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.ensure_connected().await?;

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ApnsError::Transport("connection writer missing".to_string()))?;

        let result = async {
            writer.write_all(frame).await?;
            writer.flush().await
        }
        .await;

        if let Err(e) = result {
            self.close();
            return Err(ApnsError::Transport(format!("write: {}", e)));
        }
        Ok(())
    }

    /// Idempotent teardown; the next use redials
    pub(crate) fn close(&mut self) {
        self.writer = None;
        self.connected = false;
    }
}
