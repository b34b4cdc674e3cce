//! Reachability probes.
//!
//! # Responsibilities
//! - Check one relay with a bounded timeout
//! - Report why a probe failed (for logs only)
//!
//! # Design Decisions
//! - A TCP connect that completes is a pass; the connection is closed at once
//! - Probes never retry; the next health cycle is the retry

use std::future::Future;
use std::io;
use std::time::Duration;

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time;

use crate::load_balancer::endpoint::Endpoint;

/// Why a probe did not pass.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection failed: {0}")]
    Connect(#[from] io::Error),
}

/// A reachability check for one relay.
pub trait Prober: Send + Sync {
    fn probe(&self, endpoint: &Endpoint) -> impl Future<Output = Result<(), ProbeError>> + Send;
}

/// TCP connect probe against a fixed port on every relay.
#[derive(Debug, Clone)]
pub struct TcpProber {
    port: u16,
    timeout: Duration,
}

impl TcpProber {
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self { port, timeout }
    }
}

impl Prober for TcpProber {
    async fn probe(&self, endpoint: &Endpoint) -> Result<(), ProbeError> {
        let connect = TcpStream::connect((endpoint.as_str(), self.port));
        let mut stream = time::timeout(self.timeout, connect)
            .await
            .map_err(|_| ProbeError::Timeout(self.timeout))??;
        // Close errors do not make the relay unreachable.
        let _ = stream.shutdown().await;
        Ok(())
    }
}
