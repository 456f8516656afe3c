//! Single-client local socket server
//!
//! # Connection Lifecycle
//!
//! 1. `LocalServer::listen` binds the endpoint; an endpoint that is already
//!    bound is a fatal error (stale socket files are not removed)
//! 2. `accept` consumes the server and waits for exactly one client
//! 3. The listener is closed right after, so later connects are refused
//! 4. The connection splits into independent read and write halves

use std::io;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, info, warn};

use super::endpoint::{bind_std, connect_std, Endpoint};
use crate::error::TransportError;

/// Bytes read from the control channel per call
pub const CONTROL_CHUNK_LEN: usize = 1024;

/// Bound endpoint waiting for its one client
pub struct LocalServer {
    endpoint: Endpoint,
    listener: Option<UnixListener>,
}

impl LocalServer {
    /// Bind `endpoint`
    ///
    /// Must be called from within a tokio runtime.
    pub fn listen(endpoint: &Endpoint) -> Result<Self, TransportError> {
        info!("Creating socket {}", endpoint);

        let listener = bind_std(endpoint)
            .and_then(UnixListener::from_std)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AddrInUse {
                    TransportError::AddrInUse {
                        name: endpoint.name(),
                    }
                } else {
                    TransportError::Bind {
                        name: endpoint.name(),
                        source: e,
                    }
                }
            })?;

        info!("Listening on {}", endpoint);

        Ok(Self {
            endpoint: endpoint.clone(),
            listener: Some(listener),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Wait for the single client of this server
    pub async fn accept(mut self) -> Result<Connection, TransportError> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| TransportError::Accept(io::ErrorKind::NotConnected.into()))?;

        let (stream, _addr) = listener.accept().await.map_err(TransportError::Accept)?;
        info!("Client connected on {}", self.endpoint);

        // No second accept: closing here refuses every later client
        self.close();
        Ok(Connection { stream })
    }

    /// Release the endpoint; safe to call more than once
    pub fn close(&mut self) {
        if self.listener.take().is_none() {
            return;
        }

        if let Endpoint::Path(path) = &self.endpoint {
            if let Err(e) = std::fs::remove_file(path) {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!("Failed to remove socket {}: {}", path.display(), e);
                }
            }
        }
        debug!("Endpoint {} released", self.endpoint);
    }
}

impl Drop for LocalServer {
    fn drop(&mut self) {
        self.close();
    }
}

/// The accepted client stream
#[derive(Debug)]
pub struct Connection {
    stream: UnixStream,
}

impl Connection {
    pub fn into_split(self) -> (ConnectionReader, ConnectionWriter) {
        let (read, write) = self.stream.into_split();
        (ConnectionReader { inner: read }, ConnectionWriter { inner: write })
    }
}

/// Inbound half: control tokens from the client
#[derive(Debug)]
pub struct ConnectionReader {
    inner: OwnedReadHalf,
}

impl ConnectionReader {
    /// Read one chunk of at most [`CONTROL_CHUNK_LEN`] bytes; `Ok(0)` at EOF
    pub async fn read_chunk(&mut self, buf: &mut [u8; CONTROL_CHUNK_LEN]) -> io::Result<usize> {
        self.inner.read(buf).await
    }
}

/// Outbound half: media frames or command replies
#[derive(Debug)]
pub struct ConnectionWriter {
    inner: OwnedWriteHalf,
}

impl ConnectionWriter {
    pub async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.inner.write_all(bytes).await?;
        self.inner.flush().await
    }

    pub async fn shutdown(&mut self) -> io::Result<()> {
        self.inner.shutdown().await
    }
}

/// Connect to a local server as its client
pub async fn connect(endpoint: &Endpoint) -> Result<UnixStream, TransportError> {
    let stream = connect_std(endpoint).map_err(|e| match e.kind() {
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => TransportError::Refused {
            name: endpoint.name(),
        },
        _ => TransportError::Io(e),
    })?;
    Ok(UnixStream::from_std(stream)?)
}
