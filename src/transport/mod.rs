//! Local socket transport
//!
//! One named endpoint per service, one client per endpoint. The accepted
//! connection is split so the control reader and the media writer can run on
//! different tasks.

pub mod endpoint;
pub mod server;
pub mod writer;

pub use endpoint::{Endpoint, SocketNamespace};
pub use server::{
    connect, Connection, ConnectionReader, ConnectionWriter, LocalServer, CONTROL_CHUNK_LEN,
};
pub use writer::SharedWriter;

use tokio::task::JoinHandle;
use tracing::info;

/// Everything a session holds open on its endpoint
///
/// Tracks the accept and read tasks alongside the shared writer so that
/// `close` can release all of them at once.
pub struct SessionTransport {
    endpoint: Endpoint,
    writer: SharedWriter,
    tasks: Vec<JoinHandle<()>>,
    closed: bool,
}

impl SessionTransport {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            writer: SharedWriter::new(),
            tasks: Vec::new(),
            closed: false,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn writer(&self) -> SharedWriter {
        self.writer.clone()
    }

    /// Tie a task's lifetime to the transport
    pub fn track(&mut self, task: JoinHandle<()>) {
        if self.closed {
            task.abort();
        } else {
            self.tasks.push(task);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Close the connection and release the endpoint; idempotent
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        // Aborting the accept task drops its `LocalServer`, which unbinds.
        // Awaiting the handles makes sure that has happened before returning.
        for task in &self.tasks {
            task.abort();
        }
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        self.writer.close().await;
        info!("Socket {} closed", self.endpoint);
    }
}
