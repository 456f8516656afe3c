use std::io;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::server::ConnectionWriter;

/// Outbound stream shared by the media path and teardown
///
/// Empty until a client connects and again after `close`. Writes against an
/// empty slot are dropped, which covers frames racing with teardown.
#[derive(Clone, Default)]
pub struct SharedWriter {
    inner: Arc<Mutex<Option<ConnectionWriter>>>,
}

impl SharedWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn attach(&self, writer: ConnectionWriter) {
        let mut slot = self.inner.lock().await;
        if slot.replace(writer).is_some() {
            warn!("Replaced an attached writer");
        }
    }

    pub async fn is_attached(&self) -> bool {
        self.inner.lock().await.is_some()
    }

    /// Write one framed message; `Ok(false)` when no client is attached
    pub async fn write(&self, bytes: &[u8]) -> io::Result<bool> {
        let mut slot = self.inner.lock().await;
        match slot.as_mut() {
            Some(writer) => {
                writer.write_all(bytes).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Shut down and drop the writer; no-op when already closed
    pub async fn close(&self) {
        let writer = self.inner.lock().await.take();
        if let Some(mut writer) = writer {
            if let Err(e) = writer.shutdown().await {
                debug!("Writer shutdown: {}", e);
            }
        }
    }
}
