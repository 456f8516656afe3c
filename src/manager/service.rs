use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use super::context::{ContextProvider, PrivilegedContext};
use crate::codec::encode_frame;
use crate::error::{ServiceError, TransportError};
use crate::session::{ControlMessage, ControlTokens};
use crate::transport::{ConnectionWriter, Endpoint, LocalServer, CONTROL_CHUNK_LEN};

/// Endpoint name of the manager service
pub const MANAGER_SOCKET: &str = "sonic_manager_socket";

/// Endpoint name of the one-shot app listing service
pub const APP_LIST_SOCKET: &str = "sonic_plugin_all_app_list_service";

/// Answers listing requests from a single client
///
/// Requests are handled one at a time in arrival order, so replies never
/// interleave on the wire.
pub struct ManagerService {
    endpoint: Endpoint,
    tokens: ControlTokens,
    context: Arc<dyn PrivilegedContext>,
}

impl ManagerService {
    /// Acquire the privileged context; nothing is bound if this fails
    pub fn new(
        endpoint: Endpoint,
        tokens: ControlTokens,
        provider: &dyn ContextProvider,
    ) -> Result<Self, ServiceError> {
        let context = provider.acquire()?;
        Ok(Self {
            endpoint,
            tokens,
            context,
        })
    }

    /// Serve one client until it disconnects
    ///
    /// Returns the number of requests answered.
    pub async fn run(self) -> Result<usize, ServiceError> {
        let server = LocalServer::listen(&self.endpoint)?;
        let connection = server.accept().await?;

        let (mut reader, mut writer) = connection.into_split();
        let mut buf = [0u8; CONTROL_CHUNK_LEN];
        let mut answered = 0;

        loop {
            let n = match reader.read_chunk(&mut buf).await {
                Ok(0) => {
                    info!("Client disconnected");
                    break;
                }
                Ok(n) => n,
                Err(e) => {
                    warn!("Control read failed: {}", e);
                    return Err(TransportError::from(e).into());
                }
            };

            let message = self.tokens.parse(&buf[..n]);
            debug!("Manager request: {:?}", message);

            match message {
                ControlMessage::GetAllAppInfo => {
                    let apps = self.context.installed_apps()?;
                    write_listing(&mut writer, &apps).await?;
                    answered += 1;
                }
                ControlMessage::GetAllWifiInfo => {
                    let networks = self.context.wifi_networks()?;
                    write_listing(&mut writer, &networks).await?;
                    answered += 1;
                }
                ControlMessage::Unknown(token) => warn!("Unknown manager request: {:?}", token),
                ControlMessage::Stop => debug!("Stop token ignored by the manager"),
            }
        }

        let _ = writer.shutdown().await;
        info!("Socket {} closed", self.endpoint);
        Ok(answered)
    }
}

/// Writes the installed application listing to the first client, then exits
pub struct AppListService {
    endpoint: Endpoint,
    context: Arc<dyn PrivilegedContext>,
}

impl AppListService {
    pub fn new(endpoint: Endpoint, provider: &dyn ContextProvider) -> Result<Self, ServiceError> {
        let context = provider.acquire()?;
        Ok(Self { endpoint, context })
    }

    /// Returns the number of applications written
    pub async fn run(self) -> Result<usize, ServiceError> {
        let server = LocalServer::listen(&self.endpoint)?;
        let connection = server.accept().await?;

        let (_reader, mut writer) = connection.into_split();
        let apps = self.context.installed_apps()?;
        write_listing(&mut writer, &apps).await?;

        let _ = writer.shutdown().await;
        info!("Socket {} closed", self.endpoint);
        Ok(apps.len())
    }
}

/// One JSON array per frame
async fn write_listing<T: Serialize>(
    writer: &mut ConnectionWriter,
    items: &[T],
) -> Result<(), ServiceError> {
    let payload = serde_json::to_vec(items)?;
    writer
        .write_all(&encode_frame(&payload))
        .await
        .map_err(TransportError::from)?;
    debug!("Wrote listing: {} entries, {} bytes", items.len(), payload.len());
    Ok(())
}
