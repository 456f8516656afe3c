// Integration tests for the device listing services
//
// A client connects over a socket file, sends request tokens and decodes
// the JSON listings from bit-header frames.

use anyhow::Result;
use futures::StreamExt;
use sonic_audio_bridge::codec::BitLengthCodec;
use sonic_audio_bridge::error::ServiceError;
use sonic_audio_bridge::manager::{
    AppInfo, AppListService, ContextProvider, ManagerService, PrivilegedContext, StaticContext,
    WifiNetwork,
};
use sonic_audio_bridge::session::ControlTokens;
use sonic_audio_bridge::transport::{connect, Endpoint, LocalServer};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::AsyncWriteExt;
use tokio::net::UnixStream;
use tokio_util::codec::FramedRead;

fn device() -> StaticContext {
    StaticContext::new(
        vec![
            AppInfo {
                package_name: "org.example.player".to_string(),
                app_name: "Player".to_string(),
                version_name: "2.1".to_string(),
                version_code: 21,
                system_app: false,
            },
            AppInfo {
                package_name: "com.android.settings".to_string(),
                app_name: "Settings".to_string(),
                version_name: "14".to_string(),
                version_code: 34,
                system_app: true,
            },
        ],
        vec![WifiNetwork {
            ssid: "lab".to_string(),
            bssid: "00:11:22:33:44:55".to_string(),
            level: -42,
            frequency: 5180,
            capabilities: "[WPA2-PSK-CCMP][ESS]".to_string(),
        }],
    )
}

/// Connect once the service has bound its endpoint
async fn connect_when_ready(endpoint: &Endpoint) -> Result<UnixStream> {
    for _ in 0..100 {
        if let Ok(stream) = connect(endpoint).await {
            return Ok(stream);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    anyhow::bail!("service never bound {}", endpoint)
}

struct FailingProvider;

impl ContextProvider for FailingProvider {
    fn acquire(&self) -> Result<Arc<dyn PrivilegedContext>, ServiceError> {
        Err(ServiceError::Context("system context unavailable".to_string()))
    }
}

#[tokio::test]
async fn test_manager_answers_requests_in_order() -> Result<()> {
    let dir = TempDir::new()?;
    let endpoint = Endpoint::path(dir.path().join("manager.sock"));

    let service = ManagerService::new(endpoint.clone(), ControlTokens::default(), &device())?;
    let run = tokio::spawn(service.run());

    let stream = connect_when_ready(&endpoint).await?;
    let (read_half, mut write_half) = stream.into_split();
    let mut frames = FramedRead::new(read_half, BitLengthCodec::new());

    write_half.write_all(b"action_get_all_app_info").await?;
    let apps: Vec<AppInfo> = serde_json::from_slice(&frames.next().await.expect("apps")?)?;
    assert_eq!(apps, device().apps);

    // Unknown tokens produce no reply
    write_half.write_all(b"action_reboot").await?;
    tokio::time::sleep(Duration::from_millis(50)).await;

    write_half.write_all(b"action_get_all_wifi_info\n").await?;
    let networks: Vec<WifiNetwork> =
        serde_json::from_slice(&frames.next().await.expect("networks")?)?;
    assert_eq!(networks.len(), 1);
    assert_eq!(networks[0].ssid, "lab");

    drop(write_half);
    let answered = tokio::time::timeout(Duration::from_secs(5), run).await???;
    assert_eq!(answered, 2);

    // Single client, and the endpoint is released afterwards
    assert!(frames.next().await.is_none());
    let _rebound = LocalServer::listen(&endpoint)?;

    Ok(())
}

#[tokio::test]
async fn test_manager_context_failure_binds_nothing() -> Result<()> {
    let dir = TempDir::new()?;
    let endpoint = Endpoint::path(dir.path().join("manager.sock"));

    let result = ManagerService::new(endpoint.clone(), ControlTokens::default(), &FailingProvider);
    match result {
        Err(e) => assert!(e.is_fatal_startup()),
        Ok(_) => panic!("context failure should abort startup"),
    }
    assert!(!endpoint_exists(&endpoint));

    Ok(())
}

#[tokio::test]
async fn test_app_list_service_writes_once() -> Result<()> {
    let dir = TempDir::new()?;
    let endpoint = Endpoint::path(dir.path().join("apps.sock"));

    let service = AppListService::new(endpoint.clone(), &device())?;
    let run = tokio::spawn(service.run());

    let stream = connect_when_ready(&endpoint).await?;
    let mut frames = FramedRead::new(stream, BitLengthCodec::new());

    let apps: Vec<AppInfo> = serde_json::from_slice(&frames.next().await.expect("apps")?)?;
    assert_eq!(apps.len(), 2);
    assert!(apps[1].system_app);
    assert!(frames.next().await.is_none());

    let written = tokio::time::timeout(Duration::from_secs(5), run).await???;
    assert_eq!(written, 2);

    Ok(())
}

fn endpoint_exists(endpoint: &Endpoint) -> bool {
    match endpoint {
        Endpoint::Path(path) => path.exists(),
        Endpoint::Abstract(_) => false,
    }
}
