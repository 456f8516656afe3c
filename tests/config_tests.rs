// Integration tests for configuration loading
//
// These tests load TOML files from a temp directory and check the derived
// session settings.

use anyhow::Result;
use sonic_audio_bridge::transport::{Endpoint, SocketNamespace};
use sonic_audio_bridge::Config;
use std::fs;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_config_defaults() -> Result<()> {
    let cfg = Config::default();

    assert_eq!(cfg.service.audio_socket, "sonicaudioservice");
    assert_eq!(cfg.service.manager_socket, "sonic_manager_socket");
    assert_eq!(cfg.service.app_list_socket, "sonic_plugin_all_app_list_service");
    assert_eq!(cfg.session.connect_timeout_secs, 30);
    assert_eq!(cfg.session.tokens.stop, "org.cloud.sonic.android.STOP");

    let session = cfg.session_config()?;
    assert_eq!(session.connect_timeout, Duration::from_secs(30));
    assert_eq!(session.format.sample_rate(), 44100);
    assert_eq!(session.format.channels(), 2);
    assert_eq!(session.format.bitrate(), 196_000);
    assert!(session.session_id.starts_with("audio-"));

    Ok(())
}

#[test]
fn test_config_from_toml_file() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("bridge.toml");
    fs::write(
        &path,
        format!(
            r#"
[service]
audio_socket = "audio_test"
namespace = {{ kind = "directory", dir = "{}" }}

[audio]
sample_rate = 48000
channels = 1
bitrate = 64000

[session]
connect_timeout_secs = 5

[session.tokens]
stop = "STOP"
"#,
            dir.path().display()
        ),
    )?;

    let cfg = Config::load(path.to_str())?;

    assert_eq!(
        cfg.service.namespace,
        SocketNamespace::Directory(dir.path().to_path_buf())
    );
    assert_eq!(cfg.audio_endpoint(), Endpoint::Path(dir.path().join("audio_test")));
    assert_eq!(
        cfg.manager_endpoint(),
        Endpoint::Path(dir.path().join("sonic_manager_socket"))
    );

    let session = cfg.session_config()?;
    assert_eq!(session.connect_timeout, Duration::from_secs(5));
    assert_eq!(session.format.sample_rate(), 48000);
    assert_eq!(session.format.channels(), 1);
    assert_eq!(session.tokens.stop, "STOP");
    // Unset tokens keep their defaults
    assert_eq!(session.tokens.app_list, "action_get_all_app_info");

    Ok(())
}

#[test]
fn test_invalid_audio_settings_are_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("bad.toml");
    fs::write(&path, "[audio]\nsample_rate = 12345\n")?;

    let cfg = Config::load(path.to_str())?;
    assert!(cfg.audio_format().is_err());
    assert!(cfg.session_config().is_err());

    Ok(())
}

#[test]
fn test_missing_config_file_is_an_error() {
    assert!(Config::load(Some("/nonexistent/bridge.toml")).is_err());
}
