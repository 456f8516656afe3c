use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ServiceError;

/// An installed application
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppInfo {
    pub package_name: String,
    pub app_name: String,
    pub version_name: String,
    pub version_code: i64,
    #[serde(default)]
    pub system_app: bool,
}

/// A Wi-Fi network from the last scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WifiNetwork {
    pub ssid: String,
    pub bssid: String,
    /// Signal level in dBm
    pub level: i32,
    /// Channel frequency in MHz
    pub frequency: u32,
    #[serde(default)]
    pub capabilities: String,
}

/// Platform handle with the privileges needed for device listings
pub trait PrivilegedContext: Send + Sync {
    fn installed_apps(&self) -> Result<Vec<AppInfo>, ServiceError>;

    fn wifi_networks(&self) -> Result<Vec<WifiNetwork>, ServiceError>;
}

/// Source of a [`PrivilegedContext`]
///
/// Acquisition happens once per service start; failure is fatal.
pub trait ContextProvider {
    fn acquire(&self) -> Result<Arc<dyn PrivilegedContext>, ServiceError>;
}

/// Fixed device listings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticContext {
    pub apps: Vec<AppInfo>,
    pub networks: Vec<WifiNetwork>,
}

impl StaticContext {
    pub fn new(apps: Vec<AppInfo>, networks: Vec<WifiNetwork>) -> Self {
        Self { apps, networks }
    }

    /// Load listings from a JSON document with `apps` and `networks` arrays
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ServiceError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|e| ServiceError::Context(format!("{}: {}", path.display(), e)))?;
        Ok(serde_json::from_str(&raw)?)
    }
}

impl PrivilegedContext for StaticContext {
    fn installed_apps(&self) -> Result<Vec<AppInfo>, ServiceError> {
        Ok(self.apps.clone())
    }

    fn wifi_networks(&self) -> Result<Vec<WifiNetwork>, ServiceError> {
        Ok(self.networks.clone())
    }
}

impl ContextProvider for StaticContext {
    fn acquire(&self) -> Result<Arc<dyn PrivilegedContext>, ServiceError> {
        Ok(Arc::new(self.clone()))
    }
}

/// Reads listings from a JSON file at acquisition time
#[derive(Debug, Clone)]
pub struct FileContextProvider {
    path: PathBuf,
}

impl FileContextProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ContextProvider for FileContextProvider {
    fn acquire(&self) -> Result<Arc<dyn PrivilegedContext>, ServiceError> {
        let context = StaticContext::from_json_file(&self.path)?;
        info!(
            "Loaded device listings from {}: {} apps, {} networks",
            self.path.display(),
            context.apps.len(),
            context.networks.len()
        );
        Ok(Arc::new(context))
    }
}
