//! Device listing services
//!
//! `ManagerService` answers app and Wi-Fi listing requests over a control
//! channel; `AppListService` writes the app listing once to its first client.
//! Both reply with JSON arrays in bit-header frames.

pub mod context;
pub mod service;

pub use context::{
    AppInfo, ContextProvider, FileContextProvider, PrivilegedContext, StaticContext, WifiNetwork,
};
pub use service::{AppListService, ManagerService, APP_LIST_SOCKET, MANAGER_SOCKET};
