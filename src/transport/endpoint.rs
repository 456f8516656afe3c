use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Where local socket names live
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", content = "dir", rename_all = "lowercase")]
pub enum SocketNamespace {
    /// Linux abstract namespace, the native home of Android local sockets
    Abstract,
    /// Socket files inside a directory
    Directory(PathBuf),
}

impl Default for SocketNamespace {
    fn default() -> Self {
        if cfg!(any(target_os = "linux", target_os = "android")) {
            SocketNamespace::Abstract
        } else {
            SocketNamespace::Directory(std::env::temp_dir())
        }
    }
}

impl SocketNamespace {
    pub fn endpoint(&self, name: &str) -> Endpoint {
        match self {
            SocketNamespace::Abstract => Endpoint::Abstract(name.to_string()),
            SocketNamespace::Directory(dir) => Endpoint::Path(dir.join(name)),
        }
    }
}

/// Address of a local socket server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    Abstract(String),
    Path(PathBuf),
}

impl Endpoint {
    pub fn path(path: impl AsRef<Path>) -> Self {
        Endpoint::Path(path.as_ref().to_path_buf())
    }

    pub fn name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Abstract(name) => write!(f, "@{}", name),
            Endpoint::Path(path) => write!(f, "{}", path.display()),
        }
    }
}

#[cfg(target_os = "linux")]
use std::os::linux::net::SocketAddrExt;
#[cfg(target_os = "android")]
use std::os::android::net::SocketAddrExt;

#[cfg(any(target_os = "linux", target_os = "android"))]
fn abstract_addr(name: &str) -> io::Result<std::os::unix::net::SocketAddr> {
    std::os::unix::net::SocketAddr::from_abstract_name(name.as_bytes())
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn abstract_addr(name: &str) -> io::Result<std::os::unix::net::SocketAddr> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        format!("abstract socket @{} needs Linux or Android", name),
    ))
}

/// Bind a std listener; callers convert it for tokio
pub(crate) fn bind_std(endpoint: &Endpoint) -> io::Result<std::os::unix::net::UnixListener> {
    let listener = match endpoint {
        Endpoint::Abstract(name) => {
            std::os::unix::net::UnixListener::bind_addr(&abstract_addr(name)?)?
        }
        Endpoint::Path(path) => std::os::unix::net::UnixListener::bind(path)?,
    };
    listener.set_nonblocking(true)?;
    Ok(listener)
}

pub(crate) fn connect_std(endpoint: &Endpoint) -> io::Result<std::os::unix::net::UnixStream> {
    let stream = match endpoint {
        Endpoint::Abstract(name) => {
            std::os::unix::net::UnixStream::connect_addr(&abstract_addr(name)?)?
        }
        Endpoint::Path(path) => std::os::unix::net::UnixStream::connect(path)?,
    };
    stream.set_nonblocking(true)?;
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_namespace_joins_name() {
        let ns = SocketNamespace::Directory(PathBuf::from("/run/sonic"));
        assert_eq!(
            ns.endpoint("sonicaudioservice"),
            Endpoint::Path(PathBuf::from("/run/sonic/sonicaudioservice"))
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Endpoint::Abstract("sonic_manager_socket".to_string()).to_string(),
            "@sonic_manager_socket"
        );
        assert_eq!(Endpoint::path("/tmp/a.sock").name(), "/tmp/a.sock");
    }
}
