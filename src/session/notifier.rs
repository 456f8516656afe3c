use tracing::info;

/// What the persistent status notice shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    WaitingForConnection,
    Forwarding,
}

impl ServiceStatus {
    pub fn text(self) -> &'static str {
        match self {
            ServiceStatus::WaitingForConnection => "Waiting for connection",
            ServiceStatus::Forwarding => "Forwarding",
        }
    }
}

/// Presents the service status to the user
pub trait StatusNotifier: Send + Sync {
    fn show(&self, status: ServiceStatus);

    /// Remove the notice when the service goes away
    fn clear(&self);
}

/// Notifier that only logs
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl StatusNotifier for LogNotifier {
    fn show(&self, status: ServiceStatus) {
        info!("Status: {}", status.text());
    }

    fn clear(&self) {
        info!("Status cleared");
    }
}
