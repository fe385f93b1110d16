use thiserror::Error;

/// Errors raised while enumerating serial devices.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The enumeration backend itself failed (driver, permissions, udev, ...).
    #[error("serial enumeration failed: {0}")]
    Backend(String),

    /// Built without the `serial` feature.
    #[error("serial support not compiled in (enable the `serial` feature)")]
    Unsupported,
}

/// Errors surfaced by the link to callers writing through it.
#[derive(Debug, Error)]
pub enum LinkError {
    /// No open connection; nothing was written.
    #[error("device not connected")]
    NotConnected,

    /// The transport rejected the write. The connection stays up.
    #[error("write failed: {0}")]
    Write(#[from] std::io::Error),

    /// The link task has shut down.
    #[error("link task stopped")]
    Stopped,
}
