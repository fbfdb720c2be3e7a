//! Transport capability trait consumed by the session client.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use warper_core::{CodecError, SwitchProtocol};

/// Errors raised by a transport implementation.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The socket or USB device could not be opened.
    #[error("failed to connect to {target}: {source}")]
    ConnectFailed {
        target: String,
        #[source]
        source: std::io::Error,
    },
    /// An I/O error occurred on an open connection.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The console did not answer in time.
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    /// An exchange was attempted before `connect` or after `disconnect`.
    #[error("transport is not connected")]
    NotConnected,
    /// The console's reply could not be decoded.
    #[error("malformed reply: {0}")]
    Malformed(#[from] CodecError),
    /// libusb reported an error.
    #[error("USB error: {0}")]
    Usb(String),
    /// No matching console is attached.
    #[error("no console found: {0}")]
    DeviceNotFound(String),
    /// The requested link was compiled out of this build.
    #[error("{0:?} transport is not available in this build")]
    Unsupported(SwitchProtocol),
}

/// Capability set of a console transport.
///
/// `send` takes a fully encoded command (including any line ending) and does
/// not wait for a reply.  The remaining methods build their own commands and
/// decode the console's answer.
///
/// Implementations serialize individual exchanges internally so that a
/// command issued outside the session gate cannot split another command's
/// request from its reply.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SwitchConnection: Send + Sync {
    /// Opens the underlying socket or device.
    async fn connect(&self) -> Result<(), TransportError>;

    /// Closes the underlying socket or device.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Sends one pre-encoded command that has no reply.
    async fn send(&self, command: &[u8]) -> Result<(), TransportError>;

    /// Resolves a pointer chain to an absolute address.
    async fn pointer_all(&self, chain: &[i64]) -> Result<u64, TransportError>;

    /// Reads `length` bytes at an absolute address.
    async fn read_bytes_absolute(
        &self,
        address: u64,
        length: usize,
    ) -> Result<Vec<u8>, TransportError>;

    /// Writes `data` at an absolute address.
    async fn write_bytes_absolute(&self, data: &[u8], address: u64) -> Result<(), TransportError>;
}
