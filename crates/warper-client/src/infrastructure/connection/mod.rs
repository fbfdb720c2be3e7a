//! Transport implementations of [`SwitchConnection`].
//!
//! - **`socket`** – WiFi: text lines over TCP.
//! - **`usb`** – USB: length-prefixed bulk frames via libusb.
//! - **`mock`** – in-memory console that records every call, for tests.
//!
//! [`SwitchTransport`] picks one of the two real links from the config and
//! [`build_session`] wires it into a [`SessionClient`].

pub mod mock;
pub mod socket;
pub mod usb;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;
use warper_core::SwitchProtocol;

use crate::application::connection::{SwitchConnection, TransportError};
use crate::application::session::SessionClient;
use crate::infrastructure::storage::config::{AppConfig, ConnectionConfig};

use self::socket::SocketConnection;
use self::usb::UsbConnection;

/// The link selected by `connection.protocol`.
pub enum SwitchTransport {
    Socket(SocketConnection),
    Usb(UsbConnection),
}

impl SwitchTransport {
    pub fn protocol(&self) -> SwitchProtocol {
        match self {
            SwitchTransport::Socket(_) => SwitchProtocol::WiFi,
            SwitchTransport::Usb(_) => SwitchProtocol::Usb,
        }
    }

    fn link(&self) -> &dyn SwitchConnection {
        match self {
            SwitchTransport::Socket(conn) => conn,
            SwitchTransport::Usb(conn) => conn,
        }
    }
}

#[async_trait]
impl SwitchConnection for SwitchTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        self.link().connect().await
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.link().disconnect().await
    }

    async fn send(&self, command: &[u8]) -> Result<(), TransportError> {
        self.link().send(command).await
    }

    async fn pointer_all(&self, chain: &[i64]) -> Result<u64, TransportError> {
        self.link().pointer_all(chain).await
    }

    async fn read_bytes_absolute(
        &self,
        address: u64,
        length: usize,
    ) -> Result<Vec<u8>, TransportError> {
        self.link().read_bytes_absolute(address, length).await
    }

    async fn write_bytes_absolute(&self, data: &[u8], address: u64) -> Result<(), TransportError> {
        self.link().write_bytes_absolute(data, address).await
    }
}

/// Builds the (unconnected) transport named by `config.protocol`.
///
/// # Errors
///
/// Returns [`TransportError::Unsupported`] for USB when the crate was built
/// without the `usb` feature.
pub fn build_transport(config: &ConnectionConfig) -> Result<SwitchTransport, TransportError> {
    match config.protocol {
        SwitchProtocol::WiFi => {
            info!("using WiFi transport to {}:{}", config.ip, config.port);
            Ok(SwitchTransport::Socket(SocketConnection::new(
                &config.ip,
                config.port,
                config.timeout(),
            )))
        }
        #[cfg(feature = "usb")]
        SwitchProtocol::Usb => {
            info!("using USB transport on port {}", config.usb_port);
            Ok(SwitchTransport::Usb(UsbConnection::new(
                config.usb_port,
                config.timeout(),
            )))
        }
        #[cfg(not(feature = "usb"))]
        SwitchProtocol::Usb => Err(TransportError::Unsupported(SwitchProtocol::Usb)),
    }
}

/// Builds a disconnected session from the whole application config.
///
/// # Errors
///
/// See [`build_transport`].
pub fn build_session(config: &AppConfig) -> Result<SessionClient, TransportError> {
    let transport = build_transport(&config.connection)?;
    let protocol = transport.protocol();
    Ok(SessionClient::new(
        Arc::new(transport),
        protocol,
        config.macros.clone(),
    ))
}

// ── Tests ─────────────────────────────────────────────────────────────────────
