//! USB transport: length-prefixed frames over two bulk endpoints.
//!
//! ```text
//! host -> console   [len:4 LE]  then  [command text, no line ending]
//! console -> host   [len:4 LE]  then  [raw payload]
//! ```
//!
//! libusb calls block, so every exchange runs on Tokio's blocking pool.  The
//! open device sits behind a `std::sync::Mutex` that is held for the whole
//! request/reply exchange.
//!
//! The bulk endpoints are abstracted behind [`UsbBulkIo`] so the framing can
//! be exercised without hardware.  The libusb implementation is compiled with
//! the `usb` feature.

use std::sync::{Arc, Mutex};
#[cfg(feature = "usb")]
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use warper_core::protocol::codec::{
    decode_pointer_le, expect_len, frame_usb, transfer_chunks, usb_payload_len,
    USB_LENGTH_PREFIX, USB_MAX_TRANSFER,
};
use warper_core::{CodecError, SwitchCommand};

use crate::application::connection::{SwitchConnection, TransportError};

/// Nintendo's USB vendor ID.
pub const SWITCH_VENDOR_ID: u16 = 0x057E;
/// Product ID the console service enumerates as.
pub const SWITCH_PRODUCT_ID: u16 = 0x3000;
/// Bulk OUT endpoint (host to console).
pub const ENDPOINT_OUT: u8 = 0x01;
/// Bulk IN endpoint (console to host).
pub const ENDPOINT_IN: u8 = 0x81;

/// Size of a `pointerAll` reply: one little-endian `u64`.
const POINTER_REPLY_LEN: usize = 8;

/// Blocking bulk endpoint pair of an open console.
pub trait UsbBulkIo: Send {
    /// Writes all of `data` to the OUT endpoint.
    fn write_bulk(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Reads up to `buf.len()` bytes from the IN endpoint.
    fn read_bulk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// Opens the console and returns its endpoints.
pub type UsbOpener = Box<dyn Fn() -> Result<Box<dyn UsbBulkIo>, TransportError> + Send + Sync>;

type SharedDevice = Arc<Mutex<Option<Box<dyn UsbBulkIo>>>>;

/// USB connection to the console service.
pub struct UsbConnection {
    opener: Arc<UsbOpener>,
    device: SharedDevice,
}

impl UsbConnection {
    /// Creates a (not yet connected) transport that opens its device with
    /// `opener` on every `connect`.
    pub fn with_opener(opener: UsbOpener) -> Self {
        Self {
            opener: Arc::new(opener),
            device: Arc::new(Mutex::new(None)),
        }
    }

    /// Creates a libusb-backed transport for the console on `port`.
    ///
    /// `port == 0` selects the first console found.
    #[cfg(feature = "usb")]
    pub fn new(port: u16, timeout: Duration) -> Self {
        Self::with_opener(Box::new(move || libusb::open_console(port, timeout)))
    }

    /// Runs `exchange` against the open device on the blocking pool.
    ///
    /// The exchange finishes even if the caller stops waiting.  A failed
    /// exchange closes the device, since a partial frame may still be queued
    /// on the IN endpoint; later calls return `NotConnected` until `connect`.
    async fn run<T, F>(&self, exchange: F) -> Result<T, TransportError>
    where
        T: Send + 'static,
        F: FnOnce(&mut dyn UsbBulkIo) -> Result<T, TransportError> + Send + 'static,
    {
        let device = Arc::clone(&self.device);
        tokio::task::spawn_blocking(move || {
            let mut guard = device
                .lock()
                .map_err(|_| TransportError::Usb("device lock poisoned".to_string()))?;
            let io = guard.as_mut().ok_or(TransportError::NotConnected)?;
            let result = exchange(io.as_mut());
            if let Err(e) = &result {
                warn!("USB exchange failed, closing device: {e}");
                *guard = None;
            }
            result
        })
        .await
        .map_err(|e| TransportError::Usb(format!("USB worker failed: {e}")))?
    }
}

#[async_trait]
impl SwitchConnection for UsbConnection {
    async fn connect(&self) -> Result<(), TransportError> {
        let opener = Arc::clone(&self.opener);
        let device = Arc::clone(&self.device);
        tokio::task::spawn_blocking(move || {
            let io = (**opener)()?;
            let mut guard = device
                .lock()
                .map_err(|_| TransportError::Usb("device lock poisoned".to_string()))?;
            *guard = Some(io);
            Ok::<(), TransportError>(())
        })
        .await
        .map_err(|e| TransportError::Usb(format!("USB worker failed: {e}")))??;
        info!("USB console opened");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let closed = self
            .device
            .lock()
            .map_err(|_| TransportError::Usb("device lock poisoned".to_string()))?
            .take();
        if closed.is_some() {
            info!("USB console closed");
        }
        Ok(())
    }

    async fn send(&self, command: &[u8]) -> Result<(), TransportError> {
        let command = command.to_vec();
        self.run(move |io| send_frame(io, &command)).await
    }

    async fn pointer_all(&self, chain: &[i64]) -> Result<u64, TransportError> {
        let cmd = SwitchCommand::PointerAll(chain.to_vec());
        self.run(move |io| {
            send_frame(io, &cmd.encode(false))?;
            let payload = read_frame(io, POINTER_REPLY_LEN)?;
            Ok(decode_pointer_le(&payload)?)
        })
        .await
    }

    async fn read_bytes_absolute(
        &self,
        address: u64,
        length: usize,
    ) -> Result<Vec<u8>, TransportError> {
        self.run(move |io| peek(io, address, length)).await
    }

    async fn write_bytes_absolute(&self, data: &[u8], address: u64) -> Result<(), TransportError> {
        let data = data.to_vec();
        self.run(move |io| poke(io, &data, address)).await
    }
}

// ── Framing ───────────────────────────────────────────────────────────────────

/// Sends the length prefix and the payload as two bulk transfers; the
/// console reads the prefix on its own before sizing the payload read.
fn send_frame(io: &mut dyn UsbBulkIo, payload: &[u8]) -> Result<(), TransportError> {
    let frame = frame_usb(payload);
    let (prefix, body) = frame.split_at(USB_LENGTH_PREFIX);
    io.write_bulk(prefix)?;
    io.write_bulk(body)
}

/// Reads one reply frame, rejecting a header that claims more than
/// `max_len` bytes before anything is allocated.
fn read_frame(io: &mut dyn UsbBulkIo, max_len: usize) -> Result<Vec<u8>, TransportError> {
    let mut header = [0u8; USB_LENGTH_PREFIX];
    read_exact(io, &mut header)?;
    let len = usb_payload_len(header);
    if len > max_len {
        return Err(CodecError::UnexpectedLength {
            expected: max_len,
            actual: len,
        }
        .into());
    }
    let mut payload = vec![0u8; len];
    read_exact(io, &mut payload)?;
    Ok(payload)
}

fn read_exact(io: &mut dyn UsbBulkIo, buf: &mut [u8]) -> Result<(), TransportError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = io.read_bulk(&mut buf[filled..])?;
        if n == 0 {
            return Err(TransportError::Usb(format!(
                "short read: {filled} of {} bytes",
                buf.len()
            )));
        }
        filled += n;
    }
    Ok(())
}

fn peek(io: &mut dyn UsbBulkIo, address: u64, length: usize) -> Result<Vec<u8>, TransportError> {
    let mut out = Vec::with_capacity(length);
    for (chunk_address, chunk_len) in transfer_chunks(address, length, USB_MAX_TRANSFER) {
        let cmd = SwitchCommand::PeekAbsolute {
            address: chunk_address,
            length: chunk_len,
        };
        send_frame(io, &cmd.encode(false))?;
        let payload = read_frame(io, chunk_len)?;
        expect_len(&payload, chunk_len)?;
        out.extend(payload);
    }
    Ok(out)
}

fn poke(io: &mut dyn UsbBulkIo, data: &[u8], address: u64) -> Result<(), TransportError> {
    for (chunk_address, chunk_len) in transfer_chunks(address, data.len(), USB_MAX_TRANSFER) {
        let offset = (chunk_address - address) as usize;
        let cmd = SwitchCommand::PokeAbsolute {
            address: chunk_address,
            data: data[offset..offset + chunk_len].to_vec(),
        };
        debug!("USB poke {chunk_len} bytes at 0x{chunk_address:X}");
        send_frame(io, &cmd.encode(false))?;
    }
    Ok(())
}

// ── libusb ────────────────────────────────────────────────────────────────────

#[cfg(feature = "usb")]
mod libusb {
    use std::time::Duration;

    use rusb::{DeviceHandle, GlobalContext};
    use tracing::debug;

    use super::{UsbBulkIo, ENDPOINT_IN, ENDPOINT_OUT, SWITCH_PRODUCT_ID, SWITCH_VENDOR_ID};
    use crate::application::connection::TransportError;

    struct RusbBulk {
        handle: DeviceHandle<GlobalContext>,
        timeout: Duration,
    }

    impl UsbBulkIo for RusbBulk {
        fn write_bulk(&mut self, data: &[u8]) -> Result<(), TransportError> {
            let mut sent = 0;
            while sent < data.len() {
                sent += self
                    .handle
                    .write_bulk(ENDPOINT_OUT, &data[sent..], self.timeout)
                    .map_err(usb_error)?;
            }
            Ok(())
        }

        fn read_bulk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            self.handle
                .read_bulk(ENDPOINT_IN, buf, self.timeout)
                .map_err(usb_error)
        }
    }

    impl Drop for RusbBulk {
        fn drop(&mut self) {
            let _ = self.handle.release_interface(0);
        }
    }

    fn usb_error(e: rusb::Error) -> TransportError {
        match e {
            rusb::Error::Timeout => TransportError::Usb("transfer timed out".to_string()),
            other => TransportError::Usb(other.to_string()),
        }
    }

    /// Finds the console by vendor/product ID (and bus port when non-zero)
    /// and claims interface 0.
    pub(super) fn open_console(
        port: u16,
        timeout: Duration,
    ) -> Result<Box<dyn UsbBulkIo>, TransportError> {
        let devices = rusb::devices().map_err(usb_error)?;
        for device in devices.iter() {
            let desc = device.device_descriptor().map_err(usb_error)?;
            if desc.vendor_id() != SWITCH_VENDOR_ID || desc.product_id() != SWITCH_PRODUCT_ID {
                continue;
            }
            if port != 0 && u16::from(device.port_number()) != port {
                debug!("skipping console on port {}", device.port_number());
                continue;
            }

            let mut handle = device.open().map_err(usb_error)?;
            handle.claim_interface(0).map_err(usb_error)?;
            return Ok(Box::new(RusbBulk { handle, timeout }));
        }

        Err(TransportError::DeviceNotFound(format!(
            "{SWITCH_VENDOR_ID:04X}:{SWITCH_PRODUCT_ID:04X} on port {port}"
        )))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// In-memory endpoint pair: records every OUT transfer and serves queued
    /// IN bytes.
    #[derive(Clone, Default)]
    struct LoopbackBulk {
        written: Arc<Mutex<Vec<Vec<u8>>>>,
        replies: Arc<Mutex<VecDeque<u8>>>,
    }

    impl LoopbackBulk {
        fn queue_frame(&self, payload: &[u8]) {
            self.replies.lock().unwrap().extend(frame_usb(payload));
        }
    }

    impl UsbBulkIo for LoopbackBulk {
        fn write_bulk(&mut self, data: &[u8]) -> Result<(), TransportError> {
            self.written.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        fn read_bulk(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
            let mut replies = self.replies.lock().unwrap();
            let n = buf.len().min(replies.len());
            for slot in buf.iter_mut().take(n) {
                *slot = replies.pop_front().unwrap();
            }
            Ok(n)
        }
    }

    fn connection_over(bulk: &LoopbackBulk) -> UsbConnection {
        let bulk = bulk.clone();
        UsbConnection::with_opener(Box::new(move || {
            Ok(Box::new(bulk.clone()) as Box<dyn UsbBulkIo>)
        }))
    }

    #[tokio::test]
    async fn test_send_writes_prefix_then_unterminated_command() {
        // Arrange
        let bulk = LoopbackBulk::default();
        let conn = connection_over(&bulk);
        conn.connect().await.unwrap();

        // Act
        conn.send(b"click A").await.unwrap();

        // Assert
        let written = bulk.written.lock().unwrap();
        assert_eq!(written[0], vec![7, 0, 0, 0]);
        assert_eq!(written[1], b"click A".to_vec());
    }

    #[tokio::test]
    async fn test_pointer_all_decodes_little_endian_reply() {
        let bulk = LoopbackBulk::default();
        bulk.queue_frame(&0x0000_0080_0000_1234u64.to_le_bytes());
        let conn = connection_over(&bulk);
        conn.connect().await.unwrap();

        let address = conn.pointer_all(&[0x40FE500, 0xB8]).await.unwrap();

        assert_eq!(address, 0x0000_0080_0000_1234);
        assert_eq!(bulk.written.lock().unwrap()[1], b"pointerAll 0x40FE500 0xB8".to_vec());
    }

    #[tokio::test]
    async fn test_read_bytes_returns_raw_payload() {
        let bulk = LoopbackBulk::default();
        bulk.queue_frame(&[1, 2, 3, 4]);
        let conn = connection_over(&bulk);
        conn.connect().await.unwrap();

        let bytes = conn.read_bytes_absolute(0x10, 4).await.unwrap();

        assert_eq!(bytes, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_truncated_reply_is_an_error() {
        let bulk = LoopbackBulk::default();
        bulk.replies.lock().unwrap().extend([4u8, 0, 0, 0, 0xAA]);
        let conn = connection_over(&bulk);
        conn.connect().await.unwrap();

        let result = conn.read_bytes_absolute(0x10, 4).await;

        assert!(matches!(result, Err(TransportError::Usb(_))));
    }

    #[tokio::test]
    async fn test_failed_exchange_closes_device_until_reconnect() {
        // Arrange – a truncated reply, then a clean one for after reconnect
        let bulk = LoopbackBulk::default();
        bulk.replies.lock().unwrap().extend([4u8, 0, 0, 0, 0xAA]);
        let conn = connection_over(&bulk);
        conn.connect().await.unwrap();

        // Act
        let truncated = conn.read_bytes_absolute(0x10, 4).await;
        let before_reconnect = conn.read_bytes_absolute(0x10, 4).await;
        bulk.queue_frame(&[5, 6, 7, 8]);
        conn.connect().await.unwrap();
        let after_reconnect = conn.read_bytes_absolute(0x10, 4).await;

        // Assert
        assert!(truncated.is_err());
        assert!(matches!(before_reconnect, Err(TransportError::NotConnected)));
        assert_eq!(after_reconnect.unwrap(), vec![5, 6, 7, 8]);
    }

    #[tokio::test]
    async fn test_oversized_reply_header_is_rejected_before_reading_payload() {
        // Arrange – header claims 4 GiB for an 8-byte pointer reply
        let bulk = LoopbackBulk::default();
        bulk.replies.lock().unwrap().extend([0xFFu8, 0xFF, 0xFF, 0xFF, 0x01]);
        let conn = connection_over(&bulk);
        conn.connect().await.unwrap();

        // Act
        let result = conn.pointer_all(&[0x10]).await;

        // Assert
        assert!(matches!(
            result,
            Err(TransportError::Malformed(CodecError::UnexpectedLength {
                expected: 8,
                actual: 0xFFFF_FFFF,
            }))
        ));
        assert_eq!(bulk.replies.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_peek_reply_longer_than_chunk_is_rejected() {
        let bulk = LoopbackBulk::default();
        bulk.queue_frame(&[0u8; 16]);
        let conn = connection_over(&bulk);
        conn.connect().await.unwrap();

        let result = conn.read_bytes_absolute(0x10, 4).await;

        assert!(matches!(result, Err(TransportError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_exchange_after_disconnect_is_rejected() {
        let bulk = LoopbackBulk::default();
        let conn = connection_over(&bulk);
        conn.connect().await.unwrap();
        conn.disconnect().await.unwrap();

        let result = conn.send(b"click A").await;

        assert!(matches!(result, Err(TransportError::NotConnected)));
    }

    #[tokio::test]
    async fn test_opener_failure_surfaces_from_connect() {
        let conn = UsbConnection::with_opener(Box::new(|| {
            Err(TransportError::DeviceNotFound("none attached".to_string()))
        }));

        let result = conn.connect().await;

        assert!(matches!(result, Err(TransportError::DeviceNotFound(_))));
    }
}
