//! In-memory console for testing the session without hardware.
//!
//! # Why a recording connection?
//!
//! The real transports need a console on the network or a USB cable.  The
//! `RecordingConnection` replaces the console with:
//!
//! - a sparse byte map standing in for the game's memory,
//! - a table of pointer chains and the addresses they resolve to,
//! - a log of every call in the order the transport saw it, stamped with
//!   `tokio::time::Instant` so tests running on a paused clock can check
//!   macro delays exactly.
//!
//! # Usage in tests
//!
//! ```ignore
//! let console = Arc::new(RecordingConnection::new());
//! console.map_pointer(&PLAYER_POSITION, 0x1000);
//! let timings = MacroTimings::default();
//! let session = SessionClient::new(console.clone(), SwitchProtocol::WiFi, timings);
//!
//! session.set_player_position(1.0, 2.0, 3.0, &token).await?;
//!
//! assert_eq!(console.read_memory(0x1000, 12), Vec3::new(1.0, 2.0, 3.0).to_le_bytes());
//! ```
//!
//! # Failure injection
//!
//! `fail_connect(true)` makes `connect` fail; `fail_all(true)` makes every
//! call fail.  `set_latency` adds a sleep to every call so concurrent callers
//! get a chance to interleave.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use warper_core::PointerChain;

use crate::application::connection::{SwitchConnection, TransportError};

/// One call observed by the [`RecordingConnection`].
#[derive(Debug, Clone, PartialEq)]
pub enum TransportCall {
    Connect,
    Disconnect,
    /// Raw encoded command, including any line ending.
    Send(Vec<u8>),
    PointerAll(Vec<i64>),
    Read { address: u64, length: usize },
    Write { address: u64, data: Vec<u8> },
}

impl TransportCall {
    /// The command text without its line ending, for `Send` calls.
    pub fn command_text(&self) -> Option<String> {
        match self {
            TransportCall::Send(raw) => Some(
                String::from_utf8_lossy(raw)
                    .trim_end_matches(['\r', '\n'])
                    .to_string(),
            ),
            _ => None,
        }
    }
}

/// A fake console that records calls and serves an in-memory address space.
#[derive(Default)]
pub struct RecordingConnection {
    calls: Mutex<Vec<(Instant, TransportCall)>>,
    memory: Mutex<HashMap<u64, u8>>,
    pointers: Mutex<HashMap<Vec<i64>, u64>>,
    latency: Mutex<Duration>,
    fail_connect: AtomicBool,
    fail_all: AtomicBool,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `chain` resolve to `address`.
    pub fn map_pointer(&self, chain: &PointerChain, address: u64) {
        self.pointers
            .lock()
            .unwrap()
            .insert(chain.offsets().to_vec(), address);
    }

    /// Seeds memory at `address` without recording a call.
    pub fn poke_memory(&self, address: u64, data: &[u8]) {
        let mut memory = self.memory.lock().unwrap();
        for (i, byte) in data.iter().enumerate() {
            memory.insert(address + i as u64, *byte);
        }
    }

    /// Inspects memory without recording a call.  Unwritten bytes read as 0.
    pub fn read_memory(&self, address: u64, length: usize) -> Vec<u8> {
        let memory = self.memory.lock().unwrap();
        (0..length as u64)
            .map(|i| memory.get(&(address + i)).copied().unwrap_or(0))
            .collect()
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap() = latency;
    }

    pub fn fail_connect(&self, fail: bool) {
        self.fail_connect.store(fail, Ordering::SeqCst);
    }

    pub fn fail_all(&self, fail: bool) {
        self.fail_all.store(fail, Ordering::SeqCst);
    }

    /// Every call in the order it was observed.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, call)| call.clone())
            .collect()
    }

    /// Every call with the instant it was observed.
    pub fn timed_calls(&self) -> Vec<(Instant, TransportCall)> {
        self.calls.lock().unwrap().clone()
    }

    /// Text of every `Send` call, line endings stripped.
    pub fn sent_commands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(TransportCall::command_text)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Records `call`, then applies latency and failure injection.
    async fn observe(&self, call: TransportCall) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push((Instant::now(), call));
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(injected_failure());
        }
        Ok(())
    }
}

fn injected_failure() -> TransportError {
    TransportError::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "injected failure",
    ))
}

#[async_trait]
impl SwitchConnection for RecordingConnection {
    async fn connect(&self) -> Result<(), TransportError> {
        self.observe(TransportCall::Connect).await?;
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(TransportError::ConnectFailed {
                target: "recording console".to_string(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "injected"),
            });
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.observe(TransportCall::Disconnect).await
    }

    async fn send(&self, command: &[u8]) -> Result<(), TransportError> {
        self.observe(TransportCall::Send(command.to_vec())).await
    }

    async fn pointer_all(&self, chain: &[i64]) -> Result<u64, TransportError> {
        self.observe(TransportCall::PointerAll(chain.to_vec())).await?;
        self.pointers
            .lock()
            .unwrap()
            .get(chain)
            .copied()
            .ok_or_else(|| {
                TransportError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "pointer chain does not resolve",
                ))
            })
    }

    async fn read_bytes_absolute(
        &self,
        address: u64,
        length: usize,
    ) -> Result<Vec<u8>, TransportError> {
        self.observe(TransportCall::Read { address, length }).await?;
        Ok(self.read_memory(address, length))
    }

    async fn write_bytes_absolute(&self, data: &[u8], address: u64) -> Result<(), TransportError> {
        self.observe(TransportCall::Write {
            address,
            data: data.to_vec(),
        })
        .await?;
        self.poke_memory(address, data);
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use warper_core::domain::pointers::WEATHER;

    #[tokio::test]
    async fn test_unmapped_chain_fails() {
        let console = RecordingConnection::new();

        let result = console.pointer_all(&[0x1, 0x2]).await;

        assert!(result.is_err());
        assert_eq!(console.calls(), vec![TransportCall::PointerAll(vec![0x1, 0x2])]);
    }

    #[tokio::test]
    async fn test_writes_are_visible_to_reads() {
        // Arrange
        let console = RecordingConnection::new();
        console.map_pointer(&WEATHER, 0x500);

        // Act
        let address = console.pointer_all(WEATHER.offsets()).await.unwrap();
        console.write_bytes_absolute(&[9, 8, 7, 6], address).await.unwrap();
        let bytes = console.read_bytes_absolute(address, 4).await.unwrap();

        // Assert
        assert_eq!(bytes, vec![9, 8, 7, 6]);
    }

    #[tokio::test]
    async fn test_fail_all_still_records_the_call() {
        let console = RecordingConnection::new();
        console.fail_all(true);

        assert!(console.send(b"click A\r\n").await.is_err());
        assert_eq!(console.sent_commands(), vec!["click A".to_string()]);
    }
}
