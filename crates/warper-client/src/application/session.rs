//! SessionClient: high-level operations against the console.
//!
//! The session owns one transport for its whole lifetime and funnels every
//! memory access and macro through a single exclusive gate, so only one
//! logical operation talks to the console at a time.
//!
//! # The gate (for beginners)
//!
//! The gate is a `tokio::sync::Mutex<()>`.  It protects no data; holding the
//! guard *is* the permission to use the transport.  Tokio's mutex is fair, so
//! callers are served in arrival order.  The guard is dropped when the
//! operation returns, errors, or is cancelled, which releases the gate.
//!
//! Three operations do not take the gate:
//!
//! - `connect` / `disconnect` only flip the connection state and perform the
//!   controller-detach handshake.
//! - `toggle_screen` is a single fire-and-forget command.  It can land in the
//!   middle of a gated macro such as `mark_spawn`.
//!
//! # Cancellation
//!
//! Every operation takes a [`CancellationToken`].  Waiting for the gate, each
//! transport call, and each macro delay race the token; the first one to lose
//! returns [`SessionError::Cancelled`].  A cancelled macro stays partially
//! executed.
//!
//! # Error policy
//!
//! Errors propagate to the caller with two exceptions that are part of the
//! signature: [`SessionClient::disconnect`] returns `()` and
//! [`SessionClient::get_player_position`] returns [`Vec3::ZERO`] on failure.
//! Nothing is retried.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use warper_core::domain::pointers::{
    ARRAY_START, INVALID_START, META_BASE, PLAYER_POSITION, TIME, WEATHER,
};
use warper_core::domain::position::read_f32_le;
use warper_core::protocol::codec::expect_len;
use warper_core::{
    PointerChain, ScreenState, SwitchButton, SwitchCommand, SwitchProtocol, SwitchStick, Vec3,
};

use crate::application::connection::{SwitchConnection, TransportError};
use crate::application::macros::{self, ButtonMacro, MacroStep, MacroTimings};

/// Size of the player position block: three `f32`s.
const POSITION_LEN: usize = 12;

/// Size of the weather and clock values.
const WORD_LEN: usize = 4;

/// Error type returned by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Opening or closing the transport failed.
    #[error("connection failed: {0}")]
    Connect(#[source] TransportError),
    /// A controller command could not be sent.
    #[error("command failed: {0}")]
    Send(#[source] TransportError),
    /// A pointer resolution, read, or write failed.
    #[error("memory access failed: {0}")]
    Memory(#[source] TransportError),
    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,
}

/// Client session bound to one console.
pub struct SessionClient {
    connection: Arc<dyn SwitchConnection>,
    protocol: SwitchProtocol,
    crlf: bool,
    connected: AtomicBool,
    gate: Mutex<()>,
    timings: MacroTimings,
}

impl SessionClient {
    /// Creates a disconnected session over `connection`.
    ///
    /// The line-ending mode is derived from `protocol` once and never changes.
    pub fn new(
        connection: Arc<dyn SwitchConnection>,
        protocol: SwitchProtocol,
        timings: MacroTimings,
    ) -> Self {
        Self {
            connection,
            protocol,
            crlf: protocol.uses_crlf(),
            connected: AtomicBool::new(false),
            gate: Mutex::new(()),
            timings,
        }
    }

    /// Advisory connection state.  It can be stale after a transport failure
    /// outside `connect`/`disconnect`.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn protocol(&self) -> SwitchProtocol {
        self.protocol
    }

    pub fn is_wifi(&self) -> bool {
        self.protocol == SwitchProtocol::WiFi
    }

    /// Whether commands are terminated with `\r\n`.
    pub fn uses_crlf(&self) -> bool {
        self.crlf
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Opens the transport and detaches any stale virtual controller.
    ///
    /// Does nothing if already connected.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the transport cannot be opened or the
    /// detach command fails.  The session is left disconnected.
    pub async fn connect(&self, token: &CancellationToken) -> Result<(), SessionError> {
        if self.is_connected() {
            debug!("connect ignored: already connected");
            return Ok(());
        }

        let result = async {
            cancellable(token, self.connection.connect(), SessionError::Connect).await?;
            self.connected.store(true, Ordering::Release);
            self.send_command(&SwitchCommand::DetachController, token).await
        }
        .await;

        match &result {
            Ok(()) => info!("connected to console over {:?}", self.protocol),
            Err(e) => {
                self.connected.store(false, Ordering::Release);
                warn!("connect failed: {e}");
            }
        }
        result
    }

    /// Detaches the controller and closes the transport.
    ///
    /// Does nothing if not connected.  Failures are logged and the session is
    /// marked disconnected regardless.
    pub async fn disconnect(&self, token: &CancellationToken) {
        if !self.is_connected() {
            return;
        }

        let result = async {
            self.send_command(&SwitchCommand::DetachController, token).await?;
            cancellable(token, self.connection.disconnect(), SessionError::Connect).await
        }
        .await;

        self.connected.store(false, Ordering::Release);
        match result {
            Ok(()) => info!("disconnected from console"),
            Err(e) => warn!("disconnect failed, session marked disconnected anyway: {e}"),
        }
    }

    /// Turns the console screen on or off.
    ///
    /// Not gated: may interleave with a macro that is holding the gate.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Send`] if the command cannot be sent.
    pub async fn toggle_screen(
        &self,
        on: bool,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        let cmd = SwitchCommand::SetScreen(ScreenState::from(on));
        self.send_command(&cmd, token).await
    }

    // ── Pointer chains and raw memory ─────────────────────────────────────────

    /// Resolves the spawn array chain.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Memory`] if the console cannot resolve it.
    pub async fn get_array_start_offset(
        &self,
        token: &CancellationToken,
    ) -> Result<u64, SessionError> {
        self.resolve_gated(&ARRAY_START, token).await
    }

    /// Resolves the invalid-marker table chain.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Memory`] if the console cannot resolve it.
    pub async fn get_invalid_start_offset(
        &self,
        token: &CancellationToken,
    ) -> Result<u64, SessionError> {
        self.resolve_gated(&INVALID_START, token).await
    }

    /// Resolves the metadata base chain.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Memory`] if the console cannot resolve it.
    pub async fn get_meta_base_offset(
        &self,
        token: &CancellationToken,
    ) -> Result<u64, SessionError> {
        self.resolve_gated(&META_BASE, token).await
    }

    /// Reads `length` bytes at an absolute address.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Memory`] on transport failure.
    pub async fn read_bytes_absolute(
        &self,
        address: u64,
        length: usize,
        token: &CancellationToken,
    ) -> Result<Vec<u8>, SessionError> {
        let _gate = self.acquire(token).await?;
        self.read(address, length, token).await
    }

    /// Writes `data` at an absolute address.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Memory`] on transport failure.
    pub async fn write_bytes_absolute(
        &self,
        data: &[u8],
        address: u64,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        let _gate = self.acquire(token).await?;
        self.write(data, address, token).await
    }

    // ── Player position ───────────────────────────────────────────────────────

    /// Moves the player by `(dx, dy, dz) * distance`.
    ///
    /// The position block is read here as (x, z, y) and written back as three
    /// separate 4-byte writes at +0 (x), +4 (z), +8 (y).
    /// [`get_player_position`](Self::get_player_position) reads the same block
    /// as (x, y, z); the two layouts disagree on the last two slots and are
    /// kept exactly as the game tooling has always used them.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Memory`] on transport failure.
    pub async fn move_player(
        &self,
        dx: f32,
        dy: f32,
        dz: f32,
        distance: i32,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        let _gate = self.acquire(token).await?;
        let address = self.resolve(&PLAYER_POSITION, token).await?;
        let bytes = self.read(address, POSITION_LEN, token).await?;

        // z sits at +4 and y at +8 in this layout.
        let current = Vec3::new(
            read_f32_le(&bytes, 0),
            read_f32_le(&bytes, 8),
            read_f32_le(&bytes, 4),
        );
        let moved = current + Vec3::new(dx, dy, dz) * distance as f32;

        self.write(&moved.x.to_le_bytes(), address, token).await?;
        self.write(&moved.z.to_le_bytes(), address + 4, token).await?;
        self.write(&moved.y.to_le_bytes(), address + 8, token).await?;
        debug!("moved player to x={} y={} z={}", moved.x, moved.y, moved.z);
        Ok(())
    }

    /// Reads the player position as (x, y, z).
    ///
    /// Returns [`Vec3::ZERO`] if anything fails, including cancellation, so
    /// polling loops never have to handle an error.
    pub async fn get_player_position(&self, token: &CancellationToken) -> Vec3 {
        match self.read_player_position(token).await {
            Ok(position) => position,
            Err(e) => {
                debug!("player position unavailable: {e}");
                Vec3::ZERO
            }
        }
    }

    async fn read_player_position(&self, token: &CancellationToken) -> Result<Vec3, SessionError> {
        let _gate = self.acquire(token).await?;
        let address = self.resolve(&PLAYER_POSITION, token).await?;
        let bytes = self.read(address, POSITION_LEN, token).await?;
        let mut raw = [0u8; POSITION_LEN];
        raw.copy_from_slice(&bytes);
        Ok(Vec3::from_le_bytes(raw))
    }

    /// Writes (x, y, z) as one 12-byte block at the player position.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Memory`] on transport failure.
    pub async fn set_player_position(
        &self,
        x: f32,
        y: f32,
        z: f32,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        let _gate = self.acquire(token).await?;
        let address = self.resolve(&PLAYER_POSITION, token).await?;
        self.write(&Vec3::new(x, y, z).to_le_bytes(), address, token).await
    }

    // ── Weather and clock ─────────────────────────────────────────────────────

    /// # Errors
    ///
    /// Returns [`SessionError::Memory`] on transport failure.
    pub async fn get_current_weather(
        &self,
        token: &CancellationToken,
    ) -> Result<[u8; 4], SessionError> {
        self.read_word(&WEATHER, token).await
    }

    /// # Errors
    ///
    /// Returns [`SessionError::Memory`] on transport failure.
    pub async fn set_current_weather(
        &self,
        weather: [u8; 4],
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.write_word(&WEATHER, weather, token).await
    }

    /// # Errors
    ///
    /// Returns [`SessionError::Memory`] on transport failure.
    pub async fn get_current_time(
        &self,
        token: &CancellationToken,
    ) -> Result<[u8; 4], SessionError> {
        self.read_word(&TIME, token).await
    }

    /// # Errors
    ///
    /// Returns [`SessionError::Memory`] on transport failure.
    pub async fn set_current_time(
        &self,
        time: [u8; 4],
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        self.write_word(&TIME, time, token).await
    }

    async fn read_word(
        &self,
        chain: &PointerChain,
        token: &CancellationToken,
    ) -> Result<[u8; 4], SessionError> {
        let _gate = self.acquire(token).await?;
        let address = self.resolve(chain, token).await?;
        let bytes = self.read(address, WORD_LEN, token).await?;
        let mut word = [0u8; WORD_LEN];
        word.copy_from_slice(&bytes);
        Ok(word)
    }

    async fn write_word(
        &self,
        chain: &PointerChain,
        word: [u8; 4],
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        let _gate = self.acquire(token).await?;
        let address = self.resolve(chain, token).await?;
        self.write(&word, address, token).await
    }

    // ── Controller input ──────────────────────────────────────────────────────

    /// Holds the right stick at horizontal `speed`, vertical 0.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Send`] if the command cannot be sent.
    pub async fn set_rotation(
        &self,
        speed: i16,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        let _gate = self.acquire(token).await?;
        let cmd = SwitchCommand::SetStick {
            stick: SwitchStick::Right,
            x: speed,
            y: 0,
        };
        self.send_command(&cmd, token).await
    }

    /// # Errors
    ///
    /// Returns [`SessionError::Send`] if the command cannot be sent.
    pub async fn open_menu(&self, token: &CancellationToken) -> Result<(), SessionError> {
        let _gate = self.acquire(token).await?;
        let cmd = SwitchCommand::Click(SwitchButton::X);
        self.send_command(&cmd, token).await
    }

    /// Runs the map-marker macro.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Send`] or [`SessionError::Cancelled`]; inputs
    /// already sent are not undone.
    pub async fn mark_spawn(&self, token: &CancellationToken) -> Result<(), SessionError> {
        self.run_macro(&macros::mark_spawn(&self.timings), token).await
    }

    /// Centres the left stick and detaches the controller before shutdown.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Send`] if either command fails.
    pub async fn on_close(&self, token: &CancellationToken) -> Result<(), SessionError> {
        self.run_macro(&macros::on_close(), token).await
    }

    /// Runs the in-game save macro.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Send`] or [`SessionError::Cancelled`]; inputs
    /// already sent are not undone.
    pub async fn save_game(&self, token: &CancellationToken) -> Result<(), SessionError> {
        self.run_macro(&macros::save_game(&self.timings), token).await
    }

    /// Executes `script` step by step while holding the gate.
    async fn run_macro(
        &self,
        script: &ButtonMacro,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        let _gate = self.acquire(token).await?;
        debug!(
            "running macro {} ({:?} of delays)",
            script.name(),
            script.total_delay()
        );
        for step in script.steps() {
            match step {
                MacroStep::Send(cmd) => self.send_command(cmd, token).await?,
                MacroStep::Wait(delay) => pause(token, *delay).await?,
            }
        }
        Ok(())
    }

    // ── Gate and transport helpers ────────────────────────────────────────────

    async fn acquire(
        &self,
        token: &CancellationToken,
    ) -> Result<MutexGuard<'_, ()>, SessionError> {
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(SessionError::Cancelled),
            guard = self.gate.lock() => Ok(guard),
        }
    }

    async fn send_command(
        &self,
        cmd: &SwitchCommand,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        debug!("send {cmd}");
        let bytes = cmd.encode(self.crlf);
        cancellable(token, self.connection.send(&bytes), SessionError::Send).await
    }

    async fn resolve_gated(
        &self,
        chain: &PointerChain,
        token: &CancellationToken,
    ) -> Result<u64, SessionError> {
        let _gate = self.acquire(token).await?;
        self.resolve(chain, token).await
    }

    async fn resolve(
        &self,
        chain: &PointerChain,
        token: &CancellationToken,
    ) -> Result<u64, SessionError> {
        let address = cancellable(
            token,
            self.connection.pointer_all(chain.offsets()),
            SessionError::Memory,
        )
        .await?;
        debug!("resolved {} to 0x{address:X}", chain.name());
        Ok(address)
    }

    async fn read(
        &self,
        address: u64,
        length: usize,
        token: &CancellationToken,
    ) -> Result<Vec<u8>, SessionError> {
        let bytes = cancellable(
            token,
            self.connection.read_bytes_absolute(address, length),
            SessionError::Memory,
        )
        .await?;
        expect_len(&bytes, length)
            .map_err(|e| SessionError::Memory(TransportError::Malformed(e)))?;
        Ok(bytes)
    }

    async fn write(
        &self,
        data: &[u8],
        address: u64,
        token: &CancellationToken,
    ) -> Result<(), SessionError> {
        cancellable(
            token,
            self.connection.write_bytes_absolute(data, address),
            SessionError::Memory,
        )
        .await
    }
}

/// Races `fut` against `token`, classifying a transport failure with `kind`.
async fn cancellable<T>(
    token: &CancellationToken,
    fut: impl Future<Output = Result<T, TransportError>>,
    kind: fn(TransportError) -> SessionError,
) -> Result<T, SessionError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(SessionError::Cancelled),
        result = fut => result.map_err(kind),
    }
}

/// Sleeps for `delay` unless `token` fires first.
async fn pause(token: &CancellationToken, delay: Duration) -> Result<(), SessionError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(SessionError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
