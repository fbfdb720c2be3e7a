//! WiFi transport: line-oriented text over TCP.
//!
//! Every command is one `\r\n`-terminated line.  Only `pointerAll` and
//! `peekAbsolute` produce a reply, which is a single line of hex digits.
//! Peeks and pokes larger than [`SOCKET_MAX_TRANSFER`] are split into several
//! commands because the console's receive buffer is small.
//!
//! # Exchanges
//!
//! Each request/reply exchange runs in its own Tokio task that holds the link
//! for the whole exchange, bounded by the configured timeout.  A caller that
//! stops waiting (cancellation) does not stop the exchange, so the reply is
//! always consumed by the request that asked for it.
//!
//! If an exchange fails or times out, the stream is dropped: the console may
//! still answer later, and that stale reply must never be read as the answer
//! to a different request.  Every later call returns
//! [`TransportError::NotConnected`] until `connect` opens a fresh socket.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use warper_core::protocol::codec::{
    decode_peek_hex, decode_pointer_hex, transfer_chunks, SOCKET_MAX_TRANSFER,
};
use warper_core::SwitchCommand;

use crate::application::connection::{SwitchConnection, TransportError};

/// Default TCP port of the console service.
pub const DEFAULT_SOCKET_PORT: u16 = 6000;

type Link = BufReader<TcpStream>;

/// TCP connection to the console service.
pub struct SocketConnection {
    target: String,
    timeout: Duration,
    link: Arc<Mutex<Option<Link>>>,
}

impl SocketConnection {
    /// Creates a (not yet connected) socket transport for `ip:port`.
    pub fn new(ip: &str, port: u16, timeout: Duration) -> Self {
        Self {
            target: format!("{ip}:{port}"),
            timeout,
            link: Arc::new(Mutex::new(None)),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Runs one exchange on the open link in a detached task.
    ///
    /// `exchange` receives the stream by value and hands it back with its
    /// result.  The stream goes back into the slot only on success.
    async fn exchange<T, F, Fut>(&self, exchange: F) -> Result<T, TransportError>
    where
        T: Send + 'static,
        F: FnOnce(Link) -> Fut + Send + 'static,
        Fut: Future<Output = (Link, Result<T, TransportError>)> + Send + 'static,
    {
        let slot = Arc::clone(&self.link);
        let timeout = self.timeout;
        let target = self.target.clone();
        let task = tokio::spawn(async move {
            let mut guard = slot.lock_owned().await;
            let Some(stream) = guard.take() else {
                return Err(TransportError::NotConnected);
            };
            match tokio::time::timeout(timeout, exchange(stream)).await {
                Ok((stream, Ok(value))) => {
                    *guard = Some(stream);
                    Ok(value)
                }
                Ok((_, Err(e))) => {
                    warn!("exchange with {target} failed, dropping link: {e}");
                    Err(e)
                }
                Err(_) => {
                    warn!("no reply from {target} within {timeout:?}, dropping link");
                    Err(TransportError::Timeout(timeout))
                }
            }
        });
        task.await
            .map_err(|e| TransportError::Io(std::io::Error::other(e)))?
    }
}

#[async_trait]
impl SwitchConnection for SocketConnection {
    async fn connect(&self) -> Result<(), TransportError> {
        let stream = tokio::time::timeout(self.timeout, TcpStream::connect(self.target.as_str()))
            .await
            .map_err(|_| TransportError::Timeout(self.timeout))?
            .map_err(|source| TransportError::ConnectFailed {
                target: self.target.clone(),
                source,
            })?;
        if let Err(e) = stream.set_nodelay(true) {
            warn!("could not disable Nagle on {}: {e}", self.target);
        }

        let mut guard = self.link.lock().await;
        if guard.is_some() {
            debug!("replacing existing socket to {}", self.target);
        }
        *guard = Some(BufReader::new(stream));
        info!("socket connected to {}", self.target);
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        let stream = self.link.lock().await.take();
        if let Some(mut stream) = stream {
            stream.get_mut().shutdown().await?;
            info!("socket to {} closed", self.target);
        }
        Ok(())
    }

    async fn send(&self, command: &[u8]) -> Result<(), TransportError> {
        let command = command.to_vec();
        self.exchange(move |mut link| async move {
            let result = write_line(&mut link, &command).await;
            (link, result)
        })
        .await
    }

    async fn pointer_all(&self, chain: &[i64]) -> Result<u64, TransportError> {
        let chain = chain.to_vec();
        self.exchange(move |mut link| async move {
            let result = pointer_all_on(&mut link, chain).await;
            (link, result)
        })
        .await
    }

    async fn read_bytes_absolute(
        &self,
        address: u64,
        length: usize,
    ) -> Result<Vec<u8>, TransportError> {
        self.exchange(move |mut link| async move {
            let result = peek_on(&mut link, address, length).await;
            (link, result)
        })
        .await
    }

    async fn write_bytes_absolute(&self, data: &[u8], address: u64) -> Result<(), TransportError> {
        let data = data.to_vec();
        self.exchange(move |mut link| async move {
            let result = poke_on(&mut link, &data, address).await;
            (link, result)
        })
        .await
    }
}

// ── Framing over any buffered stream ──────────────────────────────────────────

/// Writes one encoded command and flushes it.
pub(crate) async fn write_line<S>(stream: &mut S, command: &[u8]) -> Result<(), TransportError>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(command).await?;
    stream.flush().await?;
    Ok(())
}

/// Reads one `\n`-terminated reply line.
pub(crate) async fn read_line<S>(stream: &mut S) -> Result<Vec<u8>, TransportError>
where
    S: AsyncBufRead + Unpin,
{
    let mut line = Vec::new();
    let n = stream.read_until(b'\n', &mut line).await?;
    if n == 0 {
        return Err(TransportError::Io(std::io::Error::new(
            std::io::ErrorKind::UnexpectedEof,
            "console closed the connection",
        )));
    }
    Ok(line)
}

/// Sends `pointerAll` and decodes the big-endian hex address.
pub(crate) async fn pointer_all_on<S>(
    stream: &mut S,
    chain: Vec<i64>,
) -> Result<u64, TransportError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    write_line(stream, &SwitchCommand::PointerAll(chain).encode(true)).await?;
    let line = read_line(stream).await?;
    Ok(decode_pointer_hex(&line)?)
}

/// Reads `length` bytes at `address`, one `peekAbsolute` per chunk.
pub(crate) async fn peek_on<S>(
    stream: &mut S,
    address: u64,
    length: usize,
) -> Result<Vec<u8>, TransportError>
where
    S: AsyncBufRead + AsyncWrite + Unpin,
{
    let mut out = Vec::with_capacity(length);
    for (chunk_address, chunk_len) in transfer_chunks(address, length, SOCKET_MAX_TRANSFER) {
        let cmd = SwitchCommand::PeekAbsolute {
            address: chunk_address,
            length: chunk_len,
        };
        write_line(stream, &cmd.encode(true)).await?;
        let line = read_line(stream).await?;
        out.extend(decode_peek_hex(&line, chunk_len)?);
    }
    Ok(out)
}

/// Writes `data` at `address`, one `pokeAbsolute` per chunk.
pub(crate) async fn poke_on<S>(
    stream: &mut S,
    data: &[u8],
    address: u64,
) -> Result<(), TransportError>
where
    S: AsyncWrite + Unpin,
{
    for (chunk_address, chunk_len) in transfer_chunks(address, data.len(), SOCKET_MAX_TRANSFER) {
        let offset = (chunk_address - address) as usize;
        let cmd = SwitchCommand::PokeAbsolute {
            address: chunk_address,
            data: data[offset..offset + chunk_len].to_vec(),
        };
        write_line(stream, &cmd.encode(true)).await?;
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
