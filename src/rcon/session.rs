//! RCON transport session - one stream connection to one server.
//!
//! The protocol has no framing: the server sends its XOR key in the clear as
//! soon as the connection opens, then answers each obfuscated command with an
//! obfuscated blob of text. End of message is inferred by polling until the
//! socket has nothing more buffered after a short quiescence pause.
//!
//! ```text
//! connect ──► Connection ──receive_key()──► Session ──send/receive──► close()
//!              (clear)                      (XOR key bound for its lifetime)
//! ```

use bytes::{Bytes, BytesMut};
use std::future::poll_fn;
use std::io;
use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tracing::debug;

use crate::error::{Result, SyncError};
use crate::rcon::codec::XorKey;

/// Upper bound for a single blocking read while waiting for a reply.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(6);

/// Pause between poll cycles that lets a slow server flush remaining segments.
pub const DEFAULT_QUIESCENCE: Duration = Duration::from_millis(400);

/// Upper bound for establishing the TCP connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(6);

/// Bytes requested per read call.
pub const READ_BUFFER_SIZE: usize = 8196;

/// Timing knobs for a session. Production uses the defaults; tests shrink
/// them to milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub quiescence: Duration,
    pub read_buffer_size: usize,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            quiescence: DEFAULT_QUIESCENCE,
            read_buffer_size: READ_BUFFER_SIZE,
        }
    }
}

/// A connected stream that has not yet received its key.
pub struct Connection<S = TcpStream> {
    stream: S,
    peer: String,
    timings: SessionTimings,
}

impl Connection<TcpStream> {
    /// Open a TCP connection to `address:port`.
    pub async fn open(address: &str, port: u16, timings: SessionTimings) -> Result<Self> {
        let addr = format!("{}:{}", address, port);
        debug!(%addr, "connecting");

        let stream = match tokio::time::timeout(
            timings.connect_timeout,
            TcpStream::connect((address, port)),
        )
        .await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(source)) => return Err(SyncError::Connection { addr, source }),
            Err(_) => {
                return Err(SyncError::Connection {
                    addr,
                    source: io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!(
                            "no answer within {}ms",
                            timings.connect_timeout.as_millis()
                        ),
                    ),
                })
            }
        };

        // Commands are small and strictly request/response.
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%addr, error = %e, "could not disable Nagle");
        }

        Ok(Self::from_stream(stream, addr, timings))
    }
}

impl<S> Connection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already-connected stream (mock transports in tests).
    pub fn from_stream(stream: S, peer: impl Into<String>, timings: SessionTimings) -> Self {
        Self {
            stream,
            peer: peer.into(),
            timings,
        }
    }

    /// Read the key frame the server sends on connect, without decoding it.
    ///
    /// Consumes the connection: the returned [`Session`] is bound to this key
    /// for the rest of its life.
    pub async fn receive_key(mut self) -> Result<Session<S>> {
        let mut buf = vec![0u8; self.timings.read_buffer_size];
        let n = read_with_timeout(&mut self.stream, &mut buf, self.timings.idle_timeout).await?;

        let key = XorKey::new(Bytes::copy_from_slice(&buf[..n]))
            .map_err(|_| SyncError::Protocol("invalid key".to_string()))?;
        debug!(peer = %self.peer, key_len = key.len(), "received obfuscation key");

        Ok(Session {
            stream: self.stream,
            key,
            peer: self.peer,
            timings: self.timings,
        })
    }
}

/// A keyed RCON session.
///
/// Dropping the session closes the stream; [`Session::close`] additionally
/// performs an orderly shutdown of the write half.
pub struct Session<S = TcpStream> {
    stream: S,
    key: XorKey,
    peer: String,
    timings: SessionTimings,
}

impl Session<TcpStream> {
    /// Connect and perform the key exchange.
    pub async fn open(address: &str, port: u16, timings: SessionTimings) -> Result<Self> {
        Connection::open(address, port, timings)
            .await?
            .receive_key()
            .await
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn key(&self) -> &XorKey {
        &self.key
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Obfuscate `text` and write it as one frame. No acknowledgment is read.
    pub async fn send_command(&mut self, text: &str) -> Result<()> {
        let frame = self.key.transform(text.as_bytes());
        // Log length only: login frames carry the password.
        debug!(peer = %self.peer, bytes = frame.len(), "sending command");
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    /// Assemble one response.
    ///
    /// Blocks (up to the idle timeout) for the first bytes, then keeps taking
    /// whatever is already buffered after each quiescence pause. Returns when
    /// a pause ends with nothing new, or when the peer closes the stream.
    /// Each read is decoded on its own, with the key restarting at offset zero.
    pub async fn receive_response(&mut self) -> Result<String> {
        let mut buf = vec![0u8; self.timings.read_buffer_size];
        let mut assembled = BytesMut::new();
        let mut cycles = 0usize;

        let mut n = read_with_timeout(&mut self.stream, &mut buf, self.timings.idle_timeout).await?;
        while n > 0 {
            let chunk = &mut buf[..n];
            self.key.apply(chunk);
            assembled.extend_from_slice(chunk);
            cycles += 1;

            tokio::time::sleep(self.timings.quiescence).await;

            match read_if_ready(&mut self.stream, &mut buf).await? {
                Some(m) => n = m,
                None => break,
            }
        }

        debug!(
            peer = %self.peer,
            bytes = assembled.len(),
            cycles,
            "response assembled"
        );
        Ok(String::from_utf8_lossy(&assembled).into_owned())
    }

    /// Send a command and wait for its response.
    pub async fn request(&mut self, text: &str) -> Result<String> {
        self.send_command(text).await?;
        self.receive_response().await
    }

    /// Shut the connection down. Errors are logged, not returned: the
    /// connection is gone either way.
    pub async fn close(mut self) {
        if let Err(e) = self.stream.shutdown().await {
            debug!(peer = %self.peer, error = %e, "shutdown failed");
        }
    }
}

/// One read bounded by `idle`.
async fn read_with_timeout<S>(stream: &mut S, buf: &mut [u8], idle: Duration) -> Result<usize>
where
    S: AsyncRead + Unpin,
{
    match tokio::time::timeout(idle, stream.read(buf)).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(SyncError::Timeout(idle)),
    }
}

/// Read only if bytes are already buffered. `None` means the read would
/// block; `Some(0)` means the peer closed the stream.
async fn read_if_ready<S>(stream: &mut S, buf: &mut [u8]) -> io::Result<Option<usize>>
where
    S: AsyncRead + Unpin,
{
    let mut read_buf = ReadBuf::new(buf);
    poll_fn(|cx| match Pin::new(&mut *stream).poll_read(cx, &mut read_buf) {
        Poll::Ready(Ok(())) => Poll::Ready(Ok(Some(read_buf.filled().len()))),
        Poll::Ready(Err(e)) => Poll::Ready(Err(e)),
        Poll::Pending => Poll::Ready(Ok(None)),
    })
    .await
}
