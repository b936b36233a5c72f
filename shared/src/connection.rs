//! Newline-delimited text transport over a reliable byte stream.
//!
//! A [`Connection`] may be shared between tasks: writes are serialized by an
//! internal lock so two callers never interleave within a line, and
//! [`Connection::close`] wakes any reader blocked in [`Connection::read_line`].

use log::debug;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex};

/// Longest line accepted from a peer, excluding the newline.
pub const MAX_LINE_BYTES: usize = 4096;

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("i/o error on {peer}: {source}")]
    Io {
        peer: String,
        #[source]
        source: std::io::Error,
    },

    #[error("line contains an embedded newline")]
    EmbeddedNewline,

    #[error("{peer} sent a line longer than {limit} bytes")]
    LineTooLong { peer: String, limit: usize },
}

pub struct Connection {
    peer: String,
    reader: Mutex<BufReader<BoxedReader>>,
    writer: Mutex<Option<BoxedWriter>>,
    closed: AtomicBool,
    close_tx: watch::Sender<bool>,
    close_rx: watch::Receiver<bool>,
}

impl Connection {
    /// Wraps any bidirectional stream; `peer` is only used in logs and errors.
    pub fn new<S>(stream: S, peer: impl Into<String>) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (close_tx, close_rx) = watch::channel(false);

        Self {
            peer: peer.into(),
            reader: Mutex::new(BufReader::new(Box::new(read_half) as BoxedReader)),
            writer: Mutex::new(Some(Box::new(write_half) as BoxedWriter)),
            closed: AtomicBool::new(false),
            close_tx,
            close_rx,
        }
    }

    pub fn from_tcp(stream: TcpStream) -> Self {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());
        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not disable Nagle for {}: {}", peer, e);
        }
        Self::new(stream, peer)
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Writes `line` plus a newline and flushes. Lines sent after
    /// [`close`](Self::close) are dropped and reported as success.
    pub async fn send_line(&self, line: &str) -> Result<(), ConnectionError> {
        if line.contains('\n') || line.contains('\r') {
            return Err(ConnectionError::EmbeddedNewline);
        }

        let mut writer = self.writer.lock().await;
        let Some(stream) = writer.as_mut() else {
            debug!("Dropping line for closed connection {}: {}", self.peer, line);
            return Ok(());
        };

        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');

        stream.write_all(&data).await.map_err(|e| self.io_error(e))?;
        stream.flush().await.map_err(|e| self.io_error(e))?;
        Ok(())
    }

    pub async fn send<M: fmt::Display>(&self, message: &M) -> Result<(), ConnectionError> {
        self.send_line(&message.to_string()).await
    }

    /// Blocks until a full line arrives. Returns `Ok(None)` at end of stream
    /// or once the connection has been closed locally.
    ///
    /// Invalid UTF-8 is replaced rather than treated as a transport failure;
    /// the caller's parser rejects the resulting line. A line over
    /// [`MAX_LINE_BYTES`] is an error and leaves the stream unusable.
    pub async fn read_line(&self) -> Result<Option<String>, ConnectionError> {
        if self.is_closed() {
            return Ok(None);
        }

        let mut close_rx = self.close_rx.clone();
        let mut reader = self.reader.lock().await;
        let mut limited = (&mut *reader).take(MAX_LINE_BYTES as u64 + 1);
        let mut buf = Vec::new();

        tokio::select! {
            _ = close_rx.changed() => Ok(None),
            read = limited.read_until(b'\n', &mut buf) => match read {
                Ok(0) => Ok(None),
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                    } else if buf.len() > MAX_LINE_BYTES {
                        return Err(ConnectionError::LineTooLong {
                            peer: self.peer.clone(),
                            limit: MAX_LINE_BYTES,
                        });
                    }
                    if buf.last() == Some(&b'\r') {
                        buf.pop();
                    }
                    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
                }
                Err(e) => Err(self.io_error(e)),
            },
        }
    }

    /// Shuts the stream down. Safe to call any number of times.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.close_tx.send(true);

        let writer = self.writer.lock().await.take();
        if let Some(mut stream) = writer {
            if let Err(e) = stream.shutdown().await {
                debug!("Shutdown of {} failed: {}", self.peer, e);
            }
        }
        debug!("Closed connection {}", self.peer);
    }

    fn io_error(&self, source: std::io::Error) -> ConnectionError {
        ConnectionError::Io {
            peer: self.peer.clone(),
            source,
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("closed", &self.is_closed())
            .finish()
    }
}
