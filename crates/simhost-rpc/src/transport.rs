//! TCP connection to the host.
//!
//! Outgoing fields are buffered in memory and flushed in one write just
//! before the next read, so an RPC's command line and arguments usually
//! leave in a single segment. Reads accumulate into a buffer until the
//! requested field is complete.

use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::protocol::{CMD_START, PROTOCOL_VERSION, READY, STATUS_OK};
use crate::wire::{CodecError, Decode, Encode, decode_buffered};

const READ_CHUNK: usize = 8 * 1024;

pub struct Connection {
    reader: OwnedReadHalf,
    writer: OwnedWriteHalf,
    rbuf: BytesMut,
    wbuf: BytesMut,
    timeout: Option<Duration>,
    peer: String,
}

impl Connection {
    /// Open a TCP connection. Does not perform the handshake.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the host refuses or `connect_timeout`
    /// elapses.
    pub async fn open(host: &str, port: u16, connect_timeout: Duration) -> Result<Self> {
        let peer = format!("{host}:{port}");
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&peer))
            .await
            .map_err(|_| Error::connection(format!("connect to {peer} timed out")))?
            .map_err(|e| Error::connection(format!("connect to {peer}: {e}")))?;
        stream.set_nodelay(true)?;

        debug!("Connected to {peer}");
        Ok(Self::from_stream(stream, peer))
    }

    #[must_use]
    pub fn from_stream(stream: TcpStream, peer: String) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader,
            writer,
            rbuf: BytesMut::with_capacity(READ_CHUNK),
            wbuf: BytesMut::with_capacity(READ_CHUNK),
            timeout: None,
            peer,
        }
    }

    #[must_use]
    pub fn peer(&self) -> &str {
        &self.peer
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Read timeout. `None` waits forever (events mode).
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Queue a field for sending.
    ///
    /// # Errors
    ///
    /// Returns `Error::Protocol` if the value cannot be framed.
    pub fn send<T: Encode + ?Sized>(&mut self, value: &T) -> Result<()> {
        value.encode(&mut self.wbuf)?;
        Ok(())
    }

    /// Write everything queued so far.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the socket write fails.
    pub async fn flush(&mut self) -> Result<()> {
        if self.wbuf.is_empty() {
            return Ok(());
        }
        let buf = self.wbuf.split();
        self.writer.write_all(&buf).await?;
        self.writer.flush().await?;
        Ok(())
    }

    /// Receive one typed field, flushing pending writes first.
    ///
    /// # Errors
    ///
    /// Returns `Error::Timeout` when the read timeout elapses,
    /// `Error::Protocol` on EOF or malformed data, `Error::Io` on socket
    /// failure.
    pub async fn recv<T: Decode>(&mut self) -> Result<T> {
        self.flush().await?;

        loop {
            if let Some(value) = decode_buffered::<T>(&mut self.rbuf)? {
                return Ok(value);
            }

            self.rbuf.reserve(READ_CHUNK);
            let read = self.reader.read_buf(&mut self.rbuf);
            let n = match self.timeout {
                Some(limit) => tokio::time::timeout(limit, read)
                    .await
                    .map_err(|_| Error::Timeout)??,
                None => read.await?,
            };

            if n == 0 {
                return Err(CodecError::UnexpectedEof.into());
            }
        }
    }

    /// Client side of the connect handshake. Returns the host's protocol
    /// version.
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the host does not answer with the
    /// expected greeting or reports a failure status.
    pub async fn handshake(&mut self) -> Result<i32> {
        self.send(CMD_START)?;
        let greeting: String = self.recv().await?;
        if greeting != READY {
            return Err(Error::connection(format!(
                "unexpected greeting from {}: {greeting:?}",
                self.peer
            )));
        }

        let version: i32 = self.recv().await?;
        let status: i32 = self.recv().await?;
        if status != STATUS_OK {
            let message: String = self.recv().await?;
            return Err(Error::connection(format!(
                "host refused connection ({status}): {message}"
            )));
        }

        if version != PROTOCOL_VERSION {
            warn!(
                "Host protocol version {version} differs from client version {PROTOCOL_VERSION}"
            );
        }
        Ok(version)
    }

    /// True when the host has sent bytes that no one has read yet.
    #[must_use]
    pub fn has_buffered_input(&self) -> bool {
        !self.rbuf.is_empty()
    }

    /// Give up the typed API and return the raw halves plus any bytes
    /// already read but not decoded. Used to hand the socket to a framed
    /// event reader.
    #[must_use]
    pub fn into_parts(self) -> (OwnedReadHalf, OwnedWriteHalf, BytesMut) {
        (self.reader, self.writer, self.rbuf)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("peer", &self.peer)
            .field("timeout", &self.timeout)
            .field("buffered", &self.rbuf.len())
            .finish_non_exhaustive()
    }
}
