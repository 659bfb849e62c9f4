use std::io::{ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{hung_up, not_open, timed_out, Transport};
use crate::DEFAULT_READ_TIMEOUT;

/// Smallest read wait accepted by the socket layer (zero means "forever").
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Quiet period that ends a drain in `discard_input`.
const DRAIN_IDLE_GAP: Duration = Duration::from_millis(10);

/// Which side of the TCP connection this transport plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TcpRole {
    /// Connect to a listening peer.
    Connect,
    /// Bind the address and accept exactly one peer.
    Listen,
}

/// Configuration for a TCP stream transport.
#[derive(Debug, Clone)]
pub struct TcpConfig {
    /// `host:port` to connect to or bind.
    pub address: String,
    /// Connect or listen.
    pub role: TcpRole,
    /// Maximum time a single read waits for data.
    pub read_timeout: Duration,
}

impl TcpConfig {
    /// Client-side configuration.
    pub fn connect(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            role: TcpRole::Connect,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Server-side configuration (accepts one peer on `open`).
    pub fn listen(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            role: TcpRole::Listen,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// A TCP byte stream standing in for a serial line.
///
/// Frames are carried exactly as on a UART; TCP only replaces the wire.
pub struct TcpStreamTransport {
    config: TcpConfig,
    stream: Option<TcpStream>,
    peer: Option<SocketAddr>,
}

impl TcpStreamTransport {
    /// Create a closed transport.
    pub fn new(config: TcpConfig) -> Self {
        Self {
            config,
            stream: None,
            peer: None,
        }
    }

    /// Create and open a transport in one step.
    pub fn open_with(config: TcpConfig) -> Result<Self> {
        let mut transport = Self::new(config);
        transport.open()?;
        Ok(transport)
    }

    /// Wrap an already connected stream (for example one taken from a
    /// caller-managed listener).
    pub fn from_stream(stream: TcpStream, read_timeout: Duration) -> Result<Self> {
        let peer = stream.peer_addr().ok();
        let address = peer
            .map(|addr| addr.to_string())
            .unwrap_or_else(|| "tcp-peer".to_string());
        let mut transport = Self::new(TcpConfig {
            address,
            role: TcpRole::Connect,
            read_timeout,
        });
        transport.install(stream)?;
        Ok(transport)
    }

    /// Current configuration.
    pub fn config(&self) -> &TcpConfig {
        &self.config
    }

    /// Address of the connected peer, if open.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer
    }

    fn install(&mut self, stream: TcpStream) -> Result<()> {
        let timeout = self.config.read_timeout.max(MIN_READ_TIMEOUT);
        let configure = |stream: &TcpStream| -> std::io::Result<()> {
            stream.set_nodelay(true)?;
            stream.set_read_timeout(Some(timeout))
        };
        configure(&stream).map_err(|source| TransportError::Configure {
            identifier: self.config.address.clone(),
            source,
        })?;
        self.peer = stream.peer_addr().ok();
        self.stream = Some(stream);
        Ok(())
    }
}

impl Transport for TcpStreamTransport {
    fn open(&mut self) -> Result<()> {
        if self.stream.is_some() {
            self.close();
        }

        let stream = match self.config.role {
            TcpRole::Connect => {
                TcpStream::connect(&self.config.address).map_err(|source| TransportError::Open {
                    identifier: self.config.address.clone(),
                    source,
                })?
            }
            TcpRole::Listen => {
                let listener = TcpListener::bind(&self.config.address).map_err(|source| {
                    TransportError::Open {
                        identifier: self.config.address.clone(),
                        source,
                    }
                })?;
                info!(address = %self.config.address, "waiting for tcp peer");
                let (stream, _addr) = listener.accept().map_err(TransportError::Accept)?;
                stream
            }
        };

        self.install(stream)?;
        info!(
            address = %self.config.address,
            peer = ?self.peer,
            "opened tcp stream"
        );
        Ok(())
    }

    fn close(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
            self.peer = None;
            debug!(address = %self.config.address, "closed tcp stream");
        }
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    /// Drops what is buffered, then keeps reading until the line has been
    /// quiet for `DRAIN_IDLE_GAP` or the read timeout has passed, so the
    /// tail of a frame still in flight goes too.
    fn discard_input(&mut self) -> Result<()> {
        let read_timeout = self.config.read_timeout.max(MIN_READ_TIMEOUT);
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        stream.set_read_timeout(Some(DRAIN_IDLE_GAP.min(read_timeout)))?;

        let deadline = Instant::now() + read_timeout;
        let mut scratch = [0u8; 512];
        let mut dropped = 0usize;
        let outcome = loop {
            if Instant::now() >= deadline {
                break Ok(());
            }
            match stream.read(&mut scratch) {
                Ok(0) => break Ok(()),
                Ok(n) => dropped += n,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) => {
                    break Ok(())
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => break Err(err),
            }
        };

        stream.set_read_timeout(Some(read_timeout))?;
        outcome?;
        debug!(address = %self.config.address, dropped, "discarded tcp input");
        Ok(())
    }

    fn read_timeout(&self) -> Duration {
        self.config.read_timeout
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.config.read_timeout = timeout;
        if let Some(stream) = &self.stream {
            stream.set_read_timeout(Some(timeout.max(MIN_READ_TIMEOUT)))?;
        }
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.config.address
    }
}

impl Read for TcpStreamTransport {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let stream = self.stream.as_mut().ok_or_else(not_open)?;
        match stream.read(buf) {
            Ok(0) if !buf.is_empty() => Err(hung_up("tcp read")),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Err(timed_out("tcp read")),
            other => other,
        }
    }
}

impl Write for TcpStreamTransport {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let stream = self.stream.as_mut().ok_or_else(not_open)?;
        stream.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let stream = self.stream.as_mut().ok_or_else(not_open)?;
        stream.flush()
    }
}

impl std::fmt::Debug for TcpStreamTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpStreamTransport")
            .field("address", &self.config.address)
            .field("role", &self.config.role)
            .field("peer", &self.peer)
            .finish()
    }
}
