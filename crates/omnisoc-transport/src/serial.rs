use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{hung_up, not_open, timed_out, Transport};
use crate::{DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};

/// Bits on the wire per character in 8N1 framing (start + 8 data + stop).
const BITS_PER_CHAR: u64 = 10;

/// Configuration for a serial TTY transport.
#[derive(Debug, Clone)]
pub struct SerialConfig {
    /// Device node, e.g. `/dev/ttyUSB0`.
    pub path: PathBuf,
    /// Line rate in bits per second.
    pub baud_rate: u32,
    /// Maximum time a single read waits for data.
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// Configuration for `path` with default baud rate and read timeout.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Time to shift one character at the configured rate, rounded up to a
    /// whole microsecond.
    pub fn byte_time(&self) -> Duration {
        let baud = u64::from(self.baud_rate.max(1));
        Duration::from_micros((BITS_PER_CHAR * 1_000_000).div_ceil(baud))
    }

    /// Silence that marks the end of a burst: two character times.
    pub fn idle_gap(&self) -> Duration {
        self.byte_time() * 2
    }
}

/// Serial TTY transport (raw 8N1, no flow control).
///
/// The descriptor is opened non-blocking; reads wait with `poll(2)` for at
/// most the configured read timeout.
pub struct SerialPort {
    config: SerialConfig,
    identifier: String,
    file: Option<File>,
}

impl SerialPort {
    /// Create a closed serial transport.
    pub fn new(config: SerialConfig) -> Self {
        let identifier = config.path.display().to_string();
        Self {
            config,
            identifier,
            file: None,
        }
    }

    /// Create and open a serial transport in one step.
    pub fn open_with(config: SerialConfig) -> Result<Self> {
        let mut port = Self::new(config);
        port.open()?;
        Ok(port)
    }

    /// Current configuration.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    fn raw_fd(&self) -> Option<RawFd> {
        self.file.as_ref().map(AsRawFd::as_raw_fd)
    }

    /// Read and drop bytes until the line stays quiet for one idle gap or
    /// the read timeout elapses.
    fn drain_until_idle(&mut self) -> Result<usize> {
        let gap = self.config.idle_gap();
        let deadline = Instant::now() + self.config.read_timeout;
        let file = self.file.as_mut().ok_or(TransportError::NotOpen)?;
        let fd = file.as_raw_fd();

        let mut scratch = [0u8; 64];
        let mut dropped = 0usize;
        while Instant::now() < deadline {
            if !poll_fd(fd, libc::POLLIN, gap)? {
                break;
            }
            match file.read(&mut scratch) {
                Ok(0) => break,
                Ok(n) => dropped += n,
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                    continue
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(dropped)
    }
}

impl Transport for SerialPort {
    fn open(&mut self) -> Result<()> {
        if self.file.is_some() {
            self.close();
        }

        let speed = baud_constant(self.config.baud_rate)
            .ok_or(TransportError::UnsupportedBaudRate(self.config.baud_rate))?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&self.config.path)
            .map_err(|source| TransportError::Open {
                identifier: self.identifier.clone(),
                source,
            })?;

        configure_raw(file.as_raw_fd(), speed).map_err(|source| TransportError::Configure {
            identifier: self.identifier.clone(),
            source,
        })?;

        info!(
            port = %self.identifier,
            baud = self.config.baud_rate,
            "opened serial port"
        );
        self.file = Some(file);
        Ok(())
    }

    fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(port = %self.identifier, "closed serial port");
        }
    }

    fn is_open(&self) -> bool {
        self.file.is_some()
    }

    fn discard_input(&mut self) -> Result<()> {
        let fd = self.raw_fd().ok_or(TransportError::NotOpen)?;
        // SAFETY: `fd` belongs to the open `File` held in `self.file`.
        if unsafe { libc::tcflush(fd, libc::TCIFLUSH) } != 0 {
            return Err(std::io::Error::last_os_error().into());
        }
        // Bytes of the frame being corrupted may still be on the wire.
        let dropped = self.drain_until_idle()?;
        debug!(port = %self.identifier, dropped, "discarded serial input");
        Ok(())
    }

    fn read_timeout(&self) -> Duration {
        self.config.read_timeout
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.config.read_timeout = timeout;
        Ok(())
    }

    fn identifier(&self) -> &str {
        &self.identifier
    }
}

impl Read for SerialPort {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let timeout = self.config.read_timeout;
        let file = self.file.as_mut().ok_or_else(not_open)?;
        if buf.is_empty() {
            return Ok(0);
        }
        if !poll_fd(file.as_raw_fd(), libc::POLLIN, timeout)? {
            return Err(timed_out("serial read"));
        }
        match file.read(buf) {
            Ok(0) => Err(hung_up("serial read")),
            Err(err) if err.kind() == ErrorKind::WouldBlock => Err(timed_out("serial read")),
            other => other,
        }
    }
}

impl Write for SerialPort {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let timeout = self.config.read_timeout;
        let file = self.file.as_mut().ok_or_else(not_open)?;
        match file.write(buf) {
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                // Output queue full; give the UART one read-timeout to drain.
                if !poll_fd(file.as_raw_fd(), libc::POLLOUT, timeout)? {
                    return Err(timed_out("serial write"));
                }
                file.write(buf)
            }
            other => other,
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let file = self.file.as_mut().ok_or_else(not_open)?;
        file.flush()
    }
}

impl std::fmt::Debug for SerialPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("path", &self.config.path)
            .field("baud_rate", &self.config.baud_rate)
            .field("open", &self.file.is_some())
            .finish()
    }
}

/// Map a numeric rate to its termios speed constant.
fn baud_constant(rate: u32) -> Option<libc::speed_t> {
    let speed = match rate {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        #[cfg(target_os = "linux")]
        460_800 => libc::B460800,
        #[cfg(target_os = "linux")]
        921_600 => libc::B921600,
        #[cfg(target_os = "linux")]
        1_000_000 => libc::B1000000,
        #[cfg(target_os = "linux")]
        2_000_000 => libc::B2000000,
        #[cfg(target_os = "linux")]
        4_000_000 => libc::B4000000,
        _ => return None,
    };
    Some(speed)
}

/// Put the line into raw 8N1 mode at `speed` with non-blocking reads.
fn configure_raw(fd: RawFd, speed: libc::speed_t) -> std::io::Result<()> {
    // SAFETY: termios is a plain C struct; all-zero is a valid bit pattern and
    // it is fully overwritten by tcgetattr before use.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is an open descriptor and `tio` is a valid writable termios.
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    // SAFETY: `tio` is a valid termios obtained from tcgetattr.
    unsafe { libc::cfmakeraw(&mut tio) };
    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cflag &= !libc::CSTOPB;
    tio.c_cc[libc::VMIN] = 0;
    tio.c_cc[libc::VTIME] = 0;

    // SAFETY: `tio` is a valid termios; speed comes from the libc constants.
    let rc = unsafe {
        libc::cfsetispeed(&mut tio, speed) | libc::cfsetospeed(&mut tio, speed)
    };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }

    // SAFETY: `fd` is open and `tio` is fully initialised.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

/// Wait until `fd` reports `events` or `timeout` elapses. Returns whether it
/// became ready.
fn poll_fd(fd: RawFd, events: libc::c_short, timeout: Duration) -> std::io::Result<bool> {
    let mut pfd = libc::pollfd {
        fd,
        events,
        revents: 0,
    };
    let millis = poll_millis(timeout);
    loop {
        // SAFETY: `pfd` is a single valid pollfd and the count passed is 1.
        let rc = unsafe { libc::poll(&mut pfd, 1, millis) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        return Ok(rc > 0);
    }
}

/// `poll` takes whole milliseconds; round up so sub-millisecond gaps still wait.
fn poll_millis(timeout: Duration) -> libc::c_int {
    let millis = timeout.as_micros().div_ceil(1000);
    millis.min(libc::c_int::MAX as u128) as libc::c_int
}
