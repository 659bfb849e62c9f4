use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use omnisoc_link::{Link, LinkConfig};
use omnisoc_transport::{TcpConfig, TcpRole, TcpStreamTransport, Transport, DEFAULT_BAUD_RATE};

use crate::exit::{link_error, CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod send;
pub mod version;

/// Transport behind a CLI session.
pub type BoxedTransport = Box<dyn Transport + Send>;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send every received frame back unchanged.
    Echo(EchoArgs),
    /// Send a single frame.
    Send(SendArgs),
    /// Print received frames and liveness changes.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where the link runs.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Endpoint {
    /// A serial device node.
    Serial(PathBuf),
    /// Connect to a TCP listener.
    TcpConnect(String),
    /// Accept one TCP peer.
    TcpListen(String),
}

impl FromStr for Endpoint {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.is_empty() {
            return Err("endpoint must not be empty".to_string());
        }
        if let Some(address) = input.strip_prefix("tcp-listen://") {
            return tcp_address(address).map(Endpoint::TcpListen);
        }
        if let Some(address) = input.strip_prefix("tcp://") {
            return tcp_address(address).map(Endpoint::TcpConnect);
        }
        if input.contains("://") {
            return Err(format!("unsupported endpoint scheme: {input}"));
        }
        Ok(Endpoint::Serial(PathBuf::from(input)))
    }
}

fn tcp_address(address: &str) -> Result<String, String> {
    match address.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
            Ok(address.to_string())
        }
        _ => Err(format!("expected host:port, got {address:?}")),
    }
}

/// Endpoint and line settings shared by every link command.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Device path, tcp://host:port, or tcp-listen://host:port.
    pub endpoint: Endpoint,
    /// Serial line rate (ignored for TCP endpoints).
    #[arg(long, env = "OMNISOC_BAUD", default_value_t = DEFAULT_BAUD_RATE)]
    pub baud: u32,
    /// Maximum wait per read (e.g. 20ms, 1s).
    #[arg(long, default_value = "20ms")]
    pub read_timeout: String,
    /// Time without a valid frame before the link counts as down.
    #[arg(long, default_value = "1s")]
    pub liveness_timeout: String,
}

impl LinkArgs {
    /// Build the transport and open a session on it.
    pub fn open(&self) -> CliResult<Link<BoxedTransport>> {
        let read_timeout = parse_duration(&self.read_timeout)?;
        let timeout_period = parse_duration(&self.liveness_timeout)?;

        let transport = self.transport(read_timeout)?;
        let config = LinkConfig {
            timeout_period,
            ..LinkConfig::default()
        };
        Link::open(transport, config).map_err(|err| link_error("open failed", err))
    }

    fn transport(&self, read_timeout: Duration) -> CliResult<BoxedTransport> {
        match &self.endpoint {
            Endpoint::Serial(path) => serial_transport(path, self.baud, read_timeout),
            Endpoint::TcpConnect(address) => Ok(Box::new(TcpStreamTransport::new(TcpConfig {
                address: address.clone(),
                role: TcpRole::Connect,
                read_timeout,
            }))),
            Endpoint::TcpListen(address) => Ok(Box::new(TcpStreamTransport::new(TcpConfig {
                address: address.clone(),
                role: TcpRole::Listen,
                read_timeout,
            }))),
        }
    }
}

#[cfg(unix)]
fn serial_transport(
    path: &std::path::Path,
    baud: u32,
    read_timeout: Duration,
) -> CliResult<BoxedTransport> {
    use omnisoc_transport::{SerialConfig, SerialPort};

    let config = SerialConfig {
        baud_rate: baud,
        read_timeout,
        ..SerialConfig::new(path)
    };
    Ok(Box::new(SerialPort::new(config)))
}

#[cfg(not(unix))]
fn serial_transport(
    path: &std::path::Path,
    _baud: u32,
    _read_timeout: Duration,
) -> CliResult<BoxedTransport> {
    Err(CliError::new(
        USAGE,
        format!(
            "serial devices are only supported on Unix ({}); use a tcp:// endpoint",
            path.display()
        ),
    ))
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Only echo these headers (comma-separated). Default: all.
    #[arg(long, value_delimiter = ',')]
    pub headers: Option<Vec<u16>>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Message header (type id).
    #[arg(long)]
    pub header: u16,
    /// Values to carry (comma-separated, at most 10).
    #[arg(long, value_delimiter = ',', allow_negative_numbers = true)]
    pub values: Vec<f32>,
    /// Wait for one frame in reply and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the reply when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub link: LinkArgs,
    /// Only print these headers (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub headers: Option<Vec<u16>>,
    /// Exit after printing N frames.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

pub fn header_selected(filter: Option<&[u16]>, header: u16) -> bool {
    filter.is_none_or(|headers| headers.contains(&header))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_parsing() {
        assert_eq!(
            "/dev/ttyUSB0".parse::<Endpoint>().unwrap(),
            Endpoint::Serial(PathBuf::from("/dev/ttyUSB0"))
        );
        assert_eq!(
            "tcp://127.0.0.1:7000".parse::<Endpoint>().unwrap(),
            Endpoint::TcpConnect("127.0.0.1:7000".to_string())
        );
        assert_eq!(
            "tcp-listen://0.0.0.0:7000".parse::<Endpoint>().unwrap(),
            Endpoint::TcpListen("0.0.0.0:7000".to_string())
        );
    }

    #[test]
    fn endpoint_rejects_bad_input() {
        assert!("".parse::<Endpoint>().is_err());
        assert!("tcp://localhost".parse::<Endpoint>().is_err());
        assert!("tcp://:7000".parse::<Endpoint>().is_err());
        assert!("tcp://host:99999".parse::<Endpoint>().is_err());
        assert!("udp://host:7000".parse::<Endpoint>().is_err());
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("bad").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn header_filter() {
        assert!(header_selected(None, 9));
        assert!(header_selected(Some(&[1, 5]), 5));
        assert!(!header_selected(Some(&[1, 5]), 7));
    }
}
