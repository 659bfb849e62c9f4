mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(name = "omnisoc", version, about = "OmniSoc serial link CLI")]
struct Cli {
    /// Output format.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(
        long,
        value_name = "LEVEL",
        env = "OMNISOC_LOG_LEVEL",
        default_value = "info",
        global = true
    )]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmd::Endpoint;

    #[test]
    fn parses_send_subcommand() {
        let cli = Cli::try_parse_from([
            "omnisoc",
            "send",
            "tcp://127.0.0.1:7000",
            "--header",
            "7",
            "--values",
            "5.123,-1,2,5.5",
        ])
        .expect("send args should parse");

        let Command::Send(args) = cli.command else {
            panic!("expected send command");
        };
        assert_eq!(args.header, 7);
        assert_eq!(args.values, vec![5.123, -1.0, 2.0, 5.5]);
        assert_eq!(
            args.link.endpoint,
            Endpoint::TcpConnect("127.0.0.1:7000".to_string())
        );
        assert_eq!(args.link.read_timeout, "20ms");
    }

    #[test]
    fn send_requires_header() {
        let err = Cli::try_parse_from(["omnisoc", "send", "/dev/ttyUSB0", "--values", "1"])
            .expect_err("missing header should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn parses_listen_with_filters() {
        let cli = Cli::try_parse_from([
            "omnisoc",
            "listen",
            "/dev/ttyACM0",
            "--baud",
            "115200",
            "--headers",
            "1,5",
            "--count",
            "3",
        ])
        .expect("listen args should parse");

        let Command::Listen(args) = cli.command else {
            panic!("expected listen command");
        };
        assert_eq!(args.link.baud, 115_200);
        assert_eq!(args.headers, Some(vec![1, 5]));
        assert_eq!(args.count, Some(3));
    }

    #[test]
    fn rejects_unknown_endpoint_scheme() {
        let err = Cli::try_parse_from(["omnisoc", "echo", "udp://127.0.0.1:9"])
            .expect_err("udp endpoint should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }
}
