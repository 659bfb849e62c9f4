use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use omnisoc_link::LinkError;
use omnisoc_transport::Transport;

use crate::cmd::listen::peer_hung_up;
use crate::cmd::{header_selected, install_ctrlc_handler, EchoArgs};
use crate::exit::{link_error, CliError, CliResult, SUCCESS};
use crate::output::OutputFormat;

enum RecvErrorDisposition {
    Break,
    Continue,
    Fatal(CliError),
}

pub fn run(args: EchoArgs, _format: OutputFormat) -> CliResult<i32> {
    let mut link = args.link.open()?;
    let endpoint = link.transport().identifier().to_string();

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    while running.load(Ordering::SeqCst) {
        link.expire_if_stale();
        let frame = match link.poll() {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(err) => match classify_recv_error(err) {
                RecvErrorDisposition::Break => break,
                RecvErrorDisposition::Continue => continue,
                RecvErrorDisposition::Fatal(cli_err) => return Err(cli_err),
            },
        };

        if !header_selected(args.headers.as_deref(), frame.header) {
            continue;
        }

        tracing::info!(
            endpoint = %endpoint,
            header = frame.header,
            count = frame.values.len(),
            "echoing frame"
        );

        match link.send_frame(&frame) {
            Ok(()) => {}
            Err(err) if peer_hung_up(&err) => break,
            Err(err) => return Err(link_error("echo send failed", err)),
        }
    }

    Ok(SUCCESS)
}

fn classify_recv_error(err: LinkError) -> RecvErrorDisposition {
    if peer_hung_up(&err) {
        return RecvErrorDisposition::Break;
    }
    if !err.is_connection() {
        tracing::debug!(error = %err, "frame dropped");
        return RecvErrorDisposition::Continue;
    }
    RecvErrorDisposition::Fatal(link_error("receive failed", err))
}

#[cfg(test)]
mod tests {
    use omnisoc_frame::FrameError;
    use omnisoc_transport::TransportError;

    use super::*;

    #[test]
    fn hangup_breaks_loop() {
        let disposition = classify_recv_error(LinkError::Frame(FrameError::Io(
            std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
        )));
        assert!(matches!(disposition, RecvErrorDisposition::Break));
    }

    #[test]
    fn corrupt_frame_continues() {
        let disposition = classify_recv_error(LinkError::Frame(FrameError::ChecksumMismatch {
            computed: 0xBF,
            received: 0xBE,
        }));
        assert!(matches!(disposition, RecvErrorDisposition::Continue));

        let disposition = classify_recv_error(LinkError::Frame(FrameError::Incomplete {
            expected: 8,
            received: 4,
        }));
        assert!(matches!(disposition, RecvErrorDisposition::Continue));
    }

    #[test]
    fn transport_failure_is_fatal() {
        let disposition = classify_recv_error(LinkError::Connection(TransportError::NotOpen));
        assert!(matches!(disposition, RecvErrorDisposition::Fatal(_)));
    }
}
