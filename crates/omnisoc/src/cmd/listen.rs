use std::io::ErrorKind;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;

use omnisoc_link::{LinkError, LinkEvent};
use omnisoc_transport::{is_hangup, Transport};

use crate::cmd::{header_selected, install_ctrlc_handler, ListenArgs};
use crate::exit::{link_error, CliResult, SUCCESS};
use crate::output::{print_frame, print_liveness, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let (events_tx, events) = mpsc::channel();
    let mut link = args.link.open()?.with_event_hook(move |event| {
        if matches!(
            event,
            LinkEvent::LivenessRestored | LinkEvent::LivenessExpired { .. }
        ) {
            let _ = events_tx.send(event.clone());
        }
    });
    let endpoint = link.transport().identifier().to_string();

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;

    while running.load(Ordering::SeqCst) {
        let polled = link.poll();
        link.expire_if_stale();
        for event in events.try_iter() {
            match event {
                LinkEvent::LivenessRestored => print_liveness(true, None, &endpoint, format),
                LinkEvent::LivenessExpired { since_last_live } => {
                    print_liveness(false, Some(since_last_live), &endpoint, format)
                }
                _ => {}
            }
        }

        let frame = match polled {
            Ok(Some(frame)) => frame,
            Ok(None) => continue,
            Err(err) if peer_hung_up(&err) => {
                tracing::info!(endpoint = %endpoint, "peer closed the link");
                return Ok(SUCCESS);
            }
            Err(err) if err.is_connection() => return Err(link_error("receive failed", err)),
            Err(err) => {
                tracing::debug!(error = %err, "frame dropped");
                continue;
            }
        };

        if !header_selected(args.headers.as_deref(), frame.header) {
            continue;
        }

        print_frame(&frame, &endpoint, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                return Ok(SUCCESS);
            }
        }
    }

    Ok(SUCCESS)
}

/// Whether the far end went away, as opposed to the line failing.
pub(crate) fn peer_hung_up(err: &LinkError) -> bool {
    match err {
        LinkError::Frame(omnisoc_frame::FrameError::Io(io)) => {
            is_hangup(io)
                || matches!(
                    io.kind(),
                    ErrorKind::BrokenPipe | ErrorKind::ConnectionReset
                )
        }
        _ => false,
    }
}
