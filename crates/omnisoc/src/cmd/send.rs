use std::time::{Duration, Instant};

use omnisoc_frame::{Frame, MAX_VALUES};
use omnisoc_link::Link;
use omnisoc_transport::Transport;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{link_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_frame, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    if args.values.len() > MAX_VALUES {
        return Err(CliError::new(
            USAGE,
            format!(
                "--values takes at most {MAX_VALUES} numbers, got {}",
                args.values.len()
            ),
        ));
    }
    let wait_timeout = parse_duration(&args.wait_timeout)?;

    let mut link = args.link.open()?;
    link.send(args.header, &args.values)
        .map_err(|err| link_error("send failed", err))?;
    tracing::debug!(header = args.header, count = args.values.len(), "frame sent");

    if args.wait {
        let frame = wait_for_reply(&mut link, wait_timeout)?;
        print_frame(&frame, link.transport().identifier(), format);
    }

    Ok(SUCCESS)
}

trait ReplySource {
    fn poll_reply(&mut self) -> omnisoc_link::Result<Option<Frame>>;
}

impl<T: Transport> ReplySource for Link<T> {
    fn poll_reply(&mut self) -> omnisoc_link::Result<Option<Frame>> {
        self.poll()
    }
}

/// Poll until a valid frame arrives. Corrupt frames are skipped; a failed
/// connection ends the wait.
fn wait_for_reply<R: ReplySource>(source: &mut R, timeout: Duration) -> CliResult<Frame> {
    let deadline = Instant::now() + timeout;
    loop {
        match source.poll_reply() {
            Ok(Some(frame)) => return Ok(frame),
            Ok(None) => {}
            Err(err) if err.is_connection() => return Err(link_error("receive failed", err)),
            Err(err) => tracing::debug!(error = %err, "skipping bad reply"),
        }
        if Instant::now() >= deadline {
            return Err(CliError::new(
                TIMEOUT,
                format!("no reply within {timeout:?}"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use omnisoc_frame::FrameError;
    use omnisoc_link::LinkError;

    use super::*;
    use crate::exit::FAILURE;

    struct ScriptedReplies {
        script: VecDeque<omnisoc_link::Result<Option<Frame>>>,
        calls: usize,
    }

    impl ScriptedReplies {
        fn new(script: Vec<omnisoc_link::Result<Option<Frame>>>) -> Self {
            Self {
                script: script.into(),
                calls: 0,
            }
        }
    }

    impl ReplySource for ScriptedReplies {
        fn poll_reply(&mut self) -> omnisoc_link::Result<Option<Frame>> {
            self.calls += 1;
            self.script.pop_front().unwrap_or(Ok(None))
        }
    }

    #[test]
    fn skips_idle_and_corrupt_frames() {
        let reply = Frame::new(5, vec![5000.0]).unwrap();
        let mut source = ScriptedReplies::new(vec![
            Ok(None),
            Err(LinkError::Frame(FrameError::ChecksumMismatch {
                computed: 1,
                received: 2,
            })),
            Ok(Some(reply.clone())),
        ]);

        let frame = wait_for_reply(&mut source, Duration::from_secs(5)).unwrap();
        assert_eq!(frame, reply);
        assert_eq!(source.calls, 3);
    }

    #[test]
    fn connection_failure_ends_wait() {
        let mut source = ScriptedReplies::new(vec![Err(LinkError::Frame(FrameError::Io(
            std::io::Error::from(std::io::ErrorKind::UnexpectedEof),
        )))]);

        let err = wait_for_reply(&mut source, Duration::from_secs(5)).unwrap_err();
        assert_eq!(err.code, FAILURE);
    }

    #[test]
    fn silent_line_times_out() {
        let mut source = ScriptedReplies::new(Vec::new());

        let err = wait_for_reply(&mut source, Duration::from_millis(5)).unwrap_err();
        assert_eq!(err.code, TIMEOUT);
    }
}
