//! Plays the microcontroller side of the link: streams the demo telemetry
//! and prints whatever comes back.
//!
//! Run with:
//!   cargo run --features cli -- listen tcp-listen://127.0.0.1:7000 --format pretty
//!
//! In another terminal:
//!   cargo run --example demo-traffic -- 127.0.0.1:7000

use std::time::{Duration, Instant};

use omnisoc::frame::Frame;
use omnisoc::link::{Link, LinkConfig, Result};
use omnisoc::transport::{TcpConfig, TcpStreamTransport, Transport};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let address = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "127.0.0.1:7000".to_string());

    let transport = TcpStreamTransport::new(TcpConfig::connect(address.clone()));
    let mut link = Link::open(transport, LinkConfig::default())?;
    eprintln!("Connected to {address}");

    let start = Instant::now();
    for _ in 0..50 {
        let t = start.elapsed().as_secs_f32();
        link.send(1, &[1.23, 4.56, t])?;
        link.send(5, &[5000.0])?;
        link.send(7, &[5.123, 1.0, 2.0, 5.5])?;

        for frame in drain_replies(&mut link)? {
            eprintln!("Received header {} values {:?}", frame.header, frame.values);
        }
        if link.expire_if_stale() {
            eprintln!("No reply for {:?}", link.config().timeout_period);
        }

        std::thread::sleep(Duration::from_millis(100));
    }

    link.close();
    Ok(())
}

/// Collect every reply waiting on the line. Corrupt or partial replies are
/// reported and skipped; only a failed connection stops the demo.
fn drain_replies<T: Transport>(link: &mut Link<T>) -> Result<Vec<Frame>> {
    let mut frames = Vec::new();
    loop {
        match link.poll() {
            Ok(Some(frame)) => frames.push(frame),
            Ok(None) => return Ok(frames),
            Err(err) if err.is_connection() => return Err(err),
            Err(err) => eprintln!("Dropped reply: {err}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::{TcpListener, TcpStream};

    use super::*;

    fn linked_pair() -> (Link<TcpStreamTransport>, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let transport =
            TcpStreamTransport::open_with(TcpConfig::connect(addr.to_string())).unwrap();
        let (peer, _) = listener.accept().unwrap();
        (Link::open(transport, LinkConfig::default()).unwrap(), peer)
    }

    #[test]
    fn corrupt_reply_is_skipped() {
        let (mut link, mut peer) = linked_pair();
        let resyncs = link.stats().resyncs;

        peer.write_all(&[0x00, 0x01, 0x01, 0x00, 0x00, 0x80, 0x3F, 0xBE])
            .unwrap();
        std::thread::sleep(Duration::from_millis(50));
        assert!(drain_replies(&mut link).unwrap().is_empty());
        assert_eq!(link.stats().resyncs, resyncs + 1);

        let reply = Frame::new(5, vec![5000.0]).unwrap();
        let mut received = Vec::new();
        for _ in 0..20 {
            peer.write_all(&reply.encode().unwrap()).unwrap();
            std::thread::sleep(Duration::from_millis(20));
            received = drain_replies(&mut link).unwrap();
            if !received.is_empty() {
                break;
            }
        }
        assert_eq!(received.first(), Some(&reply));
    }

    #[test]
    fn hang_up_stops_the_demo() {
        let (mut link, peer) = linked_pair();
        drop(peer);

        let err = drain_replies(&mut link).unwrap_err();
        assert!(err.is_connection());
    }
}
