use std::io::Write;
use std::net::{SocketAddr, TcpStream, UdpSocket};
use std::time::Duration;

use syslog::emitter::{Emitter, TcpEmitter, UdpEmitter};
use syslog::rfc5424::parse_message;
use syslog::server::{Server, ServerConfig};
use syslog::{Entry, EntryBuilder, FramerConfig, FramingMode, Priority, StructuredElement};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

fn entry(i: usize) -> Entry {
    EntryBuilder::new(Priority::DEFAULT)
        .hostname("client")
        .appname("transport-test")
        .pid(4242)
        .element(StructuredElement::with_params("seq@32473", [("n", i.to_string())]).unwrap())
        .body(format!("multi\nline {i}"))
        .build()
        .unwrap()
}

async fn collect_over_tcp(mode: FramingMode, count: usize) -> Vec<Entry> {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = ServerConfig {
        framing: FramerConfig::with_mode(mode),
        ..ServerConfig::default()
    };
    let server = Server::new(config, move |_peer: SocketAddr| {
        let tx = tx.clone();
        move |entry: Entry| {
            let _ = tx.send(entry);
        }
    });

    let cancel = CancellationToken::new();
    let handle = tokio::spawn({
        let cancel = cancel.clone();
        async move { server.serve(listener, cancel).await }
    });

    tokio::task::spawn_blocking(move || {
        // a broken peer must not affect the next connection
        let mut garbage = TcpStream::connect(addr).unwrap();
        garbage.write_all(b"not a length prefix\n").unwrap();
        drop(garbage);

        let mut emitter = TcpEmitter::tcp(addr, mode).unwrap();
        for i in 0..count {
            emitter.emit(&entry(i)).unwrap();
        }
        emitter.close().unwrap();
    })
    .await
    .unwrap();

    let mut received = Vec::with_capacity(count);
    for _ in 0..count {
        let entry = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("entry not received in time")
            .unwrap();
        received.push(entry);
    }

    cancel.cancel();
    handle.await.unwrap().unwrap();

    received
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tcp_octet_counting_round_trip() {
    let received = collect_over_tcp(FramingMode::OctetCounting, 3).await;

    for (i, got) in received.iter().enumerate() {
        assert_eq!(got, &entry(i));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn tcp_line_framing() {
    // LF inside the body splits the message in line mode, so only the
    // single line part survives as its own frame
    let received = collect_over_tcp(FramingMode::Line, 1).await;

    assert_eq!(received[0].hostname(), Some("client"));
    assert_eq!(received[0].msg().as_deref(), Some("multi"));
}

#[test]
fn udp_one_entry_per_datagram() {
    let receiver = UdpSocket::bind("127.0.0.1:0").unwrap();
    receiver
        .set_read_timeout(Some(Duration::from_secs(5)))
        .unwrap();

    let mut emitter = UdpEmitter::connect(receiver.local_addr().unwrap()).unwrap();
    emitter.emit(&entry(7)).unwrap();
    emitter.emit(&entry(8)).unwrap();

    let mut buf = [0u8; 2048];
    for i in [7, 8] {
        let (n, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(parse_message(&buf[..n]).unwrap(), entry(i));
    }
}

#[cfg(unix)]
mod unix {
    use std::io::Read;
    use std::os::unix::net::{UnixDatagram, UnixListener};

    use syslog::emitter::UnixEmitter;

    use super::*;

    #[test]
    fn datagram_socket() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.sock");
        let receiver = UnixDatagram::bind(&path).unwrap();
        receiver
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();

        let mut emitter = UnixEmitter::connect(&path).unwrap();
        assert!(!emitter.is_stream());
        emitter.emit(&entry(1)).unwrap();

        let mut buf = [0u8; 2048];
        let n = receiver.recv(&mut buf).unwrap();
        assert_eq!(parse_message(&buf[..n]).unwrap(), entry(1));
    }

    #[test]
    fn stream_socket_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let mut emitter = UnixEmitter::connect(&path).unwrap();
        assert!(emitter.is_stream());
        emitter.emit(&entry(2)).unwrap();
        emitter.close().unwrap();

        let (mut conn, _) = listener.accept().unwrap();
        let mut received = Vec::new();
        conn.read_to_end(&mut received).unwrap();

        assert_eq!(received.pop(), Some(0));
        assert_eq!(parse_message(&received).unwrap(), entry(2));
    }
}
