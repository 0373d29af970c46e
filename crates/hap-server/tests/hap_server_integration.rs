//! Integration tests driving a real [`Server`] over real TCP sockets.
//!
//! Each test starts a server bound to an ephemeral port, connects a plain
//! `TcpStream`, and drives one of the scenarios end to end: pair-setup,
//! the mid-stream handoff to encrypted framing, rejection of privileged
//! routes before that handoff, a deferred (snapshot-style) response, a
//! keep-alive connection carrying two sequential requests, an
//! out-of-band event pushed to an already-connected controller, and
//! `stop()` closing the listener and any live connections.

use std::time::Duration;

use bytes::Bytes;
use hap_crypto::{CryptoSession, SessionKeys, derive_session_keys};
use hap_demo_handler::DemoHandler;
use hap_server::{Server, ServerRuntimeConfig};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

async fn start_server() -> (Server<DemoHandler>, String) {
    let config = ServerRuntimeConfig { bind_address: "127.0.0.1:0".to_string(), ..ServerRuntimeConfig::default() };
    let server = Server::bind(config, DemoHandler::new()).await.unwrap();
    let addr = server.local_addr().unwrap().to_string();
    (server, addr)
}

async fn read_some(stream: &mut TcpStream) -> Vec<u8> {
    let mut buf = vec![0u8; 8192];
    let n = timeout(Duration::from_secs(5), stream.read(&mut buf)).await.expect("read timed out").expect("read failed");
    buf.truncate(n);
    buf
}

const PAIR_SETUP_REQUEST: &[u8] = b"POST /pair-setup HTTP/1.1\r\nContent-Length: 0\r\n\r\n";

#[tokio::test]
async fn pair_setup_handoff_then_encrypted_accessories_request() {
    let (server, addr) = start_server().await;
    tokio::spawn(server.run());

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream.write_all(PAIR_SETUP_REQUEST).await.unwrap();

    let reply = read_some(&mut stream).await;
    assert!(reply.windows(12).any(|w| w == b"HTTP/1.1 200"));

    let accessory_keys = derive_session_keys(&[0x24u8; 32]);
    let controller_keys = SessionKeys { write_key: accessory_keys.read_key.clone(), read_key: accessory_keys.write_key.clone() };
    let mut controller = CryptoSession::new(&controller_keys);

    let request = b"GET /accessories HTTP/1.1\r\nContent-Length: 0\r\n\r\n";
    let wire = controller.encrypt(request).unwrap();
    stream.write_all(&wire).await.unwrap();

    let encrypted_reply = read_some(&mut stream).await;
    controller.feed_ciphertext(&encrypted_reply);
    let plaintext = controller.drain_plaintext().unwrap().unwrap();
    assert!(plaintext.windows(4).any(|w| w == b"acce"));
}

#[tokio::test]
async fn accessories_before_pairing_is_rejected_in_plaintext() {
    let (server, addr) = start_server().await;
    tokio::spawn(server.run());

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream.write_all(b"GET /accessories HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await.unwrap();

    let reply = read_some(&mut stream).await;
    assert!(reply.windows(4).any(|w| w == b"-704"));
}

#[tokio::test]
async fn deferred_snapshot_resolves_without_blocking_the_connection() {
    let (server, addr) = start_server().await;
    tokio::spawn(server.run());

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream.write_all(b"GET /snapshot HTTP/1.1\r\nContent-Length: 0\r\n\r\n").await.unwrap();

    let reply = read_some(&mut stream).await;
    assert!(reply.windows(8).any(|w| w == b"fakesnap"));
}

#[tokio::test]
async fn keep_alive_connection_serves_two_sequential_requests() {
    let (server, addr) = start_server().await;
    tokio::spawn(server.run());

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    stream.write_all(PAIR_SETUP_REQUEST).await.unwrap();
    let first_reply = read_some(&mut stream).await;
    assert!(first_reply.windows(12).any(|w| w == b"HTTP/1.1 200"));

    stream.write_all(PAIR_SETUP_REQUEST).await.unwrap();
    let second_reply = read_some(&mut stream).await;
    assert!(second_reply.windows(12).any(|w| w == b"HTTP/1.1 200"));
}

#[tokio::test]
async fn pushed_event_is_delivered_to_a_connected_controller() {
    let (server, addr) = start_server().await;
    let handle = server.handle();
    tokio::spawn(server.run());

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    let peer = stream.local_addr().unwrap();
    stream.write_all(PAIR_SETUP_REQUEST).await.unwrap();
    let _ = read_some(&mut stream).await;

    while handle.connection_count().await == 0 {
        tokio::task::yield_now().await;
    }

    let delivered = handle.push_event(peer, Bytes::from_static(br#"{"characteristics":[]}"#)).await;
    assert!(delivered);

    // The connection is already paired, so the pushed frame must arrive
    // encrypted under the same session the pair-setup handoff installed.
    let accessory_keys = derive_session_keys(&[0x24u8; 32]);
    let controller_keys = SessionKeys { write_key: accessory_keys.read_key.clone(), read_key: accessory_keys.write_key.clone() };
    let mut controller = CryptoSession::new(&controller_keys);

    let event = read_some(&mut stream).await;
    controller.feed_ciphertext(&event);
    let plaintext = controller.drain_plaintext().unwrap().unwrap();
    assert!(plaintext.windows(5).any(|w| w == b"EVENT"));
}

#[tokio::test]
async fn push_event_to_an_unknown_peer_returns_false() {
    let (server, _addr) = start_server().await;
    let handle = server.handle();
    tokio::spawn(server.run());

    let unknown: std::net::SocketAddr = "127.0.0.1:1".parse().unwrap();
    let delivered = handle.push_event(unknown, Bytes::from_static(b"{}")).await;
    assert!(!delivered);
}

#[tokio::test]
async fn stop_closes_the_listener() {
    let (server, addr) = start_server().await;
    let handle = server.handle();
    let run_task = tokio::spawn(server.run());

    handle.stop();
    run_task.await.unwrap().unwrap();

    assert!(TcpStream::connect(&addr).await.is_err());
}

#[tokio::test]
async fn stop_disconnects_an_already_connected_controller() {
    let (server, addr) = start_server().await;
    let handle = server.handle();
    tokio::spawn(server.run());

    let mut stream = TcpStream::connect(&addr).await.unwrap();
    while handle.connection_count().await == 0 {
        tokio::task::yield_now().await;
    }

    handle.stop();

    let mut buf = [0u8; 8];
    let n = timeout(Duration::from_secs(5), stream.read(&mut buf)).await.expect("read timed out").expect("read failed");
    assert_eq!(n, 0, "connection should be closed, not errored, on shutdown");
}

#[tokio::test]
async fn connection_count_tracks_a_live_connection() {
    let (server, addr) = start_server().await;
    let handle = server.handle();
    assert_eq!(handle.connection_count().await, 0);
    tokio::spawn(server.run());

    let stream = TcpStream::connect(&addr).await.unwrap();
    while handle.connection_count().await == 0 {
        tokio::task::yield_now().await;
    }
    assert_eq!(handle.connection_count().await, 1);
    drop(stream);
}
