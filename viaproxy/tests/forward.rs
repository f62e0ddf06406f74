/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::sync::atomic::Ordering;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use via_types::net::UpstreamAddr;
use viaproxy::config::HttpProxyServerConfig;

mod common;
use common::*;

#[tokio::test(flavor = "multi_thread")]
async fn absolute_target_rewritten_to_origin_form() {
    let reply = b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok".to_vec();
    let (origin_addr, received, _) = start_recording_origin(reply.clone()).await;
    let (_proxy, proxy_addr) = start_transparent_proxy(HttpProxyServerConfig::default()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    let req = format!(
        "GET http://{origin_addr}/foo HTTP/1.1\r\nHost: {origin_addr}\r\n\r\n"
    );
    client.write_all(req.as_bytes()).await.unwrap();

    let rsp = read_until_close(&mut client).await;
    assert_eq!(rsp, reply);

    let expected_upstream =
        format!("GET /foo HTTP/1.1\r\nHost: {origin_addr}\r\n\r\n").into_bytes();
    assert_eq!(*received.lock().unwrap(), expected_upstream);
}

#[tokio::test(flavor = "multi_thread")]
async fn head_response_has_no_body() {
    // Content-Length on a HEAD response frames nothing
    let reply = b"HTTP/1.0 200 OK\r\nContent-Length: 9999\r\n\r\n".to_vec();
    let (origin_addr, _, _) = start_recording_origin(reply.clone()).await;
    let (_proxy, proxy_addr) = start_transparent_proxy(HttpProxyServerConfig::default()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    let req = format!("HEAD /x HTTP/1.0\r\nHost: {origin_addr}\r\n\r\n");
    client.write_all(req.as_bytes()).await.unwrap();

    // HTTP/1.0 on both sides: the proxy forwards the head and closes
    let rsp = read_until_close(&mut client).await;
    assert_eq!(rsp, reply);
}

#[tokio::test(flavor = "multi_thread")]
async fn unframed_keepalive_response_gets_probed() {
    // no Content-Length, no Transfer-Encoding, but keep-alive: the proxy
    // frames what it can grab and retires the upstream
    let reply = b"HTTP/1.1 200 OK\r\nConnection: keep-alive\r\n\r\nhello".to_vec();
    let (origin_addr, _, _) = start_recording_origin(reply).await;
    let (_proxy, proxy_addr) = start_transparent_proxy(HttpProxyServerConfig::default()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    let req = format!("GET /probe HTTP/1.1\r\nHost: {origin_addr}\r\n\r\n");
    client.write_all(req.as_bytes()).await.unwrap();

    let head = read_head(&mut client).await;
    let content_length: usize = header_value(&head, "content-length")
        .expect("probed response must carry a content-length")
        .parse()
        .unwrap();
    assert_eq!(content_length, 5);
    let body = read_exact_len(&mut client, content_length).await;
    assert_eq!(body, b"hello");
}

#[tokio::test(flavor = "multi_thread")]
async fn upstream_connection_reused_within_host() {
    let (origin_a, accepted_a, served_a) = start_keepalive_origin().await;
    let (origin_b, accepted_b, _served_b) = start_keepalive_origin().await;
    let (_proxy, proxy_addr) = start_transparent_proxy(HttpProxyServerConfig::default()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    for path in ["/one", "/two"] {
        let req = format!("GET http://{origin_a}{path} HTTP/1.1\r\nHost: {origin_a}\r\n\r\n");
        client.write_all(req.as_bytes()).await.unwrap();
        let head = read_head(&mut client).await;
        assert!(head.starts_with(b"HTTP/1.1 200 OK\r\n"));
    }
    assert_eq!(accepted_a.load(Ordering::SeqCst), 1);
    assert_eq!(served_a.load(Ordering::SeqCst), 2);

    // changing the destination replaces the upstream socket
    let req = format!("GET http://{origin_b}/three HTTP/1.1\r\nHost: {origin_b}\r\n\r\n");
    client.write_all(req.as_bytes()).await.unwrap();
    let head = read_head(&mut client).await;
    assert!(head.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert_eq!(accepted_b.load(Ordering::SeqCst), 1);

    // and back again: the old binding is gone, so this is a fresh connect
    let req = format!("GET http://{origin_a}/four HTTP/1.1\r\nHost: {origin_a}\r\n\r\n");
    client.write_all(req.as_bytes()).await.unwrap();
    let head = read_head(&mut client).await;
    assert!(head.starts_with(b"HTTP/1.1 200 OK\r\n"));
    assert_eq!(accepted_a.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn proxy_connection_stripped_without_relay() {
    let reply = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec();
    let (origin_addr, received, _) = start_recording_origin(reply).await;
    let (_proxy, proxy_addr) = start_transparent_proxy(HttpProxyServerConfig::default()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    let req = format!(
        "GET http://{origin_addr}/p HTTP/1.1\r\nHost: {origin_addr}\r\nProxy-Connection: keep-alive\r\nAccept: */*\r\n\r\n"
    );
    client.write_all(req.as_bytes()).await.unwrap();
    let _ = read_until_close(&mut client).await;

    let upstream = received.lock().unwrap().clone();
    assert!(header_value(&upstream, "proxy-connection").is_none());
    assert_eq!(header_value(&upstream, "accept").as_deref(), Some("*/*"));
}

#[tokio::test(flavor = "multi_thread")]
async fn relay_proxy_keeps_absolute_target() {
    let reply = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec();
    let (relay_addr, received, _) = start_recording_origin(reply).await;

    let mut config = HttpProxyServerConfig::default();
    config.relay_proxy =
        Some(UpstreamAddr::from_host_port_str(&relay_addr.to_string(), 3128).unwrap());
    let (_proxy, proxy_addr) = start_transparent_proxy(config).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    client
        .write_all(
            b"GET http://example.com/foo HTTP/1.1\r\nHost: example.com\r\nProxy-Connection: keep-alive\r\n\r\n",
        )
        .await
        .unwrap();
    let _ = read_until_close(&mut client).await;

    let upstream = received.lock().unwrap().clone();
    assert!(upstream.starts_with(b"GET http://example.com/foo HTTP/1.1\r\n"));
    // through a relay the hop header is the relay's business
    assert_eq!(
        header_value(&upstream, "proxy-connection").as_deref(),
        Some("keep-alive")
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn chunked_request_body_forwarded() {
    let reply = b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec();
    let (origin_addr, received, _) = start_recording_origin_with_body(reply).await;
    let (_proxy, proxy_addr) = start_transparent_proxy(HttpProxyServerConfig::default()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    let req = format!(
        "POST /up HTTP/1.1\r\nHost: {origin_addr}\r\nTransfer-Encoding: chunked\r\n\r\n4\r\ndata\r\n0\r\n\r\n"
    );
    client.write_all(req.as_bytes()).await.unwrap();
    let _ = read_until_close(&mut client).await;

    let upstream = received.lock().unwrap().clone();
    let text = String::from_utf8(upstream).unwrap();
    assert!(text.ends_with("\r\n\r\n4\r\ndata\r\n0\r\n\r\n"));
}

/// Like the recording origin, but reads a chunked request body after the
/// head before replying.
async fn start_recording_origin_with_body(
    reply: Vec<u8>,
) -> (
    std::net::SocketAddr,
    std::sync::Arc<std::sync::Mutex<Vec<u8>>>,
    std::sync::Arc<std::sync::atomic::AtomicUsize>,
) {
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncReadExt;

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let accepted = Arc::new(AtomicUsize::new(0));

    let received_tx = Arc::clone(&received);
    let accepted_tx = Arc::clone(&accepted);
    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        accepted_tx.fetch_add(1, Ordering::SeqCst);
        let mut buf = [0u8; 4096];
        loop {
            let Ok(n) = stream.read(&mut buf).await else {
                break;
            };
            if n == 0 {
                break;
            }
            let done = {
                let mut all = received_tx.lock().unwrap();
                all.extend_from_slice(&buf[..n]);
                // terminal chunk seen, the request is complete
                all.windows(7).any(|w| w == b"\r\n0\r\n\r\n")
            };
            if done {
                let _ = stream.write_all(&reply).await;
                break;
            }
        }
        while matches!(stream.read(&mut buf).await, Ok(n) if n > 0) {}
    });
    (addr, received, accepted)
}
