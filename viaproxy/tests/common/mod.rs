/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use viaproxy::config::HttpProxyServerConfig;
use viaproxy::intercept::{ClientInfo, HttpProxyInterceptor, TransparentInterceptor};
use viaproxy::serve::http_proxy::HttpProxyServer;

/// Start a pass-through proxy on a free loopback port.
pub async fn start_transparent_proxy(
    config: HttpProxyServerConfig,
) -> (Arc<HttpProxyServer>, SocketAddr) {
    let server = HttpProxyServer::new(config, |_info: &ClientInfo| {
        Some(Box::new(TransparentInterceptor) as Box<dyn HttpProxyInterceptor>)
    });
    let addr = server.start().await.unwrap();
    (server, addr)
}

pub async fn start_proxy_with_factory<F>(
    config: HttpProxyServerConfig,
    factory: F,
) -> (Arc<HttpProxyServer>, SocketAddr)
where
    F: Fn(&ClientInfo) -> Option<Box<dyn HttpProxyInterceptor>> + Send + Sync + 'static,
{
    let server = HttpProxyServer::new(config, factory);
    let addr = server.start().await.unwrap();
    (server, addr)
}

/// An origin that records everything it receives. Per connection it reads
/// one request head, records it, writes `reply`, and then sits on the
/// socket until the peer closes.
pub async fn start_recording_origin(
    reply: Vec<u8>,
) -> (SocketAddr, Arc<Mutex<Vec<u8>>>, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let accepted = Arc::new(AtomicUsize::new(0));

    let received_tx = Arc::clone(&received);
    let accepted_tx = Arc::clone(&accepted);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            accepted_tx.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let received = Arc::clone(&received_tx);
            let reply = reply.clone();
            tokio::spawn(async move {
                let head = read_head(&mut stream).await;
                received.lock().unwrap().extend_from_slice(&head);
                if stream.write_all(&reply).await.is_err() {
                    return;
                }
                // hold the connection until the proxy lets go
                let mut sink = [0u8; 1024];
                while matches!(stream.read(&mut sink).await, Ok(n) if n > 0) {}
            });
        }
    });
    (addr, received, accepted)
}

/// An origin serving any number of bodiless keep-alive responses per
/// connection. Returns counters for accepted connections and served
/// requests.
pub async fn start_keepalive_origin() -> (SocketAddr, Arc<AtomicUsize>, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let served = Arc::new(AtomicUsize::new(0));

    let accepted_tx = Arc::clone(&accepted);
    let served_tx = Arc::clone(&served);
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            accepted_tx.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let served = Arc::clone(&served_tx);
            tokio::spawn(async move {
                loop {
                    let head = read_head(&mut stream).await;
                    if head.is_empty() {
                        break;
                    }
                    served.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    if stream
                        .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n")
                        .await
                        .is_err()
                    {
                        break;
                    }
                }
            });
        }
    });
    (addr, accepted, served)
}

/// Read up to and including the head/body separator, or until close.
pub async fn read_head(stream: &mut TcpStream) -> Vec<u8> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match stream.read(&mut byte).await {
            Ok(0) | Err(_) => break,
            Ok(_) => head.push(byte[0]),
        }
        if head.ends_with(b"\r\n\r\n") {
            break;
        }
    }
    head
}

pub async fn read_until_close(stream: &mut TcpStream) -> Vec<u8> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        match stream.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => data.extend_from_slice(&buf[..n]),
        }
    }
    data
}

pub async fn read_exact_len(stream: &mut TcpStream, len: usize) -> Vec<u8> {
    let mut data = vec![0u8; len];
    stream.read_exact(&mut data).await.unwrap();
    data
}

/// Pick one header value out of a raw head.
pub fn header_value(head: &[u8], name: &str) -> Option<String> {
    let text = String::from_utf8_lossy(head);
    for line in text.split("\r\n") {
        if let Some((n, v)) = line.split_once(':') {
            if n.trim().eq_ignore_ascii_case(name) {
                return Some(v.trim().to_string());
            }
        }
    }
    None
}
