/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use viaproxy::config::HttpProxyServerConfig;

mod common;
use common::*;

async fn start_echo_origin() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut stream, _)) = listener.accept().await else {
                break;
            };
            tokio::spawn(async move {
                let mut buf = [0u8; 4096];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
    addr
}

#[tokio::test(flavor = "multi_thread")]
async fn connect_tunnel_is_opaque() {
    let origin_addr = start_echo_origin().await;
    let (_proxy, proxy_addr) = start_transparent_proxy(HttpProxyServerConfig::default()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    let req = format!("CONNECT {origin_addr} HTTP/1.1\r\nHost: {origin_addr}\r\n\r\n");
    client.write_all(req.as_bytes()).await.unwrap();

    let head = read_head(&mut client).await;
    assert_eq!(head, b"HTTP/1.1 200 Connection established\r\n\r\n");

    client.write_all(b"ping").await.unwrap();
    let echoed = read_exact_len(&mut client, 4).await;
    assert_eq!(echoed, b"ping");

    client.write_all(b"\x00\x01\x02\xff").await.unwrap();
    let echoed = read_exact_len(&mut client, 4).await;
    assert_eq!(echoed, b"\x00\x01\x02\xff");
}

#[tokio::test(flavor = "multi_thread")]
async fn connect_failure_answers_bad_gateway() {
    // a port nobody listens on
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_addr = listener.local_addr().unwrap();
    drop(listener);

    let (_proxy, proxy_addr) = start_transparent_proxy(HttpProxyServerConfig::default()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    let req = format!("CONNECT {dead_addr} HTTP/1.1\r\nHost: {dead_addr}\r\n\r\n");
    client.write_all(req.as_bytes()).await.unwrap();

    let rsp = read_until_close(&mut client).await;
    assert!(rsp.starts_with(b"HTTP/1.0 502 Bad Gateway\r\n"));
}
