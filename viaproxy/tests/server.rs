/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use viaproxy::config::HttpProxyServerConfig;

mod common;
use common::*;

#[tokio::test(flavor = "multi_thread")]
async fn registry_tracks_connections() {
    let mut config = HttpProxyServerConfig::default();
    config.sweep_interval = Duration::from_millis(50);
    let (proxy, proxy_addr) = start_transparent_proxy(config).await;

    let client = TcpStream::connect(proxy_addr).await.unwrap();
    wait_for(|| proxy.alive_connection_count() == 1).await;

    drop(client);
    wait_for(|| proxy.alive_connection_count() == 0).await;
}

#[tokio::test(flavor = "multi_thread")]
async fn quit_stops_accepting() {
    let (proxy, proxy_addr) = start_transparent_proxy(HttpProxyServerConfig::default()).await;

    // the server is live
    let probe = TcpStream::connect(proxy_addr).await;
    assert!(probe.is_ok());
    drop(probe);

    proxy.quit();

    // once the listener is gone, connects are refused
    let mut refused = false;
    for _ in 0..200 {
        match TcpStream::connect(proxy_addr).await {
            Ok(_) => tokio::time::sleep(Duration::from_millis(10)).await,
            Err(_) => {
                refused = true;
                break;
            }
        }
    }
    assert!(refused, "the acceptor kept running after quit");
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_request_line_answered_with_400() {
    let (_proxy, proxy_addr) = start_transparent_proxy(HttpProxyServerConfig::default()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    client.write_all(b"NOT A VALID LINE AT ALL\r\n\r\n").await.unwrap();

    let rsp = read_until_close(&mut client).await;
    assert!(rsp.starts_with(b"HTTP/1.0 400 Bad Request\r\n"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unsupported_version_answered_with_501() {
    let (_proxy, proxy_addr) = start_transparent_proxy(HttpProxyServerConfig::default()).await;

    let mut client = TcpStream::connect(proxy_addr).await.unwrap();
    client
        .write_all(b"GET http://h.example/ HTTP/3.0\r\nHost: h.example\r\n\r\n")
        .await
        .unwrap();

    let rsp = read_until_close(&mut client).await;
    assert!(rsp.starts_with(b"HTTP/1.0 501 Not Implemented\r\n"));
}

async fn wait_for<F>(mut check: F)
where
    F: FnMut() -> bool,
{
    for _ in 0..200 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}
