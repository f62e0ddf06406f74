/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

//! A forward proxy on 127.0.0.1:8118 that logs every request line and
//! tags responses with a Via-style header.
//!
//! Run it, then try `curl -x http://127.0.0.1:8118 http://example.com/`.

use via_http::client::HttpForwardRemoteResponse;
use via_http::server::HttpProxyClientRequest;
use viaproxy::config::HttpProxyServerConfig;
use viaproxy::intercept::{ClientInfo, HttpProxyInterceptor, PipelineControl};
use viaproxy::serve::http_proxy::HttpProxyServer;

struct LoggingInterceptor {
    peer: std::net::SocketAddr,
}

impl HttpProxyInterceptor for LoggingInterceptor {
    fn on_receive_request(
        &mut self,
        req: &mut HttpProxyClientRequest,
        _ctl: &mut PipelineControl<'_>,
    ) {
        println!("{} -> {} {}", self.peer, req.method, req.uri);
    }

    fn on_receive_response(
        &mut self,
        _req: &HttpProxyClientRequest,
        rsp: &mut HttpForwardRemoteResponse,
        _ctl: &mut PipelineControl<'_>,
    ) {
        rsp.headers.set("X-Proxied-By", Some("viaproxy"));
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let server = HttpProxyServer::new(
        HttpProxyServerConfig::with_port(8118),
        |info: &ClientInfo| {
            Some(Box::new(LoggingInterceptor {
                peer: info.client_addr,
            }) as Box<dyn HttpProxyInterceptor>)
        },
    );
    let addr = server.start().await?;
    println!("proxying on {addr}, ctrl-c to stop");

    tokio::signal::ctrl_c().await?;
    server.quit();
    Ok(())
}
