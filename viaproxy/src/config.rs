/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use via_types::net::UpstreamAddr;

/// Config for one proxy server instance. Built programmatically by the
/// host; there is no config file layer here.
#[derive(Clone)]
pub struct HttpProxyServerConfig {
    /// local port to listen on, 0 picks a free one
    pub listen_port: u16,
    /// bind the IPv6 loopback instead of the IPv4 one
    pub listen_ipv6: bool,
    /// optional upstream relay proxy all requests are forwarded to;
    /// when set, request targets are kept in absolute form
    pub relay_proxy: Option<UpstreamAddr>,
    pub buffer_size: usize,
    pub req_hdr_max_size: usize,
    pub rsp_hdr_max_size: usize,
    /// cap on chunk-size and trailer lines inside a body
    pub body_line_max_len: usize,
    pub tcp_copy_buffer_size: usize,
    /// how often the connection registry is swept for dead entries
    pub sweep_interval: Duration,
}

impl Default for HttpProxyServerConfig {
    fn default() -> Self {
        HttpProxyServerConfig {
            listen_port: 0,
            listen_ipv6: false,
            relay_proxy: None,
            buffer_size: 8192,
            req_hdr_max_size: 65536,
            rsp_hdr_max_size: 65536,
            body_line_max_len: 8192,
            tcp_copy_buffer_size: 16384,
            sweep_interval: Duration::from_secs(300),
        }
    }
}

impl HttpProxyServerConfig {
    pub fn with_port(listen_port: u16) -> Self {
        HttpProxyServerConfig {
            listen_port,
            ..Default::default()
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        let ip = if self.listen_ipv6 {
            IpAddr::V6(Ipv6Addr::LOCALHOST)
        } else {
            IpAddr::V4(Ipv4Addr::LOCALHOST)
        };
        SocketAddr::new(ip, self.listen_port)
    }
}
