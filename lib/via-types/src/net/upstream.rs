/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use thiserror::Error;

use super::Host;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamAddrParseError {
    #[error("empty address string")]
    Empty,
    #[error("empty host")]
    EmptyHost,
    #[error("invalid host")]
    InvalidHost,
    #[error("invalid port")]
    InvalidPort,
}

/// The `(host, port)` a request should be forwarded to.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UpstreamAddr {
    host: Host,
    port: u16,
}

impl UpstreamAddr {
    pub fn new(host: Host, port: u16) -> Self {
        UpstreamAddr { host, port }
    }

    #[inline]
    pub fn host(&self) -> &Host {
        &self.host
    }

    #[inline]
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn host_eq(&self, other: &UpstreamAddr) -> bool {
        self.host == other.host
    }

    /// Parse `host`, `host:` or `host:port`, with IPv6 hosts in brackets.
    pub fn from_host_port_str(
        s: &str,
        default_port: u16,
    ) -> Result<Self, UpstreamAddrParseError> {
        if s.is_empty() {
            return Err(UpstreamAddrParseError::Empty);
        }

        if let Some(stripped) = s.strip_prefix('[') {
            let Some(end) = stripped.find(']') else {
                return Err(UpstreamAddrParseError::InvalidHost);
            };
            let ip = IpAddr::from_str(&stripped[..end])
                .map_err(|_| UpstreamAddrParseError::InvalidHost)?;
            let port = parse_port_suffix(&stripped[end + 1..], default_port)?;
            return Ok(UpstreamAddr::new(Host::Ip(ip), port));
        }

        // a bare IPv6 address contains more than one colon and no brackets
        if s.matches(':').count() > 1 {
            let ip = IpAddr::from_str(s).map_err(|_| UpstreamAddrParseError::InvalidHost)?;
            return Ok(UpstreamAddr::new(Host::Ip(ip), default_port));
        }

        match s.split_once(':') {
            Some((host, port)) => {
                let host = Host::from_str(host)?;
                let port = parse_port_suffix_value(port, default_port)?;
                Ok(UpstreamAddr::new(host, port))
            }
            None => Ok(UpstreamAddr::new(Host::from_str(s)?, default_port)),
        }
    }
}

fn parse_port_suffix(s: &str, default_port: u16) -> Result<u16, UpstreamAddrParseError> {
    match s.strip_prefix(':') {
        Some(port) => parse_port_suffix_value(port, default_port),
        None => {
            if s.is_empty() {
                Ok(default_port)
            } else {
                Err(UpstreamAddrParseError::InvalidPort)
            }
        }
    }
}

fn parse_port_suffix_value(s: &str, default_port: u16) -> Result<u16, UpstreamAddrParseError> {
    if s.is_empty() {
        // "host:" is tolerated and falls back to the default port
        return Ok(default_port);
    }
    u16::from_str(s).map_err(|_| UpstreamAddrParseError::InvalidPort)
}

impl fmt::Display for UpstreamAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Host::Ip(IpAddr::V6(ip)) => write!(f, "[{ip}]:{}", self.port),
            host => write!(f, "{host}:{}", self.port),
        }
    }
}
