/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use super::UpstreamAddrParseError;

/// Domain or IP address of a remote peer, without the port.
///
/// Domain names are stored lower-cased so that two spellings of the same
/// host compare equal.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Host {
    Ip(IpAddr),
    Domain(String),
}

impl Host {
    pub fn is_empty(&self) -> bool {
        match self {
            Host::Ip(_) => false,
            Host::Domain(domain) => domain.is_empty(),
        }
    }
}

impl FromStr for Host {
    type Err = UpstreamAddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(UpstreamAddrParseError::EmptyHost);
        }
        if let Some(stripped) = s.strip_prefix('[') {
            let Some(inner) = stripped.strip_suffix(']') else {
                return Err(UpstreamAddrParseError::InvalidHost);
            };
            let ip = IpAddr::from_str(inner).map_err(|_| UpstreamAddrParseError::InvalidHost)?;
            return Ok(Host::Ip(ip));
        }
        if let Ok(ip) = IpAddr::from_str(s) {
            return Ok(Host::Ip(ip));
        }
        if s.contains(':') || s.contains('/') || s.contains(char::is_whitespace) {
            return Err(UpstreamAddrParseError::InvalidHost);
        }
        Ok(Host::Domain(s.to_ascii_lowercase()))
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Host::Ip(ip) => write!(f, "{ip}"),
            Host::Domain(domain) => f.write_str(domain),
        }
    }
}
