/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use http::Uri;

use via_types::net::UpstreamAddr;

use crate::server::HttpRequestParseError;

pub trait UriExt {
    fn get_upstream_with_default_port(
        &self,
        default_port: u16,
    ) -> Result<UpstreamAddr, HttpRequestParseError>;
}

impl UriExt for Uri {
    fn get_upstream_with_default_port(
        &self,
        default_port: u16,
    ) -> Result<UpstreamAddr, HttpRequestParseError> {
        let Some(authority) = self.authority() else {
            return Err(HttpRequestParseError::InvalidRequestTarget);
        };
        let s = authority.as_str();
        let s = s.rsplit_once('@').map(|(_, host)| host).unwrap_or(s);
        UpstreamAddr::from_host_port_str(s, default_port)
            .map_err(|_| HttpRequestParseError::InvalidRequestTarget)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn absolute_form() {
        let uri = Uri::from_str("http://example.com/foo").unwrap();
        let ups = uri.get_upstream_with_default_port(80).unwrap();
        assert_eq!(ups.to_string(), "example.com:80");
    }

    #[test]
    fn absolute_form_with_port() {
        let uri = Uri::from_str("http://example.com:8080/foo").unwrap();
        let ups = uri.get_upstream_with_default_port(80).unwrap();
        assert_eq!(ups.to_string(), "example.com:8080");
    }

    #[test]
    fn authority_form() {
        let uri = Uri::from_str("example.com:443").unwrap();
        let ups = uri.get_upstream_with_default_port(443).unwrap();
        assert_eq!(ups.to_string(), "example.com:443");
    }

    #[test]
    fn ipv6_authority() {
        let uri = Uri::from_str("http://[::1]:8080/").unwrap();
        let ups = uri.get_upstream_with_default_port(80).unwrap();
        assert_eq!(ups.to_string(), "[::1]:8080");
    }

    #[test]
    fn origin_form_has_no_authority() {
        let uri = Uri::from_str("/foo").unwrap();
        assert!(uri.get_upstream_with_default_port(80).is_err());
    }
}
