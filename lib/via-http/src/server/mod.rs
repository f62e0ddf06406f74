/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::str::FromStr;

use bytes::BufMut;
use http::{Method, Uri, Version};
use tokio::io::AsyncRead;

use via_io_ext::{HttpBufReader, LineRecvError};
use via_types::net::UpstreamAddr;

use crate::uri::UriExt;
use crate::{parse_http_version, token_list, HttpBodyType, HttpHeaderMap};

mod error;
pub use error::HttpRequestParseError;

/// One request head received from the proxy client.
pub struct HttpProxyClientRequest {
    pub method: Method,
    pub uri: Uri,
    pub version: Version,
    pub headers: HttpHeaderMap,
    /// destination taken from the `Host` header, when one was sent
    pub host: Option<UpstreamAddr>,
    pub content_length: Option<u64>,
    connection: Vec<String>,
    proxy_connection: Vec<String>,
    transfer_encoding: Vec<String>,
    keep_alive: bool,
}

impl HttpProxyClientRequest {
    /// Parse a request head off the client connection. Empty lines before
    /// the request line are discarded.
    pub async fn parse<R>(
        reader: &mut HttpBufReader<R>,
        max_header_size: usize,
    ) -> Result<Self, HttpRequestParseError>
    where
        R: AsyncRead + Unpin,
    {
        let mut line_buf: Vec<u8> = Vec::with_capacity(256);
        loop {
            line_buf.clear();
            reader.read_line(&mut line_buf, max_header_size).await?;
            if !line_buf.is_empty() {
                break;
            }
        }
        let line = std::str::from_utf8(&line_buf)
            .map_err(|_| HttpRequestParseError::InvalidRequestLine)?;
        let mut req = Self::parse_request_line(line)?;

        let mut head_size = line_buf.len();
        loop {
            line_buf.clear();
            match reader.read_line(&mut line_buf, max_header_size).await {
                Ok(()) => {}
                Err(LineRecvError::Closed) => {
                    return Err(HttpRequestParseError::IoFailed(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "closed inside the request head",
                    )));
                }
                Err(e) => return Err(e.into()),
            }
            if line_buf.is_empty() {
                break;
            }
            head_size += line_buf.len() + 2;
            if head_size > max_header_size {
                return Err(HttpRequestParseError::TooLargeHeader);
            }
            let line = std::str::from_utf8(&line_buf)
                .map_err(|_| HttpRequestParseError::InvalidHeaderLine)?;
            req.parse_header_line(line)?;
        }

        req.finalize_keep_alive();
        Ok(req)
    }

    fn parse_request_line(line: &str) -> Result<Self, HttpRequestParseError> {
        let mut iter = line.split_ascii_whitespace();
        let method = iter.next().ok_or(HttpRequestParseError::InvalidRequestLine)?;
        let target = iter.next().ok_or(HttpRequestParseError::InvalidRequestLine)?;
        let version = iter.next().ok_or(HttpRequestParseError::InvalidRequestLine)?;
        if iter.next().is_some() {
            return Err(HttpRequestParseError::InvalidRequestLine);
        }

        let method = Method::from_bytes(method.as_bytes())
            .map_err(|_| HttpRequestParseError::InvalidMethod)?;
        let uri =
            Uri::from_str(target).map_err(|_| HttpRequestParseError::InvalidRequestTarget)?;
        let version = parse_http_version(version)
            .ok_or_else(|| HttpRequestParseError::UnsupportedVersion(version.to_string()))?;

        Ok(HttpProxyClientRequest {
            method,
            uri,
            version,
            headers: HttpHeaderMap::new(),
            host: None,
            content_length: None,
            connection: Vec::new(),
            proxy_connection: Vec::new(),
            transfer_encoding: Vec::new(),
            keep_alive: false,
        })
    }

    fn parse_header_line(&mut self, line: &str) -> Result<(), HttpRequestParseError> {
        let Some((name, value)) = line.split_once(':') else {
            return Err(HttpRequestParseError::InvalidHeaderLine);
        };
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() {
            return Err(HttpRequestParseError::InvalidHeaderLine);
        }

        match name.to_ascii_lowercase().as_str() {
            "connection" => {
                self.connection = token_list(value);
                self.headers
                    .add_parsed(name, value.to_ascii_lowercase().as_str());
                return Ok(());
            }
            "proxy-connection" => {
                self.proxy_connection = token_list(value);
                self.headers
                    .add_parsed(name, value.to_ascii_lowercase().as_str());
                return Ok(());
            }
            "transfer-encoding" => {
                self.transfer_encoding = token_list(value);
                self.headers
                    .add_parsed(name, value.to_ascii_lowercase().as_str());
                return Ok(());
            }
            "content-length" => {
                let len = atoi::atoi::<u64>(value.as_bytes())
                    .ok_or(HttpRequestParseError::InvalidContentLength)?;
                self.content_length = Some(len);
            }
            "host" => {
                if self.host.is_none() {
                    let addr = UpstreamAddr::from_host_port_str(value, 80)
                        .map_err(|_| HttpRequestParseError::InvalidHost)?;
                    self.host = Some(addr);
                }
            }
            _ => {}
        }
        self.headers.add_parsed(name, value);
        Ok(())
    }

    fn finalize_keep_alive(&mut self) {
        let mut keep = !matches!(self.version, Version::HTTP_10);
        if self.connection.iter().any(|t| t == "close") {
            keep = false;
        } else if self.connection.iter().any(|t| t == "keep-alive") {
            keep = true;
        }
        // Proxy-Connection is not standard, but at least curl sends it
        if self.proxy_connection.iter().any(|t| t == "close") {
            keep = false;
        } else if self.proxy_connection.iter().any(|t| t == "keep-alive") {
            keep = true;
        }
        self.keep_alive = keep;
    }

    #[inline]
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn disable_keep_alive(&mut self) {
        self.keep_alive = false;
    }

    pub fn referer(&self) -> Option<&str> {
        self.headers.get("referer")
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.headers.get("cache-control")
    }

    pub fn pragma(&self) -> Option<&str> {
        self.headers.get("pragma")
    }

    pub fn body_type(&self) -> Option<HttpBodyType> {
        if self.transfer_encoding.iter().any(|t| t == "chunked") {
            Some(HttpBodyType::Chunked)
        } else {
            match self.content_length {
                Some(0) | None => None,
                Some(len) => Some(HttpBodyType::ContentLength(len)),
            }
        }
    }

    /// Destination of a non-`CONNECT` request, per its target form.
    pub fn forward_upstream(&self) -> Result<UpstreamAddr, HttpRequestParseError> {
        if let Some(scheme) = self.uri.scheme() {
            return if *scheme == http::uri::Scheme::HTTP {
                self.uri.get_upstream_with_default_port(80)
            } else if *scheme == http::uri::Scheme::HTTPS {
                self.uri.get_upstream_with_default_port(443)
            } else {
                Err(HttpRequestParseError::UnsupportedScheme)
            };
        }
        // asterisk-form and origin-form fall back to the Host header
        self.host.clone().ok_or(HttpRequestParseError::MissingHost)
    }

    /// Destination of a `CONNECT` request (authority form, default 443).
    pub fn connect_upstream(&self) -> Result<UpstreamAddr, HttpRequestParseError> {
        self.uri.get_upstream_with_default_port(443)
    }

    /// Replace the request target. When the new target carries an
    /// authority, the `Host` header follows it.
    pub fn set_request_target(&mut self, uri: Uri) {
        if let Some(authority) = uri.authority() {
            let default_port = match uri.scheme() {
                Some(s) if *s == http::uri::Scheme::HTTPS => 443,
                _ => 80,
            };
            self.headers.set("Host", Some(authority.as_str()));
            self.host = UpstreamAddr::from_host_port_str(authority.as_str(), default_port).ok();
        }
        self.uri = uri;
    }

    /// Serialize with the target reduced to origin form, for sending to
    /// the origin server. `Proxy-Connection` is dropped here.
    pub fn serialize_for_origin(&self) -> Vec<u8> {
        let target = self
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        self.serialize_with_target(target, true)
    }

    /// Serialize with the original target untouched, for sending through
    /// an upstream relay proxy.
    pub fn serialize_for_proxy(&self) -> Vec<u8> {
        self.serialize_with_target(&self.uri.to_string(), false)
    }

    fn serialize_with_target(&self, target: &str, strip_proxy_connection: bool) -> Vec<u8> {
        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        buf.put_slice(self.method.as_str().as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(target.as_bytes());
        buf.put_u8(b' ');
        buf.put_slice(format!("{:?}", self.version).as_bytes());
        buf.put_slice(b"\r\n");
        for (name, value) in self.headers.iter() {
            if strip_proxy_connection && name.eq_ignore_ascii_case("proxy-connection") {
                continue;
            }
            buf.put_slice(name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(value.as_bytes());
            buf.put_slice(b"\r\n");
        }
        buf.put_slice(b"\r\n");
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn parse(data: &[u8]) -> Result<HttpProxyClientRequest, HttpRequestParseError> {
        let mut reader = HttpBufReader::new(data);
        HttpProxyClientRequest::parse(&mut reader, 65536).await
    }

    #[tokio::test]
    async fn absolute_form_rewritten_for_origin() {
        let req = parse(b"GET http://example.com/foo HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(req.method, Method::GET);
        assert_eq!(
            req.forward_upstream().unwrap().to_string(),
            "example.com:80"
        );
        assert_eq!(
            req.serialize_for_origin(),
            b"GET /foo HTTP/1.1\r\nHost: example.com\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn absolute_form_kept_for_proxy() {
        let req = parse(b"GET http://example.com/foo HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(
            req.serialize_for_proxy(),
            b"GET http://example.com/foo HTTP/1.1\r\nHost: example.com\r\n\r\n"
        );
    }

    #[tokio::test]
    async fn origin_form_uses_host_header() {
        let req = parse(b"GET /p HTTP/1.1\r\nHost: h.example:8080\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(req.forward_upstream().unwrap().to_string(), "h.example:8080");
    }

    #[tokio::test]
    async fn asterisk_form_uses_host_header() {
        let req = parse(b"OPTIONS * HTTP/1.1\r\nHost: h.example\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(req.forward_upstream().unwrap().to_string(), "h.example:80");
        assert!(req.serialize_for_origin().starts_with(b"OPTIONS * HTTP/1.1\r\n"));
    }

    #[tokio::test]
    async fn origin_form_without_host_fails() {
        let req = parse(b"GET /p HTTP/1.1\r\n\r\n").await.unwrap();
        assert!(matches!(
            req.forward_upstream(),
            Err(HttpRequestParseError::MissingHost)
        ));
    }

    #[tokio::test]
    async fn https_scheme_forces_443() {
        let req = parse(b"GET https://secure.example/x HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(
            req.forward_upstream().unwrap().to_string(),
            "secure.example:443"
        );
    }

    #[tokio::test]
    async fn unsupported_scheme_rejected() {
        let req = parse(b"GET ftp://files.example/x HTTP/1.1\r\n\r\n")
            .await
            .unwrap();
        assert!(matches!(
            req.forward_upstream(),
            Err(HttpRequestParseError::UnsupportedScheme)
        ));
    }

    #[tokio::test]
    async fn connect_default_port() {
        let req = parse(b"CONNECT example.com:443 HTTP/1.1\r\nHost: example.com\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(
            req.connect_upstream().unwrap().to_string(),
            "example.com:443"
        );

        let req = parse(b"CONNECT example.com HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(
            req.connect_upstream().unwrap().to_string(),
            "example.com:443"
        );
    }

    #[tokio::test]
    async fn leading_empty_lines_skipped() {
        let req = parse(b"\r\n\r\nGET /p HTTP/1.1\r\nHost: h\r\n\r\n").await.unwrap();
        assert_eq!(req.uri.path(), "/p");
    }

    #[tokio::test]
    async fn request_line_token_count_enforced() {
        assert!(matches!(
            parse(b"GET /p\r\n\r\n").await,
            Err(HttpRequestParseError::InvalidRequestLine)
        ));
        assert!(matches!(
            parse(b"GET /p HTTP/1.1 extra\r\n\r\n").await,
            Err(HttpRequestParseError::InvalidRequestLine)
        ));
    }

    #[tokio::test]
    async fn unsupported_version_rejected() {
        assert!(matches!(
            parse(b"GET /p HTTP/2.0\r\n\r\n").await,
            Err(HttpRequestParseError::UnsupportedVersion(_))
        ));
    }

    #[tokio::test]
    async fn header_without_colon_rejected() {
        assert!(matches!(
            parse(b"GET /p HTTP/1.1\r\nbogus header line\r\n\r\n").await,
            Err(HttpRequestParseError::InvalidHeaderLine)
        ));
    }

    #[tokio::test]
    async fn chunked_body_detected() {
        let req = parse(
            b"POST /p HTTP/1.1\r\nHost: h\r\nTransfer-Encoding: chunked\r\nContent-Length: 5\r\n\r\n",
        )
        .await
        .unwrap();
        assert_eq!(req.body_type(), Some(HttpBodyType::Chunked));
    }

    #[tokio::test]
    async fn content_length_body_detected() {
        let req = parse(b"POST /p HTTP/1.1\r\nHost: h\r\nContent-Length: 12\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(req.body_type(), Some(HttpBodyType::ContentLength(12)));

        let req = parse(b"POST /p HTTP/1.1\r\nHost: h\r\nContent-Length: 0\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(req.body_type(), None);
    }

    #[tokio::test]
    async fn typed_header_views() {
        let req = parse(
            b"GET /p HTTP/1.1\r\nHost: h\r\nReferer: http://a.example/\r\nCache-Control: no-cache\r\nPragma: no-cache\r\n\r\n",
        )
        .await
        .unwrap();
        assert_eq!(req.referer(), Some("http://a.example/"));
        assert_eq!(req.cache_control(), Some("no-cache"));
        assert_eq!(req.pragma(), Some("no-cache"));
    }

    #[tokio::test]
    async fn persistence_negotiation() {
        let req = parse(b"GET /p HTTP/1.1\r\nHost: h\r\n\r\n").await.unwrap();
        assert!(req.keep_alive());

        let req = parse(b"GET /p HTTP/1.0\r\nHost: h\r\n\r\n").await.unwrap();
        assert!(!req.keep_alive());

        let req = parse(b"GET /p HTTP/1.1\r\nHost: h\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        assert!(!req.keep_alive());

        let req = parse(b"GET /p HTTP/1.0\r\nHost: h\r\nProxy-Connection: Keep-Alive\r\n\r\n")
            .await
            .unwrap();
        assert!(req.keep_alive());

        let req = parse(b"GET /p HTTP/1.1\r\nHost: h\r\nProxy-Connection: close\r\n\r\n")
            .await
            .unwrap();
        assert!(!req.keep_alive());
    }

    #[tokio::test]
    async fn empty_request_is_client_closed() {
        assert!(matches!(
            parse(b"").await,
            Err(HttpRequestParseError::ClientClosed)
        ));
    }

    #[tokio::test]
    async fn change_request_target_updates_host() {
        let mut req = parse(b"GET http://a.example/x HTTP/1.1\r\nHost: a.example\r\n\r\n")
            .await
            .unwrap();
        req.set_request_target(Uri::from_str("http://b.example:8080/y").unwrap());
        assert_eq!(req.headers.get("host"), Some("b.example:8080"));
        assert_eq!(
            req.forward_upstream().unwrap().to_string(),
            "b.example:8080"
        );
        assert!(req.serialize_for_origin().starts_with(b"GET /y HTTP/1.1\r\n"));
    }
}
