/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::io::{self, Write};

use http::{StatusCode, Version};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use via_http::server::HttpRequestParseError;
use via_types::net::ConnectError;

use crate::module::tcp_connect::TcpConnectError;
use crate::serve::ServerTaskError;

/// A canned response generated by the proxy itself, answering the client
/// when nothing can be forwarded.
pub struct HttpProxyClientResponse {
    status: StatusCode,
    close: bool,
    extra_headers: Vec<String>,
}

impl HttpProxyClientResponse {
    const RESPONSE_BUFFER_SIZE: usize = 1024;

    pub fn from_standard(status: StatusCode, close: bool) -> Self {
        HttpProxyClientResponse {
            status,
            close,
            extra_headers: Vec::new(),
        }
    }

    #[inline]
    pub fn bad_request() -> Self {
        HttpProxyClientResponse::from_standard(StatusCode::BAD_REQUEST, true)
    }

    #[inline]
    pub fn forbidden() -> Self {
        HttpProxyClientResponse::from_standard(StatusCode::FORBIDDEN, true)
    }

    #[inline]
    pub fn resource_not_found() -> Self {
        HttpProxyClientResponse::from_standard(StatusCode::NOT_FOUND, true)
    }

    #[inline]
    pub fn unimplemented() -> Self {
        HttpProxyClientResponse::from_standard(StatusCode::NOT_IMPLEMENTED, true)
    }

    #[inline]
    pub fn bad_gateway() -> Self {
        HttpProxyClientResponse::from_standard(StatusCode::BAD_GATEWAY, true)
    }

    #[inline]
    pub fn gateway_timeout() -> Self {
        HttpProxyClientResponse::from_standard(StatusCode::GATEWAY_TIMEOUT, true)
    }

    pub fn redirect(location: &str) -> Self {
        let mut rsp = HttpProxyClientResponse::from_standard(StatusCode::FOUND, true);
        rsp.add_extra_header(format!("Location: {location}\r\n"));
        rsp
    }

    pub fn add_extra_header(&mut self, line: String) {
        self.extra_headers.push(line);
    }

    pub(crate) fn from_request_error(e: &HttpRequestParseError) -> Option<Self> {
        e.status_code()
            .map(|status| HttpProxyClientResponse::from_standard(status, true))
    }

    pub(crate) fn from_connect_error(e: &TcpConnectError) -> Self {
        match e {
            TcpConnectError::ResolveFailed(_) | TcpConnectError::NoAddressConnected => {
                HttpProxyClientResponse::bad_gateway()
            }
            TcpConnectError::ConnectFailed(ConnectError::TimedOut) => {
                HttpProxyClientResponse::gateway_timeout()
            }
            TcpConnectError::ConnectFailed(_) => HttpProxyClientResponse::bad_gateway(),
        }
    }

    pub(crate) fn from_task_err(e: &ServerTaskError) -> Option<Self> {
        let r = match e {
            ServerTaskError::InternalServerError(_) => HttpProxyClientResponse::from_standard(
                StatusCode::INTERNAL_SERVER_ERROR,
                true,
            ),
            ServerTaskError::InvalidClientProtocol(_) => HttpProxyClientResponse::bad_request(),
            ServerTaskError::UnimplementedProtocol => HttpProxyClientResponse::unimplemented(),
            ServerTaskError::UpstreamNotResolved(_) | ServerTaskError::UpstreamNotAvailable => {
                HttpProxyClientResponse::bad_gateway()
            }
            ServerTaskError::UpstreamNotConnected(ConnectError::TimedOut) => {
                HttpProxyClientResponse::gateway_timeout()
            }
            ServerTaskError::UpstreamNotConnected(_)
            | ServerTaskError::InvalidUpstreamProtocol(_)
            | ServerTaskError::UpstreamReadFailed(_)
            | ServerTaskError::UpstreamWriteFailed(_)
            | ServerTaskError::ClosedByUpstream => HttpProxyClientResponse::bad_gateway(),
            ServerTaskError::ClientTcpReadFailed(_)
            | ServerTaskError::ClientTcpWriteFailed(_)
            | ServerTaskError::ClosedEarlyByClient
            | ServerTaskError::CanceledAsServerQuit => return None,
        };
        Some(r)
    }

    pub fn status(&self) -> u16 {
        self.status.as_u16()
    }

    pub fn should_close(&self) -> bool {
        self.close
    }

    fn reason(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("Unknown")
    }

    /// `200 Connection established` answering a `CONNECT`, echoing the
    /// request's protocol version.
    pub(crate) async fn reply_ok_to_connect<W>(version: Version, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let s = format!("{version:?} 200 Connection established\r\n\r\n");
        writer.write_all(s.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Emit the canned error page: a minimal `HTTP/1.0` head and a tiny
    /// HTML body with an exact `Content-Length`.
    pub async fn reply_err_to_request<W>(&self, writer: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let code = self.status.as_u16();
        let reason = self.reason();
        let body = format!("<html>\n <body>\n  <h1>{code} {reason}</h1>\n </body>\n</html>");

        let mut head = Vec::<u8>::with_capacity(Self::RESPONSE_BUFFER_SIZE);
        write!(head, "HTTP/1.0 {code} {reason}\r\n")?;
        for line in &self.extra_headers {
            head.extend_from_slice(line.as_bytes());
        }
        write!(head, "Content-Type: text/html\r\n")?;
        write!(head, "Content-Length: {}\r\n", body.len())?;
        if self.close {
            head.extend_from_slice(b"Connection: close\r\n");
        } else {
            head.extend_from_slice(b"Connection: keep-alive\r\n");
        }
        head.extend_from_slice(b"\r\n");

        writer.write_all(&head).await?;
        writer.write_all(body.as_bytes()).await?;
        writer.flush().await?;
        Ok(())
    }
}
