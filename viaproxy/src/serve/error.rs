/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::io;

use thiserror::Error;

use via_http::client::HttpResponseParseError;
use via_http::server::HttpRequestParseError;
use via_types::net::ConnectError;

use crate::module::tcp_connect::TcpConnectError;

#[derive(Error, Debug)]
pub enum ServerTaskError {
    #[error("internal server error: {0}")]
    InternalServerError(&'static str),
    #[error("invalid client protocol: {0}")]
    InvalidClientProtocol(&'static str),
    #[error("invalid upstream protocol: {0}")]
    InvalidUpstreamProtocol(&'static str),
    #[error("unimplemented protocol")]
    UnimplementedProtocol,
    #[error("tcp read from client: {0:?}")]
    ClientTcpReadFailed(io::Error),
    #[error("tcp write to client: {0:?}")]
    ClientTcpWriteFailed(io::Error),
    #[error("upstream not resolved: {0:?}")]
    UpstreamNotResolved(io::Error),
    #[error("upstream not connected: {0}")]
    UpstreamNotConnected(ConnectError),
    #[error("upstream not available")]
    UpstreamNotAvailable,
    #[error("read from upstream: {0:?}")]
    UpstreamReadFailed(io::Error),
    #[error("write to upstream: {0:?}")]
    UpstreamWriteFailed(io::Error),
    #[error("closed by upstream")]
    ClosedByUpstream,
    #[error("closed early by client")]
    ClosedEarlyByClient,
    #[error("canceled as server quit")]
    CanceledAsServerQuit,
}

impl ServerTaskError {
    pub fn brief(&self) -> &'static str {
        match self {
            ServerTaskError::InternalServerError(_) => "InternalServerError",
            ServerTaskError::InvalidClientProtocol(_) => "InvalidClientProtocol",
            ServerTaskError::InvalidUpstreamProtocol(_) => "InvalidUpstreamProtocol",
            ServerTaskError::UnimplementedProtocol => "UnimplementedProtocol",
            ServerTaskError::ClientTcpReadFailed(_) => "ClientTcpReadFailed",
            ServerTaskError::ClientTcpWriteFailed(_) => "ClientTcpWriteFailed",
            ServerTaskError::UpstreamNotResolved(_) => "UpstreamNotResolved",
            ServerTaskError::UpstreamNotConnected(_) => "UpstreamNotConnected",
            ServerTaskError::UpstreamNotAvailable => "UpstreamNotAvailable",
            ServerTaskError::UpstreamReadFailed(_) => "UpstreamReadFailed",
            ServerTaskError::UpstreamWriteFailed(_) => "UpstreamWriteFailed",
            ServerTaskError::ClosedByUpstream => "ClosedByUpstream",
            ServerTaskError::ClosedEarlyByClient => "ClosedEarlyByClient",
            ServerTaskError::CanceledAsServerQuit => "CanceledAsServerQuit",
        }
    }
}

pub type ServerTaskResult<T> = Result<T, ServerTaskError>;

impl From<HttpRequestParseError> for ServerTaskError {
    fn from(e: HttpRequestParseError) -> Self {
        match e {
            HttpRequestParseError::ClientClosed => ServerTaskError::ClosedEarlyByClient,
            HttpRequestParseError::TooLargeHeader => {
                ServerTaskError::InvalidClientProtocol("too large header in client request")
            }
            HttpRequestParseError::IoFailed(e) => ServerTaskError::ClientTcpReadFailed(e),
            HttpRequestParseError::UnsupportedVersion(_)
            | HttpRequestParseError::UnsupportedScheme => ServerTaskError::UnimplementedProtocol,
            _ => ServerTaskError::InvalidClientProtocol("invalid client request"),
        }
    }
}

impl From<HttpResponseParseError> for ServerTaskError {
    fn from(e: HttpResponseParseError) -> Self {
        match e {
            HttpResponseParseError::RemoteClosed => ServerTaskError::ClosedByUpstream,
            HttpResponseParseError::TooLargeHeader => {
                ServerTaskError::InvalidUpstreamProtocol("too large header in remote response")
            }
            HttpResponseParseError::IoFailed(e) => ServerTaskError::UpstreamReadFailed(e),
            _ => ServerTaskError::InvalidUpstreamProtocol("invalid remote response"),
        }
    }
}

impl From<TcpConnectError> for ServerTaskError {
    fn from(e: TcpConnectError) -> Self {
        match e {
            TcpConnectError::ResolveFailed(e) => ServerTaskError::UpstreamNotResolved(e),
            TcpConnectError::ConnectFailed(e) => ServerTaskError::UpstreamNotConnected(e),
            TcpConnectError::NoAddressConnected => ServerTaskError::UpstreamNotAvailable,
        }
    }
}
