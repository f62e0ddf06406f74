/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::io;

use http::StatusCode;
use thiserror::Error;

use via_io_ext::LineRecvError;

#[derive(Error, Debug)]
pub enum HttpRequestParseError {
    #[error("client closed")]
    ClientClosed,
    #[error("too large header")]
    TooLargeHeader,
    #[error("io failed: {0:?}")]
    IoFailed(io::Error),
    #[error("invalid request line")]
    InvalidRequestLine,
    #[error("invalid method")]
    InvalidMethod,
    #[error("invalid request target")]
    InvalidRequestTarget,
    #[error("unsupported version {0}")]
    UnsupportedVersion(String),
    #[error("unsupported scheme")]
    UnsupportedScheme,
    #[error("invalid header line")]
    InvalidHeaderLine,
    #[error("invalid content-length header")]
    InvalidContentLength,
    #[error("invalid host header")]
    InvalidHost,
    #[error("missing host")]
    MissingHost,
}

impl HttpRequestParseError {
    /// The status code to answer the client with, if an answer makes sense.
    pub fn status_code(&self) -> Option<StatusCode> {
        match self {
            HttpRequestParseError::ClientClosed | HttpRequestParseError::IoFailed(_) => None,
            HttpRequestParseError::UnsupportedVersion(_)
            | HttpRequestParseError::UnsupportedScheme => Some(StatusCode::NOT_IMPLEMENTED),
            _ => Some(StatusCode::BAD_REQUEST),
        }
    }
}

impl From<LineRecvError> for HttpRequestParseError {
    fn from(e: LineRecvError) -> Self {
        match e {
            LineRecvError::Closed => HttpRequestParseError::ClientClosed,
            LineRecvError::PartialLine => HttpRequestParseError::IoFailed(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "closed inside the request head",
            )),
            LineRecvError::LineTooLong => HttpRequestParseError::TooLargeHeader,
            LineRecvError::Io(e) => HttpRequestParseError::IoFailed(e),
        }
    }
}
