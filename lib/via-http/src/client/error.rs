/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::io;

use thiserror::Error;

use via_io_ext::LineRecvError;

#[derive(Error, Debug)]
pub enum HttpResponseParseError {
    #[error("remote closed")]
    RemoteClosed,
    #[error("too large header")]
    TooLargeHeader,
    #[error("io failed: {0:?}")]
    IoFailed(io::Error),
    #[error("invalid status line")]
    InvalidStatusLine,
    #[error("unsupported version {0}")]
    UnsupportedVersion(String),
    #[error("invalid header line")]
    InvalidHeaderLine,
    #[error("invalid content-length header")]
    InvalidContentLength,
}

impl From<LineRecvError> for HttpResponseParseError {
    fn from(e: LineRecvError) -> Self {
        match e {
            LineRecvError::Closed => HttpResponseParseError::RemoteClosed,
            LineRecvError::PartialLine => HttpResponseParseError::IoFailed(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "closed inside the response head",
            )),
            LineRecvError::LineTooLong => HttpResponseParseError::TooLargeHeader,
            LineRecvError::Io(e) => HttpResponseParseError::IoFailed(e),
        }
    }
}
