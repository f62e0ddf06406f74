/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::io;

use thiserror::Error;

use via_io_ext::{CopyError, LineRecvError};

mod decode;
mod reader;

pub use decode::HttpBodyDecodeReader;
pub use reader::HttpBodyReader;

/// How the end of a message body is found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpBodyType {
    /// no framing given, the body runs until the peer closes
    ReadUntilEnd,
    ContentLength(u64),
    Chunked,
}

#[derive(Error, Debug)]
pub enum HttpBodyError {
    #[error("read failed: {0:?}")]
    ReadFailed(io::Error),
    #[error("write failed: {0:?}")]
    WriteFailed(io::Error),
    #[error("invalid chunked body")]
    InvalidChunkedBody,
}

impl From<CopyError> for HttpBodyError {
    fn from(e: CopyError) -> Self {
        match e {
            CopyError::ReadFailed(e) => HttpBodyError::ReadFailed(e),
            CopyError::WriteFailed(e) => HttpBodyError::WriteFailed(e),
        }
    }
}

impl From<LineRecvError> for HttpBodyError {
    fn from(e: LineRecvError) -> Self {
        match e {
            LineRecvError::Closed | LineRecvError::PartialLine => HttpBodyError::ReadFailed(
                io::Error::new(io::ErrorKind::UnexpectedEof, "closed inside chunked body"),
            ),
            LineRecvError::LineTooLong => HttpBodyError::InvalidChunkedBody,
            LineRecvError::Io(e) => HttpBodyError::ReadFailed(e),
        }
    }
}

/// Parse the hex size off a chunk header line. Chunk extensions after `;`
/// or whitespace are ignored here and forwarded verbatim by the relay.
pub(crate) fn parse_chunk_size(line: &[u8]) -> Result<u64, HttpBodyError> {
    let end = line
        .iter()
        .position(|b| *b == b';' || *b == b' ' || *b == b'\t')
        .unwrap_or(line.len());
    let hex = &line[..end];
    if hex.is_empty() {
        return Err(HttpBodyError::InvalidChunkedBody);
    }
    let s = std::str::from_utf8(hex).map_err(|_| HttpBodyError::InvalidChunkedBody)?;
    u64::from_str_radix(s, 16).map_err(|_| HttpBodyError::InvalidChunkedBody)
}
