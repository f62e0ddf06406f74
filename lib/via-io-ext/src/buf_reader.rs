/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::io;
use std::ops::Range;
use std::pin::Pin;
use std::task::{Context, Poll};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

use super::CopyError;

pub const DEFAULT_BUFFER_SIZE: usize = 8192;

#[derive(Error, Debug)]
pub enum LineRecvError {
    #[error("connection closed")]
    Closed,
    #[error("connection closed with partial line")]
    PartialLine,
    #[error("line too long")]
    LineTooLong,
    #[error("read failed: {0:?}")]
    Io(io::Error),
}

/// Buffered reader over one receive direction of a proxied connection.
///
/// One fixed buffer is shared by line reads and binary reads. A line read
/// fills the buffer opportunistically and records the bytes it did not
/// consume in `leftover`; the next binary read drains that range before it
/// goes back to the io source, so no byte read ahead of a header section is
/// ever lost to the following body read.
pub struct HttpBufReader<R> {
    inner: R,
    buf: Box<[u8]>,
    leftover: Option<Range<usize>>,
}

impl<R> HttpBufReader<R> {
    pub fn new(inner: R) -> Self {
        Self::with_buffer_size(inner, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_buffer_size(inner: R, buffer_size: usize) -> Self {
        HttpBufReader {
            inner,
            buf: vec![0u8; buffer_size.max(1)].into_boxed_slice(),
            leftover: None,
        }
    }

    /// The buffered bytes left behind by a previous read.
    pub fn chunk(&self) -> &[u8] {
        match &self.leftover {
            Some(range) => &self.buf[range.clone()],
            None => &[],
        }
    }

    pub fn consume(&mut self, amt: usize) {
        if let Some(range) = self.leftover.take() {
            let start = range.start + amt.min(range.len());
            if start < range.end {
                self.leftover = Some(start..range.end);
            }
        }
    }
}

impl<R> HttpBufReader<R>
where
    R: AsyncRead + Unpin,
{
    /// Make at least one byte available in the buffer, or return 0 on EOF.
    pub async fn fill_buf(&mut self) -> io::Result<usize> {
        if let Some(range) = &self.leftover {
            return Ok(range.len());
        }
        let n = self.inner.read(&mut self.buf[..]).await?;
        if n > 0 {
            self.leftover = Some(0..n);
        }
        Ok(n)
    }

    /// Wait until buffered data is available. `Ok(false)` means the peer
    /// closed with nothing left to read.
    pub async fn fill_wait_data(&mut self) -> io::Result<bool> {
        Ok(self.fill_buf().await? > 0)
    }

    /// Read one line into `line`, excluding the trailing newline.
    ///
    /// `LF` and `CRLF` both terminate a line; a stray `CR` not followed by
    /// `LF` is preserved in the output.
    pub async fn read_line(
        &mut self,
        line: &mut Vec<u8>,
        max_len: usize,
    ) -> Result<(), LineRecvError> {
        let start = line.len();
        loop {
            let avail = self.fill_buf().await.map_err(LineRecvError::Io)?;
            if avail == 0 {
                return Err(if line.len() == start {
                    LineRecvError::Closed
                } else {
                    LineRecvError::PartialLine
                });
            }
            let chunk = self.chunk();
            match memchr::memchr(b'\n', chunk) {
                Some(i) => {
                    line.extend_from_slice(&chunk[..i]);
                    self.consume(i + 1);
                    if line.len() > start && line.last() == Some(&b'\r') {
                        line.pop();
                    }
                    if line.len() - start > max_len {
                        return Err(LineRecvError::LineTooLong);
                    }
                    return Ok(());
                }
                None => {
                    let n = chunk.len();
                    line.extend_from_slice(chunk);
                    self.consume(n);
                    if line.len() - start > max_len {
                        return Err(LineRecvError::LineTooLong);
                    }
                }
            }
        }
    }

    /// Forward exactly `len` bytes to `dst`. Premature close is an error.
    pub async fn tunnel_n<W>(&mut self, dst: &mut W, len: u64) -> Result<(), CopyError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut remaining = len;
        while remaining > 0 {
            let avail = self.fill_buf().await.map_err(CopyError::ReadFailed)?;
            if avail == 0 {
                return Err(CopyError::ReadFailed(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "closed before the expected length",
                )));
            }
            let take = (avail as u64).min(remaining) as usize;
            let data = &self.chunk()[..take];
            dst.write_all(data).await.map_err(CopyError::WriteFailed)?;
            self.consume(take);
            remaining -= take as u64;
        }
        Ok(())
    }

    /// Forward everything to `dst` until the source closes. Read errors are
    /// treated as a close; write errors propagate. Returns bytes sent.
    pub async fn tunnel_until_close<W>(&mut self, dst: &mut W) -> Result<u64, CopyError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut total = 0u64;
        loop {
            let avail = match self.fill_buf().await {
                Ok(0) | Err(_) => break,
                Ok(n) => n,
            };
            let data = &self.chunk()[..avail];
            dst.write_all(data).await.map_err(CopyError::WriteFailed)?;
            self.consume(avail);
            total += avail as u64;
        }
        Ok(total)
    }
}

impl<R> AsyncRead for HttpBufReader<R>
where
    R: AsyncRead + Unpin,
{
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if let Some(range) = this.leftover.take() {
            let n = range.len().min(buf.remaining());
            buf.put_slice(&this.buf[range.start..range.start + n]);
            let rest = range.start + n..range.end;
            if !rest.is_empty() {
                this.leftover = Some(rest);
            }
            return Poll::Ready(Ok(()));
        }
        Pin::new(&mut this.inner).poll_read(cx, buf)
    }
}
