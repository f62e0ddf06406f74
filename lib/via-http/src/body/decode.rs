/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::io;

use tokio::io::AsyncRead;

use via_io_ext::HttpBufReader;

use super::{parse_chunk_size, HttpBodyError, HttpBodyType};

/// Reads one message body and yields the decoded payload, with chunk
/// framing and trailers consumed rather than emitted.
pub struct HttpBodyDecodeReader<'a, R> {
    reader: &'a mut HttpBufReader<R>,
    body_type: HttpBodyType,
    body_line_max: usize,
    chunk_left: u64,
    finished: bool,
}

impl<'a, R> HttpBodyDecodeReader<'a, R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(
        reader: &'a mut HttpBufReader<R>,
        body_type: HttpBodyType,
        body_line_max: usize,
    ) -> Self {
        let chunk_left = match body_type {
            HttpBodyType::ContentLength(len) => len,
            _ => 0,
        };
        HttpBodyDecodeReader {
            reader,
            body_type,
            body_line_max,
            chunk_left,
            finished: matches!(body_type, HttpBodyType::ContentLength(0)),
        }
    }

    pub fn finished(&self) -> bool {
        self.finished
    }

    /// Append the next decoded fragment to `buf`. Returns the fragment
    /// length, 0 at end-of-message.
    pub async fn next_packet(&mut self, buf: &mut Vec<u8>) -> Result<usize, HttpBodyError> {
        if self.finished {
            return Ok(0);
        }
        match self.body_type {
            HttpBodyType::ContentLength(_) => self.next_sized(buf).await,
            HttpBodyType::ReadUntilEnd => self.next_until_close(buf).await,
            HttpBodyType::Chunked => self.next_chunked(buf).await,
        }
    }

    async fn next_sized(&mut self, buf: &mut Vec<u8>) -> Result<usize, HttpBodyError> {
        let avail = self
            .reader
            .fill_buf()
            .await
            .map_err(HttpBodyError::ReadFailed)?;
        if avail == 0 {
            return Err(HttpBodyError::ReadFailed(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "closed before the expected length",
            )));
        }
        let take = (avail as u64).min(self.chunk_left) as usize;
        buf.extend_from_slice(&self.reader.chunk()[..take]);
        self.reader.consume(take);
        self.chunk_left -= take as u64;
        if self.chunk_left == 0 {
            self.finished = true;
        }
        Ok(take)
    }

    async fn next_until_close(&mut self, buf: &mut Vec<u8>) -> Result<usize, HttpBodyError> {
        let avail = match self.reader.fill_buf().await {
            Ok(n) => n,
            Err(_) => 0,
        };
        if avail == 0 {
            self.finished = true;
            return Ok(0);
        }
        buf.extend_from_slice(&self.reader.chunk()[..avail]);
        self.reader.consume(avail);
        Ok(avail)
    }

    async fn next_chunked(&mut self, buf: &mut Vec<u8>) -> Result<usize, HttpBodyError> {
        let mut line: Vec<u8> = Vec::with_capacity(64);
        loop {
            if self.chunk_left > 0 {
                let avail = self
                    .reader
                    .fill_buf()
                    .await
                    .map_err(HttpBodyError::ReadFailed)?;
                if avail == 0 {
                    return Err(HttpBodyError::ReadFailed(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "closed inside a chunk",
                    )));
                }
                let take = (avail as u64).min(self.chunk_left) as usize;
                buf.extend_from_slice(&self.reader.chunk()[..take]);
                self.reader.consume(take);
                self.chunk_left -= take as u64;
                if self.chunk_left == 0 {
                    // the CRLF closing this chunk
                    line.clear();
                    self.reader.read_line(&mut line, self.body_line_max).await?;
                    if !line.is_empty() {
                        return Err(HttpBodyError::InvalidChunkedBody);
                    }
                }
                return Ok(take);
            }

            line.clear();
            self.reader.read_line(&mut line, self.body_line_max).await?;
            if line.is_empty() {
                return Err(HttpBodyError::InvalidChunkedBody);
            }
            let size = parse_chunk_size(&line)?;
            if size == 0 {
                // swallow the trailer section
                loop {
                    line.clear();
                    self.reader.read_line(&mut line, self.body_line_max).await?;
                    if line.is_empty() {
                        break;
                    }
                }
                self.finished = true;
                return Ok(0);
            }
            self.chunk_left = size;
        }
    }
}
