/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use via_io_ext::HttpBufReader;

use super::{parse_chunk_size, HttpBodyError, HttpBodyType};

/// Relays exactly one message body, on-wire bytes included.
///
/// For chunked bodies the chunk-size lines, extensions and trailers are
/// forwarded verbatim (newlines normalized to CRLF), so a downstream
/// decoder sees the same chunk sequence the upstream produced.
pub struct HttpBodyReader<'a, R> {
    reader: &'a mut HttpBufReader<R>,
    body_type: HttpBodyType,
    body_line_max: usize,
}

impl<'a, R> HttpBodyReader<'a, R>
where
    R: AsyncRead + Unpin,
{
    pub fn new(
        reader: &'a mut HttpBufReader<R>,
        body_type: HttpBodyType,
        body_line_max: usize,
    ) -> Self {
        HttpBodyReader {
            reader,
            body_type,
            body_line_max,
        }
    }

    /// Forward the whole body to `dst`. Returns bytes written.
    pub async fn copy_to<W>(&mut self, dst: &mut W) -> Result<u64, HttpBodyError>
    where
        W: AsyncWrite + Unpin,
    {
        match self.body_type {
            HttpBodyType::ContentLength(len) => {
                self.reader.tunnel_n(dst, len).await?;
                Ok(len)
            }
            HttpBodyType::ReadUntilEnd => Ok(self.reader.tunnel_until_close(dst).await?),
            HttpBodyType::Chunked => self.copy_chunked(dst).await,
        }
    }

    async fn copy_chunked<W>(&mut self, dst: &mut W) -> Result<u64, HttpBodyError>
    where
        W: AsyncWrite + Unpin,
    {
        let mut line: Vec<u8> = Vec::with_capacity(64);
        let mut total = 0u64;
        loop {
            line.clear();
            self.reader.read_line(&mut line, self.body_line_max).await?;
            if line.is_empty() {
                return Err(HttpBodyError::InvalidChunkedBody);
            }
            let size = parse_chunk_size(&line)?;
            dst.write_all(&line)
                .await
                .map_err(HttpBodyError::WriteFailed)?;
            dst.write_all(b"\r\n")
                .await
                .map_err(HttpBodyError::WriteFailed)?;
            total += line.len() as u64 + 2;

            if size == 0 {
                break;
            }

            self.reader.tunnel_n(dst, size).await?;
            total += size;

            line.clear();
            self.reader.read_line(&mut line, self.body_line_max).await?;
            if !line.is_empty() {
                return Err(HttpBodyError::InvalidChunkedBody);
            }
            dst.write_all(b"\r\n")
                .await
                .map_err(HttpBodyError::WriteFailed)?;
            total += 2;
        }

        // trailer section, forwarded up to and including the blank line
        loop {
            line.clear();
            self.reader.read_line(&mut line, self.body_line_max).await?;
            dst.write_all(&line)
                .await
                .map_err(HttpBodyError::WriteFailed)?;
            dst.write_all(b"\r\n")
                .await
                .map_err(HttpBodyError::WriteFailed)?;
            total += line.len() as u64 + 2;
            if line.is_empty() {
                break;
            }
        }
        Ok(total)
    }
}
