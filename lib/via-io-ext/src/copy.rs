/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Error, Debug)]
pub enum CopyError {
    #[error("read failed: {0:?}")]
    ReadFailed(io::Error),
    #[error("write failed: {0:?}")]
    WriteFailed(io::Error),
}

/// One direction of an opaque tunnel.
///
/// Copies until the source reports EOF or a read error (both count as a
/// close), then shuts down the destination so the opposite pump unblocks.
/// Write errors propagate. Returns bytes forwarded.
pub async fn tunnel_pump<R, W>(
    reader: &mut R,
    writer: &mut W,
    buffer_size: usize,
) -> Result<u64, CopyError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; buffer_size.max(1)];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        writer
            .write_all(&buf[..n])
            .await
            .map_err(CopyError::WriteFailed)?;
        total += n as u64;
    }
    let _ = writer.shutdown().await;
    Ok(total)
}
