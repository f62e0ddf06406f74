/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::os::fd::{AsRawFd, RawFd};

use futures_util::FutureExt;
use log::trace;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use via_io_ext::HttpBufReader;
use via_types::net::UpstreamAddr;

use crate::module::tcp_connect::{tcp_connect_to, TcpConnectError};

pub(crate) struct UpstreamConnection {
    pub(crate) r: HttpBufReader<OwnedReadHalf>,
    pub(crate) w: OwnedWriteHalf,
    pub(crate) fd: RawFd,
}

/// Owns the upstream side of one proxied client connection.
///
/// At most one connection is held. It is reused for the next request iff
/// the destination matches and the socket shows no data and no EOF while
/// idle; any change of destination replaces it.
pub(crate) struct HttpForwardContext {
    upstream: Option<UpstreamAddr>,
    connection: Option<UpstreamConnection>,
    buffer_size: usize,
}

impl HttpForwardContext {
    pub(crate) fn new(buffer_size: usize) -> Self {
        HttpForwardContext {
            upstream: None,
            connection: None,
            buffer_size,
        }
    }

    /// Get a connection to `ups`, reusing the held one when it is still
    /// bound to the same address and alive. Returns whether it was reused.
    pub(crate) async fn acquire(&mut self, ups: &UpstreamAddr) -> Result<bool, TcpConnectError> {
        if self.upstream.as_ref() != Some(ups) {
            self.connection = None;
        } else if let Some(conn) = &mut self.connection {
            // data or EOF on an idle upstream means it cannot serve
            // another request
            if conn.r.fill_wait_data().now_or_never().is_some() {
                trace!("upstream {ups} dropped its idle connection");
                self.connection = None;
            }
        }
        if self.connection.is_some() {
            return Ok(true);
        }

        let stream = tcp_connect_to(ups).await?;
        let fd = stream.as_raw_fd();
        let (r, w) = stream.into_split();
        self.connection = Some(UpstreamConnection {
            r: HttpBufReader::with_buffer_size(r, self.buffer_size),
            w,
            fd,
        });
        self.upstream = Some(ups.clone());
        Ok(false)
    }

    pub(crate) fn connection_mut(&mut self) -> Option<&mut UpstreamConnection> {
        self.connection.as_mut()
    }

    /// Drop the held connection; the sockets close on drop.
    pub(crate) fn close(&mut self) {
        self.connection = None;
    }
}
