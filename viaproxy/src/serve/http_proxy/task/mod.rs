/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use via_io_ext::HttpBufReader;

use crate::config::HttpProxyServerConfig;
use crate::serve::ServerQuitPolicy;

mod connect;
mod forward;
mod pipeline;

pub(crate) use pipeline::HttpConnectionTask;

pub(crate) type HttpClientReader = HttpBufReader<OwnedReadHalf>;
pub(crate) type HttpClientWriter = OwnedWriteHalf;

pub(crate) struct CommonTaskContext {
    pub(crate) server_config: Arc<HttpProxyServerConfig>,
    pub(crate) server_quit_policy: Arc<ServerQuitPolicy>,
    pub(crate) tcp_server_addr: SocketAddr,
    pub(crate) tcp_client_addr: SocketAddr,
    pub(crate) conn_id: u64,
}
