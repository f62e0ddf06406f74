/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::io;

use thiserror::Error;

use via_types::net::ConnectError;

#[derive(Error, Debug)]
pub enum TcpConnectError {
    #[error("resolve failed: {0:?}")]
    ResolveFailed(io::Error),
    #[error("connect failed: {0}")]
    ConnectFailed(ConnectError),
    #[error("no address connected")]
    NoAddressConnected,
}
