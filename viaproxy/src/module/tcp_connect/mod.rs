/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

mod error;
mod task;

pub use error::TcpConnectError;
pub(crate) use task::{set_tcp_keepalive, tcp_connect_to};
