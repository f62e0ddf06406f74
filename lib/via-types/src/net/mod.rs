/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

mod error;
mod host;
mod upstream;

pub use error::ConnectError;
pub use host::Host;
pub use upstream::{UpstreamAddr, UpstreamAddrParseError};
