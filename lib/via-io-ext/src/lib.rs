/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

mod buf_reader;
mod copy;

pub use buf_reader::{HttpBufReader, LineRecvError, DEFAULT_BUFFER_SIZE};
pub use copy::{tunnel_pump, CopyError};
