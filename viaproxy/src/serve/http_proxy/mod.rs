/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

mod server;
mod task;

pub use server::HttpProxyServer;
