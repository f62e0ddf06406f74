/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

pub mod http_forward;
pub mod tcp_connect;
