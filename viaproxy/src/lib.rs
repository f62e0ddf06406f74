/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

//! An embeddable HTTP/1.x forward proxy.
//!
//! A host program builds an [`HttpProxyServer`](serve::http_proxy::HttpProxyServer)
//! from a [`HttpProxyServerConfig`](config::HttpProxyServerConfig) and an
//! interceptor factory, then drives it with `start()`. Every accepted client
//! connection runs the request pipeline sequentially; the interceptor
//! returned by the factory can watch and rewrite requests and responses,
//! redirect the pipeline, or abort it. See the [`intercept`] module for the
//! extension surface.

pub mod config;
pub mod intercept;
pub mod module;
pub mod serve;
