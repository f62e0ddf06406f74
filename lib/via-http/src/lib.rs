/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

mod body;
mod header;

pub mod client;
pub mod encoding;
pub mod server;
pub mod uri;

pub use body::{HttpBodyDecodeReader, HttpBodyError, HttpBodyReader, HttpBodyType};
pub use header::HttpHeaderMap;

pub(crate) fn parse_http_version(token: &str) -> Option<http::Version> {
    match token {
        "HTTP/1.1" => Some(http::Version::HTTP_11),
        "HTTP/1.0" => Some(http::Version::HTTP_10),
        _ => None,
    }
}

pub(crate) fn token_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
