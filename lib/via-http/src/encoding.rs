/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::io::{self, Read, Write};

use flate2::read::{DeflateDecoder, GzDecoder, ZlibDecoder};
use flate2::write::{DeflateEncoder, GzEncoder};
use flate2::Compression;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ContentEncodingError {
    #[error("unsupported content encoding {0:?}")]
    UnsupportedEncoding(String),
    #[error("decode failed: {0:?}")]
    DecodeFailed(io::Error),
    #[error("encode failed: {0:?}")]
    EncodeFailed(io::Error),
}

/// Decode a materialized body per its `Content-Encoding`.
///
/// `deflate` means raw deflate on the wire, but a zlib wrapper is accepted
/// on decode since some servers send one.
pub fn decode_content(
    encoding: Option<&str>,
    data: &[u8],
) -> Result<Vec<u8>, ContentEncodingError> {
    match normalize(encoding) {
        "" | "identity" => Ok(data.to_vec()),
        "gzip" | "x-gzip" => {
            let mut out = Vec::with_capacity(data.len() * 2);
            GzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(ContentEncodingError::DecodeFailed)?;
            Ok(out)
        }
        "deflate" => {
            let mut out = Vec::with_capacity(data.len() * 2);
            match DeflateDecoder::new(data).read_to_end(&mut out) {
                Ok(_) => Ok(out),
                Err(raw_err) => {
                    out.clear();
                    ZlibDecoder::new(data)
                        .read_to_end(&mut out)
                        .map_err(|_| ContentEncodingError::DecodeFailed(raw_err))?;
                    Ok(out)
                }
            }
        }
        other => Err(ContentEncodingError::UnsupportedEncoding(other.to_string())),
    }
}

/// Re-encode a materialized body per the target `Content-Encoding`.
pub fn encode_content(
    encoding: Option<&str>,
    data: &[u8],
) -> Result<Vec<u8>, ContentEncodingError> {
    match normalize(encoding) {
        "" | "identity" => Ok(data.to_vec()),
        "gzip" | "x-gzip" => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(data)
                .map_err(ContentEncodingError::EncodeFailed)?;
            encoder.finish().map_err(ContentEncodingError::EncodeFailed)
        }
        "deflate" => {
            let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
            encoder
                .write_all(data)
                .map_err(ContentEncodingError::EncodeFailed)?;
            encoder.finish().map_err(ContentEncodingError::EncodeFailed)
        }
        other => Err(ContentEncodingError::UnsupportedEncoding(other.to_string())),
    }
}

fn normalize(encoding: Option<&str>) -> &str {
    encoding.map(str::trim).unwrap_or("")
}
