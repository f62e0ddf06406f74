/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use bytes::BufMut;
use http::{Method, Version};
use tokio::io::AsyncRead;

use via_io_ext::{HttpBufReader, LineRecvError};

use crate::{parse_http_version, token_list, HttpBodyType, HttpHeaderMap};

mod error;
pub use error::HttpResponseParseError;

/// One response head received from the origin or relay proxy.
pub struct HttpForwardRemoteResponse {
    pub version: Version,
    pub code: u16,
    pub reason: String,
    pub headers: HttpHeaderMap,
    pub content_length: Option<u64>,
    pub content_encoding: Option<String>,
    connection: Vec<String>,
    transfer_encoding: Vec<String>,
    keep_alive: bool,
}

impl HttpForwardRemoteResponse {
    pub async fn parse<R>(
        reader: &mut HttpBufReader<R>,
        max_header_size: usize,
    ) -> Result<Self, HttpResponseParseError>
    where
        R: AsyncRead + Unpin,
    {
        let mut line_buf: Vec<u8> = Vec::with_capacity(256);
        loop {
            line_buf.clear();
            reader.read_line(&mut line_buf, max_header_size).await?;
            if !line_buf.is_empty() {
                break;
            }
        }
        let line = std::str::from_utf8(&line_buf)
            .map_err(|_| HttpResponseParseError::InvalidStatusLine)?;
        let mut rsp = Self::parse_status_line(line)?;

        let mut head_size = line_buf.len();
        loop {
            line_buf.clear();
            match reader.read_line(&mut line_buf, max_header_size).await {
                Ok(()) => {}
                Err(LineRecvError::Closed) => {
                    return Err(HttpResponseParseError::IoFailed(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "closed inside the response head",
                    )));
                }
                Err(e) => return Err(e.into()),
            }
            if line_buf.is_empty() {
                break;
            }
            head_size += line_buf.len() + 2;
            if head_size > max_header_size {
                return Err(HttpResponseParseError::TooLargeHeader);
            }
            let line = std::str::from_utf8(&line_buf)
                .map_err(|_| HttpResponseParseError::InvalidHeaderLine)?;
            rsp.parse_header_line(line)?;
        }

        rsp.finalize_keep_alive();
        Ok(rsp)
    }

    fn parse_status_line(line: &str) -> Result<Self, HttpResponseParseError> {
        let Some((version_tok, rest)) = line.split_once(' ') else {
            return Err(HttpResponseParseError::InvalidStatusLine);
        };
        let version = parse_http_version(version_tok)
            .ok_or_else(|| HttpResponseParseError::UnsupportedVersion(version_tok.to_string()))?;

        let rest = rest.trim_start();
        let (code_tok, reason) = match rest.split_once(' ') {
            Some((code, reason)) => (code, reason),
            None => (rest, ""),
        };
        if code_tok.len() != 3 || !code_tok.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HttpResponseParseError::InvalidStatusLine);
        }
        let code = atoi::atoi::<u16>(code_tok.as_bytes())
            .ok_or(HttpResponseParseError::InvalidStatusLine)?;
        if !(100..=599).contains(&code) {
            return Err(HttpResponseParseError::InvalidStatusLine);
        }

        Ok(HttpForwardRemoteResponse {
            version,
            code,
            reason: reason.to_string(),
            headers: HttpHeaderMap::new(),
            content_length: None,
            content_encoding: None,
            connection: Vec::new(),
            transfer_encoding: Vec::new(),
            keep_alive: false,
        })
    }

    fn parse_header_line(&mut self, line: &str) -> Result<(), HttpResponseParseError> {
        let Some((name, value)) = line.split_once(':') else {
            return Err(HttpResponseParseError::InvalidHeaderLine);
        };
        let name = name.trim();
        let value = value.trim();
        if name.is_empty() {
            return Err(HttpResponseParseError::InvalidHeaderLine);
        }

        match name.to_ascii_lowercase().as_str() {
            "connection" => {
                self.connection = token_list(value);
                self.headers
                    .add_parsed(name, value.to_ascii_lowercase().as_str());
                return Ok(());
            }
            "transfer-encoding" => {
                self.transfer_encoding = token_list(value);
                self.headers
                    .add_parsed(name, value.to_ascii_lowercase().as_str());
                return Ok(());
            }
            "content-length" => {
                let len = atoi::atoi::<u64>(value.as_bytes())
                    .ok_or(HttpResponseParseError::InvalidContentLength)?;
                self.content_length = Some(len);
            }
            "content-encoding" => {
                self.content_encoding = Some(value.to_ascii_lowercase());
            }
            _ => {}
        }
        self.headers.add_parsed(name, value);
        Ok(())
    }

    fn finalize_keep_alive(&mut self) {
        let mut keep = !matches!(self.version, Version::HTTP_10);
        if self.connection.iter().any(|t| t == "close") {
            keep = false;
        } else if self.connection.iter().any(|t| t == "keep-alive") {
            keep = true;
        }
        // transfer-encoding without chunked leaves the body close-delimited
        if !self.transfer_encoding.is_empty()
            && !self.transfer_encoding.iter().any(|t| t == "chunked")
        {
            keep = false;
        }
        self.keep_alive = keep;
    }

    #[inline]
    pub fn keep_alive(&self) -> bool {
        self.keep_alive
    }

    pub fn set_no_keep_alive(&mut self) {
        self.keep_alive = false;
    }

    pub fn cache_control(&self) -> Option<&str> {
        self.headers.get("cache-control")
    }

    pub fn expires(&self) -> Option<&str> {
        self.headers.get("expires")
    }

    pub fn pragma(&self) -> Option<&str> {
        self.headers.get("pragma")
    }

    /// Body framing of this response, `None` for bodiless messages.
    pub fn body_type(&self, method: &Method) -> Option<HttpBodyType> {
        if *method == Method::HEAD {
            return None;
        }
        if (100..200).contains(&self.code) || self.code == 204 || self.code == 304 {
            return None;
        }
        if self.transfer_encoding.iter().any(|t| t == "chunked") {
            return Some(HttpBodyType::Chunked);
        }
        if !self.transfer_encoding.is_empty() {
            return Some(HttpBodyType::ReadUntilEnd);
        }
        match self.content_length {
            Some(0) => None,
            Some(len) => Some(HttpBodyType::ContentLength(len)),
            None => Some(HttpBodyType::ReadUntilEnd),
        }
    }

    /// True when the response advertises neither a length nor a transfer
    /// coding for its body.
    pub fn body_is_unframed(&self) -> bool {
        self.content_length.is_none() && self.transfer_encoding.is_empty()
    }

    pub fn set_content_length(&mut self, len: u64) {
        let mut fmt = itoa::Buffer::new();
        self.headers.set("Content-Length", Some(fmt.format(len)));
        self.content_length = Some(len);
    }

    pub fn remove_transfer_encoding(&mut self) {
        self.headers.set("Transfer-Encoding", None);
        self.transfer_encoding.clear();
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf: Vec<u8> = Vec::with_capacity(1024);
        self.serialize_to(&mut buf);
        buf
    }

    pub fn serialize_to(&self, buf: &mut Vec<u8>) {
        buf.put_slice(format!("{:?}", self.version).as_bytes());
        let mut fmt = itoa::Buffer::new();
        buf.put_u8(b' ');
        buf.put_slice(fmt.format(self.code).as_bytes());
        if !self.reason.is_empty() {
            buf.put_u8(b' ');
            buf.put_slice(self.reason.as_bytes());
        }
        buf.put_slice(b"\r\n");
        self.headers.serialize_to(buf);
        buf.put_slice(b"\r\n");
    }
}
