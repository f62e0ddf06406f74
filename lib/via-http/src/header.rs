/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use bytes::BufMut;

struct HttpHeaderEntry {
    /// lower-cased lookup key
    name: String,
    /// name as it appeared on the wire, kept for serialization
    raw_name: String,
    value: String,
}

/// Order-preserving header block.
///
/// What is forwarded to the peer is this container serialized in order, so
/// an exchange that passes through untouched keeps its original header
/// ordering. Mutations are local: replacing a value keeps the header at its
/// position, new headers append at the end.
#[derive(Default)]
pub struct HttpHeaderMap {
    entries: Vec<HttpHeaderEntry>,
}

impl HttpHeaderMap {
    pub fn new() -> Self {
        HttpHeaderMap::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Add a header parsed off the wire.
    ///
    /// A repeated header concatenates to the first occurrence with a `,`,
    /// except `Content-Length`, where the last occurrence wins.
    pub fn add_parsed(&mut self, raw_name: &str, value: &str) {
        let name = raw_name.to_ascii_lowercase();
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            if name == "content-length" {
                entry.value.clear();
                entry.value.push_str(value);
            } else {
                entry.value.push(',');
                entry.value.push_str(value);
            }
            return;
        }
        self.entries.push(HttpHeaderEntry {
            name,
            raw_name: raw_name.to_string(),
            value: value.to_string(),
        });
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Set or remove a header.
    ///
    /// `Some(value)` updates the existing header in place without
    /// reordering, or appends it at the end when absent. `None` removes the
    /// header and is a no-op when it is absent.
    pub fn set(&mut self, name: &str, value: Option<&str>) {
        match value {
            Some(value) => {
                let lower = name.to_ascii_lowercase();
                if let Some(entry) = self.entries.iter_mut().find(|e| e.name == lower) {
                    entry.value.clear();
                    entry.value.push_str(value);
                } else {
                    self.entries.push(HttpHeaderEntry {
                        name: lower,
                        raw_name: name.to_string(),
                        value: value.to_string(),
                    });
                }
            }
            None => self.remove(name),
        }
    }

    pub fn remove(&mut self, name: &str) {
        let name = name.to_ascii_lowercase();
        self.entries.retain(|e| e.name != name);
    }

    /// Headers in wire order, as `(name-as-received, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|e| (e.raw_name.as_str(), e.value.as_str()))
    }

    /// Write every header line in order. The terminating blank line is the
    /// caller's business.
    pub fn serialize_to(&self, buf: &mut Vec<u8>) {
        for entry in &self.entries {
            buf.put_slice(entry.raw_name.as_bytes());
            buf.put_slice(b": ");
            buf.put_slice(entry.value.as_bytes());
            buf.put_slice(b"\r\n");
        }
    }
}
