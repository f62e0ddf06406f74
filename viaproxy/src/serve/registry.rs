/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, Weak};

use log::trace;

/// Live per-connection entries, keyed by a monotonically assigned id.
///
/// A connection task holds the strong end of its token; when the task
/// finishes, its entry goes stale and the periodic sweep evicts it.
pub(crate) struct ServerConnectionRegistry {
    inner: Mutex<RegistryInner>,
}

struct RegistryInner {
    next_id: u64,
    entries: HashMap<u64, ConnectionEntry>,
}

struct ConnectionEntry {
    peer_addr: SocketAddr,
    token: Weak<()>,
}

impl ServerConnectionRegistry {
    pub(crate) fn new() -> Self {
        ServerConnectionRegistry {
            inner: Mutex::new(RegistryInner {
                next_id: 0,
                entries: HashMap::new(),
            }),
        }
    }

    pub(crate) fn register(&self, peer_addr: SocketAddr) -> (u64, Arc<()>) {
        let token = Arc::new(());
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.insert(
            id,
            ConnectionEntry {
                peer_addr,
                token: Arc::downgrade(&token),
            },
        );
        (id, token)
    }

    /// Evict entries whose connection task is gone. Returns how many.
    pub(crate) fn sweep(&self) -> usize {
        let mut inner = self.inner.lock().unwrap();
        let before = inner.entries.len();
        inner.entries.retain(|id, e| {
            if e.token.strong_count() > 0 {
                return true;
            }
            trace!("conn {id} from {} is done, dropping its entry", e.peer_addr);
            false
        });
        before - inner.entries.len()
    }

    pub(crate) fn alive_count(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner
            .entries
            .values()
            .filter(|e| e.token.strong_count() > 0)
            .count()
    }
}
