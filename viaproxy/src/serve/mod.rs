/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::sync::atomic::{AtomicBool, Ordering};

mod error;
mod registry;

pub mod http_proxy;

pub use error::{ServerTaskError, ServerTaskResult};
pub(crate) use registry::ServerConnectionRegistry;

/// Shared quit flag; running pipelines observe it between steps.
#[derive(Default)]
pub struct ServerQuitPolicy {
    force_quit: AtomicBool,
}

impl ServerQuitPolicy {
    pub fn force_quit(&self) -> bool {
        self.force_quit.load(Ordering::Relaxed)
    }

    pub fn set_force_quit(&self) {
        self.force_quit.store(true, Ordering::Relaxed);
    }
}
