/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use log::{debug, trace, warn};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::config::HttpProxyServerConfig;
use crate::intercept::{ClientInfo, HttpProxyInterceptor};
use crate::serve::{ServerConnectionRegistry, ServerQuitPolicy};

use super::task::{CommonTaskContext, HttpConnectionTask};

type InterceptorFactory =
    dyn Fn(&ClientInfo) -> Option<Box<dyn HttpProxyInterceptor>> + Send + Sync;

/// The proxy server: a loopback TCP acceptor spawning one connection task
/// per accepted client.
///
/// The factory is asked for an interceptor for every connection; answering
/// `None` refuses the client outright. An error inside one connection task
/// never disturbs the acceptor or other connections.
pub struct HttpProxyServer {
    config: Arc<HttpProxyServerConfig>,
    interceptor_factory: Box<InterceptorFactory>,
    quit_policy: Arc<ServerQuitPolicy>,
    registry: Arc<ServerConnectionRegistry>,
    quit_tx: watch::Sender<bool>,
}

impl HttpProxyServer {
    pub fn new<F>(config: HttpProxyServerConfig, interceptor_factory: F) -> Arc<Self>
    where
        F: Fn(&ClientInfo) -> Option<Box<dyn HttpProxyInterceptor>> + Send + Sync + 'static,
    {
        let (quit_tx, _) = watch::channel(false);
        Arc::new(HttpProxyServer {
            config: Arc::new(config),
            interceptor_factory: Box::new(interceptor_factory),
            quit_policy: Arc::new(ServerQuitPolicy::default()),
            registry: Arc::new(ServerConnectionRegistry::new()),
            quit_tx,
        })
    }

    /// Bind the listener and start accepting. Returns the bound address,
    /// which is what you want with a port-0 config.
    pub async fn start(self: &Arc<Self>) -> anyhow::Result<SocketAddr> {
        let listen_addr = self.config.listen_addr();
        let listener = TcpListener::bind(listen_addr)
            .await
            .context("failed to bind the proxy listener")?;
        let local_addr = listener
            .local_addr()
            .context("failed to get the bound address")?;

        tokio::spawn(Arc::clone(self).run_accept(listener, local_addr));
        tokio::spawn(Arc::clone(self).run_sweeper());
        debug!("proxy server listening on {local_addr}");
        Ok(local_addr)
    }

    /// Stop accepting and tell running pipelines to wind down at their
    /// next step.
    pub fn quit(&self) {
        self.quit_policy.set_force_quit();
        let _ = self.quit_tx.send(true);
    }

    pub fn alive_connection_count(&self) -> usize {
        self.registry.alive_count()
    }

    async fn run_accept(self: Arc<Self>, listener: TcpListener, local_addr: SocketAddr) {
        let mut quit_rx = self.quit_tx.subscribe();
        loop {
            tokio::select! {
                biased;

                _ = quit_rx.changed() => break,
                r = listener.accept() => match r {
                    Ok((stream, peer_addr)) => {
                        self.spawn_tcp_task(stream, peer_addr, local_addr);
                    }
                    Err(e) => {
                        warn!("accept failed: {e:?}");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                }
            }
        }
        debug!("proxy server on {local_addr} stopped accepting");
    }

    fn spawn_tcp_task(&self, stream: TcpStream, peer_addr: SocketAddr, local_addr: SocketAddr) {
        let info = ClientInfo {
            client_addr: peer_addr,
            server_addr: local_addr,
        };
        let Some(interceptor) = (self.interceptor_factory)(&info) else {
            debug!("client {peer_addr} refused by the interceptor factory");
            return;
        };
        let _ = stream.set_nodelay(true);

        let (conn_id, token) = self.registry.register(peer_addr);
        let ctx = Arc::new(CommonTaskContext {
            server_config: Arc::clone(&self.config),
            server_quit_policy: Arc::clone(&self.quit_policy),
            tcp_server_addr: local_addr,
            tcp_client_addr: peer_addr,
            conn_id,
        });
        trace!("conn {conn_id}: new client from {peer_addr}");

        let task = HttpConnectionTask::new(ctx, interceptor);
        tokio::spawn(async move {
            task.into_running(stream).await;
            drop(token);
        });
    }

    async fn run_sweeper(self: Arc<Self>) {
        let mut quit_rx = self.quit_tx.subscribe();
        let mut interval = tokio::time::interval(self.config.sweep_interval);
        interval.tick().await; // the immediate first tick
        loop {
            tokio::select! {
                biased;

                _ = quit_rx.changed() => break,
                _ = interval.tick() => {
                    let evicted = self.registry.sweep();
                    if evicted > 0 {
                        trace!("swept {evicted} dead connection entries");
                    }
                }
            }
        }
    }
}
