/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use log::debug;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use via_io_ext::{tunnel_pump, CopyError};

use crate::module::http_forward::HttpProxyClientResponse;
use crate::module::tcp_connect::tcp_connect_to;
use crate::serve::{ServerTaskError, ServerTaskResult};

use super::pipeline::HttpRequestPipeline;
use super::{HttpClientReader, HttpClientWriter};

impl HttpRequestPipeline<'_> {
    /// Handle a `CONNECT` request: open the upstream, confirm to the
    /// client, then pump bytes both ways until either side closes. The
    /// client connection is consumed either way.
    pub(super) async fn run_connect(
        &mut self,
        clt_r: &mut HttpClientReader,
        clt_w: &mut HttpClientWriter,
    ) -> ServerTaskResult<()> {
        self.persist_clt = false;
        self.next_step = None;

        let Some(req) = self.req.as_ref() else {
            return Err(ServerTaskError::InternalServerError("no request in flight"));
        };

        let (upstream, via_relay) = match &self.ctx.server_config.relay_proxy {
            Some(relay) => (relay.clone(), true),
            None => {
                let ups = match req.connect_upstream() {
                    Ok(ups) => ups,
                    Err(e) => {
                        if let Some(rsp) = HttpProxyClientResponse::from_request_error(&e) {
                            let _ = rsp.reply_err_to_request(clt_w).await;
                            self.rsp_header_sent = true;
                        }
                        return Err(e.into());
                    }
                };
                (ups, false)
            }
        };

        let stream = match tcp_connect_to(&upstream).await {
            Ok(stream) => stream,
            Err(e) => {
                let rsp = HttpProxyClientResponse::from_connect_error(&e);
                let _ = rsp.reply_err_to_request(clt_w).await;
                self.rsp_header_sent = true;
                return Err(e.into());
            }
        };
        self.ups_addr = Some(upstream);

        if via_relay {
            // forward the CONNECT head; the relay's own reply reaches the
            // client through the tunnel
            let head = req.serialize_for_proxy();
            let mut stream = stream;
            stream
                .write_all(&head)
                .await
                .map_err(ServerTaskError::UpstreamWriteFailed)?;
            self.tunnel_transparent(clt_r, clt_w, stream).await
        } else {
            HttpProxyClientResponse::reply_ok_to_connect(req.version, clt_w)
                .await
                .map_err(ServerTaskError::ClientTcpWriteFailed)?;
            self.rsp_header_sent = true;
            self.tunnel_transparent(clt_r, clt_w, stream).await
        }
    }

    async fn tunnel_transparent(
        &mut self,
        clt_r: &mut HttpClientReader,
        clt_w: &mut HttpClientWriter,
        ups: TcpStream,
    ) -> ServerTaskResult<()> {
        self.rsp_header_sent = true;
        let buffer_size = self.ctx.server_config.tcp_copy_buffer_size;
        let (mut ups_r, mut ups_w) = ups.into_split();

        let (clt_to_ups, ups_to_clt) = tokio::join!(
            tunnel_pump(clt_r, &mut ups_w, buffer_size),
            tunnel_pump(&mut ups_r, clt_w, buffer_size),
        );

        match (clt_to_ups, ups_to_clt) {
            (Ok(up), Ok(down)) => {
                debug!(
                    "conn {} tunnel done, {up} bytes up, {down} bytes down",
                    self.ctx.conn_id
                );
                Ok(())
            }
            (Err(CopyError::WriteFailed(e)), _) | (Err(CopyError::ReadFailed(e)), _) => {
                Err(ServerTaskError::UpstreamWriteFailed(e))
            }
            (_, Err(CopyError::WriteFailed(e))) | (_, Err(CopyError::ReadFailed(e))) => {
                Err(ServerTaskError::ClientTcpWriteFailed(e))
            }
        }
    }
}
