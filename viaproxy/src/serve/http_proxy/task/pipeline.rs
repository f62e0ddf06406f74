/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use std::sync::Arc;

use http::{Method, Version};
use log::{debug, trace, warn};
use tokio::net::TcpStream;

use via_http::client::HttpForwardRemoteResponse;
use via_http::server::HttpProxyClientRequest;
use via_io_ext::HttpBufReader;
use via_types::net::UpstreamAddr;

use crate::intercept::{HttpProxyInterceptor, PipelineControl, PipelineStep, ResponseBodySink};
use crate::module::http_forward::{HttpForwardContext, HttpProxyClientResponse};
use crate::serve::{ServerTaskError, ServerTaskResult};

use super::{CommonTaskContext, HttpClientReader, HttpClientWriter};

/// Serves one accepted client connection: runs request pipelines back to
/// back for as long as the client side stays persistent.
pub(crate) struct HttpConnectionTask {
    ctx: Arc<CommonTaskContext>,
    interceptor: Box<dyn HttpProxyInterceptor>,
    fwd_ctx: HttpForwardContext,
}

impl HttpConnectionTask {
    pub(crate) fn new(ctx: Arc<CommonTaskContext>, interceptor: Box<dyn HttpProxyInterceptor>) -> Self {
        let buffer_size = ctx.server_config.buffer_size;
        HttpConnectionTask {
            ctx,
            interceptor,
            fwd_ctx: HttpForwardContext::new(buffer_size),
        }
    }

    pub(crate) async fn into_running(mut self, stream: TcpStream) {
        debug!(
            "conn {}: serving {} on {}",
            self.ctx.conn_id, self.ctx.tcp_client_addr, self.ctx.tcp_server_addr
        );
        let (clt_r, mut clt_w) = stream.into_split();
        let mut clt_r =
            HttpBufReader::with_buffer_size(clt_r, self.ctx.server_config.buffer_size);

        loop {
            if self.ctx.server_quit_policy.force_quit() {
                break;
            }
            // wait for the next request; a close here is a normal idle end
            match clt_r.fill_wait_data().await {
                Ok(true) => {}
                Ok(false) => {
                    trace!("client {} closed", self.ctx.tcp_client_addr);
                    break;
                }
                Err(e) => {
                    trace!("client {} closed with error {e:?}", self.ctx.tcp_client_addr);
                    break;
                }
            }

            let mut pipeline = HttpRequestPipeline::new(
                &self.ctx,
                self.interceptor.as_mut(),
                &mut self.fwd_ctx,
            );
            match pipeline.run(&mut clt_r, &mut clt_w).await {
                Ok(()) => {
                    debug!(
                        "conn {} from {}: {} finished, ups {:?}, reused {}",
                        self.ctx.conn_id,
                        self.ctx.tcp_client_addr,
                        pipeline.brief_request(),
                        pipeline.ups_addr,
                        pipeline.reused_ups,
                    );
                }
                Err(e) => {
                    if !pipeline.rsp_header_sent {
                        if let Some(rsp) = HttpProxyClientResponse::from_task_err(&e) {
                            let _ = rsp.reply_err_to_request(&mut clt_w).await;
                        }
                    }
                    match e {
                        ServerTaskError::ClosedEarlyByClient => {
                            trace!(
                                "conn {} from {}: {e}",
                                self.ctx.conn_id, self.ctx.tcp_client_addr
                            );
                        }
                        _ => {
                            warn!(
                                "conn {} from {}: {} failed: {e}",
                                self.ctx.conn_id,
                                self.ctx.tcp_client_addr,
                                pipeline.brief_request(),
                            );
                        }
                    }
                    break;
                }
            }
            if !pipeline.persist_clt {
                break;
            }
        }
    }
}

/// One iteration of the request pipeline.
///
/// `next_step` is the continuation slot: every dispatched step takes it
/// out, runs, and leaves behind whatever should run next. Hooks may
/// overwrite it to divert the flow; an empty slot ends the iteration.
pub(crate) struct HttpRequestPipeline<'a> {
    pub(crate) ctx: &'a CommonTaskContext,
    pub(crate) interceptor: &'a mut dyn HttpProxyInterceptor,
    pub(crate) fwd_ctx: &'a mut HttpForwardContext,
    pub(crate) next_step: Option<PipelineStep>,
    pub(crate) req: Option<HttpProxyClientRequest>,
    pub(crate) rsp: Option<HttpForwardRemoteResponse>,
    pub(crate) req_version: Version,
    pub(crate) persist_clt: bool,
    pub(crate) persist_ups: bool,
    pub(crate) body_sink: Option<Box<dyn ResponseBodySink>>,
    pub(crate) early_reply: Option<HttpProxyClientResponse>,
    pub(crate) rsp_header_sent: bool,
    pub(crate) ups_addr: Option<UpstreamAddr>,
    pub(crate) reused_ups: bool,
}

impl<'a> HttpRequestPipeline<'a> {
    fn new(
        ctx: &'a CommonTaskContext,
        interceptor: &'a mut dyn HttpProxyInterceptor,
        fwd_ctx: &'a mut HttpForwardContext,
    ) -> Self {
        HttpRequestPipeline {
            ctx,
            interceptor,
            fwd_ctx,
            next_step: None,
            req: None,
            rsp: None,
            req_version: Version::HTTP_11,
            persist_clt: true,
            persist_ups: false,
            body_sink: None,
            early_reply: None,
            rsp_header_sent: false,
            ups_addr: None,
            reused_ups: false,
        }
    }

    async fn run(
        &mut self,
        clt_r: &mut HttpClientReader,
        clt_w: &mut HttpClientWriter,
    ) -> ServerTaskResult<()> {
        self.next_step = Some(PipelineStep::ReadRequest);
        loop {
            let Some(step) = self.next_step.take() else {
                break;
            };
            if self.ctx.server_quit_policy.force_quit() {
                self.abort_request();
                return Err(ServerTaskError::CanceledAsServerQuit);
            }
            let r = match step {
                PipelineStep::ReadRequest => self.read_request(clt_r, clt_w).await,
                PipelineStep::SendRequest => self.send_request(clt_r).await,
                PipelineStep::ReadResponse => self.read_response(clt_w).await,
                PipelineStep::SendResponse => self.send_response(clt_w).await,
                PipelineStep::Abort => {
                    self.abort_request();
                    Ok(())
                }
            };
            if let Err(e) = r {
                self.abort_request();
                return Err(e);
            }
        }
        if !self.persist_ups {
            self.fwd_ctx.close();
        }
        Ok(())
    }

    pub(crate) fn abort_request(&mut self) {
        self.fwd_ctx.close();
        self.persist_clt = false;
        self.next_step = None;
    }

    fn brief_request(&self) -> String {
        match &self.req {
            Some(req) => format!("{} {}", req.method, req.uri),
            None => "-".to_string(),
        }
    }

    async fn read_request(
        &mut self,
        clt_r: &mut HttpClientReader,
        clt_w: &mut HttpClientWriter,
    ) -> ServerTaskResult<()> {
        let mut req = match HttpProxyClientRequest::parse(
            clt_r,
            self.ctx.server_config.req_hdr_max_size,
        )
        .await
        {
            Ok(req) => req,
            Err(e) => {
                if let Some(rsp) = HttpProxyClientResponse::from_request_error(&e) {
                    let _ = rsp.reply_err_to_request(clt_w).await;
                    self.rsp_header_sent = true;
                }
                return Err(e.into());
            }
        };
        self.req_version = req.version;
        self.persist_clt = req.keep_alive();
        self.next_step = Some(PipelineStep::SendRequest);

        let mut ctl = PipelineControl {
            next_step: &mut self.next_step,
            body_sink: &mut self.body_sink,
            early_reply: &mut self.early_reply,
        };
        self.interceptor.on_receive_request(&mut req, &mut ctl);

        if let Some(reply) = self.early_reply.take() {
            reply
                .reply_err_to_request(clt_w)
                .await
                .map_err(ServerTaskError::ClientTcpWriteFailed)?;
            self.rsp_header_sent = true;
            self.req = Some(req);
            self.abort_request();
            return Ok(());
        }
        if self.next_step == Some(PipelineStep::Abort) {
            self.req = Some(req);
            return Ok(());
        }

        if req.method == Method::CONNECT {
            self.req = Some(req);
            return self.run_connect(clt_r, clt_w).await;
        }

        // the upstream to open a socket to: the relay when one is set,
        // the request target otherwise
        let upstream = match &self.ctx.server_config.relay_proxy {
            Some(relay) => relay.clone(),
            None => match req.forward_upstream() {
                Ok(ups) => ups,
                Err(e) => {
                    if let Some(rsp) = HttpProxyClientResponse::from_request_error(&e) {
                        let _ = rsp.reply_err_to_request(clt_w).await;
                        self.rsp_header_sent = true;
                    }
                    return Err(e.into());
                }
            },
        };

        match self.fwd_ctx.acquire(&upstream).await {
            Ok(reused) => {
                self.reused_ups = reused;
            }
            Err(e) => {
                let rsp = HttpProxyClientResponse::from_connect_error(&e);
                let _ = rsp.reply_err_to_request(clt_w).await;
                self.rsp_header_sent = true;
                return Err(e.into());
            }
        }
        self.ups_addr = Some(upstream);
        self.req = Some(req);
        Ok(())
    }
}
