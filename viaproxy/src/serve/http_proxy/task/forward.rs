/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

use http::Method;
use log::trace;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use via_http::client::HttpForwardRemoteResponse;
use via_http::{HttpBodyDecodeReader, HttpBodyError, HttpBodyReader, HttpBodyType};

use crate::intercept::{PipelineControl, PipelineStep, ResponseBodySink};
use crate::module::tcp_connect::set_tcp_keepalive;
use crate::serve::{ServerTaskError, ServerTaskResult};

use super::pipeline::HttpRequestPipeline;
use super::{HttpClientReader, HttpClientWriter};

fn req_body_err(e: HttpBodyError) -> ServerTaskError {
    match e {
        HttpBodyError::ReadFailed(e) => ServerTaskError::ClientTcpReadFailed(e),
        HttpBodyError::WriteFailed(e) => ServerTaskError::UpstreamWriteFailed(e),
        HttpBodyError::InvalidChunkedBody => {
            ServerTaskError::InvalidClientProtocol("invalid chunked body in client request")
        }
    }
}

fn rsp_body_err(e: HttpBodyError) -> ServerTaskError {
    match e {
        HttpBodyError::ReadFailed(e) => ServerTaskError::UpstreamReadFailed(e),
        HttpBodyError::WriteFailed(e) => ServerTaskError::ClientTcpWriteFailed(e),
        HttpBodyError::InvalidChunkedBody => {
            ServerTaskError::InvalidUpstreamProtocol("invalid chunked body in remote response")
        }
    }
}

impl HttpRequestPipeline<'_> {
    /// Emit the request head and body to the upstream.
    pub(super) async fn send_request(
        &mut self,
        clt_r: &mut HttpClientReader,
    ) -> ServerTaskResult<()> {
        let Some(req) = self.req.as_ref() else {
            return Err(ServerTaskError::InternalServerError("no request to send"));
        };
        let Some(conn) = self.fwd_ctx.connection_mut() else {
            return Err(ServerTaskError::InternalServerError("no upstream connection"));
        };

        let head = if self.ctx.server_config.relay_proxy.is_some() {
            req.serialize_for_proxy()
        } else {
            req.serialize_for_origin()
        };
        conn.w
            .write_all(&head)
            .await
            .map_err(ServerTaskError::UpstreamWriteFailed)?;

        if let Some(body_type) = req.body_type() {
            HttpBodyReader::new(clt_r, body_type, self.ctx.server_config.body_line_max_len)
                .copy_to(&mut conn.w)
                .await
                .map_err(req_body_err)?;
        }
        conn.w
            .flush()
            .await
            .map_err(ServerTaskError::UpstreamWriteFailed)?;

        self.next_step = Some(PipelineStep::ReadResponse);
        Ok(())
    }

    /// Read the response head; `100 Continue` heads are passed through and
    /// the following real head is taken instead.
    pub(super) async fn read_response(
        &mut self,
        clt_w: &mut HttpClientWriter,
    ) -> ServerTaskResult<()> {
        let rsp_hdr_max_size = self.ctx.server_config.rsp_hdr_max_size;
        let Some(conn) = self.fwd_ctx.connection_mut() else {
            return Err(ServerTaskError::InternalServerError("no upstream connection"));
        };

        let mut rsp = HttpForwardRemoteResponse::parse(&mut conn.r, rsp_hdr_max_size)
            .await
            .map_err(ServerTaskError::from)?;
        while rsp.code == 100 {
            clt_w
                .write_all(&rsp.serialize())
                .await
                .map_err(ServerTaskError::ClientTcpWriteFailed)?;
            rsp = HttpForwardRemoteResponse::parse(&mut conn.r, rsp_hdr_max_size)
                .await
                .map_err(ServerTaskError::from)?;
        }

        self.persist_ups = rsp.keep_alive();
        if self.persist_ups {
            if let Err(e) = set_tcp_keepalive(conn.fd, true) {
                trace!("failed to enable keepalive on upstream socket: {e:?}");
            }
        } else {
            // a one-shot upstream takes the client connection down with it
            self.persist_clt = false;
        }

        self.next_step = Some(PipelineStep::SendResponse);

        let Some(req) = self.req.as_ref() else {
            return Err(ServerTaskError::InternalServerError("no request in flight"));
        };
        let mut ctl = PipelineControl {
            next_step: &mut self.next_step,
            body_sink: &mut self.body_sink,
            early_reply: &mut self.early_reply,
        };
        self.interceptor.on_receive_response(req, &mut rsp, &mut ctl);
        self.rsp = Some(rsp);

        if let Some(reply) = self.early_reply.take() {
            reply
                .reply_err_to_request(clt_w)
                .await
                .map_err(ServerTaskError::ClientTcpWriteFailed)?;
            self.rsp_header_sent = true;
            self.abort_request();
        }
        Ok(())
    }

    /// Forward the response downstream, choosing the body framing.
    pub(super) async fn send_response(
        &mut self,
        clt_w: &mut HttpClientWriter,
    ) -> ServerTaskResult<()> {
        let Some(mut rsp) = self.rsp.take() else {
            return Err(ServerTaskError::InternalServerError("no response to send"));
        };
        let Some(req) = self.req.as_ref() else {
            return Err(ServerTaskError::InternalServerError("no request in flight"));
        };
        let method = req.method.clone();

        if let Some(sink) = self.body_sink.take() {
            return self.send_response_to_sink(clt_w, &rsp, sink, &method).await;
        }

        let body_line_max = self.ctx.server_config.body_line_max_len;
        let Some(conn) = self.fwd_ctx.connection_mut() else {
            return Err(ServerTaskError::InternalServerError("no upstream connection"));
        };

        match rsp.body_type(&method) {
            None => {
                clt_w
                    .write_all(&rsp.serialize())
                    .await
                    .map_err(ServerTaskError::ClientTcpWriteFailed)?;
                self.rsp_header_sent = true;
            }
            Some(HttpBodyType::ReadUntilEnd) if rsp.body_is_unframed() && rsp.keep_alive() => {
                // no framing but the upstream claims keep-alive: probe a
                // bounded slice, frame it ourselves, and retire the
                // upstream socket
                let mut probe = [0u8; 512];
                let n = conn
                    .r
                    .read(&mut probe)
                    .await
                    .map_err(ServerTaskError::UpstreamReadFailed)?;
                rsp.set_content_length(n as u64);
                let mut buf = rsp.serialize();
                buf.extend_from_slice(&probe[..n]);
                clt_w
                    .write_all(&buf)
                    .await
                    .map_err(ServerTaskError::ClientTcpWriteFailed)?;
                self.rsp_header_sent = true;
                self.persist_ups = false;
            }
            Some(body_type) => {
                if matches!(body_type, HttpBodyType::ReadUntilEnd) {
                    // close-delimited: this upstream is spent
                    self.persist_ups = false;
                }
                clt_w
                    .write_all(&rsp.serialize())
                    .await
                    .map_err(ServerTaskError::ClientTcpWriteFailed)?;
                self.rsp_header_sent = true;
                HttpBodyReader::new(&mut conn.r, body_type, body_line_max)
                    .copy_to(clt_w)
                    .await
                    .map_err(rsp_body_err)?;
            }
        }
        clt_w
            .flush()
            .await
            .map_err(ServerTaskError::ClientTcpWriteFailed)?;
        Ok(())
    }

    /// Deliver the decoded response body to the installed sink instead of
    /// the client; whatever the sink emits at the end is the response.
    async fn send_response_to_sink(
        &mut self,
        clt_w: &mut HttpClientWriter,
        rsp: &HttpForwardRemoteResponse,
        mut sink: Box<dyn ResponseBodySink>,
        method: &Method,
    ) -> ServerTaskResult<()> {
        let body_line_max = self.ctx.server_config.body_line_max_len;
        let Some(conn) = self.fwd_ctx.connection_mut() else {
            return Err(ServerTaskError::InternalServerError("no upstream connection"));
        };

        if let Some(body_type) = rsp.body_type(method) {
            if matches!(body_type, HttpBodyType::ReadUntilEnd) {
                self.persist_ups = false;
            }
            let mut decoder = HttpBodyDecodeReader::new(&mut conn.r, body_type, body_line_max);
            let mut buf: Vec<u8> = Vec::with_capacity(16384);
            loop {
                buf.clear();
                let n = decoder.next_packet(&mut buf).await.map_err(rsp_body_err)?;
                if n == 0 {
                    break;
                }
                sink.receive_packet(&buf);
            }
        }

        if let Some(bytes) = sink.finish(rsp) {
            clt_w
                .write_all(&bytes)
                .await
                .map_err(ServerTaskError::ClientTcpWriteFailed)?;
            clt_w
                .flush()
                .await
                .map_err(ServerTaskError::ClientTcpWriteFailed)?;
            self.rsp_header_sent = true;
        }
        Ok(())
    }
}
