/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 viaproxy authors
 */

//! The extension surface of the proxy.
//!
//! The host hands the server a factory producing one
//! [`HttpProxyInterceptor`] per client connection. The default trait
//! methods do nothing, so [`TransparentInterceptor`] passes everything
//! through untouched. Hooks get a [`PipelineControl`] to divert the
//! pipeline: jump to another step, abort, answer with a canned response,
//! or take over the response body with a [`ResponseBodySink`].
//!
//! To redirect a request, mutate it in `on_receive_request`:
//! `req.set_request_target(uri)` also updates the `Host` header when the
//! new target carries an authority.

use std::net::SocketAddr;

use http::StatusCode;

use via_http::client::HttpForwardRemoteResponse;
use via_http::server::HttpProxyClientRequest;

use crate::module::http_forward::HttpProxyClientResponse;

/// Who connected; handed to the interceptor factory.
#[derive(Clone, Copy, Debug)]
pub struct ClientInfo {
    pub client_addr: SocketAddr,
    pub server_addr: SocketAddr,
}

/// A stage of the per-request pipeline. The engine keeps a `next step`
/// slot; whatever is in it after a step finishes runs next, and an empty
/// slot stops the iteration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStep {
    ReadRequest,
    SendRequest,
    ReadResponse,
    SendResponse,
    Abort,
}

/// Handle the hooks get to steer the current request.
pub struct PipelineControl<'a> {
    pub(crate) next_step: &'a mut Option<PipelineStep>,
    pub(crate) body_sink: &'a mut Option<Box<dyn ResponseBodySink>>,
    pub(crate) early_reply: &'a mut Option<HttpProxyClientResponse>,
}

impl PipelineControl<'_> {
    /// Divert the pipeline to `step` after the current hook returns.
    pub fn set_next_step(&mut self, step: PipelineStep) {
        *self.next_step = Some(step);
    }

    /// Drop the upstream connection and end the request. The client
    /// connection is not reused afterwards.
    pub fn abort(&mut self) {
        *self.next_step = Some(PipelineStep::Abort);
    }

    /// Answer the client with a canned error page instead of forwarding.
    pub fn reply_error(&mut self, status: StatusCode) {
        *self.early_reply = Some(HttpProxyClientResponse::from_standard(status, true));
    }

    /// Answer the client with a `302 Found` redirect.
    pub fn reply_redirect(&mut self, location: &str) {
        *self.early_reply = Some(HttpProxyClientResponse::redirect(location));
    }

    /// Take over the response body: decoded body fragments go to `sink`
    /// instead of the client, and `sink.finish()` decides what the client
    /// is sent.
    pub fn install_body_sink(&mut self, sink: Box<dyn ResponseBodySink>) {
        *self.body_sink = Some(sink);
    }
}

/// Per-connection hooks into the request pipeline.
///
/// One instance serves all requests of one client connection, so an
/// implementation may keep per-connection state between hooks.
pub trait HttpProxyInterceptor: Send {
    fn on_receive_request(
        &mut self,
        _req: &mut HttpProxyClientRequest,
        _ctl: &mut PipelineControl<'_>,
    ) {
    }

    fn on_receive_response(
        &mut self,
        _req: &HttpProxyClientRequest,
        _rsp: &mut HttpForwardRemoteResponse,
        _ctl: &mut PipelineControl<'_>,
    ) {
    }
}

/// Consumes the response body when installed via
/// [`PipelineControl::install_body_sink`].
pub trait ResponseBodySink: Send {
    /// One decoded body fragment. Chunk framing is already removed;
    /// content codings are not, use [`via_http::encoding`] to unpack them.
    fn receive_packet(&mut self, data: &[u8]);

    /// End of the message body. Whatever is returned is written to the
    /// client verbatim (head and body both); `None` writes nothing.
    fn finish(&mut self, rsp: &HttpForwardRemoteResponse) -> Option<Vec<u8>>;
}

/// Pass-through: no mutation, no diversion.
#[derive(Default)]
pub struct TransparentInterceptor;

impl HttpProxyInterceptor for TransparentInterceptor {}
