//! Scripted transport for exercising users without a server.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use bytes::Bytes;
use catalog_types::drain::DrainBodyFuture;
use http_body_util::Full;
use hyper::header::CONTENT_TYPE;
use hyper::{Method, Request, StatusCode};
use parking_lot::Mutex;

use crate::client::{HttpResponse, Transport};

#[derive(Debug, Clone)]
pub(crate) struct SentRequest {
    pub method: Method,
    pub uri: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Result<HttpResponse>>,
    sent: Vec<SentRequest>,
}

/// Answers with queued replies in order, `200 {}` once the queue runs dry.
#[derive(Clone, Default)]
pub(crate) struct ScriptedTransport {
    script: Arc<Mutex<Script>>,
}

impl ScriptedTransport {
    pub fn push(&self, status: u16, body: &str) {
        let status = StatusCode::from_u16(status).unwrap();
        self.script
            .lock()
            .replies
            .push_back(Ok(HttpResponse::new(status, body.as_bytes())));
    }

    pub fn push_error(&self, message: &'static str) {
        self.script
            .lock()
            .replies
            .push_back(Err(anyhow::anyhow!(message)));
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.script.lock().sent.clone()
    }
}

impl Transport for ScriptedTransport {
    async fn send(&self, request: Request<Full<Bytes>>) -> Result<HttpResponse> {
        let (parts, body) = request.into_parts();
        let body = DrainBodyFuture::new(body, 64).await?;
        let sent = SentRequest {
            method: parts.method,
            uri: parts.uri.to_string(),
            path: parts.uri.path().to_owned(),
            content_type: parts
                .headers
                .get(CONTENT_TYPE)
                .and_then(|hv| hv.to_str().ok())
                .map(str::to_owned),
            body,
        };
        let mut script = self.script.lock();
        script.sent.push(sent);
        script
            .replies
            .pop_front()
            .unwrap_or_else(|| Ok(HttpResponse::new(StatusCode::OK, &b"{}"[..])))
    }
}
