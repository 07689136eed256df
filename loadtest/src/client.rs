use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bytes::Bytes;
use catalog_types::drain::DrainBodyFuture;
use catalog_types::{empty_body, json_body};
use http_body_util::Full;
use hyper::header::{CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Method, Request, StatusCode};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::statistics::{Outcome, Statistics};

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl HttpResponse {
    #[must_use]
    pub fn new(status: StatusCode, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).context("Failed to deserialize response body")
    }
}

/// Sends a fully built request and returns the drained response.
///
/// Errors are network level: connect failures, timeouts, broken bodies.
/// Any status code the server answers with is a successful send.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: Request<Full<Bytes>>,
    ) -> impl Future<Output = Result<HttpResponse>> + Send;
}

#[derive(Clone)]
pub struct HttpClient {
    client: Client<HttpConnector, Full<Bytes>>,
    timeout: Option<Duration>,
}

impl HttpClient {
    #[must_use]
    pub fn new(timeout: Option<Duration>) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self { client, timeout }
    }

    async fn send_recv(&self, request: Request<Full<Bytes>>) -> Result<HttpResponse> {
        let resp = self
            .client
            .request(request)
            .await
            .context("Failed to send request")?;
        let status = resp.status();
        let content_length: usize = resp
            .headers()
            .get(CONTENT_LENGTH)
            .and_then(|hv| hv.to_str().ok())
            .and_then(|hv| hv.parse().ok())
            .unwrap_or(1024);
        let body = DrainBodyFuture::new(resp.into_body(), content_length)
            .await
            .context("Failed to read response body")?;
        Ok(HttpResponse { status, body })
    }
}

impl Transport for HttpClient {
    async fn send(&self, request: Request<Full<Bytes>>) -> Result<HttpResponse> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.send_recv(request))
                .await
                .with_context(|| format!("Request timed out after {limit:?}"))?,
            None => self.send_recv(request).await,
        }
    }
}

/// The HTTP client owned by one simulated user.
///
/// Every request is timed and recorded into the user's own [`Statistics`]
/// under its label, which defaults to the request path.
pub struct UserClient<T> {
    host: String,
    transport: T,
    stats: Statistics,
}

impl<T: Transport> UserClient<T> {
    pub fn new(host: &str, transport: T) -> Self {
        Self {
            host: host.trim_end_matches('/').to_owned(),
            transport,
            stats: Statistics::default(),
        }
    }

    #[inline]
    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    #[inline]
    pub fn into_statistics(self) -> Statistics {
        self.stats
    }

    /// `GET path`, successful iff the status is 2xx.
    pub async fn get(&mut self, path: &str, name: Option<&str>) -> Result<HttpResponse> {
        let label = name.unwrap_or(path);
        let (response, elapsed) = self
            .execute(Method::GET, path, empty_body(), false, label)
            .await?;
        self.stats
            .record(&Method::GET, label, elapsed, Outcome::from_status(response.status));
        Ok(response)
    }

    /// `POST path` with a JSON body, successful iff the status is 2xx.
    pub async fn post_json<B: Serialize>(
        &mut self,
        path: &str,
        body: &B,
        name: Option<&str>,
    ) -> Result<HttpResponse> {
        let label = name.unwrap_or(path);
        let (response, elapsed) = self
            .execute(Method::POST, path, json_body(body)?, true, label)
            .await?;
        self.stats
            .record(&Method::POST, label, elapsed, Outcome::from_status(response.status));
        Ok(response)
    }

    /// `POST path` with a JSON body, leaving the verdict to the caller.
    ///
    /// The sample is recorded once the returned guard is resolved, or by the
    /// 2xx rule if the guard is dropped unresolved.
    pub async fn post_json_catch<B: Serialize>(
        &mut self,
        path: &str,
        body: &B,
        name: Option<&str>,
    ) -> Result<CaughtResponse<'_>> {
        let label = name.unwrap_or(path).to_owned();
        let (response, elapsed) = self
            .execute(Method::POST, path, json_body(body)?, true, &label)
            .await?;
        Ok(CaughtResponse {
            stats: &mut self.stats,
            method: Method::POST,
            label,
            elapsed,
            response,
            resolved: false,
        })
    }

    async fn execute(
        &mut self,
        method: Method,
        path: &str,
        body: Full<Bytes>,
        json: bool,
        label: &str,
    ) -> Result<(HttpResponse, Duration)> {
        let uri = format!("{}{path}", self.host);
        let mut builder = Request::builder().method(method.clone()).uri(&uri);
        if json {
            builder = builder.header(CONTENT_TYPE, "application/json");
        }
        let request = builder
            .body(body)
            .with_context(|| format!("Failed to build {method} {uri}"))?;
        let start = Instant::now();
        match self.transport.send(request).await {
            Ok(response) => Ok((response, start.elapsed())),
            Err(e) => {
                self.stats.record(
                    &method,
                    label,
                    start.elapsed(),
                    Outcome::Failure(format!("{e:#}")),
                );
                Err(e)
            }
        }
    }
}

/// A response whose success is decided by the caller.
pub struct CaughtResponse<'a> {
    stats: &'a mut Statistics,
    method: Method,
    label: String,
    elapsed: Duration,
    response: HttpResponse,
    resolved: bool,
}

impl CaughtResponse<'_> {
    #[inline]
    pub fn response(&self) -> &HttpResponse {
        &self.response
    }

    pub fn success(mut self) {
        self.resolve(Outcome::Success);
    }

    pub fn failure(mut self, reason: impl Into<String>) {
        self.resolve(Outcome::Failure(reason.into()));
    }

    fn resolve(&mut self, outcome: Outcome) {
        self.resolved = true;
        self.stats
            .record(&self.method, &self.label, self.elapsed, outcome);
    }
}

impl Drop for CaughtResponse<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            let outcome = Outcome::from_status(self.response.status);
            self.resolve(outcome);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;

    #[tokio::test]
    async fn get_records_under_given_name() {
        let transport = ScriptedTransport::default();
        transport.push(200, "{}");
        transport.push(200, "{}");
        let mut client = UserClient::new("http://catalog", transport.clone());
        client.get("/products/123", Some("/products/[id]")).await.unwrap();
        client.get("/products/456", Some("/products/[id]")).await.unwrap();

        let stats = client.statistics();
        assert_eq!(stats.len(), 1);
        let entry = stats.get(&Method::GET, "/products/[id]").unwrap();
        assert_eq!(entry.requests(), 2);
        assert_eq!(entry.failures(), 0);

        let paths: Vec<_> = transport.requests().into_iter().map(|r| r.uri).collect();
        assert_eq!(
            paths,
            ["http://catalog/products/123", "http://catalog/products/456"]
        );
    }

    #[tokio::test]
    async fn non_2xx_is_a_failure() {
        let transport = ScriptedTransport::default();
        transport.push(404, r#"{"error":"Product not found"}"#);
        let mut client = UserClient::new("http://catalog/", transport);
        let resp = client.get("/products/9", None).await.unwrap();
        assert_eq!(resp.status, StatusCode::NOT_FOUND);
        let entry = client.statistics().get(&Method::GET, "/products/9").unwrap();
        assert_eq!(entry.failures(), 1);
    }

    #[tokio::test]
    async fn post_json_sends_json_content_type() {
        let transport = ScriptedTransport::default();
        transport.push(201, r#"{"id":"1"}"#);
        let mut client = UserClient::new("http://catalog", transport.clone());
        client
            .post_json("/products", &serde_json::json!({"name": "x"}), None)
            .await
            .unwrap();
        let sent = transport.requests();
        assert_eq!(sent[0].method, Method::POST);
        assert_eq!(sent[0].content_type.as_deref(), Some("application/json"));
        assert_eq!(sent[0].body, br#"{"name":"x"}"#);
    }

    #[tokio::test]
    async fn network_error_is_recorded_and_returned() {
        let transport = ScriptedTransport::default();
        transport.push_error("connection refused");
        let mut client = UserClient::new("http://catalog", transport);
        let err = client.get("/products/1", Some("/products/[id]")).await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        let entry = client.statistics().get(&Method::GET, "/products/[id]").unwrap();
        assert_eq!(entry.requests(), 1);
        assert_eq!(entry.failures(), 1);
        assert_eq!(
            entry.failure_reasons().next(),
            Some(("connection refused", 1))
        );
    }

    #[tokio::test]
    async fn caught_response_uses_callers_verdict() {
        let transport = ScriptedTransport::default();
        transport.push(200, "{}");
        transport.push(500, "{}");
        let mut client = UserClient::new("http://catalog", transport);

        let caught = client.post_json_catch("/products", &1, None).await.unwrap();
        assert_eq!(caught.response().status, StatusCode::OK);
        caught.failure("wanted 201");

        let caught = client.post_json_catch("/products", &1, None).await.unwrap();
        caught.success();

        let entry = client.statistics().get(&Method::POST, "/products").unwrap();
        assert_eq!(entry.requests(), 2);
        assert_eq!(entry.failures(), 1);
    }

    #[tokio::test]
    async fn dropped_caught_response_falls_back_to_status() {
        let transport = ScriptedTransport::default();
        transport.push(503, "");
        let mut client = UserClient::new("http://catalog", transport);
        drop(client.post_json_catch("/products", &1, None).await.unwrap());
        let entry = client.statistics().get(&Method::POST, "/products").unwrap();
        assert_eq!(entry.failures(), 1);
    }
}
