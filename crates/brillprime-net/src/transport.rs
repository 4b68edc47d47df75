//! The outbound HTTP seam.
//!
//! [`crate::ApiClient`] never talks to reqwest directly. It hands a fully
//! formed [`PreparedRequest`] to an [`HttpTransport`], so tests can swap in
//! a scripted fake and exercise every failure path without a network.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use serde_json::Value;

use brillprime_shared::HttpMethod;

/// Body of an outbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// No body at all.
    Empty,
    /// JSON body, sent with `Content-Type: application/json`.
    Json(Value),
    /// Multipart form upload. No explicit content-type is set so the
    /// transport can pick its own boundary.
    Multipart(MultipartPayload),
}

/// A file part plus accompanying text fields.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartPayload {
    /// Form field name carrying the file part
    pub field: String,
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
    pub text_fields: Vec<(String, String)>,
}

/// One request as handed to the transport.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    /// Absolute URL, base already joined
    pub url: String,
    /// Bearer token of the stored session, when one exists
    pub bearer_token: Option<String>,
    pub body: RequestBody,
}

/// Raw response before envelope normalization.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Transport-level failures, before they are folded into the envelope.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The transport's own deadline fired.
    #[error("request timed out")]
    Timeout,

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    Connect(String),

    /// Any other transport failure (TLS, protocol, body read).
    #[error("transport failure: {0}")]
    Other(String),
}

/// Executes one prepared request against a backend.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: PreparedRequest) -> Result<RawResponse, TransportError>;
}

/// Production transport backed by [`reqwest`].
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport enforcing `timeout` on every request.
    ///
    /// The deadline is also enforced one level up by the client, which is
    /// what callers observe; this one bounds connection setup and body
    /// reads inside reqwest itself.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: PreparedRequest) -> Result<RawResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.http.request(method, &request.url);

        if let Some(token) = &request.bearer_token {
            builder = builder.header(reqwest::header::AUTHORIZATION, format!("Bearer {token}"));
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Multipart(payload) => {
                let mut form = reqwest::multipart::Form::new();
                for (name, value) in payload.text_fields {
                    form = form.text(name, value);
                }
                let part = reqwest::multipart::Part::bytes(payload.data)
                    .file_name(payload.file_name)
                    .mime_str(&payload.mime_type)
                    .map_err(|e| TransportError::Other(e.to_string()))?;
                form = form.part(payload.field, part);
                builder.multipart(form)
            }
        };

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(map_reqwest_error)?;

        Ok(RawResponse { status, body })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}
