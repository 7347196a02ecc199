//! HttpDeliveryClient - reqwest による DeliveryClient 実装
//!
//! Task を JSON で POST し、応答ステータスを `Outcome` に分類します。
//!
//! | class      | status                                                        |
//! |------------|---------------------------------------------------------------|
//! | success    | 2xx                                                           |
//! | retryable  | 408, 425, 429, 500, 502, 503, 504, transport error, timeout   |
//! | terminal   | 400, 401, 403, 404, 405, 410, 411, 413, 414, 415, 422, 501     |
//! | (other)    | retryable; the attempt budget bounds it                       |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{StatusCode, Url};
use secrecy::{ExposeSecret, SecretString};

use crate::domain::{DeliveryError, Outcome, Task};
use crate::ports::DeliveryClient;

/// Bytes of the response body kept in a failure reason.
const BODY_SNIPPET_LIMIT: usize = 512;

/// How a worker response status is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Retryable,
    Terminal,
}

pub fn classify_status(status: StatusCode) -> StatusClass {
    if status.is_success() {
        return StatusClass::Success;
    }
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::NOT_FOUND
        | StatusCode::METHOD_NOT_ALLOWED
        | StatusCode::GONE
        | StatusCode::LENGTH_REQUIRED
        | StatusCode::PAYLOAD_TOO_LARGE
        | StatusCode::URI_TOO_LONG
        | StatusCode::UNSUPPORTED_MEDIA_TYPE
        | StatusCode::UNPROCESSABLE_ENTITY
        | StatusCode::NOT_IMPLEMENTED => StatusClass::Terminal,
        // 408/425/429/5xx and anything unrecognized
        _ => StatusClass::Retryable,
    }
}

/// Delivers tasks to the remote worker over HTTP.
pub struct HttpDeliveryClient {
    http: reqwest::Client,
    endpoint: Url,
    token: Option<SecretString>,
}

impl HttpDeliveryClient {
    /// `timeout` bounds each attempt end to end (connect, send, response body).
    pub fn new(
        endpoint: &str,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, DeliveryError> {
        let endpoint = Url::parse(endpoint).map_err(|e| DeliveryError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(DeliveryError::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                reason: "scheme must be http or https".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeliveryError::InvalidRequest(e.to_string()))?;

        Ok(Self {
            http,
            endpoint,
            token,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl DeliveryClient for HttpDeliveryClient {
    async fn attempt(&self, task: &Task) -> Result<Outcome, DeliveryError> {
        let body = serde_json::to_vec(task)?;

        let mut request = self
            .http
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return classify_transport_error(err),
        };

        let status = response.status();
        let class = classify_status(status);
        if class == StatusClass::Success {
            return Ok(Outcome::Success);
        }

        let snippet = body_snippet(response).await;
        let reason = if snippet.is_empty() {
            format!("status {status}")
        } else {
            format!("status {status}: {snippet}")
        };

        Ok(match class {
            StatusClass::Terminal => Outcome::terminal(reason),
            _ => Outcome::retryable(reason),
        })
    }
}

fn classify_transport_error(err: reqwest::Error) -> Result<Outcome, DeliveryError> {
    if err.is_builder() {
        return Err(DeliveryError::InvalidRequest(err.to_string()));
    }
    if err.is_timeout() {
        return Ok(Outcome::retryable(format!("timeout: {err}")));
    }
    Ok(Outcome::retryable(format!("transport error: {err}")))
}

// Only the head of the body is read; a misbehaving worker can't make us buffer it all.
async fn body_snippet(mut response: reqwest::Response) -> String {
    let mut buf = Vec::new();
    while buf.len() < BODY_SNIPPET_LIMIT {
        match response.chunk().await {
            Ok(Some(chunk)) => buf.extend_from_slice(&chunk),
            _ => break,
        }
    }
    buf.truncate(BODY_SNIPPET_LIMIT);
    String::from_utf8_lossy(&buf).trim().to_string()
}
