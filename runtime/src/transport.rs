//! Default HTTP transport backed by `reqwest`.

use reqhook_core::environment::{Transport, TransportFuture};
use reqhook_core::{RequestDescriptor, RequestError, Response};
use reqwest::{Client, Url};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// `reqwest` transport
///
/// Relative descriptor URLs are joined onto the optional base URL. Requests
/// race against the descriptor's abort signal; a fired signal resolves the
/// request as [`RequestError::Cancelled`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Option<String>,
    timeout: Option<Duration>,
}

impl ReqwestTransport {
    /// Create a transport with a default client
    #[must_use]
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    /// Create a transport around an existing client
    #[must_use]
    pub const fn with_client(client: Client) -> Self {
        Self {
            client,
            base_url: None,
            timeout: None,
        }
    }

    /// Resolve relative URLs against `base_url`
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Fail requests that take longer than `timeout`
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// The configured base URL
    #[must_use]
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    fn resolve_url(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) if !url.starts_with("http://") && !url.starts_with("https://") => {
                format!(
                    "{}/{}",
                    base.trim_end_matches('/'),
                    url.trim_start_matches('/')
                )
            }
            _ => url.to_string(),
        }
    }

    async fn send(&self, descriptor: &RequestDescriptor) -> Result<Response, RequestError> {
        let method = reqwest::Method::from_bytes(descriptor.method.as_str().as_bytes())
            .map_err(|e| RequestError::wrapped(e, descriptor))?;
        let url = Url::parse(&self.resolve_url(&descriptor.url))
            .map_err(|e| RequestError::wrapped(format!("Invalid URL: {e}"), descriptor))?;

        let mut builder = self.client.request(method, url);
        for (name, value) in &descriptor.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !descriptor.params.is_empty() {
            builder = builder.query(&descriptor.params);
        }
        if let Some(body) = &descriptor.data {
            builder = builder.json(body);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| classify(&e, descriptor))?;

        let status = response.status();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();

        let bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                RequestError::timeout(e.to_string())
            } else {
                RequestError::decode(e.to_string(), Some(status.as_u16()))
            }
        })?;

        let mut config = descriptor.clone();
        config.signal = None;

        let mut decoded = Response::new(decode_body(&bytes), status.as_u16())
            .with_status_text(status.canonical_reason().unwrap_or_default())
            .with_config(config);
        decoded.headers = headers;

        if decoded.is_success() {
            Ok(decoded)
        } else {
            Err(RequestError::status(decoded))
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, request: RequestDescriptor) -> TransportFuture<'_> {
        Box::pin(async move {
            match request.signal.clone() {
                Some(signal) => {
                    tokio::select! {
                        biased;
                        () = signal.aborted() => Err(RequestError::Cancelled),
                        result = self.send(&request) => result,
                    }
                }
                None => self.send(&request).await,
            }
        })
    }
}

fn classify(error: &reqwest::Error, descriptor: &RequestDescriptor) -> RequestError {
    if error.is_timeout() {
        RequestError::timeout(error.to_string())
    } else if error.is_builder() {
        RequestError::wrapped(error, descriptor)
    } else {
        RequestError::network(error.to_string())
    }
}

/// JSON when the body parses, otherwise the body as a string
fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_relative_url() {
        let transport = ReqwestTransport::new().with_base_url("http://api.local/v1/");
        assert_eq!(transport.resolve_url("/todos/1"), "http://api.local/v1/todos/1");
        assert_eq!(transport.resolve_url("todos"), "http://api.local/v1/todos");
        assert_eq!(
            transport.resolve_url("https://other.local/x"),
            "https://other.local/x"
        );
    }

    #[test]
    fn test_without_base_url() {
        let transport = ReqwestTransport::default();
        assert!(transport.base_url().is_none());
        assert_eq!(transport.resolve_url("/todos"), "/todos");
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(br#"{"id":1}"#), json!({"id": 1}));
        assert_eq!(decode_body(b"plain text"), json!("plain text"));
    }

    #[tokio::test]
    async fn test_relative_url_without_base_is_wrapped() {
        let transport = ReqwestTransport::new();
        let error = transport
            .execute(RequestDescriptor::get("/todos/1"))
            .await
            .err();

        assert_eq!(error.map(|e| e.code()), Some("ERR_WRAPPED"));
    }

    #[tokio::test]
    async fn test_aborted_signal_short_circuits() {
        let controller = reqhook_core::abort::AbortController::new();
        controller.abort();
        let transport = ReqwestTransport::new().with_base_url("http://127.0.0.1:9");

        let error = transport
            .execute(RequestDescriptor::get("/never").with_signal(controller.signal()))
            .await
            .err();

        assert_eq!(error, Some(RequestError::Cancelled));
    }
}
