//! Transport responses.

use crate::descriptor::RequestDescriptor;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A completed HTTP exchange
///
/// `config` is the transport-internal record of the request that produced the
/// response. It is stripped before the response enters the cache or consumer
/// state, so stored responses are plain serializable data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// Decoded body
    pub data: Value,

    /// HTTP status code
    pub status: u16,

    /// Reason phrase
    #[serde(default)]
    pub status_text: String,

    /// Response headers (lower-cased names)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// The request that produced this response
    #[serde(skip)]
    pub config: Option<Box<RequestDescriptor>>,
}

impl Response {
    /// Create a response with the given body and status
    #[must_use]
    pub fn new(data: Value, status: u16) -> Self {
        Self {
            data,
            status,
            status_text: String::new(),
            headers: BTreeMap::new(),
            config: None,
        }
    }

    /// Create a `200 OK` response
    #[must_use]
    pub fn ok(data: Value) -> Self {
        Self::new(data, 200).with_status_text("OK")
    }

    /// Set the reason phrase
    #[must_use]
    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = text.into();
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Record the request that produced this response
    #[must_use]
    pub fn with_config(mut self, descriptor: RequestDescriptor) -> Self {
        self.config = Some(Box::new(descriptor));
        self
    }

    /// Drop transport-internal fields
    #[must_use]
    pub fn into_cacheable(mut self) -> Self {
        self.config = None;
        self
    }

    /// Whether the status is in the 2xx range
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// Deserialize the body into a typed value
    ///
    /// # Errors
    ///
    /// Returns an error if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.data)
    }
}
