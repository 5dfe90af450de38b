//! Request descriptors.
//!
//! A [`RequestDescriptor`] is the normalized form of one HTTP request. Consumers
//! hand the engine either a URL shorthand or a full descriptor
//! ([`DescriptorInput`]); refetches may override parts of the current descriptor
//! ([`RefetchArgument`]).

use crate::abort::AbortSignal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    /// `GET`
    #[default]
    Get,
    /// `POST`
    Post,
    /// `PUT`
    Put,
    /// `PATCH`
    Patch,
    /// `DELETE`
    Delete,
    /// `HEAD`
    Head,
    /// `OPTIONS`
    Options,
}

impl Method {
    /// Upper-case wire name of the method
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The normalized request
///
/// Constructed fresh for every render from a [`DescriptorInput`]. The only
/// mutation after construction is attaching an abort signal right before
/// dispatch. The signal never takes part in serialization or fingerprinting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    /// Target URL, absolute or relative to the transport's base URL
    pub url: String,

    /// HTTP method
    #[serde(default)]
    pub method: Method,

    /// Request headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Query string parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,

    /// JSON request body
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    /// Cancellation signal attached by the coordinator before dispatch
    #[serde(skip)]
    pub signal: Option<AbortSignal>,
}

impl RequestDescriptor {
    /// Create a descriptor for `method` on `url`
    #[must_use]
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method,
            ..Self::default()
        }
    }

    /// Create a `GET` descriptor for `url`
    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Set the HTTP method
    #[must_use]
    pub const fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Add a request header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Set the JSON body
    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.data = Some(body);
        self
    }

    /// Attach a cancellation signal
    #[must_use]
    pub fn with_signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Whether the attached signal (if any) has fired
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.signal.as_ref().is_some_and(AbortSignal::is_aborted)
    }
}

/// What a consumer passes to `render`: a URL shorthand or a full descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum DescriptorInput {
    /// URL shorthand, normalized to `GET url`
    Url(String),
    /// A complete descriptor
    Descriptor(RequestDescriptor),
}

impl DescriptorInput {
    /// Normalize into a fresh descriptor
    ///
    /// Shorthands become `{ url }`; descriptors are copied so later mutation
    /// (attaching a signal) never aliases the caller's value.
    #[must_use]
    pub fn into_descriptor(self) -> RequestDescriptor {
        match self {
            Self::Url(url) => RequestDescriptor::get(url),
            Self::Descriptor(descriptor) => descriptor,
        }
    }
}

impl From<&str> for DescriptorInput {
    fn from(url: &str) -> Self {
        Self::Url(url.to_owned())
    }
}

impl From<String> for DescriptorInput {
    fn from(url: String) -> Self {
        Self::Url(url)
    }
}

impl From<RequestDescriptor> for DescriptorInput {
    fn from(descriptor: RequestDescriptor) -> Self {
        Self::Descriptor(descriptor)
    }
}

impl From<&RequestDescriptor> for DescriptorInput {
    fn from(descriptor: &RequestDescriptor) -> Self {
        Self::Descriptor(descriptor.clone())
    }
}

/// Partial descriptor used by refetch
///
/// Every field that is `Some` replaces the corresponding field of the base
/// descriptor wholesale (a shallow merge: headers are not merged key by key).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DescriptorOverride {
    /// Replacement URL
    pub url: Option<String>,
    /// Replacement method
    pub method: Option<Method>,
    /// Replacement header map
    pub headers: Option<BTreeMap<String, String>>,
    /// Replacement query parameters
    pub params: Option<BTreeMap<String, String>>,
    /// Replacement body
    pub data: Option<Value>,
}

impl DescriptorOverride {
    /// Override only the URL
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Also override the method
    #[must_use]
    pub const fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// Also override the query parameters
    #[must_use]
    pub fn with_params(mut self, params: BTreeMap<String, String>) -> Self {
        self.params = Some(params);
        self
    }

    /// Also override the body
    #[must_use]
    pub fn with_json(mut self, body: Value) -> Self {
        self.data = Some(body);
        self
    }

    /// Merge this override over `base`
    #[must_use]
    pub fn apply(self, mut base: RequestDescriptor) -> RequestDescriptor {
        if let Some(url) = self.url {
            base.url = url;
        }
        if let Some(method) = self.method {
            base.method = method;
        }
        if let Some(headers) = self.headers {
            base.headers = headers;
        }
        if let Some(params) = self.params {
            base.params = params;
        }
        if let Some(data) = self.data {
            base.data = Some(data);
        }
        base
    }
}

impl From<&str> for DescriptorOverride {
    fn from(url: &str) -> Self {
        Self::url(url)
    }
}

impl From<String> for DescriptorOverride {
    fn from(url: String) -> Self {
        Self::url(url)
    }
}

impl From<RequestDescriptor> for DescriptorOverride {
    fn from(descriptor: RequestDescriptor) -> Self {
        Self {
            url: Some(descriptor.url),
            method: Some(descriptor.method),
            headers: Some(descriptor.headers),
            params: Some(descriptor.params),
            data: descriptor.data,
        }
    }
}

/// Argument accepted by refetch
///
/// Refetch is commonly wired straight into UI event handlers. Instead of
/// sniffing the argument's shape, callers say explicitly whether they pass an
/// override or just forward an event.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum RefetchArgument {
    /// Refetch the current descriptor unchanged
    #[default]
    None,
    /// Merge an override over the current descriptor
    Override(DescriptorOverride),
    /// Invoked as an event handler; the event carries no request data
    UiEvent,
}

impl RefetchArgument {
    /// Resolve the descriptor to request from the consumer's base descriptor
    #[must_use]
    pub fn resolve(self, base: &RequestDescriptor) -> RequestDescriptor {
        let mut descriptor = match self {
            Self::None | Self::UiEvent => base.clone(),
            Self::Override(overrides) => overrides.apply(base.clone()),
        };
        descriptor.signal = None;
        descriptor
    }
}

impl From<DescriptorOverride> for RefetchArgument {
    fn from(overrides: DescriptorOverride) -> Self {
        Self::Override(overrides)
    }
}

impl From<&str> for RefetchArgument {
    fn from(url: &str) -> Self {
        Self::Override(DescriptorOverride::url(url))
    }
}

impl From<RequestDescriptor> for RefetchArgument {
    fn from(descriptor: RequestDescriptor) -> Self {
        Self::Override(descriptor.into())
    }
}

impl From<()> for RefetchArgument {
    fn from((): ()) -> Self {
        Self::None
    }
}
