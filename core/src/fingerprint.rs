//! Deterministic cache keys.
//!
//! A fingerprint is the canonical JSON rendering of a descriptor with the abort
//! signal left out. Object keys are sorted at every level, including inside the
//! request body, so descriptors that are equal field by field always map to the
//! same key no matter how they were built.

use crate::descriptor::RequestDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

/// Cache key derived from a [`RequestDescriptor`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Wrap an already-computed key (e.g. one read back from a cache dump)
    #[must_use]
    pub const fn from_raw(key: String) -> Self {
        Self(key)
    }

    /// The key as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Unwrap into the key string
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the fingerprint of `descriptor`
///
/// # Example
///
/// ```
/// use reqhook_core::abort::AbortController;
/// use reqhook_core::descriptor::RequestDescriptor;
/// use reqhook_core::fingerprint::fingerprint;
///
/// let plain = RequestDescriptor::get("/todos/1");
/// let signed = plain.clone().with_signal(AbortController::new().signal());
///
/// assert_eq!(fingerprint(&plain), fingerprint(&signed));
/// assert_eq!(fingerprint(&plain).as_str(), r#"{"method":"GET","url":"/todos/1"}"#);
/// ```
#[must_use]
pub fn fingerprint(descriptor: &RequestDescriptor) -> Fingerprint {
    let mut out = String::with_capacity(32 + descriptor.url.len());
    let mut first = true;

    // Field names are emitted in sorted order: data, headers, method, params, url.
    out.push('{');
    if let Some(data) = &descriptor.data {
        write_key("data", &mut out, &mut first);
        write_canonical(data, &mut out);
    }
    if !descriptor.headers.is_empty() {
        write_key("headers", &mut out, &mut first);
        write_string_map(&descriptor.headers, &mut out);
    }
    write_key("method", &mut out, &mut first);
    write_json_string(descriptor.method.as_str(), &mut out);
    if !descriptor.params.is_empty() {
        write_key("params", &mut out, &mut first);
        write_string_map(&descriptor.params, &mut out);
    }
    write_key("url", &mut out, &mut first);
    write_json_string(&descriptor.url, &mut out);
    out.push('}');

    Fingerprint(out)
}

fn write_key(key: &str, out: &mut String, first: &mut bool) {
    if !*first {
        out.push(',');
    }
    *first = false;
    write_json_string(key, out);
    out.push(':');
}

fn write_json_string(value: &str, out: &mut String) {
    // Writing into a String cannot fail.
    let _ = write!(out, "{}", Value::from(value));
}

fn write_string_map(map: &BTreeMap<String, String>, out: &mut String) {
    out.push('{');
    for (index, (key, value)) in map.iter().enumerate() {
        if index > 0 {
            out.push(',');
        }
        write_json_string(key, out);
        out.push(':');
        write_json_string(value, out);
    }
    out.push('}');
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));

            out.push('{');
            for (index, (key, value)) in entries.into_iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_json_string(key, out);
                out.push(':');
                write_canonical(value, out);
            }
            out.push('}');
        },
        Value::Array(items) => {
            out.push('[');
            for (index, item) in items.iter().enumerate() {
                if index > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        },
        scalar => {
            let _ = write!(out, "{scalar}");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abort::AbortController;
    use crate::descriptor::Method;
    use proptest::prelude::*;
    use serde_json::{json, Map};

    #[test]
    fn test_signal_is_excluded() {
        let controller = AbortController::new();
        let plain = RequestDescriptor::get("/todos/1");
        let signed = plain.clone().with_signal(controller.signal());

        controller.abort();
        assert_eq!(fingerprint(&plain), fingerprint(&signed));
    }

    #[test]
    fn test_body_key_order_is_canonical() {
        let mut forward = Map::new();
        forward.insert("a".into(), json!(1));
        forward.insert("b".into(), json!({"y": 2, "x": [1, {"q": true, "p": null}]}));

        let mut backward = Map::new();
        backward.insert("b".into(), json!({"x": [1, {"p": null, "q": true}], "y": 2}));
        backward.insert("a".into(), json!(1));

        let first = RequestDescriptor::new(Method::Post, "/items").with_json(Value::Object(forward));
        let second = RequestDescriptor::new(Method::Post, "/items").with_json(Value::Object(backward));

        assert_eq!(fingerprint(&first), fingerprint(&second));
        assert_eq!(
            fingerprint(&first).as_str(),
            r#"{"data":{"a":1,"b":{"x":[1,{"p":null,"q":true}],"y":2}},"method":"POST","url":"/items"}"#
        );
    }

    #[test]
    fn test_fields_change_the_key() {
        let base = RequestDescriptor::get("/items");
        let variants = [
            RequestDescriptor::get("/items/2"),
            base.clone().with_method(Method::Delete),
            base.clone().with_header("x-token", "a"),
            base.clone().with_param("page", "2"),
            base.clone().with_json(json!({})),
        ];

        for variant in &variants {
            assert_ne!(fingerprint(&base), fingerprint(variant));
        }
    }

    #[test]
    fn test_url_escaping() {
        let descriptor = RequestDescriptor::get("/search?q=\"quoted\"");
        assert_eq!(
            fingerprint(&descriptor).as_str(),
            r#"{"method":"GET","url":"/search?q=\"quoted\""}"#
        );
    }

    proptest! {
        #[test]
        fn prop_fingerprint_ignores_signal(
            url in "/[a-z0-9/]{0,24}",
            headers in proptest::collection::btree_map("[a-z-]{1,8}", "[ -~]{0,12}", 0..4),
            params in proptest::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,6}", 0..4),
        ) {
            let mut descriptor = RequestDescriptor::get(url);
            descriptor.headers = headers;
            descriptor.params = params;

            let controller = AbortController::new();
            let signed = descriptor.clone().with_signal(controller.signal());

            prop_assert_eq!(fingerprint(&descriptor), fingerprint(&signed));
        }

        #[test]
        fn prop_distinct_urls_distinct_keys(a in "/[a-z]{1,12}", b in "/[a-z]{1,12}") {
            prop_assume!(a != b);
            prop_assert_ne!(
                fingerprint(&RequestDescriptor::get(a)),
                fingerprint(&RequestDescriptor::get(b))
            );
        }
    }
}
