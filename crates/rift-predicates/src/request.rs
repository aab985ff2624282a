//! Request shapes predicates are evaluated against.
//!
//! Stub servers hand the engine a [`Value`] tree. These helpers build that tree
//! for HTTP and TCP requests, using the Mountebank field names.

use crate::value::{Mapping, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An HTTP request as seen by predicates.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpRequest {
    #[serde(default)]
    pub request_from: String,
    pub method: String,
    pub path: String,
    /// Query parameters in arrival order, per key
    #[serde(default)]
    pub query: BTreeMap<String, Vec<String>>,
    /// Header name/value pairs in arrival order
    #[serde(default)]
    pub headers: Vec<(String, String)>,
    #[serde(default)]
    pub body: String,
}

impl HttpRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Add the parameters of a raw (undecoded) query string.
    pub fn with_query_string(mut self, query: &str) -> Self {
        for (key, value) in parse_query_string(query) {
            self.query.entry(key).or_default().push(value);
        }
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_request_from(mut self, request_from: impl Into<String>) -> Self {
        self.request_from = request_from.into();
        self
    }

    /// Request value tree. A repeated query key or header becomes a sequence
    /// of its values in arrival order.
    pub fn to_value(&self) -> Value {
        let query: Mapping = self
            .query
            .iter()
            .map(|(key, values)| (key.clone(), repeated(values.iter().cloned())))
            .collect();

        let mut grouped: BTreeMap<&str, Vec<String>> = BTreeMap::new();
        for (name, value) in &self.headers {
            grouped.entry(name.as_str()).or_default().push(value.clone());
        }
        let headers: Mapping = grouped
            .into_iter()
            .map(|(name, values)| (name.to_string(), repeated(values.into_iter())))
            .collect();

        let mut request = Mapping::new();
        request.insert("requestFrom".into(), Value::text(&self.request_from));
        request.insert("method".into(), Value::text(&self.method));
        request.insert("path".into(), Value::text(&self.path));
        request.insert("query".into(), Value::Mapping(query));
        request.insert("headers".into(), Value::Mapping(headers));
        request.insert("body".into(), Value::text(&self.body));
        Value::Mapping(request)
    }
}

/// A TCP request: the payload, base64-encoded when the imposter runs in binary
/// mode.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TcpRequest {
    #[serde(default)]
    pub request_from: String,
    pub data: String,
}

impl TcpRequest {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Default::default()
        }
    }

    pub fn to_value(&self) -> Value {
        let mut request = Mapping::new();
        request.insert("requestFrom".into(), Value::text(&self.request_from));
        request.insert("data".into(), Value::text(&self.data));
        Value::Mapping(request)
    }
}

impl From<&HttpRequest> for Value {
    fn from(request: &HttpRequest) -> Self {
        request.to_value()
    }
}

impl From<&TcpRequest> for Value {
    fn from(request: &TcpRequest) -> Self {
        request.to_value()
    }
}

fn repeated(mut values: impl ExactSizeIterator<Item = String>) -> Value {
    if values.len() == 1 {
        values.next().map(Value::Text).unwrap_or_default()
    } else {
        Value::Sequence(values.map(Value::Text).collect())
    }
}

/// Parse a query string into decoded key/value pairs, keeping repeats and
/// arrival order. `+` decodes to a space; a key without `=` has an empty value.
pub fn parse_query_string(query: &str) -> Vec<(String, String)> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(key), decode_component(value))
        })
        .collect()
}

fn decode_component(component: &str) -> String {
    let component = component.replace('+', " ");
    match urlencoding::decode(&component) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => component,
    }
}
