//! Read-only request representation handed to pipeline steps.

use std::collections::HashMap;

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

use super::{Headers, Method};

/// Errors raised while constructing a [`Request`] from transport data.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

/// A request as seen by a handler pipeline.
///
/// The body is an opaque JSON value of unknown shape ([`Value::Null`] when the
/// request carries no body); path parameters are a string-to-string map that is
/// empty, never absent, when the matched route has no captures. Both are filled
/// in by the surrounding server before the pipeline runs.
///
/// # Examples
///
/// ```
/// use trellis::http::{Method, Request};
///
/// let request = Request::builder(Method::Post, "/users/42")
///     .param("id", "42")
///     .body(serde_json::json!({ "name": "ada" }))
///     .build();
///
/// assert_eq!(request.path(), "/users/42");
/// assert_eq!(request.params().get("id").map(String::as_str), Some("42"));
/// assert_eq!(request.body()["name"], "ada");
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    headers: Headers,
    params: HashMap<String, String>,
    body: Value,
}

impl Request {
    /// Starts building a request with the given method and path.
    pub fn builder(method: Method, path: impl Into<String>) -> RequestBuilder {
        RequestBuilder {
            method,
            path: path.into(),
            headers: Headers::new(),
            params: HashMap::new(),
            body: Value::Null,
        }
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the request path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the parsed path parameters. Empty when the route has no captures.
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Returns the opaque JSON body. [`Value::Null`] when the request has no body.
    pub fn body(&self) -> &Value {
        &self.body
    }
}

/// Builder for [`Request`], used by servers and tests.
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    path: String,
    headers: Headers,
    params: HashMap<String, String>,
    body: Value,
}

impl RequestBuilder {
    /// Appends a request header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Adds a path parameter capture.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Sets the body from an already-parsed JSON value.
    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Parses raw transport bytes as the JSON body.
    ///
    /// An empty buffer yields [`Value::Null`], matching a request with no body.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidJson`] when the buffer is non-empty and
    /// not valid JSON.
    pub fn raw_body(mut self, bytes: impl Into<Bytes>) -> Result<Self, RequestError> {
        let bytes = bytes.into();
        self.body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(self)
    }

    /// Finalizes the request.
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            path: self.path,
            headers: self.headers,
            params: self.params,
            body: self.body,
        }
    }
}
