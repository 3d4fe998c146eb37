//! Response representation written by terminal pipeline steps.

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use serde_json::Value;

use super::{Headers, StatusCode};

/// A finished HTTP response: status, headers, and byte body.
///
/// Pipelines produce exactly one `Response` per request through the exchange's
/// write-once slot. The read accessors exist for the consuming server and for
/// tests; the pipeline core itself never reads a response back.
///
/// # Examples
///
/// ```
/// use trellis::http::{Response, StatusCode};
///
/// let response = Response::json(StatusCode::Ok, &serde_json::json!({ "ok": true })).unwrap();
/// assert_eq!(response.status(), StatusCode::Ok);
/// assert_eq!(response.headers().get("content-type"), Some("application/json; charset=utf-8"));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
}

impl Response {
    /// Creates a bare response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    /// Creates a response whose body is `value` serialized as JSON.
    ///
    /// Sets the `Content-Type` header accordingly.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`serde_json::Error`] when `value` cannot be
    /// serialized (e.g. a map with non-string keys).
    pub fn json<T: Serialize + ?Sized>(
        status: StatusCode,
        value: &T,
    ) -> Result<Self, serde_json::Error> {
        let body = serde_json::to_vec(value)?;
        let mut headers = Headers::new();
        headers.insert("Content-Type", "application/json; charset=utf-8");
        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// Appends a response header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Returns the status code of this response.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the response body bytes.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Parses the body back into a JSON value. `None` when the body is empty
    /// or not valid JSON. Intended for tests and diagnostics.
    pub fn body_json(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    /// Serializes the response into HTTP/1.1 wire format.
    ///
    /// `Content-Length` is always written as the last header before the blank
    /// line separating headers from the body.
    pub fn into_bytes(self) -> BytesMut {
        let content_length = self.body.len();

        let estimated_size = 128 + self.headers.len() * 64 + content_length;
        let mut buf = BytesMut::with_capacity(estimated_size);

        buf.put(
            format!(
                "HTTP/1.1 {} {}\r\n",
                self.status.as_u16(),
                self.status.canonical_reason()
            )
            .as_bytes(),
        );

        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }

        buf.put(format!("Content-Length: {content_length}\r\n").as_bytes());
        buf.put(&b"\r\n"[..]);

        if !self.body.is_empty() {
            buf.put(self.body.as_slice());
        }

        buf
    }
}
