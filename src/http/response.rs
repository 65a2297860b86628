//! HTTP/1.1 response builder and wire serialization.

use bytes::{BufMut, BytesMut};
use serde::Serialize;
use serde_json::json;

use super::{Headers, StatusCode};

const JSON_CONTENT_TYPE: &str = "application/json";

/// An HTTP/1.1 response.
///
/// ```
/// use quizgen::http::{Response, StatusCode};
///
/// let response = Response::error(StatusCode::MethodNotAllowed, "Method not allowed");
/// let text = String::from_utf8(response.into_bytes().to_vec()).unwrap();
/// assert!(text.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
/// assert!(text.ends_with(r#"{"error":"Method not allowed"}"#));
/// ```
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Vec<u8>,
    keep_alive: bool,
}

impl Response {
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
            keep_alive: true,
        }
    }

    /// A JSON response. Serialization failure turns into a bare 500.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Self {
        match serde_json::to_vec(value) {
            Ok(body) => Self::new(status)
                .header("Content-Type", JSON_CONTENT_TYPE)
                .body_bytes(body),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize response body");
                Self::new(StatusCode::InternalServerError)
            }
        }
    }

    /// `{"error": message}` with the given status.
    pub fn error(status: StatusCode, message: impl AsRef<str>) -> Self {
        Self::json(status, &json!({ "error": message.as_ref() }))
    }

    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Appends a header in place; used by middleware decorating a downstream response.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    #[must_use]
    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into().into_bytes();
        self
    }

    #[must_use]
    pub fn body_bytes(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    #[must_use]
    pub fn keep_alive(mut self, keep_alive: bool) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body_slice(&self) -> &[u8] {
        &self.body
    }

    /// Serializes status line, headers, and body.
    ///
    /// `Content-Type: text/plain` is added for a non-empty body without one;
    /// `Connection` and `Content-Length` are always written.
    pub fn into_bytes(mut self) -> BytesMut {
        if !self.body.is_empty() && !self.headers.contains("content-type") {
            self.headers.insert("Content-Type", "text/plain; charset=utf-8");
        }
        self.headers
            .set("Connection", if self.keep_alive { "keep-alive" } else { "close" });
        self.headers.set("Content-Length", self.body.len().to_string());

        let mut buf = BytesMut::with_capacity(128 + self.headers.len() * 48 + self.body.len());
        buf.put(format!("HTTP/1.1 {}\r\n", self.status).as_bytes());
        for (name, value) in self.headers.iter() {
            buf.put(format!("{name}: {value}\r\n").as_bytes());
        }
        buf.put(&b"\r\n"[..]);
        buf.put(self.body.as_slice());
        buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(response: Response) -> String {
        String::from_utf8(response.into_bytes().to_vec()).unwrap()
    }

    #[test]
    fn json_sets_content_type_and_length() {
        let text = wire(Response::json(StatusCode::Ok, &json!({ "status": "ok" })));
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.contains("Content-Length: 15\r\n"));
        assert!(text.ends_with("\r\n\r\n{\"status\":\"ok\"}"));
    }

    #[test]
    fn plain_body_defaults_to_text() {
        let text = wire(Response::new(StatusCode::BadRequest).body("nope"));
        assert!(text.contains("Content-Type: text/plain; charset=utf-8\r\n"));
    }

    #[test]
    fn empty_response_has_no_content_type() {
        let text = wire(Response::new(StatusCode::NoContent));
        assert!(!text.contains("Content-Type"));
        assert!(text.contains("Content-Length: 0\r\n"));
        assert!(text.contains("Connection: keep-alive\r\n"));
    }

    #[test]
    fn close_and_decorate() {
        let mut resp = Response::new(StatusCode::Ok).keep_alive(false);
        resp.add_header("Access-Control-Allow-Origin", "*");
        assert_eq!(resp.headers().get("access-control-allow-origin"), Some("*"));
        let text = wire(resp);
        assert!(text.contains("Connection: close\r\n"));
    }

    #[test]
    fn error_body_shape() {
        let resp = Response::error(StatusCode::BadRequest, "category is required");
        let body: serde_json::Value = serde_json::from_slice(resp.body_slice()).unwrap();
        assert_eq!(body, json!({ "error": "category is required" }));
    }
}
