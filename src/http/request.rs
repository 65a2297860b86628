//! HTTP/1.1 request parsing with [`httparse`].

use bytes::Bytes;
use thiserror::Error;

use super::{Headers, Method};

/// Why a buffered request could not be parsed.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request is incomplete")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid Content-Length: {value}")]
    InvalidContentLength { value: String },
}

/// A parsed HTTP/1.1 request.
///
/// ```
/// use quizgen::http::Request;
///
/// let raw = b"POST /generate-quiz?debug=1 HTTP/1.1\r\nContent-Length: 2\r\n\r\n{}";
/// let (request, consumed) = Request::parse(raw).unwrap().unwrap();
///
/// assert_eq!(request.method().as_str(), "POST");
/// assert_eq!(request.path(), "/generate-quiz");
/// assert_eq!(request.body().as_ref(), b"{}");
/// assert_eq!(consumed, raw.len());
/// ```
#[derive(Debug)]
pub struct Request {
    method: Method,
    path: String,
    /// Minor version: 0 for HTTP/1.0, 1 for HTTP/1.1.
    version: u8,
    headers: Headers,
    body: Bytes,
}

impl Request {
    const MAX_HEADERS: usize = 64;

    /// Parses one request from the front of `buf`.
    ///
    /// Returns `Ok(None)` while the headers are complete but the body named
    /// by `Content-Length` has not fully arrived. On success also returns the
    /// number of bytes the request occupied, so pipelined data can follow.
    ///
    /// # Errors
    ///
    /// - [`RequestError::Incomplete`] if the header block is not yet terminated.
    /// - [`RequestError::Parse`] / [`RequestError::MissingField`] for malformed input.
    /// - [`RequestError::InvalidContentLength`] if the header is not a number
    ///   or cannot be addressed in memory.
    pub fn parse(buf: &[u8]) -> Result<Option<(Self, usize)>, RequestError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw = httparse::Request::new(&mut headers);

        let body_offset = match raw.parse(buf)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(RequestError::Incomplete),
        };

        let raw_method = raw.method.ok_or(RequestError::MissingField { field: "method" })?;
        let Ok(method) = raw_method.parse::<Method>();
        let target = raw.path.ok_or(RequestError::MissingField { field: "path" })?;
        let path = target.split_once('?').map_or(target, |(path, _)| path).to_owned();
        let version = raw.version.ok_or(RequestError::MissingField { field: "version" })?;

        let mut header_map = Headers::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let end = match header_map.get("content-length") {
            Some(value) => value
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|len| body_offset.checked_add(len))
                .ok_or_else(|| RequestError::InvalidContentLength { value: value.to_owned() })?,
            None => body_offset,
        };
        if buf.len() < end {
            return Ok(None);
        }

        Ok(Some((
            Self {
                method,
                path,
                version,
                headers: header_map,
                body: Bytes::copy_from_slice(&buf[body_offset..end]),
            },
            end,
        )))
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path without the query string.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// HTTP/1.1 keeps the connection open unless told otherwise; HTTP/1.0
    /// closes it unless `Connection: keep-alive` is sent.
    pub fn is_keep_alive(&self) -> bool {
        match self.headers.get("connection") {
            Some(conn) => conn.eq_ignore_ascii_case("keep-alive"),
            None => self.version == 1,
        }
    }
}
