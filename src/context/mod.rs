//! Per-request context handed to middleware and route handlers.

use std::collections::HashMap;

use serde::de::DeserializeOwned;

use crate::Request;

/// Named captures from a `:param` route segment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams {
    map: HashMap<String, String>,
}

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.map.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(String::as_str)
    }
}

/// A request together with whatever routing learned about it.
pub struct Context {
    request: Request,
    params: PathParams,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self::with_params(request, PathParams::new())
    }

    pub fn with_params(request: Request, params: PathParams) -> Self {
        Self { request, params }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: PathParams) {
        self.params = params;
    }

    /// Decodes the body as JSON. An empty body is decoded as `{}`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let body = self.request.body();
        if body.iter().all(u8::is_ascii_whitespace) {
            return serde_json::from_slice(b"{}");
        }
        serde_json::from_slice(body)
    }
}
