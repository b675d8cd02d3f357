//! Request-line parsing and routing
//!
//! Only the first line of the received bytes is looked at:
//! `METHOD SP TARGET [SP VERSION]`, with the query string split into
//! `key=value` pairs on `&`.

use std::str::Utf8Error;

/// Request-line errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    /// Nothing was received
    #[error("empty request")]
    Empty,

    /// The request line has a method but no target
    #[error("request line has no target: {0:?}")]
    MissingTarget(String),

    /// The request line is not valid UTF-8
    #[error("request line is not UTF-8: {0}")]
    NotUtf8(#[from] Utf8Error),

    /// The target path has no handler
    #[error("no route for {0}")]
    UnknownRoute(String),
}

/// A parsed request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Method token, e.g. `GET`
    pub method: String,

    /// Target path without the query string
    pub path: String,

    /// Query parameters in the order they appear
    pub query: Vec<(String, String)>,
}

impl Request {
    /// Parse the request line at the start of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Request, RequestError> {
        let end = bytes
            .iter()
            .position(|b| *b == b'\n' || *b == 0)
            .unwrap_or(bytes.len());
        let line = std::str::from_utf8(&bytes[..end])?.trim_end_matches('\r');

        let mut parts = line.split_whitespace();
        let method = parts.next().ok_or(RequestError::Empty)?;
        let target = parts
            .next()
            .ok_or_else(|| RequestError::MissingTarget(line.to_string()))?;

        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, parse_query(query)),
            None => (target, Vec::new()),
        };

        Ok(Request {
            method: method.to_string(),
            path: path.to_string(),
            query,
        })
    }

    /// First value for `key`
    pub fn param(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Route for this request's path
    pub fn route(&self) -> Result<Route, RequestError> {
        Route::from_path(&self.path)
    }
}

/// Split `a=1&b=2` into pairs; a pair without `=` gets an empty value
fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect()
}

/// Operations the server knows how to handle
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Route {
    /// Append a store record built from the query parameters
    CreateStoreFile,
}

impl Route {
    /// Look up the route for a request path
    pub fn from_path(path: &str) -> Result<Route, RequestError> {
        match path {
            "/CreateStoreFile" => Ok(Route::CreateStoreFile),
            other => Err(RequestError::UnknownRoute(other.to_string())),
        }
    }
}
