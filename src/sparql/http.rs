//! SPARQL protocol request dispatch
//!
//! Takes the raw text of an HTTP/1.1 request, classifies it as a query or an
//! update following the SPARQL 1.1 Protocol bindings and frames the reply.
//! There is no socket handling here; the embedding application owns the
//! transport.
//!
//! Accepted requests:
//! - `GET /sparql?query=...`
//! - `POST` with `Content-Type: application/sparql-query`
//! - `POST` with `Content-Type: application/sparql-update`
//! - `POST` with `Content-Type: application/x-www-form-urlencoded` and a
//!   `query=` or `update=` field

use super::results::ResultFormat;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use std::fmt;
use thiserror::Error;
use tracing::debug;

const MAX_HEADERS: usize = 32;

/// HTTP errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    /// Request line or headers could not be parsed
    #[error("Malformed request: {0}")]
    Malformed(String),

    /// Method other than GET or POST
    #[error("Method not allowed: {0}")]
    MethodNotAllowed(String),

    /// POST body with an unknown or missing content type
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Neither `query` nor `update` was supplied
    #[error("Missing parameter: {0}")]
    MissingParameter(String),

    /// The query or update itself was rejected
    #[error("{0}")]
    Rejected(String),
}

impl HttpError {
    /// Status code and reason phrase for this error
    pub fn status(&self) -> (u16, &'static str) {
        match self {
            HttpError::MethodNotAllowed(_) => (405, "Method Not Allowed"),
            HttpError::UnsupportedMediaType(_) => (415, "Unsupported Media Type"),
            _ => (400, "Bad Request"),
        }
    }
}

/// A classified protocol request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpRequest {
    Query(String),
    Update(String),
}

impl HttpRequest {
    /// Parse the raw request text
    pub fn parse(raw: &str) -> Result<Self, HttpError> {
        let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
        let mut request = httparse::Request::new(&mut headers);
        let body_start = match request.parse(raw.as_bytes()) {
            Ok(httparse::Status::Complete(offset)) => offset,
            Ok(httparse::Status::Partial) => {
                return Err(HttpError::Malformed("incomplete request head".to_string()))
            }
            Err(e) => return Err(HttpError::Malformed(e.to_string())),
        };

        let method = request.method.unwrap_or_default();
        let path = request.path.unwrap_or("/");
        let header = |name: &str| -> Option<String> {
            request
                .headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| String::from_utf8_lossy(h.value).into_owned())
        };

        let mut body = &raw[body_start..];
        if let Some(length) = header("Content-Length").and_then(|v| v.trim().parse::<usize>().ok()) {
            if length < body.len() && body.is_char_boundary(length) {
                body = &body[..length];
            }
        }

        match method {
            "GET" => {
                let query = path.split_once('?').map(|(_, q)| q).unwrap_or("");
                form_field(query, "query")
                    .map(HttpRequest::Query)
                    .ok_or_else(|| HttpError::MissingParameter("query".to_string()))
            }
            "POST" => {
                let content_type = header("Content-Type").unwrap_or_default();
                let media_type = content_type
                    .split(';')
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_ascii_lowercase();
                match media_type.as_str() {
                    "application/sparql-query" => Ok(HttpRequest::Query(body.to_string())),
                    "application/sparql-update" => Ok(HttpRequest::Update(body.to_string())),
                    "application/x-www-form-urlencoded" => {
                        if let Some(query) = form_field(body, "query") {
                            Ok(HttpRequest::Query(query))
                        } else if let Some(update) = form_field(body, "update") {
                            Ok(HttpRequest::Update(update))
                        } else {
                            Err(HttpError::MissingParameter("query or update".to_string()))
                        }
                    }
                    _ => Err(HttpError::UnsupportedMediaType(content_type)),
                }
            }
            other => Err(HttpError::MethodNotAllowed(other.to_string())),
        }
    }

    /// Render a GET request for `query`, percent-encoding the parameter
    pub fn get(query: &str) -> String {
        format!(
            "GET /sparql?query={} HTTP/1.1\r\nHost: localhost\r\n\r\n",
            utf8_percent_encode(query, NON_ALPHANUMERIC)
        )
    }

    /// Render a POST request carrying `body` with the given media type
    pub fn post(content_type: &str, body: &str) -> String {
        format!(
            "POST /sparql HTTP/1.1\r\nHost: localhost\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
            content_type,
            body.len(),
            body
        )
    }
}

fn form_field(encoded: &str, name: &str) -> Option<String> {
    url::form_urlencoded::parse(encoded.as_bytes())
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.into_owned())
}

/// A framed response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: &'static str,
    pub content_type: String,
    pub body: String,
}

impl HttpResponse {
    /// 200 response with the given body
    pub fn ok(content_type: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            status: 200,
            reason: "OK",
            content_type: content_type.into(),
            body: body.into(),
        }
    }

    /// Error response with a plain-text message
    pub fn error(err: &HttpError) -> Self {
        let (status, reason) = err.status();
        Self {
            status,
            reason,
            content_type: "text/plain; charset=utf-8".to_string(),
            body: err.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl fmt::Display for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\n\r\n{}",
            self.status,
            self.reason,
            self.content_type,
            self.body.len(),
            self.body
        )
    }
}

/// Executes classified requests; errors carry a message for the client
pub trait RequestHandler {
    fn query(&mut self, query: &str) -> Result<String, String>;
    fn update(&mut self, update: &str) -> Result<String, String>;
}

/// Protocol endpoint: request classification plus response framing
#[derive(Debug, Clone, Default)]
pub struct SparqlHttpEndpoint {
    format: ResultFormat,
}

impl SparqlHttpEndpoint {
    /// Create a new endpoint answering queries in the default text format
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an endpoint whose query responses are labelled for `format`
    pub fn with_format(format: ResultFormat) -> Self {
        Self { format }
    }

    /// Media type of query responses
    pub fn content_type(&self) -> &'static str {
        match self.format {
            ResultFormat::Text => "text/plain; charset=utf-8",
            ResultFormat::Json => "application/sparql-results+json",
            ResultFormat::Xml => "application/sparql-results+xml",
            ResultFormat::Csv => "text/csv; charset=utf-8",
            ResultFormat::Tsv => "text/tab-separated-values; charset=utf-8",
        }
    }

    /// Classify, dispatch and frame one request
    pub fn handle(&self, raw: &str, handler: &mut dyn RequestHandler) -> HttpResponse {
        let request = match HttpRequest::parse(raw) {
            Ok(request) => request,
            Err(e) => {
                debug!("rejected request: {}", e);
                return HttpResponse::error(&e);
            }
        };
        match request {
            HttpRequest::Query(query) => {
                debug!("dispatching query ({} bytes)", query.len());
                match handler.query(&query) {
                    Ok(body) => HttpResponse::ok(self.content_type(), body),
                    Err(message) => HttpResponse::error(&HttpError::Rejected(message)),
                }
            }
            HttpRequest::Update(update) => {
                debug!("dispatching update ({} bytes)", update.len());
                match handler.update(&update) {
                    Ok(body) => HttpResponse::ok("text/plain; charset=utf-8", body),
                    Err(message) => HttpResponse::error(&HttpError::Rejected(message)),
                }
            }
        }
    }
}
