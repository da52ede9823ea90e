//! Minimal HTTP/1.1 envelope for CA requests and responses.
//!
//! Only what the CA exchanges need: a request serializer, a response parser
//! for `Content-Length` framed bodies, and a framing check the driver uses to
//! stop reading once a response is complete.

use crate::error::{EstError, EstResult};
use crate::session::Endpoint;
use serde::Deserialize;

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// An outgoing HTTP/1.1 request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    method: &'static str,
    path: String,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl HttpRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: "GET",
            path: path.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>, content_type: &str, body: Vec<u8>) -> Self {
        Self {
            method: "POST",
            path: path.into(),
            headers: vec![("Content-Type".to_string(), content_type.to_string())],
            body,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Serialize with `Host`, `Content-Length` and `Connection: close`.
    pub fn to_bytes(&self, endpoint: &Endpoint) -> Vec<u8> {
        let mut head = format!(
            "{} {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nAccept: */*\r\n",
            self.method,
            self.path,
            endpoint,
            crate::USER_AGENT
        );
        for (name, value) in &self.headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        head.push_str("Connection: close\r\n\r\n");

        let mut bytes = Vec::with_capacity(head.len() + self.body.len());
        bytes.extend_from_slice(head.as_bytes());
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// A parsed HTTP/1.1 response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: String,
    headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl HttpResponse {
    pub fn parse(raw: &[u8]) -> EstResult<Self> {
        let header_end = find_header_end(raw)
            .ok_or_else(|| EstError::response("incomplete HTTP response headers"))?;
        let head = std::str::from_utf8(&raw[..header_end - HEADER_TERMINATOR.len()])
            .map_err(|_| EstError::response("HTTP headers are not valid UTF-8"))?;

        let mut lines = head.split("\r\n");
        let status_line = lines.next().unwrap_or_default();
        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/1.") {
            return Err(EstError::response(format!("invalid status line: {}", status_line)));
        }
        let status = parts
            .next()
            .and_then(|code| code.parse::<u16>().ok())
            .ok_or_else(|| EstError::response(format!("invalid status line: {}", status_line)))?;
        let reason = parts.next().unwrap_or_default().to_string();

        let mut headers = Vec::new();
        for line in lines.filter(|l| !l.is_empty()) {
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| EstError::response(format!("malformed header: {}", line)))?;
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }

        let response = Self {
            status,
            reason,
            headers,
            body: Vec::new(),
        };
        if response
            .header("Transfer-Encoding")
            .is_some_and(|te| te.eq_ignore_ascii_case("chunked"))
        {
            return Err(EstError::response("chunked transfer encoding is not supported"));
        }

        let available = &raw[header_end..];
        let body = match response.content_length()? {
            Some(len) if available.len() < len => {
                return Err(EstError::response(format!(
                    "truncated body: {} of {} bytes",
                    available.len(),
                    len
                )))
            }
            Some(len) => available[..len].to_vec(),
            None => available.to_vec(),
        };

        Ok(Self { body, ..response })
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn body_text(&self) -> EstResult<&str> {
        std::str::from_utf8(&self.body).map_err(|_| EstError::response("response body is not valid UTF-8"))
    }

    /// Turn a non-success response into a `Response` error with the server's message.
    pub fn error_for_status(&self) -> EstResult<()> {
        if self.is_success() {
            return Ok(());
        }
        let detail = serde_json::from_slice::<ErrorBody>(&self.body)
            .ok()
            .and_then(|b| b.error.or(b.message))
            .or_else(|| {
                let text = String::from_utf8_lossy(&self.body).trim().to_string();
                (!text.is_empty()).then_some(text)
            })
            .unwrap_or_else(|| self.reason.clone());
        Err(EstError::response(format!("server returned {}: {}", self.status, detail)))
    }

    fn content_length(&self) -> EstResult<Option<usize>> {
        self.header("Content-Length")
            .map(|v| {
                v.parse::<usize>()
                    .map_err(|_| EstError::response(format!("invalid Content-Length: {}", v)))
            })
            .transpose()
    }
}

/// Total length of a `Content-Length` framed response, once its headers have arrived.
///
/// A length that cannot be represented yields `None`, leaving the read bounded
/// by the response ceiling alone.
pub fn framed_len(received: &[u8]) -> Option<usize> {
    let header_end = find_header_end(received)?;
    let head = std::str::from_utf8(&received[..header_end]).ok()?;
    head.split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("Content-Length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .and_then(|len| header_end.checked_add(len))
}

fn find_header_end(raw: &[u8]) -> Option<usize> {
    raw.windows(HEADER_TERMINATOR.len())
        .position(|w| w == HEADER_TERMINATOR)
        .map(|pos| pos + HEADER_TERMINATOR.len())
}
