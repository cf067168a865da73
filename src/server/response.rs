use std::io;

use http::header::{HeaderMap, HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS};
use http::StatusCode;

/// Sink a handler writes its response into.
///
/// Mirrors the usual header/status/body protocol: headers may be edited until
/// the status is written, the first body write implies `200 OK`, and later
/// status writes are ignored.
pub trait ResponseWriter {
    fn headers(&self) -> &HeaderMap;
    fn headers_mut(&mut self) -> &mut HeaderMap;
    fn write_header(&mut self, status: StatusCode);
    fn write_body(&mut self, bytes: &[u8]) -> io::Result<()>;
}

impl io::Write for dyn ResponseWriter + '_ {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.write_body(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Write `message` as a `text/plain` error response with `status`.
///
/// Clears any `Content-Length` set by an earlier writer and appends a newline
/// to the message.
pub fn http_error(w: &mut dyn ResponseWriter, message: &str, status: StatusCode) {
    let headers = w.headers_mut();
    headers.remove(CONTENT_LENGTH);
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    w.write_header(status);
    let mut body = Vec::with_capacity(message.len() + 1);
    body.extend_from_slice(message.as_bytes());
    body.push(b'\n');
    if let Err(err) = w.write_body(&body) {
        tracing::warn!(error = %err, "failed to write error response");
    }
}

/// In-memory [`ResponseWriter`].
#[derive(Debug, Default)]
pub struct ResponseRecorder {
    status: Option<StatusCode>,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl ResponseRecorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The written status, `200 OK` if none was written.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(StatusCode::OK)
    }

    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    #[must_use]
    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Convert into an `http::Response` for handing to a transport.
    pub fn into_response(self) -> http::Response<Vec<u8>> {
        let mut response = http::Response::new(self.body);
        *response.status_mut() = self.status.unwrap_or(StatusCode::OK);
        *response.headers_mut() = self.headers;
        response
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.write_header(StatusCode::OK);
        self.body.extend_from_slice(bytes);
        Ok(())
    }
}
