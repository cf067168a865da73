#![allow(dead_code)]

use std::sync::Arc;

use pagetree::{Error, Request, ResponseRecorder, ServeMux};
use parking_lot::Mutex;

/// Issue `method path` against `mux` with optional extra headers.
pub fn serve(mux: &ServeMux, method: &str, path: &str, headers: &[(&str, &str)]) -> ResponseRecorder {
    let mut req = pagetree::server::request(method, path).unwrap();
    for (name, value) in headers {
        req.headers_mut().insert(
            http::HeaderName::from_bytes(name.as_bytes()).unwrap(),
            http::HeaderValue::from_str(value).unwrap(),
        );
    }
    let mut rec = ResponseRecorder::new();
    mux.serve(&mut rec, &mut req);
    rec
}

/// Error handler that records each error message and answers
/// `500 custom error`.
pub fn recording_error_handler(
    errors: Arc<Mutex<Vec<String>>>,
) -> impl Fn(&mut dyn pagetree::ResponseWriter, &Request, &Error) + Send + Sync + 'static {
    move |w, _req, err| {
        errors.lock().push(err.to_string());
        w.write_header(http::StatusCode::INTERNAL_SERVER_ERROR);
        let _ = w.write_body(b"custom error");
    }
}

/// Shared log pages and middlewares append to, injected through the registry.
#[derive(Default)]
pub struct Trail(pub Mutex<Vec<String>>);

impl Trail {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock())
    }
}
