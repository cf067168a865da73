//! Pooled render buffers and the commit-or-discard response writer.
//!
//! Rendering never writes to the real response directly. Output goes into a
//! [`PooledBuffer`] and is flushed only once rendering succeeded; dropping a
//! buffer without flushing discards its contents and returns the allocation
//! to the pool.

use std::io;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use http::header::HeaderMap;
use http::StatusCode;
use once_cell::sync::Lazy;
use parking_lot::Mutex;

use super::ResponseWriter;
use crate::config::Config;

static GLOBAL_POOL: Lazy<Arc<BufferPool>> =
    Lazy::new(|| Arc::new(BufferPool::from_config(&Config::default())));

/// A bounded free list of byte buffers shared by all request handlers.
#[derive(Debug)]
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
    max_idle: usize,
    retain_bytes: usize,
    initial_bytes: usize,
}

impl BufferPool {
    #[must_use]
    pub fn new(max_idle: usize, retain_bytes: usize, initial_bytes: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(max_idle)),
            max_idle,
            retain_bytes,
            initial_bytes,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.buffer_pool_size,
            config.buffer_retain_bytes,
            config.initial_buffer_bytes,
        )
    }

    /// The process-wide pool built from the default configuration.
    #[must_use]
    pub fn global() -> Arc<BufferPool> {
        Arc::clone(&GLOBAL_POOL)
    }

    /// Take an empty buffer, reusing an idle one when available.
    pub fn get(self: &Arc<Self>) -> PooledBuffer {
        let buf = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.initial_bytes));
        PooledBuffer {
            buf,
            pool: Arc::clone(self),
        }
    }

    fn put(&self, mut buf: Vec<u8>) {
        if buf.capacity() > self.retain_bytes {
            return;
        }
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_idle {
            free.push(buf);
        }
    }

    /// Number of idle buffers currently held.
    #[must_use]
    pub fn idle(&self) -> usize {
        self.free.lock().len()
    }
}

/// A buffer on loan from a [`BufferPool`]; returned (emptied) on drop.
pub struct PooledBuffer {
    buf: Vec<u8>,
    pool: Arc<BufferPool>,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl io::Write for PooledBuffer {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.put(std::mem::take(&mut self.buf));
    }
}

/// A [`ResponseWriter`] that holds status and body until [`commit`](Self::commit).
///
/// Headers go straight to the wrapped writer. Dropping without committing
/// discards the buffered status and body.
pub struct BufferedWriter<'w> {
    inner: &'w mut dyn ResponseWriter,
    status: Option<StatusCode>,
    buf: PooledBuffer,
}

impl<'w> BufferedWriter<'w> {
    pub fn new(inner: &'w mut dyn ResponseWriter, pool: &Arc<BufferPool>) -> Self {
        Self {
            inner,
            status: None,
            buf: pool.get(),
        }
    }

    /// Bytes written so far.
    #[must_use]
    pub fn buffered(&self) -> &[u8] {
        &self.buf
    }

    /// Emit the buffered status and body to the wrapped writer.
    pub fn commit(self) -> io::Result<()> {
        let BufferedWriter { inner, status, buf } = self;
        inner.write_header(status.unwrap_or(StatusCode::OK));
        inner.write_body(&buf)
    }
}

impl ResponseWriter for BufferedWriter<'_> {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn write_header(&mut self, status: StatusCode) {
        if self.status.is_none() {
            self.status = Some(status);
        }
    }

    fn write_body(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.status.is_none() {
            self.status = Some(StatusCode::OK);
        }
        self.buf.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::ResponseRecorder;
    use std::io::Write;

    fn pool() -> Arc<BufferPool> {
        Arc::new(BufferPool::new(2, 1024, 16))
    }

    #[test]
    fn test_buffer_returns_to_pool_empty() {
        let pool = pool();
        {
            let mut buf = pool.get();
            buf.write_all(b"partial").unwrap();
        }
        assert_eq!(pool.idle(), 1);
        let buf = pool.get();
        assert!(buf.is_empty());
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_pool_is_bounded() {
        let pool = pool();
        let a = pool.get();
        let b = pool.get();
        let c = pool.get();
        drop((a, b, c));
        assert_eq!(pool.idle(), 2);
    }

    #[test]
    fn test_oversized_buffers_are_dropped() {
        let pool = pool();
        {
            let mut buf = pool.get();
            buf.extend_from_slice(&[0_u8; 4096]);
        }
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_buffered_writer_commit_flushes_status_and_body() {
        let pool = pool();
        let mut rec = ResponseRecorder::new();
        {
            let mut bw = BufferedWriter::new(&mut rec, &pool);
            bw.write_header(StatusCode::ACCEPTED);
            bw.write_body(b"done").unwrap();
            bw.commit().unwrap();
        }
        assert_eq!(rec.status(), StatusCode::ACCEPTED);
        assert_eq!(rec.body_string(), "done");
    }

    #[test]
    fn test_buffered_writer_drop_discards_output() {
        let pool = pool();
        let mut rec = ResponseRecorder::new();
        {
            let mut bw = BufferedWriter::new(&mut rec, &pool);
            bw.headers_mut()
                .insert("x-trace", http::HeaderValue::from_static("1"));
            bw.write_header(StatusCode::CREATED);
            bw.write_body(b"half a page").unwrap();
            assert_eq!(bw.buffered(), b"half a page");
        }
        assert!(rec.body().is_empty());
        assert_eq!(rec.status(), StatusCode::OK);
        assert_eq!(rec.header("x-trace"), Some("1"));
        assert_eq!(pool.idle(), 1);
    }
}
