//! HTTP client backend: GET/PUT/HEAD/DELETE against `<base>/<name_string>`.

use std::io::{self, Cursor, Read, Write};
use std::sync::Arc;

use blobmesh_core::{BlobName, Error, ValidationError};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::StatusCode;
use serde::Deserialize;

use crate::{Backend, BlobWriter};

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

/// Mutates an outgoing request before it is sent — for auth headers, proxy
/// routing, or request tracing.
pub trait RequestHook: Send + Sync {
    /// Apply the mutation to `builder`, returning the (possibly modified) builder.
    fn apply(&self, builder: RequestBuilder) -> RequestBuilder;
}

struct NoopHook;
impl RequestHook for NoopHook {
    fn apply(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
    }
}

/// A backend that proxies to a remote blob server over HTTP(S).
pub struct HttpBackend {
    base_url: String,
    client: Client,
    hook: Arc<dyn RequestHook>,
}

impl HttpBackend {
    /// Build a client rooted at `base_url` (no trailing slash), with no
    /// request mutation hook.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_hook(base_url, Box::new(NoopHook))
    }

    /// Build a client that runs `hook` against every outgoing request,
    /// including the PUT issued by [`HttpWriter::close`].
    #[must_use]
    pub fn with_hook(base_url: impl Into<String>, hook: Box<dyn RequestHook>) -> Self {
        Self { base_url: base_url.into(), client: Client::new(), hook: Arc::from(hook) }
    }

    fn url_for(&self, name: &BlobName) -> String {
        format!("{}/{}", self.base_url, name.to_string_form())
    }

    fn map_error_status(status: StatusCode, body: &[u8]) -> Error {
        if status == StatusCode::NOT_FOUND {
            return Error::NotFound;
        }
        if status == StatusCode::BAD_REQUEST {
            if let Ok(err) = serde_json::from_slice::<ErrorBody>(body) {
                return match err.code.as_str() {
                    "unknown_blob_type" => Error::UnknownBlobType(0),
                    "validation_failed" => {
                        Error::ValidationFailed(ValidationError::StaticHashMismatch)
                    }
                    "invalid_blob_name" => Error::InvalidBlobName("rejected by server"),
                    "upload_in_progress" => Error::UploadInProgress,
                    _ => Error::ConnectionError(err.message),
                };
            }
            return Error::ConnectionError(format!("400 with unparseable body ({} bytes)", body.len()));
        }
        Error::ConnectionError(format!("unexpected status {status}"))
    }
}

impl Backend for HttpBackend {
    fn kind(&self) -> &'static str {
        "http"
    }

    fn address(&self) -> String {
        self.base_url.clone()
    }

    fn open_read_stream(&self, name: &BlobName) -> Result<Box<dyn Read + Send>, Error> {
        let req = self.hook.apply(
            self.client.get(self.url_for(name)).header("Accept", "application/json"),
        );
        let resp = req.send().map_err(|e| Error::ConnectionError(e.to_string()))?;
        if resp.status().is_success() {
            let bytes = resp.bytes().map_err(|e| Error::ConnectionError(e.to_string()))?;
            return Ok(Box::new(Cursor::new(bytes.to_vec())));
        }
        let status = resp.status();
        let body = resp.bytes().unwrap_or_default();
        Err(Self::map_error_status(status, &body))
    }

    fn open_write_stream(&self, name: &BlobName) -> Result<Box<dyn BlobWriter>, Error> {
        Ok(Box::new(HttpWriter {
            base_url: self.base_url.clone(),
            client: self.client.clone(),
            hook: self.hook.clone(),
            name: name.clone(),
            buf: Vec::new(),
        }))
    }

    fn exists(&self, name: &BlobName) -> bool {
        let req = self.hook.apply(self.client.head(self.url_for(name)));
        matches!(req.send(), Ok(resp) if resp.status().is_success())
    }

    fn delete(&self, name: &BlobName) -> Result<(), Error> {
        let req = self.hook.apply(self.client.delete(self.url_for(name)));
        let resp = req.send().map_err(|e| Error::ConnectionError(e.to_string()))?;
        if resp.status().is_success() {
            return Ok(());
        }
        let status = resp.status();
        let body = resp.bytes().unwrap_or_default();
        Err(Self::map_error_status(status, &body))
    }
}

/// Buffers the write and issues a single PUT on [`BlobWriter::close`] — the
/// HTTP protocol has no notion of a partial upload to cancel server-side, so
/// [`BlobWriter::cancel`] simply discards the local buffer.
struct HttpWriter {
    base_url: String,
    client: Client,
    hook: Arc<dyn RequestHook>,
    name: BlobName,
    buf: Vec<u8>,
}

impl Write for HttpWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BlobWriter for HttpWriter {
    fn close(self: Box<Self>) -> Result<(), Error> {
        let url = format!("{}/{}", self.base_url, self.name.to_string_form());
        let req = self.hook.apply(
            self.client
                .put(url)
                .header("Content-Type", "application/octet-stream")
                .header("Accept", "application/json")
                .body(self.buf),
        );
        let resp = req.send().map_err(|e| Error::ConnectionError(e.to_string()))?;
        if resp.status().is_success() {
            return Ok(());
        }
        let status = resp.status();
        let body = resp.bytes().unwrap_or_default();
        Err(HttpBackend::map_error_status(status, &body))
    }

    fn cancel(self: Box<Self>) -> Result<(), Error> {
        Ok(())
    }
}
