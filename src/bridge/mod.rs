//! ShadowBridge REST client.
//!
//! All calls go to `<base>/<path>` where base defaults to
//! `http://localhost:6767/api`. Reads (GET) time out after 10 s, writes
//! (POST, uploads, streamed downloads) after 30 s. Nothing is retried.
//!
//! Two flavours per call:
//!   try_*  -> Result<_, BridgeError> for callers that word their own message
//!   plain  -> never fails; prints the error and returns the "unavailable"
//!             sentinel (status 0, no data)

pub mod types;

use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use url::Url;

pub use types::{AgentStatusReport, DeviceInfo};

pub const READ_TIMEOUT: Duration = Duration::from_secs(10);
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(30);
/// Used by `ping`, which only wants to know whether anything answers.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Cannot reach ShadowBridge at {url}. Is it running?")]
    Unreachable { url: String },

    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl BridgeError {
    fn from_reqwest(url: &str, err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            BridgeError::Timeout {
                url: url.to_string(),
                secs: timeout.as_secs(),
            }
        } else if err.is_connect() {
            BridgeError::Unreachable {
                url: url.to_string(),
            }
        } else if err.is_decode() {
            BridgeError::Decode {
                url: url.to_string(),
                message: err.to_string(),
            }
        } else {
            BridgeError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }

    pub fn is_unreachable(&self) -> bool {
        matches!(self, BridgeError::Unreachable { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Reads get the short timeout, writes the long one.
    pub fn default_timeout(self) -> Duration {
        match self {
            Method::Get => READ_TIMEOUT,
            Method::Post => WRITE_TIMEOUT,
        }
    }
}

/// Status code plus decoded body. `status == 0` means the bridge was unavailable.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeReply {
    pub status: u16,
    /// JSON body; a non-JSON body is kept as a JSON string.
    pub data: Option<Value>,
}

impl BridgeReply {
    pub fn unavailable() -> Self {
        BridgeReply {
            status: 0,
            data: None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.status == 0
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    /// Body rendered for error messages.
    pub fn body_text(&self) -> String {
        match &self.data {
            None => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// `message` field of a JSON object body, if any.
    pub fn message(&self) -> Option<&str> {
        self.data.as_ref()?.get("message")?.as_str()
    }
}

/// Result of a streamed download.
#[derive(Debug, Clone, PartialEq)]
pub struct Download {
    pub status: u16,
    pub bytes_written: u64,
    /// Error body for non-200 replies.
    pub data: Option<Value>,
}

impl Download {
    pub fn unavailable() -> Self {
        Download {
            status: 0,
            bytes_written: 0,
            data: None,
        }
    }

    pub fn as_reply(&self) -> BridgeReply {
        BridgeReply {
            status: self.status,
            data: self.data.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    base: Url,
}

impl BridgeClient {
    pub fn new(base: Url) -> Result<Self, BridgeError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("shadow-cli/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| BridgeError::Transport {
                url: base.to_string(),
                source,
            })?;
        Ok(Self { http, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Join a relative path onto the base URL, keeping the base path (`/api`).
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /* ---- fallible calls ---- */

    pub async fn try_request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        timeout: Duration,
    ) -> Result<BridgeReply, BridgeError> {
        let url = self.endpoint(path);
        tracing::debug!(?method, %url, timeout_s = timeout.as_secs(), "bridge request");

        let builder = match method {
            Method::Get => self.http.get(&url),
            Method::Post => {
                // The bridge expects a JSON body on every POST, even an empty one.
                let empty = Value::Object(Default::default());
                self.http.post(&url).json(body.unwrap_or(&empty))
            }
        };

        let resp = builder
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| BridgeError::from_reqwest(&url, e, timeout))?;
        read_reply(&url, resp, timeout).await
    }

    pub async fn try_get(&self, path: &str) -> Result<BridgeReply, BridgeError> {
        self.try_request(Method::Get, path, None, READ_TIMEOUT).await
    }

    /// Multipart upload: the file goes in the `file` part, `fields` as text parts.
    pub async fn try_upload(
        &self,
        path: &str,
        file: &Path,
        fields: &[(&str, String)],
    ) -> Result<BridgeReply, BridgeError> {
        let url = self.endpoint(path);
        let bytes = tokio::fs::read(file).await.map_err(|source| BridgeError::Io {
            context: format!("cannot read {}", file.display()),
            source,
        })?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.bin".to_string());
        tracing::debug!(%url, file = %file_name, size = bytes.len(), "bridge upload");

        let mut form = reqwest::multipart::Form::new().part(
            "file",
            reqwest::multipart::Part::bytes(bytes).file_name(file_name),
        );
        for (name, value) in fields {
            form = form.text(name.to_string(), value.clone());
        }

        let resp = self
            .http
            .post(&url)
            .multipart(form)
            .timeout(WRITE_TIMEOUT)
            .send()
            .await
            .map_err(|e| BridgeError::from_reqwest(&url, e, WRITE_TIMEOUT))?;
        read_reply(&url, resp, WRITE_TIMEOUT).await
    }

    /// Stream a GET body into `dest`. Bytes land in a temporary file next to
    /// `dest` that replaces it only once the whole body has arrived, so a
    /// broken transfer leaves an existing `dest` untouched.
    pub async fn try_download(&self, path: &str, dest: &Path) -> Result<Download, BridgeError> {
        let url = self.endpoint(path);
        tracing::debug!(%url, dest = %dest.display(), "bridge download");

        let resp = self
            .http
            .get(&url)
            .timeout(WRITE_TIMEOUT)
            .send()
            .await
            .map_err(|e| BridgeError::from_reqwest(&url, e, WRITE_TIMEOUT))?;

        let status = resp.status().as_u16();
        if status != 200 {
            let reply = read_reply(&url, resp, WRITE_TIMEOUT).await?;
            return Ok(Download {
                status,
                bytes_written: 0,
                data: reply.data,
            });
        }

        let bytes_written = stream_to_file(&url, resp, dest).await?;
        Ok(Download {
            status,
            bytes_written,
            data: None,
        })
    }

    /* ---- sentinel calls ---- */

    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> BridgeReply {
        self.try_request(method, path, body, method.default_timeout())
            .await
            .unwrap_or_else(|e| {
                report(&e);
                BridgeReply::unavailable()
            })
    }

    pub async fn post(&self, path: &str, body: Option<&Value>) -> BridgeReply {
        self.request(Method::Post, path, body).await
    }

    pub async fn upload(&self, path: &str, file: &Path, fields: &[(&str, String)]) -> BridgeReply {
        self.try_upload(path, file, fields).await.unwrap_or_else(|e| {
            report(&e);
            BridgeReply::unavailable()
        })
    }

    pub async fn download(&self, path: &str, dest: &Path) -> Download {
        self.try_download(path, dest).await.unwrap_or_else(|e| {
            report(&e);
            Download::unavailable()
        })
    }
}

/// Print a client failure for the user.
pub fn report(err: &BridgeError) {
    tracing::debug!(error = ?err, "bridge call failed");
    eprintln!("{}", report_line(err));
}

fn report_line(err: &BridgeError) -> String {
    format!("Error: {err}")
}

async fn read_reply(
    url: &str,
    resp: reqwest::Response,
    timeout: Duration,
) -> Result<BridgeReply, BridgeError> {
    let status = resp.status().as_u16();
    let text = resp
        .text()
        .await
        .map_err(|e| BridgeError::from_reqwest(url, e, timeout))?;
    tracing::trace!(status, body = %text, "bridge reply");

    let data = if text.trim().is_empty() {
        None
    } else {
        Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    };
    Ok(BridgeReply { status, data })
}

fn io_error(context: String) -> impl FnOnce(std::io::Error) -> BridgeError {
    move |source| BridgeError::Io { context, source }
}

async fn stream_to_file(
    url: &str,
    resp: reqwest::Response,
    dest: &Path,
) -> Result<u64, BridgeError> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let partial = tempfile::Builder::new()
        .prefix(".shadow-pull-")
        .tempfile_in(dir)
        .map_err(io_error(format!("cannot create a temporary file in {}", dir.display())))?;
    let handle = partial
        .as_file()
        .try_clone()
        .map_err(io_error(format!("cannot open {}", partial.path().display())))?;
    let mut file = tokio::fs::File::from_std(handle);

    let mut written = 0u64;
    let mut stream = resp.bytes_stream();
    while let Some(chunk) = stream.next().await {
        // Dropping `partial` on any early return deletes it.
        let chunk = chunk.map_err(|e| BridgeError::from_reqwest(url, e, WRITE_TIMEOUT))?;
        file.write_all(&chunk)
            .await
            .map_err(io_error(format!("cannot write {}", partial.path().display())))?;
        written += chunk.len() as u64;
    }
    file.flush()
        .await
        .map_err(io_error(format!("cannot write {}", partial.path().display())))?;
    drop(file);

    partial.persist(dest).map_err(|e| BridgeError::Io {
        context: format!("cannot replace {}", dest.display()),
        source: e.error,
    })?;
    Ok(written)
}
