//! Blocking HTTP plumbing shared by the service clients.
//!
//! Every backend is reached through `ServiceClient`: a base URL, the
//! service's path prefix, and a `ureq` agent with a global timeout.

use anyhow::{anyhow, Context, Result};
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::Read;
use std::time::Duration;
use url::Url;

use crate::frame::EncodedImage;

const MAX_RESPONSE_BYTES: u64 = 10 * 1024 * 1024;

/// Status code recorded when a service cannot be reached at all.
pub const UNREACHABLE: u16 = 0;

/// Response reduced to what the console needs: status and body text.
#[derive(Clone, Debug)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).context("decode response body")
    }
}

/// Failure below the HTTP layer (DNS, refused connection, timeout, ...).
#[derive(Debug)]
pub struct TransportFailure(pub String);

impl std::fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for TransportFailure {}

/// Client for one backend service mounted under `path` on `base_url`.
#[derive(Clone, Debug)]
pub struct ServiceClient {
    agent: ureq::Agent,
    base: Url,
    path: String,
}

impl ServiceClient {
    pub fn new(base_url: &str, path: &str, timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("parse base url {base_url}"))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(anyhow!("base url must be http(s), got {}", base.scheme()));
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self {
            agent,
            base,
            path: path.trim_end_matches('/').to_string(),
        })
    }

    /// Absolute URL of `endpoint` under this service's path.
    pub fn url(&self, endpoint: &str) -> Result<Url> {
        let joined = format!("{}/{}", self.path, endpoint.trim_start_matches('/'));
        self.base
            .join(&joined)
            .with_context(|| format!("join {} onto {}", joined, self.base))
    }

    pub fn get(&self, endpoint: &str, query: &[(&str, String)]) -> Result<HttpReply> {
        let url = self.url(endpoint)?;
        let mut request = self.agent.get(url.as_str());
        for (key, value) in query {
            request = request.query(key, value);
        }
        finish(request.call())
    }

    pub fn post_json<T: Serialize + ?Sized>(&self, endpoint: &str, body: &T) -> Result<HttpReply> {
        let url = self.url(endpoint)?;
        let payload = serde_json::to_string(body).context("encode request body")?;
        finish(
            self.agent
                .post(url.as_str())
                .set("Content-Type", "application/json")
                .send_string(&payload),
        )
    }

    /// Upload one file as the `field` part of a multipart form.
    pub fn post_file(&self, endpoint: &str, field: &str, image: &EncodedImage) -> Result<HttpReply> {
        let url = self.url(endpoint)?;
        let form = MultipartForm::single_file(field, image);
        finish(
            self.agent
                .post(url.as_str())
                .set("Content-Type", &form.content_type())
                .send_bytes(&form.body),
        )
    }

    /// Status code of a GET, or `UNREACHABLE` on transport failure.
    pub fn status_of(&self, endpoint: &str) -> u16 {
        match self.get(endpoint, &[]) {
            Ok(reply) => reply.status,
            Err(err) => {
                log::debug!("{} unreachable: {:#}", endpoint, err);
                UNREACHABLE
            }
        }
    }
}

/// Normalize `ureq`'s split between status errors and transport errors.
fn finish(result: std::result::Result<ureq::Response, ureq::Error>) -> Result<HttpReply> {
    let response = match result {
        Ok(response) => response,
        Err(ureq::Error::Status(_, response)) => response,
        Err(ureq::Error::Transport(transport)) => {
            return Err(TransportFailure(transport.to_string()).into())
        }
    };
    let status = response.status();
    let mut body = String::new();
    response
        .into_reader()
        .take(MAX_RESPONSE_BYTES)
        .read_to_string(&mut body)
        .map_err(|e| TransportFailure(format!("read response body: {e}")))?;
    Ok(HttpReply { status, body })
}

/// Minimal `multipart/form-data` body with a random boundary.
pub(crate) struct MultipartForm {
    boundary: String,
    pub(crate) body: Vec<u8>,
}

impl MultipartForm {
    pub(crate) fn single_file(field: &str, image: &EncodedImage) -> Self {
        let mut raw = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut raw);
        let boundary = format!(
            "vbic-{}",
            raw.iter().map(|b| format!("{b:02x}")).collect::<String>()
        );

        let file_name = image.file_name.replace(['"', '\r', '\n'], "_");
        let mut body = Vec::with_capacity(image.bytes.len() + 256);
        body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        body.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", image.content_type).as_bytes());
        body.extend_from_slice(&image.bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
        Self { boundary, body }
    }

    pub(crate) fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }
}
