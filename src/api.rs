// API client module: contains the small blocking HTTP client that sends a
// definition to the registry. One call to `UploadClient::upload` is one
// POST; nothing is retried and nothing is cached.

use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{Result, UploadError};

pub const DEFAULT_HOST: &str = "api.swaggerhub.com";
pub const DEFAULT_PORT: u16 = 443;

/// Value of the `User-Agent` header on every upload.
pub const CLIENT_ID: &str = concat!("swaggerhub-upload/", env!("CARGO_PKG_VERSION"));

/// Scheme used to reach the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    #[default]
    Https,
}

impl Protocol {
    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Encoding of the definition file. Only selects the `Content-Type`
/// header; the body is always sent exactly as read from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DefinitionFormat {
    #[default]
    Json,
    Yaml,
}

impl DefinitionFormat {
    pub fn content_type(self) -> &'static str {
        match self {
            DefinitionFormat::Json => "application/json",
            DefinitionFormat::Yaml => "application/yaml",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DefinitionFormat::Json => "json",
            DefinitionFormat::Yaml => "yaml",
        }
    }
}

impl fmt::Display for DefinitionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where and how to reach the registry. Fixed for the client's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub protocol: Protocol,
    /// Sent verbatim as the `Authorization` header; no scheme is prepended.
    pub auth_token: String,
    pub format: DefinitionFormat,
    /// Per-request timeout. `None` leaves the transport default in place.
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            protocol: Protocol::default(),
            auth_token: String::new(),
            format: DefinitionFormat::default(),
            timeout: None,
        }
    }
}

impl ClientConfig {
    /// Build the upload URL:
    /// `{protocol}://{host}:{port}/apis/{owner}/{api}?version={version}&isPrivate={private}`.
    ///
    /// The port is always written out, even when it is the scheme default.
    /// `owner` and `api` are percent-encoded as single path segments.
    pub fn upload_url(&self, request: &UploadRequest) -> Result<String> {
        let base = format!("{}://{}/", self.protocol, self.host);
        let mut url = Url::parse(&base).map_err(|e| UploadError::InvalidTarget {
            url: base.clone(),
            reason: e.to_string(),
        })?;
        if let Some(reason) = host_problem(&self.host, &url) {
            return Err(UploadError::InvalidTarget {
                url: base,
                reason: reason.into(),
            });
        }

        url.path_segments_mut()
            .map_err(|_| UploadError::InvalidTarget {
                url: base.clone(),
                reason: "URL cannot carry a path".into(),
            })?
            .clear()
            .push("apis")
            .push(&request.owner)
            .push(&request.api);

        url.query_pairs_mut()
            .append_pair("version", &request.version)
            .append_pair("isPrivate", if request.private { "true" } else { "false" });

        let host = url.host_str().unwrap_or(&self.host);
        Ok(format!(
            "{}://{}:{}{}?{}",
            self.protocol,
            host,
            self.port,
            url.path(),
            url.query().unwrap_or_default()
        ))
    }
}

/// `host` must be a bare host name. Anything else the URL parser accepted
/// would be dropped when the upload URL is rebuilt.
fn host_problem(host: &str, url: &Url) -> Option<&'static str> {
    // Parsing drops a default port such as `:443`, so check the raw text too.
    let after_ipv6 = host.rsplit_once(']').map_or(host, |(_, rest)| rest);
    if !url.username().is_empty() || url.password().is_some() {
        Some("host must not contain user info")
    } else if url.port().is_some() || after_ipv6.contains(':') {
        Some("host must not contain a port; use the port option")
    } else if url.path() != "/" {
        Some("host must not contain a path")
    } else if url.query().is_some() || url.fragment().is_some() {
        Some("host must not contain a query or fragment")
    } else {
        None
    }
}

/// One definition to upload. Built per invocation from settings and the
/// file contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub api: String,
    pub owner: String,
    pub version: String,
    /// Raw body of the definition file.
    pub content: String,
    pub private: bool,
}

/// Result of a single upload attempt, before the skip policy is applied.
#[derive(Debug)]
pub enum UploadOutcome {
    Success,
    Failure {
        error: UploadError,
        recoverable: bool,
    },
}

impl UploadOutcome {
    /// Every failure of an upload attempt is recoverable: the skip policy
    /// may turn it into a logged no-op.
    pub fn failure(error: UploadError) -> Self {
        UploadOutcome::Failure {
            error,
            recoverable: true,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success)
    }

    /// Human-readable failure reason, `None` on success.
    pub fn reason(&self) -> Option<String> {
        match self {
            UploadOutcome::Success => None,
            UploadOutcome::Failure { error, .. } => Some(error.to_string()),
        }
    }
}

/// Build the blocking transport. The caller owns it and lends it to
/// `UploadClient`, so one process can reuse it across uploads.
pub fn http_client() -> reqwest::Result<Client> {
    Client::builder().build()
}

/// Sends a definition to the registry using a borrowed transport.
pub struct UploadClient<'a> {
    http: &'a Client,
    config: &'a ClientConfig,
}

impl<'a> UploadClient<'a> {
    pub fn new(http: &'a Client, config: &'a ClientConfig) -> Self {
        UploadClient { http, config }
    }

    pub fn config(&self) -> &ClientConfig {
        self.config
    }

    /// Perform exactly one upload attempt and classify what happened.
    /// Any 2xx is success whatever the body says.
    pub fn upload(&self, request: &UploadRequest) -> UploadOutcome {
        match self.send(request) {
            Ok(()) => UploadOutcome::Success,
            Err(err) => UploadOutcome::failure(err),
        }
    }

    fn send(&self, request: &UploadRequest) -> Result<()> {
        let url = self.config.upload_url(request)?;
        info!("Start uploading OpenAPI definition");
        debug!(
            %url,
            content_type = self.config.format.content_type(),
            bytes = request.content.len(),
            "POST"
        );

        let mut req = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, self.config.format.content_type())
            .header(AUTHORIZATION, self.config.auth_token.as_str())
            .header(USER_AGENT, CLIENT_ID)
            .body(request.content.clone());
        if let Some(timeout) = self.config.timeout {
            req = req.timeout(timeout);
        }

        let res = req.send().map_err(UploadError::Transport)?;
        let status = res.status();
        if !status.is_success() {
            let txt = res.text().unwrap_or_default();
            return Err(UploadError::rejected(status, txt));
        }
        debug!(status = status.as_u16(), "registry accepted definition");
        Ok(())
    }
}
