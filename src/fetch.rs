use std::time::Duration;
use reqwest::blocking::Client;
use tracing::debug;
use crate::error::{InstallError, Result};

/// Upper bound for a single artifact download.
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Placeholder substituted with the tool version in URL and message templates.
pub const VERSION_PLACEHOLDER: &str = "{version}";

/// Substitutes every `{version}` in `template`.
pub fn render_template(template: &str, version: &str) -> String {
    template.replace(VERSION_PLACEHOLDER, version)
}

/// Retrieves artifact bytes.
///
/// The installer only talks to this trait, so tests can serve fixture archives
/// from memory instead of the network.
pub trait Fetch {
    /// Retrieves the bytes behind a concrete URL.
    fn get(&self, url: &str) -> Result<Vec<u8>>;

    /// Renders `url_template` for `version` and retrieves it.
    fn fetch(&self, url_template: &str, version: &str) -> Result<Vec<u8>> {
        self.get(&render_template(url_template, version))
    }
}

/// Blocking HTTP(S) fetcher: one GET, no retries.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher with the default 60 second timeout.
    pub fn new() -> Result<Self> {
        Self::with_timeout(FETCH_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("toolbelt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InstallError::Network {
                url: String::new(),
                reason: format!("could not build http client: {e}"),
            })?;
        Ok(Self { client })
    }
}

impl Fetch for HttpFetcher {
    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let network = |e: reqwest::Error| InstallError::Network {
            url: url.to_string(),
            reason: e.to_string(),
        };
        debug!(url, "GET");
        let response = self.client
            .get(url)
            .send()
            .map_err(network)?
            .error_for_status()
            .map_err(network)?;
        let bytes = response.bytes().map_err(network)?;
        debug!(url, len = bytes.len(), "downloaded");
        Ok(bytes.to_vec())
    }
}
