//! KernelCI build API client.

use kci_protocol::{BuildQuery, BuildRecord, BuildResponse, BUILD_ENDPOINT};
use reqwest::blocking::Client;
use reqwest::header::AUTHORIZATION;
use reqwest::Url;
use tracing::debug;

use super::{BuildApi, FetchError};

/// Blocking client for `GET <api>/build`.
#[derive(Debug, Clone)]
pub struct HttpBuildApi {
    client: Client,
    root: Url,
    token: String,
}

impl HttpBuildApi {
    pub fn new(root: Url, token: String) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(concat!("kci-lava-jobs/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            root,
            token,
        })
    }

    /// Request URL for a query.
    pub fn build_url(&self, query: &BuildQuery) -> Result<Url, FetchError> {
        let mut url = self
            .root
            .join(BUILD_ENDPOINT)
            .map_err(|e| FetchError::Url {
                url: self.root.to_string(),
                reason: e.to_string(),
            })?;
        url.query_pairs_mut().extend_pairs(query.query_pairs());
        Ok(url)
    }
}

impl BuildApi for HttpBuildApi {
    fn get_builds(&self, query: &BuildQuery) -> Result<Vec<BuildRecord>, FetchError> {
        let url = self.build_url(query)?;
        debug!(url = %url, "GET");
        let body = self
            .client
            .get(url)
            .header(AUTHORIZATION, &self.token)
            .send()?
            .error_for_status()?
            .text()?;
        Ok(BuildResponse::parse(&body)?.result)
    }
}
