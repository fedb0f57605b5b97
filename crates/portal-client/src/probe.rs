use crate::transport::{self, TransportOptions};
use crate::{PortalError, PortalResult};
use reqwest::StatusCode;

/// Connectivity check against a well-known page.
///
/// The host is online when the page answers 200 with exactly the expected
/// body. Captive portals typically redirect or rewrite the page instead.
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    url: String,
    expected_body: String,
    client: reqwest::Client,
}

impl ConnectivityProbe {
    pub fn new(
        url: impl Into<String>,
        expected_body: impl Into<String>,
        transport: &TransportOptions,
    ) -> PortalResult<Self> {
        Ok(Self {
            url: url.into(),
            expected_body: expected_body.into(),
            client: transport::build_client(transport)?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the page and compare it byte for byte.
    ///
    /// Non-200 responses are errors; a 200 with another body is `Ok(false)`.
    pub async fn check(&self) -> PortalResult<bool> {
        let response = self.client.get(&self.url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            return Err(PortalError::Status {
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await?;
        let matches = body.as_ref() == self.expected_body.as_bytes();
        tracing::debug!(url = %self.url, matches, "connectivity probe");
        Ok(matches)
    }
}
