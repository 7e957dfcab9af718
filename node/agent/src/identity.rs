use async_trait::async_trait;

use crate::types::NodeId;

/// Abstracts "who am I" (§6, §9 design notes). Real implementations hit a
/// link-local metadata endpoint; tests inject a fixed id.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolves the local instance id. Failure here is fatal at startup
    /// (§7): the agent cannot be a member of the fleet it is managing
    /// without knowing who it is.
    async fn self_id(&self) -> color_eyre::Result<NodeId>;
}

/// A fixed-id identity provider, for tests and for single-node dry runs.
pub struct FixedIdentity(pub NodeId);

#[async_trait]
impl IdentityProvider for FixedIdentity {
    async fn self_id(&self) -> color_eyre::Result<NodeId> {
        Ok(self.0.clone())
    }
}

/// Default link-local metadata endpoint for the droplet metadata service
/// modeled by this workspace's `cloud-adapter` (§6). Treated as synchronous
/// and infallible for the happy path; any failure aborts startup (§7).
pub const DEFAULT_METADATA_URL: &str = "http://169.254.169.254/metadata/v1/id";

/// Resolves the local instance id with a plain-text GET against a
/// link-local metadata endpoint (§6, §9 design notes).
pub struct HttpMetadataIdentity {
    client: reqwest::Client,
    url: String,
}

impl HttpMetadataIdentity {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

impl Default for HttpMetadataIdentity {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_URL)
    }
}

#[async_trait]
impl IdentityProvider for HttpMetadataIdentity {
    async fn self_id(&self) -> color_eyre::Result<NodeId> {
        let response = self.client.get(&self.url).send().await?;
        let body = response.error_for_status()?.text().await?;
        let id = body.trim().to_string();
        if id.is_empty() {
            return Err(color_eyre::eyre::eyre!("metadata endpoint returned an empty id"));
        }
        Ok(id)
    }
}
