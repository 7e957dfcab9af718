use fleet_agent::cloud::{CloudAdapter, CloudError, Instance};
use fleet_agent::types::{NodeId, ProvisioningTemplate};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};

use crate::wire::{
    CreateDropletRequest, DropletEnvelope, DropletsListEnvelope, FloatingAddressActionRequest,
};

/// Default API root for the droplet-shaped provider this adapter models
/// (§6). Overridable so tests can point it at a local mock server.
pub const DEFAULT_BASE_URL: &str = "https://api.digitalocean.com/v2";

/// JSON-over-HTTPS implementation of the `CloudAdapter` contract (§4.3, §6),
/// speaking the droplet-shaped provider API that `wire.rs` maps onto the
/// core's `Instance`/`ProvisioningTemplate` types.
pub struct HttpCloudAdapter {
    client: Client,
    base_url: String,
    token: String,
    /// The agent's own configured gossip port (§6: "default port 12345,
    /// configurable per agent"), paired with every address this adapter
    /// derives from the provider's listing — the provider's address
    /// records carry no port of their own.
    gossip_port: u16,
}

impl HttpCloudAdapter {
    pub fn new(token: impl Into<String>, gossip_port: u16) -> Self {
        Self::with_base_url(token, DEFAULT_BASE_URL, gossip_port)
    }

    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>, gossip_port: u16) -> Self {
        Self { client: Client::new(), base_url: base_url.into(), token: token.into(), gossip_port }
    }

    /// Classifies a non-2xx response the way §7 asks: auth/validation
    /// failures are permanent, rate limiting and server errors are
    /// transient and will be retried implicitly on the next balance pass.
    fn classify_status(status: StatusCode, body: &str) -> CloudError {
        if status == StatusCode::UNAUTHORIZED
            || status == StatusCode::FORBIDDEN
            || status == StatusCode::UNPROCESSABLE_ENTITY
            || status == StatusCode::BAD_REQUEST
        {
            CloudError::Permanent(format!("{}: {}", status, body))
        } else {
            CloudError::Transient(format!("{}: {}", status, body))
        }
    }

    fn classify_transport(e: reqwest::Error) -> CloudError {
        CloudError::Transient(e.to_string())
    }

    async fn get_page(&self, url: &str) -> Result<DropletsListEnvelope, CloudError> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(Self::classify_transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }
        response.json().await.map_err(Self::classify_transport)
    }
}

#[async_trait]
impl CloudAdapter for HttpCloudAdapter {
    /// Lists every instance carrying `tag`, following the provider's
    /// cursor-style pagination until `links.pages.next` is absent (§4.3).
    async fn list(&self, tag: &str) -> Result<Vec<Instance>, CloudError> {
        let mut url = format!("{}/droplets?tag_name={}&per_page=200", self.base_url, tag);
        let mut instances = Vec::new();
        loop {
            let page = self.get_page(&url).await?;
            instances.extend(page.droplets.into_iter().map(|d| d.into_instance(self.gossip_port)));
            match page.links.pages.and_then(|p| p.next) {
                Some(next) => url = next,
                None => break,
            }
        }
        Ok(instances)
    }

    async fn get(&self, id: &NodeId) -> Result<Instance, CloudError> {
        let url = format!("{}/droplets/{}", self.base_url, id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(Self::classify_transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }
        let envelope: DropletEnvelope = response.json().await.map_err(Self::classify_transport)?;
        Ok(envelope.droplet.into_instance(self.gossip_port))
    }

    async fn create(&self, template: &ProvisioningTemplate) -> Result<NodeId, CloudError> {
        let url = format!("{}/droplets", self.base_url);
        let body = CreateDropletRequest::from_template(template);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(Self::classify_transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }
        let envelope: DropletEnvelope = response.json().await.map_err(Self::classify_transport)?;
        Ok(envelope.droplet.id.to_string())
    }

    /// Idempotent from the core's perspective: a repeated destroy for an
    /// already-gone id still reports success by treating `404` as a no-op.
    async fn destroy(&self, id: &NodeId) -> Result<(), CloudError> {
        let url = format!("{}/droplets/{}", self.base_url, id);
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(Self::classify_transport)?;
        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(Self::classify_status(status, &body))
    }

    async fn assign_floating_address(&self, address: &str, id: &NodeId) -> Result<(), CloudError> {
        let droplet_id: u64 = id
            .parse()
            .map_err(|_| CloudError::Permanent(format!("id {} is not a numeric droplet id", id)))?;
        let url = format!("{}/floating_ips/{}/actions", self.base_url, address);
        let body = FloatingAddressActionRequest { kind: "assign", droplet_id };
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(Self::classify_transport)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_status(status, &body));
        }
        Ok(())
    }
}
