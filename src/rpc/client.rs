// Client - Outbound link to the consensus layer
use super::types::Packet;
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::trace;

/// Writes packets to the consensus layer
pub trait ConsensusLink: Send + Sync {
    fn send_packet(&self, packet: Packet) -> BoxFuture<'_, Result<(), LinkError>>;
}

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP error: {0}")]
    Status(u16),
}

/// HTTP link posting packets to `{url}/p2p/send`.
///
/// The underlying client keeps its connections pooled, so consecutive sends
/// reuse the same stream. No per-request timeout is set.
#[derive(Debug, Clone)]
pub struct HttpConsensusLink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpConsensusLink {
    pub fn new(consensus_url: &str) -> Result<Self, LinkError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LinkError::Http(format!("HTTP client error: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/p2p/send", consensus_url.trim_end_matches('/')),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, packet: Packet) -> Result<(), LinkError> {
        let body = bincode::serialize(&packet).map_err(|e| LinkError::Serialization(e.to_string()))?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .await
            .map_err(|e| LinkError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(LinkError::Status(response.status().as_u16()));
        }

        trace!("Packet delivered to {}", self.endpoint);
        Ok(())
    }
}

impl ConsensusLink for HttpConsensusLink {
    fn send_packet(&self, packet: Packet) -> BoxFuture<'_, Result<(), LinkError>> {
        self.post(packet).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        let link = HttpConsensusLink::new("http://127.0.0.1:7000/").unwrap();
        assert_eq!(link.endpoint(), "http://127.0.0.1:7000/p2p/send");
    }
}
