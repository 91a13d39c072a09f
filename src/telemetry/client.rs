//! gNMI client over a tonic channel.

use tonic::transport::{Certificate, Channel, ClientTlsConfig, Endpoint};
use tonic::{Request, Status};
use tracing::info;

use super::proto::g_nmi_client::GNmiClient;
use super::proto::{GetRequest, GetResponse};
use super::TelemetryClient;
use crate::config::TelemetryConfig;
use crate::error::{ConfigError, HarnessError, HarnessResult};

/// Client for a remote gNMI service.
#[derive(Debug, Clone)]
pub struct GnmiTelemetryClient {
    inner: GNmiClient<Channel>,
}

impl GnmiTelemetryClient {
    /// Dial the configured endpoint. With a `[telemetry.tls]` section the
    /// server certificate is verified against the given CA.
    pub async fn connect(config: &TelemetryConfig) -> HarnessResult<Self> {
        let mut endpoint = Endpoint::from_shared(config.endpoint.clone())
            .map_err(|e| HarnessError::transport(format!("invalid endpoint '{}': {e}", config.endpoint)))?
            .timeout(config.request_timeout())
            .connect_timeout(config.request_timeout());

        if let Some(tls) = &config.tls {
            let pem = std::fs::read(&tls.ca_certificate).map_err(|e| ConfigError::io(&tls.ca_certificate, e))?;
            let tls_config = ClientTlsConfig::new()
                .ca_certificate(Certificate::from_pem(pem))
                .domain_name(tls.domain_name.clone());
            endpoint = endpoint
                .tls_config(tls_config)
                .map_err(|e| HarnessError::transport(format!("invalid TLS configuration: {e}")))?;
        }

        let channel = endpoint
            .connect()
            .await
            .map_err(|e| HarnessError::transport(format!("failed to connect to {}: {e}", config.endpoint)))?;

        info!(endpoint = %config.endpoint, tls = config.tls.is_some(), "connected to telemetry service");
        Ok(Self::from_channel(channel))
    }

    /// Wrap an already established channel.
    #[must_use]
    pub fn from_channel(channel: Channel) -> Self {
        Self {
            inner: GNmiClient::new(channel),
        }
    }
}

#[tonic::async_trait]
impl TelemetryClient for GnmiTelemetryClient {
    async fn get(&self, request: GetRequest) -> Result<GetResponse, Status> {
        let mut client = self.inner.clone();
        client.get(Request::new(request)).await.map(tonic::Response::into_inner)
    }
}
