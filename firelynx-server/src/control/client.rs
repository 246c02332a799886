//! Control-plane gRPC client helper
//!
//! Thin convenience layer over the generated `ConfigServiceClient` so
//! operators and tests can read and push configurations without
//! assembling transport plumbing by hand.

use std::net::SocketAddr;

use tonic::Request;

use crate::error::Result;
use crate::proto::control::{GetConfigRequest, UpdateConfigRequest, UpdateConfigResponse};
use crate::proto::settings;

pub use crate::proto::control::config_service_client::ConfigServiceClient;

/// Control-plane client over a standard tonic channel.
pub type ControlClient = ConfigServiceClient<tonic::transport::Channel>;

/// Connect to a control-plane listener by socket address.
pub async fn connect(addr: SocketAddr) -> Result<ControlClient> {
    connect_uri(format!("http://{}", addr)).await
}

/// Connect to a control-plane listener by URI
/// (e.g. `http://127.0.0.1:9999`).
pub async fn connect_uri(uri: impl Into<String>) -> Result<ControlClient> {
    let uri = uri.into();
    tracing::debug!("connecting to control plane at {}", uri);
    let client = ConfigServiceClient::connect(uri).await?;
    Ok(client)
}

/// Fetch the current configuration in wire form.
pub async fn fetch_config(client: &mut ControlClient) -> Result<settings::ServerConfig> {
    let response = client
        .get_config(Request::new(GetConfigRequest {}))
        .await?
        .into_inner();
    Ok(response.config.unwrap_or_default())
}

/// Push a configuration document through the saga, correlated by
/// `request_id`. Returns the full structured response; a rejected
/// update reports `success = false` with the transaction's error
/// detail rather than a bare status.
pub async fn push_config(
    client: &mut ControlClient,
    config: settings::ServerConfig,
    request_id: impl Into<String>,
) -> Result<UpdateConfigResponse> {
    let response = client
        .update_config(Request::new(UpdateConfigRequest {
            config: Some(config),
            request_id: Some(request_id.into()),
        }))
        .await?;
    Ok(response.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_fails_without_a_listener() {
        // Reserve a port, then close it again so nothing is listening.
        let addr = {
            let probe = std::net::TcpListener::bind("127.0.0.1:0").expect("probe bind");
            probe.local_addr().expect("probe addr")
        };
        assert!(connect(addr).await.is_err());
    }
}
