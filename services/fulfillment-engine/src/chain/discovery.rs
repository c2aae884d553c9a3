use crate::config::NetworkConfig;
use crate::errors::{FulfillmentError, Result};
use std::collections::HashMap;
use tracing::info;

/// JSON pointer to the first Ethereum endpoint in a fabric configuration document.
const ETHEREUM_API_POINTER: &str = "/network/services/ethereum_api/0";

/// Fetches a fabric configuration document and returns the first Ethereum RPC endpoint it lists.
pub async fn discover_rpc_url(http: &reqwest::Client, config_url: &str) -> Result<String> {
    let document: serde_json::Value = http
        .get(config_url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| FulfillmentError::Config(format!("cannot fetch network config: {}", e.without_url())))?
        .json()
        .await
        .map_err(|e| FulfillmentError::Config(format!("network config is not JSON: {}", e.without_url())))?;

    document
        .pointer(ETHEREUM_API_POINTER)
        .and_then(|value| value.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            FulfillmentError::Config("no ethereum_api endpoint in network config".to_string())
        })
}

/// Network id to RPC endpoint, discovering endpoints given by `config_url`.
pub async fn resolve_endpoints(
    http: &reqwest::Client,
    networks: &HashMap<String, NetworkConfig>,
) -> Result<HashMap<String, String>> {
    let mut endpoints = HashMap::with_capacity(networks.len());

    for (name, network) in networks {
        let endpoint = match (&network.rpc_url, &network.config_url) {
            (Some(rpc_url), _) => rpc_url.clone(),
            (None, Some(config_url)) => {
                let rpc_url = discover_rpc_url(http, config_url)
                    .await
                    .map_err(|e| FulfillmentError::Config(format!("network {}: {}", name, e)))?;
                info!(network = %name, "discovered RPC endpoint from network config");
                rpc_url
            }
            (None, None) => {
                return Err(FulfillmentError::Config(format!(
                    "network {} has no rpc_url or config_url",
                    name
                )))
            }
        };
        endpoints.insert(name.clone(), endpoint);
    }

    Ok(endpoints)
}
