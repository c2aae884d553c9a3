pub mod discovery;
pub mod fixture;
pub mod redeem;
pub mod rpc;

use crate::config::{Config, ResolverMode};
use crate::errors::{FulfillmentError, Result};
use crate::models::{FulfillRequest, RedemptionTransaction};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub use fixture::FixtureResolver;
pub use rpc::{EthRpcClient, RpcResolver};

/// Turns a redemption transaction id into the claim it proves.
#[async_trait]
pub trait TransactionResolver: Send + Sync {
    async fn resolve(&self, request: &FulfillRequest) -> Result<RedemptionTransaction>;

    /// Network ids this resolver can reach.
    fn networks(&self) -> Vec<String>;
}

/// Lowercase hex form used for every address comparison and stored row.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// Strict `0x` + 40 hex digit check, for addresses taken from callers.
pub fn is_hex_address(address: &str) -> bool {
    match address.strip_prefix("0x").or_else(|| address.strip_prefix("0X")) {
        Some(digits) => digits.len() == 40 && digits.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

pub fn is_transaction_hash(hash: &str) -> bool {
    match hash.strip_prefix("0x").or_else(|| hash.strip_prefix("0X")) {
        Some(digits) => digits.len() == 64 && digits.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Builds the resolver selected by `resolver.mode`, discovering RPC endpoints first.
pub async fn build_resolver(config: &Config) -> Result<Arc<dyn TransactionResolver>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.rpc.timeout_ms))
        .build()
        .map_err(|e| FulfillmentError::Config(format!("cannot build HTTP client: {}", e)))?;

    let endpoints = discovery::resolve_endpoints(&http, &config.networks).await?;
    info!(networks = ?endpoints.keys().collect::<Vec<_>>(), "RPC endpoints resolved");

    let rpc = Arc::new(RpcResolver::new(EthRpcClient::new(http), endpoints));

    match config.resolver.mode {
        ResolverMode::Rpc => Ok(rpc),
        ResolverMode::Fixture => {
            let contract = config
                .resolver
                .fixture_contract_address
                .clone()
                .ok_or_else(|| {
                    FulfillmentError::Config("fixture_contract_address is required".to_string())
                })?;
            warn!(
                prefix = %config.resolver.fixture_prefix,
                contract = %contract,
                "fixture resolver enabled; matching transaction ids resolve to canned redemptions"
            );

            let fallback: Option<Arc<dyn TransactionResolver>> = if rpc.networks().is_empty() {
                None
            } else {
                Some(rpc)
            };

            Ok(Arc::new(FixtureResolver::new(
                config.resolver.fixture_prefix.clone(),
                contract,
                config.resolver.fixture_offer_id.clone(),
                fallback,
            )))
        }
    }
}
