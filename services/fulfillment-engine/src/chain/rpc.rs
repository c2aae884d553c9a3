use crate::chain::redeem::decode_redeem_log;
use crate::chain::{is_transaction_hash, normalize_address, TransactionResolver};
use crate::errors::{FulfillmentError, Result};
use crate::metrics::{RPC_ERRORS, RPC_REQUEST_DURATION};
use crate::models::{FulfillRequest, RedemptionTransaction};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_hash: String,
    pub block_number: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    pub logs: Vec<Log>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Log {
    pub address: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    pub hash: String,
    pub block_number: Option<String>,
}

impl RpcTransaction {
    /// A transaction with no block yet is still in the mempool.
    pub fn is_pending(&self) -> bool {
        self.block_number.is_none()
    }
}

/// Outcome of a JSON-RPC call whose `result` may legitimately be null.
#[derive(Debug)]
pub enum RpcLookup<T> {
    Found(T),
    Missing,
    Rejected { code: i64, message: String },
}

/// Minimal Ethereum JSON-RPC client over a shared `reqwest` client.
pub struct EthRpcClient {
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl EthRpcClient {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: &str,
        params: serde_json::Value,
    ) -> Result<RpcLookup<T>> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let started = Instant::now();
        let result = self.send(endpoint, &request).await;
        RPC_REQUEST_DURATION
            .with_label_values(&[method])
            .observe(started.elapsed().as_secs_f64());

        let response: RpcResponse<T> = result.map_err(|e| {
            RPC_ERRORS.with_label_values(&[method]).inc();
            e
        })?;

        if let Some(error) = response.error {
            return Ok(RpcLookup::Rejected {
                code: error.code,
                message: error.message,
            });
        }

        Ok(match response.result {
            Some(value) => RpcLookup::Found(value),
            None => RpcLookup::Missing,
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: &RpcRequest<'_>,
    ) -> Result<RpcResponse<T>> {
        let response = self
            .http
            .post(endpoint)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<RpcResponse<T>>().await?)
    }

    pub async fn get_transaction_receipt(
        &self,
        endpoint: &str,
        hash: &str,
    ) -> Result<RpcLookup<TransactionReceipt>> {
        self.call(endpoint, "eth_getTransactionReceipt", json!([hash]))
            .await
    }

    pub async fn get_transaction_by_hash(
        &self,
        endpoint: &str,
        hash: &str,
    ) -> Result<RpcLookup<RpcTransaction>> {
        self.call(endpoint, "eth_getTransactionByHash", json!([hash]))
            .await
    }
}

/// Resolves redemptions against live chain data.
pub struct RpcResolver {
    client: EthRpcClient,
    endpoints: HashMap<String, String>,
}

impl RpcResolver {
    pub fn new(client: EthRpcClient, endpoints: HashMap<String, String>) -> Self {
        Self { client, endpoints }
    }

    fn endpoint(&self, network: &str) -> Result<&str> {
        self.endpoints
            .get(network)
            .map(String::as_str)
            .ok_or_else(|| FulfillmentError::UnknownNetwork(network.to_string()))
    }
}

#[async_trait]
impl TransactionResolver for RpcResolver {
    async fn resolve(&self, request: &FulfillRequest) -> Result<RedemptionTransaction> {
        let endpoint = self.endpoint(&request.network_id)?;
        let hash = request.transaction_id.trim();
        if !is_transaction_hash(hash) {
            return Err(FulfillmentError::InvalidInput(format!(
                "malformed transaction hash {:?}",
                request.transaction_id
            )));
        }

        let receipt = match self.client.get_transaction_receipt(endpoint, hash).await? {
            RpcLookup::Found(receipt) => receipt,
            RpcLookup::Missing => {
                return Err(FulfillmentError::NotFound(format!(
                    "no receipt for transaction {} on {}",
                    hash, request.network_id
                )))
            }
            RpcLookup::Rejected { code, message } => {
                warn!(tx = %hash, code, %message, "receipt lookup rejected");
                return Err(FulfillmentError::NotFound(format!(
                    "receipt lookup for {} failed: {}",
                    hash, message
                )));
            }
        };

        let log = receipt.logs.first().ok_or_else(|| {
            FulfillmentError::InvalidReceipt(format!("no logs in receipt for {}", hash))
        })?;
        let event = decode_redeem_log(log)?;
        debug!(tx = %hash, contract = %log.address, ?event, "decoded redeem event");

        let pending = match self.client.get_transaction_by_hash(endpoint, hash).await? {
            RpcLookup::Found(transaction) => transaction.is_pending(),
            RpcLookup::Missing => {
                return Err(FulfillmentError::NotFound(format!("cannot find transaction {}", hash)))
            }
            RpcLookup::Rejected { message, .. } => {
                return Err(FulfillmentError::NotFound(format!(
                    "transaction lookup for {} failed: {}",
                    hash, message
                )))
            }
        };
        if pending {
            return Err(FulfillmentError::Pending(hash.to_string()));
        }

        let redemption = RedemptionTransaction {
            contract_address: normalize_address(&log.address),
            redeemer_address: normalize_address(&event.redeemer),
            token_id: event.token_id,
            offer_id: event.offer_id,
            pending,
        };
        info!(
            tx = %hash,
            network = %request.network_id,
            contract = %redemption.contract_address,
            token = %redemption.token_id,
            offer = %redemption.offer_id,
            "resolved redemption"
        );

        Ok(redemption)
    }

    fn networks(&self) -> Vec<String> {
        let mut networks: Vec<String> = self.endpoints.keys().cloned().collect();
        networks.sort();
        networks
    }
}
