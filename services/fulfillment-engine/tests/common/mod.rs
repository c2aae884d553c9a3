#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use fulfillment_engine::chain::TransactionResolver;
use fulfillment_engine::database::FulfillmentStore;
use fulfillment_engine::errors::{FulfillmentError, Result};
use fulfillment_engine::models::{
    ClaimRequest, FulfillRequest, FulfillmentCode, RedemptionTransaction,
};
use std::collections::HashMap;
use std::sync::Mutex;

pub const URL: &str = "https://live.eluv.io/";
pub const REDEEMER: &str = "0xaaa0000000000000000000000000000000000001";
pub const OTHER_CALLER: &str = "0xbbb0000000000000000000000000000000000002";

/// In-memory store with the same claim semantics as the Postgres one:
/// one code per token in a pool, secrets claimed elsewhere are skipped.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<FulfillmentCode>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Vec<FulfillmentCode> {
        self.rows.lock().unwrap().clone()
    }

    pub fn claimed_count(&self) -> usize {
        self.rows.lock().unwrap().iter().filter(|row| row.claimed).count()
    }

    fn secret_claimed_elsewhere(rows: &[FulfillmentCode], index: usize) -> bool {
        let candidate = &rows[index];
        rows.iter().enumerate().any(|(i, row)| {
            i != index && row.claimed && row.url == candidate.url && row.code == candidate.code
        })
    }

    fn claimable(rows: &[FulfillmentCode], contract: &str, offer: &str) -> Vec<usize> {
        rows.iter()
            .enumerate()
            .filter(|(i, row)| {
                row.contract_address == contract
                    && row.offer_id == offer
                    && !row.claimed
                    && !Self::secret_claimed_elsewhere(rows, *i)
            })
            .map(|(i, _)| i)
            .collect()
    }
}

#[async_trait]
impl FulfillmentStore for MemoryStore {
    async fn insert_codes(
        &self,
        contract_address: &str,
        offer_id: &str,
        url: &str,
        codes: &[String],
    ) -> Result<u64> {
        let mut rows = self.rows.lock().unwrap();
        let mut inserted = 0;
        for code in codes {
            let exists = rows.iter().any(|row| {
                row.contract_address == contract_address && row.offer_id == offer_id && &row.code == code
            });
            if exists {
                continue;
            }
            let now = Utc::now();
            rows.push(FulfillmentCode {
                contract_address: contract_address.to_string(),
                offer_id: offer_id.to_string(),
                url: url.to_string(),
                code: code.clone(),
                token_id: None,
                claimed: false,
                claimant_address: None,
                created_at: now,
                updated_at: now,
            });
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn find_claim(
        &self,
        contract_address: &str,
        offer_id: &str,
        token_id: &str,
    ) -> Result<Option<FulfillmentCode>> {
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .find(|row| {
                row.contract_address == contract_address
                    && row.offer_id == offer_id
                    && row.token_id.as_deref() == Some(token_id)
                    && row.claimed
            })
            .cloned())
    }

    async fn claim_next(&self, request: &ClaimRequest) -> Result<Option<FulfillmentCode>> {
        // Let concurrent claims interleave between lookup and claim.
        tokio::task::yield_now().await;

        let mut rows = self.rows.lock().unwrap();
        let token_taken = rows.iter().any(|row| {
            row.contract_address == request.contract_address
                && row.offer_id == request.offer_id
                && row.token_id.as_deref() == Some(request.token_id.as_str())
        });
        if token_taken {
            return Ok(None);
        }

        let Some(index) = Self::claimable(&rows, &request.contract_address, &request.offer_id)
            .into_iter()
            .next()
        else {
            return Ok(None);
        };

        let row = &mut rows[index];
        row.claimed = true;
        row.token_id = Some(request.token_id.clone());
        row.claimant_address = Some(request.claimant_address.clone());
        row.updated_at = Utc::now();
        Ok(Some(row.clone()))
    }

    async fn count_unclaimed(&self, contract_address: &str, offer_id: &str) -> Result<i64> {
        let rows = self.rows.lock().unwrap();
        Ok(Self::claimable(&rows, contract_address, offer_id).len() as i64)
    }

    async fn mark_duplicates_claimed(&self, url: &str, code: &str) -> Result<Vec<String>> {
        let mut rows = self.rows.lock().unwrap();
        let mut contracts = Vec::new();
        for row in rows.iter_mut() {
            if row.url == url && row.code == code && !row.claimed {
                row.claimed = true;
                row.updated_at = Utc::now();
                contracts.push(row.contract_address.clone());
            }
        }
        Ok(contracts)
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

/// Resolver over a fixed table of redemptions.
#[derive(Default)]
pub struct StaticResolver {
    redemptions: HashMap<String, RedemptionTransaction>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, transaction_id: &str, redemption: RedemptionTransaction) -> Self {
        self.redemptions.insert(transaction_id.to_string(), redemption);
        self
    }
}

#[async_trait]
impl TransactionResolver for StaticResolver {
    async fn resolve(&self, request: &FulfillRequest) -> Result<RedemptionTransaction> {
        if request.network_id != "main" {
            return Err(FulfillmentError::UnknownNetwork(request.network_id.clone()));
        }
        self.redemptions
            .get(&request.transaction_id)
            .cloned()
            .ok_or_else(|| FulfillmentError::NotFound(request.transaction_id.clone()))
    }

    fn networks(&self) -> Vec<String> {
        vec!["main".to_string()]
    }
}

pub fn redemption(contract: &str, offer: &str, token: &str, redeemer: &str) -> RedemptionTransaction {
    RedemptionTransaction {
        contract_address: contract.to_string(),
        redeemer_address: redeemer.to_string(),
        token_id: token.to_string(),
        offer_id: offer.to_string(),
        pending: false,
    }
}

pub fn codes(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}
