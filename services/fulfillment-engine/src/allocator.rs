//! Assignment of redemption codes to on-chain redemptions.
//!
//! A redemption proves that `redeemer` burned `token_id` of `contract` for
//! `offer`. Each (contract, offer, token) is issued exactly one code, no code
//! is issued twice, and only the redeemer may collect it.

use crate::chain::normalize_address;
use crate::database::FulfillmentStore;
use crate::dedup::DedupMarker;
use crate::errors::{FulfillmentError, Result};
use crate::metrics::CLAIMS_TOTAL;
use crate::models::{ClaimRequest, FulfillmentCode, RedemptionTransaction};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub code: FulfillmentCode,
    /// The token had already been issued this code by an earlier request.
    pub replayed: bool,
}

pub struct ClaimAllocator {
    store: Arc<dyn FulfillmentStore>,
    dedup: DedupMarker,
}

impl ClaimAllocator {
    pub fn new(store: Arc<dyn FulfillmentStore>) -> Self {
        ClaimAllocator {
            dedup: DedupMarker::new(store.clone()),
            store,
        }
    }

    pub async fn allocate(&self, tx: &RedemptionTransaction, caller: &str) -> Result<Allocation> {
        let caller = normalize_address(caller);
        let redeemer = normalize_address(&tx.redeemer_address);
        if caller != redeemer {
            CLAIMS_TOTAL.with_label_values(&["mismatched"]).inc();
            warn!(
                caller = %caller,
                redeemer = %redeemer,
                token = %tx.token_id,
                "caller is not the redeemer"
            );
            return Err(FulfillmentError::MismatchedUser { caller, redeemer });
        }

        let request = ClaimRequest::from(tx);

        if let Some(code) = self
            .store
            .find_claim(&request.contract_address, &request.offer_id, &request.token_id)
            .await?
        {
            CLAIMS_TOTAL.with_label_values(&["replayed"]).inc();
            info!(
                contract = %request.contract_address,
                offer = %request.offer_id,
                token = %request.token_id,
                "token already claimed, returning its code"
            );
            return Ok(Allocation {
                code,
                replayed: true,
            });
        }

        let Some(code) = self.store.claim_next(&request).await? else {
            return Err(self.no_claim(&request).await?);
        };

        CLAIMS_TOTAL.with_label_values(&["claimed"]).inc();
        info!(
            contract = %code.contract_address,
            offer = %code.offer_id,
            token = %request.token_id,
            claimant = %request.claimant_address,
            "claimed redemption code"
        );

        self.dedup.mark(&code).await;

        Ok(Allocation {
            code,
            replayed: false,
        })
    }

    /// Tells an exhausted pool apart from one whose remaining codes were contended.
    async fn no_claim(&self, request: &ClaimRequest) -> Result<FulfillmentError> {
        let remaining = self
            .store
            .count_unclaimed(&request.contract_address, &request.offer_id)
            .await?;

        if remaining == 0 {
            CLAIMS_TOTAL.with_label_values(&["exhausted"]).inc();
            warn!(
                contract = %request.contract_address,
                offer = %request.offer_id,
                token = %request.token_id,
                "no redemption codes left"
            );
            return Ok(FulfillmentError::NoCodesAvailable {
                contract: request.contract_address.clone(),
                offer: request.offer_id.clone(),
                token: request.token_id.clone(),
            });
        }

        CLAIMS_TOTAL.with_label_values(&["contended"]).inc();
        warn!(
            contract = %request.contract_address,
            offer = %request.offer_id,
            token = %request.token_id,
            remaining,
            "claim lost a race, codes remain"
        );
        Ok(FulfillmentError::UnableToRedeem {
            contract: request.contract_address.clone(),
            offer: request.offer_id.clone(),
            token: request.token_id.clone(),
        })
    }
}
