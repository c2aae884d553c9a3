use crate::database::FulfillmentStore;
use crate::metrics::{DEDUP_FAILURES, DUPLICATES_MARKED};
use crate::models::FulfillmentCode;
use std::sync::Arc;
use tracing::{error, info};

/// Retires copies of a just-claimed secret that were loaded into other pools.
///
/// Best effort: a failure here never fails the claim that triggered it.
pub struct DedupMarker {
    store: Arc<dyn FulfillmentStore>,
}

impl DedupMarker {
    pub fn new(store: Arc<dyn FulfillmentStore>) -> Self {
        DedupMarker { store }
    }

    /// Returns how many duplicate rows were marked claimed.
    pub async fn mark(&self, claimed: &FulfillmentCode) -> usize {
        match self
            .store
            .mark_duplicates_claimed(&claimed.url, &claimed.code)
            .await
        {
            Ok(contracts) => {
                for contract in &contracts {
                    info!(
                        claimed_contract = %claimed.contract_address,
                        duplicate_contract = %contract,
                        "marked duplicate secret claimed"
                    );
                }
                DUPLICATES_MARKED.inc_by(contracts.len() as u64);
                contracts.len()
            }
            Err(e) => {
                DEDUP_FAILURES.inc();
                error!(
                    contract = %claimed.contract_address,
                    offer = %claimed.offer_id,
                    "Failed to mark duplicate secrets claimed: {}",
                    e
                );
                0
            }
        }
    }
}
