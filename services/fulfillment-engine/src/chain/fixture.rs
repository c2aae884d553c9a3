use crate::chain::{normalize_address, TransactionResolver};
use crate::errors::{FulfillmentError, Result};
use crate::models::{FulfillRequest, RedemptionTransaction};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::warn;

/// Redeemer reported for `<prefix>invaliduser`; never a real caller.
pub const FOREIGN_REDEEMER: &str = "0x000000000000000000000000000000000000dead";

/// Canned redemptions for integration environments.
///
/// Transaction ids starting with the configured prefix resolve without any
/// chain access:
/// - `<prefix>NNNN` redeems token `NNNN + 1` on behalf of the caller,
/// - `<prefix>invaliduser` is redeemed by someone other than the caller,
/// - `<prefix>pending` has not been mined yet.
///
/// Other ids go to the fallback resolver, when one is configured.
pub struct FixtureResolver {
    prefix: String,
    contract_address: String,
    offer_id: String,
    fallback: Option<Arc<dyn TransactionResolver>>,
}

impl FixtureResolver {
    pub fn new(
        prefix: String,
        contract_address: String,
        offer_id: String,
        fallback: Option<Arc<dyn TransactionResolver>>,
    ) -> Self {
        Self {
            prefix,
            contract_address: normalize_address(&contract_address),
            offer_id,
            fallback,
        }
    }

    fn redemption(&self, redeemer: &str, token_id: String) -> RedemptionTransaction {
        RedemptionTransaction {
            contract_address: self.contract_address.clone(),
            redeemer_address: normalize_address(redeemer),
            token_id,
            offer_id: self.offer_id.clone(),
            pending: false,
        }
    }
}

#[async_trait]
impl TransactionResolver for FixtureResolver {
    async fn resolve(&self, request: &FulfillRequest) -> Result<RedemptionTransaction> {
        let Some(fixture) = request.transaction_id.strip_prefix(&self.prefix) else {
            return match &self.fallback {
                Some(fallback) => fallback.resolve(request).await,
                None => Err(FulfillmentError::NotFound(format!(
                    "no fixture for transaction {}",
                    request.transaction_id
                ))),
            };
        };

        let redemption = match fixture {
            "invaliduser" => self.redemption(FOREIGN_REDEEMER, "1".to_string()),
            "pending" => return Err(FulfillmentError::Pending(request.transaction_id.clone())),
            digits if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
                let ordinal: u64 = digits.parse().map_err(|_| {
                    FulfillmentError::InvalidInput(format!("fixture ordinal {} out of range", digits))
                })?;
                let token_id = ordinal
                    .checked_add(1)
                    .ok_or_else(|| {
                        FulfillmentError::InvalidInput(format!("fixture ordinal {} out of range", digits))
                    })?
                    .to_string();
                self.redemption(&request.caller_address, token_id)
            }
            _ => {
                return Err(FulfillmentError::NotFound(format!(
                    "no fixture for transaction {}",
                    request.transaction_id
                )))
            }
        };

        warn!(
            tx = %request.transaction_id,
            contract = %redemption.contract_address,
            token = %redemption.token_id,
            "forged redemption from fixture"
        );
        Ok(redemption)
    }

    fn networks(&self) -> Vec<String> {
        self.fallback
            .as_ref()
            .map(|fallback| fallback.networks())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> FixtureResolver {
        FixtureResolver::new("tx-test-".to_string(), "0xABC".to_string(), "0".to_string(), None)
    }

    fn request(transaction_id: &str) -> FulfillRequest {
        FulfillRequest {
            transaction_id: transaction_id.to_string(),
            caller_address: "0xAAA".to_string(),
            network_id: "main".to_string(),
        }
    }

    #[tokio::test]
    async fn test_numbered_fixture_redeems_for_caller() {
        let tx = resolver().resolve(&request("tx-test-0002")).await.unwrap();
        assert_eq!(tx.contract_address, "0xabc");
        assert_eq!(tx.redeemer_address, "0xaaa");
        assert_eq!(tx.token_id, "3");
        assert_eq!(tx.offer_id, "0");
        assert!(!tx.pending);
    }

    #[tokio::test]
    async fn test_invalid_user_fixture() {
        let tx = resolver().resolve(&request("tx-test-invaliduser")).await.unwrap();
        assert_eq!(tx.redeemer_address, FOREIGN_REDEEMER);
    }

    #[tokio::test]
    async fn test_pending_fixture() {
        let err = resolver().resolve(&request("tx-test-pending")).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::Pending(_)));
    }

    #[tokio::test]
    async fn test_unprefixed_without_fallback() {
        let err = resolver()
            .resolve(&request("0x6ba5f67b3c477422260808f3120a6b2efec9453d167661c171a3501e65f9d29d"))
            .await
            .unwrap_err();
        assert!(matches!(err, FulfillmentError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_unknown_fixture() {
        let err = resolver().resolve(&request("tx-test-")).await.unwrap_err();
        assert!(matches!(err, FulfillmentError::NotFound(_)));
        assert!(resolver().networks().is_empty());
    }
}
