use crate::chain::normalize_address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::{Validate, ValidationError};

/// One redeemable secret in a (contract, offer) pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct FulfillmentCode {
    pub contract_address: String,
    pub offer_id: String,
    pub url: String,
    pub code: String,
    pub token_id: Option<String>,
    pub claimed: bool,
    pub claimant_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Redemption decoded from chain data. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedemptionTransaction {
    pub contract_address: String,
    pub redeemer_address: String,
    pub token_id: String,
    pub offer_id: String,
    #[serde(skip)]
    pub pending: bool,
}

/// Parameters of one claim attempt against a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    pub contract_address: String,
    pub offer_id: String,
    pub token_id: String,
    pub claimant_address: String,
}

/// The redeemer claims; addresses are normalized to lowercase hex.
impl From<&RedemptionTransaction> for ClaimRequest {
    fn from(tx: &RedemptionTransaction) -> Self {
        ClaimRequest {
            contract_address: normalize_address(&tx.contract_address),
            offer_id: tx.offer_id.clone(),
            token_id: tx.token_id.clone(),
            claimant_address: normalize_address(&tx.redeemer_address),
        }
    }
}

/// Pool of codes to load for a (contract, offer).
#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct LoadRequest {
    #[validate(length(min = 1, message = "contract address is required"))]
    pub contract_address: String,
    #[validate(length(min = 1, message = "offer id is required"))]
    pub offer_id: String,
    #[validate(length(min = 1, message = "url is required"))]
    pub url: String,
    #[validate(
        length(min = 1, message = "at least one code is required"),
        custom = "no_blank_codes"
    )]
    pub codes: Vec<String>,
}

fn no_blank_codes(codes: &[String]) -> std::result::Result<(), ValidationError> {
    if codes.iter().any(|code| code.trim().is_empty()) {
        let mut err = ValidationError::new("blank_code");
        err.message = Some("codes must not be blank".into());
        return Err(err);
    }
    Ok(())
}

impl LoadRequest {
    /// Trims every field, lowercases the contract address and drops repeated codes.
    pub fn normalized(self) -> Self {
        let mut codes: Vec<String> = Vec::with_capacity(self.codes.len());
        for code in self.codes {
            let code = code.trim().to_string();
            if !codes.contains(&code) {
                codes.push(code);
            }
        }

        LoadRequest {
            contract_address: self.contract_address.trim().to_lowercase(),
            offer_id: self.offer_id.trim().to_string(),
            url: self.url.trim().to_string(),
            codes,
        }
    }
}

/// Body of `POST /load/{contract_addr}/{offer_id}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadBody {
    pub url: String,
    pub codes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub contract_address: String,
    pub offer_id: String,
    pub requested: usize,
    pub inserted: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillRequest {
    pub transaction_id: String,
    pub caller_address: String,
    pub network_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FulfillResult {
    pub url: String,
    pub code: String,
    pub transaction: RedemptionTransaction,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FulfillResponse {
    pub message: String,
    pub url: String,
    pub code: String,
    pub transaction: RedemptionTransaction,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoadResponse {
    pub message: String,
    pub contract_addr: String,
    pub offer_id: String,
    pub inserted: u64,
}
