use crate::database::FulfillmentStore;
use crate::errors::Result;
use crate::metrics::CODES_LOADED;
use crate::models::{LoadOutcome, LoadRequest};
use std::sync::Arc;
use tracing::info;
use validator::Validate;

/// Fills redemption pools with secrets.
pub struct Loader {
    store: Arc<dyn FulfillmentStore>,
}

impl Loader {
    pub fn new(store: Arc<dyn FulfillmentStore>) -> Self {
        Loader { store }
    }

    /// Inserts the request's codes as unclaimed rows. Reloading a code the pool
    /// already holds leaves the existing row untouched.
    pub async fn load(&self, request: LoadRequest) -> Result<LoadOutcome> {
        let request = request.normalized();
        request.validate()?;

        let inserted = self
            .store
            .insert_codes(
                &request.contract_address,
                &request.offer_id,
                &request.url,
                &request.codes,
            )
            .await?;
        CODES_LOADED.inc_by(inserted);

        info!(
            contract = %request.contract_address,
            offer = %request.offer_id,
            requested = request.codes.len(),
            inserted,
            "loaded redemption codes"
        );

        Ok(LoadOutcome {
            contract_address: request.contract_address,
            offer_id: request.offer_id,
            requested: request.codes.len(),
            inserted,
        })
    }
}
