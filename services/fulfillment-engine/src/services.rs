use crate::allocator::ClaimAllocator;
use crate::chain::TransactionResolver;
use crate::database::FulfillmentStore;
use crate::errors::{FulfillmentError, Result};
use crate::loader::Loader;
use crate::models::{FulfillRequest, FulfillResult, LoadOutcome, LoadRequest};
use std::sync::Arc;
use tracing::{info, warn};

pub struct FulfillmentService {
    resolver: Arc<dyn TransactionResolver>,
    store: Arc<dyn FulfillmentStore>,
    allocator: ClaimAllocator,
    loader: Loader,
    default_network: String,
}

impl FulfillmentService {
    pub fn new(
        resolver: Arc<dyn TransactionResolver>,
        store: Arc<dyn FulfillmentStore>,
        default_network: impl Into<String>,
    ) -> Self {
        FulfillmentService {
            allocator: ClaimAllocator::new(store.clone()),
            loader: Loader::new(store.clone()),
            resolver,
            store,
            default_network: default_network.into(),
        }
    }

    pub fn default_network(&self) -> &str {
        &self.default_network
    }

    /// Resolves the redemption behind a transaction and issues its code to the caller.
    pub async fn fulfill(&self, mut request: FulfillRequest) -> Result<FulfillResult> {
        request.transaction_id = request.transaction_id.trim().to_string();
        if request.transaction_id.is_empty() {
            return Err(FulfillmentError::InvalidInput(
                "transaction id is required".to_string(),
            ));
        }
        if request.network_id.trim().is_empty() {
            request.network_id = self.default_network.clone();
        }

        let transaction = self.resolver.resolve(&request).await?;
        // Resolvers report pending as an error; a pending result must never be allocated.
        if transaction.pending {
            warn!(tx = %request.transaction_id, "resolver returned a pending redemption");
            return Err(FulfillmentError::Pending(request.transaction_id));
        }

        let allocation = self
            .allocator
            .allocate(&transaction, &request.caller_address)
            .await?;

        info!(
            tx = %request.transaction_id,
            network = %request.network_id,
            contract = %transaction.contract_address,
            token = %transaction.token_id,
            replayed = allocation.replayed,
            "fulfilled redemption"
        );

        Ok(FulfillResult {
            url: allocation.code.url,
            code: allocation.code.code,
            transaction,
        })
    }

    pub async fn load(&self, request: LoadRequest) -> Result<LoadOutcome> {
        self.loader.load(request).await
    }

    pub fn available_networks(&self) -> Vec<String> {
        self.resolver.networks()
    }

    pub async fn health(&self) -> Result<()> {
        self.store.ping().await
    }
}
