use crate::config::{DatabaseConfig, SslMode};
use crate::errors::{FulfillmentError, Result};
use crate::models::{ClaimRequest, FulfillmentCode};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Partial unique index that keeps one code per token in a pool.
const TOKEN_CONSTRAINT: &str = "fulfillment_codes_token_key";

/// Persistence operations the claim and load flows rely on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FulfillmentStore: Send + Sync {
    /// Adds codes to a pool, skipping codes the pool already holds. Returns rows inserted.
    async fn insert_codes(
        &self,
        contract_address: &str,
        offer_id: &str,
        url: &str,
        codes: &[String],
    ) -> Result<u64>;

    /// The code already claimed for a token, if any.
    async fn find_claim(
        &self,
        contract_address: &str,
        offer_id: &str,
        token_id: &str,
    ) -> Result<Option<FulfillmentCode>>;

    /// Atomically claims one unclaimed code. `None` when nothing could be claimed.
    async fn claim_next(&self, request: &ClaimRequest) -> Result<Option<FulfillmentCode>>;

    /// Codes in the pool that could still be claimed.
    async fn count_unclaimed(&self, contract_address: &str, offer_id: &str) -> Result<i64>;

    /// Marks every other unclaimed copy of a secret claimed. Returns the contracts touched.
    async fn mark_duplicates_claimed(&self, url: &str, code: &str) -> Result<Vec<String>>;

    async fn ping(&self) -> Result<()>;
}

mod statements {
    pub const INSERT_CODE: &str = r#"
        INSERT INTO fulfillment_codes (contract_address, offer_id, url, code)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (contract_address, offer_id, code) DO NOTHING
        "#;

    pub const FIND_CLAIM: &str = r#"
        SELECT contract_address, offer_id, url, code, token_id, claimed,
               claimant_address, created_at, updated_at
        FROM fulfillment_codes
        WHERE contract_address = $1 AND offer_id = $2 AND token_id = $3 AND claimed = TRUE
        "#;

    // A candidate whose secret is already claimed in another pool is skipped
    // even before the duplicate marking pass has reached it.
    pub const CLAIM_NEXT: &str = r#"
        UPDATE fulfillment_codes
        SET claimed = TRUE,
            token_id = $3,
            claimant_address = $4,
            updated_at = NOW()
        WHERE id = (
            SELECT f.id
            FROM fulfillment_codes f
            WHERE f.contract_address = $1
              AND f.offer_id = $2
              AND f.claimed = FALSE
              AND NOT EXISTS (
                  SELECT 1 FROM fulfillment_codes d
                  WHERE d.url = f.url AND d.code = f.code
                    AND d.claimed = TRUE AND d.id <> f.id
              )
            ORDER BY f.id
            LIMIT 1
            FOR UPDATE OF f SKIP LOCKED
        )
        AND claimed = FALSE
        RETURNING contract_address, offer_id, url, code, token_id, claimed,
                  claimant_address, created_at, updated_at
        "#;

    pub const COUNT_UNCLAIMED: &str = r#"
        SELECT COUNT(*)
        FROM fulfillment_codes f
        WHERE f.contract_address = $1
          AND f.offer_id = $2
          AND f.claimed = FALSE
          AND NOT EXISTS (
              SELECT 1 FROM fulfillment_codes d
              WHERE d.url = f.url AND d.code = f.code
                AND d.claimed = TRUE AND d.id <> f.id
          )
        "#;

    pub const MARK_DUPLICATES: &str = r#"
        UPDATE fulfillment_codes
        SET claimed = TRUE,
            updated_at = NOW()
        WHERE url = $1 AND code = $2 AND claimed = FALSE
        RETURNING contract_address
        "#;
}

pub struct Database {
    pool: PgPool,
}

impl Database {
    pub fn new(pool: PgPool) -> Self {
        Database { pool }
    }
}

fn is_token_conflict(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            db_err.is_unique_violation() && db_err.constraint() == Some(TOKEN_CONSTRAINT)
        }
        _ => false,
    }
}

#[async_trait]
impl FulfillmentStore for Database {
    async fn insert_codes(
        &self,
        contract_address: &str,
        offer_id: &str,
        url: &str,
        codes: &[String],
    ) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0u64;

        for code in codes {
            let result = sqlx::query(statements::INSERT_CODE)
                .bind(contract_address)
                .bind(offer_id)
                .bind(url)
                .bind(code)
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn find_claim(
        &self,
        contract_address: &str,
        offer_id: &str,
        token_id: &str,
    ) -> Result<Option<FulfillmentCode>> {
        let code = sqlx::query_as::<_, FulfillmentCode>(statements::FIND_CLAIM)
            .bind(contract_address)
            .bind(offer_id)
            .bind(token_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(code)
    }

    async fn claim_next(&self, request: &ClaimRequest) -> Result<Option<FulfillmentCode>> {
        let claimed = sqlx::query_as::<_, FulfillmentCode>(statements::CLAIM_NEXT)
            .bind(&request.contract_address)
            .bind(&request.offer_id)
            .bind(&request.token_id)
            .bind(&request.claimant_address)
            .fetch_optional(&self.pool)
            .await;

        match claimed {
            Ok(code) => Ok(code),
            // Another request claimed for the same token first.
            Err(e) if is_token_conflict(&e) => {
                debug!(
                    contract = %request.contract_address,
                    offer = %request.offer_id,
                    token = %request.token_id,
                    "lost claim race for token"
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn count_unclaimed(&self, contract_address: &str, offer_id: &str) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>(statements::COUNT_UNCLAIMED)
            .bind(contract_address)
            .bind(offer_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn mark_duplicates_claimed(&self, url: &str, code: &str) -> Result<Vec<String>> {
        let contracts = sqlx::query_scalar::<_, String>(statements::MARK_DUPLICATES)
            .bind(url)
            .bind(code)
            .fetch_all(&self.pool)
            .await?;

        Ok(contracts)
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

fn pg_ssl_mode(mode: SslMode) -> PgSslMode {
    match mode {
        SslMode::Disable => PgSslMode::Disable,
        SslMode::Prefer => PgSslMode::Prefer,
        SslMode::Require => PgSslMode::Require,
        SslMode::VerifyCa => PgSslMode::VerifyCa,
        SslMode::VerifyFull => PgSslMode::VerifyFull,
    }
}

fn existing_file<'a>(kind: &str, path: &'a str) -> Result<&'a str> {
    if !Path::new(path).is_file() {
        return Err(FulfillmentError::Config(format!(
            "database {} file {} does not exist",
            kind, path
        )));
    }
    Ok(path)
}

/// Connection options from the URL, with TLS settings from config layered on top.
pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions> {
    let mut options = PgConnectOptions::from_str(&config.url)
        .map_err(|e| FulfillmentError::Config(format!("invalid database url: {}", e)))?
        .ssl_mode(pg_ssl_mode(config.ssl_mode));

    if let Some(root_cert) = &config.ssl_root_cert {
        options = options.ssl_root_cert(existing_file("root certificate", root_cert)?);
    }
    if let Some(cert) = &config.ssl_cert {
        options = options.ssl_client_cert(existing_file("client certificate", cert)?);
    }
    if let Some(key) = &config.ssl_key {
        options = options.ssl_client_key(existing_file("client key", key)?);
    }

    Ok(options)
}

pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let options = connect_options(config)?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_millis(config.acquire_timeout_ms))
        .connect_with(options)
        .await?;

    info!(
        max_connections = config.max_connections,
        ssl_mode = ?config.ssl_mode,
        "connected to database"
    );
    Ok(pool)
}

pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| FulfillmentError::Internal(format!("migration failed: {}", e)))?;
    Ok(())
}
