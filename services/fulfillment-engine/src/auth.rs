use crate::chain::{is_hex_address, normalize_address};
use crate::errors::FulfillmentError;
use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::future::{ready, Ready};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Wallet address of the caller; `sub` is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addr: Option<String>,
    pub exp: usize,
}

/// Checks HS256 bearer tokens and extracts the caller's wallet address.
#[derive(Clone)]
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        JwtVerifier {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    pub fn verify(&self, token: &str) -> Result<Claims, FulfillmentError> {
        decode::<Claims>(token, &self.key, &self.validation)
            .map(|data| data.claims)
            .map_err(|err| {
                tracing::warn!("JWT validation failed: {:?}", err);
                FulfillmentError::Unauthorized("Invalid or expired token".to_string())
            })
    }

    /// Lowercase caller address from an `Authorization` header value.
    pub fn caller_address(&self, authorization: Option<&str>) -> Result<String, FulfillmentError> {
        let value = authorization.ok_or_else(|| {
            FulfillmentError::Unauthorized("Missing Authorization header".to_string())
        })?;
        let mut parts = value.split_whitespace();
        let token = match (parts.next(), parts.next(), parts.next()) {
            (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => token,
            _ => {
                return Err(FulfillmentError::Unauthorized(
                    "Invalid auth header format".to_string(),
                ))
            }
        };

        let claims = self.verify(token)?;
        let address = claims.addr.unwrap_or(claims.sub);
        if !is_hex_address(address.trim()) {
            return Err(FulfillmentError::Unauthorized(
                "Token does not identify a wallet address".to_string(),
            ));
        }
        Ok(normalize_address(&address))
    }
}

/// Caller wallet address, verified from the request's bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedCaller(pub String);

impl FromRequest for AuthenticatedCaller {
    type Error = FulfillmentError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let Some(verifier) = req.app_data::<web::Data<JwtVerifier>>() else {
            return ready(Err(FulfillmentError::Internal(
                "JWT verifier is not configured".to_string(),
            )));
        };

        let authorization = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        ready(
            verifier
                .caller_address(authorization)
                .map(AuthenticatedCaller),
        )
    }
}
