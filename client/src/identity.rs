//! Google identity provider backed by tokens obtained out of band.
//!
//! A terminal cannot host Google's browser sign-in, so the user supplies the
//! Google ID token (and optionally the access token) on the command line.
//! [`IdTokenProvider`] reads the profile claims from the token payload and
//! hands the tokens to the account gateway, which performs the real
//! verification when it exchanges them with Firebase.

use std::sync::Mutex;

use async_trait::async_trait;
use base64::prelude::*;
use serde::Deserialize;
use tracing::debug;

use guuber_core::{FederatedCredential, FederatedIdentityProvider, ProviderError};

/// Profile claims read from a Google ID token.
#[derive(Debug, Default, Deserialize)]
struct IdTokenClaims {
    #[serde(default)]
    given_name: String,
    #[serde(default)]
    family_name: String,
    #[serde(default)]
    email: String,
}

/// Tokens supplied by the user for one sign-in.
struct Tokens {
    id_token: String,
    access_token: Option<String>,
}

/// Identity provider that presents a pre-issued Google ID token.
pub struct IdTokenProvider {
    tokens: Mutex<Option<Tokens>>,
}

impl IdTokenProvider {
    pub fn new(id_token: impl Into<String>, access_token: Option<String>) -> Self {
        Self {
            tokens: Mutex::new(Some(Tokens {
                id_token: id_token.into(),
                access_token,
            })),
        }
    }
}

/// Decodes the payload segment of a JWT without verifying its signature.
fn decode_claims(id_token: &str) -> Result<IdTokenClaims, ProviderError> {
    let payload = id_token
        .split('.')
        .nth(1)
        .filter(|segment| !segment.is_empty())
        .ok_or_else(|| ProviderError::new("ID token is not a JWT"))?;

    let bytes = BASE64_URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| ProviderError::new(format!("ID token payload is not base64: {e}")))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| ProviderError::new(format!("ID token payload is not valid JSON: {e}")))
}

#[async_trait]
impl FederatedIdentityProvider for IdTokenProvider {
    async fn present_sign_in(&self) -> Result<FederatedCredential, ProviderError> {
        let (id_token, access_token) = {
            let guard = self
                .tokens
                .lock()
                .map_err(|_| ProviderError::new("token store is unavailable"))?;
            match guard.as_ref() {
                Some(tokens) if !tokens.id_token.trim().is_empty() => {
                    (tokens.id_token.clone(), tokens.access_token.clone())
                }
                _ => return Err(ProviderError::new("No ID token found")),
            }
        };

        let claims = decode_claims(&id_token)?;
        debug!(email = %claims.email, "Read Google ID token claims");

        Ok(FederatedCredential {
            id_token,
            access_token,
            given_name: claims.given_name,
            family_name: claims.family_name,
            email: claims.email,
        })
    }

    async fn sign_out(&self) {
        if let Ok(mut tokens) = self.tokens.lock() {
            tokens.take();
        }
    }
}

impl std::fmt::Debug for IdTokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdTokenProvider").finish_non_exhaustive()
    }
}
