//! Auth state and token-signing configuration.

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};

use crate::store::Stores;
use crate::token::{self, AccessClaims, Keyring};

const DEFAULT_ACCESS_TTL_SECONDS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECONDS: i64 = 30 * 24 * 60 * 60;
const DEFAULT_KID: &str = "k1";

#[derive(Clone, Debug)]
pub struct AuthConfig {
    issuer: String,
    audience: String,
    kid: String,
    signing_key: SecretString,
    access_ttl_seconds: i64,
    refresh_ttl_seconds: i64,
}

impl AuthConfig {
    #[must_use]
    pub fn new(issuer: String, audience: String, signing_key: SecretString) -> Self {
        Self {
            issuer,
            audience,
            kid: DEFAULT_KID.to_string(),
            signing_key,
            access_ttl_seconds: DEFAULT_ACCESS_TTL_SECONDS,
            refresh_ttl_seconds: DEFAULT_REFRESH_TTL_SECONDS,
        }
    }

    #[must_use]
    pub fn with_kid(mut self, kid: String) -> Self {
        self.kid = kid;
        self
    }

    #[must_use]
    pub fn with_access_ttl_seconds(mut self, seconds: i64) -> Self {
        self.access_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn with_refresh_ttl_seconds(mut self, seconds: i64) -> Self {
        self.refresh_ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    #[must_use]
    pub fn audience(&self) -> &str {
        &self.audience
    }

    #[must_use]
    pub fn kid(&self) -> &str {
        &self.kid
    }

    pub(super) fn access_ttl_seconds(&self) -> i64 {
        self.access_ttl_seconds
    }

    pub(super) fn refresh_ttl_seconds(&self) -> i64 {
        self.refresh_ttl_seconds
    }
}

pub struct AuthState {
    config: AuthConfig,
    stores: Stores,
    keyring: Keyring,
}

impl AuthState {
    /// Builds the shared auth state, deriving the verification keyring
    /// from the configured signing key.
    pub fn new(config: AuthConfig, stores: Stores) -> Result<Self, token::Error> {
        let keyring = Keyring::from_rsa_private_key_pem_or_der(
            config.signing_key.expose_secret().as_bytes(),
            config.kid.clone(),
        )?;

        Ok(Self {
            config,
            stores,
            keyring,
        })
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub(crate) fn sign_access_claims(&self, claims: &AccessClaims) -> Result<String, token::Error> {
        token::sign_rs256(
            self.config.signing_key.expose_secret().as_bytes(),
            self.config.kid.clone(),
            claims,
        )
    }

    pub(crate) fn verify_access_token(&self, bearer: &str) -> Result<AccessClaims, token::Error> {
        token::verify_rs256(
            bearer,
            &self.keyring,
            &self.config.issuer,
            &self.config.audience,
            Utc::now().timestamp(),
        )
    }
}
