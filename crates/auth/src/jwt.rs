//! HS256 token verification with one signing secret per role.
//!
//! The route being served declares the role it requires, and that role alone
//! selects the verification key. A token's `kid` header is never used to pick
//! a key; when present it must name the same role as the route.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use thiserror::Error;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};
use crate::Role;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("no signing key configured for role '{0}'")]
    MissingKey(Role),

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("token verification failed: {0}")]
    InvalidSignature(String),

    #[error("token issued for '{presented}', route requires '{required}'")]
    RoleMismatch { required: Role, presented: String },

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Explicit role → signing secret map.
#[derive(Clone, Default)]
pub struct RoleKeys {
    secrets: HashMap<Role, Vec<u8>>,
}

impl RoleKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `secret` for `role`. Empty secrets are ignored so an unset
    /// role stays unusable instead of accepting tokens signed with "".
    pub fn with(mut self, role: Role, secret: impl Into<Vec<u8>>) -> Self {
        self.insert(role, secret);
        self
    }

    pub fn insert(&mut self, role: Role, secret: impl Into<Vec<u8>>) {
        let secret = secret.into();
        if !secret.is_empty() {
            self.secrets.insert(role, secret);
        }
    }

    pub fn contains(&self, role: Role) -> bool {
        self.secrets.contains_key(&role)
    }

    fn decoding_key(&self, role: Role) -> Option<DecodingKey> {
        self.secrets
            .get(&role)
            .map(|secret| DecodingKey::from_secret(secret))
    }
}

impl core::fmt::Debug for RoleKeys {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut roles: Vec<Role> = self.secrets.keys().copied().collect();
        roles.sort();
        f.debug_struct("RoleKeys").field("roles", &roles).finish()
    }
}

/// Verify a bearer token for a route that requires `required`.
pub trait JwtValidator: Send + Sync {
    fn validate(
        &self,
        token: &str,
        required: Role,
        now: DateTime<Utc>,
    ) -> Result<JwtClaims, AuthError>;
}

#[derive(Debug, Clone)]
pub struct Hs256JwtValidator {
    keys: RoleKeys,
}

impl Hs256JwtValidator {
    pub fn new(keys: RoleKeys) -> Self {
        Self { keys }
    }

    fn validation() -> Validation {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked against the caller's clock in `validate_claims`.
        validation.validate_exp = false;
        validation.required_spec_claims =
            HashSet::from(["exp".to_string(), "sub".to_string()]);
        validation
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(
        &self,
        token: &str,
        required: Role,
        now: DateTime<Utc>,
    ) -> Result<JwtClaims, AuthError> {
        let key = self
            .keys
            .decoding_key(required)
            .ok_or(AuthError::MissingKey(required))?;

        let header = decode_header(token).map_err(|e| AuthError::Malformed(e.to_string()))?;
        if header.alg != Algorithm::HS256 {
            return Err(AuthError::Malformed(format!(
                "unsupported algorithm {:?}",
                header.alg
            )));
        }

        let claims = decode::<JwtClaims>(token, &key, &Self::validation())
            .map_err(|e| AuthError::InvalidSignature(e.to_string()))?
            .claims;

        // Only trusted after the signature checked out under the route's key.
        if let Some(kid) = header.kid.as_deref() {
            if kid != required.as_str() {
                return Err(AuthError::RoleMismatch {
                    required,
                    presented: kid.to_string(),
                });
            }
        }
        if claims.role != required {
            return Err(AuthError::RoleMismatch {
                required,
                presented: claims.role.to_string(),
            });
        }

        validate_claims(&claims, now)?;
        Ok(claims)
    }
}
