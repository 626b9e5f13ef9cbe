//! Process configuration for the API binary.

use std::net::SocketAddr;

use thiserror::Error;

use stockledger_auth::{Role, RoleKeys};
use stockledger_infra::{ConfigError, LedgerConfig};
use stockledger_observability::LogFormat;

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("BIND_ADDR is not a socket address: {0:?}")]
    BindAddr(String),

    #[error("LOG_FORMAT: {0}")]
    LogFormat(String),

    #[error(transparent)]
    Ledger(#[from] ConfigError),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub log_format: LogFormat,
    pub keys: RoleKeys,
    /// Roles whose secret was missing and fell back to an insecure dev value.
    pub insecure_roles: Vec<Role>,
    pub ledger: LedgerConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppConfigError> {
        let raw_addr = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = raw_addr
            .parse()
            .map_err(|_| AppConfigError::BindAddr(raw_addr.clone()))?;

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse().map_err(AppConfigError::LogFormat)?,
            None => LogFormat::default(),
        };

        let mut keys = RoleKeys::new();
        let mut insecure_roles = Vec::new();
        for role in Role::ALL {
            match lookup(secret_var(role)).filter(|s| !s.is_empty()) {
                Some(secret) => keys.insert(role, secret),
                None => {
                    keys.insert(role, format!("dev-secret-{role}"));
                    insecure_roles.push(role);
                }
            }
        }

        Ok(Self {
            bind_addr,
            log_format,
            keys,
            insecure_roles,
            ledger: LedgerConfig::from_lookup(&lookup)?,
        })
    }
}

/// Environment variable holding the signing secret of `role`.
pub fn secret_var(role: Role) -> &'static str {
    match role {
        Role::User => "JWT_SECRET",
        Role::Operator => "JWT_SECRET_OPERATOR",
        Role::Admin => "JWT_SECRET_ADMIN",
    }
}
