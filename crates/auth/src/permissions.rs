use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "stock.dispense").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const PRODUCTS_READ: Permission = Permission(Cow::Borrowed("products.read"));
    pub const PRODUCTS_WRITE: Permission = Permission(Cow::Borrowed("products.write"));
    pub const STOCK_RECEIVE: Permission = Permission(Cow::Borrowed("stock.receive"));
    pub const STOCK_DISPENSE: Permission = Permission(Cow::Borrowed("stock.dispense"));
    pub const LEDGER_READ: Permission = Permission(Cow::Borrowed("ledger.read"));
    pub const REPORTS_READ: Permission = Permission(Cow::Borrowed("reports.read"));

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Static grant table.
    pub fn granted_to(role: Role) -> Vec<Permission> {
        match role {
            Role::Operator => vec![
                Self::PRODUCTS_READ,
                Self::PRODUCTS_WRITE,
                Self::STOCK_RECEIVE,
                Self::STOCK_DISPENSE,
                Self::LEDGER_READ,
            ],
            Role::Admin => vec![Self::PRODUCTS_READ, Self::REPORTS_READ, Self::LEDGER_READ],
            Role::User => vec![Self::PRODUCTS_READ],
        }
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}
