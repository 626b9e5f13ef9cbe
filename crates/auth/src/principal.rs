use serde::{Deserialize, Serialize};

use stockledger_core::{DomainError, OperatorId};

use crate::{JwtClaims, Permission, Role};

/// A verified caller.
///
/// Built only from claims that passed [`crate::JwtValidator::validate`]; the
/// subject becomes the operator recorded on ledger entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub operator_id: OperatorId,
    pub role: Role,
    pub permissions: Vec<Permission>,
}

impl Principal {
    pub fn from_claims(claims: &JwtClaims) -> Result<Self, DomainError> {
        Ok(Self {
            operator_id: OperatorId::parse(claims.sub.clone())?,
            role: claims.role,
            permissions: Permission::granted_to(claims.role),
        })
    }
}
