use stockledger_auth::{Permission, Principal, Role};
use stockledger_core::OperatorId;

/// Authenticated caller of the current request.
///
/// Inserted by the auth middleware; every route group behind it can rely on
/// its presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn operator_id(&self) -> &OperatorId {
        &self.principal.operator_id
    }

    pub fn role(&self) -> Role {
        self.principal.role
    }

    pub fn permissions(&self) -> &[Permission] {
        &self.principal.permissions
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}

/// Correlation id of the current request (`x-request-id`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);
