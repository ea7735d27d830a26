//! Staff identities, tenancy scopes and the grants the engine requires.
//!
//! Authorization is proven by possession of a grant. The caller resolves who
//! is acting and in which business or shop before touching the ledger; the
//! engine only ever receives one of the grant types below and never looks up
//! or provisions staff records itself.

use super::ids::{ActorId, BusinessId, ShopId};
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SuperAdmin,
    BusinessAdmin,
    ShopAdmin,
    Collector,
    Accountant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: ActorId,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub business_id: Option<BusinessId>,
    #[serde(default)]
    pub shop_id: Option<ShopId>,
}

/// The tenancy slice an operation is allowed to see.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Scope {
    Business(BusinessId),
    Shop {
        business_id: BusinessId,
        shop_id: ShopId,
    },
}

impl Scope {
    pub fn business_id(&self) -> &BusinessId {
        match self {
            Scope::Business(business_id) => business_id,
            Scope::Shop { business_id, .. } => business_id,
        }
    }

    pub fn contains(&self, business_id: &BusinessId, shop_id: &ShopId) -> bool {
        match self {
            Scope::Business(own) => own == business_id,
            Scope::Shop {
                business_id: own_business,
                shop_id: own_shop,
            } => own_business == business_id && own_shop == shop_id,
        }
    }
}

/// Proof that the actor may record pending wallet transactions in `scope`.
#[derive(Debug, Clone)]
pub struct StaffGrant {
    pub actor: Actor,
    pub scope: Scope,
}

/// Proof that the actor may confirm or reject pending transactions in `scope`.
#[derive(Debug, Clone)]
pub struct ConfirmGrant {
    pub actor: Actor,
    pub scope: Scope,
}

/// Proof that the actor may adjust balances directly and bulk-confirm in `scope`.
#[derive(Debug, Clone)]
pub struct AdminGrant {
    pub actor: Actor,
    pub scope: Scope,
}

impl From<&AdminGrant> for ConfirmGrant {
    fn from(grant: &AdminGrant) -> Self {
        Self {
            actor: grant.actor.clone(),
            scope: grant.scope.clone(),
        }
    }
}

impl Actor {
    pub fn staff_grant(&self, scope: Scope) -> Result<StaffGrant, LedgerError> {
        let allowed = matches!(
            self.role,
            Role::SuperAdmin | Role::BusinessAdmin | Role::ShopAdmin | Role::Collector
        );
        self.check(allowed, &scope)?;
        Ok(StaffGrant {
            actor: self.clone(),
            scope,
        })
    }

    pub fn confirm_grant(&self, scope: Scope) -> Result<ConfirmGrant, LedgerError> {
        let allowed = matches!(
            self.role,
            Role::SuperAdmin | Role::BusinessAdmin | Role::ShopAdmin
        );
        self.check(allowed, &scope)?;
        Ok(ConfirmGrant {
            actor: self.clone(),
            scope,
        })
    }

    pub fn admin_grant(&self, scope: Scope) -> Result<AdminGrant, LedgerError> {
        let allowed = matches!(self.role, Role::SuperAdmin | Role::BusinessAdmin);
        self.check(allowed, &scope)?;
        Ok(AdminGrant {
            actor: self.clone(),
            scope,
        })
    }

    /// A super-admin may act as any business. Everyone else is confined to
    /// their own business and, when bound to a shop, to that shop.
    fn check(&self, role_allowed: bool, scope: &Scope) -> Result<(), LedgerError> {
        if !role_allowed {
            return Err(LedgerError::AccessDenied);
        }
        if self.role == Role::SuperAdmin {
            return Ok(());
        }
        if self.business_id.as_ref() != Some(scope.business_id()) {
            return Err(LedgerError::AccessDenied);
        }
        match (&self.shop_id, scope) {
            (None, _) => Ok(()),
            (Some(own), Scope::Shop { shop_id, .. }) if own == shop_id => Ok(()),
            _ => Err(LedgerError::AccessDenied),
        }
    }
}
