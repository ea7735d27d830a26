use super::ids::{BusinessId, CustomerId, ShopId};
use super::money::Balance;
use crate::error::Result;
use serde::{Deserialize, Serialize};

/// A shop's customer and their stored wallet.
///
/// `wallet_balance` is only ever moved through confirmed wallet transactions,
/// so it equals the sum of the signed amounts of those transactions.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Customer {
    pub id: CustomerId,
    pub business_id: BusinessId,
    pub shop_id: ShopId,
    pub name: String,
    #[serde(default)]
    pub wallet_balance: Balance,
}

impl Customer {
    pub fn new(id: CustomerId, business_id: BusinessId, shop_id: ShopId, name: &str) -> Self {
        Self {
            id,
            business_id,
            shop_id,
            name: name.to_string(),
            wallet_balance: Balance::ZERO,
        }
    }

    /// Applies a signed delta and returns the balance it replaced. A delta
    /// that would overflow the balance leaves the wallet unchanged.
    pub fn apply(&mut self, delta: Balance) -> Result<Balance> {
        let before = self.wallet_balance;
        self.wallet_balance = before.checked_add(delta)?;
        Ok(before)
    }
}
