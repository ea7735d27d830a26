//! Initial ledger state for a replay run.

use crate::domain::actor::Actor;
use crate::domain::customer::Customer;
use crate::domain::ids::{ActorId, ProductId, ShopId};
use crate::domain::money::Balance;
use crate::domain::ports::{LedgerStore, UnitOfWork};
use crate::domain::purchase::Purchase;
use crate::domain::transaction::{
    NewWalletTransaction, StaffRef, TransactionType, WalletTransaction,
};
use crate::error::{LedgerError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone)]
pub struct StockLevel {
    pub shop_id: ShopId,
    pub product_id: ProductId,
    pub quantity: i64,
}

/// Customers, purchases, stock and staff known before the first command.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Seed {
    #[serde(default)]
    pub customers: Vec<Customer>,
    #[serde(default)]
    pub purchases: Vec<Purchase>,
    #[serde(default)]
    pub stock: Vec<StockLevel>,
    #[serde(default)]
    pub actors: Vec<Actor>,
}

impl Seed {
    pub fn from_reader<R: Read>(source: R) -> Result<Self> {
        Ok(serde_json::from_reader(source)?)
    }

    /// Writes the seed into `store` in a single unit of work.
    ///
    /// Records that already exist are left alone, so a persistent store can be
    /// reopened with the same seed. A customer's seeded `wallet_balance` is
    /// booked as a confirmed opening adjustment rather than written directly.
    /// Every purchase must belong to a known customer and sit in that
    /// customer's shop. Outstanding balances are recomputed from
    /// `total_amount` and `amount_paid`.
    pub async fn load(&self, store: &dyn LedgerStore) -> Result<()> {
        let mut uow = store.begin().await?;
        let mut skipped = 0;
        for customer in &self.customers {
            if uow.customer(&customer.id).await?.is_some() {
                skipped += 1;
                continue;
            }
            open_wallet(uow.as_mut(), customer).await?;
        }
        for purchase in &self.purchases {
            if uow.purchase(&purchase.id).await?.is_some() {
                skipped += 1;
                continue;
            }
            if purchase.total_amount < Decimal::ZERO || purchase.amount_paid < Decimal::ZERO {
                return Err(LedgerError::validation(format!(
                    "purchase {} carries a negative amount",
                    purchase.id
                )));
            }
            let owner = uow
                .customer(&purchase.customer_id)
                .await?
                .ok_or_else(|| LedgerError::not_found(format!("customer {}", purchase.customer_id)))?;
            if owner.business_id != purchase.business_id || owner.shop_id != purchase.shop_id {
                return Err(LedgerError::validation(format!(
                    "purchase {} is not in the shop of customer {}",
                    purchase.id, owner.id
                )));
            }
            let mut purchase = purchase.clone();
            purchase.recompute_outstanding();
            uow.save_purchase(&purchase).await?;
        }
        for level in &self.stock {
            if uow
                .stock_level(&level.shop_id, &level.product_id)
                .await?
                .is_some()
            {
                skipped += 1;
                continue;
            }
            uow.set_stock_level(&level.shop_id, &level.product_id, level.quantity)
                .await?;
        }
        uow.commit().await?;

        log::debug!(
            "seeded {} customer(s), {} purchase(s), {} stock row(s); {} already present",
            self.customers.len(),
            self.purchases.len(),
            self.stock.len(),
            skipped
        );
        Ok(())
    }
}

/// Stores `customer` with an empty wallet, then books any seeded balance as a
/// confirmed adjustment so the wallet still equals its confirmed entries.
async fn open_wallet(uow: &mut dyn UnitOfWork, customer: &Customer) -> Result<()> {
    let opening = customer.wallet_balance;
    let mut fresh = customer.clone();
    fresh.wallet_balance = Balance::ZERO;
    uow.upsert_customer(&fresh).await?;

    let Some(amount) = opening.to_amount().or_else(|| (-opening).to_amount()) else {
        return Ok(());
    };
    let change = uow.increment_wallet_balance(&fresh.id, opening).await?;
    let entry = WalletTransaction::confirmed(
        NewWalletTransaction {
            customer_id: fresh.id.clone(),
            r#type: TransactionType::Adjustment,
            amount,
            reference: Some("opening-balance".to_string()),
            description: Some("Opening wallet balance".to_string()),
        },
        fresh.business_id.clone(),
        fresh.shop_id.clone(),
        StaffRef {
            id: ActorId::from("seed"),
            name: "Seed import".to_string(),
        },
        change,
        Utc::now(),
    )?;
    uow.insert_transaction(&entry).await?;
    log::debug!("customer {} opened with wallet {}", fresh.id, opening);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Balance;
    use crate::domain::purchase::PurchaseStatus;
    use crate::infrastructure::in_memory::InMemoryLedgerStore;
    use rust_decimal_macros::dec;

    const SEED: &str = r#"{
        "customers": [
            { "id": "c1", "business_id": "b1", "shop_id": "s1", "name": "Ama" }
        ],
        "purchases": [
            {
                "id": "p1", "customer_id": "c1", "business_id": "b1", "shop_id": "s1",
                "purchase_type": "CREDIT", "status": "ACTIVE",
                "total_amount": "100", "amount_paid": "40", "due_date": "2026-03-01",
                "items": [ { "product_id": "tv", "quantity": 1 } ]
            }
        ],
        "stock": [ { "shop_id": "s1", "product_id": "tv", "quantity": 3 } ],
        "actors": [ { "id": "admin-1", "name": "Efua", "role": "BUSINESS_ADMIN", "business_id": "b1" } ]
    }"#;

    #[tokio::test]
    async fn test_seed_loads_and_recomputes_outstanding() {
        let seed = Seed::from_reader(SEED.as_bytes()).unwrap();
        assert_eq!(seed.actors.len(), 1);

        let store = InMemoryLedgerStore::new();
        seed.load(&store).await.unwrap();

        let purchase = store.purchase(&"p1".into()).await.unwrap().unwrap();
        assert_eq!(purchase.outstanding_balance, dec!(60));
        assert_eq!(purchase.status, PurchaseStatus::Active);
        assert_eq!(
            store.stock_level(&"s1".into(), &"tv".into()).await.unwrap(),
            Some(3)
        );
    }

    #[tokio::test]
    async fn test_reloading_seed_keeps_existing_records() {
        let seed = Seed::from_reader(SEED.as_bytes()).unwrap();
        let store = InMemoryLedgerStore::new();
        seed.load(&store).await.unwrap();

        let mut uow = store.begin().await.unwrap();
        uow.increment_wallet_balance(&"c1".into(), Balance::new(dec!(15)))
            .await
            .unwrap();
        uow.decrement_stock(&"s1".into(), &"tv".into(), 1).await.unwrap();
        uow.commit().await.unwrap();

        seed.load(&store).await.unwrap();
        let customer = store.customer(&"c1".into()).await.unwrap().unwrap();
        assert_eq!(customer.wallet_balance, Balance::new(dec!(15)));
        assert_eq!(
            store.stock_level(&"s1".into(), &"tv".into()).await.unwrap(),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_seeded_wallet_balance_is_booked_as_opening_entry() {
        use crate::domain::transaction::{Direction, TransactionStatus};

        let json = r#"{
            "customers": [
                { "id": "c1", "business_id": "b1", "shop_id": "s1", "name": "Ama", "wallet_balance": "500" },
                { "id": "c2", "business_id": "b1", "shop_id": "s1", "name": "Yaw", "wallet_balance": "-20.5" }
            ]
        }"#;
        let seed = Seed::from_reader(json.as_bytes()).unwrap();
        let store = InMemoryLedgerStore::new();
        seed.load(&store).await.unwrap();
        // Reloading must not book the opening balance twice.
        seed.load(&store).await.unwrap();

        for (id, expected) in [("c1", dec!(500)), ("c2", dec!(-20.5))] {
            let customer = store.customer(&id.into()).await.unwrap().unwrap();
            assert_eq!(customer.wallet_balance, Balance::new(expected));

            let entries = store.transactions_for_customer(&id.into()).await.unwrap();
            assert_eq!(entries.len(), 1);
            let opening = &entries[0];
            assert_eq!(opening.r#type, TransactionType::Adjustment);
            assert_eq!(opening.status, TransactionStatus::Confirmed);
            assert_eq!(opening.balance_before, Some(Balance::ZERO));
            assert_eq!(opening.signed_amount(), Balance::new(expected));
        }
        let debt = store.transactions_for_customer(&"c2".into()).await.unwrap();
        assert_eq!(debt[0].direction, Direction::Debit);
    }

    #[tokio::test]
    async fn test_seed_rejects_negative_purchase_amounts() {
        let json = SEED.replace("\"amount_paid\": \"40\"", "\"amount_paid\": \"-40\"");
        let seed = Seed::from_reader(json.as_bytes()).unwrap();
        let store = InMemoryLedgerStore::new();

        let result = seed.load(&store).await;
        assert!(matches!(result, Err(LedgerError::ValidationError(_))));
    }

    #[tokio::test]
    async fn test_seed_rejects_purchase_for_unknown_customer() {
        let json = SEED.replace("\"customer_id\": \"c1\"", "\"customer_id\": \"c9\"");
        let seed = Seed::from_reader(json.as_bytes()).unwrap();
        let store = InMemoryLedgerStore::new();

        let result = seed.load(&store).await;
        assert!(matches!(result, Err(LedgerError::NotFound(_))));
        assert!(store.customer(&"c1".into()).await.unwrap().is_none());
    }
}
