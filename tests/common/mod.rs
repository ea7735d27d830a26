#![allow(dead_code)]

use chrono::{Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::io::Write;
use std::sync::Arc;
use tempfile::NamedTempFile;
use wallet_ledger::application::config::EngineConfig;
use wallet_ledger::application::engine::LedgerEngine;
use wallet_ledger::domain::actor::{Actor, AdminGrant, ConfirmGrant, Role, Scope, StaffGrant};
use wallet_ledger::domain::customer::Customer;
use wallet_ledger::domain::ids::TransactionId;
use wallet_ledger::domain::money::Amount;
use wallet_ledger::domain::ports::LedgerStore;
use wallet_ledger::domain::purchase::{Purchase, PurchaseType};
use wallet_ledger::domain::transaction::{NewWalletTransaction, TransactionType};
use wallet_ledger::infrastructure::audit::InMemoryAuditLog;
use wallet_ledger::infrastructure::in_memory::InMemoryLedgerStore;
use wallet_ledger::infrastructure::numbering::UuidDocumentNumbering;

pub const BUSINESS: &str = "b1";
pub const SHOP: &str = "s1";

/// An engine over a fresh in-memory store, with handles to inspect both the
/// store and the audit trail afterwards.
pub struct Harness {
    pub engine: Arc<LedgerEngine>,
    pub store: InMemoryLedgerStore,
    pub audit: InMemoryAuditLog,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = InMemoryLedgerStore::new();
        let audit = InMemoryAuditLog::new();
        let engine = LedgerEngine::new(
            Box::new(store.clone()),
            Box::new(audit.clone()),
            Box::new(UuidDocumentNumbering::from_config(&config)),
            config,
        );
        Self {
            engine: Arc::new(engine),
            store,
            audit,
        }
    }

    pub async fn add_customer(&self, id: &str) -> Customer {
        let customer = Customer::new(id.into(), BUSINESS.into(), SHOP.into(), "Ama Owusu");
        let mut uow = self.store.begin().await.unwrap();
        uow.upsert_customer(&customer).await.unwrap();
        uow.commit().await.unwrap();
        customer
    }

    /// Stores an active purchase owed by `customer`, due `days` from a fixed date.
    pub async fn add_purchase(
        &self,
        customer: &Customer,
        id: &str,
        purchase_type: PurchaseType,
        outstanding: Decimal,
        days: i64,
    ) -> Purchase {
        let purchase = Purchase::new(
            id.into(),
            customer,
            purchase_type,
            outstanding,
            due(days),
        );
        self.save(&purchase).await;
        purchase
    }

    pub async fn save(&self, purchase: &Purchase) {
        let mut uow = self.store.begin().await.unwrap();
        uow.save_purchase(purchase).await.unwrap();
        uow.commit().await.unwrap();
    }

    pub async fn set_stock(&self, product: &str, qty: i64) {
        let mut uow = self.store.begin().await.unwrap();
        uow.set_stock_level(&SHOP.into(), &product.into(), qty)
            .await
            .unwrap();
        uow.commit().await.unwrap();
    }

    pub async fn balance(&self, customer: &str) -> Decimal {
        self.store
            .customer(&customer.into())
            .await
            .unwrap()
            .unwrap()
            .wallet_balance
            .value()
    }

    pub async fn purchase(&self, id: &str) -> Purchase {
        self.store.purchase(&id.into()).await.unwrap().unwrap()
    }

    /// Submits a pending entry as the shop's collector.
    pub async fn submit(
        &self,
        customer: &str,
        r#type: TransactionType,
        amount: Decimal,
    ) -> TransactionId {
        let request = NewWalletTransaction {
            customer_id: customer.into(),
            r#type,
            amount: Amount::new(amount).unwrap(),
            reference: None,
            description: None,
        };
        self.engine
            .submit(&staff_grant(), request)
            .await
            .unwrap()
            .id
    }
}

pub fn due(days: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 1, 1).unwrap() + Duration::days(days)
}

pub fn shop_scope() -> Scope {
    Scope::Shop {
        business_id: BUSINESS.into(),
        shop_id: SHOP.into(),
    }
}

pub fn collector() -> Actor {
    Actor {
        id: "col-1".into(),
        name: "Kofi Mensah".to_string(),
        role: Role::Collector,
        business_id: Some(BUSINESS.into()),
        shop_id: Some(SHOP.into()),
    }
}

pub fn admin() -> Actor {
    Actor {
        id: "admin-1".into(),
        name: "Efua Boateng".to_string(),
        role: Role::BusinessAdmin,
        business_id: Some(BUSINESS.into()),
        shop_id: None,
    }
}

pub fn staff_grant() -> StaffGrant {
    collector().staff_grant(shop_scope()).unwrap()
}

pub fn confirm_grant() -> ConfirmGrant {
    admin().confirm_grant(shop_scope()).unwrap()
}

pub fn admin_grant() -> AdminGrant {
    admin()
        .admin_grant(Scope::Business(BUSINESS.into()))
        .unwrap()
}

/// Writes `lines` to a temp file and keeps it alive for the caller.
pub fn temp_file(lines: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    for line in lines {
        writeln!(file, "{}", line).unwrap();
    }
    file
}

/// A seed with one business admin, one collector, customers `c1` and `c2`
/// in shop `s1`, and the purchases given as `(id, customer, type, total, due)`.
pub fn seed_json(purchases: &[(&str, &str, &str, &str, &str)]) -> String {
    let purchases: Vec<serde_json::Value> = purchases
        .iter()
        .enumerate()
        .map(|(i, (id, customer, kind, total, due))| {
            serde_json::json!({
                "id": id,
                "customer_id": customer,
                "business_id": BUSINESS,
                "shop_id": SHOP,
                "purchase_type": kind,
                "status": "ACTIVE",
                "total_amount": total,
                "due_date": due,
                "created_at": (Utc::now() + Duration::milliseconds(i as i64)).to_rfc3339(),
                "items": [ { "product_id": "tv", "quantity": 1 } ]
            })
        })
        .collect();
    serde_json::json!({
        "customers": [
            { "id": "c1", "business_id": BUSINESS, "shop_id": SHOP, "name": "Ama" },
            { "id": "c2", "business_id": BUSINESS, "shop_id": SHOP, "name": "Yaw" }
        ],
        "purchases": purchases,
        "stock": [ { "shop_id": SHOP, "product_id": "tv", "quantity": 5 } ],
        "actors": [
            { "id": "col-1", "name": "Kofi Mensah", "role": "COLLECTOR", "business_id": BUSINESS, "shop_id": SHOP },
            { "id": "admin-1", "name": "Efua Boateng", "role": "BUSINESS_ADMIN", "business_id": BUSINESS }
        ]
    })
    .to_string()
}

pub fn seed_file(purchases: &[(&str, &str, &str, &str, &str)]) -> NamedTempFile {
    temp_file(&[&seed_json(purchases)])
}
