use super::customer::Customer;
use super::ids::{CustomerId, PaymentId, ProductId, PurchaseId, ShopId, TransactionId};
use super::money::Balance;
use super::purchase::Purchase;
use super::receipt::{Payment, ProgressInvoice, Waybill};
use super::transaction::{BalanceChange, TransactionStatus, WalletTransaction};
use crate::error::Result;
use async_trait::async_trait;

/// One atomic unit of ledger work.
///
/// Writes are staged until [`UnitOfWork::commit`]. Dropping the unit without
/// committing discards every one of them, so a failure anywhere inside a
/// confirmation leaves no partial state behind.
#[async_trait]
pub trait UnitOfWork: Send {
    async fn customer(&mut self, id: &CustomerId) -> Result<Option<Customer>>;
    async fn upsert_customer(&mut self, customer: &Customer) -> Result<()>;

    /// Adds `delta` to the stored wallet balance and reports both sides of the
    /// increment. The adapter is responsible for making this a true atomic
    /// increment with respect to every other unit of work.
    async fn increment_wallet_balance(
        &mut self,
        id: &CustomerId,
        delta: Balance,
    ) -> Result<BalanceChange>;

    async fn transaction(&mut self, id: TransactionId) -> Result<Option<WalletTransaction>>;
    async fn insert_transaction(&mut self, tx: &WalletTransaction) -> Result<()>;

    /// Compare-and-swap write: stores `tx` only if the stored copy is still in
    /// `expected` status. Returns `false` when another writer got there first.
    async fn transition_transaction(
        &mut self,
        tx: &WalletTransaction,
        expected: TransactionStatus,
    ) -> Result<bool>;

    /// Every entry for the customer, in creation order.
    async fn transactions_for_customer(
        &mut self,
        id: &CustomerId,
    ) -> Result<Vec<WalletTransaction>>;

    /// Pending entries whose creator's name matches `name` case-insensitively,
    /// in creation order.
    async fn pending_transactions_created_by(
        &mut self,
        name: &str,
    ) -> Result<Vec<WalletTransaction>>;

    async fn purchase(&mut self, id: &PurchaseId) -> Result<Option<Purchase>>;
    /// Every purchase of the customer, in creation order.
    async fn purchases_for_customer(&mut self, id: &CustomerId) -> Result<Vec<Purchase>>;
    async fn save_purchase(&mut self, purchase: &Purchase) -> Result<()>;

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()>;
    async fn payments_for_purchase(&mut self, id: &PurchaseId) -> Result<Vec<Payment>>;
    async fn insert_progress_invoice(&mut self, invoice: &ProgressInvoice) -> Result<()>;
    async fn progress_invoice_for_payment(
        &mut self,
        id: PaymentId,
    ) -> Result<Option<ProgressInvoice>>;

    async fn waybill_for_purchase(&mut self, id: &PurchaseId) -> Result<Option<Waybill>>;
    async fn insert_waybill(&mut self, waybill: &Waybill) -> Result<()>;

    async fn stock_level(&mut self, shop: &ShopId, product: &ProductId) -> Result<Option<i64>>;
    async fn set_stock_level(&mut self, shop: &ShopId, product: &ProductId, qty: i64)
    -> Result<()>;
    /// Decrements a stock row. Returns `false` if the shop does not stock the product.
    async fn decrement_stock(&mut self, shop: &ShopId, product: &ProductId, qty: u32)
    -> Result<bool>;

    async fn all_customers(&mut self) -> Result<Vec<Customer>>;

    async fn commit(self: Box<Self>) -> Result<()>;
}

/// A persistence backend able to hand out units of work.
///
/// The read helpers open a unit, read, and drop it; they are for observers
/// (reports, tests) and never write.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>>;

    async fn customer(&self, id: &CustomerId) -> Result<Option<Customer>> {
        self.begin().await?.customer(id).await
    }

    async fn transaction(&self, id: TransactionId) -> Result<Option<WalletTransaction>> {
        self.begin().await?.transaction(id).await
    }

    async fn transactions_for_customer(&self, id: &CustomerId) -> Result<Vec<WalletTransaction>> {
        self.begin().await?.transactions_for_customer(id).await
    }

    async fn purchase(&self, id: &PurchaseId) -> Result<Option<Purchase>> {
        self.begin().await?.purchase(id).await
    }

    async fn payments_for_purchase(&self, id: &PurchaseId) -> Result<Vec<Payment>> {
        self.begin().await?.payments_for_purchase(id).await
    }

    async fn progress_invoice_for_payment(&self, id: PaymentId) -> Result<Option<ProgressInvoice>> {
        self.begin().await?.progress_invoice_for_payment(id).await
    }

    async fn waybill_for_purchase(&self, id: &PurchaseId) -> Result<Option<Waybill>> {
        self.begin().await?.waybill_for_purchase(id).await
    }

    async fn stock_level(&self, shop: &ShopId, product: &ProductId) -> Result<Option<i64>> {
        self.begin().await?.stock_level(shop, product).await
    }

    async fn all_customers(&self) -> Result<Vec<Customer>> {
        self.begin().await?.all_customers().await
    }
}

pub type LedgerStoreBox = Box<dyn LedgerStore>;

/// Issues document numbers for waybills and receipts.
pub trait DocumentNumbering: Send + Sync {
    fn waybill_number(&self, purchase: &Purchase) -> String;
    fn invoice_number(&self, payment: &Payment) -> String;
}

pub type DocumentNumberingBox = Box<dyn DocumentNumbering>;
