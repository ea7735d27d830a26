use crate::domain::customer::Customer;
use crate::domain::ids::{CustomerId, PaymentId, ProductId, PurchaseId, ShopId, TransactionId};
use crate::domain::money::Balance;
use crate::domain::ports::{LedgerStore, UnitOfWork};
use crate::domain::purchase::Purchase;
use crate::domain::receipt::{Payment, ProgressInvoice, Waybill};
use crate::domain::transaction::{BalanceChange, TransactionStatus, WalletTransaction};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Rows kept in insertion order with a key index for point lookups.
#[derive(Debug, Clone)]
struct Table<K, V> {
    rows: Vec<V>,
    index: HashMap<K, usize>,
}

impl<K, V> Default for Table<K, V> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash, V> Table<K, V> {
    fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&i| &self.rows[i])
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.index.get(key).map(|&i| &mut self.rows[i])
    }

    fn upsert(&mut self, key: K, value: V) {
        match self.index.get(&key) {
            Some(&i) => self.rows[i] = value,
            None => {
                self.index.insert(key, self.rows.len());
                self.rows.push(value);
            }
        }
    }

    fn rows(&self) -> impl Iterator<Item = &V> {
        self.rows.iter()
    }
}

#[derive(Debug, Default, Clone)]
struct LedgerState {
    customers: Table<CustomerId, Customer>,
    transactions: Table<TransactionId, WalletTransaction>,
    purchases: Table<PurchaseId, Purchase>,
    payments: Table<PaymentId, Payment>,
    invoices: Table<PaymentId, ProgressInvoice>,
    waybills: Table<PurchaseId, Waybill>,
    stock: HashMap<(ShopId, ProductId), i64>,
}

/// A thread-safe in-memory ledger store.
///
/// Each unit of work holds the store's lock for its whole lifetime and works
/// on a private copy of the state that replaces the shared state on commit.
/// Units therefore run one at a time (serializable isolation) and an
/// uncommitted unit leaves no trace. Ideal for tests and the CLI replay.
#[derive(Default, Clone)]
pub struct InMemoryLedgerStore {
    state: Arc<Mutex<LedgerState>>,
}

impl InMemoryLedgerStore {
    /// Creates a new, empty in-memory ledger store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(Box::new(InMemoryUnitOfWork { guard, staged }))
    }
}

struct InMemoryUnitOfWork {
    guard: OwnedMutexGuard<LedgerState>,
    staged: LedgerState,
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn customer(&mut self, id: &CustomerId) -> Result<Option<Customer>> {
        Ok(self.staged.customers.get(id).cloned())
    }

    async fn upsert_customer(&mut self, customer: &Customer) -> Result<()> {
        self.staged
            .customers
            .upsert(customer.id.clone(), customer.clone());
        Ok(())
    }

    async fn increment_wallet_balance(
        &mut self,
        id: &CustomerId,
        delta: Balance,
    ) -> Result<BalanceChange> {
        let customer = self
            .staged
            .customers
            .get_mut(id)
            .ok_or_else(|| LedgerError::not_found(format!("customer {}", id)))?;
        let before = customer.apply(delta)?;
        Ok(BalanceChange {
            before,
            after: customer.wallet_balance,
        })
    }

    async fn transaction(&mut self, id: TransactionId) -> Result<Option<WalletTransaction>> {
        Ok(self.staged.transactions.get(&id).cloned())
    }

    async fn insert_transaction(&mut self, tx: &WalletTransaction) -> Result<()> {
        if self.staged.transactions.get(&tx.id).is_some() {
            return Err(LedgerError::Conflict);
        }
        self.staged.transactions.upsert(tx.id, tx.clone());
        Ok(())
    }

    async fn transition_transaction(
        &mut self,
        tx: &WalletTransaction,
        expected: TransactionStatus,
    ) -> Result<bool> {
        let stored = self
            .staged
            .transactions
            .get_mut(&tx.id)
            .ok_or_else(|| LedgerError::not_found(format!("wallet transaction {}", tx.id)))?;
        if stored.status != expected {
            return Ok(false);
        }
        *stored = tx.clone();
        Ok(true)
    }

    async fn transactions_for_customer(
        &mut self,
        id: &CustomerId,
    ) -> Result<Vec<WalletTransaction>> {
        Ok(self
            .staged
            .transactions
            .rows()
            .filter(|tx| &tx.customer_id == id)
            .cloned()
            .collect())
    }

    async fn pending_transactions_created_by(
        &mut self,
        name: &str,
    ) -> Result<Vec<WalletTransaction>> {
        Ok(self
            .staged
            .transactions
            .rows()
            .filter(|tx| tx.is_pending() && tx.created_by.is_named(name))
            .cloned()
            .collect())
    }

    async fn purchase(&mut self, id: &PurchaseId) -> Result<Option<Purchase>> {
        Ok(self.staged.purchases.get(id).cloned())
    }

    async fn purchases_for_customer(&mut self, id: &CustomerId) -> Result<Vec<Purchase>> {
        Ok(self
            .staged
            .purchases
            .rows()
            .filter(|p| &p.customer_id == id)
            .cloned()
            .collect())
    }

    async fn save_purchase(&mut self, purchase: &Purchase) -> Result<()> {
        self.staged
            .purchases
            .upsert(purchase.id.clone(), purchase.clone());
        Ok(())
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        self.staged.payments.upsert(payment.id, payment.clone());
        Ok(())
    }

    async fn payments_for_purchase(&mut self, id: &PurchaseId) -> Result<Vec<Payment>> {
        Ok(self
            .staged
            .payments
            .rows()
            .filter(|p| &p.purchase_id == id)
            .cloned()
            .collect())
    }

    async fn insert_progress_invoice(&mut self, invoice: &ProgressInvoice) -> Result<()> {
        if self.staged.invoices.get(&invoice.payment_id).is_some() {
            return Err(LedgerError::Conflict);
        }
        self.staged
            .invoices
            .upsert(invoice.payment_id, invoice.clone());
        Ok(())
    }

    async fn progress_invoice_for_payment(
        &mut self,
        id: PaymentId,
    ) -> Result<Option<ProgressInvoice>> {
        Ok(self.staged.invoices.get(&id).cloned())
    }

    async fn waybill_for_purchase(&mut self, id: &PurchaseId) -> Result<Option<Waybill>> {
        Ok(self.staged.waybills.get(id).cloned())
    }

    async fn insert_waybill(&mut self, waybill: &Waybill) -> Result<()> {
        if self.staged.waybills.get(&waybill.purchase_id).is_some() {
            return Err(LedgerError::Conflict);
        }
        self.staged
            .waybills
            .upsert(waybill.purchase_id.clone(), waybill.clone());
        Ok(())
    }

    async fn stock_level(&mut self, shop: &ShopId, product: &ProductId) -> Result<Option<i64>> {
        Ok(self
            .staged
            .stock
            .get(&(shop.clone(), product.clone()))
            .copied())
    }

    async fn set_stock_level(
        &mut self,
        shop: &ShopId,
        product: &ProductId,
        qty: i64,
    ) -> Result<()> {
        self.staged
            .stock
            .insert((shop.clone(), product.clone()), qty);
        Ok(())
    }

    async fn decrement_stock(
        &mut self,
        shop: &ShopId,
        product: &ProductId,
        qty: u32,
    ) -> Result<bool> {
        match self.staged.stock.get_mut(&(shop.clone(), product.clone())) {
            Some(level) => {
                *level -= i64::from(qty);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn all_customers(&mut self) -> Result<Vec<Customer>> {
        let mut customers: Vec<Customer> = self.staged.customers.rows().cloned().collect();
        customers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(customers)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryUnitOfWork { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
