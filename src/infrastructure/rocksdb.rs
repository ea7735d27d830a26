use crate::domain::customer::Customer;
use crate::domain::ids::{CustomerId, PaymentId, ProductId, PurchaseId, ShopId, TransactionId};
use crate::domain::money::Balance;
use crate::domain::ports::{LedgerStore, UnitOfWork};
use crate::domain::purchase::Purchase;
use crate::domain::receipt::{Payment, ProgressInvoice, Waybill};
use crate::domain::transaction::{BalanceChange, TransactionStatus, WalletTransaction};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Column Family for customers and their wallet balances.
pub const CF_CUSTOMERS: &str = "customers";
/// Column Family for wallet ledger entries.
pub const CF_TRANSACTIONS: &str = "transactions";
/// Column Family for installment purchases.
pub const CF_PURCHASES: &str = "purchases";
/// Column Family for wallet payments.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for progress invoices, keyed by payment id.
pub const CF_INVOICES: &str = "invoices";
/// Column Family for waybills, keyed by purchase id.
pub const CF_WAYBILLS: &str = "waybills";
/// Column Family for shop stock levels.
pub const CF_STOCK: &str = "stock";
/// Column Family for store-wide counters.
pub const CF_META: &str = "meta";

const TRANSACTION_SEQUENCE: &[u8] = b"transaction_sequence";

const COLUMN_FAMILIES: [&str; 8] = [
    CF_CUSTOMERS,
    CF_TRANSACTIONS,
    CF_PURCHASES,
    CF_PAYMENTS,
    CF_INVOICES,
    CF_WAYBILLS,
    CF_STOCK,
    CF_META,
];

/// A persistent ledger store backed by RocksDB.
///
/// Every entity kind lives in its own Column Family, values are JSON. A unit
/// of work stages its writes in memory and commits them as one `WriteBatch`,
/// which RocksDB applies atomically. Units of work are handed out one at a
/// time so the read-check-write sequences inside a confirmation never
/// interleave.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbLedgerStore {
    db: Arc<DB>,
    writer: Arc<Mutex<()>>,
}

impl RocksDbLedgerStore {
    /// Opens or creates a RocksDB instance at the specified path, creating
    /// any missing column families.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()));
        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            writer: Arc::new(Mutex::new(())),
        })
    }
}

#[async_trait]
impl LedgerStore for RocksDbLedgerStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self.writer.clone().lock_owned().await;
        Ok(Box::new(RocksDbUnitOfWork {
            db: self.db.clone(),
            _guard: guard,
            staged: BTreeMap::new(),
        }))
    }
}

/// A ledger entry as stored, tagged with its position in write order.
#[derive(Serialize, Deserialize)]
struct StoredTransaction {
    sequence: u64,
    transaction: WalletTransaction,
}

struct RocksDbUnitOfWork {
    db: Arc<DB>,
    _guard: OwnedMutexGuard<()>,
    staged: BTreeMap<(&'static str, Vec<u8>), Vec<u8>>,
}

fn stock_key(shop: &ShopId, product: &ProductId) -> Vec<u8> {
    let mut key = shop.as_str().as_bytes().to_vec();
    key.push(0);
    key.extend_from_slice(product.as_str().as_bytes());
    key
}

impl RocksDbUnitOfWork {
    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db.cf_handle(name).ok_or_else(|| {
            LedgerError::PersistenceError(format!("{} column family not found", name))
        })
    }

    fn get<T: DeserializeOwned>(&self, cf: &'static str, key: &[u8]) -> Result<Option<T>> {
        if let Some(bytes) = self.staged.get(&(cf, key.to_vec())) {
            return Ok(Some(serde_json::from_slice(bytes)?));
        }
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put<T: Serialize>(&mut self, cf: &'static str, key: Vec<u8>, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.staged.insert((cf, key), bytes);
        Ok(())
    }

    /// Every value in the column family, staged writes layered on top.
    fn scan<T: DeserializeOwned>(&self, cf: &'static str) -> Result<Vec<T>> {
        let mut rows: BTreeMap<Vec<u8>, Vec<u8>> = BTreeMap::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (key, value) = item?;
            rows.insert(key.to_vec(), value.to_vec());
        }
        for ((staged_cf, key), value) in &self.staged {
            if *staged_cf == cf {
                rows.insert(key.clone(), value.clone());
            }
        }
        rows.values()
            .map(|bytes| serde_json::from_slice(bytes).map_err(LedgerError::from))
            .collect()
    }

    fn next_transaction_sequence(&mut self) -> Result<u64> {
        let next = self.get::<u64>(CF_META, TRANSACTION_SEQUENCE)?.unwrap_or(0) + 1;
        self.put(CF_META, TRANSACTION_SEQUENCE.to_vec(), &next)?;
        Ok(next)
    }

    fn stored_transaction(&self, id: TransactionId) -> Result<Option<StoredTransaction>> {
        self.get(CF_TRANSACTIONS, id.0.as_bytes())
    }

    /// Entries matching `keep`, in the order they were first written.
    fn transactions_where(
        &self,
        keep: impl Fn(&WalletTransaction) -> bool,
    ) -> Result<Vec<WalletTransaction>> {
        let mut rows: Vec<StoredTransaction> = self
            .scan::<StoredTransaction>(CF_TRANSACTIONS)?
            .into_iter()
            .filter(|row| keep(&row.transaction))
            .collect();
        rows.sort_by_key(|row| row.sequence);
        Ok(rows.into_iter().map(|row| row.transaction).collect())
    }
}

#[async_trait]
impl UnitOfWork for RocksDbUnitOfWork {
    async fn customer(&mut self, id: &CustomerId) -> Result<Option<Customer>> {
        self.get(CF_CUSTOMERS, id.as_str().as_bytes())
    }

    async fn upsert_customer(&mut self, customer: &Customer) -> Result<()> {
        self.put(CF_CUSTOMERS, customer.id.as_str().as_bytes().to_vec(), customer)
    }

    async fn increment_wallet_balance(
        &mut self,
        id: &CustomerId,
        delta: Balance,
    ) -> Result<BalanceChange> {
        let mut customer: Customer = self
            .get(CF_CUSTOMERS, id.as_str().as_bytes())?
            .ok_or_else(|| LedgerError::not_found(format!("customer {}", id)))?;
        let before = customer.apply(delta)?;
        self.put(CF_CUSTOMERS, id.as_str().as_bytes().to_vec(), &customer)?;
        Ok(BalanceChange {
            before,
            after: customer.wallet_balance,
        })
    }

    async fn transaction(&mut self, id: TransactionId) -> Result<Option<WalletTransaction>> {
        Ok(self.stored_transaction(id)?.map(|row| row.transaction))
    }

    async fn insert_transaction(&mut self, tx: &WalletTransaction) -> Result<()> {
        if self.stored_transaction(tx.id)?.is_some() {
            return Err(LedgerError::Conflict);
        }
        let row = StoredTransaction {
            sequence: self.next_transaction_sequence()?,
            transaction: tx.clone(),
        };
        self.put(CF_TRANSACTIONS, tx.id.0.as_bytes().to_vec(), &row)
    }

    async fn transition_transaction(
        &mut self,
        tx: &WalletTransaction,
        expected: TransactionStatus,
    ) -> Result<bool> {
        let stored = self
            .stored_transaction(tx.id)?
            .ok_or_else(|| LedgerError::not_found(format!("wallet transaction {}", tx.id)))?;
        if stored.transaction.status != expected {
            return Ok(false);
        }
        let row = StoredTransaction {
            sequence: stored.sequence,
            transaction: tx.clone(),
        };
        self.put(CF_TRANSACTIONS, tx.id.0.as_bytes().to_vec(), &row)?;
        Ok(true)
    }

    async fn transactions_for_customer(
        &mut self,
        id: &CustomerId,
    ) -> Result<Vec<WalletTransaction>> {
        self.transactions_where(|tx| &tx.customer_id == id)
    }

    async fn pending_transactions_created_by(
        &mut self,
        name: &str,
    ) -> Result<Vec<WalletTransaction>> {
        self.transactions_where(|tx| tx.is_pending() && tx.created_by.is_named(name))
    }

    async fn purchase(&mut self, id: &PurchaseId) -> Result<Option<Purchase>> {
        self.get(CF_PURCHASES, id.as_str().as_bytes())
    }

    async fn purchases_for_customer(&mut self, id: &CustomerId) -> Result<Vec<Purchase>> {
        let mut purchases: Vec<Purchase> = self
            .scan::<Purchase>(CF_PURCHASES)?
            .into_iter()
            .filter(|p| &p.customer_id == id)
            .collect();
        purchases.sort_by_key(|p| p.created_at);
        Ok(purchases)
    }

    async fn save_purchase(&mut self, purchase: &Purchase) -> Result<()> {
        self.put(CF_PURCHASES, purchase.id.as_str().as_bytes().to_vec(), purchase)
    }

    async fn insert_payment(&mut self, payment: &Payment) -> Result<()> {
        self.put(CF_PAYMENTS, payment.id.0.as_bytes().to_vec(), payment)
    }

    async fn payments_for_purchase(&mut self, id: &PurchaseId) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .scan::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .filter(|p| &p.purchase_id == id)
            .collect();
        payments.sort_by_key(|p| p.confirmed_at);
        Ok(payments)
    }

    async fn insert_progress_invoice(&mut self, invoice: &ProgressInvoice) -> Result<()> {
        let key = invoice.payment_id.0.as_bytes().to_vec();
        if self.get::<ProgressInvoice>(CF_INVOICES, &key)?.is_some() {
            return Err(LedgerError::Conflict);
        }
        self.put(CF_INVOICES, key, invoice)
    }

    async fn progress_invoice_for_payment(
        &mut self,
        id: PaymentId,
    ) -> Result<Option<ProgressInvoice>> {
        self.get(CF_INVOICES, id.0.as_bytes())
    }

    async fn waybill_for_purchase(&mut self, id: &PurchaseId) -> Result<Option<Waybill>> {
        self.get(CF_WAYBILLS, id.as_str().as_bytes())
    }

    async fn insert_waybill(&mut self, waybill: &Waybill) -> Result<()> {
        let key = waybill.purchase_id.as_str().as_bytes().to_vec();
        if self.get::<Waybill>(CF_WAYBILLS, &key)?.is_some() {
            return Err(LedgerError::Conflict);
        }
        self.put(CF_WAYBILLS, key, waybill)
    }

    async fn stock_level(&mut self, shop: &ShopId, product: &ProductId) -> Result<Option<i64>> {
        self.get(CF_STOCK, &stock_key(shop, product))
    }

    async fn set_stock_level(
        &mut self,
        shop: &ShopId,
        product: &ProductId,
        qty: i64,
    ) -> Result<()> {
        self.put(CF_STOCK, stock_key(shop, product), &qty)
    }

    async fn decrement_stock(
        &mut self,
        shop: &ShopId,
        product: &ProductId,
        qty: u32,
    ) -> Result<bool> {
        let key = stock_key(shop, product);
        match self.get::<i64>(CF_STOCK, &key)? {
            Some(level) => {
                self.put(CF_STOCK, key, &(level - i64::from(qty)))?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn all_customers(&mut self) -> Result<Vec<Customer>> {
        let mut customers = self.scan::<Customer>(CF_CUSTOMERS)?;
        customers.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(customers)
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let mut batch = WriteBatch::default();
        for ((cf, key), value) in &self.staged {
            batch.put_cf(self.cf(cf)?, key, value);
        }
        self.db.write(batch)?;
        Ok(())
    }
}
