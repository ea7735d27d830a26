use super::allocation::{AllocationResolver, Settlement};
use super::config::{EngineConfig, NegativeBalancePolicy};
use crate::domain::actor::{AdminGrant, ConfirmGrant, StaffGrant};
use crate::domain::audit::{AuditAction, AuditEvent, AuditLoggerBox, EntityRef};
use crate::domain::ids::{CustomerId, TransactionId};
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{DocumentNumberingBox, LedgerStore, LedgerStoreBox, UnitOfWork};
use crate::domain::transaction::{
    NewWalletTransaction, StaffRef, TransactionStatus, TransactionType, WalletTransaction,
};
use crate::error::{LedgerError, Result};
use chrono::Utc;
use rust_decimal::Decimal;

/// The result of a confirmation or a direct balance adjustment.
#[derive(Debug, Clone)]
pub struct Confirmation {
    /// The ledger entry that was confirmed or created.
    pub transaction: WalletTransaction,
    pub settlement: Settlement,
    /// Wallet balance once every allocation debit has been applied.
    pub wallet_balance: Balance,
}

#[derive(Debug)]
pub struct BulkFailure {
    pub transaction_id: TransactionId,
    pub error: LedgerError,
}

#[derive(Debug, Default)]
pub struct BulkConfirmation {
    pub confirmed_count: usize,
    pub failures: Vec<BulkFailure>,
}

/// Entry point for every wallet mutation.
///
/// `LedgerEngine` owns the transaction state machine (pending, then confirmed
/// or rejected), moves customer balances and runs the allocation resolver.
/// Each operation runs inside one unit of work and commits exactly once; any
/// error on the way drops the unit and with it every staged write.
pub struct LedgerEngine {
    store: LedgerStoreBox,
    audit: AuditLoggerBox,
    numbering: DocumentNumberingBox,
    config: EngineConfig,
}

impl LedgerEngine {
    /// Creates a new `LedgerEngine`.
    ///
    /// # Arguments
    ///
    /// * `store` - Persistence backend providing atomic units of work.
    /// * `audit` - Sink for audit events.
    /// * `numbering` - Issues waybill and receipt numbers.
    /// * `config` - Balance policy and document prefixes.
    pub fn new(
        store: LedgerStoreBox,
        audit: AuditLoggerBox,
        numbering: DocumentNumberingBox,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            audit,
            numbering,
            config,
        }
    }

    /// Read access for observers such as reports.
    pub fn store(&self) -> &dyn LedgerStore {
        self.store.as_ref()
    }

    /// Records a pending wallet transaction for later confirmation.
    pub async fn submit(
        &self,
        grant: &StaffGrant,
        request: NewWalletTransaction,
    ) -> Result<WalletTransaction> {
        let mut uow = self.store.begin().await?;
        let customer = uow
            .customer(&request.customer_id)
            .await?
            .filter(|c| grant.scope.contains(&c.business_id, &c.shop_id))
            .ok_or_else(|| LedgerError::not_found(format!("customer {}", request.customer_id)))?;

        let actor = StaffRef::from(&grant.actor);
        let tx = WalletTransaction::pending(
            request,
            customer.business_id,
            customer.shop_id,
            actor.clone(),
            Utc::now(),
        );
        uow.insert_transaction(&tx).await?;
        uow.commit().await?;

        log::info!(
            "{} recorded pending {:?} {} of {} for customer {}",
            actor.name,
            tx.r#type,
            tx.id,
            tx.amount,
            tx.customer_id
        );
        self.audit(AuditEvent::new(
            actor,
            EntityRef::WalletTransaction(tx.id),
            AuditAction::TransactionSubmitted {
                customer_id: tx.customer_id.clone(),
                r#type: tx.r#type,
                amount: tx.amount,
            },
        ))
        .await;
        Ok(tx)
    }

    /// Confirms a pending transaction.
    ///
    /// Moves the wallet by the entry's signed amount and, for credits, pays
    /// down outstanding purchases with the credited funds. A transaction that
    /// is no longer pending yields [`LedgerError::AlreadyProcessed`] and
    /// changes nothing.
    pub async fn confirm(&self, grant: &ConfirmGrant, id: TransactionId) -> Result<Confirmation> {
        let mut uow = self.store.begin().await?;
        let mut tx = uow
            .transaction(id)
            .await?
            .filter(|tx| grant.scope.contains(&tx.business_id, &tx.shop_id))
            .ok_or_else(|| LedgerError::not_found(format!("wallet transaction {}", id)))?;
        if !tx.is_pending() {
            log::warn!("transaction {} is already {:?}", id, tx.status);
            return Err(LedgerError::AlreadyProcessed(id));
        }

        let actor = StaffRef::from(&grant.actor);
        let now = Utc::now();
        let delta = tx.signed_amount();
        self.check_debit(uow.as_mut(), &tx.customer_id, delta).await?;

        let change = uow.increment_wallet_balance(&tx.customer_id, delta).await?;
        tx.confirm(actor.clone(), change, now)?;
        if !uow
            .transition_transaction(&tx, TransactionStatus::Pending)
            .await?
        {
            log::warn!("transaction {} was settled by a concurrent request", id);
            return Err(LedgerError::AlreadyProcessed(id));
        }

        let settlement = if tx.r#type.is_credit() {
            AllocationResolver::new(self.numbering.as_ref())
                .settle(uow.as_mut(), &tx, &actor, tx.amount, now)
                .await?
        } else {
            Settlement::default()
        };
        let wallet_balance = self.current_balance(uow.as_mut(), &tx.customer_id).await?;
        uow.commit().await?;

        log::info!(
            "{} confirmed {:?} {} of {} for customer {}: wallet {} -> {}, {} purchase(s) paid down",
            actor.name,
            tx.r#type,
            tx.id,
            tx.amount,
            tx.customer_id,
            change.before,
            wallet_balance,
            settlement.receipts.len()
        );
        self.audit(AuditEvent::new(
            actor,
            EntityRef::WalletTransaction(tx.id),
            AuditAction::TransactionConfirmed {
                customer_id: tx.customer_id.clone(),
                r#type: tx.r#type,
                amount: tx.amount,
                balance_before: change.before,
                balance_after: wallet_balance,
                purchases_paid: settlement.paydowns(),
            },
        ))
        .await;

        Ok(Confirmation {
            transaction: tx,
            settlement,
            wallet_balance,
        })
    }

    /// Rejects a pending transaction. The wallet is left untouched.
    pub async fn reject(
        &self,
        grant: &ConfirmGrant,
        id: TransactionId,
        reason: &str,
    ) -> Result<WalletTransaction> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(LedgerError::validation("a rejection reason is required"));
        }

        let mut uow = self.store.begin().await?;
        let mut tx = uow
            .transaction(id)
            .await?
            .filter(|tx| grant.scope.contains(&tx.business_id, &tx.shop_id))
            .ok_or_else(|| LedgerError::not_found(format!("wallet transaction {}", id)))?;

        let actor = StaffRef::from(&grant.actor);
        tx.reject(actor.clone(), reason, Utc::now())?;
        if !uow
            .transition_transaction(&tx, TransactionStatus::Pending)
            .await?
        {
            return Err(LedgerError::AlreadyProcessed(id));
        }
        uow.commit().await?;

        log::info!("{} rejected transaction {}: {}", actor.name, id, reason);
        self.audit(AuditEvent::new(
            actor,
            EntityRef::WalletTransaction(id),
            AuditAction::TransactionRejected {
                customer_id: tx.customer_id.clone(),
                amount: tx.amount,
                reason: reason.to_string(),
            },
        ))
        .await;
        Ok(tx)
    }

    /// Moves a customer's wallet directly, bypassing the pending stage.
    ///
    /// Additions are run through the allocation resolver exactly like a
    /// confirmed deposit. Subtractions are subject to the configured
    /// [`NegativeBalancePolicy`] and never reverse earlier allocations.
    pub async fn adjust_balance(
        &self,
        grant: &AdminGrant,
        customer_id: &CustomerId,
        amount: Decimal,
        description: &str,
        is_addition: bool,
    ) -> Result<Confirmation> {
        let amount = Amount::new(amount)?;
        let description = description.trim();
        if description.is_empty() {
            return Err(LedgerError::validation("an adjustment description is required"));
        }

        let mut uow = self.store.begin().await?;
        let customer = uow
            .customer(customer_id)
            .await?
            .filter(|c| grant.scope.contains(&c.business_id, &c.shop_id))
            .ok_or_else(|| LedgerError::not_found(format!("customer {}", customer_id)))?;

        let actor = StaffRef::from(&grant.actor);
        let now = Utc::now();
        let delta = if is_addition {
            Balance::from(amount)
        } else {
            -Balance::from(amount)
        };
        self.check_debit(uow.as_mut(), customer_id, delta).await?;

        let change = uow.increment_wallet_balance(customer_id, delta).await?;
        let tx = WalletTransaction::confirmed(
            NewWalletTransaction {
                customer_id: customer_id.clone(),
                r#type: TransactionType::Adjustment,
                amount,
                reference: None,
                description: Some(description.to_string()),
            },
            customer.business_id,
            customer.shop_id,
            actor.clone(),
            change,
            now,
        )?;
        uow.insert_transaction(&tx).await?;

        let settlement = if is_addition {
            AllocationResolver::new(self.numbering.as_ref())
                .settle(uow.as_mut(), &tx, &actor, amount, now)
                .await?
        } else {
            Settlement::default()
        };
        let wallet_balance = self.current_balance(uow.as_mut(), customer_id).await?;
        uow.commit().await?;

        log::info!(
            "{} adjusted wallet of customer {} by {}: {} -> {}",
            actor.name,
            customer_id,
            delta,
            change.before,
            wallet_balance
        );
        self.audit(AuditEvent::new(
            actor,
            EntityRef::Customer(customer_id.clone()),
            AuditAction::BalanceAdjusted {
                customer_id: customer_id.clone(),
                is_addition,
                amount,
                description: description.to_string(),
                previous_balance: change.before,
                new_balance: wallet_balance,
                purchases_paid: settlement.paydowns(),
            },
        ))
        .await;

        Ok(Confirmation {
            transaction: tx,
            settlement,
            wallet_balance,
        })
    }

    /// Confirms every pending transaction recorded by the named collector.
    ///
    /// Each transaction is confirmed in its own unit of work; a failure is
    /// reported in the result and does not undo the ones already confirmed.
    pub async fn confirm_all_for_actor(
        &self,
        grant: &AdminGrant,
        collector_name: &str,
    ) -> Result<BulkConfirmation> {
        let collector_name = collector_name.trim();
        if collector_name.is_empty() {
            return Err(LedgerError::validation("a collector name is required"));
        }

        let pending = self
            .store
            .begin()
            .await?
            .pending_transactions_created_by(collector_name)
            .await?;

        let confirm_grant = ConfirmGrant::from(grant);
        let mut outcome = BulkConfirmation::default();
        for tx in pending
            .into_iter()
            .filter(|tx| grant.scope.contains(&tx.business_id, &tx.shop_id))
        {
            match self.confirm(&confirm_grant, tx.id).await {
                Ok(_) => outcome.confirmed_count += 1,
                Err(error) => {
                    log::warn!("bulk confirmation skipped {}: {}", tx.id, error);
                    outcome.failures.push(BulkFailure {
                        transaction_id: tx.id,
                        error,
                    });
                }
            }
        }

        log::info!(
            "{} bulk-confirmed {} transaction(s) recorded by {} ({} failed)",
            grant.actor.name,
            outcome.confirmed_count,
            collector_name,
            outcome.failures.len()
        );
        self.audit(AuditEvent::new(
            StaffRef::from(&grant.actor),
            EntityRef::Staff(collector_name.to_string()),
            AuditAction::BulkConfirmed {
                collector_name: collector_name.to_string(),
                confirmed: outcome.confirmed_count,
                failed: outcome.failures.len(),
            },
        ))
        .await;
        Ok(outcome)
    }

    async fn check_debit(
        &self,
        uow: &mut dyn UnitOfWork,
        customer_id: &CustomerId,
        delta: Balance,
    ) -> Result<()> {
        if self.config.negative_balance == NegativeBalancePolicy::Allow || !delta.is_negative() {
            return Ok(());
        }
        let balance = self.current_balance(uow, customer_id).await?;
        if balance.checked_add(delta)?.is_negative() {
            return Err(LedgerError::validation(format!(
                "insufficient wallet balance: {} available, {} requested",
                balance, -delta
            )));
        }
        Ok(())
    }

    async fn current_balance(
        &self,
        uow: &mut dyn UnitOfWork,
        customer_id: &CustomerId,
    ) -> Result<Balance> {
        uow.customer(customer_id)
            .await?
            .map(|c| c.wallet_balance)
            .ok_or_else(|| LedgerError::not_found(format!("customer {}", customer_id)))
    }

    async fn audit(&self, event: AuditEvent) {
        if let Err(e) = self.audit.record(event).await {
            log::warn!("audit sink failed, continuing: {}", e);
        }
    }
}
