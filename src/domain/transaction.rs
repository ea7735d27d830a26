use super::actor::Actor;
use super::ids::{ActorId, BusinessId, CustomerId, ShopId, TransactionId};
use super::money::{Amount, Balance};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Deposit,
    Refund,
    Adjustment,
    Purchase,
}

impl TransactionType {
    /// Deposits, refunds and adjustments credit the wallet; purchases debit it.
    pub fn is_credit(&self) -> bool {
        !matches!(self, TransactionType::Purchase)
    }

    pub fn default_direction(&self) -> Direction {
        if self.is_credit() {
            Direction::Credit
        } else {
            Direction::Debit
        }
    }
}

/// Which way an entry moves the wallet. Only admin adjustments may run
/// against their type's default direction.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Credit,
    Debit,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    Rejected,
}

/// Who touched a ledger entry, frozen at the time they did.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct StaffRef {
    pub id: ActorId,
    pub name: String,
}

impl StaffRef {
    /// Case-insensitive match on the display name.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }
}

impl From<&Actor> for StaffRef {
    fn from(actor: &Actor) -> Self {
        Self {
            id: actor.id.clone(),
            name: actor.name.clone(),
        }
    }
}

/// The wallet balance on either side of one atomic increment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct BalanceChange {
    pub before: Balance,
    pub after: Balance,
}

impl BalanceChange {
    pub fn delta(&self) -> Balance {
        self.after - self.before
    }
}

/// An append-only wallet ledger entry.
///
/// Entries start `Pending` (recorded by a collector) or are created directly
/// `Confirmed` (adjustments and allocation debits). `Confirmed` and `Rejected`
/// are terminal: every transition out of them fails with
/// [`LedgerError::AlreadyProcessed`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct WalletTransaction {
    pub id: TransactionId,
    pub customer_id: CustomerId,
    pub business_id: BusinessId,
    pub shop_id: ShopId,
    pub r#type: TransactionType,
    pub direction: Direction,
    pub amount: Amount,
    pub balance_before: Option<Balance>,
    pub balance_after: Option<Balance>,
    pub status: TransactionStatus,
    pub created_by: StaffRef,
    pub created_at: DateTime<Utc>,
    pub confirmed_by: Option<StaffRef>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub rejected_reason: Option<String>,
    pub reference: Option<String>,
    pub description: Option<String>,
}

/// Input for a ledger entry, before the ledger assigns identity and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWalletTransaction {
    pub customer_id: CustomerId,
    pub r#type: TransactionType,
    pub amount: Amount,
    pub reference: Option<String>,
    pub description: Option<String>,
}

impl WalletTransaction {
    pub fn pending(
        request: NewWalletTransaction,
        business_id: BusinessId,
        shop_id: ShopId,
        created_by: StaffRef,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            customer_id: request.customer_id,
            business_id,
            shop_id,
            r#type: request.r#type,
            direction: request.r#type.default_direction(),
            amount: request.amount,
            balance_before: None,
            balance_after: None,
            status: TransactionStatus::Pending,
            created_by,
            created_at: now,
            confirmed_by: None,
            confirmed_at: None,
            rejected_reason: None,
            reference: request.reference,
            description: request.description,
        }
    }

    /// Builds an entry that skips the pending stage. An adjustment whose
    /// balance change is negative is recorded as a debit.
    pub fn confirmed(
        request: NewWalletTransaction,
        business_id: BusinessId,
        shop_id: ShopId,
        actor: StaffRef,
        change: BalanceChange,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let mut tx = Self::pending(request, business_id, shop_id, actor.clone(), now);
        if tx.r#type == TransactionType::Adjustment && change.delta().is_negative() {
            tx.direction = Direction::Debit;
        }
        tx.confirm(actor, change, now)?;
        Ok(tx)
    }

    pub fn is_pending(&self) -> bool {
        self.status == TransactionStatus::Pending
    }

    pub fn signed_amount(&self) -> Balance {
        let amount = Balance::from(self.amount);
        match self.direction {
            Direction::Credit => amount,
            Direction::Debit => -amount,
        }
    }

    pub fn confirm(
        &mut self,
        by: StaffRef,
        change: BalanceChange,
        at: DateTime<Utc>,
    ) -> Result<()> {
        if !self.is_pending() {
            return Err(LedgerError::AlreadyProcessed(self.id));
        }
        if change.delta() != self.signed_amount() {
            return Err(LedgerError::validation(format!(
                "balance moved by {} but transaction {} carries {}",
                change.delta(),
                self.id,
                self.signed_amount()
            )));
        }
        self.status = TransactionStatus::Confirmed;
        self.balance_before = Some(change.before);
        self.balance_after = Some(change.after);
        self.confirmed_by = Some(by);
        self.confirmed_at = Some(at);
        Ok(())
    }

    pub fn reject(&mut self, by: StaffRef, reason: &str, at: DateTime<Utc>) -> Result<()> {
        if !self.is_pending() {
            return Err(LedgerError::AlreadyProcessed(self.id));
        }
        self.status = TransactionStatus::Rejected;
        self.rejected_reason = Some(reason.to_string());
        self.confirmed_by = Some(by);
        self.confirmed_at = Some(at);
        Ok(())
    }
}
