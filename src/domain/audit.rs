//! Audit trail entries.
//!
//! Every action carries its own typed metadata so consumers can match on the
//! shape instead of digging through an untyped map.

use super::ids::{CustomerId, PurchaseId, TransactionId};
use super::money::{Amount, Balance};
use super::transaction::{StaffRef, TransactionType};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A purchase touched by an allocation, as recorded in the audit trail.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PurchasePaydown {
    pub purchase_id: PurchaseId,
    pub applied: Amount,
    pub new_outstanding: Decimal,
    pub completed: bool,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    TransactionSubmitted {
        customer_id: CustomerId,
        r#type: TransactionType,
        amount: Amount,
    },
    TransactionConfirmed {
        customer_id: CustomerId,
        r#type: TransactionType,
        amount: Amount,
        balance_before: Balance,
        balance_after: Balance,
        purchases_paid: Vec<PurchasePaydown>,
    },
    TransactionRejected {
        customer_id: CustomerId,
        amount: Amount,
        reason: String,
    },
    BalanceAdjusted {
        customer_id: CustomerId,
        is_addition: bool,
        amount: Amount,
        description: String,
        previous_balance: Balance,
        new_balance: Balance,
        purchases_paid: Vec<PurchasePaydown>,
    },
    BulkConfirmed {
        collector_name: String,
        confirmed: usize,
        failed: usize,
    },
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "entity_type", content = "entity_id", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityRef {
    WalletTransaction(TransactionId),
    Customer(CustomerId),
    Staff(String),
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct AuditEvent {
    pub actor: StaffRef,
    pub entity: EntityRef,
    #[serde(flatten)]
    pub action: AuditAction,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(actor: StaffRef, entity: EntityRef, action: AuditAction) -> Self {
        Self {
            actor,
            entity,
            action,
            recorded_at: Utc::now(),
        }
    }
}

/// Fire-and-forget sink for audit events.
///
/// Callers log and drop any error returned here; a failing audit sink never
/// fails a ledger operation.
#[async_trait]
pub trait AuditLogger: Send + Sync {
    async fn record(&self, event: AuditEvent) -> Result<()>;
}

pub type AuditLoggerBox = Box<dyn AuditLogger>;
