//! Purchase allocation: spreads wallet funds over a customer's outstanding
//! installment purchases, oldest due date first.

use crate::domain::audit::PurchasePaydown;
use crate::domain::ids::{PaymentId, PurchaseId, WaybillId};
use crate::domain::money::{Amount, Balance};
use crate::domain::ports::{DocumentNumbering, UnitOfWork};
use crate::domain::purchase::Purchase;
use crate::domain::receipt::{Payment, PaymentMethod, ProgressInvoice, Waybill};
use crate::domain::transaction::{
    NewWalletTransaction, StaffRef, TransactionType, WalletTransaction,
};
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Funds earmarked for one purchase.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub purchase_id: PurchaseId,
    pub applied: Amount,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    pub allocations: Vec<Allocation>,
    /// Funds no purchase could absorb; they stay in the wallet as credit.
    pub remaining: Decimal,
}

/// Decides how `funds` are split across `purchases` without touching anything.
///
/// Only purchases that accept wallet allocation are considered. They are paid
/// in ascending due-date order, ties broken by creation time and then by the
/// order they were handed in. Each allocation is bounded by both the
/// purchase's outstanding balance and the funds still remaining.
pub fn plan(purchases: &[Purchase], funds: Amount) -> AllocationPlan {
    let mut candidates: Vec<&Purchase> = purchases
        .iter()
        .filter(|p| p.accepts_wallet_allocation())
        .collect();
    candidates.sort_by_key(|p| (p.due_date, p.created_at));

    let mut remaining = funds.value();
    let mut allocations = Vec::new();
    for purchase in candidates {
        if remaining <= Decimal::ZERO {
            break;
        }
        let applied = remaining.min(purchase.outstanding_balance);
        if let Ok(applied) = Amount::new(applied) {
            remaining -= applied.value();
            allocations.push(Allocation {
                purchase_id: purchase.id.clone(),
                applied,
            });
        }
    }

    AllocationPlan {
        allocations,
        remaining,
    }
}

/// Everything one allocation produced.
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationReceipt {
    pub purchase: Purchase,
    pub payment: Payment,
    pub invoice: ProgressInvoice,
    pub waybill: Option<Waybill>,
    /// The confirmed PURCHASE entry that moved the applied funds out of the wallet.
    pub debit: WalletTransaction,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Settlement {
    pub receipts: Vec<AllocationReceipt>,
    pub unallocated: Decimal,
}

impl Settlement {
    pub fn allocated(&self) -> Decimal {
        self.receipts.iter().map(|r| r.payment.amount.value()).sum()
    }

    pub fn paydowns(&self) -> Vec<PurchasePaydown> {
        self.receipts
            .iter()
            .map(|r| PurchasePaydown {
                purchase_id: r.purchase.id.clone(),
                applied: r.payment.amount,
                new_outstanding: r.invoice.new_outstanding,
                completed: r.invoice.completed_purchase,
            })
            .collect()
    }
}

/// Applies an [`AllocationPlan`] inside a unit of work.
pub struct AllocationResolver<'a> {
    numbering: &'a dyn DocumentNumbering,
}

impl<'a> AllocationResolver<'a> {
    pub fn new(numbering: &'a dyn DocumentNumbering) -> Self {
        Self { numbering }
    }

    /// Pays down the customer's purchases with `funds` taken from `source`.
    ///
    /// For every purchase touched this writes the updated purchase, a wallet
    /// debit, one payment and one receipt, plus stock movements and a waybill
    /// when the purchase completes. Any error leaves the staged writes to be
    /// discarded with the unit of work.
    pub async fn settle(
        &self,
        uow: &mut dyn UnitOfWork,
        source: &WalletTransaction,
        actor: &StaffRef,
        funds: Amount,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        let purchases = uow.purchases_for_customer(&source.customer_id).await?;
        let plan = plan(&purchases, funds);
        log::debug!(
            "allocating {} from {} across {} purchase(s), {} left as credit",
            funds,
            source.id,
            plan.allocations.len(),
            plan.remaining
        );

        let mut by_id: HashMap<PurchaseId, Purchase> = purchases
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let mut receipts = Vec::with_capacity(plan.allocations.len());
        for allocation in plan.allocations {
            let purchase = by_id.remove(&allocation.purchase_id).ok_or_else(|| {
                LedgerError::not_found(format!("purchase {}", allocation.purchase_id))
            })?;
            let receipt = self
                .apply(uow, source, actor, purchase, allocation.applied, now)
                .await?;
            receipts.push(receipt);
        }

        Ok(Settlement {
            receipts,
            unallocated: plan.remaining,
        })
    }

    async fn apply(
        &self,
        uow: &mut dyn UnitOfWork,
        source: &WalletTransaction,
        actor: &StaffRef,
        mut purchase: Purchase,
        applied: Amount,
        now: DateTime<Utc>,
    ) -> Result<AllocationReceipt> {
        let application = purchase.apply_payment(applied)?;
        log::debug!(
            "purchase {}: {} applied, outstanding {} -> {}",
            purchase.id,
            applied,
            application.previous_outstanding,
            application.new_outstanding
        );

        let waybill = if application.completed {
            Some(self.complete(uow, &purchase, actor, now).await?)
        } else {
            None
        };
        uow.save_purchase(&purchase).await?;

        let change = uow
            .increment_wallet_balance(&purchase.customer_id, -Balance::from(applied))
            .await?;
        let debit = WalletTransaction::confirmed(
            NewWalletTransaction {
                customer_id: purchase.customer_id.clone(),
                r#type: TransactionType::Purchase,
                amount: applied,
                reference: Some(purchase.id.to_string()),
                description: Some(format!("Wallet payment toward purchase {}", purchase.id)),
            },
            purchase.business_id.clone(),
            purchase.shop_id.clone(),
            actor.clone(),
            change,
            now,
        )?;
        uow.insert_transaction(&debit).await?;

        let payment = Payment {
            id: PaymentId::generate(),
            purchase_id: purchase.id.clone(),
            customer_id: purchase.customer_id.clone(),
            source_transaction_id: source.id,
            amount: applied,
            method: PaymentMethod::Wallet,
            confirmed_by: actor.clone(),
            confirmed_at: now,
        };
        uow.insert_payment(&payment).await?;

        let invoice = ProgressInvoice::issue(
            self.numbering.invoice_number(&payment),
            &payment,
            &purchase,
            application,
            waybill.as_ref(),
        );
        uow.insert_progress_invoice(&invoice).await?;

        Ok(AllocationReceipt {
            purchase,
            payment,
            invoice,
            waybill,
            debit,
        })
    }

    /// Completion side effects: make sure exactly one waybill exists for the
    /// purchase and release its stock when that waybill is first issued.
    async fn complete(
        &self,
        uow: &mut dyn UnitOfWork,
        purchase: &Purchase,
        actor: &StaffRef,
        now: DateTime<Utc>,
    ) -> Result<Waybill> {
        if let Some(existing) = uow.waybill_for_purchase(&purchase.id).await? {
            log::info!(
                "purchase {} already has waybill {}, reusing it; stock was released with it",
                purchase.id,
                existing.number
            );
            return Ok(existing);
        }

        for item in &purchase.items {
            let stocked = uow
                .decrement_stock(&purchase.shop_id, &item.product_id, item.quantity)
                .await?;
            if !stocked {
                log::warn!(
                    "shop {} has no stock row for product {} (purchase {})",
                    purchase.shop_id,
                    item.product_id,
                    purchase.id
                );
            }
        }

        let waybill = Waybill {
            id: WaybillId::generate(),
            number: self.numbering.waybill_number(purchase),
            purchase_id: purchase.id.clone(),
            customer_id: purchase.customer_id.clone(),
            shop_id: purchase.shop_id.clone(),
            issued_by: actor.clone(),
            issued_at: now,
        };
        uow.insert_waybill(&waybill).await?;
        log::info!("issued waybill {} for purchase {}", waybill.number, purchase.id);
        Ok(waybill)
    }
}
