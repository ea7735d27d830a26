//! Immutable documents produced when wallet funds pay down a purchase.

use super::ids::{CustomerId, InvoiceId, PaymentId, PurchaseId, ShopId, TransactionId, WaybillId};
use super::money::Amount;
use super::purchase::{PaymentApplication, Purchase};
use super::transaction::StaffRef;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Wallet,
}

/// One allocation event against one purchase.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    pub purchase_id: PurchaseId,
    pub customer_id: CustomerId,
    /// The wallet entry whose funds were applied.
    pub source_transaction_id: TransactionId,
    pub amount: Amount,
    pub method: PaymentMethod,
    pub confirmed_by: StaffRef,
    pub confirmed_at: DateTime<Utc>,
}

/// Receipt snapshot issued for exactly one [`Payment`].
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct ProgressInvoice {
    pub id: InvoiceId,
    pub number: String,
    pub payment_id: PaymentId,
    pub purchase_id: PurchaseId,
    pub customer_id: CustomerId,
    pub amount_applied: Amount,
    pub previous_outstanding: Decimal,
    pub new_outstanding: Decimal,
    pub total_amount: Decimal,
    pub amount_paid_to_date: Decimal,
    pub completed_purchase: bool,
    pub waybill_number: Option<String>,
    pub issued_at: DateTime<Utc>,
}

/// Delivery authorization for a fully paid purchase. At most one per purchase.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Waybill {
    pub id: WaybillId,
    pub number: String,
    pub purchase_id: PurchaseId,
    pub customer_id: CustomerId,
    pub shop_id: ShopId,
    pub issued_by: StaffRef,
    pub issued_at: DateTime<Utc>,
}

impl ProgressInvoice {
    pub fn issue(
        number: String,
        payment: &Payment,
        purchase: &Purchase,
        applied: PaymentApplication,
        waybill: Option<&Waybill>,
    ) -> Self {
        Self {
            id: InvoiceId::generate(),
            number,
            payment_id: payment.id,
            purchase_id: purchase.id.clone(),
            customer_id: purchase.customer_id.clone(),
            amount_applied: payment.amount,
            previous_outstanding: applied.previous_outstanding,
            new_outstanding: applied.new_outstanding,
            total_amount: purchase.total_amount,
            amount_paid_to_date: purchase.amount_paid,
            completed_purchase: applied.completed,
            waybill_number: waybill.map(|w| w.number.clone()),
            issued_at: payment.confirmed_at,
        }
    }
}
