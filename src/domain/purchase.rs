use super::customer::Customer;
use super::ids::{BusinessId, CustomerId, ProductId, PurchaseId, ShopId};
use super::money::Amount;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PurchaseType {
    Cash,
    Credit,
    Layaway,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

/// An installment agreement between a customer and a shop.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Purchase {
    pub id: PurchaseId,
    pub customer_id: CustomerId,
    pub business_id: BusinessId,
    pub shop_id: ShopId,
    pub purchase_type: PurchaseType,
    pub status: PurchaseStatus,
    pub total_amount: Decimal,
    #[serde(default)]
    pub amount_paid: Decimal,
    #[serde(default)]
    pub outstanding_balance: Decimal,
    pub due_date: NaiveDate,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<LineItem>,
}

/// What a single payment did to a purchase.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
pub struct PaymentApplication {
    pub previous_outstanding: Decimal,
    pub new_outstanding: Decimal,
    pub completed: bool,
}

impl Purchase {
    /// An unpaid, active agreement for `total_amount` owed by `customer`.
    pub fn new(
        id: PurchaseId,
        customer: &Customer,
        purchase_type: PurchaseType,
        total_amount: Decimal,
        due_date: NaiveDate,
    ) -> Self {
        Self {
            id,
            customer_id: customer.id.clone(),
            business_id: customer.business_id.clone(),
            shop_id: customer.shop_id.clone(),
            purchase_type,
            status: PurchaseStatus::Active,
            total_amount,
            amount_paid: Decimal::ZERO,
            outstanding_balance: total_amount.max(Decimal::ZERO),
            due_date,
            created_at: Utc::now(),
            items: Vec::new(),
        }
    }

    pub fn with_items(mut self, items: Vec<LineItem>) -> Self {
        self.items = items;
        self
    }

    /// Keeps `outstanding_balance = max(0, total_amount - amount_paid)`.
    pub fn recompute_outstanding(&mut self) {
        self.outstanding_balance = (self.total_amount - self.amount_paid).max(Decimal::ZERO);
    }

    /// Whether wallet funds may be applied to this purchase automatically.
    pub fn accepts_wallet_allocation(&self) -> bool {
        matches!(self.status, PurchaseStatus::Active | PurchaseStatus::Pending)
            && self.outstanding_balance > Decimal::ZERO
            && self.purchase_type != PurchaseType::Cash
    }

    pub fn apply_payment(&mut self, amount: Amount) -> Result<PaymentApplication> {
        if amount.value() > self.outstanding_balance {
            return Err(LedgerError::validation(format!(
                "payment of {} exceeds outstanding balance {} on purchase {}",
                amount, self.outstanding_balance, self.id
            )));
        }

        let previous_outstanding = self.outstanding_balance;
        self.amount_paid = self
            .amount_paid
            .checked_add(amount.value())
            .ok_or_else(|| {
                LedgerError::validation(format!("amount paid on purchase {} overflows", self.id))
            })?;
        self.recompute_outstanding();

        let completed = self.outstanding_balance.is_zero();
        if completed {
            self.status = PurchaseStatus::Completed;
        } else if self.status == PurchaseStatus::Pending {
            self.status = PurchaseStatus::Active;
        }

        Ok(PaymentApplication {
            previous_outstanding,
            new_outstanding: self.outstanding_balance,
            completed,
        })
    }
}
