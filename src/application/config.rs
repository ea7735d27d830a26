use serde::{Deserialize, Serialize};

/// What to do when a debit would take a wallet below zero.
///
/// `Allow` lets the balance go negative, which the ledger then reads as money
/// the customer owes the shop. `Reject` refuses such a debit outright.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum NegativeBalancePolicy {
    #[default]
    Allow,
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub negative_balance: NegativeBalancePolicy,
    pub waybill_prefix: String,
    pub invoice_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            negative_balance: NegativeBalancePolicy::default(),
            waybill_prefix: "WB".to_string(),
            invoice_prefix: "INV".to_string(),
        }
    }
}
