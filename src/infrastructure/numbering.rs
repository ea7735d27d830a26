use crate::application::config::EngineConfig;
use crate::domain::ports::DocumentNumbering;
use crate::domain::purchase::Purchase;
use crate::domain::receipt::Payment;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Numbers documents as `<prefix>-<YYYYMMDD>-<12 hex digits>`.
///
/// The suffix comes from a fresh v4 UUID, so numbers do not depend on any
/// shared counter and stay unique across processes.
#[derive(Debug, Clone)]
pub struct UuidDocumentNumbering {
    waybill_prefix: String,
    invoice_prefix: String,
}

impl UuidDocumentNumbering {
    pub fn new(waybill_prefix: &str, invoice_prefix: &str) -> Self {
        Self {
            waybill_prefix: waybill_prefix.to_string(),
            invoice_prefix: invoice_prefix.to_string(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(&config.waybill_prefix, &config.invoice_prefix)
    }

    fn render(prefix: &str, at: DateTime<Utc>) -> String {
        let suffix = Uuid::new_v4().simple().to_string();
        format!(
            "{}-{}-{}",
            prefix,
            at.format("%Y%m%d"),
            suffix[..12].to_uppercase()
        )
    }
}

impl Default for UuidDocumentNumbering {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl DocumentNumbering for UuidDocumentNumbering {
    fn waybill_number(&self, _purchase: &Purchase) -> String {
        Self::render(&self.waybill_prefix, Utc::now())
    }

    fn invoice_number(&self, payment: &Payment) -> String {
        Self::render(&self.invoice_prefix, payment.confirmed_at)
    }
}
