use crate::domain::customer::Customer;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct BalanceRow<'a> {
    customer: &'a str,
    shop: &'a str,
    wallet_balance: String,
}

/// Writes customer wallet balances as CSV.
pub struct BalanceWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> BalanceWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    /// Writes one row per customer, in the order given, then flushes.
    pub fn write_balances<'a, I>(&mut self, customers: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Customer>,
    {
        let mut wrote_any = false;
        for customer in customers {
            self.writer.serialize(BalanceRow {
                customer: customer.id.as_str(),
                shop: customer.shop_id.as_str(),
                wallet_balance: customer.wallet_balance.to_string(),
            })?;
            wrote_any = true;
        }
        if !wrote_any {
            self.writer
                .write_record(["customer", "shop", "wallet_balance"])?;
        }
        self.writer.flush()?;
        Ok(())
    }
}
