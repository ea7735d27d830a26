//! Drives a [`LedgerEngine`] from a command script.
//!
//! Each command names the acting staff member by id. The driver resolves that
//! id against the seeded actors and mints the grant the operation needs for
//! the shop the command touches, the way a web handler would after login.

use super::csv::command_reader::{Command, CommandOp};
use crate::application::engine::LedgerEngine;
use crate::domain::actor::{Actor, Scope};
use crate::domain::customer::Customer;
use crate::domain::ids::{ActorId, CustomerId, TransactionId};
use crate::domain::money::Amount;
use crate::domain::ports::LedgerStore;
use crate::domain::transaction::{NewWalletTransaction, TransactionType};
use crate::error::{LedgerError, Result};
use std::collections::HashMap;

pub struct Replay {
    engine: LedgerEngine,
    actors: HashMap<ActorId, Actor>,
    refs: HashMap<String, TransactionId>,
}

impl Replay {
    pub fn new(engine: LedgerEngine, actors: impl IntoIterator<Item = Actor>) -> Self {
        Self {
            engine,
            actors: actors.into_iter().map(|a| (a.id.clone(), a)).collect(),
            refs: HashMap::new(),
        }
    }

    pub fn engine(&self) -> &LedgerEngine {
        &self.engine
    }

    /// The transaction submitted under `reference`, if any.
    pub fn transaction_id(&self, reference: &str) -> Option<TransactionId> {
        self.refs.get(reference).copied()
    }

    pub async fn apply(&mut self, command: Command) -> Result<()> {
        let actor = self.actor(&command)?.clone();
        match command.op {
            CommandOp::Deposit => self.submit(&actor, command, TransactionType::Deposit).await,
            CommandOp::Refund => self.submit(&actor, command, TransactionType::Refund).await,
            CommandOp::Adjustment => {
                self.submit(&actor, command, TransactionType::Adjustment)
                    .await
            }
            CommandOp::Purchase => self.submit(&actor, command, TransactionType::Purchase).await,
            CommandOp::Confirm => {
                let id = self.referenced(&command)?;
                let grant = actor.confirm_grant(self.transaction_scope(id).await?)?;
                self.engine.confirm(&grant, id).await.map(|_| ())
            }
            CommandOp::Reject => {
                let id = self.referenced(&command)?;
                let grant = actor.confirm_grant(self.transaction_scope(id).await?)?;
                let reason = command.note.as_deref().unwrap_or_default();
                self.engine.reject(&grant, id, reason).await.map(|_| ())
            }
            CommandOp::Credit | CommandOp::Debit => {
                let customer = self.customer(&command).await?;
                let grant = actor.admin_grant(shop_scope(&customer))?;
                let amount = command
                    .amount
                    .ok_or_else(|| LedgerError::validation("amount is required"))?;
                let description = command.note.as_deref().unwrap_or_default();
                self.engine
                    .adjust_balance(
                        &grant,
                        &customer.id,
                        amount,
                        description,
                        command.op == CommandOp::Credit,
                    )
                    .await
                    .map(|_| ())
            }
            CommandOp::ConfirmAll => {
                let scope = match &command.customer {
                    Some(_) => shop_scope(&self.customer(&command).await?),
                    None => own_scope(&actor)?,
                };
                let grant = actor.admin_grant(scope)?;
                let collector = command.note.as_deref().unwrap_or_default();
                let outcome = self.engine.confirm_all_for_actor(&grant, collector).await?;
                for failure in &outcome.failures {
                    if !failure.error.is_benign() {
                        log::error!(
                            "bulk confirmation of {} failed: {}",
                            failure.transaction_id,
                            failure.error.reason()
                        );
                    }
                }
                Ok(())
            }
        }
    }

    /// Final wallet state of every customer, sorted by customer id.
    pub async fn balances(&self) -> Result<Vec<Customer>> {
        self.engine.store().all_customers().await
    }

    async fn submit(
        &mut self,
        actor: &Actor,
        command: Command,
        r#type: TransactionType,
    ) -> Result<()> {
        if let Some(reference) = &command.r#ref {
            if self.refs.contains_key(reference) {
                return Err(LedgerError::validation(format!(
                    "reference {} is already in use",
                    reference
                )));
            }
        }
        let customer = self.customer(&command).await?;
        let grant = actor.staff_grant(shop_scope(&customer))?;
        let amount = command
            .amount
            .ok_or_else(|| LedgerError::validation("amount is required"))?;

        let tx = self
            .engine
            .submit(
                &grant,
                NewWalletTransaction {
                    customer_id: customer.id,
                    r#type,
                    amount: Amount::new(amount)?,
                    reference: command.r#ref.clone(),
                    description: command.note,
                },
            )
            .await?;
        if let Some(reference) = command.r#ref {
            self.refs.insert(reference, tx.id);
        }
        Ok(())
    }

    fn actor(&self, command: &Command) -> Result<&Actor> {
        let id = command
            .actor
            .as_deref()
            .ok_or_else(|| LedgerError::validation("actor is required"))?;
        self.actors
            .get(&ActorId::from(id))
            .ok_or_else(|| LedgerError::not_found(format!("actor {}", id)))
    }

    fn referenced(&self, command: &Command) -> Result<TransactionId> {
        let reference = command
            .r#ref
            .as_deref()
            .ok_or_else(|| LedgerError::validation("ref is required"))?;
        self.transaction_id(reference)
            .ok_or_else(|| LedgerError::not_found(format!("transaction reference {}", reference)))
    }

    async fn customer(&self, command: &Command) -> Result<Customer> {
        let id = command
            .customer
            .as_deref()
            .ok_or_else(|| LedgerError::validation("customer is required"))?;
        self.engine
            .store()
            .customer(&CustomerId::from(id))
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("customer {}", id)))
    }

    async fn transaction_scope(&self, id: TransactionId) -> Result<Scope> {
        let tx = self
            .engine
            .store()
            .transaction(id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("wallet transaction {}", id)))?;
        Ok(Scope::Shop {
            business_id: tx.business_id,
            shop_id: tx.shop_id,
        })
    }
}

fn shop_scope(customer: &Customer) -> Scope {
    Scope::Shop {
        business_id: customer.business_id.clone(),
        shop_id: customer.shop_id.clone(),
    }
}

/// The widest scope an actor is bound to.
fn own_scope(actor: &Actor) -> Result<Scope> {
    match (&actor.business_id, &actor.shop_id) {
        (Some(business_id), Some(shop_id)) => Ok(Scope::Shop {
            business_id: business_id.clone(),
            shop_id: shop_id.clone(),
        }),
        (Some(business_id), None) => Ok(Scope::Business(business_id.clone())),
        (None, _) => Err(LedgerError::validation(format!(
            "{} is not bound to a business; name a customer to choose one",
            actor.name
        ))),
    }
}
