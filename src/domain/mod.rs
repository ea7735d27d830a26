//! Domain layer: value objects, ledger entities and the ports the engine
//! depends on. Nothing in here knows how data is stored.

pub mod actor;
pub mod audit;
pub mod customer;
pub mod ids;
pub mod money;
pub mod ports;
pub mod purchase;
pub mod receipt;
pub mod transaction;
