//! Application layer containing the ledger's business logic orchestration.
//!
//! [`engine::LedgerEngine`] is the entry point for confirming, rejecting and
//! adjusting wallet transactions. It drives [`allocation`] to spread credited
//! funds over outstanding purchases, all inside one unit of work per call.

pub mod allocation;
pub mod config;
pub mod engine;
