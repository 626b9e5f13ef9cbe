//! Inventory ledger domain module.
//!
//! This crate contains the business rules of the stock ledger, implemented
//! purely as deterministic domain logic (no IO, no HTTP, no storage): ledger
//! entries, the FIFO consumption planner and the stock report.

pub mod command;
pub mod entry;
pub mod error;
pub mod fifo;
pub mod report;

pub use command::{DispenseStock, ReceiveStock};
pub use entry::{StockInEntry, StockOutEntry};
pub use error::StockError;
pub use fifo::{Consumption, ConsumptionPlan, ConsumptionStep, plan_consumption};
pub use report::{LedgerHistory, Reconciliation, StockReport};
