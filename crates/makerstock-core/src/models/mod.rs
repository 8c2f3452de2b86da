//! Data models for makerspace inventory entities.
//!
//! - `StockItem`: available quantity of a component in a storage case
//! - `Holding`: a user's outstanding borrowed quantity of a component
//! - `Transaction`, `WriteOutcome`: borrow/return payloads and their results
//! - `UserStatus`: check-in status used by the optional borrow verification

pub mod holding;
pub mod stock;
pub mod transaction;
pub mod user;

pub use holding::Holding;
pub use stock::{filter_stock, group_by_case, CaseGroup, StockItem, StockLevel};
pub use transaction::{Transaction, WriteOutcome, WriteResponse};
pub use user::UserStatus;
