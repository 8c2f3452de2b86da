//! Inventory views built on the API client.
//!
//! `StockView` shows cached live stock immediately and refreshes it in the
//! background (stale-while-revalidate).

pub mod view;

pub use view::{RefreshTask, StockView, ViewPhase};
