//! REST API client module for the makerspace inventory backend.
//!
//! This module provides the `ApiClient` for reading cases, components,
//! holdings and live stock, and for submitting borrow/return transactions.
//!
//! Writes go to the scripted backend as `text/plain` JSON. Live stock is
//! read from the spreadsheet values API when credentials are configured.

pub mod client;
pub mod error;
pub mod transport;
pub mod validation;

#[cfg(test)]
pub(crate) mod fake;

pub use client::ApiClient;
pub use error::ApiError;
pub use transport::{HttpResponse, ReqwestTransport, Transport};
