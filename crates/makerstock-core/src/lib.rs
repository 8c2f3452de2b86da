//! Core library for makerstock.
//!
//! Talks to the makerspace inventory backend (a scripted spreadsheet endpoint),
//! caches read-heavy queries locally and exposes the borrow/return writes.
//!
//! - `api`: HTTP client, request transport, errors and input validation
//! - `cache`: two-tier (memory + disk) response cache with a one hour TTL
//! - `config`: endpoint and credential configuration
//! - `inventory`: stale-while-revalidate view over live stock
//! - `models`: stock, holdings and write payloads

pub mod api;
pub mod cache;
pub mod config;
pub mod inventory;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use cache::CacheManager;
pub use config::Config;
