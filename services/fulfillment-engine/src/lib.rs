pub mod allocator;
pub mod auth;
pub mod chain;
pub mod config;
pub mod database;
pub mod dedup;
pub mod errors;
pub mod handlers;
pub mod loader;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::Config;
pub use errors::{FulfillmentError, Result};
