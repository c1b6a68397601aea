pub mod client;
pub mod config;
pub mod duration_log;
pub mod error;
pub mod executor;
pub mod fedora;
pub mod payload;
pub mod report;
pub mod result;
pub mod runner;
pub mod transaction;
pub mod tx_pool;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod mock;

pub use error::{BenchError, Result};
