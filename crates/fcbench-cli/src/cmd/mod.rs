pub mod bench;
pub mod config;
