pub mod config;
pub mod errors;
pub mod ingestor;
pub mod metrics;
pub mod models;
pub mod session;
pub mod sources;
pub mod storage;
pub mod utils;
