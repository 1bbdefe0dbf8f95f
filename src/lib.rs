pub mod config;
pub mod engine;
pub mod sink;
pub mod stats;
