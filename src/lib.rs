pub mod cli;
pub mod config;
pub mod dataset;
pub mod error;
pub mod export;
pub mod logging;
pub mod mapping;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod train;
pub mod types;
