pub mod browser;
pub mod cache;
pub mod config;
pub mod error;
pub mod figures;
pub mod keys;
pub mod logging;
pub mod metrics;
pub mod natsort;
pub mod selection;
pub mod stats;
pub mod views;
