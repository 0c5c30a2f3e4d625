pub mod app;
pub mod config;
pub mod cycle;
pub mod log_store;
pub mod logging;
pub mod render;
pub mod stocks;
pub mod summary;
pub mod tracker;
