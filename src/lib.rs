// src/lib.rs

pub mod app;
pub mod config;
pub mod core;
pub mod logging;

pub use app::{App, HandlerError, PumpError, RunSummary};
pub use config::{AttributorConfig, ConfigError};
