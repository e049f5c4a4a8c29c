// src/logging.rs

use color_eyre::eyre::Result;
use directories::ProjectDirs;
use lazy_static::lazy_static;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_error::ErrorLayer;
use tracing_subscriber::{self, EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::LoggingConfig;

lazy_static! {
    pub static ref PROJECT_NAME: String = env!("CARGO_CRATE_NAME").to_uppercase();
    pub static ref LOG_ENV: String = format!("{}_LOGLEVEL", PROJECT_NAME.clone());
    pub static ref LOG_FILE: String = format!("{}.log", env!("CARGO_PKG_NAME"));
}

fn project_directory() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "asecurityteam", env!("CARGO_PKG_NAME"))
}

pub fn get_data_dir() -> PathBuf {
    if let Some(proj_dirs) = project_directory() {
        proj_dirs.data_local_dir().to_path_buf()
    } else {
        PathBuf::from(".").join(".data")
    }
}

/// Filter directive: `RUST_LOG`, then `<CRATE>_LOGLEVEL`, then `<crate>=info`.
pub fn log_level() -> String {
    std::env::var("RUST_LOG")
        .or_else(|_| std::env::var(LOG_ENV.as_str()))
        .unwrap_or_else(|_| format!("{}=info", env!("CARGO_CRATE_NAME")))
}

/// Initializes logging to stderr, plus a log file in the data directory when
/// enabled. Stdout is left alone since the binary writes records there.
pub fn initialize_logging(config: &LoggingConfig) -> Result<()> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);

    let file_layer = if config.log_file {
        let directory = get_data_dir();
        std::fs::create_dir_all(&directory)?;
        let log_file = std::fs::File::create(directory.join(LOG_FILE.as_str()))?;
        Some(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(log_file))
                .with_target(false)
                .with_ansi(false),
        )
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level()))
        .with(stderr_layer)
        .with(file_layer)
        .with(ErrorLayer::default())
        .try_init()?;

    Ok(())
}
