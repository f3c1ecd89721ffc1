//! Tracing setup: pretty output in development, JSON lines in production.

use tracing_subscriber::EnvFilter;

use crate::config::Mode;

pub fn init(mode: Mode) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match mode {
        Mode::Development => {
            tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
        }
        Mode::Production => {
            tracing_subscriber::fmt().json().with_env_filter(filter).with_current_span(true).init();
        }
    }
}
