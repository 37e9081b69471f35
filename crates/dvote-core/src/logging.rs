//! Tracing subscriber setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LoggingConfig;

const CRATES: [&str; 2] = ["dvote_core", "tests"];

fn directives(level: &str) -> String {
    let mut directives = String::from("warn");
    for krate in CRATES {
        directives.push(',');
        directives.push_str(krate);
        directives.push('=');
        directives.push_str(level);
    }
    directives
}

/// Builds the filter from `RUST_LOG`, falling back to the configured level.
///
/// `RUST_LOG=debug` and `RUST_LOG=trace` raise only this crate's verbosity; any other value
/// is parsed as a full filter directive.
fn build_filter(config: &LoggingConfig) -> EnvFilter {
    match std::env::var("RUST_LOG") {
        Ok(env_filter) if env_filter == "debug" || env_filter == "trace" => {
            EnvFilter::new(directives(&env_filter))
        }
        Ok(_) => EnvFilter::try_from_env("RUST_LOG")
            .unwrap_or_else(|_| EnvFilter::new(directives(&config.level))),
        Err(_) => EnvFilter::new(directives(&config.level)),
    }
}

/// Installs the global subscriber.
///
/// Does nothing if a subscriber is already installed, so embedding applications keep their
/// own setup.
pub fn init_logging(config: &LoggingConfig) {
    let registry = tracing_subscriber::registry().with(build_filter(config));

    let result = if config.format.as_str() == "json" {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        // anything but json logs pretty
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false);
        registry.with(fmt_layer).try_init()
    };

    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}
