use std::env::var;

use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::{
    Layer,
    filter::{Directive, EnvFilter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Output format of the log layer, picked with `RUST_LOG_FORMAT`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Compact,
        }
    }
}

/// Initialize tracing with `directive` (e.g. `"debug"` or `"fleetwatch=debug"`)
/// as the default filter. `RUST_LOG` still wins.
pub fn init_with_directive(directive: &str) {
    match directive.parse::<Directive>() {
        Ok(directive) => initialize_tracing(directive, None),
        Err(error) => initialize_tracing(
            LevelFilter::INFO.into(),
            Some(format!("Invalid log directive {directive:?}, falling back to info: {error}")),
        ),
    }
}

fn initialize_tracing(default_directive: Directive, deferred_warning: Option<String>) {
    let env_filter = EnvFilter::builder().with_default_directive(default_directive).from_env_lossy();

    let log_format = var("RUST_LOG_FORMAT").map(|raw| LogFormat::parse(&raw)).unwrap_or_default();

    let log_layer = match log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer().json().with_filter(env_filter).boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .without_time()
            .with_filter(env_filter)
            .boxed(),
    };

    tracing_subscriber::registry().with(log_layer).init();

    if let Some(message) = deferred_warning {
        warn!("{message}");
    }
}
