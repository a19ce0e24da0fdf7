use tracing_subscriber::{
    filter::{Directive, LevelFilter},
    EnvFilter,
};

/// Install the global fmt subscriber.
///
/// `RUST_LOG` takes precedence; without it the service logs at `level` and
/// sqlx statement logging is held to warnings.
pub fn init_tracing(level: &str) {
    let default: Directive = format!("consumption_service={level}")
        .parse()
        .unwrap_or_else(|_| LevelFilter::INFO.into());

    let mut filter = EnvFilter::builder()
        .with_default_directive(default)
        .from_env_lossy();
    if let Ok(quiet_sqlx) = "sqlx=warn".parse() {
        filter = filter.add_directive(quiet_sqlx);
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
