use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global `tracing` subscriber. `directives` is an
/// `EnvFilter`-style string (e.g. `"info,presencer_service=debug"`); the
/// `RUST_LOG` environment variable, when set, takes precedence.
pub fn init(directives: &str) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(directives.to_owned()));

	let fmt_layer = fmt::layer().with_target(true);

	tracing_subscriber::registry()
		.with(filter)
		.with(fmt_layer)
		.init();
}
