use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `level`; a second
/// call is a no-op.
pub fn init_tracing(level: &str) {
  let env_filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(level))
    .unwrap_or_else(|_| EnvFilter::new("info"));

  let fmt_layer = fmt::layer()
    .compact()
    .with_target(true)
    .with_writer(std::io::stdout);

  if tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt_layer)
    .try_init()
    .is_err()
  {
    tracing::debug!("Tracing subscriber already installed");
  }
}
