//! Tracing initialization: fmt subscriber with an env-driven filter.
//!
//! Verbosity is controlled with `RUST_LOG` (e.g.
//! `RUST_LOG=dealgate=debug,tower_http=debug`); the default keeps the
//! service at `info` and quiets noisy dependencies.

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
