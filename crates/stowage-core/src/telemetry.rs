//! Tracing initialization

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "stowage_storage=info,stowage_core=info";

/// Install a global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`. With `json` set, events are
/// emitted as one JSON object per line. Returns an error if a global subscriber
/// is already installed, so test harnesses can call this repeatedly.
pub fn init_tracing(default_filter: &str, json: bool) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .try_init()?;

    tracing::debug!(json, "Tracing initialized");
    Ok(())
}
