//! Log subscriber setup for hosts embedding the channel core.
//!
//! The library only emits `tracing` events. A host that has no subscriber
//! of its own can install this one.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;
use crate::domain::{ChannelError, ChannelResult};

/// Install a global fmt subscriber. `RUST_LOG` takes precedence over
/// `config.level`. Fails if a global subscriber is already set.
pub fn init_logging(config: &LogConfig) -> ChannelResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| ChannelError::Config(format!("invalid log filter: {e}")))?;

    let result = if config.json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init()
    };

    result.map_err(|e| ChannelError::Config(format!("log subscriber: {e}")))?;
    tracing::debug!(level = %config.level, json = config.json, "Logging initialized");
    Ok(())
}
