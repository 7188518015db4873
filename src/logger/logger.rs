use anyhow::{Result, anyhow};
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

const BOOTSTRAP_FILTER: &str = "info";

pub struct LogConfig {
    pub filter: String,
}

impl From<&crate::settings::Log> for LogConfig {
    fn from(log: &crate::settings::Log) -> Self {
        LogConfig {
            filter: log.filter.clone(),
        }
    }
}

/// Where the active filter came from.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
enum FilterSource {
    Bootstrap,
    Environment,
}

pub struct Logger {
    filter_handle: reload::Handle<EnvFilter, Registry>,
    source: FilterSource,
}

fn initial_filter() -> (EnvFilter, FilterSource) {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, FilterSource::Environment),
        Err(_) => (EnvFilter::new(BOOTSTRAP_FILTER), FilterSource::Bootstrap),
    }
}

impl Logger {
    /// Installs the global subscriber. `RUST_LOG` wins over every later reload.
    pub fn new_bootstrap() -> Self {
        let (filter, source) = initial_filter();
        let (filter_layer, filter_handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt::layer().with_target(true))
            .init();

        Logger {
            filter_handle,
            source,
        }
    }

    pub fn reload_from_config(&self, config: &LogConfig) -> Result<()> {
        if self.source == FilterSource::Environment {
            tracing::debug!(configured = %config.filter, "RUST_LOG set, keeping it");
            return Ok(());
        }
        let filter = EnvFilter::try_new(&config.filter).map_err(|e| anyhow!(e))?;
        self.filter_handle
            .modify(|active| *active = filter)
            .map_err(|e| anyhow!(e))?;
        tracing::debug!(filter = %config.filter, "log filter applied");
        Ok(())
    }
}

/// Sends output through the test harness capture. Repeated calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
