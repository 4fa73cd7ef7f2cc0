//! Logger setup for the harness.
//!
//! `wgpu` and `naga` log adapter probing and shader translation at `info`, which drowns the
//! harness's own startup messages. Unless a filter is given, those targets are held at
//! `warn` while the harness logs at [`LoggingConfig::level`].

/// Targets of the GPU stack that stay at `warn` under the default filter.
const GPU_TARGETS: [&str; 4] = ["wgpu_core", "wgpu_hal", "naga", "winit"];

/// Logger configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Full `env_logger` filter, e.g. "gles_harness=debug,wgpu_core=info". Overrides
    /// `RUST_LOG` and `level`.
    pub filter: Option<String>,
    /// Level for everything outside the GPU stack when no filter is set.
    pub level: log::LevelFilter,
    /// Prefix records with a millisecond timestamp.
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            level: log::LevelFilter::Info,
            timestamps: true,
        }
    }
}

impl LoggingConfig {
    /// The filter applied when neither `filter` nor `RUST_LOG` is set.
    pub fn default_filter(&self) -> String {
        let mut filter = self.level.to_string().to_lowercase();
        for target in GPU_TARGETS {
            let level = self.level.min(log::LevelFilter::Warn);
            filter.push_str(&format!(",{target}={}", level.to_string().to_lowercase()));
        }
        filter
    }
}

/// Installs the global logger.
///
/// The filter comes from `config.filter`, else `RUST_LOG`, else
/// [`LoggingConfig::default_filter`]. Returns `false` if a logger was already installed,
/// as happens when called twice or under a test harness that owns one.
pub fn init_logging(config: LoggingConfig) -> bool {
    let env = env_logger::Env::default().default_filter_or(config.default_filter());
    let mut builder = env_logger::Builder::from_env(env);
    if let Some(filter) = &config.filter {
        builder.parse_filters(filter);
    }
    if config.timestamps {
        builder.format_timestamp_millis();
    } else {
        builder.format_timestamp(None);
    }

    if builder.try_init().is_err() {
        return false;
    }
    log::debug!("logging initialized");
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_targets_are_quieter_by_default() {
        let filter = LoggingConfig::default().default_filter();
        assert!(filter.starts_with("info,"));
        assert!(filter.contains("wgpu_core=warn"));
        assert!(filter.contains("naga=warn"));
    }

    #[test]
    fn gpu_targets_never_exceed_the_harness_level() {
        let config = LoggingConfig {
            level: log::LevelFilter::Error,
            ..LoggingConfig::default()
        };
        let filter = config.default_filter();
        assert!(filter.starts_with("error,"));
        assert!(filter.contains("wgpu_hal=error"));
    }

    #[test]
    fn second_init_is_refused() {
        init_logging(LoggingConfig::default());
        assert!(!init_logging(LoggingConfig::default()));
    }
}
