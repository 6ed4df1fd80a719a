use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt};

pub struct TracerOptions {
    pub default_level: LevelFilter,
}

impl TracerOptions {
    pub fn new(default_level: LevelFilter) -> Self {
        Self { default_level }
    }
}

/// This object initialises the stdout tracer, given a TracerOptions struct.
pub struct TracerEngine {
    service_name: String,
    module_name: String,
}

impl TracerEngine {
    /// Initialises the stdout tracer for the crate
    /// #Arguments
    /// * `options` - The caller-specified instance of TracerOptions.
    /// * `service_name` - The name of the binary being traced.
    /// * `module_name` - The name of the current module.
    /// #Returns
    /// An instance of TracerEngine
    pub fn new(options: TracerOptions, service_name: &str, module_name: &str) -> Self {
        let stdout_tracer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stdout)
            .with_target(false);

        // `RUST_LOG` takes precedence over the default level
        let log_filter = EnvFilter::builder()
            .with_default_directive(options.default_level.into())
            .from_env_lossy();

        let subscriber =
            tracing_subscriber::Registry::default().with(stdout_tracer.with_filter(log_filter));

        if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
            eprintln!("Tracing subscriber already set: {e}");
        }

        Self {
            service_name: service_name.to_owned(),
            module_name: module_name.to_owned(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn module_name(&self) -> &str {
        &self.module_name
    }
}
