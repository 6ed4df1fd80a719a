mod tracer_engine;

pub use tracer_engine::{TracerEngine, TracerOptions};

/// Should be called once, at the start of each binary.
/// Expands to a [TracerEngine] named after the calling binary, logging to stdout.
/// The filter is read from `RUST_LOG`, falling back to the given level.
#[macro_export]
macro_rules! init_tracer {
    ($level:expr) => {{
        let tracer = $crate::tracer::TracerEngine::new(
            $crate::tracer::TracerOptions::new($level),
            env!("CARGO_BIN_NAME"),
            module_path!(),
        );
        ::tracing::debug!(
            "Tracing initialised for {} ({})",
            tracer.service_name(),
            tracer.module_name()
        );
        tracer
    }};
}
