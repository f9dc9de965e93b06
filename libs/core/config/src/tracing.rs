use crate::Environment;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer, Registry};

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install color-eyre: error locations on, environment section off.
///
/// Repeated calls are ignored, so tests and binaries can both call it.
pub fn install_color_eyre() {
    let _ = color_eyre::config::HookBuilder::default()
        .display_location_section(true)
        .display_env_section(false)
        .install();
}

/// Filter used when `RUST_LOG` is unset.
fn default_directives(environment: &Environment) -> &'static str {
    if environment.is_production() {
        "info,sea_orm=warn,async_nats=warn"
    } else {
        "debug,sea_orm=info,async_nats=info,hyper=info,reqwest=info"
    }
}

/// JSON events in production, compact text otherwise.
fn format_layer(environment: &Environment) -> BoxedLayer {
    if environment.is_production() {
        fmt::layer()
            .json()
            .with_target(false)
            .flatten_event(true)
            .boxed()
    } else {
        fmt::layer().compact().with_target(true).boxed()
    }
}

/// Install the global subscriber: format layer, `tracing-error`'s
/// `ErrorLayer` for span traces in eyre reports, then the env filter.
///
/// Only the first call takes effect.
pub fn init_tracing(environment: &Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(environment)));

    let installed = tracing_subscriber::registry()
        .with(format_layer(environment))
        .with(tracing_error::ErrorLayer::default())
        .with(filter)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(environment = ?environment, "Tracing initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_by_environment() {
        assert!(default_directives(&Environment::Production).starts_with("info"));
        assert!(default_directives(&Environment::Development).starts_with("debug"));
    }

    #[test]
    fn test_init_tracing_is_idempotent() {
        init_tracing(&Environment::Development);
        init_tracing(&Environment::Production);
    }

    #[test]
    fn test_init_tracing_honors_rust_log() {
        temp_env::with_var("RUST_LOG", Some("warn"), || {
            init_tracing(&Environment::Production);
        });
    }

    #[test]
    fn test_install_color_eyre_twice() {
        install_color_eyre();
        install_color_eyre();
    }
}
