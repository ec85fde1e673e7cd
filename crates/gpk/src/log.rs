use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Initialize logging using the tracing crate.
///
/// Uses the `INFO` level by default; `GPK_LOG` overrides everything, and
/// without it the verbosity flag or `RUST_LOG` applies.
pub fn init(verbosity: Option<LevelFilter>) {
    let env_filter = EnvFilter::try_from_env("GPK_LOG").unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(verbosity.unwrap_or(LevelFilter::INFO).into())
            .from_env_lossy()
    });

    let verbose = verbosity.is_some_and(|level| level > LevelFilter::INFO);

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(verbose)
        .with_file(verbose)
        .with_line_number(verbose)
        .init();
}
