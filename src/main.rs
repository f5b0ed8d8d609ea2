use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bidsconv_core::constants::{CONVERTER_ENV, DATA_ROOT_ENV};
use bidsconv_core::{
    BatchConfig, Dcm2Niix, converter_from_env_value, data_root_from_env_value, run_conversion,
};

/// Main entry point for the batch conversion runner
///
/// Converts every `<root>/<subject>/<session>/{anat,func}` directory with dcm2niix, one
/// directory at a time. Takes no arguments; paths come from built-in defaults, optionally
/// overridden through the environment or a `.env` file.
///
/// # Environment Variables
/// - `BIDSCONV_DATA_ROOT`: data root (default: "data")
/// - `BIDSCONV_CONVERTER`: converter executable (default: "dcm2niix")
///
/// # Returns
/// * `Ok(())` - Once every directory has been visited, whatever the converter reported
/// * `Err(anyhow::Error)` - If configuration is invalid or the data root cannot be listed
fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("bidsconv=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = BatchConfig::new(
        data_root_from_env_value(std::env::var(DATA_ROOT_ENV).ok()),
        converter_from_env_value(std::env::var(CONVERTER_ENV).ok()),
    )?;

    tracing::info!("++ Converting sessions under {}", config.data_root().display());
    tracing::info!("++ Using converter {}", config.converter().display());

    let converter = Dcm2Niix::new(config.converter());
    let report = run_conversion(&config, &converter)?;

    tracing::info!(
        "++ Done: {} conversions, {} non-zero exits, {} launch failures",
        report.invocation_count(),
        report.nonzero_exits(),
        report.launch_failures()
    );

    Ok(())
}
