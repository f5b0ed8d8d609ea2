use bidsconv_core::constants::{CONVERTER_ENV, DATA_ROOT_ENV};
use bidsconv_core::{
    converter_from_env_value, data_root_from_env_value, plan_conversion, run_conversion,
    run_sidecar_updates, BatchConfig, Dcm2Niix, SidecarOptions,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bidsconv")]
#[command(about = "Batch DICOM to NIfTI conversion for subject/session directory trees")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the converter on every anat and func directory
    Convert {
        /// Data root (defaults to $BIDSCONV_DATA_ROOT, then "data")
        #[arg(long)]
        root: Option<PathBuf>,
        /// Converter executable (defaults to $BIDSCONV_CONVERTER, then "dcm2niix")
        #[arg(long)]
        converter: Option<PathBuf>,
    },
    /// Print the converter command lines without running them
    Plan {
        /// Data root (defaults to $BIDSCONV_DATA_ROOT, then "data")
        #[arg(long)]
        root: Option<PathBuf>,
        /// Converter executable (defaults to $BIDSCONV_CONVERTER, then "dcm2niix")
        #[arg(long)]
        converter: Option<PathBuf>,
    },
    /// Merge Philips PAR header parameters into func sidecars
    UpdateSidecars {
        /// Data root (defaults to $BIDSCONV_DATA_ROOT, then "data")
        #[arg(long)]
        root: Option<PathBuf>,
        /// Rewrite sidecars without keeping a timestamped backup
        #[arg(long)]
        no_backup: bool,
    },
}

fn resolve_config(
    root: Option<PathBuf>,
    converter: Option<PathBuf>,
) -> Result<BatchConfig, Box<dyn std::error::Error>> {
    let root = root.unwrap_or_else(|| data_root_from_env_value(std::env::var(DATA_ROOT_ENV).ok()));
    let converter =
        converter.unwrap_or_else(|| converter_from_env_value(std::env::var(CONVERTER_ENV).ok()));
    let config = BatchConfig::new(root, converter)?;
    tracing::info!(
        "++ Data root {}, converter {}",
        config.data_root().display(),
        config.converter().display()
    );
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive("bidsconv=info".parse()?))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Some(Commands::Convert { root, converter }) => {
            let config = resolve_config(root, converter)?;
            let dcm2niix = Dcm2Niix::new(config.converter());
            let report = run_conversion(&config, &dcm2niix)?;
            println!(
                "Ran {} conversions: {} ok, {} non-zero exits, {} failed to launch",
                report.invocation_count(),
                report.succeeded(),
                report.nonzero_exits(),
                report.launch_failures()
            );
        }
        Some(Commands::Plan { root, converter }) => {
            let config = resolve_config(root, converter)?;
            let plan = plan_conversion(&config)?;
            if plan.is_empty() {
                println!("No anat or func directories found.");
            }
            for request in plan {
                println!("{}", request.command_line(config.converter()));
            }
        }
        Some(Commands::UpdateSidecars { root, no_backup }) => {
            let config = resolve_config(root, None)?;
            let options = SidecarOptions {
                create_backup: !no_backup,
            };
            let report = run_sidecar_updates(&config, options)?;
            println!(
                "Checked {} func directories: {} sidecars updated, {} failed, {} without PAR/JSON pairs",
                report.func_dirs,
                report.updates.len(),
                report.failures.len(),
                report.dirs_without_pairs
            );
            for failure in &report.failures {
                eprintln!("Error updating {}: {}", failure.json.display(), failure.reason);
            }
        }
        None => {
            println!("Use 'bidsconv --help' for commands");
        }
    }

    Ok(())
}
