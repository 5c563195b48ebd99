//! Tank Arena - Development Tools

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "tank-tools")]
#[command(about = "Development tools for the tank arena")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate level layout files
    Validate {
        /// Directory of layout files named by level id
        #[arg(default_value = "crates/tank_core/levels")]
        path: PathBuf,
    },
}

fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path } => {
            tracing::info!("Validating layouts in: {}", path.display());
            match tank_tools::validate::validate_level_directory(&path) {
                Ok(report) if report.is_clean() => {
                    println!("{} layout(s) OK", report.files_checked);
                }
                Ok(report) => {
                    for issue in &report.issues {
                        println!("{issue}");
                    }
                    println!(
                        "{} problem(s) in {} layout(s)",
                        report.issues.len(),
                        report.files_checked
                    );
                    std::process::exit(1);
                }
                Err(e) => {
                    tracing::error!("Validation failed: {e}");
                    std::process::exit(1);
                }
            }
        }
    }
}
