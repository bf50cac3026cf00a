mod cli;
mod errors;
mod processing;

use clap::Parser;
use cli::{
    Cli,
    Command,
};
use specseek::FeatureConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

fn main() -> std::result::Result<(), errors::CliError> {
    // This uses the RUST_LOG environment variable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let args = Cli::parse();
    match args.command {
        Command::Convert {
            input_dir,
            output_file,
            limit,
        } => processing::convert(&input_dir, &output_file, limit),
        Command::Export {
            input_file,
            output_dir,
        } => processing::export(&input_file, &output_dir),
        Command::Extract {
            input_file,
            output_file,
            prominence,
            max_peaks,
            fwhm,
        } => processing::extract(
            &input_file,
            &output_file,
            FeatureConfig {
                prominence,
                max_peaks,
                include_fwhm: fwhm,
            },
        ),
        Command::Train {
            input_file,
            output_dir,
            folds,
            seed,
        } => processing::train(&input_file, &output_dir, folds, seed),
        Command::Validate {
            model_dir,
            input_dir,
        } => processing::validate(&model_dir, &input_dir),
        Command::All {
            input_dir,
            output_dir,
        } => processing::run_all(&input_dir, &output_dir),
    }
}
