use clap::{
    Parser,
    Subcommand,
};
use std::path::PathBuf;

pub const DEFAULT_PROMINENCE: f64 = 0.05;
pub const DEFAULT_MAX_PEAKS: usize = 15;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Convert raw lab files into a labeled spectra dataset
    Convert {
        /// Directory scanned recursively for lab files
        #[arg(short, long, default_value = "data/raw")]
        input_dir: PathBuf,

        /// Converted dataset (JSON) to write
        #[arg(short, long, default_value = "data/model/converted.json")]
        output_file: PathBuf,

        /// Cap on the number of lab files converted
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Export a converted dataset as per-spectrum delimited text files
    Export {
        /// Converted dataset (JSON) to read
        #[arg(short, long, default_value = "data/model/converted.json")]
        input_file: PathBuf,

        /// Directory for the exported .txt spectra (must be empty)
        #[arg(short, long, default_value = "data/validation")]
        output_dir: PathBuf,
    },

    /// Extract peak features from a converted dataset
    Extract {
        /// Converted dataset (JSON) to read
        #[arg(short, long, default_value = "data/model/converted.json")]
        input_file: PathBuf,

        /// Training set (JSON) to write
        #[arg(short, long, default_value = "data/model/training.json")]
        output_file: PathBuf,

        /// Peak prominence threshold as a fraction of the max intensity
        #[arg(short, long, default_value_t = DEFAULT_PROMINENCE)]
        prominence: f64,

        /// Number of peak slots in the feature vector
        #[arg(short, long, default_value_t = DEFAULT_MAX_PEAKS)]
        max_peaks: usize,

        /// Add a FWHM feature per peak
        #[arg(long)]
        fwhm: bool,
    },

    /// Cross-validate, train and save a model bundle
    Train {
        /// Training set (JSON) to read
        #[arg(short, long, default_value = "data/model/training.json")]
        input_file: PathBuf,

        /// Model bundle directory to write
        #[arg(short, long, default_value = "data/model")]
        output_dir: PathBuf,

        /// Number of cross-validation folds
        #[arg(long, default_value_t = 5)]
        folds: usize,

        /// Shuffle seed for fold assignment
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Predict exported spectra and compare against the labels in their
    /// file names
    Validate {
        /// Model bundle directory
        #[arg(short, long, default_value = "data/model")]
        model_dir: PathBuf,

        /// Directory of exported .txt spectra
        #[arg(short, long, default_value = "data/validation")]
        input_dir: PathBuf,
    },

    /// Run convert, extract and train with the default layout
    All {
        /// Directory scanned recursively for lab files
        #[arg(short, long, default_value = "data/raw")]
        input_dir: PathBuf,

        /// Working directory for datasets and the model bundle
        #[arg(short, long, default_value = "data/model")]
        output_dir: PathBuf,
    },
}
