use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the model bundle directory
    #[arg(short, long)]
    pub model_dir: PathBuf,

    /// Address to listen on
    #[arg(short, long)]
    #[clap(default_value("127.0.0.1:3724"))]
    pub address: String,
}
