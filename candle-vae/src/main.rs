use anyhow::Result;
use candle_vae::cli::{sample, train, Cli, Commands};
use clap::Parser;
use log::info;

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Train(args) => {
            train::run(args)?;
        }
        Commands::Sample(args) => {
            sample::run(args)?;
        }
    }

    info!("Done");
    Ok(())
}
