pub mod model_io;
pub mod sample;
pub mod train;

use clap::{Parser, Subcommand, ValueEnum};

pub use sample::SampleArgs;
pub use train::TrainArgs;

#[derive(Parser)]
#[command(name = "candle-vae")]
#[command(version, about = "Variational autoencoder for binary data")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(
        about = "Fit a VAE by maximizing the evidence lower bound",
        long_about = "Fit a VAE in three steps: \n\
		      (1) Read a matrix of observations in [0,1] (rows are examples)\n\
		      (2) Maximize the single-sample ELBO with AdamW\n\
		      (3) Write the parameters, posterior means, and ELBO trace.\n"
    )]
    Train(TrainArgs),

    #[command(
        about = "Draw new data from a fitted VAE",
        long_about = "Ancestral sampling from a fitted model: \n\
		      z ~ N(0, I), theta = decoder(z), x ~ Bernoulli(theta).\n"
    )]
    Sample(SampleArgs),
}

#[derive(ValueEnum, Clone, Debug, PartialEq)]
#[clap(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cpu,
    Cuda,
    Metal,
}

impl ComputeDevice {
    pub fn to_device(&self, device_no: usize) -> anyhow::Result<candle_core::Device> {
        Ok(match self {
            ComputeDevice::Metal => candle_core::Device::new_metal(device_no)?,
            ComputeDevice::Cuda => candle_core::Device::new_cuda(device_no)?,
            _ => candle_core::Device::Cpu,
        })
    }
}

/// `{prefix}.{suffix}`
pub fn output_file(prefix: &str, suffix: &str) -> String {
    format!("{}.{}", prefix, suffix)
}
