use anyhow::Result;
use clap::Args;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::cli::model_io::load_model;
use crate::cli::{output_file, ComputeDevice};
use crate::tensor_io::IoOps;

#[derive(Args, Debug)]
pub struct SampleArgs {
    #[arg(
        required = true,
        help = "Model header",
        long_help = "Header of a model written by `train`:\n\
		     reads {model}.model.json and {model}.safetensors"
    )]
    pub model: Box<str>,

    #[arg(long, short = 'n', default_value_t = 10, help = "Number of samples")]
    pub num_samples: usize,

    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output header for results:\n\
		     - {out}.z.tsv.gz\n\
		     - {out}.theta.tsv.gz\n\
		     - {out}.x.tsv.gz\n"
    )]
    pub out: Box<str>,

    #[arg(long, default_value_t = 42, help = "Random seed")]
    pub seed: u64,

    #[arg(long, value_enum, default_value = "cpu", help = "Candle device")]
    pub device: ComputeDevice,

    #[arg(long, default_value_t = 0, help = "Device number (cuda/metal)")]
    pub device_no: usize,
}

pub fn run(args: &SampleArgs) -> Result<()> {
    let dev = args.device.to_device(args.device_no)?;
    let (vae, _parameters, _config) = load_model(&args.model, &dev)?;

    let mut rng = StdRng::seed_from_u64(args.seed);
    let sampled = vae.sample(args.num_samples, &dev, &mut rng)?;

    info!("Writing down {} samples", args.num_samples);
    sampled.z.to_tsv(&output_file(&args.out, "z.tsv.gz"))?;
    sampled.theta.to_tsv(&output_file(&args.out, "theta.tsv.gz"))?;
    sampled.x.to_tsv(&output_file(&args.out, "x.tsv.gz"))?;
    Ok(())
}
