use anyhow::Result;
use candle_core::{DType, Tensor};
use candle_nn::{VarBuilder, VarMap};
use clap::Args;
use log::info;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::candle_data_loader::InMemoryData;
use crate::candle_inference::TrainConfig;
use crate::candle_model_traits::{DecoderModuleT, EncoderModuleT};
use crate::candle_vae::{MlpVae, Vae, VaeConfig, DEFAULT_HIDDEN_DIM};
use crate::candle_vae_inference::{train_vae, TrainScores};
use crate::cli::model_io::save_model;
use crate::cli::{output_file, ComputeDevice};
use crate::common_io::write_lines;
use crate::tensor_io::IoOps;

#[derive(Args, Debug)]
pub struct TrainArgs {
    #[arg(
        required = true,
        help = "Data file",
        long_help = "Data matrix with entries in [0,1].\n\
		     Rows are examples, columns are features.\n\
		     Tab, comma or space separated; gzipped if it ends with `.gz`."
    )]
    pub data_file: Box<str>,

    #[arg(
        long,
        short,
        required = true,
        help = "Output header",
        long_help = "Output header for results:\n\
		     - {out}.safetensors\n\
		     - {out}.model.json\n\
		     - {out}.latent.tsv.gz\n\
		     - {out}.elbo.tsv\n"
    )]
    pub out: Box<str>,

    #[arg(long, help = "Number of header lines to skip")]
    pub skip: Option<usize>,

    #[arg(long, short = 'k', default_value_t = 10, help = "Latent dimension")]
    pub latent_dim: usize,

    #[arg(long, default_value_t = DEFAULT_HIDDEN_DIM, help = "Hidden layer dimension")]
    pub hidden_dim: usize,

    #[arg(long, short = 'e', default_value_t = 100, help = "Number of training epochs")]
    pub epochs: usize,

    #[arg(long, default_value_t = 100, help = "Minibatch size")]
    pub minibatch_size: usize,

    #[arg(long, default_value_t = 1e-3, help = "Learning rate")]
    pub learning_rate: f32,

    #[arg(long, default_value_t = 42, help = "Random seed")]
    pub seed: u64,

    #[arg(long, value_enum, default_value = "cpu", help = "Candle device")]
    pub device: ComputeDevice,

    #[arg(long, default_value_t = 0, help = "Device number (cuda/metal)")]
    pub device_no: usize,

    #[arg(long, short, help = "Verbose mode")]
    pub verbose: bool,
}

pub fn run(args: &TrainArgs) -> Result<()> {
    let dev = args.device.to_device(args.device_no)?;

    // 1. data
    let data_nd = Tensor::from_text(&args.data_file, args.skip)?;
    let (nn, dd) = data_nd.dims2()?;
    info!("Read {} x {} data from {}", nn, dd, args.data_file);

    // 2. model
    let config = VaeConfig::new(dd, args.latent_dim).with_hidden_dim(args.hidden_dim);
    let parameters = VarMap::new();
    let vs = VarBuilder::from_varmap(&parameters, DType::F32, &dev);
    let vae = MlpVae::new(&config, vs)?;

    // fail before training, not in the middle of it
    vae.check_observations(&data_nd)?;

    // 3. training
    let mut data_loader = InMemoryData::new(&data_nd)?;
    let train_config = TrainConfig {
        learning_rate: args.learning_rate,
        batch_size: args.minibatch_size,
        num_epochs: args.epochs,
        device: dev.clone(),
        verbose: args.verbose,
        show_progress: true,
    };

    let mut rng = StdRng::seed_from_u64(args.seed);
    let scores = train_vae(&vae, &parameters, &mut data_loader, &train_config, &mut rng)?;

    // 4. outputs
    info!("Writing down the model parameters");
    save_model(&parameters, &config, &args.out)?;

    info!("Writing down the latent states");
    let latent_nk = evaluate_latent(&vae, &data_nd, args.minibatch_size, &dev)?;
    latent_nk.to_tsv(&output_file(&args.out, "latent.tsv.gz"))?;

    write_scores(&scores, &output_file(&args.out, "elbo.tsv"))?;
    Ok(())
}

/// Posterior means of all rows, evaluated `block_size` rows at a time
pub fn evaluate_latent<Enc, Dec>(
    vae: &Vae<Enc, Dec>,
    data_nd: &Tensor,
    block_size: usize,
    dev: &candle_core::Device,
) -> Result<Tensor>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    let (nn, _) = data_nd.dims2()?;
    let block_size = block_size.max(1);

    let blocks = (0..nn)
        .step_by(block_size)
        .map(|lb| -> Result<Tensor> {
            let x_nd = data_nd.narrow(0, lb, block_size.min(nn - lb))?.to_device(dev)?;
            Ok(vae.encode_latent(&x_nd)?.to_device(&candle_core::Device::Cpu)?)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Tensor::cat(&blocks, 0)?)
}

fn write_scores(scores: &TrainScores, file: &str) -> Result<()> {
    let mut lines: Vec<Box<str>> = vec!["epoch\telbo\tkl".into()];
    lines.extend(
        scores
            .elbo
            .iter()
            .zip(scores.kl.iter())
            .enumerate()
            .map(|(epoch, (elbo, kl))| format!("{}\t{}\t{}", epoch + 1, elbo, kl).into_boxed_str()),
    );
    write_lines(&lines, file)
}
