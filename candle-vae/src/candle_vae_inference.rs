use crate::candle_data_loader::*;
use crate::candle_inference::TrainConfig;
use crate::candle_model_traits::{DecoderModuleT, EncoderModuleT};
use crate::candle_vae::Vae;

use candle_nn::{AdamW, Optimizer};
use indicatif::{ProgressBar, ProgressDrawTarget};
use log::info;
use rand::Rng;

/// Per-epoch averages of the per-example ELBO and KL terms
#[derive(Debug, Clone, Default)]
pub struct TrainScores {
    pub elbo: Vec<f32>,
    pub kl: Vec<f32>,
}

/// Train the VAE by maximizing the single-sample ELBO with AdamW
///
/// * `vae` - encoder/decoder pair whose variables live in `variable_map`
/// * `variable_map` - all trainable variables
/// * `data` - data loader; reshuffled every epoch
/// * `train_config` - training configuration
/// * `rng` - drives both minibatch shuffling and reparameterization noise
pub fn train_vae<Enc, Dec, DataL, R>(
    vae: &Vae<Enc, Dec>,
    variable_map: &candle_nn::VarMap,
    data: &mut DataL,
    train_config: &TrainConfig,
    rng: &mut R,
) -> anyhow::Result<TrainScores>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
    DataL: DataLoader,
    R: Rng + ?Sized,
{
    let device = &train_config.device;
    let mut adam = AdamW::new_lr(
        variable_map.all_vars(),
        train_config.learning_rate.into(),
    )?;

    let pb = ProgressBar::new(train_config.num_epochs as u64);

    if !train_config.show_progress || train_config.verbose {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    let mut elbo_trace = Vec::with_capacity(train_config.num_epochs);
    let mut kl_trace = Vec::with_capacity(train_config.num_epochs);

    let ntot = data.num_data() as f32;

    info!("Start training VAE...");

    for epoch in 0..train_config.num_epochs {
        data.shuffle_minibatch(train_config.batch_size, rng)?;

        let mut elbo_tot = 0f32;
        let mut kl_tot = 0f32;

        for b in 0..data.num_minibatch() {
            let x_nd = data.minibatch_shuffled(b, device)?;
            let terms = vae.elbo_terms(&x_nd, rng)?;

            let loss = terms.elbo.mean_all()?.neg()?;
            let loss_val = loss.to_dtype(candle_core::DType::F32)?.to_scalar::<f32>()?;
            if !loss_val.is_finite() {
                return Err(anyhow::anyhow!(
                    "non-finite loss {} at epoch {}, minibatch {}",
                    loss_val,
                    epoch + 1,
                    b
                ));
            }
            adam.backward_step(&loss)?;

            elbo_tot += terms
                .elbo
                .sum_all()?
                .to_dtype(candle_core::DType::F32)?
                .to_scalar::<f32>()?;
            kl_tot += terms
                .kl
                .sum_all()?
                .to_dtype(candle_core::DType::F32)?
                .to_scalar::<f32>()?;
        }

        elbo_trace.push(elbo_tot / ntot);
        kl_trace.push(kl_tot / ntot);
        pb.inc(1);

        if train_config.verbose {
            info!(
                "[{}] ELBO: {} KL: {}",
                epoch + 1,
                elbo_trace.last().ok_or(anyhow::anyhow!("elbo"))?,
                kl_trace.last().ok_or(anyhow::anyhow!("kl"))?
            );
        }
    } // each epoch

    pb.finish_and_clear();
    info!("done model training");

    Ok(TrainScores {
        elbo: elbo_trace,
        kl: kl_trace,
    })
}
