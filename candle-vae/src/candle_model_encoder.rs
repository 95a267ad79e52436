use crate::candle_aux_layers::*;
use crate::candle_model_traits::*;
use candle_core::{Result, Tensor};
use candle_nn::{Linear, Module, VarBuilder};

/// log-sigma range of the encoder output (log variance in [-8, 8])
pub const MIN_LOGSIGMA: f64 = -4.;
pub const MAX_LOGSIGMA: f64 = 4.;

/// Feed-forward Gaussian encoder
///
/// x -> [fc + relu]* -> (mu, logsigma)
pub struct GaussianEncoder {
    n_features: usize,
    n_latent: usize,
    fc: StackLayers<Linear>,
    z_mean: Linear,
    z_logsigma: Linear,
}

impl EncoderModuleT for GaussianEncoder {
    fn encode(&self, x_nd: &Tensor) -> Result<(Tensor, Tensor)> {
        self.latent_gaussian_params(x_nd)
    }

    fn dim_obs(&self) -> usize {
        self.n_features
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}

impl GaussianEncoder {
    ///
    /// Evaluate latent Gaussian parameters: mu and log sigma
    /// z ~ (mu(x), log_sigma(x))
    pub fn latent_gaussian_params(&self, x_nd: &Tensor) -> Result<(Tensor, Tensor)> {
        let h_nl = self.fc.forward(x_nd)?;
        let z_mean_nk = self.z_mean.forward(&h_nl)?;
        let z_logsigma_nk = self
            .z_logsigma
            .forward(&h_nl)?
            .clamp(MIN_LOGSIGMA, MAX_LOGSIGMA)?;
        Ok((z_mean_nk, z_logsigma_nk))
    }

    /// Will create a new encoder module with these variables:
    ///
    /// * `nn.enc.fc.{}.weight` where {} is the layer index
    /// * `nn.enc.z.mean.weight`
    /// * `nn.enc.z.logsigma.weight`
    ///
    /// # Arguments
    /// * `n_features` - the number of features (input dim)
    /// * `n_latent` - the number of latent dimensions
    /// * `layers` - fully connected layers, each with the dim
    /// * `vs` - variable builder
    pub fn new(
        n_features: usize,
        n_latent: usize,
        layers: &[usize],
        vs: VarBuilder,
    ) -> Result<Self> {
        // (1) data -> fc
        let (fc, prev_dim) = relu_stack(n_features, layers, "nn.enc.fc", vs.clone())?;

        // (2) fc -> K
        let z_mean = candle_nn::linear(prev_dim, n_latent, vs.pp("nn.enc.z.mean"))?;
        let z_logsigma = candle_nn::linear(prev_dim, n_latent, vs.pp("nn.enc.z.logsigma"))?;

        Ok(Self {
            n_features,
            n_latent,
            fc,
            z_mean,
            z_logsigma,
        })
    }
}
