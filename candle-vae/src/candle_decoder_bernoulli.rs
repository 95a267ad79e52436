use crate::candle_aux_layers::*;
use crate::candle_model_traits::*;
use candle_core::{DType, Result, Tensor};
use candle_nn::{ops, Linear, Module, VarBuilder};

/// Success probabilities are kept in `[eps, 1 - eps]`, with
/// `eps = BERNOULLI_EPS` in single and double precision
pub const BERNOULLI_EPS: f64 = 1e-6;

/// Smallest margin from 0 and 1 that survives rounding to `dtype`
pub fn bernoulli_eps(dtype: DType) -> f64 {
    match dtype {
        DType::F16 => 1e-3,
        DType::BF16 => 1e-2,
        _ => BERNOULLI_EPS,
    }
}

///////////////////////////////
// Bernoulli Decoder (MLP)   //
///////////////////////////////

pub struct BernoulliDecoder {
    n_features: usize,
    n_latent: usize,
    fc: StackLayers<Linear>,
    logits: Linear,
}

impl BernoulliDecoder {
    /// Will create a new Bernoulli decoder with the following parameters:
    /// * `nn.dec.fc.{}.weight` where {} is the layer index
    /// * `nn.dec.logits.weight`
    ///
    /// # Arguments
    /// * `n_features` - the number of features (output dim)
    /// * `n_latent` - the number of latent dimensions
    /// * `layers` - fully connected layers, each with the dim
    /// * `vs` - variable builder
    pub fn new(
        n_features: usize,
        n_latent: usize,
        layers: &[usize],
        vs: VarBuilder,
    ) -> Result<Self> {
        let (fc, prev_dim) = relu_stack(n_latent, layers, "nn.dec.fc", vs.clone())?;
        let logits = candle_nn::linear(prev_dim, n_features, vs.pp("nn.dec.logits"))?;

        Ok(Self {
            n_features,
            n_latent,
            fc,
            logits,
        })
    }

    /// Unnormalized log-odds before the sigmoid
    pub fn forward_logits(&self, z_nk: &Tensor) -> Result<Tensor> {
        self.logits.forward(&self.fc.forward(z_nk)?)
    }
}

impl DecoderModuleT for BernoulliDecoder {
    /// The sigmoid saturates at exactly 0 or 1, hence the clamp
    fn decode(&self, z_nk: &Tensor) -> Result<Tensor> {
        let theta_nd = ops::sigmoid(&self.forward_logits(z_nk)?)?;
        let eps = bernoulli_eps(theta_nd.dtype());
        theta_nd.clamp(eps, 1. - eps)
    }

    fn dim_obs(&self) -> usize {
        self.n_features
    }

    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}
