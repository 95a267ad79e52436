//! Variational autoencoder with a diagonal Gaussian posterior and a
//! Bernoulli likelihood.
//!
//! ```text
//! q(z|x) = N(mu(x), diag(exp(logsigma(x)))^2)
//! p(z)   = N(0, I)
//! p(x|z) = Π_d Bernoulli(x_d; theta_d(z))
//! ```
//!
//! The ELBO is estimated with a single reparameterized sample per row:
//! `elbo_i = log p(x_i | z_i) - KL(q(z|x_i) || p(z))`.

use crate::candle_decoder_bernoulli::BernoulliDecoder;
use crate::candle_loss_functions::{bernoulli_likelihood, gaussian_kl_loss};
use crate::candle_model_encoder::GaussianEncoder;
use crate::candle_model_traits::{DecoderModuleT, EncoderModuleT};
use crate::candle_random::{bernoulli_tensor, randn_tensor};
use crate::candle_vae_error::{check_dims2, Result, VaeError};

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use log::debug;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HIDDEN_DIM: usize = 100;

fn default_hidden_dim() -> usize {
    DEFAULT_HIDDEN_DIM
}

/// Model dimensions, fixed at construction
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaeConfig {
    pub input_dim: usize,
    pub latent_dim: usize,
    #[serde(default = "default_hidden_dim")]
    pub hidden_dim: usize,
}

impl VaeConfig {
    pub fn new(input_dim: usize, latent_dim: usize) -> Self {
        Self {
            input_dim,
            latent_dim,
            hidden_dim: DEFAULT_HIDDEN_DIM,
        }
    }

    pub fn with_hidden_dim(mut self, hidden_dim: usize) -> Self {
        self.hidden_dim = hidden_dim;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, dim) in [
            ("input_dim", self.input_dim),
            ("latent_dim", self.latent_dim),
            ("hidden_dim", self.hidden_dim),
        ] {
            if dim == 0 {
                return Err(VaeError::InvalidArgument(format!("{} must be positive", name)));
            }
        }
        Ok(())
    }
}

/// Output of ancestral sampling `z ~ p(z)`, `theta = dec(z)`, `x ~ p(x|z)`
pub struct GenerativeSample {
    /// latent draws (n x k)
    pub z: Tensor,
    /// Bernoulli parameters (n x d)
    pub theta: Tensor,
    /// binary draws (n x d)
    pub x: Tensor,
}

/// Per-example terms of the single-sample ELBO estimate, each (n)
pub struct ElboTerms {
    pub elbo: Tensor,
    pub llik: Tensor,
    pub kl: Tensor,
}

pub struct Vae<Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    encoder: Enc,
    decoder: Dec,
    dtype: DType,
}

/// The feed-forward VAE: one hidden ReLU layer of `hidden_dim` units
/// on each side
pub type MlpVae = Vae<GaussianEncoder, BernoulliDecoder>;

impl MlpVae {
    /// Build encoder and decoder under `vs`
    ///
    /// * `enc.nn.enc.*` - encoder variables
    /// * `dec.nn.dec.*` - decoder variables
    pub fn new(config: &VaeConfig, vs: VarBuilder) -> Result<Self> {
        config.validate()?;
        let layers = [config.hidden_dim];
        let (dd, kk) = (config.input_dim, config.latent_dim);
        let encoder = GaussianEncoder::new(dd, kk, &layers, vs.pp("enc"))?;
        let decoder = BernoulliDecoder::new(dd, kk, &layers, vs.pp("dec"))?;
        Ok(Self::build(encoder, decoder)?.with_dtype(vs.dtype()))
    }
}

impl<Enc, Dec> Vae<Enc, Dec>
where
    Enc: EncoderModuleT,
    Dec: DecoderModuleT,
{
    /// Pair an encoder with a decoder; both must agree on the
    /// observation and latent dimensions
    pub fn build(encoder: Enc, decoder: Dec) -> Result<Self> {
        if encoder.dim_obs() != decoder.dim_obs() || encoder.dim_latent() != decoder.dim_latent() {
            return Err(VaeError::InvalidArgument(format!(
                "encoder ({} -> {}) and decoder ({} -> {}) disagree",
                encoder.dim_obs(),
                encoder.dim_latent(),
                decoder.dim_latent(),
                decoder.dim_obs()
            )));
        }
        if encoder.dim_obs() == 0 || encoder.dim_latent() == 0 {
            return Err(VaeError::InvalidArgument(
                "input and latent dimensions must be positive".into(),
            ));
        }
        Ok(Self {
            encoder,
            decoder,
            dtype: DType::F32,
        })
    }

    /// Floating point type of prior draws in [`Vae::sample`]; must
    /// match the decoder's parameters (default `F32`)
    pub fn with_dtype(mut self, dtype: DType) -> Self {
        self.dtype = dtype;
        self
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn dim_obs(&self) -> usize {
        self.encoder.dim_obs()
    }

    pub fn dim_latent(&self) -> usize {
        self.encoder.dim_latent()
    }

    ///
    /// z = mu + sigma * eps
    /// where eps ~ N(0, 1), sigma = exp(logsigma)
    ///
    /// `eps` does not depend on the parameters, so gradients flow from
    /// `z` back into `mu` and `logsigma`.
    ///
    /// # Arguments
    /// * `mu` - mean of Gaussian distribution (n x k)
    /// * `logsigma` - log standard deviation of Gaussian distribution (n x k)
    /// * `rng` - noise source
    pub fn sample_with_reparameterization<R>(
        &self,
        mu: &Tensor,
        logsigma: &Tensor,
        rng: &mut R,
    ) -> Result<Tensor>
    where
        R: Rng + ?Sized,
    {
        self.check_posterior_params(mu, logsigma)?;
        let eps = randn_tensor(mu.shape().clone(), mu.dtype(), mu.device(), rng)?;
        let sigma = logsigma.exp()?;
        Ok((mu + eps.mul(&sigma)?)?)
    }

    /// KL(N(mu_i, diag(exp(logsigma_i))^2) || N(0, I)) for each row `i`
    ///
    /// # Returns `kl_n` (n)
    pub fn kl_divergence(&self, mu: &Tensor, logsigma: &Tensor) -> Result<Tensor> {
        self.check_posterior_params(mu, logsigma)?;
        Ok(gaussian_kl_loss(mu, logsigma)?)
    }

    /// Monte Carlo estimate of the ELBO with one latent sample per row
    ///
    /// # Arguments
    /// * `x_nd` - observations in [0,1] (n x d)
    /// * `rng` - noise source for the reparameterized sample
    ///
    /// # Returns `elbo_n` (n)
    pub fn elbo<R>(&self, x_nd: &Tensor, rng: &mut R) -> Result<Tensor>
    where
        R: Rng + ?Sized,
    {
        Ok(self.elbo_terms(x_nd, rng)?.elbo)
    }

    /// Same as [`Vae::elbo`], also returning the reconstruction
    /// log-likelihood and KL terms
    pub fn elbo_terms<R>(&self, x_nd: &Tensor, rng: &mut R) -> Result<ElboTerms>
    where
        R: Rng + ?Sized,
    {
        let nn = self.check_observations(x_nd)?;

        let (mu_nk, logsigma_nk) = self.encoder.encode(x_nd)?;
        check_dims2("mu", &mu_nk, Some(nn), self.dim_latent())?;

        let z_nk = self.sample_with_reparameterization(&mu_nk, &logsigma_nk, rng)?;
        let theta_nd = self.decode_checked(&z_nk)?;

        let llik = bernoulli_likelihood(x_nd, &theta_nd)?;
        let kl = gaussian_kl_loss(&mu_nk, &logsigma_nk)?;
        let elbo = (&llik - &kl)?;

        Ok(ElboTerms { elbo, llik, kl })
    }

    /// Ancestral sampling: z ~ N(0, I), theta = dec(z), x ~ Bernoulli(theta)
    ///
    /// # Arguments
    /// * `num_samples` - number of draws (positive)
    /// * `device` - where `z` is allocated; the decoder must live there too
    /// * `rng` - noise source
    pub fn sample<R>(
        &self,
        num_samples: usize,
        device: &Device,
        rng: &mut R,
    ) -> Result<GenerativeSample>
    where
        R: Rng + ?Sized,
    {
        if num_samples == 0 {
            return Err(VaeError::InvalidArgument(
                "number of samples must be positive".into(),
            ));
        }

        let z = randn_tensor((num_samples, self.dim_latent()), self.dtype, device, rng)?;
        let theta = self.decode_checked(&z)?;
        let x = bernoulli_tensor(&theta, rng)?;

        debug!("drew {} samples from the prior", num_samples);
        Ok(GenerativeSample { z, theta, x })
    }

    /// Posterior mean `mu(x)` (n x k), the deterministic latent code
    pub fn encode_latent(&self, x_nd: &Tensor) -> Result<Tensor> {
        let nn = self.check_observations(x_nd)?;
        let (mu_nk, _) = self.encoder.encode(x_nd)?;
        check_dims2("mu", &mu_nk, Some(nn), self.dim_latent())?;
        Ok(mu_nk)
    }

    /// Bernoulli parameters decoded from the posterior mean (n x d)
    pub fn reconstruct(&self, x_nd: &Tensor) -> Result<Tensor> {
        let mu_nk = self.encode_latent(x_nd)?;
        self.decode_checked(&mu_nk)
    }

    /// Fail fast on observations that are not (n x input_dim) with
    /// entries in [0,1]; returns `n`
    pub fn check_observations(&self, x_nd: &Tensor) -> Result<usize> {
        let (nn, _) = check_dims2("x", x_nd, None, self.dim_obs())?;
        if nn == 0 {
            return Err(VaeError::InvalidArgument("empty batch".into()));
        }
        let (lo, hi) = value_range(x_nd)?;
        if !(lo >= 0.0 && hi <= 1.0) {
            return Err(VaeError::DomainViolation(format!(
                "observations must lie in [0,1], found range [{}, {}]",
                lo, hi
            )));
        }
        Ok(nn)
    }

    fn check_posterior_params(&self, mu: &Tensor, logsigma: &Tensor) -> Result<()> {
        let (nn, _) = check_dims2("mu", mu, None, self.dim_latent())?;
        check_dims2("logsigma", logsigma, Some(nn), self.dim_latent())?;
        Ok(())
    }

    fn decode_checked(&self, z_nk: &Tensor) -> Result<Tensor> {
        let (nn, _) = check_dims2("z", z_nk, None, self.dim_latent())?;
        let theta_nd = self.decoder.decode(z_nk)?;
        check_dims2("theta", &theta_nd, Some(nn), self.dim_obs())?;

        let (lo, hi) = value_range(&theta_nd)?;
        if !(lo > 0.0 && hi < 1.0) {
            return Err(VaeError::DomainViolation(format!(
                "decoder output must lie strictly inside (0,1), found range [{}, {}]",
                lo, hi
            )));
        }
        Ok(theta_nd)
    }
}

/// (min, max) over all entries; both NaN if any entry is NaN
///
/// `min_all`/`max_all` skip NaN, so it is looked for separately.
fn value_range(x: &Tensor) -> candle_core::Result<(f64, f64)> {
    if x.ne(x)?.max_all()?.to_scalar::<u8>()? > 0 {
        return Ok((f64::NAN, f64::NAN));
    }
    let lo = x.min_all()?.to_dtype(DType::F64)?.to_scalar::<f64>()?;
    let hi = x.max_all()?.to_dtype(DType::F64)?.to_scalar::<f64>()?;
    Ok((lo, hi))
}
