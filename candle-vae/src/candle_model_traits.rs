use candle_core::{Result, Tensor};

pub trait EncoderModuleT {
    /// An encoder that spits out the parameters of the approximate
    /// posterior `q(z|x) = N(mu, diag(exp(logsigma))^2)`
    ///
    /// # Arguments
    /// * `x_nd` - input data (n x d)
    ///
    /// # Returns `(mu_nk, logsigma_nk)`
    /// * `mu_nk` - posterior mean (n x k)
    /// * `logsigma_nk` - log standard deviation (n x k)
    fn encode(&self, x_nd: &Tensor) -> Result<(Tensor, Tensor)>;

    fn dim_obs(&self) -> usize;

    fn dim_latent(&self) -> usize;
}

pub trait DecoderModuleT {
    /// A decoder that spits out Bernoulli success probabilities
    /// `theta_nd`, each strictly inside (0,1)
    ///
    /// * `z_nk` - latent states (n x k)
    fn decode(&self, z_nk: &Tensor) -> Result<Tensor>;

    fn dim_obs(&self) -> usize;

    fn dim_latent(&self) -> usize;
}
