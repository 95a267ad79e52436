use candle_core::{Result, Tensor};

/// KL divergence between a diagonal Gaussian and the standard normal
///
/// KL(N(mu, sigma^2) || N(0, I)) = -0.5 * Σ_k (1 + 2 log(sigma) - mu^2 - sigma^2)
///
/// No clamping here; `exp(2 * logsigma)` overflows to `inf` for very
/// large `logsigma` and that propagates to the caller.
///
/// * `z_mean` - mean of Gaussian distribution (n x k)
/// * `z_logsigma` - log standard deviation of Gaussian distribution (n x k)
///
/// # Returns `kl_n` (n)
pub fn gaussian_kl_loss(z_mean: &Tensor, z_logsigma: &Tensor) -> Result<Tensor> {
    let z_lnvar = (z_logsigma * 2.)?;
    let z_var = z_lnvar.exp()?;
    (z_var - 1. + z_mean.sqr()? - &z_lnvar)?.sum(z_mean.rank() - 1)? * 0.5
}

/// Bernoulli log-likelihood of binary (or [0,1]-valued) data
///
/// llik(i) = Σ_d x(i,d) * log θ(i,d) + (1 - x(i,d)) * log(1 - θ(i,d))
///
/// `theta_nd` must be strictly inside (0,1); a boundary value gives
/// `-inf` or `NaN`.
///
/// * `x_nd` - data tensor (observed data)
/// * `theta_nd` - success probability tensor (reconstruction)
///
pub fn bernoulli_likelihood(x_nd: &Tensor, theta_nd: &Tensor) -> Result<Tensor> {
    let log_theta_nd = theta_nd.log()?;
    let log_one_minus_theta_nd = theta_nd.affine(-1., 1.)?.log()?;
    let one_minus_x_nd = x_nd.affine(-1., 1.)?;

    (x_nd.mul(&log_theta_nd)? + one_minus_x_nd.mul(&log_one_minus_theta_nd)?)?.sum(x_nd.rank() - 1)
}
