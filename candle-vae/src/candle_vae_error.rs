/// Errors raised at the boundary of the VAE core.
///
/// Shape and domain violations are programmer errors: they are reported
/// immediately and never retried.
#[derive(Debug, thiserror::Error)]
pub enum VaeError {
    /// A tensor's dimensions disagree with the `batch`/`latent_dim`/`input_dim` contract
    #[error("shape mismatch for `{name}`: expected {expected}, got {actual:?}")]
    ShapeMismatch {
        name: &'static str,
        expected: String,
        actual: Vec<usize>,
    },

    /// Observations outside [0,1] or likelihood parameters outside (0,1)
    #[error("domain violation: {0}")]
    DomainViolation(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Candle(#[from] candle_core::Error),
}

pub type Result<T> = std::result::Result<T, VaeError>;

/// Check that `x` is a rank-2 tensor with `ncols` columns and, if
/// given, `nrows` rows. Returns `(nrows, ncols)`.
pub fn check_dims2(
    name: &'static str,
    x: &candle_core::Tensor,
    nrows: Option<usize>,
    ncols: usize,
) -> Result<(usize, usize)> {
    let mismatch = || VaeError::ShapeMismatch {
        name,
        expected: match nrows {
            Some(n) => format!("[{}, {}]", n, ncols),
            None => format!("[batch, {}]", ncols),
        },
        actual: x.dims().to_vec(),
    };

    match *x.dims() {
        [n, d] if d == ncols && nrows.is_none_or(|m| m == n) => Ok((n, d)),
        _ => Err(mismatch()),
    }
}
