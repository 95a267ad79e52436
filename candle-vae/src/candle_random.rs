//! Tensor draws from an explicit random source.
//!
//! All noise is generated on CPU in `f32` from the caller's `Rng`,
//! converted to the requested dtype and only then moved to the target
//! device (Metal doesn't support every dtype conversion on device).
//! The same seed therefore gives the same tensors on every backend.

use candle_core::{DType, Device, Result, Shape, Tensor};
use rand::Rng;
use rand_distr::StandardNormal;

fn from_f32_vec(data: Vec<f32>, shape: Shape, dtype: DType, device: &Device) -> Result<Tensor> {
    Tensor::from_vec(data, shape, &Device::Cpu)?
        .to_dtype(dtype)?
        .to_device(device)
}

/// `eps ~ N(0, 1)` elementwise
pub fn randn_tensor<S, R>(shape: S, dtype: DType, device: &Device, rng: &mut R) -> Result<Tensor>
where
    S: Into<Shape>,
    R: Rng + ?Sized,
{
    let shape = shape.into();
    let data = (0..shape.elem_count())
        .map(|_| rng.sample::<f32, _>(StandardNormal))
        .collect();
    from_f32_vec(data, shape, dtype, device)
}

/// `u ~ U[0, 1)` elementwise
pub fn uniform_tensor<S, R>(shape: S, dtype: DType, device: &Device, rng: &mut R) -> Result<Tensor>
where
    S: Into<Shape>,
    R: Rng + ?Sized,
{
    let shape = shape.into();
    let data = (0..shape.elem_count()).map(|_| rng.random::<f32>()).collect();
    from_f32_vec(data, shape, dtype, device)
}

/// `x ~ Bernoulli(theta)` elementwise; entries of the result are
/// exactly 0 or 1, in `theta`'s dtype and on `theta`'s device
pub fn bernoulli_tensor<R>(theta: &Tensor, rng: &mut R) -> Result<Tensor>
where
    R: Rng + ?Sized,
{
    let u = uniform_tensor(theta.shape().clone(), theta.dtype(), theta.device(), rng)?;
    u.lt(theta)?.to_dtype(theta.dtype())
}
