use approx::assert_abs_diff_eq;
use candle_core::{DType, Device, Result, Tensor, Var};
use candle_nn::{Init, VarBuilder, VarMap};
use candle_vae::candle_model_traits::{DecoderModuleT, EncoderModuleT};
use candle_vae::candle_random::randn_tensor;
use candle_vae::candle_vae::{MlpVae, Vae, VaeConfig};
use candle_vae::candle_vae_error::VaeError;
use rand::rngs::StdRng;
use rand::SeedableRng;

/// q(z|x) = N(0, I) for every row
struct StandardEncoder {
    n_features: usize,
    n_latent: usize,
}

impl EncoderModuleT for StandardEncoder {
    fn encode(&self, x_nd: &Tensor) -> Result<(Tensor, Tensor)> {
        let zeros = Tensor::zeros((x_nd.dim(0)?, self.n_latent), x_nd.dtype(), x_nd.device())?;
        Ok((zeros.clone(), zeros))
    }
    fn dim_obs(&self) -> usize {
        self.n_features
    }
    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}

/// theta = `value` everywhere, whatever z is
struct ConstantDecoder {
    n_features: usize,
    n_latent: usize,
    value: f64,
    extra_cols: usize,
}

impl DecoderModuleT for ConstantDecoder {
    fn decode(&self, z_nk: &Tensor) -> Result<Tensor> {
        let shape = (z_nk.dim(0)?, self.n_features + self.extra_cols);
        Tensor::ones(shape, z_nk.dtype(), z_nk.device())? * self.value
    }
    fn dim_obs(&self) -> usize {
        self.n_features
    }
    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}

/// theta = 0.5 everywhere except a NaN in the first entry
struct NanDecoder {
    n_features: usize,
    n_latent: usize,
}

impl DecoderModuleT for NanDecoder {
    fn decode(&self, z_nk: &Tensor) -> Result<Tensor> {
        let nn = z_nk.dim(0)?;
        let mut theta = vec![0.5f64; nn * self.n_features];
        theta[0] = f64::NAN;
        Tensor::from_vec(theta, (nn, self.n_features), z_nk.device())?.to_dtype(z_nk.dtype())
    }
    fn dim_obs(&self) -> usize {
        self.n_features
    }
    fn dim_latent(&self) -> usize {
        self.n_latent
    }
}

fn stub_vae(d: usize, k: usize, value: f64) -> Vae<StandardEncoder, ConstantDecoder> {
    let enc = StandardEncoder {
        n_features: d,
        n_latent: k,
    };
    let dec = ConstantDecoder {
        n_features: d,
        n_latent: k,
        value,
        extra_cols: 0,
    };
    Vae::build(enc, dec)
        .expect("matching dims")
        .with_dtype(DType::F64)
}

fn mlp_vae(input_dim: usize, latent_dim: usize) -> (MlpVae, VarMap) {
    let varmap = VarMap::new();
    let vs = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
    let vae = MlpVae::new(&VaeConfig::new(input_dim, latent_dim), vs).expect("mlp vae");
    (vae, varmap)
}

fn binary_batch() -> Result<Tensor> {
    Tensor::new(
        &[[0f32, 1., 1., 0.], [1., 0., 0., 0.], [1., 1., 1., 1.]],
        &Device::Cpu,
    )
}

////////////////////////////////
// reparameterized sampling   //
////////////////////////////////

#[test]
fn reparameterized_samples_match_posterior_moments() -> anyhow::Result<()> {
    let vae = stub_vae(3, 2, 0.5);
    let mut rng = StdRng::seed_from_u64(17);

    let n = 20_000;
    let sigma = [1.0f64, 0.5];
    let mu = Tensor::new(&[[1.0f64, -2.0]], &Device::Cpu)?
        .broadcast_as((n, 2))?
        .contiguous()?;
    let logsigma = Tensor::new(&[[sigma[0].ln(), sigma[1].ln()]], &Device::Cpu)?
        .broadcast_as((n, 2))?
        .contiguous()?;

    let z = vae.sample_with_reparameterization(&mu, &logsigma, &mut rng)?;
    assert_eq!(z.dims(), &[n, 2]);

    let mean = z.mean_keepdim(0)?;
    let std = z
        .broadcast_sub(&mean)?
        .sqr()?
        .mean(0)?
        .sqrt()?
        .to_vec1::<f64>()?;
    let mean = mean.squeeze(0)?.to_vec1::<f64>()?;

    assert_abs_diff_eq!(mean[0], 1.0, epsilon = 0.05);
    assert_abs_diff_eq!(mean[1], -2.0, epsilon = 0.05);
    assert_abs_diff_eq!(std[0], sigma[0], epsilon = 0.05);
    assert_abs_diff_eq!(std[1], sigma[1], epsilon = 0.05);
    Ok(())
}

#[test]
fn gradients_flow_through_reparameterization() -> anyhow::Result<()> {
    let vae = stub_vae(3, 2, 0.5);
    let mut rng = StdRng::seed_from_u64(3);

    let mu = Var::new(&[[0.5f64, -1.0], [2.0, 0.0]], &Device::Cpu)?;
    let logsigma = Var::new(&[[0.1f64, -0.3], [0.0, 0.2]], &Device::Cpu)?;

    let z = vae.sample_with_reparameterization(mu.as_tensor(), logsigma.as_tensor(), &mut rng)?;
    let grads = z.sum_all()?.backward()?;

    let grad_mu = grads.get(mu.as_tensor()).expect("grad mu").to_vec2::<f64>()?;
    assert_eq!(grad_mu, vec![vec![1.0, 1.0], vec![1.0, 1.0]]);

    // dz/dlogsigma = eps * sigma = z - mu
    let grad_ls = grads.get(logsigma.as_tensor()).expect("grad logsigma").to_vec2::<f64>()?;
    let expected = (&z - mu.as_tensor())?.to_vec2::<f64>()?;
    for (g, e) in grad_ls.iter().flatten().zip(expected.iter().flatten()) {
        assert_abs_diff_eq!(*g, *e, epsilon = 1e-12);
    }
    Ok(())
}

////////////////////
// KL divergence  //
////////////////////

#[test]
fn kl_is_zero_for_standard_normal() -> anyhow::Result<()> {
    let vae = stub_vae(3, 4, 0.5);
    let zeros = Tensor::zeros((5, 4), DType::F64, &Device::Cpu)?;
    let kl = vae.kl_divergence(&zeros, &zeros)?;
    assert_eq!(kl.to_vec1::<f64>()?, vec![0.0; 5]);
    Ok(())
}

#[test]
fn kl_is_non_negative() -> anyhow::Result<()> {
    let vae = stub_vae(3, 4, 0.5);
    let mut rng = StdRng::seed_from_u64(99);

    let mu = (randn_tensor((200, 4), DType::F64, &Device::Cpu, &mut rng)? * 3.0)?;
    let logsigma = (randn_tensor((200, 4), DType::F64, &Device::Cpu, &mut rng)? * 1.5)?;
    let kl = vae.kl_divergence(&mu, &logsigma)?.to_vec1::<f64>()?;

    assert_eq!(kl.len(), 200);
    assert!(kl.iter().all(|&v| v >= 0.0), "negative KL in {:?}", kl);
    Ok(())
}

#[test]
fn kl_increases_with_mean_magnitude() -> anyhow::Result<()> {
    let vae = stub_vae(3, 2, 0.5);
    let logsigma = Tensor::new(&[[0.2f64, -0.4]], &Device::Cpu)?;

    let kl = |mu: &[f64; 2]| -> anyhow::Result<f64> {
        let mu = Tensor::new(&[*mu], &Device::Cpu)?;
        Ok(vae.kl_divergence(&mu, &logsigma)?.to_vec1::<f64>()?[0])
    };

    assert!(kl(&[0.6, -0.7])? > kl(&[0.3, -0.7])?);
    assert!(kl(&[0.3, -1.4])? > kl(&[0.3, -0.7])?);
    // the sign of the mean does not matter
    assert_abs_diff_eq!(kl(&[-0.3, 0.7])?, kl(&[0.3, -0.7])?, epsilon = 1e-12);
    Ok(())
}

////////////
// ELBO   //
////////////

#[test]
fn elbo_with_uninformative_decoder() -> anyhow::Result<()> {
    let d = 6;
    let vae = stub_vae(d, 2, 0.5);
    let mut rng = StdRng::seed_from_u64(0);

    for value in [0.0f64, 1.0] {
        let x = (Tensor::ones((3, d), DType::F64, &Device::Cpu)? * value)?;
        let elbo = vae.elbo(&x, &mut rng)?;
        assert_eq!(elbo.dims(), &[3]);
        for v in elbo.to_vec1::<f64>()? {
            assert_abs_diff_eq!(v, d as f64 * 0.5f64.ln(), epsilon = 1e-9);
        }
    }
    Ok(())
}

#[test]
fn elbo_guards_decoder_boundary() -> anyhow::Result<()> {
    let mut rng = StdRng::seed_from_u64(0);
    let x = Tensor::zeros((2, 3), DType::F64, &Device::Cpu)?;

    let saturated = stub_vae(3, 2, 1.0);
    assert!(matches!(
        saturated.elbo(&x, &mut rng),
        Err(VaeError::DomainViolation(_))
    ));

    let zero = stub_vae(3, 2, 0.0);
    assert!(matches!(zero.elbo(&x, &mut rng), Err(VaeError::DomainViolation(_))));

    let wide = Vae::build(
        StandardEncoder {
            n_features: 3,
            n_latent: 2,
        },
        ConstantDecoder {
            n_features: 3,
            n_latent: 2,
            value: 0.5,
            extra_cols: 1,
        },
    )?;
    assert!(matches!(
        wide.elbo(&x, &mut rng),
        Err(VaeError::ShapeMismatch { name: "theta", .. })
    ));
    Ok(())
}

#[test]
fn elbo_rejects_nan_decoder_output() -> anyhow::Result<()> {
    let vae = Vae::build(
        StandardEncoder {
            n_features: 3,
            n_latent: 2,
        },
        NanDecoder {
            n_features: 3,
            n_latent: 2,
        },
    )?
    .with_dtype(DType::F64);
    let mut rng = StdRng::seed_from_u64(0);

    let x = Tensor::zeros((2, 3), DType::F64, &Device::Cpu)?;
    assert!(matches!(vae.elbo(&x, &mut rng), Err(VaeError::DomainViolation(_))));
    assert!(matches!(
        vae.sample(2, &Device::Cpu, &mut rng),
        Err(VaeError::DomainViolation(_))
    ));
    Ok(())
}

#[test]
fn mlp_elbo_shape_and_sign() -> anyhow::Result<()> {
    let (vae, _varmap) = mlp_vae(4, 2);
    let mut rng = StdRng::seed_from_u64(1);
    let elbo = vae.elbo(&binary_batch()?, &mut rng)?;
    assert_eq!(elbo.dims(), &[3]);
    assert!(elbo.to_vec1::<f32>()?.iter().all(|v| v.is_finite() && *v < 0.0));
    Ok(())
}

#[test]
fn elbo_is_reproducible_under_a_fixed_seed() -> anyhow::Result<()> {
    let (vae, _varmap) = mlp_vae(4, 2);
    let x = binary_batch()?;

    let first = vae.elbo(&x, &mut StdRng::seed_from_u64(2024))?.to_vec1::<f32>()?;
    let second = vae.elbo(&x, &mut StdRng::seed_from_u64(2024))?.to_vec1::<f32>()?;
    assert_eq!(first, second);

    let other = vae.elbo(&x, &mut StdRng::seed_from_u64(2025))?.to_vec1::<f32>()?;
    assert_ne!(first, other);
    Ok(())
}

//////////////////////////
// generative sampling  //
//////////////////////////

#[test]
fn generative_samples_have_contract_shapes() -> anyhow::Result<()> {
    let (vae, _varmap) = mlp_vae(4, 2);
    let mut rng = StdRng::seed_from_u64(8);

    let out = vae.sample(25, &Device::Cpu, &mut rng)?;
    assert_eq!(out.z.dims(), &[25, 2]);
    assert_eq!(out.theta.dims(), &[25, 4]);
    assert_eq!(out.x.dims(), &[25, 4]);

    let x = out.x.to_vec2::<f32>()?;
    assert!(x.iter().flatten().all(|&v| v == 0.0 || v == 1.0));

    let theta = out.theta.to_vec2::<f32>()?;
    assert!(theta.iter().flatten().all(|&t| t > 0.0 && t < 1.0));
    Ok(())
}

#[test]
fn generative_samples_are_reproducible() -> anyhow::Result<()> {
    let (vae, _varmap) = mlp_vae(4, 2);

    let a = vae.sample(10, &Device::Cpu, &mut StdRng::seed_from_u64(5))?;
    let b = vae.sample(10, &Device::Cpu, &mut StdRng::seed_from_u64(5))?;
    assert_eq!(a.z.to_vec2::<f32>()?, b.z.to_vec2::<f32>()?);
    assert_eq!(a.x.to_vec2::<f32>()?, b.x.to_vec2::<f32>()?);
    Ok(())
}

#[test]
fn saturated_half_precision_model_still_samples() -> anyhow::Result<()> {
    let config = VaeConfig::new(4, 2).with_hidden_dim(3);
    let varmap = VarMap::new();
    let vs = VarBuilder::from_varmap(&varmap, DType::F16, &Device::Cpu);

    // every logit at +20 drives the f16 sigmoid to exactly 1
    let logits = vs.pp("dec").pp("nn.dec.logits");
    logits.get_with_hints((4, 3), "weight", Init::Const(0.))?;
    logits.get_with_hints(4, "bias", Init::Const(20.))?;
    let vae = MlpVae::new(&config, vs)?;

    let out = vae.sample(3, &Device::Cpu, &mut StdRng::seed_from_u64(4))?;
    assert_eq!(out.z.dtype(), DType::F16);

    let theta = out.theta.to_dtype(DType::F32)?.to_vec2::<f32>()?;
    assert!(theta.iter().flatten().all(|&t| t > 0.0 && t < 1.0));
    Ok(())
}

#[test]
fn zero_samples_is_invalid() {
    let (vae, _varmap) = mlp_vae(4, 2);
    let mut rng = StdRng::seed_from_u64(0);
    assert!(matches!(
        vae.sample(0, &Device::Cpu, &mut rng),
        Err(VaeError::InvalidArgument(_))
    ));
}
