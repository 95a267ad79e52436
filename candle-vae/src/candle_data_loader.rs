use candle_core::{Device, Tensor};
use rand::seq::SliceRandom;
use rand::Rng;

/// `DataLoader` for minibatch learning
pub trait DataLoader {
    /// Rows of the `batch_idx`-th shuffled minibatch on `target_device`
    fn minibatch_shuffled(
        &self,
        batch_idx: usize,
        target_device: &Device,
    ) -> anyhow::Result<Tensor>;

    fn num_minibatch(&self) -> usize;

    fn num_data(&self) -> usize;

    fn shuffle_minibatch<R>(&mut self, batch_size: usize, rng: &mut R) -> anyhow::Result<()>
    where
        R: Rng + ?Sized;
}

///
/// A simple data loader for in-memory 2d matrix.  Each row will be
/// considered as a feature vector. The number of samples is the
/// number of rows.
///
pub struct InMemoryData {
    input_data: Tensor,
    minibatches: Minibatches,
}

struct Minibatches {
    samples: Vec<u32>,
    chunks: Vec<Tensor>,
}

impl InMemoryData {
    ///
    /// Create a data loader with the main data tensor `data_nd`;
    /// the rows stay on CPU until a minibatch is requested
    ///
    pub fn new(data_nd: &Tensor) -> anyhow::Result<Self> {
        let (nrows, _) = data_nd.dims2()?;
        if nrows == 0 {
            return Err(anyhow::anyhow!("no data rows"));
        }

        Ok(InMemoryData {
            input_data: data_nd.to_device(&Device::Cpu)?,
            minibatches: Minibatches {
                samples: (0..u32::try_from(nrows)?).collect(),
                chunks: vec![],
            },
        })
    }
}

impl DataLoader for InMemoryData {
    fn minibatch_shuffled(
        &self,
        batch_idx: usize,
        target_device: &Device,
    ) -> anyhow::Result<Tensor> {
        let rows = self.minibatches.chunks.get(batch_idx).ok_or_else(|| {
            anyhow::anyhow!(
                "minibatch #{} out of {}; call shuffle_minibatch first",
                batch_idx,
                self.minibatches.chunks.len()
            )
        })?;
        Ok(self.input_data.index_select(rows, 0)?.to_device(target_device)?)
    }

    fn num_minibatch(&self) -> usize {
        self.minibatches.chunks.len()
    }

    fn num_data(&self) -> usize {
        self.minibatches.samples.len()
    }

    fn shuffle_minibatch<R>(&mut self, batch_size: usize, rng: &mut R) -> anyhow::Result<()>
    where
        R: Rng + ?Sized,
    {
        if batch_size == 0 {
            return Err(anyhow::anyhow!("minibatch size must be positive"));
        }

        self.minibatches.samples.shuffle(rng);

        self.minibatches.chunks = self
            .minibatches
            .samples
            .chunks(batch_size)
            .map(|rows| Tensor::from_slice(rows, rows.len(), &Device::Cpu))
            .collect::<candle_core::Result<Vec<_>>>()?;

        Ok(())
    }
}
