use std::fmt::Debug;
use async_trait::async_trait;
use burn::prelude::{Backend, Int, Tensor};
use burn::tensor::TensorData;
use crate::error::ModelFault;
use super::CausalModel;

/// A burn network that scores a `[batch, seq]` integer tensor of token ids.
///
/// Returns `[batch, vocab]` logits for the last input position.
pub trait BurnForward<B: Backend>: Send {
    fn device(&self) -> &B::Device;

    fn forward(&mut self, input: Tensor<B, 2, Int>, start_pos: usize) -> Tensor<B, 2>;
}

/// Adapts a [`BurnForward`] network to [`CausalModel`].
pub struct BurnModel<B: Backend, F: BurnForward<B>> {
    inner: F,
    _backend: std::marker::PhantomData<fn() -> B>,
}

impl<B: Backend, F: BurnForward<B>> BurnModel<B, F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            _backend: std::marker::PhantomData,
        }
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

#[async_trait]
impl<B, F> CausalModel for BurnModel<B, F>
where
    B: Backend,
    F: BurnForward<B>,
{
    async fn forward(&mut self, window: &[&[u32]], start_pos: usize) -> Result<Vec<Vec<f32>>, ModelFault> {
        let input = token_window::<B>(window, self.inner.device())?;
        logit_rows(self.inner.forward(input, start_pos))
    }
}

fn data_fault(err: impl Debug) -> ModelFault {
    ModelFault::new(format!("{err:?}"))
}

/// Pack equal-length rows into a `[rows, len]` integer tensor.
pub fn token_window<B: Backend>(window: &[&[u32]], device: &B::Device) -> Result<Tensor<B, 2, Int>, ModelFault> {
    let len = window.first().map_or(0, |row| row.len());
    if window.iter().any(|row| row.len() != len) {
        return Err(ModelFault::new("window rows differ in length"));
    }
    let flat: Vec<i64> = window.iter()
        .flat_map(|row| row.iter().map(|&t| i64::from(t)))
        .collect();
    Ok(Tensor::from_data(TensorData::new(flat, [window.len(), len]), device))
}

/// Split `[rows, vocab]` logits into one `f32` vector per row.
pub fn logit_rows<B: Backend>(logits: Tensor<B, 2>) -> Result<Vec<Vec<f32>>, ModelFault> {
    let [rows, vocab] = logits.dims();
    if vocab == 0 {
        return Ok(vec![vec![]; rows]);
    }
    let flat = logits.into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(data_fault)?;
    Ok(flat.chunks(vocab).map(<[f32]>::to_vec).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::backend::ndarray::NdArrayDevice;

    type TestBackend = NdArray<f32>;

    struct Uniform {
        device: NdArrayDevice,
        vocab: usize,
    }

    impl BurnForward<TestBackend> for Uniform {
        fn device(&self) -> &NdArrayDevice {
            &self.device
        }

        fn forward(&mut self, input: Tensor<TestBackend, 2, Int>, _start_pos: usize) -> Tensor<TestBackend, 2> {
            let [batch, _] = input.dims();
            Tensor::ones([batch, self.vocab], &self.device)
        }
    }

    #[test]
    fn test_token_window_layout() {
        let device = NdArrayDevice::default();
        let tensor = token_window::<TestBackend>(&[&[1, 2], &[3, 4]], &device).unwrap();
        assert_eq!(tensor.dims(), [2, 2]);
        let ids = tensor.into_data().convert::<i64>().to_vec::<i64>().unwrap();
        assert_eq!(ids, vec![1, 2, 3, 4]);

        assert!(token_window::<TestBackend>(&[&[1, 2], &[3]], &device).is_err());
    }

    #[test]
    fn test_logit_rows() {
        let device = NdArrayDevice::default();
        let logits = Tensor::<TestBackend, 2>::from_floats([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]], &device);
        assert_eq!(logit_rows(logits).unwrap(), vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]);
    }

    #[tokio::test]
    async fn test_burn_model_returns_one_row_per_sequence() {
        let mut model = BurnModel::new(Uniform { device: NdArrayDevice::default(), vocab: 5 });
        let rows = model.forward(&[&[1], &[2], &[3]], 0).await.unwrap();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|row| row == &vec![1.0; 5]));
    }
}
