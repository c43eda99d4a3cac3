use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use crate::error::ModelFault;
use super::CausalModel;

impl From<candle_core::Error> for ModelFault {
    fn from(err: candle_core::Error) -> Self {
        ModelFault::new(err.to_string())
    }
}

/// A candle network that scores a `(batch, seq)` tensor of `u32` token ids.
///
/// `forward` returns logits shaped `(batch, vocab)` for the last input
/// position, or `(batch, seq, vocab)` from which the last position is taken.
/// Any cache bookkeeping keyed on `start_pos` stays with the implementation.
pub trait TensorForward: Send {
    fn device(&self) -> &Device;

    fn forward(&mut self, input: &Tensor, start_pos: usize) -> candle_core::Result<Tensor>;
}

/// Adapts a [`TensorForward`] network to [`CausalModel`].
pub struct CandleModel<F> {
    inner: F,
}

impl<F: TensorForward> CandleModel<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

#[async_trait]
impl<F: TensorForward> CausalModel for CandleModel<F> {
    async fn forward(&mut self, window: &[&[u32]], start_pos: usize) -> Result<Vec<Vec<f32>>, ModelFault> {
        let input = token_window(window, self.inner.device())?;
        let logits = self.inner.forward(&input, start_pos)?;
        logit_rows(&logits)
    }
}

/// Pack equal-length rows into a `(rows, len)` `u32` tensor.
pub fn token_window(window: &[&[u32]], device: &Device) -> Result<Tensor, ModelFault> {
    let len = window.first().map_or(0, |row| row.len());
    if let Some(row) = window.iter().position(|row| row.len() != len) {
        return Err(ModelFault::new(format!(
            "window row {row} has {} tokens, expected {len}", window[row].len()
        )));
    }
    let flat: Vec<u32> = window.iter().flat_map(|row| row.iter().copied()).collect();
    Ok(Tensor::from_vec(flat, (window.len(), len), device)?)
}

/// Split logits into one `f32` vector per row.
pub fn logit_rows(logits: &Tensor) -> Result<Vec<Vec<f32>>, ModelFault> {
    let logits = match logits.rank() {
        2 => logits.clone(),
        3 => {
            let seq = logits.dim(1)?;
            if seq == 0 {
                return Err(ModelFault::new("logits have an empty sequence dimension"));
            }
            logits.narrow(1, seq - 1, 1)?.squeeze(1)?
        }
        rank => return Err(ModelFault::new(format!("expected rank 2 or 3 logits, got rank {rank}"))),
    };
    Ok(logits.to_dtype(DType::F32)?.to_vec2::<f32>()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scores the next token as a copy of the last one.
    struct Echo {
        weights: Tensor,
        starts: Vec<usize>,
    }

    impl TensorForward for Echo {
        fn device(&self) -> &Device {
            self.weights.device()
        }

        fn forward(&mut self, input: &Tensor, start_pos: usize) -> candle_core::Result<Tensor> {
            self.starts.push(start_pos);
            let seq = input.dim(1)?;
            let last = input.narrow(1, seq - 1, 1)?.squeeze(1)?;
            self.weights.index_select(&last, 0)
        }
    }

    #[test]
    fn test_token_window_shape() {
        let tensor = token_window(&[&[1, 2, 3], &[4, 5, 6]], &Device::Cpu).unwrap();
        assert_eq!(tensor.dims(), &[2, 3]);
        assert_eq!(tensor.to_vec2::<u32>().unwrap(), vec![vec![1, 2, 3], vec![4, 5, 6]]);
    }

    #[test]
    fn test_token_window_rejects_ragged_rows() {
        assert!(token_window(&[&[1, 2], &[3]], &Device::Cpu).is_err());
    }

    #[test]
    fn test_logit_rows_takes_last_position() {
        let logits = Tensor::arange(0f32, 12.0, &Device::Cpu).unwrap()
            .reshape((2, 2, 3)).unwrap();
        assert_eq!(logit_rows(&logits).unwrap(), vec![vec![3.0, 4.0, 5.0], vec![9.0, 10.0, 11.0]]);

        let half = Tensor::ones((1, 2), DType::F16, &Device::Cpu).unwrap();
        assert_eq!(logit_rows(&half).unwrap(), vec![vec![1.0, 1.0]]);

        let flat = Tensor::ones(4, DType::F32, &Device::Cpu).unwrap();
        assert!(logit_rows(&flat).is_err());
    }

    #[tokio::test]
    async fn test_candle_model_scores_each_row() {
        let identity: Vec<f32> = (0..16).map(|i| if i % 5 == 0 { 1.0 } else { 0.0 }).collect();
        let weights = Tensor::from_vec(identity, (4, 4), &Device::Cpu).unwrap();
        let mut model = CandleModel::new(Echo { weights, starts: vec![] });

        let rows = model.forward(&[&[0, 2], &[1, 3]], 0).await.unwrap();
        assert_eq!(rows, vec![vec![0.0, 0.0, 1.0, 0.0], vec![0.0, 0.0, 0.0, 1.0]]);

        model.forward(&[&[1], &[0]], 2).await.unwrap();
        assert_eq!(model.into_inner().starts, vec![0, 2]);
    }
}
