//! # Batch
//!
//! The fixed-capacity token buffers for one completion request, and the
//! per-sequence state machine that decides which slots advance on each step.
//!
//! Every sequence owns a buffer pre-sized to the batch horizon and filled with
//! the pad id past its current length. Sequences never leave their slot: a
//! stopped sequence keeps its index and its buffer is frozen, so position
//! indices stay stable for everyone still decoding.

use rand::Rng;
use serde::{Deserialize, Serialize};
use crate::error::{DecodeError, Result};
use crate::sampler::{log_softmax, sample, SamplingConfig};
use super::config::GenerationLimits;

/// Why a sequence stopped growing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The sampler produced the end-of-sequence id.
    Eos,
    /// The sequence generated `max_gen_len` tokens.
    MaxGenLen,
    /// The sequence reached `max_seq_len` tokens in total.
    MaxSeqLen,
}

/// Lifecycle of one sequence: `Prefilling → Generating → Stopped`.
///
/// There is no transition out of `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceState {
    /// The decode position is still inside the prompt; tokens come from the prompt.
    Prefilling,
    /// Each step samples and appends one token.
    Generating,
    Stopped(StopReason),
}

/// One slot of a [`Batch`].
#[derive(Debug, Clone)]
pub struct Sequence {
    /// Fixed-size buffer, `horizon` long, pad-filled past `len`.
    buffer: Vec<u32>,
    prompt_len: usize,
    len: usize,
    state: SequenceState,
    logprobs: Vec<f32>,
}

impl Sequence {
    fn new(prompt: Vec<u32>, horizon: usize, pad_id: u32, limits: &GenerationLimits) -> Self {
        let prompt_len = prompt.len();
        let mut buffer = prompt;
        buffer.resize(horizon.max(prompt_len), pad_id);

        let state = if limits.max_gen_len == 0 {
            SequenceState::Stopped(StopReason::MaxGenLen)
        } else if prompt_len >= limits.max_seq_len {
            SequenceState::Stopped(StopReason::MaxSeqLen)
        } else if prompt_len == 0 {
            SequenceState::Generating
        } else {
            SequenceState::Prefilling
        };

        Self {
            buffer,
            prompt_len,
            len: prompt_len,
            state,
            logprobs: vec![],
        }
    }

    pub fn prompt_len(&self) -> usize {
        self.prompt_len
    }

    /// Prompt plus generated tokens.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn generated_len(&self) -> usize {
        self.len - self.prompt_len
    }

    pub fn state(&self) -> SequenceState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, SequenceState::Stopped(_))
    }

    pub fn stop_reason(&self) -> Option<StopReason> {
        match self.state {
            SequenceState::Stopped(reason) => Some(reason),
            _ => None,
        }
    }

    /// Index one past the last token, once the sequence has stopped.
    pub fn stop_position(&self) -> Option<usize> {
        self.stop_reason().map(|_| self.len)
    }

    /// Prompt followed by every generated token.
    pub fn tokens(&self) -> &[u32] {
        &self.buffer[..self.len]
    }

    pub fn prompt_tokens(&self) -> &[u32] {
        &self.buffer[..self.prompt_len]
    }

    /// Generated tokens, never including a terminating end-of-sequence id.
    pub fn generated_tokens(&self) -> &[u32] {
        &self.buffer[self.prompt_len..self.len]
    }

    /// Log-probabilities of the generated tokens, if they were recorded.
    pub fn logprobs(&self) -> &[f32] {
        &self.logprobs
    }

    fn stop(&mut self, reason: StopReason) {
        if self.is_active() {
            self.state = SequenceState::Stopped(reason);
        }
    }

    fn push(&mut self, token: u32, logprob: Option<f32>, limits: &GenerationLimits) {
        self.buffer[self.len] = token;
        self.len += 1;
        if let Some(logprob) = logprob {
            self.logprobs.push(logprob);
        }

        if self.generated_len() >= limits.max_gen_len {
            self.stop(StopReason::MaxGenLen);
        } else if self.len >= limits.max_seq_len || self.len >= self.buffer.len() {
            self.stop(StopReason::MaxSeqLen);
        }
    }
}

/// The token buffers of one completion request, decoded in lockstep.
#[derive(Debug, Clone)]
pub struct Batch {
    sequences: Vec<Sequence>,
    horizon: usize,
    limits: GenerationLimits,
}

impl Batch {
    /// Lay out already-tokenized prompts in a fresh batch.
    ///
    /// # Errors
    ///
    /// * [`DecodeError::BatchTooLarge`] if there are more prompts than `max_batch_size`
    /// * [`DecodeError::PromptTooLong`] for the first prompt longer than `max_seq_len`
    pub fn new(prompts: Vec<Vec<u32>>, limits: GenerationLimits, pad_id: u32) -> Result<Self> {
        limits.validate()?;
        if prompts.len() > limits.max_batch_size {
            return Err(DecodeError::BatchTooLarge {
                limit: limits.max_batch_size,
                actual: prompts.len(),
            });
        }
        if let Some((index, prompt)) = prompts.iter()
            .enumerate()
            .find(|(_, p)| p.len() > limits.max_seq_len)
        {
            return Err(DecodeError::PromptTooLong {
                index,
                len: prompt.len(),
                max_seq_len: limits.max_seq_len,
            });
        }

        let max_prompt_len = prompts.iter().map(Vec::len).max().unwrap_or(0);
        let horizon = limits.horizon(max_prompt_len);
        let sequences = prompts.into_iter()
            .map(|prompt| Sequence::new(prompt, horizon, pad_id, &limits))
            .collect();

        Ok(Self { sequences, horizon, limits })
    }

    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Exclusive upper bound on decode positions for this batch.
    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// Position of the first decode step.
    pub fn min_prompt_len(&self) -> usize {
        self.sequences.iter()
            .map(Sequence::prompt_len)
            .min()
            .unwrap_or(0)
    }

    pub fn sequences(&self) -> &[Sequence] {
        &self.sequences
    }

    pub fn into_sequences(self) -> Vec<Sequence> {
        self.sequences
    }

    pub fn active_count(&self) -> usize {
        self.sequences.iter().filter(|s| s.is_active()).count()
    }

    pub fn all_stopped(&self) -> bool {
        self.active_count() == 0
    }

    /// Every row's tokens for positions `start..end`, in slot order.
    pub fn window(&self, start: usize, end: usize) -> Vec<&[u32]> {
        self.sequences.iter()
            .map(|s| &s.buffer[start..end])
            .collect()
    }

    /// Apply one step's logits at decode position `cur_pos`.
    ///
    /// Rows still inside their prompt keep their prompt token; stopped
    /// rows are skipped; every other row samples one token. Sampling the
    /// `eos_id` stops a row without appending anything.
    pub fn advance<R>(
        &mut self,
        cur_pos: usize,
        logits: &[Vec<f32>],
        config: &SamplingConfig,
        eos_id: u32,
        record_logprobs: bool,
        rng: &mut R,
    ) -> Result<()>
    where R: Rng
    {
        let limits = self.limits;
        for (sequence, row) in self.sequences.iter_mut().zip(logits) {
            match sequence.state {
                SequenceState::Stopped(_) => continue,
                SequenceState::Prefilling if cur_pos < sequence.prompt_len => continue,
                _ => sequence.state = SequenceState::Generating,
            }
            debug_assert_eq!(sequence.len, cur_pos);

            let token = sample(row, config, rng)?;
            if token == eos_id {
                sequence.stop(StopReason::Eos);
                continue;
            }
            let logprob = if record_logprobs {
                log_softmax(row).get(token as usize).copied()
            } else {
                None
            };
            sequence.push(token, logprob, &limits);
        }
        Ok(())
    }

    /// Stop whatever is still active once the horizon has been reached.
    pub fn close(&mut self) {
        let limits = self.limits;
        for sequence in self.sequences.iter_mut() {
            let reason = if sequence.len >= limits.max_seq_len {
                StopReason::MaxSeqLen
            } else {
                StopReason::MaxGenLen
            };
            sequence.stop(reason);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const PAD: u32 = 99;
    const EOS: u32 = 0;

    fn limits(max_seq_len: usize, max_gen_len: usize, max_batch_size: usize) -> GenerationLimits {
        GenerationLimits::new(max_seq_len, max_gen_len, max_batch_size).unwrap()
    }

    fn one_hot(vocab: usize, token: u32) -> Vec<f32> {
        let mut row = vec![0.0; vocab];
        row[token as usize] = 10.0;
        row
    }

    #[test]
    fn test_new_rejects_oversized_batch() {
        let err = Batch::new(vec![vec![1], vec![2], vec![3]], limits(8, 4, 2), PAD).unwrap_err();
        assert_eq!(err, DecodeError::BatchTooLarge { limit: 2, actual: 3 });
    }

    #[test]
    fn test_new_names_the_first_long_prompt() {
        let err = Batch::new(vec![vec![1], vec![1; 9], vec![1; 10]], limits(8, 4, 4), PAD).unwrap_err();
        assert_eq!(err, DecodeError::PromptTooLong { index: 1, len: 9, max_seq_len: 8 });
    }

    #[test]
    fn test_buffers_are_padded_to_the_horizon() {
        let batch = Batch::new(vec![vec![5, 6, 7], vec![8]], limits(16, 2, 4), PAD).unwrap();
        assert_eq!(batch.horizon(), 5);
        assert_eq!(batch.min_prompt_len(), 1);
        assert_eq!(batch.window(0, 5), vec![&[5, 6, 7, PAD, PAD][..], &[8, PAD, PAD, PAD, PAD][..]]);
        assert_eq!(batch.sequences()[0].state(), SequenceState::Prefilling);
    }

    #[test]
    fn test_initial_states() {
        let batch = Batch::new(vec![vec![], vec![1; 4]], limits(4, 3, 2), PAD).unwrap();
        assert_eq!(batch.sequences()[0].state(), SequenceState::Generating);
        assert_eq!(batch.sequences()[1].state(), SequenceState::Stopped(StopReason::MaxSeqLen));

        let batch = Batch::new(vec![vec![1, 2]], limits(4, 0, 2), PAD).unwrap();
        assert!(batch.all_stopped());
        assert_eq!(batch.sequences()[0].stop_reason(), Some(StopReason::MaxGenLen));
    }

    #[test]
    fn test_advance_skips_prefilling_rows() {
        let mut batch = Batch::new(vec![vec![5], vec![6, 7, 8]], limits(16, 4, 2), PAD).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let logits = vec![one_hot(10, 3), one_hot(10, 4)];

        batch.advance(1, &logits, &SamplingConfig::greedy(), EOS, false, &mut rng).unwrap();

        assert_eq!(batch.sequences()[0].tokens(), &[5, 3]);
        assert_eq!(batch.sequences()[0].state(), SequenceState::Generating);
        assert_eq!(batch.sequences()[1].tokens(), &[6, 7, 8]);
        assert_eq!(batch.sequences()[1].state(), SequenceState::Prefilling);
    }

    #[test]
    fn test_eos_stops_without_appending_and_freezes_the_row() {
        let mut batch = Batch::new(vec![vec![5], vec![6]], limits(16, 4, 2), PAD).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let greedy = SamplingConfig::greedy();

        batch.advance(1, &[one_hot(10, EOS), one_hot(10, 4)], &greedy, EOS, false, &mut rng).unwrap();
        batch.advance(2, &[one_hot(10, 7), one_hot(10, 4)], &greedy, EOS, false, &mut rng).unwrap();

        let first = &batch.sequences()[0];
        assert_eq!(first.stop_reason(), Some(StopReason::Eos));
        assert_eq!(first.tokens(), &[5]);
        assert_eq!(first.stop_position(), Some(1));
        assert_eq!(batch.window(0, 3)[0], &[5, PAD, PAD]);
        assert_eq!(batch.sequences()[1].generated_tokens(), &[4, 4]);
    }

    #[test]
    fn test_max_gen_len_and_max_seq_len_stop_rows() {
        let mut batch = Batch::new(vec![vec![1], vec![1, 1, 1]], limits(5, 2, 2), PAD).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let greedy = SamplingConfig::greedy();
        let logits = vec![one_hot(10, 2), one_hot(10, 2)];

        for cur_pos in batch.min_prompt_len()..batch.horizon() {
            batch.advance(cur_pos, &logits, &greedy, EOS, false, &mut rng).unwrap();
        }

        assert_eq!(batch.sequences()[0].stop_reason(), Some(StopReason::MaxGenLen));
        assert_eq!(batch.sequences()[0].len(), 3);
        assert_eq!(batch.sequences()[1].stop_reason(), Some(StopReason::MaxGenLen));
        assert_eq!(batch.sequences()[1].len(), 5);

        let mut batch = Batch::new(vec![vec![1, 1, 1]], limits(4, 3, 1), PAD).unwrap();
        batch.advance(3, &[one_hot(10, 2)], &greedy, EOS, false, &mut rng).unwrap();
        assert_eq!(batch.sequences()[0].stop_reason(), Some(StopReason::MaxSeqLen));
        assert_eq!(batch.sequences()[0].len(), 4);
    }

    #[test]
    fn test_logprobs_are_recorded_per_generated_token() {
        let mut batch = Batch::new(vec![vec![1]], limits(8, 3, 1), PAD).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let row = vec![0.0, 0.0, 0.0, 0.0];

        batch.advance(1, &[row], &SamplingConfig::greedy(), 9, true, &mut rng).unwrap();

        let logprobs = batch.sequences()[0].logprobs();
        assert_eq!(logprobs.len(), 1);
        assert!((logprobs[0] - (0.25f32).ln()).abs() < 1e-6);
    }

    #[test]
    fn test_close_stops_remaining_rows() {
        let mut batch = Batch::new(vec![vec![1], vec![1, 1]], limits(2, 5, 2), PAD).unwrap();
        assert!(!batch.all_stopped());
        batch.close();
        assert_eq!(batch.sequences()[0].stop_reason(), Some(StopReason::MaxGenLen));
        assert_eq!(batch.sequences()[1].stop_reason(), Some(StopReason::MaxSeqLen));
    }
}
