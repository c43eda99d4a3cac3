use serde::{Deserialize, Serialize};
use crate::error::{DecodeError, Result};

/// Default upper bound on prompt plus generated tokens.
pub const DEFAULT_MAX_SEQ_LEN: usize = 128;

/// Default upper bound on generated tokens per sequence.
pub const DEFAULT_MAX_GEN_LEN: usize = 64;

/// Default number of prompts decoded together.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 4;

/// Global length budgets for one completion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationLimits {
    /// Upper bound on prompt plus generated tokens for any sequence.
    pub max_seq_len: usize,

    /// Upper bound on generated tokens for any sequence.
    pub max_gen_len: usize,

    /// Upper bound on the number of prompts in one batch.
    pub max_batch_size: usize,
}

impl GenerationLimits {
    pub fn new(max_seq_len: usize, max_gen_len: usize, max_batch_size: usize) -> Result<Self> {
        let limits = Self { max_seq_len, max_gen_len, max_batch_size };
        limits.validate()?;
        Ok(limits)
    }

    /// Limits whose generation budget fills the whole sequence: `max_seq_len - 1`.
    pub fn unbounded_generation(max_seq_len: usize, max_batch_size: usize) -> Result<Self> {
        Self::new(max_seq_len, max_seq_len.saturating_sub(1), max_batch_size)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_seq_len == 0 {
            return Err(DecodeError::InvalidConfig("max_seq_len must be at least 1".into()));
        }
        if self.max_batch_size == 0 {
            return Err(DecodeError::InvalidConfig("max_batch_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Last position (exclusive) any sequence of this batch can reach.
    pub(crate) fn horizon(&self, max_prompt_len: usize) -> usize {
        self.max_seq_len.min(max_prompt_len.saturating_add(self.max_gen_len))
    }
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self {
            max_seq_len: DEFAULT_MAX_SEQ_LEN,
            max_gen_len: DEFAULT_MAX_GEN_LEN,
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
        }
    }
}

/// Output shaping for one completion request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Prepend the prompt tokens to each returned token list and text.
    pub echo: bool,

    /// Report the log-probability of every generated token.
    pub logprobs: bool,
}
