use serde::{Deserialize, Serialize};
use crate::autoregressive::{CancellationToken, CompletionOptions};
use crate::sampler::SamplingConfig;

/// One unit of work for a [`CompletionService`](super::CompletionService).
///
/// Each request becomes exactly one batch: its prompts are decoded together
/// and never mixed with another request's prompts. `seed` initializes the
/// random source for that batch, so equal requests produce equal results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub prompts: Vec<String>,
    #[serde(default)]
    pub config: SamplingConfig,
    #[serde(default)]
    pub options: CompletionOptions,
    #[serde(default)]
    pub seed: u64,
    #[serde(skip)]
    pub cancel: CancellationToken,
}

impl CompletionRequest {
    pub fn new<I, S>(prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prompts: prompts.into_iter().map(Into::into).collect(),
            config: SamplingConfig::default(),
            options: CompletionOptions::default(),
            seed: 0,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_config(mut self, config: SamplingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_options(mut self, options: CompletionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Share `cancel` with the worker; cancelling it aborts this request only.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}
