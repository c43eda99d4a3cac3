use rand::Rng;
use tracing::{debug, info, warn};
use crate::backend::{CausalModel, Tokenizer};
use crate::error::{DecodeError, ModelFault, Result, TokenizerFault};
use crate::sampler::SamplingConfig;
use super::batch::{Batch, StopReason};
use super::cancel::CancellationToken;
use super::config::{CompletionOptions, GenerationLimits};
use super::result::GenerationResult;

/// Drives a batch of prompts through a [`CausalModel`] one position at a time.
///
/// The decoder owns its model handle and tokenizer for as long as it lives;
/// pass `&mut model` and `&tokenizer` to borrow them instead. Each call to
/// [`complete`](Self::complete) builds a fresh [`Batch`], so per-batch cache
/// state never leaks from one request into the next.
pub struct BatchDecoder<M, T> {
    model: M,
    tokenizer: T,
    limits: GenerationLimits,
}

impl<M, T> BatchDecoder<M, T>
where
    M: CausalModel,
    T: Tokenizer,
{
    /// # Errors
    ///
    /// [`DecodeError::InvalidConfig`] if `limits` has a zero `max_seq_len` or `max_batch_size`.
    pub fn new(model: M, tokenizer: T, limits: GenerationLimits) -> Result<Self> {
        limits.validate()?;
        Ok(Self { model, tokenizer, limits })
    }

    pub fn limits(&self) -> GenerationLimits {
        self.limits
    }

    pub fn tokenizer(&self) -> &T {
        &self.tokenizer
    }

    pub fn model_mut(&mut self) -> &mut M {
        &mut self.model
    }

    pub fn into_parts(self) -> (M, T) {
        (self.model, self.tokenizer)
    }

    /// Generate one completion per prompt.
    ///
    /// Results come back in prompt order. The call is all-or-nothing: on any
    /// error, including cancellation, no partial results are returned.
    ///
    /// # Errors
    ///
    /// * [`DecodeError::InvalidConfig`] for out-of-range sampling parameters
    /// * [`DecodeError::BatchTooLarge`] for more prompts than `max_batch_size`
    /// * [`DecodeError::PromptTooLong`] for a prompt longer than `max_seq_len` tokens
    /// * [`DecodeError::Cancelled`] if `cancel` fires between steps
    /// * [`DecodeError::Model`] and [`DecodeError::Tokenizer`] unchanged from the collaborators
    pub async fn complete<S, R>(
        &mut self,
        prompts: &[S],
        config: &SamplingConfig,
        options: &CompletionOptions,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<Vec<GenerationResult>>
    where
        S: AsRef<str> + Sync,
        R: Rng + Send,
    {
        config.validate()?;
        if prompts.len() > self.limits.max_batch_size {
            return Err(DecodeError::BatchTooLarge {
                limit: self.limits.max_batch_size,
                actual: prompts.len(),
            });
        }
        if prompts.is_empty() {
            return Ok(vec![]);
        }

        let encoded = prompts.iter()
            .map(|prompt| self.tokenizer.encode(prompt.as_ref()))
            .collect::<std::result::Result<Vec<_>, TokenizerFault>>()?;
        let mut batch = Batch::new(encoded, self.limits, self.tokenizer.pad_id())?;

        self.run_steps(&mut batch, config, options, rng, cancel).await?;
        batch.close();

        let results = self.assemble(prompts, batch, options)?;
        info!(
            prompts = results.len(),
            generated = results.iter().map(|r| r.token_count).sum::<usize>(),
            "batch complete"
        );
        Ok(results)
    }

    async fn run_steps<R>(
        &mut self,
        batch: &mut Batch,
        config: &SamplingConfig,
        options: &CompletionOptions,
        rng: &mut R,
        cancel: &CancellationToken,
    ) -> Result<()>
    where R: Rng + Send
    {
        let eos_id = self.tokenizer.eos_id();
        let mut prev_pos = 0;

        for (step, cur_pos) in (batch.min_prompt_len()..batch.horizon()).enumerate() {
            if cancel.is_cancelled() {
                warn!(step, "completion cancelled");
                return Err(DecodeError::Cancelled { step });
            }
            if batch.all_stopped() {
                break;
            }

            let logits = {
                let window = batch.window(prev_pos, cur_pos);
                self.model.forward(&window, prev_pos).await?
            };
            if logits.len() != batch.len() {
                return Err(ModelFault::new(format!(
                    "model returned {} logit rows for a batch of {}",
                    logits.len(),
                    batch.len()
                )).into());
            }

            batch.advance(cur_pos, &logits, config, eos_id, options.logprobs, rng)?;
            debug!(step, cur_pos, active = batch.active_count(), "decode step");
            prev_pos = cur_pos;
        }
        Ok(())
    }

    fn assemble<S>(
        &self,
        prompts: &[S],
        batch: Batch,
        options: &CompletionOptions,
    ) -> Result<Vec<GenerationResult>>
    where S: AsRef<str>
    {
        prompts.iter()
            .zip(batch.into_sequences())
            .map(|(prompt, sequence)| {
                let tokens = if options.echo {
                    sequence.tokens().to_vec()
                } else {
                    sequence.generated_tokens().to_vec()
                };
                let generated_text = self.tokenizer.decode(&tokens)?;
                Ok(GenerationResult {
                    prompt: prompt.as_ref().to_string(),
                    generated_text,
                    token_count: sequence.generated_len(),
                    prompt_tokens: sequence.prompt_len(),
                    tokens,
                    logprobs: options.logprobs.then(|| sequence.logprobs().to_vec()),
                    stop_reason: sequence.stop_reason().unwrap_or(StopReason::MaxGenLen),
                })
            })
            .collect()
    }
}

/// Generate one completion per prompt with borrowed collaborators.
///
/// Shorthand for a [`BatchDecoder`] over `&mut model` and `&tokenizer` with
/// default [`CompletionOptions`] and no cancellation.
#[allow(clippy::too_many_arguments)]
pub async fn complete<M, T, S, R>(
    model: &mut M,
    tokenizer: &T,
    prompts: &[S],
    max_gen_len: usize,
    max_seq_len: usize,
    max_batch_size: usize,
    config: &SamplingConfig,
    rng: &mut R,
) -> Result<Vec<GenerationResult>>
where
    M: CausalModel + ?Sized,
    T: Tokenizer + ?Sized,
    S: AsRef<str> + Sync,
    R: Rng + Send,
{
    let limits = GenerationLimits::new(max_seq_len, max_gen_len, max_batch_size)?;
    BatchDecoder::new(model, tokenizer, limits)?
        .complete(prompts, config, &CompletionOptions::default(), rng, &CancellationToken::new())
        .await
}
