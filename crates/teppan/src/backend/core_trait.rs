use async_trait::async_trait;
use crate::error::{ModelFault, TokenizerFault};

/// # Tokenizer
///
/// The text to token-id mapping consumed by the decoder.
///
/// Implementations must be deterministic: encoding the same text twice yields
/// the same ids, and `decode(encode(text))` recovers `text` up to whatever
/// normalization the underlying vocabulary applies (for example whitespace
/// collapsing). Any beginning-of-sequence token the model expects is added by
/// `encode` itself.
pub trait Tokenizer: Send + Sync {
    /// Convert text to an ordered sequence of token ids.
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerFault>;

    /// Convert an ordered sequence of token ids back to text.
    fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerFault>;

    /// The reserved end-of-sequence id.
    fn eos_id(&self) -> u32;

    /// The id used to fill buffer slots that hold no token yet.
    ///
    /// Pad ids are fed to the model for frozen and not-yet-reached positions
    /// and never appear in a result.
    fn pad_id(&self) -> u32 {
        self.eos_id()
    }
}

/// # CausalModel
///
/// The forward pass of a pretrained causal language model, seen through the
/// narrowest interface the decoder needs.
///
/// ## Input/Output
///
/// `window[i]` holds row `i`'s tokens for positions `start_pos..cur_pos`; every
/// row of one call has the same length. The model returns one logit vector per
/// row, scoring the token at `cur_pos`.
///
/// The decoder's call schedule is fixed: the first call of a batch covers
/// `0..min_prompt_len`, and every later call covers exactly one new position.
/// Positions a row has no token for are filled with the tokenizer's pad id.
///
/// A prompt that tokenizes to nothing makes `min_prompt_len` zero. The first
/// call then carries zero-width rows at `start_pos == 0` and must still return
/// one logit vector per row; the next call starts over from `start_pos == 0`
/// with one token per row. Models that cannot score an empty input should
/// return a [`ModelFault`], or callers should make sure `encode` adds a
/// beginning-of-sequence token.
///
/// ## Cache ownership
///
/// Any key/value cache lives entirely inside the implementation and is
/// addressed implicitly by `start_pos`. A call with `start_pos == 0` begins a
/// new batch; implementations holding cache state must discard it before
/// scoring. The decoder never inspects that state.
///
/// ## Async Behavior
///
/// The decoder awaits each call to completion before doing anything else, so
/// implementations are free to block inside `forward` or to hand the work to a
/// device queue.
#[async_trait]
pub trait CausalModel: Send {
    /// Score the next position for every row in the batch.
    ///
    /// # Errors
    ///
    /// Any fault returned here aborts the whole completion request unchanged.
    async fn forward(
        &mut self,
        window: &[&[u32]],
        start_pos: usize,
    ) -> Result<Vec<Vec<f32>>, ModelFault>;
}

#[async_trait]
impl<'a, M> CausalModel for &'a mut M
where
    M: CausalModel + ?Sized,
{
    async fn forward(
        &mut self,
        window: &[&[u32]],
        start_pos: usize,
    ) -> Result<Vec<Vec<f32>>, ModelFault> {
        (**self).forward(window, start_pos).await
    }
}

#[async_trait]
impl<M> CausalModel for Box<M>
where
    M: CausalModel + ?Sized,
{
    async fn forward(
        &mut self,
        window: &[&[u32]],
        start_pos: usize,
    ) -> Result<Vec<Vec<f32>>, ModelFault> {
        (**self).forward(window, start_pos).await
    }
}

macro_rules! impl_tokenizer_for_pointer {
    ($($pointer:ty),*) => {
        $(
        impl<T> Tokenizer for $pointer
        where
            T: Tokenizer + ?Sized,
        {
            fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerFault> {
                (**self).encode(text)
            }

            fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerFault> {
                (**self).decode(tokens)
            }

            fn eos_id(&self) -> u32 {
                (**self).eos_id()
            }

            fn pad_id(&self) -> u32 {
                (**self).pad_id()
            }
        }
        )*
    }
}

impl_tokenizer_for_pointer!(&T, Box<T>, std::sync::Arc<T>);
