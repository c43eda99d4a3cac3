//! # Model Backends
//!
//! The two collaborators the decoder drives, and adapters that connect them to
//! real tensor libraries.
//!
//! * [`Tokenizer`] maps text to token ids and back.
//! * [`CausalModel`] scores the next position of every row in a batch.
//!
//! ## Feature Flags
//!
//! - `candle`: [`candle::CandleModel`] wraps any candle network that maps a
//!   `(batch, seq)` id tensor to logits
//! - `burn`: [`burn::BurnModel`] does the same for burn networks
//! - `tokenizers`: [`huggingface::HfTokenizer`] loads a `tokenizer.json`
//!
//! Without any feature enabled, implement the traits directly.

mod core_trait;

#[cfg_attr(docsrs, doc(cfg(feature = "candle")))]
#[cfg(feature = "candle")]
/// Candle model adapter.
///
/// Converts windows to `u32` tensors on the network's device and reads the
/// returned logits back as `f32` rows, whatever their dtype.
pub mod candle;

#[cfg_attr(docsrs, doc(cfg(feature = "burn")))]
#[cfg(feature = "burn")]
/// Burn model adapter.
pub mod burn;

#[cfg_attr(docsrs, doc(cfg(feature = "tokenizers")))]
#[cfg(feature = "tokenizers")]
/// Hugging Face `tokenizers` adapter.
pub mod huggingface;

pub use core_trait::*;

#[cfg(test)]
/// Word tokenizer and scripted model doubles.
pub(crate) mod mock;
