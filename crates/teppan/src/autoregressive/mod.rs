//! # Autoregressive Decoding
//!
//! Batched, position-synchronous text completion.
//!
//! ## Overview
//!
//! A [`BatchDecoder`] tokenizes a batch of prompts, lays them out in
//! fixed-size buffers, and repeatedly asks a [`CausalModel`](crate::backend::CausalModel)
//! for next-token logits. Every step advances all rows by one position: rows
//! still inside their prompt keep their prompt token, rows that already
//! stopped are frozen, and every other row samples one token.
//!
//! A row stops when it samples the end-of-sequence id, when it has generated
//! `max_gen_len` tokens, or when it reaches `max_seq_len` tokens in total. The
//! batch ends when every row has stopped or the furthest reachable position
//! has been decoded.
//!
//! ## Key Components
//!
//! * [`BatchDecoder`] - Owns the collaborators and runs one request at a time
//! * [`complete`] - One-shot form over borrowed collaborators
//! * [`Batch`] / [`Sequence`] - Token buffers and per-row lifecycle
//! * [`GenerationLimits`] / [`CompletionOptions`] - Request shape
//! * [`GenerationResult`] - What comes back for each prompt
//! * [`CancellationToken`] - Cooperative abort between steps
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use rand::SeedableRng;
//! use rand::rngs::StdRng;
//! use teppan::autoregressive::{BatchDecoder, CancellationToken, CompletionOptions, GenerationLimits};
//! use teppan::backend::{CausalModel, Tokenizer};
//! use teppan::error::{ModelFault, TokenizerFault};
//! use teppan::sampler::SamplingConfig;
//!
//! /// Bytes as tokens, with 0 as end-of-sequence.
//! struct Bytes;
//!
//! impl Tokenizer for Bytes {
//!     fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerFault> {
//!         Ok(text.bytes().map(u32::from).collect())
//!     }
//!
//!     fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerFault> {
//!         let bytes = tokens.iter().map(|&t| t as u8).collect();
//!         String::from_utf8(bytes).map_err(|e| TokenizerFault::new(e.to_string()))
//!     }
//!
//!     fn eos_id(&self) -> u32 {
//!         0
//!     }
//! }
//!
//! /// Always predicts `!`.
//! struct Shout;
//!
//! #[async_trait]
//! impl CausalModel for Shout {
//!     async fn forward(&mut self, window: &[&[u32]], _start_pos: usize) -> Result<Vec<Vec<f32>>, ModelFault> {
//!         let mut row = vec![0.0; 256];
//!         row[b'!' as usize] = 10.0;
//!         Ok(vec![row; window.len()])
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), teppan::error::DecodeError> {
//! let limits = GenerationLimits::new(32, 3, 2)?;
//! let mut decoder = BatchDecoder::new(Shout, Bytes, limits)?;
//!
//! let results = decoder.complete(
//!     &["hi", "hello"],
//!     &SamplingConfig::greedy(),
//!     &CompletionOptions::default(),
//!     &mut StdRng::seed_from_u64(0),
//!     &CancellationToken::new(),
//! ).await?;
//!
//! assert_eq!(results[0].generated_text, "!!!");
//! assert_eq!(results[1].generated_text, "!!!");
//! # Ok(())
//! # }
//! ```
//!
//! ## Implementation Details
//!
//! The first model call of a batch covers positions `0..min_prompt_len` with
//! `start_pos == 0`; each later call covers exactly one position. Rows that
//! are shorter than the current position are padded with the tokenizer's pad
//! id, and those pad slots are overwritten as the row grows.

mod batch;
mod cancel;
mod config;
mod decoder;
mod result;

pub use batch::{Batch, Sequence, SequenceState, StopReason};
pub use cancel::CancellationToken;
pub use config::{
    CompletionOptions,
    GenerationLimits,
    DEFAULT_MAX_BATCH_SIZE,
    DEFAULT_MAX_GEN_LEN,
    DEFAULT_MAX_SEQ_LEN,
};
pub use decoder::{complete, BatchDecoder};
pub use result::GenerationResult;
