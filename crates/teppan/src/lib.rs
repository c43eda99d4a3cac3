//! # Teppan
//!
//! Batched autoregressive text completion with temperature and nucleus
//! (top-p) sampling.
//!
//! ## Overview
//!
//! Given a handful of prompts, teppan runs them through a causal language
//! model together, one position at a time, and returns one completion per
//! prompt in the order the prompts were given. Each sequence stops on its own
//! when it samples end-of-sequence or exhausts its token budget, while the
//! rest of the batch keeps going.
//!
//! ## Architecture
//!
//! ### Backend Traits
//!
//! [`backend::Tokenizer`] and [`backend::CausalModel`] are the only things the
//! decoder knows about the model. The model sees token windows and returns
//! `f32` logits; any key/value cache stays inside it and is reset whenever a
//! call starts at position zero.
//!
//! ### Sampling
//!
//! [`sampler::sample`] turns one logit vector into a token id: temperature
//! scaling, softmax, top-p truncation, renormalization, and a draw from a
//! caller-supplied random source. Temperature zero is plain arg-max.
//!
//! ### Decoding
//!
//! [`autoregressive::BatchDecoder`] owns the step loop and per-sequence stop
//! logic. [`service::CompletionService`] puts a request queue in front of it
//! so many tasks can share one model.
//!
//! ## Features
//!
//! - **service** (default) - The queued [`service::CompletionService`]
//! - **candle** - Adapter for candle networks
//! - **burn** - Adapter for burn networks
//! - **tokenizers** - Adapter for Hugging Face `tokenizer.json` vocabularies
//!
//! ## Logging
//!
//! All diagnostics go through [`tracing`]. Per-step events are emitted at
//! `debug`, per-batch summaries at `info`, and cancellations at `warn`;
//! install a subscriber to see them.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod error;
pub mod sampler;
pub mod backend;
pub mod autoregressive;

#[cfg_attr(docsrs, doc(cfg(feature = "service")))]
#[cfg(feature = "service")]
pub mod service;

pub use error::{DecodeError, ModelFault, TokenizerFault};
