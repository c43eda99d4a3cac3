use std::path::Path;
use crate::error::TokenizerFault;
use super::Tokenizer;

fn fault(err: impl std::fmt::Display) -> TokenizerFault {
    TokenizerFault::new(err.to_string())
}

/// A Hugging Face `tokenizers` vocabulary behind the [`Tokenizer`] trait.
///
/// Special tokens configured in the vocabulary (such as a beginning-of-sequence
/// marker) are added on encode and stripped on decode.
#[derive(Clone)]
pub struct HfTokenizer {
    inner: tokenizers::Tokenizer,
    eos_id: u32,
    pad_id: u32,
}

impl HfTokenizer {
    /// Wrap `inner`, using `eos_token` as the end-of-sequence and pad token.
    ///
    /// # Errors
    ///
    /// A [`TokenizerFault`] if `eos_token` is not in the vocabulary.
    pub fn new(inner: tokenizers::Tokenizer, eos_token: &str) -> Result<Self, TokenizerFault> {
        let eos_id = lookup(&inner, eos_token)?;
        Ok(Self {
            inner,
            eos_id,
            pad_id: eos_id,
        })
    }

    /// Load a serialized `tokenizer.json`.
    pub fn from_file(path: impl AsRef<Path>, eos_token: &str) -> Result<Self, TokenizerFault> {
        let inner = tokenizers::Tokenizer::from_file(path).map_err(fault)?;
        Self::new(inner, eos_token)
    }

    /// Use a dedicated pad token instead of the end-of-sequence token.
    pub fn with_pad_token(mut self, pad_token: &str) -> Result<Self, TokenizerFault> {
        self.pad_id = lookup(&self.inner, pad_token)?;
        Ok(self)
    }

    pub fn inner(&self) -> &tokenizers::Tokenizer {
        &self.inner
    }
}

fn lookup(inner: &tokenizers::Tokenizer, token: &str) -> Result<u32, TokenizerFault> {
    inner.token_to_id(token)
        .ok_or_else(|| TokenizerFault::new(format!("token {token:?} is not in the vocabulary")))
}

impl Tokenizer for HfTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerFault> {
        let encoding = self.inner.encode(text, true).map_err(fault)?;
        Ok(encoding.get_ids().to_vec())
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerFault> {
        self.inner.decode(tokens, true).map_err(fault)
    }

    fn eos_id(&self) -> u32 {
        self.eos_id
    }

    fn pad_id(&self) -> u32 {
        self.pad_id
    }
}
