//! Error kinds surfaced by the batch decoder and its collaborators.

use thiserror::Error;

/// A fatal fault reported by a [`CausalModel`](crate::backend::CausalModel).
///
/// Model faults are never retried by the decoder; they abort the whole
/// completion request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ModelFault(pub String);

impl ModelFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// A fault reported by a [`Tokenizer`](crate::backend::Tokenizer) while encoding or decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct TokenizerFault(pub String);

impl TokenizerFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Every way a completion request can fail.
///
/// A request either returns a complete, ordered result set or fails with
/// exactly one of these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("batch of {actual} prompts exceeds max_batch_size {limit}")]
    BatchTooLarge { limit: usize, actual: usize },

    #[error("prompt {index} is {len} tokens, longer than max_seq_len {max_seq_len}")]
    PromptTooLong {
        index: usize,
        len: usize,
        max_seq_len: usize,
    },

    #[error("cannot sample from an empty distribution")]
    EmptyDistribution,

    #[error("completion cancelled before step {step}")]
    Cancelled { step: usize },

    #[error("model fault: {0}")]
    Model(#[from] ModelFault),

    #[error("tokenizer fault: {0}")]
    Tokenizer(#[from] TokenizerFault),

    #[error("completion service shut down before the request finished")]
    ServiceClosed,
}

pub type Result<T> = std::result::Result<T, DecodeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_too_large_names_limit_and_count() {
        let err = DecodeError::BatchTooLarge { limit: 2, actual: 3 };
        let message = err.to_string();
        assert!(message.contains('2'));
        assert!(message.contains('3'));
    }

    #[test]
    fn test_faults_convert_into_decode_error() {
        let err: DecodeError = ModelFault::new("device lost").into();
        assert_eq!(err, DecodeError::Model(ModelFault::new("device lost")));

        let err: DecodeError = TokenizerFault::new("bad utf8").into();
        assert_eq!(err.to_string(), "tokenizer fault: bad utf8");
    }
}
