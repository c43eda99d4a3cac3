use serde::{Deserialize, Serialize};
use super::batch::StopReason;

/// The completion of one prompt.
///
/// Created only once its sequence has stopped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// The prompt exactly as submitted.
    pub prompt: String,

    /// Detokenized generation; prompt plus generation when echoing.
    pub generated_text: String,

    /// Number of generated tokens, excluding any end-of-sequence token.
    pub token_count: usize,

    /// Number of prompt tokens.
    pub prompt_tokens: usize,

    /// Generated ids; prompt plus generated ids when echoing.
    pub tokens: Vec<u32>,

    /// Log-probability of each generated token, when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logprobs: Option<Vec<f32>>,

    pub stop_reason: StopReason,
}

impl GenerationResult {
    /// Prompt plus generated tokens.
    pub fn total_tokens(&self) -> usize {
        self.prompt_tokens + self.token_count
    }
}
