//! # Sampler
//!
//! Turns one logit vector into a token id under a temperature / nucleus (top-p)
//! policy.
//!
//! Pipeline: temperature scale → softmax → sort descending → top-p truncate →
//! renormalize → draw.
//!
//! The source of randomness is always supplied by the caller so that a fixed
//! seed reproduces the same draws.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::trace;
use crate::error::{DecodeError, Result};

/// Temperature used when none is configured.
pub const DEFAULT_TEMPERATURE: f32 = 0.6;

/// Nucleus mass used when none is configured.
pub const DEFAULT_TOP_P: f32 = 0.9;

/// Sampling parameters for one completion request.
///
/// Construct through [`SamplingConfig::new`], which rejects out-of-range
/// values; fields are read-only afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    temperature: f32,
    top_p: f32,
}

impl SamplingConfig {
    /// Validate and build a config.
    ///
    /// `temperature` must be finite and `>= 0`; `top_p` must lie in `(0, 1]`.
    pub fn new(temperature: f32, top_p: f32) -> Result<Self> {
        let config = Self { temperature, top_p };
        config.validate()?;
        Ok(config)
    }

    /// Deterministic arg-max decoding.
    pub fn greedy() -> Self {
        Self { temperature: 0.0, top_p: 1.0 }
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn top_p(&self) -> f32 {
        self.top_p
    }

    pub fn is_greedy(&self) -> bool {
        self.temperature == 0.0
    }

    /// Re-check the invariants, for configs that arrived through deserialization.
    pub fn validate(&self) -> Result<()> {
        if !self.temperature.is_finite() || self.temperature < 0.0 {
            return Err(DecodeError::InvalidConfig(format!(
                "temperature must be >= 0, got {}", self.temperature
            )));
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err(DecodeError::InvalidConfig(format!(
                "top_p must be in (0, 1], got {}", self.top_p
            )));
        }
        Ok(())
    }
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
        }
    }
}

/// Pick the next token id from `logits`.
///
/// With `temperature == 0` this is the arg-max, ties going to the lowest
/// index, and `rng` is not touched. Otherwise the tempered softmax is cut to
/// the smallest descending prefix whose mass reaches `top_p`, renormalized, and
/// sampled once.
///
/// NaN and `-inf` logits are impossible tokens. A `+inf` logit is the
/// maximum: greedy decoding picks the first one, and sampling spreads all of
/// the mass evenly over the `+inf` entries.
///
/// # Errors
///
/// * [`DecodeError::InvalidConfig`] if `config` is out of range
/// * [`DecodeError::EmptyDistribution`] if `logits` is empty or holds only NaN and `-inf`
pub fn sample<R>(logits: &[f32], config: &SamplingConfig, rng: &mut R) -> Result<u32>
where R: Rng
{
    config.validate()?;

    if config.is_greedy() {
        return argmax(logits).ok_or(DecodeError::EmptyDistribution);
    }

    let mut candidates = tempered_softmax(logits, config.temperature)?;
    candidates.retain(|&(_, p)| p > 0.0);
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    let cutoff = nucleus_cutoff(&candidates, config.top_p);
    candidates.truncate(cutoff);

    let mass: f32 = candidates.iter().map(|(_, p)| p).sum();
    for (_, p) in candidates.iter_mut() {
        *p /= mass;
    }
    trace!(kept = candidates.len(), vocab = logits.len(), "nucleus filtered");

    let r: f32 = rng.gen_range(0.0..1.0);
    let mut cumulative = 0.0f32;
    for &(token, p) in candidates.iter() {
        cumulative += p;
        if r < cumulative {
            return Ok(token);
        }
    }

    // Rounding left the cumulative sum just under `r`; the tail token is the draw.
    candidates.last()
        .map(|&(token, _)| token)
        .ok_or(DecodeError::EmptyDistribution)
}

/// Natural-log probabilities of every entry of `logits`, computed stably.
///
/// `+inf` entries share all of the mass between them. Returns an empty vector
/// for an empty input or one with no candidate token.
pub fn log_softmax(logits: &[f32]) -> Vec<f32> {
    let infinite = logits.iter().filter(|&&l| l == f32::INFINITY).count();
    if infinite > 0 {
        let share = -(infinite as f32).ln();
        return logits.iter()
            .map(|&l| if l == f32::INFINITY { share } else { f32::NEG_INFINITY })
            .collect();
    }
    let Some(max) = finite_max(logits) else {
        return vec![];
    };
    let sum: f32 = logits.iter()
        .filter(|l| l.is_finite())
        .map(|l| (l - max).exp())
        .sum();
    let log_sum = sum.ln() + max;
    logits.iter()
        .map(|&l| if l.is_finite() { l - log_sum } else { f32::NEG_INFINITY })
        .collect()
}

/// NaN and `-inf` can never be chosen; `+inf` outranks every finite logit.
fn is_candidate(logit: f32) -> bool {
    !logit.is_nan() && logit != f32::NEG_INFINITY
}

fn argmax(logits: &[f32]) -> Option<u32> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &l) in logits.iter().enumerate() {
        if !is_candidate(l) {
            continue;
        }
        match best {
            Some((_, b)) if l <= b => {}
            _ => best = Some((i, l)),
        }
    }
    best.map(|(i, _)| i as u32)
}

fn finite_max(logits: &[f32]) -> Option<f32> {
    logits.iter()
        .copied()
        .filter(|l| l.is_finite())
        .reduce(f32::max)
}

/// `(token, probability)` pairs of the tempered softmax, in vocabulary order.
fn tempered_softmax(logits: &[f32], temperature: f32) -> Result<Vec<(u32, f32)>> {
    let infinite = logits.iter().filter(|&&l| l == f32::INFINITY).count();
    if infinite > 0 {
        let share = 1.0 / infinite as f32;
        return Ok(logits.iter()
            .enumerate()
            .map(|(i, &l)| (i as u32, if l == f32::INFINITY { share } else { 0.0 }))
            .collect());
    }

    let max = finite_max(logits).ok_or(DecodeError::EmptyDistribution)?;
    let mut probs: Vec<(u32, f32)> = logits.iter()
        .enumerate()
        .map(|(i, &l)| {
            let p = if l.is_finite() { ((l - max) / temperature).exp() } else { 0.0 };
            (i as u32, p)
        })
        .collect();
    let sum: f32 = probs.iter().map(|(_, p)| p).sum();
    if !(sum > 0.0) || !sum.is_finite() {
        return Err(DecodeError::EmptyDistribution);
    }
    for (_, p) in probs.iter_mut() {
        *p /= sum;
    }
    Ok(probs)
}

/// Length of the smallest prefix of descending `candidates` whose mass is `>= top_p`.
fn nucleus_cutoff(candidates: &[(u32, f32)], top_p: f32) -> usize {
    let mut cumulative = 0.0f32;
    for (i, (_, p)) in candidates.iter().enumerate() {
        cumulative += p;
        if cumulative >= top_p {
            return i + 1;
        }
    }
    candidates.len()
}
