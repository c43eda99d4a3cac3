use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use crate::backend::{CausalModel, Tokenizer};
use crate::error::{ModelFault, TokenizerFault};

pub const EOS: u32 = 0;

/// A whitespace word tokenizer over a fixed vocabulary, for testing.
///
/// Id `0` is the end-of-sequence token; the supplied words take ids `1..`.
#[derive(Clone, Debug)]
pub struct WordTokenizer {
    words: Vec<String>,
    ids: HashMap<String, u32>,
}

impl WordTokenizer {
    pub fn new(words: &[&str]) -> Self {
        let mut all = vec!["<eos>".to_string()];
        all.extend(words.iter().map(|w| w.to_string()));
        let ids = all.iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i as u32))
            .collect();
        Self { words: all, ids }
    }

    pub fn vocab_size(&self) -> usize {
        self.words.len()
    }

    pub fn id(&self, word: &str) -> u32 {
        self.ids[word]
    }
}

impl Tokenizer for WordTokenizer {
    fn encode(&self, text: &str) -> Result<Vec<u32>, TokenizerFault> {
        text.split_whitespace()
            .map(|w| self.ids.get(w).copied()
                .ok_or_else(|| TokenizerFault::new(format!("unknown word {w:?}"))))
            .collect()
    }

    fn decode(&self, tokens: &[u32]) -> Result<String, TokenizerFault> {
        let words = tokens.iter()
            .map(|&t| self.words.get(t as usize)
                .map(String::as_str)
                .ok_or_else(|| TokenizerFault::new(format!("unknown id {t}"))))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(words.join(" "))
    }

    fn eos_id(&self) -> u32 {
        EOS
    }
}

/// One recorded call into a [`ScriptedModel`].
#[derive(Clone, Debug, PartialEq)]
pub struct ForwardCall {
    pub window: Vec<Vec<u32>>,
    pub start_pos: usize,
}

type Rule = Box<dyn Fn(usize, &[u32]) -> u32 + Send>;

/// A model that puts almost all probability mass on one token chosen by `rule`.
///
/// `rule` receives the row index and that row's window and returns the token
/// to favor. Every call is recorded in `calls`.
pub struct ScriptedModel {
    vocab_size: usize,
    rule: Rule,
    pub calls: Arc<Mutex<Vec<ForwardCall>>>,
    fail_on_call: Option<usize>,
    drop_rows: bool,
}

impl ScriptedModel {
    pub fn new<F>(vocab_size: usize, rule: F) -> Self
    where F: Fn(usize, &[u32]) -> u32 + Send + 'static
    {
        Self {
            vocab_size,
            rule: Box::new(rule),
            calls: Default::default(),
            fail_on_call: None,
            drop_rows: false,
        }
    }

    /// Always favor `token`.
    pub fn constant(vocab_size: usize, token: u32) -> Self {
        Self::new(vocab_size, move |_, _| token)
    }

    /// Fail with a [`ModelFault`] on the `n`th call (zero based).
    pub fn failing_on(mut self, n: usize) -> Self {
        self.fail_on_call = Some(n);
        self
    }

    /// Return one row fewer than the batch holds.
    pub fn dropping_rows(mut self) -> Self {
        self.drop_rows = true;
        self
    }

    pub fn recorded(&self) -> Vec<ForwardCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CausalModel for ScriptedModel {
    async fn forward(&mut self, window: &[&[u32]], start_pos: usize) -> Result<Vec<Vec<f32>>, ModelFault> {
        let call = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(ForwardCall {
                window: window.iter().map(|row| row.to_vec()).collect(),
                start_pos,
            });
            calls.len() - 1
        };
        if self.fail_on_call == Some(call) {
            return Err(ModelFault::new(format!("scripted failure on call {call}")));
        }

        let mut rows: Vec<Vec<f32>> = window.iter()
            .enumerate()
            .map(|(i, row)| {
                let mut logits = vec![0.0; self.vocab_size];
                logits[(self.rule)(i, row) as usize] = 20.0;
                logits
            })
            .collect();
        if self.drop_rows {
            rows.pop();
        }
        Ok(rows)
    }
}
