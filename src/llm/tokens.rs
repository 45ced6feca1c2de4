//! Prompt token estimates for logging.
//!
//! Encodings are resolved once per model name and cached; unknown models fall back to
//! `cl100k_base`.

use anyhow::Error as TokenizerError;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base};

static ENCODINGS: OnceLock<Mutex<HashMap<String, Option<Arc<CoreBPE>>>>> = OnceLock::new();

/// Estimate the token count of `text` for `model`.
///
/// Returns `None` when no tokenizer could be loaded at all.
pub fn estimate_tokens(model: &str, text: &str) -> Option<usize> {
    let encoding = encoding_for(model)?;
    Some(encoding.encode_ordinary(text).len())
}

fn encoding_for(model: &str) -> Option<Arc<CoreBPE>> {
    let cache = ENCODINGS.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = cache.lock().ok()?;
    guard
        .entry(model.to_string())
        .or_insert_with(|| match resolve_encoding(model) {
            Ok(encoding) => Some(Arc::new(encoding)),
            Err(error) => {
                tracing::warn!(model, error = %error, "Tokenizer unavailable; skipping estimates");
                None
            }
        })
        .clone()
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::debug!(
                model,
                error = %model_err,
                "Tokenizer model lookup failed; trying encoding name"
            );
            match model {
                "o200k_base" => o200k_base(),
                _ => cl100k_base(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_tokens_for_known_model() {
        let count = estimate_tokens("gpt-3.5-turbo", "The quick brown fox").expect("count");
        assert!(count > 0 && count < 10);
    }

    #[test]
    fn unknown_model_falls_back_to_default_encoding() {
        assert!(estimate_tokens("my-local-model", "hello world").is_some());
    }
}
