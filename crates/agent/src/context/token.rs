//! Token counting for the history budget.
//!
//! The default metric is the GPT-3 byte-pair encoding (`r50k_base`), whose
//! vocabulary ships inside the binary. With the `hf-tokenizer` feature a
//! HuggingFace `tokenizer.json` can replace it. If no encoder can be built
//! the counter runs in degraded mode and a message's size is its length in
//! characters.

use std::path::Path;
use threadwise_core::error::Error;
use tiktoken_rs::CoreBPE;
use tracing::warn;

/// Measures the size of a message's content against the budget.
pub trait SizeMetric: Send + Sync {
    fn measure(&self, text: &str) -> Result<usize, Error>;
}

/// Character count. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct CharLength;

impl SizeMetric for CharLength {
    fn measure(&self, text: &str) -> Result<usize, Error> {
        Ok(text.chars().count())
    }
}

/// The metric the assembler uses: an encoder, or characters.
pub enum TokenCounter {
    Bpe(Box<CoreBPE>),
    #[cfg(feature = "hf-tokenizer")]
    Tokenizer(Box<tokenizers::Tokenizer>),
    Characters(CharLength),
}

impl TokenCounter {
    /// Degraded mode.
    pub fn characters() -> Self {
        Self::Characters(CharLength)
    }

    /// The built-in GPT-3 encoding.
    pub fn bpe() -> Result<Self, String> {
        tiktoken_rs::r50k_base()
            .map(|bpe| Self::Bpe(Box::new(bpe)))
            .map_err(|e| format!("Failed to build r50k_base encoder: {e}"))
    }

    /// Load a tokenizer JSON file.
    #[cfg(feature = "hf-tokenizer")]
    pub fn from_file(path: &Path) -> Result<Self, String> {
        tokenizers::Tokenizer::from_file(path)
            .map(|tokenizer| Self::Tokenizer(Box::new(tokenizer)))
            .map_err(|e| format!("Failed to load tokenizer '{}': {e}", path.display()))
    }

    /// Build the counter from the configured tokenizer path.
    ///
    /// A path that cannot be loaded falls back to the built-in encoding;
    /// characters are used only when that fails too.
    pub fn from_path(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            match Self::load_file(path) {
                Ok(counter) => {
                    tracing::info!(path = %path.display(), "Loaded tokenizer");
                    return counter;
                }
                Err(e) => warn!(error = %e, "Using built-in BPE encoding"),
            }
        }

        Self::bpe().unwrap_or_else(|e| {
            warn!(error = %e, "Counting characters instead of tokens");
            Self::characters()
        })
    }

    #[cfg(feature = "hf-tokenizer")]
    fn load_file(path: &Path) -> Result<Self, String> {
        Self::from_file(path)
    }

    #[cfg(not(feature = "hf-tokenizer"))]
    fn load_file(path: &Path) -> Result<Self, String> {
        Err(format!(
            "Built without hf-tokenizer; ignoring '{}'",
            path.display()
        ))
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Characters(_))
    }

    /// Short label for logs and `doctor` output.
    pub fn mode(&self) -> &'static str {
        match self {
            Self::Bpe(_) => "bpe",
            #[cfg(feature = "hf-tokenizer")]
            Self::Tokenizer(_) => "tokenizer",
            Self::Characters(_) => "characters",
        }
    }
}

impl SizeMetric for TokenCounter {
    fn measure(&self, text: &str) -> Result<usize, Error> {
        match self {
            Self::Bpe(bpe) => Ok(bpe.encode_ordinary(text).len()),
            #[cfg(feature = "hf-tokenizer")]
            Self::Tokenizer(tokenizer) => tokenizer
                .encode(text, false)
                .map(|encoding| encoding.len())
                .map_err(|e| Error::EncodingFailure(e.to_string())),
            Self::Characters(chars) => chars.measure(text),
        }
    }
}

impl std::fmt::Debug for TokenCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TokenCounter").field(&self.mode()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(CharLength.measure("").unwrap(), 0);
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(CharLength.measure("hello").unwrap(), 5);
        assert_eq!(CharLength.measure("こんにちは").unwrap(), 5);
    }

    #[test]
    fn characters_mode_is_degraded() {
        let counter = TokenCounter::characters();
        assert!(counter.is_degraded());
        assert_eq!(counter.mode(), "characters");
        assert_eq!(counter.measure("four").unwrap(), 4);
    }

    #[test]
    fn no_path_counts_bpe_tokens() {
        let counter = TokenCounter::from_path(None);
        assert!(!counter.is_degraded());
        assert_eq!(counter.mode(), "bpe");
        assert_eq!(counter.measure("hello world").unwrap(), 2);
        assert_eq!(counter.measure("").unwrap(), 0);
    }

    #[test]
    fn unloadable_path_falls_back_to_bpe() {
        let counter = TokenCounter::from_path(Some(Path::new("/nonexistent/tokenizer.json")));
        assert!(!counter.is_degraded());
        assert_eq!(counter.mode(), "bpe");
    }

    #[test]
    fn bpe_counts_fewer_units_than_characters() {
        let counter = TokenCounter::from_path(None);
        let text = "The quick brown fox jumps over the lazy dog.";
        let tokens = counter.measure(text).unwrap();
        assert!(tokens > 0);
        assert!(tokens < CharLength.measure(text).unwrap());
    }

    #[cfg(feature = "hf-tokenizer")]
    #[test]
    fn word_level_tokenizer_counts_tokens() {
        use std::io::Write;

        let json = serde_json::json!({
            "version": "1.0",
            "truncation": null,
            "padding": null,
            "added_tokens": [],
            "normalizer": null,
            "pre_tokenizer": { "type": "Whitespace" },
            "post_processor": null,
            "decoder": null,
            "model": {
                "type": "WordLevel",
                "vocab": { "[UNK]": 0, "hello": 1, "world": 2 },
                "unk_token": "[UNK]"
            }
        });
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.to_string().as_bytes()).unwrap();

        let counter = TokenCounter::from_path(Some(file.path()));
        assert!(!counter.is_degraded());
        assert_eq!(counter.mode(), "tokenizer");
        assert_eq!(counter.measure("hello world again").unwrap(), 3);
    }
}
