//! Question preprocessing
//!
//! Normalizes the raw question with literal substring tables, tokenizes it
//! and filters the tokens. Tokens and tags stay aligned at every step.

use super::ParsedQuestion;
use crate::collaborators::Tokenizer;
use kbqa_common::config::LexiconConfig;
use kbqa_common::errors::{AppError, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Normalization tables, loaded once and shared read-only
#[derive(Debug, Clone)]
pub struct Lexicon {
    /// Substrings deleted from the question
    pub drop_list: Vec<String>,

    /// Ordered `(from, to)` replacements, each applied once
    pub rewrite_list: Vec<(String, String)>,

    /// Tokens removed after tokenization
    pub stop_words: HashSet<String>,

    /// Suffix split off long tokens
    pub split_suffix: char,

    /// Token inserted in place of the split suffix
    pub split_replacement: String,

    /// Whitespace token emitted by the tokenizer
    pub blank_token: String,
}

impl Lexicon {
    /// Build from configuration with the given stop words
    pub fn new<I, S>(config: &LexiconConfig, stop_words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            drop_list: config.drop_list.clone(),
            rewrite_list: config.rewrite_list.clone(),
            stop_words: stop_words.into_iter().map(Into::into).collect(),
            split_suffix: config.split_suffix,
            split_replacement: config.split_replacement.clone(),
            blank_token: config.blank_token.clone(),
        }
    }

    /// Apply the drop list, then the rewrite list in order
    pub fn normalize(&self, question: &str) -> String {
        let mut text = question.to_string();
        for dropped in self.drop_list.iter().filter(|d| !d.is_empty()) {
            text = text.replace(dropped.as_str(), "");
        }
        for (from, to) in self.rewrite_list.iter().filter(|(f, _)| !f.is_empty()) {
            text = text.replace(from.as_str(), to);
        }
        text
    }

    /// Split `XY费` into `XY` + `费用`, duplicating the tag
    fn split_suffix(&self, tokens: Vec<String>, tags: Vec<String>) -> (Vec<String>, Vec<String>) {
        let mut out_tokens = Vec::with_capacity(tokens.len());
        let mut out_tags = Vec::with_capacity(tags.len());

        for (token, tag) in tokens.into_iter().zip(tags) {
            if token.chars().count() > 2 && token.ends_with(self.split_suffix) {
                let stem = &token[..token.len() - self.split_suffix.len_utf8()];
                out_tokens.push(stem.to_string());
                out_tags.push(tag.clone());
                out_tokens.push(self.split_replacement.clone());
                out_tags.push(tag);
            } else {
                out_tokens.push(token);
                out_tags.push(tag);
            }
        }

        (out_tokens, out_tags)
    }

    fn is_filtered(&self, token: &str) -> bool {
        token == self.blank_token || self.stop_words.contains(token)
    }
}

/// Question preprocessor
pub struct Preprocessor {
    lexicon: Arc<Lexicon>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl Preprocessor {
    pub fn new(lexicon: Arc<Lexicon>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { lexicon, tokenizer }
    }

    /// Normalize, tokenize and filter a question
    pub async fn process(&self, question: &str) -> Result<ParsedQuestion> {
        let text = self.lexicon.normalize(question);

        let (tokens, tags) = self.tokenizer.pos_cut(&text).await?;
        if tokens.len() != tags.len() {
            return Err(AppError::Tokenizer {
                message: format!(
                    "Tokenizer returned {} tokens but {} tags",
                    tokens.len(),
                    tags.len()
                ),
            });
        }

        let (tokens, tags) = self.lexicon.split_suffix(tokens, tags);
        let (tokens, tags): (Vec<String>, Vec<String>) = tokens
            .into_iter()
            .zip(tags)
            .filter(|(token, _)| !self.lexicon.is_filtered(token))
            .unzip();

        debug!(text = %text, tokens = ?tokens, tags = ?tags, "Question preprocessed");

        Ok(ParsedQuestion { text, tokens, tags })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::mock::StaticTokenizer;

    fn lexicon(stop_words: &[&str]) -> Arc<Lexicon> {
        Arc::new(Lexicon::new(&LexiconConfig::default(), stop_words.iter().copied()))
    }

    #[test]
    fn test_drop_then_rewrite() {
        let lexicon = lexicon(&[]);

        assert_eq!(lexicon.normalize("麦当劳在哪里吗"), "麦当劳的地点");
        assert_eq!(lexicon.normalize("候机楼里面哪有vip室"), "候机楼地点贵宾室");
        assert_eq!(lexicon.normalize("停车场属于哪个区"), "停车场在哪个区");
    }

    #[test]
    fn test_rewrites_are_single_pass() {
        let config = LexiconConfig {
            rewrite_list: vec![("甲".into(), "乙".into()), ("乙".into(), "丙".into())],
            ..LexiconConfig::default()
        };
        let lexicon = Lexicon::new(&config, Vec::<String>::new());

        // each pair runs once, in order
        assert_eq!(lexicon.normalize("甲"), "丙");
        let reversed = LexiconConfig {
            rewrite_list: vec![("乙".into(), "丙".into()), ("甲".into(), "乙".into())],
            ..LexiconConfig::default()
        };
        assert_eq!(Lexicon::new(&reversed, Vec::<String>::new()).normalize("甲"), "乙");
    }

    #[test]
    fn test_suffix_split_keeps_alignment() {
        let lexicon = lexicon(&[]);
        let tokens = vec!["停车费".to_string(), "电费".to_string(), "多少".to_string()];
        let tags = vec!["n".to_string(), "n".to_string(), "m".to_string()];

        let (tokens, tags) = lexicon.split_suffix(tokens, tags);

        assert_eq!(tokens, vec!["停车", "费用", "电费", "多少"]);
        assert_eq!(tags, vec!["n", "n", "n", "m"]);
    }

    #[tokio::test]
    async fn test_process_filters_stop_words_and_blanks() {
        let tokenizer = StaticTokenizer::new().with_entry(
            "停车费怎么收",
            &[("停车费", "n"), (" ", "x"), ("怎么", "r"), ("收", "v")],
        );
        let preprocessor = Preprocessor::new(lexicon(&["怎么"]), Arc::new(tokenizer));

        let parsed = preprocessor.process("停车费怎么收吗").await.unwrap();

        assert_eq!(parsed.text, "停车费怎么收");
        assert_eq!(parsed.tokens, vec!["停车", "费用", "收"]);
        assert_eq!(parsed.tags, vec!["n", "n", "v"]);
    }

    #[tokio::test]
    async fn test_tokenizer_failure_propagates() {
        let preprocessor = Preprocessor::new(lexicon(&[]), Arc::new(StaticTokenizer::failing()));

        let err = preprocessor.process("停车场").await.unwrap_err();
        assert!(matches!(err, AppError::Tokenizer { .. }));
    }
}
