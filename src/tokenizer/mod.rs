//! Minimal analysis chain turning field text into token streams.
//!
//! Analyzers are an external concern; this module only provides the
//! default chains the engine needs to be usable standalone, plus the
//! registry the writer resolves analyzer names against.
//!
//! The streaming interface re-uses a single [`Token`] buffer: the token
//! returned by [`TokenStream::token`] is only valid until the next call
//! to `advance`, and consumers must copy whatever they keep.

mod keyword_tokenizer;
mod length_filter;
mod lower_caser;
mod simple_tokenizer;

pub use self::keyword_tokenizer::KeywordTokenizer;
pub use self::length_filter::LengthFilter;
pub use self::lower_caser::LowerCaser;
pub use self::simple_tokenizer::SimpleTokenizer;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// A token produced by an analyzer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// Byte offset of the first character of the token in the input.
    pub offset_from: usize,
    /// Byte offset just past the last character of the token.
    pub offset_to: usize,
    /// Position of the token within the stream, in tokens.
    pub position: usize,
    /// The token text.
    pub text: String,
    /// Per-occurrence boost, recorded by boost-bearing posting formats.
    pub boost: f32,
}

impl Default for Token {
    fn default() -> Token {
        Token {
            offset_from: 0,
            offset_to: 0,
            position: usize::max_value(),
            text: String::with_capacity(200),
            boost: 1.0,
        }
    }
}

/// Streaming iterator over tokens.
pub trait TokenStream {
    /// Advances to the next token, returning false at the end of the
    /// stream.
    fn advance(&mut self) -> bool;

    /// The current token. Only valid after a successful `advance`, and
    /// until the next one.
    fn token(&self) -> &Token;

    fn token_mut(&mut self) -> &mut Token;

    /// Calls `sink` on every remaining token, returning the count.
    fn process(&mut self, sink: &mut dyn FnMut(&Token)) -> u32 {
        let mut num_tokens = 0u32;
        while self.advance() {
            sink(self.token());
            num_tokens += 1;
        }
        num_tokens
    }
}

/// Producer of token streams.
pub trait Tokenizer: Send + Sync {
    fn token_stream<'a>(&self, text: &'a str) -> Box<dyn TokenStream + 'a>;
}

/// Stream transformer (lowercasing, stop-length filtering, ...).
pub trait TokenFilter: Send + Sync {
    fn transform<'a>(&self, token_stream: Box<dyn TokenStream + 'a>) -> Box<dyn TokenStream + 'a>;
}

/// A tokenizer followed by a chain of filters.
#[derive(Clone)]
pub struct TextAnalyzer {
    tokenizer: Arc<dyn Tokenizer>,
    filters: Vec<Arc<dyn TokenFilter>>,
}

impl TextAnalyzer {
    pub fn new<T: Tokenizer + 'static>(tokenizer: T) -> TextAnalyzer {
        TextAnalyzer {
            tokenizer: Arc::new(tokenizer),
            filters: Vec::new(),
        }
    }

    /// Appends a filter to the chain.
    pub fn filter<F: TokenFilter + 'static>(mut self, filter: F) -> TextAnalyzer {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn token_stream<'a>(&self, text: &'a str) -> Box<dyn TokenStream + 'a> {
        let mut stream = self.tokenizer.token_stream(text);
        for filter in &self.filters {
            stream = filter.transform(stream);
        }
        stream
    }
}

/// Registry resolving the analyzer names carried by the schema.
#[derive(Clone)]
pub struct TokenizerManager {
    tokenizers: Arc<RwLock<HashMap<String, TextAnalyzer>>>,
}

impl TokenizerManager {
    pub fn register(&self, name: &str, analyzer: TextAnalyzer) {
        self.tokenizers
            .write()
            .expect("tokenizer registry poisoned")
            .insert(name.to_string(), analyzer);
    }

    pub fn get(&self, name: &str) -> Option<TextAnalyzer> {
        self.tokenizers
            .read()
            .expect("tokenizer registry poisoned")
            .get(name)
            .cloned()
    }
}

impl Default for TokenizerManager {
    fn default() -> TokenizerManager {
        let manager = TokenizerManager {
            tokenizers: Arc::new(RwLock::new(HashMap::new())),
        };
        manager.register(
            "simple",
            TextAnalyzer::new(SimpleTokenizer)
                .filter(LengthFilter::max_bytes(255))
                .filter(LowerCaser),
        );
        manager.register("keyword", TextAnalyzer::new(KeywordTokenizer));
        manager.register("whitespace", TextAnalyzer::new(SimpleTokenizer));
        manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) fn tokens_of(analyzer: &TextAnalyzer, text: &str) -> Vec<(usize, String)> {
        let mut tokens = Vec::new();
        analyzer.token_stream(text).process(&mut |token| {
            tokens.push((token.position, token.text.clone()));
        });
        tokens
    }

    #[test]
    fn test_default_chain() {
        let manager = TokenizerManager::default();
        let simple = manager.get("simple").unwrap();
        assert_eq!(
            tokens_of(&simple, "Mary had a little lamb"),
            vec![
                (0, "mary".to_string()),
                (1, "had".to_string()),
                (2, "a".to_string()),
                (3, "little".to_string()),
                (4, "lamb".to_string()),
            ]
        );
    }

    #[test]
    fn test_keyword_chain() {
        let manager = TokenizerManager::default();
        let keyword = manager.get("keyword").unwrap();
        assert_eq!(
            tokens_of(&keyword, "/a/path With spaces"),
            vec![(0, "/a/path With spaces".to_string())]
        );
    }
}
