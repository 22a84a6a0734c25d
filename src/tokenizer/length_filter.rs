use super::{Token, TokenFilter, TokenStream};

/// Drops tokens whose UTF-8 byte length reaches `max_bytes`.
///
/// Real-world text occasionally contains degenerate "words" (base64
/// blobs, concatenated urls, minified code) that would bloat the term
/// dictionary without ever being searched for; this filter keeps them
/// out of the index. The default analyzer chain caps tokens at 255
/// bytes.
#[derive(Clone)]
pub struct LengthFilter {
    max_bytes: usize,
}

impl LengthFilter {
    pub fn max_bytes(max_bytes: usize) -> LengthFilter {
        LengthFilter { max_bytes }
    }
}

impl TokenFilter for LengthFilter {
    fn transform<'a>(&self, token_stream: Box<dyn TokenStream + 'a>) -> Box<dyn TokenStream + 'a> {
        Box::new(LengthFilterStream {
            max_bytes: self.max_bytes,
            inner: token_stream,
        })
    }
}

pub struct LengthFilterStream<'a> {
    max_bytes: usize,
    inner: Box<dyn TokenStream + 'a>,
}

impl<'a> TokenStream for LengthFilterStream<'a> {
    fn advance(&mut self) -> bool {
        // pull from the wrapped stream until a token fits
        while self.inner.advance() {
            if self.inner.token().text.len() < self.max_bytes {
                return true;
            }
        }
        false
    }

    fn token(&self) -> &Token {
        self.inner.token()
    }

    fn token_mut(&mut self) -> &mut Token {
        self.inner.token_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{SimpleTokenizer, TextAnalyzer};

    fn texts_of(analyzer: &TextAnalyzer, input: &str) -> Vec<String> {
        let mut texts = Vec::new();
        analyzer.token_stream(input).process(&mut |token| {
            texts.push(token.text.clone());
        });
        texts
    }

    #[test]
    fn test_length_filter_drops_oversized_tokens() {
        let analyzer = TextAnalyzer::new(SimpleTokenizer).filter(LengthFilter::max_bytes(6));
        assert_eq!(
            texts_of(&analyzer, "supercalifragilistic but snappy words"),
            vec!["but".to_string(), "words".to_string()]
        );
    }

    #[test]
    fn test_length_filter_limit_is_exclusive() {
        let analyzer = TextAnalyzer::new(SimpleTokenizer).filter(LengthFilter::max_bytes(5));
        // a 5-byte token is already too long with max_bytes = 5
        assert_eq!(
            texts_of(&analyzer, "abcd abcde"),
            vec!["abcd".to_string()]
        );
    }

    #[test]
    fn test_length_filter_counts_bytes_not_chars() {
        let analyzer = TextAnalyzer::new(SimpleTokenizer).filter(LengthFilter::max_bytes(5));
        // four umlauts are eight UTF-8 bytes
        assert_eq!(texts_of(&analyzer, "üüüü ok"), vec!["ok".to_string()]);
    }
}
