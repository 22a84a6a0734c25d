use super::{Token, TokenFilter, TokenStream};

/// Lowercases token text.
#[derive(Clone)]
pub struct LowerCaser;

pub struct LowerCaserStream<'a> {
    tail: Box<dyn TokenStream + 'a>,
    buffer: String,
}

impl TokenFilter for LowerCaser {
    fn transform<'a>(&self, token_stream: Box<dyn TokenStream + 'a>) -> Box<dyn TokenStream + 'a> {
        Box::new(LowerCaserStream {
            tail: token_stream,
            buffer: String::with_capacity(100),
        })
    }
}

impl<'a> TokenStream for LowerCaserStream<'a> {
    fn advance(&mut self) -> bool {
        if !self.tail.advance() {
            return false;
        }
        let token = self.tail.token_mut();
        if token.text.is_ascii() {
            token.text.make_ascii_lowercase();
        } else {
            self.buffer.clear();
            for c in token.text.chars() {
                self.buffer.extend(c.to_lowercase());
            }
            token.text.clear();
            token.text.push_str(&self.buffer);
        }
        true
    }

    fn token(&self) -> &Token {
        self.tail.token()
    }

    fn token_mut(&mut self) -> &mut Token {
        self.tail.token_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::{SimpleTokenizer, TextAnalyzer};

    #[test]
    fn test_lower_caser_unicode() {
        let analyzer = TextAnalyzer::new(SimpleTokenizer).filter(LowerCaser);
        let mut tokens = Vec::new();
        analyzer.token_stream("Größe MATTERS").process(&mut |token| {
            tokens.push(token.text.clone());
        });
        assert_eq!(tokens, vec!["größe".to_string(), "matters".to_string()]);
    }
}
