use super::{Token, TokenStream, Tokenizer};
use std::str::CharIndices;

/// Splits the text on non-alphanumeric characters.
#[derive(Clone)]
pub struct SimpleTokenizer;

pub struct SimpleTokenStream<'a> {
    text: &'a str,
    chars: CharIndices<'a>,
    token: Token,
}

impl Tokenizer for SimpleTokenizer {
    fn token_stream<'a>(&self, text: &'a str) -> Box<dyn TokenStream + 'a> {
        Box::new(SimpleTokenStream {
            text,
            chars: text.char_indices(),
            token: Token::default(),
        })
    }
}

impl<'a> SimpleTokenStream<'a> {
    // search for the end of the current token.
    fn search_token_end(&mut self) -> usize {
        (&mut self.chars)
            .filter(|&(_, c)| !c.is_alphanumeric())
            .map(|(offset, _)| offset)
            .next()
            .unwrap_or_else(|| self.text.len())
    }
}

impl<'a> TokenStream for SimpleTokenStream<'a> {
    fn advance(&mut self) -> bool {
        self.token.text.clear();
        self.token.position = self.token.position.wrapping_add(1);
        loop {
            match self.chars.next() {
                Some((offset_from, c)) => {
                    if c.is_alphanumeric() {
                        let offset_to = self.search_token_end();
                        self.token.offset_from = offset_from;
                        self.token.offset_to = offset_to;
                        self.token.text.push_str(&self.text[offset_from..offset_to]);
                        return true;
                    }
                }
                None => {
                    return false;
                }
            }
        }
    }

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_tokenizer_offsets() {
        let mut stream = SimpleTokenizer.token_stream("He's, alive.");
        assert!(stream.advance());
        assert_eq!(stream.token().text, "He");
        assert_eq!(stream.token().offset_from, 0);
        assert_eq!(stream.token().offset_to, 2);
        assert!(stream.advance());
        assert_eq!(stream.token().text, "s");
        assert!(stream.advance());
        assert_eq!(stream.token().text, "alive");
        assert_eq!(stream.token().position, 2);
        assert!(!stream.advance());
    }

    #[test]
    fn test_simple_tokenizer_empty() {
        let mut stream = SimpleTokenizer.token_stream(" :!, ");
        assert!(!stream.advance());
    }
}
