use super::{Token, TokenStream, Tokenizer};

/// Emits the entire input as a single token.
///
/// This is the analyzer of identifier fields: the raw value is the term.
#[derive(Clone)]
pub struct KeywordTokenizer;

pub struct KeywordTokenStream<'a> {
    text: &'a str,
    token: Token,
    emitted: bool,
}

impl Tokenizer for KeywordTokenizer {
    fn token_stream<'a>(&self, text: &'a str) -> Box<dyn TokenStream + 'a> {
        Box::new(KeywordTokenStream {
            text,
            token: Token::default(),
            emitted: false,
        })
    }
}

impl<'a> TokenStream for KeywordTokenStream<'a> {
    fn advance(&mut self) -> bool {
        if self.emitted || self.text.is_empty() {
            return false;
        }
        self.emitted = true;
        self.token.position = 0;
        self.token.offset_from = 0;
        self.token.offset_to = self.text.len();
        self.token.text.clear();
        self.token.text.push_str(self.text);
        true
    }

    fn token(&self) -> &Token {
        &self.token
    }

    fn token_mut(&mut self) -> &mut Token {
        &mut self.token
    }
}
