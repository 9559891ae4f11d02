//! Term lexer for step commands.
//!
//! Terms are separated by whitespace. A term starting with a single quote runs
//! until a single quote that ends a word, so `'hello big world'` is one term
//! (`hello big world`) with its interior whitespace kept as written.

use crate::error::TaskError;

const QUOTE: char = '\'';

/// A lexed term, or the end of the input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Term(String),
    EndOfInput,
}

/// Cursor over a command string producing one token at a time.
#[derive(Debug)]
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, position: 0 }
    }

    /// Advance to the next token. Once the input is exhausted every call
    /// returns [`Token::EndOfInput`].
    pub fn next_token(&mut self) -> Result<Token, TaskError> {
        let rest = &self.input[self.position..];
        let trimmed = rest.trim_start();
        self.position += rest.len() - trimmed.len();

        if trimmed.is_empty() {
            return Ok(Token::EndOfInput);
        }

        match trimmed.strip_prefix(QUOTE) {
            Some(quoted) => {
                let close = closing_quote(quoted).ok_or_else(|| {
                    TaskError::malformed(format!("unterminated quoted term in '{}'", self.input))
                })?;
                // opening quote + term + closing quote
                self.position += close + 2;
                Ok(Token::Term(quoted[..close].to_string()))
            }
            None => {
                let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
                self.position += end;
                Ok(Token::Term(trimmed[..end].to_string()))
            }
        }
    }
}

/// Byte offset of the first quote in `text` that is followed by whitespace or
/// the end of the input.
fn closing_quote(text: &str) -> Option<usize> {
    text.match_indices(QUOTE).map(|(offset, _)| offset).find(|&offset| {
        text[offset + 1..]
            .chars()
            .next()
            .is_none_or(char::is_whitespace)
    })
}

/// Split a whole command into terms.
pub fn split_terms(input: &str) -> Result<Vec<String>, TaskError> {
    let mut lexer = Lexer::new(input);
    let mut terms = Vec::new();
    while let Token::Term(term) = lexer.next_token()? {
        terms.push(term);
    }
    Ok(terms)
}
