use std::collections::VecDeque;

use crate::error::CompileError;

use super::tokenizer::{Token, TokenKind};

type TokenSource<'a> = Box<dyn Iterator<Item = Result<Token, CompileError>> + 'a>;

/// Wraps the lazy token stream with the lookahead the keyword handlers need.
///
/// Comments are not returned: they are collected as documentation for the next
/// declaration. Preprocessor lines are collected separately so they can be passed
/// through to the generated sources. A lexical error ends the stream and is kept until
/// the engine asks for it.
pub struct TokenCursor<'a> {
    source: TokenSource<'a>,
    lookahead: VecDeque<Token>,
    comments: Vec<String>,
    preprocessor: Vec<Token>,
    lexical_error: Option<CompileError>,
    line: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(source: impl Iterator<Item = Result<Token, CompileError>> + 'a) -> Self {
        Self {
            source: Box::new(source),
            lookahead: VecDeque::new(),
            comments: Vec::new(),
            preprocessor: Vec::new(),
            lexical_error: None,
            line: 1,
        }
    }

    fn fill(&mut self, n: usize) {
        while self.lookahead.len() < n && self.lexical_error.is_none() {
            match self.source.next() {
                Some(Ok(token)) => match token.kind {
                    TokenKind::Comment => self.comments.push(token.value),
                    TokenKind::Preprocessor => self.preprocessor.push(token),
                    _ => self.lookahead.push_back(token),
                },
                Some(Err(err)) => self.lexical_error = Some(err),
                None => break,
            }
        }
    }

    pub fn peek(&mut self) -> Option<&Token> {
        self.fill(1);
        self.lookahead.front()
    }

    pub fn peek_nth(&mut self, n: usize) -> Option<&Token> {
        self.fill(n + 1);
        self.lookahead.get(n)
    }

    pub fn peek_is(&mut self, value: &str) -> bool {
        self.peek().is_some_and(|t| t.is(value))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<Token> {
        self.fill(1);
        let token = self.lookahead.pop_front()?;
        self.line = token.line;
        Some(token)
    }

    /// line of the last consumed token
    pub fn line(&self) -> usize {
        self.line
    }

    pub fn next_or_eof(&mut self, what: &str) -> Result<Token, CompileError> {
        let line = self.line;
        self.next()
            .ok_or_else(|| CompileError::syntax(format!("unexpected end of file, expected {}", what), line))
    }

    pub fn expect(&mut self, value: &str) -> Result<Token, CompileError> {
        let token = self.next_or_eof(&format!("'{}'", value))?;
        if token.is(value) {
            Ok(token)
        } else {
            Err(CompileError::syntax(
                format!("expected '{}', read '{}'", value, token.value),
                token.line,
            ))
        }
    }

    pub fn expect_identifier(&mut self) -> Result<Token, CompileError> {
        let token = self.next_or_eof("an identifier")?;
        if token.is_identifier() {
            Ok(token)
        } else {
            Err(CompileError::syntax(
                format!("expected an identifier, read '{}'", token.value),
                token.line,
            ))
        }
    }

    pub fn expect_string(&mut self) -> Result<String, CompileError> {
        let token = self.next_or_eof("a string")?;
        if token.kind == TokenKind::String {
            Ok(unquote(&token.value))
        } else {
            Err(CompileError::syntax(
                format!("expected a string, read '{}'", token.value),
                token.line,
            ))
        }
    }

    pub fn expect_number(&mut self) -> Result<f64, CompileError> {
        let mut token = self.next_or_eof("a number")?;
        let negative = token.is("-");
        if negative || token.is("+") {
            token = self.next_or_eof("a number")?;
        }
        let value = parse_number(&token.value).ok_or_else(|| {
            CompileError::syntax(format!("expected a number, read '{}'", token.value), token.line)
        })?;
        Ok(if negative { -value } else { value })
    }

    pub fn expect_unsigned(&mut self) -> Result<usize, CompileError> {
        let token = self.next_or_eof("an unsigned integer")?;
        token.value.parse().map_err(|_| {
            CompileError::syntax(
                format!("expected an unsigned integer, read '{}'", token.value),
                token.line,
            )
        })
    }

    /// consumes tokens up to and including the next ';'
    pub fn read_until_semicolon(&mut self) -> Result<Vec<Token>, CompileError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_or_eof("';'")?;
            if token.is(";") {
                return Ok(tokens);
            }
            if token.is_keyword() {
                return Err(CompileError::syntax(
                    format!("expected ';' before '{}'", token.value),
                    token.line,
                ));
            }
            tokens.push(token);
        }
    }

    /// reads a balanced `{ ... }` block, returning the tokens between the outer braces
    pub fn read_block(&mut self) -> Result<Vec<Token>, CompileError> {
        let open = self.expect("{")?;
        let mut depth = 1usize;
        let mut body = Vec::new();
        loop {
            let Some(token) = self.next() else {
                return Err(CompileError::syntax(
                    "unterminated block, missing '}'",
                    open.line,
                ));
            };
            if token.is("{") {
                depth += 1;
            } else if token.is("}") {
                depth -= 1;
                if depth == 0 {
                    return Ok(body);
                }
            }
            body.push(token);
        }
    }

    /// discards tokens until the next keyword, used to recover after an error
    pub fn skip_to_next_keyword(&mut self) {
        while let Some(token) = self.peek() {
            if token.is_keyword() {
                return;
            }
            self.next();
        }
    }

    pub fn take_doc(&mut self) -> Option<String> {
        if self.comments.is_empty() {
            return None;
        }
        let doc = self.comments.join("\n");
        self.comments.clear();
        Some(doc)
    }

    pub fn clear_doc(&mut self) {
        self.comments.clear();
    }

    pub fn take_preprocessor(&mut self) -> Vec<Token> {
        std::mem::take(&mut self.preprocessor)
    }

    pub fn take_lexical_error(&mut self) -> Option<CompileError> {
        self.lexical_error.take()
    }
}

pub fn unquote(text: &str) -> String {
    text.strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text)
        .replace("\\\"", "\"")
}

/// parses a C++ floating point literal, ignoring any type suffix
pub fn parse_number(text: &str) -> Option<f64> {
    let trimmed = text.trim_end_matches(['f', 'F', 'l', 'L', 'u', 'U']);
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokenizer::Tokenizer;

    fn cursor(text: &str) -> TokenCursor<'_> {
        TokenCursor::new(Tokenizer::new(text))
    }

    #[test]
    fn comments_become_doc() {
        let mut c = cursor("// the elastic strain\n@StateVariable StrainStensor eel;");
        assert_eq!(c.next().map(|t| t.value), Some("@StateVariable".to_string()));
        assert_eq!(c.take_doc().as_deref(), Some("the elastic strain"));
        assert_eq!(c.take_doc(), None);
    }

    #[test]
    fn read_nested_block() {
        let mut c = cursor("{ if(a){ b; } c; } @Next");
        let body = c.read_block().unwrap();
        let text: Vec<_> = body.iter().map(|t| t.value.as_str()).collect();
        assert_eq!(text, vec!["if", "(", "a", ")", "{", "b", ";", "}", "c", ";"]);
        assert!(c.peek_is("@Next"));
    }

    #[test]
    fn unterminated_block() {
        let mut c = cursor("\n{ a; { b; }");
        let err = c.read_block().unwrap_err();
        assert_eq!(err.line, 2);
    }

    #[test]
    fn numbers() {
        let mut c = cursor("1.e-8 -2 .5f 3");
        assert_eq!(c.expect_number().unwrap(), 1e-8);
        assert_eq!(c.expect_number().unwrap(), -2.0);
        assert_eq!(c.expect_number().unwrap(), 0.5);
        assert_eq!(c.expect_unsigned().unwrap(), 3);
    }

    #[test]
    fn lexical_error_ends_stream() {
        let mut c = cursor("a \"b");
        assert!(c.next().is_some());
        assert!(c.next().is_none());
        assert!(c.take_lexical_error().is_some());
    }

    #[test]
    fn resync_on_keyword() {
        let mut c = cursor("x y z; @Behaviour B;");
        c.skip_to_next_keyword();
        assert!(c.peek_is("@Behaviour"));
    }
}
