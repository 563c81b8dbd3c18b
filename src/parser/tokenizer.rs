#![allow(clippy::empty_docs)]
#[derive(Parser)]
#[grammar = "parser/mfront_grammar.pest"] // relative to src
pub struct MfrontLexer;

use std::fmt;

use pest::Parser;

use crate::error::{CompileError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Standard,
    Comment,
    String,
    Char,
    Preprocessor,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub line: usize,
    pub value: String,
    pub kind: TokenKind,
}

impl Token {
    pub fn new(line: usize, value: &str, kind: TokenKind) -> Self {
        Self {
            line,
            value: value.to_string(),
            kind,
        }
    }

    pub fn is(&self, value: &str) -> bool {
        self.kind == TokenKind::Standard && self.value == value
    }

    pub fn is_keyword(&self) -> bool {
        self.kind == TokenKind::Standard && self.value.starts_with('@') && self.value.len() > 1
    }

    pub fn is_identifier(&self) -> bool {
        self.kind == TokenKind::Standard && is_identifier(&self.value)
    }

    pub fn is_number(&self) -> bool {
        self.kind == TokenKind::Standard
            && self
                .value
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit() || (c == '.' && self.value.len() > 1))
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.kind {
            TokenKind::Comment => write!(f, "/* {} */", self.value),
            _ => write!(f, "{}", self.value),
        }
    }
}

pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// the text of a comment without the `!`, `/` or `*` marking documentation comments
fn strip_doc_marker(text: &str) -> &str {
    text.strip_prefix(['!', '/', '*']).unwrap_or(text).trim()
}

/// Lazily splits a behaviour file into tokens. The sequence is produced in a single pass
/// and stops for good after the first lexical error.
pub struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
    line: usize,
    at_line_start: bool,
    done: bool,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            pos: 0,
            line: 1,
            at_line_start: true,
            done: false,
        }
    }

    fn skip_whitespace(&mut self) {
        let rest = &self.input[self.pos..];
        for (i, c) in rest.char_indices() {
            if c == '\n' {
                self.line += 1;
                self.at_line_start = true;
            } else if !c.is_whitespace() {
                self.pos += i;
                return;
            }
        }
        self.pos = self.input.len();
    }

    fn fail(&mut self, text: String, line: usize) -> Option<Result<Token, CompileError>> {
        self.done = true;
        Some(Err(CompileError::new(ErrorKind::Lexical(text), line)))
    }
}

impl Iterator for Tokenizer<'_> {
    type Item = Result<Token, CompileError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.skip_whitespace();
        let rest = &self.input[self.pos..];
        if rest.is_empty() {
            self.done = true;
            return None;
        }
        let line = self.line;

        let pair = if self.at_line_start && rest.starts_with('#') {
            MfrontLexer::parse(Rule::preprocessor, rest)
                .ok()
                .and_then(|mut pairs| pairs.next())
        } else {
            MfrontLexer::parse(Rule::token, rest)
                .ok()
                .and_then(|mut pairs| pairs.next())
                .and_then(|token| token.into_inner().next())
        };
        let Some(pair) = pair else {
            let c = rest.chars().next().unwrap_or(' ');
            return self.fail(format!("unexpected character '{}'", c), line);
        };

        let matched = pair.as_str();
        let (value, kind) = match pair.as_rule() {
            Rule::line_comment | Rule::block_comment => {
                let text = pair
                    .into_inner()
                    .next()
                    .map(|inner| inner.as_str())
                    .unwrap_or("");
                (strip_doc_marker(text), TokenKind::Comment)
            }
            Rule::string => (matched, TokenKind::String),
            Rule::char_literal => (matched, TokenKind::Char),
            Rule::preprocessor => (matched, TokenKind::Preprocessor),
            Rule::unterminated_comment => {
                return self.fail("unterminated C comment".to_string(), line)
            }
            Rule::unterminated_string => {
                return self.fail("unterminated string literal".to_string(), line)
            }
            Rule::unterminated_char => {
                return self.fail("invalid character literal".to_string(), line)
            }
            _ => (matched, TokenKind::Standard),
        };

        self.pos += matched.len();
        self.line += matched.matches('\n').count();
        self.at_line_start = false;
        Some(Ok(Token::new(line, value, kind)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(text: &str) -> Vec<Token> {
        Tokenizer::new(text)
            .collect::<Result<Vec<_>, _>>()
            .unwrap_or_else(|e| panic!("unexpected error {}", e))
    }

    fn values(text: &str) -> Vec<String> {
        tokens(text).into_iter().map(|t| t.value).collect()
    }

    macro_rules! tokenizer_tests {
        ($($name:ident: $text:literal => [$($value:literal),*],)*) => {
        $(
            #[test]
            fn $name() {
                assert_eq!(values($text), vec![$($value.to_string()),*]);
            }
        )*
        }
    }

    tokenizer_tests! {
        keyword_and_name: "@Behaviour Norton;" => ["@Behaviour", "Norton", ";"],
        number_then_identifier: "12.3a" => ["12.3", "a"],
        numbers_with_exponent: "1.e-8 .5 2e10f 3" => ["1.e-8", ".5", "2e10f", "3"],
        compound_operators: "a+=b->c::d" => ["a", "+=", "b", "->", "c", "::", "d"],
        templates_stay_split: "tvector<3,stensor<N>>" => ["tvector", "<", "3", ",", "stensor", "<", "N", ">", ">"],
        string_keeps_quotes: "\"a \\\"b\\\"\"" => ["\"a \\\"b\\\"\""],
        char_literals: "'c' '\\''" => ["'c'", "'\\''"],
        comment_delimiters_stripped: "// hello\n/* multi\nline */x" => ["hello", "multi\nline", "x"],
        doc_markers_stripped: "//! young modulus\n/// nu\n/** density */ /*! p */" => ["young modulus", "nu", "density", "p"],
    }

    #[test]
    fn token_kinds_and_lines() {
        let text = "#include <cmath>\n@Author \"me\"; // note\n'x'\n";
        let toks = tokens(text);
        let kinds: Vec<_> = toks.iter().map(|t| (t.kind, t.line)).collect();
        assert_eq!(
            kinds,
            vec![
                (TokenKind::Preprocessor, 1),
                (TokenKind::Standard, 2),
                (TokenKind::String, 2),
                (TokenKind::Standard, 2),
                (TokenKind::Comment, 2),
                (TokenKind::Char, 3),
            ]
        );
        assert_eq!(toks[0].value, "#include <cmath>");
    }

    #[test]
    fn preprocessor_only_at_line_start() {
        let toks = tokens("a # b\n  #define X \\\n  1\ny");
        assert_eq!(toks[1].value, "#");
        assert_eq!(toks[1].kind, TokenKind::Standard);
        assert_eq!(toks[3].kind, TokenKind::Preprocessor);
        assert_eq!(toks[3].value, "#define X \\\n  1");
        assert_eq!(toks[4].line, 4);
    }

    #[test]
    fn block_comment_advances_lines() {
        let toks = tokens("/* a\nb\nc */ x");
        assert_eq!(toks[1].line, 3);
    }

    macro_rules! lexical_error_tests {
        ($($name:ident: $text:literal => $line:literal,)*) => {
        $(
            #[test]
            fn $name() {
                let results: Vec<_> = Tokenizer::new($text).collect();
                let err = results
                    .iter()
                    .find_map(|r| r.as_ref().err())
                    .expect("expected a lexical error");
                assert!(matches!(err.kind, ErrorKind::Lexical(_)));
                assert_eq!(err.line, $line);
                // fused after the error
                assert!(results.last().unwrap().is_err());
            }
        )*
        }
    }

    lexical_error_tests! {
        unterminated_string: "@Author \"me;\n@Date 1;" => 1,
        unterminated_comment: "x\n\n/* never closed\n" => 3,
        multi_char_literal: "a = 'te';" => 1,
    }
}
