use std::collections::HashMap;

use tracing::{debug, trace};

use crate::behaviour::BehaviourDescription;
use crate::error::{CompileError, CompileErrors};

use super::cursor::TokenCursor;
use super::tokenizer::Token;
use super::validate;

pub type KeywordHandler = fn(&mut DslEngine<'_>, &Token) -> Result<(), CompileError>;

/// Maps every keyword, aliases included, to its handler and canonical spelling.
#[derive(Default)]
pub struct KeywordTable {
    handlers: HashMap<&'static str, (KeywordHandler, &'static str)>,
}

impl KeywordTable {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// registers a handler, the first name being the canonical one
    pub fn insert(&mut self, names: &[&'static str], handler: KeywordHandler) {
        let Some(canonical) = names.first().copied() else {
            return;
        };
        for name in names {
            self.handlers.insert(name, (handler, canonical));
        }
    }

    pub fn get(&self, keyword: &str) -> Option<(KeywordHandler, &'static str)> {
        self.handlers.get(keyword).copied()
    }

    pub fn contains(&self, keyword: &str) -> bool {
        self.handlers.contains_key(keyword)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// all accepted spellings, sorted
    pub fn keywords(&self) -> Vec<&'static str> {
        let mut keywords: Vec<_> = self.handlers.keys().copied().collect();
        keywords.sort();
        keywords
    }
}

/// Drives one linear pass over a behaviour file. Keyword handlers mutate the
/// description; their errors are collected and the scan resumes at the next keyword.
pub struct DslEngine<'a> {
    pub(crate) cursor: TokenCursor<'a>,
    pub(crate) bd: BehaviourDescription,
    errors: CompileErrors,
    table: &'a KeywordTable,
}

impl<'a> DslEngine<'a> {
    pub fn new(
        tokens: impl Iterator<Item = Result<Token, CompileError>> + 'a,
        table: &'a KeywordTable,
    ) -> Self {
        Self {
            cursor: TokenCursor::new(tokens),
            bd: BehaviourDescription::new(),
            errors: CompileErrors::new(),
            table,
        }
    }

    pub fn run(mut self) -> Result<BehaviourDescription, CompileErrors> {
        while let Some(token) = self.cursor.next() {
            let result = if token.is_keyword() {
                self.dispatch(&token)
            } else if token.is_identifier() && self.cursor.peek_is(".") {
                super::keywords::treat_method_call(&mut self, &token)
            } else {
                Err(CompileError::syntax(
                    format!("unexpected token '{}', expected a keyword", token.value),
                    token.line,
                ))
            };
            self.absorb_preprocessor();
            if let Err(err) = result {
                debug!(line = err.line, "{}", err.kind);
                self.errors.push(err);
                self.cursor.skip_to_next_keyword();
            }
            self.cursor.clear_doc();
        }
        self.absorb_preprocessor();

        if let Some(err) = self.cursor.take_lexical_error() {
            // the token stream was cut short, the description is incomplete
            self.errors.push(err);
            return Err(self.errors);
        }
        if let Err(err) = self.bd.finish(self.cursor.line()) {
            self.errors.push(err);
        }
        self.errors.extend(validate::validate(&self.bd));

        if self.errors.is_empty() {
            Ok(self.bd)
        } else {
            Err(self.errors)
        }
    }

    fn dispatch(&mut self, token: &Token) -> Result<(), CompileError> {
        let Some((handler, canonical)) = self.table.get(&token.value) else {
            return Err(CompileError::syntax(
                format!("unknown keyword '{}'", token.value),
                token.line,
            ));
        };
        if self.bd.family.disables(canonical) {
            return Err(CompileError::syntax(
                format!(
                    "keyword {} is not allowed by the {} DSL",
                    token.value, self.bd.family.name
                ),
                token.line,
            ));
        }
        trace!(keyword = canonical, line = token.line, "treating keyword");
        handler(self, token)
    }

    fn absorb_preprocessor(&mut self) {
        for token in self.cursor.take_preprocessor() {
            self.bd.includes.push(token.value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_: &mut DslEngine<'_>, _: &Token) -> Result<(), CompileError> {
        Ok(())
    }

    #[test]
    fn aliases_share_canonical_name() {
        let mut table = KeywordTable::new();
        table.insert(&["@StateVariable", "@StateVar"], noop);
        assert_eq!(table.get("@StateVar").map(|(_, c)| c), Some("@StateVariable"));
        assert!(table.contains("@StateVariable"));
        assert_eq!(table.keywords(), vec!["@StateVar", "@StateVariable"]);
        assert!(table.get("@Unknown").is_none());
    }
}
