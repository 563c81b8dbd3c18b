use std::fmt;
use std::fmt::Write;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    #[error("lexical error: {0}")]
    Lexical(String),
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("variable '{name}' is already declared at line {previous}")]
    DuplicateVariable { name: String, previous: usize },
    #[error("'{0}' is a reserved name")]
    ReservedName(String),
    #[error("unknown variable '{0}'")]
    UnknownVariable(String),
    #[error("invalid range [{lower}:{upper}] for '{variable}', lower bound is greater than upper bound")]
    InvalidRange {
        variable: String,
        lower: f64,
        upper: f64,
    },
    #[error("code block {role} is already defined for hypothesis {hypothesis}")]
    DuplicateCodeBlock { role: String, hypothesis: String },
    #[error("invalid algorithm parameter '{name}': {reason}")]
    InvalidAlgorithmParameter { name: String, reason: String },
    #[error("unknown identifier '{name}' in block {block} starting at line {block_line}")]
    UnknownIdentifier {
        name: String,
        block: String,
        block_line: usize,
    },
    #[error("mandatory code block {role} is missing for hypothesis {hypothesis}")]
    MissingCodeBlock { role: String, hypothesis: String },
    #[error("generation error: {0}")]
    Generation(String),
    #[error("i/o error: {0}")]
    Io(String),
}

/// An error found while compiling one behaviour, located by file and line. A line of 0
/// means the error is not attached to a particular line.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub kind: ErrorKind,
    pub file: Option<String>,
    pub line: usize,
}

impl CompileError {
    pub fn new(kind: ErrorKind, line: usize) -> Self {
        Self {
            kind,
            file: None,
            line,
        }
    }

    pub fn syntax(text: impl Into<String>, line: usize) -> Self {
        Self::new(ErrorKind::Syntax(text.into()), line)
    }

    pub fn generation(text: impl Into<String>) -> Self {
        Self::new(ErrorKind::Generation(text.into()), 0)
    }

    pub fn in_file(mut self, file: &str) -> Self {
        self.file = Some(file.to_string());
        self
    }

    pub fn as_error_message(&self, f: &mut String, input: &str) -> fmt::Result {
        writeln!(f, "{}", self)?;
        if self.line > 0 {
            if let Some(text) = input.lines().nth(self.line - 1) {
                writeln!(f, "    {}", text.trim_end())?;
            }
        }
        Ok(())
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), 0) => write!(f, "{}: error: {}", file, self.kind),
            (Some(file), line) => write!(f, "{}:{}: error: {}", file, line, self.kind),
            (None, 0) => write!(f, "error: {}", self.kind),
            (None, line) => write!(f, "line {}: error: {}", line, self.kind),
        }
    }
}

impl std::error::Error for CompileError {}

impl From<std::io::Error> for CompileError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io(err.to_string()), 0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CompileErrors {
    errors: Vec<CompileError>,
}

impl CompileErrors {
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    pub fn push(&mut self, new: CompileError) {
        self.errors.push(new);
    }

    pub fn extend(&mut self, new: impl IntoIterator<Item = CompileError>) {
        self.errors.extend(new)
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CompileError> {
        self.errors.iter()
    }

    pub fn in_file(self, file: &str) -> Self {
        Self {
            errors: self.errors.into_iter().map(|e| e.in_file(file)).collect(),
        }
    }

    pub fn as_error_message(&self, input: &str) -> String {
        let mut buf = String::new();
        for err in &self.errors {
            // writing to a String cannot fail
            let _ = err.as_error_message(&mut buf, input);
        }
        buf
    }

    pub fn has_error_contains(&self, text: &str) -> bool {
        self.errors.iter().any(|err| err.kind.to_string().contains(text))
    }
}

impl From<CompileError> for CompileErrors {
    fn from(err: CompileError) -> Self {
        Self { errors: vec![err] }
    }
}

impl IntoIterator for CompileErrors {
    type Item = CompileError;
    type IntoIter = std::vec::IntoIter<CompileError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl fmt::Display for CompileErrors {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for err in &self.errors {
            writeln!(f, "{}", err)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileErrors {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_and_without_file() {
        let err = CompileError::new(ErrorKind::UnknownVariable("T2".to_string()), 12);
        assert_eq!(err.to_string(), "line 12: error: unknown variable 'T2'");
        let err = err.in_file("Norton.mfront");
        assert_eq!(
            err.to_string(),
            "Norton.mfront:12: error: unknown variable 'T2'"
        );
    }

    #[test]
    fn error_message_quotes_source_line() {
        let input = "@Behaviour Norton;\n@StateVariable real p p;\n";
        let mut errors = CompileErrors::new();
        errors.push(CompileError::syntax("expected ';'", 2));
        let msg = errors.as_error_message(input);
        assert!(msg.contains("line 2: error: syntax error: expected ';'"));
        assert!(msg.contains("    @StateVariable real p p;"));
        assert!(errors.has_error_contains("expected ';'"));
        assert!(!errors.has_error_contains("unknown"));
    }
}
