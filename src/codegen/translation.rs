use std::collections::{BTreeMap, BTreeSet};

use crate::parser::{Token, TokenKind};

/// `(this->x+(factor)*(this->dx))`, the value of `x` at the fraction `factor` of the
/// step, or its end of step value when there is no factor
pub fn interpolate(name: &str, increment: &str, factor: Option<&str>) -> String {
    match factor {
        Some(factor) => format!("(this->{}+({})*(this->{}))", name, factor, increment),
        None => format!("(this->{}+this->{})", name, increment),
    }
}

/// Rewrites the tokens of a code block into C++ statements of the generated class:
/// member variables get a `this->` prefix and some names are replaced by expressions.
#[derive(Debug, Clone, Default)]
pub struct Translator {
    members: BTreeSet<String>,
    replacements: BTreeMap<String, String>,
}

impl Translator {
    pub fn new<S: AsRef<str>>(members: impl IntoIterator<Item = S>) -> Self {
        Self {
            members: members.into_iter().map(|s| s.as_ref().to_string()).collect(),
            replacements: BTreeMap::new(),
        }
    }

    pub fn replace(mut self, name: &str, expression: String) -> Self {
        self.replacements.insert(name.to_string(), expression);
        self
    }

    /// replaces every `name` of `variables` (given with its increment) by its
    /// interpolated value
    pub fn interpolating<'a>(
        mut self,
        variables: impl IntoIterator<Item = (&'a str, &'a str)>,
        factor: Option<&str>,
    ) -> Self {
        for (name, increment) in variables {
            self.replacements
                .insert(name.to_string(), interpolate(name, increment, factor));
        }
        self
    }

    /// replaces the mid point names `x_` of `variables` by `x` interpolated with the θ
    /// factor
    pub fn mid_point_names<'a>(mut self, variables: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        for (name, increment) in variables {
            self.replacements.insert(
                format!("{}_", name),
                interpolate(name, increment, Some("this->theta")),
            );
        }
        self
    }

    fn translate_identifier(&self, name: &str) -> String {
        if let Some(expression) = self.replacements.get(name) {
            expression.clone()
        } else if self.members.contains(name) {
            format!("this->{}", name)
        } else {
            name.to_string()
        }
    }

    /// translated text of `body`, one statement per line, each line starting with
    /// `indent`
    pub fn translate(&self, body: &[Token], indent: &str) -> String {
        let mut writer = StatementWriter::new(indent);
        for (i, token) in body.iter().enumerate() {
            let previous = i.checked_sub(1).map(|p| &body[p]);
            let qualified = previous.is_some_and(|p| p.is(".") || p.is("->") || p.is("::"))
                || body.get(i + 1).is_some_and(|n| n.is("::"));
            match token.kind {
                TokenKind::Comment => writer.comment(&token.value),
                TokenKind::Preprocessor => writer.preprocessor(&token.value),
                TokenKind::Standard if token.is_identifier() && !qualified => {
                    writer.push(&self.translate_identifier(&token.value), token)
                }
                _ => writer.push(&token.value, token),
            }
        }
        writer.finish()
    }
}

/// Lays out C++ tokens, breaking lines after statements and braces.
struct StatementWriter<'a> {
    indent: &'a str,
    lines: Vec<String>,
    current: String,
    depth: usize,
    parentheses: usize,
    previous: Option<String>,
    /// the previous token was a prefix operator
    glue: bool,
}

const NO_SPACE_BEFORE: &[&str] = &[";", ",", ")", "]", ".", "->", "::", "["];
const NO_SPACE_AFTER: &[&str] = &["(", "[", ".", "->", "::", "!", "~"];

/// ends an operand, so that a following `-` is binary and `++` postfix
fn is_operand(text: &str) -> bool {
    text.chars()
        .last()
        .is_some_and(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | ')' | ']' | '.' | '"' | '\''))
}

impl<'a> StatementWriter<'a> {
    fn new(indent: &'a str) -> Self {
        Self {
            indent,
            lines: Vec::new(),
            current: String::new(),
            depth: 0,
            parentheses: 0,
            previous: None,
            glue: false,
        }
    }

    fn break_line(&mut self) {
        let text = std::mem::take(&mut self.current);
        let text = text.trim_end();
        if !text.is_empty() {
            let line = format!("{}{}{}", self.indent, "  ".repeat(self.depth), text);
            self.lines.push(line);
        }
        self.previous = None;
        self.glue = false;
    }

    fn needs_space(&self, value: &str, standard: bool) -> bool {
        let Some(previous) = self.previous.as_deref() else {
            return false;
        };
        if self.glue || NO_SPACE_AFTER.contains(&previous) {
            return false;
        }
        if !standard {
            return true;
        }
        if NO_SPACE_BEFORE.contains(&value) {
            return false;
        }
        if matches!(value, "++" | "--") && is_operand(previous) {
            return false;
        }
        // calls stick to the function name
        if value == "(" {
            return !is_operand(previous);
        }
        true
    }

    fn push(&mut self, value: &str, token: &Token) {
        let standard = token.kind == TokenKind::Standard;
        if standard && value == "}" {
            self.break_line();
            self.depth = self.depth.saturating_sub(1);
        }
        let prefix = standard
            && matches!(value, "-" | "+" | "++" | "--")
            && !self.previous.as_deref().is_some_and(is_operand);
        if self.needs_space(value, standard) {
            self.current.push(' ');
        }
        self.current.push_str(value);
        self.previous = Some(value.to_string());
        self.glue = prefix;
        if !standard {
            return;
        }
        match value {
            "(" => self.parentheses += 1,
            ")" => self.parentheses = self.parentheses.saturating_sub(1),
            "{" => {
                self.break_line();
                self.depth += 1;
            }
            "}" => self.break_line(),
            ";" if self.parentheses == 0 => self.break_line(),
            _ => {}
        }
    }

    fn comment(&mut self, text: &str) {
        if self.previous.is_some() {
            self.current.push(' ');
        }
        self.current.push_str(&format!("/* {} */", text.trim()));
        self.previous = Some("*/".to_string());
        self.glue = false;
    }

    fn preprocessor(&mut self, text: &str) {
        self.break_line();
        self.lines.push(text.trim_end().to_string());
    }

    fn finish(mut self) -> String {
        self.break_line();
        let mut text = self.lines.join("\n");
        if !text.is_empty() {
            text.push('\n');
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Tokenizer;

    fn tokens(text: &str) -> Vec<Token> {
        Tokenizer::new(text).collect::<Result<Vec<_>, _>>().unwrap()
    }

    macro_rules! translation_tests {
        ($($name:ident: $translator:expr, $text:expr => $expected:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let translator = $translator;
                assert_eq!(translator.translate(&tokens($text), ""), $expected);
            }
        )*
        }
    }

    translation_tests! {
        members_are_prefixed:
            Translator::new(["eel", "deel", "mu"]),
            "feel = deel - 2*mu*eel;" => "feel = this->deel - 2 * this->mu * this->eel;\n",
        qualified_names_are_kept:
            Translator::new(["Id", "sig"]),
            "sig = Stensor::Id(); x.sig = 1;" => "this->sig = Stensor::Id();\nx.sig = 1;\n",
        theta_interpolation:
            Translator::new(["eel", "deel", "lambda", "mu", "theta"])
                .interpolating([("eel", "deel")], Some("this->theta")),
            "sig = lambda*trace(eel)*Id + 2*mu*eel;" =>
            "sig = this->lambda * trace((this->eel+(this->theta)*(this->deel))) * Id + 2 * this->mu * (this->eel+(this->theta)*(this->deel));\n",
        end_of_step_values:
            Translator::new(["T", "dT"]).interpolating([("T", "dT")], None),
            "const real Tf = T;" => "const real Tf = (this->T+this->dT);\n",
        mid_point_names:
            Translator::new(["T", "dT", "A"]).mid_point_names([("T", "dT")]),
            "f = A*exp(-1/T_);" => "f = this->A * exp(-1 / (this->T+(this->theta)*(this->dT)));\n",
        blocks_are_indented:
            Translator::new(Vec::<String>::new()),
            "if(x>0){ y = 1; } else { y = 2; }" => "if(x > 0) {\n  y = 1;\n}\nelse {\n  y = 2;\n}\n",
        loops_keep_their_header:
            Translator::new(Vec::<String>::new()),
            "for(int i=0;i!=3;++i){ s += i; }" => "for(int i = 0; i != 3; ++i) {\n  s += i;\n}\n",
        comments_are_kept:
            Translator::new(Vec::<String>::new()),
            "// elasticity\nx = 1;" => "/* elasticity */ x = 1;\n",
    }
}
