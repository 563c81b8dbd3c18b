use std::collections::BTreeSet;

use crate::behaviour::description::{CXX_KEYWORDS, MATH_FUNCTIONS};
use crate::behaviour::{is_supported_type, BehaviourDescription, CodeBlock, CodeBlockRole, VariableCategory};
use crate::error::{CompileError, ErrorKind};

use super::tokenizer::Token;

/// names every code block may use
const GLOBAL_BUILTINS: &[&str] = &[
    "dt", "T", "dT", "eto", "deto", "sig", "theta", "epsilon", "iterMax", "N", "real",
];

/// types of the support library, besides the types variables can be declared with
const EXTRA_TYPES: &[&str] = &[
    "Stensor4", "st2tost2", "stensor", "tvector", "tmatrix", "size_t", "fsarray",
];

fn role_builtins(role: CodeBlockRole) -> &'static [&'static str] {
    match role {
        CodeBlockRole::FlowRule | CodeBlockRole::Flow(_) => {
            &["f", "df_dseq", "df_dp", "seq", "seq_e", "se", "n", "mu", "lambda"]
        }
        CodeBlockRole::TangentOperator => &[
            "Dt",
            "smt",
            "ELASTIC",
            "SECANTOPERATOR",
            "TANGENTOPERATOR",
            "CONSISTENTTANGENTOPERATOR",
            "NOSTIFFNESSREQUESTED",
            "jacobian",
            "getPartialJacobianInvert",
        ],
        CodeBlockRole::Integrator => &["jacobian", "zeros", "fzeros", "iter"],
        CodeBlockRole::InitializeJacobian => &["jacobian"],
        _ => &[],
    }
}

fn is_type_name(name: &str) -> bool {
    is_supported_type(name) || EXTRA_TYPES.contains(&name)
}

/// words after which an identifier is being declared
fn starts_declaration(name: &str) -> bool {
    is_type_name(name) || matches!(name, "auto" | "double" | "float" | "bool" | "int" | "unsigned" | "long" | "short")
}

/// The names a code block may refer to without declaring them.
struct Scope<'a> {
    bd: &'a BehaviourDescription,
    state_variables: Vec<String>,
}

impl<'a> Scope<'a> {
    fn new(bd: &'a BehaviourDescription) -> Self {
        let state_variables = bd
            .variables(VariableCategory::StateVariable)
            .map(|v| v.name.clone())
            .collect();
        Self { bd, state_variables }
    }

    fn is_jacobian_term(&self, name: &str) -> bool {
        let Some((f, d)) = name.strip_prefix("df").and_then(|rest| rest.split_once("_dd")) else {
            return false;
        };
        self.state_variables.iter().any(|v| v == f) && self.state_variables.iter().any(|v| v == d)
    }

    fn is_mid_point_value(&self, name: &str) -> bool {
        if !self.bd.algorithm.kind.is_isotropic() {
            return false;
        }
        let Some(base) = name.strip_suffix('_') else {
            return false;
        };
        base == "T"
            || self.bd.variable(base).is_some_and(|v| {
                matches!(
                    v.category,
                    VariableCategory::StateVariable | VariableCategory::ExternalStateVariable
                )
            })
    }

    fn knows(&self, name: &str, role: CodeBlockRole) -> bool {
        self.bd.variable(name).is_some()
            || self.bd.derived_variable(name).is_some()
            || GLOBAL_BUILTINS.contains(&name)
            || is_type_name(name)
            || MATH_FUNCTIONS.contains(&name)
            || CXX_KEYWORDS.contains(&name)
            || self.bd.family.is_builtin(name)
            || role_builtins(role).contains(&name)
            || self.bd.is_material_law(name)
            || self.is_jacobian_term(name)
            || self.is_mid_point_value(name)
    }
}

/// index just after the `>` closing the template arguments opened at `open`
fn skip_template_arguments(body: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    for (i, token) in body.iter().enumerate().skip(open) {
        if token.is("<") {
            depth += 1;
        } else if token.is(">") {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return i + 1;
            }
        } else if token.is(";") {
            return i;
        }
    }
    body.len()
}

fn check_block(scope: &Scope<'_>, block: &CodeBlock, errors: &mut Vec<CompileError>) {
    let body = &block.body;
    let mut locals = BTreeSet::new();
    let mut reported = BTreeSet::new();
    // a type was just read, the next identifier is declared
    let mut pending_declaration = false;
    // inside `type a = ..., b = ...;`, nesting counts the open parentheses
    let mut in_declaration = false;
    let mut nesting = 0usize;

    let mut i = 0;
    while i < body.len() {
        let token = &body[i];
        let previous = i.checked_sub(1).map(|p| &body[p]);
        let next = body.get(i + 1);
        if !token.is_identifier() {
            match token.value.as_str() {
                ";" | "{" | "}" => {
                    in_declaration = false;
                    pending_declaration = false;
                    nesting = 0;
                }
                "(" | "[" => nesting += 1,
                ")" | "]" => nesting = nesting.saturating_sub(1),
                "&" | "*" => {}
                _ => pending_declaration = false,
            }
            i += 1;
            continue;
        }
        let name = token.value.as_str();
        if previous.is_some_and(|p| p.is(".") || p.is("->")) {
            i += 1;
            continue;
        }
        if starts_declaration(name) || name == "const" {
            i = match next {
                Some(n) if n.is("<") && is_type_name(name) => skip_template_arguments(body, i + 1),
                _ => i + 1,
            };
            // `real(x)` is a conversion, its arguments are uses
            pending_declaration = !body.get(i).is_some_and(|n| n.is("("));
            continue;
        }
        if previous.is_some_and(|p| p.is("::")) || next.is_some_and(|n| n.is("::")) {
            i += 1;
            continue;
        }
        let declared = pending_declaration
            || (in_declaration && nesting == 0 && previous.is_some_and(|p| p.is(",")));
        if declared {
            locals.insert(name.to_string());
            pending_declaration = false;
            in_declaration = true;
            nesting = 0;
        } else if !locals.contains(name)
            && !scope.knows(name, block.role)
            && reported.insert(name.to_string())
        {
            errors.push(CompileError::new(
                ErrorKind::UnknownIdentifier {
                    name: name.to_string(),
                    block: block.role.keyword().to_string(),
                    block_line: block.line,
                },
                token.line,
            ));
        }
        i += 1;
    }
}

/// Checks that every identifier used in the code blocks resolves to a declared
/// variable, a name derived from one, a local declaration of the block or a name the
/// generated code provides.
pub fn validate(bd: &BehaviourDescription) -> Vec<CompileError> {
    let scope = Scope::new(bd);
    let mut errors = Vec::new();
    for block in bd.code_blocks() {
        check_block(&scope, block, &mut errors);
    }
    errors.sort_by_key(|e| e.line);
    errors
}
