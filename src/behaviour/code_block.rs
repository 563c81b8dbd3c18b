use std::collections::BTreeSet;
use std::fmt;

use crate::parser::tokenizer::Token;

use super::hypothesis::ModellingHypothesis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CodeBlockRole {
    InitLocalVars,
    Predictor,
    ComputeStress,
    ComputeFinalStress,
    Integrator,
    FlowRule,
    /// the i-th flow rule of a behaviour with several isotropic flows
    Flow(usize),
    ComputeDerivative,
    InitializeJacobian,
    TangentOperator,
    UpdateAuxiliaryStateVariables,
}

impl CodeBlockRole {
    pub fn keyword(&self) -> &'static str {
        match self {
            CodeBlockRole::InitLocalVars => "@InitLocalVariables",
            CodeBlockRole::Predictor => "@Predictor",
            CodeBlockRole::ComputeStress => "@ComputeStress",
            CodeBlockRole::ComputeFinalStress => "@ComputeFinalStress",
            CodeBlockRole::Integrator => "@Integrator",
            CodeBlockRole::FlowRule | CodeBlockRole::Flow(_) => "@FlowRule",
            CodeBlockRole::ComputeDerivative => "@Derivative",
            CodeBlockRole::InitializeJacobian => "@InitializeJacobian",
            CodeBlockRole::TangentOperator => "@TangentOperator",
            CodeBlockRole::UpdateAuxiliaryStateVariables => "@UpdateAuxiliaryStateVariables",
        }
    }

    /// name of the generated member function holding the block
    pub fn function_name(&self) -> String {
        match self {
            CodeBlockRole::InitLocalVars => "initializeLocalVariables".to_string(),
            CodeBlockRole::Predictor => "computePredictor".to_string(),
            CodeBlockRole::ComputeStress => "computeStress".to_string(),
            CodeBlockRole::ComputeFinalStress => "computeFinalStress".to_string(),
            CodeBlockRole::Integrator => "computeFdF".to_string(),
            CodeBlockRole::FlowRule => "computeFlow".to_string(),
            CodeBlockRole::Flow(i) => format!("computeFlow{}", i),
            CodeBlockRole::ComputeDerivative => "computeDerivative".to_string(),
            CodeBlockRole::InitializeJacobian => "initializeJacobian".to_string(),
            CodeBlockRole::TangentOperator => "computeConsistentTangentOperator".to_string(),
            CodeBlockRole::UpdateAuxiliaryStateVariables => {
                "updateAuxiliaryStateVariables".to_string()
            }
        }
    }
}

impl fmt::Display for CodeBlockRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.keyword())
    }
}

/// the kind of flow given to `@FlowRule` in behaviours with several isotropic flows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowKind {
    Creep,
    StrainHardeningCreep,
    Plasticity,
}

impl FlowKind {
    pub fn name(&self) -> &'static str {
        match self {
            FlowKind::Creep => "Creep",
            FlowKind::StrainHardeningCreep => "StrainHardeningCreep",
            FlowKind::Plasticity => "Plasticity",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Creep" => Some(FlowKind::Creep),
            "StrainHardeningCreep" => Some(FlowKind::StrainHardeningCreep),
            "Plasticity" => Some(FlowKind::Plasticity),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CodeBlock {
    pub role: CodeBlockRole,
    pub hypothesis: ModellingHypothesis,
    pub body: Vec<Token>,
    pub referenced_names: BTreeSet<String>,
    /// set when the block writes jacobian terms, which selects the analytical jacobian
    pub requires_jacobian_update: bool,
    pub is_override: bool,
    pub flow: Option<FlowKind>,
    pub line: usize,
}

impl CodeBlock {
    pub fn new(role: CodeBlockRole, hypothesis: ModellingHypothesis, body: Vec<Token>, line: usize) -> Self {
        let referenced_names = body
            .iter()
            .filter(|t| t.is_identifier())
            .map(|t| t.value.clone())
            .collect::<BTreeSet<_>>();
        let requires_jacobian_update = role == CodeBlockRole::Integrator
            && body.windows(2).any(|w| is_jacobian_term(&w[0].value) && is_assignment(&w[1].value));
        Self {
            role,
            hypothesis,
            body,
            referenced_names,
            requires_jacobian_update,
            is_override: false,
            flow: None,
            line,
        }
    }

    pub fn references(&self, name: &str) -> bool {
        self.referenced_names.contains(name)
    }
}

// `(` covers terms filled through helpers such as `getPartialJacobianInvert`
fn is_assignment(op: &str) -> bool {
    matches!(op, "=" | "+=" | "-=" | "*=" | "/=" | "(")
}

/// `dfx_ddy` terms of the jacobian
fn is_jacobian_term(name: &str) -> bool {
    name.strip_prefix("df")
        .and_then(|rest| rest.split_once("_dd"))
        .is_some_and(|(f, x)| !f.is_empty() && !x.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::tokenizer::Tokenizer;

    fn block(role: CodeBlockRole, text: &str) -> CodeBlock {
        let body = Tokenizer::new(text).collect::<Result<Vec<_>, _>>().unwrap();
        CodeBlock::new(role, ModellingHypothesis::UndefinedHypothesis, body, 1)
    }

    #[test]
    fn jacobian_update_detection() {
        let b = block(CodeBlockRole::Integrator, "feel = deel - deto; dfeel_ddeel = Stensor4::Id();");
        assert!(b.requires_jacobian_update);
        assert!(b.references("deto"));
        let b = block(CodeBlockRole::Integrator, "feel = deel - deto;");
        assert!(!b.requires_jacobian_update);
        let b = block(CodeBlockRole::TangentOperator, "dfeel_ddeel = 1;");
        assert!(!b.requires_jacobian_update);
    }

    #[test]
    fn jacobian_term_names() {
        assert!(is_jacobian_term("dfeel_ddp"));
        assert!(is_jacobian_term("dfp_ddeel"));
        assert!(!is_jacobian_term("df_dseq"));
        assert!(!is_jacobian_term("df_ddp"));
    }
}
