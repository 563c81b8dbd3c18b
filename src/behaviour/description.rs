use std::collections::{BTreeMap, BTreeSet};

use crate::error::{CompileError, ErrorKind};

use super::algorithm::AlgorithmDescriptor;
use super::bounds::BoundsDescription;
use super::code_block::{CodeBlock, CodeBlockRole};
use super::family::{FamilyProfile, IMPLICIT};
use super::hypothesis::ModellingHypothesis;
use super::variable::{
    is_glossary_name, is_supported_type, TypeFlag, Variable, VariableCategory,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymmetryType {
    Isotropic,
    Orthotropic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MaterialLaw {
    pub name: String,
    pub file: String,
    pub line: usize,
}

pub(crate) const CXX_KEYWORDS: &[&str] = &[
    "auto", "bool", "break", "case", "char", "class", "const", "constexpr", "continue",
    "default", "delete", "do", "double", "else", "enum", "explicit", "extern", "false",
    "float", "for", "friend", "goto", "if", "inline", "int", "long", "mutable",
    "namespace", "new", "nullptr", "operator", "private", "protected", "public",
    "register", "return", "short", "signed", "sizeof", "static", "struct", "switch",
    "template", "this", "throw", "true", "try", "typedef", "typename", "union",
    "unsigned", "using", "virtual", "void", "volatile", "while",
];

/// names used by the generated integrators
const INTERNAL_NAMES: &[&str] = &[
    "epsilon", "theta", "iterMax", "numerical_jacobian_epsilon", "maxSubSteps", "N", "Type",
    "use_qt", "hypothesis", "integrate", "smt", "smflag", "dt", "T", "dT", "eto", "deto",
    "sig", "Dt", "iter", "converged", "zeros", "fzeros", "jacobian", "tjacobian", "tpermutation",
    "policy", "real", "computeFdF", "computeFlow", "computeDerivative", "NewtonIntegration",
    "updateStateVariables", "updateAuxiliaryStateVariables", "computeConsistentTangentOperator",
    "initialize", "std", "tfel", "newton_f", "newton_df", "subStep", "subSteps",
];

pub const MATH_FUNCTIONS: &[&str] = &[
    "exp", "log", "log10", "pow", "sqrt", "cbrt", "abs", "fabs", "min", "max", "sin", "cos",
    "tan", "asin", "acos", "atan", "sinh", "cosh", "tanh", "floor", "ceil", "power",
    "sigmaeq", "trace", "deviator", "det", "transpose", "invert", "base_cast",
    "computeElasticStiffness", "isfinite",
];

/// The model of one behaviour, built by the DSL engine and read by the generator.
#[derive(Debug, Clone)]
pub struct BehaviourDescription {
    pub name: Option<String>,
    pub material: Option<String>,
    pub author: Option<String>,
    pub date: Option<String>,
    pub description: Option<String>,
    pub family: &'static FamilyProfile,
    pub algorithm: AlgorithmDescriptor,
    pub symmetry: SymmetryType,
    pub material_laws: Vec<MaterialLaw>,
    pub includes: Vec<String>,
    pub source_file: Option<String>,
    hypotheses: Option<BTreeSet<ModellingHypothesis>>,
    variables: Vec<Variable>,
    default_names: BTreeSet<String>,
    code_blocks: BTreeMap<(CodeBlockRole, ModellingHypothesis), CodeBlock>,
    bounds: Vec<BoundsDescription>,
    reserved_names: BTreeSet<String>,
    user_declarations: usize,
}

impl Default for BehaviourDescription {
    fn default() -> Self {
        Self::new()
    }
}

impl BehaviourDescription {
    pub fn new() -> Self {
        let reserved_names = CXX_KEYWORDS
            .iter()
            .chain(INTERNAL_NAMES)
            .chain(MATH_FUNCTIONS)
            .map(|s| s.to_string())
            .collect();
        Self {
            name: None,
            material: None,
            author: None,
            date: None,
            description: None,
            family: &IMPLICIT,
            algorithm: AlgorithmDescriptor::new(IMPLICIT.kind),
            symmetry: SymmetryType::Isotropic,
            material_laws: Vec::new(),
            includes: Vec::new(),
            source_file: None,
            hypotheses: None,
            variables: Vec::new(),
            default_names: BTreeSet::new(),
            code_blocks: BTreeMap::new(),
            bounds: Vec::new(),
            reserved_names,
            user_declarations: 0,
        }
    }

    /// the name of the generated class, prefixed by the material if any
    pub fn class_name(&self) -> String {
        let name = self.name.as_deref().unwrap_or("Behaviour");
        match &self.material {
            Some(material) => format!("{}_{}", material, name),
            None => name.to_string(),
        }
    }

    /// whether variables or algorithm settings were given, the defaults of the family
    /// left aside
    pub fn has_user_declarations(&self) -> bool {
        self.user_declarations > 0 || self.algorithm != AlgorithmDescriptor::new(self.family.kind)
    }

    /// Selects the behaviour family, registering its default variables. Only possible
    /// before anything else was declared.
    pub fn set_family(&mut self, family: &'static FamilyProfile, line: usize) -> Result<(), CompileError> {
        if self.has_user_declarations() || !self.default_names.is_empty() {
            return Err(CompileError::syntax(
                format!("the DSL must be selected before any declaration (selecting '{}')", family.name),
                line,
            ));
        }
        self.family = family;
        self.algorithm = AlgorithmDescriptor::new(family.kind);
        for name in family.builtins {
            self.reserved_names.insert(name.to_string());
        }
        for v in family.default_variables {
            let mut variable = Variable::new(v.name, v.type_name, v.category, line);
            variable.glossary_name = v.glossary_name.map(|s| s.to_string());
            self.add_variable(variable)?;
            self.default_names.insert(v.name.to_string());
        }
        // defaults do not count as user declarations
        self.user_declarations = 0;
        Ok(())
    }

    pub fn is_default_variable(&self, name: &str) -> bool {
        self.default_names.contains(name)
    }

    pub fn is_reserved(&self, name: &str) -> bool {
        self.reserved_names.contains(name)
    }

    pub fn reserve(&mut self, name: &str) {
        self.reserved_names.insert(name.to_string());
    }

    /// names derived from a variable by the implicit scheme: its increment and its
    /// residual for state variables, its increment for external state variables
    fn derived_names(variable: &Variable) -> Vec<String> {
        match variable.category {
            VariableCategory::StateVariable => {
                vec![format!("d{}", variable.name), format!("f{}", variable.name)]
            }
            VariableCategory::ExternalStateVariable => vec![format!("d{}", variable.name)],
            _ => vec![],
        }
    }

    pub fn add_variable(&mut self, variable: Variable) -> Result<(), CompileError> {
        let line = variable.line;
        if variable.array_size == 0 {
            return Err(CompileError::syntax(
                format!("invalid array size 0 for '{}'", variable.name),
                line,
            ));
        }
        if !is_supported_type(&variable.type_name) {
            return Err(CompileError::syntax(
                format!("unsupported type '{}' for '{}'", variable.type_name, variable.name),
                line,
            ));
        }
        if self.is_reserved(&variable.name) {
            return Err(CompileError::new(ErrorKind::ReservedName(variable.name), line));
        }
        let mut names = vec![variable.name.clone()];
        names.extend(Self::derived_names(&variable));
        for name in &names {
            if let Some(previous) = self.variable(name) {
                return Err(CompileError::new(
                    ErrorKind::DuplicateVariable {
                        name: name.clone(),
                        previous: previous.line,
                    },
                    line,
                ));
            }
            if let Some(previous) = self.variables.iter().find(|v| Self::derived_names(v).contains(name)) {
                return Err(CompileError::new(
                    ErrorKind::DuplicateVariable {
                        name: name.clone(),
                        previous: previous.line,
                    },
                    line,
                ));
            }
        }
        if let Some(external) = variable.glossary_name.as_deref().or(variable.entry_name.as_deref()) {
            self.check_external_name(external, line)?;
        }
        self.user_declarations += 1;
        self.variables.push(variable);
        Ok(())
    }

    fn check_external_name(&self, external: &str, line: usize) -> Result<(), CompileError> {
        if let Some(previous) = self.variables.iter().find(|v| v.external_name() == external) {
            return Err(CompileError::new(
                ErrorKind::DuplicateVariable {
                    name: external.to_string(),
                    previous: previous.line,
                },
                line,
            ));
        }
        Ok(())
    }

    pub fn set_glossary_name(&mut self, name: &str, glossary: &str, line: usize) -> Result<(), CompileError> {
        if !is_glossary_name(glossary) {
            return Err(CompileError::syntax(
                format!("'{}' is not a glossary name", glossary),
                line,
            ));
        }
        self.set_external_name(name, glossary, true, line)
    }

    pub fn set_entry_name(&mut self, name: &str, entry: &str, line: usize) -> Result<(), CompileError> {
        if is_glossary_name(entry) {
            return Err(CompileError::syntax(
                format!("'{}' is a glossary name, use setGlossaryName", entry),
                line,
            ));
        }
        self.set_external_name(name, entry, false, line)
    }

    fn set_external_name(&mut self, name: &str, external: &str, glossary: bool, line: usize) -> Result<(), CompileError> {
        let Some(index) = self.variables.iter().position(|v| v.name == name) else {
            return Err(CompileError::new(ErrorKind::UnknownVariable(name.to_string()), line));
        };
        if self.variables[index].glossary_name.is_some() || self.variables[index].entry_name.is_some() {
            return Err(CompileError::syntax(
                format!("an external name was already given to '{}'", name),
                line,
            ));
        }
        if external != name {
            self.check_external_name(external, line)?;
        }
        let variable = &mut self.variables[index];
        if glossary {
            variable.glossary_name = Some(external.to_string());
        } else {
            variable.entry_name = Some(external.to_string());
        }
        Ok(())
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    pub fn variable_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.variables.iter_mut().find(|v| v.name == name)
    }

    pub fn all_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter()
    }

    pub fn variables(&self, category: VariableCategory) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(move |v| v.category == category)
    }

    /// resolves a name derived from a state or external state variable, `dx` or `fx`,
    /// to the variable it derives from
    pub fn derived_variable(&self, name: &str) -> Option<&Variable> {
        self.variables
            .iter()
            .find(|v| Self::derived_names(v).iter().any(|d| d == name))
    }

    pub fn set_hypotheses(&mut self, hypotheses: BTreeSet<ModellingHypothesis>, line: usize) -> Result<(), CompileError> {
        if self.hypotheses.is_some() {
            return Err(CompileError::syntax("modelling hypotheses already defined", line));
        }
        if let Some(h) = hypotheses.iter().find(|h| !self.family.supports_hypothesis(**h)) {
            return Err(CompileError::syntax(
                format!("modelling hypothesis '{}' is not supported by the {} DSL", h, self.family.name),
                line,
            ));
        }
        self.hypotheses = Some(hypotheses);
        Ok(())
    }

    pub fn has_explicit_hypotheses(&self) -> bool {
        self.hypotheses.is_some()
    }

    pub fn hypotheses(&self) -> BTreeSet<ModellingHypothesis> {
        match &self.hypotheses {
            Some(h) => h.clone(),
            None => self.family.default_hypotheses().collect(),
        }
    }

    fn check_code_block(&self, block: &CodeBlock) -> Result<(), CompileError> {
        let h = block.hypothesis;
        if h != ModellingHypothesis::UndefinedHypothesis && !self.family.supports_hypothesis(h) {
            return Err(CompileError::syntax(
                format!("modelling hypothesis '{}' is not supported by the {} DSL", h, self.family.name),
                block.line,
            ));
        }
        if self.code_blocks.contains_key(&(block.role, h)) && !block.is_override {
            return Err(duplicate_code_block(block));
        }
        Ok(())
    }

    pub fn add_code_block(&mut self, block: CodeBlock) -> Result<(), CompileError> {
        self.add_code_blocks(vec![block])
    }

    /// Adds the copies of a block declared for several hypotheses. Nothing is added
    /// if one of them is rejected.
    pub fn add_code_blocks(&mut self, blocks: Vec<CodeBlock>) -> Result<(), CompileError> {
        let mut keys = BTreeSet::new();
        for block in &blocks {
            self.check_code_block(block)?;
            if !keys.insert((block.role, block.hypothesis)) {
                return Err(duplicate_code_block(block));
            }
        }
        for block in blocks {
            self.user_declarations += 1;
            self.code_blocks.insert((block.role, block.hypothesis), block);
        }
        Ok(())
    }

    /// the block for a hypothesis, falling back to the one declared for all hypotheses
    pub fn code_block(&self, role: CodeBlockRole, hypothesis: ModellingHypothesis) -> Option<&CodeBlock> {
        self.code_blocks
            .get(&(role, hypothesis))
            .or_else(|| self.code_blocks.get(&(role, ModellingHypothesis::UndefinedHypothesis)))
    }

    pub fn has_code_block(&self, role: CodeBlockRole) -> bool {
        self.code_blocks.keys().any(|(r, _)| *r == role)
    }

    pub fn code_blocks(&self) -> impl Iterator<Item = &CodeBlock> {
        self.code_blocks.values()
    }

    /// number of flow rules of a behaviour with several isotropic flows
    pub fn number_of_flows(&self) -> usize {
        self.code_blocks
            .keys()
            .filter_map(|(r, _)| match r {
                CodeBlockRole::Flow(i) => Some(i + 1),
                _ => None,
            })
            .max()
            .unwrap_or(0)
    }

    pub fn add_bounds(&mut self, bounds: BoundsDescription) -> Result<(), CompileError> {
        // the temperature is always there
        if bounds.variable == "T" && bounds.component.is_none() {
            self.user_declarations += 1;
            self.bounds.push(bounds);
            return Ok(());
        }
        let Some(variable) = self.variable(&bounds.variable) else {
            return Err(CompileError::new(
                ErrorKind::UnknownVariable(bounds.variable.clone()),
                bounds.line,
            ));
        };
        if let Some(c) = bounds.component {
            let components = match variable.flag() {
                TypeFlag::Scalar | TypeFlag::Integer => variable.array_size,
                // components missing in lower dimensions are skipped by the generator
                TypeFlag::Stensor => 6 * variable.array_size,
                TypeFlag::Tensor => 9 * variable.array_size,
            };
            if c >= components || components == 1 {
                return Err(CompileError::syntax(
                    format!("invalid component {} for '{}'", c, bounds.variable),
                    bounds.line,
                ));
            }
        }
        self.user_declarations += 1;
        self.bounds.push(bounds);
        Ok(())
    }

    pub fn bounds(&self) -> &[BoundsDescription] {
        &self.bounds
    }

    pub fn add_material_law(&mut self, law: MaterialLaw) -> Result<(), CompileError> {
        if self.material_laws.iter().any(|l| l.name == law.name) {
            return Err(CompileError::syntax(
                format!("material law '{}' already declared", law.name),
                law.line,
            ));
        }
        self.material_laws.push(law);
        Ok(())
    }

    pub fn is_material_law(&self, name: &str) -> bool {
        self.material_laws.iter().any(|l| l.name == name)
    }

    /// switches to an orthotropic behaviour, declaring the per axis elastic properties
    /// the user did not declare
    pub fn set_orthotropic(&mut self, line: usize) -> Result<(), CompileError> {
        if self.symmetry == SymmetryType::Orthotropic {
            return Err(CompileError::syntax("orthotropic behaviour already declared", line));
        }
        self.symmetry = SymmetryType::Orthotropic;
        let properties = [
            ("young1", "stress", "YoungModulus1"),
            ("young2", "stress", "YoungModulus2"),
            ("young3", "stress", "YoungModulus3"),
            ("nu12", "real", "PoissonRatio12"),
            ("nu23", "real", "PoissonRatio23"),
            ("nu13", "real", "PoissonRatio13"),
            ("mu12", "stress", "ShearModulus12"),
            ("mu23", "stress", "ShearModulus23"),
            ("mu13", "stress", "ShearModulus13"),
        ];
        let declarations = self.user_declarations;
        for (name, type_name, glossary) in properties {
            if self.variable(name).is_some() {
                continue;
            }
            let variable = Variable::new(name, type_name, VariableCategory::MaterialProperty, line)
                .with_glossary_name(glossary);
            self.add_variable(variable)?;
            self.default_names.insert(name.to_string());
        }
        self.user_declarations = declarations + 1;
        Ok(())
    }

    /// freezes the description, checking what can only be checked once everything is
    /// declared
    pub fn finish(&mut self, line: usize) -> Result<(), CompileError> {
        if self.name.is_none() {
            return Err(CompileError::syntax("no behaviour name given, @Behaviour is mandatory", line));
        }
        Ok(())
    }
}

fn duplicate_code_block(block: &CodeBlock) -> CompileError {
    CompileError::new(
        ErrorKind::DuplicateCodeBlock {
            role: block.role.to_string(),
            hypothesis: block.hypothesis.to_string(),
        },
        block.line,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::algorithm::AlgorithmParameter;
    use crate::behaviour::family::ISOTROPIC_MISES_CREEP;
    use proptest::prelude::*;

    fn var(name: &str, category: VariableCategory) -> Variable {
        Variable::new(name, "real", category, 1)
    }

    #[test]
    fn family_defaults() {
        let mut bd = BehaviourDescription::new();
        bd.set_family(&ISOTROPIC_MISES_CREEP, 1).unwrap();
        assert!(bd.variable("young").is_some());
        assert!(bd.is_default_variable("eel"));
        assert!(!bd.has_user_declarations());
        bd.add_variable(var("A", VariableCategory::MaterialProperty)).unwrap();
        assert!(bd.set_family(&ISOTROPIC_MISES_CREEP, 2).is_err());
    }

    #[test]
    fn algorithm_settings_before_the_family() {
        let mut bd = BehaviourDescription::new();
        bd.algorithm.set(AlgorithmParameter::Epsilon, 1e-12, 1).unwrap();
        assert!(bd.has_user_declarations());
        let err = bd.set_family(&ISOTROPIC_MISES_CREEP, 2).unwrap_err();
        assert_eq!(err.line, 2);
        assert_eq!(bd.algorithm.epsilon, 1e-12);
    }

    #[test]
    fn derived_names_collide() {
        let mut bd = BehaviourDescription::new();
        bd.add_variable(var("p", VariableCategory::StateVariable)).unwrap();
        let err = bd.add_variable(var("dp", VariableCategory::LocalVariable)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DuplicateVariable { .. }));
        let err = bd.add_variable(var("fp", VariableCategory::Parameter)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DuplicateVariable { .. }));
        assert_eq!(bd.derived_variable("dp").map(|v| v.name.as_str()), Some("p"));
    }

    #[test]
    fn reserved_and_invalid() {
        let mut bd = BehaviourDescription::new();
        let err = bd.add_variable(var("theta", VariableCategory::Parameter)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ReservedName(_)));
        let err = bd.add_variable(var("while", VariableCategory::LocalVariable)).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::ReservedName(_)));
        let err = bd
            .add_variable(var("x", VariableCategory::LocalVariable).with_array_size(0))
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::Syntax(_)));
    }

    #[test]
    fn external_names_are_unique() {
        let mut bd = BehaviourDescription::new();
        bd.add_variable(var("E", VariableCategory::MaterialProperty)).unwrap();
        bd.add_variable(var("E2", VariableCategory::MaterialProperty)).unwrap();
        bd.set_glossary_name("E", "YoungModulus", 2).unwrap();
        let err = bd.set_glossary_name("E2", "YoungModulus", 3).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DuplicateVariable { .. }));
        let err = bd.set_glossary_name("E3", "PoissonRatio", 3).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::UnknownVariable(_)));
        assert!(bd.set_glossary_name("E2", "NotInTheGlossary", 3).is_err());
    }

    #[test]
    fn code_block_fallback_and_override() {
        let mut bd = BehaviourDescription::new();
        let default = CodeBlock::new(CodeBlockRole::Integrator, ModellingHypothesis::UndefinedHypothesis, vec![], 3);
        bd.add_code_block(default.clone()).unwrap();
        let err = bd.add_code_block(default.clone()).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DuplicateCodeBlock { .. }));
        let mut specific = CodeBlock::new(CodeBlockRole::Integrator, ModellingHypothesis::PlaneStrain, vec![], 8);
        bd.add_code_block(specific.clone()).unwrap();
        assert_eq!(bd.code_block(CodeBlockRole::Integrator, ModellingHypothesis::PlaneStrain).unwrap().line, 8);
        assert_eq!(bd.code_block(CodeBlockRole::Integrator, ModellingHypothesis::Tridimensional).unwrap().line, 3);
        specific.is_override = true;
        specific.line = 12;
        bd.add_code_block(specific).unwrap();
        assert_eq!(bd.code_block(CodeBlockRole::Integrator, ModellingHypothesis::PlaneStrain).unwrap().line, 12);
    }

    #[test]
    fn rejected_hypothesis_list_adds_nothing() {
        let mut bd = BehaviourDescription::new();
        let block = |h| CodeBlock::new(CodeBlockRole::Integrator, h, vec![], 5);
        bd.add_code_block(block(ModellingHypothesis::PlaneStrain)).unwrap();
        let err = bd
            .add_code_blocks(vec![
                block(ModellingHypothesis::Tridimensional),
                block(ModellingHypothesis::PlaneStrain),
            ])
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DuplicateCodeBlock { .. }));
        assert!(bd.code_block(CodeBlockRole::Integrator, ModellingHypothesis::Tridimensional).is_none());
        let err = bd
            .add_code_blocks(vec![
                block(ModellingHypothesis::Axisymmetrical),
                block(ModellingHypothesis::Axisymmetrical),
            ])
            .unwrap_err();
        assert!(matches!(err.kind, ErrorKind::DuplicateCodeBlock { .. }));
        assert!(bd.code_block(CodeBlockRole::Integrator, ModellingHypothesis::Axisymmetrical).is_none());
    }

    #[test]
    fn orthotropic_properties() {
        let mut bd = BehaviourDescription::new();
        bd.add_variable(var("nu12", VariableCategory::MaterialProperty)).unwrap();
        bd.set_orthotropic(4).unwrap();
        assert_eq!(bd.variables(VariableCategory::MaterialProperty).count(), 9);
        assert!(!bd.is_default_variable("nu12"));
        assert!(bd.is_default_variable("young2"));
        assert!(bd.set_orthotropic(5).is_err());
    }

    #[test]
    fn bounds_on_unknown_variable() {
        let mut bd = BehaviourDescription::new();
        let b = BoundsDescription::new("T2", None, crate::behaviour::bounds::BoundsCategory::Physical, Some(0.), None, 6)
            .unwrap();
        let err = bd.add_bounds(b).unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownVariable("T2".to_string()));
        assert_eq!(err.line, 6);
    }

    fn category() -> impl Strategy<Value = VariableCategory> {
        prop::sample::select(VariableCategory::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn names_are_unique_across_categories(
            name in "[A-Z][a-z]{2,6}[0-9]",
            first in category(),
            second in category(),
        ) {
            let mut bd = BehaviourDescription::new();
            bd.add_variable(Variable::new(&name, "real", first, 1)).unwrap();
            let err = bd.add_variable(Variable::new(&name, "real", second, 2)).unwrap_err();
            let is_duplicate = matches!(err.kind, ErrorKind::DuplicateVariable { previous: 1, .. });
            prop_assert!(is_duplicate);
            prop_assert_eq!(err.line, 2);
        }
    }
}
