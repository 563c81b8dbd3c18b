pub mod cursor;
pub mod engine;
pub mod keywords;
pub mod tokenizer;
pub mod validate;

use std::path::Path;

use crate::behaviour::BehaviourDescription;
use crate::error::{CompileError, CompileErrors};
use crate::registry::Registry;

pub use engine::{DslEngine, KeywordHandler, KeywordTable};
pub use tokenizer::{Token, TokenKind, Tokenizer};

/// builds a behaviour description from a token stream
pub fn parse(
    tokens: impl Iterator<Item = Result<Token, CompileError>>,
    registry: &Registry,
) -> Result<BehaviourDescription, CompileErrors> {
    DslEngine::new(tokens, registry.keywords()).run()
}

pub fn parse_mfront_string(text: &str, registry: &Registry) -> Result<BehaviourDescription, CompileErrors> {
    parse(Tokenizer::new(text), registry)
}

/// parses a behaviour file, every error being located in that file
pub fn parse_mfront_file(path: &Path, registry: &Registry) -> Result<BehaviourDescription, CompileErrors> {
    let file = path.display().to_string();
    let text = std::fs::read_to_string(path)
        .map_err(|e| CompileErrors::from(CompileError::from(e).in_file(&file)))?;
    let mut bd = parse_mfront_string(&text, registry).map_err(|errors| errors.in_file(&file))?;
    bd.source_file = Some(file);
    Ok(bd)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::{AlgorithmKind, CodeBlockRole, ModellingHypothesis, VariableCategory};
    use crate::error::ErrorKind;

    fn parse_str(text: &str) -> Result<BehaviourDescription, CompileErrors> {
        parse_mfront_string(text, &Registry::new())
    }

    macro_rules! parse_error_tests {
        ($($name:ident: $text:expr => $message:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let errors = parse_str($text).unwrap_err();
                assert!(
                    errors.has_error_contains($message),
                    "expected '{}' in:\n{}",
                    $message,
                    errors
                );
            }
        )*
        }
    }

    parse_error_tests! {
        missing_behaviour: "@Author me;" => "@Behaviour is mandatory",
        unknown_keyword: "@Behaviour B; @Frobnicate;" => "unknown keyword '@Frobnicate'",
        duplicate_variable: "@Behaviour B; @StateVariable real p; @AuxiliaryStateVariable real p;" => "variable 'p' is already declared at line 1",
        reserved_name: "@Behaviour B; @LocalVariable real theta;" => "'theta' is a reserved name",
        unsupported_type: "@Behaviour B; @LocalVariable matrix m;" => "unsupported type 'matrix'",
        zero_array: "@Behaviour B; @StateVariable real a[0];" => "invalid array size 0",
        reversed_bounds: "@Behaviour B; @StateVariable real p; @Bounds p in [1:0];" => "lower bound is greater than upper bound",
        bounds_unknown: "@Behaviour B; @Bounds q in [0:1];" => "unknown variable 'q'",
        duplicate_block: "@Behaviour B; @Integrator{} @Integrator{}" => "code block @Integrator is already defined",
        theta_range: "@Behaviour B; @Theta 2;" => "invalid algorithm parameter 'theta'",
        disabled_keyword: "@DSL IsotropicMisesCreep; @Behaviour B; @StateVariable real a;" => "not allowed by the IsotropicMisesCreep DSL",
        late_dsl: "@Behaviour B; @StateVariable real a; @DSL RungeKutta;" => "the DSL must be selected before any declaration",
        epsilon_before_dsl: "@Epsilon 1e-12; @DSL IsotropicMisesCreep; @Behaviour B;" => "the DSL must be selected before any declaration",
        algorithm_before_dsl: "@Algorithm NewtonRaphson_NumericalJacobian; @DSL RungeKutta; @Behaviour B;" => "the DSL must be selected before any declaration",
        unknown_dsl: "@DSL Fancy; @Behaviour B;" => "unknown DSL 'Fancy'",
        runge_kutta_theta: "@DSL RungeKutta; @Behaviour B; @Theta 0.5;" => "not supported by the selected algorithm",
        unknown_algorithm: "@Behaviour B; @Algorithm rk4;" => "invalid algorithm parameter 'algorithm'",
        unterminated_string: "@Behaviour B;\n@Author \"me;" => "lexical error",
        stray_token: "@Behaviour B; 12;" => "expected a keyword",
        unknown_method: "@Behaviour B; @StateVariable real p; p.setFoo(\"x\");" => "unknown method 'setFoo'",
        unknown_in_conversion: "@Behaviour B;\n@StateVariable real p;\n@Integrator{ fp = dp - real(Z); }" => "unknown identifier 'Z'",
        unknown_in_nested_call: "@Behaviour B; @StateVariable real p; @Integrator{ fp = dp - exp(max(p, Z)); }" => "unknown identifier 'Z'",
        duplicate_hypothesis_in_list: "@Behaviour B; @Integrator<PlaneStrain>{} @Integrator<Tridimensional,PlaneStrain>{}" => "code block @Integrator is already defined for hypothesis PlaneStrain",
        plane_stress_isotropic: "@DSL IsotropicMisesCreep; @Behaviour B; @ModellingHypothesis PlaneStress;" => "is not supported by the IsotropicMisesCreep DSL",
    }

    #[test]
    fn errors_are_all_reported() {
        let text = "@Behaviour B;\n@StateVariable real p;\n@StateVariable real p;\n@Theta 3;\n@Integrator{ fp = Z; }\n";
        let errors = parse_str(text).unwrap_err();
        assert_eq!(errors.len(), 3);
        let lines: Vec<_> = errors.iter().map(|e| e.line).collect();
        assert_eq!(lines, vec![3, 4, 5]);
    }

    #[test]
    fn unknown_identifier_in_conversion_is_located() {
        let errors = parse_str("@Behaviour B;\n@StateVariable real p;\n@Integrator{\n  fp = dp - real(Z);\n}").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.iter().next().map(|e| e.line), Some(4));
    }

    #[test]
    fn lexical_error_stops_the_scan() {
        let errors = parse_str("@Behaviour B;\n@Integrator{ fp = Z; }\n/* never closed").unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors.iter().next().map(|e| &e.kind), Some(ErrorKind::Lexical(_))));
        assert_eq!(errors.iter().next().map(|e| e.line), Some(3));
    }

    #[test]
    fn declarations() {
        let text = r#"
@DSL Implicit;
@Behaviour Norton;
@Material Inconel;
@Author "J. Doe";
@Algorithm NewtonRaphson_NumericalJacobian;
@Epsilon 1.e-12;
@ModellingHypotheses {PlaneStrain, Tridimensional};

//! the elastic strain
@StateVariable StrainStensor eel;
eel.setGlossaryName("ElasticStrain");
@StateVariable strain p, q[2];
@Parameter A = 8.e-67, E[2] = {1, 2};
@Parameter real B = 8.2;
@StaticVariable real C = 3;
@IntegerConstant Nmax = 4;
@ExternalStateVariable real Tx;
p.setEntryName("CumulatedStrain");
@PhysicalBounds T in [0:*[;
@Bounds q(1) in ]*:1];

@Integrator<PlaneStrain>{
  feel = deel - deto;
  fp = dp - A*dt;
  fq = dq;
}
@Integrator{
  feel = deel - deto;
  fp = dp - B*dt;
  fq = dq + C*Nmax*dTx;
}
"#;
        let bd = parse_str(text).unwrap();
        assert_eq!(bd.class_name(), "Inconel_Norton");
        assert_eq!(bd.author.as_deref(), Some("J. Doe"));
        assert_eq!(bd.algorithm.kind, AlgorithmKind::ThetaMethodImplicit);
        assert_eq!(bd.algorithm.epsilon, 1e-12);
        assert_eq!(bd.hypotheses().len(), 2);
        let eel = bd.variable("eel").unwrap();
        assert_eq!(eel.description.as_deref(), Some("the elastic strain"));
        assert_eq!(eel.external_name(), "ElasticStrain");
        assert_eq!(bd.variable("p").unwrap().external_name(), "CumulatedStrain");
        assert_eq!(bd.variable("q").unwrap().array_size, 2);
        assert_eq!(bd.variables(VariableCategory::StateVariable).count(), 3);
        assert_eq!(bd.variable("E").unwrap().values, vec![1.0, 2.0]);
        assert_eq!(bd.variable("Nmax").unwrap().type_name, "int");
        assert_eq!(bd.bounds().len(), 2);
        assert_eq!(bd.bounds()[1].component, Some(1));
        let specific = bd
            .code_block(CodeBlockRole::Integrator, ModellingHypothesis::PlaneStrain)
            .unwrap();
        assert!(specific.references("A"));
        let default = bd
            .code_block(CodeBlockRole::Integrator, ModellingHypothesis::Tridimensional)
            .unwrap();
        assert!(default.references("B"));
    }

    #[test]
    fn unknown_identifier_in_flow_rule() {
        let text = "@Behaviour B;\n@StateVariable Stensor eel;\n@Bounds eel in [0:1];\n@FlowRule {\n f = seq*A;\n df_dseq = A;\n}\n";
        let errors = parse_str(text).unwrap_err();
        assert_eq!(errors.len(), 1);
        let error = errors.iter().next().unwrap();
        assert_eq!(error.line, 5);
        assert_eq!(
            error.kind,
            ErrorKind::UnknownIdentifier {
                name: "A".to_string(),
                block: "@FlowRule".to_string(),
                block_line: 4,
            }
        );
    }

    #[test]
    fn multiple_flows() {
        let text = r#"
@DSL MultipleIsotropicMisesFlows;
@Behaviour Flows;
@MaterialProperty stress s0;
@FlowRule Creep { f = seq; df_dseq = 1; }
@FlowRule Plasticity { f = seq - s0; df_dseq = 1; df_dp = 0; }
"#;
        let bd = parse_str(text).unwrap();
        assert_eq!(bd.number_of_flows(), 2);
        assert!(bd.has_code_block(CodeBlockRole::Flow(1)));
    }

    #[test]
    fn includes_and_material_laws() {
        let text = "@Behaviour B;\n@Includes{\n#include <cmath>\n}\n@MaterialLaw {\"UO2_YoungModulus.mfront\", \"laws/UO2_Nu.mfront\"};\n@LocalVariable real E;\n@InitLocalVariables{ E = UO2_YoungModulus(T); }\n@Integrator{}\n";
        let bd = parse_str(text).unwrap();
        assert_eq!(bd.includes, vec!["#include <cmath>".to_string()]);
        assert!(bd.is_material_law("UO2_Nu"));
    }
}
