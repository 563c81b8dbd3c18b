//! Generation of the C++ sources of a behaviour, one header and one source for each
//! pair of modelling hypothesis and target interface.

pub mod header;
pub mod implicit;
pub mod interface;
pub mod isotropic;
pub mod layout;
pub mod runge_kutta;
pub mod source;
pub mod translation;

use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::behaviour::{
    AlgorithmKind, BehaviourDescription, CodeBlock, CodeBlockRole, ModellingHypothesis, SymmetryType,
    VariableCategory,
};
use crate::error::{CompileError, ErrorKind};
use crate::integration::OutOfBoundsPolicy;
use crate::registry::Registry;

pub use interface::{
    standard_interfaces, Argument, ArgumentOrder, ArgumentRole, InterfaceBackend, ShearScaling,
    StatusConvention, TangentRequest,
};
pub use layout::{Slot, VariableLayout};
pub use translation::Translator;

/// the header of the only Newton-Raphson loop of a generated source
pub const NEWTON_LOOP_HEADER: &str = "while((!converged)&&(this->iter<this->iterMax)){";
/// the header of the loop over the sub-steps of a time step
pub const SUB_STEPPING_LOOP_HEADER: &str =
    "while(real(1)-start>real(0.5)*(this->minimalTimeStepFraction)){";

/// The generated files for one hypothesis and one interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub header_name: String,
    pub header: String,
    pub source_name: String,
    pub source: String,
}

/// `{Class}-{interface}-{HYPOTHESIS}`, the stem of the generated file names
pub fn file_stem(bd: &BehaviourDescription, interface: &str, hypothesis: ModellingHypothesis) -> String {
    format!("{}-{}-{}", bd.class_name(), interface, hypothesis.upper_name())
}

/// a literal for a real value, exactly representing `value`
pub(crate) fn real(value: f64) -> String {
    format!("{:?}", value)
}

/// A data member of the generated class, a compile time constant when it has a value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Member {
    pub cxx_type: String,
    pub name: String,
    pub value: Option<String>,
}

impl Member {
    pub fn new(cxx_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            cxx_type: cxx_type.into(),
            name: name.into(),
            value: None,
        }
    }

    pub fn constant(cxx_type: &str, name: &str, value: impl fmt::Display) -> Self {
        Self {
            value: Some(value.to_string()),
            ..Self::new(cxx_type, name)
        }
    }
}

/// data members every generated class has besides the variables of the behaviour
pub(crate) fn common_members() -> Vec<Member> {
    vec![
        Member::new("real", "dt"),
        Member::new("StrainStensor", "eto"),
        Member::new("StrainStensor", "deto"),
        Member::new("StressStensor", "sig"),
        Member::new("Stensor4", "Dt"),
        Member::new("temperature", "T"),
        Member::new("temperature", "dT"),
        Member::new("real", "theta"),
        Member::new("real", "epsilon"),
        Member::new("int", "iterMax"),
        Member::new("int", "maxSubSteps"),
        Member::new("real", "minimalTimeStepFraction"),
        Member::new("real", "numerical_jacobian_epsilon"),
        Member::new("StiffnessMatrixType", "smt"),
    ]
}

/// Everything known about one generation task.
pub(crate) struct Context<'a> {
    pub bd: &'a BehaviourDescription,
    pub hypothesis: ModellingHypothesis,
    pub interface: &'a dyn InterfaceBackend,
    pub layout: VariableLayout,
    pub order: ArgumentOrder,
    pub policy: OutOfBoundsPolicy,
    pub stem: String,
    members: BTreeSet<String>,
}

impl<'a> Context<'a> {
    fn new(
        bd: &'a BehaviourDescription,
        hypothesis: ModellingHypothesis,
        interface: &'a dyn InterfaceBackend,
        policy: OutOfBoundsPolicy,
        scheme: &dyn Scheme,
    ) -> Self {
        let layout = VariableLayout::new(bd, hypothesis);
        let order = interface.marshal(hypothesis, &layout, bd.symmetry == SymmetryType::Orthotropic);
        let mut ctx = Self {
            bd,
            hypothesis,
            interface,
            layout,
            order,
            policy,
            stem: file_stem(bd, interface.name(), hypothesis),
            members: BTreeSet::new(),
        };
        let mut members: BTreeSet<String> = common_members().into_iter().map(|m| m.name).collect();
        for v in bd.all_variables() {
            members.insert(v.name.clone());
            if matches!(
                v.category,
                VariableCategory::StateVariable | VariableCategory::ExternalStateVariable
            ) {
                members.insert(format!("d{}", v.name));
            }
        }
        members.extend(scheme.members(&ctx).into_iter().map(|m| m.name));
        ctx.members = members;
        ctx
    }

    pub fn class_name(&self) -> String {
        self.bd.class_name()
    }

    /// the namespace isolating the classes generated for each interface and hypothesis
    pub fn namespace(&self) -> String {
        format!(
            "mfront::{}::{}",
            self.interface.name(),
            self.hypothesis.upper_name().to_lowercase()
        )
    }

    pub fn code_block(&self, role: CodeBlockRole) -> Option<&'a CodeBlock> {
        self.bd.code_block(role, self.hypothesis)
    }

    /// translator prefixing the members of the generated class
    pub fn translator(&self) -> Translator {
        Translator::new(&self.members)
    }

    /// state variables with their increments
    pub fn state_variables(&self) -> Vec<(String, String)> {
        self.bd
            .variables(VariableCategory::StateVariable)
            .map(|v| (v.name.clone(), format!("d{}", v.name)))
            .collect()
    }

    /// external state variables with their increments, the temperature first
    pub fn external_state_variables(&self) -> Vec<(String, String)> {
        std::iter::once(("T".to_string(), "dT".to_string()))
            .chain(
                self.bd
                    .variables(VariableCategory::ExternalStateVariable)
                    .map(|v| (v.name.clone(), format!("d{}", v.name))),
            )
            .collect()
    }
}

pub(crate) fn pairs(names: &[(String, String)]) -> impl Iterator<Item = (&str, &str)> {
    names.iter().map(|(a, b)| (a.as_str(), b.as_str()))
}

/// The parts of the generated class that depend on the integration scheme.
pub(crate) trait Scheme {
    /// data members besides the variables of the behaviour
    fn members(&self, ctx: &Context<'_>) -> Vec<Member>;

    /// declarations of the member functions the scheme defines besides `solveSubStep`,
    /// `computeFinalStress` and `computeConsistentTangentOperator`
    fn declarations(&self, ctx: &Context<'_>) -> Vec<String>;

    /// translator of the blocks run outside of the integration, such as the
    /// initialisation of the local variables
    fn block_translator(&self, ctx: &Context<'_>) -> Translator {
        ctx.translator()
    }

    /// statements run by the constructor before the initialisation of the local variables
    fn write_initialisation(&self, _ctx: &Context<'_>, _out: &mut String) -> fmt::Result {
        Ok(())
    }

    /// definitions of `solveSubStep`, `computeFinalStress`,
    /// `computeConsistentTangentOperator` and of the declared member functions
    fn write_definitions(&self, ctx: &Context<'_>, out: &mut String) -> fmt::Result;
}

fn scheme_for(kind: AlgorithmKind) -> Box<dyn Scheme> {
    match kind {
        AlgorithmKind::ThetaMethodImplicit => Box::new(implicit::ImplicitScheme),
        AlgorithmKind::ExplicitRungeKutta(method) => Box::new(runge_kutta::RungeKuttaScheme { method }),
        AlgorithmKind::IsotropicMisesCreep
        | AlgorithmKind::IsotropicMisesPlasticFlow
        | AlgorithmKind::IsotropicStrainHardeningMisesCreep
        | AlgorithmKind::MultipleIsotropicMisesFlows => Box::new(isotropic::IsotropicScheme { kind }),
    }
}

fn check(bd: &BehaviourDescription, hypothesis: ModellingHypothesis, interface: &dyn InterfaceBackend) -> Result<(), CompileError> {
    if !bd.hypotheses().contains(&hypothesis) {
        return Err(CompileError::generation(format!(
            "modelling hypothesis '{}' is not supported by behaviour '{}'",
            hypothesis,
            bd.class_name()
        )));
    }
    if !interface.supports(hypothesis) {
        return Err(CompileError::generation(format!(
            "modelling hypothesis '{}' is not supported by the {} interface",
            hypothesis,
            interface.name()
        )));
    }
    for role in bd.family.mandatory_roles {
        if bd.code_block(*role, hypothesis).is_none() {
            return Err(CompileError::new(
                ErrorKind::MissingCodeBlock {
                    role: role.to_string(),
                    hypothesis: hypothesis.to_string(),
                },
                0,
            ));
        }
    }
    let integrated = !bd.algorithm.kind.is_isotropic();
    if integrated && bd.variables(VariableCategory::StateVariable).next().is_none() {
        return Err(CompileError::generation(format!(
            "behaviour '{}' has no state variable to integrate",
            bd.class_name()
        )));
    }
    Ok(())
}

/// Generates the sources of a behaviour for one hypothesis and one interface. The
/// output only depends on the arguments: generating twice gives the same files.
pub fn generate(
    bd: &BehaviourDescription,
    hypothesis: ModellingHypothesis,
    interface: &str,
    registry: &Registry,
) -> Result<SourceFile, CompileError> {
    let Some(backend) = registry.interface(interface) else {
        return Err(CompileError::generation(format!(
            "unknown interface '{}', available interfaces are {}",
            interface,
            registry.interface_names().join(", ")
        )));
    };
    check(bd, hypothesis, backend)?;
    let scheme = scheme_for(bd.algorithm.kind);
    let ctx = Context::new(bd, hypothesis, backend, registry.policy(), scheme.as_ref());
    debug!(behaviour = %bd.class_name(), %hypothesis, interface, "generating");
    let failed = |_| CompileError::generation(format!("formatting failed for {}", ctx.stem));
    let header = header::write_header(&ctx, scheme.as_ref()).map_err(failed)?;
    let source = source::write_source(&ctx, scheme.as_ref()).map_err(failed)?;
    Ok(SourceFile {
        header_name: format!("{}.hxx", ctx.stem),
        header,
        source_name: format!("{}.cxx", ctx.stem),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_mfront_string;

    const NORTON: &str = r#"
@DSL IsotropicMisesCreep;
@Behaviour Norton;
@Material Steel;
@MaterialProperty real A;
@MaterialProperty real E;
@FlowRule {
  f = A*pow(seq,E);
  df_dseq = E*f/seq;
}
"#;

    const ELASTICITY: &str = r#"
@DSL Implicit;
@Behaviour Elasticity;
@MaterialProperty stress young;
@MaterialProperty real nu;
@StateVariable StrainStensor eel;
@LocalVariable stress lambda;
@LocalVariable stress mu;
@InitLocalVariables {
  lambda = young*nu/((1+nu)*(1-2*nu));
  mu = young/(2*(1+nu));
}
@ComputeStress {
  sig = lambda*trace(eel)*Stensor::Id()+2*mu*eel;
}
@Integrator {
  feel = deel - deto;
}
"#;

    fn generate_str(text: &str, hypothesis: ModellingHypothesis, interface: &str) -> Result<SourceFile, CompileError> {
        let registry = Registry::new();
        let bd = parse_mfront_string(text, &registry).unwrap();
        generate(&bd, hypothesis, interface, &registry)
    }

    macro_rules! generation_error_tests {
        ($($name:ident: $text:expr, $hypothesis:expr, $interface:expr => $message:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let err = generate_str($text, $hypothesis, $interface).unwrap_err();
                assert!(err.to_string().contains($message), "{}", err);
            }
        )*
        }
    }

    generation_error_tests! {
        unknown_interface: NORTON, ModellingHypothesis::Tridimensional, "ansys" => "unknown interface 'ansys'",
        hypothesis_not_in_behaviour: NORTON, ModellingHypothesis::PlaneStress, "generic" => "not supported by behaviour",
        hypothesis_not_in_interface: NORTON, ModellingHypothesis::Tridimensional, "cyrano" => "not supported by the cyrano interface",
        missing_integrator: "@Behaviour Empty; @StateVariable real p;", ModellingHypothesis::Tridimensional, "null"
            => "mandatory code block @Integrator is missing",
    }

    #[test]
    fn file_names() {
        let file = generate_str(NORTON, ModellingHypothesis::PlaneStrain, "umat").unwrap();
        assert_eq!(file.header_name, "Steel_Norton-umat-PLANESTRAIN.hxx");
        assert_eq!(file.source_name, "Steel_Norton-umat-PLANESTRAIN.cxx");
        assert!(file.source.contains("#include\"Steel_Norton-umat-PLANESTRAIN.hxx\""));
        assert!(file.header.contains("namespace mfront::umat::planestrain{"));
    }

    #[test]
    fn one_newton_loop() {
        for text in [NORTON, ELASTICITY] {
            let file = generate_str(text, ModellingHypothesis::Tridimensional, "generic").unwrap();
            assert_eq!(file.source.matches(NEWTON_LOOP_HEADER).count(), 1);
            assert_eq!(file.source.matches(SUB_STEPPING_LOOP_HEADER).count(), 1);
        }
    }

    #[test]
    fn deterministic() {
        let registry = Registry::new();
        let bd = parse_mfront_string(ELASTICITY, &registry).unwrap();
        for interface in registry.interface_names() {
            let backend = registry.interface(interface).unwrap();
            for hypothesis in bd.hypotheses() {
                if !backend.supports(hypothesis) {
                    continue;
                }
                let first = generate(&bd, hypothesis, interface, &registry).unwrap();
                let second = generate(&bd, hypothesis, interface, &registry).unwrap();
                assert_eq!(first, second);
            }
        }
    }

    #[test]
    fn sizes_follow_hypothesis() {
        let file = generate_str(ELASTICITY, ModellingHypothesis::PlaneStrain, "castem").unwrap();
        assert!(file.header.contains("static constexpr unsigned short StensorSize = 4;"));
        assert!(file.header.contains("static constexpr unsigned short NUnknowns = 4;"));
        // four material properties passed by Cast3M before young and nu
        assert!(file.source.contains("if(*NPROPS!=6){"));
        assert!(file.source.contains("this->young = mps[0];"));
    }
}
