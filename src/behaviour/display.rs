use std::fmt;

use itertools::Itertools;

use super::algorithm::{AlgorithmKind, AlgorithmParameter, JacobianMode, RungeKuttaMethod};
use super::code_block::CodeBlockRole;
use super::description::{BehaviourDescription, SymmetryType};
use super::hypothesis::ModellingHypothesis;
use super::variable::{Variable, VariableCategory};

const PARAMETERS: [AlgorithmParameter; 5] = [
    AlgorithmParameter::Theta,
    AlgorithmParameter::Epsilon,
    AlgorithmParameter::IterMax,
    AlgorithmParameter::MaxSubSteps,
    AlgorithmParameter::NumericalJacobianEpsilon,
];

fn quoted(text: &str) -> String {
    format!("\"{}\"", text.replace('"', "\\\""))
}

fn write_values(f: &mut fmt::Formatter, variable: &Variable) -> fmt::Result {
    match variable.values.as_slice() {
        [value] if !variable.is_array() => write!(f, " = {:?}", value),
        values => write!(f, " = {{{}}}", values.iter().map(|v| format!("{:?}", v)).join(", ")),
    }
}

/// Prints the description back as behaviour DSL text. Default variables of the family
/// are left out, so that parsing the output gives back an equivalent description.
impl fmt::Display for BehaviourDescription {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "@DSL {};", self.family.name)?;
        match self.algorithm.kind {
            AlgorithmKind::ExplicitRungeKutta(method) if method != RungeKuttaMethod::Rk42 => {
                writeln!(f, "@Algorithm {};", method.name())?
            }
            AlgorithmKind::ThetaMethodImplicit if self.algorithm.jacobian == JacobianMode::Numerical => {
                writeln!(f, "@Algorithm NewtonRaphson_NumericalJacobian;")?
            }
            _ => {}
        }
        if let Some(name) = &self.name {
            writeln!(f, "@Behaviour {};", name)?;
        }
        if let Some(material) = &self.material {
            writeln!(f, "@Material {};", material)?;
        }
        if let Some(author) = &self.author {
            writeln!(f, "@Author {};", quoted(author))?;
        }
        if let Some(date) = &self.date {
            writeln!(f, "@Date {};", quoted(date))?;
        }
        if let Some(description) = &self.description {
            writeln!(f, "@Description {{\n/* {} */\n}}", description)?;
        }
        if !self.includes.is_empty() {
            writeln!(f, "@Includes {{")?;
            for include in &self.includes {
                writeln!(f, "{}", include)?;
            }
            writeln!(f, "}}")?;
        }
        for law in &self.material_laws {
            writeln!(f, "@MaterialLaw {};", quoted(&law.file))?;
        }
        if self.has_explicit_hypotheses() {
            let hypotheses = self.hypotheses().iter().map(|h| h.name()).join(", ");
            writeln!(f, "@ModellingHypotheses {{{}}};", hypotheses)?;
        }
        for parameter in PARAMETERS {
            if self.algorithm.is_explicitly_set(parameter) {
                writeln!(f, "{} {:?};", parameter.keyword(), self.algorithm.value(parameter))?;
            }
        }

        for category in VariableCategory::ALL {
            for variable in self.variables(category) {
                if self.is_default_variable(&variable.name) {
                    continue;
                }
                if let Some(description) = &variable.description {
                    writeln!(f, "/* {} */", description)?;
                }
                write!(f, "{} {}", category.keyword(), variable)?;
                if !variable.values.is_empty() {
                    write_values(f, variable)?;
                }
                writeln!(f, ";")?;
            }
        }
        if self.symmetry == SymmetryType::Orthotropic {
            writeln!(f, "@OrthotropicBehaviour;")?;
        }
        for variable in self.all_variables() {
            if self.is_default_variable(&variable.name) {
                continue;
            }
            if let Some(glossary) = &variable.glossary_name {
                writeln!(f, "{}.setGlossaryName({});", variable.name, quoted(glossary))?;
            }
            if let Some(entry) = &variable.entry_name {
                writeln!(f, "{}.setEntryName({});", variable.name, quoted(entry))?;
            }
        }
        for bounds in self.bounds() {
            writeln!(f, "{} {};", bounds.keyword(), bounds)?;
        }

        for block in self.code_blocks() {
            write!(f, "{}", block.role.keyword())?;
            if let (CodeBlockRole::Flow(_), Some(flow)) = (block.role, block.flow) {
                write!(f, " {}", flow.name())?;
            }
            let mut options = Vec::new();
            if block.hypothesis != ModellingHypothesis::UndefinedHypothesis {
                options.push(block.hypothesis.name());
            }
            if block.is_override {
                options.push("Override");
            }
            if !options.is_empty() {
                write!(f, "<{}>", options.join(", "))?;
            }
            writeln!(f, " {{")?;
            if !block.body.is_empty() {
                writeln!(f, "  {}", block.body.iter().map(|t| t.value.as_str()).join(" "))?;
            }
            writeln!(f, "}}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::parser::parse_mfront_string;
    use crate::registry::Registry;

    fn round_trip(text: &str) {
        let registry = Registry::new();
        let bd = parse_mfront_string(text, &registry).unwrap();
        let printed = bd.to_string();
        let reparsed = parse_mfront_string(&printed, &registry)
            .unwrap_or_else(|e| panic!("{}\nin:\n{}", e, printed));
        assert_eq!(reparsed.to_string(), printed);
        assert_eq!(reparsed.all_variables().count(), bd.all_variables().count());
        assert_eq!(reparsed.bounds(), bd.bounds());
        assert_eq!(reparsed.algorithm, bd.algorithm);
        assert_eq!(reparsed.code_blocks().count(), bd.code_blocks().count());
    }

    #[test]
    fn implicit_round_trip() {
        round_trip(
            r#"
@Behaviour Norton;
@Author "J. \"Doe\"";
@Description {
  a Norton creep law
}
@Algorithm NewtonRaphson_NumericalJacobian;
@Theta 1;
@Epsilon 1.e-14;
@ModellingHypotheses {".+"};
// the elastic strain
@StateVariable StrainStensor eel;
eel.setGlossaryName("ElasticStrain");
@StateVariable strain p;
@MaterialProperty stress young;
@Parameter A = 8.e-67, C[2] = {1, -2};
@Bounds p in [0:*[;
@PhysicalBounds T in [0:*[;
@Integrator {
  const real s = sigmaeq(sig);
  feel = deel - deto + dp*s;
  fp = dp - A*pow(s, C[0])*dt;
}
@Integrator<PlaneStrain, Override>{ feel = deel; fp = dp; }
"#,
        );
    }

    #[test]
    fn isotropic_round_trip() {
        round_trip(
            r#"
@DSL IsotropicMisesCreep;
@Behaviour SiCCreep;
@Material SiC;
@Includes {
#include <cmath>
}
@MaximumNumberOfSubSteps 4;
@Parameter A = 1.e-2;
@LocalVariable real AF1;
@InitLocalVariables { AF1 = A*exp(-1/(T+theta*dT)); }
@FlowRule { df_dseq = AF1; f = seq*df_dseq; }
"#,
        );
    }

    #[test]
    fn defaults_are_not_printed() {
        let registry = Registry::new();
        let bd = parse_mfront_string("@DSL IsotropicMisesPlasticFlow;\n@Behaviour P;\n@FlowRule{ f = seq; df_dseq = 1; }", &registry).unwrap();
        let printed = bd.to_string();
        assert!(!printed.contains("young"));
        assert!(printed.starts_with("@DSL IsotropicMisesPlasticFlow;\n@Behaviour P;\n"));
        assert!(printed.contains("@FlowRule {\n  f = seq ; df_dseq = 1 ;\n}"));
    }
}
