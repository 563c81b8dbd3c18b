use super::algorithm::{AlgorithmKind, RungeKuttaMethod};
use super::code_block::CodeBlockRole;
use super::hypothesis::ModellingHypothesis;
use super::hypothesis::ModellingHypothesis::*;
use super::variable::VariableCategory;

/// a variable every behaviour of a family gets without declaring it
#[derive(Debug, Clone, Copy)]
pub struct DefaultVariable {
    pub category: VariableCategory,
    pub type_name: &'static str,
    pub name: &'static str,
    pub glossary_name: Option<&'static str>,
}

const fn default_variable(
    category: VariableCategory,
    type_name: &'static str,
    name: &'static str,
    glossary_name: Option<&'static str>,
) -> DefaultVariable {
    DefaultVariable {
        category,
        type_name,
        name,
        glossary_name,
    }
}

/// Describes one behaviour family: which algorithm it integrates with, what it declares
/// by default, which keywords it refuses and which code blocks it cannot do without.
#[derive(Debug)]
pub struct FamilyProfile {
    pub name: &'static str,
    pub kind: AlgorithmKind,
    pub default_variables: &'static [DefaultVariable],
    pub disabled_keywords: &'static [&'static str],
    pub mandatory_roles: &'static [CodeBlockRole],
    pub supported_hypotheses: &'static [ModellingHypothesis],
    /// names the generated code provides to every code block of the family
    pub builtins: &'static [&'static str],
}

const DEFAULT_HYPOTHESES: &[ModellingHypothesis] = &[
    AxisymmetricalGeneralisedPlaneStrain,
    Axisymmetrical,
    PlaneStrain,
    GeneralisedPlaneStrain,
    Tridimensional,
];

const ISOTROPIC_FLOW_BUILTINS: &[&str] = &["f", "df_dseq", "df_dp", "seq", "seq_e", "se", "n"];

const fn isotropic_defaults(equivalent_strain: &'static str) -> [DefaultVariable; 6] {
    [
        default_variable(VariableCategory::MaterialProperty, "stress", "young", Some("YoungModulus")),
        default_variable(VariableCategory::MaterialProperty, "real", "nu", Some("PoissonRatio")),
        default_variable(VariableCategory::StateVariable, "StrainStensor", "eel", Some("ElasticStrain")),
        default_variable(VariableCategory::StateVariable, "strain", "p", Some(equivalent_strain)),
        default_variable(VariableCategory::LocalVariable, "stress", "lambda", None),
        default_variable(VariableCategory::LocalVariable, "stress", "mu", None),
    ]
}

const VISCOPLASTIC_DEFAULTS: [DefaultVariable; 6] = isotropic_defaults("EquivalentViscoplasticStrain");
const PLASTIC_DEFAULTS: [DefaultVariable; 6] = isotropic_defaults("EquivalentPlasticStrain");

const ISOTROPIC_DISABLED: &[&str] = &[
    "@StateVariable",
    "@Integrator",
    "@OrthotropicBehaviour",
    "@Predictor",
    "@ComputeStress",
    "@ComputeFinalStress",
    "@InitializeJacobian",
    "@TangentOperator",
    "@Derivative",
];

pub const IMPLICIT: FamilyProfile = FamilyProfile {
    name: "Implicit",
    kind: AlgorithmKind::ThetaMethodImplicit,
    default_variables: &[],
    disabled_keywords: &["@Derivative"],
    mandatory_roles: &[CodeBlockRole::Integrator],
    supported_hypotheses: &ModellingHypothesis::ALL,
    builtins: &["jacobian", "fzeros", "zeros", "iter", "Dt"],
};

pub const IMPLICIT_II: FamilyProfile = FamilyProfile {
    name: "ImplicitII",
    ..IMPLICIT
};

pub const RUNGE_KUTTA: FamilyProfile = FamilyProfile {
    name: "RungeKutta",
    kind: AlgorithmKind::ExplicitRungeKutta(RungeKuttaMethod::Rk42),
    default_variables: &[],
    disabled_keywords: &[
        "@Integrator",
        "@FlowRule",
        "@Predictor",
        "@InitializeJacobian",
        "@TangentOperator",
    ],
    mandatory_roles: &[CodeBlockRole::ComputeDerivative],
    supported_hypotheses: &ModellingHypothesis::ALL,
    builtins: &["Dt"],
};

pub const ISOTROPIC_MISES_CREEP: FamilyProfile = FamilyProfile {
    name: "IsotropicMisesCreep",
    kind: AlgorithmKind::IsotropicMisesCreep,
    default_variables: &VISCOPLASTIC_DEFAULTS,
    disabled_keywords: ISOTROPIC_DISABLED,
    mandatory_roles: &[CodeBlockRole::FlowRule],
    supported_hypotheses: DEFAULT_HYPOTHESES,
    builtins: ISOTROPIC_FLOW_BUILTINS,
};

pub const ISOTROPIC_MISES_PLASTIC_FLOW: FamilyProfile = FamilyProfile {
    name: "IsotropicMisesPlasticFlow",
    kind: AlgorithmKind::IsotropicMisesPlasticFlow,
    default_variables: &PLASTIC_DEFAULTS,
    ..ISOTROPIC_MISES_CREEP
};

pub const ISOTROPIC_STRAIN_HARDENING_MISES_CREEP: FamilyProfile = FamilyProfile {
    name: "IsotropicStrainHardeningMisesCreep",
    kind: AlgorithmKind::IsotropicStrainHardeningMisesCreep,
    ..ISOTROPIC_MISES_CREEP
};

pub const MULTIPLE_ISOTROPIC_MISES_FLOWS: FamilyProfile = FamilyProfile {
    name: "MultipleIsotropicMisesFlows",
    kind: AlgorithmKind::MultipleIsotropicMisesFlows,
    mandatory_roles: &[CodeBlockRole::Flow(0)],
    ..ISOTROPIC_MISES_CREEP
};

pub static FAMILIES: &[&FamilyProfile] = &[
    &IMPLICIT,
    &IMPLICIT_II,
    &RUNGE_KUTTA,
    &ISOTROPIC_MISES_CREEP,
    &ISOTROPIC_MISES_PLASTIC_FLOW,
    &ISOTROPIC_STRAIN_HARDENING_MISES_CREEP,
    &MULTIPLE_ISOTROPIC_MISES_FLOWS,
];

impl FamilyProfile {
    pub fn for_name(name: &str) -> Option<&'static FamilyProfile> {
        FAMILIES.iter().copied().find(|f| f.name == name)
    }

    pub fn disables(&self, keyword: &str) -> bool {
        self.disabled_keywords.contains(&keyword)
    }

    pub fn supports_hypothesis(&self, hypothesis: ModellingHypothesis) -> bool {
        self.supported_hypotheses.contains(&hypothesis)
    }

    pub fn default_hypotheses(&self) -> impl Iterator<Item = ModellingHypothesis> + '_ {
        DEFAULT_HYPOTHESES
            .iter()
            .copied()
            .filter(|h| self.supports_hypothesis(*h))
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains(&name)
    }
}

impl PartialEq for FamilyProfile {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup() {
        let f = FamilyProfile::for_name("IsotropicMisesPlasticFlow").unwrap();
        assert_eq!(f.kind, AlgorithmKind::IsotropicMisesPlasticFlow);
        assert_eq!(f.default_variables[3].glossary_name, Some("EquivalentPlasticStrain"));
        assert!(f.disables("@StateVariable"));
        assert!(!f.supports_hypothesis(PlaneStress));
        assert!(FamilyProfile::for_name("Unknown").is_none());
        assert_eq!(FamilyProfile::for_name("ImplicitII").unwrap().kind, AlgorithmKind::ThetaMethodImplicit);
    }

    #[test]
    fn default_hypotheses_exclude_plane_stress() {
        let hs: Vec<_> = IMPLICIT.default_hypotheses().collect();
        assert_eq!(hs.len(), 5);
        assert!(!hs.contains(&PlaneStress));
        assert!(IMPLICIT.supports_hypothesis(PlaneStress));
    }
}
