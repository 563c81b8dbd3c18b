use std::fmt;

use super::hypothesis::ModellingHypothesis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariableCategory {
    MaterialProperty,
    StateVariable,
    AuxiliaryStateVariable,
    ExternalStateVariable,
    LocalVariable,
    Parameter,
    StaticVariable,
}

impl VariableCategory {
    pub const ALL: [VariableCategory; 7] = [
        VariableCategory::MaterialProperty,
        VariableCategory::StateVariable,
        VariableCategory::AuxiliaryStateVariable,
        VariableCategory::ExternalStateVariable,
        VariableCategory::LocalVariable,
        VariableCategory::Parameter,
        VariableCategory::StaticVariable,
    ];

    /// the canonical keyword declaring variables of this category
    pub fn keyword(&self) -> &'static str {
        match self {
            VariableCategory::MaterialProperty => "@MaterialProperty",
            VariableCategory::StateVariable => "@StateVariable",
            VariableCategory::AuxiliaryStateVariable => "@AuxiliaryStateVariable",
            VariableCategory::ExternalStateVariable => "@ExternalStateVariable",
            VariableCategory::LocalVariable => "@LocalVariable",
            VariableCategory::Parameter => "@Parameter",
            VariableCategory::StaticVariable => "@StaticVariable",
        }
    }

    /// variables of these categories are seen by the calling solver
    pub fn is_persistent(&self) -> bool {
        matches!(
            self,
            VariableCategory::StateVariable | VariableCategory::AuxiliaryStateVariable
        )
    }
}

impl fmt::Display for VariableCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", &self.keyword()[1..])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeFlag {
    Scalar,
    Integer,
    Stensor,
    Tensor,
}

pub const SCALAR_TYPES: &[&str] = &[
    "real",
    "strain",
    "stress",
    "temperature",
    "time",
    "frequency",
    "length",
    "strainrate",
    "stressrate",
    "energy_density",
    "massdensity",
    "thermalexpansion",
    "DstrainDt",
    "DF_DSEQ_TYPE",
];

pub const INTEGER_TYPES: &[&str] = &["int", "ushort"];

pub const STENSOR_TYPES: &[&str] = &[
    "Stensor",
    "StrainStensor",
    "StressStensor",
    "StrainRateStensor",
    "StressRateStensor",
];

pub const TENSOR_TYPES: &[&str] = &["Tensor", "DeformationGradientTensor"];

pub fn type_flag(type_name: &str) -> Option<TypeFlag> {
    if SCALAR_TYPES.contains(&type_name) {
        Some(TypeFlag::Scalar)
    } else if INTEGER_TYPES.contains(&type_name) {
        Some(TypeFlag::Integer)
    } else if STENSOR_TYPES.contains(&type_name) {
        Some(TypeFlag::Stensor)
    } else if TENSOR_TYPES.contains(&type_name) {
        Some(TypeFlag::Tensor)
    } else {
        None
    }
}

pub fn is_supported_type(type_name: &str) -> bool {
    type_flag(type_name).is_some()
}

/// the type of the increment of a variable, used for the unknowns of implicit schemes
pub fn increment_type(type_name: &str) -> &str {
    match type_flag(type_name) {
        Some(TypeFlag::Stensor) => "Stensor",
        Some(TypeFlag::Tensor) => "Tensor",
        _ => type_name,
    }
}

pub const GLOSSARY: &[&str] = &[
    "YoungModulus",
    "YoungModulus1",
    "YoungModulus2",
    "YoungModulus3",
    "PoissonRatio",
    "PoissonRatio12",
    "PoissonRatio23",
    "PoissonRatio13",
    "ShearModulus12",
    "ShearModulus23",
    "ShearModulus13",
    "ShearModulus",
    "BulkModulus",
    "ThermalExpansion",
    "MassDensity",
    "Temperature",
    "ElasticStrain",
    "PlasticStrain",
    "ViscoplasticStrain",
    "EquivalentStrain",
    "EquivalentPlasticStrain",
    "EquivalentViscoplasticStrain",
    "EquivalentStress",
    "HardeningSlope",
    "YieldStress",
    "NortonCoefficient",
    "NortonExponent",
    "Damage",
    "Porosity",
    "FastNeutronFluence",
    "NeutronFlux",
    "Burnup",
    "IrradiationInducedSwelling",
    "SolidSwelling",
    "GaseousSwelling",
];

pub fn is_glossary_name(name: &str) -> bool {
    GLOSSARY.contains(&name)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub type_name: String,
    pub category: VariableCategory,
    pub array_size: usize,
    pub line: usize,
    pub glossary_name: Option<String>,
    pub entry_name: Option<String>,
    pub description: Option<String>,
    /// default values of parameters, or the value of a static variable
    pub values: Vec<f64>,
}

impl Variable {
    pub fn new(name: &str, type_name: &str, category: VariableCategory, line: usize) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            category,
            array_size: 1,
            line,
            glossary_name: None,
            entry_name: None,
            description: None,
            values: Vec::new(),
        }
    }

    pub fn with_array_size(mut self, array_size: usize) -> Self {
        self.array_size = array_size;
        self
    }

    pub fn with_glossary_name(mut self, name: &str) -> Self {
        self.glossary_name = Some(name.to_string());
        self
    }

    pub fn with_values(mut self, values: Vec<f64>) -> Self {
        self.values = values;
        self
    }

    pub fn flag(&self) -> TypeFlag {
        type_flag(&self.type_name).unwrap_or(TypeFlag::Scalar)
    }

    /// the name seen by the calling solver
    pub fn external_name(&self) -> &str {
        self.glossary_name
            .as_deref()
            .or(self.entry_name.as_deref())
            .unwrap_or(&self.name)
    }

    pub fn type_size(&self, hypothesis: ModellingHypothesis) -> usize {
        match self.flag() {
            TypeFlag::Scalar | TypeFlag::Integer => 1,
            TypeFlag::Stensor => hypothesis.stensor_size(),
            TypeFlag::Tensor => hypothesis.tensor_size(),
        }
    }

    /// number of reals needed to store this variable
    pub fn size(&self, hypothesis: ModellingHypothesis) -> usize {
        self.array_size * self.type_size(hypothesis)
    }

    pub fn is_array(&self) -> bool {
        self.array_size > 1
    }

    /// the C++ type, arrays becoming fixed size vectors
    pub fn cxx_type(&self) -> String {
        if self.is_array() {
            format!("tfel::math::fsarray<{}, {}>", self.array_size, self.type_name)
        } else {
            self.type_name.clone()
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.type_name, self.name)?;
        if self.is_array() {
            write!(f, "[{}]", self.array_size)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_follow_hypothesis() {
        let eel = Variable::new("eel", "StrainStensor", VariableCategory::StateVariable, 1);
        assert_eq!(eel.size(ModellingHypothesis::Tridimensional), 6);
        assert_eq!(eel.size(ModellingHypothesis::PlaneStrain), 4);
        let g = Variable::new("g", "real", VariableCategory::StateVariable, 1).with_array_size(12);
        assert_eq!(g.size(ModellingHypothesis::Axisymmetrical), 12);
        let f = Variable::new("F", "Tensor", VariableCategory::LocalVariable, 1).with_array_size(2);
        assert_eq!(f.size(ModellingHypothesis::Tridimensional), 18);
    }

    #[test]
    fn external_names() {
        let v = Variable::new("young", "stress", VariableCategory::MaterialProperty, 3)
            .with_glossary_name("YoungModulus");
        assert_eq!(v.external_name(), "YoungModulus");
        let v = Variable::new("A", "real", VariableCategory::Parameter, 3);
        assert_eq!(v.external_name(), "A");
        assert_eq!(v.to_string(), "real A");
    }

    #[test]
    fn types() {
        assert_eq!(type_flag("stress"), Some(TypeFlag::Scalar));
        assert_eq!(type_flag("StressStensor"), Some(TypeFlag::Stensor));
        assert_eq!(type_flag("DeformationGradientTensor"), Some(TypeFlag::Tensor));
        assert_eq!(type_flag("double"), None);
        assert_eq!(increment_type("StrainStensor"), "Stensor");
        assert_eq!(increment_type("strain"), "strain");
    }
}
