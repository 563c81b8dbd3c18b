use crate::behaviour::{BehaviourDescription, ModellingHypothesis, TypeFlag, Variable, VariableCategory};

/// Where one variable lives in the arrays exchanged with the calling solver.
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    pub name: String,
    pub external_name: String,
    pub type_name: String,
    pub flag: TypeFlag,
    pub array_size: usize,
    pub offset: usize,
    /// number of reals, for the hypothesis of the layout
    pub size: usize,
}

impl Slot {
    fn new(variable: &Variable, hypothesis: ModellingHypothesis, offset: usize) -> Self {
        Self {
            name: variable.name.clone(),
            external_name: variable.external_name().to_string(),
            type_name: variable.type_name.clone(),
            flag: variable.flag(),
            array_size: variable.array_size,
            offset,
            size: variable.size(hypothesis),
        }
    }

    /// number of reals of one element of an array variable
    pub fn type_size(&self) -> usize {
        self.size / self.array_size
    }

    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

// there are four packed arrays, each a contiguous run of slots in declaration order:
// 1. the material properties, as given by the solver (after the interface offset)
// 2. the internal state variables, state variables first then auxiliary ones
// 3. the external state variables, the temperature always first
// 4. the unknowns of the implicit system, one slot per state variable
#[derive(Debug, Clone, PartialEq)]
pub struct VariableLayout {
    hypothesis: ModellingHypothesis,
    material_properties: Vec<Slot>,
    internal_state_variables: Vec<Slot>,
    external_state_variables: Vec<Slot>,
    unknowns: Vec<Slot>,
}

fn pack<'a>(variables: impl Iterator<Item = &'a Variable>, hypothesis: ModellingHypothesis) -> Vec<Slot> {
    let mut offset = 0;
    variables
        .map(|v| {
            let slot = Slot::new(v, hypothesis, offset);
            offset += slot.size;
            slot
        })
        .collect()
}

fn total(slots: &[Slot]) -> usize {
    slots.last().map_or(0, |s| s.end())
}

impl VariableLayout {
    pub fn new(bd: &BehaviourDescription, hypothesis: ModellingHypothesis) -> Self {
        let material_properties = pack(bd.variables(VariableCategory::MaterialProperty), hypothesis);
        let internal_state_variables = pack(
            bd.variables(VariableCategory::StateVariable)
                .chain(bd.variables(VariableCategory::AuxiliaryStateVariable)),
            hypothesis,
        );
        let temperature = Variable::new("T", "temperature", VariableCategory::ExternalStateVariable, 0)
            .with_glossary_name("Temperature");
        let external_state_variables = pack(
            std::iter::once(&temperature).chain(bd.variables(VariableCategory::ExternalStateVariable)),
            hypothesis,
        );
        let unknowns = pack(bd.variables(VariableCategory::StateVariable), hypothesis);
        Self {
            hypothesis,
            material_properties,
            internal_state_variables,
            external_state_variables,
            unknowns,
        }
    }

    pub fn hypothesis(&self) -> ModellingHypothesis {
        self.hypothesis
    }

    pub fn stensor_size(&self) -> usize {
        self.hypothesis.stensor_size()
    }

    pub fn material_properties(&self) -> &[Slot] {
        &self.material_properties
    }

    pub fn internal_state_variables(&self) -> &[Slot] {
        &self.internal_state_variables
    }

    pub fn external_state_variables(&self) -> &[Slot] {
        &self.external_state_variables
    }

    pub fn unknowns(&self) -> &[Slot] {
        &self.unknowns
    }

    pub fn material_properties_size(&self) -> usize {
        total(&self.material_properties)
    }

    pub fn internal_state_variables_size(&self) -> usize {
        total(&self.internal_state_variables)
    }

    pub fn external_state_variables_size(&self) -> usize {
        total(&self.external_state_variables)
    }

    pub fn unknowns_size(&self) -> usize {
        total(&self.unknowns)
    }

    pub fn unknown(&self, name: &str) -> Option<&Slot> {
        self.unknowns.iter().find(|s| s.name == name)
    }

    /// the slot of a variable exchanged with the solver, searched in every array
    pub fn find(&self, name: &str) -> Option<&Slot> {
        self.material_properties
            .iter()
            .chain(&self.internal_state_variables)
            .chain(&self.external_state_variables)
            .find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_mfront_string;
    use crate::registry::Registry;

    const TEXT: &str = r#"
@DSL Implicit;
@Behaviour Layout;
@MaterialProperty stress young;
@MaterialProperty real nu;
@MaterialProperty real a[3];
@StateVariable StrainStensor eel;
@StateVariable strain p;
@AuxiliaryStateVariable real d;
@AuxiliaryStateVariable Stensor ep[2];
@ExternalStateVariable real phi;
@Integrator {
  feel = deel - deto;
}
"#;

    macro_rules! layout_tests {
        ($($name:ident: $hypothesis:expr, $mps:expr, $isvs:expr, $esvs:expr, $unknowns:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let bd = parse_mfront_string(TEXT, &Registry::new()).unwrap();
                let layout = VariableLayout::new(&bd, $hypothesis);
                assert_eq!(layout.material_properties_size(), $mps);
                assert_eq!(layout.internal_state_variables_size(), $isvs);
                assert_eq!(layout.external_state_variables_size(), $esvs);
                assert_eq!(layout.unknowns_size(), $unknowns);
            }
        )*
        }
    }

    layout_tests! {
        tridimensional: ModellingHypothesis::Tridimensional, 5, 6 + 1 + 1 + 12, 2, 7,
        plane_strain: ModellingHypothesis::PlaneStrain, 5, 4 + 1 + 1 + 8, 2, 5,
        axisymmetrical_1d: ModellingHypothesis::AxisymmetricalGeneralisedPlaneStrain, 5, 3 + 1 + 1 + 6, 2, 4,
    }

    #[test]
    fn offsets() {
        let bd = parse_mfront_string(TEXT, &Registry::new()).unwrap();
        let layout = VariableLayout::new(&bd, ModellingHypothesis::PlaneStrain);
        assert_eq!(layout.find("p").map(|s| s.offset), Some(4));
        assert_eq!(layout.find("ep").map(|s| (s.offset, s.type_size())), Some((6, 4)));
        assert_eq!(layout.external_state_variables()[0].external_name, "Temperature");
        assert_eq!(layout.find("phi").map(|s| s.offset), Some(1));
        assert_eq!(layout.unknown("p").map(|s| s.offset), Some(4));
        assert!(layout.unknown("d").is_none());
    }
}
