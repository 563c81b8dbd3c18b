use crate::behaviour::ModellingHypothesis;
use crate::behaviour::ModellingHypothesis::*;

use super::layout::VariableLayout;

/// What an argument of a generated entry point carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentRole {
    Stress,
    InternalStateVariables,
    NumberOfInternalStateVariables,
    Tangent,
    Strain,
    StrainIncrement,
    TimeIncrement,
    Temperature,
    TemperatureIncrement,
    /// external state variables besides the temperature
    ExternalStateVariables,
    ExternalStateVariablesIncrements,
    /// all external state variables, the temperature first
    AllExternalStateVariables,
    AllExternalStateVariablesIncrements,
    MaterialProperties,
    NumberOfMaterialProperties,
    NumberOfComponents,
    NewTimeStepRatio,
    Status,
    TangentRequest,
    /// part of the solver calling convention, not read
    Unused,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub name: &'static str,
    pub cxx_type: &'static str,
    pub role: ArgumentRole,
}

const fn arg(name: &'static str, cxx_type: &'static str, role: ArgumentRole) -> Argument {
    Argument { name, cxx_type, role }
}

/// How the entry point reports a failed integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusConvention {
    /// the solver reduces its time step when `PNEWDT` is lower than one
    NewTimeStep,
    /// `KINC` set to a non positive value
    Kinc,
    /// an integer returned by the entry point
    ReturnValue,
}

/// When the solver wants the tangent operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TangentRequest {
    Always,
    /// the first component of the tangent array is set to a positive value on input
    FirstComponent,
    /// an argument flags the request
    Flag,
}

/// How shear components of symmetric tensors are stored by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShearScaling {
    /// shear components multiplied by √2, as the tensor library does
    Sqrt2,
    /// engineering shear strains `γ = 2ε`, stresses as is
    Engineering,
}

impl ShearScaling {
    /// factors converting the solver's shear strain and stress components to the tensor
    /// library's
    pub fn factors(&self) -> (f64, f64) {
        match self {
            ShearScaling::Sqrt2 => (1.0, 1.0),
            ShearScaling::Engineering => (std::f64::consts::FRAC_1_SQRT_2, std::f64::consts::SQRT_2),
        }
    }
}

/// The calling convention of an entry point for one hypothesis, with the sizes the
/// solver must pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentOrder {
    pub arguments: Vec<Argument>,
    pub status: StatusConvention,
    pub tangent_request: TangentRequest,
    pub shear_scaling: ShearScaling,
    /// fortran solvers store the tangent operator column by column
    pub column_major_tangent: bool,
    pub material_property_offset: usize,
    pub number_of_components: usize,
    pub number_of_material_properties: usize,
    pub number_of_internal_state_variables: usize,
    pub number_of_external_state_variables: usize,
}

impl ArgumentOrder {
    pub fn argument(&self, role: ArgumentRole) -> Option<&Argument> {
        self.arguments.iter().find(|a| a.role == role)
    }

    pub fn name_of(&self, role: ArgumentRole) -> Option<&'static str> {
        self.argument(role).map(|a| a.name)
    }

    pub fn has(&self, role: ArgumentRole) -> bool {
        self.argument(role).is_some()
    }
}

/// A target solver interface.
pub trait InterfaceBackend: Send + Sync {
    fn name(&self) -> &'static str;

    fn supported_hypotheses(&self) -> &'static [ModellingHypothesis];

    fn supports(&self, hypothesis: ModellingHypothesis) -> bool {
        self.supported_hypotheses().contains(&hypothesis)
    }

    /// names of the symmetric tensor components, in the order the solver stores them
    fn stensor_components(&self, hypothesis: ModellingHypothesis) -> &'static [&'static str] {
        tfel_components(hypothesis)
    }

    fn shear_scaling(&self) -> ShearScaling;

    /// number of leading material properties the solver passes for its own needs
    fn material_property_offset(&self, _hypothesis: ModellingHypothesis, _orthotropic: bool) -> usize {
        0
    }

    fn marshal(&self, hypothesis: ModellingHypothesis, layout: &VariableLayout, orthotropic: bool) -> ArgumentOrder;
}

fn tfel_components(hypothesis: ModellingHypothesis) -> &'static [&'static str] {
    match hypothesis.space_dimension() {
        1 => &["rr", "zz", "tt"],
        2 => &["xx", "yy", "zz", "xy"],
        _ => &["xx", "yy", "zz", "xy", "xz", "yz"],
    }
}

fn abaqus_components(hypothesis: ModellingHypothesis) -> &'static [&'static str] {
    match hypothesis.space_dimension() {
        1 => &["11", "22", "33"],
        2 => &["11", "22", "33", "12"],
        _ => &["11", "22", "33", "12", "13", "23"],
    }
}

fn order(
    backend: &dyn InterfaceBackend,
    hypothesis: ModellingHypothesis,
    layout: &VariableLayout,
    orthotropic: bool,
    arguments: Vec<Argument>,
    status: StatusConvention,
    tangent_request: TangentRequest,
) -> ArgumentOrder {
    let material_property_offset = backend.material_property_offset(hypothesis, orthotropic);
    ArgumentOrder {
        arguments,
        status,
        tangent_request,
        shear_scaling: backend.shear_scaling(),
        column_major_tangent: status != StatusConvention::ReturnValue,
        material_property_offset,
        number_of_components: hypothesis.stensor_size(),
        number_of_material_properties: material_property_offset + layout.material_properties_size(),
        number_of_internal_state_variables: layout.internal_state_variables_size(),
        number_of_external_state_variables: layout.external_state_variables_size(),
    }
}

use ArgumentRole::*;

/// the historical fortran calling convention shared by the abaqus like solvers
fn umat_arguments(real: &'static str, int: &'static str) -> Vec<Argument> {
    vec![
        arg("STRESS", real, Stress),
        arg("STATEV", real, InternalStateVariables),
        arg("DDSDDE", real, Tangent),
        arg("SSE", real, Unused),
        arg("SPD", real, Unused),
        arg("SCD", real, Unused),
        arg("RPL", real, Unused),
        arg("DDSDDT", real, Unused),
        arg("DRPLDE", real, Unused),
        arg("DRPLDT", real, Unused),
        arg("STRAN", real, Strain),
        arg("DSTRAN", real, StrainIncrement),
        arg("TIME", real, Unused),
        arg("DTIME", real, TimeIncrement),
        arg("TEMP", real, Temperature),
        arg("DTEMP", real, TemperatureIncrement),
        arg("PREDEF", real, ExternalStateVariables),
        arg("DPRED", real, ExternalStateVariablesIncrements),
        arg("CMNAME", "char", Unused),
        arg("NDI", int, Unused),
        arg("NSHR", int, Unused),
        arg("NTENS", int, NumberOfComponents),
        arg("NSTATV", int, NumberOfInternalStateVariables),
        arg("PROPS", real, MaterialProperties),
        arg("NPROPS", int, NumberOfMaterialProperties),
        arg("COORDS", real, Unused),
        arg("DROT", real, Unused),
        arg("PNEWDT", real, NewTimeStepRatio),
        arg("CELENT", real, Unused),
        arg("DFGRD0", real, Unused),
        arg("DFGRD1", real, Unused),
        arg("NOEL", int, Unused),
        arg("NPT", int, Unused),
        arg("LAYER", int, Unused),
        arg("KSPT", int, Unused),
        arg("KSTEP", int, Unused),
        arg("KINC", int, Status),
    ]
}

const SOLID_HYPOTHESES: &[ModellingHypothesis] = &[Axisymmetrical, PlaneStress, PlaneStrain, Tridimensional];

pub struct UmatInterface;

impl InterfaceBackend for UmatInterface {
    fn name(&self) -> &'static str {
        "umat"
    }

    fn supported_hypotheses(&self) -> &'static [ModellingHypothesis] {
        SOLID_HYPOTHESES
    }

    fn stensor_components(&self, hypothesis: ModellingHypothesis) -> &'static [&'static str] {
        abaqus_components(hypothesis)
    }

    fn shear_scaling(&self) -> ShearScaling {
        ShearScaling::Engineering
    }

    fn marshal(&self, hypothesis: ModellingHypothesis, layout: &VariableLayout, orthotropic: bool) -> ArgumentOrder {
        let arguments = umat_arguments("umat::UMATReal", "umat::UMATInt");
        order(self, hypothesis, layout, orthotropic, arguments, StatusConvention::NewTimeStep, TangentRequest::Always)
    }
}

pub struct AbaqusInterface;

impl InterfaceBackend for AbaqusInterface {
    fn name(&self) -> &'static str {
        "abaqus"
    }

    fn supported_hypotheses(&self) -> &'static [ModellingHypothesis] {
        SOLID_HYPOTHESES
    }

    fn stensor_components(&self, hypothesis: ModellingHypothesis) -> &'static [&'static str] {
        abaqus_components(hypothesis)
    }

    fn shear_scaling(&self) -> ShearScaling {
        ShearScaling::Engineering
    }

    fn marshal(&self, hypothesis: ModellingHypothesis, layout: &VariableLayout, orthotropic: bool) -> ArgumentOrder {
        let arguments = umat_arguments("abaqus::AbaqusReal", "abaqus::AbaqusInt");
        order(self, hypothesis, layout, orthotropic, arguments, StatusConvention::NewTimeStep, TangentRequest::Always)
    }
}

/// Cast3M passes the elastic properties, the mass density and the thermal expansion
/// before the behaviour's own material properties.
pub struct CastemInterface;

impl InterfaceBackend for CastemInterface {
    fn name(&self) -> &'static str {
        "castem"
    }

    fn supported_hypotheses(&self) -> &'static [ModellingHypothesis] {
        &ModellingHypothesis::ALL
    }

    fn shear_scaling(&self) -> ShearScaling {
        ShearScaling::Engineering
    }

    fn material_property_offset(&self, hypothesis: ModellingHypothesis, orthotropic: bool) -> usize {
        match (orthotropic, hypothesis.space_dimension()) {
            (false, _) if hypothesis == PlaneStress => 5,
            (false, _) => 4,
            (true, 1) => 7,
            (true, 2) => 10,
            (true, _) => 13,
        }
    }

    fn marshal(&self, hypothesis: ModellingHypothesis, layout: &VariableLayout, orthotropic: bool) -> ArgumentOrder {
        let arguments = umat_arguments("castem::CastemReal", "castem::CastemInt");
        order(self, hypothesis, layout, orthotropic, arguments, StatusConvention::Kinc, TangentRequest::FirstComponent)
    }
}

pub struct AsterInterface;

impl InterfaceBackend for AsterInterface {
    fn name(&self) -> &'static str {
        "aster"
    }

    fn supported_hypotheses(&self) -> &'static [ModellingHypothesis] {
        SOLID_HYPOTHESES
    }

    fn shear_scaling(&self) -> ShearScaling {
        ShearScaling::Sqrt2
    }

    fn marshal(&self, hypothesis: ModellingHypothesis, layout: &VariableLayout, orthotropic: bool) -> ArgumentOrder {
        let real = "aster::AsterReal";
        let int = "aster::AsterInt";
        let arguments = vec![
            arg("STRESS", real, Stress),
            arg("STATEV", real, InternalStateVariables),
            arg("DDSOE", real, Tangent),
            arg("STRAN", real, Strain),
            arg("DSTRAN", real, StrainIncrement),
            arg("DTIME", real, TimeIncrement),
            arg("TEMP", real, Temperature),
            arg("DTEMP", real, TemperatureIncrement),
            arg("PREDEF", real, ExternalStateVariables),
            arg("DPRED", real, ExternalStateVariablesIncrements),
            arg("NTENS", int, NumberOfComponents),
            arg("NSTATV", int, NumberOfInternalStateVariables),
            arg("PROPS", real, MaterialProperties),
            arg("NPROPS", int, NumberOfMaterialProperties),
            arg("DROT", real, Unused),
            arg("PNEWDT", real, NewTimeStepRatio),
            arg("NUMMOD", int, Unused),
        ];
        order(self, hypothesis, layout, orthotropic, arguments, StatusConvention::NewTimeStep, TangentRequest::FirstComponent)
    }
}

/// Cyrano is a fuel performance code working in one dimensional axisymmetry.
pub struct CyranoInterface;

impl InterfaceBackend for CyranoInterface {
    fn name(&self) -> &'static str {
        "cyrano"
    }

    fn supported_hypotheses(&self) -> &'static [ModellingHypothesis] {
        &[AxisymmetricalGeneralisedPlaneStrain, AxisymmetricalGeneralisedPlaneStress]
    }

    fn shear_scaling(&self) -> ShearScaling {
        ShearScaling::Sqrt2
    }

    fn marshal(&self, hypothesis: ModellingHypothesis, layout: &VariableLayout, orthotropic: bool) -> ArgumentOrder {
        let real = "cyrano::CyranoReal";
        let int = "cyrano::CyranoInt";
        let arguments = vec![
            arg("NTENS", int, NumberOfComponents),
            arg("DTIME", real, TimeIncrement),
            arg("DROT", real, Unused),
            arg("DDSOE", real, Tangent),
            arg("STRAN", real, Strain),
            arg("DSTRAN", real, StrainIncrement),
            arg("TEMP", real, Temperature),
            arg("DTEMP", real, TemperatureIncrement),
            arg("PROPS", real, MaterialProperties),
            arg("NPROPS", int, NumberOfMaterialProperties),
            arg("PREDEF", real, ExternalStateVariables),
            arg("DPRED", real, ExternalStateVariablesIncrements),
            arg("STATEV", real, InternalStateVariables),
            arg("NSTATV", int, NumberOfInternalStateVariables),
            arg("STRESS", real, Stress),
            arg("NDI", int, Unused),
            arg("KINC", int, Status),
        ];
        order(self, hypothesis, layout, orthotropic, arguments, StatusConvention::Kinc, TangentRequest::FirstComponent)
    }
}

fn flat_arguments() -> Vec<Argument> {
    vec![
        arg("sig", "double", Stress),
        arg("isvs", "double", InternalStateVariables),
        arg("K", "double", Tangent),
        arg("eto", "double", Strain),
        arg("deto", "double", StrainIncrement),
        arg("mps", "double", MaterialProperties),
        arg("esvs", "double", AllExternalStateVariables),
        arg("desvs", "double", AllExternalStateVariablesIncrements),
        arg("dt", "double", TimeIncrement),
        arg("request_tangent", "int", TangentRequest),
    ]
}

/// A solver independent entry point working on flat arrays in the tensor library's
/// conventions.
pub struct GenericInterface;

impl InterfaceBackend for GenericInterface {
    fn name(&self) -> &'static str {
        "generic"
    }

    fn supported_hypotheses(&self) -> &'static [ModellingHypothesis] {
        &ModellingHypothesis::ALL
    }

    fn shear_scaling(&self) -> ShearScaling {
        ShearScaling::Sqrt2
    }

    fn marshal(&self, hypothesis: ModellingHypothesis, layout: &VariableLayout, orthotropic: bool) -> ArgumentOrder {
        order(self, hypothesis, layout, orthotropic, flat_arguments(), StatusConvention::ReturnValue, TangentRequest::Flag)
    }
}

/// Generates the behaviour alone, with the same flat entry point as the generic
/// interface. Used for testing the integrators.
pub struct NullInterface;

impl InterfaceBackend for NullInterface {
    fn name(&self) -> &'static str {
        "null"
    }

    fn supported_hypotheses(&self) -> &'static [ModellingHypothesis] {
        &ModellingHypothesis::ALL
    }

    fn shear_scaling(&self) -> ShearScaling {
        ShearScaling::Sqrt2
    }

    fn marshal(&self, hypothesis: ModellingHypothesis, layout: &VariableLayout, orthotropic: bool) -> ArgumentOrder {
        order(self, hypothesis, layout, orthotropic, flat_arguments(), StatusConvention::ReturnValue, TangentRequest::Flag)
    }
}

/// every interface back end, in the order they are listed to the user
pub fn standard_interfaces() -> Vec<Box<dyn InterfaceBackend>> {
    vec![
        Box::new(UmatInterface),
        Box::new(AbaqusInterface),
        Box::new(CastemInterface),
        Box::new(AsterInterface),
        Box::new(CyranoInterface),
        Box::new(GenericInterface),
        Box::new(NullInterface),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_mfront_string;
    use crate::registry::Registry;

    fn layout(hypothesis: ModellingHypothesis) -> VariableLayout {
        let text = "@DSL IsotropicMisesCreep; @Behaviour Norton; @MaterialProperty real A; \
                    @FlowRule { f = A*seq; df_dseq = A; }";
        let bd = parse_mfront_string(text, &Registry::new()).unwrap();
        VariableLayout::new(&bd, hypothesis)
    }

    #[test]
    fn names_are_unique() {
        let interfaces = standard_interfaces();
        let mut names: Vec<_> = interfaces.iter().map(|i| i.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 7);
    }

    #[test]
    fn castem_offsets() {
        let l = layout(Tridimensional);
        let o = CastemInterface.marshal(Tridimensional, &l, false);
        assert_eq!(o.material_property_offset, 4);
        // young, nu and A
        assert_eq!(o.number_of_material_properties, 4 + 3);
        assert_eq!(o.number_of_internal_state_variables, 7);
        assert_eq!(CastemInterface.material_property_offset(PlaneStress, false), 5);
        assert_eq!(CastemInterface.material_property_offset(Tridimensional, true), 13);
        assert_eq!(o.status, StatusConvention::Kinc);
    }

    #[test]
    fn calling_conventions() {
        let l = layout(PlaneStrain);
        let umat = UmatInterface.marshal(PlaneStrain, &l, false);
        assert_eq!(umat.arguments.len(), 37);
        assert_eq!(umat.name_of(ArgumentRole::Stress), Some("STRESS"));
        assert_eq!(umat.name_of(ArgumentRole::Status), Some("KINC"));
        assert_eq!(umat.number_of_components, 4);
        assert_eq!(umat.shear_scaling, ShearScaling::Engineering);
        let generic = GenericInterface.marshal(PlaneStrain, &l, false);
        assert!(generic.has(ArgumentRole::AllExternalStateVariables));
        assert!(!generic.has(ArgumentRole::Temperature));
        assert_eq!(generic.material_property_offset, 0);
        assert!(umat.column_major_tangent);
        assert!(!generic.column_major_tangent);
    }

    #[test]
    fn supported_hypotheses() {
        assert!(!CyranoInterface.supports(Tridimensional));
        assert!(CyranoInterface.supports(AxisymmetricalGeneralisedPlaneStrain));
        assert!(!UmatInterface.supports(GeneralisedPlaneStrain));
        assert!(NullInterface.supports(GeneralisedPlaneStrain));
        assert_eq!(AbaqusInterface.stensor_components(Tridimensional)[5], "23");
        assert_eq!(AsterInterface.stensor_components(PlaneStrain)[3], "xy");
    }

    #[test]
    fn shear_factors() {
        let (strain, stress) = ShearScaling::Engineering.factors();
        approx::assert_relative_eq!(strain * stress, 1.0);
        assert_eq!(ShearScaling::Sqrt2.factors(), (1.0, 1.0));
    }
}
