use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ModellingHypothesis {
    AxisymmetricalGeneralisedPlaneStrain,
    AxisymmetricalGeneralisedPlaneStress,
    Axisymmetrical,
    PlaneStress,
    PlaneStrain,
    GeneralisedPlaneStrain,
    Tridimensional,
    UndefinedHypothesis,
}

use ModellingHypothesis::*;

impl ModellingHypothesis {
    pub const ALL: [ModellingHypothesis; 7] = [
        AxisymmetricalGeneralisedPlaneStrain,
        AxisymmetricalGeneralisedPlaneStress,
        Axisymmetrical,
        PlaneStress,
        PlaneStrain,
        GeneralisedPlaneStrain,
        Tridimensional,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            AxisymmetricalGeneralisedPlaneStrain => "AxisymmetricalGeneralisedPlaneStrain",
            AxisymmetricalGeneralisedPlaneStress => "AxisymmetricalGeneralisedPlaneStress",
            Axisymmetrical => "Axisymmetrical",
            PlaneStress => "PlaneStress",
            PlaneStrain => "PlaneStrain",
            GeneralisedPlaneStrain => "GeneralisedPlaneStrain",
            Tridimensional => "Tridimensional",
            UndefinedHypothesis => "UndefinedHypothesis",
        }
    }

    /// upper case name, used in generated file names and C++ enumerations
    pub fn upper_name(&self) -> &'static str {
        match self {
            AxisymmetricalGeneralisedPlaneStrain => "AXISYMMETRICALGENERALISEDPLANESTRAIN",
            AxisymmetricalGeneralisedPlaneStress => "AXISYMMETRICALGENERALISEDPLANESTRESS",
            Axisymmetrical => "AXISYMMETRICAL",
            PlaneStress => "PLANESTRESS",
            PlaneStrain => "PLANESTRAIN",
            GeneralisedPlaneStrain => "GENERALISEDPLANESTRAIN",
            Tridimensional => "TRIDIMENSIONAL",
            UndefinedHypothesis => "UNDEFINEDHYPOTHESIS",
        }
    }

    pub fn space_dimension(&self) -> usize {
        match self {
            AxisymmetricalGeneralisedPlaneStrain | AxisymmetricalGeneralisedPlaneStress => 1,
            Axisymmetrical | PlaneStress | PlaneStrain | GeneralisedPlaneStrain => 2,
            Tridimensional | UndefinedHypothesis => 3,
        }
    }

    /// number of independent components of a symmetric tensor
    pub fn stensor_size(&self) -> usize {
        match self.space_dimension() {
            1 => 3,
            2 => 4,
            _ => 6,
        }
    }

    /// number of components of an unsymmetric tensor
    pub fn tensor_size(&self) -> usize {
        match self.space_dimension() {
            1 => 3,
            2 => 5,
            _ => 9,
        }
    }
}

impl fmt::Display for ModellingHypothesis {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ModellingHypothesis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let h = match s {
            "AxisymmetricalGeneralisedPlaneStrain" | "AXISYMMETRICALGENERALISEDPLANESTRAIN" => {
                AxisymmetricalGeneralisedPlaneStrain
            }
            "AxisymmetricalGeneralisedPlaneStress" | "AXISYMMETRICALGENERALISEDPLANESTRESS" => {
                AxisymmetricalGeneralisedPlaneStress
            }
            "Axisymmetrical" | "AXISYMMETRICAL" => Axisymmetrical,
            "PlaneStress" | "PLANESTRESS" => PlaneStress,
            "PlaneStrain" | "PLANESTRAIN" => PlaneStrain,
            "GeneralisedPlaneStrain" | "GENERALISEDPLANESTRAIN" => GeneralisedPlaneStrain,
            "Tridimensional" | "TRIDIMENSIONAL" => Tridimensional,
            "UndefinedHypothesis" | "UNDEFINEDHYPOTHESIS" => UndefinedHypothesis,
            _ => return Err(format!("unknown modelling hypothesis '{}'", s)),
        };
        Ok(h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes() {
        assert_eq!(AxisymmetricalGeneralisedPlaneStrain.stensor_size(), 3);
        assert_eq!(PlaneStrain.stensor_size(), 4);
        assert_eq!(PlaneStrain.tensor_size(), 5);
        assert_eq!(Tridimensional.stensor_size(), 6);
        assert_eq!(Tridimensional.tensor_size(), 9);
    }

    #[test]
    fn parse_both_spellings() {
        for h in ModellingHypothesis::ALL {
            assert_eq!(h.name().parse::<ModellingHypothesis>(), Ok(h));
            assert_eq!(h.upper_name().parse::<ModellingHypothesis>(), Ok(h));
        }
        assert!("Plane".parse::<ModellingHypothesis>().is_err());
    }
}
