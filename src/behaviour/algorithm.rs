use std::collections::BTreeSet;
use std::fmt;

use crate::error::{CompileError, ErrorKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RungeKuttaMethod {
    Euler,
    Rk2,
    Rk4,
    /// fourth order with an embedded second order error estimate
    Rk42,
}

impl RungeKuttaMethod {
    pub fn name(&self) -> &'static str {
        match self {
            RungeKuttaMethod::Euler => "euler",
            RungeKuttaMethod::Rk2 => "rk2",
            RungeKuttaMethod::Rk4 => "rk4",
            RungeKuttaMethod::Rk42 => "rk42",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "euler" | "Euler" => Some(RungeKuttaMethod::Euler),
            "rk2" | "RK2" => Some(RungeKuttaMethod::Rk2),
            "rk4" | "RK4" => Some(RungeKuttaMethod::Rk4),
            "rk42" | "RK42" => Some(RungeKuttaMethod::Rk42),
            _ => None,
        }
    }

    pub fn order(&self) -> usize {
        match self {
            RungeKuttaMethod::Euler => 1,
            RungeKuttaMethod::Rk2 => 2,
            RungeKuttaMethod::Rk4 | RungeKuttaMethod::Rk42 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    ThetaMethodImplicit,
    ExplicitRungeKutta(RungeKuttaMethod),
    IsotropicMisesCreep,
    IsotropicMisesPlasticFlow,
    IsotropicStrainHardeningMisesCreep,
    MultipleIsotropicMisesFlows,
}

impl AlgorithmKind {
    pub fn is_isotropic(&self) -> bool {
        matches!(
            self,
            AlgorithmKind::IsotropicMisesCreep
                | AlgorithmKind::IsotropicMisesPlasticFlow
                | AlgorithmKind::IsotropicStrainHardeningMisesCreep
                | AlgorithmKind::MultipleIsotropicMisesFlows
        )
    }

    pub fn supported_parameters(&self) -> &'static [AlgorithmParameter] {
        use AlgorithmParameter::*;
        match self {
            AlgorithmKind::ThetaMethodImplicit => {
                &[Theta, Epsilon, IterMax, MaxSubSteps, NumericalJacobianEpsilon]
            }
            AlgorithmKind::ExplicitRungeKutta(_) => &[Epsilon, MaxSubSteps],
            _ => &[Theta, Epsilon, IterMax, MaxSubSteps],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlgorithmParameter {
    Theta,
    Epsilon,
    IterMax,
    MaxSubSteps,
    NumericalJacobianEpsilon,
}

impl AlgorithmParameter {
    pub fn name(&self) -> &'static str {
        match self {
            AlgorithmParameter::Theta => "theta",
            AlgorithmParameter::Epsilon => "epsilon",
            AlgorithmParameter::IterMax => "iterMax",
            AlgorithmParameter::MaxSubSteps => "maxSubSteps",
            AlgorithmParameter::NumericalJacobianEpsilon => "numerical_jacobian_epsilon",
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            AlgorithmParameter::Theta => "@Theta",
            AlgorithmParameter::Epsilon => "@Epsilon",
            AlgorithmParameter::IterMax => "@IterMax",
            AlgorithmParameter::MaxSubSteps => "@MaximumNumberOfSubSteps",
            AlgorithmParameter::NumericalJacobianEpsilon => {
                "@PerturbationValueForNumericalJacobianComputation"
            }
        }
    }
}

impl fmt::Display for AlgorithmParameter {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JacobianMode {
    /// analytical when the integrator writes jacobian terms, numerical otherwise
    Automatic,
    Numerical,
}

pub const DEFAULT_THETA: f64 = 0.5;
pub const DEFAULT_EPSILON: f64 = 1.0e-8;
pub const DEFAULT_ITER_MAX: usize = 100;
pub const DEFAULT_MAX_SUB_STEPS: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmDescriptor {
    pub kind: AlgorithmKind,
    pub theta: f64,
    pub epsilon: f64,
    pub iter_max: usize,
    pub max_sub_steps: usize,
    pub jacobian: JacobianMode,
    perturbation: Option<f64>,
    explicitly_set: BTreeSet<AlgorithmParameter>,
}

impl AlgorithmDescriptor {
    pub fn new(kind: AlgorithmKind) -> Self {
        Self {
            kind,
            theta: DEFAULT_THETA,
            epsilon: DEFAULT_EPSILON,
            iter_max: DEFAULT_ITER_MAX,
            max_sub_steps: DEFAULT_MAX_SUB_STEPS,
            jacobian: JacobianMode::Automatic,
            perturbation: None,
            explicitly_set: BTreeSet::new(),
        }
    }

    pub fn supports(&self, parameter: AlgorithmParameter) -> bool {
        self.kind.supported_parameters().contains(&parameter)
    }

    pub fn set(&mut self, parameter: AlgorithmParameter, value: f64, line: usize) -> Result<(), CompileError> {
        let invalid = |reason: String| {
            CompileError::new(
                ErrorKind::InvalidAlgorithmParameter {
                    name: parameter.name().to_string(),
                    reason,
                },
                line,
            )
        };
        if !self.supports(parameter) {
            return Err(invalid("not supported by the selected algorithm".to_string()));
        }
        if self.explicitly_set.contains(&parameter) {
            return Err(invalid("value already set".to_string()));
        }
        if !value.is_finite() {
            return Err(invalid(format!("invalid value {}", value)));
        }
        match parameter {
            AlgorithmParameter::Theta => {
                if !(0.0..=1.0).contains(&value) {
                    return Err(invalid(format!("{} is not in [0:1]", value)));
                }
                self.theta = value;
            }
            AlgorithmParameter::Epsilon => {
                if value <= 0.0 {
                    return Err(invalid(format!("{} is not strictly positive", value)));
                }
                self.epsilon = value;
            }
            AlgorithmParameter::IterMax => {
                if value < 1.0 || value.fract() != 0.0 {
                    return Err(invalid(format!("{} is not a strictly positive integer", value)));
                }
                self.iter_max = value as usize;
            }
            AlgorithmParameter::MaxSubSteps => {
                if value < 0.0 || value.fract() != 0.0 || value > 60.0 {
                    return Err(invalid(format!("{} is not an integer in [0:60]", value)));
                }
                self.max_sub_steps = value as usize;
            }
            AlgorithmParameter::NumericalJacobianEpsilon => {
                if value <= 0.0 {
                    return Err(invalid(format!("{} is not strictly positive", value)));
                }
                self.perturbation = Some(value);
            }
        }
        self.explicitly_set.insert(parameter);
        Ok(())
    }

    pub fn is_explicitly_set(&self, parameter: AlgorithmParameter) -> bool {
        self.explicitly_set.contains(&parameter)
    }

    pub fn value(&self, parameter: AlgorithmParameter) -> f64 {
        match parameter {
            AlgorithmParameter::Theta => self.theta,
            AlgorithmParameter::Epsilon => self.epsilon,
            AlgorithmParameter::IterMax => self.iter_max as f64,
            AlgorithmParameter::MaxSubSteps => self.max_sub_steps as f64,
            AlgorithmParameter::NumericalJacobianEpsilon => self
                .perturbation
                .unwrap_or_else(|| self.numerical_jacobian_epsilon()),
        }
    }

    /// relative perturbation of the forward difference jacobian, a tenth of the
    /// convergence criterion unless given, never below the square root of the machine
    /// precision
    pub fn numerical_jacobian_epsilon(&self) -> f64 {
        let eps = self.perturbation.unwrap_or(0.1 * self.epsilon);
        eps.max(f64::EPSILON.sqrt())
    }

    /// smallest fraction of the time step a sub-step may reach
    pub fn minimal_time_step_fraction(&self) -> f64 {
        0.5f64.powi(self.max_sub_steps as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    macro_rules! parameter_tests {
        ($($name:ident: $kind:expr, $param:expr, $value:expr => $ok:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let mut a = AlgorithmDescriptor::new($kind);
                let result = a.set($param, $value, 3);
                assert_eq!(result.is_ok(), $ok, "{:?}", result);
                if let Err(e) = result {
                    assert!(matches!(e.kind, ErrorKind::InvalidAlgorithmParameter { .. }));
                    assert_eq!(e.line, 3);
                }
            }
        )*
        }
    }

    use AlgorithmKind::*;
    use AlgorithmParameter::*;

    parameter_tests! {
        theta_in_range: ThetaMethodImplicit, Theta, 1.0 => true,
        theta_too_large: ThetaMethodImplicit, Theta, 1.5 => false,
        theta_negative: IsotropicMisesCreep, Theta, -0.1 => false,
        epsilon_positive: ThetaMethodImplicit, Epsilon, 1e-10 => true,
        epsilon_zero: ThetaMethodImplicit, Epsilon, 0.0 => false,
        iter_max_zero: ThetaMethodImplicit, IterMax, 0.0 => false,
        iter_max_fraction: ThetaMethodImplicit, IterMax, 2.5 => false,
        runge_kutta_has_no_theta: ExplicitRungeKutta(RungeKuttaMethod::Rk42), Theta, 0.5 => false,
        runge_kutta_has_no_iter_max: ExplicitRungeKutta(RungeKuttaMethod::Rk4), IterMax, 10.0 => false,
        isotropic_has_no_perturbation: IsotropicMisesPlasticFlow, NumericalJacobianEpsilon, 1e-7 => false,
        sub_steps: ThetaMethodImplicit, MaxSubSteps, 4.0 => true,
    }

    #[test]
    fn defaults() {
        let a = AlgorithmDescriptor::new(ThetaMethodImplicit);
        assert_eq!(a.theta, 0.5);
        assert_eq!(a.epsilon, 1e-8);
        assert_eq!(a.iter_max, 100);
        assert_eq!(a.numerical_jacobian_epsilon(), f64::EPSILON.sqrt());
        assert_eq!(a.minimal_time_step_fraction(), 1.0 / 1024.0);
    }

    #[test]
    fn set_twice() {
        let mut a = AlgorithmDescriptor::new(ThetaMethodImplicit);
        a.set(Epsilon, 1e-4, 1).unwrap();
        assert!(a.is_explicitly_set(Epsilon));
        approx::assert_relative_eq!(a.numerical_jacobian_epsilon(), 1e-5);
        assert!(a.set(Epsilon, 1e-5, 2).is_err());
    }
}
