//! Reference implementation of the local integration performed by the generated code:
//! a θ-method Newton-Raphson solve of the implicit system with adaptive sub-stepping,
//! consistent tangent extraction and bounds checking, plus the explicit Runge-Kutta
//! schemes.

pub mod linalg;
pub mod newton;
pub mod policy;
pub mod runge_kutta;
pub mod substep;
pub mod tangent;

use ndarray::{Array1, Array2};
use thiserror::Error;

pub use linalg::LuFactors;
pub use newton::{ImplicitSystem, NewtonSettings, NewtonSolution};
pub use policy::OutOfBoundsPolicy;
pub use runge_kutta::{ExplicitSystem, RungeKuttaIntegrator, RungeKuttaResult};
pub use substep::{Integrator, IntegratorSettings, SubStepState};

/// Why one evaluation of a system failed. These failures are recoverable: they trigger
/// a sub-step.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvaluationError {
    #[error("non finite value in {0}")]
    NonFinite(&'static str),
    #[error("singular jacobian")]
    SingularMatrix,
    #[error("{0}")]
    Failed(String),
}

/// Failures of a whole time step, returned to the calling solver.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IntegrationFailure {
    #[error("integration failed to converge with a time step of {dt:e}: {reason}")]
    Divergence { dt: f64, reason: String },
    #[error("{variable} = {value:e} is out of bounds {bounds}")]
    OutOfBounds {
        variable: String,
        value: f64,
        bounds: String,
    },
}

/// Start of a (sub) step: the state variables, the driving variables (total strain) and
/// the external state variables (temperature first), with their increments over the
/// step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepContext {
    pub dt: f64,
    pub theta: f64,
    pub state: Array1<f64>,
    pub driving: Array1<f64>,
    pub driving_increment: Array1<f64>,
    pub external: Array1<f64>,
    pub external_increment: Array1<f64>,
}

impl StepContext {
    pub fn new(
        dt: f64,
        state: Array1<f64>,
        driving: Array1<f64>,
        driving_increment: Array1<f64>,
    ) -> Self {
        Self {
            dt,
            theta: 0.5,
            state,
            driving,
            driving_increment,
            external: Array1::zeros(0),
            external_increment: Array1::zeros(0),
        }
    }

    pub fn with_external(mut self, external: Array1<f64>, increment: Array1<f64>) -> Self {
        self.external = external;
        self.external_increment = increment;
        self
    }

    pub fn with_theta(mut self, theta: f64) -> Self {
        self.theta = theta;
        self
    }

    /// driving variables at the fraction `tau` of the step
    pub fn driving_at(&self, tau: f64) -> Array1<f64> {
        &self.driving + &(&self.driving_increment * tau)
    }

    pub fn external_at(&self, tau: f64) -> Array1<f64> {
        &self.external + &(&self.external_increment * tau)
    }

    /// the part of the step going from fraction `start` to `start + length`, driving and
    /// external variables being interpolated linearly
    pub fn sub_step(&self, state: Array1<f64>, start: f64, length: f64) -> Self {
        Self {
            dt: self.dt * length,
            theta: self.theta,
            state,
            driving: self.driving_at(start),
            driving_increment: &self.driving_increment * length,
            external: self.external_at(start),
            external_increment: &self.external_increment * length,
        }
    }
}

/// Which value a bound applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundTarget {
    State(usize),
    External(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoundCheck {
    pub name: String,
    pub target: BoundTarget,
    pub lower: Option<f64>,
    pub upper: Option<f64>,
}

impl BoundCheck {
    pub fn contains(&self, value: f64) -> bool {
        self.lower.map_or(true, |lo| value >= lo) && self.upper.map_or(true, |hi| value <= hi)
    }

    fn describe(&self) -> String {
        let lower = self.lower.map_or("]-inf".to_string(), |lo| format!("[{:e}", lo));
        let upper = self.upper.map_or("+inf[".to_string(), |hi| format!("{:e}]", hi));
        format!("{}:{}", lower, upper)
    }
}

/// Result of a converged time step.
#[derive(Debug, Clone)]
pub struct Converged {
    pub state: Array1<f64>,
    pub stress: Array1<f64>,
    /// consistent tangent of the last sub-step
    pub tangent: Array2<f64>,
    pub iterations: usize,
    pub substeps: usize,
    pub halvings: usize,
    pub warnings: Vec<String>,
}
