use ndarray::Array1;
use tracing::{debug, warn};

use crate::behaviour::AlgorithmDescriptor;

use super::newton::{self, ImplicitSystem, NewtonSettings};
use super::policy::OutOfBoundsPolicy;
use super::tangent::consistent_tangent;
use super::{BoundCheck, BoundTarget, Converged, EvaluationError, IntegrationFailure, StepContext};

#[derive(Debug, Clone, PartialEq)]
pub struct IntegratorSettings {
    pub theta: f64,
    pub newton: NewtonSettings,
    pub max_sub_steps: usize,
    pub policy: OutOfBoundsPolicy,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            theta: 0.5,
            newton: NewtonSettings::default(),
            max_sub_steps: 10,
            policy: OutOfBoundsPolicy::None,
        }
    }
}

impl IntegratorSettings {
    /// the settings a behaviour was compiled with
    pub fn from_algorithm(algorithm: &AlgorithmDescriptor, policy: OutOfBoundsPolicy) -> Self {
        Self {
            theta: algorithm.theta,
            newton: NewtonSettings {
                epsilon: algorithm.epsilon,
                iter_max: algorithm.iter_max,
                perturbation: algorithm.numerical_jacobian_epsilon(),
            },
            max_sub_steps: algorithm.max_sub_steps,
            policy,
        }
    }
}

/// States of the integration of one time step.
#[derive(Debug, Clone, PartialEq)]
pub enum SubStepState {
    Init,
    /// trying the sub-step going from `start` to `start + length`, both as fractions of
    /// the time step
    AttemptStep { start: f64, length: f64 },
    SubStepAndRetry { start: f64, length: f64, reason: String },
    Converged,
    Fatal(IntegrationFailure),
}

/// Integrates an implicit system over a time step, halving the sub-step on failure.
pub struct Integrator<'a, S: ImplicitSystem + ?Sized> {
    system: &'a S,
    settings: IntegratorSettings,
    bounds: Vec<BoundCheck>,
}

impl<'a, S: ImplicitSystem + ?Sized> Integrator<'a, S> {
    pub fn new(system: &'a S, settings: IntegratorSettings) -> Self {
        Self {
            system,
            settings,
            bounds: Vec::new(),
        }
    }

    pub fn with_bounds(mut self, bounds: Vec<BoundCheck>) -> Self {
        self.bounds = bounds;
        self
    }

    pub fn integrate(&self, step: &StepContext) -> Result<Converged, IntegrationFailure> {
        let ctx = step.clone().with_theta(self.settings.theta);
        let minimal_length = 0.5f64.powi(self.settings.max_sub_steps as i32);
        let mut state = ctx.state.clone();
        let mut result: Option<Converged> = None;
        let mut iterations = 0;
        let mut substeps = 0;
        let mut halvings = 0;

        let mut current = SubStepState::Init;
        loop {
            current = match current {
                SubStepState::Init => SubStepState::AttemptStep {
                    start: 0.0,
                    length: 1.0,
                },
                SubStepState::AttemptStep { start, length } => {
                    let sub = ctx.sub_step(state.clone(), start, length);
                    match self.attempt(&sub) {
                        Ok((dy, stress, tangent, n)) => {
                            state = &sub.state + &dy;
                            iterations += n;
                            substeps += 1;
                            result = Some(Converged {
                                state: state.clone(),
                                stress,
                                tangent,
                                iterations,
                                substeps,
                                halvings,
                                warnings: Vec::new(),
                            });
                            let end = start + length;
                            if end >= 1.0 - 0.5 * minimal_length {
                                SubStepState::Converged
                            } else {
                                SubStepState::AttemptStep {
                                    start: end,
                                    length: length.min(1.0 - end),
                                }
                            }
                        }
                        Err(err) => SubStepState::SubStepAndRetry {
                            start,
                            length,
                            reason: err.to_string(),
                        },
                    }
                }
                SubStepState::SubStepAndRetry {
                    start,
                    length,
                    reason,
                } => {
                    if 0.5 * length >= minimal_length {
                        halvings += 1;
                        debug!(length = 0.5 * length, %reason, "sub-stepping");
                        SubStepState::AttemptStep {
                            start,
                            length: 0.5 * length,
                        }
                    } else {
                        SubStepState::Fatal(IntegrationFailure::Divergence {
                            dt: length * ctx.dt,
                            reason,
                        })
                    }
                }
                SubStepState::Converged => {
                    let Some(mut converged) = result.take() else {
                        return Err(IntegrationFailure::Divergence {
                            dt: ctx.dt,
                            reason: "no sub-step converged".to_string(),
                        });
                    };
                    converged.warnings = check_bounds(
                        &self.bounds,
                        &converged.state,
                        &ctx.external_at(1.0),
                        self.settings.policy,
                    )?;
                    return Ok(converged);
                }
                SubStepState::Fatal(failure) => return Err(failure),
            };
        }
    }

    #[allow(clippy::type_complexity)]
    fn attempt(
        &self,
        ctx: &StepContext,
    ) -> Result<(Array1<f64>, Array1<f64>, ndarray::Array2<f64>, usize), EvaluationError> {
        let solution = newton::solve(self.system, ctx, &self.settings.newton)?;
        let stress = self.system.stress(solution.dy.view(), ctx)?;
        let tangent = consistent_tangent(self.system, &solution, ctx, self.settings.newton.perturbation)?;
        Ok((solution.dy, stress, tangent, solution.iterations))
    }
}

/// Applies the out of bounds policy to the end of step values, returning the warnings.
pub(crate) fn check_bounds(
    bounds: &[BoundCheck],
    state: &Array1<f64>,
    external: &Array1<f64>,
    policy: OutOfBoundsPolicy,
) -> Result<Vec<String>, IntegrationFailure> {
    let mut warnings = Vec::new();
    if policy == OutOfBoundsPolicy::None {
        return Ok(warnings);
    }
    for bound in bounds {
        let value = match bound.target {
            BoundTarget::State(i) => state.get(i),
            BoundTarget::External(i) => external.get(i),
        };
        let Some(value) = value.copied() else {
            continue;
        };
        if bound.contains(value) {
            continue;
        }
        let failure = IntegrationFailure::OutOfBounds {
            variable: bound.name.clone(),
            value,
            bounds: bound.describe(),
        };
        match policy {
            OutOfBoundsPolicy::Strict => return Err(failure),
            _ => {
                warn!("{}", failure);
                warnings.push(failure.to_string());
            }
        }
    }
    Ok(warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::{array, ArrayView1};

    /// `Δy = Δε` with a residual that can only be solved when `dt ≤ limit`
    struct Fragile {
        limit: f64,
    }

    impl ImplicitSystem for Fragile {
        fn size(&self) -> usize {
            1
        }

        fn residual(&self, dy: ArrayView1<f64>, ctx: &StepContext) -> Result<Array1<f64>, EvaluationError> {
            if ctx.dt > self.limit {
                return Err(EvaluationError::Failed("time step too large".to_string()));
            }
            Ok(array![dy[0] - ctx.driving_increment[0]])
        }

        fn stress(&self, dy: ArrayView1<f64>, _ctx: &StepContext) -> Result<Array1<f64>, EvaluationError> {
            Ok(array![2.0 * dy[0]])
        }
    }

    /// `Δy² + 1 = 0`
    struct NoSolution;

    impl ImplicitSystem for NoSolution {
        fn size(&self) -> usize {
            1
        }

        fn residual(&self, dy: ArrayView1<f64>, _ctx: &StepContext) -> Result<Array1<f64>, EvaluationError> {
            Ok(array![dy[0] * dy[0] + 1.0])
        }

        fn stress(&self, dy: ArrayView1<f64>, _ctx: &StepContext) -> Result<Array1<f64>, EvaluationError> {
            Ok(dy.to_owned())
        }
    }

    fn step() -> StepContext {
        StepContext::new(1.0, array![0.0], array![0.0], array![0.4])
    }

    #[test]
    fn halves_until_convergence() {
        let system = Fragile { limit: 0.25 };
        let integrator = Integrator::new(&system, IntegratorSettings::default());
        let converged = integrator.integrate(&step()).unwrap();
        assert_eq!(converged.halvings, 2);
        assert_eq!(converged.substeps, 4);
        assert_relative_eq!(converged.state[0], 0.4, epsilon = 1e-8);
        assert!(converged.warnings.is_empty());
    }

    #[test]
    fn no_solution_is_fatal() {
        let settings = IntegratorSettings {
            max_sub_steps: 3,
            ..IntegratorSettings::default()
        };
        let integrator = Integrator::new(&NoSolution, settings);
        let err = integrator.integrate(&step()).unwrap_err();
        match err {
            IntegrationFailure::Divergence { dt, .. } => assert_eq!(dt, 0.125),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn sub_step_limit() {
        let system = Fragile { limit: 0.1 };
        let settings = IntegratorSettings {
            max_sub_steps: 2,
            ..IntegratorSettings::default()
        };
        let err = Integrator::new(&system, settings).integrate(&step()).unwrap_err();
        assert!(matches!(err, IntegrationFailure::Divergence { .. }));
    }

    fn bounded(policy: OutOfBoundsPolicy) -> Result<Converged, IntegrationFailure> {
        let system = Fragile { limit: 1.0 };
        let settings = IntegratorSettings {
            policy,
            ..IntegratorSettings::default()
        };
        let bound = BoundCheck {
            name: "p".to_string(),
            target: BoundTarget::State(0),
            lower: Some(0.0),
            upper: Some(0.1),
        };
        Integrator::new(&system, settings)
            .with_bounds(vec![bound])
            .integrate(&step())
    }

    #[test]
    fn bounds_policies() {
        let none = bounded(OutOfBoundsPolicy::None).unwrap();
        assert!(none.warnings.is_empty());
        let warning = bounded(OutOfBoundsPolicy::Warning).unwrap();
        assert_eq!(warning.warnings.len(), 1);
        assert_relative_eq!(warning.state[0], none.state[0]);
        let err = bounded(OutOfBoundsPolicy::Strict).unwrap_err();
        assert!(matches!(err, IntegrationFailure::OutOfBounds { ref variable, .. } if variable == "p"));
    }

    #[test]
    fn tangent_of_last_sub_step() {
        let system = Fragile { limit: 0.5 };
        let converged = Integrator::new(&system, IntegratorSettings::default())
            .integrate(&step())
            .unwrap();
        assert_relative_eq!(converged.stress[0], 0.4, epsilon = 1e-8);
        assert_relative_eq!(converged.tangent[[0, 0]], 2.0, max_relative = 1e-6);
    }
}
