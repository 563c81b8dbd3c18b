use ndarray::{Array1, ArrayView1};
use tracing::debug;

use crate::behaviour::RungeKuttaMethod;

use super::linalg::norm_inf;
use super::policy::OutOfBoundsPolicy;
use super::substep::check_bounds;
use super::{BoundCheck, EvaluationError, IntegrationFailure, StepContext};

/// A system integrated explicitly: the rate of the state variables at the fraction `tau`
/// of the (sub) step.
pub trait ExplicitSystem {
    fn derivative(&self, y: ArrayView1<f64>, ctx: &StepContext, tau: f64) -> Result<Array1<f64>, EvaluationError>;
}

#[derive(Debug, Clone)]
pub struct RungeKuttaResult {
    pub state: Array1<f64>,
    pub substeps: usize,
    pub halvings: usize,
    pub warnings: Vec<String>,
}

pub struct RungeKuttaIntegrator<'a, S: ExplicitSystem + ?Sized> {
    system: &'a S,
    method: RungeKuttaMethod,
    epsilon: f64,
    max_sub_steps: usize,
    policy: OutOfBoundsPolicy,
    bounds: Vec<BoundCheck>,
}

fn finite(values: Array1<f64>) -> Result<Array1<f64>, EvaluationError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(values)
    } else {
        Err(EvaluationError::NonFinite("state derivative"))
    }
}

impl<'a, S: ExplicitSystem + ?Sized> RungeKuttaIntegrator<'a, S> {
    pub fn new(system: &'a S, method: RungeKuttaMethod) -> Self {
        Self {
            system,
            method,
            epsilon: 1e-8,
            max_sub_steps: 10,
            policy: OutOfBoundsPolicy::None,
            bounds: Vec::new(),
        }
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_max_sub_steps(mut self, max_sub_steps: usize) -> Self {
        self.max_sub_steps = max_sub_steps;
        self
    }

    pub fn with_policy(mut self, policy: OutOfBoundsPolicy, bounds: Vec<BoundCheck>) -> Self {
        self.policy = policy;
        self.bounds = bounds;
        self
    }

    fn rate(&self, y: &Array1<f64>, ctx: &StepContext, tau: f64) -> Result<Array1<f64>, EvaluationError> {
        finite(self.system.derivative(y.view(), ctx, tau)?)
    }

    /// one step over the sub-step `ctx`, returning the new state and the error estimate
    /// when the method has one
    fn step(&self, ctx: &StepContext) -> Result<(Array1<f64>, Option<f64>), EvaluationError> {
        let y = &ctx.state;
        let dt = ctx.dt;
        match self.method {
            RungeKuttaMethod::Euler => {
                let k1 = self.rate(y, ctx, 0.0)?;
                Ok((y + &(k1 * dt), None))
            }
            RungeKuttaMethod::Rk2 => {
                let k1 = self.rate(y, ctx, 0.0)?;
                let k2 = self.rate(&(y + &(&k1 * (0.5 * dt))), ctx, 0.5)?;
                Ok((y + &(k2 * dt), None))
            }
            RungeKuttaMethod::Rk4 | RungeKuttaMethod::Rk42 => {
                let k1 = self.rate(y, ctx, 0.0)?;
                let k2 = self.rate(&(y + &(&k1 * (0.5 * dt))), ctx, 0.5)?;
                let k3 = self.rate(&(y + &(&k2 * (0.5 * dt))), ctx, 0.5)?;
                let k4 = self.rate(&(y + &(&k3 * dt)), ctx, 1.0)?;
                let y4 = y + &((&k1 + &(&k2 * 2.0) + &(&k3 * 2.0) + &k4) * (dt / 6.0));
                if self.method == RungeKuttaMethod::Rk4 {
                    return Ok((y4, None));
                }
                // embedded second order estimate, the midpoint rule
                let y2 = y + &(&k2 * dt);
                let error = norm_inf((&y4 - &y2).view());
                Ok((y4, Some(error)))
            }
        }
    }

    pub fn integrate(&self, step: &StepContext) -> Result<RungeKuttaResult, IntegrationFailure> {
        let minimal_length = 0.5f64.powi(self.max_sub_steps as i32);
        let mut state = step.state.clone();
        let mut start = 0.0;
        let mut length = 1.0;
        let mut substeps = 0;
        let mut halvings = 0;
        while start < 1.0 - 0.5 * minimal_length {
            let sub = step.sub_step(state.clone(), start, length);
            let outcome = match self.step(&sub) {
                Ok((_, Some(error))) if error > self.epsilon => {
                    Err(format!("error estimate {:e} above {:e}", error, self.epsilon))
                }
                Ok((y, _)) => Ok(y),
                Err(err) => Err(err.to_string()),
            };
            match outcome {
                Ok(y) => {
                    state = y;
                    substeps += 1;
                    start += length;
                    length = length.min(1.0 - start);
                }
                Err(reason) => {
                    if 0.5 * length < minimal_length {
                        return Err(IntegrationFailure::Divergence {
                            dt: length * step.dt,
                            reason,
                        });
                    }
                    debug!(length = 0.5 * length, %reason, "sub-stepping");
                    length *= 0.5;
                    halvings += 1;
                }
            }
        }
        let warnings = check_bounds(&self.bounds, &state, &step.external_at(1.0), self.policy)?;
        Ok(RungeKuttaResult {
            state,
            substeps,
            halvings,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// `y' = -k·y`
    struct Decay {
        k: f64,
    }

    impl ExplicitSystem for Decay {
        fn derivative(&self, y: ArrayView1<f64>, _ctx: &StepContext, _tau: f64) -> Result<Array1<f64>, EvaluationError> {
            Ok(y.mapv(|v| -self.k * v))
        }
    }

    /// `y' = dε/dt`, following the driving variable
    struct Follower;

    impl ExplicitSystem for Follower {
        fn derivative(&self, _y: ArrayView1<f64>, ctx: &StepContext, _tau: f64) -> Result<Array1<f64>, EvaluationError> {
            Ok(&ctx.driving_increment / ctx.dt)
        }
    }

    fn step(dt: f64) -> StepContext {
        StepContext::new(dt, array![1.0], array![0.0], array![0.3])
    }

    macro_rules! decay_tests {
        ($($name:ident: $method:expr, $tolerance:expr,)*) => {
        $(
            #[test]
            fn $name() {
                let system = Decay { k: 1.0 };
                let result = RungeKuttaIntegrator::new(&system, $method)
                    .integrate(&step(0.1))
                    .unwrap();
                assert_relative_eq!(result.state[0], (-0.1f64).exp(), max_relative = $tolerance);
            }
        )*
        }
    }

    decay_tests! {
        euler: RungeKuttaMethod::Euler, 1e-2,
        rk2: RungeKuttaMethod::Rk2, 1e-3,
        rk4: RungeKuttaMethod::Rk4, 1e-6,
        rk42: RungeKuttaMethod::Rk42, 1e-6,
    }

    #[test]
    fn adaptive_sub_steps() {
        let system = Decay { k: 1.0 };
        let result = RungeKuttaIntegrator::new(&system, RungeKuttaMethod::Rk42)
            .with_epsilon(1e-6)
            .integrate(&step(2.0))
            .unwrap();
        assert!(result.halvings > 0);
        assert_relative_eq!(result.state[0], (-2.0f64).exp(), max_relative = 1e-5);
    }

    #[test]
    fn linear_driving() {
        let result = RungeKuttaIntegrator::new(&Follower, RungeKuttaMethod::Euler)
            .integrate(&step(1.0))
            .unwrap();
        assert_relative_eq!(result.state[0], 1.3, epsilon = 1e-12);
        assert_eq!(result.substeps, 1);
    }

    #[test]
    fn accuracy_limit_is_fatal() {
        let system = Decay { k: 50.0 };
        let err = RungeKuttaIntegrator::new(&system, RungeKuttaMethod::Rk42)
            .with_epsilon(1e-14)
            .with_max_sub_steps(2)
            .integrate(&step(1.0))
            .unwrap_err();
        assert!(matches!(err, IntegrationFailure::Divergence { .. }));
    }
}
