use ndarray::{Array, Array1, Array2, ArrayView1, Dimension};
use tracing::trace;

use super::linalg::{norm_inf, LuFactors};
use super::{EvaluationError, StepContext};

/// An implicit local system `R(Δy) = 0`, the unknowns being the increments of the
/// state variables over the step.
pub trait ImplicitSystem {
    /// number of unknowns
    fn size(&self) -> usize;

    /// the residual, driving variables being taken at `t + θ·dt` by the implementation
    fn residual(&self, dy: ArrayView1<f64>, ctx: &StepContext) -> Result<Array1<f64>, EvaluationError>;

    /// analytical jacobian `∂R/∂Δy`, a forward difference is used when `None`
    fn jacobian(
        &self,
        _dy: ArrayView1<f64>,
        _ctx: &StepContext,
    ) -> Option<Result<Array2<f64>, EvaluationError>> {
        None
    }

    /// starting point of the iterations, zero when `None`
    fn initial_guess(&self, _ctx: &StepContext) -> Option<Array1<f64>> {
        None
    }

    /// stress at the end of the step
    fn stress(&self, dy: ArrayView1<f64>, ctx: &StepContext) -> Result<Array1<f64>, EvaluationError>;

    /// analytical `∂R/∂Δε`
    fn residual_driving_derivative(
        &self,
        _dy: ArrayView1<f64>,
        _ctx: &StepContext,
    ) -> Option<Result<Array2<f64>, EvaluationError>> {
        None
    }

    /// analytical `(∂σ/∂Δε, ∂σ/∂Δy)`
    #[allow(clippy::type_complexity)]
    fn stress_derivatives(
        &self,
        _dy: ArrayView1<f64>,
        _ctx: &StepContext,
    ) -> Option<Result<(Array2<f64>, Array2<f64>), EvaluationError>> {
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NewtonSettings {
    pub epsilon: f64,
    pub iter_max: usize,
    /// relative perturbation of the forward difference jacobian
    pub perturbation: f64,
}

impl Default for NewtonSettings {
    fn default() -> Self {
        Self {
            epsilon: 1e-8,
            iter_max: 100,
            perturbation: f64::EPSILON.sqrt(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewtonSolution {
    pub dy: Array1<f64>,
    /// factors of the jacobian at the solution, reused by the tangent operator
    pub factors: LuFactors,
    pub iterations: usize,
}

fn check_finite<D: Dimension>(values: &Array<f64, D>, what: &'static str) -> Result<(), EvaluationError> {
    if values.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(EvaluationError::NonFinite(what))
    }
}

/// perturbation of the j-th unknown
pub fn perturbation_step(eta: f64, value: f64) -> f64 {
    eta * value.abs().max(1.0)
}

/// forward difference approximation of `∂R/∂Δy`, `r0` being the residual at `dy`
pub fn numerical_jacobian<S: ImplicitSystem + ?Sized>(
    system: &S,
    dy: ArrayView1<f64>,
    r0: &Array1<f64>,
    ctx: &StepContext,
    eta: f64,
) -> Result<Array2<f64>, EvaluationError> {
    let n = dy.len();
    let mut jacobian = Array2::zeros((r0.len(), n));
    let mut perturbed = dy.to_owned();
    for j in 0..n {
        let h = perturbation_step(eta, dy[j]);
        perturbed[j] = dy[j] + h;
        let r = system.residual(perturbed.view(), ctx)?;
        check_finite(&r, "perturbed residual")?;
        jacobian.column_mut(j).assign(&((&r - r0) / h));
        perturbed[j] = dy[j];
    }
    Ok(jacobian)
}

/// Newton-Raphson iterations on one step. Every failure is recoverable by the caller.
pub fn solve<S: ImplicitSystem + ?Sized>(
    system: &S,
    ctx: &StepContext,
    settings: &NewtonSettings,
) -> Result<NewtonSolution, EvaluationError> {
    let mut dy = system
        .initial_guess(ctx)
        .unwrap_or_else(|| Array1::zeros(system.size()));
    for iteration in 1..=settings.iter_max {
        let r = system.residual(dy.view(), ctx)?;
        check_finite(&r, "residual")?;
        let jacobian = match system.jacobian(dy.view(), ctx) {
            Some(jacobian) => jacobian?,
            None => numerical_jacobian(system, dy.view(), &r, ctx, settings.perturbation)?,
        };
        check_finite(&jacobian, "jacobian")?;
        let factors = LuFactors::factorize(&jacobian)?;
        let error = norm_inf(r.view());
        trace!(iteration, error, "newton iteration");
        if error < settings.epsilon {
            return Ok(NewtonSolution {
                dy,
                factors,
                iterations: iteration,
            });
        }
        let correction = factors.solve(r.view());
        dy -= &correction;
        check_finite(&dy, "unknowns")?;
    }
    Err(EvaluationError::Failed(format!(
        "no convergence after {} iterations",
        settings.iter_max
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    /// `Δy³ + Δy - Δε = 0`
    struct Cubic;

    impl ImplicitSystem for Cubic {
        fn size(&self) -> usize {
            1
        }

        fn residual(&self, dy: ArrayView1<f64>, ctx: &StepContext) -> Result<Array1<f64>, EvaluationError> {
            Ok(array![dy[0].powi(3) + dy[0] - ctx.driving_increment[0]])
        }

        fn stress(&self, dy: ArrayView1<f64>, _ctx: &StepContext) -> Result<Array1<f64>, EvaluationError> {
            Ok(dy.to_owned())
        }
    }

    struct AnalyticCubic;

    impl ImplicitSystem for AnalyticCubic {
        fn size(&self) -> usize {
            1
        }

        fn residual(&self, dy: ArrayView1<f64>, ctx: &StepContext) -> Result<Array1<f64>, EvaluationError> {
            Cubic.residual(dy, ctx)
        }

        fn jacobian(&self, dy: ArrayView1<f64>, _ctx: &StepContext) -> Option<Result<Array2<f64>, EvaluationError>> {
            Some(Ok(array![[3.0 * dy[0] * dy[0] + 1.0]]))
        }

        fn stress(&self, dy: ArrayView1<f64>, _ctx: &StepContext) -> Result<Array1<f64>, EvaluationError> {
            Ok(dy.to_owned())
        }
    }

    fn context(de: f64) -> StepContext {
        StepContext::new(1.0, array![0.0], array![0.0], array![de])
    }

    #[test]
    fn numerical_and_analytical_agree() {
        let settings = NewtonSettings::default();
        let a = solve(&Cubic, &context(2.0), &settings).unwrap();
        let b = solve(&AnalyticCubic, &context(2.0), &settings).unwrap();
        assert_relative_eq!(a.dy[0], 1.0, epsilon = 1e-8);
        assert_relative_eq!(b.dy[0], 1.0, epsilon = 1e-8);
        assert!(b.iterations <= a.iterations + 1);
    }

    #[test]
    fn zero_increment_converges_at_once() {
        let s = solve(&Cubic, &context(0.0), &NewtonSettings::default()).unwrap();
        assert_eq!(s.iterations, 1);
        assert_eq!(s.dy[0], 0.0);
    }

    #[test]
    fn iteration_limit() {
        let settings = NewtonSettings {
            iter_max: 2,
            ..NewtonSettings::default()
        };
        let err = solve(&Cubic, &context(10.0), &settings).unwrap_err();
        assert!(matches!(err, EvaluationError::Failed(_)));
    }

    #[test]
    fn perturbation_is_relative() {
        assert_eq!(perturbation_step(1e-6, 0.5), 1e-6);
        assert_relative_eq!(perturbation_step(1e-6, -200.0), 2e-4);
    }
}
