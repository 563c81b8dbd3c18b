use ndarray::{Array1, Array2, ArrayView1};

use super::newton::{perturbation_step, ImplicitSystem, NewtonSolution};
use super::{EvaluationError, StepContext};

/// forward difference of `f` with respect to the driving increment
fn driving_difference<F>(ctx: &StepContext, f0: &Array1<f64>, eta: f64, f: F) -> Result<Array2<f64>, EvaluationError>
where
    F: Fn(&StepContext) -> Result<Array1<f64>, EvaluationError>,
{
    let m = ctx.driving_increment.len();
    let mut derivative = Array2::zeros((f0.len(), m));
    let mut perturbed = ctx.clone();
    for j in 0..m {
        let h = perturbation_step(eta, ctx.driving_increment[j]);
        perturbed.driving_increment[j] = ctx.driving_increment[j] + h;
        let value = f(&perturbed)?;
        derivative.column_mut(j).assign(&((&value - f0) / h));
        perturbed.driving_increment[j] = ctx.driving_increment[j];
    }
    Ok(derivative)
}

/// forward difference of `f` with respect to the unknowns
fn unknowns_difference<F>(dy: ArrayView1<f64>, f0: &Array1<f64>, eta: f64, f: F) -> Result<Array2<f64>, EvaluationError>
where
    F: Fn(ArrayView1<f64>) -> Result<Array1<f64>, EvaluationError>,
{
    let n = dy.len();
    let mut derivative = Array2::zeros((f0.len(), n));
    let mut perturbed = dy.to_owned();
    for j in 0..n {
        let h = perturbation_step(eta, dy[j]);
        perturbed[j] = dy[j] + h;
        let value = f(perturbed.view())?;
        derivative.column_mut(j).assign(&((&value - f0) / h));
        perturbed[j] = dy[j];
    }
    Ok(derivative)
}

/// `dΔy/dΔε = −J⁻¹·∂R/∂Δε`, with the factors of the converged jacobian
pub fn unknowns_sensitivity<S: ImplicitSystem + ?Sized>(
    system: &S,
    solution: &NewtonSolution,
    ctx: &StepContext,
    eta: f64,
) -> Result<Array2<f64>, EvaluationError> {
    let dy = solution.dy.view();
    let dr_de = match system.residual_driving_derivative(dy, ctx) {
        Some(derivative) => derivative?,
        None => {
            let r0 = system.residual(dy, ctx)?;
            driving_difference(ctx, &r0, eta, |c| system.residual(dy, c))?
        }
    };
    Ok(-solution.factors.solve_matrix(&dr_de))
}

/// Consistent tangent operator `dσ/dΔε = ∂σ/∂Δε + ∂σ/∂Δy·dΔy/dΔε`. No further
/// nonlinear solve is needed.
pub fn consistent_tangent<S: ImplicitSystem + ?Sized>(
    system: &S,
    solution: &NewtonSolution,
    ctx: &StepContext,
    eta: f64,
) -> Result<Array2<f64>, EvaluationError> {
    let dy = solution.dy.view();
    let sensitivity = unknowns_sensitivity(system, solution, ctx, eta)?;
    let (ds_de, ds_dy) = match system.stress_derivatives(dy, ctx) {
        Some(derivatives) => derivatives?,
        None => {
            let s0 = system.stress(dy, ctx)?;
            let ds_de = driving_difference(ctx, &s0, eta, |c| system.stress(dy, c))?;
            let ds_dy = unknowns_difference(dy, &s0, eta, |y| system.stress(y, ctx))?;
            (ds_de, ds_dy)
        }
    };
    let tangent = ds_de + ds_dy.dot(&sensitivity);
    if tangent.iter().all(|v| v.is_finite()) {
        Ok(tangent)
    } else {
        Err(EvaluationError::NonFinite("tangent operator"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integration::newton::{solve, NewtonSettings};
    use approx::assert_relative_eq;
    use ndarray::array;

    /// one dimensional linear viscoelasticity: `σ = E(ε + Δε − Δp)`, `Δp = k·dt·σ`
    struct Viscous {
        young: f64,
        k: f64,
    }

    impl Viscous {
        fn sigma(&self, dp: f64, ctx: &StepContext) -> f64 {
            self.young * (ctx.driving[0] + ctx.driving_increment[0] - dp)
        }
    }

    impl ImplicitSystem for Viscous {
        fn size(&self) -> usize {
            1
        }

        fn residual(&self, dy: ArrayView1<f64>, ctx: &StepContext) -> Result<Array1<f64>, EvaluationError> {
            Ok(array![dy[0] - self.k * ctx.dt * self.sigma(dy[0], ctx)])
        }

        fn stress(&self, dy: ArrayView1<f64>, ctx: &StepContext) -> Result<Array1<f64>, EvaluationError> {
            Ok(array![self.sigma(dy[0], ctx)])
        }
    }

    #[test]
    fn linear_tangent() {
        let system = Viscous { young: 200.0, k: 0.01 };
        let ctx = StepContext::new(0.5, array![0.0], array![0.001], array![0.002]);
        let solution = solve(&system, &ctx, &NewtonSettings::default()).unwrap();
        let tangent = consistent_tangent(&system, &solution, &ctx, 1e-7).unwrap();
        // dσ/dΔε = E / (1 + E·k·dt)
        let expected = 200.0 / (1.0 + 200.0 * 0.01 * 0.5);
        assert_relative_eq!(tangent[[0, 0]], expected, max_relative = 1e-5);
        let sensitivity = unknowns_sensitivity(&system, &solution, &ctx, 1e-7).unwrap();
        assert_relative_eq!(sensitivity[[0, 0]], 0.5, max_relative = 1e-5);
    }
}
