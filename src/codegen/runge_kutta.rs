//! Explicit Runge-Kutta schemes: `@Derivative` gives the rates of the state variables,
//! which are integrated over the sub-step without any Newton-Raphson loop.

use std::fmt::{self, Write};

use crate::behaviour::{CodeBlockRole, RungeKuttaMethod};

use super::source::{write_block, write_export, write_final_stress, write_import};
use super::{pairs, Context, Member, Scheme, Translator};

pub(crate) struct RungeKuttaScheme {
    pub method: RungeKuttaMethod,
}

const STATE: &str = "tfel::math::tvector<NStates,real>";

/// `y+(h)*k`, element by element
fn write_axpy(out: &mut String, target: &str, y: &str, h: &str, k: &str) -> fmt::Result {
    writeln!(out, "  {} {};", STATE, target)?;
    writeln!(out, "  for(unsigned short i=0;i!=NStates;++i){{")?;
    writeln!(out, "    {}(i) = {}(i)+({})*{}(i);", target, y, h, k)?;
    writeln!(out, "  }}")
}

fn write_rates(out: &mut String, y: &str, t: &str, k: &str) -> fmt::Result {
    writeln!(out, "  {} {};", STATE, k)?;
    writeln!(out, "  if(!this->computeRates({},{},{})){{", y, t, k)?;
    writeln!(out, "    return false;")?;
    writeln!(out, "  }}")
}

impl RungeKuttaScheme {
    /// the derivative block sees the external state variables and the total strain at
    /// the current fraction `tau` of the sub-step, their increments as rates
    fn derivative_translator(ctx: &Context<'_>) -> Translator {
        let esvs = ctx.external_state_variables();
        let mut translator = ctx
            .translator()
            .interpolating(pairs(&esvs), Some("this->tau"))
            .interpolating([("eto", "deto")], Some("this->tau"))
            .replace("deto", "(this->deto/this->dt)".to_string());
        for (_, increment) in &esvs {
            translator = translator.replace(increment, format!("(this->{}/this->dt)", increment));
        }
        translator
    }

    fn write_packing(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        let class = ctx.class_name();
        // (function, prefix of the members, copy into the array)
        let functions = [
            ("packState", "", true),
            ("unpackState", "", false),
            ("packIncrements", "d", true),
            ("unpackIncrements", "d", false),
        ];
        for (function, prefix, export) in functions {
            if export {
                writeln!(out, "void {}::{}({}& y) const{{", class, function, STATE)?;
                writeln!(out, "  auto a = y.begin();")?;
            } else {
                writeln!(out, "void {}::{}(const {}& y){{", class, function, STATE)?;
                writeln!(out, "  const auto a = y.begin();")?;
            }
            for slot in ctx.layout.unknowns() {
                let member = format!("this->{}{}", prefix, slot.name);
                if export {
                    write_export(out, "  ", slot, &member, "a")?;
                } else {
                    write_import(out, "  ", slot, &member, "a")?;
                }
            }
            writeln!(out, "}}")?;
            writeln!(out)?;
        }
        Ok(())
    }

    fn write_compute_rates(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        let class = ctx.class_name();
        let esvs = ctx.external_state_variables();
        let stress = ctx
            .translator()
            .interpolating(pairs(&esvs), Some("this->tau"))
            .interpolating([("eto", "deto")], Some("this->tau"));
        writeln!(out, "void {}::computeStress(){{", class)?;
        write_block(out, &stress, ctx.code_block(CodeBlockRole::ComputeStress))?;
        writeln!(out, "}}")?;
        writeln!(out)?;
        writeln!(out, "void {}::computeDerivative(){{", class)?;
        write_block(
            out,
            &Self::derivative_translator(ctx),
            ctx.code_block(CodeBlockRole::ComputeDerivative),
        )?;
        writeln!(out, "}}")?;
        writeln!(out)?;
        writeln!(
            out,
            "bool {}::computeRates(const {s}& y,const real t,{s}& k){{",
            class,
            s = STATE
        )?;
        writeln!(out, "  {} y0;", STATE)?;
        writeln!(out, "  {} dy0;", STATE)?;
        writeln!(out, "  this->packState(y0);")?;
        writeln!(out, "  this->packIncrements(dy0);")?;
        writeln!(out, "  this->unpackState(y);")?;
        writeln!(out, "  this->tau = t;")?;
        writeln!(out, "  this->computeStress();")?;
        writeln!(out, "  this->computeDerivative();")?;
        writeln!(out, "  this->packIncrements(k);")?;
        writeln!(out, "  this->unpackState(y0);")?;
        writeln!(out, "  this->unpackIncrements(dy0);")?;
        writeln!(out, "  for(unsigned short i=0;i!=NStates;++i){{")?;
        writeln!(out, "    if(!std::isfinite(k(i))){{")?;
        writeln!(out, "      return false;")?;
        writeln!(out, "    }}")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  return true;")?;
        writeln!(out, "}}")?;
        writeln!(out)
    }

    fn write_solve(&self, ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        writeln!(out, "bool {}::solveSubStep(){{", ctx.class_name())?;
        writeln!(out, "  {} y;", STATE)?;
        writeln!(out, "  this->packState(y);")?;
        writeln!(out, "  const real h = this->dt;")?;
        write_rates(out, "y", "real(0)", "k1")?;
        match self.method {
            RungeKuttaMethod::Euler => {
                write_axpy(out, "yn", "y", "h", "k1")?;
            }
            RungeKuttaMethod::Rk2 => {
                write_axpy(out, "y2", "y", "real(0.5)*h", "k1")?;
                write_rates(out, "y2", "real(0.5)", "k2")?;
                write_axpy(out, "yn", "y", "h", "k2")?;
            }
            RungeKuttaMethod::Rk4 | RungeKuttaMethod::Rk42 => {
                write_axpy(out, "y2", "y", "real(0.5)*h", "k1")?;
                write_rates(out, "y2", "real(0.5)", "k2")?;
                write_axpy(out, "y3", "y", "real(0.5)*h", "k2")?;
                write_rates(out, "y3", "real(0.5)", "k3")?;
                write_axpy(out, "y4", "y", "h", "k3")?;
                write_rates(out, "y4", "real(1)", "k4")?;
                writeln!(out, "  {} yn;", STATE)?;
                writeln!(out, "  for(unsigned short i=0;i!=NStates;++i){{")?;
                writeln!(
                    out,
                    "    yn(i) = y(i)+h/real(6)*(k1(i)+real(2)*(k2(i)+k3(i))+k4(i));"
                )?;
                writeln!(out, "  }}")?;
            }
        }
        if self.method == RungeKuttaMethod::Rk42 {
            // the midpoint estimate shares its rates with the fourth order one
            writeln!(out, "  real error = real(0);")?;
            writeln!(out, "  for(unsigned short i=0;i!=NStates;++i){{")?;
            writeln!(out, "    error = std::max(error,std::abs(yn(i)-(y(i)+h*k2(i))));")?;
            writeln!(out, "  }}")?;
            writeln!(out, "  if(!(error<=this->epsilon)){{")?;
            writeln!(out, "    return false;")?;
            writeln!(out, "  }}")?;
        }
        writeln!(out, "  for(unsigned short i=0;i!=NStates;++i){{")?;
        writeln!(out, "    yn(i) -= y(i);")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  this->unpackIncrements(yn);")?;
        writeln!(out, "  return true;")?;
        writeln!(out, "}}")?;
        writeln!(out)
    }

    /// forward differences of the final stress, the sub-step being integrated again for
    /// each perturbed component of the strain increment
    fn write_tangent(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        writeln!(out, "bool {}::computeConsistentTangentOperator(){{", ctx.class_name())?;
        writeln!(out, "  const StrainStensor deto0 = this->deto;")?;
        writeln!(out, "  {} dy0;", STATE)?;
        writeln!(out, "  this->packIncrements(dy0);")?;
        writeln!(out, "  this->computeFinalStress();")?;
        writeln!(out, "  const StressStensor s0 = this->sig;")?;
        writeln!(out, "  bool success = true;")?;
        writeln!(out, "  for(unsigned short j=0;(success)&&(j!=StensorSize);++j){{")?;
        writeln!(
            out,
            "    const real h = this->numerical_jacobian_epsilon*std::max(real(1),std::abs(deto0(j)));"
        )?;
        writeln!(out, "    this->deto = deto0;")?;
        writeln!(out, "    this->deto(j) += h;")?;
        writeln!(out, "    success = this->solveSubStep();")?;
        writeln!(out, "    this->computeFinalStress();")?;
        writeln!(out, "    for(unsigned short i=0;i!=StensorSize;++i){{")?;
        writeln!(out, "      this->Dt(i,j) = (this->sig(i)-s0(i))/h;")?;
        writeln!(out, "      success = (success)&&(std::isfinite(this->Dt(i,j)));")?;
        writeln!(out, "    }}")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  this->deto = deto0;")?;
        writeln!(out, "  this->unpackIncrements(dy0);")?;
        writeln!(out, "  this->sig = s0;")?;
        writeln!(out, "  return success;")?;
        writeln!(out, "}}")?;
        writeln!(out)
    }
}

impl Scheme for RungeKuttaScheme {
    fn members(&self, ctx: &Context<'_>) -> Vec<Member> {
        vec![
            Member::constant("unsigned short", "NStates", ctx.layout.unknowns_size()),
            Member::new("real", "tau"),
        ]
    }

    fn declarations(&self, _ctx: &Context<'_>) -> Vec<String> {
        vec![
            format!("void packState({}&) const;", STATE),
            format!("void unpackState(const {}&);", STATE),
            format!("void packIncrements({}&) const;", STATE),
            format!("void unpackIncrements(const {}&);", STATE),
            "void computeStress();".to_string(),
            "void computeDerivative();".to_string(),
            format!("bool computeRates(const {s}&,const real,{s}&);", s = STATE),
        ]
    }

    fn write_definitions(&self, ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        Self::write_packing(ctx, out)?;
        Self::write_compute_rates(ctx, out)?;
        self.write_solve(ctx, out)?;
        write_final_stress(ctx, out)?;
        Self::write_tangent(ctx, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::ModellingHypothesis;
    use crate::codegen::{generate, NEWTON_LOOP_HEADER, SUB_STEPPING_LOOP_HEADER};
    use crate::parser::parse_mfront_string;
    use crate::registry::Registry;

    const NORTON: &str = r#"
@DSL RungeKutta;
@Behaviour Norton;
@Algorithm rk42;
@MaterialProperty stress young;
@MaterialProperty real nu;
@Parameter A = 1.e-20;
@ExternalStateVariable real phi;
@StateVariable StrainStensor eel;
@StateVariable strain p;
@LocalVariable stress lambda;
@LocalVariable stress mu;
@InitLocalVariables {
  lambda = young*nu/((1+nu)*(1-2*nu));
  mu = young/(2*(1+nu));
}
@ComputeStress {
  sig = lambda*trace(eel)*Stensor::Id()+2*mu*eel;
}
@Derivative {
  const real seq = sigmaeq(sig);
  dp = A*pow(seq,3)*(1+phi)*T;
  deel = deto - dp*eto;
}
"#;

    fn source(text: &str) -> String {
        let registry = Registry::new();
        let bd = parse_mfront_string(text, &registry).unwrap();
        generate(&bd, ModellingHypothesis::Tridimensional, "generic", &registry)
            .unwrap()
            .source
    }

    #[test]
    fn no_newton_loop() {
        let s = source(NORTON);
        assert_eq!(s.matches(NEWTON_LOOP_HEADER).count(), 0);
        assert_eq!(s.matches(SUB_STEPPING_LOOP_HEADER).count(), 1);
        assert!(s.contains("bool Norton::computeRates("));
        assert!(s.contains("  this->computeStress();\n  this->computeDerivative();"));
    }

    #[test]
    fn rates_at_the_current_time() {
        let s = source(NORTON);
        assert!(s.contains("(1 + (this->phi+(this->tau)*(this->dphi))) * (this->T+(this->tau)*(this->dT));"));
        assert!(s.contains("this->deel = (this->deto/this->dt) - this->dp * (this->eto+(this->tau)*(this->deto));"));
    }

    #[test]
    fn embedded_error_estimate() {
        let s = source(NORTON);
        assert!(s.contains("error = std::max(error,std::abs(yn(i)-(y(i)+h*k2(i))));"));
        let euler = source(&NORTON.replace("rk42", "euler"));
        assert!(!euler.contains("k2"));
        assert!(euler.contains("yn(i) = y(i)+(h)*k1(i);"));
    }

    #[test]
    fn state_packing() {
        let s = source(NORTON);
        assert!(s.contains("std::copy(this->eel.begin(),this->eel.end(),a+0);"));
        assert!(s.contains("this->dp = a[6];"));
    }
}
