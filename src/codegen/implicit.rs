//! θ-method: a Newton-Raphson solve of the implicit system written by `@Integrator`,
//! the unknowns being the increments of the state variables.

use std::fmt::{self, Write};

use crate::behaviour::{increment_type, CodeBlockRole, JacobianMode, TypeFlag};

use super::layout::Slot;
use super::source::{write_block, write_export, write_final_stress, write_import};
use super::{pairs, Context, Member, Scheme, NEWTON_LOOP_HEADER};

pub(crate) struct ImplicitScheme;

const VECTOR: &str = "tfel::math::tvector<NUnknowns,real>";
const MATRIX: &str = "tfel::math::tmatrix<NUnknowns,NUnknowns,real>";
const SOLVER: &str = "tfel::math::TinyMatrixSolve<NUnknowns,real>";

/// `dfx_ddy` split into `x` and `y`
fn jacobian_term(name: &str) -> Option<(&str, &str)> {
    name.strip_prefix("df")?
        .split_once("_dd")
        .filter(|(f, x)| !f.is_empty() && !x.is_empty())
}

fn slot_type(slot: &Slot) -> String {
    let t = increment_type(&slot.type_name);
    if slot.array_size > 1 {
        format!("tfel::math::fsarray<{},{}>", slot.array_size, t)
    } else {
        t.to_string()
    }
}

fn is_scalar(slot: &Slot) -> bool {
    matches!(slot.flag, TypeFlag::Scalar | TypeFlag::Integer) && slot.array_size == 1
}

impl ImplicitScheme {
    fn numerical_jacobian(ctx: &Context<'_>) -> bool {
        ctx.bd.algorithm.jacobian == JacobianMode::Numerical
            || ctx
                .code_block(CodeBlockRole::Integrator)
                .is_some_and(|b| !b.requires_jacobian_update)
    }

    /// `getPartialJacobianInvert` is offered when the first unknown is a symmetric tensor
    fn partial_jacobian_invert(ctx: &Context<'_>) -> bool {
        let first = ctx.layout.unknowns().first();
        let used = ctx
            .code_block(CodeBlockRole::TangentOperator)
            .is_some_and(|b| b.references("getPartialJacobianInvert"));
        used && first.is_some_and(|s| s.flag == TypeFlag::Stensor && s.array_size == 1)
    }

    fn write_increments(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        let class = ctx.class_name();
        writeln!(out, "void {}::updateIncrements(){{", class)?;
        writeln!(out, "  const auto z = this->zeros.begin();")?;
        for slot in ctx.layout.unknowns() {
            write_import(out, "  ", slot, &format!("this->d{}", slot.name), "z")?;
        }
        writeln!(out, "}}")?;
        writeln!(out)?;
        writeln!(out, "void {}::packIncrements(){{", class)?;
        writeln!(out, "  const auto z = this->zeros.begin();")?;
        for slot in ctx.layout.unknowns() {
            write_export(out, "  ", slot, &format!("this->d{}", slot.name), "z")?;
        }
        writeln!(out, "}}")?;
        writeln!(out)
    }

    fn write_compute_stress(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        let translator = ctx
            .translator()
            .interpolating(pairs(&ctx.state_variables()), Some("this->theta"))
            .interpolating(pairs(&ctx.external_state_variables()), Some("this->theta"));
        writeln!(out, "void {}::computeStress(){{", ctx.class_name())?;
        write_block(out, &translator, ctx.code_block(CodeBlockRole::ComputeStress))?;
        writeln!(out, "}}")?;
        writeln!(out)
    }

    /// views on the residual and on the jacobian terms the integrator refers to
    fn write_views(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        let Some(block) = ctx.code_block(CodeBlockRole::Integrator) else {
            return Ok(());
        };
        for slot in ctx.layout.unknowns() {
            let name = format!("f{}", slot.name);
            if !block.references(&name) {
                continue;
            }
            if is_scalar(slot) {
                writeln!(out, "  real& {} = this->fzeros({});", name, slot.offset)?;
            } else {
                writeln!(
                    out,
                    "  auto {} = tfel::math::map<{},{}>(this->fzeros);",
                    name,
                    slot_type(slot),
                    slot.offset
                )?;
            }
        }
        for name in &block.referenced_names {
            let Some((f, x)) = jacobian_term(name) else {
                continue;
            };
            let (Some(sf), Some(sx)) = (ctx.layout.unknown(f), ctx.layout.unknown(x)) else {
                continue;
            };
            if sf.array_size > 1 || sx.array_size > 1 {
                continue;
            }
            if is_scalar(sf) && is_scalar(sx) {
                writeln!(out, "  real& {} = this->jacobian({},{});", name, sf.offset, sx.offset)?;
            } else {
                writeln!(
                    out,
                    "  auto {} = tfel::math::map_derivative<{},{},{},{}>(this->jacobian);",
                    name,
                    sf.offset,
                    sx.offset,
                    slot_type(sf),
                    slot_type(sx)
                )?;
            }
        }
        Ok(())
    }

    fn write_fdf(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        writeln!(out, "bool {}::computeFdF(){{", ctx.class_name())?;
        Self::write_views(ctx, out)?;
        write_block(out, &ctx.translator(), ctx.code_block(CodeBlockRole::Integrator))?;
        writeln!(out, "  return true;")?;
        writeln!(out, "}}")?;
        writeln!(out)
    }

    /// forward differences with a relative step
    fn write_numerical_jacobian(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        writeln!(out, "bool {}::computeNumericalJacobian({}& J){{", ctx.class_name(), MATRIX)?;
        writeln!(out, "  const {} z0 = this->zeros;", VECTOR)?;
        writeln!(out, "  const {} f0 = this->fzeros;", VECTOR)?;
        writeln!(out, "  bool success = true;")?;
        writeln!(out, "  for(unsigned short j=0;(success)&&(j!=NUnknowns);++j){{")?;
        writeln!(
            out,
            "    const real h = this->numerical_jacobian_epsilon*std::max(real(1),std::abs(z0(j)));"
        )?;
        writeln!(out, "    this->zeros = z0;")?;
        writeln!(out, "    this->zeros(j) += h;")?;
        writeln!(out, "    this->updateIncrements();")?;
        writeln!(out, "    this->computeStress();")?;
        writeln!(out, "    this->fzeros = this->zeros;")?;
        writeln!(out, "    success = this->computeFdF();")?;
        writeln!(out, "    for(unsigned short i=0;i!=NUnknowns;++i){{")?;
        writeln!(out, "      J(i,j) = (this->fzeros(i)-f0(i))/h;")?;
        writeln!(out, "    }}")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  this->zeros = z0;")?;
        writeln!(out, "  this->fzeros = f0;")?;
        writeln!(out, "  this->updateIncrements();")?;
        writeln!(out, "  this->computeStress();")?;
        writeln!(out, "  return success;")?;
        writeln!(out, "}}")?;
        writeln!(out)
    }

    fn write_newton(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        let class = ctx.class_name();
        let predictor = ctx.code_block(CodeBlockRole::Predictor);
        if predictor.is_some() {
            writeln!(out, "void {}::computePredictor(){{", class)?;
            write_block(out, &ctx.translator(), predictor)?;
            writeln!(out, "}}")?;
            writeln!(out)?;
        }
        writeln!(out, "bool {}::NewtonIntegration(){{", class)?;
        writeln!(out, "  bool converged = false;")?;
        writeln!(out, "  this->iter = 0;")?;
        writeln!(out, "  this->zeros = {}(real(0));", VECTOR)?;
        if predictor.is_some() {
            writeln!(out, "  this->computePredictor();")?;
            writeln!(out, "  this->packIncrements();")?;
        }
        writeln!(out, "  {}", NEWTON_LOOP_HEADER)?;
        writeln!(out, "    ++(this->iter);")?;
        writeln!(out, "    this->updateIncrements();")?;
        writeln!(out, "    this->computeStress();")?;
        writeln!(out, "    this->fzeros = this->zeros;")?;
        writeln!(out, "    for(unsigned short i=0;i!=NUnknowns;++i){{")?;
        writeln!(out, "      for(unsigned short j=0;j!=NUnknowns;++j){{")?;
        writeln!(out, "        this->jacobian(i,j) = (i==j) ? real(1) : real(0);")?;
        writeln!(out, "      }}")?;
        writeln!(out, "    }}")?;
        if let Some(block) = ctx.code_block(CodeBlockRole::InitializeJacobian) {
            writeln!(out, "    {{")?;
            write!(out, "{}", ctx.translator().translate(&block.body, "    "))?;
            writeln!(out, "    }}")?;
        }
        writeln!(out, "    if(!this->computeFdF()){{")?;
        writeln!(out, "      return false;")?;
        writeln!(out, "    }}")?;
        if Self::numerical_jacobian(ctx) {
            writeln!(out, "    if(!this->computeNumericalJacobian(this->jacobian)){{")?;
            writeln!(out, "      return false;")?;
            writeln!(out, "    }}")?;
        }
        writeln!(out, "    real error = real(0);")?;
        writeln!(out, "    for(unsigned short i=0;i!=NUnknowns;++i){{")?;
        writeln!(out, "      if(!std::isfinite(this->fzeros(i))){{")?;
        writeln!(out, "        return false;")?;
        writeln!(out, "      }}")?;
        writeln!(out, "      error = std::max(error,std::abs(this->fzeros(i)));")?;
        writeln!(out, "    }}")?;
        writeln!(out, "    converged = error<this->epsilon;")?;
        writeln!(out, "    if(converged){{")?;
        // factorized once, the tangent operator back-substitutes each column
        writeln!(out, "      this->tjacobian = this->jacobian;")?;
        writeln!(out, "      try{{")?;
        writeln!(out, "        {}::decomp(this->tjacobian,this->tpermutation);", SOLVER)?;
        writeln!(out, "      }} catch(...){{")?;
        writeln!(out, "        return false;")?;
        writeln!(out, "      }}")?;
        writeln!(out, "    }} else {{")?;
        writeln!(out, "      try{{")?;
        writeln!(out, "        {}::exe(this->jacobian,this->fzeros);", SOLVER)?;
        writeln!(out, "      }} catch(...){{")?;
        writeln!(out, "        return false;")?;
        writeln!(out, "      }}")?;
        writeln!(out, "      this->zeros -= this->fzeros;")?;
        writeln!(out, "    }}")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  return converged;")?;
        writeln!(out, "}}")?;
        writeln!(out)
    }

    fn write_user_tangent(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        let class = ctx.class_name();
        if Self::partial_jacobian_invert(ctx) {
            writeln!(out, "void {}::getPartialJacobianInvert(Stensor4& Je) const{{", class)?;
            writeln!(out, "  for(unsigned short j=0;j!=StensorSize;++j){{")?;
            writeln!(out, "    {} v(real(0));", VECTOR)?;
            writeln!(out, "    v(j) = real(1);")?;
            writeln!(out, "    {}::back_substitute(this->tjacobian,this->tpermutation,v);", SOLVER)?;
            writeln!(out, "    for(unsigned short i=0;i!=StensorSize;++i){{")?;
            writeln!(out, "      Je(i,j) = v(i);")?;
            writeln!(out, "    }}")?;
            writeln!(out, "  }}")?;
            writeln!(out, "}}")?;
            writeln!(out)?;
        }
        writeln!(out, "bool {}::computeConsistentTangentOperator(){{", class)?;
        writeln!(out, "  try{{")?;
        if let Some(block) = ctx.code_block(CodeBlockRole::TangentOperator) {
            write!(out, "{}", ctx.translator().translate(&block.body, "    "))?;
        }
        writeln!(out, "  }} catch(...){{")?;
        writeln!(out, "    return false;")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  return true;")?;
        writeln!(out, "}}")?;
        writeln!(out)
    }

    /// `Dt = ∂σ/∂Δε − ∂σ/∂Δy·J⁻¹·∂R/∂Δε`, every partial derivative by forward differences
    fn write_numerical_tangent(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        let class = ctx.class_name();
        writeln!(out, "bool {}::computeConsistentTangentOperator(){{", class)?;
        writeln!(out, "  const {} z0 = this->zeros;", VECTOR)?;
        writeln!(out, "  const StrainStensor deto0 = this->deto;")?;
        writeln!(out, "  this->updateIncrements();")?;
        writeln!(out, "  this->computeStress();")?;
        writeln!(out, "  this->fzeros = this->zeros;")?;
        writeln!(out, "  if(!this->computeFdF()){{")?;
        writeln!(out, "    return false;")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  const {} f0 = this->fzeros;", VECTOR)?;
        writeln!(out, "  this->computeFinalStress();")?;
        writeln!(out, "  const StressStensor s0 = this->sig;")?;
        writeln!(out, "  tfel::math::tmatrix<NUnknowns,StensorSize,real> dR_de;")?;
        writeln!(out, "  tfel::math::tmatrix<StensorSize,StensorSize,real> ds_de;")?;
        writeln!(out, "  tfel::math::tmatrix<StensorSize,NUnknowns,real> ds_dz;")?;
        writeln!(out, "  bool success = true;")?;
        writeln!(out, "  for(unsigned short j=0;(success)&&(j!=StensorSize);++j){{")?;
        writeln!(
            out,
            "    const real h = this->numerical_jacobian_epsilon*std::max(real(1),std::abs(deto0(j)));"
        )?;
        writeln!(out, "    this->deto = deto0;")?;
        writeln!(out, "    this->deto(j) += h;")?;
        writeln!(out, "    this->computeStress();")?;
        writeln!(out, "    this->fzeros = this->zeros;")?;
        writeln!(out, "    success = this->computeFdF();")?;
        writeln!(out, "    this->computeFinalStress();")?;
        writeln!(out, "    for(unsigned short i=0;i!=NUnknowns;++i){{")?;
        writeln!(out, "      dR_de(i,j) = (this->fzeros(i)-f0(i))/h;")?;
        writeln!(out, "    }}")?;
        writeln!(out, "    for(unsigned short i=0;i!=StensorSize;++i){{")?;
        writeln!(out, "      ds_de(i,j) = (this->sig(i)-s0(i))/h;")?;
        writeln!(out, "    }}")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  this->deto = deto0;")?;
        writeln!(out, "  for(unsigned short j=0;(success)&&(j!=NUnknowns);++j){{")?;
        writeln!(
            out,
            "    const real h = this->numerical_jacobian_epsilon*std::max(real(1),std::abs(z0(j)));"
        )?;
        writeln!(out, "    this->zeros = z0;")?;
        writeln!(out, "    this->zeros(j) += h;")?;
        writeln!(out, "    this->updateIncrements();")?;
        writeln!(out, "    this->computeFinalStress();")?;
        writeln!(out, "    for(unsigned short i=0;i!=StensorSize;++i){{")?;
        writeln!(out, "      ds_dz(i,j) = (this->sig(i)-s0(i))/h;")?;
        writeln!(out, "    }}")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  this->zeros = z0;")?;
        writeln!(out, "  this->updateIncrements();")?;
        writeln!(out, "  this->sig = s0;")?;
        writeln!(out, "  if(!success){{")?;
        writeln!(out, "    return false;")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  for(unsigned short j=0;j!=StensorSize;++j){{")?;
        writeln!(out, "    {} c;", VECTOR)?;
        writeln!(out, "    for(unsigned short i=0;i!=NUnknowns;++i){{")?;
        writeln!(out, "      c(i) = dR_de(i,j);")?;
        writeln!(out, "    }}")?;
        writeln!(out, "    try{{")?;
        writeln!(out, "      {}::back_substitute(this->tjacobian,this->tpermutation,c);", SOLVER)?;
        writeln!(out, "    }} catch(...){{")?;
        writeln!(out, "      return false;")?;
        writeln!(out, "    }}")?;
        writeln!(out, "    for(unsigned short i=0;i!=StensorSize;++i){{")?;
        writeln!(out, "      real v = ds_de(i,j);")?;
        writeln!(out, "      for(unsigned short k=0;k!=NUnknowns;++k){{")?;
        writeln!(out, "        v -= ds_dz(i,k)*c(k);")?;
        writeln!(out, "      }}")?;
        writeln!(out, "      if(!std::isfinite(v)){{")?;
        writeln!(out, "        return false;")?;
        writeln!(out, "      }}")?;
        writeln!(out, "      this->Dt(i,j) = v;")?;
        writeln!(out, "    }}")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  return true;")?;
        writeln!(out, "}}")?;
        writeln!(out)
    }
}

impl Scheme for ImplicitScheme {
    fn members(&self, ctx: &Context<'_>) -> Vec<Member> {
        vec![
            Member::constant("unsigned short", "NUnknowns", ctx.layout.unknowns_size()),
            Member::new(VECTOR, "zeros"),
            Member::new(VECTOR, "fzeros"),
            Member::new(MATRIX, "jacobian"),
            // LU factors of the jacobian at convergence
            Member::new(MATRIX, "tjacobian"),
            Member::new("tfel::math::TinyPermutation<NUnknowns>", "tpermutation"),
            Member::new("int", "iter"),
        ]
    }

    fn declarations(&self, ctx: &Context<'_>) -> Vec<String> {
        let mut declarations = vec![
            "void updateIncrements();".to_string(),
            "void packIncrements();".to_string(),
            "void computeStress();".to_string(),
            "bool computeFdF();".to_string(),
            "bool NewtonIntegration();".to_string(),
        ];
        if Self::numerical_jacobian(ctx) {
            declarations.push(format!("bool computeNumericalJacobian({}&);", MATRIX));
        }
        if ctx.code_block(CodeBlockRole::Predictor).is_some() {
            declarations.push("void computePredictor();".to_string());
        }
        if Self::partial_jacobian_invert(ctx) {
            declarations.push("void getPartialJacobianInvert(Stensor4&) const;".to_string());
        }
        declarations
    }

    fn write_definitions(&self, ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        Self::write_increments(ctx, out)?;
        Self::write_compute_stress(ctx, out)?;
        Self::write_fdf(ctx, out)?;
        if Self::numerical_jacobian(ctx) {
            Self::write_numerical_jacobian(ctx, out)?;
        }
        Self::write_newton(ctx, out)?;
        writeln!(out, "bool {}::solveSubStep(){{", ctx.class_name())?;
        writeln!(out, "  return this->NewtonIntegration();")?;
        writeln!(out, "}}")?;
        writeln!(out)?;
        write_final_stress(ctx, out)?;
        if ctx.code_block(CodeBlockRole::TangentOperator).is_some() {
            Self::write_user_tangent(ctx, out)
        } else {
            Self::write_numerical_tangent(ctx, out)
        }
    }
}
