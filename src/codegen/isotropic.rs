//! Radial return for isotropic materials following a von Mises flow: the only unknown
//! is the increment of the equivalent strain, each flow giving one scalar equation.

use std::fmt::{self, Write};

use crate::behaviour::{AlgorithmKind, CodeBlockRole, FlowKind};

use super::source::write_block;
use super::{pairs, Context, Member, Scheme, Translator, NEWTON_LOOP_HEADER};

pub(crate) struct IsotropicScheme {
    pub kind: AlgorithmKind,
}

/// the role and the kind of each flow of the behaviour
fn flows(ctx: &Context<'_>, kind: AlgorithmKind) -> Vec<(CodeBlockRole, FlowKind)> {
    match kind {
        AlgorithmKind::MultipleIsotropicMisesFlows => (0..ctx.bd.number_of_flows())
            .map(|i| {
                let role = CodeBlockRole::Flow(i);
                let flow = ctx
                    .code_block(role)
                    .and_then(|b| b.flow)
                    .unwrap_or(FlowKind::Creep);
                (role, flow)
            })
            .collect(),
        AlgorithmKind::IsotropicMisesPlasticFlow => vec![(CodeBlockRole::FlowRule, FlowKind::Plasticity)],
        AlgorithmKind::IsotropicStrainHardeningMisesCreep => {
            vec![(CodeBlockRole::FlowRule, FlowKind::StrainHardeningCreep)]
        }
        _ => vec![(CodeBlockRole::FlowRule, FlowKind::Creep)],
    }
}

/// the residual of one flow and its derivative with respect to the equivalent strain
/// increments, `dp` standing for the increment of the flow
fn residual(flow: FlowKind, dp: &str) -> (String, String) {
    match flow {
        FlowKind::Creep => (
            format!("{}-this->f*this->dt", dp),
            "3*this->mu*this->theta*this->df_dseq*this->dt".to_string(),
        ),
        FlowKind::StrainHardeningCreep => (
            format!("{}-this->f*this->dt", dp),
            "-(this->theta)*(this->dt)*(this->df_dp-3*this->mu*this->df_dseq)".to_string(),
        ),
        FlowKind::Plasticity => (
            "this->f/this->young".to_string(),
            "(this->theta)*(this->df_dp-3*this->mu*this->df_dseq)/this->young".to_string(),
        ),
    }
}

/// derivative of the residual of one flow with respect to the elastic prediction of the
/// equivalent stress
fn residual_seq_e_derivative(flow: FlowKind) -> &'static str {
    match flow {
        FlowKind::Creep | FlowKind::StrainHardeningCreep => "-(this->df_dseq)*(this->dt)",
        FlowKind::Plasticity => "this->df_dseq/this->young",
    }
}

impl IsotropicScheme {
    fn multiple(&self) -> bool {
        self.kind == AlgorithmKind::MultipleIsotropicMisesFlows
    }

    fn flow_translator(ctx: &Context<'_>) -> Translator {
        ctx.translator()
            .mid_point_names(pairs(&ctx.state_variables()))
            .mid_point_names(pairs(&ctx.external_state_variables()))
    }

    fn write_flows(&self, ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        let translator = Self::flow_translator(ctx);
        for (role, _) in flows(ctx, self.kind) {
            writeln!(out, "void {}::{}(){{", ctx.class_name(), role.function_name())?;
            write_block(out, &translator, ctx.code_block(role))?;
            writeln!(out, "}}")?;
            writeln!(out)?;
        }
        Ok(())
    }

    fn write_prediction(out: &mut String) -> fmt::Result {
        writeln!(
            out,
            "  this->se = 2*(this->mu)*tfel::math::deviator(this->eel+(this->theta)*(this->deto));"
        )?;
        writeln!(out, "  this->seq_e = sigmaeq(this->se);")?;
        writeln!(
            out,
            "  if(this->seq_e>100*std::numeric_limits<real>::epsilon()*(this->young)){{"
        )?;
        writeln!(out, "    this->n = 1.5*(this->se)/(this->seq_e);")?;
        writeln!(out, "  }} else {{")?;
        writeln!(out, "    this->n = Stensor(real(0));")?;
        writeln!(out, "  }}")
    }

    fn write_single_flow(&self, ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        let Some((role, flow)) = flows(ctx, self.kind).into_iter().next() else {
            return Ok(());
        };
        let compute = role.function_name();
        let (f, df) = residual(flow, "this->dp");
        writeln!(out, "bool {}::solveSubStep(){{", ctx.class_name())?;
        Self::write_prediction(out)?;
        writeln!(out, "  this->dp = real(0);")?;
        writeln!(out, "  bool converged = false;")?;
        writeln!(out, "  this->iter = 0;")?;
        if flow == FlowKind::Plasticity {
            writeln!(out, "  this->seq = this->seq_e;")?;
            writeln!(out, "  this->{}();", compute)?;
            writeln!(out, "  converged = this->f<=real(0);")?;
        }
        writeln!(out, "  {}", NEWTON_LOOP_HEADER)?;
        writeln!(out, "    ++(this->iter);")?;
        writeln!(
            out,
            "    this->seq = std::max(this->seq_e-3*(this->mu)*(this->theta)*(this->dp),real(0));"
        )?;
        writeln!(out, "    this->{}();", compute)?;
        writeln!(out, "    this->newton_f = {};", f)?;
        if flow == FlowKind::Plasticity {
            writeln!(out, "    this->newton_df = {};", df)?;
        } else {
            writeln!(out, "    this->newton_df = 1+{};", df)?;
        }
        writeln!(
            out,
            "    if((!std::isfinite(this->newton_f))||(!std::isfinite(this->newton_df))||\
             (std::abs(this->newton_df)<std::numeric_limits<real>::min())){{"
        )?;
        writeln!(out, "      return false;")?;
        writeln!(out, "    }}")?;
        writeln!(out, "    const real ddp = -(this->newton_f)/(this->newton_df);")?;
        writeln!(out, "    this->dp += ddp;")?;
        writeln!(out, "    converged = std::abs(ddp)<this->epsilon;")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  if(!converged){{")?;
        writeln!(out, "    return false;")?;
        writeln!(out, "  }}")?;
        writeln!(
            out,
            "  this->seq = std::max(this->seq_e-3*(this->mu)*(this->theta)*(this->dp),real(0));"
        )?;
        writeln!(out, "  this->deel = this->deto-(this->dp)*(this->n);")?;
        writeln!(out, "  return true;")?;
        writeln!(out, "}}")?;
        writeln!(out)
    }

    fn write_multiple_flows(&self, ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        let flows = flows(ctx, self.kind);
        writeln!(out, "bool {}::solveSubStep(){{", ctx.class_name())?;
        Self::write_prediction(out)?;
        writeln!(out, "  this->dps = tfel::math::tvector<NFlows,real>(real(0));")?;
        writeln!(out, "  this->dp = real(0);")?;
        writeln!(out, "  this->seq = this->seq_e;")?;
        for (i, (role, flow)) in flows.iter().enumerate() {
            if *flow == FlowKind::Plasticity {
                writeln!(out, "  this->{}();", role.function_name())?;
                writeln!(out, "  this->active[{}] = this->f>real(0);", i)?;
            } else {
                writeln!(out, "  this->active[{}] = true;", i)?;
            }
        }
        writeln!(out, "  bool converged = false;")?;
        writeln!(out, "  this->iter = 0;")?;
        writeln!(out, "  {}", NEWTON_LOOP_HEADER)?;
        writeln!(out, "    ++(this->iter);")?;
        writeln!(
            out,
            "    this->seq = std::max(this->seq_e-3*(this->mu)*(this->theta)*(this->dp),real(0));"
        )?;
        for (i, (role, flow)) in flows.iter().enumerate() {
            let (f, df) = residual(*flow, &format!("this->dps({})", i));
            writeln!(out, "    if(this->active[{}]){{", i)?;
            writeln!(out, "      this->{}();", role.function_name())?;
            writeln!(out, "      this->newton_fs({}) = {};", i, f)?;
            writeln!(out, "      for(unsigned short j=0;j!=NFlows;++j){{")?;
            if *flow == FlowKind::Plasticity {
                writeln!(out, "        this->newton_dfs({},j) = {};", i, df)?;
            } else {
                writeln!(out, "        this->newton_dfs({},j) = (j=={} ? real(1) : real(0))+{};", i, i, df)?;
            }
            writeln!(out, "      }}")?;
            writeln!(out, "    }} else {{")?;
            writeln!(out, "      this->newton_fs({i}) = this->dps({i});", i = i)?;
            writeln!(out, "      for(unsigned short j=0;j!=NFlows;++j){{")?;
            writeln!(out, "        this->newton_dfs({},j) = (j=={} ? real(1) : real(0));", i, i)?;
            writeln!(out, "      }}")?;
            writeln!(out, "    }}")?;
        }
        writeln!(out, "    for(unsigned short i=0;i!=NFlows;++i){{")?;
        writeln!(out, "      if(!std::isfinite(this->newton_fs(i))){{")?;
        writeln!(out, "        return false;")?;
        writeln!(out, "      }}")?;
        writeln!(out, "    }}")?;
        writeln!(out, "    try{{")?;
        writeln!(out, "      tfel::math::TinyMatrixSolve<NFlows,real>::exe(this->newton_dfs,this->newton_fs);")?;
        writeln!(out, "    }} catch(...){{")?;
        writeln!(out, "      return false;")?;
        writeln!(out, "    }}")?;
        writeln!(out, "    real error = real(0);")?;
        writeln!(out, "    this->dp = real(0);")?;
        writeln!(out, "    for(unsigned short i=0;i!=NFlows;++i){{")?;
        writeln!(out, "      this->dps(i) -= this->newton_fs(i);")?;
        writeln!(out, "      this->dp += this->dps(i);")?;
        writeln!(out, "      error = std::max(error,std::abs(this->newton_fs(i)));")?;
        writeln!(out, "    }}")?;
        writeln!(out, "    converged = error<this->epsilon;")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  if(!converged){{")?;
        writeln!(out, "    return false;")?;
        writeln!(out, "  }}")?;
        writeln!(
            out,
            "  this->seq = std::max(this->seq_e-3*(this->mu)*(this->theta)*(this->dp),real(0));"
        )?;
        writeln!(out, "  this->deel = this->deto-(this->dp)*(this->n);")?;
        writeln!(out, "  return true;")?;
        writeln!(out, "}}")?;
        writeln!(out)
    }

    /// `dp_dseq_e`, the derivative of the equivalent strain increment with respect to
    /// the elastic prediction of the equivalent stress, for a single flow
    fn write_single_sensitivity(&self, ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        let Some((_, flow)) = flows(ctx, self.kind).into_iter().next() else {
            return Ok(());
        };
        if flow == FlowKind::Plasticity {
            writeln!(out, "  if(this->dp<=real(0)){{")?;
            writeln!(out, "    this->Dt = De;")?;
            writeln!(out, "    return true;")?;
            writeln!(out, "  }}")?;
        }
        writeln!(
            out,
            "  const real dp_dseq_e = -({})/(this->newton_df);",
            residual_seq_e_derivative(flow)
        )
    }

    fn write_multiple_sensitivity(&self, ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        let flows = flows(ctx, self.kind);
        writeln!(out, "  tfel::math::tvector<NFlows,real> b(real(0));")?;
        writeln!(out, "  tfel::math::tmatrix<NFlows,NFlows,real> A;")?;
        for (i, (role, flow)) in flows.iter().enumerate() {
            let (_, df) = residual(*flow, "");
            writeln!(out, "  if(this->active[{}]){{", i)?;
            writeln!(out, "    this->{}();", role.function_name())?;
            writeln!(out, "    b({}) = -({});", i, residual_seq_e_derivative(*flow))?;
            writeln!(out, "    for(unsigned short j=0;j!=NFlows;++j){{")?;
            if *flow == FlowKind::Plasticity {
                writeln!(out, "      A({},j) = {};", i, df)?;
            } else {
                writeln!(out, "      A({},j) = (j=={} ? real(1) : real(0))+{};", i, i, df)?;
            }
            writeln!(out, "    }}")?;
            writeln!(out, "  }} else {{")?;
            writeln!(out, "    for(unsigned short j=0;j!=NFlows;++j){{")?;
            writeln!(out, "      A({},j) = (j=={} ? real(1) : real(0));", i, i)?;
            writeln!(out, "    }}")?;
            writeln!(out, "  }}")?;
        }
        writeln!(out, "  try{{")?;
        writeln!(out, "    tfel::math::TinyMatrixSolve<NFlows,real>::exe(A,b);")?;
        writeln!(out, "  }} catch(...){{")?;
        writeln!(out, "    return false;")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  real dp_dseq_e = real(0);")?;
        writeln!(out, "  for(unsigned short i=0;i!=NFlows;++i){{")?;
        writeln!(out, "    dp_dseq_e += b(i);")?;
        writeln!(out, "  }}")
    }

    /// `Dt = De − 4μ²θ(dp/dseq_e n⊗n + Δp/seq_e (3/2 K − n⊗n))`
    fn write_tangent(&self, ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        writeln!(out, "bool {}::computeConsistentTangentOperator(){{", ctx.class_name())?;
        writeln!(
            out,
            "  const Stensor4 De = (this->lambda)*Stensor4::IxI()+2*(this->mu)*Stensor4::Id();"
        )?;
        writeln!(
            out,
            "  if((this->smt==ELASTIC)||(this->seq_e<100*std::numeric_limits<real>::epsilon()*(this->young))){{"
        )?;
        writeln!(out, "    this->Dt = De;")?;
        writeln!(out, "    return true;")?;
        writeln!(out, "  }}")?;
        if self.multiple() {
            self.write_multiple_sensitivity(ctx, out)?;
        } else {
            self.write_single_sensitivity(ctx, out)?;
        }
        writeln!(out, "  const Stensor4 nn = (this->n)^(this->n);")?;
        writeln!(
            out,
            "  this->Dt = De-4*(this->mu)*(this->mu)*(this->theta)*\
             (dp_dseq_e*nn+(this->dp)/(this->seq_e)*(real(3)/real(2)*Stensor4::K()-nn));"
        )?;
        writeln!(out, "  for(unsigned short i=0;i!=StensorSize;++i){{")?;
        writeln!(out, "    for(unsigned short j=0;j!=StensorSize;++j){{")?;
        writeln!(out, "      if(!std::isfinite(this->Dt(i,j))){{")?;
        writeln!(out, "        return false;")?;
        writeln!(out, "      }}")?;
        writeln!(out, "    }}")?;
        writeln!(out, "  }}")?;
        writeln!(out, "  return true;")?;
        writeln!(out, "}}")?;
        writeln!(out)
    }
}

impl Scheme for IsotropicScheme {
    fn members(&self, ctx: &Context<'_>) -> Vec<Member> {
        let mut members = vec![
            Member::new("StressStensor", "se"),
            Member::new("Stensor", "n"),
            Member::new("stress", "seq"),
            Member::new("stress", "seq_e"),
            Member::new("real", "f"),
            Member::new("real", "df_dseq"),
            Member::new("real", "df_dp"),
            Member::new("int", "iter"),
        ];
        if self.multiple() {
            members.extend([
                Member::constant("unsigned short", "NFlows", ctx.bd.number_of_flows()),
                Member::new("tfel::math::tvector<NFlows,real>", "dps"),
                Member::new("tfel::math::tvector<NFlows,real>", "newton_fs"),
                Member::new("tfel::math::tmatrix<NFlows,NFlows,real>", "newton_dfs"),
                Member::new("bool", "active[NFlows]"),
            ]);
        } else {
            members.extend([Member::new("real", "newton_f"), Member::new("real", "newton_df")]);
        }
        members
    }

    fn declarations(&self, ctx: &Context<'_>) -> Vec<String> {
        flows(ctx, self.kind)
            .iter()
            .map(|(role, _)| format!("void {}();", role.function_name()))
            .collect()
    }

    fn write_initialisation(&self, _ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        writeln!(
            out,
            "  this->lambda = (this->young)*(this->nu)/((1+this->nu)*(1-2*(this->nu)));"
        )?;
        writeln!(out, "  this->mu = (this->young)/(2*(1+this->nu));")
    }

    fn write_definitions(&self, ctx: &Context<'_>, out: &mut String) -> fmt::Result {
        self.write_flows(ctx, out)?;
        if self.multiple() {
            self.write_multiple_flows(ctx, out)?;
        } else {
            self.write_single_flow(ctx, out)?;
        }
        writeln!(out, "void {}::computeFinalStress(){{", ctx.class_name())?;
        writeln!(
            out,
            "  this->sig = (this->lambda)*trace(this->eel+this->deel)*Stensor::Id()+2*(this->mu)*(this->eel+this->deel);"
        )?;
        writeln!(out, "}}")?;
        writeln!(out)?;
        self.write_tangent(ctx, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::ModellingHypothesis;
    use crate::codegen::generate;
    use crate::parser::parse_mfront_string;
    use crate::registry::Registry;

    fn source(text: &str) -> String {
        let registry = Registry::new();
        let bd = parse_mfront_string(text, &registry).unwrap();
        generate(&bd, ModellingHypothesis::Tridimensional, "null", &registry)
            .unwrap()
            .source
    }

    #[test]
    fn creep() {
        let s = source(
            "@DSL IsotropicMisesCreep; @Behaviour Norton; @MaterialProperty real A;\
             @FlowRule { f = A*pow(seq,3); df_dseq = 3*A*seq*seq; }",
        );
        assert!(s.contains("this->newton_f = this->dp-this->f*this->dt;"));
        assert!(s.contains("void Norton::computeFlow(){"));
        assert!(s.contains("this->f = this->A * pow(this->seq, 3);"));
        assert!(s.contains("this->lambda = (this->young)*(this->nu)"));
        assert_eq!(s.matches(NEWTON_LOOP_HEADER).count(), 1);
    }

    #[test]
    fn plasticity_starts_with_an_elastic_check() {
        let s = source(
            "@DSL IsotropicMisesPlasticFlow; @Behaviour Plasticity; @Parameter s0 = 200e6;\
             @Parameter H = 1e9; @FlowRule { f = seq - s0 - H*p_; df_dseq = 1; df_dp = -H; }",
        );
        assert!(s.contains("converged = this->f<=real(0);"));
        assert!(s.contains("this->newton_f = this->f/this->young;"));
        assert!(s.contains("this->f = this->seq - this->s0 - this->H * (this->p+(this->theta)*(this->dp));"));
        assert!(s.contains("if(this->dp<=real(0)){"));
    }

    #[test]
    fn multiple_flows() {
        let s = source(
            "@DSL MultipleIsotropicMisesFlows; @Behaviour TwoFlows; @MaterialProperty real A;\
             @FlowRule Creep { f = A*seq; df_dseq = A; }\
             @FlowRule Plasticity { f = seq - 1e8; df_dseq = 1; df_dp = 0; }",
        );
        assert!(s.contains("void TwoFlows::computeFlow0(){"));
        assert!(s.contains("void TwoFlows::computeFlow1(){"));
        assert!(s.contains("this->newton_fs(0) = this->dps(0)-this->f*this->dt;"));
        assert!(s.contains("this->newton_fs(1) = this->f/this->young;"));
        assert!(s.contains("TinyMatrixSolve<NFlows,real>::exe(this->newton_dfs,this->newton_fs);"));
        assert_eq!(s.matches(NEWTON_LOOP_HEADER).count(), 1);
    }
}
