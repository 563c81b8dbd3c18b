use std::collections::BTreeMap;
use std::fmt::{self, Write};

use crate::behaviour::{increment_type, BoundsDescription, CodeBlock, CodeBlockRole, TypeFlag, VariableCategory};
use crate::loader::entry_point_symbol;

use super::header::increment_cxx_type;
use super::interface::{ArgumentRole, StatusConvention, TangentRequest as Request};
use super::layout::Slot;
use super::{pairs, real, Context, Scheme, Translator, SUB_STEPPING_LOOP_HEADER};

/// writes the translated body of a code block, if any
pub(crate) fn write_block(out: &mut String, translator: &Translator, block: Option<&CodeBlock>) -> fmt::Result {
    if let Some(block) = block {
        writeln!(out, "  // {} (line {})", block.role, block.line)?;
        write!(out, "{}", translator.translate(&block.body, "  "))?;
    }
    Ok(())
}

/// statements copying the reals of `slot` from the flat array `array` into `member`
pub(crate) fn write_import(out: &mut String, indent: &str, slot: &Slot, member: &str, array: &str) -> fmt::Result {
    let o = slot.offset;
    let ts = slot.type_size();
    match (slot.flag, slot.array_size > 1) {
        (TypeFlag::Scalar | TypeFlag::Integer, false) => writeln!(out, "{}{} = {}[{}];", indent, member, array, o),
        (TypeFlag::Scalar | TypeFlag::Integer, true) => {
            writeln!(out, "{}for(unsigned short idx=0;idx!={};++idx){{", indent, slot.array_size)?;
            writeln!(out, "{}  {}[idx] = {}[{}+idx];", indent, member, array, o)?;
            writeln!(out, "{}}}", indent)
        }
        (_, false) => writeln!(
            out,
            "{}std::copy({a}+{},{a}+{},{}.begin());",
            indent,
            o,
            slot.end(),
            member,
            a = array
        ),
        (_, true) => {
            writeln!(out, "{}for(unsigned short idx=0;idx!={};++idx){{", indent, slot.array_size)?;
            writeln!(
                out,
                "{}  std::copy({a}+{o}+idx*{ts},{a}+{o}+(idx+1)*{ts},{}[idx].begin());",
                indent,
                member,
                a = array,
                o = o,
                ts = ts
            )?;
            writeln!(out, "{}}}", indent)
        }
    }
}

/// statements copying `member` into the reals of `slot` in the flat array `array`
pub(crate) fn write_export(out: &mut String, indent: &str, slot: &Slot, member: &str, array: &str) -> fmt::Result {
    let o = slot.offset;
    let ts = slot.type_size();
    match (slot.flag, slot.array_size > 1) {
        (TypeFlag::Scalar | TypeFlag::Integer, false) => writeln!(out, "{}{}[{}] = {};", indent, array, o, member),
        (TypeFlag::Scalar | TypeFlag::Integer, true) => {
            writeln!(out, "{}for(unsigned short idx=0;idx!={};++idx){{", indent, slot.array_size)?;
            writeln!(out, "{}  {}[{}+idx] = {}[idx];", indent, array, o, member)?;
            writeln!(out, "{}}}", indent)
        }
        (_, false) => writeln!(
            out,
            "{}std::copy({m}.begin(),{m}.end(),{}+{});",
            indent,
            array,
            o,
            m = member
        ),
        (_, true) => {
            writeln!(out, "{}for(unsigned short idx=0;idx!={};++idx){{", indent, slot.array_size)?;
            writeln!(
                out,
                "{}  std::copy({m}[idx].begin(),{m}[idx].end(),{}+{}+idx*{});",
                indent,
                array,
                o,
                ts,
                m = member
            )?;
            writeln!(out, "{}}}", indent)
        }
    }
}

/// `computeFinalStress`, evaluating the stress at the end of the (sub) step
pub(crate) fn write_final_stress(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
    let block = ctx
        .code_block(CodeBlockRole::ComputeFinalStress)
        .or_else(|| ctx.code_block(CodeBlockRole::ComputeStress));
    let translator = ctx
        .translator()
        .interpolating(pairs(&ctx.state_variables()), None)
        .interpolating(pairs(&ctx.external_state_variables()), None);
    writeln!(out, "void {}::computeFinalStress(){{", ctx.class_name())?;
    write_block(out, &translator, block)?;
    writeln!(out, "}}")?;
    writeln!(out)
}

fn write_policy(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
    let class = ctx.class_name();
    let variable = format!("{}_OUT_OF_BOUNDS_POLICY", ctx.interface.name().to_uppercase());
    writeln!(out, "{c}::OutOfBoundsPolicy {c}::getOutOfBoundsPolicy(){{", c = class)?;
    writeln!(out, "  const char* const p = std::getenv(\"{}\");", variable)?;
    writeln!(out, "  if(p!=nullptr){{")?;
    writeln!(out, "    const std::string policy(p);")?;
    for name in ["STRICT", "WARNING", "NONE"] {
        writeln!(out, "    if(policy==\"{}\"){{", name)?;
        writeln!(out, "      return {};", name)?;
        writeln!(out, "    }}")?;
    }
    writeln!(out, "  }}")?;
    writeln!(out, "  return {};", ctx.policy.name())?;
    writeln!(out, "}}")?;
    writeln!(out)
}

fn write_constructor(ctx: &Context<'_>, scheme: &dyn Scheme, out: &mut String) -> fmt::Result {
    let class = ctx.class_name();
    let algorithm = &ctx.bd.algorithm;
    writeln!(
        out,
        "{c}::{c}(const real* const mps,const real* const isvs,const real* const esvs,\
         const real* const desvs,const real* const eto_,const real* const deto_,\
         const real* const sig_,const real dt_){{",
        c = class
    )?;
    for slot in ctx.layout.material_properties() {
        write_import(out, "  ", slot, &format!("this->{}", slot.name), "mps")?;
    }
    for slot in ctx.layout.internal_state_variables() {
        write_import(out, "  ", slot, &format!("this->{}", slot.name), "isvs")?;
    }
    for slot in ctx.layout.external_state_variables() {
        write_import(out, "  ", slot, &format!("this->{}", slot.name), "esvs")?;
        write_import(out, "  ", slot, &format!("this->d{}", slot.name), "desvs")?;
    }
    writeln!(out, "  std::copy(eto_,eto_+StensorSize,this->eto.begin());")?;
    writeln!(out, "  std::copy(deto_,deto_+StensorSize,this->deto.begin());")?;
    writeln!(out, "  std::copy(sig_,sig_+StensorSize,this->sig.begin());")?;
    writeln!(out, "  this->dt = dt_;")?;
    for v in ctx.bd.variables(VariableCategory::StateVariable) {
        let zero = if v.is_array() {
            format!("{}({}(real(0)))", increment_cxx_type(v), increment_type(&v.type_name))
        } else {
            format!("{}(real(0))", increment_cxx_type(v))
        };
        writeln!(out, "  this->d{} = {};", v.name, zero)?;
    }
    for v in ctx.bd.variables(VariableCategory::Parameter) {
        if v.is_array() {
            for i in 0..v.array_size {
                let value = v.values.get(i).copied().unwrap_or(0.0);
                writeln!(out, "  this->{}[{}] = {};", v.name, i, real(value))?;
            }
        } else {
            let value = v.values.first().copied().unwrap_or(0.0);
            writeln!(out, "  this->{} = {};", v.name, real(value))?;
        }
    }
    writeln!(out, "  this->theta = {};", real(algorithm.theta))?;
    writeln!(out, "  this->epsilon = {};", real(algorithm.epsilon))?;
    writeln!(out, "  this->iterMax = {};", algorithm.iter_max)?;
    writeln!(out, "  this->maxSubSteps = {};", algorithm.max_sub_steps)?;
    writeln!(
        out,
        "  this->minimalTimeStepFraction = {};",
        real(algorithm.minimal_time_step_fraction())
    )?;
    writeln!(
        out,
        "  this->numerical_jacobian_epsilon = {};",
        real(algorithm.numerical_jacobian_epsilon())
    )?;
    writeln!(out, "  this->Dt = Stensor4(real(0));")?;
    writeln!(out, "  this->smt = CONSISTENTTANGENTOPERATOR;")?;
    scheme.write_initialisation(ctx, out)?;
    let translator = scheme.block_translator(ctx);
    write_block(out, &translator, ctx.code_block(CodeBlockRole::InitLocalVars))?;
    writeln!(out, "}}")?;
    writeln!(out)
}

fn write_integrate(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
    let class = ctx.class_name();
    let esvs: Vec<_> = ctx.bd.variables(VariableCategory::ExternalStateVariable).collect();
    writeln!(out, "{c}::IntegrationResult {c}::integrate(const bool requestTangent){{", c = class)?;
    writeln!(out, "  const OutOfBoundsPolicy policy = {}::getOutOfBoundsPolicy();", class)?;
    writeln!(out, "  const real dt0 = this->dt;")?;
    writeln!(out, "  const StrainStensor deto0 = this->deto;")?;
    writeln!(out, "  const temperature dT0 = this->dT;")?;
    for v in &esvs {
        writeln!(out, "  const {} d{n}0 = this->d{n};", v.cxx_type(), n = v.name)?;
    }
    writeln!(out, "  real start = real(0);")?;
    writeln!(out, "  real length = real(1);")?;
    writeln!(out, "  {}", SUB_STEPPING_LOOP_HEADER)?;
    writeln!(out, "    this->dt = length*dt0;")?;
    writeln!(out, "    this->deto = length*deto0;")?;
    writeln!(out, "    this->dT = length*dT0;")?;
    for v in &esvs {
        if v.is_array() {
            writeln!(out, "    for(unsigned short idx=0;idx!={};++idx){{", v.array_size)?;
            writeln!(out, "      this->d{n}[idx] = length*d{n}0[idx];", n = v.name)?;
            writeln!(out, "    }}")?;
        } else {
            writeln!(out, "    this->d{n} = length*d{n}0;", n = v.name)?;
        }
    }
    writeln!(
        out,
        "    const bool last = start+length>=real(1)-real(0.5)*(this->minimalTimeStepFraction);"
    )?;
    writeln!(out, "    bool converged = this->solveSubStep();")?;
    writeln!(out, "    if((converged)&&(last)&&(requestTangent)){{")?;
    writeln!(out, "      converged = this->computeConsistentTangentOperator();")?;
    writeln!(out, "    }}")?;
    writeln!(out, "    if(!converged){{")?;
    writeln!(out, "      if(real(0.5)*length<this->minimalTimeStepFraction){{")?;
    writeln!(out, "        return FAILURE;")?;
    writeln!(out, "      }}")?;
    writeln!(out, "      length *= real(0.5);")?;
    writeln!(out, "      continue;")?;
    writeln!(out, "    }}")?;
    writeln!(out, "    this->computeFinalStress();")?;
    writeln!(out, "    this->updateSubStep();")?;
    writeln!(out, "    start += length;")?;
    writeln!(out, "    length = std::min(length,real(1)-start);")?;
    writeln!(out, "  }}")?;
    writeln!(out, "  if(!this->checkBounds(policy)){{")?;
    writeln!(out, "    return OUTOFBOUNDS;")?;
    writeln!(out, "  }}")?;
    writeln!(out, "  return SUCCESS;")?;
    writeln!(out, "}}")?;
    writeln!(out)
}

fn write_increment(out: &mut String, name: &str, array_size: usize) -> fmt::Result {
    if array_size > 1 {
        writeln!(out, "  for(unsigned short idx=0;idx!={};++idx){{", array_size)?;
        writeln!(out, "    this->{n}[idx] += this->d{n}[idx];", n = name)?;
        writeln!(out, "  }}")
    } else {
        writeln!(out, "  this->{n} += this->d{n};", n = name)
    }
}

fn write_update_sub_step(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
    writeln!(out, "void {}::updateSubStep(){{", ctx.class_name())?;
    for v in ctx.bd.variables(VariableCategory::StateVariable) {
        write_increment(out, &v.name, v.array_size)?;
    }
    write_block(
        out,
        &ctx.translator(),
        ctx.code_block(CodeBlockRole::UpdateAuxiliaryStateVariables),
    )?;
    writeln!(out, "  this->eto += this->deto;")?;
    writeln!(out, "  this->T += this->dT;")?;
    for v in ctx.bd.variables(VariableCategory::ExternalStateVariable) {
        write_increment(out, &v.name, v.array_size)?;
    }
    writeln!(out, "}}")?;
    writeln!(out)
}

/// the checked values of a bound, with their labels; components that do not exist for
/// the hypothesis are skipped
fn bounded_values(ctx: &Context<'_>, bound: &BoundsDescription) -> Vec<(String, String)> {
    let (flag, array_size) = match ctx.bd.variable(&bound.variable) {
        Some(v) => (v.flag(), v.array_size),
        None => (TypeFlag::Scalar, 1),
    };
    let name = &bound.variable;
    let (declared, used) = match flag {
        TypeFlag::Scalar | TypeFlag::Integer => (1, 1),
        TypeFlag::Stensor => (6, ctx.hypothesis.stensor_size()),
        TypeFlag::Tensor => (9, ctx.hypothesis.tensor_size()),
    };
    let value = |element: usize, component: usize| {
        let expression = match (declared > 1, array_size > 1) {
            (false, false) => format!("this->{}", name),
            (false, true) => format!("this->{}[{}]", name, element),
            (true, false) => format!("this->{}({})", name, component),
            (true, true) => format!("this->{}[{}]({})", name, element, component),
        };
        let label = if declared > 1 || array_size > 1 {
            format!("{}({})", name, element * declared + component)
        } else {
            name.to_string()
        };
        (expression, label)
    };
    match bound.component {
        Some(c) => {
            let (element, component) = (c / declared, c % declared);
            if component < used {
                vec![value(element, component)]
            } else {
                Vec::new()
            }
        }
        None => (0..array_size)
            .flat_map(|e| (0..used).map(move |c| (e, c)))
            .map(|(e, c)| value(e, c))
            .collect(),
    }
}

fn write_check_bounds(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
    let class = ctx.class_name();
    writeln!(out, "bool {}::checkBounds(const OutOfBoundsPolicy policy) const{{", class)?;
    writeln!(out, "  if(policy==NONE){{")?;
    writeln!(out, "    return true;")?;
    writeln!(out, "  }}")?;
    for bound in ctx.bd.bounds() {
        let interval = format!(
            "{}:{}",
            bound.lower.map_or("]-inf".to_string(), |l| format!("[{}", l)),
            bound.upper.map_or("+inf[".to_string(), |u| format!("{}]", u))
        );
        for (expression, label) in bounded_values(ctx, bound) {
            let mut conditions = Vec::new();
            if let Some(lower) = bound.lower {
                conditions.push(format!("({}>={})", expression, real(lower)));
            }
            if let Some(upper) = bound.upper {
                conditions.push(format!("({}<={})", expression, real(upper)));
            }
            writeln!(out, "  if(!({})){{", conditions.join("&&"))?;
            writeln!(out, "    if(policy==STRICT){{")?;
            writeln!(out, "      return false;")?;
            writeln!(out, "    }}")?;
            writeln!(
                out,
                "    std::cerr<<\"{}: {} is out of bounds {} (\"<<{}<<\")\"<<std::endl;",
                class, label, interval, expression
            )?;
            writeln!(out, "  }}")?;
        }
    }
    writeln!(out, "  return true;")?;
    writeln!(out, "}}")?;
    writeln!(out)
}

fn write_exports(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
    let class = ctx.class_name();
    writeln!(out, "void {}::exportStateData(real* const sig_,real* const isvs) const{{", class)?;
    writeln!(out, "  std::copy(this->sig.begin(),this->sig.end(),sig_);")?;
    for slot in ctx.layout.internal_state_variables() {
        write_export(out, "  ", slot, &format!("this->{}", slot.name), "isvs")?;
    }
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "void {}::exportTangentOperator(real* const K) const{{", class)?;
    writeln!(out, "  for(unsigned short i=0;i!=StensorSize;++i){{")?;
    writeln!(out, "    for(unsigned short j=0;j!=StensorSize;++j){{")?;
    writeln!(out, "      K[i*StensorSize+j] = this->Dt(i,j);")?;
    writeln!(out, "    }}")?;
    writeln!(out, "  }}")?;
    writeln!(out, "}}")?;
    writeln!(out)
}

/// aliases of the solver's scalar types, such as `umat::UMATReal`
fn write_solver_types(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
    let mut namespaces: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    for argument in &ctx.order.arguments {
        if let Some((namespace, name)) = argument.cxx_type.split_once("::") {
            let names = namespaces.entry(namespace).or_default();
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    for (namespace, names) in namespaces {
        writeln!(out, "namespace {}{{", namespace)?;
        for name in names {
            let t = if name.ends_with("Int") { "int" } else { "double" };
            writeln!(out, "using {} = {};", name, t)?;
        }
        writeln!(out, "}}")?;
        writeln!(out)?;
    }
    Ok(())
}

fn failure(ctx: &Context<'_>, code: i32) -> String {
    let name = |role| ctx.order.name_of(role).unwrap_or("status");
    match ctx.order.status {
        StatusConvention::NewTimeStep => format!(
            "*{} = real(0.2);\n    return;",
            name(ArgumentRole::NewTimeStepRatio)
        ),
        StatusConvention::Kinc => format!("*{} = {};\n    return;", name(ArgumentRole::Status), code),
        StatusConvention::ReturnValue => format!("return {};", code),
    }
}

fn write_size_check(ctx: &Context<'_>, out: &mut String, role: ArgumentRole, expected: usize, what: &str) -> fmt::Result {
    if let Some(name) = ctx.order.name_of(role) {
        writeln!(out, "  if(*{}!={}){{", name, expected)?;
        writeln!(
            out,
            "    std::cerr<<\"{}: invalid number of {} (\"<<*{}<<\", {} expected)\"<<std::endl;",
            ctx.class_name(),
            what,
            name,
            expected
        )?;
        writeln!(out, "    {}", failure(ctx, -3))?;
        writeln!(out, "  }}")?;
    }
    Ok(())
}

fn write_entry_point(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
    use ArgumentRole::*;
    let order = &ctx.order;
    let n = order.number_of_components;
    let nesv = order.number_of_external_state_variables;
    let symbol = entry_point_symbol(&ctx.class_name(), ctx.interface.name(), ctx.hypothesis);
    let name = |role| order.name_of(role).unwrap_or("");
    write_solver_types(ctx, out)?;
    let arguments = order
        .arguments
        .iter()
        .map(|a| {
            let writable = matches!(
                a.role,
                Stress | InternalStateVariables | Tangent | NewTimeStepRatio | Status | Unused
            ) && a.cxx_type != "char";
            let constness = if writable { "" } else { "const " };
            format!("{}{}* const {}", constness, a.cxx_type, a.name)
        })
        .collect::<Vec<_>>()
        .join(",\n  ");
    let returned = if order.status == StatusConvention::ReturnValue { "int" } else { "void" };
    writeln!(out, "extern \"C\" {{")?;
    writeln!(out)?;
    writeln!(out, "{} {}(\n  {}){{", returned, symbol, arguments)?;
    writeln!(out, "  using Behaviour = {}::{};", ctx.namespace(), ctx.class_name())?;
    writeln!(out, "  using real = Behaviour::real;")?;
    write_size_check(ctx, out, NumberOfComponents, n, "components")?;
    write_size_check(
        ctx,
        out,
        NumberOfInternalStateVariables,
        order.number_of_internal_state_variables,
        "internal state variables",
    )?;
    write_size_check(
        ctx,
        out,
        NumberOfMaterialProperties,
        order.number_of_material_properties,
        "material properties",
    )?;
    let (strain, stress) = order.shear_scaling.factors();
    let factors = |f: f64| {
        (0..n)
            .map(|i| real(if i < 3 { 1.0 } else { f }))
            .collect::<Vec<_>>()
            .join(",")
    };
    writeln!(
        out,
        "  // components: {}",
        ctx.interface.stensor_components(ctx.hypothesis).join(" ")
    )?;
    writeln!(out, "  const real ce[{}] = {{{}}};", n, factors(strain))?;
    writeln!(out, "  const real cs[{}] = {{{}}};", n, factors(stress))?;
    writeln!(out, "  real mfront_eto[{}];", n)?;
    writeln!(out, "  real mfront_deto[{}];", n)?;
    writeln!(out, "  real mfront_sig[{}];", n)?;
    writeln!(out, "  for(unsigned short i=0;i!={};++i){{", n)?;
    writeln!(out, "    mfront_eto[i] = {}[i]*ce[i];", name(Strain))?;
    writeln!(out, "    mfront_deto[i] = {}[i]*ce[i];", name(StrainIncrement))?;
    writeln!(out, "    mfront_sig[i] = {}[i]*cs[i];", name(Stress))?;
    writeln!(out, "  }}")?;
    let (esvs, desvs) = if order.has(AllExternalStateVariables) {
        (
            name(AllExternalStateVariables).to_string(),
            name(AllExternalStateVariablesIncrements).to_string(),
        )
    } else {
        writeln!(out, "  real mfront_esvs[{}];", nesv)?;
        writeln!(out, "  real mfront_desvs[{}];", nesv)?;
        writeln!(out, "  mfront_esvs[0] = *{};", name(Temperature))?;
        writeln!(out, "  mfront_desvs[0] = *{};", name(TemperatureIncrement))?;
        if nesv > 1 {
            writeln!(out, "  for(unsigned short i=1;i!={};++i){{", nesv)?;
            writeln!(out, "    mfront_esvs[i] = {}[i-1];", name(ExternalStateVariables))?;
            writeln!(out, "    mfront_desvs[i] = {}[i-1];", name(ExternalStateVariablesIncrements))?;
            writeln!(out, "  }}")?;
        }
        ("mfront_esvs".to_string(), "mfront_desvs".to_string())
    };
    let tangent = name(Tangent);
    match order.tangent_request {
        Request::Always => writeln!(out, "  const bool requestTangent = true;")?,
        Request::FirstComponent => {
            writeln!(out, "  const bool requestTangent = {}[0]>real(0);", tangent)?
        }
        Request::Flag => {
            writeln!(out, "  const bool requestTangent = *{}!=0;", name(ArgumentRole::TangentRequest))?
        }
    }
    writeln!(
        out,
        "  Behaviour b({}+{},{},{},{},mfront_eto,mfront_deto,mfront_sig,*{});",
        name(MaterialProperties),
        order.material_property_offset,
        name(InternalStateVariables),
        esvs,
        desvs,
        name(TimeIncrement)
    )?;
    writeln!(out, "  const Behaviour::IntegrationResult r = b.integrate(requestTangent);")?;
    writeln!(out, "  if(r==Behaviour::FAILURE){{")?;
    writeln!(out, "    {}", failure(ctx, -1))?;
    writeln!(out, "  }}")?;
    writeln!(out, "  if(r==Behaviour::OUTOFBOUNDS){{")?;
    writeln!(out, "    {}", failure(ctx, -2))?;
    writeln!(out, "  }}")?;
    writeln!(out, "  b.exportStateData(mfront_sig,{});", name(InternalStateVariables))?;
    writeln!(out, "  for(unsigned short i=0;i!={};++i){{", n)?;
    writeln!(out, "    {}[i] = mfront_sig[i]/cs[i];", name(Stress))?;
    writeln!(out, "  }}")?;
    writeln!(out, "  if(requestTangent){{")?;
    writeln!(out, "    real mfront_K[{}];", n * n)?;
    writeln!(out, "    b.exportTangentOperator(mfront_K);")?;
    writeln!(out, "    for(unsigned short i=0;i!={};++i){{", n)?;
    writeln!(out, "      for(unsigned short j=0;j!={};++j){{", n)?;
    let index = if order.column_major_tangent {
        format!("j*{}+i", n)
    } else {
        format!("i*{}+j", n)
    };
    writeln!(out, "        {}[{}] = mfront_K[i*{}+j]*ce[j]/cs[i];", tangent, index, n)?;
    writeln!(out, "      }}")?;
    writeln!(out, "    }}")?;
    writeln!(out, "  }}")?;
    match order.status {
        StatusConvention::Kinc => writeln!(out, "  *{} = 1;", name(Status))?,
        StatusConvention::ReturnValue => writeln!(out, "  return 0;")?,
        StatusConvention::NewTimeStep => {}
    }
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "}} // end of extern \"C\"")
}

/// writes the definitions of the behaviour class and its entry point
pub(crate) fn write_source(ctx: &Context<'_>, scheme: &dyn Scheme) -> Result<String, fmt::Error> {
    let mut out = String::new();
    writeln!(out, "/*!")?;
    writeln!(out, " * \\file   {}.cxx", ctx.stem)?;
    writeln!(
        out,
        " * \\brief  {} integrated by the {} scheme, {} hypothesis",
        ctx.class_name(),
        ctx.bd.family.name,
        ctx.hypothesis
    )?;
    writeln!(out, " */")?;
    writeln!(out)?;
    writeln!(out, "#include\"{}.hxx\"", ctx.stem)?;
    writeln!(out)?;
    writeln!(out, "namespace {}{{", ctx.namespace())?;
    writeln!(out)?;
    write_policy(ctx, &mut out)?;
    write_constructor(ctx, scheme, &mut out)?;
    write_integrate(ctx, &mut out)?;
    write_update_sub_step(ctx, &mut out)?;
    write_check_bounds(ctx, &mut out)?;
    write_exports(ctx, &mut out)?;
    scheme.write_definitions(ctx, &mut out)?;
    writeln!(out, "}} // end of namespace {}", ctx.namespace())?;
    writeln!(out)?;
    write_entry_point(ctx, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behaviour::ModellingHypothesis;
    use crate::codegen::generate;
    use crate::parser::parse_mfront_string;
    use crate::registry::Registry;

    const TEXT: &str = r#"
@DSL Implicit;
@Behaviour Damage;
@MaterialProperty stress young;
@MaterialProperty real nu;
@StateVariable StrainStensor eel;
@StateVariable real d;
@Bounds d in [0:1];
@PhysicalBounds T in [0:*[;
@Bounds eel(3) in [-1:1];
@ExternalStateVariable real phi;
@ComputeStress {
  sig = (1-d)*young*eel;
}
@Integrator {
  feel = deel - deto;
  fd = dd - phi*dt;
}
"#;

    fn source(hypothesis: ModellingHypothesis, interface: &str) -> String {
        let registry = Registry::new();
        let bd = parse_mfront_string(TEXT, &registry).unwrap();
        generate(&bd, hypothesis, interface, &registry).unwrap().source
    }

    #[test]
    fn bounds_skip_missing_components() {
        let s = source(ModellingHypothesis::Tridimensional, "generic");
        assert!(s.contains("if(!((this->d>=0.0)&&(this->d<=1.0))){"));
        assert!(s.contains("if(!((this->eel(3)>=-1.0)&&(this->eel(3)<=1.0))){"));
        assert!(s.contains("if(!((this->T>=0.0))){"));
        let s = source(ModellingHypothesis::AxisymmetricalGeneralisedPlaneStrain, "generic");
        assert!(!s.contains("this->eel(3)>="));
    }

    #[test]
    fn external_state_variables_follow_temperature() {
        let s = source(ModellingHypothesis::PlaneStrain, "umat");
        assert!(s.contains("mfront_esvs[0] = *TEMP;"));
        assert!(s.contains("mfront_esvs[i] = PREDEF[i-1];"));
        assert!(s.contains("this->phi = esvs[1];"));
        assert!(s.contains("this->dphi = desvs[1];"));
    }

    #[test]
    fn calling_conventions() {
        let s = source(ModellingHypothesis::Tridimensional, "umat");
        assert!(s.contains("void Damage_umat_TRIDIMENSIONAL("));
        assert!(s.contains("*PNEWDT = real(0.2);"));
        assert!(s.contains("DDSDDE[j*6+i] = mfront_K[i*6+j]*ce[j]/cs[i];"));
        assert!(s.contains("const real ce[6] = {1.0,1.0,1.0,0.70710678118654"));
        let s = source(ModellingHypothesis::Tridimensional, "castem");
        assert!(s.contains("*KINC = -1;"));
        assert!(s.contains("const bool requestTangent = DDSDDE[0]>real(0);"));
        let s = source(ModellingHypothesis::Tridimensional, "generic");
        assert!(s.contains("int Damage_generic_TRIDIMENSIONAL("));
        assert!(s.contains("K[i*6+j] = mfront_K[i*6+j]*ce[j]/cs[i];"));
        assert!(s.contains("return -2;"));
    }

    #[test]
    fn tangent_request_per_interface() {
        let request = |interface| {
            source(ModellingHypothesis::Tridimensional, interface)
                .lines()
                .find(|l| l.contains("const bool requestTangent"))
                .map(|l| l.trim().to_string())
        };
        assert_eq!(request("umat").as_deref(), Some("const bool requestTangent = true;"));
        assert_eq!(request("castem").as_deref(), Some("const bool requestTangent = DDSDDE[0]>real(0);"));
        assert_eq!(request("generic").as_deref(), Some("const bool requestTangent = *request_tangent!=0;"));
    }

    #[test]
    fn out_of_bounds_policy_environment() {
        let s = source(ModellingHypothesis::Tridimensional, "aster");
        assert!(s.contains("std::getenv(\"ASTER_OUT_OF_BOUNDS_POLICY\")"));
    }

    #[test]
    fn state_is_imported_and_exported() {
        let s = source(ModellingHypothesis::PlaneStrain, "generic");
        assert!(s.contains("std::copy(isvs+0,isvs+4,this->eel.begin());"));
        assert!(s.contains("this->d = isvs[4];"));
        assert!(s.contains("std::copy(this->eel.begin(),this->eel.end(),isvs+0);"));
        assert!(s.contains("isvs[4] = this->d;"));
    }
}
