use std::fmt::{self, Write};

use crate::behaviour::variable::{SCALAR_TYPES, STENSOR_TYPES, TENSOR_TYPES};
use crate::behaviour::{increment_type, Variable, VariableCategory};

use super::{common_members, real, Context, Member, Scheme};

/// the C++ type of the increment of a variable
pub(crate) fn increment_cxx_type(variable: &Variable) -> String {
    let t = increment_type(&variable.type_name);
    if variable.is_array() {
        format!("tfel::math::fsarray<{}, {}>", variable.array_size, t)
    } else {
        t.to_string()
    }
}

fn static_value(variable: &Variable) -> String {
    let value = variable.values.first().copied().unwrap_or(0.0);
    if variable.type_name == "int" || variable.type_name == "ushort" {
        format!("{}", value as i64)
    } else {
        real(value)
    }
}

/// the members holding the variables of the behaviour and their increments
pub(crate) fn behaviour_members(ctx: &Context<'_>) -> Vec<Member> {
    let mut members = Vec::new();
    for category in VariableCategory::ALL {
        for v in ctx.bd.variables(category) {
            match category {
                VariableCategory::StaticVariable => {
                    members.push(Member::constant(&v.type_name, &v.name, static_value(v)))
                }
                _ => members.push(Member::new(v.cxx_type(), v.name.clone())),
            }
            match category {
                VariableCategory::StateVariable => {
                    members.push(Member::new(increment_cxx_type(v), format!("d{}", v.name)))
                }
                VariableCategory::ExternalStateVariable => {
                    members.push(Member::new(v.cxx_type(), format!("d{}", v.name)))
                }
                _ => {}
            }
        }
    }
    members
}

fn write_member(out: &mut String, member: &Member) -> fmt::Result {
    match &member.value {
        Some(value) => writeln!(out, "static constexpr {} {} = {};", member.cxx_type, member.name, value),
        None => writeln!(out, "{} {};", member.cxx_type, member.name),
    }
}

fn write_type_aliases(ctx: &Context<'_>, out: &mut String) -> fmt::Result {
    let h = ctx.hypothesis;
    writeln!(out, "using real = double;")?;
    writeln!(out, "static constexpr unsigned short N = {};", h.space_dimension())?;
    writeln!(out, "static constexpr unsigned short StensorSize = {};", h.stensor_size())?;
    writeln!(out, "static constexpr unsigned short TensorSize = {};", h.tensor_size())?;
    writeln!(out, "using ushort = unsigned short;")?;
    writeln!(out, "using Stensor = tfel::math::stensor<N,real>;")?;
    writeln!(out, "using Stensor4 = tfel::math::st2tost2<N,real>;")?;
    writeln!(out, "using Tensor = tfel::math::tensor<N,real>;")?;
    for t in SCALAR_TYPES.iter().filter(|t| **t != "real") {
        writeln!(out, "using {} = real;", t)?;
    }
    for t in STENSOR_TYPES.iter().filter(|t| **t != "Stensor") {
        writeln!(out, "using {} = Stensor;", t)?;
    }
    for t in TENSOR_TYPES.iter().filter(|t| **t != "Tensor") {
        writeln!(out, "using {} = Tensor;", t)?;
    }
    Ok(())
}

/// writes the declaration of the behaviour class
pub(crate) fn write_header(ctx: &Context<'_>, scheme: &dyn Scheme) -> Result<String, fmt::Error> {
    let mut out = String::new();
    let class = ctx.class_name();
    let guard = format!(
        "LIB_MFRONT_{}_HXX",
        ctx.stem.to_uppercase().replace(['-', '.'], "_")
    );
    writeln!(out, "/*!")?;
    writeln!(out, " * \\file   {}.hxx", ctx.stem)?;
    writeln!(out, " * \\brief  behaviour {} for the {} interface", class, ctx.interface.name())?;
    if let Some(source) = &ctx.bd.source_file {
        writeln!(out, " *         generated by mfront from {}", source)?;
    }
    if let Some(author) = &ctx.bd.author {
        writeln!(out, " * \\author {}", author)?;
    }
    if let Some(date) = &ctx.bd.date {
        writeln!(out, " * \\date   {}", date)?;
    }
    if let Some(description) = &ctx.bd.description {
        for line in description.lines() {
            writeln!(out, " * {}", line.trim())?;
        }
    }
    writeln!(out, " */")?;
    writeln!(out)?;
    writeln!(out, "#ifndef {}", guard)?;
    writeln!(out, "#define {}", guard)?;
    writeln!(out)?;
    for include in ["cmath", "limits", "cstdlib", "string", "iostream", "algorithm"] {
        writeln!(out, "#include<{}>", include)?;
    }
    for include in [
        "TFEL/Math/stensor.hxx",
        "TFEL/Math/st2tost2.hxx",
        "TFEL/Math/tensor.hxx",
        "TFEL/Math/tvector.hxx",
        "TFEL/Math/tmatrix.hxx",
        "TFEL/Math/fsarray.hxx",
        "TFEL/Math/TinyMatrixSolve.hxx",
    ] {
        writeln!(out, "#include\"{}\"", include)?;
    }
    for law in &ctx.bd.material_laws {
        writeln!(out, "#include\"{}-mfront.hxx\"", law.name)?;
    }
    for include in &ctx.bd.includes {
        writeln!(out, "{}", include.trim())?;
    }
    writeln!(out)?;
    writeln!(out, "namespace {}{{", ctx.namespace())?;
    writeln!(out)?;
    writeln!(out, "class {}{{", class)?;
    writeln!(out, "public:")?;
    write_type_aliases(ctx, &mut out)?;
    writeln!(out, "enum OutOfBoundsPolicy{{NONE,WARNING,STRICT}};")?;
    writeln!(out, "enum IntegrationResult{{SUCCESS,FAILURE,OUTOFBOUNDS}};")?;
    writeln!(
        out,
        "enum StiffnessMatrixType{{NOSTIFFNESSREQUESTED,ELASTIC,SECANTOPERATOR,TANGENTOPERATOR,CONSISTENTTANGENTOPERATOR}};"
    )?;
    writeln!(out, "/*!")?;
    writeln!(out, " * \\param[in] mps: material properties")?;
    writeln!(out, " * \\param[in] isvs: internal state variables at the beginning of the time step")?;
    writeln!(out, " * \\param[in] esvs: external state variables, the temperature first")?;
    writeln!(out, " * \\param[in] desvs: increments of the external state variables")?;
    writeln!(out, " */")?;
    writeln!(
        out,
        "{}(const real* const,const real* const,const real* const,const real* const,\
         const real* const,const real* const,const real* const,const real);",
        class
    )?;
    writeln!(out, "IntegrationResult integrate(const bool);")?;
    writeln!(out, "void exportStateData(real* const,real* const) const;")?;
    writeln!(out, "void exportTangentOperator(real* const) const;")?;
    writeln!(out, "static OutOfBoundsPolicy getOutOfBoundsPolicy();")?;
    writeln!(out, "private:")?;
    for member in behaviour_members(ctx)
        .iter()
        .chain(&common_members())
        .chain(&scheme.members(ctx))
    {
        write_member(&mut out, member)?;
    }
    writeln!(out, "bool checkBounds(const OutOfBoundsPolicy) const;")?;
    writeln!(out, "void updateSubStep();")?;
    writeln!(out, "bool solveSubStep();")?;
    writeln!(out, "void computeFinalStress();")?;
    writeln!(out, "bool computeConsistentTangentOperator();")?;
    for declaration in scheme.declarations(ctx) {
        writeln!(out, "{}", declaration)?;
    }
    writeln!(out, "}}; // end of class {}", class)?;
    writeln!(out)?;
    writeln!(out, "}} // end of namespace {}", ctx.namespace())?;
    writeln!(out)?;
    writeln!(out, "#endif /* {} */", guard)?;
    Ok(out)
}
