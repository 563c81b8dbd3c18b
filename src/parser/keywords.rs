use std::collections::BTreeSet;

use itertools::Itertools;

use crate::behaviour::{
    AlgorithmKind, AlgorithmParameter, BoundsCategory, BoundsDescription, CodeBlock,
    CodeBlockRole, FamilyProfile, FlowKind, JacobianMode, MaterialLaw, ModellingHypothesis,
    RungeKuttaMethod, Variable, VariableCategory,
};
use crate::error::{CompileError, ErrorKind};

use super::cursor::unquote;
use super::engine::{DslEngine, KeywordTable};
use super::tokenizer::{Token, TokenKind};

/// the keyword table shared by every behaviour family
pub fn standard_keywords() -> KeywordTable {
    let mut table = KeywordTable::new();
    table.insert(&["@DSL", "@Parser"], treat_dsl);
    table.insert(&["@Algorithm"], treat_algorithm);
    table.insert(&["@Behaviour"], treat_behaviour);
    table.insert(&["@Material"], treat_material);
    table.insert(&["@Author"], treat_author);
    table.insert(&["@Date"], treat_date);
    table.insert(&["@Description"], treat_description);
    table.insert(&["@Includes"], treat_includes);
    table.insert(&["@MaterialLaw"], treat_material_law);
    table.insert(&["@ModellingHypothesis"], treat_modelling_hypothesis);
    table.insert(&["@ModellingHypotheses"], treat_modelling_hypotheses);
    table.insert(&["@OrthotropicBehaviour"], treat_orthotropic_behaviour);

    table.insert(&["@MaterialProperty", "@Coef"], treat_material_property);
    table.insert(&["@StateVariable", "@StateVar"], treat_state_variable);
    table.insert(
        &["@AuxiliaryStateVariable", "@AuxiliaryStateVar"],
        treat_auxiliary_state_variable,
    );
    table.insert(
        &["@ExternalStateVariable", "@ExternalStateVar"],
        treat_external_state_variable,
    );
    table.insert(&["@LocalVariable", "@LocalVar"], treat_local_variable);
    table.insert(&["@Parameter"], treat_parameter);
    table.insert(&["@StaticVariable", "@StaticVar"], treat_static_variable);
    table.insert(&["@IntegerConstant"], treat_integer_constant);

    table.insert(&["@Bounds"], treat_bounds);
    table.insert(&["@PhysicalBounds"], treat_physical_bounds);

    table.insert(
        &["@InitLocalVariables", "@InitLocalVars", "@InitializeLocalVariables"],
        treat_init_local_variables,
    );
    table.insert(&["@Predictor"], treat_predictor);
    table.insert(&["@ComputeStress"], treat_compute_stress);
    table.insert(&["@ComputeFinalStress"], treat_compute_final_stress);
    table.insert(&["@Integrator"], treat_integrator);
    table.insert(&["@FlowRule"], treat_flow_rule);
    table.insert(&["@Derivative"], treat_derivative);
    table.insert(&["@InitializeJacobian", "@InitJacobian"], treat_initialize_jacobian);
    table.insert(&["@TangentOperator"], treat_tangent_operator);
    table.insert(
        &["@UpdateAuxiliaryStateVariables", "@UpdateAuxiliaryStateVars"],
        treat_update_auxiliary_state_variables,
    );

    table.insert(&["@Theta"], treat_theta);
    table.insert(&["@Epsilon"], treat_epsilon);
    table.insert(&["@IterMax", "@MaximumNumberOfIterations"], treat_iter_max);
    table.insert(&["@MaximumNumberOfSubSteps"], treat_max_sub_steps);
    table.insert(
        &["@PerturbationValueForNumericalJacobianComputation"],
        treat_perturbation_value,
    );
    table
}

fn read_name(engine: &mut DslEngine<'_>) -> Result<Token, CompileError> {
    let name = engine.cursor.expect_identifier()?;
    engine.cursor.expect(";")?;
    Ok(name)
}

/// the tokens up to ';' joined back into text, strings losing their quotes
fn read_text(engine: &mut DslEngine<'_>) -> Result<String, CompileError> {
    let tokens = engine.cursor.read_until_semicolon()?;
    Ok(tokens
        .iter()
        .map(|t| match t.kind {
            TokenKind::String => unquote(&t.value),
            _ => t.value.clone(),
        })
        .join(" "))
}

fn treat_dsl(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    let name = read_name(engine)?;
    let family = FamilyProfile::for_name(&name.value).ok_or_else(|| {
        CompileError::syntax(format!("unknown DSL '{}'", name.value), name.line)
    })?;
    engine.bd.set_family(family, token.line)
}

fn treat_algorithm(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    let name = read_name(engine)?;
    let algorithm = &mut engine.bd.algorithm;
    match algorithm.kind {
        AlgorithmKind::ThetaMethodImplicit if name.value == "NewtonRaphson" => {
            algorithm.jacobian = JacobianMode::Automatic;
            return Ok(());
        }
        AlgorithmKind::ThetaMethodImplicit if name.value == "NewtonRaphson_NumericalJacobian" => {
            algorithm.jacobian = JacobianMode::Numerical;
            return Ok(());
        }
        AlgorithmKind::ExplicitRungeKutta(_) => {
            if let Some(method) = RungeKuttaMethod::from_name(&name.value) {
                algorithm.kind = AlgorithmKind::ExplicitRungeKutta(method);
                return Ok(());
            }
        }
        _ => {}
    }
    match FamilyProfile::for_name(&name.value) {
        Some(family) => engine.bd.set_family(family, token.line),
        None => Err(CompileError::new(
            ErrorKind::InvalidAlgorithmParameter {
                name: "algorithm".to_string(),
                reason: format!(
                    "'{}' is not available for the {} DSL",
                    name.value, engine.bd.family.name
                ),
            },
            name.line,
        )),
    }
}

fn treat_behaviour(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    let name = read_name(engine)?;
    if engine.bd.name.is_some() {
        return Err(CompileError::syntax("behaviour name already defined", token.line));
    }
    engine.bd.name = Some(name.value);
    Ok(())
}

fn treat_material(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    let name = read_name(engine)?;
    if engine.bd.material.is_some() {
        return Err(CompileError::syntax("material name already defined", token.line));
    }
    engine.bd.material = Some(name.value);
    Ok(())
}

fn treat_author(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    let text = read_text(engine)?;
    if engine.bd.author.replace(text).is_some() {
        return Err(CompileError::syntax("author already defined", token.line));
    }
    Ok(())
}

fn treat_date(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    let text = read_text(engine)?;
    if engine.bd.date.replace(text).is_some() {
        return Err(CompileError::syntax("date already defined", token.line));
    }
    Ok(())
}

fn treat_description(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    engine.cursor.clear_doc();
    let body = engine.cursor.read_block()?;
    let text = body
        .iter()
        .map(|t| match t.kind {
            TokenKind::String => unquote(&t.value),
            _ => t.value.clone(),
        })
        .join(" ");
    let description = [engine.cursor.take_doc().unwrap_or_default(), text]
        .into_iter()
        .filter(|s| !s.is_empty())
        .join("\n");
    if engine.bd.description.replace(description).is_some() {
        return Err(CompileError::syntax("description already defined", token.line));
    }
    Ok(())
}

fn treat_includes(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    // preprocessor lines inside the block are collected by the cursor
    let body = engine.cursor.read_block()?;
    if !body.is_empty() {
        engine.bd.includes.push(body.iter().map(|t| t.value.as_str()).join(" "));
    }
    Ok(())
}

/// the file name without directories nor extension names the generated function
fn material_law_name(file: &str) -> String {
    let base = file.rsplit(['/', '\\']).next().unwrap_or(file);
    base.strip_suffix(".mfront").unwrap_or(base).to_string()
}

fn treat_material_law(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    let mut files = Vec::new();
    if engine.cursor.peek_is("{") {
        engine.cursor.expect("{")?;
        loop {
            let line = engine.cursor.line();
            files.push((engine.cursor.expect_string()?, line));
            if engine.cursor.peek_is(",") {
                engine.cursor.expect(",")?;
            } else {
                break;
            }
        }
        engine.cursor.expect("}")?;
    } else {
        let file = engine.cursor.expect_string()?;
        files.push((file, engine.cursor.line()));
    }
    engine.cursor.expect(";")?;
    for (file, line) in files {
        let name = material_law_name(&file);
        if !super::tokenizer::is_identifier(&name) {
            return Err(CompileError::syntax(
                format!("invalid material law file '{}'", file),
                line,
            ));
        }
        engine.bd.add_material_law(MaterialLaw { name, file, line })?;
    }
    Ok(())
}

fn parse_hypothesis(token: &Token) -> Result<ModellingHypothesis, CompileError> {
    let name = match token.kind {
        TokenKind::String => unquote(&token.value),
        _ => token.value.clone(),
    };
    match name.parse::<ModellingHypothesis>() {
        Ok(ModellingHypothesis::UndefinedHypothesis) | Err(_) => Err(CompileError::syntax(
            format!("invalid modelling hypothesis '{}'", name),
            token.line,
        )),
        Ok(h) => Ok(h),
    }
}

fn treat_modelling_hypothesis(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    let name = engine.cursor.next_or_eof("a modelling hypothesis")?;
    engine.cursor.expect(";")?;
    let h = parse_hypothesis(&name)?;
    engine.bd.set_hypotheses(BTreeSet::from([h]), token.line)
}

fn treat_modelling_hypotheses(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    engine.cursor.expect("{")?;
    let mut hypotheses = BTreeSet::new();
    loop {
        let name = engine.cursor.next_or_eof("a modelling hypothesis")?;
        if name.kind == TokenKind::String && unquote(&name.value) == ".+" {
            hypotheses.extend(engine.bd.family.supported_hypotheses.iter().copied());
        } else if !hypotheses.insert(parse_hypothesis(&name)?) {
            return Err(CompileError::syntax(
                format!("modelling hypothesis '{}' given twice", name.value),
                name.line,
            ));
        }
        let next = engine.cursor.next_or_eof("'}'")?;
        if next.is("}") {
            break;
        }
        if !next.is(",") {
            return Err(CompileError::syntax(
                format!("expected ',' or '}}', read '{}'", next.value),
                next.line,
            ));
        }
    }
    engine.cursor.expect(";")?;
    engine.bd.set_hypotheses(hypotheses, token.line)
}

fn treat_orthotropic_behaviour(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    engine.cursor.expect(";")?;
    engine.bd.set_orthotropic(token.line)
}

/// `type name[size], name2;`
fn treat_variables(engine: &mut DslEngine<'_>, category: VariableCategory) -> Result<(), CompileError> {
    let doc = engine.cursor.take_doc();
    let type_name = engine.cursor.expect_identifier()?;
    loop {
        let name = engine.cursor.expect_identifier()?;
        let mut array_size = 1;
        if engine.cursor.peek_is("[") {
            engine.cursor.expect("[")?;
            array_size = engine.cursor.expect_unsigned()?;
            engine.cursor.expect("]")?;
        }
        let mut variable = Variable::new(&name.value, &type_name.value, category, name.line)
            .with_array_size(array_size);
        variable.description = doc.clone();
        engine.bd.add_variable(variable)?;
        let next = engine.cursor.next_or_eof("';'")?;
        if next.is(";") {
            return Ok(());
        }
        if !next.is(",") {
            return Err(CompileError::syntax(
                format!("expected ',' or ';', read '{}'", next.value),
                next.line,
            ));
        }
    }
}

fn treat_material_property(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_variables(engine, VariableCategory::MaterialProperty)
}

fn treat_state_variable(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_variables(engine, VariableCategory::StateVariable)
}

fn treat_auxiliary_state_variable(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_variables(engine, VariableCategory::AuxiliaryStateVariable)
}

fn treat_external_state_variable(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_variables(engine, VariableCategory::ExternalStateVariable)
}

fn treat_local_variable(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_variables(engine, VariableCategory::LocalVariable)
}

/// a value or a braced list of values
fn read_values(engine: &mut DslEngine<'_>) -> Result<Vec<f64>, CompileError> {
    if !engine.cursor.peek_is("{") {
        return Ok(vec![engine.cursor.expect_number()?]);
    }
    engine.cursor.expect("{")?;
    let mut values = Vec::new();
    loop {
        values.push(engine.cursor.expect_number()?);
        let next = engine.cursor.next_or_eof("'}'")?;
        if next.is("}") {
            return Ok(values);
        }
        if !next.is(",") {
            return Err(CompileError::syntax(
                format!("expected ',' or '}}', read '{}'", next.value),
                next.line,
            ));
        }
    }
}

/// `[type] name[size] = value;`, the type defaults to `real`
fn treat_valued_variables(
    engine: &mut DslEngine<'_>,
    category: VariableCategory,
    default_type: Option<&str>,
) -> Result<(), CompileError> {
    let doc = engine.cursor.take_doc();
    let first = engine.cursor.expect_identifier()?;
    let type_given = engine.cursor.peek().is_some_and(|t| t.is_identifier());
    let type_name = match (type_given, default_type) {
        (true, _) => first.value.clone(),
        (false, Some(default_type)) => default_type.to_string(),
        (false, None) => {
            return Err(CompileError::syntax(
                format!("expected a type before '{}'", first.value),
                first.line,
            ))
        }
    };
    let mut name = if type_given {
        engine.cursor.expect_identifier()?
    } else {
        first
    };
    loop {
        let mut array_size = 1;
        if engine.cursor.peek_is("[") {
            engine.cursor.expect("[")?;
            array_size = engine.cursor.expect_unsigned()?;
            engine.cursor.expect("]")?;
        }
        engine.cursor.expect("=")?;
        let values = read_values(engine)?;
        if values.len() != array_size {
            return Err(CompileError::syntax(
                format!(
                    "'{}' expects {} value(s), {} given",
                    name.value,
                    array_size,
                    values.len()
                ),
                name.line,
            ));
        }
        if category == VariableCategory::StaticVariable && type_name == "int" && values.iter().any(|v| v.fract() != 0.0) {
            return Err(CompileError::syntax(
                format!("'{}' must be given an integer value", name.value),
                name.line,
            ));
        }
        let mut variable = Variable::new(&name.value, &type_name, category, name.line)
            .with_array_size(array_size)
            .with_values(values);
        variable.description = doc.clone();
        engine.bd.add_variable(variable)?;
        let next = engine.cursor.next_or_eof("';'")?;
        if next.is(";") {
            return Ok(());
        }
        if !next.is(",") {
            return Err(CompileError::syntax(
                format!("expected ',' or ';', read '{}'", next.value),
                next.line,
            ));
        }
        name = engine.cursor.expect_identifier()?;
    }
}

fn treat_parameter(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_valued_variables(engine, VariableCategory::Parameter, Some("real"))
}

fn treat_static_variable(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_valued_variables(engine, VariableCategory::StaticVariable, None)
}

fn treat_integer_constant(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    if engine.cursor.peek_nth(1).is_some_and(|t| t.is_identifier()) {
        return Err(CompileError::syntax(
            "@IntegerConstant does not take a type",
            token.line,
        ));
    }
    treat_valued_variables(engine, VariableCategory::StaticVariable, Some("int"))
}

/// `name.setGlossaryName("...");` and `name.setEntryName("...");`
pub(crate) fn treat_method_call(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    engine.cursor.expect(".")?;
    let method = engine.cursor.expect_identifier()?;
    engine.cursor.expect("(")?;
    let value = engine.cursor.expect_string()?;
    engine.cursor.expect(")")?;
    engine.cursor.expect(";")?;
    match method.value.as_str() {
        "setGlossaryName" => engine.bd.set_glossary_name(&token.value, &value, token.line),
        "setEntryName" => engine.bd.set_entry_name(&token.value, &value, token.line),
        _ => Err(CompileError::syntax(
            format!("unknown method '{}'", method.value),
            method.line,
        )),
    }
}

fn read_bound(engine: &mut DslEngine<'_>) -> Result<Option<f64>, CompileError> {
    if engine.cursor.peek_is("*") {
        engine.cursor.expect("*")?;
        Ok(None)
    } else {
        engine.cursor.expect_number().map(Some)
    }
}

/// `name[(component)] in [lower:upper];`, `*` standing for an infinite bound
fn treat_bounds_description(engine: &mut DslEngine<'_>, category: BoundsCategory) -> Result<(), CompileError> {
    let name = engine.cursor.expect_identifier()?;
    let mut component = None;
    if engine.cursor.peek_is("(") {
        engine.cursor.expect("(")?;
        component = Some(engine.cursor.expect_unsigned()?);
        engine.cursor.expect(")")?;
    }
    engine.cursor.expect("in")?;
    let open = engine.cursor.next_or_eof("'['")?;
    if !(open.is("[") || open.is("]")) {
        return Err(CompileError::syntax(
            format!("expected '[' or ']', read '{}'", open.value),
            open.line,
        ));
    }
    let lower = read_bound(engine)?;
    engine.cursor.expect(":")?;
    let upper = read_bound(engine)?;
    let close = engine.cursor.next_or_eof("']'")?;
    if !(close.is("[") || close.is("]")) {
        return Err(CompileError::syntax(
            format!("expected '[' or ']', read '{}'", close.value),
            close.line,
        ));
    }
    engine.cursor.expect(";")?;
    let bounds = BoundsDescription::new(&name.value, component, category, lower, upper, name.line)?;
    engine.bd.add_bounds(bounds)
}

fn treat_bounds(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_bounds_description(engine, BoundsCategory::Standard)
}

fn treat_physical_bounds(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_bounds_description(engine, BoundsCategory::Physical)
}

struct BlockOptions {
    hypotheses: Vec<ModellingHypothesis>,
    is_override: bool,
}

/// `<Hypothesis, ..., Override>` after a code block keyword
fn read_block_options(engine: &mut DslEngine<'_>) -> Result<BlockOptions, CompileError> {
    let mut options = BlockOptions {
        hypotheses: Vec::new(),
        is_override: false,
    };
    if !engine.cursor.peek_is("<") {
        return Ok(options);
    }
    engine.cursor.expect("<")?;
    loop {
        let option = engine.cursor.next_or_eof("'>'")?;
        match option.value.as_str() {
            "Override" | "override" => options.is_override = true,
            _ => options.hypotheses.push(parse_hypothesis(&option)?),
        }
        let next = engine.cursor.next_or_eof("'>'")?;
        if next.is(">") {
            return Ok(options);
        }
        if !next.is(",") {
            return Err(CompileError::syntax(
                format!("expected ',' or '>', read '{}'", next.value),
                next.line,
            ));
        }
    }
}

fn treat_code_block(
    engine: &mut DslEngine<'_>,
    token: &Token,
    role: CodeBlockRole,
    flow: Option<FlowKind>,
) -> Result<(), CompileError> {
    let options = read_block_options(engine)?;
    let body = engine.cursor.read_block()?;
    let hypotheses = if options.hypotheses.is_empty() {
        vec![ModellingHypothesis::UndefinedHypothesis]
    } else {
        options.hypotheses
    };
    let blocks = hypotheses
        .into_iter()
        .map(|hypothesis| {
            let mut block = CodeBlock::new(role, hypothesis, body.clone(), token.line);
            block.is_override = options.is_override;
            block.flow = flow;
            block
        })
        .collect();
    engine.bd.add_code_blocks(blocks)
}

fn treat_init_local_variables(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    treat_code_block(engine, token, CodeBlockRole::InitLocalVars, None)
}

fn treat_predictor(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    treat_code_block(engine, token, CodeBlockRole::Predictor, None)
}

fn treat_compute_stress(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    treat_code_block(engine, token, CodeBlockRole::ComputeStress, None)
}

fn treat_compute_final_stress(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    treat_code_block(engine, token, CodeBlockRole::ComputeFinalStress, None)
}

fn treat_integrator(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    treat_code_block(engine, token, CodeBlockRole::Integrator, None)
}

fn treat_flow_rule(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    if engine.bd.algorithm.kind != AlgorithmKind::MultipleIsotropicMisesFlows {
        return treat_code_block(engine, token, CodeBlockRole::FlowRule, None);
    }
    let kind = engine.cursor.expect_identifier()?;
    let flow = FlowKind::from_name(&kind.value).ok_or_else(|| {
        CompileError::syntax(
            format!("unknown flow '{}', expected Creep, StrainHardeningCreep or Plasticity", kind.value),
            kind.line,
        )
    })?;
    let index = engine.bd.number_of_flows();
    treat_code_block(engine, token, CodeBlockRole::Flow(index), Some(flow))
}

fn treat_derivative(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    treat_code_block(engine, token, CodeBlockRole::ComputeDerivative, None)
}

fn treat_initialize_jacobian(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    treat_code_block(engine, token, CodeBlockRole::InitializeJacobian, None)
}

fn treat_tangent_operator(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    treat_code_block(engine, token, CodeBlockRole::TangentOperator, None)
}

fn treat_update_auxiliary_state_variables(engine: &mut DslEngine<'_>, token: &Token) -> Result<(), CompileError> {
    treat_code_block(engine, token, CodeBlockRole::UpdateAuxiliaryStateVariables, None)
}

fn treat_algorithm_parameter(engine: &mut DslEngine<'_>, parameter: AlgorithmParameter) -> Result<(), CompileError> {
    let line = engine.cursor.line();
    let value = engine.cursor.expect_number()?;
    engine.cursor.expect(";")?;
    engine.bd.algorithm.set(parameter, value, line)
}

fn treat_theta(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_algorithm_parameter(engine, AlgorithmParameter::Theta)
}

fn treat_epsilon(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_algorithm_parameter(engine, AlgorithmParameter::Epsilon)
}

fn treat_iter_max(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_algorithm_parameter(engine, AlgorithmParameter::IterMax)
}

fn treat_max_sub_steps(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_algorithm_parameter(engine, AlgorithmParameter::MaxSubSteps)
}

fn treat_perturbation_value(engine: &mut DslEngine<'_>, _token: &Token) -> Result<(), CompileError> {
    treat_algorithm_parameter(engine, AlgorithmParameter::NumericalJacobianEpsilon)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_are_registered() {
        let table = standard_keywords();
        for keyword in ["@Coef", "@StateVar", "@InitLocalVars", "@MaximumNumberOfIterations", "@DSL"] {
            assert!(table.contains(keyword), "{}", keyword);
        }
        assert_eq!(table.get("@Coef").map(|(_, c)| c), Some("@MaterialProperty"));
    }

    #[test]
    fn material_law_names() {
        assert_eq!(material_law_name("UO2_YoungModulus.mfront"), "UO2_YoungModulus");
        assert_eq!(material_law_name("laws/SiC_Conductivity.mfront"), "SiC_Conductivity");
    }
}
