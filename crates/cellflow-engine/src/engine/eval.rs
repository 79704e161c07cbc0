//! Formula evaluation.
//!
//! A formula is reduced to plain arithmetic in three passes:
//!
//! 1. every function call is replaced by its numeric result, innermost first;
//! 2. every remaining cell reference is replaced by its numeric value;
//! 3. the resulting text is checked, tokenized and handed to [`arith`](super::arith).
//!
//! Failures never escape as `Err`: they become a sentinel [`CellValue::Error`]
//! plus a message in the returned [`Evaluation`].

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

use super::arith::evaluate_tokens;
use super::cell::{CellInput, CellValue, ErrorCode};
use super::cell_ref::{CellRef, GridBounds};
use super::deps::{expand_range, extract_references};
use super::format::{format_number, round_result};
use super::parser::{formula_body, tokenize};
use crate::builtins;

/// Read access to current cell values during evaluation.
pub trait ValueSource {
    /// None for a cell that was never written (or has no value).
    fn value(&self, cell: &CellRef) -> Option<CellValue>;
}

impl<F> ValueSource for F
where
    F: Fn(&CellRef) -> Option<CellValue>,
{
    fn value(&self, cell: &CellRef) -> Option<CellValue> {
        self(cell)
    }
}

/// Outcome of evaluating cell input.
#[derive(Clone, Debug, PartialEq)]
pub struct Evaluation {
    pub value: CellValue,
    pub error: Option<String>,
    pub dependencies: Vec<String>,
}

#[derive(Debug)]
struct EvalFailure {
    code: ErrorCode,
    message: String,
}

impl EvalFailure {
    fn new(code: ErrorCode, message: impl Into<String>) -> EvalFailure {
        EvalFailure {
            code,
            message: message.into(),
        }
    }
}

/// Evaluate cell input against current values.
///
/// Literal input evaluates to itself. Formula input fails with `#REF!` before
/// anything is read if it names a cell outside `bounds`.
pub fn evaluate<S>(text: &str, bounds: &GridBounds, source: &S) -> Evaluation
where
    S: ValueSource + ?Sized,
{
    let Some(body) = formula_body(text) else {
        let value = CellInput::from_input(text)
            .literal_value()
            .unwrap_or_else(|| CellValue::Text(text.to_string()));
        return Evaluation {
            value,
            error: None,
            dependencies: Vec::new(),
        };
    };

    let body = body.to_ascii_uppercase();
    let dependencies = extract_references(&body);

    let result = match dependencies
        .iter()
        .find(|name| !bounds.is_valid_reference(name))
    {
        Some(bad) => Err(EvalFailure::new(
            ErrorCode::Ref,
            format!("Invalid cell reference: {}", bad),
        )),
        None => reduce(&body, bounds, source),
    };

    match result {
        Ok(n) => Evaluation {
            value: CellValue::Number(n),
            error: None,
            dependencies,
        },
        Err(failure) => Evaluation {
            value: CellValue::Error(failure.code),
            error: Some(failure.message),
            dependencies,
        },
    }
}

fn reduce<S>(body: &str, bounds: &GridBounds, source: &S) -> Result<f64, EvalFailure>
where
    S: ValueSource + ?Sized,
{
    let expr = resolve_functions(body, bounds, source)?;
    let expr = substitute_references(&expr, bounds, source)?;
    compute(&expr)
}

/// Replace each `NAME(args)` with its numeric result.
fn resolve_functions<S>(body: &str, bounds: &GridBounds, source: &S) -> Result<String, EvalFailure>
where
    S: ValueSource + ?Sized,
{
    let mut expr = body.to_string();

    // The rightmost call never contains another call, so nesting resolves inside-out.
    while let Some((start, open, name)) = last_call(&expr) {
        let close = matching_paren(&expr, open).ok_or_else(|| {
            EvalFailure::new(ErrorCode::Error, format!("Unterminated call to {}", name))
        })?;

        let builtin = builtins::lookup(&name).ok_or_else(|| {
            EvalFailure::new(ErrorCode::Name, format!("Unknown function: {}", name))
        })?;
        let args = collect_arguments(&expr[open + 1..close], bounds, source)?;
        let result = (builtin.apply)(&args);
        if !result.is_finite() {
            return Err(EvalFailure::new(
                ErrorCode::Num,
                format!("{} produced a non-finite result", name),
            ));
        }

        expr.replace_range(start..=close, &number_literal(result));
    }

    Ok(expr)
}

/// Start offset, offset of the opening paren, and name of the rightmost call.
fn last_call(expr: &str) -> Option<(usize, usize, String)> {
    let caps = function_re().captures_iter(expr).last()?;
    let whole = caps.get(0)?;
    Some((whole.start(), whole.end() - 1, caps[1].to_string()))
}

fn matching_paren(expr: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, ch) in expr.char_indices().skip_while(|(idx, _)| *idx < open) {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Flatten call arguments into numbers.
///
/// Ranges and single cells contribute their numeric values; empty and
/// non-numeric cells are skipped. Anything else is evaluated as arithmetic.
fn collect_arguments<S>(args: &str, bounds: &GridBounds, source: &S) -> Result<Vec<f64>, EvalFailure>
where
    S: ValueSource + ?Sized,
{
    let mut values = Vec::new();

    for arg in split_arguments(args) {
        let arg = arg.trim();
        if arg.is_empty() {
            continue;
        }

        if let Some(caps) = range_arg_re().captures(arg) {
            for name in expand_range(&caps[1], &caps[2]) {
                let cell = bounds.resolve(&name).ok_or_else(|| invalid_reference(&name))?;
                values.extend(source.value(&cell).and_then(|v| v.as_number()));
            }
        } else if let Some(cell) = CellRef::from_str(arg) {
            if !bounds.contains(&cell) {
                return Err(invalid_reference(arg));
            }
            values.extend(source.value(&cell).and_then(|v| v.as_number()));
        } else if let Ok(n) = arg.parse::<f64>() {
            values.push(n);
        } else {
            let expr = substitute_references(arg, bounds, source)?;
            values.push(compute(&expr)?);
        }
    }

    Ok(values)
}

fn split_arguments(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (idx, ch) in args.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&args[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&args[start..]);
    parts
}

/// Replace every occurrence of each remaining identifier with its numeric value.
///
/// Never-written cells read as zero; text must parse as a number.
fn substitute_references<S>(expr: &str, bounds: &GridBounds, source: &S) -> Result<String, EvalFailure>
where
    S: ValueSource + ?Sized,
{
    let mut replacements: HashMap<String, String> = HashMap::new();

    for caps in identifier_re().captures_iter(expr) {
        let name = &caps[1];
        if replacements.contains_key(name) {
            continue;
        }
        let cell = bounds.resolve(name).ok_or_else(|| invalid_reference(name))?;
        let number = match source.value(&cell) {
            None => 0.0,
            Some(CellValue::Number(n)) => n,
            Some(CellValue::Text(s)) => s.trim().parse::<f64>().map_err(|_| {
                EvalFailure::new(
                    ErrorCode::Value,
                    format!("Cell {} contains non-numeric value \"{}\"", name, s),
                )
            })?,
            Some(CellValue::Error(code)) => {
                return Err(EvalFailure::new(
                    ErrorCode::Value,
                    format!("Cell {} contains non-numeric value \"{}\"", name, code),
                ));
            }
        };
        replacements.insert(name.to_string(), number_literal(number));
    }

    Ok(identifier_re()
        .replace_all(expr, |caps: &regex::Captures| {
            replacements
                .get(&caps[1])
                .cloned()
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned())
}

/// Evaluate substituted text that may only contain digits, `+ - * / ( ) .` and spaces.
fn compute(expr: &str) -> Result<f64, EvalFailure> {
    if let Some(bad) = expr
        .chars()
        .find(|c| !(c.is_ascii_digit() || "+-*/(). ".contains(*c) || c.is_whitespace()))
    {
        return Err(EvalFailure::new(
            ErrorCode::Value,
            format!("Invalid character '{}' in expression", bad),
        ));
    }

    let n = evaluate_tokens(&tokenize(expr))
        .map_err(|e| EvalFailure::new(ErrorCode::Error, format!("Syntax error: {}", e)))?;
    if !n.is_finite() {
        return Err(EvalFailure::new(
            ErrorCode::Num,
            "Result is not a finite number (division by zero?)",
        ));
    }
    Ok(round_result(n))
}

fn number_literal(n: f64) -> String {
    if n < 0.0 {
        format!("({})", format_number(n))
    } else {
        format_number(n)
    }
}

fn invalid_reference(name: &str) -> EvalFailure {
    EvalFailure::new(ErrorCode::Ref, format!("Invalid cell reference: {}", name))
}

fn function_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Z][A-Z0-9_]*)\(").expect("function call regex must compile"))
}

fn range_arg_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([A-Z][0-9]+)\s*:\s*([A-Z][0-9]+)$").expect("range argument regex must compile")
    })
}

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b([A-Z][0-9]+)\b").expect("identifier regex must compile"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn grid(values: &[(&str, CellValue)]) -> HashMap<CellRef, CellValue> {
        values
            .iter()
            .map(|(name, v)| (CellRef::from_str(name).unwrap(), v.clone()))
            .collect()
    }

    fn eval_with(text: &str, cells: &HashMap<CellRef, CellValue>) -> Evaluation {
        let source = |cell: &CellRef| cells.get(cell).cloned();
        evaluate(text, &GridBounds::default(), &source)
    }

    fn num(n: f64) -> CellValue {
        CellValue::Number(n)
    }

    #[test]
    fn test_literal_evaluates_to_itself() {
        let cells = HashMap::new();
        let result = eval_with("Hello", &cells);
        assert_eq!(result.value, CellValue::Text("Hello".into()));
        assert!(result.dependencies.is_empty());
        assert_eq!(eval_with("12", &cells).value, num(12.0));
    }

    #[test]
    fn test_arithmetic_with_references() {
        let cells = grid(&[("A1", num(10.0)), ("B1", num(4.0))]);
        let result = eval_with("=A1*2 + B1/4", &cells);
        assert_eq!(result.value, num(21.0));
        assert_eq!(result.dependencies, vec!["A1", "B1"]);
    }

    #[test]
    fn test_missing_cells_read_as_zero() {
        let cells = grid(&[("A1", num(5.0))]);
        assert_eq!(eval_with("=A1+C3", &cells).value, num(5.0));
    }

    #[test]
    fn test_every_occurrence_is_substituted_without_touching_longer_names() {
        let cells = grid(&[("A1", num(3.0))]);
        assert_eq!(eval_with("=A1*A1+A1", &cells).value, num(12.0));
    }

    #[test]
    fn test_negative_values_substitute_safely() {
        let cells = grid(&[("A1", num(3.0)), ("B1", num(-2.0))]);
        assert_eq!(eval_with("=A1-B1", &cells).value, num(5.0));
    }

    #[test]
    fn test_numeric_text_is_accepted_in_arithmetic() {
        let cells = grid(&[("A1", CellValue::Text("7".into()))]);
        assert_eq!(eval_with("=A1+1", &cells).value, num(8.0));
    }

    #[test]
    fn test_text_operand_is_value_error() {
        let cells = grid(&[("A1", CellValue::Text("Hello".into())), ("B1", num(1.0))]);
        let result = eval_with("=A1+B1", &cells);
        assert_eq!(result.value, CellValue::Error(ErrorCode::Value));
        assert!(result.error.unwrap().contains("A1"));
    }

    #[test]
    fn test_error_operand_propagates_as_value_error() {
        let cells = grid(&[("A1", CellValue::Error(ErrorCode::Num))]);
        let result = eval_with("=A1*2", &cells);
        assert_eq!(result.value, CellValue::Error(ErrorCode::Value));
        assert!(result.error.unwrap().contains("#NUM!"));
    }

    #[test]
    fn test_division_by_zero_is_num_error() {
        let cells = grid(&[("A1", num(1.0)), ("B1", num(0.0))]);
        assert_eq!(
            eval_with("=A1/B1", &cells).value,
            CellValue::Error(ErrorCode::Num)
        );
    }

    #[test]
    fn test_range_functions() {
        let cells = grid(&[("A1", num(10.0)), ("A2", num(20.0)), ("A3", num(30.0))]);
        assert_eq!(eval_with("=SUM(A1:A3)", &cells).value, num(60.0));
        assert_eq!(eval_with("=AVERAGE(A1:A3)", &cells).value, num(20.0));
        assert_eq!(eval_with("=MIN(A1:A3)", &cells).value, num(10.0));
        assert_eq!(eval_with("=MAX(A1:A3)", &cells).value, num(30.0));
        assert_eq!(eval_with("=COUNT(A1:A3)", &cells).value, num(3.0));
    }

    #[test]
    fn test_function_inside_larger_expression() {
        let cells = grid(&[("A1", num(1.0)), ("A2", num(2.0)), ("A3", num(3.0))]);
        assert_eq!(eval_with("=SUM(A1:A3)*2", &cells).value, num(12.0));
        assert_eq!(eval_with("=(MAX(A1:A3) - MIN(A1:A3)) / 2", &cells).value, num(1.0));
    }

    #[test]
    fn test_aggregates_skip_missing_and_text_cells() {
        let cells = grid(&[("A1", num(4.0)), ("A2", CellValue::Text("x".into()))]);
        assert_eq!(eval_with("=COUNT(A1:A5)", &cells).value, num(1.0));
        assert_eq!(eval_with("=AVERAGE(A1:A3)", &cells).value, num(4.0));
    }

    #[test]
    fn test_mixed_and_nested_arguments() {
        let cells = grid(&[("A1", num(1.0)), ("A2", num(2.0)), ("B1", num(5.0))]);
        assert_eq!(eval_with("=SUM(A1:A2, B1, 10)", &cells).value, num(18.0));
        assert_eq!(eval_with("=SUM(MAX(A1:A2), B1*2)", &cells).value, num(12.0));
        assert_eq!(eval_with("=SUM(A1, -3)", &cells).value, num(-2.0));
    }

    #[test]
    fn test_unknown_function_is_name_error() {
        let cells = grid(&[("A1", num(1.0))]);
        let result = eval_with("=UNKNOWN(A1:A3)", &cells);
        assert_eq!(result.value, CellValue::Error(ErrorCode::Name));
        assert_eq!(result.dependencies, vec!["A1", "A2", "A3"]);
    }

    #[test]
    fn test_empty_average_is_num_error() {
        let cells = HashMap::new();
        assert_eq!(
            eval_with("=AVERAGE(A1:A3)", &cells).value,
            CellValue::Error(ErrorCode::Num)
        );
    }

    #[test]
    fn test_out_of_grid_reference_is_ref_error() {
        let cells = HashMap::new();
        let result = eval_with("=A1+K1", &cells);
        assert_eq!(result.value, CellValue::Error(ErrorCode::Ref));
        assert_eq!(result.dependencies, vec!["A1", "K1"]);
    }

    #[test]
    fn test_disallowed_characters_are_value_error() {
        let cells = HashMap::new();
        assert_eq!(
            eval_with("=1 & 2", &cells).value,
            CellValue::Error(ErrorCode::Value)
        );
    }

    #[test]
    fn test_malformed_arithmetic_is_syntax_error() {
        let cells = HashMap::new();
        assert_eq!(eval_with("=1 +* 2", &cells).value, CellValue::Error(ErrorCode::Error));
        assert_eq!(eval_with("=", &cells).value, CellValue::Error(ErrorCode::Error));
    }

    #[test]
    fn test_deeply_nested_formula_is_an_error_value() {
        let cells = grid(&[("A1", num(1.0))]);
        let text = format!("={}A1{}", "(".repeat(20_000), ")".repeat(20_000));
        let result = eval_with(&text, &cells);
        assert_eq!(result.value, CellValue::Error(ErrorCode::Error));
        assert!(result.error.unwrap_or_default().contains("nested deeper"));
    }

    #[test]
    fn test_results_are_rounded() {
        let cells = HashMap::new();
        assert_eq!(eval_with("=0.1+0.2", &cells).value, num(0.3));
        assert_eq!(eval_with("=10/3", &cells).value, num(3.333333));
    }

    #[test]
    fn test_lowercase_formula() {
        let cells = grid(&[("A1", num(2.0))]);
        assert_eq!(eval_with("=sum(a1:a2)+a1", &cells).value, num(4.0));
    }
}
