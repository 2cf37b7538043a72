//! `${var}` substitution plus a tiny comparison/equality grammar, used only
//! by Reference Nodes in CONDITIONAL and LOOP modes (§4.8).

use dagforge_context::ExecutionContext;

use crate::error::ExpressionError;

const COMPARISON_OPS: [&str; 4] = ["==", "!=", "<=", ">="];
const ORDERING_OPS: [&str; 2] = ["<", ">"];

/// Evaluate `expr` against `ctx`. Never fails: a malformed expression or a
/// non-numeric comparison operand logs a `tracing::warn!` and evaluates to
/// `false`.
pub fn evaluate(expr: &str, ctx: &ExecutionContext) -> bool {
    let substituted = substitute(expr, ctx);
    match parse_and_eval(&substituted) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(expression = %expr, error = %err, "expression evaluation failed");
            false
        }
    }
}

/// Replace every `${name}` with the stringified value of `ctx.get(name)`;
/// absent or null becomes the literal `null`.
fn substitute(expr: &str, ctx: &ExecutionContext) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut rest = expr;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                out.push_str(&stringify(ctx.get(name)));
                rest = &after[end + 1..];
            }
            None => {
                // Unterminated placeholder: emit it verbatim and stop.
                out.push_str(&rest[start..]);
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

fn stringify(value: Option<serde_json::Value>) -> String {
    match value {
        None | Some(serde_json::Value::Null) => "null".to_string(),
        Some(serde_json::Value::String(s)) => s,
        Some(other) => other.to_string(),
    }
}

fn parse_and_eval(expr: &str) -> Result<bool, ExpressionError> {
    let trimmed = expr.trim();

    if let Some((op, idx)) = find_first_op(trimmed, &COMPARISON_OPS) {
        let (lhs, rhs) = split_at_op(trimmed, idx, op.len());
        return eval_comparison(op, lhs, rhs);
    }
    if let Some((op, idx)) = find_first_op(trimmed, &ORDERING_OPS) {
        let (lhs, rhs) = split_at_op(trimmed, idx, op.len());
        return eval_comparison(op, lhs, rhs);
    }

    match trimmed.to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ExpressionError::NotAnExpression(trimmed.to_string())),
    }
}

fn find_first_op<'a>(haystack: &str, ops: &[&'a str]) -> Option<(&'a str, usize)> {
    ops.iter()
        .filter_map(|&op| haystack.find(op).map(|idx| (op, idx)))
        .min_by_key(|&(_, idx)| idx)
}

fn split_at_op(expr: &str, idx: usize, op_len: usize) -> (&str, &str) {
    (expr[..idx].trim(), expr[idx + op_len..].trim())
}

fn eval_comparison(op: &str, lhs: &str, rhs: &str) -> Result<bool, ExpressionError> {
    match op {
        "==" => Ok(strip_quotes(lhs) == strip_quotes(rhs)),
        "!=" => Ok(strip_quotes(lhs) != strip_quotes(rhs)),
        "<" | "<=" | ">" | ">=" => {
            let l: f64 = lhs
                .parse()
                .map_err(|_| ExpressionError::NotNumeric(lhs.to_string()))?;
            let r: f64 = rhs
                .parse()
                .map_err(|_| ExpressionError::NotNumeric(rhs.to_string()))?;
            Ok(match op {
                "<" => l < r,
                "<=" => l <= r,
                ">" => l > r,
                ">=" => l >= r,
                _ => unreachable!(),
            })
        }
        _ => unreachable!(),
    }
}

fn strip_quotes(s: &str) -> &str {
    let s = s.trim();
    for quote in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return &s[1..s.len() - 1];
        }
    }
    s
}
