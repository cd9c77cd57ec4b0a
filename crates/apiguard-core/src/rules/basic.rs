//! Basic value rules
//!
//! Lengths, numeric bounds, `pattern` and `enum`. After the length
//! conditions, blank values (`null`, `""`, `false`) are accepted outright,
//! so an optional field sent empty never reaches bounds, `pattern` or
//! `enum`. An empty string still fails a minimum length.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{CheckContext, Condition, Outcome, Validator, is_blank, length_of, link_check};

const CONDITIONS: &[Condition] = &[
    max_length,
    min_length,
    x_max_length,
    x_min_length,
    no_value,
    maximum,
    minimum,
    pattern,
    one_of,
];

static PATTERNS: Lazy<RwLock<HashMap<String, Regex>>> = Lazy::new(Default::default);

fn no_value(ctx: &CheckContext<'_>) -> Option<Outcome> {
    is_blank(ctx.value).then_some(Outcome::Pass)
}

fn longer_than(ctx: &CheckContext<'_>, limit: Option<u64>) -> Option<Outcome> {
    let limit = limit?;
    (length_of(ctx.value)? > limit).then_some(Outcome::Fail)
}

fn shorter_than(ctx: &CheckContext<'_>, limit: Option<u64>) -> Option<Outcome> {
    let limit = limit?;
    (length_of(ctx.value)? < limit).then_some(Outcome::Fail)
}

fn max_length(ctx: &CheckContext<'_>) -> Option<Outcome> {
    longer_than(ctx, ctx.rules.max_length)
}

fn min_length(ctx: &CheckContext<'_>) -> Option<Outcome> {
    shorter_than(ctx, ctx.rules.min_length)
}

fn x_max_length(ctx: &CheckContext<'_>) -> Option<Outcome> {
    longer_than(ctx, ctx.rules.x_max_length)
}

fn x_min_length(ctx: &CheckContext<'_>) -> Option<Outcome> {
    shorter_than(ctx, ctx.rules.x_min_length)
}

fn maximum(ctx: &CheckContext<'_>) -> Option<Outcome> {
    let max = ctx.rules.maximum?;
    (numeric_value(ctx.value)? > max).then_some(Outcome::Fail)
}

fn minimum(ctx: &CheckContext<'_>) -> Option<Outcome> {
    let min = ctx.rules.minimum?;
    (numeric_value(ctx.value)? < min).then_some(Outcome::Fail)
}

fn pattern(ctx: &CheckContext<'_>) -> Option<Outcome> {
    let pattern = ctx.rules.pattern.as_deref()?;
    let text = match ctx.value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    match pattern_matches(pattern, &text) {
        Some(true) => None,
        Some(false) | None => Some(Outcome::Fail),
    }
}

fn one_of(ctx: &CheckContext<'_>) -> Option<Outcome> {
    let allowed = ctx.rules.enum_values.as_ref()?;
    (!allowed.iter().any(|candidate| same_value(candidate, ctx.value))).then_some(Outcome::Fail)
}

/// Leading-number parse of a value; `None` when no number can be read.
fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => leading_float(s),
        _ => None,
    }
}

/// Parse the longest numeric prefix of `text`, ignoring leading whitespace.
pub(crate) fn leading_float(text: &str) -> Option<f64> {
    let text = text.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end += 1;
    }
    if text[end..].starts_with("Infinity") {
        return text[..end + "Infinity".len()].replace("Infinity", "inf").parse().ok();
    }

    let digits_from = |start: usize| {
        bytes[start..]
            .iter()
            .take_while(|b| b.is_ascii_digit())
            .count()
    };

    let int_digits = digits_from(end);
    end += int_digits;
    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = digits_from(end + 1);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits + frac_digits == 0 {
        return None;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = digits_from(exp_end);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    text[..end].parse().ok()
}

fn pattern_matches(pattern: &str, text: &str) -> Option<bool> {
    if let Ok(cache) = PATTERNS.read()
        && let Some(regex) = cache.get(pattern)
    {
        return Some(regex.is_match(text));
    }

    match Regex::new(pattern) {
        Ok(regex) => {
            let hit = regex.is_match(text);
            if let Ok(mut cache) = PATTERNS.write() {
                cache.insert(pattern.to_string(), regex);
            }
            Some(hit)
        }
        Err(e) => {
            tracing::error!(pattern, error = %e, "invalid pattern rule");
            None
        }
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Checks lengths, bounds, `pattern` and `enum` on any value.
#[derive(Debug, Default)]
pub struct BasicValidator;

impl Validator for BasicValidator {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Option<Outcome> {
        link_check(CONDITIONS, ctx)
    }
}
