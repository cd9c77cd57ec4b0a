//! `required` rule

use serde_json::Value;

use super::{CheckContext, Outcome, Validator};

/// Rejects a missing value when the field is required.
///
/// Only `null`/absent counts as missing here; `""`, `0` and `false` are
/// values and are left to the later rules.
#[derive(Debug, Default)]
pub struct RequiredValidator;

impl Validator for RequiredValidator {
    fn name(&self) -> &'static str {
        "required"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Option<Outcome> {
        if ctx.rules.is_required() && matches!(ctx.value, Value::Null) {
            return Some(Outcome::Fail);
        }
        None
    }
}
