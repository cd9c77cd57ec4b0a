//! Array rules

use serde_json::Value;

use super::{CheckContext, Condition, Outcome, Validator, link_check};

const CONDITIONS: &[Condition] = &[max_items, min_items, each_element];

fn items<'a>(ctx: &CheckContext<'a>) -> &'a [Value] {
    ctx.value.as_array().map(Vec::as_slice).unwrap_or_default()
}

fn max_items(ctx: &CheckContext<'_>) -> Option<Outcome> {
    let max = ctx.rules.max_items?;
    (items(ctx).len() as u64 > max).then_some(Outcome::Fail)
}

fn min_items(ctx: &CheckContext<'_>) -> Option<Outcome> {
    let min = ctx.rules.min_items?;
    ((items(ctx).len() as u64) < min).then_some(Outcome::Fail)
}

// An element's auth outcome does not reject the array.
fn each_element(ctx: &CheckContext<'_>) -> Option<Outcome> {
    items(ctx)
        .iter()
        .any(|item| ctx.recheck(item, ctx.rules) == Outcome::Fail)
        .then_some(Outcome::Fail)
}

/// Applies `maxItems`/`minItems` to arrays, then re-checks every element
/// against the same rule set through the full chain.
#[derive(Debug, Default)]
pub struct ArrayValidator;

impl Validator for ArrayValidator {
    fn name(&self) -> &'static str {
        "array"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Option<Outcome> {
        if !ctx.value.is_array() {
            return None;
        }
        link_check(CONDITIONS, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RuleSet;
    use crate::rules::testing::run;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case(json!([1, 2, 3]), Some(2), None, Some(Outcome::Fail))]
    #[case(json!([1, 2]), Some(2), None, None)]
    #[case(json!([1]), None, Some(2), Some(Outcome::Fail))]
    #[case(json!([1, 2]), None, Some(2), None)]
    #[case(json!([]), None, Some(1), Some(Outcome::Fail))]
    fn test_item_counts(
        #[case] value: Value,
        #[case] max_items: Option<u64>,
        #[case] min_items: Option<u64>,
        #[case] expected: Option<Outcome>,
    ) {
        let rules = RuleSet {
            max_items,
            min_items,
            ..Default::default()
        };
        assert_eq!(run(&ArrayValidator, &value, &rules, None), expected);
    }

    #[test]
    fn test_non_array_defers() {
        let rules = RuleSet {
            min_items: Some(5),
            ..Default::default()
        };
        assert_eq!(run(&ArrayValidator, &json!("abc"), &rules, None), None);
    }

    #[test]
    fn test_single_bad_element_fails_array() {
        let nested_limit = RuleSet {
            max_items: Some(3),
            ..Default::default()
        };
        let outcome = run(&ArrayValidator, &json!([[1], [1, 2, 3, 4]]), &nested_limit, None);
        assert_eq!(outcome, Some(Outcome::Fail));
    }
}
