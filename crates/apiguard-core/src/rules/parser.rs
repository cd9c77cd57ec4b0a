//! Keyword parser

use regex::Regex;

use super::{CompileEvent, Parser};

/// Keywords copied verbatim when present, after `required`
const COPIED: &[&str] = &[
    "x-maxLength",
    "x-minLength",
    "minLength",
    "maxLength",
    "maximum",
    "minimum",
    "maxItems",
    "minItems",
    "pattern",
    "enum",
];

/// Folds the curated constraint keywords of a schema node into the check
/// model. Fields without any keyword get no entry.
#[derive(Debug, Default)]
pub struct BasicParser;

impl Parser for BasicParser {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn compile(&self, event: &mut CompileEvent<'_>) -> Option<()> {
        if event.keywords.is_required() {
            event.rules_mut().required = Some(true);
        }

        for key in COPIED {
            let single = event.keywords.only(key);
            if !single.is_empty() {
                event.rules_mut().extend(&single);
            }
        }

        if let Some(pattern) = event.keywords.pattern.as_deref()
            && let Err(e) = Regex::new(pattern)
        {
            tracing::warn!(
                location = %event.location,
                path = event.path,
                error = %e,
                "pattern rule will reject every value"
            );
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CheckModel, Location, RuleSet};
    use serde_json::json;

    fn compile(keywords: &RuleSet) -> CheckModel {
        let mut model = CheckModel::new();
        let mut event = CompileEvent {
            location: Location::Query,
            path: "name",
            keywords,
            model: &mut model,
        };
        assert_eq!(BasicParser.compile(&mut event), None);
        model
    }

    #[test]
    fn test_copies_present_keywords() {
        let keywords = RuleSet {
            required: Some(true),
            max_length: Some(10),
            x_min_length: Some(1),
            pattern: Some("^[a-z]+$".into()),
            enum_values: Some(vec![json!("a")]),
            ..Default::default()
        };
        let model = compile(&keywords);
        assert_eq!(model.rules(Location::Query, "name"), Some(&keywords));
    }

    #[test]
    fn test_required_false_is_not_copied() {
        let keywords = RuleSet {
            required: Some(false),
            minimum: Some(1.0),
            ..Default::default()
        };
        let model = compile(&keywords);
        let rules = model.rules(Location::Query, "name").unwrap();
        assert!(rules.required.is_none());
        assert_eq!(rules.minimum, Some(1.0));
    }

    #[test]
    fn test_no_keywords_no_entry() {
        let model = compile(&RuleSet {
            required: Some(false),
            ..Default::default()
        });
        assert!(model.is_empty());
        assert!(model.section(Location::Query).is_none());
    }

    #[test]
    fn test_existing_entry_is_extended() {
        let mut model = CheckModel::new();
        model.entry(Location::Body, "a").max_items = Some(3);
        let keywords = RuleSet {
            min_length: Some(2),
            ..Default::default()
        };
        let mut event = CompileEvent {
            location: Location::Body,
            path: "a",
            keywords: &keywords,
            model: &mut model,
        };
        BasicParser.compile(&mut event);

        let rules = model.rules(Location::Body, "a").unwrap();
        assert_eq!(rules.max_items, Some(3));
        assert_eq!(rules.min_length, Some(2));
    }
}
