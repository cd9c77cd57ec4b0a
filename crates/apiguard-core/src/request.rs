//! Request-time validation
//!
//! [`validate_request`] runs every field declared in an operation's check
//! model against a live [`RequestContext`]. Sections are checked in the
//! order query, path, header, body; the first failure ends validation.
//!
//! Body paths are resolved against the live body one segment at a time:
//!
//! ```text
//! items[].name   →  body.items[0].name, body.items[1].name, ...
//! $body$         →  the body itself
//! ```
//!
//! An intermediate segment that is missing (or falsy) yields no value, so
//! nothing below it is checked.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::lifecycle::Lifecycle;
use crate::model::{ARRAY_MARKER, BODY_SENTINEL, CheckModel, Location};
use crate::rules::Outcome;

static NULL: Value = Value::Null;

/// Live request sections, as plain key/value maps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestContext {
    /// Query string values
    pub query: Map<String, Value>,
    /// Path parameters
    pub params: Map<String, Value>,
    /// Headers, keyed by lower-cased name
    pub headers: Map<String, Value>,
    /// Parsed body
    pub body: Value,
}

impl RequestContext {
    /// An empty request
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query value
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Add a path parameter
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Add a header (the name is lower-cased)
    pub fn with_header(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Replace the body
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = body;
        self
    }

    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&Value> {
        self.headers.get(&name.to_ascii_lowercase())
    }

    /// Lower-case every header name, for contexts deserialized from raw input
    pub fn normalize_headers(&mut self) {
        let headers = std::mem::take(&mut self.headers);
        self.headers = headers
            .into_iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value))
            .collect();
    }
}

type Step = fn(&Lifecycle, &RequestContext, &CheckModel) -> Option<Outcome>;

const STEPS: &[Step] = &[empty_model, query, path, header, body];

/// Validate a live request against one operation's check model.
pub fn validate_request(lifecycle: &Lifecycle, request: &RequestContext, model: &CheckModel) -> Outcome {
    STEPS
        .iter()
        .find_map(|step| step(lifecycle, request, model))
        .unwrap_or(Outcome::Pass)
}

fn empty_model(_: &Lifecycle, _: &RequestContext, model: &CheckModel) -> Option<Outcome> {
    model.is_empty().then_some(Outcome::Pass)
}

fn keyed_section(
    lifecycle: &Lifecycle,
    model: &CheckModel,
    location: Location,
    values: &Map<String, Value>,
) -> Option<Outcome> {
    for (key, rules) in model.section(location)? {
        let value = values.get(key).unwrap_or(&NULL);
        if lifecycle.check(value, rules, None) == Outcome::Fail {
            tracing::debug!(%location, field = key.as_str(), "request field rejected");
            return Some(Outcome::Fail);
        }
    }
    None
}

fn query(lifecycle: &Lifecycle, request: &RequestContext, model: &CheckModel) -> Option<Outcome> {
    keyed_section(lifecycle, model, Location::Query, &request.query)
}

fn path(lifecycle: &Lifecycle, request: &RequestContext, model: &CheckModel) -> Option<Outcome> {
    keyed_section(lifecycle, model, Location::Path, &request.params)
}

fn header(lifecycle: &Lifecycle, request: &RequestContext, model: &CheckModel) -> Option<Outcome> {
    for (key, rules) in model.section(Location::Header)? {
        let name = key.to_ascii_lowercase();
        let value = request.headers.get(&name).unwrap_or(&NULL);
        match lifecycle.check(value, rules, Some(&name)) {
            Outcome::Pass => {}
            outcome => {
                tracing::debug!(header = name.as_str(), %outcome, "request header rejected");
                return Some(outcome);
            }
        }
    }
    None
}

fn body(lifecycle: &Lifecycle, request: &RequestContext, model: &CheckModel) -> Option<Outcome> {
    for (path, rules) in model.section(Location::Body)? {
        let segments: Vec<&str> = path.split('.').collect();
        let mut found = Vec::new();
        resolve_body(&mut found, &request.body, &segments);

        for value in found {
            if lifecycle.check(value, rules, None) == Outcome::Fail {
                tracing::debug!(field = path.as_str(), "request body field rejected");
                return Some(Outcome::Fail);
            }
        }
    }
    None
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
        _ => false,
    }
}

/// Collect every concrete value a dotted body path reaches.
pub fn resolve_body<'a>(found: &mut Vec<&'a Value>, current: &'a Value, segments: &[&str]) {
    let Some((segment, rest)) = segments.split_first() else {
        return;
    };
    if is_falsy(current) {
        return;
    }

    if rest.is_empty() {
        if *segment == BODY_SENTINEL {
            found.push(current);
        } else {
            let name = segment.strip_suffix(ARRAY_MARKER).unwrap_or(segment);
            found.push(current.get(name).unwrap_or(&NULL));
        }
        return;
    }

    match segment.strip_suffix(ARRAY_MARKER) {
        Some(name) => {
            if let Some(Value::Array(items)) = current.get(name) {
                for item in items {
                    resolve_body(found, item, rest);
                }
            }
        }
        None => {
            if let Some(next) = current.get(*segment) {
                resolve_body(found, next, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use rstest::rstest;
    use serde_json::json;

    fn model(json: Value) -> CheckModel {
        serde_json::from_value(json).unwrap()
    }

    fn token(expires_at: &str) -> String {
        let text = format!(r#"{{"token":{{"user":"ann","expires_at":"{expires_at}"}}}}"#);
        STANDARD.encode(text).replace('/', "-")
    }

    #[test]
    fn test_empty_model_passes() {
        let lifecycle = Lifecycle::default();
        let outcome = validate_request(&lifecycle, &RequestContext::new(), &CheckModel::new());
        assert_eq!(outcome, Outcome::Pass);
    }

    #[rstest]
    #[case(Some(json!(0)), Outcome::Fail)]
    #[case(Some(json!("0")), Outcome::Fail)]
    #[case(None, Outcome::Fail)]
    #[case(Some(json!("3")), Outcome::Pass)]
    fn test_query_page(#[case] page: Option<Value>, #[case] expected: Outcome) {
        let lifecycle = Lifecycle::default();
        let rules = model(json!({"query": {"page": {"required": true, "minimum": 1}}}));
        let mut request = RequestContext::new();
        if let Some(page) = page {
            request = request.with_query("page", page);
        }
        assert_eq!(validate_request(&lifecycle, &request, &rules), expected);
    }

    #[test]
    fn test_path_param_checked() {
        let lifecycle = Lifecycle::default();
        let rules = model(json!({"path": {"id": {"pattern": "^[0-9]+$"}}}));
        let good = RequestContext::new().with_param("id", "42");
        let bad = RequestContext::new().with_param("id", "abc");
        assert_eq!(validate_request(&lifecycle, &good, &rules), Outcome::Pass);
        assert_eq!(validate_request(&lifecycle, &bad, &rules), Outcome::Fail);
    }

    #[test]
    fn test_array_element_leaf_fails_whole_body() {
        let lifecycle = Lifecycle::default();
        let rules = model(json!({"body": {"items[].name": {"minLength": 1, "required": true}}}));

        let body = json!({"items": [{"name": "a"}, {"name": ""}]});
        let request = RequestContext::new().with_body(body);
        assert_eq!(validate_request(&lifecycle, &request, &rules), Outcome::Fail);

        let body = json!({"items": [{"name": "a"}, {"name": "b"}]});
        let request = RequestContext::new().with_body(body);
        assert_eq!(validate_request(&lifecycle, &request, &rules), Outcome::Pass);

        let body = json!({"items": [{"name": "a"}, {}]});
        let request = RequestContext::new().with_body(body);
        assert_eq!(validate_request(&lifecycle, &request, &rules), Outcome::Fail);
    }

    #[test]
    fn test_array_element_leaf_min_length() {
        let lifecycle = Lifecycle::default();
        let rules = model(json!({"body": {"items[].name": {"minLength": 2}}}));

        let body = json!({"items": [{"name": "ab"}, {"name": "c"}]});
        let request = RequestContext::new().with_body(body);
        assert_eq!(validate_request(&lifecycle, &request, &rules), Outcome::Fail);

        let body = json!({"items": [{"name": "ab"}, {"name": "cd"}]});
        let request = RequestContext::new().with_body(body);
        assert_eq!(validate_request(&lifecycle, &request, &rules), Outcome::Pass);
    }

    #[test]
    fn test_expired_token_is_unauthorized() {
        let lifecycle = Lifecycle::default();
        let rules = model(json!({"header": {"X-Auth-Token": {"required": true}}}));

        let request = RequestContext::new().with_header("X-Auth-Token", token("2001-01-01T00:00:00Z"));
        assert_eq!(validate_request(&lifecycle, &request, &rules), Outcome::Unauthorized);

        let request = RequestContext::new().with_header("x-auth-token", token("2999-01-01T00:00:00Z"));
        assert_eq!(validate_request(&lifecycle, &request, &rules), Outcome::Pass);

        // absent header is an ordinary required failure
        assert_eq!(validate_request(&lifecycle, &RequestContext::new(), &rules), Outcome::Fail);
    }

    #[test]
    fn test_unauthorized_stops_before_body() {
        let lifecycle = Lifecycle::default();
        let rules = model(json!({
            "header": {"x-auth-token": {"required": true}},
            "body": {"name": {"required": true}}
        }));
        let request = RequestContext::new().with_header("x-auth-token", "garbage");
        assert_eq!(validate_request(&lifecycle, &request, &rules), Outcome::Unauthorized);
    }

    #[test]
    fn test_whole_body_sentinel() {
        let lifecycle = Lifecycle::default();
        let rules = model(json!({"body": {"$body$": {"maxLength": 3}}}));
        let request = RequestContext::new().with_body(json!("abcd"));
        assert_eq!(validate_request(&lifecycle, &request, &rules), Outcome::Fail);
        let request = RequestContext::new().with_body(json!("abc"));
        assert_eq!(validate_request(&lifecycle, &request, &rules), Outcome::Pass);
    }

    #[test]
    fn test_missing_intermediate_object_checks_nothing() {
        let lifecycle = Lifecycle::default();
        let rules = model(json!({"body": {"owner.name": {"required": true}}}));
        let request = RequestContext::new().with_body(json!({"other": 1}));
        assert_eq!(validate_request(&lifecycle, &request, &rules), Outcome::Pass);

        let request = RequestContext::new().with_body(json!({"owner": {"age": 3}}));
        assert_eq!(validate_request(&lifecycle, &request, &rules), Outcome::Fail);
    }

    #[test]
    fn test_resolve_body_fans_out_nested_arrays() {
        let body = json!({
            "groups": [
                {"members": [{"id": 1}, {"id": 2}]},
                {"members": []},
                {"members": [{"id": 3}]}
            ]
        });
        let mut found = Vec::new();
        resolve_body(&mut found, &body, &["groups[]", "members[]", "id"]);
        assert_eq!(found, vec![&json!(1), &json!(2), &json!(3)]);
    }

    #[test]
    fn test_resolve_body_terminal_array_yields_the_array() {
        let body = json!({"tags": ["a", "b"]});
        let mut found = Vec::new();
        resolve_body(&mut found, &body, &["tags[]"]);
        assert_eq!(found, vec![&json!(["a", "b"])]);
    }

    #[test]
    fn test_normalize_headers() {
        let mut request: RequestContext =
            serde_json::from_value(json!({"headers": {"X-Trace": "1"}})).unwrap();
        assert!(request.header("x-trace").is_none());
        request.normalize_headers();
        assert_eq!(request.header("X-TRACE"), Some(&json!("1")));
        assert_eq!(request.body, Value::Null);
    }
}
