//! Auth token rule
//!
//! The token header carries base64 text (with `-` standing in for `/`).
//! Somewhere in the decoded text is a `{"token":{...}}` object whose
//! `expires_at` says when the token stops being accepted.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use super::{CheckContext, Outcome, Validator};

/// Header name used when none is configured
pub const DEFAULT_TOKEN_HEADER: &str = "x-auth-token";

// Padding is optional and stray trailing bits are tolerated.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

static TOKEN_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\{\s*"token"\s*:\{[\s\S]*\}\s*\}"#).expect("token regex is valid")
});

/// Decode a raw header value into its `token` object
pub fn decode_token(raw: &str) -> Option<Value> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '-' { '/' } else { c })
        .collect();
    let bytes = LENIENT.decode(cleaned).ok()?;
    let text = String::from_utf8_lossy(&bytes);

    let found = TOKEN_OBJECT.find(&text)?;
    let mut wrapper: Value = serde_json::from_str(found.as_str()).ok()?;
    match wrapper.get_mut("token").map(Value::take) {
        Some(Value::Null) | None => None,
        Some(token) => Some(token),
    }
}

/// Read a timestamp as RFC 3339, a naive UTC date/time, or epoch milliseconds
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if let Ok(at) = DateTime::parse_from_rfc3339(text) {
                return Some(at.with_timezone(&Utc));
            }
            for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
                if let Ok(at) = NaiveDateTime::parse_from_str(text, format) {
                    return Some(at.and_utc());
                }
            }
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|day| day.and_hms_opt(0, 0, 0))
                .map(|at| at.and_utc())
        }
        Value::Number(millis) => millis
            .as_i64()
            .or_else(|| millis.as_f64().map(|m| m as i64))
            .and_then(DateTime::<Utc>::from_timestamp_millis),
        _ => None,
    }
}

/// When the encoded token expires, if it can be read at all
pub fn token_expiry(raw: &str) -> Option<DateTime<Utc>> {
    let token = decode_token(raw)?;
    parse_timestamp(token.get("expires_at")?)
}

/// Whether the encoded token is readable and still valid at `now`
pub fn is_token_valid(raw: &str, now: DateTime<Utc>) -> bool {
    matches!(token_expiry(raw), Some(expires_at) if expires_at > now)
}

/// Checks the encoded token on the configured header.
///
/// Only fires for a required field whose header name matches; everything
/// else is deferred. A bad token yields [`Outcome::Unauthorized`].
#[derive(Debug)]
pub struct TokenValidator {
    header: String,
}

impl TokenValidator {
    /// Validator for tokens on `header` (matched lower-cased)
    pub fn new(header: impl Into<String>) -> Self {
        Self {
            header: header.into().to_ascii_lowercase(),
        }
    }

    /// Header this validator watches
    pub fn header(&self) -> &str {
        &self.header
    }
}

impl Default for TokenValidator {
    fn default() -> Self {
        Self::new(DEFAULT_TOKEN_HEADER)
    }
}

impl Validator for TokenValidator {
    fn name(&self) -> &'static str {
        "token"
    }

    fn check(&self, ctx: &CheckContext<'_>) -> Option<Outcome> {
        if !ctx.rules.is_required() || ctx.value.is_null() || ctx.key != Some(self.header.as_str()) {
            return None;
        }

        let valid = ctx
            .value
            .as_str()
            .is_some_and(|raw| is_token_valid(raw, Utc::now()));
        if valid {
            None
        } else {
            tracing::debug!(header = %self.header, "rejecting auth token");
            Some(Outcome::Unauthorized)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RuleSet;
    use crate::rules::testing::run;
    use base64::engine::general_purpose::STANDARD;
    use chrono::TimeZone;
    use rstest::rstest;
    use serde_json::json;

    fn encode(text: &str) -> String {
        STANDARD.encode(text).replace('/', "-")
    }

    fn required() -> RuleSet {
        RuleSet {
            required: Some(true),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_token_finds_embedded_object() {
        let raw = encode(r#"v1|{"token":{"user":"ann","expires_at":"2099-01-01T00:00:00Z"}}|sig"#);
        let token = decode_token(&raw).unwrap();
        assert_eq!(token["user"], "ann");
    }

    #[rstest]
    #[case("not base64 at all!!")]
    #[case("")]
    fn test_decode_token_rejects_garbage(#[case] raw: &str) {
        assert!(decode_token(raw).is_none());
    }

    #[test]
    fn test_decode_token_without_wrapper() {
        let raw = encode(r#"{"expires_at":"2099-01-01"}"#);
        assert!(decode_token(&raw).is_none());
    }

    #[test]
    fn test_decode_token_accepts_missing_padding() {
        let raw = encode(r#"{"token":{"a":1}}"#);
        let unpadded = raw.trim_end_matches('=');
        assert_eq!(decode_token(unpadded), Some(json!({"a": 1})));
    }

    #[rstest]
    #[case(json!("2030-05-01T10:00:00Z"), Utc.with_ymd_and_hms(2030, 5, 1, 10, 0, 0).unwrap())]
    #[case(json!("2030-05-01T12:00:00+02:00"), Utc.with_ymd_and_hms(2030, 5, 1, 10, 0, 0).unwrap())]
    #[case(json!("2030-05-01 10:00:00"), Utc.with_ymd_and_hms(2030, 5, 1, 10, 0, 0).unwrap())]
    #[case(json!("2030-05-01"), Utc.with_ymd_and_hms(2030, 5, 1, 0, 0, 0).unwrap())]
    #[case(json!(1_000), Utc.with_ymd_and_hms(1970, 1, 1, 0, 0, 1).unwrap())]
    fn test_parse_timestamp(#[case] value: Value, #[case] expected: DateTime<Utc>) {
        assert_eq!(parse_timestamp(&value), Some(expected));
    }

    #[test]
    fn test_parse_timestamp_rejects_nonsense() {
        assert!(parse_timestamp(&json!("tomorrow")).is_none());
        assert!(parse_timestamp(&json!(true)).is_none());
    }

    #[test]
    fn test_token_validity_against_now() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let live = encode(r#"{"token":{"expires_at":"2025-01-02T00:00:00Z"}}"#);
        let dead = encode(r#"{"token":{"expires_at":"2024-12-31T00:00:00Z"}}"#);
        let edge = encode(r#"{"token":{"expires_at":"2025-01-01T00:00:00Z"}}"#);
        let none = encode(r#"{"token":{"user":"ann"}}"#);

        assert!(is_token_valid(&live, now));
        assert!(!is_token_valid(&dead, now));
        assert!(!is_token_valid(&edge, now));
        assert!(!is_token_valid(&none, now));
    }

    #[test]
    fn test_validator_rejects_expired_token() {
        let raw = encode(r#"{"token":{"expires_at":"2001-01-01T00:00:00Z"}}"#);
        let outcome = run(&TokenValidator::default(), &json!(raw), &required(), Some("x-auth-token"));
        assert_eq!(outcome, Some(Outcome::Unauthorized));
    }

    #[test]
    fn test_validator_defers_on_live_token() {
        let raw = encode(r#"{"token":{"expires_at":"2999-01-01T00:00:00Z"}}"#);
        let outcome = run(&TokenValidator::default(), &json!(raw), &required(), Some("x-auth-token"));
        assert_eq!(outcome, None);
    }

    #[test]
    fn test_validator_ignores_other_headers_and_optional_fields() {
        let validator = TokenValidator::new("X-Session");
        assert_eq!(validator.header(), "x-session");

        let junk = json!("junk");
        assert_eq!(run(&validator, &junk, &required(), Some("x-auth-token")), None);
        assert_eq!(run(&validator, &junk, &RuleSet::default(), Some("x-session")), None);
        assert_eq!(run(&validator, &junk, &required(), None), None);
        assert_eq!(run(&validator, &Value::Null, &required(), Some("x-session")), None);
        assert_eq!(
            run(&validator, &junk, &required(), Some("x-session")),
            Some(Outcome::Unauthorized)
        );
    }

    #[test]
    fn test_validator_rejects_empty_and_non_string_tokens() {
        let validator = TokenValidator::default();
        let key = Some("x-auth-token");
        assert_eq!(run(&validator, &json!(""), &required(), key), Some(Outcome::Unauthorized));
        assert_eq!(run(&validator, &json!(42), &required(), key), Some(Outcome::Unauthorized));
    }
}
