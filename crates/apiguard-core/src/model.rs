//! Check model
//!
//! The check model maps a request location and a dotted field path to the
//! rules that apply there:
//!
//! ```text
//! location → field path → rule name → rule value
//! body     → items[].name → minLength → 1
//! ```
//!
//! Field paths use `.` between object levels and a `[]` suffix on segments
//! that step into an array. [`BODY_SENTINEL`] as a path means the whole
//! body is the field. Entries are only ever extended with more rule keys.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Path standing for the entire request body
pub const BODY_SENTINEL: &str = "$body$";

/// Suffix marking a path segment that steps into an array
pub const ARRAY_MARKER: &str = "[]";

/// Where in a request a field lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    /// URL query string
    Query,
    /// URL path parameter
    Path,
    /// Request header
    Header,
    /// Request body
    Body,
    /// Property of a named definition (descriptor output only)
    Definitions,
}

impl Location {
    /// Parse a parameter's `in` value
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "query" => Some(Self::Query),
            "path" => Some(Self::Path),
            "header" => Some(Self::Header),
            "body" => Some(Self::Body),
            "definitions" => Some(Self::Definitions),
            _ => None,
        }
    }

    /// Wire spelling of the location
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Path => "path",
            Self::Header => "header",
            Self::Body => "body",
            Self::Definitions => "definitions",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Constraint rules for one field
///
/// Serializes with the schema keyword spelling (`maxLength`, `x-minLength`,
/// `enum`, ...) so a compiled model can be embedded as a literal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    /// Value must be present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,

    /// Maximum string/array length
    #[serde(rename = "maxLength", default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    /// Minimum string/array length
    #[serde(rename = "minLength", default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    /// Vendor maximum length
    #[serde(rename = "x-maxLength", default, skip_serializing_if = "Option::is_none")]
    pub x_max_length: Option<u64>,

    /// Vendor minimum length
    #[serde(rename = "x-minLength", default, skip_serializing_if = "Option::is_none")]
    pub x_min_length: Option<u64>,

    /// Inclusive numeric upper bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    /// Inclusive numeric lower bound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    /// Regular expression the value must match somewhere
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    /// Allowed values
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    /// Maximum element count
    #[serde(rename = "maxItems", default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,

    /// Minimum element count
    #[serde(rename = "minItems", default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
}

macro_rules! rule_keys {
    ($( $field:ident => $key:literal ),* $(,)?) => {
        impl RuleSet {
            /// Names of the rules present, in chain order
            pub fn keys(&self) -> Vec<&'static str> {
                let mut keys = Vec::new();
                $( if self.$field.is_some() { keys.push($key); } )*
                keys
            }

            /// A rule set holding only the rule named `key`
            pub fn only(&self, key: &str) -> RuleSet {
                let mut single = RuleSet::default();
                match key {
                    $( $key => single.$field = self.$field.clone(), )*
                    _ => {}
                }
                single
            }

            /// Copy every rule present in `other` over this one
            pub fn extend(&mut self, other: &RuleSet) {
                $( if other.$field.is_some() { self.$field = other.$field.clone(); } )*
            }
        }
    };
}

rule_keys! {
    required => "required",
    max_length => "maxLength",
    min_length => "minLength",
    x_max_length => "x-maxLength",
    x_min_length => "x-minLength",
    maximum => "maximum",
    minimum => "minimum",
    pattern => "pattern",
    enum_values => "enum",
    max_items => "maxItems",
    min_items => "minItems",
}

impl RuleSet {
    /// Whether no rule is set
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Whether the `required` rule is switched on
    pub fn is_required(&self) -> bool {
        self.required == Some(true)
    }
}

/// Compiled mapping from location and field path to rules
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckModel {
    sections: BTreeMap<Location, BTreeMap<String, RuleSet>>,
}

impl CheckModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the model declares no fields at all
    pub fn is_empty(&self) -> bool {
        self.sections.values().all(BTreeMap::is_empty)
    }

    /// Rules for a field, created empty on first access
    pub fn entry(&mut self, location: Location, path: &str) -> &mut RuleSet {
        self.sections
            .entry(location)
            .or_default()
            .entry(path.to_string())
            .or_default()
    }

    /// Rules for a field, if any were compiled
    pub fn rules(&self, location: Location, path: &str) -> Option<&RuleSet> {
        self.sections.get(&location)?.get(path)
    }

    /// Every field declared under a location
    pub fn section(&self, location: Location) -> Option<&BTreeMap<String, RuleSet>> {
        self.sections.get(&location)
    }

    /// Iterate over `(location, path, rules)`
    pub fn iter(&self) -> impl Iterator<Item = (Location, &str, &RuleSet)> {
        self.sections.iter().flat_map(|(location, fields)| {
            fields
                .iter()
                .map(move |(path, rules)| (*location, path.as_str(), rules))
        })
    }

    /// Number of declared fields
    pub fn len(&self) -> usize {
        self.sections.values().map(BTreeMap::len).sum()
    }
}
