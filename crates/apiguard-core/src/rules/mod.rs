//! Rule chain
//!
//! Validators check live values on the [`Stage::Check`](crate::hooks::Stage)
//! channel; parsers fold schema keywords into the check model on the
//! [`Stage::Compile`](crate::hooks::Stage) channel.
//!
//! Each validator is itself a short chain of condition functions. A
//! condition returns `Some(outcome)` to decide, or `None` to defer to the
//! next condition. The first decision wins; a chain where every condition
//! defers has no opinion and the emitter moves on to the next validator.
//!
//! # Built-in Rules
//!
//! - [`RequiredValidator`] - `required`
//! - [`TokenValidator`] - encoded auth token on the token header
//! - [`ArrayValidator`] - `maxItems`, `minItems`, element re-check
//! - [`BasicValidator`] - lengths, bounds, `pattern`, `enum`
//! - [`BasicParser`] - copies the curated keywords into the check model

mod array;
mod basic;
mod parser;
mod required;
pub mod token;

pub use array::ArrayValidator;
pub use basic::BasicValidator;
pub use parser::BasicParser;
pub use required::RequiredValidator;
pub use token::TokenValidator;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::model::{CheckModel, Location, RuleSet};

/// Result of checking a value against a rule set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Every rule is satisfied
    Pass,
    /// An ordinary rule rejected the value
    Fail,
    /// The auth token is missing, malformed or expired
    Unauthorized,
}

impl Outcome {
    /// Whether the value was accepted
    pub fn is_pass(&self) -> bool {
        matches!(self, Outcome::Pass)
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pass => f.write_str("pass"),
            Outcome::Fail => f.write_str("fail"),
            Outcome::Unauthorized => f.write_str("unauthorized"),
        }
    }
}

/// Everything a validator sees for one check
pub struct CheckContext<'a> {
    /// Rules that apply to the value
    pub rules: &'a RuleSet,
    /// Value under test (`Null` when absent)
    pub value: &'a Value,
    /// Lower-cased header name, for header checks only
    pub key: Option<&'a str>,
    pub(crate) recheck: &'a dyn Fn(&Value, &RuleSet) -> Outcome,
}

impl CheckContext<'_> {
    /// Run a value through the complete validator chain
    pub fn recheck(&self, value: &Value, rules: &RuleSet) -> Outcome {
        (self.recheck)(value, rules)
    }
}

/// One link of a validator's internal chain
pub type Condition = fn(&CheckContext<'_>) -> Option<Outcome>;

/// Evaluate conditions in order, returning the first decision.
pub fn link_check(conditions: &[Condition], ctx: &CheckContext<'_>) -> Option<Outcome> {
    conditions.iter().find_map(|condition| condition(ctx))
}

/// A constraint family applied to live values
pub trait Validator: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Decide on the value, or `None` to defer to the next validator
    fn check(&self, ctx: &CheckContext<'_>) -> Option<Outcome>;
}

/// One field reached by the schema walk
pub struct CompileEvent<'a> {
    /// Request location of the field
    pub location: Location,
    /// Dotted field path
    pub path: &'a str,
    /// Raw constraint keywords found on the schema node
    pub keywords: &'a RuleSet,
    /// Model under construction
    pub model: &'a mut CheckModel,
}

impl CompileEvent<'_> {
    /// Rules for this event's field, created on first use
    pub fn rules_mut(&mut self) -> &mut RuleSet {
        self.model.entry(self.location, self.path)
    }
}

/// A keyword family folded into the check model at compile time
pub trait Parser: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Record rules for the event's field. `Some(())` stops later parsers.
    fn compile(&self, event: &mut CompileEvent<'_>) -> Option<()>;
}

/// Whether a value counts as "no value" for the basic rules
pub(crate) fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Length of a string (in characters) or array
pub(crate) fn length_of(value: &Value) -> Option<u64> {
    match value {
        Value::String(s) => Some(s.chars().count() as u64),
        Value::Array(items) => Some(items.len() as u64),
        _ => None,
    }
}
