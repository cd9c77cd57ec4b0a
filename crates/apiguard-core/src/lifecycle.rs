//! Lifecycle
//!
//! The lifecycle owns one hook channel per stage: parsers on `compile`,
//! validators on `check`. [`Lifecycle::default`] registers the built-in
//! rules in their fixed order:
//!
//! ```text
//! check:   required → token → array → basic
//! compile: basic
//! ```
//!
//! Extra rules are appended after the built-ins, so they only see values
//! the built-ins had no opinion on.

use serde_json::Value;

use crate::config::AuthConfig;
use crate::hooks::{Channel, Stage};
use crate::model::{CheckModel, Location, RuleSet};
use crate::rules::{
    ArrayValidator, BasicParser, BasicValidator, CheckContext, CompileEvent, Outcome, Parser,
    RequiredValidator, TokenValidator, Validator,
};

/// Stage channels for compiling and checking
#[derive(Debug)]
pub struct Lifecycle {
    compile: Channel<dyn Parser>,
    check: Channel<dyn Validator>,
}

impl Lifecycle {
    /// A lifecycle with no rules registered
    pub fn new() -> Self {
        Self {
            compile: Channel::new(Stage::Compile),
            check: Channel::new(Stage::Check),
        }
    }

    /// A lifecycle with the built-in rules, watching the configured token header
    pub fn with_defaults(auth: &AuthConfig) -> Self {
        let mut lifecycle = Self::new();
        lifecycle.register_validator(RequiredValidator);
        lifecycle.register_validator(TokenValidator::new(auth.token_header.as_str()));
        lifecycle.register_validator(ArrayValidator);
        lifecycle.register_validator(BasicValidator);
        lifecycle.register_parser(BasicParser);
        lifecycle
    }

    /// Append a validator to the check stage
    pub fn register_validator(&mut self, validator: impl Validator + 'static) {
        tracing::debug!(validator = validator.name(), "registering validator");
        self.check.subscribe(Box::new(validator));
    }

    /// Append a validator that is dropped after it fires once
    pub fn register_validator_once(&mut self, validator: impl Validator + 'static) {
        self.check.subscribe_once(Box::new(validator));
    }

    /// Append a parser to the compile stage
    pub fn register_parser(&mut self, parser: impl Parser + 'static) {
        tracing::debug!(parser = parser.name(), "registering parser");
        self.compile.subscribe(Box::new(parser));
    }

    /// Append a parser that is dropped after it fires once
    pub fn register_parser_once(&mut self, parser: impl Parser + 'static) {
        self.compile.subscribe_once(Box::new(parser));
    }

    /// Check-stage channel
    pub fn validators(&self) -> &Channel<dyn Validator> {
        &self.check
    }

    /// Compile-stage channel
    pub fn parsers(&self) -> &Channel<dyn Parser> {
        &self.compile
    }

    /// Emit one compile event for the field at `(location, path)`.
    pub fn compile(
        &self,
        model: &mut CheckModel,
        location: Location,
        path: &str,
        keywords: &RuleSet,
    ) {
        let mut event = CompileEvent {
            location,
            path,
            keywords,
            model,
        };
        self.compile.emit(|parser| parser.compile(&mut event));
    }

    /// Run a value through the validator chain.
    ///
    /// `key` is the lower-cased header name for header fields. A chain
    /// where every validator defers passes.
    pub fn check(&self, value: &Value, rules: &RuleSet, key: Option<&str>) -> Outcome {
        let recheck = |item: &Value, rules: &RuleSet| self.check(item, rules, None);
        let ctx = CheckContext {
            rules,
            value,
            key,
            recheck: &recheck,
        };
        self.check
            .emit(|validator| validator.check(&ctx))
            .unwrap_or(Outcome::Pass)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::with_defaults(&AuthConfig::default())
    }
}
