//! Object graph conversion
//!
//! Typed models declare a static [`ModelMeta`] table describing, per
//! property, its wire name, nested model, transform function, inline check
//! and request location. The [`Converter`] walks serde values with that
//! table in hand:
//!
//! - **outbound** (model → wire): properties are renamed, nested values are
//!   converted with their nested table, scalar leaves with an inline check
//!   are validated. A failing check is reported, never fatal.
//! - **inbound** (wire → model): wire keys are mapped back to property
//!   names, nested values are rebuilt with their nested table, transform
//!   functions replace raw values. Transforms of properties missing from
//!   the payload still run, so they can derive values from siblings.
//!
//! # Example
//!
//! ```rust,ignore
//! impl ApiModel for Account {
//!     fn model() -> &'static ModelMeta {
//!         static MODEL: Lazy<ModelMeta> = Lazy::new(|| {
//!             ModelMeta::new("Account")
//!                 .field(FieldMeta::new("user").rename("user_id"))
//!                 .field(FieldMeta::new("owner").nested::<Person>())
//!         });
//!         &MODEL
//!     }
//! }
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::lifecycle::Lifecycle;
use crate::model::{Location, RuleSet};
use crate::request::RequestContext;
use crate::rules::Outcome;

/// Derives a property value from `(root, parent)` wire objects
pub type TransformFn = Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>;

/// Custom predicate for an inline check; `false` is a failure
pub type CheckFn = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Receives every outbound check failure
pub type FailureCallback = Arc<dyn Fn(&CheckFailure) + Send + Sync>;

/// Inline check attached to a property
#[derive(Clone)]
pub enum CheckDescriptor {
    /// Rules checked one key at a time through the validator chain
    Rules(RuleSet),
    /// Arbitrary predicate
    Custom(CheckFn),
}

impl fmt::Debug for CheckDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckDescriptor::Rules(rules) => f.debug_tuple("Rules").field(rules).finish(),
            CheckDescriptor::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// A typed model with a static field metadata table
pub trait ApiModel: Serialize + DeserializeOwned {
    /// Metadata shared by every instance of the type
    fn model() -> &'static ModelMeta;
}

/// Metadata for one property
#[derive(Clone)]
pub struct FieldMeta {
    name: String,
    wire_name: Option<String>,
    nested: Option<fn() -> &'static ModelMeta>,
    transform: Option<TransformFn>,
    check: Option<CheckDescriptor>,
    location: Option<Location>,
}

impl FieldMeta {
    /// Metadata for the property called `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            wire_name: None,
            nested: None,
            transform: None,
            check: None,
            location: None,
        }
    }

    /// Use `wire_name` on the wire instead of the property name
    pub fn rename(mut self, wire_name: impl Into<String>) -> Self {
        self.wire_name = Some(wire_name.into());
        self
    }

    /// Convert this property's value with `T`'s table
    pub fn nested<T: ApiModel>(mut self) -> Self {
        self.nested = Some(T::model);
        self
    }

    /// Build the value with `transform(root, parent)` when reading from the wire
    pub fn transform(mut self, transform: impl Fn(&Value, &Value) -> Value + Send + Sync + 'static) -> Self {
        self.transform = Some(Arc::new(transform));
        self
    }

    /// Check outbound values against `rules`
    pub fn check(mut self, rules: RuleSet) -> Self {
        self.check = Some(CheckDescriptor::Rules(rules));
        self
    }

    /// Check outbound values with a predicate
    pub fn check_with(mut self, predicate: impl Fn(&Value) -> bool + Send + Sync + 'static) -> Self {
        self.check = Some(CheckDescriptor::Custom(Arc::new(predicate)));
        self
    }

    /// Request section this property is bound from
    pub fn located(mut self, location: Location) -> Self {
        self.location = Some(location);
        self
    }

    /// Property name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Name used on the wire
    pub fn wire_name(&self) -> &str {
        self.wire_name.as_deref().unwrap_or(&self.name)
    }

    /// Nested model table, if declared
    pub fn nested_model(&self) -> Option<&'static ModelMeta> {
        self.nested.map(|model| model())
    }

    /// Inline check, if declared
    pub fn check_descriptor(&self) -> Option<&CheckDescriptor> {
        self.check.as_ref()
    }

    /// Request location, if declared
    pub fn location(&self) -> Option<Location> {
        self.location
    }
}

impl fmt::Debug for FieldMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldMeta")
            .field("name", &self.name)
            .field("wire_name", &self.wire_name)
            .field("nested", &self.nested_model().map(ModelMeta::name))
            .field("transform", &self.transform.is_some())
            .field("check", &self.check)
            .field("location", &self.location)
            .finish()
    }
}

/// Field metadata table for one model type
#[derive(Debug, Clone)]
pub struct ModelMeta {
    name: String,
    fields: Vec<FieldMeta>,
    by_name: HashMap<String, usize>,
    by_wire: HashMap<String, usize>,
}

impl ModelMeta {
    /// Empty table for the model called `name`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            by_name: HashMap::new(),
            by_wire: HashMap::new(),
        }
    }

    /// Add a property; a later entry for the same property replaces the earlier one
    pub fn field(mut self, field: FieldMeta) -> Self {
        if let Some(&index) = self.by_name.get(field.name()) {
            self.by_wire.retain(|_, i| *i != index);
            self.by_wire.insert(field.wire_name().to_string(), index);
            self.fields[index] = field;
        } else {
            let index = self.fields.len();
            self.by_name.insert(field.name().to_string(), index);
            self.by_wire.insert(field.wire_name().to_string(), index);
            self.fields.push(field);
        }
        self
    }

    /// Model name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared properties in declaration order
    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    /// Metadata for a property
    pub fn get(&self, name: &str) -> Option<&FieldMeta> {
        self.by_name.get(name).map(|&i| &self.fields[i])
    }

    /// Property name for a wire key (identity when not renamed)
    pub fn property_for<'a>(&'a self, wire_key: &'a str) -> &'a str {
        self.by_wire
            .get(wire_key)
            .map_or(wire_key, |&i| self.fields[i].name())
    }
}

/// One failed outbound check
#[derive(Debug, Clone, PartialEq)]
pub struct CheckFailure {
    /// Wire name of the property
    pub field: String,
    /// Offending value
    pub value: Value,
    /// Failing rule key; `None` for custom predicates
    pub rule: Option<String>,
}

/// Converts between typed models and wire JSON
#[derive(Clone)]
pub struct Converter {
    lifecycle: Arc<Lifecycle>,
    on_failure: Option<FailureCallback>,
}

impl Converter {
    /// Converter checking with `lifecycle`
    pub fn new(lifecycle: Arc<Lifecycle>) -> Self {
        Self {
            lifecycle,
            on_failure: None,
        }
    }

    /// Call `callback` for every outbound check failure
    pub fn on_failure(mut self, callback: impl Fn(&CheckFailure) + Send + Sync + 'static) -> Self {
        self.on_failure = Some(Arc::new(callback));
        self
    }

    /// Serialize a model into wire JSON
    pub fn to_wire<T: ApiModel>(&self, value: &T) -> Result<Value> {
        let internal = serde_json::to_value(value)?;
        Ok(self.outbound(&internal, Some(T::model())))
    }

    /// Convert an internal value into wire shape using `model` for renames and checks
    pub fn outbound(&self, value: &Value, model: Option<&ModelMeta>) -> Value {
        match value {
            Value::Array(items) => Value::Array(items.iter().map(|item| self.outbound(item, model)).collect()),
            Value::Object(map) => {
                let mut wire = Map::with_capacity(map.len());
                for (key, item) in map {
                    let field = model.and_then(|m| m.get(key));
                    let wire_key = field.map_or(key.as_str(), FieldMeta::wire_name);

                    let converted = if item.is_object() || item.is_array() {
                        self.outbound(item, field.and_then(FieldMeta::nested_model))
                    } else {
                        if let Some(check) = field.and_then(FieldMeta::check_descriptor) {
                            self.run_check(wire_key, item, check);
                        }
                        item.clone()
                    };
                    wire.insert(wire_key.to_string(), converted);
                }
                Value::Object(wire)
            }
            other => other.clone(),
        }
    }

    fn run_check(&self, field: &str, value: &Value, check: &CheckDescriptor) {
        match check {
            CheckDescriptor::Custom(predicate) => {
                if !predicate(value) {
                    self.report(field, value, None);
                }
            }
            CheckDescriptor::Rules(rules) => {
                for key in rules.keys() {
                    if self.lifecycle.check(value, &rules.only(key), None) == Outcome::Fail {
                        self.report(field, value, Some(key));
                    }
                }
            }
        }
    }

    fn report(&self, field: &str, value: &Value, rule: Option<&str>) {
        match rule {
            Some(rule) => tracing::warn!(field, rule, "outbound check failed"),
            None => tracing::warn!(field, "outbound check failed"),
        }
        if let Some(callback) = &self.on_failure {
            callback(&CheckFailure {
                field: field.to_string(),
                value: value.clone(),
                rule: rule.map(str::to_string),
            });
        }
    }

    /// Build a model from wire JSON
    pub fn from_wire<T: ApiModel>(&self, wire: &Value) -> Result<T> {
        let model = T::model();
        let internal = self.inbound(wire, Some(model), wire);
        serde_json::from_value(internal).map_err(|source| Error::Conversion {
            model: model.name().to_string(),
            source,
        })
    }

    /// Convert a wire value into internal shape using `model`.
    ///
    /// `root` is the top-level wire value handed to transform functions.
    pub fn inbound(&self, wire: &Value, model: Option<&ModelMeta>, root: &Value) -> Value {
        let Some(model) = model else {
            return wire.clone();
        };

        match wire {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.inbound(item, Some(model), root))
                    .collect(),
            ),
            Value::Object(map) => {
                let mut internal = Map::with_capacity(map.len());
                let mut seen = HashSet::new();

                for (key, item) in map {
                    let name = model.property_for(key);
                    let field = model.get(name);
                    seen.insert(name);

                    let converted = match (field.and_then(FieldMeta::nested_model), field.and_then(|f| f.transform.as_ref())) {
                        (Some(nested), _) => self.inbound(item, Some(nested), root),
                        (None, Some(transform)) => transform(root, wire),
                        (None, None) => item.clone(),
                    };
                    internal.insert(name.to_string(), converted);
                }

                for field in model.fields() {
                    if let Some(transform) = &field.transform
                        && !seen.contains(field.name())
                    {
                        internal.insert(field.name().to_string(), transform(root, wire));
                    }
                }

                Value::Object(internal)
            }
            other => other.clone(),
        }
    }

    /// Fill a typed request model from a live request.
    ///
    /// Each located property is looked up by wire name: query and header
    /// properties in their section, body properties take the whole body,
    /// and anything not found falls back to the path parameters. Consumed
    /// entries are removed from the request.
    pub fn bind_request<T: ApiModel>(&self, request: &mut RequestContext) -> Result<T> {
        let model = T::model();
        let mut bound = Map::new();

        for field in model.fields() {
            let Some(location) = field.location() else {
                continue;
            };
            if let Some(raw) = take_bound(request, location, field.wire_name()) {
                let value = self.inbound(&raw, field.nested_model(), &raw);
                bound.insert(field.name().to_string(), value);
            }
        }

        serde_json::from_value(Value::Object(bound)).map_err(|source| Error::Conversion {
            model: model.name().to_string(),
            source,
        })
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(Arc::new(Lifecycle::default()))
    }
}

impl fmt::Debug for Converter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Converter")
            .field("lifecycle", &self.lifecycle)
            .field("on_failure", &self.on_failure.is_some())
            .finish()
    }
}

fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

fn take_bound(request: &mut RequestContext, location: Location, name: &str) -> Option<Value> {
    match location {
        Location::Query if is_present(request.query.get(name)) => return request.query.remove(name),
        Location::Header => {
            let header = name.to_ascii_lowercase();
            if is_present(request.headers.get(&header)) {
                return request.headers.remove(&header);
            }
        }
        Location::Body if !request.body.is_null() => {
            return Some(std::mem::replace(&mut request.body, Value::Object(Map::new())));
        }
        _ => {}
    }

    if is_present(request.params.get(name)) {
        request.params.remove(name)
    } else {
        None
    }
}
