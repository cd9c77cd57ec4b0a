//! Check model compiler
//!
//! Walks each operation's parameters (and, through `$ref`, the named
//! definitions they reach) and emits one compile event per field path.
//! The lifecycle's parsers turn those events into the operation's
//! [`CheckModel`].
//!
//! Nested paths are dot-joined; arrays of objects add a `[]` segment:
//!
//! ```text
//! body param  $ref Order ─▶ customer ─▶ customer.name
//!                        └▶ items[]  ─▶ items[].sku
//! ```
//!
//! Cyclic definitions are cut by the dependency path: a definition is
//! never followed while it is already being expanded above.

use apiguard_core::model::{ARRAY_MARKER, BODY_SENTINEL};
use apiguard_core::{CheckModel, Lifecycle, Location};

use crate::schema::{reference_name, ApiDocument, Operation, PathItem, SchemaNode};

/// Everything a compilation pass reads
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    document: &'a ApiDocument,
    lifecycle: &'a Lifecycle,
    prefix: &'a str,
}

/// One location-scoped walk, carrying the definitions being expanded
struct Walk<'c, 'a> {
    ctx: &'c CompileContext<'a>,
    model: &'c mut CheckModel,
    location: Location,
    dependencies: Vec<String>,
}

impl<'a> CompileContext<'a> {
    /// Create a context resolving references under `prefix`
    pub fn new(document: &'a ApiDocument, lifecycle: &'a Lifecycle, prefix: &'a str) -> Self {
        Self {
            document,
            lifecycle,
            prefix,
        }
    }

    /// Document being compiled
    pub fn document(&self) -> &'a ApiDocument {
        self.document
    }

    /// Reference prefix
    pub fn prefix(&self) -> &'a str {
        self.prefix
    }

    /// Resolve a reference, logging when it points nowhere
    pub fn resolve(&self, reference: &str) -> Option<&'a SchemaNode> {
        let found = self.document.resolve(reference, self.prefix);
        if found.is_none() {
            tracing::warn!(reference, "unresolved reference, skipping");
        }
        found
    }

    /// Compile an operation's check model, path-level parameters first
    pub fn compile_operation(&self, item: &PathItem, operation: &Operation) -> CheckModel {
        let mut model = CheckModel::new();
        for param in item.parameters.iter().chain(&operation.parameters) {
            self.compile_parameter(&mut model, param);
        }
        model
    }

    /// Check model location and field path a parameter's own rules live at
    pub fn parameter_path(param: &SchemaNode) -> Option<(Location, String)> {
        let location = Location::parse(param.location.as_deref()?)?;
        let name = param.name.as_deref()?;
        let path = match location {
            Location::Body => BODY_SENTINEL.to_string(),
            Location::Query if param.is_array() => format!("{name}{ARRAY_MARKER}"),
            _ => name.to_string(),
        };
        Some((location, path))
    }

    /// Compile one parameter into `model`.
    ///
    /// Array query parameters are checked per element under `name[]`. A
    /// body parameter's own rules apply to the whole body; its schema is
    /// walked from the body root.
    pub fn compile_parameter(&self, model: &mut CheckModel, param: &SchemaNode) {
        let Some((location, path)) = Self::parameter_path(param) else {
            tracing::warn!(
                name = param.name.as_deref().unwrap_or_default(),
                location = param.location.as_deref().unwrap_or_default(),
                "parameter without a usable name or location, skipping"
            );
            return;
        };

        let mut walk = Walk {
            ctx: self,
            model,
            location,
            dependencies: Vec::new(),
        };

        match (&param.items, &param.schema) {
            (Some(items), _) if location == Location::Query && param.is_array() => {
                walk.emit(&path, &param.overlay(items), false);
            }
            (_, Some(schema)) if location == Location::Body => {
                walk.emit(&path, param, false);
                walk.body_schema(schema);
            }
            _ => walk.emit(&path, param, false),
        }
    }

    /// Emit a single event for `node` at `(location, path)`, without descending
    pub fn compile_shallow(
        &self,
        model: &mut CheckModel,
        location: Location,
        path: &str,
        node: &SchemaNode,
        required: bool,
    ) {
        Walk {
            ctx: self,
            model,
            location,
            dependencies: Vec::new(),
        }
        .emit(path, node, required);
    }
}

impl Walk<'_, '_> {
    fn emit(&mut self, path: &str, node: &SchemaNode, required: bool) {
        if path.is_empty() {
            return;
        }
        let keywords = node.keywords(required);
        self.ctx
            .lifecycle
            .compile(self.model, self.location, path, &keywords);
    }

    fn body_schema(&mut self, schema: &SchemaNode) {
        if let Some(reference) = &schema.reference {
            self.follow(reference, "");
        } else if schema.is_composite() {
            self.node(schema, "", false);
        } else {
            self.emit(BODY_SENTINEL, schema, false);
        }
    }

    /// Emit `node` at `path`, then descend into whatever it composes
    fn node(&mut self, node: &SchemaNode, path: &str, required: bool) {
        self.emit(path, node, required);

        if let Some(reference) = &node.reference {
            self.follow(reference, path);
            return;
        }
        for branch in node.all_of.iter().flatten() {
            match &branch.reference {
                Some(reference) => self.follow(reference, path),
                None => self.node(branch, path, false),
            }
        }
        self.properties(node, path);
    }

    fn properties(&mut self, node: &SchemaNode, path: &str) {
        let Some(properties) = &node.properties else {
            return;
        };
        let listed = node.required_fields();

        for (key, property) in properties {
            let required = listed.iter().any(|name| name == key);
            let child = join(path, key);

            match &property.items {
                Some(items) if property.is_array() => {
                    let element_path = format!("{child}{ARRAY_MARKER}");
                    match &items.reference {
                        Some(reference) => {
                            self.emit(&element_path, property, required);
                            self.follow(reference, &element_path);
                        }
                        None => self.node(&property.overlay(items), &element_path, required),
                    }
                }
                _ => self.node(property, &child, required),
            }
        }
    }

    /// Expand a referenced definition at `path` unless it is already on
    /// the dependency path.
    fn follow(&mut self, reference: &str, path: &str) {
        let Some(target) = self.ctx.resolve(reference) else {
            return;
        };
        let name = reference_name(reference, self.ctx.prefix).unwrap_or(reference);
        if self.dependencies.iter().any(|seen| seen == name) {
            tracing::debug!(definition = name, path, "cyclic reference, not expanding");
            return;
        }

        self.dependencies.push(name.to_string());
        self.node(target, path, false);
        self.dependencies.pop();
    }
}

fn join(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apiguard_core::RuleSet;

    const PREFIX: &str = "#/definitions/";

    fn compile(yaml: &str) -> CheckModel {
        let document = ApiDocument::from_yaml(yaml).unwrap();
        let lifecycle = Lifecycle::default();
        let ctx = CompileContext::new(&document, &lifecycle, PREFIX);
        let (_, _, item, op) = document.operations().next().unwrap();
        ctx.compile_operation(item, op)
    }

    fn paths(model: &CheckModel, location: Location) -> Vec<String> {
        model
            .section(location)
            .map(|section| section.keys().cloned().collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_scalar_parameters() {
        let model = compile(
            r#"
paths:
  /pets:
    get:
      parameters:
        - { name: page, in: query, type: integer, required: true, minimum: 1 }
        - { name: X-Auth-Token, in: header, type: string, required: true }
        - { name: id, in: path, type: string, maxLength: 8 }
"#,
        );

        let page = model.rules(Location::Query, "page").unwrap();
        assert_eq!(page.required, Some(true));
        assert_eq!(page.minimum, Some(1.0));
        assert!(model.rules(Location::Header, "X-Auth-Token").unwrap().is_required());
        assert_eq!(model.rules(Location::Path, "id").unwrap().max_length, Some(8));
    }

    #[test]
    fn test_query_array_checks_elements() {
        let model = compile(
            r#"
paths:
  /pets:
    get:
      parameters:
        - name: tags
          in: query
          type: array
          maxItems: 3
          items: { type: string, maxLength: 5 }
"#,
        );

        assert_eq!(paths(&model, Location::Query), vec!["tags[]"]);
        let tags = model.rules(Location::Query, "tags[]").unwrap();
        assert_eq!(tags.max_items, Some(3));
        assert_eq!(tags.max_length, Some(5));
    }

    #[test]
    fn test_body_reference_walks_properties() {
        let model = compile(
            r##"
paths:
  /orders:
    post:
      parameters:
        - name: order
          in: body
          required: true
          schema:
            $ref: "#/definitions/Order"
definitions:
  Order:
    type: object
    required: [id, customer]
    properties:
      id: { type: string, pattern: "^[0-9]+$" }
      customer:
        $ref: "#/definitions/Customer"
      items:
        type: array
        maxItems: 10
        items:
          $ref: "#/definitions/Item"
      notes:
        type: array
        items: { type: string, maxLength: 100 }
  Customer:
    type: object
    required: [name]
    properties:
      name: { type: string, minLength: 1 }
  Item:
    type: object
    properties:
      sku: { type: string, maxLength: 12 }
"##,
        );

        assert_eq!(
            paths(&model, Location::Body),
            vec!["$body$", "customer", "customer.name", "id", "items[]", "items[].sku", "notes[]"]
        );
        assert!(model.rules(Location::Body, "$body$").unwrap().is_required());
        assert!(model.rules(Location::Body, "customer").unwrap().is_required());
        assert!(model.rules(Location::Body, "customer.name").unwrap().is_required());
        assert_eq!(model.rules(Location::Body, "items[]").unwrap().max_items, Some(10));
        assert_eq!(model.rules(Location::Body, "notes[]").unwrap().max_length, Some(100));
    }

    #[test]
    fn test_scalar_body_schema_applies_to_whole_body() {
        let model = compile(
            r#"
paths:
  /echo:
    post:
      parameters:
        - name: text
          in: body
          schema: { type: string, maxLength: 10 }
"#,
        );
        assert_eq!(paths(&model, Location::Body), vec!["$body$"]);
        assert_eq!(model.rules(Location::Body, "$body$").unwrap().max_length, Some(10));
    }

    #[test]
    fn test_cycles_terminate() {
        let model = compile(
            r##"
paths:
  /nodes:
    post:
      parameters:
        - name: node
          in: body
          schema:
            $ref: "#/definitions/A"
definitions:
  A:
    type: object
    required: [b, children]
    properties:
      label: { type: string, maxLength: 30 }
      b:
        $ref: "#/definitions/B"
      children:
        type: array
        items:
          $ref: "#/definitions/A"
  B:
    type: object
    required: [a]
    properties:
      a:
        $ref: "#/definitions/A"
      size: { type: integer, maximum: 9 }
"##,
        );

        assert_eq!(
            paths(&model, Location::Body),
            vec!["b", "b.a", "b.size", "children[]", "label"]
        );
        assert_eq!(model.rules(Location::Body, "b.size").unwrap().maximum, Some(9.0));
    }

    #[test]
    fn test_all_of_branches_are_walked() {
        let model = compile(
            r##"
paths:
  /pets:
    post:
      parameters:
        - name: pet
          in: body
          schema:
            allOf:
              - $ref: "#/definitions/Named"
              - type: object
                required: [age]
                properties:
                  age: { type: integer, minimum: 0 }
definitions:
  Named:
    type: object
    required: [name]
    properties:
      name: { type: string, maxLength: 20 }
"##,
        );

        assert_eq!(paths(&model, Location::Body), vec!["age", "name"]);
        assert!(model.rules(Location::Body, "name").unwrap().is_required());
        assert_eq!(model.rules(Location::Body, "age").unwrap().minimum, Some(0.0));
    }

    #[test]
    fn test_malformed_entries_are_skipped() {
        let model = compile(
            r##"
paths:
  /pets:
    post:
      parameters:
        - { name: where, in: cookie, type: string }
        - { in: query, type: string }
        - name: pet
          in: body
          schema:
            $ref: "#/definitions/Missing"
"##,
        );
        assert_eq!(model.len(), 0);
    }

    #[test]
    fn test_compile_shallow_does_not_descend() {
        let document = ApiDocument::default();
        let lifecycle = Lifecycle::default();
        let ctx = CompileContext::new(&document, &lifecycle, PREFIX);
        let node = SchemaNode {
            reference: Some("#/definitions/Nope".into()),
            max_length: Some(3),
            ..Default::default()
        };

        let mut model = CheckModel::new();
        ctx.compile_shallow(&mut model, Location::Definitions, "name", &node, true);
        let expected = RuleSet {
            required: Some(true),
            max_length: Some(3),
            ..Default::default()
        };
        assert_eq!(model.rules(Location::Definitions, "name"), Some(&expected));
    }

    #[test]
    fn test_parameter_path() {
        let param = |yaml: &str| -> SchemaNode { serde_yaml::from_str(yaml).unwrap() };
        assert_eq!(
            CompileContext::parameter_path(&param("{name: ids, in: query, type: array}")),
            Some((Location::Query, "ids[]".to_string()))
        );
        assert_eq!(
            CompileContext::parameter_path(&param("{name: payload, in: body}")),
            Some((Location::Body, "$body$".to_string()))
        );
        assert_eq!(CompileContext::parameter_path(&param("{name: x, in: form}")), None);
    }
}
