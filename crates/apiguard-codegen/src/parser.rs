//! Definition document to IR parser
//!
//! Selects operations through the project filter, compiles each one's
//! check model, and describes its request, response, and the definitions
//! those reach.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use apiguard_core::config::{FilterConfig, ReferenceConfig};
use apiguard_core::{CheckModel, Lifecycle, Location, ProjectConfig};

use crate::compiler::CompileContext;
use crate::error::Result;
use crate::ir::*;
use crate::schema::{reference_name, ApiDocument, Operation, PathItem, SchemaNode};

/// Parser for definition documents
pub struct Parser {
    name: String,
    version: String,
    filter: FilterConfig,
    prefix: String,
    lifecycle: Arc<Lifecycle>,
}

impl Parser {
    /// Create a parser for a project, with the built-in rules
    pub fn new(config: &ProjectConfig) -> Self {
        Self {
            name: config.name.clone(),
            version: config.version.clone(),
            filter: config.filter.clone(),
            prefix: config.references.prefix.clone(),
            lifecycle: Arc::new(Lifecycle::with_defaults(&config.auth)),
        }
    }

    /// Compile with a custom lifecycle (extra parsers, for instance)
    pub fn with_lifecycle(mut self, lifecycle: Arc<Lifecycle>) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Lifecycle used for compile events
    pub fn lifecycle(&self) -> &Arc<Lifecycle> {
        &self.lifecycle
    }

    /// Parse a definition file into IR
    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<ApiIR> {
        let document = ApiDocument::from_path(path)?;
        Ok(self.convert_to_ir(&document))
    }

    /// Parse a YAML (or JSON) string into IR
    pub fn parse_yaml(&self, yaml: &str) -> Result<ApiIR> {
        let document = ApiDocument::from_yaml(yaml)?;
        Ok(self.convert_to_ir(&document))
    }

    /// Convert a parsed document into IR
    pub fn convert_to_ir(&self, document: &ApiDocument) -> ApiIR {
        let ctx = CompileContext::new(document, &self.lifecycle, &self.prefix);
        let mut ir = ApiIR::new(&self.name, &self.version);

        for (url, method, item, op) in document.operations() {
            if !self.filter.matches(&url, method) {
                tracing::debug!(%url, method, "operation filtered out");
                continue;
            }
            ir.operations
                .push(self.convert_operation(&ctx, url, method, item, op));
        }

        ir.models = self.collect_models(&ctx, &ir.operations);

        tracing::info!(
            operations = ir.operations.len(),
            models = ir.models.len(),
            "compiled definition document"
        );
        ir
    }

    fn convert_operation(
        &self,
        ctx: &CompileContext<'_>,
        url: String,
        method: &str,
        item: &PathItem,
        op: &Operation,
    ) -> OperationIR {
        let operation_id = op
            .operation_id
            .clone()
            .unwrap_or_else(|| format!("{method} {url}"));
        let check = ctx.compile_operation(item, op);

        let request = item
            .parameters
            .iter()
            .chain(&op.parameters)
            .filter_map(|param| self.request_field(param, &check))
            .collect();

        let statuses: Vec<String> = op.responses.keys().cloned().collect();
        let response = self.response_fields(op, &statuses);

        tracing::debug!(%operation_id, fields = check.len(), "compiled operation");

        OperationIR {
            method: method.to_string(),
            url,
            operation_id,
            controller: op.tags.first().map(|tag| upper_first(tag)),
            summary: op.summary.clone(),
            request,
            response,
            statuses,
            check,
        }
    }

    fn request_field(&self, param: &SchemaNode, check: &CheckModel) -> Option<FieldDescriptor> {
        let name = param.name.as_deref()?;
        let node = param.schema.as_deref().unwrap_or(param);

        let mut field = self.describe(name, node);
        field.optional = !param.is_required();
        field.description = param.description.clone();
        field.location = param.location.as_deref().and_then(Location::parse);
        field.inline_rules = CompileContext::parameter_path(param)
            .and_then(|(location, path)| check.rules(location, &path).cloned());
        Some(rename_to_camel(field))
    }

    fn response_fields(&self, op: &Operation, statuses: &[String]) -> Vec<FieldDescriptor> {
        let mut headers = FieldDescriptor::new("rspHeaders", "object");
        headers.optional = true;
        headers.description = Some("Response headers".to_string());

        let mut fields = vec![headers];
        for (status, response) in &op.responses {
            let node = response.schema.as_deref().unwrap_or(response);
            let mut field = self.describe(&format!("rsp{status}"), node);
            field.optional = true;
            field.description = response.description.clone();
            fields.push(field);
        }

        if !statuses.is_empty() {
            let mut status = FieldDescriptor::new("status", "string");
            status.enum_values = Some(statuses.iter().map(|s| s.as_str().into()).collect());
            fields.push(status);
        }
        fields
    }

    /// Type, referenced model, and allowed values of a node
    fn describe(&self, name: &str, node: &SchemaNode) -> FieldDescriptor {
        let (type_name, referenced_type) = self.type_of(node);
        let mut field = FieldDescriptor::new(name, type_name);
        field.referenced_type = referenced_type;
        field.enum_values = node
            .enum_values
            .clone()
            .or_else(|| node.items.as_ref().and_then(|items| items.enum_values.clone()));
        field
    }

    fn type_of(&self, node: &SchemaNode) -> (String, Option<String>) {
        if let Some(reference) = &node.reference {
            let name = reference_name(reference, &self.prefix).unwrap_or(reference);
            return (name.to_string(), Some(name.to_string()));
        }
        match node.type_name.as_deref() {
            Some("array") => match &node.items {
                Some(items) => {
                    let (element, referenced) = self.type_of(items);
                    (format!("{element}[]"), referenced)
                }
                None => ("any[]".to_string(), None),
            },
            Some("integer") => ("number".to_string(), None),
            Some(other) => (other.to_string(), None),
            None if node.is_composite() => ("object".to_string(), None),
            None => ("any".to_string(), None),
        }
    }

    /// Definitions reachable from the operations' descriptors
    fn collect_models(&self, ctx: &CompileContext<'_>, operations: &[OperationIR]) -> Vec<ModelIR> {
        let mut pending: Vec<String> = operations
            .iter()
            .flat_map(|op| op.request.iter().chain(&op.response))
            .filter_map(|field| field.referenced_type.clone())
            .collect();
        let mut reachable = BTreeMap::new();

        while let Some(name) = pending.pop() {
            if reachable.contains_key(&name) {
                continue;
            }
            let Some(node) = ctx.document().definitions.get(&name) else {
                tracing::warn!(definition = %name, "referenced definition does not exist");
                continue;
            };
            let mut found = Vec::new();
            self.references(node, &mut found);
            pending.extend(found);
            reachable.insert(name, node);
        }

        reachable
            .into_iter()
            .map(|(name, node)| self.build_model(ctx, name, node))
            .collect()
    }

    fn references(&self, node: &SchemaNode, found: &mut Vec<String>) {
        if let Some(name) = node
            .reference
            .as_deref()
            .and_then(|r| reference_name(r, &self.prefix))
        {
            found.push(name.to_string());
        }
        let nested = node.items.as_deref().into_iter().chain(node.all_of.iter().flatten());
        for child in nested.chain(node.properties.iter().flat_map(|props| props.values())) {
            self.references(child, found);
        }
    }

    fn build_model(&self, ctx: &CompileContext<'_>, name: String, node: &SchemaNode) -> ModelIR {
        if !node.is_composite() {
            let (type_name, _) = self.type_of(node);
            return ModelIR::Alias {
                name,
                type_name,
                enum_values: node.enum_values.clone(),
                description: node.description.clone(),
            };
        }

        let mut properties = BTreeMap::new();
        let mut required = BTreeSet::new();
        self.gather(ctx, node, &mut properties, &mut required, &mut vec![name.clone()]);

        let fields = properties
            .into_iter()
            .map(|(key, property)| {
                let is_required = required.contains(key);
                let mut field = self.describe(key, property);
                field.optional = !is_required;
                field.description = property.description.clone();

                let mut rules = CheckModel::new();
                ctx.compile_shallow(&mut rules, Location::Definitions, key, property, is_required);
                field.inline_rules = rules.rules(Location::Definitions, key).cloned();
                rename_to_camel(field)
            })
            .collect();

        ModelIR::Object { name, fields }
    }

    /// Own properties plus those inherited through `allOf`
    fn gather<'d>(
        &self,
        ctx: &CompileContext<'d>,
        node: &'d SchemaNode,
        properties: &mut BTreeMap<&'d str, &'d SchemaNode>,
        required: &mut BTreeSet<&'d str>,
        seen: &mut Vec<String>,
    ) {
        for branch in node.all_of.iter().flatten() {
            match &branch.reference {
                Some(reference) => {
                    let name = reference_name(reference, &self.prefix).unwrap_or(reference);
                    if seen.iter().any(|s| s == name) {
                        continue;
                    }
                    if let Some(target) = ctx.resolve(reference) {
                        seen.push(name.to_string());
                        self.gather(ctx, target, properties, required, seen);
                        seen.pop();
                    }
                }
                None => self.gather(ctx, branch, properties, required, seen),
            }
        }

        for (key, property) in node.properties.iter().flatten() {
            properties.insert(key.as_str(), property);
        }
        required.extend(node.required_fields().iter().map(String::as_str));
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self {
            name: "api".to_string(),
            version: "0.1.0".to_string(),
            filter: FilterConfig::default(),
            prefix: ReferenceConfig::default().prefix,
            lifecycle: Arc::new(Lifecycle::default()),
        }
    }
}

/// `pet_id` → `petId`; names with characters other than ASCII
/// alphanumerics and `_` are left alone.
pub fn snake_to_lower_camel(name: &str) -> String {
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len());
    for (i, piece) in name.split('_').filter(|p| !p.is_empty()).enumerate() {
        if i == 0 {
            let mut chars = piece.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_lowercase());
                out.push_str(chars.as_str());
            }
        } else {
            out.push_str(&upper_first(piece));
        }
    }
    out
}

fn rename_to_camel(mut field: FieldDescriptor) -> FieldDescriptor {
    let camel = snake_to_lower_camel(&field.name);
    if !camel.is_empty() && camel != field.name {
        field.rename = Some(std::mem::replace(&mut field.name, camel));
    }
    field
}
