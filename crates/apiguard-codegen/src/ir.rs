//! Intermediate Representation for operations and models
//!
//! The IR is what template renderers consume: per operation, the request
//! and response field descriptors plus the compiled check model; per
//! reachable definition, either an object model or an alias.

use apiguard_core::{CheckModel, Location, RuleSet};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Intermediate representation of a compiled document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiIR {
    /// Project name
    pub name: String,

    /// Project version
    pub version: String,

    /// Selected operations in document order
    pub operations: Vec<OperationIR>,

    /// Definitions reachable from the selected operations, by name
    pub models: Vec<ModelIR>,
}

/// One operation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationIR {
    /// Lower-case HTTP method
    pub method: String,

    /// Full URL (base path joined)
    pub url: String,

    /// Handler name
    pub operation_id: String,

    /// Controller derived from the first tag
    #[serde(skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Request field descriptors, one per parameter
    pub request: Vec<FieldDescriptor>,

    /// Response field descriptors
    pub response: Vec<FieldDescriptor>,

    /// Declared response status codes
    pub statuses: Vec<String>,

    /// Runtime check model
    pub check: CheckModel,
}

/// Describes one field of a request, response, or model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Property name in generated code
    pub name: String,

    /// Type descriptor: a primitive, a model name, or either suffixed with `[]`
    #[serde(rename = "type")]
    pub type_name: String,

    /// Whether the field may be absent
    pub optional: bool,

    #[allow(missing_docs)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Model the field (or its elements) refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referenced_type: Option<String>,

    /// Rules compiled for the field itself
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_rules: Option<RuleSet>,

    /// Where a request field is read from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,

    /// Wire name, when it differs from `name`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,

    /// Allowed values
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
}

/// A reachable named definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelIR {
    /// Definition with properties or composition
    Object {
        #[allow(missing_docs)]
        name: String,
        /// Own and inherited fields
        fields: Vec<FieldDescriptor>,
    },

    /// Definition standing for a primitive type
    Alias {
        #[allow(missing_docs)]
        name: String,
        /// Aliased primitive
        #[serde(rename = "type")]
        type_name: String,
        /// Allowed values
        #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
        enum_values: Option<Vec<Value>>,
        #[allow(missing_docs)]
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
}

impl FieldDescriptor {
    /// Create a required field of the given type
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            optional: false,
            description: None,
            referenced_type: None,
            inline_rules: None,
            location: None,
            rename: None,
            enum_values: None,
        }
    }

    /// Wire name of the field
    pub fn wire_name(&self) -> &str {
        self.rename.as_deref().unwrap_or(&self.name)
    }
}

impl ModelIR {
    /// Definition name
    pub fn name(&self) -> &str {
        match self {
            ModelIR::Object { name, .. } | ModelIR::Alias { name, .. } => name,
        }
    }

    /// Fields of an object model; aliases have none
    pub fn fields(&self) -> &[FieldDescriptor] {
        match self {
            ModelIR::Object { fields, .. } => fields,
            ModelIR::Alias { .. } => &[],
        }
    }
}

impl OperationIR {
    /// Name of the generated request model
    pub fn request_model_name(&self) -> String {
        format!("{}RequestBody", upper_first(&self.operation_id))
    }

    /// Name of the generated response model
    pub fn response_model_name(&self) -> String {
        format!("{}ResponseBody", upper_first(&self.operation_id))
    }
}

/// Upper-case the first character
pub fn upper_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl ApiIR {
    /// Create an empty IR
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            operations: Vec::new(),
            models: Vec::new(),
        }
    }

    /// Find an operation by id
    pub fn operation(&self, operation_id: &str) -> Option<&OperationIR> {
        self.operations
            .iter()
            .find(|op| op.operation_id == operation_id)
    }

    /// Find a model by name
    pub fn model(&self, name: &str) -> Option<&ModelIR> {
        self.models.iter().find(|model| model.name() == name)
    }

    /// Compute a content hash for change detection
    pub fn content_hash(&self) -> String {
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(self.name.as_bytes());
        hasher.update(self.version.as_bytes());

        for op in &self.operations {
            hasher.update(op.method.as_bytes());
            hasher.update(op.url.as_bytes());
            hasher.update(op.operation_id.as_bytes());
            hasher.update(format!("{:?}", op.request).as_bytes());
            hasher.update(format!("{:?}", op.response).as_bytes());
            hasher.update(format!("{:?}", op.check).as_bytes());
        }

        hasher.update(format!("{:?}", self.models).as_bytes());

        hex::encode(hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn operation(id: &str) -> OperationIR {
        OperationIR {
            method: "get".into(),
            url: "/pets".into(),
            operation_id: id.into(),
            controller: Some("Pet".into()),
            summary: None,
            request: vec![FieldDescriptor::new("page", "number")],
            response: Vec::new(),
            statuses: vec!["200".into()],
            check: CheckModel::new(),
        }
    }

    #[test]
    fn test_api_ir_lookup() {
        let mut ir = ApiIR::new("petstore", "1.0.0");
        ir.operations.push(operation("listPets"));
        ir.models.push(ModelIR::Alias {
            name: "Status".into(),
            type_name: "string".into(),
            enum_values: Some(vec![json!("open")]),
            description: None,
        });

        assert!(ir.operation("listPets").is_some());
        assert!(ir.operation("getPet").is_none());
        assert_eq!(ir.model("Status").unwrap().fields().len(), 0);
    }

    #[test]
    fn test_content_hash_changes() {
        let mut ir1 = ApiIR::new("petstore", "1.0.0");
        ir1.operations.push(operation("listPets"));

        let mut ir2 = ApiIR::new("petstore", "1.0.0");
        let mut op = operation("listPets");
        op.check.entry(Location::Query, "page").minimum = Some(1.0);
        ir2.operations.push(op);

        assert_ne!(ir1.content_hash(), ir2.content_hash());
    }

    #[test]
    fn test_content_hash_same_for_identical() {
        let mut ir1 = ApiIR::new("petstore", "1.0.0");
        ir1.operations.push(operation("listPets"));
        let mut ir2 = ApiIR::new("petstore", "1.0.0");
        ir2.operations.push(operation("listPets"));

        assert_eq!(ir1.content_hash(), ir2.content_hash());
        assert_eq!(ir1.content_hash().len(), 64);
    }

    #[test]
    fn test_model_names() {
        let op = operation("listPets");
        assert_eq!(op.request_model_name(), "ListPetsRequestBody");
        assert_eq!(op.response_model_name(), "ListPetsResponseBody");
        assert_eq!(upper_first(""), "");
    }

    #[test]
    fn test_field_descriptor_serializes_camel_case() {
        let mut field = FieldDescriptor::new("petId", "string");
        field.rename = Some("pet_id".into());
        field.location = Some(Location::Path);

        let json = serde_json::to_value(&field).unwrap();
        assert_eq!(json["rename"], "pet_id");
        assert_eq!(json["location"], "path");
        assert_eq!(json["type"], "string");
        assert!(json.get("inlineRules").is_none());
        assert_eq!(field.wire_name(), "pet_id");
    }

    #[test]
    fn test_model_kind_tag() {
        let model = ModelIR::Object {
            name: "Pet".into(),
            fields: vec![FieldDescriptor::new("name", "string")],
        };
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["kind"], "object");
        assert_eq!(json["fields"][0]["name"], "name");
    }
}
