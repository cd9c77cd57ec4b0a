//! Definition tree
//!
//! The parsed interface definition the compiler reads: named definitions
//! plus `url → method → operation`. Both parameters and schema objects are
//! [`SchemaNode`]s, since they share the constraint keywords.
//!
//! # Example
//!
//! ```yaml
//! basePath: /api
//! paths:
//!   /pets/{id}:
//!     get:
//!       operationId: getPet
//!       tags: [pet]
//!       parameters:
//!         - { name: id, in: path, type: string, required: true }
//!       responses:
//!         200:
//!           schema:
//!             $ref: "#/definitions/Pet"
//! definitions:
//!   Pet:
//!     type: object
//!     required: [name]
//!     properties:
//!       name: { type: string, maxLength: 20 }
//! ```

use apiguard_core::RuleSet;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::{Error, Result};

/// A complete definition document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiDocument {
    /// Prefix joined onto every path key
    #[serde(rename = "basePath", default, skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,

    /// Named composite definitions
    #[serde(default)]
    pub definitions: BTreeMap<String, SchemaNode>,

    /// Operations by path key
    #[serde(default)]
    pub paths: BTreeMap<String, PathItem>,
}

/// Operations under one path key
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathItem {
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,

    /// Parameters shared by every operation on this path
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<SchemaNode>,
}

impl PathItem {
    /// Declared operations with their lower-case method
    pub fn operations(&self) -> impl Iterator<Item = (&'static str, &Operation)> {
        [
            ("get", &self.get),
            ("put", &self.put),
            ("post", &self.post),
            ("delete", &self.delete),
            ("options", &self.options),
            ("head", &self.head),
            ("patch", &self.patch),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
    }
}

/// One operation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Operation {
    /// Operation id (handler name)
    #[serde(rename = "operationId", default, skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,

    /// Tags; the first names the controller
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,

    /// Short summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Request parameters
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<SchemaNode>,

    /// Responses by status code (`"200"`, `"default"`, ...)
    #[serde(default, deserialize_with = "status_keys")]
    pub responses: BTreeMap<String, SchemaNode>,
}

#[derive(Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
enum StatusKey {
    Code(u64),
    Text(String),
}

fn status_keys<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<BTreeMap<String, SchemaNode>, D::Error> {
    let raw: HashMap<StatusKey, SchemaNode> = HashMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(key, node)| {
            let key = match key {
                StatusKey::Code(code) => code.to_string(),
                StatusKey::Text(text) => text,
            };
            (key, node)
        })
        .collect())
}

/// `required` is a flag on parameters and a name list on objects
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Required {
    /// Parameter-level flag
    Flag(bool),
    /// Object-level list of required property names
    Fields(Vec<String>),
}

/// A parameter or schema object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaNode {
    /// Parameter name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Parameter location (`query`, `path`, `header`, `body`)
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,

    /// Primitive type name
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,

    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Reference to a named definition
    #[serde(rename = "$ref", default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,

    /// Body parameter / response schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Box<SchemaNode>>,

    /// Array element schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<SchemaNode>>,

    /// Object properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, SchemaNode>>,

    /// Composition branches
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<SchemaNode>>,

    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Required>,

    #[allow(missing_docs)]
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,

    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,

    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,

    #[allow(missing_docs)]
    #[serde(rename = "x-maxLength", default, skip_serializing_if = "Option::is_none")]
    pub x_max_length: Option<u64>,

    #[allow(missing_docs)]
    #[serde(rename = "x-minLength", default, skip_serializing_if = "Option::is_none")]
    pub x_min_length: Option<u64>,

    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,

    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,

    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,

    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,

    #[allow(missing_docs)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
}

macro_rules! overlay_fields {
    ($base:expr, $top:expr, $( $field:ident ),* $(,)?) => {
        SchemaNode {
            $( $field: $top.$field.clone().or_else(|| $base.$field.clone()), )*
        }
    };
}

impl SchemaNode {
    /// Constraint keywords of this node.
    ///
    /// `required` is set when the node's own flag is on or the caller
    /// knows the field is listed in its parent's `required` list.
    pub fn keywords(&self, listed_required: bool) -> RuleSet {
        let own_flag = matches!(self.required, Some(Required::Flag(true)));
        RuleSet {
            required: (own_flag || listed_required).then_some(true),
            max_length: self.max_length,
            min_length: self.min_length,
            x_max_length: self.x_max_length,
            x_min_length: self.x_min_length,
            maximum: self.maximum,
            minimum: self.minimum,
            pattern: self.pattern.clone(),
            enum_values: self.enum_values.clone(),
            max_items: self.max_items,
            min_items: self.min_items,
        }
    }

    /// Copy of this node with every field set on `top` taking precedence
    pub fn overlay(&self, top: &SchemaNode) -> SchemaNode {
        overlay_fields!(
            self,
            top,
            name,
            location,
            type_name,
            format,
            description,
            reference,
            schema,
            items,
            properties,
            all_of,
            required,
            enum_values,
            max_length,
            min_length,
            x_max_length,
            x_min_length,
            maximum,
            minimum,
            pattern,
            max_items,
            min_items,
        )
    }

    /// Whether the node is declared as an array
    pub fn is_array(&self) -> bool {
        self.type_name.as_deref() == Some("array")
    }

    /// Whether the parameter-level `required` flag is on
    pub fn is_required(&self) -> bool {
        matches!(self.required, Some(Required::Flag(true)))
    }

    /// Names listed in an object-level `required` list
    pub fn required_fields(&self) -> &[String] {
        match &self.required {
            Some(Required::Fields(names)) => names,
            _ => &[],
        }
    }

    /// Whether the node carries properties or composition branches
    pub fn is_composite(&self) -> bool {
        self.properties.is_some() || self.all_of.is_some()
    }
}

/// Definition name for a reference, if it carries `prefix`
pub fn reference_name<'a>(reference: &'a str, prefix: &str) -> Option<&'a str> {
    reference.strip_prefix(prefix).filter(|name| !name.is_empty())
}

/// Collapse runs of `/` into one
pub fn collapse_slashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '/' && out.ends_with('/') {
            continue;
        }
        out.push(c);
    }
    out
}

impl ApiDocument {
    /// Parse a YAML (or JSON) document
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Read and parse a document file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::DocumentNotFound {
                path: path.display().to_string(),
            });
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }

    /// Look up a definition by reference
    pub fn resolve(&self, reference: &str, prefix: &str) -> Option<&SchemaNode> {
        self.definitions.get(reference_name(reference, prefix)?)
    }

    /// Full URL for a path key
    pub fn full_url(&self, path: &str) -> String {
        match self.base_path.as_deref() {
            Some(base) if !base.is_empty() && base != "/" => collapse_slashes(&format!("{base}{path}")),
            _ => collapse_slashes(path),
        }
    }

    /// Every operation as `(full url, method, path item, operation)`
    pub fn operations(&self) -> impl Iterator<Item = (String, &'static str, &PathItem, &Operation)> {
        self.paths.iter().flat_map(move |(path, item)| {
            let url = self.full_url(path);
            item.operations()
                .map(move |(method, op)| (url.clone(), method, item, op))
        })
    }
}
