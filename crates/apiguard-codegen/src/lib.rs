//! API Guard Code Generation
//!
//! This crate compiles an interface definition document into per-operation
//! check models and the descriptors template renderers consume.
//!
//! # Pipeline Overview
//!
//! ```text
//! ┌──────────┐     ┌──────────┐     ┌──────────────┐     ┌─────────┐
//! │   YAML   │────▶│ Document │────▶│ Check models │────▶│   IR    │
//! │ Document │     │ (schema) │     │  (compiler)  │     │ (JSON)  │
//! └──────────┘     └──────────┘     └──────────────┘     └─────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use apiguard_codegen::Parser;
//!
//! let ir = Parser::default().parse_file("swagger.yaml")?;
//! let check = &ir.operation("getPet").unwrap().check;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod compiler;
pub mod error;
pub mod ir;
pub mod parser;
pub mod schema;

pub use compiler::CompileContext;
pub use error::{Error, Result};
pub use ir::{ApiIR, FieldDescriptor, ModelIR, OperationIR};
pub use parser::Parser;
pub use schema::{ApiDocument, SchemaNode};
