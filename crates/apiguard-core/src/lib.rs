//! apiguard Core Library
//!
//! This crate provides the runtime half of apiguard:
//! - Hook channels with ordered, short-circuiting emission
//! - The rule chain (validators for live data, parsers for schema keywords)
//! - The check model and the request-time validator built on it
//! - Bidirectional object mapping between typed models and wire JSON
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Schema    │────▶│ Check Model │────▶│   Request   │
//! │  (compile)  │     │  (rules)    │     │  Validation │
//! └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use apiguard_core::{Lifecycle, Outcome, RequestContext, validate_request};
//!
//! let lifecycle = Lifecycle::default();
//! match validate_request(&lifecycle, &request, &operation.check) {
//!     Outcome::Pass => handle(request),
//!     Outcome::Fail => bad_request(),
//!     Outcome::Unauthorized => unauthorized(),
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod convert;
pub mod error;
pub mod hooks;
pub mod lifecycle;
pub mod model;
pub mod request;
pub mod rules;

pub use config::{Config, ProjectConfig};
pub use convert::{ApiModel, CheckDescriptor, CheckFailure, Converter, FieldMeta, ModelMeta};
pub use error::{Error, Result};
pub use lifecycle::Lifecycle;
pub use model::{CheckModel, Location, RuleSet};
pub use request::{RequestContext, validate_request};
pub use rules::{Outcome, Parser, Validator};
