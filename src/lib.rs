//! # xmlschema-identity
//!
//! Streaming validation of XML Schema identity constraints
//! (`xs:key`, `xs:unique` and `xs:keyref`).
//!
//! ## Features
//!
//! - Restricted selector/field XPath compiler with incremental matching
//! - Typed value equality across derived and comparable datatypes
//! - Nested constraint scopes and keyref resolution to the innermost
//!   referenced key or unique
//! - Violations reported as events through a sink, with source positions
//! - Schema models loaded from JSON
//! - Protection against oversized and deeply nested documents
//!
//! ## Example
//!
//! ```rust,ignore
//! use xmlschema_identity::validators::{validate_identities, ValidationSettings, XsdSchema};
//!
//! let schema = XsdSchema::from_file("model.json")?;
//! let events = validate_identities(&schema, &xml, &ValidationSettings::default())?;
//! for event in &events {
//!     println!("{}", event);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod error;
pub mod limits;

// Utilities
pub mod namespaces;
pub mod names;
pub mod locations;

// Resource loading
pub mod loaders;

// Selector and field paths
pub mod xpath;

// Validators
pub mod validators;

// Re-exports for convenience
pub use error::{Error, Result};

/// Version of the xmlschema-identity library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// XSD 1.0 namespace
pub const XSD_1_0_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema";

/// XSD namespace of built-in datatypes
pub const XSD_NAMESPACE: &str = XSD_1_0_NAMESPACE;

/// XML Schema instance namespace
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

/// XML namespace
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// XMLNS namespace
pub const XMLNS_NAMESPACE: &str = "http://www.w3.org/2000/xmlns/";
