//! XPath Support for identity constraints
//!
//! This module provides the restricted XPath subset used by
//! `xs:selector` and `xs:field`:
//!
//! - [`IdentityXPathParser`] compiles expressions into [`CompiledPath`]s
//! - [`ActiveAxis`] evaluates a compiled path incrementally while a
//!   document is streamed, one element or attribute at a time
//!
//! General XPath evaluation is not supported.

mod axis;
mod parsers;
mod selectors;

pub use axis::ActiveAxis;
pub use parsers::{IdentityXPathParser, XPathParseError};
pub use selectors::{CompiledPath, NameTest, PathAlternative, MAX_PATH_STEPS};
