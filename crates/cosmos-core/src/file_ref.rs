//! Abstract and concrete file descriptors (§3, §4.1).
//!
//! `AbstractInputFile`/`AbstractOutputFile` are patterns declared on a Tool
//! that the Resolver matches against concrete `TaskFile`s at graph-build
//! time. They never exist as runtime entities themselves.

use serde::{Deserialize, Serialize};

pub const WILDCARD_FORMAT: &str = "*";

/// A pattern an input may match. `name`/`format` of `None` are wildcards for
/// that field (§4.2); `format == Some("*")` matches every output of each
/// parent regardless of name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractInputFile {
    pub name: Option<String>,
    pub format: Option<String>,
    /// "this input should also appear to downstream tasks as if it were our
    /// own output" (§3, Glossary).
    pub forward: bool,
}

impl AbstractInputFile {
    pub fn new(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            format: Some(format.into()),
            forward: false,
        }
    }

    pub fn forwarding(mut self) -> Self {
        self.forward = true;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn any_format(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            format: Some(WILDCARD_FORMAT.to_string()),
            forward: false,
        }
    }

    /// Whether this pattern matches every output file of its parents,
    /// regardless of name (§4.2).
    pub fn is_wildcard(&self) -> bool {
        self.format.as_deref() == Some(WILDCARD_FORMAT)
    }

    /// Match against a concrete (name, format) pair, per §4.2's matching rule.
    pub fn matches(&self, name: &str, format: &str) -> bool {
        if self.is_wildcard() {
            return true;
        }
        let name_ok = self.name.as_deref().map(|n| n == name).unwrap_or(true);
        let format_ok = self.format.as_deref().map(|f| f == format).unwrap_or(true);
        name_ok && format_ok
    }
}

/// A declared output of a Tool. Unlike inputs, the name is a template string
/// (interpolated against tags/`i` at render time, §4.1) rather than a
/// matching pattern, since each Tool instance produces exactly one concrete
/// TaskFile per declared output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbstractOutputFile {
    pub name: String,
    pub format: String,
    /// Template for the on-disk basename; `None` defaults to `name`.
    pub basename: Option<String>,
}

impl AbstractOutputFile {
    pub fn new(name: impl Into<String>, format: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format: format.into(),
            basename: None,
        }
    }

    pub fn with_basename(mut self, basename: impl Into<String>) -> Self {
        self.basename = Some(basename.into());
        self
    }

    pub fn matches(&self, name: &str, format: &str) -> bool {
        if format == WILDCARD_FORMAT {
            return true;
        }
        self.name == name && self.format == format
    }
}
