//! `Input`/`Inputs`: the NOOP tools that seed a Recipe with files that
//! already exist on disk rather than being produced by a command.
//!
//! Unlike every other Tool, an Input's declared output path is not a
//! template resolved at render time — it is the exact path the caller
//! supplied when building the Recipe. The Graph Builder recognizes
//! `spec().noop` and materializes the TaskFile straight from `noop_outputs`
//! without ever invoking `render`.

use crate::error::ToolError;
use crate::tool::{NoopOutput, RenderContext, Tool, ToolSpec};
use std::path::{Path, PathBuf};

/// A single pre-existing file, exposed under `name`/`format`.
pub struct Input {
    spec: ToolSpec,
}

impl Input {
    pub fn new(
        name: impl Into<String>,
        format: impl Into<String>,
        path: impl Into<PathBuf>,
    ) -> Result<Self, ToolError> {
        let name = name.into();
        let path = path.into();
        if !path.exists() {
            return Err(ToolError::MissingInputPath {
                name,
                path: path.display().to_string(),
            });
        }
        let format = format.into();
        let mut spec = ToolSpec::new(format!("Input({name})"));
        spec.noop = true;
        spec.persist = true;
        spec.noop_outputs.push(NoopOutput {
            name: name.clone(),
            format,
            path,
            persist: true,
        });
        Ok(Self { spec })
    }
}

impl Tool for Input {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn render(&self, _ctx: &RenderContext<'_>) -> Result<String, ToolError> {
        unreachable!("NOOP tools are never rendered")
    }
}

/// Several pre-existing files exposed at once, each under its own
/// name/format, fanning a list of `(path, name, format)` triples into one
/// NOOP Task.
pub struct Inputs {
    spec: ToolSpec,
}

impl Inputs {
    pub fn new(
        files: impl IntoIterator<Item = (String, String, PathBuf)>,
    ) -> Result<Self, ToolError> {
        let mut spec = ToolSpec::new("Inputs");
        spec.noop = true;
        spec.persist = true;
        for (name, format, path) in files {
            if !path.exists() {
                return Err(ToolError::MissingInputPath {
                    name,
                    path: path.display().to_string(),
                });
            }
            spec.noop_outputs.push(NoopOutput {
                name,
                format,
                path,
                persist: true,
            });
        }
        Ok(Self { spec })
    }
}

impl Tool for Inputs {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn render(&self, _ctx: &RenderContext<'_>) -> Result<String, ToolError> {
        unreachable!("NOOP tools are never rendered")
    }
}

pub fn noop_output_path(spec: &ToolSpec, name: &str) -> Option<&Path> {
    spec.noop_outputs
        .iter()
        .find(|o| o.name == name)
        .map(|o| o.path.as_path())
}
