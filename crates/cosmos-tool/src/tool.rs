//! The `Tool` trait and its static descriptor (§4.1, §9 design note).
//!
//! The original implementation declared a Tool as a Python class whose
//! `cmd()` method closed over dynamically-set class attributes. Rust has no
//! equivalent to that metaprogramming, so a Tool here is a small struct
//! (`ToolSpec`) carrying the declared inputs/outputs/resource defaults, plus
//! a trait object that knows how to render a command line against a bound
//! set of concrete files. Tools are registered in a `ToolRegistry` keyed by
//! name, mirroring how the executor looks up DRM adapters by name.

use crate::error::ToolError;
use cosmos_core::{AbstractInputFile, AbstractOutputFile, TagMap, TaskFile};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// A declared output of a NOOP tool (`Input`/`Inputs`): the concrete path is
/// already known at declaration time, so there is nothing to template (§4.1,
/// "Input/Inputs ... their single declared output is the supplied path
/// itself, never templated").
#[derive(Clone, Debug)]
pub struct NoopOutput {
    pub name: String,
    pub format: String,
    pub path: PathBuf,
    pub persist: bool,
}

/// Static descriptor for a Tool: everything the Graph Builder and Resolver
/// need to know about it without invoking any of its code.
#[derive(Clone, Debug)]
pub struct ToolSpec {
    pub name: String,
    pub inputs: Vec<AbstractInputFile>,
    pub outputs: Vec<AbstractOutputFile>,
    pub mem_req: Option<u64>,
    pub cpu_req: Option<u32>,
    pub time_req: Option<u64>,
    pub must_succeed: bool,
    pub persist: bool,
    /// Overrides the Task's DRM selection when set (§4.1: "a Tool may pin
    /// its Task to a specific DRM regardless of the Stage's default").
    pub drm: Option<String>,
    pub noop: bool,
    pub noop_outputs: Vec<NoopOutput>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            mem_req: None,
            cpu_req: None,
            time_req: None,
            must_succeed: true,
            persist: false,
            drm: None,
            noop: false,
            noop_outputs: Vec::new(),
        }
    }

    pub fn with_input(mut self, input: AbstractInputFile) -> Self {
        self.inputs.push(input);
        self
    }

    pub fn with_output(mut self, output: AbstractOutputFile) -> Self {
        self.outputs.push(output);
        self
    }

    pub fn with_mem_req(mut self, mem_req: u64) -> Self {
        self.mem_req = Some(mem_req);
        self
    }

    pub fn with_cpu_req(mut self, cpu_req: u32) -> Self {
        self.cpu_req = Some(cpu_req);
        self
    }

    pub fn with_time_req(mut self, time_req: u64) -> Self {
        self.time_req = Some(time_req);
        self
    }

    pub fn must_succeed(mut self, must_succeed: bool) -> Self {
        self.must_succeed = must_succeed;
        self
    }

    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    pub fn with_drm(mut self, drm: impl Into<String>) -> Self {
        self.drm = Some(drm.into());
        self
    }

    /// Duplicate (name, format) pairs among inputs, and among outputs,
    /// are declaration errors caught once up front.
    pub fn validate(&self) -> Result<(), ToolError> {
        let mut seen_inputs = std::collections::HashSet::new();
        for input in &self.inputs {
            let key = (input.name.clone(), input.format.clone());
            if !seen_inputs.insert(key) {
                return Err(ToolError::DuplicateIoPair {
                    tool: self.name.clone(),
                    kind: "input",
                    name: format!("{:?}", input.name),
                    format: format!("{:?}", input.format),
                });
            }
        }

        let mut seen_outputs = std::collections::HashSet::new();
        for output in &self.outputs {
            let key = (output.name.clone(), output.format.clone());
            if !seen_outputs.insert(key) {
                return Err(ToolError::DuplicateIoPair {
                    tool: self.name.clone(),
                    kind: "output",
                    name: output.name.clone(),
                    format: output.format.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Tags reserved for `cmd()` params (§4.1): a Task's own tags are merged in
/// alongside `i`, `o`, `s`, so none of them may collide with those names.
pub const RESERVED_PARAM_NAMES: [&str; 3] = ["i", "o", "s"];

pub fn validate_tag_keys(tool_name: &str, tags: &TagMap) -> Result<(), ToolError> {
    for key in tags.keys() {
        if RESERVED_PARAM_NAMES.contains(&key.as_str()) {
            return Err(ToolError::ReservedTagName {
                tool: tool_name.to_string(),
                tag: key.clone(),
            });
        }
    }
    Ok(())
}

/// Everything a Tool's render step needs about the Task it is being
/// rendered for (§4.1 steps 1-3).
pub struct RenderContext<'a> {
    /// Bound concrete inputs, grouped by the abstract input's name.
    pub inputs: &'a HashMap<String, Vec<TaskFile>>,
    /// This Task's own output files, keyed by declared output name.
    pub outputs: &'a HashMap<String, TaskFile>,
    pub settings: &'a serde_json::Map<String, serde_json::Value>,
    pub tags: &'a TagMap,
    pub output_dir: &'a Path,
}

/// A runnable Tool: knows how to turn a bound set of concrete files into a
/// shell command line. NOOP tools (`Input`/`Inputs`) never have `render`
/// called on them; the executor treats `spec().noop` Tasks as immediately
/// successful.
pub trait Tool: Send + Sync {
    fn spec(&self) -> &ToolSpec;

    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, ToolError>;

    /// Names of this Tool's declared outputs the Resolver may bind
    /// downstream inputs against. A plain Tool exposes all of them; a
    /// chained Tool overrides this to demote intermediate products (§4.3).
    fn resolvable_output_names(&self) -> Vec<String> {
        self.spec().outputs.iter().map(|o| o.name.clone()).collect()
    }
}
