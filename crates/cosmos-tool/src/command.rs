//! A data-driven Tool whose command line is a template string rather than
//! Rust code: placeholders interpolate against `i`/`o`/`s` locals
//! (`RESERVED_PARAM_NAMES`). This is what lets a recipe file declare a
//! pipeline stage without a compiled `Tool` impl.

use crate::error::ToolError;
use crate::tool::{RenderContext, Tool, ToolSpec};
use regex::{Captures, Regex};
use std::sync::OnceLock;

/// Placeholders: `{i.name}` / `{i.name[k]}` (k-th file bound to input
/// `name`, default 0), `{o.name}` (that output's path), `{s.key}` (a
/// setting), `{tag}` (a Task tag).
pub struct Command {
    spec: ToolSpec,
    template: String,
}

impl Command {
    pub fn new(spec: ToolSpec, template: impl Into<String>) -> Self {
        Self {
            spec,
            template: template.into(),
        }
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{([ios])\.([A-Za-z0-9_]+)(?:\[(\d+)\])?\}|\{([A-Za-z0-9_]+)\}").unwrap()
    })
}

impl Tool for Command {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, ToolError> {
        let mut error = None;
        let rendered = placeholder_re()
            .replace_all(&self.template, |caps: &Captures| {
                if error.is_some() {
                    return String::new();
                }
                match self.resolve_placeholder(ctx, caps) {
                    Ok(value) => value,
                    Err(e) => {
                        error = Some(e);
                        String::new()
                    }
                }
            })
            .into_owned();

        match error {
            Some(e) => Err(e),
            None => Ok(rendered),
        }
    }
}

impl Command {
    fn resolve_placeholder(
        &self,
        ctx: &RenderContext<'_>,
        caps: &Captures,
    ) -> Result<String, ToolError> {
        let unbound = |name: &str| ToolError::UnboundInput {
            tool: self.spec.name.clone(),
            name: Some(name.to_string()),
            format: None,
        };

        if let Some(kind) = caps.get(1) {
            let name = &caps[2];
            let index: usize = caps
                .get(3)
                .and_then(|m| m.as_str().parse().ok())
                .unwrap_or(0);
            match kind.as_str() {
                "i" => ctx
                    .inputs
                    .get(name)
                    .and_then(|files| files.get(index))
                    .map(|file| file.path.display().to_string())
                    .ok_or_else(|| unbound(name)),
                "o" => ctx
                    .outputs
                    .get(name)
                    .map(|file| file.path.display().to_string())
                    .ok_or_else(|| unbound(name)),
                "s" => ctx
                    .settings
                    .get(name)
                    .map(setting_to_string)
                    .ok_or_else(|| unbound(name)),
                _ => unreachable!("regex only captures i/o/s"),
            }
        } else {
            let tag = &caps[4];
            ctx.tags
                .get(tag)
                .map(|value| value.to_string())
                .ok_or_else(|| unbound(tag))
        }
    }
}

fn setting_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
