//! Command-rendering helpers shared by every `Tool::render` implementation.
//!
//! A Tool's `render` writes its command body directly in Rust rather than
//! through a dynamic string-formatting params dict, but three mechanical
//! steps still apply uniformly to every Tool and are centralized here:
//! output basename templating, the `$OUT` substitution for the task's own
//! output directory, and the shell prelude.

use crate::error::ToolError;
use cosmos_core::TagMap;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("static pattern"))
}

/// Interpolates `{tag_name}` placeholders in a template string against a
/// Task's tags. Unlike a full format-string engine, an unresolved
/// placeholder is a hard error rather than being left verbatim, since a
/// Tool author who mistypes a tag name should learn about it at render
/// time, not find a literal `{chrom}` in their command.
pub fn interpolate(tool: &str, template: &str, tags: &TagMap) -> Result<String, ToolError> {
    let mut out = String::with_capacity(template.len());
    let mut last_end = 0;
    for caps in placeholder_re().captures_iter(template) {
        let whole = caps.get(0).expect("group 0 always present");
        let key = &caps[1];
        let value = tags.get(key).ok_or_else(|| ToolError::MalformedTemplate {
            tool: tool.to_string(),
            template: template.to_string(),
            reason: format!("no tag named '{key}'"),
        })?;
        out.push_str(&template[last_end..whole.start()]);
        out.push_str(&value.to_string());
        last_end = whole.end();
    }
    out.push_str(&template[last_end..]);
    Ok(out)
}

/// Resolves an output's on-disk basename: the declared `basename` template
/// if present, interpolated against tags, else the output's bare `name`.
pub fn render_output_path(
    tool: &str,
    output_dir: &Path,
    output_name: &str,
    basename_template: Option<&str>,
    tags: &TagMap,
) -> Result<PathBuf, ToolError> {
    let basename = match basename_template {
        Some(template) => interpolate(tool, template, tags)?,
        None => output_name.to_string(),
    };
    Ok(output_dir.join(basename))
}

/// Replaces literal occurrences of the task's own output directory with the
/// `$OUT` shell variable the prelude sets, so a rendered command stays
/// portable if the execution's root output directory is later relocated.
pub fn substitute_output_dir(cmd: &str, output_dir: &Path) -> String {
    let dir = output_dir.to_string_lossy();
    if dir.is_empty() {
        return cmd.to_string();
    }
    cmd.replace(dir.as_ref(), "$OUT")
}

/// Wraps a rendered command body in the shell prelude every non-NOOP Task's
/// script starts with (ported byte-for-byte from `Tool._prepend_cmd`).
pub fn prepend_prelude(output_dir: &Path, body: &str) -> String {
    format!(
        "#!/bin/bash\nset -e\nOUT={out}\ncd $OUT\n\n{body}",
        out = output_dir.display(),
        body = body,
    )
}
