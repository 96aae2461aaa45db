//! `chain()`: collapses a sequence of Tools into a single Task (§4.3).
//!
//! A chained Task still produces one TaskFile per declared output across
//! every component tool (so intermediate products remain on disk and
//! inspectable), but only the last component's outputs are resolvable by
//! downstream Tasks — the Graph Builder reads `resolvable_output_names` to
//! know which of the merged outputs to expose.

use crate::error::ToolError;
use crate::tool::{RenderContext, Tool, ToolSpec};
use cosmos_core::TaskFile;
use std::collections::HashMap;
use std::sync::Arc;

pub struct ChainedTool {
    spec: ToolSpec,
    components: Vec<Arc<dyn Tool>>,
}

/// Builds the merged descriptor for a chain: inputs are the first tool's,
/// outputs are every component's concatenated, resource requests are the
/// per-field maximum, and `must_succeed`/`persist` are true if any component
/// sets them.
pub fn chain(name: impl Into<String>, tools: Vec<Arc<dyn Tool>>) -> Result<ChainedTool, ToolError> {
    if tools.is_empty() {
        return Err(ToolError::EmptyChain);
    }
    for tool in &tools {
        if tool.spec().noop {
            return Err(ToolError::NoopToolInChain { name: tool.spec().name.clone() });
        }
    }

    let first_inputs = tools[0].spec().inputs.clone();
    let mut outputs = Vec::new();
    let mut mem_req = None;
    let mut cpu_req = None;
    let mut time_req = None;
    let mut must_succeed = false;
    let mut persist = false;
    let mut drm = None;

    for tool in &tools {
        let spec = tool.spec();
        outputs.extend(spec.outputs.clone());
        mem_req = max_opt(mem_req, spec.mem_req);
        cpu_req = max_opt(cpu_req, spec.cpu_req);
        time_req = max_opt(time_req, spec.time_req);
        must_succeed |= spec.must_succeed;
        persist |= spec.persist;
        if drm.is_none() {
            drm = spec.drm.clone();
        }
    }

    let spec = ToolSpec {
        name: name.into(),
        inputs: first_inputs,
        outputs,
        mem_req,
        cpu_req,
        time_req,
        must_succeed,
        persist,
        drm,
        noop: false,
        noop_outputs: Vec::new(),
    };
    spec.validate()?;

    Ok(ChainedTool {
        spec,
        components: tools,
    })
}

fn max_opt<T: Ord>(a: Option<T>, b: Option<T>) -> Option<T> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}

impl Tool for ChainedTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// Only the last component's outputs are resolvable — every earlier
    /// merged output still exists as a TaskFile but is demoted: no
    /// downstream Task may bind an `AbstractInputFile` against it.
    fn resolvable_output_names(&self) -> Vec<String> {
        self.components
            .last()
            .expect("chain has at least one component")
            .spec()
            .outputs
            .iter()
            .map(|o| o.name.clone())
            .collect()
    }

    /// Renders each component in turn, partitioning the Task's merged
    /// output set by matching each component's declared outputs against
    /// whatever TaskFiles remain unassigned, then threads that component's
    /// outputs (plus any of its own inputs marked `forward`) into the next
    /// component's inputs.
    fn render(&self, ctx: &RenderContext<'_>) -> Result<String, ToolError> {
        let mut remaining: HashMap<(String, String), TaskFile> = ctx
            .outputs
            .values()
            .map(|tf| ((tf.name.clone(), tf.format.clone()), tf.clone()))
            .collect();
        let mut current_inputs: HashMap<String, Vec<TaskFile>> = ctx.inputs.clone();
        let mut sections = Vec::with_capacity(self.components.len());

        for tool in &self.components {
            let spec = tool.spec();
            let mut this_outputs: HashMap<String, TaskFile> = HashMap::new();

            for abstract_output in &spec.outputs {
                let matched_key = remaining
                    .keys()
                    .find(|(name, format)| abstract_output.matches(name, format))
                    .cloned();
                match matched_key {
                    Some(key) => {
                        let tf = remaining.remove(&key).expect("key just found");
                        this_outputs.insert(abstract_output.name.clone(), tf);
                    }
                    None => {
                        return Err(ToolError::ChainOutputUnmatched {
                            tool: spec.name.clone(),
                            name: Some(abstract_output.name.clone()),
                            format: Some(abstract_output.format.clone()),
                        });
                    }
                }
            }

            let sub_ctx = RenderContext {
                inputs: &current_inputs,
                outputs: &this_outputs,
                settings: ctx.settings,
                tags: ctx.tags,
                output_dir: ctx.output_dir,
            };
            let body = tool.render(&sub_ctx)?;
            sections.push(format!("# {}\n{}", spec.name, body));

            let mut next_inputs: HashMap<String, Vec<TaskFile>> = HashMap::new();
            for (name, tf) in &this_outputs {
                next_inputs.insert(name.clone(), vec![tf.clone()]);
            }
            for abstract_input in &spec.inputs {
                if !abstract_input.forward {
                    continue;
                }
                for files in current_inputs.values() {
                    let forwarded: Vec<TaskFile> = files
                        .iter()
                        .filter(|f| abstract_input.matches(&f.name, &f.format))
                        .cloned()
                        .collect();
                    for tf in forwarded {
                        next_inputs.entry(tf.name.clone()).or_default().push(tf);
                    }
                }
            }
            current_inputs = next_inputs;
        }

        Ok(sections.join("\n\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosmos_core::{AbstractInputFile, AbstractOutputFile, TagMap, TaskFileId, TaskId};
    use std::path::PathBuf;

    struct Stub {
        spec: ToolSpec,
        body: &'static str,
    }

    impl Tool for Stub {
        fn spec(&self) -> &ToolSpec {
            &self.spec
        }
        fn render(&self, _ctx: &RenderContext<'_>) -> Result<String, ToolError> {
            Ok(self.body.to_string())
        }
    }

    fn taskfile(name: &str, format: &str) -> TaskFile {
        TaskFile::new(
            TaskFileId(1),
            TaskId(1),
            name,
            format,
            PathBuf::from(format!("/out/{name}.{format}")),
            false,
        )
    }

    #[test]
    fn chain_resolves_only_last_tools_outputs() {
        let align = Arc::new(Stub {
            spec: ToolSpec::new("align").with_output(AbstractOutputFile::new("bam", "bam")),
            body: "bwa mem",
        });
        let index = Arc::new(Stub {
            spec: ToolSpec::new("index")
                .with_input(AbstractInputFile::new("bam", "bam"))
                .with_output(AbstractOutputFile::new("bai", "bai")),
            body: "samtools index",
        });

        let chained = chain("align_and_index", vec![align, index]).unwrap();
        assert_eq!(chained.resolvable_output_names(), vec!["bai".to_string()]);
        assert_eq!(chained.spec().outputs.len(), 2);
    }

    #[test]
    fn chain_render_partitions_and_threads_outputs() {
        let align = Arc::new(Stub {
            spec: ToolSpec::new("align").with_output(AbstractOutputFile::new("bam", "bam")),
            body: "bwa mem > $OUT/bam",
        });
        let index = Arc::new(Stub {
            spec: ToolSpec::new("index")
                .with_input(AbstractInputFile::new("bam", "bam"))
                .with_output(AbstractOutputFile::new("bai", "bai")),
            body: "samtools index $OUT/bam",
        });
        let chained = chain("align_and_index", vec![align, index]).unwrap();

        let mut outputs = HashMap::new();
        outputs.insert("bam".to_string(), taskfile("bam", "bam"));
        outputs.insert("bai".to_string(), taskfile("bai", "bai"));
        let inputs = HashMap::new();
        let settings = serde_json::Map::new();
        let tags = TagMap::new();
        let ctx = RenderContext {
            inputs: &inputs,
            outputs: &outputs,
            settings: &settings,
            tags: &tags,
            output_dir: std::path::Path::new("/out"),
        };

        let rendered = chained.render(&ctx).unwrap();
        assert!(rendered.contains("bwa mem"));
        assert!(rendered.contains("samtools index"));
    }

    #[test]
    fn chain_rejects_empty_component_list() {
        assert!(chain("empty", vec![]).is_err());
    }

    #[test]
    fn chain_rejects_a_noop_component() {
        let align = Arc::new(Stub {
            spec: ToolSpec::new("align").with_output(AbstractOutputFile::new("bam", "bam")),
            body: "bwa mem",
        });
        let mut noop_spec = ToolSpec::new("Input(seed)");
        noop_spec.noop = true;
        let seed = Arc::new(Stub { spec: noop_spec, body: "" });

        let err = chain("align_and_seed", vec![seed, align]).unwrap_err();
        assert!(matches!(err, ToolError::NoopToolInChain { name } if name == "Input(seed)"));
    }
}
