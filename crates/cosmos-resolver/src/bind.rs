//! Input binding: matches a Tool's declared `AbstractInputFile`s against a
//! child Task's parents (§4.2).
//!
//! A pure function: the same parents and the same file index always
//! produce the same bound input map, which is exercised directly as a
//! property test (§8).

use crate::error::ResolverError;
use cosmos_core::{AbstractInputFile, Task, TaskFile, TaskFileId};
use std::collections::HashMap;

/// The set of TaskFile ids a Task exposes to its children: its own
/// resolvable outputs, plus any input it was itself asked to forward
/// (§3 Glossary: "forward").
pub fn visible_files(task: &Task) -> Vec<TaskFileId> {
    let mut ids = task.resolvable_output_ids.clone();
    ids.extend(
        task.input_file_assocs
            .iter()
            .filter(|assoc| assoc.forward)
            .map(|assoc| assoc.task_file_id),
    );
    ids
}

/// Binds one declared `AbstractInputFile` against a set of parent Tasks.
/// Scans every parent's visible files (§4.2: "each parent's output files
/// *plus* each parent's forwarded inputs"); a wildcard-format pattern
/// matches every visible file, otherwise name/format must each match or be
/// unset on the pattern. Returns every match, in parent order — callers
/// needing exactly one file validate the cardinality themselves.
pub fn resolve_input(
    abstract_input: &AbstractInputFile,
    parents: &[&Task],
    files: &HashMap<TaskFileId, TaskFile>,
) -> Result<Vec<TaskFile>, ResolverError> {
    let mut matched = Vec::new();
    for parent in parents {
        for id in visible_files(parent) {
            let Some(taskfile) = files.get(&id) else {
                continue;
            };
            if abstract_input.matches(&taskfile.name, &taskfile.format) {
                matched.push(taskfile.clone());
            }
        }
    }

    if matched.is_empty() {
        return Err(ResolverError::Unresolved {
            parents: parents.iter().map(|p| p.id).collect(),
            name: abstract_input.name.clone(),
            format: abstract_input.format.clone(),
        });
    }

    Ok(matched)
}

/// Binds every declared `AbstractInputFile` of a Tool against the same set
/// of parents, keyed by the abstract input's declared name (falling back to
/// a positional key for the rare fully-wildcard pattern with no name).
/// Returns the originating pattern alongside its matches so callers can
/// read its `forward` flag without a second lookup.
pub fn resolve_all_keyed(
    abstract_inputs: &[AbstractInputFile],
    parents: &[&Task],
    files: &HashMap<TaskFileId, TaskFile>,
) -> Result<Vec<(String, AbstractInputFile, Vec<TaskFile>)>, ResolverError> {
    let mut bound = Vec::with_capacity(abstract_inputs.len());
    for (idx, abstract_input) in abstract_inputs.iter().enumerate() {
        let key = abstract_input
            .name
            .clone()
            .unwrap_or_else(|| format!("input_{idx}"));
        let matched = resolve_input(abstract_input, parents, files)?;
        bound.push((key, abstract_input.clone(), matched));
    }
    Ok(bound)
}
