//! Graph Builder: expands a `Recipe` into a concrete Execution's Stage/Task/
//! TaskFile graph (§4.4).
//!
//! This builder only constructs the in-memory graph and runs the Resolver
//! against it — it never touches persistence. The caller (the `Cosmos`
//! facade) commits each built stage to the State Store transactionally, so
//! a Resolver failure partway through a stage never leaves a half-written
//! stage on disk.

use crate::bind;
use crate::error::ResolverError;
use crate::recipe::{Recipe, StageDecl};
use cosmos_core::{
    tags, ExecutionId, InputFileAssociation, RelationshipType, Stage, StageId, TagMap, Task,
    TaskFile, TaskFileId, TaskId,
};
use cosmos_tool::{render, validate_tag_keys, ToolRegistry};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// The fully expanded graph of a built Recipe, ready for the caller to
/// persist.
pub struct BuiltGraph {
    pub stages: Vec<Stage>,
    pub tasks: HashMap<TaskId, Task>,
    pub files: HashMap<TaskFileId, TaskFile>,
}

pub struct GraphBuilder<'a> {
    registry: &'a ToolRegistry,
    execution_id: ExecutionId,
    base_output_dir: PathBuf,
    next_stage_id: i64,
    next_task_id: i64,
    next_taskfile_id: i64,
    stage_task_ids: HashMap<String, Vec<TaskId>>,
    stages: Vec<Stage>,
    tasks: HashMap<TaskId, Task>,
    files: HashMap<TaskFileId, TaskFile>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(execution_id: ExecutionId, base_output_dir: PathBuf, registry: &'a ToolRegistry) -> Self {
        Self {
            registry,
            execution_id,
            base_output_dir,
            next_stage_id: 1,
            next_task_id: 1,
            next_taskfile_id: 1,
            stage_task_ids: HashMap::new(),
            stages: Vec::new(),
            tasks: HashMap::new(),
            files: HashMap::new(),
        }
    }

    pub fn build(mut self, recipe: &Recipe) -> Result<BuiltGraph, ResolverError> {
        for decl in &recipe.stages {
            self.add_stage(decl)?;
        }
        Ok(BuiltGraph {
            stages: self.stages,
            tasks: self.tasks,
            files: self.files,
        })
    }

    fn add_stage(&mut self, decl: &StageDecl) -> Result<(), ResolverError> {
        let tool = self
            .registry
            .get(&decl.tool_name)
            .ok_or_else(|| ResolverError::UnknownTool(decl.name.clone(), decl.tool_name.clone()))?;

        let parent_lists: Vec<Vec<TaskId>> = decl
            .parent_stages
            .iter()
            .map(|name| {
                self.stage_task_ids
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ResolverError::UnknownParentStage(decl.name.clone(), name.clone()))
            })
            .collect::<Result<_, _>>()?;

        let groups = self.expand_relationship(decl, &parent_lists)?;
        if groups.is_empty() {
            return Err(ResolverError::EmptyStage(decl.name.clone()));
        }

        let stage_id = StageId(self.next_stage_id);
        self.next_stage_id += 1;
        let mut stage = Stage::new(stage_id, self.execution_id, decl.name.clone(), decl.tool_name.clone());

        let mut seen_tags = HashSet::new();
        for (tags, parent_ids) in groups {
            validate_tag_keys(&decl.tool_name, &tags)?;
            let tags_key = tags_key(&tags);
            if !seen_tags.insert(tags_key) {
                return Err(ResolverError::DuplicateTask {
                    stage: decl.name.clone(),
                    tags: format!("{tags:?}"),
                });
            }

            let task_id = TaskId(self.next_task_id);
            self.next_task_id += 1;
            let output_dir = self
                .base_output_dir
                .join(&decl.name)
                .join(format!("task_{}", task_id.value()));

            let drm = tool
                .spec()
                .drm
                .clone()
                .or_else(|| decl.drm.clone())
                .unwrap_or_else(|| "local".to_string());

            let mut task = Task::new(task_id, stage_id, tags.clone(), output_dir.clone(), drm);
            task.must_succeed = tool.spec().must_succeed;
            task.noop = tool.spec().noop;
            task.mem_req = tool.spec().mem_req;
            task.cpu_req = tool.spec().cpu_req;
            task.time_req = tool.spec().time_req;
            task.max_attempts = decl.max_attempts.max(1);
            task.parent_ids = parent_ids.clone();

            if tool.spec().noop {
                let mut output_ids = Vec::new();
                for noop_output in &tool.spec().noop_outputs {
                    let id = TaskFileId(self.next_taskfile_id);
                    self.next_taskfile_id += 1;
                    self.files.insert(
                        id,
                        TaskFile::new(
                            id,
                            task_id,
                            noop_output.name.clone(),
                            noop_output.format.clone(),
                            noop_output.path.clone(),
                            noop_output.persist,
                        ),
                    );
                    output_ids.push(id);
                }
                task.set_output_files(output_ids);
            } else {
                let parent_refs: Vec<&Task> =
                    parent_ids.iter().map(|id| &self.tasks[id]).collect();
                let bindings =
                    bind::resolve_all_keyed(&tool.spec().inputs, &parent_refs, &self.files)?;
                for (_, abstract_input, files) in &bindings {
                    for taskfile in files {
                        task.input_file_assocs.push(InputFileAssociation {
                            task_file_id: taskfile.id,
                            forward: abstract_input.forward,
                        });
                    }
                }

                let mut output_ids = Vec::new();
                for abstract_output in &tool.spec().outputs {
                    let path = render::render_output_path(
                        &decl.tool_name,
                        &output_dir,
                        &abstract_output.name,
                        abstract_output.basename.as_deref(),
                        &tags,
                    )?;
                    let id = TaskFileId(self.next_taskfile_id);
                    self.next_taskfile_id += 1;
                    self.files.insert(
                        id,
                        TaskFile::new(
                            id,
                            task_id,
                            abstract_output.name.clone(),
                            abstract_output.format.clone(),
                            path,
                            tool.spec().persist,
                        ),
                    );
                    output_ids.push(id);
                }
                task.set_output_files(output_ids);

                let resolvable: HashSet<String> =
                    tool.resolvable_output_names().into_iter().collect();
                task.resolvable_output_ids = task
                    .output_file_ids
                    .iter()
                    .copied()
                    .filter(|id| resolvable.contains(&self.files[id].name))
                    .collect();
            }

            stage.task_ids.push(task_id);
            self.tasks.insert(task_id, task);
        }

        self.stage_task_ids
            .insert(decl.name.clone(), stage.task_ids.clone());
        self.stages.push(stage);
        Ok(())
    }

    /// Groups parent Tasks into child (tags, parent_ids) pairs per the
    /// declared RelationshipType (§3 "DAG edges", spec bullets for each
    /// kind). A stage with no parent stages is a root: `one2many` fans out
    /// across its tag expansion against a single implicit empty-tag
    /// parent; every other relationship produces exactly one root Task.
    fn expand_relationship(
        &self,
        decl: &StageDecl,
        parent_lists: &[Vec<TaskId>],
    ) -> Result<Vec<(TagMap, Vec<TaskId>)>, ResolverError> {
        if parent_lists.is_empty() {
            return if decl.relationship == RelationshipType::One2many {
                if decl.tag_expansion.is_empty() {
                    return Err(ResolverError::MalformedRelationship {
                        stage: decl.name.clone(),
                        relationship: decl.relationship,
                        needed: "a non-empty tag expansion",
                        detail: "root one2many stage has no tag_expansion entries".to_string(),
                    });
                }
                Ok(decl
                    .tag_expansion
                    .iter()
                    .map(|t| (t.clone(), Vec::new()))
                    .collect())
            } else {
                Ok(vec![(TagMap::new(), Vec::new())])
            };
        }

        match decl.relationship {
            RelationshipType::One2one => self.one2one(decl, parent_lists),
            RelationshipType::Many2one => Ok(self.many2one(decl, parent_lists)),
            RelationshipType::One2many => self.one2many(decl, parent_lists),
            RelationshipType::Many2many => Ok(self.many2many(parent_lists)),
        }
    }

    /// One child per distinct tag set, requiring that tag set to be present
    /// in every listed parent stage (so a child's `parent_ids` names one
    /// task from each). With a single parent stage this degenerates to
    /// "one child per parent Task" exactly as specified.
    fn one2one(
        &self,
        decl: &StageDecl,
        parent_lists: &[Vec<TaskId>],
    ) -> Result<Vec<(TagMap, Vec<TaskId>)>, ResolverError> {
        let mut by_tags: HashMap<String, (TagMap, Vec<TaskId>)> = HashMap::new();
        for list in parent_lists {
            for &id in list {
                let task = &self.tasks[&id];
                let key = tags_key(&task.tags);
                let entry = by_tags
                    .entry(key)
                    .or_insert_with(|| (task.tags.clone(), Vec::new()));
                entry.1.push(id);
            }
        }

        let mut groups = Vec::with_capacity(by_tags.len());
        for (tags, ids) in by_tags.into_values() {
            if ids.len() != parent_lists.len() {
                return Err(ResolverError::MalformedRelationship {
                    stage: decl.name.clone(),
                    relationship: RelationshipType::One2one,
                    needed: "matching tags present in every parent stage",
                    detail: format!(
                        "tags {tags:?} found in {}/{} parent stages",
                        ids.len(),
                        parent_lists.len()
                    ),
                });
            }
            groups.push((tags, ids));
        }
        Ok(groups)
    }

    /// One child per distinct grouping of parents' tags projected onto
    /// `group_by`; the child inherits exactly that projected subset.
    fn many2one(&self, decl: &StageDecl, parent_lists: &[Vec<TaskId>]) -> Vec<(TagMap, Vec<TaskId>)> {
        let mut groups: HashMap<String, (TagMap, Vec<TaskId>)> = HashMap::new();
        for list in parent_lists {
            for &id in list {
                let task = &self.tasks[&id];
                let projected = tags::project(&task.tags, &decl.group_by);
                let key = tags_key(&projected);
                let entry = groups
                    .entry(key)
                    .or_insert_with(|| (projected.clone(), Vec::new()));
                entry.1.push(id);
            }
        }
        groups.into_values().collect()
    }

    /// Cartesian product of every parent Task (across all listed parent
    /// stages, flattened into one pool) with the declared tag expansion;
    /// expansion keys win on collision with the parent's own tags.
    fn one2many(
        &self,
        decl: &StageDecl,
        parent_lists: &[Vec<TaskId>],
    ) -> Result<Vec<(TagMap, Vec<TaskId>)>, ResolverError> {
        if decl.tag_expansion.is_empty() {
            return Err(ResolverError::MalformedRelationship {
                stage: decl.name.clone(),
                relationship: RelationshipType::One2many,
                needed: "a non-empty tag expansion",
                detail: "one2many requires StageDecl::expand_tags(...)".to_string(),
            });
        }
        let mut groups = Vec::new();
        for list in parent_lists {
            for &parent_id in list {
                let parent_tags = self.tasks[&parent_id].tags.clone();
                for expansion in &decl.tag_expansion {
                    let mut merged = parent_tags.clone();
                    for (k, v) in expansion {
                        merged.insert(k.clone(), v.clone());
                    }
                    groups.push((merged, vec![parent_id]));
                }
            }
        }
        Ok(groups)
    }

    /// Full cartesian product across all listed parent stages: one child
    /// per combination, inheriting the union of each combination member's
    /// tags.
    fn many2many(&self, parent_lists: &[Vec<TaskId>]) -> Vec<(TagMap, Vec<TaskId>)> {
        let mut combos: Vec<Vec<TaskId>> = vec![Vec::new()];
        for list in parent_lists {
            let mut next = Vec::with_capacity(combos.len() * list.len());
            for combo in &combos {
                for &id in list {
                    let mut extended = combo.clone();
                    extended.push(id);
                    next.push(extended);
                }
            }
            combos = next;
        }

        combos
            .into_iter()
            .map(|combo| {
                let mut merged = TagMap::new();
                for &id in &combo {
                    for (k, v) in &self.tasks[&id].tags {
                        merged.insert(k.clone(), v.clone());
                    }
                }
                (merged, combo)
            })
            .collect()
    }
}

fn tags_key(tags: &TagMap) -> String {
    serde_json::to_string(tags).expect("TagMap always serializes")
}
