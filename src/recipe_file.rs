//! Declares a pipeline from a JSON file instead of compiled `Tool` impls and
//! builder calls, for the `cosmos run <recipe-file>` CLI subcommand.
//!
//! Every Tool a recipe file can declare is a [`cosmos_tool::Command`]
//! (template-driven) or an `Input`/`Inputs` (pre-existing files) — the two
//! Tool kinds that don't require Rust code to exist. A recipe file's stages
//! map directly onto [`StageDecl`]; the graph shape (relationships,
//! grouping, tag expansion) is unchanged from the programmatic API.

use cosmos_core::{AbstractInputFile, AbstractOutputFile, RelationshipType, TagMap};
use cosmos_resolver::{Recipe, StageDecl};
use cosmos_tool::{Command, Input, Inputs, Tool, ToolError, ToolSpec};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecipeFileError {
    #[error("reading recipe file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing recipe file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Tool(#[from] ToolError),
}

#[derive(Debug, Deserialize)]
pub struct ExecutionDecl {
    pub name: String,
    pub output_dir: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ToolDecl {
    Command {
        name: String,
        #[serde(default)]
        inputs: Vec<AbstractInputFile>,
        #[serde(default)]
        outputs: Vec<AbstractOutputFile>,
        template: String,
        mem_req: Option<u64>,
        cpu_req: Option<u32>,
        time_req: Option<u64>,
        #[serde(default = "default_true")]
        must_succeed: bool,
        #[serde(default)]
        persist: bool,
        drm: Option<String>,
    },
    Input {
        name: String,
        format: String,
        path: PathBuf,
    },
    Inputs {
        files: Vec<InputFileDecl>,
    },
}

#[derive(Debug, Deserialize)]
struct InputFileDecl {
    name: String,
    format: String,
    path: PathBuf,
}

fn default_true() -> bool {
    true
}

fn default_relationship() -> RelationshipType {
    RelationshipType::One2one
}

fn default_max_attempts() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
struct StageFileDecl {
    name: String,
    tool: String,
    #[serde(default)]
    parents: Vec<String>,
    #[serde(default = "default_relationship")]
    relationship: RelationshipType,
    #[serde(default)]
    group_by: Vec<String>,
    #[serde(default)]
    tag_expansion: Vec<TagMap>,
    drm: Option<String>,
    #[serde(default = "default_max_attempts")]
    max_attempts: u32,
}

#[derive(Debug, Deserialize)]
struct RecipeFileDoc {
    execution: ExecutionDecl,
    #[serde(default)]
    tools: Vec<ToolDecl>,
    stages: Vec<StageFileDecl>,
}

/// The result of loading a recipe file: the Tools it declared (still to be
/// registered on a [`crate::CosmosBuilder`]) and the Recipe built from its
/// stage list.
pub struct LoadedRecipeFile {
    pub execution: ExecutionDecl,
    pub tools: Vec<Arc<dyn Tool>>,
    pub recipe: Recipe,
}

pub fn load(path: &Path) -> Result<LoadedRecipeFile, RecipeFileError> {
    let raw = std::fs::read_to_string(path).map_err(|source| RecipeFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: RecipeFileDoc = serde_json::from_str(&raw).map_err(|source| RecipeFileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let mut tools = Vec::with_capacity(doc.tools.len());
    for decl in doc.tools {
        tools.push(build_tool(decl)?);
    }

    let mut recipe = Recipe::new();
    for stage in doc.stages {
        let mut stage_decl = StageDecl::new(stage.name.clone(), stage.tool.clone())
            .with_relationship(stage.relationship)
            .group_by(stage.group_by)
            .expand_tags(stage.tag_expansion)
            .with_max_attempts(stage.max_attempts);
        for parent in stage.parents {
            stage_decl = stage_decl.with_parent(parent);
        }
        if let Some(drm) = stage.drm {
            stage_decl = stage_decl.with_drm(drm);
        }
        recipe = recipe.add_stage(stage_decl);
    }

    Ok(LoadedRecipeFile {
        execution: doc.execution,
        tools,
        recipe,
    })
}

fn build_tool(decl: ToolDecl) -> Result<Arc<dyn Tool>, RecipeFileError> {
    match decl {
        ToolDecl::Command {
            name,
            inputs,
            outputs,
            template,
            mem_req,
            cpu_req,
            time_req,
            must_succeed,
            persist,
            drm,
        } => {
            let mut spec = ToolSpec::new(name).must_succeed(must_succeed).persist(persist);
            for input in inputs {
                spec.inputs.push(input);
            }
            for output in outputs {
                spec.outputs.push(output);
            }
            if let Some(mem_req) = mem_req {
                spec = spec.with_mem_req(mem_req);
            }
            if let Some(cpu_req) = cpu_req {
                spec = spec.with_cpu_req(cpu_req);
            }
            if let Some(time_req) = time_req {
                spec = spec.with_time_req(time_req);
            }
            if let Some(drm) = drm {
                spec = spec.with_drm(drm);
            }
            spec.validate()?;
            Ok(Arc::new(Command::new(spec, template)))
        }
        ToolDecl::Input { name, format, path } => Ok(Arc::new(Input::new(name, format, path)?)),
        ToolDecl::Inputs { files } => Ok(Arc::new(Inputs::new(
            files.into_iter().map(|f| (f.name, f.format, f.path)),
        )?)),
    }
}
