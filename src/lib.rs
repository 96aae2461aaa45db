//! The `Cosmos` facade: the single entry point a pipeline author or the
//! `cosmos` CLI binary constructs, wiring together tool declaration
//! (`cosmos-tool`), recipe resolution (`cosmos-resolver`), DRM submission
//! (`cosmos-drm`), durable state (`cosmos-store`), and the scheduling loop
//! (`cosmos-executor`) behind one object.
//!
//! `Cosmos` is the thing a pipeline script imports and calls
//! `add_stage`/`run` against, rather than assembling the DAG engine's
//! pieces by hand each time.

pub mod error;
pub mod recipe_file;

pub use error::CosmosError;

pub use cosmos_core::{Execution, ExecutionId, ExecutionStatus};
pub use cosmos_drm::{DefaultGetSubmitArgs, DrmAdapter, DrmRegistry, GetSubmitArgs};
pub use cosmos_executor::SignalBus;
pub use cosmos_resolver::{Recipe, StageDecl};
pub use cosmos_store::Store;
pub use cosmos_tool::{Tool, ToolRegistry};

use cosmos_executor::{Executor, ExecutorConfig};
use cosmos_resolver::GraphBuilder;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builds a [`Cosmos`] facade, registering Tools and DRM adapters up front
/// and connecting to the configured store only once `build()` is called.
pub struct CosmosBuilder {
    database_url: String,
    get_submit_args: Arc<dyn GetSubmitArgs>,
    default_drm: String,
    default_queue: Option<String>,
    max_concurrent_tasks: Option<usize>,
    tick_interval: Option<Duration>,
    tools: ToolRegistry,
    drms: DrmRegistry,
    settings: serde_json::Map<String, serde_json::Value>,
}

impl CosmosBuilder {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            get_submit_args: Arc::new(DefaultGetSubmitArgs::default()),
            default_drm: "local".to_string(),
            default_queue: None,
            max_concurrent_tasks: None,
            tick_interval: None,
            tools: ToolRegistry::new(),
            drms: DrmRegistry::with_defaults(),
            settings: serde_json::Map::new(),
        }
    }

    pub fn get_submit_args(mut self, get_submit_args: Arc<dyn GetSubmitArgs>) -> Self {
        self.get_submit_args = get_submit_args;
        self
    }

    pub fn default_drm(mut self, drm: impl Into<String>) -> Self {
        self.default_drm = drm.into();
        self
    }

    pub fn default_queue(mut self, queue: impl Into<String>) -> Self {
        self.default_queue = Some(queue.into());
        self
    }

    /// `0` falls back to [`cosmos_executor::DEFAULT_MAX_CONCURRENT_TASKS`];
    /// leaving this unset derives the ceiling from `num_cpus` instead.
    pub fn max_concurrent_tasks(mut self, n: usize) -> Self {
        self.max_concurrent_tasks = Some(n);
        self
    }

    pub fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = Some(interval);
        self
    }

    pub fn register_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.register(tool);
        self
    }

    pub fn register_drm(mut self, name: impl Into<String>, adapter: Arc<dyn DrmAdapter>) -> Self {
        self.drms.register(name, adapter);
        self
    }

    pub fn setting(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Connects to the store and validates `default_drm` against the
    /// registered DRM adapters (§6: "Invalid DRM is a fatal config error").
    pub async fn build(self) -> Result<Cosmos, CosmosError> {
        self.drms
            .get(&self.default_drm)
            .map_err(|_| CosmosError::UnsupportedDefaultDrm(self.default_drm.clone()))?;

        let pool = cosmos_store::connect(&self.database_url).await?;
        let store = Arc::new(Store::new(pool));

        let mut config = ExecutorConfig::new(self.get_submit_args);
        if let Some(n) = self.max_concurrent_tasks {
            config = config.with_max_concurrent_tasks(n);
        }
        if let Some(queue) = self.default_queue {
            config = config.with_default_queue(queue);
        }
        if let Some(interval) = self.tick_interval {
            config = config.with_tick_interval(interval);
        }

        let tools = Arc::new(self.tools);
        let drms = Arc::new(self.drms);
        let executor = Executor::new(store.clone(), tools.clone(), drms.clone(), config, self.settings.clone());

        Ok(Cosmos {
            store,
            tools,
            default_drm: self.default_drm,
            settings: self.settings,
            executor,
        })
    }
}

/// The assembled engine for one database: every method here delegates to
/// exactly one sub-crate, with the facade's own job limited to wiring and
/// to filling in each stage's DRM default before a Recipe is built.
pub struct Cosmos {
    store: Arc<Store>,
    tools: Arc<ToolRegistry>,
    default_drm: String,
    settings: serde_json::Map<String, serde_json::Value>,
    executor: Executor,
}

impl Cosmos {
    /// Shorthand for `CosmosBuilder::new(..).get_submit_args(..).default_drm(..).default_queue(..).build()`
    /// (§6 "Configuration"), for callers who don't need tool/DRM registration
    /// or settings spelled out as a builder chain.
    pub async fn new(
        database_url: impl Into<String>,
        get_submit_args: Arc<dyn GetSubmitArgs>,
        default_drm: impl Into<String>,
        default_queue: Option<String>,
    ) -> Result<Self, CosmosError> {
        let mut builder = CosmosBuilder::new(database_url)
            .get_submit_args(get_submit_args)
            .default_drm(default_drm);
        if let Some(queue) = default_queue {
            builder = builder.default_queue(queue);
        }
        builder.build().await
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    pub fn tools(&self) -> &Arc<ToolRegistry> {
        &self.tools
    }

    pub fn signals(&self) -> Arc<SignalBus> {
        self.executor.signals()
    }

    pub async fn initdb(&self) -> Result<(), CosmosError> {
        cosmos_store::initdb(self.store.pool()).await?;
        Ok(())
    }

    pub async fn resetdb(&self) -> Result<(), CosmosError> {
        cosmos_store::resetdb(self.store.pool()).await?;
        Ok(())
    }

    /// Warns (never fails) when the schema was stamped by a different
    /// `cosmos` version (§3 "Metadata table" EXPANDED note).
    pub async fn check_schema_version(&self) -> Result<(), CosmosError> {
        let version = cosmos_store::read_schema_version(self.store.pool()).await?;
        cosmos_store::check_version_and_warn(&version);
        Ok(())
    }

    pub async fn create_execution(
        &self,
        name: impl AsRef<str>,
        output_dir: impl Into<PathBuf>,
    ) -> Result<Execution, CosmosError> {
        Ok(self
            .store
            .create_execution(name.as_ref(), output_dir.into())
            .await?)
    }

    /// Expands `recipe` into a concrete Stage/Task/TaskFile graph rooted at
    /// `output_dir` and persists every stage (§4.4). Any stage that doesn't
    /// pin its own DRM inherits the facade's `default_drm`.
    pub async fn submit_recipe(
        &self,
        execution_id: ExecutionId,
        output_dir: PathBuf,
        recipe: &Recipe,
    ) -> Result<(), CosmosError> {
        let recipe = self.apply_default_drm(recipe.clone());
        let builder = GraphBuilder::new(execution_id, output_dir, &self.tools);
        let graph = builder.build(&recipe)?;
        for (position, stage) in graph.stages.iter().enumerate() {
            self.store
                .persist_stage(execution_id, position as i64, stage, &graph.tasks, &graph.files)
                .await?;
        }
        Ok(())
    }

    fn apply_default_drm(&self, mut recipe: Recipe) -> Recipe {
        for stage in &mut recipe.stages {
            if stage.drm.is_none() {
                stage.drm = Some(self.default_drm.clone());
            }
        }
        recipe
    }

    /// Runs an Execution to a terminal status, resuming from whatever is
    /// already persisted (§4.6 "Resume").
    pub async fn run(&self, execution_id: ExecutionId) -> Result<ExecutionStatus, CosmosError> {
        Ok(self.executor.run(execution_id).await?)
    }

    pub async fn kill(&self, execution_id: ExecutionId) -> Result<(), CosmosError> {
        Ok(self.executor.kill(execution_id).await?)
    }
}
