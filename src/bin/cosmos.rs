//! `cosmos` CLI (§6): `initdb`, `resetdb`, and `run <recipe-file>`.

use clap::{Parser, Subcommand};
use cosmos::{recipe_file, CosmosBuilder};
use tracing::info;
use tracing_subscriber::prelude::*;

#[derive(Parser)]
#[command(
    name = "cosmos",
    about = "A DAG workflow orchestration engine for computational pipelines",
    version = env!("CARGO_PKG_VERSION"),
    long_about = "Builds, persists, and runs DAG-shaped computational pipelines against \
                   a relational state store, submitting Tasks to local processes or a \
                   distributed resource manager (LSF, Grid Engine)."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database URL (bare path, sqlite://, or postgres://).
    #[arg(long, global = true, default_value = "cosmos.db")]
    database: String,

    /// DRM a stage falls back to when it doesn't pin its own.
    #[arg(long, global = true, default_value = "local")]
    default_drm: String,

    /// Queue name passed to `get_submit_args` when a Task doesn't pin its own.
    #[arg(long, global = true)]
    default_queue: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Creates the schema if it doesn't already exist.
    Initdb,
    /// Drops and recreates the schema.
    Resetdb,
    /// Builds, persists, and runs the pipeline declared in a recipe file.
    Run {
        /// Path to a JSON recipe file.
        recipe_file: std::path::PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Initdb => {
            let cosmos = CosmosBuilder::new(cli.database.as_str())
                .default_drm(cli.default_drm.as_str())
                .build()
                .await?;
            cosmos.initdb().await?;
            info!(database = %cli.database, "schema initialized");
            println!("schema initialized at {}", cli.database);
        }
        Commands::Resetdb => {
            let cosmos = CosmosBuilder::new(cli.database.as_str())
                .default_drm(cli.default_drm.as_str())
                .build()
                .await?;
            cosmos.resetdb().await?;
            info!(database = %cli.database, "schema reset");
            println!("schema reset at {}", cli.database);
        }
        Commands::Run { recipe_file: path } => {
            let loaded = recipe_file::load(&path)?;
            info!(recipe_file = %path.display(), "loaded recipe file");

            let mut builder = CosmosBuilder::new(cli.database.as_str()).default_drm(cli.default_drm.as_str());
            if let Some(queue) = cli.default_queue {
                builder = builder.default_queue(queue);
            }
            for tool in loaded.tools {
                builder = builder.register_tool(tool);
            }
            let cosmos = builder.build().await?;
            cosmos.initdb().await?;
            cosmos.check_schema_version().await?;

            let execution = cosmos
                .create_execution(&loaded.execution.name, loaded.execution.output_dir.clone())
                .await?;
            cosmos
                .submit_recipe(execution.id, loaded.execution.output_dir, &loaded.recipe)
                .await?;

            let status = cosmos.run(execution.id).await?;
            info!(execution = %loaded.execution.name, %status, "execution finished");
            println!("execution '{}' finished: {status}", loaded.execution.name);
            if status != cosmos_core::ExecutionStatus::Successful {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "cosmos=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
