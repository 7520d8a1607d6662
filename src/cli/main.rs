//! CLI binary entry point for divisions

#[cfg(feature = "cli")]
use clap::{Parser, Subcommand};
#[cfg(feature = "cli")]
use division_import_sdk::cli::commands::import::{ImportArgs, handle_import};
#[cfg(feature = "cli")]
use division_import_sdk::cli::commands::init::{InitArgs, handle_init};
#[cfg(feature = "cli")]
use division_import_sdk::cli::commands::plan::{PlanArgs, handle_plan};
#[cfg(feature = "cli")]
use division_import_sdk::cli::commands::tree::{TreeArgs, handle_tree};
#[cfg(feature = "cli")]
use std::path::PathBuf;
#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(feature = "cli")]
#[derive(Parser)]
#[command(name = "divisions")]
#[command(about = "Import hierarchical administrative divisions from zip archives")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[cfg(feature = "cli")]
#[derive(Subcommand)]
enum Commands {
    /// Initialize a workspace (.divisions.toml and database)
    Init {
        /// Workspace path
        #[arg(default_value = ".")]
        workspace: PathBuf,
        /// Database backend (duckdb, memory)
        #[arg(short, long, default_value = "duckdb")]
        backend: String,
        /// Overwrite an existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Import a zip archive (CSV manifest + GeoJSON files)
    Import {
        /// Archive path
        archive: PathBuf,
        /// Tenant UUID
        #[arg(short, long)]
        tenant: String,
        /// Workspace path (default: current directory)
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
        /// Rows that cannot be placed in the hierarchy: fail or skip
        #[arg(long)]
        on_unresolved: Option<String>,
        /// Pretty-print the JSON response
        #[arg(short, long)]
        pretty: bool,
    },

    /// Validate an archive and print the level plan without writing
    Plan {
        /// Archive path
        archive: PathBuf,
        /// Tenant UUID
        #[arg(short, long)]
        tenant: String,
        /// Workspace path (default: current directory)
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
        /// Pretty-print the JSON plan
        #[arg(short, long)]
        pretty: bool,
    },

    /// Print a tenant's divisions as a tree
    Tree {
        /// Tenant UUID
        #[arg(short, long)]
        tenant: String,
        /// Workspace path (default: current directory)
        #[arg(short, long, default_value = ".")]
        workspace: PathBuf,
        /// Preferred label language
        #[arg(short, long, default_value = "en")]
        lang: String,
        /// Deepest level to print
        #[arg(long)]
        max_depth: Option<i64>,
    },
}

#[cfg(feature = "cli")]
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "division_import_sdk=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[cfg(feature = "cli")]
fn main() {
    let cli = Cli::parse();
    init_tracing();

    let result = match cli.command {
        Commands::Init {
            workspace,
            backend,
            force,
        } => {
            let args = InitArgs {
                workspace,
                backend,
                force,
            };
            handle_init(&args)
        }
        Commands::Import {
            archive,
            tenant,
            workspace,
            on_unresolved,
            pretty,
        } => {
            let args = ImportArgs {
                archive,
                tenant,
                workspace,
                on_unresolved,
                pretty,
            };
            handle_import(&args)
        }
        Commands::Plan {
            archive,
            tenant,
            workspace,
            pretty,
        } => {
            let args = PlanArgs {
                archive,
                tenant,
                workspace,
                pretty,
            };
            handle_plan(&args)
        }
        Commands::Tree {
            tenant,
            workspace,
            lang,
            max_depth,
        } => {
            let args = TreeArgs {
                tenant,
                workspace,
                lang,
                max_depth,
            };
            handle_tree(&args)
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature is not enabled. Build with --features cli");
    std::process::exit(1);
}
