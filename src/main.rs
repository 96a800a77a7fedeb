//! # DocVault CLI (`dv`)
//!
//! The `dv` binary is the primary interface for DocVault. It provides
//! commands for database initialization, document import, directory queries,
//! reconciliation scans, plugin-subscription management, and starting the
//! HTTP server.
//!
//! ## Usage
//!
//! ```bash
//! dv --config ./config/docvault.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `dv init` | Create the SQLite database and run schema migrations |
//! | `dv serve` | Start the HTTP API server |
//! | `dv import <files>...` | Fingerprint and archive files into the tracked set |
//! | `dv documents <path>` | List the resolved document set of a directory |
//! | `dv scan [path]` | Reconcile a directory against its tracked documents |
//! | `dv plugin <action>` | Manage plugin subscriptions |
//! | `dv default-directory [path]` | Show or set the workspace default directory |

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use docvault::blob::BlobStore;
use docvault::config::{self, Config};
use docvault::db;
use docvault::engine::Engine;
use docvault::migrate;
use docvault::models::ImportRequest;
use docvault::plugins;
use docvault::server;
use docvault::settings::{PluginSubscriber, Settings, SubscriberKind};
use docvault::store::SqliteStore;

/// DocVault CLI — a local-first document identity and tracking service for
/// PDM workflows.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/docvault.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "dv",
    about = "DocVault — a local-first document identity and tracking service for PDM workflows",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/docvault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and all required tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Start the HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind`, runs migrations,
    /// and syncs subscribed plugins before serving.
    Serve,

    /// Fingerprint and archive files, tracking them under a directory.
    Import {
        /// Files to import.
        files: Vec<PathBuf>,

        /// Directory to track the documents under. Defaults to each file's
        /// parent directory.
        #[arg(long)]
        directory: Option<String>,

        /// Document-number classifiers (up to three, in precedence order).
        #[arg(long = "document-number")]
        document_numbers: Vec<String>,

        /// Part-number classifiers (up to three, in precedence order).
        #[arg(long = "part-number")]
        part_numbers: Vec<String>,

        /// Path to a JSON side document describing the import.
        #[arg(long)]
        side_document: Option<PathBuf>,

        /// Human-readable display name (fill-once on merge).
        #[arg(long)]
        display_name: Option<String>,

        /// Remote document id from an upstream PDM system (fill-once).
        #[arg(long)]
        document_remote_id: Option<String>,

        /// Remote part id from an upstream PDM system (fill-once).
        #[arg(long)]
        part_remote_id: Option<String>,
    },

    /// List the resolved document set of a directory.
    ///
    /// Applies precedence classification: one representative per logical
    /// identity, filename-classified documents first.
    Documents {
        /// Directory path (normalized before lookup).
        path: String,
    },

    /// Reconcile a directory's tracked documents against the filesystem.
    ///
    /// Classifies every tracked document as unchanged, modified, or missing,
    /// and lists untracked files. Without a path, scans the workspace
    /// default directory.
    Scan {
        /// Directory to scan.
        path: Option<PathBuf>,
    },

    /// Manage plugin subscriptions.
    Plugin {
        #[command(subcommand)]
        action: PluginAction,
    },

    /// Show or set the workspace default directory.
    DefaultDirectory {
        /// New default directory; omit to print the current one.
        path: Option<PathBuf>,
    },
}

/// Plugin management subcommands.
#[derive(Subcommand)]
enum PluginAction {
    /// Subscribe to a plugin by repository url.
    Add {
        /// Subscriber name (also the plugin's directory name).
        name: String,
        /// Repository url, e.g. `https://github.com/opencads/ui-home`.
        url: String,
        /// Fetch mode: `git-release` (download release assets) or
        /// `git-repository` (clone and pull).
        #[arg(long, default_value = "git-release")]
        kind: String,
    },
    /// List subscribed plugins.
    List,
    /// List plugins present on disk.
    Local,
    /// Remove a plugin's local directory.
    Remove {
        /// Plugin name as shown by `dv plugin local`.
        name: String,
    },
    /// Fetch or update all subscribed plugins.
    Sync,
}

async fn build_engine(config: &Config) -> Result<Engine> {
    let pool = db::connect(&config.db.path).await?;
    migrate::run_migrations(&pool).await?;
    let store = Arc::new(SqliteStore::new(pool));
    let blobs = Arc::new(BlobStore::new(&config.blobs.path));
    Ok(Engine::new(store, blobs))
}

fn parse_subscriber_kind(kind: &str) -> Result<SubscriberKind> {
    match kind {
        "git-release" => Ok(SubscriberKind::GitRelease),
        "git-repository" => Ok(SubscriberKind::GitRepository),
        other => bail!("unknown subscriber kind: '{other}'. Use git-release or git-repository."),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docvault=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Import {
            files,
            directory,
            document_numbers,
            part_numbers,
            side_document,
            display_name,
            document_remote_id,
            part_remote_id,
        } => {
            if files.is_empty() {
                bail!("nothing to import: no files given");
            }
            if document_numbers.len() > 3 || part_numbers.len() > 3 {
                bail!("at most three document-number and three part-number classifiers");
            }
            let side_document = match side_document {
                Some(path) => {
                    let content = std::fs::read_to_string(&path).with_context(|| {
                        format!("Failed to read side document: {}", path.display())
                    })?;
                    Some(serde_json::from_str(&content).with_context(|| {
                        format!("Side document is not valid JSON: {}", path.display())
                    })?)
                }
                None => None,
            };

            let engine = build_engine(&cfg).await?;
            let mut requests = Vec::new();
            for file in files {
                let directory = directory.clone().or_else(|| {
                    file.parent().map(|p| p.to_string_lossy().into_owned())
                });
                requests.push(ImportRequest {
                    file_path: Some(file),
                    directory,
                    side_document: side_document.clone(),
                    document_number0: document_numbers.first().cloned(),
                    document_number1: document_numbers.get(1).cloned(),
                    document_number2: document_numbers.get(2).cloned(),
                    part_number0: part_numbers.first().cloned(),
                    part_number1: part_numbers.get(1).cloned(),
                    part_number2: part_numbers.get(2).cloned(),
                    document_remote_id: document_remote_id.clone(),
                    part_remote_id: part_remote_id.clone(),
                    display_name: display_name.clone(),
                });
            }
            let records = engine.import(&requests).await?;
            println!("imported {} document(s)", records.len());
            for record in records {
                println!("  {}  {}  {}", record.id, record.key, record.origin_file_name);
            }
        }
        Commands::Documents { path } => {
            let engine = build_engine(&cfg).await?;
            let records = engine.documents_by_directory(&path).await?;
            println!("{} document(s) under {}", records.len(), path);
            for record in records {
                let label = if record.display_name.is_empty() {
                    &record.origin_file_name
                } else {
                    &record.display_name
                };
                println!("  {}  {}", record.id, label);
            }
        }
        Commands::Scan { path } => {
            let settings = Settings::load(&cfg.settings_path())?;
            let path = match path {
                Some(path) => path,
                None => settings
                    .effective_default_directory(cfg.workspace.default_directory.as_deref())
                    .map(std::path::Path::to_path_buf)
                    .ok_or_else(|| {
                        anyhow::anyhow!("no path given and no default directory configured")
                    })?,
            };
            let engine = build_engine(&cfg).await?;
            let result = engine.scan_directory(&path).await?;
            println!("scan {}", path.display());
            println!("  unchanged: {}", result.unchanged.len());
            println!("  modified: {}", result.modified.len());
            println!("  missing: {}", result.missing.len());
            println!("  untracked: {}", result.untracked_files.len());
            for entry in &result.modified {
                println!("  M {}", entry.document.origin_file_name);
            }
            for entry in &result.missing {
                println!("  ! {}", entry.document.origin_file_name);
            }
            for file in &result.untracked_files {
                println!("  ? {}", file);
            }
        }
        Commands::Plugin { action } => match action {
            PluginAction::Add { name, url, kind } => {
                let kind = parse_subscriber_kind(&kind)?;
                let mut settings = Settings::load(&cfg.settings_path())?;
                settings.add_subscriber(PluginSubscriber { name, url, kind })?;
                settings.save(&cfg.settings_path())?;
                println!("subscribed");
            }
            PluginAction::List => {
                let settings = Settings::load(&cfg.settings_path())?;
                println!("{} subscriber(s)", settings.plugin_subscribers.len());
                for subscriber in &settings.plugin_subscribers {
                    println!("  {}  {}", subscriber.name, subscriber.url);
                }
            }
            PluginAction::Local => {
                let local = plugins::local_subscribers(&cfg.plugins_dir())?;
                println!("{} local plugin(s)", local.len());
                for plugin in &local {
                    println!("  {}  {}", plugin.name, plugin.url);
                }
            }
            PluginAction::Remove { name } => {
                plugins::remove_local_subscriber(&cfg.plugins_dir(), &name)?;
                println!("removed {}", name);
            }
            PluginAction::Sync => {
                let settings = Settings::load(&cfg.settings_path())?;
                plugins::sync_subscribers(&settings, &cfg.plugins_dir()).await?;
                println!("plugins up to date");
            }
        },
        Commands::DefaultDirectory { path } => match path {
            Some(path) => {
                let mut settings = Settings::load(&cfg.settings_path())?;
                settings.default_directory = Some(path.clone());
                settings.save(&cfg.settings_path())?;
                println!("default directory set to {}", path.display());
            }
            None => {
                let settings = Settings::load(&cfg.settings_path())?;
                match settings.effective_default_directory(cfg.workspace.default_directory.as_deref()) {
                    Some(path) => println!("{}", path.display()),
                    None => println!("no default directory configured"),
                }
            }
        },
    }

    Ok(())
}
