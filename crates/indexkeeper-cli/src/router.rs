// Command routing and dispatch

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::action_file::SelectionSpec;
use crate::commands::convert::ConvertArgs;
use crate::commands::forcemerge::ForceMergeArgs;
use crate::commands::*;
use crate::error::CliResult;
use crate::logging::{effective_level, init_logging};
use crate::settings::Settings;

/// ikeep - maintenance actions for search clusters
#[derive(Parser, Debug)]
#[command(name = "ikeep")]
#[command(bin_name = "ikeep")]
#[command(about = "Maintenance actions for search clusters")]
#[command(
    long_about = "ikeep: storage-tier conversion and paced forcemerge for search clusters.\n\n  • ikeep convert-to-remote   Snapshot indices and restore them onto remote storage\n  • ikeep forcemerge          Merge segments in paced batches\n  • ikeep run FILE            Execute a YAML action file\n  • ikeep repository          Manage snapshot repositories"
)]
#[command(version)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Cluster URL (overrides settings)
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// Settings file (default: ./indexkeeper.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimize output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Show what would happen without changing the cluster
    #[arg(long, global = true)]
    pub dry_run: bool,
}

/// Index selection flags shared by the action commands
#[derive(Args, Debug, Clone)]
pub struct SelectionArgs {
    /// Index search pattern (comma separated names and wildcards)
    #[arg(long, default_value = "*")]
    pub pattern: String,

    /// Keep only indices matching this regex
    #[arg(long)]
    pub regex: Option<String>,

    /// Drop indices matching this regex
    #[arg(long)]
    pub exclude_regex: Option<String>,

    /// Succeed without doing anything when no index is selected
    #[arg(long)]
    pub ignore_empty_list: bool,
}

impl SelectionArgs {
    pub fn spec(&self) -> SelectionSpec {
        SelectionSpec {
            pattern: self.pattern.clone(),
            regex: self.regex.clone(),
            exclude_regex: self.exclude_regex.clone(),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Convert indices to remote-backed storage
    #[command(about = "Snapshot indices and restore them onto remote-backed storage")]
    ConvertToRemote {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        args: ConvertArgs,
    },

    /// Forcemerge indices
    #[command(about = "Merge index segments in paced batches")]
    Forcemerge {
        #[command(flatten)]
        selection: SelectionArgs,

        #[command(flatten)]
        args: ForceMergeArgs,
    },

    /// Run an action file
    #[command(about = "Execute the actions of a YAML file in order")]
    Run {
        /// Path to the action file
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Manage snapshot repositories
    #[command(about = "Create, show, delete and verify snapshot repositories")]
    Repository {
        #[command(subcommand)]
        action: RepositorySubcommand,
    },
}

#[derive(Subcommand, Debug, Clone)]
pub enum RepositorySubcommand {
    /// Register a repository
    Create {
        /// Repository name
        #[arg(long)]
        name: String,

        /// Repository type
        #[arg(long = "type", value_name = "TYPE", default_value = "fs", value_parser = ["fs", "s3"])]
        repo_type: String,

        /// Filesystem location (fs)
        #[arg(long)]
        location: Option<String>,

        /// Bucket (s3)
        #[arg(long)]
        bucket: Option<String>,

        /// Key prefix inside the bucket (s3)
        #[arg(long)]
        base_path: Option<String>,

        /// Do not ask the nodes to verify access
        #[arg(long)]
        skip_verify: bool,
    },

    /// List registered repositories
    Show,

    /// Unregister a repository
    Delete {
        #[arg(long)]
        name: String,
    },

    /// Verify every node can access a repository
    Verify {
        #[arg(long)]
        name: String,
    },
}

impl RepositorySubcommand {
    fn to_action(&self) -> CliResult<RepositoryAction> {
        Ok(match self {
            RepositorySubcommand::Create {
                name,
                repo_type,
                location,
                bucket,
                base_path,
                skip_verify,
            } => RepositoryAction::Create {
                name: name.clone(),
                settings: RepositoryAction::settings_from_flags(
                    repo_type,
                    location.clone(),
                    bucket.clone(),
                    base_path.clone(),
                )?,
                verify: !skip_verify,
            },
            RepositorySubcommand::Show => RepositoryAction::Show,
            RepositorySubcommand::Delete { name } => RepositoryAction::Delete { name: name.clone() },
            RepositorySubcommand::Verify { name } => RepositoryAction::Verify { name: name.clone() },
        })
    }
}

/// Command router
pub struct CommandRouter;

impl CommandRouter {
    /// Parse CLI arguments and route to appropriate handler
    pub async fn route() -> CliResult<()> {
        let cli = Cli::parse();
        let settings = Self::settings(&cli)?;

        // Initialize logging based on settings and CLI flags
        init_logging(&effective_level(&settings.log_level, cli.verbose, cli.quiet));

        let context = CommandContext::connect(&settings, cli.dry_run)?;
        Self::execute(&cli, context).await
    }

    /// Settings for this invocation: file and environment, then `--url`
    pub fn settings(cli: &Cli) -> CliResult<Settings> {
        let settings = Settings::load(cli.config.as_deref())?;
        Ok(match &cli.url {
            Some(url) => settings.with_url(url),
            None => settings,
        })
    }

    /// Execute a command
    pub async fn execute(cli: &Cli, context: CommandContext) -> CliResult<()> {
        match &cli.command {
            Commands::ConvertToRemote { selection, args } => {
                ConvertCommand::new(context, selection, args).execute().await
            }
            Commands::Forcemerge { selection, args } => {
                ForceMergeCommand::new(context, selection, args).execute().await
            }
            Commands::Run { file } => RunCommand::new(context, file.clone()).execute().await,
            Commands::Repository { action } => {
                RepositoryCommand::new(context, action.to_action()?)
                    .execute()
                    .await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use indexkeeper_actions::mocks::MockCluster;
    use std::sync::Arc;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "ikeep",
            "forcemerge",
            "--max-num-segments",
            "1",
            "--dry-run",
            "--url",
            "http://search:9200",
            "-v",
        ])
        .unwrap();
        assert!(cli.dry_run);
        assert!(cli.verbose);
        assert_eq!(cli.url.as_deref(), Some("http://search:9200"));
    }

    #[test]
    fn test_repository_create_requires_location_for_fs() {
        let cli =
            Cli::try_parse_from(["ikeep", "repository", "create", "--name", "b"]).unwrap();
        match cli.command {
            Commands::Repository { action } => assert!(action.to_action().is_err()),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_unknown_repository_type_rejected_by_parser() {
        assert!(Cli::try_parse_from([
            "ikeep", "repository", "create", "--name", "b", "--type", "hdfs"
        ])
        .is_err());
    }

    #[tokio::test]
    async fn test_execute_routes_dry_run_conversion() {
        let cluster = Arc::new(
            MockCluster::new()
                .with_index("logs-1", 3)
                .with_repository("backups"),
        );
        let cli = Cli::try_parse_from([
            "ikeep",
            "--dry-run",
            "convert-to-remote",
            "--pattern",
            "logs-*",
            "--repository",
            "backups",
            "--delete-after",
        ])
        .unwrap();
        CommandRouter::execute(&cli, CommandContext::new(cluster.clone(), cli.dry_run))
            .await
            .unwrap();
        assert!(cluster.mutating_calls().is_empty());
    }
}
