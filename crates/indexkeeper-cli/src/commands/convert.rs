// Convert indices to remote-backed storage

use clap::Args;
use indexkeeper_actions::ConvertOptions;
use tracing::info;

use super::{render_outcome, Command, CommandContext};
use crate::action_file::SelectionSpec;
use crate::error::CliResult;
use crate::router::SelectionArgs;

/// Flags of `ikeep convert-to-remote`
#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    /// Snapshot repository for backup and restore
    #[arg(long)]
    pub repository: String,

    /// Snapshot name; strftime escapes are expanded in UTC
    #[arg(long, default_value = "indexkeeper-remote-conversion-%Y%m%d%H%M%S")]
    pub snapshot_name: String,

    /// Restore from an existing snapshot instead of creating one
    #[arg(long)]
    pub use_existing_snapshot: bool,

    /// Create one snapshot per index
    #[arg(long)]
    pub snapshot_per_index: bool,

    /// Repository backing remote storage (default: --repository)
    #[arg(long)]
    pub remote_store_repository: Option<String>,

    /// Suffix appended to each restored index name
    #[arg(long, default_value = "_remote")]
    pub remote_index_suffix: String,

    /// Do not point an alias at the restored indices
    #[arg(long)]
    pub no_create_alias: bool,

    /// Custom alias name (single index only)
    #[arg(long)]
    pub alias_name: Option<String>,

    /// Delete the original indices once the restored ones are verified
    #[arg(long)]
    pub delete_after: bool,

    /// Skip the document count comparison
    #[arg(long)]
    pub no_verify_availability: bool,

    /// Fail when a restored index reports no stats
    #[arg(long)]
    pub strict_verification: bool,

    /// Ignore unavailable indices during snapshot and restore
    #[arg(long)]
    pub ignore_unavailable: bool,

    /// Allow partial snapshots and restores
    #[arg(long)]
    pub partial: bool,

    /// Return as soon as snapshots and restores are started
    #[arg(long)]
    pub no_wait_for_completion: bool,

    /// Seconds between completion checks
    #[arg(long, default_value_t = 9)]
    pub wait_interval: u64,

    /// Seconds to wait for completion (-1 waits forever)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub max_wait: i64,

    /// Skip the repository access check before snapshot and restore
    #[arg(long)]
    pub skip_repo_fs_check: bool,
}

impl ConvertArgs {
    /// Action options for these flags
    pub fn to_options(&self) -> ConvertOptions {
        let mut options = ConvertOptions::new(&self.repository, &self.snapshot_name)
            .with_existing_snapshot(self.use_existing_snapshot)
            .with_snapshot_per_index(self.snapshot_per_index)
            .with_suffix(&self.remote_index_suffix)
            .with_create_alias(!self.no_create_alias)
            .with_delete_after(self.delete_after)
            .with_verify_availability(!self.no_verify_availability)
            .with_strict_verification(self.strict_verification)
            .with_partial(self.partial)
            .with_wait_for_completion(!self.no_wait_for_completion)
            .with_wait(self.wait_interval, self.max_wait)
            .with_repository_check(!self.skip_repo_fs_check);
        options.ignore_unavailable = self.ignore_unavailable;
        if let Some(alias) = &self.alias_name {
            options = options.with_alias_name(alias);
        }
        if let Some(remote) = &self.remote_store_repository {
            options = options.with_remote_store_repository(remote);
        }
        options.with_default_remote_store()
    }
}

/// `ikeep convert-to-remote`
pub struct ConvertCommand {
    context: CommandContext,
    selection: SelectionSpec,
    ignore_empty_list: bool,
    options: ConvertOptions,
}

impl ConvertCommand {
    pub fn new(context: CommandContext, selection: &SelectionArgs, args: &ConvertArgs) -> Self {
        Self {
            context,
            selection: selection.spec(),
            ignore_empty_list: selection.ignore_empty_list,
            options: args.to_options(),
        }
    }
}

#[async_trait::async_trait]
impl Command for ConvertCommand {
    async fn execute(&self) -> CliResult<()> {
        info!(
            "Converting indices matching {} using repository {}",
            self.selection.pattern,
            self.options.repository.as_deref().unwrap_or_default()
        );
        let outcome = self
            .context
            .run_action(
                "convert_index_to_remote",
                &self.selection,
                self.ignore_empty_list,
                &self.options,
            )
            .await?;
        if let Some(outcome) = outcome {
            println!("{}", render_outcome(&outcome));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Cli;
    use crate::router::Commands;
    use clap::Parser;

    fn parse(args: &[&str]) -> ConvertArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::ConvertToRemote { args, .. } => args,
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_flag_defaults_match_action_defaults() {
        let args = parse(&["ikeep", "convert-to-remote", "--repository", "backups"]);
        let options = args.to_options();
        assert_eq!(options.repository.as_deref(), Some("backups"));
        assert_eq!(options.remote_store_repository.as_deref(), Some("backups"));
        assert_eq!(options.remote_index_suffix, "_remote");
        assert!(options.create_alias);
        assert!(options.verify_availability);
        assert!(!options.skip_repo_fs_check);
        assert_eq!(options.max_wait, -1);
    }

    #[test]
    fn test_negated_flags() {
        let args = parse(&[
            "ikeep",
            "convert-to-remote",
            "--repository",
            "backups",
            "--remote-store-repository",
            "remote",
            "--no-create-alias",
            "--no-wait-for-completion",
            "--skip-repo-fs-check",
            "--max-wait",
            "-1",
        ]);
        let options = args.to_options();
        assert_eq!(options.remote_store_repository.as_deref(), Some("remote"));
        assert!(!options.create_alias);
        assert!(!options.wait_for_completion);
        assert!(options.skip_repo_fs_check);
    }
}
