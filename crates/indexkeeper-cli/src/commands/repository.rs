// Snapshot repository management

use indexkeeper_actions::{ActionError, ApiResultExt, RepositorySettings};
use tracing::info;

use super::{Command, CommandContext};
use crate::error::{CliError, CliResult};
use crate::output;

/// Repository subcommands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryAction {
    /// Register a repository, verifying it unless told not to
    Create {
        name: String,
        settings: RepositorySettings,
        verify: bool,
    },
    /// List registered repositories
    Show,
    Delete { name: String },
    Verify { name: String },
}

impl RepositoryAction {
    /// Build repository settings from the `create` flags
    pub fn settings_from_flags(
        kind: &str,
        location: Option<String>,
        bucket: Option<String>,
        base_path: Option<String>,
    ) -> CliResult<RepositorySettings> {
        match kind {
            "fs" => {
                let location = location.ok_or_else(|| CliError::InvalidArgument {
                    message: "--location is required for fs repositories".to_string(),
                })?;
                Ok(RepositorySettings::Fs { location })
            }
            "s3" => {
                let bucket = bucket.ok_or_else(|| CliError::InvalidArgument {
                    message: "--bucket is required for s3 repositories".to_string(),
                })?;
                Ok(RepositorySettings::S3 { bucket, base_path })
            }
            other => Err(CliError::InvalidArgument {
                message: format!("unsupported repository type {:?} (expected fs or s3)", other),
            }),
        }
    }
}

/// `ikeep repository ...`
pub struct RepositoryCommand {
    context: CommandContext,
    action: RepositoryAction,
}

impl RepositoryCommand {
    pub fn new(context: CommandContext, action: RepositoryAction) -> Self {
        Self { context, action }
    }

    async fn ensure_exists(&self, name: &str) -> CliResult<()> {
        let exists = self
            .context
            .client
            .repository_exists(name)
            .await
            .with_context(|| format!("look up repository {}", name))?;
        if exists {
            Ok(())
        } else {
            Err(ActionError::DependencyMissing(format!("repository {} does not exist", name)).into())
        }
    }
}

#[async_trait::async_trait]
impl Command for RepositoryCommand {
    async fn execute(&self) -> CliResult<()> {
        let client = &self.context.client;
        match &self.action {
            RepositoryAction::Create {
                name,
                settings,
                verify,
            } => {
                if self.context.dry_run {
                    println!("DRY-RUN: would create repository {} ({:?})", name, settings);
                    return Ok(());
                }
                client
                    .create_repository(name, settings, *verify)
                    .await
                    .with_context(|| format!("create repository {}", name))?;
                info!("Created repository {}", name);
                output::print_success(&format!("Repository {} created", name));
            }
            RepositoryAction::Show => {
                let repositories = client
                    .get_repositories()
                    .await
                    .context("list repositories")?;
                if repositories.is_empty() {
                    println!("No repositories registered");
                }
                for (name, definition) in &repositories {
                    let kind = definition
                        .get("type")
                        .and_then(|t| t.as_str())
                        .unwrap_or("unknown");
                    println!("{} ({})", name, kind);
                }
            }
            RepositoryAction::Delete { name } => {
                self.ensure_exists(name).await?;
                if self.context.dry_run {
                    println!("DRY-RUN: would delete repository {}", name);
                    return Ok(());
                }
                client
                    .delete_repository(name)
                    .await
                    .with_context(|| format!("delete repository {}", name))?;
                output::print_success(&format!("Repository {} deleted", name));
            }
            RepositoryAction::Verify { name } => {
                self.ensure_exists(name).await?;
                client
                    .verify_repository(name)
                    .await
                    .with_context(|| format!("verify repository {}", name))?;
                output::print_success(&format!("Repository {} verified", name));
            }
        }
        Ok(())
    }
}
