// Execute a YAML action file

use std::path::PathBuf;

use super::{render_outcome, Command, CommandContext};
use crate::action_file::{ActionFile, StepResult};
use crate::error::CliResult;
use crate::output;

/// `ikeep run <file>`
pub struct RunCommand {
    context: CommandContext,
    path: PathBuf,
}

impl RunCommand {
    pub fn new(context: CommandContext, path: PathBuf) -> Self {
        Self { context, path }
    }
}

#[async_trait::async_trait]
impl Command for RunCommand {
    async fn execute(&self) -> CliResult<()> {
        let file = ActionFile::load(&self.path, &self.context.registry)?;
        let results = file
            .run(
                &self.context.registry,
                self.context.client.clone(),
                self.context.dry_run,
            )
            .await?;

        for (position, (step, result)) in file.actions.iter().zip(&results).enumerate() {
            let mut title = format!("[{}/{}] {}", position + 1, results.len(), step.action);
            if let Some(description) = &step.description {
                title.push_str(": ");
                title.push_str(description);
            }
            output::print_header(&title);
            match result {
                StepResult::Completed(outcome) => println!("{}", render_outcome(outcome)),
                StepResult::SkippedEmpty => output::print_warning("no actionable indices, skipped"),
            }
        }
        output::print_success(&format!(
            "{} action(s) from {} finished",
            results.len(),
            self.path.display()
        ));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexkeeper_actions::mocks::MockCluster;
    use std::io::Write;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_dry_run_file_issues_no_mutations() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            "actions:\n  - action: convert_index_to_remote\n    options:\n      repository: backups\n      snapshot_name: s\n      delete_after: true\n    selection:\n      pattern: \"logs-*\"\n"
        )
        .unwrap();

        let cluster = Arc::new(
            MockCluster::new()
                .with_index("logs-1", 5)
                .with_repository("backups"),
        );
        let command = RunCommand::new(
            CommandContext::new(cluster.clone(), true),
            file.path().to_path_buf(),
        );
        command.execute().await.unwrap();
        assert!(cluster.mutating_calls().is_empty());
        assert!(cluster.has_index("logs-1"));
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let cluster = Arc::new(MockCluster::new());
        let command = RunCommand::new(
            CommandContext::new(cluster, false),
            PathBuf::from("/nonexistent/actions.yaml"),
        );
        let error = command.execute().await.unwrap_err();
        assert!(matches!(error, crate::error::CliError::Io(_)));
    }
}
