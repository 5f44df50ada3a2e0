// Paced forcemerge

use clap::Args;
use indexkeeper_actions::ForceMergeOptions;

use super::{render_outcome, Command, CommandContext};
use crate::action_file::SelectionSpec;
use crate::error::CliResult;
use crate::router::SelectionArgs;

/// Flags of `ikeep forcemerge`
#[derive(Args, Debug, Clone)]
pub struct ForceMergeArgs {
    /// Target segments per shard
    #[arg(long)]
    pub max_num_segments: u32,

    /// Seconds to pause between requests
    #[arg(long, default_value_t = 0)]
    pub delay: u64,

    /// Indices per request (default: one request per index)
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Leave out indices a running forcemerge already covers
    #[arg(long)]
    pub skip_if_running: bool,

    /// Return once each request is accepted instead of waiting for its task
    #[arg(long)]
    pub no_wait_for_completion: bool,

    /// Seconds between task completion checks
    #[arg(long, default_value_t = 9)]
    pub wait_interval: u64,

    /// Seconds to wait for one task (-1 waits forever)
    #[arg(long, default_value_t = -1, allow_negative_numbers = true)]
    pub max_wait: i64,
}

impl ForceMergeArgs {
    /// Action options for these flags
    pub fn to_options(&self) -> ForceMergeOptions {
        let mut options = ForceMergeOptions::new(self.max_num_segments)
            .with_delay(self.delay)
            .with_skip_if_running(self.skip_if_running)
            .with_wait_for_completion(!self.no_wait_for_completion)
            .with_wait(self.wait_interval, self.max_wait);
        if let Some(size) = self.batch_size {
            options = options.with_batch_size(size);
        }
        options
    }
}

/// `ikeep forcemerge`
pub struct ForceMergeCommand {
    context: CommandContext,
    selection: SelectionSpec,
    ignore_empty_list: bool,
    options: ForceMergeOptions,
}

impl ForceMergeCommand {
    pub fn new(context: CommandContext, selection: &SelectionArgs, args: &ForceMergeArgs) -> Self {
        Self {
            context,
            selection: selection.spec(),
            ignore_empty_list: selection.ignore_empty_list,
            options: args.to_options(),
        }
    }
}

#[async_trait::async_trait]
impl Command for ForceMergeCommand {
    async fn execute(&self) -> CliResult<()> {
        let outcome = self
            .context
            .run_action(
                "forcemerge",
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
