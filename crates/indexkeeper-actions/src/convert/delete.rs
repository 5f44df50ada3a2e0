//! DELETE phase

use tokio::time::sleep;
use tracing::{info, warn};

use super::{ConvertToRemote, RunState};
use crate::error::{ActionError, ActionResult, ApiResultExt};

impl ConvertToRemote<'_> {
    pub(super) async fn delete_phase(
        &self,
        indices: &[String],
        state: &mut RunState,
    ) -> ActionResult<()> {
        if self.options.verify_availability {
            info!("Performing final verification before deletion");
            self.verify_targets(state).await?;
        }

        let present = self
            .client
            .existing_indices(indices)
            .await
            .context("check original indices")?;
        for gone in indices.iter().filter(|i| !present.contains(*i)) {
            warn!("Original index {} no longer exists, skipping deletion", gone);
        }

        if present.is_empty() {
            info!("No indices to delete");
        } else {
            warn!(
                "Deleting {} original index(es): {:?}",
                present.len(),
                present
            );
            self.client
                .delete_indices(&present)
                .await
                .with_context(|| format!("delete indices {:?}", present))?;

            sleep(self.delete_grace).await;
            let still_present = self
                .client
                .existing_indices(&present)
                .await
                .context("confirm deletion")?;
            if !still_present.is_empty() {
                return Err(ActionError::failed(format!(
                    "failed to delete some indices: {:?}",
                    still_present
                )));
            }
            info!("Deleted original indices: {:?}", present);
            state.deleted = present;
        }

        if !state.deferred_aliases.is_empty() {
            let deferred = std::mem::take(&mut state.deferred_aliases);
            self.submit_aliases(&deferred).await?;
            state.aliases.extend(deferred);
        }
        Ok(())
    }
}
