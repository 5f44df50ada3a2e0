//! Index selection handed to the actions
//!
//! Actions never choose their own targets. They receive an [`IndexSelection`]:
//! an ordered, mutable list of index names bound to the client it was built
//! from. [`IndexList`] is the implementation used by the CLI.

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use crate::api::ManagementApi;
use crate::error::{ActionError, ActionResult, ApiResultExt};

/// Ordered, mutable set of target indices bound to a management client
#[async_trait]
pub trait IndexSelection: Send + Sync {
    /// Selected index names, in selection order
    fn indices(&self) -> &[String];

    /// Client the selection was built from
    fn client(&self) -> Arc<dyn ManagementApi>;

    /// Drop an index from the selection; `false` if it was not selected
    fn remove(&mut self, index: &str) -> bool;

    /// Whether nothing is selected
    fn is_empty(&self) -> bool {
        self.indices().is_empty()
    }

    /// Fail with [`ActionError::EmptySelection`] when nothing is selected
    fn empty_list_check(&self) -> ActionResult<()> {
        if self.is_empty() {
            Err(ActionError::EmptySelection(
                "the index selection is empty".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    /// Remove closed indices
    async fn filter_closed(&mut self) -> ActionResult<()>;

    /// Remove indices whose shards already have at most `max_num_segments` segments each
    async fn filter_forcemerged(&mut self, max_num_segments: u32) -> ActionResult<()>;
}

/// Index names resolved from the cluster
pub struct IndexList {
    client: Arc<dyn ManagementApi>,
    indices: Vec<String>,
}

impl std::fmt::Debug for IndexList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexList")
            .field("indices", &self.indices)
            .finish()
    }
}

impl IndexList {
    /// Selection over explicit names, kept in the given order
    pub fn from_names<I, S>(client: Arc<dyn ManagementApi>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut indices: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !indices.contains(&name) {
                indices.push(name);
            }
        }
        Self { client, indices }
    }

    /// Every index matching `pattern` (comma separated names and wildcards), sorted by name
    pub async fn from_pattern(client: Arc<dyn ManagementApi>, pattern: &str) -> ActionResult<Self> {
        let mut indices: Vec<String> = client
            .list_indices(pattern)
            .await
            .with_context(|| format!("list indices matching {}", pattern))?
            .into_iter()
            .map(|info| info.name)
            .collect();
        indices.sort();
        indices.dedup();
        debug!("Pattern {} matched {} index(es)", pattern, indices.len());
        Ok(Self { client, indices })
    }

    /// Keep indices matching `include` and not matching `exclude`
    pub fn filter_regex(&mut self, include: Option<&str>, exclude: Option<&str>) -> ActionResult<()> {
        let compile = |expr: &str| {
            Regex::new(expr).map_err(|e| {
                ActionError::Configuration(format!("invalid index regex {:?}: {}", expr, e))
            })
        };
        let include = include.map(compile).transpose()?;
        let exclude = exclude.map(compile).transpose()?;

        let before = self.indices.len();
        self.indices.retain(|name| {
            include.as_ref().map_or(true, |re| re.is_match(name))
                && !exclude.as_ref().map_or(false, |re| re.is_match(name))
        });
        debug!("Regex filter kept {} of {} index(es)", self.indices.len(), before);
        Ok(())
    }
}

#[async_trait]
impl IndexSelection for IndexList {
    fn indices(&self) -> &[String] {
        &self.indices
    }

    fn client(&self) -> Arc<dyn ManagementApi> {
        Arc::clone(&self.client)
    }

    fn remove(&mut self, index: &str) -> bool {
        let before = self.indices.len();
        self.indices.retain(|name| name != index);
        self.indices.len() != before
    }

    async fn filter_closed(&mut self) -> ActionResult<()> {
        if self.indices.is_empty() {
            return Ok(());
        }
        let listing = self
            .client
            .list_indices(&self.indices.join(","))
            .await
            .context("list index states")?;
        let closed: Vec<String> = listing
            .into_iter()
            .filter(|info| !info.open)
            .map(|info| info.name)
            .collect();
        for name in &closed {
            info!("Skipping closed index {}", name);
        }
        self.indices.retain(|name| !closed.contains(name));
        Ok(())
    }

    async fn filter_forcemerged(&mut self, max_num_segments: u32) -> ActionResult<()> {
        let mut keep = Vec::with_capacity(self.indices.len());
        for name in &self.indices {
            let counts = self
                .client
                .segment_count(name)
                .await
                .with_context(|| format!("read segment count of {}", name))?;
            if counts.is_merged_to(max_num_segments) {
                info!(
                    "Skipping {}: {} segment(s) over {} shard copies is already at or below {} per shard",
                    name, counts.segments, counts.shard_copies, max_num_segments
                );
            } else {
                keep.push(name.clone());
            }
        }
        self.indices = keep;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockCluster;

    fn cluster() -> Arc<MockCluster> {
        Arc::new(
            MockCluster::new()
                .with_index("logs-b", 1)
                .with_index("logs-a", 1)
                .with_index("logs-c", 1)
                .with_index("metrics", 1),
        )
    }

    #[tokio::test]
    async fn test_from_pattern_is_sorted() {
        let list = IndexList::from_pattern(cluster(), "logs-*").await.unwrap();
        assert_eq!(list.indices(), &["logs-a", "logs-b", "logs-c"]);
    }

    #[tokio::test]
    async fn test_regex_filters() {
        let mut list = IndexList::from_pattern(cluster(), "*").await.unwrap();
        list.filter_regex(Some("^logs-"), Some("-b$")).unwrap();
        assert_eq!(list.indices(), &["logs-a", "logs-c"]);
        assert!(matches!(
            list.filter_regex(Some("("), None),
            Err(ActionError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn test_filter_closed_and_forcemerged() {
        let cluster = cluster();
        cluster.close_index("logs-b");
        cluster.set_segments("logs-c", 2, 2);
        cluster.set_segments("logs-a", 2, 9);
        let mut list = IndexList::from_pattern(cluster.clone(), "logs-*").await.unwrap();

        list.filter_closed().await.unwrap();
        assert_eq!(list.indices(), &["logs-a", "logs-c"]);

        list.filter_forcemerged(1).await.unwrap();
        assert_eq!(list.indices(), &["logs-a"]);
    }

    #[tokio::test]
    async fn test_remove_and_empty_check() {
        let mut list = IndexList::from_names(cluster(), ["metrics", "metrics"]);
        assert_eq!(list.indices().len(), 1);
        assert!(list.empty_list_check().is_ok());
        assert!(list.remove("metrics"));
        assert!(!list.remove("metrics"));
        assert!(matches!(
            list.empty_list_check(),
            Err(ActionError::EmptySelection(_))
        ));
    }
}
