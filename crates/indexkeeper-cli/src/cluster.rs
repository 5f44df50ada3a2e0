//! HTTP-backed management API
//!
//! Maps every [`ManagementApi`] capability onto the cluster's REST endpoints.
//! This is the only place transport errors become [`ApiError`]s.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use indexkeeper_actions::{
    chunk_index_list, AliasAction, ApiError, ApiResult, IndexInfo, ManagementApi, RepositorySettings,
    RestoreRequest, RunningTask, SegmentCount, SnapshotDescriptor, SnapshotRequest,
    SnapshotState,
};
use indexkeeper_http::{HttpClientTrait, HttpError, Method};
use serde_json::{json, Value};
use tracing::debug;

/// [`ManagementApi`] over a JSON HTTP client
pub struct HttpManagementApi {
    http: Arc<dyn HttpClientTrait>,
}

impl HttpManagementApi {
    /// Issue every capability call through `http`
    pub fn new(http: Arc<dyn HttpClientTrait>) -> Self {
        Self { http }
    }

    /// Wrap a client as a shareable trait object
    pub fn shared(http: Arc<dyn HttpClientTrait>) -> Arc<dyn ManagementApi> {
        Arc::new(Self::new(http))
    }

    async fn get(&self, path: &str) -> ApiResult<Value> {
        self.http.get_json(path).await.map_err(translate)
    }

    /// GET that reports a 404 as `None`
    async fn get_optional(&self, path: &str) -> ApiResult<Option<Value>> {
        match self.get(path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_index_chunk(&self, csv: &str) -> ApiResult<Vec<IndexInfo>> {
        let path = format!(
            "_cat/indices/{}?format=json&h=index,status&expand_wildcards=open,closed",
            csv
        );
        let Some(body) = self.get_optional(&path).await? else {
            return Ok(Vec::new());
        };
        let rows = body
            .as_array()
            .ok_or_else(|| unexpected("index listing is not an array", &body))?;
        Ok(rows
            .iter()
            .filter_map(|row| {
                let name = row.get("index").and_then(Value::as_str)?;
                let status = row.get("status").and_then(Value::as_str).unwrap_or("open");
                Some(IndexInfo {
                    name: name.to_string(),
                    open: status == "open",
                })
            })
            .collect())
    }

    async fn send(&self, method: Method, path: &str, body: Option<&Value>) -> ApiResult<Value> {
        self.http
            .send_json(method, path, body)
            .await
            .map_err(translate)
    }
}

/// Translate a transport failure into the capability error type
pub fn translate(error: HttpError) -> ApiError {
    match error {
        HttpError::HttpStatus { status, message } => rejection(status.as_u16(), &message),
        HttpError::Decode(message) => ApiError::UnexpectedResponse(message),
        HttpError::RequestFailed(e) => match e.status() {
            Some(status) => rejection(status.as_u16(), &e.to_string()),
            None => ApiError::Transport(e.to_string()),
        },
        other => ApiError::Transport(other.to_string()),
    }
}

/// Build a rejection from an error body, reading `error.type` and `error.reason` when present
fn rejection(status: u16, body: &str) -> ApiError {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let (error_type, reason) = match parsed.as_ref().and_then(|v| v.get("error")) {
        Some(Value::Object(error)) => (
            error.get("type").and_then(Value::as_str).map(str::to_string),
            error
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or(body)
                .to_string(),
        ),
        Some(Value::String(reason)) => (None, reason.clone()),
        _ => (None, body.to_string()),
    };
    ApiError::Rejected {
        status,
        error_type,
        reason,
    }
}

fn to_body<T: serde::Serialize>(value: &T) -> ApiResult<Value> {
    serde_json::to_value(value).map_err(|e| ApiError::UnexpectedResponse(e.to_string()))
}

fn unexpected(what: &str, value: &Value) -> ApiError {
    ApiError::UnexpectedResponse(format!("{}: {}", what, value))
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn parse_snapshot(repository: &str, entry: &Value) -> ApiResult<SnapshotDescriptor> {
    let name = entry
        .get("snapshot")
        .and_then(Value::as_str)
        .ok_or_else(|| unexpected("snapshot entry without a name", entry))?;
    let state = entry
        .get("state")
        .and_then(Value::as_str)
        .ok_or_else(|| unexpected("snapshot entry without a state", entry))?;
    Ok(SnapshotDescriptor {
        name: name.to_string(),
        repository: repository.to_string(),
        indices: string_list(entry.get("indices")),
        state: SnapshotState::from_remote(state),
    })
}

fn parse_tasks(body: &Value) -> Vec<RunningTask> {
    let mut tasks = Vec::new();
    let Some(nodes) = body.get("nodes").and_then(Value::as_object) else {
        return tasks;
    };
    for (node_id, node) in nodes {
        let Some(node_tasks) = node.get("tasks").and_then(Value::as_object) else {
            continue;
        };
        for (task_id, task) in node_tasks {
            let indices = task
                .get("indices")
                .filter(|v| v.is_array())
                .map(|v| string_list(Some(v)));
            tasks.push(RunningTask {
                id: task_id.clone(),
                node: task
                    .get("node")
                    .and_then(Value::as_str)
                    .unwrap_or(node_id)
                    .to_string(),
                action: task
                    .get("action")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                description: task
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                running_time: Duration::from_nanos(
                    task.get("running_time_in_nanos")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                ),
                indices,
            });
        }
    }
    tasks.sort_by(|a, b| a.id.cmp(&b.id));
    tasks
}

#[async_trait]
impl ManagementApi for HttpManagementApi {
    async fn repository_exists(&self, repository: &str) -> ApiResult<bool> {
        Ok(self
            .get_optional(&format!("_snapshot/{}", repository))
            .await?
            .is_some())
    }

    async fn get_repositories(&self) -> ApiResult<BTreeMap<String, Value>> {
        match self.get("_snapshot/_all").await? {
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(unexpected("repository listing is not an object", &other)),
        }
    }

    async fn create_repository(
        &self,
        repository: &str,
        settings: &RepositorySettings,
        verify: bool,
    ) -> ApiResult<()> {
        let body = to_body(settings)?;
        self.send(
            Method::PUT,
            &format!("_snapshot/{}?verify={}", repository, verify),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn delete_repository(&self, repository: &str) -> ApiResult<()> {
        self.send(Method::DELETE, &format!("_snapshot/{}", repository), None)
            .await?;
        Ok(())
    }

    async fn verify_repository(&self, repository: &str) -> ApiResult<()> {
        let body = self
            .send(Method::POST, &format!("_snapshot/{}/_verify", repository), None)
            .await?;
        let nodes = body.get("nodes").and_then(Value::as_object).map_or(0, |n| n.len());
        debug!("Repository {} verified by {} node(s)", repository, nodes);
        Ok(())
    }

    async fn create_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        request: &SnapshotRequest,
    ) -> ApiResult<()> {
        let body = to_body(request)?;
        self.send(
            Method::PUT,
            &format!("_snapshot/{}/{}?wait_for_completion=false", repository, snapshot),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn get_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
    ) -> ApiResult<Option<SnapshotDescriptor>> {
        let Some(body) = self
            .get_optional(&format!("_snapshot/{}/{}", repository, snapshot))
            .await?
        else {
            return Ok(None);
        };
        match body
            .get("snapshots")
            .and_then(Value::as_array)
            .and_then(|entries| entries.first())
        {
            Some(entry) => parse_snapshot(repository, entry).map(Some),
            None => Ok(None),
        }
    }

    async fn snapshot_in_progress(&self) -> ApiResult<bool> {
        let body = self.get("_snapshot/_status").await?;
        Ok(body
            .get("snapshots")
            .and_then(Value::as_array)
            .map_or(false, |running| !running.is_empty()))
    }

    async fn restore_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        request: &RestoreRequest,
    ) -> ApiResult<()> {
        let body = to_body(request)?;
        self.send(
            Method::POST,
            &format!(
                "_snapshot/{}/{}/_restore?wait_for_completion=false",
                repository, snapshot
            ),
            Some(&body),
        )
        .await?;
        Ok(())
    }

    async fn list_indices(&self, pattern: &str) -> ApiResult<Vec<IndexInfo>> {
        let names: Vec<String> = pattern.split(',').map(str::to_string).collect();
        let mut listing = Vec::new();
        for chunk in chunk_index_list(&names) {
            listing.extend(self.list_index_chunk(&chunk.join(",")).await?);
        }
        Ok(listing)
    }

    async fn index_exists(&self, index: &str) -> ApiResult<bool> {
        if !self.http.head(index).await.map_err(translate)? {
            return Ok(false);
        }
        // HEAD also answers 200 for an alias; only a concrete index lists under its own name
        let path = format!(
            "_cat/indices/{}?format=json&h=index&expand_wildcards=all",
            index
        );
        let Some(body) = self.get_optional(&path).await? else {
            return Ok(false);
        };
        Ok(body.as_array().map_or(false, |rows| {
            rows.iter()
                .any(|row| row.get("index").and_then(Value::as_str) == Some(index))
        }))
    }

    async fn doc_count(&self, index: &str) -> ApiResult<Option<u64>> {
        let body = self.get(&format!("{}/_stats/docs", index)).await?;
        Ok(body
            .pointer("/_all/primaries/docs/count")
            .and_then(Value::as_u64))
    }

    async fn segment_count(&self, index: &str) -> ApiResult<SegmentCount> {
        let body = self.get(&format!("{}/_stats/segments", index)).await?;
        let shard_copies = body
            .pointer("/_shards/successful")
            .or_else(|| body.pointer("/_shards/total"))
            .and_then(Value::as_u64)
            .ok_or_else(|| unexpected("segment stats without shard totals", &body))?;
        let segments = body
            .pointer("/_all/total/segments/count")
            .and_then(Value::as_u64)
            .unwrap_or(0);
        Ok(SegmentCount {
            shard_copies,
            segments,
        })
    }

    async fn delete_indices(&self, indices: &[String]) -> ApiResult<()> {
        for chunk in chunk_index_list(indices) {
            self.send(Method::DELETE, &chunk.join(","), None).await?;
        }
        Ok(())
    }

    async fn update_aliases(&self, actions: &[AliasAction]) -> ApiResult<()> {
        let body = json!({ "actions": to_body(&actions)? });
        self.send(Method::POST, "_aliases", Some(&body)).await?;
        Ok(())
    }

    async fn start_forcemerge(
        &self,
        indices: &[String],
        max_num_segments: u32,
    ) -> ApiResult<Option<String>> {
        let body = self
            .send(
                Method::POST,
                &format!(
                    "{}/_forcemerge?max_num_segments={}&wait_for_completion=false",
                    indices.join(","),
                    max_num_segments
                ),
                None,
            )
            .await?;
        Ok(body.get("task").and_then(Value::as_str).map(str::to_string))
    }

    async fn task_completed(&self, task_id: &str) -> ApiResult<bool> {
        let Some(body) = self.get_optional(&format!("_tasks/{}", task_id)).await? else {
            return Ok(true);
        };
        if let Some(error) = body.get("error") {
            return Err(ApiError::Rejected {
                status: 500,
                error_type: error.get("type").and_then(Value::as_str).map(str::to_string),
                reason: error
                    .get("reason")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("task {} failed", task_id)),
            });
        }
        Ok(body
            .get("completed")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    async fn list_tasks(&self, actions: &[&str]) -> ApiResult<Vec<RunningTask>> {
        let body = self
            .get(&format!("_tasks?detailed=true&actions={}", actions.join(",")))
            .await?;
        Ok(parse_tasks(&body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexkeeper_actions::StorageType;
    use indexkeeper_http::{HttpClient, HttpConfig};
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_for(server: &MockServer) -> HttpManagementApi {
        let config = HttpConfig::default()
            .with_base_url(server.uri())
            .with_retry_count(0)
            .with_retry_delay(Duration::from_millis(1));
        HttpManagementApi::new(Arc::new(HttpClient::new(config).unwrap()))
    }

    #[test]
    fn test_rejection_reads_error_type() {
        let body = r#"{"error":{"type":"concurrent_snapshot_execution_exception","reason":"a snapshot is already running"},"status":503}"#;
        let error = translate(HttpError::HttpStatus {
            status: indexkeeper_http::StatusCode::SERVICE_UNAVAILABLE,
            message: body.to_string(),
        });
        assert!(error.is_conflict());
        match error {
            ApiError::Rejected { status, reason, .. } => {
                assert_eq!(status, 503);
                assert_eq!(reason, "a snapshot is already running");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_rejection_with_plain_body() {
        let error = rejection(400, "bad request");
        assert_eq!(
            error,
            ApiError::Rejected {
                status: 400,
                error_type: None,
                reason: "bad request".to_string()
            }
        );
    }

    #[test]
    fn test_timeouts_are_transport_errors() {
        let error = translate(HttpError::Timeout(Duration::from_secs(30)));
        assert!(matches!(error, ApiError::Transport(_)));
    }

    #[test]
    fn test_parse_tasks_with_and_without_indices() {
        let body = json!({
            "nodes": {
                "n1": {
                    "tasks": {
                        "n1:5": {
                            "node": "n1",
                            "action": "indices:admin/forcemerge",
                            "description": "Force-merge indices [logs-1]",
                            "running_time_in_nanos": 2_500_000_000u64
                        },
                        "n1:9": {
                            "action": "indices:admin/forcemerge",
                            "description": "",
                            "indices": ["logs-2"]
                        }
                    }
                }
            }
        });
        let tasks = parse_tasks(&body);
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].id, "n1:5");
        assert_eq!(tasks[0].running_time, Duration::from_millis(2500));
        assert_eq!(tasks[0].indices, None);
        assert_eq!(tasks[1].node, "n1");
        assert_eq!(tasks[1].indices, Some(vec!["logs-2".to_string()]));
    }

    #[tokio::test]
    async fn test_repository_exists_maps_404() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_snapshot/backups"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"backups": {"type": "fs"}})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/_snapshot/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": {"type": "repository_missing_exception", "reason": "[missing] missing"},
                "status": 404
            })))
            .mount(&server)
            .await;

        let api = api_for(&server);
        assert!(api.repository_exists("backups").await.unwrap());
        assert!(!api.repository_exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_snapshot_parses_first_entry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_snapshot/backups/nightly"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "snapshots": [{
                    "snapshot": "nightly",
                    "indices": ["logs-1", "logs-2"],
                    "state": "PARTIAL"
                }]
            })))
            .mount(&server)
            .await;

        let api = api_for(&server);
        let snapshot = api.get_snapshot("backups", "nightly").await.unwrap().unwrap();
        assert_eq!(snapshot.state, SnapshotState::Partial);
        assert_eq!(snapshot.indices, vec!["logs-1", "logs-2"]);
        assert!(api.get_snapshot("backups", "other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_create_snapshot_does_not_wait() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/_snapshot/backups/snap-1"))
            .and(query_param("wait_for_completion", "false"))
            .and(body_json(json!({
                "indices": ["logs-1"],
                "ignore_unavailable": false,
                "include_global_state": false,
                "partial": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": true})))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let request = SnapshotRequest {
            indices: vec!["logs-1".to_string()],
            ignore_unavailable: false,
            include_global_state: false,
            partial: false,
        };
        api.create_snapshot("backups", "snap-1", &request).await.unwrap();
    }

    #[tokio::test]
    async fn test_restore_body_carries_storage_type() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_snapshot/backups/snap-1/_restore"))
            .and(body_json(json!({
                "indices": ["logs-1"],
                "ignore_unavailable": false,
                "include_aliases": false,
                "include_global_state": false,
                "partial": false,
                "rename_pattern": "^logs\\-1$",
                "rename_replacement": "logs-1_remote",
                "storage_type": "remote_snapshot"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"accepted": true})))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let request = RestoreRequest {
            indices: vec!["logs-1".to_string()],
            ignore_unavailable: false,
            include_aliases: false,
            include_global_state: false,
            partial: false,
            rename_pattern: "^logs\\-1$".to_string(),
            rename_replacement: "logs-1_remote".to_string(),
            storage_type: Some(StorageType::RemoteSnapshot),
        };
        api.restore_snapshot("backups", "snap-1", &request).await.unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_conflict_surfaces_as_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/_snapshot/backups/snap-2"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": {
                    "type": "concurrent_snapshot_execution_exception",
                    "reason": "cannot snapshot while a snapshot is in progress"
                },
                "status": 503
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let request = SnapshotRequest {
            indices: vec!["logs-1".to_string()],
            ignore_unavailable: false,
            include_global_state: false,
            partial: false,
        };
        let error = api
            .create_snapshot("backups", "snap-2", &request)
            .await
            .unwrap_err();
        assert!(error.is_conflict());
    }

    #[tokio::test]
    async fn test_list_indices_and_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_cat/indices/logs-*"))
            .and(query_param("format", "json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"index": "logs-2", "status": "close"},
                {"index": "logs-1", "status": "open"}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/logs-1/_stats/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_all": {"primaries": {"docs": {"count": 42}}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/logs-2/_stats/docs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_all": {"primaries": {}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/logs-1/_stats/segments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "_shards": {"total": 4, "successful": 2},
                "_all": {"total": {"segments": {"count": 6}}}
            })))
            .mount(&server)
            .await;

        let api = api_for(&server);
        let indices = api.list_indices("logs-*").await.unwrap();
        assert_eq!(indices.len(), 2);
        assert!(!indices[0].open);
        assert!(indices[1].open);
        assert_eq!(api.doc_count("logs-1").await.unwrap(), Some(42));
        assert_eq!(api.doc_count("logs-2").await.unwrap(), None);
        assert_eq!(
            api.segment_count("logs-1").await.unwrap(),
            SegmentCount {
                shard_copies: 2,
                segments: 6
            }
        );
    }

    #[tokio::test]
    async fn test_aliases_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/_aliases"))
            .and(body_json(json!({
                "actions": [{"add": {"index": "logs-1_remote", "alias": "logs-1"}}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/logs-1,logs-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        api.update_aliases(&[AliasAction::add("logs-1_remote", "logs-1")])
            .await
            .unwrap();
        api.delete_indices(&["logs-1".to_string(), "logs-2".to_string()])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_forcemerge_task_lifecycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/logs-1,logs-2/_forcemerge"))
            .and(query_param("max_num_segments", "1"))
            .and(query_param("wait_for_completion", "false"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"task": "n1:77"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/_tasks/n1:77"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"completed": true})))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/_tasks/n1:78"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let api = api_for(&server);
        let task = api
            .start_forcemerge(&["logs-1".to_string(), "logs-2".to_string()], 1)
            .await
            .unwrap();
        assert_eq!(task.as_deref(), Some("n1:77"));
        assert!(api.task_completed("n1:77").await.unwrap());
        assert!(api.task_completed("n1:78").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_tasks_filters_by_action() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_tasks"))
            .and(query_param("actions", "indices:admin/forcemerge"))
            .and(query_param("detailed", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nodes": {"n1": {"tasks": {"n1:3": {
                    "node": "n1",
                    "action": "indices:admin/forcemerge",
                    "description": "Force-merge indices [logs-1]",
                    "running_time_in_nanos": 1000
                }}}}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let tasks = api.list_tasks(&["indices:admin/forcemerge"]).await.unwrap();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].description, "Force-merge indices [logs-1]");
    }

    #[tokio::test]
    async fn test_alias_is_not_an_existing_index() {
        let server = MockServer::start().await;
        for name in ["logs-1", "current"] {
            Mock::given(method("HEAD"))
                .and(path(format!("/{}", name)))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;
        }
        Mock::given(method("HEAD"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/_cat/indices/logs-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"index": "logs-1"}])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/_cat/indices/current"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"index": "logs-1"}])))
            .mount(&server)
            .await;

        let api = api_for(&server);
        assert!(api.index_exists("logs-1").await.unwrap());
        assert!(!api.index_exists("current").await.unwrap());
        assert!(!api.index_exists("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_long_delete_is_split_across_requests() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"acknowledged": true})))
            .expect(2)
            .mount(&server)
            .await;

        let api = api_for(&server);
        let indices: Vec<String> = (0..40).map(|i| format!("{:x>99}", i)).collect();
        api.delete_indices(&indices).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let deleted: Vec<&str> = requests
            .iter()
            .flat_map(|r| r.url.path().trim_start_matches('/').split(','))
            .collect();
        assert_eq!(deleted, indices);
    }

    #[tokio::test]
    async fn test_failed_read_keeps_status_without_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/_snapshot/_status"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": {"type": "cluster_block_exception", "reason": "blocked"},
                "status": 503
            })))
            .expect(1)
            .mount(&server)
            .await;

        let error = api_for(&server).snapshot_in_progress().await.unwrap_err();
        assert_eq!(
            error,
            ApiError::Rejected {
                status: 503,
                error_type: Some("cluster_block_exception".to_string()),
                reason: "blocked".to_string()
            }
        );
    }
}
