//! REST client for the remote knowledge-base service.
//!
//! Endpoints (relative to the configured base URL):
//!
//! | operation          | request                                   |
//! |--------------------|-------------------------------------------|
//! | create task        | `POST /tasks`                             |
//! | update task        | `PATCH /tasks/{id}`                       |
//! | complete task      | `POST /tasks/{id}/complete`               |
//! | search tasks       | `GET /tasks?title=&status=&limit=`        |
//! | create note        | `POST /notes`                             |
//! | search notes       | `GET /notes?query=&limit=`                |
//! | create project     | `POST /projects`                          |
//! | list projects      | `GET /projects`                           |
//! | dashboard summary  | `GET /dashboard/summary`                  |
//! | productivity stats | `GET /analytics/productivity?period=`     |

use std::time::Duration;

use async_trait::async_trait;
use nexo_core::types::{
    DashboardSummary, NewNote, NewProject, NewTask, Note, Period, ProductivityStats, Project,
    Task, TaskFilter, TaskUpdate,
};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;

use crate::client::KnowledgeBase;
use crate::error::StoreError;

/// [`KnowledgeBase`] backed by the remote REST service.
#[derive(Clone)]
pub struct HttpKnowledgeBase {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpKnowledgeBase {
    /// Create a client with a per-request timeout.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Unavailable(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Absolute URL for a path relative to the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// URL of a single task, optionally followed by an action segment.
    ///
    /// The id is percent-encoded as one path segment, so `/`, `?` or `#`
    /// inside it cannot change the request target.
    pub fn task_url(&self, id: &str, action: Option<&str>) -> Result<Url, StoreError> {
        if id.trim().is_empty() || id == "." || id == ".." {
            return Err(StoreError::Validation(format!("invalid task id: {:?}", id)));
        }
        let mut url = Url::parse(&self.url("tasks"))
            .map_err(|e| StoreError::Unavailable(format!("invalid base URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable("base URL cannot hold a path".to_string()))?
            .push(id)
            .extend(action);
        Ok(url)
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.authorize(self.client.request(method, self.url(path)))
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.token {
            Some(ref token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, StoreError> {
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "Knowledge base returned an error status");
            return Err(StoreError::from_status(status.as_u16(), body));
        }
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Decode(e.to_string()))
    }
}

#[async_trait]
impl KnowledgeBase for HttpKnowledgeBase {
    async fn create_task(&self, task: NewTask) -> Result<Task, StoreError> {
        self.send(self.request(Method::POST, "tasks").json(&task))
            .await
    }

    async fn update_task(&self, id: &str, update: TaskUpdate) -> Result<Task, StoreError> {
        let url = self.task_url(id, None)?;
        self.send(self.authorize(self.client.patch(url)).json(&update))
            .await
    }

    async fn complete_task(&self, id: &str) -> Result<Task, StoreError> {
        let url = self.task_url(id, Some("complete"))?;
        self.send(self.authorize(self.client.post(url))).await
    }

    async fn search_tasks(&self, filter: TaskFilter) -> Result<Vec<Task>, StoreError> {
        self.send(self.request(Method::GET, "tasks").query(&filter))
            .await
    }

    async fn create_note(&self, note: NewNote) -> Result<Note, StoreError> {
        self.send(self.request(Method::POST, "notes").json(&note))
            .await
    }

    async fn search_notes(&self, query: &str, limit: usize) -> Result<Vec<Note>, StoreError> {
        self.send(
            self.request(Method::GET, "notes")
                .query(&[("query", query.to_string()), ("limit", limit.to_string())]),
        )
        .await
    }

    async fn create_project(&self, project: NewProject) -> Result<Project, StoreError> {
        self.send(self.request(Method::POST, "projects").json(&project))
            .await
    }

    async fn list_projects(&self) -> Result<Vec<Project>, StoreError> {
        self.send(self.request(Method::GET, "projects")).await
    }

    async fn dashboard_summary(&self) -> Result<DashboardSummary, StoreError> {
        self.send(self.request(Method::GET, "dashboard/summary"))
            .await
    }

    async fn productivity_stats(&self, period: Period) -> Result<ProductivityStats, StoreError> {
        self.send(
            self.request(Method::GET, "analytics/productivity")
                .query(&[("period", period.to_string())]),
        )
        .await
    }

    fn name(&self) -> &str {
        "http"
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use nexo_core::types::TaskStatus;

    fn make_client(base: &str, token: Option<&str>) -> HttpKnowledgeBase {
        HttpKnowledgeBase::new(base, token.map(String::from), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let kb = make_client("https://kb.example.com/api/", None);
        assert_eq!(kb.url("tasks"), "https://kb.example.com/api/tasks");
        assert_eq!(kb.url("/notes"), "https://kb.example.com/api/notes");
    }

    #[test]
    fn test_task_url_encodes_id_as_one_segment() {
        let kb = make_client("https://kb.example.com/api", None);
        let url = kb.task_url("../../admin/users", Some("complete")).unwrap();
        assert_eq!(
            url.as_str(),
            "https://kb.example.com/api/tasks/..%2F..%2Fadmin%2Fusers/complete"
        );

        let url = kb.task_url("a b?x=1#frag", None).unwrap();
        assert_eq!(url.path(), "/api/tasks/a%20b%3Fx=1%23frag");
        assert!(url.query().is_none());
        assert!(url.fragment().is_none());
    }

    #[test]
    fn test_task_url_plain_id() {
        let kb = make_client("https://kb.example.com/api/", None);
        let url = kb.task_url("t-42", Some("complete")).unwrap();
        assert_eq!(url.as_str(), "https://kb.example.com/api/tasks/t-42/complete");
    }

    #[test]
    fn test_task_url_rejects_dot_segments() {
        let kb = make_client("https://kb.example.com/api", None);
        for id in ["..", ".", "", "  "] {
            assert!(matches!(
                kb.task_url(id, None),
                Err(StoreError::Validation(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_complete_with_dot_id_makes_no_request() {
        // Validation fails before any connection to the closed port is tried
        let kb = HttpKnowledgeBase::new("http://127.0.0.1:9", None, Duration::from_millis(500))
            .unwrap();
        let err = kb.complete_task("..").await.unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_bearer_token_header() {
        let kb = make_client("https://kb.example.com", Some("secret"));
        let req = kb.request(Method::GET, "projects").build().unwrap();
        assert_eq!(
            req.headers().get("authorization").unwrap(),
            "Bearer secret"
        );
    }

    #[test]
    fn test_no_token_no_header() {
        let kb = make_client("https://kb.example.com", None);
        let req = kb.request(Method::GET, "projects").build().unwrap();
        assert!(req.headers().get("authorization").is_none());
    }

    #[test]
    fn test_task_filter_query_string() {
        let kb = make_client("https://kb.example.com", None);
        let filter = TaskFilter {
            title: Some("Reunião".to_string()),
            status: Some(TaskStatus::InProgress),
            limit: Some(5),
            ..TaskFilter::default()
        };
        let req = kb
            .request(Method::GET, "tasks")
            .query(&filter)
            .build()
            .unwrap();
        let query = req.url().query().unwrap();
        assert!(query.contains("status=in_progress"));
        assert!(query.contains("limit=5"));
        assert!(query.contains("title=Reuni"));
        assert!(!query.contains("priority"));
    }

    #[test]
    fn test_productivity_period_query() {
        let kb = make_client("https://kb.example.com", None);
        let req = kb
            .request(Method::GET, "analytics/productivity")
            .query(&[("period", Period::Month.to_string())])
            .build()
            .unwrap();
        assert_eq!(req.url().query(), Some("period=month"));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_network_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let kb = HttpKnowledgeBase::new("http://127.0.0.1:9", None, Duration::from_millis(500))
            .unwrap();
        let err = kb.list_projects().await.unwrap_err();
        assert!(matches!(err, StoreError::Network(_)));
    }
}
