use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::api::TaskApi;
use crate::config::ClientConfig;
use crate::error::{FetchError, SubmitError};
use crate::task::Task;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(default)]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskList {
    #[serde(default)]
    tasks: Vec<Task>,
}

/// HTTP implementation of [`TaskApi`] against the MenuChat task backend.
pub struct TaskClient {
    base_url: String,
    token: Option<String>,
    client: Client,
}

impl TaskClient {
    pub fn new(config: &ClientConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.request_timeout).build()?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Lists the newest tasks known to the backend.
    pub async fn list_tasks(&self, limit: usize) -> Result<Vec<Task>, FetchError> {
        let mut url = self.endpoint(&["tasks"]).map_err(FetchError::Network)?;
        url.query_pairs_mut().append_pair("limit", &limit.to_string());
        let resp = self
            .client
            .get(url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let list = resp
            .json::<TaskList>()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))?;
        Ok(list.tasks)
    }

    /// Appends `segments` to the base URL, each percent-encoded as a single
    /// path segment.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, String> {
        let mut url =
            Url::parse(&self.base_url).map_err(|err| format!("invalid base url {}: {err}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|()| format!("base url {} cannot carry a path", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(token) = &self.token {
            if let Ok(header) = HeaderValue::from_str(&format!("Bearer {}", token)) {
                headers.insert(AUTHORIZATION, header);
            }
        }
        headers
    }
}

#[async_trait]
impl TaskApi for TaskClient {
    async fn submit(&self, kind: &str, payload: Value) -> Result<String, SubmitError> {
        let url = self.endpoint(&["jobs", kind]).map_err(SubmitError::Network)?;
        let resp = self
            .client
            .post(url)
            .headers(self.headers())
            .json(&payload)
            .send()
            .await
            .map_err(|err| SubmitError::Network(err.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|err| SubmitError::Network(err.to_string()))?;
        if !status.is_success() {
            return Err(SubmitError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: SubmitResponse = serde_json::from_str(&body)
            .map_err(|err| SubmitError::MalformedResponse(err.to_string()))?;
        match parsed.task_id {
            Some(id) if !id.trim().is_empty() => {
                debug!(task_id = %id, kind, "job submitted");
                Ok(id)
            }
            _ => Err(SubmitError::MalformedResponse("missing taskId".to_string())),
        }
    }

    async fn fetch(&self, task_id: &str) -> Result<Task, FetchError> {
        // Dot segments are dropped when building a path, so no task can be
        // addressed by them.
        if matches!(task_id, "" | "." | "..") {
            return Err(FetchError::NotFound(task_id.to_string()));
        }
        let url = self.endpoint(&["tasks", task_id]).map_err(FetchError::Network)?;
        let resp = self
            .client
            .get(url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|err| FetchError::Network(err.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(task_id.to_string()));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        resp.json::<Task>()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))
    }
}
