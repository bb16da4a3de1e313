use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use taskflow_shared::{
    ChatReply, ChatRequest, ErrorBody, TaskCreate, TaskDto, TaskId, TaskPatch, TaskQuery,
};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::config::ServiceSettings;

/// Everything that can go wrong talking to a remote service, collapsed to
/// three kinds the caller can report without inspecting HTTP details.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("could not reach {url}: {message}")]
    Transport { url: String, message: String },

    #[error("{message}")]
    Service { status: Option<u16>, message: String },

    #[error("unexpected response from {url}: {message}")]
    Malformed { url: String, message: String },
}

impl ServiceError {
    /// Builds the error for a non-2xx response, preferring the body's
    /// `error` string.
    pub fn from_error_body(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|parsed| parsed.error)
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| format!("Request failed ({status})"));

        Self::Service {
            status: Some(status),
            message,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport",
            Self::Service { .. } => "service",
            Self::Malformed { .. } => "malformed",
        }
    }

    pub fn user_message(&self) -> String {
        self.to_string()
    }
}

/// Contract of the remote task store.
pub trait TaskService {
    fn list_tasks(
        &self,
        query: &TaskQuery,
    ) -> impl Future<Output = Result<Vec<TaskDto>, ServiceError>>;

    fn create_task(
        &self,
        create: &TaskCreate,
    ) -> impl Future<Output = Result<TaskDto, ServiceError>>;

    fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<TaskDto, ServiceError>>;

    fn delete_task(&self, id: &TaskId) -> impl Future<Output = Result<(), ServiceError>>;
}

impl<T: TaskService + ?Sized> TaskService for &T {
    fn list_tasks(
        &self,
        query: &TaskQuery,
    ) -> impl Future<Output = Result<Vec<TaskDto>, ServiceError>> {
        (**self).list_tasks(query)
    }

    fn create_task(
        &self,
        create: &TaskCreate,
    ) -> impl Future<Output = Result<TaskDto, ServiceError>> {
        (**self).create_task(create)
    }

    fn update_task(
        &self,
        id: &TaskId,
        patch: &TaskPatch,
    ) -> impl Future<Output = Result<TaskDto, ServiceError>> {
        (**self).update_task(id, patch)
    }

    fn delete_task(&self, id: &TaskId) -> impl Future<Output = Result<(), ServiceError>> {
        (**self).delete_task(id)
    }
}

/// Contract of the remote chat assistant.
pub trait AssistantService {
    fn chat(&self, message: &str) -> impl Future<Output = Result<String, ServiceError>>;
}

impl<T: AssistantService + ?Sized> AssistantService for &T {
    fn chat(&self, message: &str) -> impl Future<Output = Result<String, ServiceError>> {
        (**self).chat(message)
    }
}

#[derive(Debug, Clone)]
struct JsonHttp {
    client: Client,
    base_url: String,
}

impl JsonHttp {
    fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed building HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ServiceError> {
        let raw = format!("{}{path}", self.base_url);
        Url::parse(&raw).map_err(|err| ServiceError::Transport {
            url: raw.clone(),
            message: format!("invalid URL: {err}"),
        })
    }

    async fn execute(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
    ) -> Result<(StatusCode, String), ServiceError> {
        let target = url.to_string();
        debug!(method = %method, url = %target, "sending request");

        let mut request = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await.map_err(|err| {
            warn!(url = %target, error = %err, "request failed before a response arrived");
            ServiceError::Transport {
                url: target.clone(),
                message: err.to_string(),
            }
        })?;

        let status = response.status();
        let text = response.text().await.map_err(|err| {
            warn!(url = %target, status = %status, error = %err, "failed reading response body");
            ServiceError::Transport {
                url: target.clone(),
                message: err.to_string(),
            }
        })?;

        debug!(url = %target, status = %status, bytes = text.len(), "received response");
        Ok((status, text))
    }

    /// Sends the request and maps any non-2xx status to `ServiceError::Service`.
    async fn expect_success(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
    ) -> Result<String, ServiceError> {
        let (status, text) = self.execute(method, url, body).await?;
        if status.is_success() {
            Ok(text)
        } else {
            Err(ServiceError::from_error_body(status.as_u16(), &text))
        }
    }
}

fn encode<T: Serialize>(url: &Url, payload: &T) -> Result<String, ServiceError> {
    serde_json::to_string(payload).map_err(|err| ServiceError::Malformed {
        url: url.to_string(),
        message: format!("failed to encode request: {err}"),
    })
}

fn decode<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, ServiceError> {
    serde_json::from_str(body).map_err(|err| {
        warn!(url, error = %err, "response body did not match the expected shape");
        ServiceError::Malformed {
            url: url.to_string(),
            message: err.to_string(),
        }
    })
}

/// `TaskService` over the JSON/HTTP task API.
#[derive(Debug, Clone)]
pub struct HttpTaskService {
    http: JsonHttp,
}

impl HttpTaskService {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: JsonHttp::new(base_url, timeout)?,
        })
    }

    pub fn from_settings(settings: &ServiceSettings) -> anyhow::Result<Self> {
        Self::new(&settings.task_url, settings.timeout)
    }

    fn task_url(&self, id: &TaskId) -> Result<Url, ServiceError> {
        let mut url = self.http.endpoint("/tasks")?;
        url.path_segments_mut()
            .map_err(|()| ServiceError::Transport {
                url: self.http.base_url.clone(),
                message: "base URL cannot carry a path".to_string(),
            })?
            .push(&id.to_string());
        Ok(url)
    }
}

impl TaskService for HttpTaskService {
    #[instrument(skip(self), fields(query = ?query.pairs()))]
    async fn list_tasks(&self, query: &TaskQuery) -> Result<Vec<TaskDto>, ServiceError> {
        let mut url = self.http.endpoint("/tasks")?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.pairs() {
                pairs.append_pair(key, value);
            }
        }

        let target = url.to_string();
        let body = self.http.expect_success(Method::GET, url, None).await?;
        decode(&target, &body)
    }

    #[instrument(skip(self, create), fields(title_len = create.title.len(), category = %create.category))]
    async fn create_task(&self, create: &TaskCreate) -> Result<TaskDto, ServiceError> {
        let url = self.http.endpoint("/tasks")?;
        let payload = encode(&url, create)?;
        let target = url.to_string();
        let body = self
            .http
            .expect_success(Method::POST, url, Some(payload))
            .await?;
        decode(&target, &body)
    }

    #[instrument(skip(self, patch), fields(task_id = %id))]
    async fn update_task(&self, id: &TaskId, patch: &TaskPatch) -> Result<TaskDto, ServiceError> {
        let url = self.task_url(id)?;
        let payload = encode(&url, patch)?;
        let target = url.to_string();
        let body = self
            .http
            .expect_success(Method::PUT, url, Some(payload))
            .await?;
        decode(&target, &body)
    }

    #[instrument(skip(self), fields(task_id = %id))]
    async fn delete_task(&self, id: &TaskId) -> Result<(), ServiceError> {
        let url = self.task_url(id)?;
        self.http.expect_success(Method::DELETE, url, None).await?;
        Ok(())
    }
}

/// `AssistantService` over `POST /chat`.
#[derive(Debug, Clone)]
pub struct HttpAssistant {
    http: JsonHttp,
}

impl HttpAssistant {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            http: JsonHttp::new(base_url, timeout)?,
        })
    }

    pub fn from_settings(settings: &ServiceSettings) -> anyhow::Result<Self> {
        Self::new(&settings.assistant_url, settings.timeout)
    }
}

impl AssistantService for HttpAssistant {
    #[instrument(skip(self, message), fields(message_len = message.len()))]
    async fn chat(&self, message: &str) -> Result<String, ServiceError> {
        let url = self.http.endpoint("/chat")?;
        let payload = encode(
            &url,
            &ChatRequest {
                message: message.to_string(),
            },
        )?;
        let target = url.to_string();
        let (status, body) = self.http.execute(Method::POST, url, Some(payload)).await?;

        if !status.is_success() {
            return Err(ServiceError::from_error_body(status.as_u16(), &body));
        }

        let reply: ChatReply = decode(&target, &body)?;
        match (reply.error, reply.response) {
            (Some(error), _) => Err(ServiceError::Service {
                status: Some(status.as_u16()),
                message: error,
            }),
            (None, Some(response)) => Ok(response),
            (None, None) => Err(ServiceError::Malformed {
                url: target,
                message: "missing `response` field".to_string(),
            }),
        }
    }
}
