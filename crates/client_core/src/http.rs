use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Label, LabelId, Todo, TodoId},
    error::ApiError,
    protocol::{NewLabelPayload, NewTodoPayload, UpdateTodoPayload},
};
use tracing::debug;
use url::Url;

use crate::{error::ClientError, remote::TodoRemote};

/// JSON-over-HTTP binding of [`TodoRemote`].
#[derive(Debug, Clone)]
pub struct HttpTodoRemote {
    http: Client,
    base_url: Url,
}

impl HttpTodoRemote {
    pub fn new(server_url: &str, request_timeout: Duration) -> Result<Self, ClientError> {
        let mut base_url = Url::parse(server_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|source| ClientError::Transport {
                url: base_url.to_string(),
                source,
            })?;
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        Ok(self.base_url.join(path)?)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        url: &Url,
    ) -> Result<Response, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|source| ClientError::Transport {
                url: url.to_string(),
                source,
            })?;
        debug!(%url, status = %response.status(), "todo api response");
        ensure_success(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.endpoint(path)?;
        let response = self.send(self.http.get(url.clone()), &url).await?;
        read_json(response).await
    }

    async fn delete(&self, path: &str) -> Result<(), ClientError> {
        let url = self.endpoint(path)?;
        self.send(self.http.delete(url.clone()), &url).await?;
        Ok(())
    }
}

async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiError>(&body) {
        Ok(error) => Err(ClientError::Api { status, error }),
        Err(_) => Err(ClientError::UnexpectedStatus { status, body }),
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let url = response.url().to_string();
    response
        .json()
        .await
        .map_err(|source| ClientError::Decode { url, source })
}

#[async_trait]
impl TodoRemote for HttpTodoRemote {
    async fn fetch_todos(&self) -> Result<Vec<Todo>, ClientError> {
        self.get_json("todos").await
    }

    async fn create_todo(&self, payload: NewTodoPayload) -> Result<Todo, ClientError> {
        let url = self.endpoint("todos")?;
        let response = self
            .send(self.http.post(url.clone()).json(&payload), &url)
            .await?;
        read_json(response).await
    }

    async fn update_todo(
        &self,
        todo_id: TodoId,
        payload: UpdateTodoPayload,
    ) -> Result<Todo, ClientError> {
        let url = self.endpoint(&format!("todos/{todo_id}"))?;
        let response = self
            .send(self.http.patch(url.clone()).json(&payload), &url)
            .await?;
        read_json(response).await
    }

    async fn delete_todo(&self, todo_id: TodoId) -> Result<(), ClientError> {
        self.delete(&format!("todos/{todo_id}")).await
    }

    async fn fetch_labels(&self) -> Result<Vec<Label>, ClientError> {
        self.get_json("labels").await
    }

    async fn create_label(&self, payload: NewLabelPayload) -> Result<Label, ClientError> {
        let url = self.endpoint("labels")?;
        let response = self
            .send(self.http.post(url.clone()).json(&payload), &url)
            .await?;
        read_json(response).await
    }

    async fn delete_label(&self, label_id: LabelId) -> Result<(), ClientError> {
        self.delete(&format!("labels/{label_id}")).await
    }
}

#[cfg(test)]
#[path = "tests/http_tests.rs"]
mod tests;
