use async_trait::async_trait;
use shared::{
    domain::{Label, LabelId, Todo, TodoId},
    protocol::{NewLabelPayload, NewTodoPayload, UpdateTodoPayload},
};

use crate::error::ClientError;

/// Request/response collaborator holding the authoritative todo and label
/// collections.
#[async_trait]
pub trait TodoRemote: Send + Sync {
    async fn fetch_todos(&self) -> Result<Vec<Todo>, ClientError>;
    async fn create_todo(&self, payload: NewTodoPayload) -> Result<Todo, ClientError>;
    async fn update_todo(
        &self,
        todo_id: TodoId,
        payload: UpdateTodoPayload,
    ) -> Result<Todo, ClientError>;
    async fn delete_todo(&self, todo_id: TodoId) -> Result<(), ClientError>;
    async fn fetch_labels(&self) -> Result<Vec<Label>, ClientError>;
    async fn create_label(&self, payload: NewLabelPayload) -> Result<Label, ClientError>;
    async fn delete_label(&self, label_id: LabelId) -> Result<(), ClientError>;
}
