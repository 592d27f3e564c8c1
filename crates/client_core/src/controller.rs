use std::{fmt, future::Future, str::FromStr, sync::Arc};

use serde::Deserialize;
use shared::{
    domain::{Label, LabelId, Todo, TodoId},
    protocol::{NewLabelPayload, NewTodoPayload, UpdateTodoPayload},
};
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{error::ClientError, labels, remote::TodoRemote};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// How local state is brought back in line with the server after a
/// successful mutation. Applies to todos and labels alike.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStrategy {
    /// Re-fetch the whole collection and replace local state.
    #[default]
    Refetch,
    /// Patch local state with the record the server returned.
    ApplyServerRecord,
}

impl FromStr for SyncStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "refetch" => Ok(Self::Refetch),
            "apply_server_record" | "apply-server-record" | "patch" => {
                Ok(Self::ApplyServerRecord)
            }
            other => Err(format!("unknown sync strategy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Initialize,
    CreateTodo,
    UpdateTodo,
    DeleteTodo,
    CreateLabel,
    DeleteLabel,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::CreateTodo => "create_todo",
            Self::UpdateTodo => "update_todo",
            Self::DeleteTodo => "delete_todo",
            Self::CreateLabel => "create_label",
            Self::DeleteLabel => "delete_label",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    EmptyText,
    DuplicateLabelName,
    AlreadyInitialized,
}

/// Outcome of a controller operation that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Applied,
    /// Nothing was sent to the server and local state is untouched.
    Skipped(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateEvent {
    TodosChanged(Vec<Todo>),
    LabelsChanged(Vec<Label>),
    FilterChanged(Option<LabelId>),
    RemoteCallFailed {
        operation: Operation,
        message: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    pub todos: Vec<Todo>,
    pub labels: Vec<Label>,
    pub filter_label_id: Option<LabelId>,
}

impl StateSnapshot {
    pub fn visible_todos(&self) -> Vec<Todo> {
        labels::visible_todos(&self.todos, self.filter_label_id)
    }
}

#[derive(Default)]
struct TodoState {
    todos: Vec<Todo>,
    labels: Vec<Label>,
    filter_label_id: Option<LabelId>,
    initialized: bool,
}

/// Mirrors the server's todos and labels and tracks the label filter.
///
/// Mutations run one at a time: each holds the sequence lock across its
/// remote call and the reconcile that follows, so no other mutation can
/// interleave. Readers only take the state lock and never wait on the network.
pub struct TodoStateController {
    remote: Arc<dyn TodoRemote>,
    strategy: SyncStrategy,
    sequence: Mutex<()>,
    state: RwLock<TodoState>,
    events: broadcast::Sender<StateEvent>,
}

impl TodoStateController {
    pub fn new(remote: Arc<dyn TodoRemote>) -> Self {
        Self::with_strategy(remote, SyncStrategy::default())
    }

    pub fn with_strategy(remote: Arc<dyn TodoRemote>, strategy: SyncStrategy) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            remote,
            strategy,
            sequence: Mutex::new(()),
            state: RwLock::new(TodoState::default()),
            events,
        }
    }

    pub fn strategy(&self) -> SyncStrategy {
        self.strategy
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    /// Loads todos and labels. Only the first successful call fetches.
    pub async fn initialize(&self) -> Result<Mutation, ClientError> {
        let _sequence = self.sequence.lock().await;
        if self.state.read().await.initialized {
            return Ok(Mutation::Skipped(SkipReason::AlreadyInitialized));
        }

        let (todos, labels) =
            futures::try_join!(self.remote.fetch_todos(), self.remote.fetch_labels())
                .map_err(|err| self.report_failure(Operation::Initialize, err))?;
        info!(
            todos = todos.len(),
            labels = labels.len(),
            "todo state initialized"
        );

        {
            let mut state = self.state.write().await;
            state.todos = todos.clone();
            state.labels = labels.clone();
            state.initialized = true;
        }
        self.emit(StateEvent::TodosChanged(todos));
        self.emit(StateEvent::LabelsChanged(labels));
        Ok(Mutation::Applied)
    }

    pub async fn create_todo(&self, payload: NewTodoPayload) -> Result<Mutation, ClientError> {
        if payload.text.is_empty() {
            debug!("create_todo skipped: empty text");
            return Ok(Mutation::Skipped(SkipReason::EmptyText));
        }

        let _sequence = self.sequence.lock().await;
        let created = self
            .remote_call(Operation::CreateTodo, self.remote.create_todo(payload))
            .await?;
        debug!(todo_id = created.id.0, "todo created remotely");

        match self.strategy {
            SyncStrategy::Refetch => self.refetch_todos(Operation::CreateTodo).await?,
            // Newest first, matching the server's list order.
            SyncStrategy::ApplyServerRecord => {
                self.patch_todos(|todos| todos.insert(0, created)).await
            }
        }
        Ok(Mutation::Applied)
    }

    /// Sends the full record (text, completion, label set) to the server.
    pub async fn update_todo(&self, todo: Todo) -> Result<Mutation, ClientError> {
        let _sequence = self.sequence.lock().await;
        let payload = UpdateTodoPayload::from(&todo);
        let updated = self
            .remote_call(
                Operation::UpdateTodo,
                self.remote.update_todo(todo.id, payload),
            )
            .await?;

        match self.strategy {
            SyncStrategy::Refetch => self.refetch_todos(Operation::UpdateTodo).await?,
            SyncStrategy::ApplyServerRecord => {
                self.patch_todos(|todos| {
                    match todos.iter_mut().find(|existing| existing.id == updated.id) {
                        Some(existing) => *existing = updated,
                        None => todos.insert(0, updated),
                    }
                })
                .await
            }
        }
        Ok(Mutation::Applied)
    }

    pub async fn delete_todo(&self, todo_id: TodoId) -> Result<Mutation, ClientError> {
        let _sequence = self.sequence.lock().await;
        self.remote_call(Operation::DeleteTodo, self.remote.delete_todo(todo_id))
            .await?;

        match self.strategy {
            SyncStrategy::Refetch => self.refetch_todos(Operation::DeleteTodo).await?,
            SyncStrategy::ApplyServerRecord => {
                self.patch_todos(|todos| todos.retain(|todo| todo.id != todo_id))
                    .await
            }
        }
        Ok(Mutation::Applied)
    }

    /// Label names are matched exactly; an existing name short-circuits
    /// before any remote call.
    pub async fn create_label(&self, payload: NewLabelPayload) -> Result<Mutation, ClientError> {
        let _sequence = self.sequence.lock().await;
        let duplicate = self
            .state
            .read()
            .await
            .labels
            .iter()
            .any(|label| label.name == payload.name);
        if duplicate {
            debug!(name = %payload.name, "create_label skipped: name already exists");
            return Ok(Mutation::Skipped(SkipReason::DuplicateLabelName));
        }

        let created = self
            .remote_call(Operation::CreateLabel, self.remote.create_label(payload))
            .await?;

        match self.strategy {
            SyncStrategy::Refetch => self.refetch_labels(Operation::CreateLabel).await?,
            SyncStrategy::ApplyServerRecord => {
                self.patch_labels(|labels| labels.push(created)).await
            }
        }
        Ok(Mutation::Applied)
    }

    /// Deleting a label also unlinks it from local todos and clears a filter
    /// that pointed at it, matching what the server does to its own records.
    /// That cleanup needs no network and runs even if the label re-fetch
    /// fails.
    pub async fn delete_label(&self, label_id: LabelId) -> Result<Mutation, ClientError> {
        let _sequence = self.sequence.lock().await;
        self.remote_call(Operation::DeleteLabel, self.remote.delete_label(label_id))
            .await?;

        let (todos, filter_cleared) = {
            let mut state = self.state.write().await;
            for todo in &mut state.todos {
                todo.labels.retain(|label| label.id != label_id);
            }
            let filter_cleared = state.filter_label_id == Some(label_id);
            if filter_cleared {
                state.filter_label_id = None;
            }
            (state.todos.clone(), filter_cleared)
        };
        self.emit(StateEvent::TodosChanged(todos));
        if filter_cleared {
            self.emit(StateEvent::FilterChanged(None));
        }

        match self.strategy {
            SyncStrategy::Refetch => self.refetch_labels(Operation::DeleteLabel).await?,
            SyncStrategy::ApplyServerRecord => {
                self.patch_labels(|labels| labels.retain(|label| label.id != label_id))
                    .await
            }
        }
        Ok(Mutation::Applied)
    }

    /// `None` clears the filter.
    pub async fn select_filter(&self, label: Option<&Label>) {
        let filter_label_id = label.map(|label| label.id);
        let changed = {
            let mut state = self.state.write().await;
            let changed = state.filter_label_id != filter_label_id;
            state.filter_label_id = filter_label_id;
            changed
        };
        if changed {
            self.emit(StateEvent::FilterChanged(filter_label_id));
        }
    }

    pub async fn visible_todos(&self) -> Vec<Todo> {
        let state = self.state.read().await;
        labels::visible_todos(&state.todos, state.filter_label_id)
    }

    pub async fn todos(&self) -> Vec<Todo> {
        self.state.read().await.todos.clone()
    }

    pub async fn labels(&self) -> Vec<Label> {
        self.state.read().await.labels.clone()
    }

    pub async fn filter_label_id(&self) -> Option<LabelId> {
        self.state.read().await.filter_label_id
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        let state = self.state.read().await;
        StateSnapshot {
            todos: state.todos.clone(),
            labels: state.labels.clone(),
            filter_label_id: state.filter_label_id,
        }
    }

    async fn remote_call<T>(
        &self,
        operation: Operation,
        call: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, ClientError> {
        call.await.map_err(|err| self.report_failure(operation, err))
    }

    async fn refetch_todos(&self, operation: Operation) -> Result<(), ClientError> {
        let todos = self.remote.fetch_todos().await.map_err(|err| {
            self.report_failure(
                operation,
                ClientError::Resync {
                    operation,
                    source: Box::new(err),
                },
            )
        })?;
        self.state.write().await.todos = todos.clone();
        self.emit(StateEvent::TodosChanged(todos));
        Ok(())
    }

    async fn refetch_labels(&self, operation: Operation) -> Result<(), ClientError> {
        let labels = self.remote.fetch_labels().await.map_err(|err| {
            self.report_failure(
                operation,
                ClientError::Resync {
                    operation,
                    source: Box::new(err),
                },
            )
        })?;
        self.state.write().await.labels = labels.clone();
        self.emit(StateEvent::LabelsChanged(labels));
        Ok(())
    }

    async fn patch_todos(&self, patch: impl FnOnce(&mut Vec<Todo>)) {
        let todos = {
            let mut state = self.state.write().await;
            patch(&mut state.todos);
            state.todos.clone()
        };
        self.emit(StateEvent::TodosChanged(todos));
    }

    async fn patch_labels(&self, patch: impl FnOnce(&mut Vec<Label>)) {
        let labels = {
            let mut state = self.state.write().await;
            patch(&mut state.labels);
            state.labels.clone()
        };
        self.emit(StateEvent::LabelsChanged(labels));
    }

    fn report_failure(&self, operation: Operation, err: ClientError) -> ClientError {
        warn!(%operation, error = %err, "todo remote call failed");
        self.emit(StateEvent::RemoteCallFailed {
            operation,
            message: err.to_string(),
        });
        err
    }

    fn emit(&self, event: StateEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
