use super::*;
use async_trait::async_trait;
use client_core::{ClientError, TodoRemote};
use shared::protocol::UpdateTodoPayload;
use std::sync::Mutex;

#[derive(Default)]
struct MemoryRemote {
    todos: Mutex<Vec<Todo>>,
    labels: Mutex<Vec<Label>>,
}

impl MemoryRemote {
    fn seeded() -> Arc<Self> {
        let work = Label::new(LabelId(1), "work");
        Arc::new(Self {
            todos: Mutex::new(vec![
                Todo::new(TodoId(11), "report", vec![work.clone()]),
                Todo::new(TodoId(10), "groceries", vec![]),
            ]),
            labels: Mutex::new(vec![work, Label::new(LabelId(2), "home")]),
        })
    }
}

#[async_trait]
impl TodoRemote for MemoryRemote {
    async fn fetch_todos(&self) -> Result<Vec<Todo>, ClientError> {
        Ok(self.todos.lock().expect("lock").clone())
    }

    async fn create_todo(&self, payload: NewTodoPayload) -> Result<Todo, ClientError> {
        let labels = self
            .labels
            .lock()
            .expect("lock")
            .iter()
            .filter(|label| payload.labels.contains(&label.id))
            .cloned()
            .collect();
        let mut todos = self.todos.lock().expect("lock");
        let next = todos.iter().map(|t| t.id.0).max().unwrap_or(0) + 1;
        let todo = Todo::new(TodoId(next), payload.text, labels);
        todos.insert(0, todo.clone());
        Ok(todo)
    }

    async fn update_todo(
        &self,
        todo_id: TodoId,
        payload: UpdateTodoPayload,
    ) -> Result<Todo, ClientError> {
        let all_labels = self.labels.lock().expect("lock").clone();
        let mut todos = self.todos.lock().expect("lock");
        let todo = todos
            .iter_mut()
            .find(|t| t.id == todo_id)
            .expect("known todo");
        if let Some(text) = payload.text {
            todo.text = text;
        }
        if let Some(completed) = payload.completed {
            todo.completed = completed;
        }
        if let Some(ids) = payload.labels {
            todo.labels = all_labels
                .into_iter()
                .filter(|label| ids.contains(&label.id))
                .collect();
        }
        Ok(todo.clone())
    }

    async fn delete_todo(&self, todo_id: TodoId) -> Result<(), ClientError> {
        self.todos.lock().expect("lock").retain(|t| t.id != todo_id);
        Ok(())
    }

    async fn fetch_labels(&self) -> Result<Vec<Label>, ClientError> {
        Ok(self.labels.lock().expect("lock").clone())
    }

    async fn create_label(&self, payload: NewLabelPayload) -> Result<Label, ClientError> {
        let mut labels = self.labels.lock().expect("lock");
        let next = labels.iter().map(|l| l.id.0).max().unwrap_or(0) + 1;
        let label = Label::new(LabelId(next), payload.name);
        labels.push(label.clone());
        Ok(label)
    }

    async fn delete_label(&self, label_id: LabelId) -> Result<(), ClientError> {
        self.labels.lock().expect("lock").retain(|l| l.id != label_id);
        Ok(())
    }
}

async fn controller(remote: &Arc<MemoryRemote>) -> TodoStateController {
    let controller = TodoStateController::new(remote.clone());
    controller.initialize().await.expect("initialize");
    controller
}

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("todo").chain(args.iter().copied())).expect("parse")
}

#[test]
fn parses_add_with_repeated_labels() {
    let parsed = cli(&["add", "ship it", "--label", "work", "--label", "home"]);
    assert_eq!(
        parsed.command,
        Command::Add {
            text: "ship it".to_string(),
            description: None,
            labels: vec!["work".to_string(), "home".to_string()],
        }
    );
}

#[test]
fn global_flags_follow_subcommand() {
    let parsed = cli(&["labels", "--json", "--server-url", "http://localhost:4000"]);
    assert!(parsed.json);
    assert_eq!(parsed.server_url.as_deref(), Some("http://localhost:4000"));
    assert_eq!(parsed.command, Command::Labels);
}

#[test]
fn toggle_label_requires_id_and_name() {
    assert!(Cli::try_parse_from(["todo", "toggle-label", "3"]).is_err());
    assert!(Cli::try_parse_from(["todo", "done", "three"]).is_err());
}

#[test]
fn render_marks_completion_and_labels() {
    let mut todo = Todo::new(TodoId(7), "write docs", vec![Label::new(LabelId(1), "work")]);
    assert_eq!(render_todo(&todo), "[ ]    7  write docs  (work)");
    todo.completed = true;
    todo.labels.clear();
    assert_eq!(render_todo(&todo), "[x]    7  write docs");
}

#[tokio::test]
async fn list_with_label_filters_output() {
    let remote = MemoryRemote::seeded();
    let controller = controller(&remote).await;

    let report = run(&cli(&["list", "--label", "work"]), &controller)
        .await
        .expect("run");
    assert_eq!(report.outcome, None);
    assert_eq!(report.listing, vec!["[ ]   11  report  (work)".to_string()]);
}

#[tokio::test]
async fn unknown_label_is_an_error() {
    let remote = MemoryRemote::seeded();
    let controller = controller(&remote).await;

    let err = run(&cli(&["list", "--label", "errands"]), &controller)
        .await
        .expect_err("unknown label");
    assert_eq!(err.to_string(), "unknown label 'errands'");
}

#[tokio::test]
async fn toggle_label_flips_membership() {
    let remote = MemoryRemote::seeded();
    let controller = controller(&remote).await;

    run(&cli(&["toggle-label", "10", "home"]), &controller)
        .await
        .expect("add label");
    run(&cli(&["toggle-label", "11", "work"]), &controller)
        .await
        .expect("remove label");

    let todos = remote.fetch_todos().await.expect("todos");
    assert!(todos[0].labels.is_empty());
    assert_eq!(todos[1].labels, vec![Label::new(LabelId(2), "home")]);
}

#[tokio::test]
async fn add_with_empty_text_reports_skip() {
    let remote = MemoryRemote::seeded();
    let controller = controller(&remote).await;

    let report = run(&cli(&["add", ""]), &controller).await.expect("run");
    assert_eq!(
        report.outcome.as_deref(),
        Some("skipped: todo text is empty")
    );
    assert_eq!(report.listing.len(), 2);
    assert_eq!(remote.fetch_todos().await.expect("todos").len(), 2);
}

#[tokio::test]
async fn duplicate_label_reports_skip_then_lists_todos() {
    let remote = MemoryRemote::seeded();
    let controller = controller(&remote).await;

    let report = run(&cli(&["add-label", "work"]), &controller)
        .await
        .expect("run");
    assert_eq!(
        report.outcome.as_deref(),
        Some("skipped: a label with that name already exists")
    );
    assert_eq!(report.listing.len(), 2);
}

#[tokio::test]
async fn rm_label_lists_todos_without_it() {
    let remote = MemoryRemote::seeded();
    let controller = controller(&remote).await;

    let report = run(&cli(&["rm-label", "work"]), &controller)
        .await
        .expect("run");
    assert_eq!(report.outcome.as_deref(), Some("label 'work' deleted"));
    assert_eq!(
        report.listing,
        vec!["[ ]   11  report".to_string(), "[ ]   10  groceries".to_string()]
    );
}

#[tokio::test]
async fn json_listing_is_a_single_parseable_document() {
    let remote = MemoryRemote::seeded();
    let controller = controller(&remote).await;

    let report = run(&cli(&["add", "ship it", "--json"]), &controller)
        .await
        .expect("run");
    assert_eq!(report.outcome.as_deref(), Some("todo added"));
    assert_eq!(report.listing.len(), 1);
    let todos: Vec<Todo> = serde_json::from_str(&report.listing[0]).expect("json");
    assert_eq!(todos.len(), 3);
    assert_eq!(todos[0].text, "ship it");
}

#[tokio::test]
async fn done_marks_todo_completed() {
    let remote = MemoryRemote::seeded();
    let controller = controller(&remote).await;

    let report = run(&cli(&["done", "10"]), &controller).await.expect("run");
    assert_eq!(report.outcome.as_deref(), Some("todo updated"));
    assert!(report.listing.contains(&"[x]   10  groceries".to_string()));
}
