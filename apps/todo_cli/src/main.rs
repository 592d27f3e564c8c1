use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_client_settings, toggle_labels, HttpTodoRemote, Mutation, SkipReason,
    TodoStateController,
};
use shared::{
    domain::{Label, LabelId, Todo, TodoId},
    protocol::{NewLabelPayload, NewTodoPayload},
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "todo", about = "Manage todos and labels on a todo server")]
struct Cli {
    /// Overrides TODO_SERVER_URL and client.toml.
    #[arg(long, global = true)]
    server_url: Option<String>,
    /// Print todos and labels as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// List todos, optionally only those carrying a label.
    List {
        #[arg(long)]
        label: Option<String>,
    },
    Add {
        text: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long = "label")]
        labels: Vec<String>,
    },
    Done {
        id: i64,
    },
    Undone {
        id: i64,
    },
    Edit {
        id: i64,
        text: String,
    },
    Rm {
        id: i64,
    },
    Labels,
    AddLabel {
        name: String,
    },
    RmLabel {
        name: String,
    },
    /// Adds the label to the todo, or removes it if already present.
    ToggleLabel {
        id: i64,
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_client_settings();
    if let Some(server_url) = &cli.server_url {
        settings.server_url = server_url.clone();
    }
    debug!(
        server_url = %settings.server_url,
        strategy = ?settings.sync_strategy,
        "client settings"
    );

    let remote = HttpTodoRemote::new(&settings.server_url, settings.request_timeout)?;
    let controller = TodoStateController::with_strategy(Arc::new(remote), settings.sync_strategy);
    controller
        .initialize()
        .await
        .with_context(|| format!("loading todos from {}", settings.server_url))?;

    let report = run(&cli, &controller).await?;
    if let Some(outcome) = &report.outcome {
        // Keep stdout parseable under --json.
        if cli.json {
            eprintln!("{outcome}");
        } else {
            println!("{outcome}");
        }
    }
    for line in &report.listing {
        println!("{line}");
    }
    Ok(())
}

/// What a command prints: an optional outcome line for mutations, then the
/// listing (plain lines, or a single JSON document under `--json`).
#[derive(Debug, Default, PartialEq, Eq)]
struct Report {
    outcome: Option<String>,
    listing: Vec<String>,
}

async fn run(cli: &Cli, controller: &TodoStateController) -> Result<Report> {
    let outcome = match &cli.command {
        Command::List { label } => {
            if let Some(name) = label {
                let label = find_label(&controller.labels().await, name)?;
                controller.select_filter(Some(&label)).await;
            }
            None
        }
        Command::Labels => {
            return Ok(Report {
                outcome: None,
                listing: render_labels(&controller.labels().await, cli.json)?,
            });
        }
        Command::Add {
            text,
            description,
            labels,
        } => {
            let known = controller.labels().await;
            let label_ids = labels
                .iter()
                .map(|name| find_label(&known, name).map(|label| label.id))
                .collect::<Result<Vec<LabelId>>>()?;
            let mut payload = NewTodoPayload::new(text.as_str()).with_labels(label_ids);
            if let Some(description) = description {
                payload = payload.with_description(description.as_str());
            }
            Some(describe(controller.create_todo(payload).await?, "todo added"))
        }
        Command::Done { id } | Command::Undone { id } => {
            let mut todo = find_todo(&controller.todos().await, TodoId(*id))?;
            todo.completed = matches!(cli.command, Command::Done { .. });
            Some(describe(controller.update_todo(todo).await?, "todo updated"))
        }
        Command::Edit { id, text } => {
            let mut todo = find_todo(&controller.todos().await, TodoId(*id))?;
            todo.text = text.clone();
            Some(describe(controller.update_todo(todo).await?, "todo updated"))
        }
        Command::Rm { id } => {
            controller.delete_todo(TodoId(*id)).await?;
            Some(format!("todo {id} deleted"))
        }
        Command::AddLabel { name } => {
            let outcome = controller
                .create_label(NewLabelPayload::new(name.as_str()))
                .await?;
            Some(describe(outcome, "label added"))
        }
        Command::RmLabel { name } => {
            let label = find_label(&controller.labels().await, name)?;
            controller.delete_label(label.id).await?;
            Some(format!("label '{name}' deleted"))
        }
        Command::ToggleLabel { id, name } => {
            let label = find_label(&controller.labels().await, name)?;
            let mut todo = find_todo(&controller.todos().await, TodoId(*id))?;
            todo.labels = toggle_labels(&todo.labels, &label);
            Some(describe(controller.update_todo(todo).await?, "labels updated"))
        }
    };
    Ok(Report {
        outcome,
        listing: render_todos(&controller.visible_todos().await, cli.json)?,
    })
}

fn find_label(labels: &[Label], name: &str) -> Result<Label> {
    labels
        .iter()
        .find(|label| label.name == name)
        .cloned()
        .ok_or_else(|| anyhow!("unknown label '{name}'"))
}

fn find_todo(todos: &[Todo], id: TodoId) -> Result<Todo> {
    todos
        .iter()
        .find(|todo| todo.id == id)
        .cloned()
        .ok_or_else(|| anyhow!("unknown todo {id}"))
}

fn describe(outcome: Mutation, applied: &str) -> String {
    match outcome {
        Mutation::Applied => applied.to_string(),
        Mutation::Skipped(SkipReason::EmptyText) => "skipped: todo text is empty".to_string(),
        Mutation::Skipped(SkipReason::DuplicateLabelName) => {
            "skipped: a label with that name already exists".to_string()
        }
        Mutation::Skipped(SkipReason::AlreadyInitialized) => "skipped".to_string(),
    }
}

fn render_todos(todos: &[Todo], json: bool) -> Result<Vec<String>> {
    if json {
        return Ok(vec![serde_json::to_string_pretty(todos)?]);
    }
    Ok(todos.iter().map(render_todo).collect())
}

fn render_todo(todo: &Todo) -> String {
    let mark = if todo.completed { "x" } else { " " };
    let mut line = format!("[{mark}] {:>4}  {}", todo.id.0, todo.text);
    if !todo.labels.is_empty() {
        let names: Vec<&str> = todo.labels.iter().map(|l| l.name.as_str()).collect();
        line.push_str(&format!("  ({})", names.join(", ")));
    }
    line
}

fn render_labels(labels: &[Label], json: bool) -> Result<Vec<String>> {
    if json {
        return Ok(vec![serde_json::to_string_pretty(labels)?]);
    }
    Ok(labels
        .iter()
        .map(|label| format!("{:>4}  {}", label.id.0, label.name))
        .collect())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
