use anyhow::{Context, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::debug;

use shared::{
    domain::{Label, LabelId, Todo, TodoId},
    protocol::{NewTodoPayload, UpdateTodoPayload},
};

const TODO_WITH_LABELS_SELECT: &str = "SELECT t.id, t.text, t.description, t.completed,
        l.id AS label_id, l.name AS label_name
     FROM todos t
     LEFT OUTER JOIN todo_labels tl ON tl.todo_id = t.id
     LEFT OUTER JOIN labels l ON l.id = tl.label_id";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// One row of the todo/label outer join; a todo with N labels spans N rows.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TodoLabelRow {
    id: i64,
    text: String,
    description: Option<String>,
    completed: bool,
    label_id: Option<i64>,
    label_name: Option<String>,
}

impl TodoLabelRow {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            text: row.try_get("text")?,
            description: row.try_get("description")?,
            completed: row.try_get("completed")?,
            label_id: row.try_get("label_id")?,
            label_name: row.try_get("label_name")?,
        })
    }

    fn label(&self) -> Option<Label> {
        match (self.label_id, &self.label_name) {
            (Some(id), Some(name)) => Some(Label::new(LabelId(id), name.clone())),
            _ => None,
        }
    }
}

fn label_from_row(row: &SqliteRow) -> Result<Label> {
    Ok(Label::new(
        LabelId(row.try_get("id")?),
        row.try_get::<String, _>("name")?,
    ))
}

/// Folds joined rows into todos. Rows of the same todo must be adjacent.
fn fold_todo_rows(rows: Vec<TodoLabelRow>) -> Vec<Todo> {
    let mut todos: Vec<Todo> = Vec::new();
    for row in rows {
        let label = row.label();
        match todos.last_mut() {
            Some(todo) if todo.id.0 == row.id => todo.labels.extend(label),
            _ => todos.push(Todo {
                id: TodoId(row.id),
                text: row.text,
                description: row.description,
                completed: row.completed,
                labels: label.into_iter().collect(),
            }),
        }
    }
    todos
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn create_todo(&self, payload: &NewTodoPayload) -> Result<Todo> {
        let mut tx = self.pool.begin().await?;
        let rec = sqlx::query(
            "INSERT INTO todos (text, description, completed) VALUES (?, ?, 0) RETURNING id",
        )
        .bind(payload.text.as_str())
        .bind(payload.description.as_deref())
        .fetch_one(&mut *tx)
        .await?;
        let todo_id = TodoId(rec.try_get::<i64, _>(0)?);

        for label_id in &payload.labels {
            sqlx::query("INSERT OR IGNORE INTO todo_labels (todo_id, label_id) VALUES (?, ?)")
                .bind(todo_id.0)
                .bind(label_id.0)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        debug!(todo_id = todo_id.0, "storage: todo created");

        self.find_todo(todo_id)
            .await?
            .with_context(|| format!("todo {todo_id} vanished after insert"))
    }

    pub async fn find_todo(&self, todo_id: TodoId) -> Result<Option<Todo>> {
        let rows = sqlx::query(&format!(
            "{TODO_WITH_LABELS_SELECT} WHERE t.id = ? ORDER BY l.id ASC"
        ))
        .bind(todo_id.0)
        .fetch_all(&self.pool)
        .await?;
        let rows = rows
            .iter()
            .map(TodoLabelRow::from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(fold_todo_rows(rows).into_iter().next())
    }

    /// All todos, newest first.
    pub async fn list_todos(&self) -> Result<Vec<Todo>> {
        let rows = sqlx::query(&format!(
            "{TODO_WITH_LABELS_SELECT} ORDER BY t.id DESC, l.id ASC"
        ))
        .fetch_all(&self.pool)
        .await?;
        let rows = rows
            .iter()
            .map(TodoLabelRow::from_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(fold_todo_rows(rows))
    }

    pub async fn update_todo(
        &self,
        todo_id: TodoId,
        payload: &UpdateTodoPayload,
    ) -> Result<Option<Todo>> {
        let Some(existing) = self.find_todo(todo_id).await? else {
            return Ok(None);
        };

        let mut tx = self.pool.begin().await?;
        sqlx::query("UPDATE todos SET text = ?, completed = ? WHERE id = ?")
            .bind(payload.text.as_deref().unwrap_or(&existing.text))
            .bind(payload.completed.unwrap_or(existing.completed))
            .bind(todo_id.0)
            .execute(&mut *tx)
            .await?;

        if let Some(labels) = &payload.labels {
            sqlx::query("DELETE FROM todo_labels WHERE todo_id = ?")
                .bind(todo_id.0)
                .execute(&mut *tx)
                .await?;
            for label_id in labels {
                sqlx::query("INSERT OR IGNORE INTO todo_labels (todo_id, label_id) VALUES (?, ?)")
                    .bind(todo_id.0)
                    .bind(label_id.0)
                    .execute(&mut *tx)
                    .await?;
            }
        }
        tx.commit().await?;
        debug!(todo_id = todo_id.0, "storage: todo updated");

        self.find_todo(todo_id).await
    }

    /// Returns `false` when no todo had that id.
    pub async fn delete_todo(&self, todo_id: TodoId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM todo_labels WHERE todo_id = ?")
            .bind(todo_id.0)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM todos WHERE id = ?")
            .bind(todo_id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns `None` when another label already holds `name`.
    pub async fn create_label(&self, name: &str) -> Result<Option<Label>> {
        let inserted = sqlx::query("INSERT INTO labels (name) VALUES (?) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await;
        let rec = match inserted {
            Ok(rec) => rec,
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                debug!(name, "storage: label name already taken");
                return Ok(None);
            }
            Err(err) => {
                return Err(err).with_context(|| format!("failed to insert label '{name}'"))
            }
        };
        let label = label_from_row(&rec)?;
        debug!(label_id = label.id.0, "storage: label created");
        Ok(Some(label))
    }

    pub async fn find_label_by_name(&self, name: &str) -> Result<Option<Label>> {
        let row = sqlx::query("SELECT id, name FROM labels WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(label_from_row).transpose()
    }

    pub async fn list_labels(&self) -> Result<Vec<Label>> {
        let rows = sqlx::query("SELECT id, name FROM labels ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(label_from_row).collect()
    }

    /// Ids from `label_ids` that have no stored label.
    pub async fn missing_label_ids(&self, label_ids: &[LabelId]) -> Result<Vec<LabelId>> {
        let mut missing = Vec::new();
        for label_id in label_ids {
            let exists = sqlx::query("SELECT 1 FROM labels WHERE id = ?")
                .bind(label_id.0)
                .fetch_optional(&self.pool)
                .await?
                .is_some();
            if !exists {
                missing.push(*label_id);
            }
        }
        Ok(missing)
    }

    /// Removes the label and unlinks it from every todo. Returns `false`
    /// when no label had that id.
    pub async fn delete_label(&self, label_id: LabelId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM todo_labels WHERE label_id = ?")
            .bind(label_id.0)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM labels WHERE id = ?")
            .bind(label_id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url == "sqlite::memory:" || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
