use serde::{Deserialize, Serialize};

use crate::domain::{LabelId, Todo};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTodoPayload {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub labels: Vec<LabelId>,
}

impl NewTodoPayload {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            description: None,
            labels: Vec::new(),
        }
    }

    pub fn with_labels(mut self, labels: Vec<LabelId>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateTodoPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<Vec<LabelId>>,
}

impl From<&Todo> for UpdateTodoPayload {
    fn from(todo: &Todo) -> Self {
        Self {
            text: Some(todo.text.clone()),
            completed: Some(todo.completed),
            labels: Some(todo.label_ids()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLabelPayload {
    pub name: String,
}

impl NewLabelPayload {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Label, TodoId};

    #[test]
    fn full_record_update_carries_every_field() {
        let mut todo = Todo::new(TodoId(9), "ship", vec![Label::new(LabelId(2), "home")]);
        todo.completed = true;
        let payload = UpdateTodoPayload::from(&todo);
        assert_eq!(payload.text.as_deref(), Some("ship"));
        assert_eq!(payload.completed, Some(true));
        assert_eq!(payload.labels, Some(vec![LabelId(2)]));
    }

    #[test]
    fn new_todo_payload_accepts_missing_labels() {
        let payload: NewTodoPayload = serde_json::from_str(r#"{ "text": "a" }"#).expect("parse");
        assert_eq!(payload, NewTodoPayload::new("a"));
    }
}
