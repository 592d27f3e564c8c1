use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(TodoId);
id_newtype!(LabelId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: LabelId,
    pub name: String,
}

impl Label {
    pub fn new(id: LabelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl Todo {
    pub fn new(id: TodoId, text: impl Into<String>, labels: Vec<Label>) -> Self {
        Self {
            id,
            text: text.into(),
            description: None,
            completed: false,
            labels,
        }
    }

    pub fn has_label(&self, label_id: LabelId) -> bool {
        self.labels.iter().any(|label| label.id == label_id)
    }

    pub fn label_ids(&self) -> Vec<LabelId> {
        self.labels.iter().map(|label| label.id).collect()
    }
}
