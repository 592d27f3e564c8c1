use shared::domain::{Label, LabelId, Todo};

/// Flips `target`'s membership in `labels`, matching by id. Used to build the
/// label set sent with a todo update.
pub fn toggle_labels(labels: &[Label], target: &Label) -> Vec<Label> {
    if labels.iter().any(|label| label.id == target.id) {
        labels
            .iter()
            .filter(|label| label.id != target.id)
            .cloned()
            .collect()
    } else {
        let mut toggled = labels.to_vec();
        toggled.push(target.clone());
        toggled
    }
}

/// Todos visible under the current filter, in list order.
pub fn visible_todos(todos: &[Todo], filter_label_id: Option<LabelId>) -> Vec<Todo> {
    match filter_label_id {
        None => todos.to_vec(),
        Some(label_id) => todos
            .iter()
            .filter(|todo| todo.has_label(label_id))
            .cloned()
            .collect(),
    }
}
