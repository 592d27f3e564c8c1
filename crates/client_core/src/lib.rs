//! Client-side mirror of the todo server: a state controller that reconciles
//! with the server after every mutation, the remote collaborator it talks to,
//! and the label helpers the view layer needs.

pub mod config;
pub mod controller;
pub mod error;
pub mod http;
pub mod labels;
pub mod remote;

pub use config::{load_client_settings, ClientSettings};
pub use controller::{
    Mutation, Operation, SkipReason, StateEvent, StateSnapshot, SyncStrategy, TodoStateController,
};
pub use error::ClientError;
pub use http::HttpTodoRemote;
pub use labels::{toggle_labels, visible_todos};
pub use remote::TodoRemote;
