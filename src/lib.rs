//! # QuAPI TUI
//!
//! A terminal client for Qualys-style vulnerability-management APIs.
//!
//! ## Features
//! - Catalogue of report, scan, asset, knowledge base and user operations
//! - XML responses parsed into a sortable, filterable results table
//! - Raw pane with status line, headers and pretty-printed body
//! - Report template discovery with a local JSON cache
//! - Report downloads written to disk
//!
//! ## Architecture
//! Actor-based with channels:
//! - UI Layer (Ratatui) - synchronous
//! - App Layer (State machine)
//! - Network Layer (Tokio runtime)

pub mod constants;
pub mod error;
pub mod models;
pub mod storage;
pub mod ui;
pub mod pipeline;
pub mod messages;
pub mod app;
pub mod network;

// Re-export commonly used types
pub use models::{ApiResponse, Credentials, HttpMethod, RequestSpec};
pub use error::{OperationError, TransportError};
pub use pipeline::{GridModel, Invocation, OperationKind, OperationOutcome, Session, TemplateResolver};
pub use messages::{UiEvent, NetworkCommand, NetworkResponse, RenderState};
pub use app::{AppState, AppActor};
pub use network::NetworkActor;
pub use network::client::RequestExecutor;
