//! Request/response pipeline
//!
//! Everything between a filled-in operation and the values the UI shows:
//! request building, response rendering, record extraction, the grid model
//! and report template resolution.

pub mod extract;
pub mod format;
pub mod grid;
pub mod operations;
pub mod session;
pub mod templates;
pub mod xml;

pub use grid::{GridModel, SortDirection};
pub use operations::{descriptor, operations, Invocation, OperationDescriptor, OperationKind};
pub use session::{Notice, OperationOutcome, Session, Table};
pub use templates::{ProbeCandidate, TemplateResolver};
